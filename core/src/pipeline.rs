//! The top-level two-pass conversion pipeline: `convert_scenery` walks
//! every BGL under an input root, builds the GUID-to-placement and
//! GUID-to-model-reference indexes, then assembles and writes one
//! output tile at a time.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::assembler::{build_model_index, AssembleOutcome, TextureIndex, TileAssembler, TileOutputs};
use crate::bgl::types::PlacementsByGuid;
use crate::bgl::walker::{BgWalker, RECORD_TYPE_AIRPORT, RECORD_TYPE_SCENERY_OBJECT};
use crate::bgl::{airport, placement};
use crate::config::TerrainProviderConfig;
use crate::emit::{selector_xml, stg_line, AcTileBuilder, GltfTileBuilder, StgModelFormat};
use crate::error::{Error, Result};
use crate::geo::bucket::tile_bucket_path;
use crate::terrain::{DefaultTerrainService, HttpTerrainProvider, LocalTerrainProvider, StubTerrainService, TerrainService};

pub use crate::config::ConversionConfig;

/// Cooperative cancellation shared between the pipeline and its caller.
/// Polled between models and between tiles; never read inside an inner
/// decode loop.
#[derive(Debug, Default)]
pub struct AbortFlags {
    /// Stop immediately with no further writes once observed.
    pub cancel: AtomicBool,
    /// Finish the current tile, then skip every remaining tile.
    pub save: AtomicBool,
}

/// Out-of-band status reporting for a running conversion.
pub trait Observer: Send + Sync {
    fn on_progress(&self, message: &str);
}

/// Summary counters returned once a conversion finishes (or is
/// cancelled/truncated).
#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    pub bgl_files_scanned: usize,
    pub library_placements_decoded: usize,
    pub sim_object_placements_decoded: usize,
    pub tiles_written: usize,
    pub tiles_skipped_empty: usize,
    pub cancelled: bool,
}

fn enumerate_bgl_files(input_root: &Path) -> Vec<PathBuf> {
    WalkDir::new(input_root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("bgl"))
        })
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn build_terrain_service(terrain: &TerrainProviderConfig) -> Box<dyn TerrainService> {
    match terrain {
        TerrainProviderConfig::Stub { fixed_elevation } => {
            Box::new(StubTerrainService::with_fixed_elevation(*fixed_elevation))
        }
        TerrainProviderConfig::Local { dir } => {
            Box::new(DefaultTerrainService::new(LocalTerrainProvider::new(dir.clone())))
        }
        TerrainProviderConfig::Http { base_url } => {
            Box::new(DefaultTerrainService::new(HttpTerrainProvider::new(base_url.clone())))
        }
    }
}

/// Pass 1 for one BGL file: decodes every `SceneryObject` and `Airport`
/// subrecord, skipping `ModelData` entirely (that is pass 2's job, and
/// loading it here would double the memory footprint for no benefit).
fn scan_placements_in_file(
    path: &Path,
    terrain: &dyn TerrainService,
) -> Result<(Vec<crate::bgl::LibraryPlacement>, Vec<crate::bgl::SimObjectPlacement>)> {
    let file = File::open(path)?;
    let mut walker = BgWalker::open(BufReader::new(file))?;

    let mut library = Vec::new();
    let mut sim_objects = Vec::new();

    for (offset, size) in walker.locate_subrecords(RECORD_TYPE_SCENERY_OBJECT)? {
        let bytes = walker.read_at(offset, size as usize)?;
        let (lib, sim) = placement::decode_all(&bytes, terrain);
        library.extend(lib);
        sim_objects.extend(sim);
    }

    for (offset, size) in walker.locate_subrecords(RECORD_TYPE_AIRPORT)? {
        let bytes = walker.read_at(offset, size as usize)?;
        match airport::decode(&bytes, terrain) {
            Ok(parsed) => {
                library.extend(parsed.library_placements);
                sim_objects.extend(parsed.sim_object_placements);
            }
            Err(e) => warn!(file = %path.display(), error = %e, "failed to decode airport record; skipping"),
        }
    }

    Ok((library, sim_objects))
}

fn run_pass_one(
    bgl_paths: &[PathBuf],
    terrain: &dyn TerrainService,
) -> (PlacementsByGuid, Vec<crate::bgl::SimObjectPlacement>, usize, usize) {
    let mut placements: PlacementsByGuid = HashMap::new();
    let mut sim_objects = Vec::new();
    let mut library_count = 0usize;

    for path in bgl_paths {
        match scan_placements_in_file(path, terrain) {
            Ok((library, sims)) => {
                library_count += library.len();
                for p in library {
                    placements.entry(p.guid).or_default().push(p);
                }
                sim_objects.extend(sims);
            }
            Err(e) => warn!(file = %path.display(), error = %e, "failed to scan BGL for placements; skipping"),
        }
    }

    let sim_count = sim_objects.len();
    (placements, sim_objects, library_count, sim_count)
}

/// Writes one tile's assembled outputs to `<outputRoot>/Objects/<bucket>/`.
/// Returns `false` (no-op) when neither requested builder holds any
/// instances, so empty tiles are never written.
fn write_tile(config: &ConversionConfig, tile_index: u32, outputs: TileOutputs) -> Result<bool> {
    let gltf_empty = outputs.gltf.as_ref().map_or(true, GltfTileBuilder::is_empty);
    let ac3d_empty = outputs.ac3d.as_ref().map_or(true, AcTileBuilder::is_empty);
    if gltf_empty && ac3d_empty {
        return Ok(false);
    }

    let bucket = tile_bucket_path(outputs.center_lat, outputs.center_lon);
    let tile_dir = config.output_path.join("Objects").join(&bucket);
    std::fs::create_dir_all(&tile_dir)?;

    if let Some(builder) = outputs.gltf {
        if !builder.is_empty() {
            builder.write_to_file(&config.output_path, tile_index, outputs.center_lat, outputs.center_lon)?;
        }
    }
    if let Some(builder) = outputs.ac3d {
        if !builder.is_empty() {
            builder.write_to_file(&tile_dir, &tile_index.to_string(), &format!("{tile_index}.ac"))?;
        }
    }

    let format = StgModelFormat::from_flags(config.emit_gltf, config.emit_ac3d);
    let stg = stg_line(tile_index, format, outputs.center_lon, outputs.center_lat, outputs.center_alt);
    std::fs::write(tile_dir.join(format!("{tile_index}.stg")), format!("{stg}\n"))?;

    if format == StgModelFormat::DualXml {
        let xml = selector_xml(&format!("{tile_index}.gltf"), &format!("{tile_index}.ac"))?;
        std::fs::write(tile_dir.join(format!("{tile_index}.xml")), xml)?;
    }

    Ok(true)
}

/// Converts every BGL scenery package under `config.input_path` into a
/// FlightGear tile tree at `config.output_path`.
///
/// Pass 1 decodes every placement across every BGL; pass 2 indexes
/// model references by GUID; only then does tile assembly and emission
/// begin, honoring `abort` between tiles (and between models within a
/// tile, inside [`TileAssembler`]).
///
/// # Errors
/// Returns [`Error::InputPathMissing`] if `config.input_path` does not
/// exist. Individual malformed BGLs are logged and skipped rather than
/// aborting the whole run; I/O failures writing an output tile do
/// propagate, since a partially-written tile tree is worse than an
/// early stop.
pub fn convert_scenery(config: &ConversionConfig, observer: Option<&dyn Observer>) -> Result<ConversionReport> {
    if !config.input_path.exists() {
        return Err(Error::InputPathMissing(config.input_path.display().to_string()));
    }

    let abort = AbortFlags::default();
    convert_scenery_with_abort(config, observer, &abort)
}

/// Like [`convert_scenery`] but with a caller-owned [`AbortFlags`], so a
/// controller thread can request cancellation or an early save while
/// the conversion runs on another thread.
///
/// # Errors
/// See [`convert_scenery`].
pub fn convert_scenery_with_abort(
    config: &ConversionConfig,
    observer: Option<&dyn Observer>,
    abort: &AbortFlags,
) -> Result<ConversionReport> {
    if !config.input_path.exists() {
        return Err(Error::InputPathMissing(config.input_path.display().to_string()));
    }

    let mut report = ConversionReport::default();
    let terrain = build_terrain_service(&config.terrain);

    let bgl_paths = enumerate_bgl_files(&config.input_path);
    report.bgl_files_scanned = bgl_paths.len();
    info!(count = bgl_paths.len(), "enumerated BGL files");
    if let Some(obs) = observer {
        obs.on_progress(&format!("found {} BGL files", bgl_paths.len()));
    }

    let (placements, _sim_objects, library_count, sim_count) = run_pass_one(&bgl_paths, terrain.as_ref());
    report.library_placements_decoded = library_count;
    report.sim_object_placements_decoded = sim_count;
    info!(library_count, sim_count, "pass 1 complete");
    if let Some(obs) = observer {
        obs.on_progress(&format!("decoded {library_count} library placements"));
    }

    let model_index = build_model_index(&bgl_paths, &placements)?;
    info!(tiles = model_index.len(), "pass 2 complete (model index built)");

    let texture_index = TextureIndex::build(&config.input_path);
    let assembler = TileAssembler::new(config.emit_gltf, config.emit_ac3d, Some(&texture_index));

    let mut tile_indices: Vec<u32> = model_index.keys().copied().collect();
    tile_indices.sort_unstable();

    for tile_index in tile_indices {
        if abort.cancel.load(Ordering::SeqCst) {
            report.cancelled = true;
            break;
        }

        let refs = &model_index[&tile_index];
        match assembler.assemble(tile_index, refs, &placements, abort) {
            AssembleOutcome::Cancelled => {
                report.cancelled = true;
                break;
            }
            AssembleOutcome::Completed(outputs) => {
                if write_tile(config, tile_index, outputs)? {
                    report.tiles_written += 1;
                } else {
                    report.tiles_skipped_empty += 1;
                }
                if let Some(obs) = observer {
                    obs.on_progress(&format!("wrote tile {tile_index}"));
                }
                if abort.save.load(Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    info!(tiles_written = report.tiles_written, "conversion finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_path_is_fatal() {
        let config = ConversionConfig::new("/definitely/does/not/exist", "/tmp/out");
        let result = convert_scenery(&config, None);
        assert!(matches!(result, Err(Error::InputPathMissing(_))));
    }

    #[test]
    fn empty_input_dir_produces_an_empty_report() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let config = ConversionConfig::new(input.path(), output.path());
        let report = convert_scenery(&config, None).unwrap();
        assert_eq!(report.tiles_written, 0);
        assert_eq!(report.bgl_files_scanned, 0);
        assert!(!report.cancelled);
    }

    #[test]
    fn pre_cancelled_abort_flag_yields_a_cancelled_report() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let config = ConversionConfig::new(input.path(), output.path());
        let abort = AbortFlags::default();
        abort.cancel.store(true, Ordering::SeqCst);
        let report = convert_scenery_with_abort(&config, None, &abort).unwrap();
        assert!(report.cancelled);
    }
}
