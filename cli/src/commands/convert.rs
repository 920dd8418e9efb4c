//! `convert`: runs a full BGL-to-FlightGear-tile conversion.

use std::path::Path;
use std::time::Instant;

use scenery_core::config::{ConversionConfig, TerrainProviderConfig};
use scenery_core::pipeline::convert_scenery;

use crate::progress::{print_done, print_step, StdoutObserver};

#[allow(clippy::fn_params_excessive_bools)]
pub fn execute(
    source: &Path,
    destination: &Path,
    gltf: bool,
    ac3d: bool,
    terrain_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let started = Instant::now();

    let terrain = terrain_dir.map_or(TerrainProviderConfig::default(), |dir| {
        TerrainProviderConfig::Local { dir: dir.to_path_buf() }
    });

    let config = ConversionConfig::new(source, destination)
        .with_gltf(gltf)
        .with_ac3d(ac3d)
        .with_terrain(terrain);

    print_step(1, 1, &format!("converting {} -> {}", source.display(), destination.display()));

    let observer = StdoutObserver;
    let report = convert_scenery(&config, Some(&observer))?;

    println!(
        "scanned {} BGL files, decoded {} placements, wrote {} tiles ({} empty tiles skipped)",
        report.bgl_files_scanned,
        report.library_placements_decoded,
        report.tiles_written,
        report.tiles_skipped_empty,
    );
    if report.cancelled {
        println!("conversion was cancelled before completion");
    }

    print_done(started);
    Ok(())
}
