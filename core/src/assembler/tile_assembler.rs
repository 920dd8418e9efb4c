//! `TileAssembler`: decodes each tile's model references and instances
//! every placement sharing those GUIDs into the tile's glTF and/or
//! AC3D builders.

use std::path::Path;
use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use crate::assembler::model_index::ModelReference;
use crate::assembler::texture_resolver::TextureIndex;
use crate::assembler::transform::{ac3d_transform, placement_transform, TileOrigin};
use crate::bgl::types::{Guid, PlacementsByGuid};
use crate::emit::{AcTileBuilder, GltfTileBuilder};
use crate::model::{decode_model_data, MeshBuilder, NeutralScene};
use crate::pipeline::AbortFlags;

/// One tile's assembled output: its populated builders (only the
/// requested formats are `Some`) and the geographic center used for
/// the tile's STG placement line.
pub struct TileOutputs {
    pub tile_index: u32,
    pub center_lat: f64,
    pub center_lon: f64,
    pub center_alt: f64,
    pub gltf: Option<GltfTileBuilder>,
    pub ac3d: Option<AcTileBuilder>,
}

/// Outcome of assembling one tile: a clean (possibly `AbortAndSave`
/// truncated) finish, or an immediate `AbortAndCancel` stop with no
/// output to write.
pub enum AssembleOutcome {
    Completed(TileOutputs),
    Cancelled,
}

fn guid_hex(guid: &Guid) -> String {
    guid.iter().map(|b| format!("{b:02x}")).collect()
}

/// Arithmetic mean of (lat, lon, alt) over every placement whose tile
/// index equals `tile_index`; `(0, 0, 0)` if none match.
fn tile_center(tile_index: u32, placements: &PlacementsByGuid) -> (f64, f64, f64) {
    let mut sum_lat = 0.0;
    let mut sum_lon = 0.0;
    let mut sum_alt = 0.0;
    let mut count: u64 = 0;

    for placement_list in placements.values() {
        for placement in placement_list {
            if !matches!(placement.tile_index(), Ok(t) if t.value() == tile_index) {
                continue;
            }
            sum_lat += placement.latitude;
            sum_lon += placement.longitude;
            sum_alt += placement.altitude;
            count += 1;
        }
    }

    if count == 0 {
        (0.0, 0.0, 0.0)
    } else {
        let n = count as f64;
        (sum_lat / n, sum_lon / n, sum_alt / n)
    }
}

fn resolve_texture_field(index: &TextureIndex, field: &mut Option<String>, source_bgl_path: &Path) {
    let Some(raw) = field.take() else { return };
    match index.resolve(&raw, source_bgl_path) {
        Some(resolved) => *field = Some(resolved.to_string_lossy().into_owned()),
        None => warn!(texture = %raw, "texture not found under asset root"),
    }
}

/// Assembles tiles. Holds an optional shared texture index so lookups
/// are amortized across every tile of a conversion run.
pub struct TileAssembler<'a> {
    pub emit_gltf: bool,
    pub emit_ac3d: bool,
    pub texture_index: Option<&'a TextureIndex>,
}

impl<'a> TileAssembler<'a> {
    #[must_use]
    pub fn new(emit_gltf: bool, emit_ac3d: bool, texture_index: Option<&'a TextureIndex>) -> Self {
        Self { emit_gltf, emit_ac3d, texture_index }
    }

    fn resolve_textures(&self, mesh: &MeshBuilder, source_bgl_path: &Path) -> MeshBuilder {
        let Some(index) = self.texture_index else { return mesh.clone() };
        let mut resolved = mesh.clone();
        let material = &mut resolved.material;
        resolve_texture_field(index, &mut material.base_color_texture, source_bgl_path);
        resolve_texture_field(index, &mut material.metallic_roughness_texture, source_bgl_path);
        resolve_texture_field(index, &mut material.normal_texture, source_bgl_path);
        resolve_texture_field(index, &mut material.occlusion_texture, source_bgl_path);
        resolve_texture_field(index, &mut material.emissive_texture, source_bgl_path);
        resolved
    }

    fn decode_model(&self, model_ref: &ModelReference) -> Option<NeutralScene> {
        let payload = match model_ref.read_payload() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(source = %model_ref.source_path.display(), error = %e, "failed to read model payload");
                return None;
            }
        };
        match decode_model_data(&payload) {
            Ok(Some(scene)) => Some(scene),
            Ok(None) => None,
            Err(e) => {
                warn!(source = %model_ref.source_path.display(), error = %e, "failed to decode model data");
                None
            }
        }
    }

    /// Assembles one tile: for each model reference (heaviest first),
    /// decodes its first (highest-LOD) GLB and instances it at every
    /// placement of that GUID that falls in this tile.
    pub fn assemble(
        &self,
        tile_index: u32,
        model_refs: &[ModelReference],
        placements: &PlacementsByGuid,
        abort: &AbortFlags,
    ) -> AssembleOutcome {
        let (center_lat, center_lon, center_alt) = tile_center(tile_index, placements);
        let origin = TileOrigin { lat: center_lat, lon: center_lon, alt: center_alt };

        let mut gltf = self.emit_gltf.then(GltfTileBuilder::new);
        let mut ac3d = self.emit_ac3d.then(AcTileBuilder::new);

        let mut sorted_refs: Vec<&ModelReference> = model_refs.iter().collect();
        sorted_refs.sort_by(|a, b| b.byte_size.cmp(&a.byte_size));

        for model_ref in sorted_refs {
            if abort.cancel.load(Ordering::SeqCst) {
                return AssembleOutcome::Cancelled;
            }
            if abort.save.load(Ordering::SeqCst) {
                debug!(tile_index, "AbortAndSave observed; stopping model loop early");
                break;
            }

            let Some(scene) = self.decode_model(model_ref) else { continue };
            let Some(guid_placements) = placements.get(&model_ref.guid) else { continue };

            for placement in guid_placements {
                let Ok(placement_tile) = placement.tile_index() else { continue };
                if placement_tile.value() != tile_index {
                    continue;
                }

                let gltf_transform = placement_transform(placement, origin);
                let name = scene.model_name.clone().unwrap_or_else(|| guid_hex(&model_ref.guid));

                for (mesh, local_transform) in &scene.meshes {
                    let world = gltf_transform * *local_transform;
                    if !world.is_finite() {
                        warn!(guid = %name, "skipping instance with non-finite transform");
                        continue;
                    }
                    let resolved_mesh = self.resolve_textures(mesh, &model_ref.source_path);

                    if let Some(builder) = gltf.as_mut() {
                        builder.add_instance(&resolved_mesh, world);
                    }
                    if let Some(builder) = ac3d.as_mut() {
                        builder.add_instance(&name, &resolved_mesh, ac3d_transform(world));
                    }
                }
            }
        }

        AssembleOutcome::Completed(TileOutputs {
            tile_index,
            center_lat,
            center_lon,
            center_alt,
            gltf,
            ac3d,
        })
    }
}
