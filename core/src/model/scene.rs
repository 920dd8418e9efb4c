//! The API-neutral intermediate scene graph that sits between the glTF
//! importer and the tile-level glTF/AC3D emitters.

use glam::Mat4;

/// A PBR metallic-roughness material, reduced to the fields both
/// emitters can consume.
#[derive(Debug, Clone)]
pub struct MaterialRef {
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    pub base_color_texture: Option<String>,
    pub metallic_roughness_texture: Option<String>,
    pub normal_texture: Option<String>,
    pub occlusion_texture: Option<String>,
    pub emissive_texture: Option<String>,
    pub double_sided: bool,
}

impl Default for MaterialRef {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0, 0.0, 0.0],
            base_color_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            double_sided: false,
        }
    }
}

/// One mesh's geometry and material, in the importer's local node space
/// (already multiplied by the node's world transform, see
/// [`NeutralScene`]).
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 4]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub material: MaterialRef,
}

impl MeshBuilder {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// `(name, minSize)` parsed from a GXML `<LOD>` element.
#[derive(Debug, Clone)]
pub struct LodDescriptor {
    pub name: String,
    pub min_size: f32,
}

/// A sequence of `(MeshBuilder, worldTransform)` pairs imported from one
/// GLB. Dropped once instanced into the current tile's builders.
#[derive(Debug, Clone, Default)]
pub struct NeutralScene {
    pub meshes: Vec<(MeshBuilder, Mat4)>,
    /// Model name parsed from the sibling `GXML` chunk's `ModelInfo`,
    /// if present (`.gltf` suffix stripped, spaces replaced with `_`).
    pub model_name: Option<String>,
    /// LOD list parsed from the same `GXML` chunk, in document order.
    pub lods: Vec<LodDescriptor>,
}
