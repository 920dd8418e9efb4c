//! `GltfEmitter`: accumulates instanced meshes into a composite glTF
//! 2.0 document, writing satellite `.bin` and texture files alongside
//! the `.gltf` JSON.
//!
//! Like the AC3D side, each mesh instance's vertices are baked to
//! tile-local world space at accumulation time rather than kept as a
//! shared mesh referenced by multiple transformed nodes — this keeps
//! both emitters structurally symmetric and avoids decomposing
//! non-uniform-scale matrices back into TRS for a node transform.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::Mat4;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::glb::{
    msft_texture_dds_extension, GltfAccessor, GltfBuffer, GltfBufferView, GltfDocument,
    GltfImage, GltfMaterial, GltfMesh, GltfNode, GltfPbr, GltfPrimitive, GltfScene, GltfTexture,
    GltfTextureRef,
};
use crate::model::{MaterialRef, MeshBuilder};

const COMPONENT_TYPE_U32: u32 = 5125;
const COMPONENT_TYPE_F32: u32 = 5126;
const MSFT_TEXTURE_DDS: &str = "MSFT_texture_dds";

fn align4(buffer: &mut Vec<u8>) {
    while buffer.len() % 4 != 0 {
        buffer.push(0);
    }
}

/// Accumulates one tile's worth of glTF geometry, materials and images.
pub struct GltfTileBuilder {
    buffer: Vec<u8>,
    buffer_views: Vec<GltfBufferView>,
    accessors: Vec<GltfAccessor>,
    nodes: Vec<GltfNode>,
    meshes: Vec<GltfMesh>,
    materials: Vec<GltfMaterial>,
    material_keys: HashMap<String, usize>,
    images: Vec<GltfImage>,
    image_by_path: HashMap<String, usize>,
    textures: Vec<GltfTexture>,
    texture_copies: Vec<(PathBuf, String)>,
}

impl Default for GltfTileBuilder {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            buffer_views: Vec::new(),
            accessors: Vec::new(),
            nodes: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            material_keys: HashMap::new(),
            images: Vec::new(),
            image_by_path: HashMap::new(),
            textures: Vec::new(),
            texture_copies: Vec::new(),
        }
    }
}

impl GltfTileBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_accessor_f32(&mut self, data: &[[f32; 3]]) -> usize {
        align4(&mut self.buffer);
        let byte_offset = self.buffer.len();
        for v in data {
            self.buffer.extend(v.iter().flat_map(|c| c.to_le_bytes()));
        }

        let view_index = self.buffer_views.len();
        self.buffer_views.push(GltfBufferView {
            buffer: 0,
            byte_offset,
            byte_length: self.buffer.len() - byte_offset,
            byte_stride: None,
        });

        let accessor_index = self.accessors.len();
        self.accessors.push(GltfAccessor {
            buffer_view: Some(view_index),
            byte_offset: 0,
            component_type: COMPONENT_TYPE_F32,
            count: data.len(),
            accessor_type: "VEC3".to_string(),
        });
        accessor_index
    }

    fn push_accessor_vec2(&mut self, data: &[[f32; 2]]) -> usize {
        align4(&mut self.buffer);
        let byte_offset = self.buffer.len();
        for v in data {
            self.buffer.extend(v.iter().flat_map(|c| c.to_le_bytes()));
        }
        let view_index = self.buffer_views.len();
        self.buffer_views.push(GltfBufferView {
            buffer: 0,
            byte_offset,
            byte_length: self.buffer.len() - byte_offset,
            byte_stride: None,
        });
        let accessor_index = self.accessors.len();
        self.accessors.push(GltfAccessor {
            buffer_view: Some(view_index),
            byte_offset: 0,
            component_type: COMPONENT_TYPE_F32,
            count: data.len(),
            accessor_type: "VEC2".to_string(),
        });
        accessor_index
    }

    fn push_accessor_indices(&mut self, data: &[u32]) -> usize {
        align4(&mut self.buffer);
        let byte_offset = self.buffer.len();
        self.buffer.extend(data.iter().flat_map(|i| i.to_le_bytes()));
        let view_index = self.buffer_views.len();
        self.buffer_views.push(GltfBufferView {
            buffer: 0,
            byte_offset,
            byte_length: self.buffer.len() - byte_offset,
            byte_stride: None,
        });
        let accessor_index = self.accessors.len();
        self.accessors.push(GltfAccessor {
            buffer_view: Some(view_index),
            byte_offset: 0,
            component_type: COMPONENT_TYPE_U32,
            count: data.len(),
            accessor_type: "SCALAR".to_string(),
        });
        accessor_index
    }

    /// Interns `path` into the deduplicated-by-source-path image array,
    /// returning its index.
    fn intern_image(&mut self, path: &str) -> usize {
        if let Some(&idx) = self.image_by_path.get(path) {
            return idx;
        }
        let file_name = PathBuf::from(path)
            .file_name()
            .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned());
        let idx = self.images.len();
        self.images.push(GltfImage { uri: Some(file_name.clone()) });
        self.image_by_path.insert(path.to_string(), idx);
        self.texture_copies.push((PathBuf::from(path), file_name));
        idx
    }

    /// Interns a texture referencing `path`'s image, mirroring
    /// `extensions.MSFT_texture_dds.source` onto the same image index
    /// alongside the plain `source`.
    fn intern_texture(&mut self, path: &str) -> usize {
        let image_index = self.intern_image(path);
        let texture_index = self.textures.len();
        self.textures.push(GltfTexture {
            source: Some(image_index),
            extensions: Some(msft_texture_dds_extension(image_index)),
        });
        texture_index
    }

    fn intern_material(&mut self, mat: &MaterialRef) -> usize {
        let key = material_key(mat);
        if let Some(&idx) = self.material_keys.get(&key) {
            return idx;
        }

        let base_color_texture = mat
            .base_color_texture
            .as_deref()
            .map(|p| GltfTextureRef { index: self.intern_texture(p) });
        let metallic_roughness_texture = mat
            .metallic_roughness_texture
            .as_deref()
            .map(|p| GltfTextureRef { index: self.intern_texture(p) });

        let material = GltfMaterial {
            pbr_metallic_roughness: Some(GltfPbr {
                base_color_factor: Some(mat.base_color_factor),
                base_color_texture,
                metallic_roughness_texture,
                metallic_factor: Some(mat.metallic_factor),
                roughness_factor: Some(mat.roughness_factor),
            }),
            normal_texture: mat.normal_texture.as_deref().map(|p| GltfTextureRef { index: self.intern_texture(p) }),
            occlusion_texture: mat.occlusion_texture.as_deref().map(|p| GltfTextureRef { index: self.intern_texture(p) }),
            emissive_texture: mat.emissive_texture.as_deref().map(|p| GltfTextureRef { index: self.intern_texture(p) }),
            emissive_factor: Some(mat.emissive_factor),
            double_sided: mat.double_sided,
        };

        let idx = self.materials.len();
        self.materials.push(material);
        self.material_keys.insert(key, idx);
        idx
    }

    /// Instances `mesh` at `transform` as one new node + mesh pair.
    /// A transform with any non-finite component is
    /// [`Error::TransformInvalid`] territory upstream; this builder
    /// assumes the caller already filtered those out and only guards
    /// against degenerate (empty) geometry here.
    pub fn add_instance(&mut self, mesh: &MeshBuilder, transform: Mat4) {
        if mesh.positions.is_empty() || mesh.indices.len() < 3 {
            return;
        }

        let world_positions: Vec<[f32; 3]> = mesh
            .positions
            .iter()
            .map(|p| transform.transform_point3(glam::Vec3::from(*p)).into())
            .collect();

        let normal_matrix = transform.inverse().transpose();
        let world_normals: Vec<[f32; 3]> = mesh
            .normals
            .iter()
            .map(|n| normal_matrix.transform_vector3(glam::Vec3::from(*n)).normalize_or_zero().into())
            .collect();

        let position_accessor = self.push_accessor_f32(&world_positions);
        let normal_accessor = if world_normals.len() == world_positions.len() && !world_normals.is_empty() {
            Some(self.push_accessor_f32(&world_normals))
        } else {
            None
        };
        let uv_accessor = if mesh.uvs.len() == mesh.positions.len() && !mesh.uvs.is_empty() {
            Some(self.push_accessor_vec2(&mesh.uvs))
        } else {
            None
        };
        let index_accessor = self.push_accessor_indices(&mesh.indices);
        let material_index = self.intern_material(&mesh.material);

        let mut attributes = HashMap::new();
        attributes.insert("POSITION".to_string(), position_accessor);
        if let Some(n) = normal_accessor {
            attributes.insert("NORMAL".to_string(), n);
        }
        if let Some(uv) = uv_accessor {
            attributes.insert("TEXCOORD_0".to_string(), uv);
        }

        let mesh_index = self.meshes.len();
        self.meshes.push(GltfMesh {
            primitives: vec![GltfPrimitive {
                attributes,
                indices: Some(index_accessor),
                material: Some(material_index),
                extras: None,
            }],
        });

        self.nodes.push(GltfNode {
            mesh: Some(mesh_index),
            ..Default::default()
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn texture_copies(&self) -> &[(PathBuf, String)] {
        &self.texture_copies
    }

    /// Builds the final document and binary buffer. Every texture
    /// carries a mirrored `extensions.MSFT_texture_dds.source`
    /// alongside its plain `source`, attached at intern time.
    #[must_use]
    pub fn build(mut self, buffer_uri: &str) -> (GltfDocument, Vec<u8>) {
        let extensions_used = if self.textures.is_empty() {
            Vec::new()
        } else {
            vec![MSFT_TEXTURE_DDS.to_string()]
        };

        let doc = GltfDocument {
            extensions_used,
            scene: Some(0),
            scenes: vec![GltfScene { nodes: (0..self.nodes.len()).collect() }],
            nodes: std::mem::take(&mut self.nodes),
            meshes: std::mem::take(&mut self.meshes),
            materials: std::mem::take(&mut self.materials),
            accessors: std::mem::take(&mut self.accessors),
            buffers: vec![GltfBuffer {
                uri: Some(buffer_uri.to_string()),
                byte_length: self.buffer.len(),
            }],
            buffer_views: std::mem::take(&mut self.buffer_views),
            images: std::mem::take(&mut self.images),
            textures: std::mem::take(&mut self.textures),
            ..Default::default()
        };
        (doc, self.buffer)
    }

    /// Writes this tile's composite `.gltf` + `.bin` + copied textures
    /// under `output_root`, at the bucket path for `(lat, lon)`.
    /// Texture copy failures are logged and skipped
    /// ([`Error::IoCopyFailure`] tolerance), never fatal to the tile.
    ///
    /// # Errors
    /// Propagates I/O errors creating directories or writing the
    /// `.gltf`/`.bin` files themselves, and JSON serialization errors.
    pub fn write_to_file(self, output_root: &Path, tile_index: u32, lat: f64, lon: f64) -> Result<PathBuf> {
        let gltf_path = output_path(output_root, tile_index, lat, lon);
        let dir = gltf_path
            .parent()
            .ok_or_else(|| Error::Config("glTF output path has no parent directory".into()))?;
        std::fs::create_dir_all(dir)?;

        let bin_name = format!("{tile_index}.bin");
        let texture_copies = self.texture_copies().to_vec();
        let (doc, bin) = self.build(&bin_name);

        std::fs::write(dir.join(&bin_name), &bin)?;
        let json = serde_json::to_string_pretty(&doc)?;
        std::fs::write(&gltf_path, json)?;

        for (src, dest_name) in texture_copies {
            let dest = dir.join(&dest_name);
            if dest.exists() {
                continue;
            }
            if let Err(e) = std::fs::copy(&src, &dest) {
                warn!(src = %src.display(), dest = %dest.display(), error = %e, "failed to copy texture");
            }
        }

        Ok(gltf_path)
    }
}

fn material_key(mat: &MaterialRef) -> String {
    format!(
        "{:.3},{:.3},{:.3},{:.3}|{:.3}|{:.3}|{:.3},{:.3},{:.3}|{:?}|{:?}|{}",
        mat.base_color_factor[0], mat.base_color_factor[1], mat.base_color_factor[2], mat.base_color_factor[3],
        mat.metallic_factor, mat.roughness_factor,
        mat.emissive_factor[0], mat.emissive_factor[1], mat.emissive_factor[2],
        mat.base_color_texture, mat.normal_texture, mat.double_sided,
    )
}

/// Builds the `<lonBucket10><latBucket10>/<lonBucket1><latBucket1>/<tileIndex>.gltf`
/// output path for `tile_index` at `(lat, lon)`, relative to `output_root`.
#[must_use]
pub fn output_path(output_root: &std::path::Path, tile_index: u32, lat: f64, lon: f64) -> PathBuf {
    let bucket_path = crate::geo::bucket::tile_bucket_path(lat, lon);
    output_root
        .join("Objects")
        .join(bucket_path)
        .join(format!("{tile_index}.gltf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scene::MaterialRef as Mat;

    fn triangle_mesh() -> MeshBuilder {
        MeshBuilder {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
            tangents: Vec::new(),
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            indices: vec![0, 1, 2],
            material: Mat::default(),
        }
    }

    #[test]
    fn accumulates_one_node_and_mesh_per_instance() {
        let mut builder = GltfTileBuilder::new();
        let mesh = triangle_mesh();
        builder.add_instance(&mesh, Mat4::IDENTITY);
        builder.add_instance(&mesh, Mat4::from_translation(glam::Vec3::X));

        let (doc, bin) = builder.build("tile.bin");
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.meshes.len(), 2);
        assert_eq!(doc.buffers.len(), 1);
        assert!(!bin.is_empty());
    }

    #[test]
    fn output_path_matches_bucket_naming() {
        let path = output_path(std::path::Path::new("/out"), 2_954_880, 0.0, 0.0);
        assert_eq!(path, PathBuf::from("/out/Objects/e000n00/e000n00/2954880.gltf"));
    }

    #[test]
    fn textures_get_msft_dds_extension_and_plain_source() {
        let mut builder = GltfTileBuilder::new();
        let mut mesh = triangle_mesh();
        mesh.material.base_color_texture = Some("foo/bar.dds".to_string());
        builder.add_instance(&mesh, Mat4::IDENTITY);

        let (doc, _bin) = builder.build("tile.bin");
        assert_eq!(doc.extensions_used, vec!["MSFT_texture_dds".to_string()]);
        assert_eq!(doc.textures.len(), 1);
        assert_eq!(doc.textures[0].source, Some(0));
        assert!(doc.textures[0].extensions.is_some());
    }

    #[test]
    fn writes_gltf_bin_and_textures_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let texture_src = dir.path().join("src_tex.dds");
        std::fs::write(&texture_src, b"fake-dds-bytes").unwrap();

        let mut builder = GltfTileBuilder::new();
        let mut mesh = triangle_mesh();
        mesh.material.base_color_texture = Some(texture_src.to_string_lossy().into_owned());
        builder.add_instance(&mesh, Mat4::IDENTITY);

        let out_root = dir.path().join("out");
        let gltf_path = builder.write_to_file(&out_root, 2_949_120, 0.0, 0.0).unwrap();
        assert!(gltf_path.exists());
        assert!(gltf_path.with_file_name("2949120.bin").exists());
        assert!(gltf_path.with_file_name("src_tex.dds").exists());
    }
}
