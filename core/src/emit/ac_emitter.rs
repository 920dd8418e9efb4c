//! `AcEmitter`: accumulates instanced meshes into an AC3D v11 tile
//! model and serializes it to ASCII text.
//!
//! Coordinates are baked per instance (each mesh instance's vertices
//! are transformed to tile-local world space before being pooled), so
//! unlike the glTF side there is no scene graph at write time — only a
//! flat list of `OBJECT poly` children under one `OBJECT world`.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use glam::Mat4;
use tracing::warn;

use crate::error::Result;
use crate::model::{MaterialRef, MeshBuilder};

const SURF_SHADED: u32 = 0x10;
const SURF_DOUBLE_SIDED: u32 = 0x20;

#[derive(Debug, Clone)]
pub struct AcMaterial {
    pub diffuse: [f32; 3],
    pub ambient: [f32; 3],
    pub emissive: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: u32,
    pub transparency: f32,
}

impl AcMaterial {
    fn default_white() -> Self {
        Self {
            diffuse: [1.0, 1.0, 1.0],
            ambient: [0.2, 0.2, 0.2],
            emissive: [0.0, 0.0, 0.0],
            specular: [0.04, 0.04, 0.04],
            shininess: 0,
            transparency: 0.0,
        }
    }

    fn from_pbr(mat: &MaterialRef) -> Self {
        let diffuse = [
            mat.base_color_factor[0].clamp(0.0, 1.0),
            mat.base_color_factor[1].clamp(0.0, 1.0),
            mat.base_color_factor[2].clamp(0.0, 1.0),
        ];
        let ambient = diffuse.map(|c| c * 0.2);
        let specular_scalar = 0.04 + mat.metallic_factor * 0.5;
        let shininess = ((1.0 - mat.roughness_factor) * 128.0).round().clamp(0.0, 128.0) as u32;
        let transparency = 1.0 - mat.base_color_factor[3];

        Self {
            diffuse,
            ambient,
            emissive: mat.emissive_factor,
            specular: [specular_scalar; 3],
            shininess,
            transparency,
        }
    }

    /// Canonical dedup key: every numeric component formatted to 3
    /// decimals, concatenated.
    fn canonical_key(&self) -> String {
        let mut key = String::new();
        for c in self.diffuse.iter().chain(&self.ambient).chain(&self.emissive).chain(&self.specular) {
            let _ = write!(key, "{c:.3}|");
        }
        let _ = write!(key, "{}|{:.3}", self.shininess, self.transparency);
        key
    }
}

#[derive(Debug, Clone)]
pub struct AcSurface {
    pub indices: [u32; 3],
    pub uvs: [[f32; 2]; 3],
}

#[derive(Debug, Clone)]
pub struct AcObject {
    pub name: String,
    pub vertices: Vec<[f32; 3]>,
    pub surfaces: Vec<AcSurface>,
    pub material_index: usize,
    pub texture: Option<String>,
    pub double_sided: bool,
}

fn quantize(v: [f32; 3]) -> (i64, i64, i64) {
    (
        (v[0] * 10_000.0).round() as i64,
        (v[1] * 10_000.0).round() as i64,
        (v[2] * 10_000.0).round() as i64,
    )
}

/// Accumulates one tile's worth of AC3D geometry and materials.
pub struct AcTileBuilder {
    pub materials: Vec<AcMaterial>,
    pub objects: Vec<AcObject>,
    material_keys: HashMap<String, usize>,
    texture_copies: Vec<(PathBuf, String)>,
    used_dest_names: HashMap<String, usize>,
}

impl Default for AcTileBuilder {
    fn default() -> Self {
        let mut material_keys = HashMap::new();
        let default_white = AcMaterial::default_white();
        material_keys.insert(default_white.canonical_key(), 0);
        Self {
            materials: vec![default_white],
            objects: Vec::new(),
            material_keys,
            texture_copies: Vec::new(),
            used_dest_names: HashMap::new(),
        }
    }
}

impl AcTileBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn intern_material(&mut self, mat: &MaterialRef) -> usize {
        let candidate = AcMaterial::from_pbr(mat);
        let key = candidate.canonical_key();
        if let Some(&index) = self.material_keys.get(&key) {
            return index;
        }
        let index = self.materials.len();
        self.materials.push(candidate);
        self.material_keys.insert(key, index);
        index
    }

    /// Registers `source` as a texture file to copy, returning a
    /// disambiguated destination filename unique within this tile.
    fn register_texture(&mut self, source: &str) -> String {
        let path = PathBuf::from(source);
        let stem = path.file_stem().map_or_else(|| "texture".to_string(), |s| s.to_string_lossy().into_owned());
        let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

        let base_name = ext.as_ref().map_or_else(|| stem.clone(), |e| format!("{stem}.{e}"));
        let count = self.used_dest_names.entry(base_name.clone()).or_insert(0);
        let dest_name = if *count == 0 {
            base_name.clone()
        } else {
            ext.as_ref().map_or_else(
                || format!("{stem}_{count}"),
                |e| format!("{stem}_{count}.{e}"),
            )
        };
        *count += 1;

        self.texture_copies.push((path, dest_name.clone()));
        dest_name
    }

    /// Instances `mesh` at `transform` as one `OBJECT poly`. `name` is
    /// sanitized of double quotes.
    pub fn add_instance(&mut self, name: &str, mesh: &MeshBuilder, transform: Mat4) {
        if mesh.indices.len() < 3 {
            return;
        }

        let material_index = self.intern_material(&mesh.material);
        let texture = mesh.material.base_color_texture.as_deref().map(|t| self.register_texture(t));

        let mut vertices = Vec::new();
        let mut seen: HashMap<(i64, i64, i64), u32> = HashMap::new();
        let mut surfaces = Vec::with_capacity(mesh.indices.len() / 3);

        let mut pool_index = |pos: [f32; 3]| -> u32 {
            let world = transform.transform_point3(glam::Vec3::from(pos));
            let flipped = [-world.x, world.y, world.z];
            let key = quantize(flipped);
            *seen.entry(key).or_insert_with(|| {
                let idx = vertices.len() as u32;
                vertices.push(flipped);
                idx
            })
        };

        for tri in mesh.indices.chunks_exact(3) {
            let mut idx = [0u32; 3];
            let mut uvs = [[0.0f32; 2]; 3];
            for (corner, &vertex_index) in tri.iter().enumerate() {
                let pos = mesh.positions[vertex_index as usize];
                idx[corner] = pool_index(pos);
                let uv = mesh.uvs.get(vertex_index as usize).copied().unwrap_or([0.0, 0.0]);
                uvs[corner] = [uv[0], 1.0 - uv[1]];
            }
            surfaces.push(AcSurface { indices: idx, uvs });
        }

        self.objects.push(AcObject {
            name: name.replace('"', ""),
            vertices,
            surfaces,
            material_index,
            texture,
            double_sided: mesh.material.double_sided,
        });
    }

    #[must_use]
    pub fn texture_copies(&self) -> &[(PathBuf, String)] {
        &self.texture_copies
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Writes this tile's `.ac` text and copies its referenced textures
    /// into `dir`. Texture destinations are created at most once; a
    /// copy failure is logged and skipped, not fatal to the tile.
    ///
    /// # Errors
    /// Propagates I/O errors creating `dir` or writing the `.ac` file
    /// itself.
    pub fn write_to_file(&self, dir: &Path, world_name: &str, file_name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let ac_path = dir.join(file_name);
        std::fs::write(&ac_path, self.emit_text(world_name))?;

        for (src, dest_name) in self.texture_copies() {
            let dest = dir.join(dest_name);
            if dest.exists() {
                continue;
            }
            if let Err(e) = std::fs::copy(src, &dest) {
                warn!(src = %src.display(), dest = %dest.display(), error = %e, "failed to copy texture");
            }
        }

        Ok(ac_path)
    }

    /// Serializes the accumulated tile to AC3D v11 ASCII text.
    #[must_use]
    pub fn emit_text(&self, world_name: &str) -> String {
        let mut out = String::new();
        out.push_str("AC3Db\n");

        for mat in &self.materials {
            let _ = writeln!(
                out,
                "MATERIAL \"\" rgb {:.3} {:.3} {:.3}  amb {:.3} {:.3} {:.3}  emis {:.3} {:.3} {:.3}  spec {:.3} {:.3} {:.3}  shi {}  trans {:.3}",
                mat.diffuse[0], mat.diffuse[1], mat.diffuse[2],
                mat.ambient[0], mat.ambient[1], mat.ambient[2],
                mat.emissive[0], mat.emissive[1], mat.emissive[2],
                mat.specular[0], mat.specular[1], mat.specular[2],
                mat.shininess, mat.transparency,
            );
        }

        let _ = writeln!(out, "OBJECT world");
        let _ = writeln!(out, "name \"{world_name}\"");
        let _ = writeln!(out, "kids {}", self.objects.len());

        for object in &self.objects {
            let _ = writeln!(out, "OBJECT poly");
            let _ = writeln!(out, "name \"{}\"", object.name);
            let _ = writeln!(out, "crease 30.0");
            if let Some(texture) = &object.texture {
                let _ = writeln!(out, "texture \"{texture}\"");
            }
            let _ = writeln!(out, "numvert {}", object.vertices.len());
            for v in &object.vertices {
                let _ = writeln!(out, "{:.6} {:.6} {:.6}", v[0], v[1], v[2]);
            }
            let _ = writeln!(out, "numsurf {}", object.surfaces.len());
            let surf_flags = SURF_SHADED | if object.double_sided { SURF_DOUBLE_SIDED } else { 0 };
            for surf in &object.surfaces {
                let _ = writeln!(out, "SURF {surf_flags:#x}");
                let _ = writeln!(out, "mat {}", object.material_index);
                let _ = writeln!(out, "refs 3");
                for (i, &idx) in surf.indices.iter().enumerate() {
                    let uv = surf.uvs[i];
                    let _ = writeln!(out, "{idx} {:.6} {:.6}", uv[0], uv[1]);
                }
            }
            let _ = writeln!(out, "kids 0");
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scene::MaterialRef;

    fn triangle_mesh(material: MaterialRef) -> MeshBuilder {
        MeshBuilder {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: Vec::new(),
            tangents: Vec::new(),
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            indices: vec![0, 1, 2],
            material,
        }
    }

    #[test]
    fn default_white_is_index_zero() {
        let builder = AcTileBuilder::new();
        assert_eq!(builder.materials.len(), 1);
        assert_eq!(builder.materials[0].diffuse, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn vertex_pool_dedups_shared_corners_within_quantization() {
        let mut builder = AcTileBuilder::new();
        let mesh = triangle_mesh(MaterialRef::default());
        builder.add_instance("a", &mesh, Mat4::IDENTITY);
        builder.add_instance("b", &mesh, Mat4::IDENTITY);
        assert_eq!(builder.objects.len(), 2);
        assert_eq!(builder.objects[0].vertices.len(), 3);
        assert_eq!(builder.objects[1].vertices.len(), 3);
    }

    #[test]
    fn x_axis_is_negated_on_emission() {
        let mut builder = AcTileBuilder::new();
        let mesh = triangle_mesh(MaterialRef::default());
        builder.add_instance("a", &mesh, Mat4::IDENTITY);
        assert_eq!(builder.objects[0].vertices[1][0], -1.0);
    }

    #[test]
    fn emits_ac3d_header_and_material_block() {
        let mut builder = AcTileBuilder::new();
        let mesh = triangle_mesh(MaterialRef::default());
        builder.add_instance("poly0", &mesh, Mat4::IDENTITY);
        let text = builder.emit_text("tile");
        assert!(text.starts_with("AC3Db\n"));
        assert!(text.contains("OBJECT world"));
        assert!(text.contains("OBJECT poly"));
        assert!(text.contains("kids 1"));
    }

    #[test]
    fn surf_flags_omit_double_sided_bit_by_default() {
        let mut builder = AcTileBuilder::new();
        let mesh = triangle_mesh(MaterialRef::default());
        builder.add_instance("poly0", &mesh, Mat4::IDENTITY);
        let text = builder.emit_text("tile");
        assert!(text.contains("SURF 0x10"));
        assert!(!text.contains("SURF 0x30"));
    }

    #[test]
    fn surf_flags_include_double_sided_bit_when_material_requests_it() {
        let mut builder = AcTileBuilder::new();
        let mesh = triangle_mesh(MaterialRef { double_sided: true, ..MaterialRef::default() });
        builder.add_instance("poly0", &mesh, Mat4::IDENTITY);
        let text = builder.emit_text("tile");
        assert!(text.contains("SURF 0x30"));
    }

    #[test]
    fn writes_ac_file_and_copies_textures_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let texture_src = dir.path().join("src_tex.png");
        std::fs::write(&texture_src, b"fake-png-bytes").unwrap();

        let mut builder = AcTileBuilder::new();
        let mut mesh = triangle_mesh(MaterialRef::default());
        mesh.material.base_color_texture = Some(texture_src.to_string_lossy().into_owned());
        builder.add_instance("poly0", &mesh, Mat4::IDENTITY);

        let out_dir = dir.path().join("out");
        let ac_path = builder.write_to_file(&out_dir, "tile", "2949120.ac").unwrap();
        assert!(ac_path.exists());
        assert!(out_dir.join("src_tex.png").exists());
    }
}
