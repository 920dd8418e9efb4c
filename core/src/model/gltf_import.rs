//! `GltfSceneImporter`: flattens a decoded [`GlbBlob`] into a
//! [`NeutralScene`], resolving each node's world transform through its
//! parent chain and reading vertex/index data out of the binary chunk
//! via the accessor/buffer-view bookkeeping.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};
use half::f16;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::glb::{GlbBlob, GltfAccessor, GltfDocument};
use crate::model::scene::{MaterialRef, MeshBuilder, NeutralScene};

const COMPONENT_TYPE_I8: u32 = 5120;
const COMPONENT_TYPE_U8: u32 = 5121;
const COMPONENT_TYPE_U16: u32 = 5123;
const COMPONENT_TYPE_U32: u32 = 5125;
const COMPONENT_TYPE_F32: u32 = 5126;
const COMPONENT_TYPE_HALF_FLOAT: u32 = 5131;

/// Substitutes a non-finite scale component with the average of the
/// axis's finite siblings, falling back to 1.0 if none are finite.
fn sanitize_scale(raw: [f32; 3]) -> Vec3 {
    let finite: Vec<f32> = raw.iter().copied().filter(|v| v.is_finite()).collect();
    let fallback = if finite.is_empty() {
        1.0
    } else {
        finite.iter().sum::<f32>() / finite.len() as f32
    };
    Vec3::from(raw.map(|v| if v.is_finite() { v } else { fallback }))
}

fn node_local_matrix(node: &crate::model::glb::GltfNode) -> Mat4 {
    if let Some(m) = node.matrix {
        return Mat4::from_cols_array(&m);
    }
    let t = node.translation.map_or(Vec3::ZERO, Vec3::from);
    let r = node
        .rotation
        .map_or(Quat::IDENTITY, |q| Quat::from_xyzw(q[0], q[1], q[2], q[3]).normalize());
    let s = node.scale.map_or(Vec3::ONE, sanitize_scale);
    Mat4::from_scale_rotation_translation(s, r, t)
}

fn accessor_byte_size(accessor: &GltfAccessor) -> Result<usize> {
    let component_size = match accessor.component_type {
        COMPONENT_TYPE_I8 | COMPONENT_TYPE_U8 => 1,
        COMPONENT_TYPE_U16 | COMPONENT_TYPE_HALF_FLOAT => 2,
        COMPONENT_TYPE_U32 | COMPONENT_TYPE_F32 => 4,
        other => {
            return Err(Error::CorruptElement(format!(
                "unsupported accessor componentType {other}"
            )))
        }
    };
    let components = match accessor.accessor_type.as_str() {
        "SCALAR" => 1,
        "VEC2" => 2,
        "VEC3" => 3,
        "VEC4" => 4,
        other => return Err(Error::CorruptElement(format!("unsupported accessor type {other}"))),
    };
    Ok(component_size * components)
}

fn read_accessor_f32(doc: &GltfDocument, bin: &[u8], accessor_index: usize, components: usize) -> Result<Vec<f32>> {
    let accessor = doc
        .accessors
        .get(accessor_index)
        .ok_or_else(|| Error::CorruptElement(format!("accessor index {accessor_index} out of range")))?;
    let view_index = accessor
        .buffer_view
        .ok_or_else(|| Error::CorruptElement("accessor missing bufferView".into()))?;
    let view = doc
        .buffer_views
        .get(view_index)
        .ok_or_else(|| Error::CorruptElement(format!("bufferView index {view_index} out of range")))?;

    let element_size = accessor_byte_size(accessor)?;
    let stride = view.byte_stride.unwrap_or(element_size);
    let base = view.byte_offset + accessor.byte_offset;

    let mut out = Vec::with_capacity(accessor.count * components);
    for i in 0..accessor.count {
        let elem_start = base + i * stride;
        for c in 0..components {
            let off = elem_start + c * 4;
            let bytes: [u8; 4] = bin
                .get(off..off + 4)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| Error::TruncatedRecord(format!("accessor read past end of buffer at {off:#x}")))?;
            out.push(f32::from_le_bytes(bytes));
        }
    }
    Ok(out)
}

fn read_accessor_indices(doc: &GltfDocument, bin: &[u8], accessor_index: usize) -> Result<Vec<u32>> {
    let accessor = doc
        .accessors
        .get(accessor_index)
        .ok_or_else(|| Error::CorruptElement(format!("accessor index {accessor_index} out of range")))?;
    let view_index = accessor
        .buffer_view
        .ok_or_else(|| Error::CorruptElement("index accessor missing bufferView".into()))?;
    let view = doc
        .buffer_views
        .get(view_index)
        .ok_or_else(|| Error::CorruptElement(format!("bufferView index {view_index} out of range")))?;

    let element_size = accessor_byte_size(accessor)?;
    let stride = view.byte_stride.unwrap_or(element_size);
    let base = view.byte_offset + accessor.byte_offset;

    let mut out = Vec::with_capacity(accessor.count);
    for i in 0..accessor.count {
        let off = base + i * stride;
        let value = match accessor.component_type {
            COMPONENT_TYPE_U8 => u32::from(
                *bin.get(off)
                    .ok_or_else(|| Error::TruncatedRecord("index accessor read past end of buffer".into()))?,
            ),
            COMPONENT_TYPE_U16 => {
                let bytes: [u8; 2] = bin
                    .get(off..off + 2)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| Error::TruncatedRecord("index accessor read past end of buffer".into()))?;
                u32::from(u16::from_le_bytes(bytes))
            }
            COMPONENT_TYPE_U32 => {
                let bytes: [u8; 4] = bin
                    .get(off..off + 4)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| Error::TruncatedRecord("index accessor read past end of buffer".into()))?;
                u32::from_le_bytes(bytes)
            }
            other => return Err(Error::CorruptElement(format!("unsupported index componentType {other}"))),
        };
        out.push(value);
    }
    Ok(out)
}

/// Reads a `TEXCOORD_0`-style accessor, accepting `f32`, half-float,
/// and normalized `u8`/`u16` encodings (the latter two divided by their
/// type's max value per the glTF normalized-integer convention), and
/// inverting V to match the coordinate convention the rest of the
/// pipeline assumes.
fn read_accessor_texcoord(doc: &GltfDocument, bin: &[u8], accessor_index: usize) -> Result<Vec<[f32; 2]>> {
    let accessor = doc
        .accessors
        .get(accessor_index)
        .ok_or_else(|| Error::CorruptElement(format!("accessor index {accessor_index} out of range")))?;
    let view_index = accessor
        .buffer_view
        .ok_or_else(|| Error::CorruptElement("TEXCOORD_0 accessor missing bufferView".into()))?;
    let view = doc
        .buffer_views
        .get(view_index)
        .ok_or_else(|| Error::CorruptElement(format!("bufferView index {view_index} out of range")))?;

    let element_size = accessor_byte_size(accessor)?;
    let stride = view.byte_stride.unwrap_or(element_size);
    let base = view.byte_offset + accessor.byte_offset;
    let component_size = element_size / 2;

    let mut out = Vec::with_capacity(accessor.count);
    for i in 0..accessor.count {
        let elem_start = base + i * stride;
        let mut uv = [0.0f32; 2];
        for (c, slot) in uv.iter_mut().enumerate() {
            let off = elem_start + c * component_size;
            *slot = match accessor.component_type {
                COMPONENT_TYPE_F32 => {
                    let bytes: [u8; 4] = bin
                        .get(off..off + 4)
                        .and_then(|s| s.try_into().ok())
                        .ok_or_else(|| Error::TruncatedRecord("TEXCOORD_0 read past end of buffer".into()))?;
                    f32::from_le_bytes(bytes)
                }
                COMPONENT_TYPE_HALF_FLOAT => {
                    let bytes: [u8; 2] = bin
                        .get(off..off + 2)
                        .and_then(|s| s.try_into().ok())
                        .ok_or_else(|| Error::TruncatedRecord("TEXCOORD_0 read past end of buffer".into()))?;
                    f16::from_bits(u16::from_le_bytes(bytes)).to_f32()
                }
                COMPONENT_TYPE_U16 => {
                    let bytes: [u8; 2] = bin
                        .get(off..off + 2)
                        .and_then(|s| s.try_into().ok())
                        .ok_or_else(|| Error::TruncatedRecord("TEXCOORD_0 read past end of buffer".into()))?;
                    f32::from(u16::from_le_bytes(bytes)) / f32::from(u16::MAX)
                }
                COMPONENT_TYPE_U8 => {
                    let byte = *bin
                        .get(off)
                        .ok_or_else(|| Error::TruncatedRecord("TEXCOORD_0 read past end of buffer".into()))?;
                    f32::from(byte) / f32::from(u8::MAX)
                }
                other => return Err(Error::CorruptElement(format!("unsupported TEXCOORD_0 componentType {other}"))),
            };
        }
        out.push([uv[0], 1.0 - uv[1]]);
    }
    Ok(out)
}

fn resolve_texture_uri(doc: &GltfDocument, texture_index: usize) -> Option<String> {
    let texture = doc.textures.get(texture_index)?;
    let image = doc.images.get(texture.source?)?;
    image.uri.clone()
}

fn import_material(doc: &GltfDocument, material_index: Option<usize>) -> MaterialRef {
    let Some(mat) = material_index.and_then(|i| doc.materials.get(i)) else {
        return MaterialRef::default();
    };

    let pbr = mat.pbr_metallic_roughness.clone().unwrap_or_default();
    MaterialRef {
        base_color_factor: pbr.base_color_factor.unwrap_or([1.0, 1.0, 1.0, 1.0]),
        metallic_factor: pbr.metallic_factor.unwrap_or(1.0),
        roughness_factor: pbr.roughness_factor.unwrap_or(1.0),
        emissive_factor: mat.emissive_factor.unwrap_or([0.0, 0.0, 0.0]),
        base_color_texture: pbr.base_color_texture.and_then(|t| resolve_texture_uri(doc, t.index)),
        metallic_roughness_texture: pbr
            .metallic_roughness_texture
            .and_then(|t| resolve_texture_uri(doc, t.index)),
        normal_texture: mat.normal_texture.clone().and_then(|t| resolve_texture_uri(doc, t.index)),
        occlusion_texture: mat
            .occlusion_texture
            .clone()
            .and_then(|t| resolve_texture_uri(doc, t.index)),
        emissive_texture: mat.emissive_texture.clone().and_then(|t| resolve_texture_uri(doc, t.index)),
        double_sided: mat.double_sided,
    }
}

fn visit_node(
    doc: &GltfDocument,
    bin: &[u8],
    node_index: usize,
    parent_world: Mat4,
    scene: &mut NeutralScene,
) {
    let Some(node) = doc.nodes.get(node_index) else {
        warn!(node_index, "node index out of range; skipping");
        return;
    };
    let world = parent_world * node_local_matrix(node);

    if let Some(mesh_index) = node.mesh {
        if let Some(mesh) = doc.meshes.get(mesh_index) {
            for prim in &mesh.primitives {
                match import_primitive(doc, bin, prim) {
                    Ok(builder) => scene.meshes.push((builder, world)),
                    Err(e) => warn!(error = %e, mesh_index, "failed to import primitive; skipping"),
                }
            }
        }
    }

    for &child in &node.children {
        visit_node(doc, bin, child, world, scene);
    }
}

fn import_primitive(
    doc: &GltfDocument,
    bin: &[u8],
    prim: &crate::model::glb::GltfPrimitive,
) -> Result<MeshBuilder> {
    let position_accessor = *prim
        .attributes
        .get("POSITION")
        .ok_or_else(|| Error::CorruptElement("primitive missing POSITION attribute".into()))?;
    let positions = read_accessor_f32(doc, bin, position_accessor, 3)?
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect::<Vec<_>>();

    let normals = prim
        .attributes
        .get("NORMAL")
        .map(|&idx| read_accessor_f32(doc, bin, idx, 3))
        .transpose()?
        .map(|v| v.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
        .unwrap_or_default();

    let tangents = prim
        .attributes
        .get("TANGENT")
        .map(|&idx| read_accessor_f32(doc, bin, idx, 4))
        .transpose()?
        .map(|v| v.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect())
        .unwrap_or_default();

    let uvs = prim
        .attributes
        .get("TEXCOORD_0")
        .map(|&idx| read_accessor_texcoord(doc, bin, idx))
        .transpose()?
        .unwrap_or_default();

    let mut indices = match prim.indices {
        Some(idx) => read_accessor_indices(doc, bin, idx)?,
        None => (0..positions.len() as u32).collect(),
    };

    // ASOBO_primitive extras: MSFS scenery GLBs tag collision-only or
    // LOD-culled primitives here; skip geometry that only exists for
    // physics. When the same index/vertex accessors are shared across
    // several draw calls, `StartIndex`/`PrimitiveCount` slice out this
    // primitive's triangles and `BaseVertexIndex` rebiases them back
    // into the shared vertex arrays.
    if let Some(extras) = &prim.extras {
        let asobo = extras.get("ASOBO_primitive");
        if asobo
            .and_then(|v| v.get("collisionOnly"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
        {
            return Ok(MeshBuilder {
                positions: Vec::new(),
                normals: Vec::new(),
                tangents: Vec::new(),
                uvs: Vec::new(),
                indices: Vec::new(),
                material: MaterialRef::default(),
            });
        }

        let start_index = asobo.and_then(|v| v.get("StartIndex")).and_then(serde_json::Value::as_u64);
        let primitive_count = asobo.and_then(|v| v.get("PrimitiveCount")).and_then(serde_json::Value::as_u64);
        if let (Some(start), Some(count)) = (start_index, primitive_count) {
            let start = start as usize;
            let end = start + count as usize * 3;
            if end <= indices.len() {
                indices = indices[start..end].to_vec();
            } else {
                warn!(start, end, len = indices.len(), "ASOBO_primitive index range out of bounds; using full index buffer");
            }
        }

        if let Some(base_vertex) = asobo.and_then(|v| v.get("BaseVertexIndex")).and_then(serde_json::Value::as_u64) {
            let base_vertex = base_vertex as u32;
            for i in &mut indices {
                *i += base_vertex;
            }
        }
    }

    Ok(MeshBuilder {
        positions,
        normals,
        tangents,
        uvs,
        indices,
        material: import_material(doc, prim.material),
    })
}

/// Flattens `blob` into a [`NeutralScene`] of world-space meshes.
#[must_use]
pub fn import_scene(blob: &GlbBlob) -> NeutralScene {
    let mut scene = NeutralScene::default();
    let doc = &blob.json;

    let root_nodes: Vec<usize> = doc
        .scene
        .and_then(|idx| doc.scenes.get(idx))
        .map(|s| s.nodes.clone())
        .unwrap_or_else(|| (0..doc.nodes.len()).collect());

    let mut visited = HashMap::new();
    for &root in &root_nodes {
        visited.entry(root).or_insert(());
        visit_node(doc, &blob.bin, root, Mat4::IDENTITY, &mut scene);
    }

    scene
}
