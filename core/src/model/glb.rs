//! `GlbDecoder`: parses a standalone GLB (binary glTF) blob into its
//! JSON document and binary chunk.
//!
//! Header: magic `b"glTF"`, `version:u32`, `totalLength:u32` (12
//! bytes). Each following chunk is `chunkLength:u32, chunkType:u32,
//! data[chunkLength]`. `chunkType` `0x4E4F_534A` (`"JSON"`) is the
//! document; `0x0042_494E` (`"BIN\0"`) is the binary buffer. Any stray
//! non-printable bytes inside the JSON chunk (seen in some exported
//! GLBs trailing their closing brace) are rewritten to spaces before
//! parsing rather than treated as a hard error.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const CHUNK_TYPE_JSON: u32 = 0x4E4F_534A;
const CHUNK_TYPE_BIN: u32 = 0x0042_494E;

/// A decoded GLB: the parsed JSON document plus its binary buffer.
#[derive(Debug)]
pub struct GlbBlob {
    pub json: GltfDocument,
    pub bin: Vec<u8>,
}

fn sanitize_json(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' { b } else { b' ' })
        .collect()
}

/// Decodes a GLB blob.
///
/// # Errors
/// Returns [`Error::MalformedHeader`] on a bad magic, or
/// [`Error::TruncatedRecord`] if a declared chunk runs past the end of
/// `bytes`.
pub fn decode(bytes: &[u8]) -> Result<GlbBlob> {
    if bytes.len() < 12 || &bytes[0..4] != GLB_MAGIC {
        return Err(Error::MalformedHeader("missing glTF magic".into()));
    }
    let total_length = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    if total_length > bytes.len() {
        return Err(Error::TruncatedRecord(format!(
            "GLB declares length {total_length} but buffer is {} bytes",
            bytes.len()
        )));
    }

    let mut offset = 12;
    let mut json: Option<GltfDocument> = None;
    let mut bin = Vec::new();

    while offset + 8 <= total_length {
        let chunk_length = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
        let chunk_type = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().unwrap());
        let data_start = offset + 8;
        let data_end = data_start.saturating_add(chunk_length);
        if data_end > total_length {
            return Err(Error::TruncatedRecord(format!(
                "GLB chunk at {offset:#x} overruns declared length"
            )));
        }
        let data = &bytes[data_start..data_end];

        match chunk_type {
            CHUNK_TYPE_JSON => {
                let sanitized = sanitize_json(data);
                json = Some(serde_json::from_slice(&sanitized)?);
            }
            CHUNK_TYPE_BIN => bin = data.to_vec(),
            _ => {}
        }

        offset = data_end;
    }

    let json = json.ok_or_else(|| Error::MalformedHeader("GLB missing JSON chunk".into()))?;
    Ok(GlbBlob { json, bin })
}

// --- Minimal glTF 2.0 document model: just enough to read back what the
// scenery importer needs (nodes, meshes, materials, accessors, buffer
// views). Field names mirror the glTF 2.0 JSON schema.

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GltfAsset {
    pub version: String,
}

impl Default for GltfAsset {
    fn default() -> Self {
        Self { version: "2.0".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfDocument {
    #[serde(default)]
    pub asset: GltfAsset,
    #[serde(rename = "extensionsUsed", default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default)]
    pub scene: Option<usize>,
    #[serde(default)]
    pub scenes: Vec<GltfScene>,
    #[serde(default)]
    pub nodes: Vec<GltfNode>,
    #[serde(default)]
    pub meshes: Vec<GltfMesh>,
    #[serde(default)]
    pub materials: Vec<GltfMaterial>,
    #[serde(default)]
    pub accessors: Vec<GltfAccessor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<GltfBuffer>,
    #[serde(rename = "bufferViews", default)]
    pub buffer_views: Vec<GltfBufferView>,
    #[serde(default)]
    pub images: Vec<GltfImage>,
    #[serde(default)]
    pub textures: Vec<GltfTexture>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfScene {
    #[serde(default)]
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfNode {
    #[serde(default)]
    pub children: Vec<usize>,
    #[serde(default)]
    pub mesh: Option<usize>,
    #[serde(default)]
    pub matrix: Option<[f32; 16]>,
    #[serde(default)]
    pub translation: Option<[f32; 3]>,
    #[serde(default)]
    pub rotation: Option<[f32; 4]>,
    #[serde(default)]
    pub scale: Option<[f32; 3]>,
    #[serde(default)]
    pub extras: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfMesh {
    #[serde(default)]
    pub primitives: Vec<GltfPrimitive>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfPrimitive {
    #[serde(default)]
    pub attributes: std::collections::HashMap<String, usize>,
    #[serde(default)]
    pub indices: Option<usize>,
    #[serde(default)]
    pub material: Option<usize>,
    #[serde(default)]
    pub extras: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfMaterial {
    #[serde(rename = "pbrMetallicRoughness", default)]
    pub pbr_metallic_roughness: Option<GltfPbr>,
    #[serde(rename = "normalTexture", default)]
    pub normal_texture: Option<GltfTextureRef>,
    #[serde(rename = "occlusionTexture", default)]
    pub occlusion_texture: Option<GltfTextureRef>,
    #[serde(rename = "emissiveTexture", default)]
    pub emissive_texture: Option<GltfTextureRef>,
    #[serde(rename = "emissiveFactor", default)]
    pub emissive_factor: Option<[f32; 3]>,
    #[serde(rename = "doubleSided", default)]
    pub double_sided: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfPbr {
    #[serde(rename = "baseColorFactor", default)]
    pub base_color_factor: Option<[f32; 4]>,
    #[serde(rename = "baseColorTexture", default)]
    pub base_color_texture: Option<GltfTextureRef>,
    #[serde(rename = "metallicRoughnessTexture", default)]
    pub metallic_roughness_texture: Option<GltfTextureRef>,
    #[serde(rename = "metallicFactor", default)]
    pub metallic_factor: Option<f32>,
    #[serde(rename = "roughnessFactor", default)]
    pub roughness_factor: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfTextureRef {
    pub index: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfTexture {
    #[serde(default)]
    pub source: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

/// Builds the `extensions.MSFT_texture_dds.source` value FlightGear
/// expects mirrored alongside a texture's plain `source`.
#[must_use]
pub fn msft_texture_dds_extension(image_index: usize) -> serde_json::Value {
    serde_json::json!({ "MSFT_texture_dds": { "source": image_index } })
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfImage {
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfAccessor {
    #[serde(rename = "bufferView", default)]
    pub buffer_view: Option<usize>,
    #[serde(rename = "byteOffset", default)]
    pub byte_offset: usize,
    #[serde(rename = "componentType")]
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub accessor_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfBuffer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GltfBufferView {
    #[serde(default)]
    pub buffer: usize,
    #[serde(rename = "byteOffset", default)]
    pub byte_offset: usize,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
    #[serde(rename = "byteStride", default)]
    pub byte_stride: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json_bytes = json.as_bytes().to_vec();
        while json_bytes.len() % 4 != 0 {
            json_bytes.push(b' ');
        }
        let mut bin_bytes = bin.to_vec();
        while bin_bytes.len() % 4 != 0 {
            bin_bytes.push(0);
        }

        let total = 12 + 8 + json_bytes.len() + 8 + bin_bytes.len();
        let mut out = Vec::new();
        out.extend_from_slice(GLB_MAGIC);
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());

        out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_TYPE_JSON.to_le_bytes());
        out.extend_from_slice(&json_bytes);

        out.extend_from_slice(&(bin_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_TYPE_BIN.to_le_bytes());
        out.extend_from_slice(&bin_bytes);

        out
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(decode(&[0u8; 20]).is_err());
    }

    #[test]
    fn decodes_minimal_document_and_bin_chunk() {
        let glb = build_glb(r#"{"meshes":[{"primitives":[]}]}"#, &[1, 2, 3, 4]);
        let blob = decode(&glb).unwrap();
        assert_eq!(blob.json.meshes.len(), 1);
        assert_eq!(blob.bin, vec![1, 2, 3, 4]);
    }

    #[test]
    fn rejects_truncated_chunk() {
        let mut glb = build_glb(r#"{}"#, &[]);
        let len = glb.len() as u32;
        glb[8..12].copy_from_slice(&(len + 100).to_le_bytes());
        assert!(decode(&glb).is_err());
    }
}
