//! `RiffWalker`: scans a `ModelData` subrecord payload (a RIFF
//! container) for `GXML` and `GLBD` chunks.
//!
//! RIFF layout: 4-byte magic `"RIFF"`, `u32` total size, 4-byte form
//! type, then a sequence of 4-byte-aligned chunks, each `tag[4],
//! size:u32, data[size]` with one pad byte when `size` is odd. A
//! `GLBD` chunk's payload is itself a sequence of `"GLB\0"`-tagged
//! blobs; only the first (highest-detail) blob is kept, matching the
//! importer's single-LOD-per-placement behavior.

use std::io::Read;

use tracing::warn;

use crate::error::{Error, Result};

const RIFF_MAGIC: &[u8; 4] = b"RIFF";
const TAG_GXML: &[u8; 4] = b"GXML";
const TAG_GLBD: &[u8; 4] = b"GLBD";
const GLB_BLOB_TAG: &[u8; 4] = b"GLB\0";

/// The chunks of interest pulled out of one `ModelData` RIFF container.
#[derive(Debug, Default)]
pub struct RiffContents {
    /// Raw XML text of the `GXML` chunk (LOD descriptor list), if present.
    pub gxml: Option<String>,
    /// The first embedded GLB blob found in the `GLBD` chunk, if present.
    pub glb: Option<Vec<u8>>,
}

fn read_chunk_header(bytes: &[u8], offset: usize) -> Option<([u8; 4], usize, usize)> {
    if offset + 8 > bytes.len() {
        return None;
    }
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&bytes[offset..offset + 4]);
    let size = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().unwrap()) as usize;
    let data_start = offset + 8;
    Some((tag, size, data_start))
}

/// Scans `bytes` for the first `GLB\0`-tagged blob inside a `GLBD`
/// chunk's payload.
fn first_glb_blob(payload: &[u8]) -> Option<Vec<u8>> {
    let mut offset = 0;
    while let Some((tag, size, data_start)) = read_chunk_header(payload, offset) {
        let data_end = data_start.saturating_add(size);
        if data_end > payload.len() {
            warn!("truncated GLBD sub-chunk; stopping scan");
            break;
        }
        if &tag == GLB_BLOB_TAG {
            return Some(payload[data_start..data_end].to_vec());
        }
        offset = data_end + (size % 2);
    }
    None
}

/// Walks a RIFF container, returning the `GXML` and first `GLBD` blob
/// it contains.
///
/// # Errors
/// Returns [`Error::MalformedHeader`] if the buffer does not begin with
/// the `RIFF` magic.
pub fn walk(bytes: &[u8]) -> Result<RiffContents> {
    if bytes.len() < 12 || &bytes[0..4] != RIFF_MAGIC {
        return Err(Error::MalformedHeader("missing RIFF magic".into()));
    }

    let mut contents = RiffContents::default();
    let mut offset = 12; // past magic, size, form type
    while let Some((tag, size, data_start)) = read_chunk_header(bytes, offset) {
        let data_end = data_start.saturating_add(size);
        if data_end > bytes.len() {
            warn!("truncated RIFF chunk; stopping scan");
            break;
        }
        let data = &bytes[data_start..data_end];

        if &tag == TAG_GXML {
            let mut text = String::new();
            let mut cursor = data;
            if cursor.read_to_string(&mut text).is_ok() {
                contents.gxml = Some(text);
            } else {
                contents.gxml = Some(String::from_utf8_lossy(data).into_owned());
            }
        } else if &tag == TAG_GLBD {
            if contents.glb.is_none() {
                contents.glb = first_glb_blob(data);
            }
        }

        offset = data_end + (size % 2);
    }

    Ok(contents)
}
