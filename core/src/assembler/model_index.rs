//! `ModelIndex`: pass-2 scan building `tileIndex -> [ModelReference]`,
//! skipping any GUID pass 1 never placed.
//!
//! A `ModelReference` is a pointer into its source BGL rather than a
//! copy of the payload bytes, so indexing a large scenery package does
//! not require holding every `ModelData` subrecord in memory at once;
//! the tile assembler re-opens the source file and reads the payload
//! only when it actually needs to import that model.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::bgl::types::{Guid, PlacementsByGuid};
use crate::bgl::walker::{BgWalker, RECORD_TYPE_MODEL_DATA};
use crate::error::Result;

/// A pointer to one `ModelData` subrecord payload: `(guid, source file,
/// byte offset, byte size)`.
#[derive(Debug, Clone)]
pub struct ModelReference {
    pub guid: Guid,
    pub source_path: PathBuf,
    pub byte_offset: u64,
    pub byte_size: u64,
}

impl ModelReference {
    /// Re-opens the source file and reads this reference's payload.
    ///
    /// # Errors
    /// Propagates I/O errors from opening or reading the source file.
    pub fn read_payload(&self) -> Result<Vec<u8>> {
        let file = File::open(&self.source_path)?;
        let mut walker_reader = BufReader::new(file);
        use std::io::{Read, Seek, SeekFrom};
        walker_reader.seek(SeekFrom::Start(self.byte_offset))?;
        let mut buf = vec![0u8; self.byte_size as usize];
        walker_reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// `tileIndex -> [ModelReference]`.
pub type ModelReferencesByTile = HashMap<u32, Vec<ModelReference>>;

/// Scans `bgl_paths` for `ModelData` subrecords whose leading 16-byte
/// GUID appears in `placements`, grouping references by the tile index
/// of each placement sharing that GUID.
///
/// # Errors
/// Propagates I/O errors opening a BGL file; a malformed individual
/// file's header is logged and skipped, not fatal.
pub fn build_model_index(
    bgl_paths: &[PathBuf],
    placements: &PlacementsByGuid,
) -> Result<ModelReferencesByTile> {
    let mut by_tile: ModelReferencesByTile = HashMap::new();
    let mut seen: HashSet<(Guid, u32)> = HashSet::new();

    for path in bgl_paths {
        if let Err(e) = index_one_file(path, placements, &mut by_tile, &mut seen) {
            warn!(file = %path.display(), error = %e, "failed to index model data in this file; skipping");
        }
    }

    Ok(by_tile)
}

fn index_one_file(
    path: &Path,
    placements: &PlacementsByGuid,
    by_tile: &mut ModelReferencesByTile,
    seen: &mut HashSet<(Guid, u32)>,
) -> Result<()> {
    let file = File::open(path)?;
    let mut walker = BgWalker::open(BufReader::new(file))?;
    let locations = walker.locate_subrecords(RECORD_TYPE_MODEL_DATA)?;

    for (offset, size) in locations {
        if size < 16 {
            continue;
        }
        let header = match walker.read_at(offset, 16) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %path.display(), offset, error = %e, "failed to read ModelData guid; skipping");
                continue;
            }
        };
        let guid: Guid = header.try_into().expect("read_at returned exactly 16 bytes");

        let Some(guid_placements) = placements.get(&guid) else {
            continue;
        };

        for placement in guid_placements {
            let tile = match placement.tile_index() {
                Ok(t) => t.value(),
                Err(e) => {
                    warn!(error = %e, "placement tile index out of range; skipping reference");
                    continue;
                }
            };
            if !seen.insert((guid, tile)) {
                continue;
            }
            by_tile.entry(tile).or_default().push(ModelReference {
                guid,
                source_path: path.to_path_buf(),
                byte_offset: offset,
                byte_size: u64::from(size),
            });
        }
    }

    debug!(file = %path.display(), tiles = by_tile.len(), "indexed model data");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgl::types::{LibraryPlacement, PlacementFlags};
    use std::io::Write;

    const RECORD_TABLE_ENTRY_SIZE: usize = 16;
    const SUBRECORD_ENTRY_SIZE: usize = 16;

    fn minimal_bgl_with_model(model_payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 0x38];
        buf[0..4].copy_from_slice(&[0x01, 0x02, 0x92, 0x19]);
        buf[0x10..0x14].copy_from_slice(&[0x03, 0x18, 0x05, 0x08]);
        buf[0x14..0x18].copy_from_slice(&1u32.to_le_bytes());

        let table_start = buf.len();
        let sub_table_start = table_start + RECORD_TABLE_ENTRY_SIZE;
        let payload_start = sub_table_start + SUBRECORD_ENTRY_SIZE;

        buf.extend_from_slice(&RECORD_TYPE_MODEL_DATA.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(sub_table_start as u32).to_le_bytes());
        buf.extend_from_slice(&(model_payload.len() as u32).to_le_bytes());

        buf.extend_from_slice(&[0u8; 8]);
        buf.extend_from_slice(&(payload_start as u32).to_le_bytes());
        buf.extend_from_slice(&(model_payload.len() as u32).to_le_bytes());

        buf.extend_from_slice(model_payload);
        buf
    }

    fn placement_at(guid: Guid, lat: f64, lon: f64) -> LibraryPlacement {
        LibraryPlacement {
            guid,
            latitude: lat,
            longitude: lon,
            altitude: 0.0,
            pitch: 0.0,
            bank: 0.0,
            heading: 0.0,
            scale: 1.0,
            image_complexity: 0,
            flags: PlacementFlags::default(),
        }
    }

    #[test]
    fn indexes_a_placed_guid_and_skips_unused_ones() {
        let placed_guid: Guid = [1u8; 16];
        let unused_guid: Guid = [2u8; 16];

        let mut payload = placed_guid.to_vec();
        payload.extend_from_slice(b"rest-of-riff-container");
        let bgl_bytes = minimal_bgl_with_model(&payload);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenery.bgl");
        File::create(&path).unwrap().write_all(&bgl_bytes).unwrap();

        let mut placements = PlacementsByGuid::new();
        placements.insert(placed_guid, vec![placement_at(placed_guid, 0.0, 0.0)]);
        placements.insert(unused_guid, vec![placement_at(unused_guid, 10.0, 10.0)]);

        let index = build_model_index(&[path.clone()], &placements).unwrap();
        let all_refs: Vec<&ModelReference> = index.values().flatten().collect();
        assert_eq!(all_refs.len(), 1);
        assert_eq!(all_refs[0].guid, placed_guid);
        assert_eq!(all_refs[0].source_path, path);

        let read_back = all_refs[0].read_payload().unwrap();
        assert_eq!(read_back, payload);
    }

    #[test]
    fn dedupes_references_for_the_same_guid_and_tile() {
        let guid: Guid = [3u8; 16];
        let mut payload = guid.to_vec();
        payload.extend_from_slice(b"riff-bytes");
        let bgl_bytes = minimal_bgl_with_model(&payload);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenery.bgl");
        File::create(&path).unwrap().write_all(&bgl_bytes).unwrap();

        let mut placements = PlacementsByGuid::new();
        placements.insert(
            guid,
            vec![placement_at(guid, 0.0, 0.0), placement_at(guid, 0.01, 0.01)],
        );

        let index = build_model_index(&[path], &placements).unwrap();
        let all_refs: Vec<&ModelReference> = index.values().flatten().collect();
        assert_eq!(all_refs.len(), 1, "same guid+tile must only be referenced once");
    }
}
