//! `BgWalker`: validates a BGL header and iterates its top-level record
//! table, yielding the raw subrecord byte slices for record types the
//! pipeline understands.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};

const HEADER_MAGIC_A: [u8; 4] = [0x01, 0x02, 0x92, 0x19];
const HEADER_MAGIC_B: [u8; 4] = [0x03, 0x18, 0x05, 0x08];
const RECORD_TABLE_OFFSET: u64 = 0x38;
const RECORD_TABLE_ENTRY_SIZE: usize = 16;
const SUBRECORD_ENTRY_SIZE: usize = 16;

pub const RECORD_TYPE_AIRPORT: u32 = 0x0003;
pub const RECORD_TYPE_SCENERY_OBJECT: u32 = 0x0025;
pub const RECORD_TYPE_MODEL_DATA: u32 = 0x002B;

#[derive(Debug, Clone, Copy)]
struct RecordTableEntry {
    rec_type: u32,
    subrecord_count: u32,
    subrecord_section_offset: u32,
    record_size: u32,
}

/// One row of a BGL's top-level record table: type code, subrecord
/// count, and declared byte size. Exposed for the `inspect-bgl` CLI
/// command; unlike [`BgWalker::subrecords`] this does not filter by
/// record type or read any payload bytes.
#[derive(Debug, Clone, Copy)]
pub struct RecordTableSummary {
    pub record_type: u32,
    pub subrecord_count: u32,
    pub record_size: u32,
}

/// One decoded subrecord: the owning record's type and its raw payload
/// bytes, already sliced out of the file.
#[derive(Debug, Clone)]
pub struct Subrecord {
    pub record_type: u32,
    pub bytes: Vec<u8>,
}

/// Walks a single BGL file's top-level record table.
pub struct BgWalker<R: Read + Seek> {
    reader: R,
    record_count: u32,
}

impl<R: Read + Seek> BgWalker<R> {
    /// Validates the BGL magic and header, returning a walker positioned
    /// to read the record table.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if either magic mismatches.
    pub fn open(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let mut magic_a = [0u8; 4];
        reader.read_exact(&mut magic_a)?;
        if magic_a != HEADER_MAGIC_A {
            return Err(Error::MalformedHeader(format!(
                "bad leading magic: {magic_a:02x?}"
            )));
        }

        reader.seek(SeekFrom::Start(0x10))?;
        let mut magic_b = [0u8; 4];
        reader.read_exact(&mut magic_b)?;
        if magic_b != HEADER_MAGIC_B {
            return Err(Error::MalformedHeader(format!(
                "bad secondary magic: {magic_b:02x?}"
            )));
        }

        reader.seek(SeekFrom::Start(0x14))?;
        let mut count_bytes = [0u8; 4];
        reader.read_exact(&mut count_bytes)?;
        let record_count = u32::from_le_bytes(count_bytes);

        Ok(Self {
            reader,
            record_count,
        })
    }

    fn read_record_table(&mut self) -> Result<Vec<RecordTableEntry>> {
        self.reader.seek(SeekFrom::Start(RECORD_TABLE_OFFSET))?;
        let mut entries = Vec::with_capacity(self.record_count as usize);
        for _ in 0..self.record_count {
            let mut buf = [0u8; RECORD_TABLE_ENTRY_SIZE];
            if self.reader.read_exact(&mut buf).is_err() {
                tracing::warn!("BGL record table truncated before declared record count");
                break;
            }
            entries.push(RecordTableEntry {
                rec_type: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
                subrecord_count: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
                subrecord_section_offset: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
                record_size: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            });
        }
        Ok(entries)
    }

    /// Iterates every subrecord of a record type the pipeline cares
    /// about (Airport, SceneryObject, ModelData), skipping all others.
    ///
    /// Malformed individual subrecords are logged and skipped rather
    /// than aborting the whole file, per the crate's lossy-tolerance
    /// error policy.
    pub fn subrecords(&mut self) -> Result<Vec<Subrecord>> {
        let table = self.read_record_table()?;
        let mut out = Vec::new();

        for entry in table {
            if !matches!(
                entry.rec_type,
                RECORD_TYPE_AIRPORT | RECORD_TYPE_SCENERY_OBJECT | RECORD_TYPE_MODEL_DATA
            ) {
                continue;
            }

            self.reader
                .seek(SeekFrom::Start(u64::from(entry.subrecord_section_offset)))?;
            let mut sub_table = vec![0u8; entry.subrecord_count as usize * SUBRECORD_ENTRY_SIZE];
            if self.reader.read_exact(&mut sub_table).is_err() {
                tracing::warn!(rec_type = entry.rec_type, "subrecord table truncated");
                continue;
            }

            for i in 0..entry.subrecord_count as usize {
                let base = i * SUBRECORD_ENTRY_SIZE;
                let sub_offset =
                    u32::from_le_bytes(sub_table[base + 8..base + 12].try_into().unwrap());
                let size = u32::from_le_bytes(sub_table[base + 12..base + 16].try_into().unwrap());

                self.reader.seek(SeekFrom::Start(u64::from(sub_offset)))?;
                let mut payload = vec![0u8; size as usize];
                match self.reader.read_exact(&mut payload) {
                    Ok(()) => out.push(Subrecord {
                        record_type: entry.rec_type,
                        bytes: payload,
                    }),
                    Err(_) => {
                        tracing::warn!(
                            rec_type = entry.rec_type,
                            sub_offset,
                            size,
                            "subrecord payload truncated; skipping"
                        );
                    }
                }
            }
        }

        Ok(out)
    }

    /// Like [`Self::subrecords`] but for a single record type, returning
    /// `(fileOffset, size)` pairs without reading the payload bytes.
    /// Used by the model index, which keeps a pointer into the source
    /// file rather than materializing every `ModelData` payload up
    /// front.
    ///
    /// # Errors
    /// Propagates I/O errors from seeking the record/subrecord tables.
    pub fn locate_subrecords(&mut self, record_type: u32) -> Result<Vec<(u64, u32)>> {
        let table = self.read_record_table()?;
        let mut out = Vec::new();

        for entry in table {
            if entry.rec_type != record_type {
                continue;
            }

            self.reader
                .seek(SeekFrom::Start(u64::from(entry.subrecord_section_offset)))?;
            let mut sub_table = vec![0u8; entry.subrecord_count as usize * SUBRECORD_ENTRY_SIZE];
            if self.reader.read_exact(&mut sub_table).is_err() {
                tracing::warn!(rec_type = entry.rec_type, "subrecord table truncated");
                continue;
            }

            for i in 0..entry.subrecord_count as usize {
                let base = i * SUBRECORD_ENTRY_SIZE;
                let sub_offset =
                    u32::from_le_bytes(sub_table[base + 8..base + 12].try_into().unwrap());
                let size = u32::from_le_bytes(sub_table[base + 12..base + 16].try_into().unwrap());
                out.push((u64::from(sub_offset), size));
            }
        }

        Ok(out)
    }

    /// Returns every top-level record table row, unfiltered by type.
    ///
    /// # Errors
    /// Propagates I/O errors seeking or reading the record table.
    pub fn record_table_summary(&mut self) -> Result<Vec<RecordTableSummary>> {
        Ok(self
            .read_record_table()?
            .into_iter()
            .map(|entry| RecordTableSummary {
                record_type: entry.rec_type,
                subrecord_count: entry.subrecord_count,
                record_size: entry.record_size,
            })
            .collect())
    }

    /// Reads `len` bytes at absolute file offset `offset`.
    ///
    /// # Errors
    /// Propagates I/O errors, including a short read past end of file.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}
