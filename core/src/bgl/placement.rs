//! `PlacementDecoder`: decodes `SceneryObject` subrecord payloads into
//! [`LibraryPlacement`] and [`SimObjectPlacement`] instances.
//!
//! A single subrecord payload may pack several placement entries back
//! to back; each entry declares its own length, so decoding loops over
//! the payload, resyncing past any entry whose leading id isn't
//! recognized.

use tracing::warn;

use crate::bgl::types::{LibraryPlacement, PlacementFlags, SimObjectPlacement};
use crate::error::{Error, Result};
use crate::terrain::TerrainService;

const ID_LIBRARY_OBJECT: u16 = 0x0B;
const ID_SIM_OBJECT: u16 = 0x19;
const FIXED_HEADER_LEN: usize = 44;

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn decode_common(bytes: &[u8]) -> (f64, f64, f64, PlacementFlags, f64, f64, f64, i16) {
    let longitude_raw = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    let latitude_raw = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    let altitude_milli = i32::from_le_bytes(bytes[12..16].try_into().unwrap());
    let flags_raw = u16::from_le_bytes(bytes[16..18].try_into().unwrap());
    let pitch_raw = u16::from_le_bytes(bytes[18..20].try_into().unwrap());
    let bank_raw = u16::from_le_bytes(bytes[20..22].try_into().unwrap());
    let heading_raw = u16::from_le_bytes(bytes[22..24].try_into().unwrap());
    let image_complexity = i16::from_le_bytes(bytes[24..26].try_into().unwrap());

    let longitude = f64::from(longitude_raw) * 360.0 / 805_306_368.0 - 180.0;
    let latitude = 90.0 - f64::from(latitude_raw) * 180.0 / 536_870_912.0;
    let altitude = f64::from(altitude_milli) / 1000.0;
    let pitch = round3(f64::from(pitch_raw) * 360.0 / 65536.0);
    let bank = round3(f64::from(bank_raw) * 360.0 / 65536.0);
    let heading = round3(f64::from(heading_raw) * 360.0 / 65536.0);

    (
        longitude,
        latitude,
        altitude,
        PlacementFlags::from_raw(flags_raw),
        pitch,
        bank,
        heading,
        image_complexity,
    )
}

fn resolve_altitude(
    raw_altitude: f64,
    flags: PlacementFlags,
    lat: f64,
    lon: f64,
    terrain: &dyn TerrainService,
) -> f64 {
    if flags.is_above_agl {
        match terrain.get_elevation(lat, lon) {
            Ok(elevation) => raw_altitude + elevation,
            Err(e) => {
                warn!(error = %e, "terrain elevation lookup failed; using raw altitude");
                raw_altitude
            }
        }
    } else {
        raw_altitude
    }
}

/// Decodes every placement entry packed into a `SceneryObject`
/// subrecord's payload.
///
/// Unknown leading ids are logged and skipped by their declared length
/// (bounded resync); a declared length that would read past the end of
/// `bytes` truncates decoding of this payload (logged, not fatal).
pub fn decode_all(
    bytes: &[u8],
    terrain: &dyn TerrainService,
) -> (Vec<LibraryPlacement>, Vec<SimObjectPlacement>) {
    let mut library = Vec::new();
    let mut sim_objects = Vec::new();
    let mut cursor = 0usize;

    while cursor + 4 <= bytes.len() {
        let id = u16::from_le_bytes(bytes[cursor..cursor + 2].try_into().unwrap());
        let size = u16::from_le_bytes(bytes[cursor + 2..cursor + 4].try_into().unwrap()) as usize;

        if size == 0 || cursor + size > bytes.len() {
            warn!(cursor, size, len = bytes.len(), "truncated placement entry; stopping");
            break;
        }
        let entry = &bytes[cursor..cursor + size];

        match decode_one(entry, id, terrain) {
            Ok(Some(DecodedPlacement::Library(p))) => library.push(p),
            Ok(Some(DecodedPlacement::SimObject(p))) => sim_objects.push(p),
            Ok(None) => warn!(id = format!("{id:#06x}"), "unknown subrecord id; skipping"),
            Err(e) => warn!(error = %e, id = format!("{id:#06x}"), "failed to decode placement entry"),
        }

        cursor += size;
    }

    (library, sim_objects)
}

enum DecodedPlacement {
    Library(LibraryPlacement),
    SimObject(SimObjectPlacement),
}

fn decode_one(
    entry: &[u8],
    id: u16,
    terrain: &dyn TerrainService,
) -> Result<Option<DecodedPlacement>> {
    if entry.len() < FIXED_HEADER_LEN {
        return Err(Error::TruncatedRecord(format!(
            "placement entry shorter than fixed header: {} bytes",
            entry.len()
        )));
    }
    let (longitude, latitude, raw_altitude, flags, pitch, bank, heading, image_complexity) =
        decode_common(entry);
    let tail = &entry[FIXED_HEADER_LEN..];

    match id {
        ID_LIBRARY_OBJECT => {
            if tail.len() < 20 {
                return Err(Error::TruncatedRecord(
                    "library placement tail shorter than guid+scale".to_string(),
                ));
            }
            let mut guid = [0u8; 16];
            guid.copy_from_slice(&tail[0..16]);
            let scale = f32::from_le_bytes(tail[16..20].try_into().unwrap());
            let altitude = resolve_altitude(raw_altitude, flags, latitude, longitude, terrain);

            Ok(Some(DecodedPlacement::Library(LibraryPlacement {
                guid,
                latitude,
                longitude,
                altitude,
                pitch,
                bank,
                heading,
                scale: round3(f64::from(scale)) as f32,
                image_complexity,
                flags,
            })))
        }
        ID_SIM_OBJECT => {
            if tail.len() < 8 {
                return Err(Error::TruncatedRecord(
                    "sim object tail shorter than scale+lengths".to_string(),
                ));
            }
            let scale = f32::from_le_bytes(tail[0..4].try_into().unwrap());
            let title_len = u16::from_le_bytes(tail[4..6].try_into().unwrap()) as usize;
            let path_len = u16::from_le_bytes(tail[6..8].try_into().unwrap()) as usize;
            let strings_start = 8;
            if tail.len() < strings_start + title_len + path_len {
                return Err(Error::TruncatedRecord(
                    "sim object title/path exceed entry length".to_string(),
                ));
            }
            let title = String::from_utf8_lossy(
                &tail[strings_start..strings_start + title_len],
            )
            .into_owned();
            let path = String::from_utf8_lossy(
                &tail[strings_start + title_len..strings_start + title_len + path_len],
            )
            .into_owned();
            let altitude = resolve_altitude(raw_altitude, flags, latitude, longitude, terrain);

            Ok(Some(DecodedPlacement::SimObject(SimObjectPlacement {
                title,
                path,
                latitude,
                longitude,
                altitude,
                pitch,
                bank,
                heading,
                scale: round3(f64::from(scale)) as f32,
                image_complexity,
                flags,
            })))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::StubTerrainService;

    fn library_entry(guid: [u8; 16], lon_raw: u32, lat_raw: u32, flags: u16) -> Vec<u8> {
        let mut buf = vec![0u8; FIXED_HEADER_LEN + 20];
        let size = buf.len() as u16;
        buf[0..2].copy_from_slice(&ID_LIBRARY_OBJECT.to_le_bytes());
        buf[2..4].copy_from_slice(&size.to_le_bytes());
        buf[4..8].copy_from_slice(&lon_raw.to_le_bytes());
        buf[8..12].copy_from_slice(&lat_raw.to_le_bytes());
        buf[16..18].copy_from_slice(&flags.to_le_bytes());
        buf[FIXED_HEADER_LEN..FIXED_HEADER_LEN + 16].copy_from_slice(&guid);
        buf[FIXED_HEADER_LEN + 16..FIXED_HEADER_LEN + 20].copy_from_slice(&1.0f32.to_le_bytes());
        buf
    }

    #[test]
    fn decodes_library_placement_at_origin() {
        let guid = [1u8; 16];
        let bytes = library_entry(guid, 402_653_184, 268_435_456, 0);
        let terrain = StubTerrainService::default();
        let (library, sim) = decode_all(&bytes, &terrain);
        assert_eq!(sim.len(), 0);
        assert_eq!(library.len(), 1);
        assert!((library[0].longitude).abs() < 1e-6);
        assert!((library[0].latitude).abs() < 1e-6);
        assert_eq!(library[0].guid, guid);
    }

    #[test]
    fn above_agl_rewrites_altitude() {
        let guid = [2u8; 16];
        let bytes = library_entry(guid, 402_653_184, 268_435_456, 0x0001);
        let terrain = StubTerrainService::with_fixed_elevation(100.5);
        let (library, _) = decode_all(&bytes, &terrain);
        assert!((library[0].altitude - 100.5).abs() < 1e-9);
        assert!(library[0].flags.is_above_agl);
    }

    #[test]
    fn skips_unknown_id_by_declared_length() {
        let mut unknown = vec![0u8; FIXED_HEADER_LEN];
        unknown[0..2].copy_from_slice(&0x4242u16.to_le_bytes());
        unknown[2..4].copy_from_slice(&(FIXED_HEADER_LEN as u16).to_le_bytes());

        let guid = [3u8; 16];
        let mut bytes = unknown;
        bytes.extend(library_entry(guid, 402_653_184, 268_435_456, 0));

        let terrain = StubTerrainService::default();
        let (library, _) = decode_all(&bytes, &terrain);
        assert_eq!(library.len(), 1);
        assert_eq!(library[0].guid, guid);
    }
}
