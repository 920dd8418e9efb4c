//! `AirportDecoder`: decodes an Airport subrecord payload (BGL record
//! type `0x0003`) into an [`Airport`] aggregate.
//!
//! Fixed header layout (absolute byte offsets into the subrecord
//! payload): `0x00 size:u32, 0x04 runwayCt:u8, comCt:u8, startCt:u8,
//! appCt:u8, legacyApronCt:u8, helipadCt:u8, 0x0A lonRaw:u32, 0x0E
//! latRaw:u32, 0x12 altMilli:i32, 0x16 towerLatRaw:u32, 0x1A
//! towerLonRaw:u32, 0x1E towerAltMilli:i32, 0x22 magvar:f32, 0x26
//! icao:u32, 0x2A region:u32, 0x37 departureCt:u8, 0x39 arrivalCt:u8,
//! 0x3C apronCt:u16, paintedLineCt:u16, paintedPolygonCt:u16,
//! paintedHatchedCt:u16`. The body record sequence starts at `0x44`:
//! each entry is `id:u16, recordSize:u32, payload[recordSize]`.

use tracing::warn;

use crate::bgl::placement;
use crate::bgl::types::{
    Airport, Apron, Helipad, Jetway, Runway, TaxiwayParking, TaxiwayPath, TaxiwayPoint,
};
use crate::error::{Error, Result};
use crate::terrain::TerrainService;

const BODY_START: usize = 0x44;
const BODY_HEADER_LEN: usize = 6;

const REC_NAME: u16 = 0x0019;
const REC_RUNWAY: u16 = 0x00CE;
const REC_START: u16 = 0x0011;
const REC_TAXIWAY_POINT: u16 = 0x001A;
const REC_TAXIWAY_PARKING: u16 = 0x00E7;
const REC_TAXIWAY_PATH: u16 = 0x00D4;
const REC_TAXI_NAME: u16 = 0x001D;
const REC_APRON: u16 = 0x00D3;
const REC_TAXIWAY_SIGN: u16 = 0x00D9;
const REC_PAINTED_LINE: u16 = 0x00CF;
const REC_PAINTED_HATCHED_AREA: u16 = 0x00D8;
const REC_JETWAY: u16 = 0x00DE;
const REC_LIGHT_SUPPORT: u16 = 0x0057;
const REC_APPROACH: u16 = 0x0024;
const REC_APRON_EDGE_LIGHTS: u16 = 0x0031;
const REC_HELIPAD: u16 = 0x0026;
const REC_PROJECTED_MESH: u16 = 0x00E8;

fn base38_unpack(mut value: u32) -> String {
    let mut chars = Vec::new();
    while value > 0 {
        let digit = value % 38;
        value /= 38;
        let c = match digit {
            0 => ' ',
            2..=11 => (b'0' + (digit - 2) as u8) as char,
            12..=37 => (b'A' + (digit - 12) as u8) as char,
            _ => '?',
        };
        chars.push(c);
    }
    chars.iter().rev().collect::<String>().trim().to_string()
}

fn angle_lon(raw: u32) -> f64 {
    f64::from(raw) * 360.0 / 805_306_368.0 - 180.0
}
fn angle_lat(raw: u32) -> f64 {
    90.0 - f64::from(raw) * 180.0 / 536_870_912.0
}

/// Decodes an Airport subrecord payload.
///
/// # Errors
/// Returns [`Error::TruncatedRecord`] if the payload is shorter than the
/// fixed header.
pub fn decode(bytes: &[u8], terrain: &dyn TerrainService) -> Result<Airport> {
    if bytes.len() < BODY_START {
        return Err(Error::TruncatedRecord(format!(
            "airport header shorter than {BODY_START} bytes: got {}",
            bytes.len()
        )));
    }

    let lon_raw = u32::from_le_bytes(bytes[0x0A..0x0E].try_into().unwrap());
    let lat_raw = u32::from_le_bytes(bytes[0x0E..0x12].try_into().unwrap());
    let alt_milli = i32::from_le_bytes(bytes[0x12..0x16].try_into().unwrap());
    let magvar = f32::from_le_bytes(bytes[0x22..0x26].try_into().unwrap());
    let icao_raw = u32::from_le_bytes(bytes[0x26..0x2A].try_into().unwrap());
    let region_raw = u32::from_le_bytes(bytes[0x2A..0x2E].try_into().unwrap());

    let mut airport = Airport {
        icao: base38_unpack(icao_raw),
        region: base38_unpack(region_raw),
        latitude: angle_lat(lat_raw),
        longitude: angle_lon(lon_raw),
        altitude: f64::from(alt_milli) / 1000.0,
        magvar,
        ..Airport::default()
    };

    let mut offset = BODY_START;
    while offset + BODY_HEADER_LEN <= bytes.len() {
        let id = u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap());
        let record_size =
            u32::from_le_bytes(bytes[offset + 2..offset + 6].try_into().unwrap()) as usize;
        let payload_start = offset + BODY_HEADER_LEN;
        let payload_end = payload_start.saturating_add(record_size);

        if payload_end > bytes.len() {
            warn!(id = format!("{id:#06x}"), record_size, "truncated airport body record; stopping");
            break;
        }
        let payload = &bytes[payload_start..payload_end];
        decode_body_record(id, payload, &mut airport, terrain);

        if record_size == 0 {
            warn!(id = format!("{id:#06x}"), "zero-length airport body record; stopping to avoid a loop");
            break;
        }
        offset = payload_end;
    }

    Ok(airport)
}

fn decode_body_record(
    id: u16,
    payload: &[u8],
    airport: &mut Airport,
    terrain: &dyn TerrainService,
) {
    match id {
        REC_NAME => {}
        REC_RUNWAY => {
            if payload.len() >= 12 {
                airport.runways.push(Runway {
                    heading: f32::from_le_bytes(payload[0..4].try_into().unwrap()),
                    length: f32::from_le_bytes(payload[4..8].try_into().unwrap()),
                    width: f32::from_le_bytes(payload[8..12].try_into().unwrap()),
                    surface: payload.get(12..16).map_or(0, |b| {
                        u32::from_le_bytes(b.try_into().unwrap())
                    }),
                    vasis: Vec::new(),
                });
            }
        }
        REC_START => {}
        REC_TAXIWAY_POINT => {
            if payload.len() >= 10 {
                let lon_raw = u32::from_le_bytes(payload[0..4].try_into().unwrap());
                let lat_raw = u32::from_le_bytes(payload[4..8].try_into().unwrap());
                let point_type = u16::from_le_bytes(payload[8..10].try_into().unwrap());
                airport.taxiway_points.push(TaxiwayPoint {
                    latitude: angle_lat(lat_raw),
                    longitude: angle_lon(lon_raw),
                    point_type,
                });
            }
        }
        REC_TAXIWAY_PARKING => {
            if payload.len() >= 16 {
                let lon_raw = u32::from_le_bytes(payload[0..4].try_into().unwrap());
                let lat_raw = u32::from_le_bytes(payload[4..8].try_into().unwrap());
                let radius = f32::from_le_bytes(payload[8..12].try_into().unwrap());
                let heading = f32::from_le_bytes(payload[12..16].try_into().unwrap());
                airport.taxiway_parkings.push(TaxiwayParking {
                    latitude: angle_lat(lat_raw),
                    longitude: angle_lon(lon_raw),
                    radius,
                    heading,
                });
            }
        }
        REC_TAXIWAY_PATH => {
            if payload.len() >= 12 {
                airport.taxiway_paths.push(TaxiwayPath {
                    start: u32::from_le_bytes(payload[0..4].try_into().unwrap()),
                    end: u32::from_le_bytes(payload[4..8].try_into().unwrap()),
                    path_type: 0,
                    width: f32::from_le_bytes(payload[8..12].try_into().unwrap()),
                });
            }
        }
        REC_TAXI_NAME | REC_TAXIWAY_SIGN | REC_PAINTED_LINE | REC_PAINTED_HATCHED_AREA => {}
        REC_APRON => {
            if payload.len() >= 8 {
                airport.aprons.push(Apron {
                    vertex_count: u32::from_le_bytes(payload[0..4].try_into().unwrap()),
                    surface: u32::from_le_bytes(payload[4..8].try_into().unwrap()),
                });
            }
        }
        REC_JETWAY => {
            if payload.len() >= 10 {
                let lon_raw = u32::from_le_bytes(payload[0..4].try_into().unwrap());
                let lat_raw = u32::from_le_bytes(payload[4..8].try_into().unwrap());
                let heading = f32::from_le_bytes(
                    payload.get(8..12).unwrap_or(&[0, 0, 0, 0]).try_into().unwrap(),
                );
                airport.jetways.push(Jetway {
                    latitude: angle_lat(lat_raw),
                    longitude: angle_lon(lon_raw),
                    heading,
                });
            }
            // A jetway embeds up to two SceneryObject-shaped placement
            // entries after its fixed fields; route them through the
            // normal placement decoder so they land in the same
            // aggregates as top-level placements.
            if payload.len() > 16 {
                let (lib, sim) = placement::decode_all(&payload[16..], terrain);
                airport.library_placements.extend(lib);
                airport.sim_object_placements.extend(sim);
            }
        }
        REC_LIGHT_SUPPORT | REC_APRON_EDGE_LIGHTS => {}
        REC_APPROACH => {
            airport.approaches.push(crate::bgl::types::Approach {
                raw_len: payload.len(),
            });
        }
        REC_HELIPAD => {
            if payload.len() >= 12 {
                let lon_raw = u32::from_le_bytes(payload[0..4].try_into().unwrap());
                let lat_raw = u32::from_le_bytes(payload[4..8].try_into().unwrap());
                let radius = f32::from_le_bytes(payload[8..12].try_into().unwrap());
                airport.helipads.push(Helipad {
                    latitude: angle_lat(lat_raw),
                    longitude: angle_lon(lon_raw),
                    radius,
                });
            }
        }
        REC_PROJECTED_MESH => {
            let (lib, sim) = placement::decode_all(payload, terrain);
            airport.library_placements.extend(lib);
            airport.sim_object_placements.extend(sim);
        }
        _ => {
            warn!(id = format!("{id:#06x}"), "unknown airport body record id; skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::StubTerrainService;

    fn minimal_airport_header() -> Vec<u8> {
        let mut bytes = vec![0u8; BODY_START];
        bytes[0x0A..0x0E].copy_from_slice(&402_653_184u32.to_le_bytes());
        bytes[0x0E..0x12].copy_from_slice(&268_435_456u32.to_le_bytes());
        bytes
    }

    #[test]
    fn decodes_header_fields() {
        let bytes = minimal_airport_header();
        let terrain = StubTerrainService::default();
        let airport = decode(&bytes, &terrain).unwrap();
        assert!(airport.longitude.abs() < 1e-6);
        assert!(airport.latitude.abs() < 1e-6);
        assert!(airport.runways.is_empty());
    }

    #[test]
    fn decodes_a_runway_record() {
        let mut bytes = minimal_airport_header();
        bytes.extend_from_slice(&REC_RUNWAY.to_le_bytes());
        let mut payload = Vec::new();
        payload.extend_from_slice(&90.0f32.to_le_bytes());
        payload.extend_from_slice(&3000.0f32.to_le_bytes());
        payload.extend_from_slice(&45.0f32.to_le_bytes());
        payload.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&payload);

        let terrain = StubTerrainService::default();
        let airport = decode(&bytes, &terrain).unwrap();
        assert_eq!(airport.runways.len(), 1);
        assert_eq!(airport.runways[0].length, 3000.0);
    }

    #[test]
    fn rejects_short_header() {
        let terrain = StubTerrainService::default();
        assert!(decode(&[0u8; 4], &terrain).is_err());
    }
}
