//! Types produced by the BGL record walker and its decoders.

use crate::geo::tile_index::{TileIndex, get_tile_index};
use std::collections::HashMap;

pub type Guid = [u8; 16];

/// Flag bits carried by a `SceneryObject` subrecord, unpacked from the
/// raw `flags:uint16` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementFlags {
    pub is_above_agl: bool,
    pub no_autogen_suppression: bool,
    pub no_crash: bool,
    pub no_fog: bool,
    pub no_shadow: bool,
    pub no_z_write: bool,
    pub no_z_test: bool,
}

impl PlacementFlags {
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        Self {
            is_above_agl: raw & 0x0001 != 0,
            no_autogen_suppression: raw & 0x0002 != 0,
            no_crash: raw & 0x0004 != 0,
            no_fog: raw & 0x0008 != 0,
            no_shadow: raw & 0x0010 != 0,
            no_z_write: raw & 0x0020 != 0,
            no_z_test: raw & 0x0040 != 0,
        }
    }
}

/// A library (GUID-identified) object placement, decoded from a
/// SceneryObject subrecord with `id = 0x0B`.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryPlacement {
    pub guid: Guid,
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude in meters; rewritten in place when `flags.is_above_agl`
    /// once a [`crate::terrain::TerrainService`] has resolved the ground
    /// elevation at this point.
    pub altitude: f64,
    pub pitch: f64,
    pub bank: f64,
    pub heading: f64,
    pub scale: f32,
    pub image_complexity: i16,
    pub flags: PlacementFlags,
}

impl LibraryPlacement {
    /// The tile this placement falls into. Computed on demand rather
    /// than cached, since altitude rewrite never moves a placement
    /// across tile boundaries.
    pub fn tile_index(&self) -> crate::Result<TileIndex> {
        get_tile_index(self.latitude, self.longitude)
    }
}

/// A sim-object placement, identified by a `(title, path)` pair instead
/// of a GUID. Decoded from a SceneryObject subrecord with `id = 0x19`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimObjectPlacement {
    pub title: String,
    pub path: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub pitch: f64,
    pub bank: f64,
    pub heading: f64,
    pub scale: f32,
    pub image_complexity: i16,
    pub flags: PlacementFlags,
}

/// `PlacementsByGuid : Mapping<Guid -> Sequence<LibraryPlacement>>`.
///
/// An entry with an empty sequence never exists: placements are only
/// ever appended, never inserted as empty stand-ins.
pub type PlacementsByGuid = HashMap<Guid, Vec<LibraryPlacement>>;

/// A runway end, nested inside a Runway record.
#[derive(Debug, Clone, Default)]
#[allow(dead_code)]
pub struct RunwayVasi {
    pub kind: u16,
    pub bias_x: f32,
    pub spacing: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Runway {
    pub heading: f32,
    pub length: f32,
    pub width: f32,
    pub surface: u32,
    #[allow(dead_code)]
    pub vasis: Vec<RunwayVasi>,
}

#[derive(Debug, Clone, Default)]
pub struct TaxiwayPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub point_type: u16,
}

#[derive(Debug, Clone, Default)]
pub struct TaxiwayParking {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f32,
    pub heading: f32,
}

#[derive(Debug, Clone, Default)]
pub struct TaxiwayPath {
    pub start: u32,
    pub end: u32,
    pub path_type: u16,
    pub width: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Apron {
    pub vertex_count: u32,
    pub surface: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Jetway {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f32,
}

/// Approach record body is intentionally left undecoded (see the
/// project's open questions); its raw byte length is retained so a
/// caller can see one was present.
#[derive(Debug, Clone, Default)]
#[allow(dead_code)]
pub struct Approach {
    pub raw_len: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Helipad {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f32,
}

/// Aggregate of an Airport record's decoded subrecords. The core
/// pipeline only consumes the embedded `LibraryPlacement`/
/// `SimObjectPlacement` instances (from Jetway and ProjectedMesh
/// records); the rest is retained for callers inspecting the airport
/// directly.
#[derive(Debug, Clone, Default)]
pub struct Airport {
    pub icao: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub magvar: f32,
    pub runways: Vec<Runway>,
    pub taxiway_points: Vec<TaxiwayPoint>,
    pub taxiway_parkings: Vec<TaxiwayParking>,
    pub taxiway_paths: Vec<TaxiwayPath>,
    pub aprons: Vec<Apron>,
    pub jetways: Vec<Jetway>,
    pub approaches: Vec<Approach>,
    pub helipads: Vec<Helipad>,
    pub library_placements: Vec<LibraryPlacement>,
    pub sim_object_placements: Vec<SimObjectPlacement>,
}
