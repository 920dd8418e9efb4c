//! Geographic math: FlightGear's packed tile index and WGS-84 conversions.

pub mod bucket;
pub mod ecef;
pub mod tile_index;

pub use tile_index::TileIndex;
