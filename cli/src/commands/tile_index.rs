//! `tile-index`: converts between a (lat, lon) pair and a packed
//! FlightGear tile index, for diagnosing placement bucketing.

use scenery_core::geo::tile_index::{get_lat_lon_of_tile, get_tile_index};

pub fn execute_from_lat_lon(lat: f64, lon: f64) -> anyhow::Result<()> {
    let tile = get_tile_index(lat, lon)?;
    let (tile_lat, tile_lon) = get_lat_lon_of_tile(tile)?;
    println!("tile index: {}", tile.value());
    println!("tile origin: lat={tile_lat}, lon={tile_lon}");
    Ok(())
}

pub fn execute_from_index(index: u32) -> anyhow::Result<()> {
    let tile = scenery_core::geo::TileIndex(index);
    let (lat, lon) = get_lat_lon_of_tile(tile)?;
    println!("tile {index} origin: lat={lat}, lon={lon}");
    Ok(())
}
