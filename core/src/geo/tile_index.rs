//! FlightGear's packed 32-bit tile index: bidirectional mapping between
//! (lat, lon) and a flat integer keyed by latitude-band-dependent tile width.

use crate::error::{Error, Result};

/// Latitude bands, widest first, each paired with its tile width in
/// degrees of longitude. The last entry is the default band.
const LAT_BANDS: &[(f64, f64)] = &[
    (89.0, 12.0),
    (86.0, 4.0),
    (83.0, 2.0),
    (76.0, 1.0),
    (62.0, 0.5),
    (22.0, 0.25),
];
const DEFAULT_TILE_WIDTH: f64 = 0.125;

/// Degrees of longitude spanned by one tile at the given latitude.
#[must_use]
pub fn tile_width(lat: f64) -> f64 {
    let abs_lat = lat.abs();
    for &(threshold, width) in LAT_BANDS {
        if abs_lat >= threshold {
            return width;
        }
    }
    DEFAULT_TILE_WIDTH
}

/// A packed 32-bit FlightGear tile identifier.
///
/// Layout: bits 0-2 `x` within the tile band, bits 3-5 `y` within the 1
/// degree cell, bits 6-13 `baseY + 90`, bits 14+ `baseX + 180`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex(pub u32);

impl TileIndex {
    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate(lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(Error::OutOfRange { lat, lon });
    }
    Ok(())
}

/// Computes the packed tile index containing `(lat, lon)`.
///
/// # Errors
/// Returns [`Error::OutOfRange`] if the coordinates fall outside valid
/// geodetic bounds.
pub fn get_tile_index(lat: f64, lon: f64) -> Result<TileIndex> {
    validate(lat, lon)?;
    let width = tile_width(lat);
    let base_y = lat.floor();
    let y = ((lat - base_y) * 8.0).floor() as i64;
    let base_x = ((lon / width).floor() * width).floor();
    let x = ((lon - base_x) / width).floor() as i64;

    let base_y_bits = (base_y as i64 + 90) as u32;
    let base_x_bits = (base_x as i64 + 180) as u32;

    let packed = (x as u32 & 0x7) | ((y as u32 & 0x7) << 3) | (base_y_bits << 6) | (base_x_bits << 14);
    Ok(TileIndex(packed))
}

/// Reverses [`get_tile_index`], returning the south-west corner of the
/// tile (its quantized origin, not the queried point).
///
/// # Errors
/// Returns [`Error::OutOfRange`] if the decoded corner falls outside
/// valid geodetic bounds (a malformed index).
pub fn get_lat_lon_of_tile(index: TileIndex) -> Result<(f64, f64)> {
    let packed = index.0;
    let x = packed & 0x7;
    let y = (packed >> 3) & 0x7;
    let base_y_bits = (packed >> 6) & 0xFF;
    let base_x_bits = packed >> 14;

    let base_y = f64::from(base_y_bits) - 90.0;
    let base_x = f64::from(base_x_bits) - 180.0;

    let width = tile_width(base_y);
    let lat = base_y + f64::from(y) / 8.0;
    let lon = base_x + f64::from(x) * width;

    validate(lat, lon)?;
    Ok((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equator_prime_meridian_tile() {
        let idx = get_tile_index(0.0, 0.0).unwrap();
        // baseX=0 -> (0+180)<<14 = 2_949_120; baseY=0 -> (0+90)<<6 = 5_760.
        assert_eq!(idx.value(), 2_949_120 + 5_760);
    }

    #[test]
    fn round_trips_quantized_corner() {
        for &(lat, lon) in &[(0.0, 0.0), (45.3, -122.6), (-33.9, 151.2), (88.5, 10.0)] {
            let idx = get_tile_index(lat, lon).unwrap();
            let (lat2, lon2) = get_lat_lon_of_tile(idx).unwrap();
            assert_eq!(lat.floor(), lat2.floor());
            let width = tile_width(lat);
            let expected_lon = (lon / width).floor() * width;
            assert!((expected_lon - lon2).abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(get_tile_index(91.0, 0.0).is_err());
        assert!(get_tile_index(0.0, 181.0).is_err());
    }

    #[test]
    fn tile_width_bands() {
        assert_eq!(tile_width(89.5), 12.0);
        assert_eq!(tile_width(87.0), 4.0);
        assert_eq!(tile_width(84.0), 2.0);
        assert_eq!(tile_width(77.0), 1.0);
        assert_eq!(tile_width(65.0), 0.5);
        assert_eq!(tile_width(30.0), 0.25);
        assert_eq!(tile_width(10.0), 0.125);
    }
}
