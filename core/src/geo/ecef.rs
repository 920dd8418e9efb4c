//! WGS-84 geodetic <-> Earth-Centered Earth-Fixed (ECEF) conversions.
//!
//! Used by the terrain sampler to lift a query point into a BTG mesh's
//! local frame and to lift mesh vertices back into geodetic coordinates
//! for lat/lon-interpolated altitude sampling.

/// WGS-84 semi-major axis, meters.
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 first eccentricity squared.
pub const WGS84_E2: f64 = 6.694_379_990_14e-3;

/// Converts geodetic (lat, lon in degrees, altitude in meters) to ECEF
/// `[x, y, z]` meters.
#[must_use]
pub fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, alt_m: f64) -> [f64; 3] {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let sin_lat = lat.sin();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    let x = (n + alt_m) * lat.cos() * lon.cos();
    let y = (n + alt_m) * lat.cos() * lon.sin();
    let z = (n * (1.0 - WGS84_E2) + alt_m) * sin_lat;
    [x, y, z]
}

/// Converts ECEF `[x, y, z]` meters back to geodetic (lat, lon in
/// degrees, altitude in meters) using Bowring's iterative method.
#[must_use]
pub fn ecef_to_geodetic(p: [f64; 3]) -> (f64, f64, f64) {
    let [x, y, z] = p;
    let lon = y.atan2(x);
    let r = (x * x + y * y).sqrt();

    if r < 1e-9 {
        // On the polar axis; altitude is |z| minus the polar radius.
        let polar_radius = WGS84_A * (1.0 - WGS84_E2).sqrt();
        let lat = if z >= 0.0 { 90.0 } else { -90.0 };
        return (lat, lon.to_degrees(), z.abs() - polar_radius);
    }

    let mut lat = (z / r).atan();
    for _ in 0..8 {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let alt = r / lat.cos() - n;
        lat = (z / r * (1.0 - WGS84_E2 * n / (n + alt)).recip()).atan();
    }

    let sin_lat = lat.sin();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    let alt = r / lat.cos() - n;

    (lat.to_degrees(), lon.to_degrees(), alt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_ecef() {
        for &(lat, lon, alt) in &[
            (0.0, 0.0, 0.0),
            (45.0, -122.0, 1200.0),
            (-33.9, 151.2, 50.0),
            (89.0, 10.0, 0.0),
        ] {
            let ecef = geodetic_to_ecef(lat, lon, alt);
            let (lat2, lon2, alt2) = ecef_to_geodetic(ecef);
            assert!((lat - lat2).abs() < 1e-6, "lat {lat} vs {lat2}");
            assert!((lon - lon2).abs() < 1e-6, "lon {lon} vs {lon2}");
            assert!((alt - alt2).abs() < 1e-3, "alt {alt} vs {alt2}");
        }
    }

    #[test]
    fn equator_prime_meridian_is_on_x_axis() {
        let [x, y, z] = geodetic_to_ecef(0.0, 0.0, 0.0);
        assert!((x - WGS84_A).abs() < 1e-6);
        assert!(y.abs() < 1e-9);
        assert!(z.abs() < 1e-9);
    }
}
