//! The `<lonBucket10><latBucket10>/<lonBucket1><latBucket1>` directory
//! naming scheme shared by the glTF emitter's output tree and the
//! default terrain provider's wire paths.

/// Returns the two nested bucket directory names for `(lat, lon)`: the
/// 10-degree cell, then the 1-degree cell, each formatted as
/// `{eOrW}{lonPadded}{nOrS}{latPadded}`.
#[must_use]
pub fn tile_buckets(lat: f64, lon: f64) -> [String; 2] {
    let e_or_w = if lon >= 0.0 { 'e' } else { 'w' };
    let n_or_s = if lat >= 0.0 { 'n' } else { 's' };
    let lon_abs = lon.abs();
    let lat_abs = lat.abs();

    let lon_10 = (lon_abs / 10.0).floor() * 10.0;
    let lat_10 = (lat_abs / 10.0).floor() * 10.0;

    [
        format!("{e_or_w}{:03}{n_or_s}{:02}", lon_10 as i64, lat_10 as i64),
        format!(
            "{e_or_w}{:03}{n_or_s}{:02}",
            lon_abs.floor() as i64,
            lat_abs.floor() as i64
        ),
    ]
}

/// Joins the two bucket components into a single relative path, e.g.
/// `e000n00/e000n00`.
#[must_use]
pub fn tile_bucket_path(lat: f64, lon: f64) -> String {
    let [dir10, dir1] = tile_buckets(lat, lon);
    format!("{dir10}/{dir1}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_buckets() {
        let buckets = tile_buckets(0.0, 0.0);
        assert_eq!(buckets, ["e000n00", "e000n00"]);
    }

    #[test]
    fn southern_western_hemisphere() {
        let buckets = tile_buckets(-33.9, -151.2);
        assert_eq!(buckets, ["w150s30", "w151s33"]);
    }
}
