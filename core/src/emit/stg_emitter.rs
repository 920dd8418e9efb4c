//! `StgEmitter`: the one-line `OBJECT_STATIC` placement record that
//! registers a tile's model artifact at its geographic center.

/// Which artifact a tile ultimately produced, driving both the `.stg`
/// filename reference and its placement angle triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StgModelFormat {
    GltfOnly,
    Ac3dOnly,
    DualXml,
}

impl StgModelFormat {
    #[must_use]
    pub fn from_flags(emit_gltf: bool, emit_ac3d: bool) -> Self {
        match (emit_gltf, emit_ac3d) {
            (true, true) => Self::DualXml,
            (true, false) => Self::GltfOnly,
            _ => Self::Ac3dOnly,
        }
    }

    fn angles(self) -> (f64, f64, f64) {
        match self {
            Self::GltfOnly => (270.0, 0.0, 90.0),
            Self::Ac3dOnly => (90.0, 0.0, 0.0),
            Self::DualXml => (0.0, 0.0, 90.0),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::GltfOnly => "gltf",
            Self::Ac3dOnly => "ac",
            Self::DualXml => "xml",
        }
    }
}

/// Builds the single `OBJECT_STATIC` line for a tile, invariant-culture
/// formatted (dot decimal separator, whichever default float rendering
/// Rust already gives us).
#[must_use]
pub fn stg_line(tile_index: u32, format: StgModelFormat, lon_center: f64, lat_center: f64, alt_center: f64) -> String {
    let (heading, pitch, roll) = format.angles();
    format!(
        "OBJECT_STATIC {tile_index}.{ext} {lon_center} {lat_center} {alt_center} {heading} {pitch} {roll}",
        ext = format.extension(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gltf_only_uses_gltf_filename_and_angles() {
        let line = stg_line(123, StgModelFormat::GltfOnly, 1.5, 2.5, 3.5);
        assert_eq!(line, "OBJECT_STATIC 123.gltf 1.5 2.5 3.5 270 0 90");
    }

    #[test]
    fn ac3d_only_uses_ac_filename_and_angles() {
        let line = stg_line(123, StgModelFormat::Ac3dOnly, 0.0, 0.0, 0.0);
        assert_eq!(line, "OBJECT_STATIC 123.ac 0 0 0 90 0 0");
    }

    #[test]
    fn dual_uses_xml_filename_and_angles() {
        let line = stg_line(123, StgModelFormat::DualXml, 0.0, 0.0, 0.0);
        assert_eq!(line, "OBJECT_STATIC 123.xml 0 0 0 0 0 90");
    }

    #[test]
    fn from_flags_picks_dual_when_both_requested() {
        assert_eq!(StgModelFormat::from_flags(true, true), StgModelFormat::DualXml);
        assert_eq!(StgModelFormat::from_flags(true, false), StgModelFormat::GltfOnly);
        assert_eq!(StgModelFormat::from_flags(false, true), StgModelFormat::Ac3dOnly);
    }
}
