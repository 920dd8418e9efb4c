//! Placement-transform math: the MSFS-to-glTF world transform and its
//! AC3D coordinate-flip sandwich.

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::bgl::LibraryPlacement;

const METERS_PER_DEGREE_LAT: f64 = 110_540.0;
const METERS_PER_DEGREE_LON_AT_EQUATOR: f64 = 111_320.0;

/// `(lat, lon, alt)` tile origin, typically the tile center.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileOrigin {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// Computes the glTF-frame world transform (X east, Y up, Z south) for
/// `placement` relative to `origin`.
#[must_use]
pub fn placement_transform(placement: &LibraryPlacement, origin: TileOrigin) -> Mat4 {
    let lon_offset = -(placement.longitude - origin.lon)
        * METERS_PER_DEGREE_LON_AT_EQUATOR
        * (origin.lat.to_radians()).cos();
    let lat_offset = (placement.latitude - origin.lat) * METERS_PER_DEGREE_LAT;
    let alt_offset = placement.altitude - origin.alt;

    let translation = Vec3::new(lon_offset as f32, alt_offset as f32, lat_offset as f32);

    let yaw = -placement.heading.to_radians();
    let pitch = placement.pitch.to_radians();
    let roll = placement.bank.to_radians();
    let rotation = Quat::from_euler(EulerRot::YXZ, yaw as f32, pitch as f32, roll as f32);

    let scale = Vec3::splat(placement.scale);

    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// `diag(1, 1, -1, 1)`, the AC3D coordinate-flip matrix.
#[must_use]
pub fn flip_z() -> Mat4 {
    Mat4::from_diagonal(glam::Vec4::new(1.0, 1.0, -1.0, 1.0))
}

/// Sandwiches `gltf_transform` between two [`flip_z`] matrices to obtain
/// the AC3D-frame placement transform.
#[must_use]
pub fn ac3d_transform(gltf_transform: Mat4) -> Mat4 {
    flip_z() * gltf_transform * flip_z()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgl::types::PlacementFlags;

    fn placement_at(lat: f64, lon: f64, alt: f64) -> LibraryPlacement {
        LibraryPlacement {
            guid: [0u8; 16],
            latitude: lat,
            longitude: lon,
            altitude: alt,
            pitch: 0.0,
            bank: 0.0,
            heading: 0.0,
            scale: 1.0,
            image_complexity: 0,
            flags: PlacementFlags::default(),
        }
    }

    #[test]
    fn origin_placement_has_identity_translation() {
        let origin = TileOrigin { lat: 0.0, lon: 0.0, alt: 0.0 };
        let p = placement_at(0.0, 0.0, 0.0);
        let m = placement_transform(&p, origin);
        let translated = m.transform_point3(Vec3::ZERO);
        assert!(translated.length() < 1e-4);
    }

    #[test]
    fn east_longitude_offset_is_negative_x() {
        let origin = TileOrigin { lat: 0.0, lon: 0.0, alt: 0.0 };
        let p = placement_at(0.0, 1.0, 0.0);
        let m = placement_transform(&p, origin);
        let translated = m.transform_point3(Vec3::ZERO);
        assert!(translated.x < 0.0, "expected east offset to be -X, got {translated:?}");
    }

    #[test]
    fn flip_z_is_involutive() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let flipped_twice = ac3d_transform(ac3d_transform(m));
        assert!(flipped_twice.abs_diff_eq(m, 1e-5));
    }
}
