//! Lat/lon-interpolated altitude sampling over a decoded BTG mesh.

use crate::geo::ecef::ecef_to_geodetic;
use crate::terrain::btg::BtgMesh;

fn vertex_geodetic(mesh: &BtgMesh, index: u32) -> (f64, f64, f64) {
    let v = mesh.vertices[index as usize];
    let absolute = [
        mesh.center[0] + f64::from(v[0]),
        mesh.center[1] + f64::from(v[1]),
        mesh.center[2] + f64::from(v[2]),
    ];
    ecef_to_geodetic(absolute)
}

/// 2D barycentric coordinates of `p` in triangle `(a, b, c)`, in
/// `(lon, lat)` space. Returns `None` if the triangle is degenerate or
/// `p` falls outside it.
fn barycentric(p: (f64, f64), a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Option<(f64, f64, f64)> {
    let v0 = (b.0 - a.0, b.1 - a.1);
    let v1 = (c.0 - a.0, c.1 - a.1);
    let v2 = (p.0 - a.0, p.1 - a.1);

    let den = v0.0 * v1.1 - v1.0 * v0.1;
    if den.abs() < 1e-18 {
        return None;
    }

    let v = (v2.0 * v1.1 - v1.0 * v2.1) / den;
    let w = (v0.0 * v2.1 - v2.0 * v0.1) / den;
    let u = 1.0 - v - w;

    const EPS: f64 = 1e-9;
    if u >= -EPS && v >= -EPS && w >= -EPS {
        Some((u, v, w))
    } else {
        None
    }
}

/// Samples ground altitude at `(lat, lon)` against `mesh`, preferring
/// barycentric interpolation within the containing triangle and falling
/// back to the nearest vertex's altitude when no triangle contains the
/// point.
#[must_use]
pub fn sample_altitude(mesh: &BtgMesh, lat: f64, lon: f64) -> Option<f64> {
    if mesh.vertices.is_empty() {
        return None;
    }

    let geo_vertices: Vec<(f64, f64, f64)> = (0..mesh.vertices.len() as u32)
        .map(|i| vertex_geodetic(mesh, i))
        .collect();

    for tri in &mesh.triangles {
        let (alat, alon, aalt) = geo_vertices[tri[0] as usize];
        let (blat, blon, balt) = geo_vertices[tri[1] as usize];
        let (clat, clon, calt) = geo_vertices[tri[2] as usize];

        if let Some((u, v, w)) = barycentric(
            (lon, lat),
            (alon, alat),
            (blon, blat),
            (clon, clat),
        ) {
            return Some(u * aalt + v * balt + w * calt);
        }
    }

    geo_vertices
        .iter()
        .min_by(|x, y| {
            let dx = (x.0 - lat).hypot(x.1 - lon);
            let dy = (y.0 - lat).hypot(y.1 - lon);
            dx.partial_cmp(&dy).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|v| v.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_mesh_at_origin(altitude_m: f64) -> BtgMesh {
        use crate::geo::ecef::geodetic_to_ecef;
        let center = geodetic_to_ecef(0.0, 0.0, altitude_m);
        let a = geodetic_to_ecef(-0.01, -0.01, altitude_m);
        let b = geodetic_to_ecef(-0.01, 0.02, altitude_m);
        let c = geodetic_to_ecef(0.02, -0.01, altitude_m);

        let rel = |p: [f64; 3]| {
            [
                (p[0] - center[0]) as f32,
                (p[1] - center[1]) as f32,
                (p[2] - center[2]) as f32,
            ]
        };

        BtgMesh {
            center,
            radius: 1000.0,
            vertices: vec![rel(a), rel(b), rel(c)],
            triangles: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn interpolates_inside_triangle() {
        let mesh = flat_mesh_at_origin(123.0);
        let alt = sample_altitude(&mesh, 0.0, 0.0).unwrap();
        assert!((alt - 123.0).abs() < 0.5, "got {alt}");
    }

    #[test]
    fn falls_back_to_nearest_vertex_outside_triangle() {
        let mesh = flat_mesh_at_origin(50.0);
        let alt = sample_altitude(&mesh, 10.0, 10.0).unwrap();
        assert!((alt - 50.0).abs() < 0.5, "got {alt}");
    }
}
