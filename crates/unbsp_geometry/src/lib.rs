//! Plane and convex-polytope math shared by the decompiler crates.
//!
//! Conventions used throughout:
//! - a plane's interior half-space is `normal · x <= distance`, so brush planes point outward;
//! - a three-point plane `(p0, p1, p2)` has normal `(p2 - p0) × (p1 - p0)`, i.e. its points run
//!   clockwise when viewed from the front. Compiled face windings follow the same rule.

use bevy::math::DVec3;

/// Default tolerance for collinearity, containment and vertex deduplication.
pub const EPSILON: f64 = 1e-3;

/// Edge length of the triangle generated by [`Plane::three_points`].
pub const THREE_POINT_SPAN: f64 = 64.0;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: DVec3,
    pub distance: f64,
}

impl Default for Plane {
    /// The fallback plane used when a side references no valid plane: `+X` through the origin.
    fn default() -> Self {
        Self {
            normal: DVec3::X,
            distance: 0.0,
        }
    }
}

impl Plane {
    pub const fn new(normal: DVec3, distance: f64) -> Self {
        Self { normal, distance }
    }

    /// Build a plane from three points using the clockwise convention. Returns None if the
    /// points are collinear.
    pub fn from_points(points: &[DVec3; 3]) -> Option<Self> {
        let normal = triangle_normal(points).normalize_or_zero();
        if normal == DVec3::ZERO {
            return None;
        }
        Some(Self {
            normal,
            distance: normal.dot(points[0]),
        })
    }

    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            distance: -self.distance,
        }
    }

    pub fn signed_distance(&self, point: DVec3) -> f64 {
        self.normal.dot(point) - self.distance
    }

    /// Three points on this plane, wound so that [`triangle_normal`] points along `normal`.
    pub fn three_points(&self) -> [DVec3; 3] {
        let normal = self.normal.normalize_or_zero();
        let (u_axis, v_axis) = compute_face_tangent_axes(normal);
        let base = normal * self.distance;
        [
            base,
            base + v_axis * THREE_POINT_SPAN,
            base + u_axis * THREE_POINT_SPAN,
        ]
    }
}

// ---------------------------------------------------------------------------
// Triangles
// ---------------------------------------------------------------------------

/// Unnormalized normal of a three-point plane.
pub fn triangle_normal(points: &[DVec3; 3]) -> DVec3 {
    (points[2] - points[0]).cross(points[1] - points[0])
}

/// True if `|(a - b) × (a - c)| > epsilon`.
pub fn is_non_collinear(a: DVec3, b: DVec3, c: DVec3, epsilon: f64) -> bool {
    (a - b).cross(a - c).length() > epsilon
}

/// Pick a plane-defining triangle from an ordered point list.
///
/// The first point is always used. The second is the next point that differs from it, and the
/// third is the first later point distinct from both that is not collinear with them.
pub fn face_triangle(points: &[DVec3], epsilon: f64) -> Option<[DVec3; 3]> {
    let (&p0, rest) = points.split_first()?;
    let second = rest.iter().position(|&p| p != p0)?;
    let p1 = rest[second];
    rest[second + 1..]
        .iter()
        .find(|&&p2| p2 != p0 && p2 != p1 && is_non_collinear(p0, p1, p2, epsilon))
        .map(|&p2| [p0, p1, p2])
}

// ---------------------------------------------------------------------------
// Half-space intersection
// ---------------------------------------------------------------------------

/// Solve the intersection of three planes. Returns None if the system is (near) singular.
pub fn plane_triple_intersection(p1: &Plane, p2: &Plane, p3: &Plane, epsilon: f64) -> Option<DVec3> {
    let n1 = p1.normal;
    let n2 = p2.normal;
    let n3 = p3.normal;

    let det = n1.dot(n2.cross(n3));
    if det.abs() < epsilon {
        return None;
    }

    let point = (n2.cross(n3) * p1.distance + n3.cross(n1) * p2.distance + n1.cross(n2) * p3.distance) / det;
    Some(point)
}

/// Check if a point is inside (or on the boundary of) all half-spaces.
pub fn point_inside_all_planes(point: DVec3, planes: &[Plane], epsilon: f64) -> bool {
    planes
        .iter()
        .all(|plane| plane.signed_distance(point) <= epsilon)
}

/// Enumerate the vertices of the convex polytope bounded by `planes`.
///
/// Every triple of planes is intersected and the point kept only if it satisfies all the
/// other half-spaces. Duplicates closer than `epsilon` are merged.
pub fn enumerate_vertices(planes: &[Plane], epsilon: f64) -> Vec<DVec3> {
    let n = planes.len();
    let mut vertices: Vec<DVec3> = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let Some(point) = plane_triple_intersection(&planes[i], &planes[j], &planes[k], epsilon) else {
                    continue;
                };
                if !point_inside_all_planes(point, planes, epsilon) {
                    continue;
                }
                if !vertices.iter().any(|v| (*v - point).length() < epsilon) {
                    vertices.push(point);
                }
            }
        }
    }

    vertices
}

/// Indices of the vertices lying on `plane`.
pub fn vertices_on_plane(vertices: &[DVec3], plane: &Plane, epsilon: f64) -> Vec<usize> {
    vertices
        .iter()
        .enumerate()
        .filter(|(_, v)| plane.signed_distance(**v).abs() < epsilon)
        .map(|(i, _)| i)
        .collect()
}

/// Compute brush geometry from its bounding planes.
/// Returns (unique vertices, per-plane polygon vertex indices in clockwise order).
pub fn compute_brush_geometry(planes: &[Plane], epsilon: f64) -> (Vec<DVec3>, Vec<Vec<usize>>) {
    let vertices = enumerate_vertices(planes, epsilon);

    let face_polygons = planes
        .iter()
        .map(|plane| {
            let mut face_verts = vertices_on_plane(&vertices, plane, epsilon);
            sort_face_vertices_by_winding(&vertices, &mut face_verts, plane.normal);
            face_verts
        })
        .collect();

    (vertices, face_polygons)
}

/// Sort face vertex indices clockwise around the face normal (viewed from the front).
pub fn sort_face_vertices_by_winding(vertices: &[DVec3], indices: &mut [usize], normal: DVec3) {
    if indices.len() < 3 {
        return;
    }

    let centroid: DVec3 = indices.iter().map(|&i| vertices[i]).sum::<DVec3>() / indices.len() as f64;
    let (u_axis, v_axis) = compute_face_tangent_axes(normal);

    // Angles grow counter-clockwise from u towards v, so sort them descending.
    indices.sort_by(|&a, &b| {
        let da = vertices[a] - centroid;
        let db = vertices[b] - centroid;
        let angle_a = da.dot(v_axis).atan2(da.dot(u_axis));
        let angle_b = db.dot(v_axis).atan2(db.dot(u_axis));
        angle_b.partial_cmp(&angle_a).unwrap_or(std::cmp::Ordering::Equal)
    });
}

// ---------------------------------------------------------------------------
// Axes
// ---------------------------------------------------------------------------

/// Orthonormal tangent axes `(u, v)` for a face with `u × v = normal`.
pub fn compute_face_tangent_axes(normal: DVec3) -> (DVec3, DVec3) {
    let abs_n = normal.abs();
    let up = if abs_n.y >= abs_n.x && abs_n.y >= abs_n.z {
        DVec3::Z
    } else {
        DVec3::Y
    };
    let u = normal.cross(up).normalize_or_zero();
    let v = normal.cross(u).normalize_or_zero();
    (u, v)
}

/// Base texture axes for a plane, as a map compiler picks them before any rotation or scale:
/// the axis-aligned projection whose normal is closest to the plane's.
pub fn texture_axes_from_plane(normal: DVec3) -> (DVec3, DVec3) {
    const BASE_AXES: [[DVec3; 3]; 6] = [
        [DVec3::Z, DVec3::X, DVec3::NEG_Y],
        [DVec3::NEG_Z, DVec3::X, DVec3::NEG_Y],
        [DVec3::X, DVec3::Y, DVec3::NEG_Z],
        [DVec3::NEG_X, DVec3::Y, DVec3::NEG_Z],
        [DVec3::Y, DVec3::X, DVec3::NEG_Z],
        [DVec3::NEG_Y, DVec3::X, DVec3::NEG_Z],
    ];

    let mut best = 0;
    let mut best_dot = f64::MIN;
    for (i, axes) in BASE_AXES.iter().enumerate() {
        let dot = normal.dot(axes[0]);
        if dot > best_dot {
            best_dot = dot;
            best = i;
        }
    }
    (BASE_AXES[best][1], BASE_AXES[best][2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(half: f64) -> Vec<Plane> {
        [DVec3::X, DVec3::NEG_X, DVec3::Y, DVec3::NEG_Y, DVec3::Z, DVec3::NEG_Z]
            .into_iter()
            .map(|normal| Plane::new(normal, half))
            .collect()
    }

    #[test]
    fn cube_has_eight_vertices_and_quad_faces() {
        let planes = cube(16.0);
        let (vertices, polygons) = compute_brush_geometry(&planes, EPSILON);
        assert_eq!(vertices.len(), 8);
        assert!(polygons.iter().all(|p| p.len() == 4));
    }

    #[test]
    fn sorted_polygons_wind_clockwise_around_their_plane() {
        let planes = cube(8.0);
        let (vertices, polygons) = compute_brush_geometry(&planes, EPSILON);
        for (plane, polygon) in planes.iter().zip(&polygons) {
            let tri = [vertices[polygon[0]], vertices[polygon[1]], vertices[polygon[2]]];
            let derived = Plane::from_points(&tri).unwrap();
            assert!(derived.normal.abs_diff_eq(plane.normal, 1e-9));
            assert!((derived.distance - plane.distance).abs() < 1e-9);
        }
    }

    #[test]
    fn three_points_reproduce_the_plane() {
        let plane = Plane::new(DVec3::new(1.0, 2.0, -0.5).normalize(), 37.5);
        let derived = Plane::from_points(&plane.three_points()).unwrap();
        assert!(derived.normal.abs_diff_eq(plane.normal, 1e-9));
        assert!((derived.distance - plane.distance).abs() < 1e-9);
    }

    #[test]
    fn parallel_planes_do_not_intersect() {
        let a = Plane::new(DVec3::X, 1.0);
        let b = Plane::new(DVec3::NEG_X, 1.0);
        let c = Plane::new(DVec3::Y, 1.0);
        assert!(plane_triple_intersection(&a, &b, &c, EPSILON).is_none());
    }

    #[test]
    fn face_triangle_skips_duplicate_and_collinear_points() {
        let points = [
            DVec3::ZERO,
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let tri = face_triangle(&points, EPSILON).unwrap();
        assert_eq!(tri, [DVec3::ZERO, DVec3::X, DVec3::Y]);
    }

    #[test]
    fn face_triangle_rejects_a_line() {
        let points = [DVec3::ZERO, DVec3::X, DVec3::X * 2.0];
        assert!(face_triangle(&points, EPSILON).is_none());
        assert!(face_triangle(&[], EPSILON).is_none());
    }

    #[test]
    fn floor_uses_xy_projection() {
        let (s, t) = texture_axes_from_plane(DVec3::new(0.1, 0.0, 0.99));
        assert_eq!(s, DVec3::X);
        assert_eq!(t, DVec3::NEG_Y);
    }
}
