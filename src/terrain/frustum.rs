//! View-frustum planes and box tests
//!
//! Planes come from the rows of a column-vector view-projection matrix
//! (`clip = M * p`) whose depth range is 0..1.

use glam::{Mat4, Vec3, Vec4};

/// Normals shorter than this come from degenerate matrices and are ignored
const MIN_PLANE_LENGTH: f32 = 1e-6;

/// Axis-aligned box stored as center and half-extents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub extents: Vec3,
}

impl Aabb {
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self { center, extents }
    }

    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            extents: (max - min) * 0.5,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.extents
    }

    /// True when `other` lies completely inside this box
    pub fn contains(&self, other: &Aabb) -> bool {
        let eps = Vec3::splat(1e-4);
        other.min().cmpge(self.min() - eps).all() && other.max().cmple(self.max() + eps).all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    /// Normalize `(a, b, c, d)` with `ax + by + cz + d = 0`
    fn from_row(v: Vec4) -> Option<Self> {
        let normal = v.truncate();
        let length = normal.length();
        if length < MIN_PLANE_LENGTH {
            return None;
        }
        Some(Self {
            normal: normal / length,
            distance: v.w / length,
        })
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// Order: left, right, bottom, top, near, far
#[derive(Debug, Clone)]
pub struct Frustum {
    planes: Vec<Plane>,
}

impl Frustum {
    pub fn from_view_projection(m: Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
        let rows = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2];
        let planes = rows.into_iter().filter_map(Plane::from_row).collect();
        Self { planes }
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Positive-vertex test: the box is culled as soon as the corner most
    /// aligned with some plane normal lies behind that plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let n = plane.normal;
            let e = aabb.extents;
            let positive = aabb.center
                + Vec3::new(
                    if n.x >= 0.0 { e.x } else { -e.x },
                    if n.y >= 0.0 { e.y } else { -e.y },
                    if n.z >= 0.0 { e.z } else { -e.z },
                );
            plane.signed_distance(positive) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_negative_z() -> Mat4 {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 100.0);
        proj * view
    }

    #[test]
    fn test_six_planes_for_regular_projection() {
        let frustum = Frustum::from_view_projection(looking_down_negative_z());
        assert_eq!(frustum.planes().len(), 6);
        for plane in frustum.planes() {
            assert!((plane.normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_box_in_front_is_visible() {
        let frustum = Frustum::from_view_projection(looking_down_negative_z());
        let aabb = Aabb::from_center_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE);
        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_box_behind_is_culled() {
        let frustum = Frustum::from_view_projection(looking_down_negative_z());
        let aabb = Aabb::from_center_extents(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE);
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_box_beyond_far_plane_is_culled() {
        let frustum = Frustum::from_view_projection(looking_down_negative_z());
        let aabb = Aabb::from_center_extents(Vec3::new(0.0, 0.0, -150.0), Vec3::ONE);
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_straddling_box_is_kept() {
        let frustum = Frustum::from_view_projection(looking_down_negative_z());
        // Crosses the left plane but reaches inside
        let aabb = Aabb::from_center_extents(Vec3::new(-12.0, 0.0, -10.0), Vec3::splat(3.0));
        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_degenerate_matrix_culls_nothing() {
        let frustum = Frustum::from_view_projection(Mat4::ZERO);
        assert!(frustum.planes().is_empty());
        let aabb = Aabb::from_center_extents(Vec3::splat(1e6), Vec3::ONE);
        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_contains() {
        let outer = Aabb::from_min_max(Vec3::ZERO, Vec3::splat(4.0));
        let inner = Aabb::from_min_max(Vec3::ONE, Vec3::splat(2.0));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }
}
