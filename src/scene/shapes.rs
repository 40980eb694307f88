//! Procedural geometry for the built-in scene
//!
//! Triangles wind counter-clockwise when seen from outside.

use crate::scene::mesh::{ShapeData, Vertex};
use std::f32::consts::PI;

/// Axis-aligned box centered on the origin, four vertices per face
pub fn cube(width: f32, height: f32, depth: f32) -> ShapeData {
    let (w, h, d) = (width * 0.5, height * 0.5, depth * 0.5);
    // normal, u axis, v axis
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut shape = ShapeData::default();
    for (normal, u, v) in faces {
        let base = shape.vertices.len() as u32;
        for (su, sv, uv) in [
            (-1.0, -1.0, [0.0, 1.0]),
            (1.0, -1.0, [1.0, 1.0]),
            (1.0, 1.0, [1.0, 0.0]),
            (-1.0, 1.0, [0.0, 0.0]),
        ] {
            let p = [
                (normal[0] + u[0] * su + v[0] * sv) * w,
                (normal[1] + u[1] * su + v[1] * sv) * h,
                (normal[2] + u[2] * su + v[2] * sv) * d,
            ];
            shape.vertices.push(Vertex::new(p, normal, uv));
        }
        shape
            .indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    shape
}

/// UV sphere with poles on the Y axis
pub fn sphere(radius: f32, slices: u32, stacks: u32) -> ShapeData {
    let slices = slices.max(3);
    let stacks = stacks.max(2);
    let mut shape = ShapeData::default();

    for stack in 0..=stacks {
        let phi = PI * stack as f32 / stacks as f32;
        for slice in 0..=slices {
            let theta = 2.0 * PI * slice as f32 / slices as f32;
            let n = [phi.sin() * theta.cos(), phi.cos(), -phi.sin() * theta.sin()];
            shape.vertices.push(Vertex::new(
                [n[0] * radius, n[1] * radius, n[2] * radius],
                n,
                [slice as f32 / slices as f32, stack as f32 / stacks as f32],
            ));
        }
    }

    let ring = slices + 1;
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = stack * ring + slice;
            let b = a + ring;
            shape
                .indices
                .extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    shape
}

/// Flat grid spanning -0.5..0.5 on X and Z with uv 0..1; terrain tiles scale it
pub fn grid(cells: u32) -> ShapeData {
    let cells = cells.max(1);
    let side = cells + 1;
    let mut shape = ShapeData::default();

    for z in 0..side {
        for x in 0..side {
            let u = x as f32 / cells as f32;
            let v = z as f32 / cells as f32;
            shape
                .vertices
                .push(Vertex::new([u - 0.5, 0.0, v - 0.5], [0.0, 1.0, 0.0], [u, v]));
        }
    }

    for z in 0..cells {
        for x in 0..cells {
            let a = z * side + x;
            let b = a + side;
            shape
                .indices
                .extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn assert_outward(shape: &ShapeData) {
        for tri in shape.indices.chunks(3) {
            let p: Vec<Vec3> = tri
                .iter()
                .map(|&i| Vec3::from(shape.vertices[i as usize].position))
                .collect();
            let face = (p[1] - p[0]).cross(p[2] - p[0]);
            if face.length_squared() < 1e-10 {
                continue;
            }
            let n = Vec3::from(shape.vertices[tri[0] as usize].normal)
                + Vec3::from(shape.vertices[tri[1] as usize].normal)
                + Vec3::from(shape.vertices[tri[2] as usize].normal);
            assert!(face.dot(n) > 0.0);
        }
    }

    #[test]
    fn test_cube_counts_and_winding() {
        let cube = cube(2.0, 2.0, 2.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_outward(&cube);
    }

    #[test]
    fn test_sphere_winding() {
        let sphere = sphere(1.0, 12, 8);
        assert_eq!(sphere.vertices.len(), 13 * 9);
        assert_outward(&sphere);
    }

    #[test]
    fn test_grid_faces_up() {
        let grid = grid(4);
        assert_eq!(grid.vertices.len(), 25);
        assert_eq!(grid.indices.len(), 4 * 4 * 6);
        assert_outward(&grid);
        let bounds = grid.bounds();
        assert!((bounds.extents.x - 0.5).abs() < 1e-6);
        assert_eq!(bounds.extents.y, 0.0);
    }
}
