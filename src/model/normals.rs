//! Smooth vertex normals with an angle threshold.
//!
//! Meshes that arrive without normals get them here before extraction.
//! Face normals are area weighted and accumulated per vertex, then vertices
//! sharing a position are averaged when their normals lie within the angle.

use glam::Vec3;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Compute per-vertex normals for an indexed triangle list.
///
/// `indices` must already be validated (length a multiple of 3, all in range).
/// `angle_deg` of 180 welds every vertex at the same position.
pub fn smooth_normals(positions: &[Vec3], indices: &[u32], angle_deg: f32) -> Vec<Vec3> {
    let mut accum = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        // Cross product length is twice the area: larger faces weigh more
        let face = (positions[i1] - positions[i0]).cross(positions[i2] - positions[i0]);
        accum[i0] += face;
        accum[i1] += face;
        accum[i2] += face;
    }

    let own: Vec<Vec3> = accum.iter().map(|n| n.normalize_or_zero()).collect();

    let mut position_groups: HashMap<u64, Vec<usize>> = HashMap::new();
    for (idx, pos) in positions.iter().enumerate() {
        position_groups.entry(pos_hash(*pos)).or_default().push(idx);
    }

    let cos_threshold = angle_deg.clamp(0.0, 180.0).to_radians().cos();
    let mut normals = vec![Vec3::Y; positions.len()];

    for group in position_groups.values() {
        for &idx in group {
            let mut sum = Vec3::ZERO;
            for &other in group {
                if own[idx].dot(own[other]) >= cos_threshold {
                    sum += accum[other];
                }
            }
            // Vertices used by no triangle keep +Y
            if let Some(n) = sum.try_normalize() {
                normals[idx] = n;
            }
        }
    }

    normals
}

/// Hash position for grouping
fn pos_hash(p: Vec3) -> u64 {
    let scale = 10000.0;
    let x = (p.x * scale).round() as i32;
    let y = (p.y * scale).round() as i32;
    let z = (p.z * scale).round() as i32;

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    (x, y, z).hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_quad_points_up() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
        ];
        let indices = [0, 1, 2, 2, 1, 3];
        let normals = smooth_normals(&positions, &indices, 45.0);
        for n in normals {
            assert!(n.abs_diff_eq(Vec3::Y, 1e-6), "{n:?}");
        }
    }

    #[test]
    fn test_split_corner_respects_angle() {
        // Two faces meeting at 90 degrees with duplicated edge vertices
        let positions = [
            // floor (normal +Y)
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            // wall (normal +Z), first vertex shares position with floor[0]
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let indices = [0, 1, 2, 3, 4, 5];

        let hard = smooth_normals(&positions, &indices, 45.0);
        assert!(hard[0].abs_diff_eq(Vec3::Y, 1e-6));
        assert!(hard[3].abs_diff_eq(Vec3::Z, 1e-6));

        let soft = smooth_normals(&positions, &indices, 180.0);
        let expected = (Vec3::Y + Vec3::Z).normalize();
        assert!(soft[0].abs_diff_eq(expected, 1e-5));
        assert!(soft[3].abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_unused_vertex_gets_default() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Z, Vec3::splat(5.0)];
        let normals = smooth_normals(&positions, &[0, 2, 1], 45.0);
        assert_eq!(normals.len(), 4);
        assert_eq!(normals[3], Vec3::Y);
    }
}
