//! BVH node and bounding box types shared by the BLAS and the TLAS.
//!
//! Flat array layout for GPU traversal:
//! - 32-byte nodes, index 0 of each tree is its root
//! - internal node: `left_or_first` = left child, right child follows it
//! - leaf: `count = 1`, `left_or_first` = primitive id (triangle or instance)

use bytemuck::{Pod, Zeroable};

use crate::util::Bounds;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: [f32::INFINITY; 3],
        max: [f32::NEG_INFINITY; 3],
    };

    /// Bounds of a triangle.
    pub fn from_triangle(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> Self {
        let mut b = Self::EMPTY;
        b.grow_point(v0);
        b.grow_point(v1);
        b.grow_point(v2);
        b
    }

    /// Grow to include a point.
    #[inline]
    pub fn grow_point(&mut self, p: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    /// Grow to include another AABB.
    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    /// Surface area (for SAH cost).
    #[inline]
    pub fn area(&self) -> f32 {
        let dx = self.max[0] - self.min[0];
        let dy = self.max[1] - self.min[1];
        let dz = self.max[2] - self.min[2];
        2.0 * (dx * dy + dy * dz + dz * dx)
    }

    /// Centroid of the AABB.
    #[inline]
    pub fn centroid(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Check whether `other` lies inside (inclusive).
    pub fn contains(&self, other: &Aabb) -> bool {
        (0..3).all(|i| self.min[i] <= other.min[i] && self.max[i] >= other.max[i])
    }
}

impl From<Bounds> for Aabb {
    fn from(b: Bounds) -> Self {
        Self {
            min: b.min.to_array(),
            max: b.max.to_array(),
        }
    }
}

/// GPU-friendly BVH node (32 bytes, matches WGSL `BvhNode`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub left_or_first: u32,
    pub aabb_max: [f32; 3],
    pub count: u32,
}

impl BvhNode {
    /// Root of a tree with no primitives.
    pub const EMPTY: Self = Self {
        aabb_min: [0.0; 3],
        left_or_first: 0,
        aabb_max: [0.0; 3],
        count: 0,
    };

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }

    pub fn aabb(&self) -> Aabb {
        Aabb {
            min: self.aabb_min,
            max: self.aabb_max,
        }
    }

    /// Shift node and primitive references after appending this tree behind
    /// `node_base` nodes and `prim_base` primitives of a shared array.
    #[inline]
    pub fn rebased(self, node_base: u32, prim_base: u32) -> Self {
        let left_or_first = if self.is_leaf() {
            self.left_or_first + prim_base
        } else if self.left_or_first == 0 {
            // No internal node points back at the root: this is an empty tree
            0
        } else {
            self.left_or_first + node_base
        };
        Self {
            left_or_first,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_size() {
        assert_eq!(std::mem::size_of::<BvhNode>(), 32);
    }

    #[test]
    fn test_rebase_leaf_and_internal() {
        let internal = BvhNode {
            aabb_min: [-1.0; 3],
            left_or_first: 1,
            aabb_max: [1.0; 3],
            count: 0,
        };
        let leaf = BvhNode {
            left_or_first: 4,
            count: 1,
            ..internal
        };
        assert_eq!(internal.rebased(100, 50).left_or_first, 101);
        assert_eq!(leaf.rebased(100, 50).left_or_first, 54);
        assert_eq!(BvhNode::EMPTY.rebased(100, 50), BvhNode::EMPTY);
    }

    #[test]
    fn test_aabb_grow() {
        let a = Aabb::from_triangle([0.0; 3], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        assert_eq!(a.max, [1.0, 2.0, 0.0]);
        assert_eq!(a.area(), 4.0);
        let mut b = Aabb::EMPTY;
        b.grow(&a);
        assert!(b.contains(&a));
    }
}
