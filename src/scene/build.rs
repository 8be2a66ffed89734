//! SAH-based BVH builder.
//!
//! Constructs a flat BVH array over a list of primitive bounds. Every leaf
//! holds exactly one primitive and stores its id directly, so the primitive
//! arrays (triangle bindings, instances) never need reordering.

use super::bvh::{Aabb, BvhNode};

/// Number of SAH bins for split evaluation.
const NUM_BINS: usize = 12;

/// Cost ratio: traversal vs intersection (typical GPU values).
const TRAVERSAL_COST: f32 = 1.0;
const INTERSECT_COST: f32 = 1.0;

/// SAH bin for evaluating split candidates.
struct Bin {
    bounds: Aabb,
    count: usize,
}

impl Bin {
    fn new() -> Self {
        Self {
            bounds: Aabb::EMPTY,
            count: 0,
        }
    }
}

/// Build a BVH over `prims` using SAH.
///
/// Returns `2 * n - 1` nodes for `n > 0` primitives, or a single empty node.
/// Leaf `left_or_first` is the index into `prims`.
#[tracing::instrument(skip_all, fields(prim_count = prims.len()))]
pub fn build_bvh(prims: &[Aabb]) -> Vec<BvhNode> {
    let n = prims.len();
    if n == 0 {
        return vec![BvhNode::EMPTY];
    }

    let centroids: Vec<[f32; 3]> = prims.iter().map(|b| b.centroid()).collect();

    // Working index array (will be reordered by partitioning)
    let mut indices: Vec<usize> = (0..n).collect();

    // Full binary tree with one primitive per leaf
    let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n - 1);
    nodes.push(BvhNode::EMPTY);

    // Build using a stack (avoid actual recursion for large models)
    struct Task {
        node_idx: usize,
        start: usize,
        end: usize, // exclusive
    }

    let mut stack = vec![Task {
        node_idx: 0,
        start: 0,
        end: n,
    }];

    while let Some(task) = stack.pop() {
        let start = task.start;
        let end = task.end;

        let mut node_aabb = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            node_aabb.grow(&prims[idx]);
        }

        if end - start == 1 {
            nodes[task.node_idx] = BvhNode {
                aabb_min: node_aabb.min,
                left_or_first: indices[start] as u32,
                aabb_max: node_aabb.max,
                count: 1,
            };
            continue;
        }

        let mut centroid_bounds = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            centroid_bounds.grow_point(centroids[idx]);
        }

        let (best_axis, best_split_pos) =
            find_best_split(&indices[start..end], prims, &centroids, &centroid_bounds);

        let mid = if best_axis == usize::MAX {
            start
        } else {
            partition(&mut indices[start..end], |&idx| {
                centroids[idx][best_axis] < best_split_pos
            }) + start
        };

        // Fallback: degenerate centroids or one-sided partition, split in middle
        let mid = if mid == start || mid == end {
            (start + end) / 2
        } else {
            mid
        };

        let left_idx = nodes.len();
        let right_idx = left_idx + 1;
        nodes.push(BvhNode::EMPTY);
        nodes.push(BvhNode::EMPTY);

        nodes[task.node_idx] = BvhNode {
            aabb_min: node_aabb.min,
            left_or_first: left_idx as u32,
            aabb_max: node_aabb.max,
            count: 0,
        };

        // Push children (right first so left is processed first, depth-first)
        stack.push(Task {
            node_idx: right_idx,
            start: mid,
            end,
        });
        stack.push(Task {
            node_idx: left_idx,
            start,
            end: mid,
        });
    }

    nodes
}

/// SAH binned split search across all 3 axes.
/// Returns (best_axis, split_position). axis=usize::MAX if no valid split.
fn find_best_split(
    indices: &[usize],
    prims: &[Aabb],
    centroids: &[[f32; 3]],
    centroid_bounds: &Aabb,
) -> (usize, f32) {
    let mut best_axis = usize::MAX;
    let mut best_pos = 0.0f32;
    let mut best_cost = f32::INFINITY;

    for axis in 0..3 {
        let extent = centroid_bounds.max[axis] - centroid_bounds.min[axis];
        if extent < 1e-8 {
            continue; // degenerate axis
        }

        let mut bins: Vec<Bin> = (0..NUM_BINS).map(|_| Bin::new()).collect();
        let inv_extent = NUM_BINS as f32 / extent;

        for &idx in indices {
            let bin_id = ((centroids[idx][axis] - centroid_bounds.min[axis]) * inv_extent) as usize;
            let bin_id = bin_id.min(NUM_BINS - 1);
            bins[bin_id].bounds.grow(&prims[idx]);
            bins[bin_id].count += 1;
        }

        // Sweep from left: prefix areas and counts
        let mut left_area = [0.0f32; NUM_BINS - 1];
        let mut left_count = [0usize; NUM_BINS - 1];
        let mut sweep = Aabb::EMPTY;
        let mut sweep_count = 0;
        for i in 0..NUM_BINS - 1 {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            left_area[i] = sweep.area();
            left_count[i] = sweep_count;
        }

        // Sweep from right and evaluate SAH cost
        sweep = Aabb::EMPTY;
        sweep_count = 0;
        for i in (1..NUM_BINS).rev() {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            if left_count[i - 1] == 0 || sweep_count == 0 {
                continue;
            }
            let cost = TRAVERSAL_COST
                + INTERSECT_COST
                    * (left_count[i - 1] as f32 * left_area[i - 1]
                        + sweep_count as f32 * sweep.area());

            if cost < best_cost {
                best_cost = cost;
                best_axis = axis;
                best_pos = centroid_bounds.min[axis] + (i as f32 / NUM_BINS as f32) * extent;
            }
        }
    }

    (best_axis, best_pos)
}

/// Partition slice in-place. Returns count of elements where predicate is true.
fn partition<T, F>(slice: &mut [T], pred: F) -> usize
where
    F: Fn(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();
    while left < right {
        if pred(&slice[left]) {
            left += 1;
        } else {
            right -= 1;
            slice.swap(left, right);
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tri(cx: f32, cy: f32, cz: f32) -> Aabb {
        Aabb::from_triangle(
            [cx - 0.5, cy - 0.5, cz],
            [cx + 0.5, cy - 0.5, cz],
            [cx, cy + 0.5, cz],
        )
    }

    /// Collect leaf payloads reachable from the root.
    fn leaves(nodes: &[BvhNode]) -> Vec<u32> {
        let mut out = Vec::new();
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            let node = nodes[i];
            if node.is_leaf() {
                out.push(node.left_or_first);
            } else {
                let l = node.left_or_first as usize;
                assert!(node.aabb().contains(&nodes[l].aabb()));
                assert!(node.aabb().contains(&nodes[l + 1].aabb()));
                stack.push(l);
                stack.push(l + 1);
            }
        }
        out.sort();
        out
    }

    #[test]
    fn test_empty_bvh() {
        let nodes = build_bvh(&[]);
        assert_eq!(nodes, vec![BvhNode::EMPTY]);
    }

    #[test]
    fn test_single_primitive() {
        let nodes = build_bvh(&[make_tri(0.0, 0.0, 0.0)]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].count, 1);
        assert_eq!(nodes[0].left_or_first, 0);
    }

    #[test]
    fn test_many_primitives_builds_tree() {
        let tris: Vec<Aabb> = (0..100).map(|i| make_tri(i as f32 * 2.0, 0.0, 0.0)).collect();
        let nodes = build_bvh(&tris);

        assert_eq!(nodes.len(), 199);
        assert_eq!(leaves(&nodes), (0..100).collect::<Vec<_>>());

        let root = &nodes[0];
        assert!(root.aabb_min[0] < 0.0);
        assert!(root.aabb_max[0] > 198.0);
    }

    #[test]
    fn test_coincident_primitives_still_split() {
        let tris = vec![make_tri(1.0, 1.0, 1.0); 5];
        let nodes = build_bvh(&tris);
        assert_eq!(nodes.len(), 9);
        assert_eq!(leaves(&nodes), vec![0, 1, 2, 3, 4]);
    }
}
