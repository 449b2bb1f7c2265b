//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! A binary tree with exactly one primitive per leaf. Each level splits at
//! the median centroid along axis `depth % 3`, found with a linear-time
//! selection rather than a sort, so the tree depth is `O(log n)`.

use crate::{HitRecord, Hittable};
use lumen_math::{Aabb, Interval, Ray};

/// BVH node - either a branch with two children or a leaf with one primitive.
pub enum BvhNode {
    /// Internal node with two children.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    /// Leaf wrapping a single primitive, boxed by that primitive's own bounds.
    Leaf {
        object: Box<dyn Hittable>,
        bbox: Aabb,
    },
    /// Empty subtree (no primitives, or a null entry in a cache file).
    Empty,
}

impl BvhNode {
    /// Build a BVH over `objects`.
    ///
    /// Objects without a bounding box cannot be placed in the tree and are
    /// dropped with a warning; keep unbounded primitives in a flat list instead.
    pub fn new(objects: Vec<Box<dyn Hittable>>) -> Self {
        let total = objects.len();
        let bounded: Vec<(Aabb, Box<dyn Hittable>)> = objects
            .into_iter()
            .filter_map(|object| object.bounding_box().map(|bbox| (bbox, object)))
            .collect();

        if bounded.len() < total {
            log::warn!(
                "BVH skipped {} unbounded objects",
                total - bounded.len()
            );
        }

        let node = Self::build(bounded, 0);
        log::debug!(
            "Built BVH: {} leaves, depth {}",
            node.leaf_count(),
            node.depth()
        );
        node
    }

    fn build(mut objects: Vec<(Aabb, Box<dyn Hittable>)>, depth: usize) -> Self {
        match objects.len() {
            0 => return BvhNode::Empty,
            1 => {
                if let Some((bbox, object)) = objects.pop() {
                    return BvhNode::Leaf { object, bbox };
                }
                return BvhNode::Empty;
            }
            _ => {}
        }

        let axis = depth % 3;
        let mid = objects.len() / 2;

        objects.select_nth_unstable_by(mid, |(a, _), (b, _)| {
            let a_val = a.centroid()[axis];
            let b_val = b.centroid()[axis];
            a_val.total_cmp(&b_val)
        });

        let right_objects = objects.split_off(mid);
        let left = Self::build(objects, depth + 1);
        let right = Self::build(right_objects, depth + 1);

        Self::branch(left, right)
    }

    /// Join two subtrees. The node box is the union of the children's boxes;
    /// an empty child contributes nothing.
    pub fn branch(left: BvhNode, right: BvhNode) -> Self {
        let bbox = match (left.bbox(), right.bbox()) {
            (Some(l), Some(r)) => Aabb::surrounding(&l, &r),
            (Some(b), None) | (None, Some(b)) => b,
            (None, None) => return BvhNode::Empty,
        };

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox,
        }
    }

    pub fn bbox(&self) -> Option<Aabb> {
        match self {
            BvhNode::Empty => None,
            BvhNode::Leaf { bbox, .. } | BvhNode::Branch { bbox, .. } => Some(*bbox),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            BvhNode::Empty => 0,
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }

    /// Number of levels, counting leaves as depth 1.
    pub fn depth(&self) -> usize {
        match self {
            BvhNode::Empty => 0,
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, BvhNode::Empty)
    }
}

impl Hittable for BvhNode {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'a>> {
        match self {
            BvhNode::Empty => None,

            BvhNode::Leaf { object, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return None;
                }
                object.hit(ray, ray_t)
            }

            BvhNode::Branch { left, right, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return None;
                }

                let hit_left = left.hit(ray, ray_t);

                // Only check right up to closest hit
                let right_t = hit_left.map_or(ray_t, |rec| ray_t.with_max(rec.t));
                let hit_right = right.hit(ray, right_t);

                hit_right.or(hit_left)
            }
        }
    }

    fn bounding_box(&self) -> Option<Aabb> {
        self.bbox()
    }
}
