//! Balanced kd-tree over points.
//!
//! Built by median split on axis `depth % 3`. Every node stores the bounds
//! of its whole subtree, so a query skips any subtree whose box lies farther
//! than the radius from the query point.

use lumen_math::{Aabb, Vec3};

use crate::SpatialIndex;

const NONE: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct KdNode {
    /// Index into the caller's point slice
    point: u32,
    left: u32,
    right: u32,
    bounds: Aabb,
}

#[derive(Debug, Default)]
pub struct KdTree {
    points: Vec<Vec3>,
    nodes: Vec<KdNode>,
    root: Option<u32>,
}

impl KdTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Height of the tree, zero when empty.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[KdNode], id: u32) -> usize {
            if id == NONE {
                return 0;
            }
            let node = &nodes[id as usize];
            1 + walk(nodes, node.left).max(walk(nodes, node.right))
        }
        self.root.map_or(0, |r| walk(&self.nodes, r))
    }

    fn build_range(&mut self, ids: &mut [u32], depth: usize) -> u32 {
        if ids.is_empty() {
            return NONE;
        }

        let bounds = ids
            .iter()
            .fold(Aabb::empty(), |acc, &i| acc.include(self.points[i as usize]));

        let axis = depth % 3;
        let mid = ids.len() / 2;
        let points = &self.points;
        ids.select_nth_unstable_by(mid, |&a, &b| {
            points[a as usize][axis].total_cmp(&points[b as usize][axis])
        });

        let point = ids[mid];
        let (left_ids, rest) = ids.split_at_mut(mid);
        let right_ids = &mut rest[1..];

        let left = self.build_range(left_ids, depth + 1);
        let right = self.build_range(right_ids, depth + 1);

        self.nodes.push(KdNode {
            point,
            left,
            right,
            bounds,
        });
        (self.nodes.len() - 1) as u32
    }
}

impl SpatialIndex for KdTree {
    fn build(&mut self, points: &[Vec3], _radius: f32) {
        self.points = points.to_vec();
        self.nodes = Vec::with_capacity(points.len());

        let mut ids: Vec<u32> = (0..points.len() as u32).collect();
        let root = self.build_range(&mut ids, 0);
        self.root = (root != NONE).then_some(root);

        log::debug!(
            "Kd-tree: {} points, depth {}",
            self.points.len(),
            self.depth()
        );
    }

    fn query(&self, center: Vec3, radius: f32, visit: &mut dyn FnMut(usize, f32)) {
        let Some(root) = self.root else {
            return;
        };
        let r2 = radius * radius;

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            if node.bounds.distance_squared(center) > r2 {
                continue;
            }

            let i = node.point as usize;
            let d2 = self.points[i].distance_squared(center);
            if d2 <= r2 {
                visit(i, d2);
            }

            if node.left != NONE {
                stack.push(node.left);
            }
            if node.right != NONE {
                stack.push(node.right);
            }
        }
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_empty_tree() {
        let mut tree = KdTree::new();
        tree.build(&[], 1.0);
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);
        tree.query(Vec3::ZERO, 10.0, &mut |_, _| panic!("no points"));
    }

    #[test]
    fn test_tree_is_balanced() {
        let mut rng = StdRng::seed_from_u64(5);
        let points: Vec<Vec3> = (0..1023)
            .map(|_| Vec3::new(rng.gen(), rng.gen(), rng.gen()))
            .collect();
        let mut tree = KdTree::new();
        tree.build(&points, 0.1);
        assert_eq!(tree.depth(), 10);
    }

    #[test]
    fn test_duplicate_points_all_found() {
        let points = vec![Vec3::ONE; 17];
        let mut tree = KdTree::new();
        tree.build(&points, 0.1);

        let mut n = 0;
        tree.query(Vec3::ONE, 0.0, &mut |_, d2| {
            assert_eq!(d2, 0.0);
            n += 1;
        });
        assert_eq!(n, 17);
    }

    #[test]
    fn test_radius_is_respected() {
        let points = vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0, Vec3::X * 3.0];
        let mut tree = KdTree::new();
        tree.build(&points, 1.0);

        let mut found = Vec::new();
        tree.query(Vec3::X * 1.1, 1.0, &mut |i, _| found.push(i));
        found.sort_unstable();
        assert_eq!(found, vec![1, 2]);
    }
}
