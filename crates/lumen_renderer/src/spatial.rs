//! Radius queries over 3-D point sets.
//!
//! Photon maps index photon positions; the progressive integrators index
//! hit-point positions and let photons look them up. Both implementations
//! visit every indexed point within the query radius exactly once.

use lumen_math::Vec3;
use serde::{Deserialize, Serialize};

use crate::{HashGrid, KdTree};

pub trait SpatialIndex: Send + Sync {
    /// Replace the indexed set with `points`.
    ///
    /// `radius` is the typical query radius; grids size their cells from it.
    fn build(&mut self, points: &[Vec3], radius: f32);

    /// Call `visit(index, distance_squared)` for every point within `radius` of `center`.
    fn query(&self, center: Vec3, radius: f32, visit: &mut dyn FnMut(usize, f32));

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which [`SpatialIndex`] implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    HashGrid,
    #[default]
    KdTree,
}

impl IndexKind {
    pub fn create(self) -> Box<dyn SpatialIndex> {
        match self {
            IndexKind::HashGrid => Box::new(HashGrid::new()),
            IndexKind::KdTree => Box::new(KdTree::new()),
        }
    }
}

/// Build an index of the given kind over `points`.
pub fn build_index(kind: IndexKind, points: &[Vec3], radius: f32) -> Box<dyn SpatialIndex> {
    let mut index = kind.create();
    index.build(points, radius);
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_kind_serde() {
        let kind: IndexKind = serde_json::from_str("\"hash_grid\"").unwrap();
        assert_eq!(kind, IndexKind::HashGrid);
        assert_eq!(serde_json::to_string(&IndexKind::KdTree).unwrap(), "\"kd_tree\"");
    }

    #[test]
    fn test_both_kinds_agree() {
        let points: Vec<Vec3> = (0..50)
            .map(|i| Vec3::new((i % 5) as f32 * 0.3, (i / 5) as f32 * 0.3, 0.0))
            .collect();

        for kind in [IndexKind::HashGrid, IndexKind::KdTree] {
            let index = build_index(kind, &points, 0.35);
            assert_eq!(index.len(), 50);

            let mut found = Vec::new();
            index.query(Vec3::new(0.6, 0.6, 0.0), 0.35, &mut |i, d2| {
                assert!(d2 <= 0.35 * 0.35);
                found.push(i);
            });
            found.sort_unstable();
            // Center point plus its four axis neighbours at distance 0.3
            assert_eq!(found.len(), 5, "{:?}", kind);
        }
    }
}
