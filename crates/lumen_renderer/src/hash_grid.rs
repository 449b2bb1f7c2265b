//! Uniform hash grid.
//!
//! Cells are `2 * radius` wide and hashed into a table with one bucket per
//! point. A query walks every cell overlapped by the query sphere's bounding
//! box; each point remembers its own cell so hash collisions between distant
//! cells never report a point twice.

use lumen_math::{IVec3, Vec3};

use crate::SpatialIndex;

/// Above this many cells per query, scanning all points is cheaper.
const MAX_PROBE_CELLS: i64 = 1 << 16;

#[derive(Debug, Default)]
pub struct HashGrid {
    cell_size: f32,
    points: Vec<Vec3>,
    cells: Vec<IVec3>,
    buckets: Vec<Vec<u32>>,
}

impl HashGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_of(&self, p: Vec3) -> IVec3 {
        (p / self.cell_size).floor().as_ivec3()
    }

    fn bucket_of(&self, cell: IVec3) -> usize {
        let h = (cell.x.wrapping_mul(73_856_093))
            ^ (cell.y.wrapping_mul(19_349_663))
            ^ (cell.z.wrapping_mul(83_492_791));
        (h as u32 as usize) % self.buckets.len()
    }

    fn scan_all(&self, center: Vec3, r2: f32, visit: &mut dyn FnMut(usize, f32)) {
        for (i, p) in self.points.iter().enumerate() {
            let d2 = p.distance_squared(center);
            if d2 <= r2 {
                visit(i, d2);
            }
        }
    }
}

impl SpatialIndex for HashGrid {
    fn build(&mut self, points: &[Vec3], radius: f32) {
        self.cell_size = if radius.is_finite() && radius > 0.0 {
            2.0 * radius
        } else {
            1.0
        };
        self.points = points.to_vec();
        self.buckets = vec![Vec::new(); points.len().max(1)];
        self.cells = points.iter().map(|p| self.cell_of(*p)).collect();

        for (i, cell) in self.cells.iter().enumerate() {
            let b = self.bucket_of(*cell);
            self.buckets[b].push(i as u32);
        }

        log::debug!(
            "Hash grid: {} points, cell size {:.4}",
            self.points.len(),
            self.cell_size
        );
    }

    fn query(&self, center: Vec3, radius: f32, visit: &mut dyn FnMut(usize, f32)) {
        if self.points.is_empty() || radius.is_nan() || radius < 0.0 {
            return;
        }
        let r2 = radius * radius;

        let lo = self.cell_of(center - Vec3::splat(radius));
        let hi = self.cell_of(center + Vec3::splat(radius));
        let span = |a: i32, b: i32| b as i64 - a as i64 + 1;
        let cells = span(lo.x, hi.x)
            .saturating_mul(span(lo.y, hi.y))
            .saturating_mul(span(lo.z, hi.z));
        if cells > MAX_PROBE_CELLS {
            self.scan_all(center, r2, visit);
            return;
        }

        for x in lo.x..=hi.x {
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    let cell = IVec3::new(x, y, z);
                    for &i in &self.buckets[self.bucket_of(cell)] {
                        let i = i as usize;
                        if self.cells[i] != cell {
                            continue;
                        }
                        let d2 = self.points[i].distance_squared(center);
                        if d2 <= r2 {
                            visit(i, d2);
                        }
                    }
                }
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
    fn test_empty_grid() {
        let mut grid = HashGrid::new();
        grid.build(&[], 0.5);
        assert!(grid.is_empty());
        grid.query(Vec3::ZERO, 1.0, &mut |_, _| panic!("no points"));
    }

    #[test]
    fn test_cell_size_from_radius() {
        let mut grid = HashGrid::new();
        grid.build(&[Vec3::ZERO], 0.25);
        assert!((grid.cell_size() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_negative_coordinates_and_cell_edges() {
        let points = vec![
            Vec3::new(-0.01, 0.0, 0.0),
            Vec3::new(0.01, 0.0, 0.0),
            Vec3::new(-1.99, -1.99, -1.99),
        ];
        let mut grid = HashGrid::new();
        grid.build(&points, 0.5);

        let mut found = Vec::new();
        grid.query(Vec3::ZERO, 0.05, &mut |i, _| found.push(i));
        found.sort_unstable();
        assert_eq!(found, vec![0, 1]);
    }

    #[test]
    fn test_each_point_visited_once() {
        let mut rng = StdRng::seed_from_u64(21);
        let points: Vec<Vec3> = (0..300)
            .map(|_| Vec3::new(rng.gen(), rng.gen(), rng.gen()))
            .collect();
        let mut grid = HashGrid::new();
        // Tiny table relative to the number of probed cells forces collisions
        grid.build(&points, 0.05);

        let mut counts = vec![0u32; points.len()];
        grid.query(Vec3::splat(0.5), 0.4, &mut |i, _| counts[i] += 1);
        assert!(counts.iter().all(|&c| c <= 1));
        assert!(counts.iter().any(|&c| c == 1));
    }

    #[test]
    fn test_huge_radius_falls_back_to_scan() {
        let points = vec![Vec3::ZERO, Vec3::splat(100.0)];
        let mut grid = HashGrid::new();
        grid.build(&points, 0.001);

        let mut n = 0;
        grid.query(Vec3::ZERO, 1000.0, &mut |_, _| n += 1);
        assert_eq!(n, 2);
    }
}
