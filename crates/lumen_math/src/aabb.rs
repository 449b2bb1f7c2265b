use crate::{Interval, Ray, Vec3};

const MIN_EXTENT: f32 = 1e-4;

/// Axis-aligned bounding box built from one [`Interval`] per axis.
///
/// Used by the BVH for ray culling and by the kd-tree for radius-query pruning.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create a new AABB from three intervals.
    pub fn new(x: Interval, y: Interval, z: Interval) -> Self {
        let mut aabb = Self { x, y, z };
        aabb.pad_to_minimums();
        aabb
    }

    /// Create an empty AABB (contains nothing).
    pub fn empty() -> Self {
        Self {
            x: Interval::EMPTY,
            y: Interval::EMPTY,
            z: Interval::EMPTY,
        }
    }

    /// Create an AABB from two corner points, in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self::new(
            Interval::new(a.x.min(b.x), a.x.max(b.x)),
            Interval::new(a.y.min(b.y), a.y.max(b.y)),
            Interval::new(a.z.min(b.z), a.z.max(b.z)),
        )
    }

    /// Tight box around a set of points. Returns [`Aabb::empty`] when `points` is empty.
    pub fn from_point_cloud(points: &[Vec3]) -> Self {
        points.iter().fold(Self::empty(), |acc, p| acc.include(*p))
    }

    /// Grow the box so it contains `p`. No padding is applied.
    pub fn include(&self, p: Vec3) -> Self {
        Self {
            x: Interval::new(self.x.min.min(p.x), self.x.max.max(p.x)),
            y: Interval::new(self.y.min.min(p.y), self.y.max.max(p.y)),
            z: Interval::new(self.z.min.min(p.z), self.z.max.max(p.z)),
        }
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// Center of the box.
    pub fn centroid(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    /// Test if a ray intersects this AABB within the given interval.
    ///
    /// Slab method, one axis at a time, narrowing `ray_t` as it goes.
    pub fn hit(&self, r: &Ray, mut ray_t: Interval) -> bool {
        let origin = r.origin();
        let dir = r.direction();

        for axis in 0..3 {
            let slab = self.axis_interval(axis);
            let adinv = 1.0 / dir[axis];

            let mut t0 = (slab.min - origin[axis]) * adinv;
            let mut t1 = (slab.max - origin[axis]) * adinv;
            if adinv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }

            ray_t.min = t0.max(ray_t.min);
            ray_t.max = t1.min(ray_t.max);
            if ray_t.max <= ray_t.min {
                return false;
            }
        }

        true
    }

    /// Squared distance from `p` to the closest point of the box (zero inside).
    pub fn distance_squared(&self, p: Vec3) -> f32 {
        let clamped = p.clamp(self.min(), self.max());
        p.distance_squared(clamped)
    }

    /// Thicken any slab thinner than `MIN_EXTENT` so flat primitives
    /// (axis-aligned triangles) still have a box a ray can hit.
    fn pad_to_minimums(&mut self) {
        for slab in [&mut self.x, &mut self.y, &mut self.z] {
            if slab.size() < MIN_EXTENT {
                *slab = slab.expand(MIN_EXTENT);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_hit() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(aabb.hit(&ray, Interval::new(0.001, f32::INFINITY)));

        let miss = Ray::new(Vec3::new(5.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!aabb.hit(&miss, Interval::new(0.001, f32::INFINITY)));
    }

    #[test]
    fn test_aabb_hit_respects_interval() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));

        // Box spans t in [4, 6]
        assert!(!aabb.hit(&ray, Interval::new(0.001, 3.0)));
        assert!(aabb.hit(&ray, Interval::new(0.001, 4.5)));
    }

    #[test]
    fn test_aabb_surrounding() {
        let a = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_points(Vec3::new(2.0, 2.0, 2.0), Vec3::new(3.0, 3.0, 3.0));
        let s = Aabb::surrounding(&a, &b);

        assert_eq!(s.min(), Vec3::ZERO);
        assert_eq!(s.max(), Vec3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn test_degenerate_box_is_padded() {
        let flat = Aabb::from_points(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 1.0));
        assert!(flat.y.size() > 0.0);
    }

    #[test]
    fn test_point_cloud_and_distance() {
        let points = [Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 2.0, 3.0)];
        let b = Aabb::from_point_cloud(&points);

        assert_eq!(b.min(), Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(b.max(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.distance_squared(Vec3::new(0.0, 1.0, 1.0)), 0.0);
        assert!((b.distance_squared(Vec3::new(3.0, 1.0, 1.0)) - 4.0).abs() < 0.001);
    }

    #[test]
    fn test_centroid_and_axis_interval() {
        let b = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 5.0, 2.0));
        assert!((b.centroid() - Vec3::new(0.5, 2.5, 1.0)).length() < 0.001);
        assert_eq!(b.axis_interval(1), Interval::new(0.0, 5.0));
    }
}
