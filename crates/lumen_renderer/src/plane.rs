//! Infinite plane primitive.

use std::sync::Arc;

use crate::hittable::{HitRecord, Hittable};
use crate::sampling::tangent_frame;
use crate::Material;
use lumen_math::{Aabb, Interval, Ray, Vec3};

/// An unbounded plane through `point` with unit `normal`.
///
/// Planes have no bounding box, so a scene keeps them outside its BVH.
pub struct Plane {
    point: Vec3,
    normal: Vec3,
    tangent: Vec3,
    bitangent: Vec3,
    material: Arc<dyn Material>,
}

impl Plane {
    pub fn new(point: Vec3, normal: Vec3, material: Arc<dyn Material>) -> Self {
        let normal = normal.try_normalize().unwrap_or(Vec3::Y);
        let (tangent, bitangent) = tangent_frame(normal);
        Self {
            point,
            normal,
            tangent,
            bitangent,
            material,
        }
    }
}

impl Hittable for Plane {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'a>> {
        let denom = self.normal.dot(ray.direction());
        if denom.abs() <= 1e-6 {
            return None;
        }

        let t = (self.point - ray.origin()).dot(self.normal) / denom;
        if !ray_t.surrounds(t) {
            return None;
        }

        let local = ray.at(t) - self.point;
        let uv = (
            local.dot(self.tangent).rem_euclid(1.0),
            local.dot(self.bitangent).rem_euclid(1.0),
        );

        Some(HitRecord::new(ray, t, self.normal, uv, self.material.as_ref()))
    }

    fn bounding_box(&self) -> Option<Aabb> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Lambertian;

    fn ground() -> Plane {
        Plane::new(
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::Y,
            Arc::new(Lambertian::new(Vec3::splat(0.5))),
        )
    }

    #[test]
    fn test_plane_hit() {
        let plane = ground();
        let ray = Ray::new(Vec3::new(3.0, 2.0, -7.0), Vec3::new(0.0, -1.0, 0.0));

        let rec = plane.hit(&ray, Interval::new(0.001, f32::INFINITY)).unwrap();
        assert!((rec.t - 3.0).abs() < 0.001);
        assert!((rec.p.y + 1.0).abs() < 0.001);
        assert!(rec.front_face);
        assert!((0.0..1.0).contains(&rec.u) && (0.0..1.0).contains(&rec.v));
    }

    #[test]
    fn test_parallel_ray_misses() {
        let plane = ground();
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(plane.hit(&ray, Interval::new(0.001, f32::INFINITY)).is_none());
    }

    #[test]
    fn test_hit_from_below() {
        let plane = ground();
        let ray = Ray::new(Vec3::new(0.0, -4.0, 0.0), Vec3::Y);

        let rec = plane.hit(&ray, Interval::new(0.001, f32::INFINITY)).unwrap();
        assert!(!rec.front_face);
        assert!(rec.normal.dot(ray.direction()) <= 0.0);
    }

    #[test]
    fn test_plane_is_unbounded() {
        assert!(ground().bounding_box().is_none());
    }
}
