//! Triangle primitive for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use std::sync::Arc;

use crate::hittable::{HitRecord, Hittable};
use crate::Material;
use lumen_math::{Aabb, Interval, Ray, Vec3};

/// Cross products shorter than this mark a zero-area triangle.
const SINGULAR_EPSILON: f32 = 1e-12;

/// A triangle primitive.
pub struct Triangle {
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Unit face normal, `(v1 - v0) x (v2 - v0)`; zero when singular
    normal: Vec3,
    area: f32,
    material: Arc<dyn Material>,
    bbox: Aabb,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: Arc<dyn Material>) -> Self {
        let cross = (v1 - v0).cross(v2 - v0);
        let len = cross.length();
        let normal = if len > SINGULAR_EPSILON {
            cross / len
        } else {
            Vec3::ZERO
        };

        let bbox = Aabb::from_points(v0.min(v1).min(v2), v0.max(v1).max(v2));

        Self {
            v0,
            v1,
            v2,
            normal,
            area: 0.5 * len,
            material,
            bbox,
        }
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn area(&self) -> f32 {
        self.area
    }

    pub fn is_singular(&self) -> bool {
        self.normal == Vec3::ZERO
    }

    pub fn material(&self) -> &Arc<dyn Material> {
        &self.material
    }
}

impl Hittable for Triangle {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'a>> {
        if self.is_singular() {
            return None;
        }

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction().cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < 1e-8 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin() - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction().dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if !ray_t.surrounds(t) {
            return None;
        }

        Some(HitRecord::new(
            ray,
            t,
            self.normal,
            (u, v),
            self.material.as_ref(),
        ))
    }

    fn bounding_box(&self) -> Option<Aabb> {
        Some(self.bbox)
    }

    fn triangle_vertices(&self) -> Option<[Vec3; 3]> {
        Some(self.vertices())
    }
}
