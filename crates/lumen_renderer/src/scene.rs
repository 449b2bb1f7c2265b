//! Scene aggregate: the BVH over bounded primitives, a flat list of
//! unbounded ones, and the registered area lights.

use std::sync::Arc;

use lumen_core::Mesh;
use lumen_math::{Aabb, Interval, Ray, Vec3};

use crate::{AreaLight, BvhNode, HitRecord, Hittable, HittableList, Material, Plane, Sphere, Triangle};

/// Read-only scene used by every integrator.
pub struct Scene {
    bvh: BvhNode,
    unbounded: HittableList,
    lights: Vec<AreaLight>,
}

impl Scene {
    pub fn builder() -> SceneBuilder {
        SceneBuilder::new()
    }

    pub fn lights(&self) -> &[AreaLight] {
        &self.lights
    }
}

impl Hittable for Scene {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'a>> {
        let bounded = self.bvh.hit(ray, ray_t);
        let flat_t = bounded.map_or(ray_t, |rec| ray_t.with_max(rec.t));
        self.unbounded.hit(ray, flat_t).or(bounded)
    }

    fn bounding_box(&self) -> Option<Aabb> {
        if self.unbounded.is_empty() {
            self.bvh.bbox()
        } else {
            None
        }
    }
}

/// Collects primitives, then builds an immutable [`Scene`].
///
/// Emissive spheres and triangles are registered as area lights as they are added.
#[derive(Default)]
pub struct SceneBuilder {
    objects: Vec<Box<dyn Hittable>>,
    unbounded: HittableList,
    lights: Vec<AreaLight>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32, material: Arc<dyn Material>) -> &mut Self {
        let sphere = Sphere::new(center, radius, material);
        if sphere.material().is_emissive() && sphere.radius() > 0.0 {
            self.lights.push(AreaLight::Sphere {
                center,
                radius: sphere.radius(),
                material: sphere.material().clone(),
            });
        }
        self.objects.push(Box::new(sphere));
        self
    }

    pub fn add_triangle(&mut self, v0: Vec3, v1: Vec3, v2: Vec3, material: Arc<dyn Material>) -> &mut Self {
        let triangle = Triangle::new(v0, v1, v2, material);
        if triangle.material().is_emissive() && !triangle.is_singular() {
            self.lights.push(AreaLight::Triangle {
                vertices: triangle.vertices(),
                normal: triangle.normal(),
                area: triangle.area(),
                material: triangle.material().clone(),
            });
        }
        self.objects.push(Box::new(triangle));
        self
    }

    pub fn add_plane(&mut self, point: Vec3, normal: Vec3, material: Arc<dyn Material>) -> &mut Self {
        self.unbounded.add(Box::new(Plane::new(point, normal, material)));
        self
    }

    /// Add every triangle of `mesh`, sharing one material.
    pub fn add_mesh(&mut self, mesh: &Mesh, material: Arc<dyn Material>) -> &mut Self {
        for [v0, v1, v2] in mesh.extract_triangle_vertices() {
            self.add_triangle(v0, v1, v2, material.clone());
        }
        self
    }

    /// Add an already built (or cache-loaded) BVH as a single object.
    pub fn add_bvh(&mut self, bvh: BvhNode) -> &mut Self {
        if !bvh.is_empty() {
            self.objects.push(Box::new(bvh));
        }
        self
    }

    /// Add any hittable. Unbounded objects go to the flat list.
    pub fn add(&mut self, object: Box<dyn Hittable>) -> &mut Self {
        if object.bounding_box().is_some() {
            self.objects.push(object);
        } else {
            self.unbounded.add(object);
        }
        self
    }

    pub fn build(self) -> Scene {
        let count = self.objects.len();
        let bvh = BvhNode::new(self.objects);

        if self.lights.is_empty() {
            log::warn!("Scene has no area lights; photon mapping will produce no photons");
        }
        log::info!(
            "Scene built: {} bounded objects, {} unbounded, {} lights",
            count,
            self.unbounded.len(),
            self.lights.len()
        );

        Scene {
            bvh,
            unbounded: self.unbounded,
            lights: self.lights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiffuseLight, Lambertian};

    #[test]
    fn test_scene_hits_bvh_and_planes() {
        let grey: Arc<dyn Material> = Arc::new(Lambertian::new(Vec3::splat(0.5)));
        let mut builder = Scene::builder();
        builder
            .add_sphere(Vec3::new(0.0, 0.0, -3.0), 1.0, grey.clone())
            .add_plane(Vec3::new(0.0, -1.0, 0.0), Vec3::Y, grey);
        let scene = builder.build();

        let t = Interval::new(0.001, f32::INFINITY);
        let forward = scene.hit(&Ray::new(Vec3::ZERO, -Vec3::Z), t).unwrap();
        assert!((forward.t - 2.0).abs() < 0.001);

        let down = scene.hit(&Ray::new(Vec3::ZERO, -Vec3::Y), t).unwrap();
        assert!((down.t - 1.0).abs() < 0.001);

        assert!(scene.bounding_box().is_none());
    }

    #[test]
    fn test_plane_behind_sphere_does_not_win() {
        let grey: Arc<dyn Material> = Arc::new(Lambertian::new(Vec3::splat(0.5)));
        let mut builder = Scene::builder();
        builder
            .add_sphere(Vec3::new(0.0, 0.0, -3.0), 1.0, grey.clone())
            .add_plane(Vec3::new(0.0, 0.0, -10.0), Vec3::Z, grey);
        let scene = builder.build();

        let rec = scene
            .hit(&Ray::new(Vec3::ZERO, -Vec3::Z), Interval::new(0.001, f32::INFINITY))
            .unwrap();
        assert!((rec.t - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_emitters_become_lights() {
        let light: Arc<dyn Material> = Arc::new(DiffuseLight::new(Vec3::ONE));
        let grey: Arc<dyn Material> = Arc::new(Lambertian::new(Vec3::splat(0.5)));

        let mut builder = Scene::builder();
        builder
            .add_sphere(Vec3::new(0.0, 4.0, 0.0), 1.0, light.clone())
            .add_triangle(Vec3::ZERO, Vec3::X, Vec3::Z, light)
            .add_sphere(Vec3::ZERO, 1.0, grey);
        let scene = builder.build();

        assert_eq!(scene.lights().len(), 2);
        assert_eq!(scene.bvh.leaf_count(), 3);
    }

    #[test]
    fn test_add_mesh() {
        let mesh = Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)],
            vec![0, 1, 2, 1, 3, 2],
        );
        let grey: Arc<dyn Material> = Arc::new(Lambertian::new(Vec3::splat(0.5)));

        let mut builder = Scene::builder();
        builder.add_mesh(&mesh, grey);
        let scene = builder.build();
        assert_eq!(scene.bvh.leaf_count(), 2);
    }
}
