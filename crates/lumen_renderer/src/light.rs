//! Area lights: emissive spheres and triangles registered by the scene.
//!
//! The photon-mapping integrators sample lights explicitly, both for direct
//! lighting (shadow rays) and for photon emission.

use std::f32::consts::PI;
use std::sync::Arc;

use lumen_math::{Ray, Vec3};
use rand::RngCore;

use crate::sampling::{cosine_hemisphere, random_unit_vector, uniform_triangle};
use crate::{Color, Material, Sphere};

/// A point sampled uniformly on a light's surface.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    pub point: Vec3,
    /// Outward unit normal at `point`
    pub normal: Vec3,
    pub radiance: Color,
}

/// An emitting surface that can be sampled by area.
#[derive(Clone)]
pub enum AreaLight {
    Sphere {
        center: Vec3,
        radius: f32,
        material: Arc<dyn Material>,
    },
    /// One-sided: emits on the side its winding normal points to.
    Triangle {
        vertices: [Vec3; 3],
        normal: Vec3,
        area: f32,
        material: Arc<dyn Material>,
    },
}

impl AreaLight {
    pub fn area(&self) -> f32 {
        match self {
            AreaLight::Sphere { radius, .. } => 4.0 * PI * radius * radius,
            AreaLight::Triangle { area, .. } => *area,
        }
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> LightSample {
        match self {
            AreaLight::Sphere {
                center,
                radius,
                material,
            } => {
                let normal = random_unit_vector(rng);
                let point = *center + normal * *radius;
                let (u, v) = Sphere::uv(normal);
                LightSample {
                    point,
                    normal,
                    radiance: material.emitted(u, v, point),
                }
            }
            AreaLight::Triangle {
                vertices,
                normal,
                material,
                ..
            } => {
                let (point, u, v) = uniform_triangle(vertices[0], vertices[1], vertices[2], rng);
                LightSample {
                    point,
                    normal: *normal,
                    radiance: material.emitted(u, v, point),
                }
            }
        }
    }

    /// Start a photon: uniform point, cosine-weighted outward direction.
    ///
    /// The returned power is `Le * area * PI`, the light's total flux if this
    /// were the only photon. Callers divide by the photon count.
    pub fn emit_photon(&self, rng: &mut dyn RngCore) -> (Ray, Color) {
        let sample = self.sample(rng);
        let direction = cosine_hemisphere(sample.normal, rng);
        let power = sample.radiance * self.area() * PI;
        (Ray::new(sample.point, direction), power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiffuseLight;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn emitter() -> Arc<dyn Material> {
        Arc::new(DiffuseLight::new(Color::splat(2.0)))
    }

    #[test]
    fn test_sphere_light_samples_on_surface() {
        let light = AreaLight::Sphere {
            center: Vec3::new(0.0, 4.0, 0.0),
            radius: 0.5,
            material: emitter(),
        };
        let mut rng = StdRng::seed_from_u64(9);

        assert!((light.area() - PI).abs() < 1e-5);
        for _ in 0..100 {
            let s = light.sample(&mut rng);
            assert!(((s.point - Vec3::new(0.0, 4.0, 0.0)).length() - 0.5).abs() < 1e-4);
            assert!((s.normal.length() - 1.0).abs() < 1e-4);
            assert_eq!(s.radiance, Color::splat(2.0));
        }
    }

    #[test]
    fn test_photon_leaves_outward() {
        let light = AreaLight::Sphere {
            center: Vec3::ZERO,
            radius: 1.0,
            material: emitter(),
        };
        let mut rng = StdRng::seed_from_u64(10);

        for _ in 0..100 {
            let (ray, power) = light.emit_photon(&mut rng);
            assert!(ray.direction().dot(ray.origin()) >= -1e-4);
            assert!((power.x - 2.0 * 4.0 * PI * PI).abs() < 1e-2);
        }
    }

    #[test]
    fn test_triangle_light_uses_winding_normal() {
        let light = AreaLight::Triangle {
            vertices: [Vec3::ZERO, Vec3::X, Vec3::Z],
            normal: -Vec3::Y,
            area: 0.5,
            material: emitter(),
        };
        let mut rng = StdRng::seed_from_u64(12);

        for _ in 0..50 {
            let (ray, _) = light.emit_photon(&mut rng);
            assert!(ray.direction().y <= 1e-4);
            assert!(ray.origin().y.abs() < 1e-5);
        }
    }
}
