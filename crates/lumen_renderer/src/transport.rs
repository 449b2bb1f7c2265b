//! Pieces of light transport shared by the photon-mapping integrators.

use std::f32::consts::PI;

use lumen_math::{Interval, Ray, Vec3};
use rand::RngCore;

use crate::sampling::gen_f32;
use crate::{AreaLight, Color, Hittable, Scene, SpatialIndex};

/// Ray start offset that keeps secondary rays off the surface they left.
pub const T_MIN: f32 = 0.001;

/// Below this, a path's remaining energy no longer matters.
pub const MIN_ENERGY: f32 = 1e-9;

/// Photon bounces taken before Russian roulette starts.
pub const PHOTON_ROULETTE_START: u32 = 5;

/// Interval for every surface query from a hit point or camera.
#[inline]
pub fn surface_interval() -> Interval {
    Interval::new(T_MIN, f32::INFINITY)
}

#[inline]
pub fn max_component(c: Color) -> f32 {
    c.x.max(c.y).max(c.z)
}

/// A photon as stored at a diffuse surface.
#[derive(Debug, Clone, Copy)]
pub struct Photon {
    pub position: Vec3,
    /// Unit direction of travel when the photon arrived
    pub direction: Vec3,
    pub power: Color,
}

impl Photon {
    /// Whether this photon arrived on the side `normal` faces.
    #[inline]
    pub fn lands_on(&self, normal: Vec3) -> bool {
        self.direction.dot(normal) < 0.0
    }
}

/// Emit one of `photon_count` photons from a uniformly chosen light.
///
/// The power is scaled so that summing every photon of the pass estimates
/// the total emitted flux. Returns `None` when the scene has no lights.
pub fn emit_photon(
    lights: &[AreaLight],
    photon_count: u32,
    rng: &mut dyn RngCore,
) -> Option<(Ray, Color)> {
    if lights.is_empty() || photon_count == 0 {
        return None;
    }
    let n = lights.len();
    let light = &lights[((gen_f32(rng) * n as f32) as usize).min(n - 1)];
    let (ray, power) = light.emit_photon(rng);
    Some((ray, power * (n as f32 / photon_count as f32)))
}

/// Direct illumination at a diffuse point from one sampled light.
///
/// Picks a light uniformly, samples a point on it and casts a shadow ray.
/// The result already includes the Lambertian BRDF `albedo / PI`.
pub fn direct_lighting(
    scene: &Scene,
    point: Vec3,
    normal: Vec3,
    albedo: Color,
    rng: &mut dyn RngCore,
) -> Color {
    let lights = scene.lights();
    if lights.is_empty() {
        return Color::ZERO;
    }
    let n = lights.len();
    let light = &lights[((gen_f32(rng) * n as f32) as usize).min(n - 1)];
    let sample = light.sample(rng);

    let to_light = sample.point - point;
    let dist2 = to_light.length_squared();
    if dist2 < 1e-8 {
        return Color::ZERO;
    }
    let wi = to_light / dist2.sqrt();

    let cos_surface = normal.dot(wi);
    let cos_light = sample.normal.dot(-wi);
    if cos_surface <= 0.0 || cos_light <= 0.0 {
        return Color::ZERO;
    }

    // Unnormalized direction: t = 1 is the light sample itself
    let shadow = Ray::new(point, to_light);
    if scene.hit(&shadow, Interval::new(T_MIN, 0.999)).is_some() {
        return Color::ZERO;
    }

    let geometry = cos_surface * cos_light * light.area() / dist2;
    sample.radiance * (albedo / PI) * geometry * n as f32
}

/// Irradiance from photons around `point`: `sum(power) / (PI r^2)`.
///
/// Photons arriving from behind the surface are ignored.
pub fn irradiance_estimate(
    index: &dyn SpatialIndex,
    photons: &[Photon],
    point: Vec3,
    normal: Vec3,
    radius: f32,
) -> Color {
    if photons.is_empty() || radius <= 0.0 {
        return Color::ZERO;
    }

    let mut flux = Color::ZERO;
    index.query(point, radius, &mut |i, _| {
        let photon = &photons[i];
        if photon.lands_on(normal) {
            flux += photon.power;
        }
    });
    flux / (PI * radius * radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::build_index;
    use crate::{DiffuseLight, IndexKind, Lambertian, Material};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn lit_floor(blocker: bool) -> Scene {
        let grey: Arc<dyn Material> = Arc::new(Lambertian::new(Color::splat(0.5)));
        let light: Arc<dyn Material> = Arc::new(DiffuseLight::new(Color::splat(4.0)));

        let mut builder = Scene::builder();
        builder.add_plane(Vec3::ZERO, Vec3::Y, grey.clone());
        builder.add_sphere(Vec3::new(0.0, 3.0, 0.0), 0.5, light);
        if blocker {
            builder.add_sphere(Vec3::new(0.0, 1.5, 0.0), 0.5, grey);
        }
        builder.build()
    }

    #[test]
    fn test_emit_photon_without_lights() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(emit_photon(&[], 100, &mut rng).is_none());
    }

    #[test]
    fn test_emitted_power_sums_to_light_flux() {
        let scene = lit_floor(false);
        let mut rng = StdRng::seed_from_u64(2);
        let n = 1000;
        let mut total = Color::ZERO;
        for _ in 0..n {
            let (_, power) = emit_photon(scene.lights(), n, &mut rng).unwrap();
            total += power;
        }
        // Le * area * PI for a sphere of radius 0.5
        let expected = 4.0 * PI * PI;
        assert!((total.x - expected).abs() < 1e-2 * expected);
    }

    #[test]
    fn test_direct_lighting_and_shadow() {
        let mut rng = StdRng::seed_from_u64(3);
        let open = lit_floor(false);
        let blocked = lit_floor(true);

        let mut lit = Color::ZERO;
        let mut shadowed = Color::ZERO;
        for _ in 0..500 {
            lit += direct_lighting(&open, Vec3::ZERO, Vec3::Y, Color::splat(0.5), &mut rng);
            shadowed += direct_lighting(&blocked, Vec3::ZERO, Vec3::Y, Color::splat(0.5), &mut rng);
        }
        assert!(lit.x > 0.0);
        assert_eq!(shadowed, Color::ZERO);
    }

    #[test]
    fn test_irradiance_respects_normal_gate() {
        let photons = vec![
            Photon {
                position: Vec3::ZERO,
                direction: -Vec3::Y,
                power: Color::ONE,
            },
            Photon {
                position: Vec3::new(0.05, 0.0, 0.0),
                direction: Vec3::Y,
                power: Color::splat(10.0),
            },
        ];
        let positions: Vec<Vec3> = photons.iter().map(|p| p.position).collect();
        let index = build_index(IndexKind::KdTree, &positions, 0.1);

        let e = irradiance_estimate(index.as_ref(), &photons, Vec3::ZERO, Vec3::Y, 0.1);
        assert!((e.x - 1.0 / (PI * 0.01)).abs() < 1e-3);
    }
}
