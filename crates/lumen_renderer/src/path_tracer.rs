//! Unidirectional Monte Carlo path tracer.
//!
//! Each camera sample follows one recursive path: add emission, scatter,
//! repeat. Deep paths are culled by Russian roulette.

use rand::RngCore;

use crate::renderer::render_rows;
use crate::sampling::gen_f32;
use crate::transport::{max_component, surface_interval, MIN_ENERGY};
use crate::{Camera, Color, Hittable, ImageBuffer, Integrator, Ray, RenderConfig, Scene};

/// Bounces taken before Russian roulette starts.
pub const ROULETTE_START: u32 = 45;

/// Survival probability once roulette is active.
pub const ROULETTE_SURVIVAL: f32 = 0.8;

/// Compute the color seen by a ray.
///
/// `depth` is the number of bounces left; it counts down from
/// `config.max_depth`.
pub fn ray_color(
    ray: &Ray,
    world: &dyn Hittable,
    depth: u32,
    config: &RenderConfig,
    rng: &mut dyn RngCore,
) -> Color {
    if depth == 0 {
        return Color::ZERO;
    }

    let Some(rec) = world.hit(ray, surface_interval()) else {
        return config.background_for(ray);
    };

    let emission = rec.material.emitted_toward(&rec);

    let Some(result) = rec.material.scatter(ray, &rec, rng) else {
        return emission;
    };

    let mut attenuation = result.attenuation;
    let bounces = config.max_depth.saturating_sub(depth);
    if bounces > ROULETTE_START {
        if gen_f32(rng) >= ROULETTE_SURVIVAL {
            return emission;
        }
        attenuation /= ROULETTE_SURVIVAL;
    }

    if max_component(attenuation) < MIN_ENERGY {
        return emission;
    }

    emission + attenuation * ray_color(&result.scattered, world, depth - 1, config, rng)
}

/// Path tracing integrator.
pub struct PathTracer {
    config: RenderConfig,
}

impl PathTracer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Average of `samples_per_pixel` jittered paths through pixel (x, y).
    pub fn render_pixel(
        &self,
        scene: &Scene,
        camera: &Camera,
        x: u32,
        y: u32,
        rng: &mut dyn RngCore,
    ) -> Color {
        let samples = self.config.samples_per_pixel.max(1);
        let mut pixel_color = Color::ZERO;

        for _ in 0..samples {
            let ray = camera.get_ray(x, y, rng);
            pixel_color += ray_color(&ray, scene, self.config.max_depth, &self.config, rng);
        }

        pixel_color / samples as f32
    }
}

impl Integrator for PathTracer {
    fn render(&self, scene: &Scene, camera: &Camera) -> ImageBuffer {
        render_rows(
            camera.image_width,
            camera.image_height,
            self.config.seed,
            |x, y, rng| self.render_pixel(scene, camera, x, y, rng),
        )
    }
}
