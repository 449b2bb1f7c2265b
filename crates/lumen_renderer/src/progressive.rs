//! Progressive photon mapping engine shared by PPM and SPPM.
//!
//! An eye pass records a [`HitPoint`] at every diffuse surface a camera
//! path reaches. Each iteration then shoots a fresh batch of photons,
//! deposits them into every hit point whose current radius covers them,
//! and finally shrinks each radius with the rule
//! `r'^2 = r^2 (N + alpha M) / (N + M)`.
//!
//! Photon deposits run in parallel and only touch atomics. The radius
//! update needs `&mut` access to the hit points, so it cannot overlap a
//! photon pass, and the index is rebuilt before the next pass starts.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicU32, Ordering};

use lumen_math::Vec3;
use rand::RngCore;
use rayon::prelude::*;

use crate::atomic::AtomicColor;
use crate::material::Surface;
use crate::sampling::{cosine_hemisphere, gen_f32, task_rng};
use crate::spatial::build_index;
use crate::transport::{
    emit_photon, max_component, surface_interval, Photon, MIN_ENERGY, PHOTON_ROULETTE_START,
};
use crate::{Camera, Color, Dielectric, HitRecord, Hittable, ImageBuffer, Ray, RenderConfig, Scene};

/// A diffuse surface point seen by the camera, collecting photon flux.
#[derive(Debug)]
pub struct HitPoint {
    pub position: Vec3,
    pub normal: Vec3,
    /// Camera path weight, including the BRDF `albedo / PI`
    pub throughput: Color,
    /// Index of the owning pixel in the image buffer
    pub pixel: usize,
    /// Current squared search radius
    pub r2: f32,
    /// Accumulated (reduced) photon count `N`
    pub n_accum: f32,
    /// Accumulated flux, rescaled at every radius reduction
    pub flux_accum: Color,
    count: AtomicU32,
    flux: AtomicColor,
}

impl HitPoint {
    pub fn new(position: Vec3, normal: Vec3, throughput: Color, pixel: usize, radius: f32) -> Self {
        Self {
            position,
            normal,
            throughput,
            pixel,
            r2: radius * radius,
            n_accum: 0.0,
            flux_accum: Color::ZERO,
            count: AtomicU32::new(0),
            flux: AtomicColor::default(),
        }
    }

    pub fn radius(&self) -> f32 {
        self.r2.sqrt()
    }

    /// Photons deposited since the last radius reduction.
    pub fn pending_count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn pending_flux(&self) -> Color {
        self.flux.load()
    }

    /// Add `photon` if it lies within the current radius and arrived on
    /// the side the normal faces. Safe to call from many threads.
    pub fn deposit(&self, photon: &Photon) -> bool {
        if !photon.lands_on(self.normal) {
            return false;
        }
        if photon.position.distance_squared(self.position) > self.r2 {
            return false;
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        self.flux.add(photon.power);
        true
    }

    /// Fold this iteration's photons into the accumulators and shrink the radius.
    pub fn reduce_radius(&mut self, alpha: f32) {
        let m = std::mem::take(self.count.get_mut()) as f32;
        let flux = self.flux.take();
        if m == 0.0 {
            return;
        }

        let n = self.n_accum;
        let ratio = (n + alpha * m) / (n + m);
        self.r2 *= ratio;
        self.flux_accum = (self.flux_accum + flux) * ratio;
        self.n_accum = n + alpha * m;
    }

    /// Radiance estimate after `iterations` photon passes.
    pub fn radiance(&self, iterations: u32) -> Color {
        if iterations == 0 || self.r2 <= 0.0 {
            return Color::ZERO;
        }
        self.throughput * self.flux_accum / (PI * self.r2 * iterations as f32)
    }
}

/// When a path meeting a refractive surface follows both branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branching {
    /// Branch while this many extra paths per camera sample remain
    Budget(u32),
    /// Branch at every refractive hit up to this depth
    Shallow(u32),
}

/// Hit points and directly seen radiance from the eye pass.
pub struct EyePass {
    pub hit_points: Vec<HitPoint>,
    pub direct: ImageBuffer,
}

/// Collects the output of one camera sample.
struct EyeSample<'a> {
    pixel: usize,
    radius: f32,
    branches_left: u32,
    hit_points: &'a mut Vec<HitPoint>,
    direct: Color,
}

/// Iteration loop parameterised by the eye and photon branching policies.
pub struct ProgressiveEngine<'a> {
    config: &'a RenderConfig,
    eye_branching: Branching,
    /// Photons split at refractive hits up to this depth, if any
    photon_branch_depth: Option<u32>,
}

impl<'a> ProgressiveEngine<'a> {
    pub fn new(config: &'a RenderConfig, eye_branching: Branching, photon_branch_depth: Option<u32>) -> Self {
        Self {
            config,
            eye_branching,
            photon_branch_depth,
        }
    }

    pub fn render(&self, scene: &Scene, camera: &Camera) -> ImageBuffer {
        let EyePass {
            mut hit_points,
            direct,
        } = self.eye_pass(scene, camera);

        let iterations = self.config.photon.iterations;
        for iteration in 0..iterations {
            self.iterate(scene, &mut hit_points, iteration);
        }

        let mut image = direct;
        for hp in &hit_points {
            image.pixels[hp.pixel] += hp.radiance(iterations);
        }
        image
    }

    /// One photon pass followed by the radius reduction.
    pub fn iterate(&self, scene: &Scene, hit_points: &mut [HitPoint], iteration: u32) {
        let start = std::time::Instant::now();
        let settings = &self.config.photon;

        let positions: Vec<Vec3> = hit_points.iter().map(|hp| hp.position).collect();
        let max_radius = hit_points.iter().map(HitPoint::radius).fold(0.0, f32::max);
        let index = build_index(settings.index, &positions, max_radius);

        let n = settings.photons_per_iteration;
        if !scene.lights().is_empty() && !hit_points.is_empty() {
            let targets: &[HitPoint] = &*hit_points;
            let deposit = |p: &Photon| {
                index.query(p.position, max_radius, &mut |i, _| {
                    targets[i].deposit(p);
                });
            };

            let seed = self.config.seed.wrapping_add(1 + iteration as u64);
            (0..n).into_par_iter().with_max_len(1).for_each(|i| {
                let mut rng = task_rng(seed, i as u64);
                if let Some((ray, power)) = emit_photon(scene.lights(), n, &mut rng) {
                    self.trace_photon(scene, &ray, power, 0, &deposit, &mut rng);
                }
            });
        }

        let alpha = settings.alpha();
        hit_points.par_iter_mut().for_each(|hp| hp.reduce_radius(alpha));

        log::info!(
            "Iteration {}/{}: {} photons, max radius {:.4}, {:.2?}",
            iteration + 1,
            settings.iterations,
            n,
            max_radius,
            start.elapsed()
        );
    }

    /// Trace every camera sample and record hit points.
    pub fn eye_pass(&self, scene: &Scene, camera: &Camera) -> EyePass {
        let start = std::time::Instant::now();
        let width = camera.image_width;
        let height = camera.image_height;
        let samples = self.config.samples_per_pixel.max(1);
        let weight = Color::splat(1.0 / samples as f32);

        let rows: Vec<(Vec<HitPoint>, Vec<Color>)> = (0..height)
            .into_par_iter()
            .with_max_len(1)
            .map(|y| {
                let mut rng = task_rng(self.config.seed, y as u64);
                let mut hit_points = Vec::new();
                let mut colors = Vec::with_capacity(width as usize);

                for x in 0..width {
                    let mut sample = EyeSample {
                        pixel: (y as usize) * (width as usize) + x as usize,
                        radius: self.config.photon.radius,
                        branches_left: 0,
                        hit_points: &mut hit_points,
                        direct: Color::ZERO,
                    };
                    for _ in 0..samples {
                        if let Branching::Budget(extra) = self.eye_branching {
                            sample.branches_left = extra;
                        }
                        let ray = camera.get_ray(x, y, &mut rng);
                        self.trace_eye(scene, &ray, weight, 0, &mut sample, &mut rng);
                    }
                    colors.push(sample.direct);
                }
                (hit_points, colors)
            })
            .collect();

        let mut hit_points = Vec::new();
        let mut direct = ImageBuffer {
            width,
            height,
            pixels: Vec::with_capacity((width as usize) * (height as usize)),
        };
        for (points, colors) in rows {
            hit_points.extend(points);
            direct.pixels.extend(colors);
        }

        log::info!(
            "Eye pass: {} hit points in {:.2?}",
            hit_points.len(),
            start.elapsed()
        );
        EyePass { hit_points, direct }
    }

    fn should_branch(&self, depth: u32, sample: &mut EyeSample) -> bool {
        match self.eye_branching {
            Branching::Budget(_) => {
                if sample.branches_left > 0 {
                    sample.branches_left -= 1;
                    true
                } else {
                    false
                }
            }
            Branching::Shallow(max_depth) => depth <= max_depth,
        }
    }

    fn trace_eye(
        &self,
        scene: &Scene,
        ray: &Ray,
        throughput: Color,
        depth: u32,
        sample: &mut EyeSample,
        rng: &mut dyn RngCore,
    ) {
        if depth >= self.config.max_depth || max_component(throughput) < MIN_ENERGY {
            return;
        }

        let Some(rec) = scene.hit(ray, surface_interval()) else {
            sample.direct += throughput * self.config.background_for(ray);
            return;
        };

        match rec.material.surface(&rec) {
            Surface::Emissive { radiance } => sample.direct += throughput * radiance,
            Surface::Diffuse { albedo } => sample.hit_points.push(HitPoint::new(
                rec.p,
                rec.normal,
                throughput * albedo / PI,
                sample.pixel,
                sample.radius,
            )),
            Surface::Specular => {
                if let Some(scatter) = rec.material.scatter(ray, &rec, rng) {
                    let next = throughput * scatter.attenuation;
                    self.trace_eye(scene, &scatter.scattered, next, depth + 1, sample, rng);
                }
            }
            Surface::Refractive(dielectric) => {
                let branch = self.should_branch(depth, sample);
                for (weight, next) in refractive_children(dielectric, ray, &rec, branch, rng) {
                    self.trace_eye(scene, &next, throughput * weight, depth + 1, sample, rng);
                }
            }
        }
    }

    fn trace_photon(
        &self,
        scene: &Scene,
        ray: &Ray,
        power: Color,
        depth: u32,
        deposit: &(dyn Fn(&Photon) + Sync),
        rng: &mut dyn RngCore,
    ) {
        if depth >= self.config.photon.max_photon_depth || max_component(power) < MIN_ENERGY {
            return;
        }

        let Some(rec) = scene.hit(ray, surface_interval()) else {
            return;
        };

        match rec.material.surface(&rec) {
            Surface::Emissive { .. } => {}
            Surface::Diffuse { albedo } => {
                deposit(&Photon {
                    position: rec.p,
                    direction: ray.direction().normalize(),
                    power,
                });

                let mut weight = albedo;
                if depth > PHOTON_ROULETTE_START {
                    let survive = max_component(albedo).min(1.0);
                    if gen_f32(rng) >= survive {
                        return;
                    }
                    weight /= survive;
                }
                let next = Ray::new(rec.p, cosine_hemisphere(rec.normal, rng));
                self.trace_photon(scene, &next, power * weight, depth + 1, deposit, rng);
            }
            Surface::Specular => {
                if let Some(scatter) = rec.material.scatter(ray, &rec, rng) {
                    let next = power * scatter.attenuation;
                    self.trace_photon(scene, &scatter.scattered, next, depth + 1, deposit, rng);
                }
            }
            Surface::Refractive(dielectric) => {
                let branch = self.photon_branch_depth.is_some_and(|d| depth <= d);
                for (weight, next) in refractive_children(dielectric, ray, &rec, branch, rng) {
                    self.trace_photon(scene, &next, power * weight, depth + 1, deposit, rng);
                }
            }
        }
    }
}

/// Continuations of a path at a dielectric interface.
///
/// With `branch` set, both the reflected and the refracted path are
/// returned, weighted by `Re` and `Tr`. Otherwise one is chosen with
/// probability `P = 0.25 + 0.5 Re` and weighted by `Re / P` or
/// `Tr / (1 - P)`. Every weight includes the Beer's-law transmission of
/// the segment just travelled.
pub fn refractive_children(
    dielectric: &Dielectric,
    ray: &Ray,
    rec: &HitRecord,
    branch: bool,
    rng: &mut dyn RngCore,
) -> Vec<(Color, Ray)> {
    let split = dielectric.fresnel_split(ray, rec);
    let reflected = Ray::new(rec.p, split.reflected);

    let Some(refracted) = split.refracted.map(|dir| Ray::new(rec.p, dir)) else {
        return vec![(split.transmission, reflected)];
    };

    if branch {
        return vec![
            (split.transmission * split.reflectance, reflected),
            (split.transmission * split.transmittance, refracted),
        ];
    }

    let p = split.reflect_probability();
    if gen_f32(rng) < p {
        vec![(split.transmission * (split.reflectance / p), reflected)]
    } else {
        vec![(split.transmission * (split.transmittance / (1.0 - p)), refracted)]
    }
}
