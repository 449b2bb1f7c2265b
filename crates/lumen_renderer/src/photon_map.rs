//! Two-pass photon mapping with a caustic map and final gathering.
//!
//! Pass one shoots photons from the lights and stores them at diffuse
//! surfaces: every diffuse hit goes to the global map, and hits reached
//! only through specular or refractive bounces also go to the caustic map.
//! Pass two traces eye rays. At the first diffuse surface the radiance is
//! direct light from shadow rays, plus the caustic map estimate, plus a
//! final gather whose secondary rays read the global map one bounce away.

use std::f32::consts::PI;

use lumen_math::Vec3;
use rand::RngCore;
use rayon::prelude::*;

use crate::material::Surface;
use crate::renderer::render_rows;
use crate::sampling::{cosine_hemisphere, gen_f32, task_rng};
use crate::spatial::build_index;
use crate::transport::{
    direct_lighting, emit_photon, irradiance_estimate, max_component, surface_interval, Photon,
    MIN_ENERGY, PHOTON_ROULETTE_START,
};
use crate::{
    Camera, Color, Hittable, ImageBuffer, IndexKind, Integrator, Ray, RenderConfig, Scene,
    SpatialIndex,
};

/// Seed stream for photon emission, kept apart from eye rays.
const PHOTON_STREAM: u64 = 0x5048_4f54_4f4e;

/// Stored photons plus the index over their positions.
pub struct PhotonMap {
    photons: Vec<Photon>,
    index: Box<dyn SpatialIndex>,
    radius: f32,
}

impl PhotonMap {
    pub fn new(photons: Vec<Photon>, kind: IndexKind, radius: f32) -> Self {
        let positions: Vec<Vec3> = photons.iter().map(|p| p.position).collect();
        let index = build_index(kind, &positions, radius);
        Self {
            photons,
            index,
            radius,
        }
    }

    pub fn photons(&self) -> &[Photon] {
        &self.photons
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.photons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    /// Irradiance at `point` from photons within the map radius.
    pub fn irradiance(&self, point: Vec3, normal: Vec3) -> Color {
        irradiance_estimate(self.index.as_ref(), &self.photons, point, normal, self.radius)
    }

    /// Outgoing radiance of a Lambertian surface lit by this map.
    pub fn diffuse_radiance(&self, point: Vec3, normal: Vec3, albedo: Color) -> Color {
        self.irradiance(point, normal) * albedo / PI
    }
}

/// The global map and the caustic map built by one photon pass.
pub struct PhotonMaps {
    pub global: PhotonMap,
    pub caustic: PhotonMap,
}

/// Where a photon is in its light path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhotonPath {
    /// Straight from the light
    Direct,
    /// Only specular or refractive bounces so far
    Caustic,
    /// Has reflected off a diffuse surface
    Indirect,
}

/// Photons collected by the emission pass.
#[derive(Default)]
struct PhotonStore {
    global: Vec<Photon>,
    caustic: Vec<Photon>,
}

impl PhotonStore {
    fn merge(mut self, other: PhotonStore) -> Self {
        self.global.extend(other.global);
        self.caustic.extend(other.caustic);
        self
    }
}

/// Two-pass photon mapping integrator.
pub struct PhotonMapper {
    config: RenderConfig,
}

impl PhotonMapper {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Run the photon pass and build the global and caustic maps.
    pub fn build_maps(&self, scene: &Scene) -> PhotonMaps {
        let photon = &self.config.photon;
        let n = photon.photons;
        let start = std::time::Instant::now();

        let store = if scene.lights().is_empty() {
            PhotonStore::default()
        } else {
            (0..n)
                .into_par_iter()
                .fold(PhotonStore::default, |mut store, i| {
                    let mut rng = task_rng(self.config.seed ^ PHOTON_STREAM, i as u64);
                    if let Some((ray, power)) = emit_photon(scene.lights(), n, &mut rng) {
                        self.trace_photon(scene, ray, power, &mut store, &mut rng);
                    }
                    store
                })
                .reduce(PhotonStore::default, PhotonStore::merge)
        };

        log::info!(
            "Photon pass: {} emitted, {} global, {} caustic in {:.2?}",
            n,
            store.global.len(),
            store.caustic.len(),
            start.elapsed()
        );

        PhotonMaps {
            global: PhotonMap::new(store.global, photon.index, photon.radius),
            caustic: PhotonMap::new(
                store.caustic,
                photon.index,
                photon.radius * photon.caustic_radius_scale,
            ),
        }
    }

    fn trace_photon(
        &self,
        scene: &Scene,
        mut ray: Ray,
        mut power: Color,
        store: &mut PhotonStore,
        rng: &mut dyn RngCore,
    ) {
        let mut path = PhotonPath::Direct;

        for depth in 0..self.config.photon.max_photon_depth {
            let Some(rec) = scene.hit(&ray, surface_interval()) else {
                return;
            };

            let (mut weight, next) = match rec.material.surface(&rec) {
                Surface::Emissive { .. } => return,
                Surface::Diffuse { albedo } => {
                    let photon = Photon {
                        position: rec.p,
                        direction: ray.direction().normalize(),
                        power,
                    };
                    if path == PhotonPath::Caustic {
                        store.caustic.push(photon);
                    }
                    store.global.push(photon);
                    path = PhotonPath::Indirect;

                    (albedo, Ray::new(rec.p, cosine_hemisphere(rec.normal, rng)))
                }
                Surface::Specular | Surface::Refractive(_) => {
                    let Some(scatter) = rec.material.scatter(&ray, &rec, rng) else {
                        return;
                    };
                    if path == PhotonPath::Direct {
                        path = PhotonPath::Caustic;
                    }
                    (scatter.attenuation, scatter.scattered)
                }
            };

            if depth > PHOTON_ROULETTE_START {
                let survive = max_component(weight).min(1.0);
                if gen_f32(rng) >= survive {
                    return;
                }
                weight /= survive;
            }

            power *= weight;
            if max_component(power) < MIN_ENERGY {
                return;
            }
            ray = next;
        }
    }

    /// Radiance along an eye ray.
    ///
    /// With `gather_only` set the ray belongs to a final gather: a diffuse
    /// hit reads the global map instead of gathering again, and emitters
    /// contribute nothing.
    pub fn radiance(
        &self,
        scene: &Scene,
        maps: &PhotonMaps,
        ray: &Ray,
        depth: u32,
        gather_only: bool,
        rng: &mut dyn RngCore,
    ) -> Color {
        if depth >= self.config.max_depth {
            return Color::ZERO;
        }

        let Some(rec) = scene.hit(ray, surface_interval()) else {
            return self.config.background_for(ray);
        };

        match rec.material.surface(&rec) {
            Surface::Emissive { radiance } => {
                if gather_only {
                    Color::ZERO
                } else {
                    radiance
                }
            }
            Surface::Diffuse { albedo } => {
                // The global map holds direct and caustic photons too, so
                // it stands alone when there is no final gather.
                if gather_only || self.config.photon.final_gather_samples == 0 {
                    return maps.global.diffuse_radiance(rec.p, rec.normal, albedo);
                }
                let direct = direct_lighting(scene, rec.p, rec.normal, albedo, rng);
                let caustics = maps.caustic.diffuse_radiance(rec.p, rec.normal, albedo);
                let indirect = self.final_gather(scene, maps, rec.p, rec.normal, albedo, rng);
                direct + caustics + indirect
            }
            Surface::Specular | Surface::Refractive(_) => {
                let Some(scatter) = rec.material.scatter(ray, &rec, rng) else {
                    return Color::ZERO;
                };
                if max_component(scatter.attenuation) < MIN_ENERGY {
                    return Color::ZERO;
                }
                scatter.attenuation
                    * self.radiance(scene, maps, &scatter.scattered, depth + 1, gather_only, rng)
            }
        }
    }

    /// Indirect diffuse light at a point from cosine-weighted secondary rays.
    fn final_gather(
        &self,
        scene: &Scene,
        maps: &PhotonMaps,
        point: Vec3,
        normal: Vec3,
        albedo: Color,
        rng: &mut dyn RngCore,
    ) -> Color {
        let samples = self.config.photon.final_gather_samples;
        if samples == 0 || maps.global.is_empty() {
            return Color::ZERO;
        }

        let mut incoming = Color::ZERO;
        for _ in 0..samples {
            let ray = Ray::new(point, cosine_hemisphere(normal, rng));
            incoming += self.radiance(scene, maps, &ray, 0, true, rng);
        }
        // Cosine sampling cancels the cosine and the 1/PI of the BRDF
        albedo * incoming / samples as f32
    }

    fn render_pixel(
        &self,
        scene: &Scene,
        camera: &Camera,
        maps: &PhotonMaps,
        x: u32,
        y: u32,
        rng: &mut dyn RngCore,
    ) -> Color {
        let samples = self.config.samples_per_pixel.max(1);
        let mut pixel_color = Color::ZERO;
        for _ in 0..samples {
            let ray = camera.get_ray(x, y, rng);
            pixel_color += self.radiance(scene, maps, &ray, 0, false, rng);
        }
        pixel_color / samples as f32
    }
}

impl Integrator for PhotonMapper {
    fn render(&self, scene: &Scene, camera: &Camera) -> ImageBuffer {
        let maps = self.build_maps(scene);

        let start = std::time::Instant::now();
        let image = render_rows(
            camera.image_width,
            camera.image_height,
            self.config.seed,
            |x, y, rng| self.render_pixel(scene, camera, &maps, x, y, rng),
        );
        log::info!("Eye pass finished in {:.2?}", start.elapsed());
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dielectric, DiffuseLight, Lambertian, Material, PhotonConfig};
    use std::sync::Arc;

    fn config(photons: u32) -> RenderConfig {
        RenderConfig {
            samples_per_pixel: 1,
            use_sky_gradient: false,
            photon: PhotonConfig {
                photons,
                radius: 0.5,
                final_gather_samples: 4,
                ..PhotonConfig::default()
            },
            ..RenderConfig::default()
        }
    }

    fn floor_with_light(glass: bool) -> Scene {
        let grey: Arc<dyn Material> = Arc::new(Lambertian::new(Color::splat(0.5)));
        let light: Arc<dyn Material> = Arc::new(DiffuseLight::new(Color::splat(5.0)));

        let mut builder = Scene::builder();
        builder.add_plane(Vec3::ZERO, Vec3::Y, grey);
        builder.add_sphere(Vec3::new(0.0, 4.0, 0.0), 0.5, light);
        if glass {
            builder.add_sphere(Vec3::new(0.0, 1.5, 0.0), 0.75, Arc::new(Dielectric::new(1.5)));
        }
        builder.build()
    }

    #[test]
    fn test_no_lights_means_empty_maps() {
        let grey: Arc<dyn Material> = Arc::new(Lambertian::new(Color::splat(0.5)));
        let mut builder = Scene::builder();
        builder.add_plane(Vec3::ZERO, Vec3::Y, grey);
        let scene = builder.build();

        let maps = PhotonMapper::new(config(1000)).build_maps(&scene);
        assert!(maps.global.is_empty());
        assert!(maps.caustic.is_empty());
        assert_eq!(maps.global.irradiance(Vec3::ZERO, Vec3::Y), Color::ZERO);
    }

    #[test]
    fn test_direct_photons_skip_caustic_map() {
        let scene = floor_with_light(false);
        let maps = PhotonMapper::new(config(2000)).build_maps(&scene);

        assert!(!maps.global.is_empty());
        assert!(maps.caustic.is_empty());
        assert!((maps.caustic.radius() - 0.4).abs() < 1e-6);
        for photon in maps.global.photons() {
            assert!(photon.position.y.abs() < 1e-3);
            assert!(photon.direction.y < 0.0);
        }
    }

    #[test]
    fn test_glass_produces_caustic_photons() {
        let scene = floor_with_light(true);
        let maps = PhotonMapper::new(config(4000)).build_maps(&scene);

        assert!(!maps.caustic.is_empty());
        assert!(maps.caustic.len() <= maps.global.len());
    }

    #[test]
    fn test_global_map_estimates_floor_irradiance() {
        let scene = floor_with_light(false);
        let maps = PhotonMapper::new(config(50_000)).build_maps(&scene);

        // Only direct photons reach the floor: E = Le * PI * (r/h)^2 for a
        // sphere light of radius r at height h.
        let expected = 5.0 * PI * (0.5f32 / 4.0).powi(2);
        let estimate = maps.global.irradiance(Vec3::ZERO, Vec3::Y).x;
        assert!(
            (estimate - expected).abs() < 0.3 * expected,
            "estimate {} expected {}",
            estimate,
            expected
        );
    }

    #[test]
    fn test_without_final_gather_global_map_is_not_added_twice() {
        let scene = floor_with_light(false);
        let mut cfg = config(50_000);
        cfg.photon.final_gather_samples = 0;
        let mapper = PhotonMapper::new(cfg);
        let maps = mapper.build_maps(&scene);
        let mut rng = task_rng(3, 3);

        let down = Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y);
        let radiance = mapper.radiance(&scene, &maps, &down, 0, false, &mut rng);
        let global = maps.global.diffuse_radiance(Vec3::ZERO, Vec3::Y, Color::splat(0.5));
        assert!((radiance - global).length() < 1e-6);

        // Lambertian floor under a sphere light: L = albedo / PI * Le * PI * (r/h)^2
        let expected = 0.5 * 5.0 * (0.5f32 / 4.0).powi(2);
        assert!(
            (radiance.x - expected).abs() < 0.3 * expected,
            "radiance {} expected {}",
            radiance.x,
            expected
        );
    }

    #[test]
    fn test_gather_ray_ignores_emitters() {
        let scene = floor_with_light(false);
        let mapper = PhotonMapper::new(config(100));
        let maps = mapper.build_maps(&scene);
        let mut rng = task_rng(1, 1);

        let up = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let gathered = mapper.radiance(&scene, &maps, &up, 0, true, &mut rng);
        let seen = mapper.radiance(&scene, &maps, &up, 0, false, &mut rng);
        assert_eq!(gathered, Color::ZERO);
        assert_eq!(seen, Color::splat(5.0));
    }

    #[test]
    fn test_render_is_finite_and_lit() {
        let scene = floor_with_light(true);
        let camera = Camera::new()
            .with_resolution(8, 6)
            .with_position(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
        let image = PhotonMapper::new(config(5000)).render(&scene, &camera);

        assert!(image
            .pixels
            .iter()
            .all(|p| p.is_finite() && p.min_element() >= 0.0));
        assert!(image.pixels.iter().any(|p| p.x > 0.0));
    }
}
