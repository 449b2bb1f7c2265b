//! Frame driver: render settings, the image buffer, tone mapping, and
//! dispatch to the selected integrator.

use rand::rngs::SmallRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::sampling::task_rng;
use crate::{
    Camera, Color, IndexKind, PathTracer, PhotonMapper, ProgressivePhotonMapper, Scene,
    StochasticPhotonMapper,
};
use lumen_math::Ray;

/// Which integrator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Path,
    PhotonMap,
    Progressive,
    Stochastic,
}

/// Photon-mapping settings shared by the three photon integrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotonConfig {
    /// Photons emitted by the two-pass photon mapper
    pub photons: u32,
    /// Gather radius (initial radius for the progressive integrators)
    pub radius: f32,
    /// Caustic map radius as a fraction of `radius`
    pub caustic_radius_scale: f32,
    /// Secondary rays per final gather
    pub final_gather_samples: u32,
    pub max_photon_depth: u32,
    /// Progressive photon passes
    pub iterations: u32,
    pub photons_per_iteration: u32,
    /// Radius reduction parameter
    pub alpha: f32,
    pub index: IndexKind,
    /// Upper bound on hit points one progressive eye sample may create
    pub max_hit_points_per_pixel: u32,
}

impl Default for PhotonConfig {
    fn default() -> Self {
        Self {
            photons: 200_000,
            radius: 0.1,
            caustic_radius_scale: 0.8,
            final_gather_samples: 64,
            max_photon_depth: 10,
            iterations: 32,
            photons_per_iteration: 100_000,
            alpha: 0.7,
            index: IndexKind::KdTree,
            max_hit_points_per_pixel: 4,
        }
    }
}

impl PhotonConfig {
    /// `alpha` restricted to (0, 1].
    pub fn alpha(&self) -> f32 {
        if self.alpha.is_finite() {
            self.alpha.clamp(0.01, 1.0)
        } else {
            0.7
        }
    }
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub mode: RenderMode,
    /// Camera samples per pixel
    pub samples_per_pixel: u32,
    /// Maximum ray bounce depth
    pub max_depth: u32,
    /// Background color when ray doesn't hit anything
    pub background: Color,
    /// Whether to use sky gradient instead of solid background
    pub use_sky_gradient: bool,
    /// Base seed for every per-task random generator
    pub seed: u64,
    pub photon: PhotonConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Path,
            samples_per_pixel: 16,
            max_depth: 64,
            background: Color::ZERO,
            use_sky_gradient: true,
            seed: 0,
            photon: PhotonConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Radiance for a ray that left the scene.
    pub fn background_for(&self, ray: &Ray) -> Color {
        if self.use_sky_gradient {
            sky_gradient(ray)
        } else {
            self.background
        }
    }
}

/// Blend from white at the horizon to light blue overhead.
pub fn sky_gradient(ray: &Ray) -> Color {
    let unit_direction = ray.direction().normalize_or_zero();
    let a = 0.5 * (unit_direction.y + 1.0);
    Color::ONE * (1.0 - a) + Color::new(0.5, 0.7, 1.0) * a
}

/// Narkowicz's fit of the ACES filmic curve.
#[inline]
pub fn aces(x: f32) -> f32 {
    (x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14)
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Tone map, gamma encode and quantize one linear color.
pub fn color_to_rgb(color: Color) -> [u8; 3] {
    color.to_array().map(|c| {
        let c = if c.is_finite() { c.max(0.0) } else { 0.0 };
        let encoded = linear_to_gamma(aces(c));
        (256.0 * encoded.clamp(0.0, 0.999)) as u8
    })
}

/// Linear radiance per pixel, row-major, top row first.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Encode as packed RGB bytes.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 3);
        for color in &self.pixels {
            bytes.extend_from_slice(&color_to_rgb(*color));
        }
        bytes
    }
}

/// A light-transport algorithm producing a full frame.
pub trait Integrator {
    fn render(&self, scene: &Scene, camera: &Camera) -> ImageBuffer;
}

/// Render with the integrator selected by `config.mode`.
pub fn render(scene: &Scene, camera: &Camera, config: &RenderConfig) -> ImageBuffer {
    log::info!(
        "Rendering {}x{} with {:?}",
        camera.image_width,
        camera.image_height,
        config.mode
    );

    let integrator: Box<dyn Integrator> = match config.mode {
        RenderMode::Path => Box::new(PathTracer::new(config.clone())),
        RenderMode::PhotonMap => Box::new(PhotonMapper::new(config.clone())),
        RenderMode::Progressive => Box::new(ProgressivePhotonMapper::new(config.clone())),
        RenderMode::Stochastic => Box::new(StochasticPhotonMapper::new(config.clone())),
    };

    let start = std::time::Instant::now();
    let image = integrator.render(scene, camera);
    log::info!("Render finished in {:.2?}", start.elapsed());
    image
}

/// Evaluate `shade(x, y, rng)` for every pixel, one rayon task per row.
///
/// Rows are handed out one at a time so expensive rows do not stall a
/// worker's whole chunk.
pub(crate) fn render_rows<F>(width: u32, height: u32, seed: u64, shade: F) -> ImageBuffer
where
    F: Fn(u32, u32, &mut SmallRng) -> Color + Sync,
{
    let rows: Vec<Vec<Color>> = (0..height)
        .into_par_iter()
        .with_max_len(1)
        .map(|y| {
            let mut rng = task_rng(seed, y as u64);
            (0..width).map(|x| shade(x, y, &mut rng)).collect()
        })
        .collect();

    ImageBuffer {
        width,
        height,
        pixels: rows.into_iter().flatten().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_math::Vec3;

    #[test]
    fn test_sky_gradient() {
        let up_color = sky_gradient(&Ray::new(Vec3::ZERO, Vec3::Y));
        let down_color = sky_gradient(&Ray::new(Vec3::ZERO, -Vec3::Y));

        // blue = (0.5, 0.7, 1.0), white = (1.0, 1.0, 1.0)
        assert!((up_color - Color::new(0.5, 0.7, 1.0)).length() < 1e-5);
        assert!((down_color - Color::ONE).length() < 1e-5);
    }

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 0.0001);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 0.0001);
    }

    #[test]
    fn test_color_to_rgb_bounds() {
        assert_eq!(color_to_rgb(Color::ZERO), [0, 0, 0]);
        assert_eq!(color_to_rgb(Color::splat(1e6)), [255, 255, 255]);
        assert_eq!(color_to_rgb(Color::new(f32::NAN, f32::INFINITY, -3.0)), [0, 0, 0]);

        let mid = color_to_rgb(Color::splat(0.18));
        assert!(mid[0] > 0 && mid[0] < 255);
    }

    #[test]
    fn test_to_rgb8_is_row_major_top_first() {
        let image = render_rows(2, 2, 0, |x, y, _| {
            if (x, y) == (1, 0) {
                Color::splat(100.0)
            } else {
                Color::ZERO
            }
        });
        let bytes = image.to_rgb8();

        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..3], &[0, 0, 0]);
        assert_eq!(&bytes[3..6], &[255, 255, 255]);
        assert_eq!(&bytes[6..12], &[0; 6]);
    }

    #[test]
    fn test_render_rows_covers_every_pixel() {
        let image = render_rows(3, 4, 7, |x, y, _| Color::new(x as f32, y as f32, 0.0));
        assert_eq!(image.pixels.len(), 12);
        assert_eq!(image.pixels[3 * 3 + 2], Color::new(2.0, 3.0, 0.0));
        assert_eq!(image.pixels[3], Color::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: RenderConfig =
            serde_json::from_str(r#"{ "mode": "progressive", "photon": { "alpha": 0.85 } }"#)
                .unwrap();
        assert_eq!(config.mode, RenderMode::Progressive);
        assert_eq!(config.samples_per_pixel, 16);
        assert!((config.photon.alpha - 0.85).abs() < 1e-6);
        assert_eq!(config.photon.iterations, 32);
    }

    #[test]
    fn test_alpha_is_clamped() {
        let mut photon = PhotonConfig::default();
        photon.alpha = 3.0;
        assert_eq!(photon.alpha(), 1.0);
        photon.alpha = f32::NAN;
        assert_eq!(photon.alpha(), 0.7);
    }
}
