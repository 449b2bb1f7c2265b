//! Progressive photon mapping.
//!
//! One hit point per camera sample, except that a sample may follow both
//! sides of a refractive surface while its branch budget lasts. Photons
//! never branch; they pick reflection or refraction by roulette.

use crate::progressive::{Branching, ProgressiveEngine};
use crate::{Camera, ImageBuffer, Integrator, RenderConfig, Scene};

pub struct ProgressivePhotonMapper {
    config: RenderConfig,
}

impl ProgressivePhotonMapper {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn engine(&self) -> ProgressiveEngine<'_> {
        let extra = self.config.photon.max_hit_points_per_pixel.saturating_sub(1);
        ProgressiveEngine::new(&self.config, Branching::Budget(extra), None)
    }
}

impl Integrator for ProgressivePhotonMapper {
    fn render(&self, scene: &Scene, camera: &Camera) -> ImageBuffer {
        self.engine().render(scene, camera)
    }
}
