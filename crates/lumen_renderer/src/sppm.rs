//! Stochastic (branching) progressive photon mapping.
//!
//! Eye paths and photons both split into reflected and refracted children
//! at refractive hits up to depth 2, weighted by the Fresnel terms. Deeper
//! down they pick one side by roulette. The iteration loop is the same as
//! for [`ProgressivePhotonMapper`](crate::ProgressivePhotonMapper).

use crate::progressive::{Branching, ProgressiveEngine};
use crate::{Camera, ImageBuffer, Integrator, RenderConfig, Scene};

/// Deepest bounce at which paths still branch.
pub const BRANCH_DEPTH: u32 = 2;

pub struct StochasticPhotonMapper {
    config: RenderConfig,
}

impl StochasticPhotonMapper {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn engine(&self) -> ProgressiveEngine<'_> {
        ProgressiveEngine::new(
            &self.config,
            Branching::Shallow(BRANCH_DEPTH),
            Some(BRANCH_DEPTH),
        )
    }
}

impl Integrator for StochasticPhotonMapper {
    fn render(&self, scene: &Scene, camera: &Camera) -> ImageBuffer {
        self.engine().render(scene, camera)
    }
}
