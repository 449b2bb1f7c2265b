//! Textures: a pure function of surface coordinates to color.

use std::path::Path;
use std::sync::Arc;

use lumen_core::{TextureImage, TextureResult};
use lumen_math::Vec3;

use crate::Color;

/// Color shown wherever an image texture could not be loaded.
pub const MISSING_TEXTURE: Color = Color::new(1.0, 0.0, 1.0);

pub trait Texture: Send + Sync {
    fn value(&self, u: f32, v: f32, p: Vec3) -> Color;
}

/// A constant color.
#[derive(Debug, Clone, Copy)]
pub struct SolidColor {
    albedo: Color,
}

impl SolidColor {
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }
}

impl Texture for SolidColor {
    fn value(&self, _u: f32, _v: f32, _p: Vec3) -> Color {
        self.albedo
    }
}

/// Nearest-neighbour lookup into a decoded image.
///
/// An `ImageTexture` without an image renders as flat magenta.
#[derive(Clone)]
pub struct ImageTexture {
    image: Option<Arc<TextureImage>>,
}

impl ImageTexture {
    pub fn new(image: Arc<TextureImage>) -> Self {
        Self { image: Some(image) }
    }

    /// Wrap the result of a texture load, falling back to magenta on error.
    pub fn from_result(result: TextureResult<Arc<TextureImage>>) -> Self {
        match result {
            Ok(image) => Self::new(image),
            Err(e) => {
                log::warn!("Texture unavailable, using fallback color: {}", e);
                Self { image: None }
            }
        }
    }

    /// Decode `path` directly, bypassing any cache.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::from_result(TextureImage::open(path).map(Arc::new))
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }
}

impl Texture for ImageTexture {
    fn value(&self, u: f32, v: f32, _p: Vec3) -> Color {
        match &self.image {
            Some(image) => image.sample(u, v),
            None => MISSING_TEXTURE,
        }
    }
}
