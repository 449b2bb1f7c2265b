//! Texture image loading and caching.
//!
//! Images are decoded once through the `image` crate and kept as 8-bit RGB
//! pixels. Sampling is nearest-neighbour with clamped UVs; the renderer's
//! `ImageTexture` wraps a [`TextureImage`] for use in materials.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lumen_math::Vec3;
use thiserror::Error;

/// Errors that can occur during texture loading.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to load texture: {0}")]
    LoadError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Texture has no pixels: {0}")]
    Empty(String),
}

pub type TextureResult<T> = Result<T, TextureError>;

/// A decoded image held in memory.
#[derive(Clone, Debug)]
pub struct TextureImage {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Row-major RGB bytes, first row is the top of the image
    pub pixels: Vec<[u8; 3]>,

    /// Source path, kept for log messages
    pub path: String,
}

impl TextureImage {
    /// Create an image from raw pixels. Fails if the pixel count does not
    /// match `width * height` or the image is empty.
    pub fn new(
        width: u32,
        height: u32,
        pixels: Vec<[u8; 3]>,
        path: impl Into<String>,
    ) -> TextureResult<Self> {
        let path = path.into();
        if width == 0 || height == 0 {
            return Err(TextureError::Empty(path));
        }
        if pixels.len() != (width as usize) * (height as usize) {
            return Err(TextureError::LoadError(format!(
                "{}: expected {} pixels, got {}",
                path,
                width as usize * height as usize,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            path,
        })
    }

    /// Load an image file from disk.
    pub fn open(path: impl AsRef<Path>) -> TextureResult<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|e| {
            TextureError::LoadError(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let pixels = rgb.pixels().map(|p| [p[0], p[1], p[2]]).collect();

        Self::new(width, height, pixels, path.to_string_lossy())
    }

    /// Nearest-neighbour lookup.
    ///
    /// `u` and `v` are clamped to [0, 1]; `v = 1` is the top row of the image.
    pub fn sample(&self, u: f32, v: f32) -> Vec3 {
        let u = u.clamp(0.0, 1.0);
        let v = 1.0 - v.clamp(0.0, 1.0);

        let i = ((u * self.width as f32) as u32).min(self.width - 1);
        let j = ((v * self.height as f32) as u32).min(self.height - 1);

        let [r, g, b] = self.pixels[(j * self.width + i) as usize];
        Vec3::new(r as f32, g as f32, b as f32) / 255.0
    }

    /// Approximate memory footprint of the pixel buffer.
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<[u8; 3]>()
    }
}

/// Cache of decoded images keyed by the path they were requested with.
pub struct TextureCache {
    textures: HashMap<String, Arc<TextureImage>>,

    /// Base directory for resolving relative paths
    base_dir: Option<PathBuf>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: None,
        }
    }

    /// Create a texture cache with a base directory for relative paths.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: Some(base_dir.into()),
        }
    }

    /// Load an image, reusing the cached copy when the same path was seen before.
    pub fn load(&mut self, path: &str) -> TextureResult<Arc<TextureImage>> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }

        let full_path = self.resolve_path(path);
        let texture = Arc::new(TextureImage::open(&full_path)?);
        self.textures.insert(path.to_string(), texture.clone());

        log::debug!(
            "Loaded texture: {} ({}x{}, {:.1} KB)",
            path,
            texture.width,
            texture.height,
            texture.size_bytes() as f32 / 1024.0
        );

        Ok(texture)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);

        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}
