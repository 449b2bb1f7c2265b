//! Headless renderer.
//!
//! Usage: `lumen [settings.json]`
//!
//! Without a settings file the demo scene is rendered with default
//! settings to `lumen.png`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use lumen_core::{load_obj, TextureCache};
use lumen_math::Vec3;
use lumen_renderer::bvh_cache;
use lumen_renderer::{
    render, BvhNode, Camera, Color, Dielectric, DiffuseLight, Hittable, ImageTexture, Lambertian,
    Material, Metal, RenderConfig, Scene, SceneBuilder, Texture, Triangle,
};
use serde::{Deserialize, Serialize};

/// Top-level settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct CliSettings {
    width: u32,
    height: u32,
    output: PathBuf,
    render: RenderConfig,
    mesh: Option<MeshSettings>,
    /// Image used as the albedo of the center sphere
    texture: Option<String>,
    /// Directory of the settings file; relative texture paths resolve against it
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            width: 400,
            height: 300,
            output: PathBuf::from("lumen.png"),
            render: RenderConfig::default(),
            mesh: None,
            texture: None,
            base_dir: None,
        }
    }
}

/// An OBJ file to place in the demo scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeshSettings {
    path: PathBuf,
    #[serde(default = "default_scale")]
    scale: f32,
    #[serde(default)]
    offset: Vec3,
    /// BVH cache file; read if present, written after a fresh build
    #[serde(default)]
    cache: Option<PathBuf>,
}

fn default_scale() -> f32 {
    1.0
}

fn load_settings(path: &Path) -> Result<CliSettings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings {}", path.display()))?;
    let mut settings: CliSettings = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse settings {}", path.display()))?;
    settings.base_dir = path.parent().map(Path::to_path_buf);
    Ok(settings)
}

fn texture_cache(settings: &CliSettings) -> TextureCache {
    match &settings.base_dir {
        Some(dir) => TextureCache::with_base_dir(dir),
        None => TextureCache::new(),
    }
}

/// Build (or load from cache) the BVH for the configured mesh.
///
/// Returns `None` when the mesh cannot be read; the rest of the scene
/// still renders.
fn mesh_bvh(settings: &MeshSettings, material: Arc<dyn Material>) -> Option<BvhNode> {
    if let Some(cache) = settings.cache.as_ref().filter(|c| c.exists()) {
        match bvh_cache::load_from_file(cache, material.clone()) {
            Ok(bvh) => return Some(bvh),
            Err(e) => log::warn!("Ignoring BVH cache {}: {}", cache.display(), e),
        }
    }

    let mesh = match load_obj(&settings.path, settings.scale, settings.offset) {
        Ok(mesh) => mesh,
        Err(e) => {
            log::warn!("Skipping mesh: {}", e);
            return None;
        }
    };

    let triangles: Vec<Box<dyn Hittable>> = mesh
        .extract_triangle_vertices()
        .into_iter()
        .map(|[v0, v1, v2]| {
            Box::new(Triangle::new(v0, v1, v2, material.clone())) as Box<dyn Hittable>
        })
        .collect();
    let bvh = BvhNode::new(triangles);

    if let Some(cache) = &settings.cache {
        if let Err(e) = bvh_cache::save_to_file(&bvh, cache) {
            log::warn!("Could not write BVH cache {}: {}", cache.display(), e);
        }
    }
    Some(bvh)
}

/// Glass, metal and diffuse spheres between colored walls under one area light.
fn demo_scene(settings: &CliSettings) -> Scene {
    let ground: Arc<dyn Material> = Arc::new(Lambertian::new(Color::new(0.8, 0.8, 0.7)));
    let back: Arc<dyn Material> = Arc::new(Lambertian::new(Color::splat(0.73)));
    let red: Arc<dyn Material> = Arc::new(Lambertian::new(Color::new(0.65, 0.05, 0.05)));
    let green: Arc<dyn Material> = Arc::new(Lambertian::new(Color::new(0.12, 0.45, 0.15)));
    let light: Arc<dyn Material> = Arc::new(DiffuseLight::new(Color::splat(4.0)));
    let glass: Arc<dyn Material> = Arc::new(Dielectric::with_absorbance(
        1.5,
        Color::new(0.1, 0.02, 0.01),
    ));
    let metal: Arc<dyn Material> = Arc::new(Metal::new(Color::new(0.8, 0.6, 0.2), 0.05));

    let center: Arc<dyn Material> = match &settings.texture {
        Some(path) => {
            let mut cache = texture_cache(settings);
            let texture: Arc<dyn Texture> = Arc::new(ImageTexture::from_result(cache.load(path)));
            Arc::new(Lambertian::textured(texture))
        }
        None => Arc::new(Lambertian::new(Color::new(0.1, 0.2, 0.5))),
    };

    let mut builder = SceneBuilder::new();
    builder
        .add_sphere(Vec3::new(0.0, -100.5, -1.0), 100.0, ground)
        .add_plane(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, back)
        .add_plane(Vec3::new(-2.5, 0.0, 0.0), Vec3::X, red)
        .add_plane(Vec3::new(2.5, 0.0, 0.0), -Vec3::X, green)
        .add_sphere(Vec3::new(0.0, 4.0, -1.0), 1.0, light)
        .add_sphere(Vec3::new(-1.05, 0.0, -1.0), 0.5, glass)
        .add_sphere(Vec3::new(0.0, 0.0, -1.2), 0.5, center)
        .add_sphere(Vec3::new(1.05, 0.0, -1.0), 0.5, metal);

    if let Some(mesh) = &settings.mesh {
        let material: Arc<dyn Material> = Arc::new(Lambertian::new(Color::splat(0.6)));
        if let Some(bvh) = mesh_bvh(mesh, material) {
            builder.add_bvh(bvh);
        }
    }

    builder.build()
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => load_settings(Path::new(&path))?,
        None => CliSettings::default(),
    };
    log::info!("Starting Lumen ({:?} mode)", settings.render.mode);

    let start = Instant::now();
    let scene = demo_scene(&settings);
    log::info!("Scene ready in {:.2?}", start.elapsed());

    let camera = Camera::new()
        .with_resolution(settings.width, settings.height)
        .with_position(Vec3::new(0.0, 1.0, 4.0), Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
        .with_lens(35.0, 0.0, 5.0);

    let image = render(&scene, &camera, &settings.render);

    image::save_buffer(
        &settings.output,
        &image.to_rgb8(),
        image.width,
        image.height,
        image::ColorType::Rgb8,
    )
    .with_context(|| format!("Failed to write {}", settings.output.display()))?;

    log::info!(
        "Wrote {} in {:.2?}",
        settings.output.display(),
        start.elapsed()
    );
    Ok(())
}
