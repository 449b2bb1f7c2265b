//! Lumen renderer - CPU light transport
//!
//! Scene model (primitives, BVH, materials, textures, lights), the photon
//! and hit-point spatial indices, and four integrators:
//! - [`PathTracer`]: unidirectional path tracing with Russian roulette
//! - [`PhotonMapper`]: global + caustic photon maps with final gathering
//! - [`ProgressivePhotonMapper`]: progressive radius reduction
//! - [`StochasticPhotonMapper`]: progressive, with shallow path branching

mod atomic;
mod bvh;
pub mod bvh_cache;
mod camera;
mod hash_grid;
mod hittable;
mod kd_tree;
mod light;
mod material;
mod path_tracer;
mod photon_map;
mod plane;
mod ppm;
pub mod progressive;
mod renderer;
pub mod sampling;
mod scene;
mod spatial;
mod sphere;
mod sppm;
mod texture;
mod transport;
mod triangle;

pub use atomic::{AtomicColor, AtomicF32};
pub use bvh::BvhNode;
pub use bvh_cache::{BvhCacheError, BvhCacheResult};
pub use camera::Camera;
pub use hash_grid::HashGrid;
pub use hittable::{HitRecord, Hittable, HittableList};
pub use kd_tree::KdTree;
pub use light::{AreaLight, LightSample};
pub use material::{
    reflect, refract, Color, Dielectric, DiffuseLight, FresnelSplit, Lambertian, Material, Metal,
    ScatterResult, Surface,
};
pub use path_tracer::{ray_color, PathTracer};
pub use photon_map::{PhotonMap, PhotonMapper, PhotonMaps};
pub use plane::Plane;
pub use ppm::ProgressivePhotonMapper;
pub use progressive::HitPoint;
pub use renderer::{
    color_to_rgb, render, sky_gradient, ImageBuffer, Integrator, PhotonConfig, RenderConfig,
    RenderMode,
};
pub use scene::{Scene, SceneBuilder};
pub use spatial::{build_index, IndexKind, SpatialIndex};
pub use sphere::Sphere;
pub use sppm::StochasticPhotonMapper;
pub use texture::{ImageTexture, SolidColor, Texture, MISSING_TEXTURE};
pub use transport::{Photon, T_MIN};
pub use triangle::Triangle;

/// Re-export Vec3 and common math types from lumen_math
pub use lumen_math::{Aabb, Interval, Ray, Vec3};
