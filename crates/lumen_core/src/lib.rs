//! Lumen Core - asset types shared by the renderer and the command line tool.
//!
//! This crate provides:
//!
//! - **Meshes**: `Mesh` plus OBJ loading through `tobj`
//! - **Textures**: `TextureImage` decoding through `image`, with a path-keyed `TextureCache`

pub mod mesh;
pub mod texture;

// Re-export commonly used types
pub use mesh::{load_obj, load_obj_from_reader, Mesh, MeshError, MeshResult};
pub use texture::{TextureCache, TextureError, TextureImage, TextureResult};
