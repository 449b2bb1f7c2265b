//! Triangle mesh geometry and Wavefront OBJ loading.
//!
//! Meshes are plain position/index buffers. The renderer turns them into
//! individual triangles via [`Mesh::extract_triangle_vertices`].

use std::io::BufRead;
use std::path::Path;

use lumen_math::{Aabb, Vec3};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Failed to parse OBJ {path}: {source}")]
    Obj {
        path: String,
        #[source]
        source: tobj::LoadError,
    },

    #[error("OBJ {0} contains no geometry")]
    NoGeometry(String),
}

pub type MeshResult<T> = Result<T, MeshError>;

/// A mesh of vertex positions and triangle indices.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box
    pub bounds: Aabb,
}

impl Mesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            indices,
            bounds,
        }
    }

    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        if positions.is_empty() {
            return Aabb::empty();
        }

        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);

        for pos in positions {
            min = min.min(*pos);
            max = max.max(*pos);
        }

        Aabb::from_points(min, max)
    }

    /// Scale every vertex about the origin, then translate.
    pub fn transformed(mut self, scale: f32, offset: Vec3) -> Self {
        for p in &mut self.positions {
            *p = *p * scale + offset;
        }
        self.bounds = Self::compute_bounds(&self.positions);
        self
    }

    /// Get the mesh center (center of bounding box).
    pub fn center(&self) -> Vec3 {
        self.bounds.centroid()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Resolve the index buffer into one `[v0, v1, v2]` per triangle.
    ///
    /// Triangles referencing vertices that do not exist are skipped with a warning.
    pub fn extract_triangle_vertices(&self) -> Vec<[Vec3; 3]> {
        let mut triangles = Vec::with_capacity(self.triangle_count());

        for chunk in self.indices.chunks_exact(3) {
            let i0 = chunk[0] as usize;
            let i1 = chunk[1] as usize;
            let i2 = chunk[2] as usize;

            if i0 >= self.positions.len()
                || i1 >= self.positions.len()
                || i2 >= self.positions.len()
            {
                log::warn!(
                    "Invalid triangle indices: [{}, {}, {}], vertex count: {}",
                    i0,
                    i1,
                    i2,
                    self.positions.len()
                );
                continue;
            }

            triangles.push([self.positions[i0], self.positions[i1], self.positions[i2]]);
        }

        triangles
    }
}

fn obj_load_options() -> tobj::LoadOptions {
    // Polygons are fan-triangulated around their first vertex.
    tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// Merge every model of an OBJ file into one mesh.
fn merge_models(models: &[tobj::Model], name: &str) -> MeshResult<Mesh> {
    let mut positions = Vec::new();
    let mut indices = Vec::new();

    for model in models {
        let base = positions.len() as u32;
        positions.extend(
            model
                .mesh
                .positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2])),
        );
        indices.extend(model.mesh.indices.iter().map(|i| base + i));
    }

    if indices.is_empty() {
        return Err(MeshError::NoGeometry(name.to_string()));
    }

    log::debug!(
        "Parsed OBJ {}: {} models, {} vertices, {} triangles",
        name,
        models.len(),
        positions.len(),
        indices.len() / 3
    );

    Ok(Mesh::new(positions, indices))
}

/// Load an OBJ file, scaling each vertex by `scale` and then offsetting it.
///
/// Materials referenced by the file are ignored.
pub fn load_obj(path: impl AsRef<Path>, scale: f32, offset: Vec3) -> MeshResult<Mesh> {
    let path = path.as_ref();
    let name = path.display().to_string();

    let (models, _materials) =
        tobj::load_obj(path, &obj_load_options()).map_err(|source| MeshError::Obj {
            path: name.clone(),
            source,
        })?;

    let mesh = merge_models(&models, &name)?.transformed(scale, offset);
    log::info!(
        "Loaded mesh {}: {} vertices, {} triangles",
        name,
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Parse OBJ text from any buffered reader. Material libraries are not loaded.
pub fn load_obj_from_reader<R: BufRead>(
    reader: &mut R,
    scale: f32,
    offset: Vec3,
) -> MeshResult<Mesh> {
    let name = "<reader>";
    let (models, _materials) = tobj::load_obj_buf(reader, &obj_load_options(), |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })
    .map_err(|source| MeshError::Obj {
        path: name.to_string(),
        source,
    })?;

    Ok(merge_models(&models, name)?.transformed(scale, offset))
}
