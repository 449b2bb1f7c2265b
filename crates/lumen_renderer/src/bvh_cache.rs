//! On-disk BVH cache.
//!
//! Depth-first binary encoding, little-endian. Every node starts with an
//! `i32` tag:
//!
//! | tag | payload |
//! |-----|---------|
//! | `0` | bounding box as six `f64` (`x.min x.max y.min y.max z.min z.max`), then left and right child |
//! | `1` | triangle leaf: three vertices, each three `f64` |
//! | `-1`| empty node, no payload |
//!
//! Leaves holding anything other than a triangle are written as `-1`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use lumen_math::{Aabb, Interval, Vec3};
use thiserror::Error;

use crate::{BvhNode, Hittable, Material, Triangle};

const TAG_BRANCH: i32 = 0;
const TAG_TRIANGLE: i32 = 1;
const TAG_EMPTY: i32 = -1;

/// Deeper trees than this are treated as corrupt input.
const MAX_DEPTH: usize = 256;

#[derive(Error, Debug)]
pub enum BvhCacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown node tag {0}")]
    UnknownTag(i32),

    #[error("Cache nesting exceeds {0} levels")]
    TooDeep(usize),
}

pub type BvhCacheResult<T> = Result<T, BvhCacheError>;

/// Write `node` and its subtree to `writer`.
pub fn encode<W: Write>(node: &BvhNode, writer: &mut W) -> BvhCacheResult<()> {
    match node {
        BvhNode::Empty => writer.write_i32::<LittleEndian>(TAG_EMPTY)?,

        BvhNode::Leaf { object, .. } => match object.triangle_vertices() {
            Some(vertices) => {
                writer.write_i32::<LittleEndian>(TAG_TRIANGLE)?;
                for v in vertices {
                    write_vec3(writer, v)?;
                }
            }
            None => {
                log::debug!("BVH cache: non-triangle leaf written as empty");
                writer.write_i32::<LittleEndian>(TAG_EMPTY)?;
            }
        },

        BvhNode::Branch { left, right, bbox } => {
            writer.write_i32::<LittleEndian>(TAG_BRANCH)?;
            for axis in 0..3 {
                let slab = bbox.axis_interval(axis);
                writer.write_f64::<LittleEndian>(slab.min as f64)?;
                writer.write_f64::<LittleEndian>(slab.max as f64)?;
            }
            encode(left, writer)?;
            encode(right, writer)?;
        }
    }
    Ok(())
}

/// Read a tree written by [`encode`]. Every triangle gets `material`.
pub fn decode<R: Read>(reader: &mut R, material: Arc<dyn Material>) -> BvhCacheResult<BvhNode> {
    decode_node(reader, &material, 0)
}

fn decode_node<R: Read>(
    reader: &mut R,
    material: &Arc<dyn Material>,
    depth: usize,
) -> BvhCacheResult<BvhNode> {
    if depth > MAX_DEPTH {
        return Err(BvhCacheError::TooDeep(MAX_DEPTH));
    }

    match reader.read_i32::<LittleEndian>()? {
        TAG_EMPTY => Ok(BvhNode::Empty),

        TAG_TRIANGLE => {
            let v0 = read_vec3(reader)?;
            let v1 = read_vec3(reader)?;
            let v2 = read_vec3(reader)?;
            let triangle = Triangle::new(v0, v1, v2, material.clone());
            let bbox = triangle.bounding_box().unwrap_or_else(|| Aabb::from_points(v0, v2));
            Ok(BvhNode::Leaf {
                object: Box::new(triangle),
                bbox,
            })
        }

        TAG_BRANCH => {
            let mut slabs = [Interval::EMPTY; 3];
            for slab in &mut slabs {
                let min = reader.read_f64::<LittleEndian>()? as f32;
                let max = reader.read_f64::<LittleEndian>()? as f32;
                *slab = Interval::new(min, max);
            }
            let left = decode_node(reader, material, depth + 1)?;
            let right = decode_node(reader, material, depth + 1)?;

            Ok(BvhNode::Branch {
                left: Box::new(left),
                right: Box::new(right),
                // Stored verbatim; the encoder wrote an already padded box.
                bbox: Aabb {
                    x: slabs[0],
                    y: slabs[1],
                    z: slabs[2],
                },
            })
        }

        other => Err(BvhCacheError::UnknownTag(other)),
    }
}

fn write_vec3<W: Write>(writer: &mut W, v: Vec3) -> BvhCacheResult<()> {
    for c in v.to_array() {
        writer.write_f64::<LittleEndian>(c as f64)?;
    }
    Ok(())
}

fn read_vec3<R: Read>(reader: &mut R) -> BvhCacheResult<Vec3> {
    let x = reader.read_f64::<LittleEndian>()?;
    let y = reader.read_f64::<LittleEndian>()?;
    let z = reader.read_f64::<LittleEndian>()?;
    Ok(Vec3::new(x as f32, y as f32, z as f32))
}

pub fn save_to_file(node: &BvhNode, path: impl AsRef<Path>) -> BvhCacheResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    encode(node, &mut writer)?;
    writer.flush()?;
    log::info!(
        "Saved BVH cache {} ({} leaves)",
        path.display(),
        node.leaf_count()
    );
    Ok(())
}

pub fn load_from_file(
    path: impl AsRef<Path>,
    material: Arc<dyn Material>,
) -> BvhCacheResult<BvhNode> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let node = decode(&mut reader, material)?;
    log::info!(
        "Loaded BVH cache {} ({} leaves, depth {})",
        path.display(),
        node.leaf_count(),
        node.depth()
    );
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Lambertian, Sphere};
    use std::io::Cursor;

    fn grey() -> Arc<dyn Material> {
        Arc::new(Lambertian::new(Vec3::splat(0.5)))
    }

    #[test]
    fn test_empty_round_trip() {
        let mut bytes = Vec::new();
        encode(&BvhNode::Empty, &mut bytes).unwrap();
        assert_eq!(bytes, (-1i32).to_le_bytes());

        let decoded = decode(&mut Cursor::new(bytes), grey()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_triangle_leaf_layout() {
        let tri = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y, grey());
        let bvh = BvhNode::new(vec![Box::new(tri)]);

        let mut bytes = Vec::new();
        encode(&bvh, &mut bytes).unwrap();
        // tag + 9 doubles
        assert_eq!(bytes.len(), 4 + 9 * 8);
        assert_eq!(&bytes[..4], &1i32.to_le_bytes());
    }

    #[test]
    fn test_non_triangle_leaf_is_null() {
        let sphere = Sphere::new(Vec3::ZERO, 1.0, grey());
        let bvh = BvhNode::new(vec![Box::new(sphere)]);

        let mut bytes = Vec::new();
        encode(&bvh, &mut bytes).unwrap();
        assert_eq!(bytes, (-1i32).to_le_bytes());
    }

    #[test]
    fn test_unknown_tag() {
        let bytes = 7i32.to_le_bytes().to_vec();
        let Err(err) = decode(&mut Cursor::new(bytes), grey()) else {
            panic!("unknown tag decoded");
        };
        assert!(matches!(err, BvhCacheError::UnknownTag(7)));
    }

    #[test]
    fn test_truncated_input() {
        let mut bytes = 0i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        let Err(err) = decode(&mut Cursor::new(bytes), grey()) else {
            panic!("truncated input decoded");
        };
        assert!(matches!(err, BvhCacheError::Io(_)));
    }

    #[test]
    fn test_file_round_trip() {
        let tris: Vec<Box<dyn Hittable>> = (0..5)
            .map(|i| {
                let o = Vec3::new(i as f32, 0.0, 0.0);
                Box::new(Triangle::new(o, o + Vec3::X, o + Vec3::Y, grey())) as Box<dyn Hittable>
            })
            .collect();
        let bvh = BvhNode::new(tris);

        let path = std::env::temp_dir().join("lumen_bvh_cache_test.bin");
        save_to_file(&bvh, &path).unwrap();
        let loaded = load_from_file(&path, grey()).unwrap();

        assert_eq!(loaded.leaf_count(), 5);
        assert_eq!(loaded.bbox(), bvh.bbox());
    }
}
