//! Mesh file readers.
//!
//! Every reader produces a [`Geometry`] that has already been validated:
//! it holds at least one vertex, every face index is in range, and the
//! normals are either absent or one per vertex. Callers that need normals
//! use [`Geometry::ensure_normals`].

mod obj;
mod off;
mod ply;

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::MeshError;
use crate::geometry::Geometry;

pub use obj::load_obj_from_str;
pub use off::load_off_from_str;
pub use ply::load_ply_from_bytes;

/// Reads a mesh from disk, picking the parser from the file extension.
pub fn read_3dobject(path: impl AsRef<Path>) -> Result<Geometry, MeshError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let read = || {
        fs::read(path).map_err(|source| MeshError::Io {
            path: path.to_path_buf(),
            source,
        })
    };

    let geometry = match extension.as_str() {
        "obj" => load_obj_from_str(&into_text(read()?)?)?,
        "off" => load_off_from_str(&into_text(read()?)?)?,
        "ply" => load_ply_from_bytes(&read()?)?,
        other => {
            let name = if other.is_empty() {
                path.display().to_string()
            } else {
                format!(".{other}")
            };
            return Err(MeshError::UnsupportedFormat(name));
        }
    };

    debug!(
        "read {} ({} vertices, {} faces, normals: {})",
        path.display(),
        geometry.verts.len(),
        geometry.faces.len(),
        geometry.normals.is_some()
    );
    Ok(geometry)
}

fn into_text(bytes: Vec<u8>) -> Result<String, MeshError> {
    String::from_utf8(bytes).map_err(|err| MeshError::parse(0, format!("file is not UTF-8: {err}")))
}

/// Splits a polygon into a triangle fan around its first vertex.
pub(crate) fn triangulate_fan<T: Copy>(polygon: &[T], faces: &mut Vec<[T; 3]>) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..(polygon.len() - 1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}
