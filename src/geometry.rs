use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::MeshError;

/// Indexed triangle mesh as produced by the loaders.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub verts: Vec<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normals: Option<Vec<Vec3>>,
    pub faces: Vec<[u32; 3]>,
}

impl Geometry {
    pub fn new(verts: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            verts,
            normals: None,
            faces,
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Checks that the mesh is non-empty, every face index is in range and
    /// the normals (if any) match the vertex count.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.verts.is_empty() {
            return Err(MeshError::Empty);
        }
        let vertex_count = self.verts.len();
        if let Some(index) = self
            .faces
            .iter()
            .flatten()
            .find(|&&index| index as usize >= vertex_count)
        {
            return Err(MeshError::InvalidFaceIndex {
                index: i64::from(*index),
                vertex_count,
            });
        }
        if let Some(normals) = &self.normals {
            if normals.len() != vertex_count {
                return Err(MeshError::NormalCount {
                    expected: vertex_count,
                    found: normals.len(),
                });
            }
        }
        Ok(())
    }

    /// Fills in per-vertex normals from the face winding when the mesh has none.
    pub fn ensure_normals(&mut self) {
        if self.normals.is_none() {
            self.normals = Some(compute_normals(&self.verts, &self.faces));
        }
    }

    pub fn min_y(&self) -> Option<f32> {
        self.verts.iter().map(|v| v.y).reduce(f32::min)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.verts)
    }

    /// Face indices flattened for upload into an index buffer.
    pub fn indices(&self) -> Vec<u32> {
        self.faces.iter().flatten().copied().collect()
    }
}

/// Area weighted vertex normals; degenerate faces contribute nothing and
/// unreferenced vertices get a zero normal.
pub fn compute_normals(verts: &[Vec3], faces: &[[u32; 3]]) -> Vec<Vec3> {
    let mut accum = vec![Vec3::ZERO; verts.len()];

    for face in faces {
        let [i0, i1, i2] = face.map(|i| i as usize);
        let (Some(p0), Some(p1), Some(p2)) = (verts.get(i0), verts.get(i1), verts.get(i2)) else {
            continue;
        };
        let normal = (*p1 - *p0).cross(*p2 - *p0);
        if normal.length_squared() > f32::EPSILON * f32::EPSILON {
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    accum.into_iter().map(Vec3::normalize_or_zero).collect()
}

/// Axis aligned box around a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        Some(points.iter().fold(
            Self {
                min: first,
                max: first,
            },
            |bounds, &p| Self {
                min: bounds.min.min(p),
                max: bounds.max.max(p),
            },
        ))
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Radius of the bounding sphere centred on [`Bounds::center`].
    pub fn radius(&self) -> f32 {
        (self.max - self.min).length() * 0.5
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Unit cube with four vertices per face so every face has its own normals.
    pub(crate) fn split_cube() -> Geometry {
        let corners = [
            // +X, -X, +Y, -Y, +Z, -Z
            [[1., 0., 0.], [1., 1., 0.], [1., 1., 1.], [1., 0., 1.]],
            [[0., 0., 0.], [0., 0., 1.], [0., 1., 1.], [0., 1., 0.]],
            [[0., 1., 0.], [0., 1., 1.], [1., 1., 1.], [1., 1., 0.]],
            [[0., 0., 0.], [1., 0., 0.], [1., 0., 1.], [0., 0., 1.]],
            [[0., 0., 1.], [1., 0., 1.], [1., 1., 1.], [0., 1., 1.]],
            [[0., 0., 0.], [0., 1., 0.], [1., 1., 0.], [1., 0., 0.]],
        ];
        let mut verts = Vec::new();
        let mut faces = Vec::new();
        for quad in corners {
            let base = verts.len() as u32;
            verts.extend(quad.iter().map(|c| Vec3::from_array(*c)));
            faces.push([base, base + 1, base + 2]);
            faces.push([base + 2, base + 3, base]);
        }
        Geometry::new(verts, faces)
    }

    #[test]
    fn cube_normals_are_perpendicular_to_faces() {
        let cube = split_cube();
        let normals = compute_normals(&cube.verts, &cube.faces);
        assert_eq!(normals.len(), cube.verts.len());

        let expected = [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z];
        for (face, axis) in expected.iter().enumerate() {
            for normal in &normals[face * 4..face * 4 + 4] {
                assert!((normal.length() - 1.0).abs() < 1e-5);
                assert!(normal.distance(*axis) < 1e-5, "{normal} != {axis}");
            }
        }
    }

    #[test]
    fn degenerate_faces_are_ignored() {
        let verts = vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0, Vec3::Y];
        let faces = vec![[0, 1, 2], [0, 1, 3]];
        let normals = compute_normals(&verts, &faces);
        assert!(normals[2] == Vec3::ZERO);
        assert!(normals[0].distance(Vec3::Z) < 1e-6);
    }

    #[test]
    fn validate_rejects_out_of_range_faces() {
        let geometry = Geometry::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 3]]);
        match geometry.validate() {
            Err(MeshError::InvalidFaceIndex {
                index,
                vertex_count,
            }) => {
                assert_eq!(index, 3);
                assert_eq!(vertex_count, 3);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_mismatched_normals() {
        let geometry = Geometry::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 2]])
            .with_normals(vec![Vec3::Z]);
        assert!(matches!(
            geometry.validate(),
            Err(MeshError::NormalCount {
                expected: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn bounds_cover_all_points() {
        let cube = split_cube();
        let bounds = cube.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::ONE);
        assert_eq!(bounds.center(), Vec3::splat(0.5));
        assert!((bounds.radius() - 3f32.sqrt() * 0.5).abs() < 1e-6);
        assert_eq!(cube.min_y(), Some(0.0));
    }
}
