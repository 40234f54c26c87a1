use std::collections::HashMap;

use glam::Vec3;

use super::triangulate_fan;
use crate::error::MeshError;
use crate::geometry::Geometry;

/// Parses a Wavefront OBJ file from memory.
///
/// Vertices are split per distinct position/normal pair. Normals are only
/// kept when every emitted vertex references one.
pub fn load_obj_from_str(data: &str) -> Result<Geometry, MeshError> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut faces: Vec<[FaceIndex; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let line_no = line_no + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(parse_vec3(parts).map_err(|msg| MeshError::parse(line_no, msg))?),
            "vn" => normals.push(parse_vec3(parts).map_err(|msg| MeshError::parse(line_no, msg))?),
            "f" => {
                let polygon = parse_face(parts).map_err(|msg| MeshError::parse(line_no, msg))?;
                triangulate_fan(&polygon, &mut faces);
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(MeshError::Empty);
    }

    let geometry = build_geometry(&positions, &normals, &faces)?;
    geometry.validate()?;
    Ok(geometry)
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3, String> {
    let mut component = || -> Result<f32, String> {
        let text = parts.next().ok_or("missing vector component")?;
        text.parse::<f32>()
            .map_err(|err| format!("invalid number {text:?}: {err}"))
    };
    Ok(Vec3::new(component()?, component()?, component()?))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>, String> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or("missing vertex index")?;
        let v = v
            .parse::<i64>()
            .map_err(|err| format!("invalid vertex index {v:?}: {err}"))?;
        let _vt = segments.next();
        let vn = match segments.next() {
            Some(s) if !s.is_empty() => s
                .parse::<i64>()
                .map_err(|err| format!("invalid normal index {s:?}: {err}"))?,
            _ => 0,
        };
        indices.push(FaceIndex { v, vn });
    }
    if indices.len() < 3 {
        return Err("faces must reference at least 3 vertices".into());
    }
    Ok(indices)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    normal: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i64,
    vn: i64,
}

fn build_geometry(
    positions: &[Vec3],
    normals: &[Vec3],
    faces: &[[FaceIndex; 3]],
) -> Result<Geometry, MeshError> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut verts = Vec::new();
    let mut vertex_normals = Vec::new();
    let mut all_have_normals = true;
    let mut triangles = Vec::with_capacity(faces.len());

    for face in faces {
        let mut triangle = [0u32; 3];
        for (slot, idx) in triangle.iter_mut().zip(face) {
            let position = fix_index(idx.v, positions.len()).ok_or(MeshError::InvalidFaceIndex {
                index: idx.v,
                vertex_count: positions.len(),
            })?;
            let normal = match idx.vn {
                0 => None,
                vn => Some(fix_index(vn, normals.len()).ok_or(MeshError::InvalidFaceIndex {
                    index: vn,
                    vertex_count: normals.len(),
                })?),
            };
            let key = Key { position, normal };
            *slot = *lookup.entry(key).or_insert_with(|| {
                verts.push(positions[position]);
                match normal {
                    Some(i) => vertex_normals.push(normals[i]),
                    None => {
                        all_have_normals = false;
                        vertex_normals.push(Vec3::ZERO);
                    }
                }
                (verts.len() - 1) as u32
            });
        }
        triangles.push(triangle);
    }

    // Point clouds keep their vertices even without faces.
    if faces.is_empty() {
        verts = positions.to_vec();
        all_have_normals = normals.len() == positions.len();
        vertex_normals = normals.to_vec();
    }

    let mut geometry = Geometry::new(verts, triangles);
    if all_have_normals && !vertex_normals.is_empty() {
        geometry.normals = Some(vertex_normals);
    }
    Ok(geometry)
}

/// Resolves OBJ's 1-based (or negative, relative) indices.
fn fix_index(index: i64, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then(|| len - abs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
        assert_eq!(mesh.verts.len(), 3);
        assert!(mesh.normals.is_none());
    }

    #[test]
    fn keeps_normals_when_every_vertex_has_one() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.normals, Some(vec![Vec3::Z; 3]));
    }

    #[test]
    fn splits_vertices_with_distinct_normals() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nvn 0 0 1\nvn 0 0 -1\n\
                   f 1//1 2//1 3//1\nf 2//2 4//2 3//2\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.verts.len(), 6);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [3, 4, 5]]);
    }

    #[test]
    fn quads_and_negative_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf -4 -3 -2 -1\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 7\n";
        assert!(matches!(
            load_obj_from_str(obj),
            Err(MeshError::InvalidFaceIndex { index: 7, vertex_count: 3 })
        ));
    }

    #[test]
    fn out_of_range_normal_index_is_an_error() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//4\n";
        assert!(matches!(
            load_obj_from_str(obj),
            Err(MeshError::InvalidFaceIndex { index: 4, vertex_count: 1 })
        ));
    }

    #[test]
    fn bad_number_reports_line() {
        let obj = "v 0 0 0\nv 1 zero 0\n";
        assert!(matches!(load_obj_from_str(obj), Err(MeshError::Parse { line: 2, .. })));
    }
}
