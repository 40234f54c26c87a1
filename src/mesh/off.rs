use glam::Vec3;

use super::triangulate_fan;
use crate::error::MeshError;
use crate::geometry::Geometry;

/// Parses an Object File Format mesh (`OFF`, `COFF` or `NOFF` header).
///
/// Colours in `COFF` files are ignored; `NOFF` rows carry per-vertex normals.
pub fn load_off_from_str(data: &str) -> Result<Geometry, MeshError> {
    let mut lines = data
        .lines()
        .enumerate()
        .map(|(no, line)| (no + 1, strip_comment(line).trim()))
        .filter(|(_, line)| !line.is_empty());

    let (line_no, header) = lines.next().ok_or(MeshError::Empty)?;
    let mut header_tokens = header.split_whitespace();
    let keyword = header_tokens.next().unwrap_or_default();
    let with_normals = match keyword {
        "OFF" | "COFF" => false,
        "NOFF" | "CNOFF" | "NCOFF" => true,
        other => {
            return Err(MeshError::parse(
                line_no,
                format!("expected OFF header, found {other:?}"),
            ))
        }
    };

    // The counts may share the header line ("OFF 8 12 0").
    let rest: Vec<&str> = header_tokens.collect();
    let (counts_line, counts) = if rest.is_empty() {
        let (no, line) = lines
            .next()
            .ok_or_else(|| MeshError::parse(line_no, "missing element counts"))?;
        (no, parse_numbers::<usize>(no, line)?)
    } else {
        (line_no, parse_numbers::<usize>(line_no, &rest.join(" "))?)
    };
    let [vertex_count, face_count] = match counts.as_slice() {
        [v, f, ..] => [*v, *f],
        _ => {
            return Err(MeshError::parse(
                counts_line,
                "expected vertex and face counts",
            ))
        }
    };

    let mut verts = Vec::new();
    let mut normals = Vec::new();
    for _ in 0..vertex_count {
        let (no, line) = lines
            .next()
            .ok_or_else(|| MeshError::parse(counts_line, "file ends before all vertices"))?;
        let values = parse_numbers::<f32>(no, line)?;
        let needed = if with_normals { 6 } else { 3 };
        if values.len() < needed {
            return Err(MeshError::parse(
                no,
                format!("expected {needed} values per vertex, found {}", values.len()),
            ));
        }
        verts.push(Vec3::new(values[0], values[1], values[2]));
        if with_normals {
            normals.push(Vec3::new(values[3], values[4], values[5]));
        }
    }

    let mut faces = Vec::new();
    for _ in 0..face_count {
        let (no, line) = lines
            .next()
            .ok_or_else(|| MeshError::parse(counts_line, "file ends before all faces"))?;
        let mut tokens = line.split_whitespace();
        let arity = tokens
            .next()
            .and_then(|t| t.parse::<usize>().ok())
            .ok_or_else(|| MeshError::parse(no, "face row must start with its vertex count"))?;
        let polygon = tokens
            .take(arity)
            .map(|t| {
                t.parse::<u32>()
                    .map_err(|err| MeshError::parse(no, format!("invalid index {t:?}: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if polygon.len() != arity || arity < 3 {
            return Err(MeshError::parse(
                no,
                format!("face declares {arity} vertices but lists {}", polygon.len()),
            ));
        }
        triangulate_fan(&polygon, &mut faces);
    }

    let mut geometry = Geometry::new(verts, faces);
    if with_normals {
        geometry.normals = Some(normals);
    }
    geometry.validate()?;
    Ok(geometry)
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(before, _)| before)
}

fn parse_numbers<T: std::str::FromStr>(line_no: usize, line: &str) -> Result<Vec<T>, MeshError>
where
    T::Err: std::fmt::Display,
{
    line.split_whitespace()
        .map(|token| {
            token.parse::<T>().map_err(|err| {
                MeshError::parse(line_no, format!("invalid number {token:?}: {err}"))
            })
        })
        .collect()
}
