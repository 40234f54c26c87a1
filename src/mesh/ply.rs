use glam::Vec3;

use super::triangulate_fan;
use crate::error::MeshError;
use crate::geometry::Geometry;

/// Parses a Stanford PLY mesh (ASCII or binary, either byte order).
///
/// Reads `x y z` (and `nx ny nz` when all three are present) from the
/// `vertex` element and `vertex_indices`/`vertex_index` from the `face`
/// element. Every other element is parsed and discarded.
pub fn load_ply_from_bytes(data: &[u8]) -> Result<Geometry, MeshError> {
    let (header_text, body) = split_header(data)?;
    let header = Header::parse(header_text)?;
    let header_lines = header_text.lines().count();

    let mut source: Box<dyn ValueSource + '_> = match header.format {
        Format::Ascii => {
            let text = std::str::from_utf8(body).map_err(|err| {
                MeshError::parse(header_lines, format!("ASCII body is not UTF-8: {err}"))
            })?;
            Box::new(AsciiSource::new(text, header_lines + 1))
        }
        Format::BinaryLittleEndian => Box::new(BinarySource::new(body, false, header_lines)),
        Format::BinaryBigEndian => Box::new(BinarySource::new(body, true, header_lines)),
    };

    let mut verts = Vec::new();
    let mut normals = Vec::new();
    let mut faces = Vec::new();
    let mut saw_vertex = false;

    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => {
                saw_vertex = true;
                let position = ["x", "y", "z"].map(|name| element.scalar_index(name));
                let [Some(px), Some(py), Some(pz)] = position else {
                    return Err(MeshError::parse(header_lines, "vertex element lacks x/y/z"));
                };
                let normal = ["nx", "ny", "nz"].map(|name| element.scalar_index(name));
                let normal = match normal {
                    [Some(nx), Some(ny), Some(nz)] => Some([nx, ny, nz]),
                    _ => None,
                };
                for _ in 0..element.count {
                    let row = read_row(source.as_mut(), element)?;
                    verts.push(Vec3::new(row.scalar(px), row.scalar(py), row.scalar(pz)));
                    if let Some([nx, ny, nz]) = normal {
                        normals.push(Vec3::new(row.scalar(nx), row.scalar(ny), row.scalar(nz)));
                    }
                }
            }
            "face" => {
                let list = element
                    .list_index("vertex_indices")
                    .or_else(|| element.list_index("vertex_index"))
                    .ok_or_else(|| {
                        MeshError::parse(header_lines, "face element lacks vertex_indices")
                    })?;
                for _ in 0..element.count {
                    let row = read_row(source.as_mut(), element)?;
                    let polygon = row
                        .list(list)
                        .iter()
                        .map(|&value| to_index(value, verts.len()))
                        .collect::<Result<Vec<_>, _>>()?;
                    triangulate_fan(&polygon, &mut faces);
                }
            }
            _ => {
                for _ in 0..element.count {
                    read_row(source.as_mut(), element)?;
                }
            }
        }
    }

    if !saw_vertex || verts.is_empty() {
        return Err(MeshError::Empty);
    }

    let mut geometry = Geometry::new(verts, faces);
    if !normals.is_empty() {
        geometry.normals = Some(normals);
    }
    geometry.validate()?;
    Ok(geometry)
}

fn to_index(value: f64, vertex_count: usize) -> Result<u32, MeshError> {
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(MeshError::InvalidFaceIndex {
            index: value as i64,
            vertex_count,
        });
    }
    Ok(value as u32)
}

fn split_header(data: &[u8]) -> Result<(&str, &[u8]), MeshError> {
    const MARKER: &[u8] = b"end_header";
    let start = data
        .windows(MARKER.len())
        .position(|window| window == MARKER)
        .ok_or_else(|| MeshError::parse(1, "PLY header has no end_header"))?;
    let body_start = data[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(data.len(), |offset| start + offset + 1);
    let header = std::str::from_utf8(&data[..body_start])
        .map_err(|err| MeshError::parse(1, format!("PLY header is not UTF-8: {err}")))?;
    Ok((header, &data[body_start..]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PropertyKind {
    Scalar(ScalarType),
    List { count: ScalarType, item: ScalarType },
}

#[derive(Debug, Clone, PartialEq)]
struct Property {
    name: String,
    kind: PropertyKind,
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

impl Element {
    fn scalar_index(&self, name: &str) -> Option<usize> {
        self.properties
            .iter()
            .position(|p| p.name == name && matches!(p.kind, PropertyKind::Scalar(_)))
    }

    fn list_index(&self, name: &str) -> Option<usize> {
        self.properties
            .iter()
            .position(|p| p.name == name && matches!(p.kind, PropertyKind::List { .. }))
    }
}

#[derive(Debug)]
struct Header {
    format: Format,
    elements: Vec<Element>,
}

impl Header {
    fn parse(text: &str) -> Result<Self, MeshError> {
        let mut lines = text.lines().enumerate().map(|(no, line)| (no + 1, line.trim()));
        match lines.next() {
            Some((_, "ply")) => {}
            _ => return Err(MeshError::parse(1, "missing ply magic")),
        }

        let mut format = None;
        let mut elements: Vec<Element> = Vec::new();
        for (no, line) in lines {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                [] | ["comment", ..] | ["obj_info", ..] => {}
                ["format", kind, _version] => {
                    format = Some(match *kind {
                        "ascii" => Format::Ascii,
                        "binary_little_endian" => Format::BinaryLittleEndian,
                        "binary_big_endian" => Format::BinaryBigEndian,
                        other => {
                            return Err(MeshError::parse(
                                no,
                                format!("unknown PLY format {other:?}"),
                            ))
                        }
                    });
                }
                ["element", name, count] => {
                    let count = count.parse::<usize>().map_err(|err| {
                        MeshError::parse(no, format!("invalid element count: {err}"))
                    })?;
                    elements.push(Element {
                        name: (*name).to_string(),
                        count,
                        properties: Vec::new(),
                    });
                }
                ["property", "list", count, item, name] => {
                    let kind = PropertyKind::List {
                        count: scalar(no, count)?,
                        item: scalar(no, item)?,
                    };
                    push_property(&mut elements, no, name, kind)?;
                }
                ["property", ty, name] => {
                    let kind = PropertyKind::Scalar(scalar(no, ty)?);
                    push_property(&mut elements, no, name, kind)?;
                }
                ["end_header"] => break,
                _ => return Err(MeshError::parse(no, format!("unrecognised header line {line:?}"))),
            }
        }

        let format = format.ok_or_else(|| MeshError::parse(1, "PLY header has no format line"))?;
        Ok(Self { format, elements })
    }
}

fn scalar(line: usize, name: &str) -> Result<ScalarType, MeshError> {
    ScalarType::from_name(name)
        .ok_or_else(|| MeshError::parse(line, format!("unknown property type {name:?}")))
}

fn push_property(
    elements: &mut [Element],
    line: usize,
    name: &str,
    kind: PropertyKind,
) -> Result<(), MeshError> {
    let element = elements
        .last_mut()
        .ok_or_else(|| MeshError::parse(line, "property declared before any element"))?;
    element.properties.push(Property {
        name: name.to_string(),
        kind,
    });
    Ok(())
}

/// One decoded element row; list properties keep all their items.
struct Row {
    values: Vec<Value>,
}

enum Value {
    Scalar(f64),
    List(Vec<f64>),
}

impl Row {
    fn scalar(&self, index: usize) -> f32 {
        match &self.values[index] {
            Value::Scalar(v) => *v as f32,
            Value::List(_) => 0.0,
        }
    }

    fn list(&self, index: usize) -> &[f64] {
        match &self.values[index] {
            Value::List(items) => items,
            Value::Scalar(_) => &[],
        }
    }
}

fn read_row<S: ValueSource + ?Sized>(source: &mut S, element: &Element) -> Result<Row, MeshError> {
    let mut values = Vec::with_capacity(element.properties.len());
    for property in &element.properties {
        values.push(match property.kind {
            PropertyKind::Scalar(ty) => Value::Scalar(source.read(ty)?),
            PropertyKind::List { count, item } => {
                let len = source.read(count)?;
                if len < 0.0 {
                    return Err(source.error("negative list length"));
                }
                let items = (0..len as usize)
                    .map(|_| source.read(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::List(items)
            }
        });
    }
    Ok(Row { values })
}

trait ValueSource {
    fn read(&mut self, ty: ScalarType) -> Result<f64, MeshError>;
    fn error(&self, message: &str) -> MeshError;
}

struct AsciiSource<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    tokens: std::str::SplitWhitespace<'a>,
    first_line: usize,
    line: usize,
}

impl<'a> AsciiSource<'a> {
    fn new(text: &'a str, first_line: usize) -> Self {
        Self {
            lines: text.lines().enumerate(),
            tokens: "".split_whitespace(),
            first_line,
            line: first_line,
        }
    }

    fn next_token(&mut self) -> Result<&'a str, MeshError> {
        loop {
            if let Some(token) = self.tokens.next() {
                return Ok(token);
            }
            let (index, line) = self
                .lines
                .next()
                .ok_or_else(|| self.error("unexpected end of data"))?;
            self.line = self.first_line + index;
            self.tokens = line.split_whitespace();
        }
    }
}

impl ValueSource for AsciiSource<'_> {
    fn read(&mut self, ty: ScalarType) -> Result<f64, MeshError> {
        let token = self.next_token()?;
        let value = token
            .parse::<f64>()
            .map_err(|err| self.error(&format!("invalid number {token:?}: {err}")))?;
        if !matches!(ty, ScalarType::F32 | ScalarType::F64) && value.fract() != 0.0 {
            return Err(self.error(&format!("expected an integer, found {token:?}")));
        }
        Ok(value)
    }

    fn error(&self, message: &str) -> MeshError {
        MeshError::parse(self.line, message)
    }
}

struct BinarySource<'a> {
    data: &'a [u8],
    offset: usize,
    big_endian: bool,
    header_lines: usize,
}

impl<'a> BinarySource<'a> {
    fn new(data: &'a [u8], big_endian: bool, header_lines: usize) -> Self {
        Self {
            data,
            offset: 0,
            big_endian,
            header_lines,
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], MeshError> {
        let data = self.data;
        let bytes = data
            .get(self.offset..self.offset + N)
            .ok_or_else(|| self.error("unexpected end of binary data"))?;
        self.offset += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        if self.big_endian {
            out.reverse();
        }
        Ok(out)
    }
}

impl ValueSource for BinarySource<'_> {
    fn read(&mut self, ty: ScalarType) -> Result<f64, MeshError> {
        // Bytes are flipped to little endian by `take`.
        Ok(match ty {
            ScalarType::I8 => f64::from(i8::from_le_bytes(self.take()?)),
            ScalarType::U8 => f64::from(u8::from_le_bytes(self.take()?)),
            ScalarType::I16 => f64::from(i16::from_le_bytes(self.take()?)),
            ScalarType::U16 => f64::from(u16::from_le_bytes(self.take()?)),
            ScalarType::I32 => f64::from(i32::from_le_bytes(self.take()?)),
            ScalarType::U32 => f64::from(u32::from_le_bytes(self.take()?)),
            ScalarType::F32 => f64::from(f32::from_le_bytes(self.take()?)),
            ScalarType::F64 => f64::from_le_bytes(self.take()?),
        })
    }

    fn error(&self, message: &str) -> MeshError {
        MeshError::parse(
            self.header_lines,
            format!("{message} (body byte {})", self.offset),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_QUAD: &str = "ply
format ascii 1.0
comment made by hand
element vertex 4
property float x
property float y
property float z
property float nx
property float ny
property float nz
element face 1
property list uchar int vertex_indices
element edge 1
property int vertex1
property int vertex2
end_header
0 0 0 0 0 1
1 0 0 0 0 1
1 1 0 0 0 1
0 1 0 0 0 1
4 0 1 2 3
0 2
";

    #[test]
    fn parses_ascii_with_normals_and_extra_elements() {
        let mesh = load_ply_from_bytes(ASCII_QUAD.as_bytes()).unwrap();
        assert_eq!(mesh.verts.len(), 4);
        assert_eq!(mesh.verts[2], Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.normals, Some(vec![Vec3::Z; 4]));
    }

    fn binary_triangle(big_endian: bool) -> Vec<u8> {
        let format = if big_endian {
            "binary_big_endian"
        } else {
            "binary_little_endian"
        };
        let mut data = format!(
            "ply\nformat {format} 1.0\nelement vertex 3\nproperty float x\n\
             property float y\nproperty float z\nproperty uchar red\n\
             element face 1\nproperty list uchar uint vertex_index\nend_header\n"
        )
        .into_bytes();
        let points = [[0.0f32, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 3.0, 0.0]];
        for point in points {
            for component in point {
                if big_endian {
                    data.extend_from_slice(&component.to_be_bytes());
                } else {
                    data.extend_from_slice(&component.to_le_bytes());
                }
            }
            data.push(200);
        }
        data.push(3);
        for index in [0u32, 1, 2] {
            if big_endian {
                data.extend_from_slice(&index.to_be_bytes());
            } else {
                data.extend_from_slice(&index.to_le_bytes());
            }
        }
        data
    }

    #[test]
    fn parses_binary_little_endian() {
        let mesh = load_ply_from_bytes(&binary_triangle(false)).unwrap();
        assert_eq!(mesh.verts[1], Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(mesh.verts[2], Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
        assert!(mesh.normals.is_none());
    }

    #[test]
    fn parses_binary_big_endian() {
        let mesh = load_ply_from_bytes(&binary_triangle(true)).unwrap();
        assert_eq!(mesh.verts[2], Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn truncated_binary_body_is_an_error() {
        let mut data = binary_triangle(false);
        data.truncate(data.len() - 2);
        assert!(matches!(
            load_ply_from_bytes(&data),
            Err(MeshError::Parse { .. })
        ));
    }

    #[test]
    fn header_without_end_is_an_error() {
        let data = b"ply\nformat ascii 1.0\nelement vertex 0\n";
        assert!(load_ply_from_bytes(data).is_err());
    }

    #[test]
    fn face_index_out_of_range() {
        let ply = "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\n\
                   property float z\nelement face 1\nproperty list uchar int vertex_indices\n\
                   end_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 3\n";
        assert!(matches!(
            load_ply_from_bytes(ply.as_bytes()),
            Err(MeshError::InvalidFaceIndex { index: 3, vertex_count: 3 })
        ));
    }

    #[test]
    fn huge_vertex_count_fails_without_allocating() {
        let ply = "ply\nformat ascii 1.0\nelement vertex 4611686018427387903\n\
                   property float x\nproperty float y\nproperty float z\nend_header\n\
                   0 0 0\n";
        assert!(matches!(
            load_ply_from_bytes(ply.as_bytes()),
            Err(MeshError::Parse { .. })
        ));
    }

    #[test]
    fn negative_index_reports_vertex_count() {
        let ply = "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\n\
                   property float z\nelement face 1\nproperty list uchar int vertex_indices\n\
                   end_header\n0 0 0\n1 0 0\n0 1 0\n3 0 -1 2\n";
        assert!(matches!(
            load_ply_from_bytes(ply.as_bytes()),
            Err(MeshError::InvalidFaceIndex { index: -1, vertex_count: 3 })
        ));
    }
}
