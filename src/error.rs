use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while reading a mesh file.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("unable to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported mesh format: {0}")]
    UnsupportedFormat(String),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("face references vertex {index} but the mesh has {vertex_count} vertices")]
    InvalidFaceIndex { index: i64, vertex_count: usize },
    #[error("expected {expected} normals, found {found}")]
    NormalCount { expected: usize, found: usize },
    #[error("mesh does not define any vertices")]
    Empty,
}

impl MeshError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Failures raised while turning draw programs into GPU work.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("shader compilation failed for {program}: {message}")]
    ShaderCompilation { program: String, message: String },
    #[error("program {program} is missing uniform {name}")]
    MissingUniform { program: String, name: String },
    #[error("uniform {name} of program {program} must be a {expected}")]
    UniformType {
        program: String,
        name: String,
        expected: &'static str,
    },
    #[error("program {program} is missing vertex attribute {name}")]
    MissingAttribute { program: String, name: String },
    #[error("program {program} has no shadow map bound")]
    UnboundTexture { program: String },
    #[error("framebuffer has no depth attachment yet")]
    NoDepthAttachment,
}
