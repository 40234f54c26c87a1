//! Draw program descriptors for the depth and color passes.
//!
//! A [`DrawProgram`] is the CPU side of a shader program: which geometry it
//! draws, which vertex attributes feed which shader inputs, and the named
//! uniforms it expects. Values are either fixed at build time or
//! [`DynamicUniform`] placeholders resolved from the active camera every
//! frame. The GPU side lives in `render::gpu_program`.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::camera::CameraMatrices;
use crate::error::RenderError;
use crate::geometry::{Bounds, Geometry};
use crate::light::{Light, Material};

/// Matrices resolved from the camera each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicUniform {
    Modelview,
    ProjectionModelview,
    NormalModelview,
}

/// Texture bindings refreshed by the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    ShadowMap,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Dynamic(DynamicUniform),
    Mat4(Mat4),
    Vec3(Vec3),
    Float(f32),
    Texture(TextureSlot),
}

/// Per-vertex data sources a shader input can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    Positions,
    Normals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Writes depth only, seen from the light.
    Depth,
    /// Shaded output sampling the shadow map.
    Color,
}

impl PassKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Depth => "depth-pass",
            Self::Color => "color-pass",
        }
    }

    /// Uniform block layout the pass's shader declares.
    pub fn uniform_layout(self) -> UniformLayout {
        match self {
            Self::Depth => UniformLayout::new(&[("LightProjectionModelview", UniformType::Mat4)]),
            Self::Color => UniformLayout::new(&[
                ("Modelview", UniformType::Mat4),
                ("ProjectionModelview", UniformType::Mat4),
                ("NormalModelview", UniformType::Mat4),
                ("LightProjectionModelview", UniformType::Mat4),
                ("LightPos", UniformType::Vec3),
                ("AmbientColor", UniformType::Vec3),
                ("DiffuseColor", UniformType::Vec3),
                ("SpecularColor", UniformType::Vec3),
                ("SpecularExp", UniformType::Float),
            ]),
        }
    }

    /// Shader inputs in vertex buffer slot order.
    pub fn vertex_inputs(self) -> &'static [&'static str] {
        match self {
            Self::Depth => &["in_position"],
            Self::Color => &["in_position", "in_normal"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Triangles,
}

/// Descriptor of one shader program drawing one geometry.
#[derive(Debug, Clone)]
pub struct DrawProgram {
    pub kind: PassKind,
    pub mode: DrawMode,
    pub geometry: Arc<Geometry>,
    attributes: BTreeMap<String, VertexAttribute>,
    uniforms: BTreeMap<String, UniformValue>,
    bounds: Option<Bounds>,
}

impl DrawProgram {
    pub fn new(kind: PassKind, mode: DrawMode, geometry: Arc<Geometry>) -> Self {
        Self {
            kind,
            mode,
            geometry,
            attributes: BTreeMap::new(),
            uniforms: BTreeMap::new(),
            bounds: None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    /// Binds a named shader input; rebinding a name replaces it.
    pub fn set_attribute(&mut self, name: impl Into<String>, source: VertexAttribute) {
        self.attributes.insert(name.into(), source);
    }

    /// Binds a named uniform; rebinding a name replaces it.
    pub fn set(&mut self, name: impl Into<String>, value: UniformValue) {
        self.uniforms.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn attribute(&self, name: &str) -> Option<VertexAttribute> {
        self.attributes.get(name).copied()
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn textures(&self) -> impl Iterator<Item = (&str, TextureSlot)> + '_ {
        self.uniforms.iter().filter_map(|(name, value)| match value {
            UniformValue::Texture(slot) => Some((name.as_str(), *slot)),
            _ => None,
        })
    }

    /// Region the viewer frames when it first shows the program.
    pub fn set_bounds(&mut self, points: &[Vec3]) {
        self.bounds = Bounds::from_points(points);
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Packs the uniform block, resolving dynamic values from `camera`.
    pub fn pack_uniforms(&self, camera: &CameraMatrices) -> Result<Vec<u8>, RenderError> {
        self.kind.uniform_layout().pack(self, camera)
    }
}

/// Builds the depth and color programs for one geometry.
///
/// Both programs share the geometry (and therefore its GPU buffers). The
/// depth program projects through the light; the color program is lit by
/// the light, shaded with `material` and samples the shadow map.
pub fn create_shadow_programs(
    geometry: &Arc<Geometry>,
    light: &Light,
    material: &Material,
) -> (DrawProgram, DrawProgram) {
    let mut depth_pass =
        DrawProgram::new(PassKind::Depth, DrawMode::Triangles, Arc::clone(geometry));
    depth_pass.set_attribute("in_position", VertexAttribute::Positions);
    depth_pass.set(
        "LightProjectionModelview",
        UniformValue::Dynamic(DynamicUniform::ProjectionModelview),
    );

    let mut color_pass =
        DrawProgram::new(PassKind::Color, DrawMode::Triangles, Arc::clone(geometry));
    color_pass.set_attribute("in_position", VertexAttribute::Positions);
    color_pass.set_attribute("in_normal", VertexAttribute::Normals);
    color_pass.set("Modelview", UniformValue::Dynamic(DynamicUniform::Modelview));
    color_pass.set(
        "ProjectionModelview",
        UniformValue::Dynamic(DynamicUniform::ProjectionModelview),
    );
    color_pass.set(
        "NormalModelview",
        UniformValue::Dynamic(DynamicUniform::NormalModelview),
    );
    color_pass.set("LightPos", UniformValue::Vec3(light.position()));
    color_pass.set(
        "LightProjectionModelview",
        UniformValue::Mat4(light.projection_view()),
    );
    color_pass.set("AmbientColor", UniformValue::Vec3(material.ambient));
    color_pass.set("DiffuseColor", UniformValue::Vec3(material.diffuse));
    color_pass.set("SpecularColor", UniformValue::Vec3(material.specular));
    color_pass.set("SpecularExp", UniformValue::Float(material.specular_exp));
    color_pass.set("ShadowMap", UniformValue::Texture(TextureSlot::ShadowMap));
    color_pass.set_bounds(&geometry.verts);

    (depth_pass, color_pass)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Mat4,
    Vec3,
    Float,
}

impl UniformType {
    fn align(self) -> usize {
        match self {
            Self::Mat4 | Self::Vec3 => 16,
            Self::Float => 4,
        }
    }

    fn size(self) -> usize {
        match self {
            Self::Mat4 => 64,
            Self::Vec3 => 12,
            Self::Float => 4,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Mat4 => "mat4",
            Self::Vec3 => "vec3",
            Self::Float => "float",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: &'static str,
    pub ty: UniformType,
    pub offset: usize,
}

/// Byte layout of a WGSL uniform struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: usize,
}

impl UniformLayout {
    pub fn new(fields: &[(&'static str, UniformType)]) -> Self {
        let mut offset = 0;
        let mut laid_out = Vec::with_capacity(fields.len());
        for &(name, ty) in fields {
            offset = round_up(offset, ty.align());
            laid_out.push(UniformField { name, ty, offset });
            offset += ty.size();
        }
        Self {
            fields: laid_out,
            size: round_up(offset.max(16), 16),
        }
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn pack(
        &self,
        program: &DrawProgram,
        camera: &CameraMatrices,
    ) -> Result<Vec<u8>, RenderError> {
        let mut bytes = vec![0u8; self.size];
        for field in &self.fields {
            let value = program
                .get(field.name)
                .ok_or_else(|| RenderError::MissingUniform {
                    program: program.label().to_string(),
                    name: field.name.to_string(),
                })?;
            let mismatch = || RenderError::UniformType {
                program: program.label().to_string(),
                name: field.name.to_string(),
                expected: field.ty.name(),
            };
            let slot = &mut bytes[field.offset..field.offset + field.ty.size()];
            match (field.ty, value) {
                (UniformType::Mat4, UniformValue::Mat4(m)) => {
                    slot.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()))
                }
                (UniformType::Mat4, UniformValue::Dynamic(kind)) => {
                    let matrix = camera.resolve(*kind).to_cols_array();
                    slot.copy_from_slice(bytemuck::cast_slice(&matrix))
                }
                (UniformType::Vec3, UniformValue::Vec3(v)) => {
                    slot.copy_from_slice(bytemuck::cast_slice(&v.to_array()))
                }
                (UniformType::Float, UniformValue::Float(f)) => {
                    slot.copy_from_slice(&f.to_ne_bytes())
                }
                _ => return Err(mismatch()),
            }
        }
        Ok(bytes)
    }
}

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::geometry::tests::split_cube;

    fn light() -> Light {
        Light::new(
            Mat4::perspective_rh(1.0, 1.0, 0.1, 10.0),
            Mat4::from_translation(Vec3::new(0.0, -1.0, -4.0)),
        )
    }

    fn programs() -> (DrawProgram, DrawProgram) {
        create_shadow_programs(&Arc::new(split_cube()), &light(), &Material::default())
    }

    #[test]
    fn depth_program_binds_position_and_light_transform() {
        let (depth, _) = programs();
        assert_eq!(depth.kind, PassKind::Depth);
        assert_eq!(depth.attribute("in_position"), Some(VertexAttribute::Positions));
        assert_eq!(depth.attribute("in_normal"), None);
        assert_eq!(
            depth.get("LightProjectionModelview"),
            Some(&UniformValue::Dynamic(DynamicUniform::ProjectionModelview))
        );
        assert_eq!(depth.uniforms().count(), 1);
        assert!(depth.bounds().is_none());
    }

    #[test]
    fn color_program_binds_camera_light_material_and_shadow_map() {
        let (_, color) = programs();
        let light = light();
        assert_eq!(color.attribute("in_normal"), Some(VertexAttribute::Normals));
        assert_eq!(
            color.get("NormalModelview"),
            Some(&UniformValue::Dynamic(DynamicUniform::NormalModelview))
        );
        assert_eq!(color.get("LightPos"), Some(&UniformValue::Vec3(light.position())));
        assert_eq!(
            color.get("LightProjectionModelview"),
            Some(&UniformValue::Mat4(light.projection_view()))
        );
        assert_eq!(color.get("SpecularExp"), Some(&UniformValue::Float(50.0)));
        assert_eq!(
            color.textures().collect::<Vec<_>>(),
            vec![("ShadowMap", TextureSlot::ShadowMap)]
        );
        assert_eq!(color.bounds().map(|b| b.max), Some(Vec3::ONE));
    }

    #[test]
    fn programs_share_geometry() {
        let (depth, color) = programs();
        assert!(Arc::ptr_eq(&depth.geometry, &color.geometry));
    }

    #[test]
    fn rebinding_replaces_value() {
        let (_, mut color) = programs();
        color.set("SpecularExp", UniformValue::Float(8.0));
        assert_eq!(color.get("SpecularExp"), Some(&UniformValue::Float(8.0)));
    }

    #[test]
    fn color_layout_matches_wgsl_offsets() {
        let layout = PassKind::Color.uniform_layout();
        let offsets: Vec<_> = layout.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 64, 128, 192, 256, 272, 288, 304, 316]);
        assert_eq!(layout.size(), 320);
        assert_eq!(PassKind::Depth.uniform_layout().size(), 64);
    }

    #[test]
    fn packs_dynamic_and_static_values() {
        let (_, color) = programs();
        let camera = CameraMatrices::new(
            Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            Mat4::IDENTITY,
        );
        let bytes = color.pack_uniforms(&camera).unwrap();
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        // Modelview translation column.
        assert_eq!(Vec4::from_slice(&floats[12..16]), Vec4::new(1.0, 2.0, 3.0, 1.0));
        // SpecularColor then SpecularExp in the vec3 padding.
        assert_eq!(&floats[76..80], &[1.0, 1.0, 1.0, 50.0]);
    }

    #[test]
    fn wrong_type_and_missing_values_are_errors() {
        let (mut depth, _) = programs();
        let camera = CameraMatrices::new(Mat4::IDENTITY, Mat4::IDENTITY);
        depth.set("LightProjectionModelview", UniformValue::Float(1.0));
        assert!(matches!(
            depth.pack_uniforms(&camera),
            Err(RenderError::UniformType { expected: "mat4", .. })
        ));

        let empty = DrawProgram::new(PassKind::Depth, DrawMode::Triangles, depth.geometry.clone());
        assert!(matches!(
            empty.pack_uniforms(&camera),
            Err(RenderError::MissingUniform { .. })
        ));
    }
}
