//! GPU side of [`DrawProgram`]: pipeline, uniform buffer and bind group.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use wgpu::util::DeviceExt;

use crate::camera::CameraMatrices;
use crate::error::RenderError;
use crate::geometry::{Bounds, Geometry};
use crate::program::{DrawProgram, PassKind, VertexAttribute};
use crate::scene::ShadowScene;

use super::context::CurrentContext;
use super::framebuffer::DEPTH_FORMAT;

const DEPTH_PASS_SHADER: &str = include_str!("shaders/depth_pass.wgsl");
const COLOR_PASS_SHADER: &str = include_str!("shaders/color_pass.wgsl");

fn shader_source(kind: PassKind) -> &'static str {
    match kind {
        PassKind::Depth => DEPTH_PASS_SHADER,
        PassKind::Color => COLOR_PASS_SHADER,
    }
}

/// Vertex and index buffers of one [`Geometry`], shared by every program
/// drawing it.
pub struct GeometryBuffers {
    positions: wgpu::Buffer,
    normals: Option<wgpu::Buffer>,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl GeometryBuffers {
    pub fn upload(device: &wgpu::Device, geometry: &Geometry, label: &str) -> Self {
        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-positions")),
            contents: bytemuck::cast_slice(&geometry.verts),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let normals = geometry.normals.as_ref().map(|normals| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label}-normals")),
                contents: bytemuck::cast_slice(normals),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        let indices = geometry.indices();
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            positions,
            normals,
            indices: index_buffer,
            index_count: indices.len() as u32,
        }
    }

    fn buffer(&self, attribute: VertexAttribute) -> Option<&wgpu::Buffer> {
        match attribute {
            VertexAttribute::Positions => Some(&self.positions),
            VertexAttribute::Normals => self.normals.as_ref(),
        }
    }
}

/// Color attachment the program renders into, if any.
#[derive(Debug, Clone, Copy)]
pub struct ProgramTarget {
    pub color_format: Option<wgpu::TextureFormat>,
}

impl ProgramTarget {
    pub fn depth_only() -> Self {
        Self { color_format: None }
    }

    pub fn color(format: wgpu::TextureFormat) -> Self {
        Self {
            color_format: Some(format),
        }
    }
}

pub struct GpuProgram {
    program: DrawProgram,
    buffers: Arc<GeometryBuffers>,
    vertex_slots: Vec<VertexAttribute>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
    shadow_sampler: Option<wgpu::Sampler>,
}

impl GpuProgram {
    /// Compiles `program`'s shader and builds its pipeline. Validation
    /// errors raised while doing so are reported as
    /// [`RenderError::ShaderCompilation`].
    pub fn new(
        device: &wgpu::Device,
        program: &DrawProgram,
        buffers: Arc<GeometryBuffers>,
        target: ProgramTarget,
    ) -> Result<Self, RenderError> {
        let label = program.label();
        let vertex_slots = program
            .kind
            .vertex_inputs()
            .iter()
            .map(|&name| {
                program
                    .attribute(name)
                    .filter(|&attribute| buffers.buffer(attribute).is_some())
                    .ok_or_else(|| RenderError::MissingAttribute {
                        program: label.to_string(),
                        name: name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let samples_shadow_map = program.textures().next().is_some();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(shader_source(program.kind).into()),
        });

        let mut layout_entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(
                    program.kind.uniform_layout().size() as u64,
                ),
            },
            count: None,
        }];
        if samples_shadow_map {
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            });
        }
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label}-bind-layout")),
            entries: &layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label}-pipeline-layout")),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = (0..vertex_slots.len())
            .map(|location| {
                [wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: location as u32,
                }]
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = attributes
            .iter()
            .map(|attribute| wgpu::VertexBufferLayout {
                array_stride: (3 * std::mem::size_of::<f32>()) as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        let color_targets = [target.color_format.map(|format| wgpu::ColorTargetState {
            format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let fragment = target.color_format.map(|_| wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &color_targets,
        });
        let bias = match program.kind {
            PassKind::Depth => wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
            PassKind::Color => wgpu::DepthBiasState::default(),
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{label}-pipeline")),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &vertex_buffers,
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias,
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment,
            multiview: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompilation {
                program: label.to_string(),
                message: error.to_string(),
            });
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}-uniforms")),
            size: program.kind.uniform_layout().size() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = (!samples_shadow_map).then(|| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{label}-bind-group")),
                layout: &bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            })
        });

        Ok(Self {
            program: program.clone(),
            buffers,
            vertex_slots,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            bind_group,
            shadow_sampler: None,
        })
    }

    pub fn program(&self) -> &DrawProgram {
        &self.program
    }

    pub fn samples_shadow_map(&self) -> bool {
        self.program.textures().next().is_some()
    }

    /// Points the program's shadow map uniform at `view`. Programs without
    /// a texture uniform ignore the call.
    pub fn set_shadow_map(&mut self, device: &wgpu::Device, view: &wgpu::TextureView) {
        if !self.samples_shadow_map() {
            return;
        }
        let label = self.program.label();
        let sampler = self.shadow_sampler.get_or_insert_with(|| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("shadow-sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                compare: Some(wgpu::CompareFunction::LessEqual),
                ..Default::default()
            })
        });
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label}-bind-group")),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        }));
    }

    /// Uploads the uniform block resolved against `camera`.
    pub fn update(&self, queue: &wgpu::Queue, camera: &CameraMatrices) -> Result<(), RenderError> {
        let bytes = self.program.pack_uniforms(camera)?;
        queue.write_buffer(&self.uniform_buffer, 0, &bytes);
        Ok(())
    }

    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) -> Result<(), RenderError> {
        let bind_group = self
            .bind_group
            .as_ref()
            .ok_or_else(|| RenderError::UnboundTexture {
                program: self.program.label().to_string(),
            })?;
        if self.buffers.index_count == 0 {
            return Ok(());
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        for (slot, attribute) in self.vertex_slots.iter().enumerate() {
            if let Some(buffer) = self.buffers.buffer(*attribute) {
                pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
        }
        pass.set_index_buffer(self.buffers.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.buffers.index_count, 0, 0..1);
        Ok(())
    }
}

/// GPU programs for a whole [`ShadowScene`].
pub struct GpuScene {
    pub depth: Vec<GpuProgram>,
    pub color: Vec<GpuProgram>,
    bounds: Option<Bounds>,
}

impl GpuScene {
    /// Uploads each geometry once and builds both passes' programs.
    pub fn build(
        current: &CurrentContext<'_>,
        scene: &ShadowScene,
        color_format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let device = current.device();
        let mut uploaded: HashMap<*const Geometry, Arc<GeometryBuffers>> = HashMap::new();
        let mut buffers_for = |program: &DrawProgram| {
            let key = Arc::as_ptr(&program.geometry);
            let label = format!("geometry-{}", uploaded.len());
            Arc::clone(uploaded.entry(key).or_insert_with(|| {
                Arc::new(GeometryBuffers::upload(device, &program.geometry, &label))
            }))
        };

        let depth = scene
            .depth
            .iter()
            .map(|program| {
                let buffers = buffers_for(program);
                GpuProgram::new(device, program, buffers, ProgramTarget::depth_only())
            })
            .collect::<Result<Vec<_>, _>>()?;
        let color = scene
            .color
            .iter()
            .map(|program| {
                let buffers = buffers_for(program);
                GpuProgram::new(device, program, buffers, ProgramTarget::color(color_format))
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "built {} depth and {} color programs over {} geometries",
            depth.len(),
            color.len(),
            uploaded.len()
        );

        Ok(Self {
            depth,
            color,
            bounds: scene.bounds(),
        })
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn set_shadow_map(&mut self, device: &wgpu::Device, view: &wgpu::TextureView) {
        for program in &mut self.color {
            program.set_shadow_map(device, view);
        }
    }
}
