use anyhow::{Context as _, Result};
use log::info;

use crate::camera::CameraMatrices;
use crate::error::RenderError;

use super::framebuffer::Framebuffer;
use super::gpu_program::GpuProgram;

/// GPU device shared by the offscreen depth pass and the viewer window.
pub struct Context {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl Context {
    /// Picks an adapter and opens a device on it.
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        let adapter_info = adapter.get_info();
        info!(
            "using adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("shadowmap-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor, None)
            .await
            .context("failed to create GPU device")?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Makes the context current for a batch of GPU work.
    ///
    /// Commands recorded through the returned guard are submitted when it
    /// is dropped.
    pub fn current(&self) -> CurrentContext<'_> {
        CurrentContext {
            context: self,
            encoder: None,
        }
    }

    /// Draws `programs` seen through `camera` into the depth attachment of
    /// `framebuffer`, (re)creating the attachment at `width` x `height`.
    pub fn render(
        &self,
        camera: &CameraMatrices,
        framebuffer: &mut Framebuffer,
        programs: &mut [GpuProgram],
        width: u32,
        height: u32,
    ) -> Result<()> {
        framebuffer.ensure_depth(&self.device, width, height);
        for program in programs.iter_mut() {
            program.update(&self.queue, camera)?;
        }
        let depth = framebuffer.depth().ok_or(RenderError::NoDepthAttachment)?;

        let mut current = self.current();
        let mut pass = current
            .encoder()
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("depth-pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        for program in programs.iter() {
            program.draw(&mut pass)?;
        }
        drop(pass);
        Ok(())
    }
}

/// Command recording scope returned by [`Context::current`].
pub struct CurrentContext<'a> {
    context: &'a Context,
    encoder: Option<wgpu::CommandEncoder>,
}

impl<'a> CurrentContext<'a> {
    pub fn device(&self) -> &'a wgpu::Device {
        &self.context.device
    }

    /// Encoder for this scope, opened on first use.
    pub fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.context.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("shadowmap-encoder"),
            })
        })
    }

    /// Submits recorded work now instead of at scope exit.
    pub fn release(self) {}
}

impl Drop for CurrentContext<'_> {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}
