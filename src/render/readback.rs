use anyhow::{anyhow, ensure, Result};
use futures_intrusive::channel::shared::oneshot_channel;
use log::debug;

use crate::depth_image::DepthImage;
use crate::error::RenderError;

use super::context::Context;
use super::framebuffer::{Framebuffer, DEPTH_FORMAT};

/// Rounds a row size up to the copy alignment (256 bytes).
pub(crate) fn align_bpr(value: usize) -> usize {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    value.div_ceil(align) * align
}

impl Context {
    /// Copies the framebuffer's depth attachment back to the CPU.
    pub fn read_depth(&self, framebuffer: &Framebuffer) -> Result<DepthImage> {
        let texture = framebuffer
            .depth_texture()
            .ok_or(RenderError::NoDepthAttachment)?;
        ensure!(
            texture.format() == DEPTH_FORMAT,
            "depth readback expects {DEPTH_FORMAT:?}, got {:?}",
            texture.format()
        );
        let (width, height) = (texture.width(), texture.height());

        let tight_bpr = 4 * width as usize;
        let padded_bpr = align_bpr(tight_bpr);
        let staging = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("depth-readback-staging"),
            size: (padded_bpr * height as usize) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut current = self.current();
        current.encoder().copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::DepthOnly,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        current.release();

        let slice = staging.slice(..);
        let (sender, receiver) = oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device().poll(wgpu::Maintain::Wait);

        pollster::block_on(receiver.receive())
            .ok_or_else(|| anyhow!("map_async callback channel dropped"))??;

        let data = slice.get_mapped_range();
        let depth = depad_depth_rows(&data, tight_bpr, padded_bpr);
        drop(data);
        staging.unmap();

        debug!("read back {width}x{height} depth map");
        Ok(DepthImage::new(width, height, depth))
    }
}

/// Drops the row padding and decodes little-endian `f32` depths.
fn depad_depth_rows(data: &[u8], tight_bpr: usize, padded_bpr: usize) -> Vec<f32> {
    data.chunks_exact(padded_bpr)
        .flat_map(|row| row[..tight_bpr].chunks_exact(4))
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}
