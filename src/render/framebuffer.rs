use log::debug;

/// Format of the shadow map and of the viewer's depth buffer.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Offscreen render target holding a single depth attachment.
///
/// The attachment is created by the first render and reused while the
/// requested size stays the same, so views handed out by [`Framebuffer::depth`]
/// stay valid across frames.
#[derive(Default)]
pub struct Framebuffer {
    attachment: Option<DepthAttachment>,
}

struct DepthAttachment {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl Framebuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the depth attachment if missing or sized differently.
    /// Returns true when a new texture was created.
    pub fn ensure_depth(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if self.size() == Some((width, height)) {
            return false;
        }
        debug!("creating {width}x{height} depth attachment");
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow-map"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.attachment = Some(DepthAttachment {
            texture,
            view,
            width,
            height,
        });
        true
    }

    pub fn depth(&self) -> Option<&wgpu::TextureView> {
        self.attachment.as_ref().map(|a| &a.view)
    }

    pub fn depth_texture(&self) -> Option<&wgpu::Texture> {
        self.attachment.as_ref().map(|a| &a.texture)
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.attachment.as_ref().map(|a| (a.width, a.height))
    }
}

/// Window-sized depth buffer for the viewer's color pass.
pub(crate) struct DepthBuffer {
    _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
}

impl DepthBuffer {
    pub(crate) fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewer-depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
