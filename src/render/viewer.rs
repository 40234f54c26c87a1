//! Interactive window: trackball-driven color pass, key polling and a modal
//! image view.
//!
//! The viewer owns its event loop and pumps it on demand, so the caller
//! keeps control of the frame sequence. Every [`Viewer::wait_key`] call
//! drains pending events, redraws the color scene and reports at most one
//! key press.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use glam::Vec2;
use log::{debug, info};
use wgpu::util::DeviceExt;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{
    ElementState, Event, KeyEvent, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent,
};
use winit::event_loop::{EventLoop, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey as WinitNamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowBuilder};

use crate::camera::TrackballCamera;
use crate::geometry::Bounds;
use crate::input::{KeyCode, MouseButton, NamedKey, PointerState, NO_KEY, QUIT};

use super::context::Context;
use super::framebuffer::DepthBuffer;
use super::gpu_program::GpuProgram;

const IMAGE_VIEW_SHADER: &str = include_str!("shaders/image_view.wgsl");
const MODAL_POLL: Duration = Duration::from_millis(16);
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.03,
    g: 0.03,
    b: 0.05,
    a: 1.0,
};

/// Raised when no window can be opened (no display, missing system libraries).
#[derive(Debug)]
pub struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

pub struct Viewer {
    event_loop: EventLoop<()>,
    state: WindowState,
}

struct WindowState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    title: String,
    camera: TrackballCamera,
    pointer: PointerState,
    keys: VecDeque<i32>,
    pending_resize: Option<PhysicalSize<u32>>,
    /// Set while an image is shown; escape then only dismisses it.
    modal: bool,
    quit: bool,
}

impl Viewer {
    /// Opens a window and binds a surface for it to `ctx`'s device.
    pub fn new(ctx: &Context, title: &str, width: u32, height: u32) -> Result<Self> {
        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
        panic::set_hook(default_hook);
        let event_loop = event_loop
            .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
            .map_err(|err| WindowInitError::from_error("event loop", err))?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(title)
                .with_inner_size(LogicalSize::new(width as f64, height as f64))
                .build(&event_loop)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let surface = ctx.instance().create_surface(Arc::clone(&window))?;
        if !ctx.adapter().is_surface_supported(&surface) {
            return Err(anyhow!("GPU adapter cannot present to this window"));
        }

        let surface_caps = surface.get_capabilities(ctx.adapter());
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no texture formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo),
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(ctx.device(), &config);
        let depth = DepthBuffer::create(ctx.device(), config.width, config.height);
        info!(
            "opened {}x{} window ({:?})",
            size.width, size.height, surface_format
        );

        Ok(Self {
            event_loop,
            state: WindowState {
                window,
                surface,
                config,
                depth,
                title: title.to_string(),
                camera: TrackballCamera::new(),
                pointer: PointerState::new(),
                keys: VecDeque::new(),
                pending_resize: None,
                modal: false,
                quit: false,
            },
        })
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.state.config.format
    }

    /// Frames `bounds` with the trackball camera.
    pub fn fit_camera(&mut self, bounds: &Bounds) {
        self.state.camera.fit_bounds(bounds);
    }

    /// Processes window events for up to `timeout`, draws `programs` and
    /// returns the first key pressed: [`NO_KEY`] if none, [`QUIT`] once
    /// the window was closed or escape was pressed.
    pub fn wait_key(
        &mut self,
        ctx: &Context,
        programs: &mut [GpuProgram],
        timeout: Duration,
    ) -> Result<i32> {
        self.pump(timeout);
        if self.state.quit {
            return Ok(QUIT);
        }
        self.state.apply_resize(ctx.device());
        self.state.draw_scene(ctx, programs)?;
        Ok(self.state.keys.pop_front().unwrap_or(NO_KEY))
    }

    /// Shows an RGBA8 image in the window until a key is pressed.
    ///
    /// Closing the window during the modal view ends it and makes the next
    /// [`Viewer::wait_key`] report [`QUIT`].
    pub fn show_image(
        &mut self,
        ctx: &Context,
        rgba: &[u8],
        width: u32,
        height: u32,
    ) -> Result<()> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(anyhow!(
                "image has {} bytes, expected {expected} for {width}x{height}",
                rgba.len()
            ));
        }
        let image = ImageView::new(ctx, self.state.config.format, rgba, width, height);
        self.state.keys.clear();
        self.state.modal = true;
        self.state
            .window
            .set_title(&format!("{} - depth map (press any key)", self.state.title));

        loop {
            self.pump(MODAL_POLL);
            if self.state.quit {
                break;
            }
            if !self.state.keys.is_empty() {
                self.state.keys.clear();
                break;
            }
            self.state.apply_resize(ctx.device());
            self.state.draw_image(ctx, &image)?;
        }

        self.state.modal = false;
        self.state.window.set_title(&self.state.title);
        debug!("closed depth map view");
        Ok(())
    }

    fn pump(&mut self, timeout: Duration) {
        let state = &mut self.state;
        let status = self
            .event_loop
            .pump_events(Some(timeout), |event, target| state.handle_event(event, target));
        if let PumpStatus::Exit(code) = status {
            debug!("event loop exited with code {code}");
            self.state.quit = true;
        }
    }
}

impl WindowState {
    fn handle_event(&mut self, event: Event<()>, target: &EventLoopWindowTarget<()>) {
        let Event::WindowEvent { window_id, event } = event else {
            return;
        };
        if window_id != self.window.id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                self.quit = true;
                target.exit();
            }
            WindowEvent::Resized(size) => self.pending_resize = Some(size),
            WindowEvent::KeyboardInput { event, .. } => self.handle_keyboard(&event, target),
            WindowEvent::MouseInput { state, button, .. } => {
                self.handle_mouse_button(state, button)
            }
            WindowEvent::CursorMoved { position, .. } => self.handle_cursor(position),
            WindowEvent::MouseWheel { delta, .. } => self.handle_wheel(delta),
            _ => {}
        }
    }

    fn handle_keyboard(&mut self, event: &KeyEvent, target: &EventLoopWindowTarget<()>) {
        if event.state != ElementState::Pressed {
            return;
        }
        if !self.modal && event.logical_key == Key::Named(WinitNamedKey::Escape) {
            self.quit = true;
            target.exit();
            return;
        }
        if let Some(keycode) = map_key(&event.logical_key) {
            self.keys.push_back(keycode.code());
        }
    }

    fn handle_mouse_button(&mut self, state: ElementState, button: WinitMouseButton) {
        let index = match button {
            WinitMouseButton::Left => 0,
            WinitMouseButton::Right => 1,
            WinitMouseButton::Middle => 2,
            WinitMouseButton::Back => 3,
            WinitMouseButton::Forward => 4,
            WinitMouseButton::Other(value) => value.min(u16::from(u8::MAX)),
        } as u8;
        let button = MouseButton::new(index);
        match state {
            ElementState::Pressed => self.pointer.set_button_down(button),
            ElementState::Released => self.pointer.set_button_up(button),
        }
    }

    fn handle_cursor(&mut self, position: PhysicalPosition<f64>) {
        let position = Vec2::new(position.x as f32, position.y as f32);
        match camera_drag(&mut self.pointer, position, self.modal) {
            Some(CameraDrag::Rotate(delta)) => self.camera.rotate_by_pixels(delta),
            Some(CameraDrag::Pan(delta)) => self.camera.pan_by_pixels(delta),
            None => {}
        }
    }

    fn handle_wheel(&mut self, delta: MouseScrollDelta) {
        if self.modal {
            return;
        }
        let lines = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pixels) => pixels.y as f32 / 40.0,
        };
        self.camera.zoom(lines);
    }

    fn apply_resize(&mut self, device: &wgpu::Device) {
        let Some(size) = self.pending_resize.take() else {
            return;
        };
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(device, &self.config);
        self.depth = DepthBuffer::create(device, size.width, size.height);
    }

    fn aspect(&self) -> f32 {
        if self.config.height == 0 {
            1.0
        } else {
            self.config.width as f32 / self.config.height as f32
        }
    }

    /// Next swapchain image, or `None` when this frame should be skipped.
    fn acquire_frame(&mut self, device: &wgpu::Device) -> Result<Option<wgpu::SurfaceTexture>> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                self.pending_resize = Some(size);
                self.apply_resize(device);
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                info!("Surface timeout; retrying next frame");
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow!("GPU is out of memory")),
        }
    }

    fn draw_scene(&mut self, ctx: &Context, programs: &mut [GpuProgram]) -> Result<()> {
        let Some(frame) = self.acquire_frame(ctx.device())? else {
            return Ok(());
        };
        let camera = self.camera.matrices(self.aspect());
        for program in programs.iter_mut() {
            program.update(ctx.queue(), &camera)?;
        }
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut current = ctx.current();
        let mut pass = current
            .encoder()
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("color-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
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
        current.release();
        frame.present();
        Ok(())
    }

    fn draw_image(&mut self, ctx: &Context, image: &ImageView) -> Result<()> {
        let Some(frame) = self.acquire_frame(ctx.device())? else {
            return Ok(());
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut current = ctx.current();
        let mut pass = current
            .encoder()
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("image-view-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        pass.set_pipeline(&image.pipeline);
        pass.set_bind_group(0, &image.bind_group, &[]);
        pass.draw(0..3, 0..1);
        drop(pass);
        current.release();
        frame.present();
        Ok(())
    }
}

/// Fullscreen textured triangle showing one RGBA8 image.
struct ImageView {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
}

impl ImageView {
    fn new(
        ctx: &Context,
        format: wgpu::TextureFormat,
        rgba: &[u8],
        width: u32,
        height: u32,
    ) -> Self {
        let device = ctx.device();
        let texture = device.create_texture_with_data(
            ctx.queue(),
            &wgpu::TextureDescriptor {
                label: Some("image-view-texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            rgba,
        );
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("image-view-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("image-view-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("image-view-bind-group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("image-view-shader"),
            source: wgpu::ShaderSource::Wgsl(IMAGE_VIEW_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("image-view-pipeline-layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("image-view-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
        });

        Self {
            pipeline,
            bind_group,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CameraDrag {
    Rotate(Vec2),
    Pan(Vec2),
}

/// Moves the pointer to `position` and returns the camera motion it drives.
///
/// While a modal view is open the pointer still follows the cursor but the
/// camera does not move.
fn camera_drag(pointer: &mut PointerState, position: Vec2, modal: bool) -> Option<CameraDrag> {
    let delta = pointer.move_to(position);
    if modal {
        None
    } else if pointer.is_button_down(MouseButton::LEFT) {
        Some(CameraDrag::Rotate(delta))
    } else if pointer.is_button_down(MouseButton::RIGHT)
        || pointer.is_button_down(MouseButton::MIDDLE)
    {
        Some(CameraDrag::Pan(delta))
    } else {
        None
    }
}

/// Maps a logical key to the code reported by [`Viewer::wait_key`].
pub(crate) fn map_key(key: &Key) -> Option<KeyCode> {
    match key {
        Key::Character(text) => {
            let ch = text.chars().next()?;
            if let Some(digit) = ch.to_digit(10) {
                Some(KeyCode::Digit(digit as u8))
            } else if ch.is_ascii_graphic() {
                Some(KeyCode::Character(ch))
            } else {
                None
            }
        }
        Key::Named(named) => map_named_key(*named),
        _ => None,
    }
}

fn map_named_key(key: WinitNamedKey) -> Option<KeyCode> {
    use WinitNamedKey as Named;
    Some(match key {
        Named::Space => KeyCode::Named(NamedKey::Space),
        Named::Enter => KeyCode::Named(NamedKey::Enter),
        Named::Tab => KeyCode::Named(NamedKey::Tab),
        Named::ArrowLeft => KeyCode::Named(NamedKey::Left),
        Named::ArrowRight => KeyCode::Named(NamedKey::Right),
        Named::ArrowUp => KeyCode::Named(NamedKey::Up),
        Named::ArrowDown => KeyCode::Named(NamedKey::Down),
        Named::Escape => KeyCode::Named(NamedKey::Escape),
        Named::Backspace => KeyCode::Named(NamedKey::Backspace),
        Named::Home => KeyCode::Named(NamedKey::Home),
        Named::End => KeyCode::Named(NamedKey::End),
        Named::PageUp => KeyCode::Named(NamedKey::PageUp),
        Named::PageDown => KeyCode::Named(NamedKey::PageDown),
        Named::F1 => KeyCode::Function(1),
        Named::F2 => KeyCode::Function(2),
        Named::F3 => KeyCode::Function(3),
        Named::F4 => KeyCode::Function(4),
        Named::F5 => KeyCode::Function(5),
        Named::F6 => KeyCode::Function(6),
        Named::F7 => KeyCode::Function(7),
        Named::F8 => KeyCode::Function(8),
        Named::F9 => KeyCode::Function(9),
        Named::F10 => KeyCode::Function(10),
        Named::F11 => KeyCode::Function(11),
        Named::F12 => KeyCode::Function(12),
        _ => return None,
    })
}
