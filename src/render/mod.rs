//! wgpu rendering: the offscreen depth pass, GPU programs and the viewer window.

pub mod context;
pub mod framebuffer;
pub mod gpu_program;
pub mod readback;
pub mod viewer;

pub use context::{Context, CurrentContext};
pub use framebuffer::{Framebuffer, DEPTH_FORMAT};
pub use gpu_program::{GeometryBuffers, GpuProgram, GpuScene, ProgramTarget};
pub use viewer::{Viewer, WindowInitError};
