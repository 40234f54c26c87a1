//! Shadow mapping demo built on wgpu.
//!
//! A mesh read from disk is placed on a floor quad and rendered twice per
//! frame: once from a fixed light into an offscreen depth attachment, and
//! once from a trackball camera with every fragment tested against that
//! depth map. Mesh loading, scene assembly and the frame sequence are plain
//! Rust and testable without a GPU; the `render` module holds the wgpu side.

pub mod app;
pub mod camera;
pub mod config;
pub mod depth_image;
pub mod error;
pub mod geometry;
pub mod input;
pub mod light;
pub mod mesh;
pub mod program;
pub mod render;
pub mod render_loop;
pub mod scene;

pub use app::{run_demo, DepthMapHook, DepthMapViewer, ShadowDemo};
pub use camera::{CameraMatrices, TrackballCamera};
pub use config::{DemoConfig, LightConfig, CONFIG_ENV_VAR};
pub use depth_image::DepthImage;
pub use error::{MeshError, RenderError};
pub use geometry::{compute_normals, Bounds, Geometry};
pub use input::{KeyCode, KeyPress, MouseButton, NamedKey, PointerState, NO_KEY, QUIT};
pub use light::{Light, Material};
pub use mesh::{load_obj_from_str, load_off_from_str, load_ply_from_bytes, read_3dobject};
pub use program::{
    create_shadow_programs, DrawMode, DrawProgram, DynamicUniform, PassKind, TextureSlot,
    UniformValue, VertexAttribute,
};
pub use render::{Context, Framebuffer, GpuProgram, GpuScene, Viewer, WindowInitError};
pub use render_loop::{FrameDriver, FrameHook, FrameStats, LoopState, RenderLoop};
pub use scene::{make_floor, ShadowScene, FLOOR_SCALE};
