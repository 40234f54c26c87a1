//! The shadow mapping demo: light-view depth pass feeding a shadowed,
//! interactively viewed color pass.

use std::time::Duration;

use anyhow::Result;
use log::info;

use crate::camera::CameraMatrices;
use crate::config::DemoConfig;
use crate::error::RenderError;
use crate::geometry::Geometry;
use crate::input::KeyPress;
use crate::render::{Context, Framebuffer, GpuScene, Viewer};
use crate::render_loop::{FrameDriver, FrameHook, FrameStats, RenderLoop};
use crate::scene::ShadowScene;

const WINDOW_TITLE: &str = "Shadow map";

/// Something that can show the current shadow map to the user.
pub trait DepthMapViewer {
    /// Blocks until the user dismisses the view.
    fn show_depth_map(&mut self) -> Result<()>;
}

pub struct ShadowDemo {
    ctx: Context,
    viewer: Viewer,
    framebuffer: Framebuffer,
    scene: GpuScene,
    light_camera: CameraMatrices,
    shadow_map_size: u32,
}

impl ShadowDemo {
    /// Builds the scene for `mesh`, opens the viewer and compiles both
    /// passes' programs.
    pub fn new(mesh: Geometry, config: &DemoConfig) -> Result<Self> {
        let light = config.light.light();
        let scene = ShadowScene::assemble(mesh, &light, &config.material, config.floor_scale);

        let ctx = pollster::block_on(Context::new())?;
        // Color pipelines target the window surface, so the viewer comes first.
        let mut viewer = Viewer::new(
            &ctx,
            WINDOW_TITLE,
            config.window_width,
            config.window_height,
        )?;
        let gpu_scene = GpuScene::build(&ctx.current(), &scene, viewer.color_format())?;
        if let Some(bounds) = gpu_scene.bounds() {
            viewer.fit_camera(&bounds);
        }
        info!(
            "scene ready: {} programs per pass, {}px shadow map",
            scene.len(),
            config.shadow_map_size
        );

        Ok(Self {
            ctx,
            viewer,
            framebuffer: Framebuffer::new(),
            scene: gpu_scene,
            light_camera: CameraMatrices::new(light.view, light.projection),
            shadow_map_size: config.shadow_map_size,
        })
    }
}

impl FrameDriver for ShadowDemo {
    fn render_depth_pass(&mut self) -> Result<()> {
        self.ctx.render(
            &self.light_camera,
            &mut self.framebuffer,
            &mut self.scene.depth,
            self.shadow_map_size,
            self.shadow_map_size,
        )
    }

    fn bind_shadow_map(&mut self) -> Result<()> {
        let view = self
            .framebuffer
            .depth()
            .ok_or(RenderError::NoDepthAttachment)?;
        self.scene.set_shadow_map(self.ctx.device(), view);
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<i32> {
        self.viewer.wait_key(&self.ctx, &mut self.scene.color, timeout)
    }
}

impl DepthMapViewer for ShadowDemo {
    fn show_depth_map(&mut self) -> Result<()> {
        let image = self.ctx.read_depth(&self.framebuffer)?;
        if let Some((near, far)) = image.range() {
            info!(
                "showing {}x{} depth map, depth range [{near:.6}, {far:.6}]",
                image.width, image.height
            );
        }
        self.viewer
            .show_image(&self.ctx, &image.to_rgba8(), image.width, image.height)
    }
}

/// Shows the depth map whenever its key is pressed, in either case.
#[derive(Debug, Clone, Copy)]
pub struct DepthMapHook {
    key: char,
}

impl Default for DepthMapHook {
    fn default() -> Self {
        Self { key: 'v' }
    }
}

impl DepthMapHook {
    pub fn new(key: char) -> Self {
        Self { key }
    }
}

impl<D: DepthMapViewer> FrameHook<D> for DepthMapHook {
    fn is_modal_key(&self, key: KeyPress) -> bool {
        key.matches_ignore_case(self.key)
    }

    fn show_modal(&mut self, driver: &mut D) -> Result<()> {
        driver.show_depth_map()
    }
}

/// Runs the demo on `mesh` until the user quits.
pub fn run_demo(mesh: Geometry, config: &DemoConfig) -> Result<FrameStats> {
    let mut demo = ShadowDemo::new(mesh, config)?;
    println!("Press <ESC> to quit");
    println!("Press 'v' to show light view's depth map");
    let mut hook = DepthMapHook::default();
    RenderLoop::new(config.poll_interval()).run(&mut demo, Some(&mut hook))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::NO_KEY;

    #[derive(Default)]
    struct CountingViewer {
        shown: usize,
    }

    impl DepthMapViewer for CountingViewer {
        fn show_depth_map(&mut self) -> Result<()> {
            self.shown += 1;
            Ok(())
        }
    }

    fn press(code: i32) -> KeyPress {
        KeyPress::from_code(code).unwrap()
    }

    fn opens(hook: &DepthMapHook, code: i32) -> bool {
        FrameHook::<CountingViewer>::is_modal_key(hook, press(code))
    }

    #[test]
    fn hook_opens_depth_map_for_either_case() {
        let hook = DepthMapHook::default();
        assert!(opens(&hook, 'v' as i32));
        assert!(opens(&hook, 'V' as i32));
    }

    #[test]
    fn hook_ignores_other_keys_and_idle_frames() {
        let hook = DepthMapHook::default();
        for code in [NO_KEY, 'b' as i32, ' ' as i32, 256 + 7] {
            assert!(!opens(&hook, code));
        }
    }

    #[test]
    fn hook_matches_low_byte_of_extended_codes() {
        let hook = DepthMapHook::new('d');
        assert!(opens(&hook, 0x1000 + 'D' as i32));
    }

    #[test]
    fn showing_the_modal_view_shows_the_depth_map() {
        let mut viewer = CountingViewer::default();
        let mut hook = DepthMapHook::default();
        hook.show_modal(&mut viewer).unwrap();
        assert_eq!(viewer.shown, 1);
    }
}
