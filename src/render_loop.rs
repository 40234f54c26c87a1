//! Frame sequencing for the shadow demo.
//!
//! One iteration renders the depth scene from the light, hands the fresh
//! depth attachment to every color program, then polls one key while the
//! color scene is drawn. A negative key ends the loop; everything else is
//! offered to an optional [`FrameHook`].

use std::time::Duration;

use anyhow::Result;
use log::{debug, info};

use crate::input::KeyPress;

/// The work of one frame, in the order the loop calls it.
pub trait FrameDriver {
    fn render_depth_pass(&mut self) -> Result<()>;

    fn bind_shadow_map(&mut self) -> Result<()>;

    /// Waits up to `timeout` for a key while drawing the color scene.
    /// Negative means quit, zero means no key.
    fn poll_key(&mut self, timeout: Duration) -> Result<i32>;
}

/// A modal view opened between frames by a key press.
pub trait FrameHook<D> {
    /// Whether the key polled by the last frame opens the view.
    fn is_modal_key(&self, key: KeyPress) -> bool;

    /// Shows the view and blocks until it is dismissed.
    fn show_modal(&mut self, driver: &mut D) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// The frame hook is showing its modal view.
    ShowingDepthMap,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub frames: u64,
    pub modal_views: u64,
}

#[derive(Debug)]
pub struct RenderLoop {
    poll_interval: Duration,
    state: LoopState,
    stats: FrameStats,
}

impl RenderLoop {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            state: LoopState::Running,
            stats: FrameStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Runs frames until the driver reports quit. Any error ends the loop
    /// and is returned as is.
    pub fn run<D: FrameDriver>(
        &mut self,
        driver: &mut D,
        mut hook: Option<&mut dyn FrameHook<D>>,
    ) -> Result<FrameStats> {
        self.state = LoopState::Running;
        while self.state == LoopState::Running {
            driver.render_depth_pass()?;
            driver.bind_shadow_map()?;
            let code = driver.poll_key(self.poll_interval)?;
            self.stats.frames += 1;

            let Some(key) = KeyPress::from_code(code) else {
                debug!("quit requested after {} frames", self.stats.frames);
                self.state = LoopState::Terminated;
                break;
            };

            if let Some(hook) = hook.as_deref_mut().filter(|hook| hook.is_modal_key(key)) {
                self.state = LoopState::ShowingDepthMap;
                let shown = hook.show_modal(driver);
                self.state = LoopState::Running;
                shown?;
                self.stats.modal_views += 1;
            }
        }
        info!(
            "render loop finished: {} frames, {} depth map views",
            self.stats.frames, self.stats.modal_views
        );
        Ok(self.stats)
    }
}
