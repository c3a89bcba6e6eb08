//! UI overlay.
//!
//! egui composited into every render path via `egui-ash-renderer`. The
//! overlay renderer is built once against the forward pass; the overlay
//! pass declares identical attachments, so the same pipelines work when
//! the compute path re-enters rendering for compositing.
//!
//! Per-frame contract: [`UiOverlay::run`] (input + widget building +
//! tessellation) once before recording, then [`UiOverlay::render`] once
//! inside an active render pass.

use std::sync::{Arc, Mutex};

use ash::vk;
use egui_ash_renderer::{Options, Renderer as EguiRenderer};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{info, warn};
use winit::window::Window as WinitWindow;

use mirage_rhi::command::{CommandBuffer, CommandPool};
use mirage_rhi::device::Device;
use mirage_rhi::instance::Instance;
use mirage_rhi::render_pass::RenderPass;
use mirage_rhi::{RhiError, RhiResult};

use crate::encoder::RenderPath;

/// Frame statistics shown by the debug HUD.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    /// Smoothed frames per second.
    pub fps: f32,
    /// Last frame time in milliseconds.
    pub frame_time_ms: f32,
    /// The path the encoder took this frame.
    pub path: Option<RenderPath>,
}

/// egui overlay state and its Vulkan renderer.
pub struct UiOverlay {
    ctx: egui::Context,
    winit_state: egui_winit::State,
    /// Dropped before the allocator; both before the device.
    renderer: Option<EguiRenderer>,
    allocator: Option<Arc<Mutex<Allocator>>>,
    paint_jobs: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
    graphics_queue: vk::Queue,
    command_pool: vk::CommandPool,
}

impl UiOverlay {
    /// Creates the overlay against the forward render pass.
    ///
    /// A dedicated allocator is created for the egui renderer from cloned
    /// instance/device handles, as the renderer requires shared ownership.
    ///
    /// # Errors
    ///
    /// Returns an error if allocator or renderer creation fails.
    pub fn new(
        instance: &Instance,
        device: &Arc<Device>,
        render_pass: &RenderPass,
        command_pool: &CommandPool,
        window: &WinitWindow,
    ) -> RhiResult<Self> {
        let ctx = egui::Context::default();

        let winit_state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.handle().clone(),
            physical_device: device.physical_device(),
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;
        let allocator = Arc::new(Mutex::new(allocator));

        let renderer = EguiRenderer::with_gpu_allocator(
            allocator.clone(),
            device.handle().clone(),
            render_pass.handle(),
            Options {
                srgb_framebuffer: true,
                ..Default::default()
            },
        )
        .map_err(|e| RhiError::InvalidResource(format!("egui renderer: {:?}", e)))?;

        info!("UI overlay initialized");

        Ok(Self {
            ctx,
            winit_state,
            renderer: Some(renderer),
            allocator: Some(allocator),
            paint_jobs: Vec::new(),
            textures_delta: egui::TexturesDelta::default(),
            graphics_queue: device.graphics_queue(),
            command_pool: command_pool.handle(),
        })
    }

    /// Feeds a window event to egui; returns whether egui consumed it.
    pub fn on_window_event(
        &mut self,
        window: &WinitWindow,
        event: &winit::event::WindowEvent,
    ) -> bool {
        self.winit_state.on_window_event(window, event).consumed
    }

    /// Runs one overlay frame: collects input, builds widgets via
    /// `build_ui`, and tessellates the output for rendering.
    pub fn run(&mut self, window: &WinitWindow, build_ui: impl FnOnce(&egui::Context)) {
        let raw_input = self.winit_state.take_egui_input(window);
        self.ctx.begin_pass(raw_input);

        build_ui(&self.ctx);

        let output = self.ctx.end_pass();
        self.winit_state
            .handle_platform_output(window, output.platform_output);

        self.paint_jobs = self
            .ctx
            .tessellate(output.shapes, output.pixels_per_point);
        self.textures_delta.append(output.textures_delta);
    }

    /// Records the overlay draw into `cmd`.
    ///
    /// Must be called inside an active render pass compatible with the
    /// pass the overlay was created against, once per frame.
    ///
    /// # Errors
    ///
    /// Texture upload or draw failures are fatal recording errors.
    pub fn render(&mut self, cmd: &CommandBuffer, extent: vk::Extent2D) -> RhiResult<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Err(RhiError::InvalidResource(
                "overlay renderer already destroyed".to_string(),
            ));
        };

        let set: Vec<_> = self.textures_delta.set.drain(..).collect();
        renderer
            .set_textures(self.graphics_queue, self.command_pool, &set)
            .map_err(|e| RhiError::RecordingError(format!("egui texture upload: {:?}", e)))?;

        renderer
            .cmd_draw(
                cmd.handle(),
                extent,
                self.ctx.pixels_per_point(),
                &self.paint_jobs,
            )
            .map_err(|e| RhiError::RecordingError(format!("egui draw: {:?}", e)))?;

        let free: Vec<_> = self.textures_delta.free.drain(..).collect();
        renderer
            .free_textures(&free)
            .map_err(|e| RhiError::RecordingError(format!("egui texture free: {:?}", e)))?;

        Ok(())
    }

    /// Releases the overlay's GPU resources.
    ///
    /// Call after a device idle and before the device itself is torn down.
    pub fn destroy(&mut self) {
        // Renderer first, it allocates from the allocator.
        self.renderer = None;
        self.allocator = None;
    }
}

impl Drop for UiOverlay {
    fn drop(&mut self) {
        if self.renderer.is_some() {
            warn!("UiOverlay dropped without destroy(); GPU may still reference its resources");
        }
    }
}

/// Builds the debug HUD windows.
pub fn draw_hud(ctx: &egui::Context, stats: &FrameStats) {
    egui::Window::new("Debug Info")
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(format!("FPS: {:.1}", stats.fps));
            ui.label(format!("Frame time: {:.3} ms", stats.frame_time_ms));
            if let Some(path) = stats.path {
                ui.label(format!("Render path: {}", path.name()));
            }
            ui.separator();
            ui.label("Controls:");
            ui.label("  B - toggle render mode");
            ui.label("  ESC - exit");
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_stats_default_has_no_path() {
        let stats = FrameStats::default();
        assert!(stats.path.is_none());
        assert_eq!(stats.fps, 0.0);
    }
}
