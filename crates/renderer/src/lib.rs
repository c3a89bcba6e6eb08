//! Frame orchestration core of the Mirage renderer.
//!
//! This crate owns the per-frame protocol: acquire a swap image, select
//! and encode one of the render paths, submit, present, and recover when
//! the presentation surface goes stale.
//!
//! - [`frame_sync`]: frame slots, per-image semaphores, busy markers
//! - [`encoder`]: render path selection and draw-list construction
//! - [`compute`]: compute-to-present stage
//! - [`renderer`]: the owning orchestrator and resize recovery

pub mod compute;
pub mod depth_buffer;
pub mod encoder;
pub mod frame_sync;
pub mod mode;
pub mod model_gpu;
pub mod overlay;
pub mod renderer;
pub mod skybox;
pub mod ubo;

pub use mode::{ModeController, RenderMode};
pub use renderer::Renderer;

/// Maximum number of frames that may be in flight simultaneously.
///
/// Bounds how far the CPU can run ahead of the GPU; each frame slot owns
/// its own command buffer and synchronization primitives.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
