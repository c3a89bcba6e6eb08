//! Vulkan abstraction layer for the Mirage renderer.
//!
//! Built on the `ash` crate, this layer covers:
//! - Instance and device creation
//! - Presentation surface management (swapchain, views, framebuffers)
//! - Render pass objects
//! - Command pool and buffer recording
//! - Buffer management and shader modules
//! - Graphics and compute pipeline creation
//! - Synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
