//! Platform layer for the Mirage renderer.
//!
//! - Window management via winit
//! - Vulkan surface creation (RAII wrapped)
//! - Keyboard and mouse input state

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window, required_surface_extensions};

// Re-export winit types callers commonly need.
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
