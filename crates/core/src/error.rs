//! Error types shared across the engine.

use thiserror::Error;

/// Top-level error type for engine-side failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related failures surfaced outside the RHI layer
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or surface management failures
    #[error("Window error: {0}")]
    Window(String),

    /// Asset loading failures
    #[error("Resource error: {0}")]
    Resource(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using the engine's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
