//! RHI error types.
//!
//! The taxonomy separates transient presentation conditions (reported as
//! plain `vk::Result` values by the swapchain and handled by the frame
//! loop) from the fatal classes below: device/resource creation failures,
//! and command recording failures, none of which are retried.

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Shader loading or module creation failure
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface query or compatibility failure
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain creation or resource failure
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Pipeline creation failure
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Command buffer begin/end failure. Fatal: a half-recorded command
    /// buffer cannot be resubmitted safely.
    #[error("Command recording error: {0}")]
    RecordingError(String),

    /// A resource was used in an invalid state
    #[error("Invalid resource: {0}")]
    InvalidResource(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
