//! GPU buffer management.
//!
//! [`Buffer`] pairs a `vk::Buffer` with a gpu-allocator allocation. All
//! buffers here are host-visible (CpuToGpu): vertex/index data is written
//! once at upload, uniform buffers are rewritten every frame.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// What a buffer is used for; maps to usage flags and an allocation name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex data.
    Vertex,
    /// Index data.
    Index,
    /// Uniform data, rewritten per frame.
    Uniform,
}

impl BufferUsage {
    /// Converts to Vulkan usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
        }
    }

    /// Allocation name for allocator diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex_buffer",
            BufferUsage::Index => "index_buffer",
            BufferUsage::Uniform => "uniform_buffer",
        }
    }
}

/// GPU buffer with bound memory.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates an empty buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation or memory allocation fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidResource(
                "buffer size must be nonzero".to_string(),
            ));
        }

        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&create_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        debug!("Created {} of {} bytes", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        })
    }

    /// Creates a buffer and fills it with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if creation or the initial write fails.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write(0, data)?;
        Ok(buffer)
    }

    /// Writes `data` into the buffer at `offset` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write would overflow the buffer.
    pub fn write(&self, offset: usize, data: &[u8]) -> RhiResult<()> {
        if offset + data.len() > self.size as usize {
            return Err(RhiError::InvalidResource(format!(
                "write of {} bytes at offset {} overflows {}-byte buffer",
                data.len(),
                offset,
                self.size
            )));
        }

        // CpuToGpu allocations are persistently mapped by gpu-allocator.
        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| RhiError::InvalidResource("buffer memory already freed".to_string()))?;

        let mapped = allocation.mapped_ptr().ok_or_else(|| {
            RhiError::InvalidResource("buffer allocation is not host mapped".to_string())
        })?;

        unsafe {
            let dst = (mapped.as_ptr() as *mut u8).add(offset);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free buffer allocation: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_flags() {
        assert_eq!(
            BufferUsage::Vertex.to_vk_usage(),
            vk::BufferUsageFlags::VERTEX_BUFFER
        );
        assert_eq!(
            BufferUsage::Index.to_vk_usage(),
            vk::BufferUsageFlags::INDEX_BUFFER
        );
        assert_eq!(
            BufferUsage::Uniform.to_vk_usage(),
            vk::BufferUsageFlags::UNIFORM_BUFFER
        );
    }

    #[test]
    fn test_usage_names() {
        assert_eq!(BufferUsage::Uniform.name(), "uniform_buffer");
    }
}
