//! Compute-to-present stage.
//!
//! A compute shader writes a storage image which is then copied into the
//! acquired swap image. The barrier sequence inside
//! [`ComputeStage::record`] is fixed and must not be reordered: it encodes
//! the execution and memory dependencies between the dispatch, the copy,
//! and the overlay pass that follows.
//!
//! The output image lives in `GENERAL` layout between frames; it is
//! transitioned out for the copy and restored afterwards so the next
//! dispatch finds it where it expects it.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, info};

use mirage_rhi::command::{CommandBuffer, CommandPool, submit_one_time};
use mirage_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, storage_image_binding, update_descriptor_sets,
};
use mirage_rhi::device::Device;
use mirage_rhi::pipeline::{Pipeline, PipelineLayout};
use mirage_rhi::shader::{Shader, ShaderStage};
use mirage_rhi::{RhiError, RhiResult};

use crate::encoder::dispatch_group_count;

/// Storage image format written by the compute shader.
pub const COMPUTE_OUTPUT_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Push constants handed to the compute shader each dispatch.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ComputePushConstants {
    /// Output image width in pixels.
    pub width: u32,
    /// Output image height in pixels.
    pub height: u32,
    /// Elapsed time in seconds.
    pub time: f32,
    /// Pad to 16 bytes.
    pub _pad: u32,
}

impl ComputePushConstants {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// GPU-only storage image the compute shader writes.
struct StorageImage {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    extent: vk::Extent2D,
}

impl StorageImage {
    fn new(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::InvalidResource(
                "compute output dimensions must be nonzero".to_string(),
            ));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(COMPUTE_OUTPUT_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: "compute_output",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(COMPUTE_OUTPUT_FORMAT)
            .subresource_range(color_subresource_range());

        let view = unsafe { device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created compute output image {}x{}",
            extent.width, extent.height
        );

        Ok(Self {
            device,
            image,
            view,
            allocation: Some(allocation),
            extent,
        })
    }
}

impl Drop for StorageImage {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free compute output allocation: {:?}", e);
            }
        }
    }
}

/// Compute pipeline, its binding set, and the output image.
pub struct ComputeStage {
    device: Arc<Device>,
    // Layout and pool outlive the set allocated from them.
    _set_layout: DescriptorSetLayout,
    _descriptor_pool: DescriptorPool,
    descriptor_set: vk::DescriptorSet,
    pipeline_layout: PipelineLayout,
    pipeline: Pipeline,
    output: StorageImage,
}

impl ComputeStage {
    /// Builds the stage: pipeline, binding set, and an output image at
    /// `extent`, left in `GENERAL` layout ready for the first dispatch.
    ///
    /// # Errors
    ///
    /// Pipeline, descriptor and image creation failures are fatal.
    pub fn new(
        device: Arc<Device>,
        shader_path: &Path,
        extent: vk::Extent2D,
        pool: &CommandPool,
    ) -> RhiResult<Self> {
        let set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[storage_image_binding(0, vk::ShaderStageFlags::COMPUTE)],
        )?;

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::STORAGE_IMAGE)
            .descriptor_count(1)];
        let descriptor_pool = DescriptorPool::new(device.clone(), 1, &pool_sizes)?;
        let descriptor_set = descriptor_pool.allocate(&[set_layout.handle()])?[0];

        let push_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
            .offset(0)
            .size(ComputePushConstants::SIZE as u32);

        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[set_layout.handle()], &[push_range])?;

        let shader = Shader::from_spirv_file(device.clone(), shader_path, ShaderStage::Compute)?;
        let pipeline = Pipeline::create_compute(device.clone(), &shader, &pipeline_layout)?;

        let output = StorageImage::new(device.clone(), extent)?;

        let mut stage = Self {
            device,
            _set_layout: set_layout,
            _descriptor_pool: descriptor_pool,
            descriptor_set,
            pipeline_layout,
            pipeline,
            output,
        };

        stage.write_output_descriptor();
        stage.transition_output_to_general(pool)?;

        info!(
            "Compute stage ready ({}x{} output)",
            extent.width, extent.height
        );

        Ok(stage)
    }

    /// Replaces the output image for a new extent and re-points the
    /// binding set at the new view.
    ///
    /// Binding sets hold specific image-view handles, so the rewrite is
    /// mandatory: the old view is destroyed with the old image. Only legal
    /// after a full device idle.
    ///
    /// # Errors
    ///
    /// Returns an error if image creation or the layout transition fails.
    pub fn recreate_output(&mut self, extent: vk::Extent2D, pool: &CommandPool) -> RhiResult<()> {
        self.output = StorageImage::new(self.device.clone(), extent)?;
        self.write_output_descriptor();
        self.transition_output_to_general(pool)?;

        debug!(
            "Compute output recreated at {}x{}",
            extent.width, extent.height
        );
        Ok(())
    }

    fn write_output_descriptor(&mut self) {
        let image_info = vk::DescriptorImageInfo::default()
            .image_view(self.output.view)
            .image_layout(vk::ImageLayout::GENERAL);
        let image_infos = [image_info];

        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.descriptor_set)
            .dst_binding(0)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
            .image_info(&image_infos);

        update_descriptor_sets(&self.device, &[write]);
    }

    /// The freshly created image starts `UNDEFINED`; the per-frame barrier
    /// sequence assumes `GENERAL`, so transition once here.
    fn transition_output_to_general(&self, pool: &CommandPool) -> RhiResult<()> {
        let image = self.output.image;
        submit_one_time(&self.device, pool, self.device.graphics_queue(), |cmd| {
            let barrier = image_barrier(
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::GENERAL,
                vk::AccessFlags::empty(),
                vk::AccessFlags::SHADER_WRITE,
            );
            cmd.pipeline_barrier(
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                &[barrier],
            );
        })
    }

    /// Extent of the compute output image.
    #[inline]
    pub fn output_extent(&self) -> vk::Extent2D {
        self.output.extent
    }

    /// Records the dispatch, the barrier sequence, and the copy into
    /// `swap_image`, leaving the swap image in `COLOR_ATTACHMENT_OPTIMAL`
    /// for the overlay pass and the output image back in `GENERAL`.
    pub fn record(&self, cmd: &CommandBuffer, swap_image: vk::Image, elapsed_secs: f32) {
        let extent = self.output.extent;

        cmd.bind_pipeline(vk::PipelineBindPoint::COMPUTE, self.pipeline.handle());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::COMPUTE,
            self.pipeline_layout.handle(),
            0,
            &[self.descriptor_set],
        );

        let push = ComputePushConstants {
            width: extent.width,
            height: extent.height,
            time: elapsed_secs,
            _pad: 0,
        };
        cmd.push_constants(
            self.pipeline_layout.handle(),
            vk::ShaderStageFlags::COMPUTE,
            0,
            bytemuck::bytes_of(&push),
        );

        let (group_x, group_y) = dispatch_group_count(extent);
        cmd.dispatch(group_x, group_y, 1);

        // Fixed barrier order; each one encodes a required dependency.
        // 1. Output image: dispatch writes -> copy source.
        cmd.pipeline_barrier(
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::PipelineStageFlags::TRANSFER,
            &[image_barrier(
                self.output.image,
                vk::ImageLayout::GENERAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::AccessFlags::SHADER_WRITE,
                vk::AccessFlags::TRANSFER_READ,
            )],
        );

        // 2. Swap image: undefined -> copy destination. The source stage
        // chains after the acquire semaphore's color-output wait.
        cmd.pipeline_barrier(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::TRANSFER,
            &[image_barrier(
                swap_image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
            )],
        );

        // Full-extent copy of the compute output into the swap image.
        let subresource = vk::ImageSubresourceLayers::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .mip_level(0)
            .base_array_layer(0)
            .layer_count(1);

        let region = vk::ImageCopy::default()
            .src_subresource(subresource)
            .dst_subresource(subresource)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });

        cmd.copy_image(
            self.output.image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            swap_image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );

        // 3. Swap image: copy destination -> color attachment for the
        // overlay pass, which ends in the present layout.
        cmd.pipeline_barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            &[image_barrier(
                swap_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )],
        );

        // 4. Output image restored for the next dispatch.
        cmd.pipeline_barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            &[image_barrier(
                self.output.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::GENERAL,
                vk::AccessFlags::TRANSFER_READ,
                vk::AccessFlags::SHADER_WRITE,
            )],
        );
    }
}

fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

fn image_barrier(
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_subresource_range())
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constants_size() {
        assert_eq!(ComputePushConstants::SIZE, 16);
    }

    #[test]
    fn test_push_constants_are_pod() {
        let push = ComputePushConstants {
            width: 1024,
            height: 768,
            time: 1.5,
            _pad: 0,
        };
        let bytes = bytemuck::bytes_of(&push);
        assert_eq!(bytes.len(), ComputePushConstants::SIZE);
    }

    #[test]
    fn test_image_barrier_fills_layouts() {
        let barrier = image_barrier(
            vk::Image::null(),
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::AccessFlags::SHADER_WRITE,
            vk::AccessFlags::TRANSFER_READ,
        );
        assert_eq!(barrier.old_layout, vk::ImageLayout::GENERAL);
        assert_eq!(barrier.new_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    }
}
