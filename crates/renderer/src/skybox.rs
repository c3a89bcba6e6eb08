//! Skybox rendering.
//!
//! Draws a cubemap background from 36 shader-generated vertices, no vertex
//! buffer. Issued before opaque geometry; depth compare `LESS_OR_EQUAL`
//! with depth writes off so geometry always wins.
//!
//! Cubemap import is outside this subsystem: the caller supplies an
//! already-created cubemap view and sampler and keeps them alive for the
//! skybox's lifetime.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use glam::Mat4;
use tracing::info;

use mirage_rhi::RhiResult;
use mirage_rhi::buffer::{Buffer, BufferUsage};
use mirage_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, combined_image_sampler_binding, uniform_buffer_binding,
    update_descriptor_sets,
};
use mirage_rhi::device::Device;
use mirage_rhi::pipeline::{
    CullMode, DepthCompare, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use mirage_rhi::render_pass::RenderPass;
use mirage_rhi::shader::{Shader, ShaderStage};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::ubo::SkyboxUbo;

/// Vertices in the generated cube (6 faces, 2 triangles each).
pub const SKYBOX_VERTEX_COUNT: u32 = 36;

/// Cubemap background drawn before opaque geometry.
pub struct Skybox {
    device: Arc<Device>,
    _set_layout: DescriptorSetLayout,
    _descriptor_pool: DescriptorPool,
    descriptor_sets: Vec<vk::DescriptorSet>,
    uniform_buffers: Vec<Buffer>,
    pipeline_layout: PipelineLayout,
    pipeline: Pipeline,
}

impl Skybox {
    /// Builds the skybox pipeline and per-frame binding sets over an
    /// externally owned cubemap.
    ///
    /// # Errors
    ///
    /// Returns an error on pipeline, buffer or descriptor creation
    /// failure.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        vert_path: &Path,
        frag_path: &Path,
        cubemap_view: vk::ImageView,
        cubemap_sampler: vk::Sampler,
    ) -> RhiResult<Self> {
        let bindings = [
            uniform_buffer_binding(0, vk::ShaderStageFlags::VERTEX),
            combined_image_sampler_binding(1, vk::ShaderStageFlags::FRAGMENT),
        ];
        let set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;

        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(MAX_FRAMES_IN_FLIGHT as u32),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(MAX_FRAMES_IN_FLIGHT as u32),
        ];
        let descriptor_pool =
            DescriptorPool::new(device.clone(), MAX_FRAMES_IN_FLIGHT as u32, &pool_sizes)?;

        let layouts = vec![set_layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;

        let mut uniform_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for &set in &descriptor_sets {
            let buffer = Buffer::new(
                device.clone(),
                BufferUsage::Uniform,
                SkyboxUbo::SIZE as vk::DeviceSize,
            )?;

            let buffer_info = vk::DescriptorBufferInfo::default()
                .buffer(buffer.handle())
                .offset(0)
                .range(SkyboxUbo::SIZE as vk::DeviceSize);
            let buffer_infos = [buffer_info];

            let image_info = vk::DescriptorImageInfo::default()
                .sampler(cubemap_sampler)
                .image_view(cubemap_view)
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            let image_infos = [image_info];

            let writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_infos),
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_infos),
            ];
            update_descriptor_sets(&device, &writes);

            uniform_buffers.push(buffer);
        }

        let pipeline_layout = PipelineLayout::new(device.clone(), &[set_layout.handle()], &[])?;

        let vert = Shader::from_spirv_file(device.clone(), vert_path, ShaderStage::Vertex)?;
        let frag = Shader::from_spirv_file(device.clone(), frag_path, ShaderStage::Fragment)?;

        // No vertex input: positions come from gl_VertexIndex.
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .cull_mode(CullMode::None)
            .depth_write(false)
            .depth_compare(DepthCompare::LessOrEqual)
            .build(device.clone(), &pipeline_layout, render_pass)?;

        info!("Skybox created");

        Ok(Self {
            device,
            _set_layout: set_layout,
            _descriptor_pool: descriptor_pool,
            descriptor_sets,
            uniform_buffers,
            pipeline_layout,
            pipeline,
        })
    }

    /// Writes the frame's view-projection, dropping the view translation
    /// so the skybox stays centered on the camera.
    ///
    /// # Errors
    ///
    /// Returns an error if the uniform write fails.
    pub fn update(&self, frame_index: usize, view: Mat4, projection: Mat4) -> RhiResult<()> {
        let mut rotation_only = view;
        rotation_only.w_axis = glam::Vec4::W;

        let ubo = SkyboxUbo {
            view_projection: projection * rotation_only,
        };
        self.uniform_buffers[frame_index].write(0, bytemuck::bytes_of(&ubo))
    }

    /// Records the skybox draw for `frame_index`.
    ///
    /// Must be called inside an active render pass, before opaque
    /// geometry.
    pub fn record(&self, cmd: &mirage_rhi::command::CommandBuffer, frame_index: usize) {
        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline_layout.handle(),
            0,
            &[self.descriptor_sets[frame_index]],
        );
        cmd.draw(SKYBOX_VERTEX_COUNT, 1, 0, 0);
    }

    /// The device this skybox was created on.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skybox_vertex_count_is_a_cube() {
        // 6 faces * 2 triangles * 3 vertices
        assert_eq!(SKYBOX_VERTEX_COUNT, 36);
    }
}
