//! GPU resources for a loaded model.
//!
//! One shared vertex buffer and one shared index buffer for the whole
//! model; every primitive draws a range of them. Each material owns a
//! small uniform buffer plus one binding set per frame in flight,
//! combining the frame's camera/object uniforms with the material data.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use mirage_resources::Model;
use mirage_rhi::RhiResult;
use mirage_rhi::buffer::{Buffer, BufferUsage};
use mirage_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, update_descriptor_sets};
use mirage_rhi::device::Device;
use mirage_rhi::vertex::Vertex;

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::encoder::{DrawPasses, partition_primitives};
use crate::ubo::{CameraUbo, MaterialUbo, ObjectUbo};

/// Uploaded model: shared buffers, per-material binding sets, and the
/// opaque/emissive draw split.
pub struct ModelResources {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    // Referenced by the descriptor sets; kept alive alongside them.
    _material_buffers: Vec<Buffer>,
    /// `descriptor_sets[material][frame]`
    descriptor_sets: Vec<Vec<vk::DescriptorSet>>,
    passes: DrawPasses,
}

impl ModelResources {
    /// Uploads `model` and builds the per-material binding sets.
    ///
    /// `camera_buffers` and `object_buffers` are the per-frame uniform
    /// buffers owned by the renderer, one each per frame slot.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer upload or descriptor allocation fails.
    pub fn upload(
        device: Arc<Device>,
        model: &Model,
        set_layout: &DescriptorSetLayout,
        pool: &DescriptorPool,
        camera_buffers: &[Buffer],
        object_buffers: &[Buffer],
    ) -> RhiResult<Self> {
        debug_assert_eq!(camera_buffers.len(), MAX_FRAMES_IN_FLIGHT);
        debug_assert_eq!(object_buffers.len(), MAX_FRAMES_IN_FLIGHT);

        let vertices: Vec<Vertex> = model
            .vertices
            .iter()
            .map(|v| Vertex::new(v.position, v.normal, v.tex_coord))
            .collect();

        let vertex_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&vertices),
        )?;
        let index_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Index,
            bytemuck::cast_slice(&model.indices),
        )?;

        let mut material_buffers = Vec::with_capacity(model.materials.len());
        let mut descriptor_sets = Vec::with_capacity(model.materials.len());

        for material in &model.materials {
            let ubo = MaterialUbo::from(material);
            let buffer = Buffer::new_with_data(
                device.clone(),
                BufferUsage::Uniform,
                bytemuck::bytes_of(&ubo),
            )?;

            let layouts = vec![set_layout.handle(); MAX_FRAMES_IN_FLIGHT];
            let sets = pool.allocate(&layouts)?;

            for (frame, &set) in sets.iter().enumerate() {
                write_binding_set(
                    &device,
                    set,
                    &camera_buffers[frame],
                    &object_buffers[frame],
                    &buffer,
                );
            }

            material_buffers.push(buffer);
            descriptor_sets.push(sets);
        }

        let passes = partition_primitives(model);

        info!(
            "Model uploaded: {} vertices, {} indices, {} materials ({} opaque / {} emissive primitives)",
            vertices.len(),
            model.indices.len(),
            model.materials.len(),
            passes.opaque.len(),
            passes.emissive.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            _material_buffers: material_buffers,
            descriptor_sets,
            passes,
        })
    }

    /// The shared vertex buffer.
    #[inline]
    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    /// The shared index buffer.
    #[inline]
    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    /// The opaque/emissive draw split.
    #[inline]
    pub fn passes(&self) -> &DrawPasses {
        &self.passes
    }

    /// Binding set for `material_index` in `frame_index`.
    ///
    /// # Panics
    ///
    /// Panics on out-of-range indices; both are bounded by construction.
    #[inline]
    pub fn descriptor_set(&self, material_index: usize, frame_index: usize) -> vk::DescriptorSet {
        self.descriptor_sets[material_index][frame_index]
    }
}

/// Writes one binding set: camera (0), object (1), material (2).
pub(crate) fn write_binding_set(
    device: &Device,
    set: vk::DescriptorSet,
    camera: &Buffer,
    object: &Buffer,
    material: &Buffer,
) {
    let camera_info = [vk::DescriptorBufferInfo::default()
        .buffer(camera.handle())
        .offset(0)
        .range(CameraUbo::SIZE as vk::DeviceSize)];
    let object_info = [vk::DescriptorBufferInfo::default()
        .buffer(object.handle())
        .offset(0)
        .range(ObjectUbo::SIZE as vk::DeviceSize)];
    let material_info = [vk::DescriptorBufferInfo::default()
        .buffer(material.handle())
        .offset(0)
        .range(MaterialUbo::SIZE as vk::DeviceSize)];

    let writes = [
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&camera_info),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(1)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&object_info),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(2)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&material_info),
    ];

    update_descriptor_sets(device, &writes);
}
