//! Renderer orchestration.
//!
//! [`Renderer`] owns the full Vulkan state and drives each frame through
//! the protocol: begin frame (slot fence wait + image acquire), encode the
//! selected render path, submit, present, advance. Stale-surface results
//! from acquire or present route into [`Renderer::recreate_surface`],
//! which drains the device and rebuilds everything keyed on the swap
//! extent or image count.

use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Vec3};
use tracing::{debug, info, warn};

use mirage_core::{EngineConfig, Timer};
use mirage_platform::{InputState, KeyCode, Surface, Window, required_surface_extensions};
use mirage_resources::Model;
use mirage_rhi::buffer::{Buffer, BufferUsage};
use mirage_rhi::command::CommandPool;
use mirage_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, uniform_buffer_binding};
use mirage_rhi::device::Device;
use mirage_rhi::instance::Instance;
use mirage_rhi::physical_device::select_physical_device;
use mirage_rhi::pipeline::{
    BlendMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use mirage_rhi::render_pass::RenderPass;
use mirage_rhi::shader::{Shader, ShaderStage};
use mirage_rhi::swapchain::Swapchain;
use mirage_rhi::vertex::Vertex;
use mirage_rhi::{RhiError, RhiResult};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::compute::ComputeStage;
use crate::depth_buffer::DepthBuffer;
use crate::encoder::{PipelineBinder, RenderPath, select_render_path};
use crate::frame_sync::{AcquireOutcome, FrameSync};
use crate::mode::ModeController;
use crate::model_gpu::{ModelResources, write_binding_set};
use crate::overlay::{FrameStats, UiOverlay, draw_hud};
use crate::skybox::Skybox;
use crate::ubo::{CameraUbo, MaterialUbo, ObjectUbo};

/// Clear color for the forward pass.
const CLEAR_COLOR: [f32; 4] = [0.02, 0.02, 0.04, 1.0];

/// The standard and additive mesh pipelines, rebuilt together during
/// resize recovery.
struct MeshPipelines {
    standard: Pipeline,
    additive: Pipeline,
}

/// Static debug quad drawn when no model is loaded.
struct QuadGeometry {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl QuadGeometry {
    fn new(device: Arc<Device>) -> RhiResult<Self> {
        let vertices = [
            Vertex::new([-0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            Vertex::new([0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
        ];
        let indices: [u32; 6] = [0, 1, 2, 2, 3, 0];

        let vertex_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&vertices),
        )?;
        let index_buffer = Buffer::new_with_data(
            device,
            BufferUsage::Index,
            bytemuck::cast_slice(&indices),
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }
}

/// The renderer: owns the presentation surface, frame synchronization,
/// render-path state, and the resize/recovery coordination between them.
///
/// Field order is teardown order: every GPU resource holding an
/// `Arc<Device>` is declared before `device`, which precedes `surface`
/// and `instance`. [`Drop`] drains the device first.
pub struct Renderer {
    overlay: UiOverlay,
    frame_sync: FrameSync,
    compute: ComputeStage,
    skybox: Option<Skybox>,
    model: Option<ModelResources>,
    quad: QuadGeometry,
    _quad_material_buffer: Buffer,
    quad_sets: Vec<vk::DescriptorSet>,
    camera_buffers: Vec<Buffer>,
    object_buffers: Vec<Buffer>,
    mesh_pipelines: MeshPipelines,
    pipeline_layout: PipelineLayout,
    scene_set_layout: DescriptorSetLayout,
    descriptor_pool: DescriptorPool,
    depth_buffer: DepthBuffer,
    swapchain: Swapchain,
    forward_pass: RenderPass,
    overlay_pass: RenderPass,
    command_pool: CommandPool,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,

    config: EngineConfig,
    mode: ModeController,
    timer: Timer,
    stats: FrameStats,
    width: u32,
    height: u32,
    framebuffer_resized: bool,
    view: Mat4,
    projection: Mat4,
    camera_position: Vec3,
    model_transform: Mat4,
}

impl Renderer {
    /// Creates the renderer for `window`.
    ///
    /// Initializes the full chain: instance, surface, device, swapchain
    /// with views and framebuffers, render passes, pipelines, per-frame
    /// uniforms, compute stage, overlay, and frame synchronization. Loads
    /// the configured model when one is set.
    ///
    /// # Errors
    ///
    /// Any resource creation failure here is fatal; the caller should log
    /// it and terminate.
    pub fn new(window: &Window, config: EngineConfig) -> RhiResult<Self> {
        let width = window.width();
        let height = window.height();

        info!("Initializing renderer ({}x{})", width, height);

        let surface_extensions = required_surface_extensions(
            window
                .raw_display_handle()
                .map_err(|e| RhiError::SurfaceError(e.to_string()))?,
        )
        .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let instance = Instance::new(config.validation, &surface_extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device)?;

        let graphics_family = device.queue_families().graphics_family.unwrap();
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let mut swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            surface.loader(),
            width,
            height,
        )?;
        swapchain.create_image_views()?;

        let forward_pass = RenderPass::forward(
            device.clone(),
            swapchain.format(),
            crate::depth_buffer::DEFAULT_DEPTH_FORMAT,
        )?;
        let overlay_pass = RenderPass::overlay(
            device.clone(),
            swapchain.format(),
            crate::depth_buffer::DEFAULT_DEPTH_FORMAT,
        )?;

        let extent = swapchain.extent();
        let depth_buffer =
            DepthBuffer::with_default_format(device.clone(), extent.width, extent.height)?;
        swapchain.create_framebuffers(&forward_pass, depth_buffer.image_view())?;

        // Scene binding set: camera (0), object (1), material (2).
        let bindings = [
            uniform_buffer_binding(
                0,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            ),
            uniform_buffer_binding(1, vk::ShaderStageFlags::VERTEX),
            uniform_buffer_binding(2, vk::ShaderStageFlags::FRAGMENT),
        ];
        let scene_set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(384)];
        let descriptor_pool = DescriptorPool::new(device.clone(), 128, &pool_sizes)?;

        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[scene_set_layout.handle()], &[])?;

        let mesh_pipelines =
            Self::create_mesh_pipelines(&device, &pipeline_layout, &forward_pass, &config)?;

        let mut camera_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut object_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            camera_buffers.push(Buffer::new(
                device.clone(),
                BufferUsage::Uniform,
                CameraUbo::SIZE as vk::DeviceSize,
            )?);
            object_buffers.push(Buffer::new(
                device.clone(),
                BufferUsage::Uniform,
                ObjectUbo::SIZE as vk::DeviceSize,
            )?);
        }

        let quad = QuadGeometry::new(device.clone())?;
        let quad_material = MaterialUbo {
            base_color: glam::Vec4::new(0.4, 0.4, 0.8, 1.0),
            emissive: glam::Vec4::ZERO,
        };
        let quad_material_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Uniform,
            bytemuck::bytes_of(&quad_material),
        )?;

        let layouts = vec![scene_set_layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let quad_sets = descriptor_pool.allocate(&layouts)?;
        for (frame, &set) in quad_sets.iter().enumerate() {
            write_binding_set(
                &device,
                set,
                &camera_buffers[frame],
                &object_buffers[frame],
                &quad_material_buffer,
            );
        }

        let compute = ComputeStage::new(
            device.clone(),
            &config.shader_path("pattern.comp.spv"),
            extent,
            &command_pool,
        )?;

        let overlay = UiOverlay::new(
            &instance,
            &device,
            &forward_pass,
            &command_pool,
            window.inner(),
        )?;

        let frame_sync = FrameSync::new(device.clone(), &command_pool, swapchain.image_count())?;

        let aspect = extent.width as f32 / extent.height as f32;
        let camera_position = Vec3::new(0.0, 0.0, 3.0);

        let mut renderer = Self {
            overlay,
            frame_sync,
            compute,
            skybox: None,
            model: None,
            quad,
            _quad_material_buffer: quad_material_buffer,
            quad_sets,
            camera_buffers,
            object_buffers,
            mesh_pipelines,
            pipeline_layout,
            scene_set_layout,
            descriptor_pool,
            depth_buffer,
            swapchain,
            forward_pass,
            overlay_pass,
            command_pool,
            device,
            surface,
            instance,
            config,
            mode: ModeController::new(),
            timer: Timer::new(),
            stats: FrameStats::default(),
            width,
            height,
            framebuffer_resized: false,
            view: Mat4::look_at_rh(camera_position, Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_rh(45.0_f32.to_radians(), aspect, 0.1, 100.0),
            camera_position,
            model_transform: Mat4::IDENTITY,
        };

        if let Some(path) = renderer.config.model_path.clone() {
            if let Err(e) = renderer.load_model(&path) {
                warn!("Failed to load model {:?}: {}", path, e);
            }
        }

        info!(
            "Renderer ready: {} swap images, {} frames in flight",
            renderer.swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(renderer)
    }

    fn create_mesh_pipelines(
        device: &Arc<Device>,
        layout: &PipelineLayout,
        render_pass: &RenderPass,
        config: &EngineConfig,
    ) -> RhiResult<MeshPipelines> {
        let vert = Shader::from_spirv_file(
            device.clone(),
            &config.shader_path("mesh.vert.spv"),
            ShaderStage::Vertex,
        )?;
        let frag = Shader::from_spirv_file(
            device.clone(),
            &config.shader_path("mesh.frag.spv"),
            ShaderStage::Fragment,
        )?;

        let standard = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .build(device.clone(), layout, render_pass)?;

        // Emissive geometry accumulates on top of the opaque pass; it
        // tests depth but must not write it.
        let additive = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .blend_mode(BlendMode::Additive)
            .depth_write(false)
            .build(device.clone(), layout, render_pass)?;

        Ok(MeshPipelines { standard, additive })
    }

    /// Loads a glTF model and uploads its GPU resources, replacing any
    /// previously loaded model. The model transform is set to center and
    /// fit the model.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or upload fails; the renderer then
    /// keeps rendering the fallback quad.
    pub fn load_model(&mut self, path: &std::path::Path) -> RhiResult<()> {
        let model = Model::load(path)
            .map_err(|e| RhiError::InvalidResource(format!("model load: {}", e)))?;

        let resources = ModelResources::upload(
            self.device.clone(),
            &model,
            &self.scene_set_layout,
            &self.descriptor_pool,
            &self.camera_buffers,
            &self.object_buffers,
        )?;

        let scale = 2.0 / model.size().max_element().max(0.001);
        self.model_transform =
            Mat4::from_scale(Vec3::splat(scale)) * Mat4::from_translation(-model.center());
        self.model = Some(resources);

        Ok(())
    }

    /// Attaches a skybox over an externally owned cubemap view/sampler.
    ///
    /// # Errors
    ///
    /// Returns an error if skybox resource creation fails.
    pub fn attach_skybox(
        &mut self,
        cubemap_view: vk::ImageView,
        cubemap_sampler: vk::Sampler,
    ) -> RhiResult<()> {
        self.skybox = Some(Skybox::new(
            self.device.clone(),
            &self.forward_pass,
            &self.config.shader_path("skybox.vert.spv"),
            &self.config.shader_path("skybox.frag.spv"),
            cubemap_view,
            cubemap_sampler,
        )?);
        Ok(())
    }

    /// Feeds the input state: polls the render-mode toggle key.
    pub fn handle_input(&mut self, input: &InputState) {
        if let Some(mode) = self.mode.poll(input.is_key_pressed(KeyCode::KeyB)) {
            info!("Render mode switched to {}", mode.name());
        }
    }

    /// Records a framebuffer size change. Zero-area sizes pause the
    /// renderer; recovery runs on the next frame once the size is nonzero.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }

        debug!(
            "Resize: {}x{} -> {}x{}",
            self.width, self.height, width, height
        );
        self.width = width;
        self.height = height;

        if width == 0 || height == 0 {
            info!("Window minimized, pausing rendering");
        } else {
            self.framebuffer_resized = true;
        }
    }

    /// True while the window has a zero-area framebuffer. No frame work
    /// runs in this state; the application loop should block on events.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Sets the camera matrices used by the graphics paths.
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4, position: Vec3) {
        self.view = view;
        self.projection = projection;
        self.camera_position = position;
    }

    /// Forwards a window event to the UI overlay.
    ///
    /// Returns whether the overlay consumed the event.
    pub fn on_window_event(
        &mut self,
        window: &Window,
        event: &winit::event::WindowEvent,
    ) -> bool {
        self.overlay.on_window_event(window.inner(), event)
    }

    /// Renders one frame.
    ///
    /// A frame, once begun, always runs acquire -> record -> submit ->
    /// present, or aborts whole when acquire reports a stale surface.
    /// Suboptimal results are handled after present so the frame is not
    /// lost.
    ///
    /// # Errors
    ///
    /// Transient surface staleness is handled internally via recovery;
    /// every returned error is fatal.
    pub fn render_frame(&mut self, window: &Window) -> RhiResult<()> {
        let delta = self.timer.delta_secs();
        self.update_stats(delta);

        if self.is_paused() {
            return Ok(());
        }

        if self.framebuffer_resized {
            self.recreate_surface()?;
        }

        let (image_index, suboptimal) = match self.frame_sync.begin_frame(&self.swapchain)? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                // Frame aborted before any submission.
                self.recreate_surface()?;
                return Ok(());
            }
        };
        let mut needs_recovery = suboptimal;

        let path = select_render_path(self.mode.mode(), self.model.is_some());
        self.stats.path = Some(path);

        self.update_uniforms()?;

        let stats = self.stats;
        self.overlay
            .run(window.inner(), |ctx| draw_hud(ctx, &stats));

        self.record_commands(image_index, path)?;

        self.frame_sync.submit()?;
        needs_recovery |= self.frame_sync.present(&self.swapchain)?;
        self.frame_sync.advance();

        if needs_recovery {
            self.recreate_surface()?;
        }

        Ok(())
    }

    fn update_stats(&mut self, delta: f32) {
        self.stats.frame_time_ms = delta * 1000.0;
        if delta > 0.0 {
            let instantaneous = 1.0 / delta;
            self.stats.fps = if self.stats.fps == 0.0 {
                instantaneous
            } else {
                self.stats.fps * 0.95 + instantaneous * 0.05
            };
        }
    }

    fn update_uniforms(&mut self) -> RhiResult<()> {
        let frame = self.frame_sync.current_slot();

        let camera = CameraUbo::new(self.view, self.projection, self.camera_position);
        self.camera_buffers[frame].write(0, bytemuck::bytes_of(&camera))?;

        let object = ObjectUbo::new(self.model_transform);
        self.object_buffers[frame].write(0, bytemuck::bytes_of(&object))?;

        if let Some(skybox) = &self.skybox {
            skybox.update(frame, self.view, self.projection)?;
        }

        Ok(())
    }

    /// Records the frame's command buffer, dispatching over the selected
    /// render path. The match is exhaustive: a new path cannot be added
    /// without an encoding routine.
    fn record_commands(&mut self, image_index: u32, path: RenderPath) -> RhiResult<()> {
        let cmd = self.frame_sync.command_buffer();
        cmd.reset()?;
        cmd.begin()?;

        match path {
            RenderPath::Model => self.record_model_path(image_index)?,
            RenderPath::FallbackQuad => self.record_quad_path(image_index)?,
            RenderPath::Compute => self.record_compute_path(image_index)?,
        }

        self.frame_sync.command_buffer().end()?;
        Ok(())
    }

    fn forward_clear_values() -> [vk::ClearValue; 2] {
        [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ]
    }

    fn set_full_viewport(&self, cmd: &mirage_rhi::command::CommandBuffer, extent: vk::Extent2D) {
        cmd.set_viewport(&vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        cmd.set_scissor(&vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        });
    }

    /// Forward pass over the loaded model: skybox first, then the opaque
    /// pass, then the emissive additive pass, then the overlay, all inside
    /// one render pass. Vertex/index buffers are bound once; pipeline
    /// binds are elided when consecutive draws share one.
    fn record_model_path(&mut self, image_index: u32) -> RhiResult<()> {
        let frame = self.frame_sync.current_slot();
        let cmd = self.frame_sync.command_buffer();
        let extent = self.swapchain.extent();

        let model = self
            .model
            .as_ref()
            .ok_or_else(|| RhiError::InvalidResource("model path without a model".to_string()))?;

        cmd.begin_render_pass(
            &self.forward_pass,
            self.swapchain.framebuffer(image_index as usize),
            extent,
            &Self::forward_clear_values(),
        );
        self.set_full_viewport(cmd, extent);

        if let Some(skybox) = &self.skybox {
            skybox.record(cmd, frame);
        }

        cmd.bind_vertex_buffers(0, &[model.vertex_buffer().handle()], &[0]);
        cmd.bind_index_buffer(model.index_buffer().handle(), 0, vk::IndexType::UINT32);

        let mut binder = PipelineBinder::new();

        for primitive in &model.passes().opaque {
            binder.bind_graphics(cmd, self.mesh_pipelines.standard.handle());
            cmd.bind_descriptor_sets(
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout.handle(),
                0,
                &[model.descriptor_set(primitive.material_index, frame)],
            );
            cmd.draw_indexed(primitive.index_count, 1, primitive.first_index, 0, 0);
        }

        for primitive in &model.passes().emissive {
            binder.bind_graphics(cmd, self.mesh_pipelines.additive.handle());
            cmd.bind_descriptor_sets(
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout.handle(),
                0,
                &[model.descriptor_set(primitive.material_index, frame)],
            );
            cmd.draw_indexed(primitive.index_count, 1, primitive.first_index, 0, 0);
        }

        self.overlay.render(cmd, extent)?;
        cmd.end_render_pass();

        Ok(())
    }

    /// Forward pass over the static debug quad.
    fn record_quad_path(&mut self, image_index: u32) -> RhiResult<()> {
        let frame = self.frame_sync.current_slot();
        let cmd = self.frame_sync.command_buffer();
        let extent = self.swapchain.extent();

        cmd.begin_render_pass(
            &self.forward_pass,
            self.swapchain.framebuffer(image_index as usize),
            extent,
            &Self::forward_clear_values(),
        );
        self.set_full_viewport(cmd, extent);

        cmd.bind_pipeline(
            vk::PipelineBindPoint::GRAPHICS,
            self.mesh_pipelines.standard.handle(),
        );
        cmd.bind_vertex_buffers(0, &[self.quad.vertex_buffer.handle()], &[0]);
        cmd.bind_index_buffer(self.quad.index_buffer.handle(), 0, vk::IndexType::UINT32);
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline_layout.handle(),
            0,
            &[self.quad_sets[frame]],
        );
        cmd.draw_indexed(self.quad.index_count, 1, 0, 0, 0);

        self.overlay.render(cmd, extent)?;
        cmd.end_render_pass();

        Ok(())
    }

    /// Compute dispatch, copy to the swap image, then overlay compositing
    /// inside the overlay pass (the swap image is already in the
    /// color-attachment layout when the pass begins).
    fn record_compute_path(&mut self, image_index: u32) -> RhiResult<()> {
        let cmd = self.frame_sync.command_buffer();
        let extent = self.swapchain.extent();
        let swap_image = self.swapchain.image(image_index as usize);

        self.compute
            .record(cmd, swap_image, self.timer.elapsed_secs());

        // No clear values: the overlay pass loads color, discards depth.
        cmd.begin_render_pass(
            &self.overlay_pass,
            self.swapchain.framebuffer(image_index as usize),
            extent,
            &[],
        );
        self.set_full_viewport(cmd, extent);
        self.overlay.render(cmd, extent)?;
        cmd.end_render_pass();

        Ok(())
    }

    /// Resize/recovery coordination.
    ///
    /// Drains the device, then rebuilds in dependency order: swapchain
    /// (with views), depth buffer, framebuffers, the extent/format-keyed
    /// mesh pipelines, the compute output image with its binding set
    /// re-pointed at the new view, and the per-image synchronization
    /// collections resized to the new image count.
    ///
    /// Idempotent for an unchanged window size: the deterministic
    /// format/extent/count selection reproduces a structurally identical
    /// surface.
    ///
    /// # Errors
    ///
    /// Recreation failures are fatal.
    fn recreate_surface(&mut self) -> RhiResult<()> {
        if self.is_paused() {
            debug!("Skipping surface recreation while minimized");
            return Ok(());
        }

        // The full idle is the required contract here: per-image
        // semaphores and swap resources must never be destroyed while an
        // in-flight frame or present could still reference them.
        self.device.wait_idle()?;

        self.swapchain.recreate(
            &self.instance,
            self.surface.handle(),
            self.surface.loader(),
            self.width,
            self.height,
        )?;
        self.swapchain.create_image_views()?;

        let extent = self.swapchain.extent();
        self.depth_buffer =
            DepthBuffer::with_default_format(self.device.clone(), extent.width, extent.height)?;
        self.swapchain
            .create_framebuffers(&self.forward_pass, self.depth_buffer.image_view())?;

        self.mesh_pipelines = Self::create_mesh_pipelines(
            &self.device,
            &self.pipeline_layout,
            &self.forward_pass,
            &self.config,
        )?;

        self.compute.recreate_output(extent, &self.command_pool)?;
        self.frame_sync
            .rebuild_per_image(self.swapchain.image_count())?;

        let aspect = extent.width as f32 / extent.height as f32;
        self.projection = Mat4::perspective_rh(45.0_f32.to_radians(), aspect, 0.1, 100.0);

        self.framebuffer_resized = false;

        info!(
            "Surface recreated: {}x{}, {} images",
            extent.width,
            extent.height,
            self.swapchain.image_count()
        );

        Ok(())
    }

    /// Current frame statistics.
    #[inline]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Current swap extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            tracing::error!("Failed to wait for device idle during drop: {:?}", e);
        }

        // The overlay's renderer and allocator must go while the device
        // is still alive; the remaining fields tear down in declaration
        // order after this.
        self.overlay.destroy();

        info!("Renderer destroyed");
    }
}
