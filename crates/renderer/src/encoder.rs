//! Render path selection and draw-list construction.
//!
//! The per-frame command encoding in [`crate::renderer`] dispatches over
//! [`RenderPath`], an exhaustive sum type: adding a path is a compile
//! error until every match arm handles it. The helpers here are pure so
//! the encoding invariants (two-pass emissive split, tile rounding,
//! redundant-bind elision) are testable without a device.

use ash::vk;
use mirage_resources::{Model, Primitive};
use mirage_rhi::command::CommandBuffer;

use crate::mode::RenderMode;

/// Workgroup tile edge used by the compute shader.
pub const COMPUTE_TILE_SIZE: u32 = 16;

/// The encoding routine selected for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    /// Forward pass over a loaded model (plus skybox and overlay).
    Model,
    /// Forward pass over the static debug quad (no model loaded).
    FallbackQuad,
    /// Compute dispatch copied to the swap image, overlay composited after.
    Compute,
}

impl RenderPath {
    /// Display name for the HUD.
    pub fn name(self) -> &'static str {
        match self {
            RenderPath::Model => "model",
            RenderPath::FallbackQuad => "fallback quad",
            RenderPath::Compute => "compute",
        }
    }
}

/// Selects the render path for a frame.
///
/// Mode wins; within graphics mode the model path requires a loaded model.
pub fn select_render_path(mode: RenderMode, model_loaded: bool) -> RenderPath {
    match mode {
        RenderMode::Compute => RenderPath::Compute,
        RenderMode::Graphics if model_loaded => RenderPath::Model,
        RenderMode::Graphics => RenderPath::FallbackQuad,
    }
}

/// Primitives split by pass: opaque first, emissive after.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrawPasses {
    /// Primitives drawn with the standard pipeline.
    pub opaque: Vec<Primitive>,
    /// Primitives drawn with the additive pipeline.
    pub emissive: Vec<Primitive>,
}

/// Partitions a model's primitives into the opaque and emissive passes.
///
/// Each primitive lands in exactly one pass, so a single pipeline bind per
/// pass suffices; the shared vertex/index buffers are bound once before
/// both passes.
pub fn partition_primitives(model: &Model) -> DrawPasses {
    let mut passes = DrawPasses::default();

    for primitive in model.primitives() {
        if model.materials[primitive.material_index].is_emissive {
            passes.emissive.push(*primitive);
        } else {
            passes.opaque.push(*primitive);
        }
    }

    passes
}

/// Number of compute workgroups covering `extent` at the fixed tile size.
pub fn dispatch_group_count(extent: vk::Extent2D) -> (u32, u32) {
    (
        extent.width.div_ceil(COMPUTE_TILE_SIZE),
        extent.height.div_ceil(COMPUTE_TILE_SIZE),
    )
}

/// Tracks the last bound graphics pipeline and elides redundant binds.
#[derive(Debug, Default)]
pub struct PipelineBinder {
    bound: Option<vk::Pipeline>,
}

impl PipelineBinder {
    /// A binder with nothing bound yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `pipeline` unless it is already bound.
    ///
    /// Returns whether a bind was actually issued.
    pub fn bind_graphics(&mut self, cmd: &CommandBuffer, pipeline: vk::Pipeline) -> bool {
        if self.bound == Some(pipeline) {
            return false;
        }
        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline);
        self.bound = Some(pipeline);
        true
    }

    /// Whether `pipeline` would need a bind.
    pub fn needs_bind(&self, pipeline: vk::Pipeline) -> bool {
        self.bound != Some(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use glam::Vec3;
    use mirage_resources::{Material, Mesh};

    fn two_material_model() -> Model {
        let opaque = Material::default();
        let emissive = Material {
            emissive_factor: Vec3::ONE,
            is_emissive: true,
            ..Material::default()
        };

        Model {
            vertices: Vec::new(),
            indices: vec![0; 9],
            meshes: vec![Mesh {
                name: "mesh".to_string(),
                primitives: vec![
                    Primitive {
                        first_index: 0,
                        index_count: 3,
                        material_index: 0,
                    },
                    Primitive {
                        first_index: 3,
                        index_count: 3,
                        material_index: 1,
                    },
                    Primitive {
                        first_index: 6,
                        index_count: 3,
                        material_index: 0,
                    },
                ],
            }],
            materials: vec![opaque, emissive],
            aabb_min: Vec3::ZERO,
            aabb_max: Vec3::ONE,
        }
    }

    #[test]
    fn test_select_path_compute_wins() {
        assert_eq!(
            select_render_path(RenderMode::Compute, true),
            RenderPath::Compute
        );
        assert_eq!(
            select_render_path(RenderMode::Compute, false),
            RenderPath::Compute
        );
    }

    #[test]
    fn test_select_path_graphics_depends_on_model() {
        assert_eq!(
            select_render_path(RenderMode::Graphics, true),
            RenderPath::Model
        );
        assert_eq!(
            select_render_path(RenderMode::Graphics, false),
            RenderPath::FallbackQuad
        );
    }

    #[test]
    fn test_partition_splits_by_emissive_flag() {
        let model = two_material_model();
        let passes = partition_primitives(&model);

        assert_eq!(passes.opaque.len(), 2);
        assert_eq!(passes.emissive.len(), 1);
        assert!(passes.opaque.iter().all(|p| p.material_index == 0));
        assert!(passes.emissive.iter().all(|p| p.material_index == 1));
    }

    #[test]
    fn test_partition_covers_every_primitive_once() {
        let model = two_material_model();
        let passes = partition_primitives(&model);
        assert_eq!(
            passes.opaque.len() + passes.emissive.len(),
            model.primitives().count()
        );
    }

    #[test]
    fn test_dispatch_rounds_up_partial_tiles() {
        let (x, y) = dispatch_group_count(vk::Extent2D {
            width: 1024,
            height: 768,
        });
        assert_eq!((x, y), (64, 48));

        let (x, y) = dispatch_group_count(vk::Extent2D {
            width: 1,
            height: 17,
        });
        assert_eq!((x, y), (1, 2));
    }

    #[test]
    fn test_binder_reports_redundant_binds() {
        let a = vk::Pipeline::from_raw(1);
        let b = vk::Pipeline::from_raw(2);

        let mut binder = PipelineBinder::new();
        assert!(binder.needs_bind(a));

        // Simulate the bookkeeping without a live command buffer.
        binder.bound = Some(a);
        assert!(!binder.needs_bind(a));
        assert!(binder.needs_bind(b));
    }
}
