//! Uniform buffer layouts.
//!
//! These structs must match the GLSL uniform block layouts exactly. All are
//! `#[repr(C)]` with `Pod`/`Zeroable` for direct byte upload.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Per-frame camera data (binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct CameraUbo {
    /// View matrix.
    pub view: Mat4,
    /// Projection matrix.
    pub projection: Mat4,
    /// Camera world position (w unused).
    pub position: Vec4,
}

impl CameraUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Builds the camera block from matrices and position.
    pub fn new(view: Mat4, projection: Mat4, position: Vec3) -> Self {
        Self {
            view,
            projection,
            position: position.extend(0.0),
        }
    }
}

/// Per-frame object data (binding 1).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ObjectUbo {
    /// Model matrix.
    pub model: Mat4,
    /// Normal matrix: transpose of the inverse of the model matrix.
    pub normal_matrix: Mat4,
}

impl ObjectUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Builds the object block from a model matrix.
    pub fn new(model: Mat4) -> Self {
        Self {
            model,
            normal_matrix: model.inverse().transpose(),
        }
    }
}

/// Per-material data (binding 2).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct MaterialUbo {
    /// Base color multiplier.
    pub base_color: Vec4,
    /// Emissive color (w unused).
    pub emissive: Vec4,
}

impl MaterialUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

impl From<&mirage_resources::Material> for MaterialUbo {
    fn from(material: &mirage_resources::Material) -> Self {
        Self {
            base_color: material.base_color_factor,
            emissive: material.emissive_factor.extend(0.0),
        }
    }
}

/// Skybox uniform: combined view-projection without translation.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct SkyboxUbo {
    /// Rotation-only view times projection.
    pub view_projection: Mat4,
}

impl SkyboxUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_ubo_size() {
        // 2 Mat4 + Vec4 = 144 bytes
        assert_eq!(CameraUbo::SIZE, 144);
    }

    #[test]
    fn test_object_ubo_size() {
        assert_eq!(ObjectUbo::SIZE, 128);
    }

    #[test]
    fn test_material_ubo_size() {
        assert_eq!(MaterialUbo::SIZE, 32);
    }

    #[test]
    fn test_normal_matrix_of_uniform_scale() {
        let model = Mat4::from_scale(Vec3::splat(2.0));
        let ubo = ObjectUbo::new(model);
        assert_eq!(ubo.normal_matrix, model.inverse().transpose());
    }

    #[test]
    fn test_ubos_are_pod() {
        let camera = CameraUbo::default();
        assert_eq!(bytemuck::bytes_of(&camera).len(), CameraUbo::SIZE);

        let material = MaterialUbo::default();
        assert_eq!(bytemuck::bytes_of(&material).len(), MaterialUbo::SIZE);
    }
}
