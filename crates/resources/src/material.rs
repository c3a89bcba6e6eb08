//! Material definitions.

use glam::{Vec3, Vec4};

/// Material parameters used by the forward passes.
///
/// A material is classified emissive when its emissive factor is nonzero or
/// it carries an emissive texture; emissive primitives are drawn in the
/// additive pass instead of the opaque one.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Material name from the source file, if any.
    pub name: Option<String>,
    /// Base color multiplier.
    pub base_color_factor: Vec4,
    /// Emissive color.
    pub emissive_factor: Vec3,
    /// Whether this material renders in the additive pass.
    pub is_emissive: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: Vec4::ONE,
            emissive_factor: Vec3::ZERO,
            is_emissive: false,
        }
    }
}

impl Material {
    /// Classifies a material from its emissive inputs.
    pub fn classify_emissive(emissive_factor: Vec3, has_emissive_texture: bool) -> bool {
        has_emissive_texture || emissive_factor.max_element() > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_material_is_opaque() {
        let material = Material::default();
        assert!(!material.is_emissive);
        assert_eq!(material.base_color_factor, Vec4::ONE);
    }

    #[test]
    fn test_emissive_classification_by_factor() {
        assert!(Material::classify_emissive(Vec3::new(0.0, 0.5, 0.0), false));
        assert!(!Material::classify_emissive(Vec3::ZERO, false));
    }

    #[test]
    fn test_emissive_classification_by_texture() {
        assert!(Material::classify_emissive(Vec3::ZERO, true));
    }
}
