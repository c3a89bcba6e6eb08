//! Integration tests for the model representation.

use glam::Vec3;
use mirage_resources::{Material, Mesh, Model, Primitive};

fn model_with_materials(materials: Vec<Material>, primitives: Vec<Primitive>) -> Model {
    Model {
        vertices: Vec::new(),
        indices: (0..primitives.iter().map(|p| p.first_index + p.index_count).max().unwrap_or(0))
            .collect(),
        meshes: vec![Mesh {
            name: "test".to_string(),
            primitives,
        }],
        materials,
        aabb_min: Vec3::ZERO,
        aabb_max: Vec3::ONE,
    }
}

#[test]
fn primitives_reference_valid_materials() {
    let materials = vec![
        Material::default(),
        Material {
            emissive_factor: Vec3::ONE,
            is_emissive: true,
            ..Material::default()
        },
    ];

    let model = model_with_materials(
        materials,
        vec![
            Primitive {
                first_index: 0,
                index_count: 3,
                material_index: 0,
            },
            Primitive {
                first_index: 3,
                index_count: 6,
                material_index: 1,
            },
        ],
    );

    for primitive in model.primitives() {
        assert!(primitive.material_index < model.materials.len());
    }
}

#[test]
fn emissive_materials_are_distinguishable() {
    let opaque = Material::default();
    let emissive = Material {
        emissive_factor: Vec3::new(1.0, 0.5, 0.0),
        is_emissive: true,
        ..Material::default()
    };

    let model = model_with_materials(
        vec![opaque, emissive],
        vec![
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
        ],
    );

    let emissive_count = model
        .primitives()
        .filter(|p| model.materials[p.material_index].is_emissive)
        .count();
    assert_eq!(emissive_count, 1);
}
