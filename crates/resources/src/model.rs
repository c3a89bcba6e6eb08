//! Model loading from glTF files.
//!
//! A [`Model`] keeps one shared vertex vector and one shared index vector;
//! meshes are lists of [`Primitive`]s addressing index ranges of the shared
//! data. This matches how the GPU side binds: vertex/index buffers once,
//! then one indexed draw per primitive.

use std::path::Path;

use glam::{Vec3, Vec4};
use tracing::{debug, info};

use crate::error::{ResourceError, ResourceResult};
use crate::material::Material;

/// CPU-side vertex produced by the loader.
///
/// Kept independent of the GPU crate; the renderer converts into its wire
/// vertex format at upload.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub tex_coord: [f32; 2],
}

/// One drawable range of the shared index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    /// First index into the shared index buffer.
    pub first_index: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Index into [`Model::materials`].
    pub material_index: usize,
}

/// A named group of primitives.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Mesh name from the source file.
    pub name: String,
    /// Primitives belonging to this mesh.
    pub primitives: Vec<Primitive>,
}

/// Complete loaded model.
#[derive(Debug, Default)]
pub struct Model {
    /// Shared vertex data for every primitive.
    pub vertices: Vec<Vertex>,
    /// Shared index data; primitives address ranges of it.
    pub indices: Vec<u32>,
    /// Meshes in this model.
    pub meshes: Vec<Mesh>,
    /// Materials referenced by primitives.
    pub materials: Vec<Material>,
    /// Axis-aligned bounding box minimum.
    pub aabb_min: Vec3,
    /// Axis-aligned bounding box maximum.
    pub aabb_max: Vec3,
}

impl Model {
    /// Loads a model from a `.gltf` or `.glb` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, contains no meshes,
    /// or a primitive lacks position data.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        info!("Loading model: {}", path.display());

        let (document, buffers, _images) =
            gltf::import(path).map_err(|e| ResourceError::GltfLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let materials = load_materials(&document);
        // Primitives without a material reference this trailing default.
        let default_material_index = materials.len() - 1;

        let mut model = Model {
            materials,
            aabb_min: Vec3::splat(f32::MAX),
            aabb_max: Vec3::splat(f32::MIN),
            ..Default::default()
        };

        for gltf_mesh in document.meshes() {
            let mut mesh = Mesh {
                name: gltf_mesh.name().unwrap_or("unnamed").to_string(),
                primitives: Vec::new(),
            };

            for gltf_primitive in gltf_mesh.primitives() {
                let primitive = load_primitive(
                    &gltf_primitive,
                    &buffers,
                    default_material_index,
                    &mut model,
                )?;
                mesh.primitives.push(primitive);
            }

            model.meshes.push(mesh);
        }

        if model.meshes.is_empty() {
            return Err(ResourceError::NoMeshes(path.to_path_buf()));
        }

        info!(
            "Model loaded: {} meshes, {} vertices, {} indices, {} materials",
            model.meshes.len(),
            model.vertices.len(),
            model.indices.len(),
            model.materials.len()
        );

        Ok(model)
    }

    /// Center of the bounding box.
    pub fn center(&self) -> Vec3 {
        (self.aabb_min + self.aabb_max) * 0.5
    }

    /// Size of the bounding box.
    pub fn size(&self) -> Vec3 {
        self.aabb_max - self.aabb_min
    }

    /// All primitives across all meshes, in draw order.
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.meshes.iter().flat_map(|mesh| mesh.primitives.iter())
    }
}

/// Loads materials plus a trailing default for unassigned primitives.
fn load_materials(document: &gltf::Document) -> Vec<Material> {
    let mut materials: Vec<Material> = document
        .materials()
        .map(|m| {
            let pbr = m.pbr_metallic_roughness();
            let emissive_factor = Vec3::from_array(m.emissive_factor());
            let has_emissive_texture = m.emissive_texture().is_some();

            Material {
                name: m.name().map(str::to_string),
                base_color_factor: Vec4::from_array(pbr.base_color_factor()),
                emissive_factor,
                is_emissive: Material::classify_emissive(emissive_factor, has_emissive_texture),
            }
        })
        .collect();

    materials.push(Material::default());
    materials
}

fn load_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    default_material_index: usize,
    model: &mut Model,
) -> ResourceResult<Primitive> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or(ResourceError::NoPositionData)?
        .collect();

    let normals: Vec<[f32; 3]> = reader
        .read_normals()
        .map(|iter| iter.collect())
        .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);

    let tex_coords: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|iter| iter.into_f32().collect())
        .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

    let vertex_offset = model.vertices.len() as u32;
    let first_index = model.indices.len() as u32;

    for (i, &position) in positions.iter().enumerate() {
        let p = Vec3::from_array(position);
        model.aabb_min = model.aabb_min.min(p);
        model.aabb_max = model.aabb_max.max(p);

        model.vertices.push(Vertex {
            position,
            normal: normals[i],
            tex_coord: tex_coords[i],
        });
    }

    // Indices are rebased into the shared vertex vector.
    match reader.read_indices() {
        Some(indices) => {
            model
                .indices
                .extend(indices.into_u32().map(|i| i + vertex_offset));
        }
        None => {
            model
                .indices
                .extend((0..positions.len() as u32).map(|i| i + vertex_offset));
        }
    }

    let index_count = model.indices.len() as u32 - first_index;
    let material_index = primitive
        .material()
        .index()
        .unwrap_or(default_material_index);

    debug!(
        "Primitive: first_index={}, index_count={}, material={}",
        first_index, index_count, material_index
    );

    Ok(Primitive {
        first_index,
        index_count,
        material_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_model() -> Model {
        Model {
            vertices: vec![Vertex::default(); 6],
            indices: vec![0, 1, 2, 3, 4, 5],
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
                ],
            }],
            materials: vec![Material::default(), Material::default()],
            aabb_min: Vec3::new(-1.0, -2.0, -3.0),
            aabb_max: Vec3::new(1.0, 2.0, 3.0),
        }
    }

    #[test]
    fn test_center_and_size() {
        let model = test_model();
        assert_eq!(model.center(), Vec3::ZERO);
        assert_eq!(model.size(), Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_primitives_iterates_in_order() {
        let model = test_model();
        let firsts: Vec<u32> = model.primitives().map(|p| p.first_index).collect();
        assert_eq!(firsts, vec![0, 3]);
    }

    #[test]
    fn test_primitive_ranges_cover_indices() {
        let model = test_model();
        let total: u32 = model.primitives().map(|p| p.index_count).sum();
        assert_eq!(total as usize, model.indices.len());
    }
}
