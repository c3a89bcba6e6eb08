//! Asset loading for the Mirage renderer.
//!
//! CPU-side model import: glTF files become a [`Model`] with one shared
//! vertex/index pair, meshes of primitives addressing ranges of it, and
//! materials carrying emissive classification for the additive pass.

mod error;
pub mod material;
pub mod model;

pub use error::{ResourceError, ResourceResult};
pub use material::Material;
pub use model::{Mesh, Model, Primitive, Vertex};
