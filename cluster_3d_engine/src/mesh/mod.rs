/// Mesh processing pipeline
///
/// Stages run in order: remap (dedup), vertex cache, overdraw, vertex fetch,
/// meshlet clustering. `MeshletBuilder` drives them per submesh.

pub mod types;
pub mod remap;
pub mod vertex_cache;
pub mod overdraw;
pub mod vertex_fetch;
pub mod meshlet;
pub mod meshlet_builder;

#[cfg(test)]
pub(crate) mod test_meshes;

pub use types::*;
pub use remap::*;
pub use vertex_cache::{optimize_vertex_cache, average_cache_miss_ratio};
pub use overdraw::*;
pub use vertex_fetch::*;
pub use meshlet::*;
pub use meshlet_builder::*;
