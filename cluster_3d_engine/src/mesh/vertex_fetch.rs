/// Vertex fetch optimization
///
/// Reorders vertices into first-use order of the index stream and rewrites
/// the indices, so consecutive triangles read neighbouring memory.

use crate::mesh::Vertex;
use crate::mesh::remap::UNUSED;

/// Reorder `vertices` for fetch locality, rewriting `indices` in place
///
/// Vertices no index refers to are dropped.
pub fn optimize_vertex_fetch(indices: &mut [u32], vertices: &[Vertex]) -> Vec<Vertex> {
    let mut remap = vec![UNUSED; vertices.len()];
    let mut out = Vec::with_capacity(vertices.len());

    for index in indices.iter_mut() {
        let slot = &mut remap[*index as usize];
        if *slot == UNUSED {
            *slot = out.len() as u32;
            out.push(vertices[*index as usize]);
        }
        *index = *slot;
    }

    out
}

#[cfg(test)]
#[path = "vertex_fetch_tests.rs"]
mod tests;
