/// Vertex remap / deduplication
///
/// Vertices are equal when all 32 bytes are equal. The remap assigns new
/// ids in order of first reference by the index stream, so unreferenced
/// vertices are dropped and remapping already-unique data is the identity.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::mesh::Vertex;

/// Marks a vertex no index refers to
pub const UNUSED: u32 = u32::MAX;

/// Build a remap table from `vertices` to a deduplicated set
///
/// # Returns
///
/// `(remap, unique_count)` where `remap[i]` is the new id of vertex `i`
/// (or `UNUSED`).
///
/// # Errors
///
/// `InvalidResource` when an index is out of range.
pub fn generate_vertex_remap(indices: &[u32], vertices: &[Vertex]) -> Result<(Vec<u32>, usize)> {
    let mut remap = vec![UNUSED; vertices.len()];
    let mut lookup: FxHashMap<[u32; 8], u32> = FxHashMap::default();
    lookup.reserve(vertices.len().min(indices.len()));
    let mut next = 0u32;

    for &index in indices {
        let vertex = vertices.get(index as usize).ok_or_else(|| {
            Error::InvalidResource(format!(
                "index {} out of range for {} vertices", index, vertices.len()
            ))
        })?;
        if remap[index as usize] != UNUSED {
            continue;
        }
        let id = *lookup.entry(vertex.bit_key()).or_insert_with(|| {
            let id = next;
            next += 1;
            id
        });
        remap[index as usize] = id;
    }

    Ok((remap, next as usize))
}

/// Rewrite indices through a remap table
pub fn remap_index_buffer(indices: &[u32], remap: &[u32]) -> Vec<u32> {
    indices.iter().map(|&i| remap[i as usize]).collect()
}

/// Gather the deduplicated vertex array
pub fn remap_vertex_buffer(vertices: &[Vertex], remap: &[u32], unique_count: usize) -> Vec<Vertex> {
    let mut out = vec![Vertex::default(); unique_count];
    for (vertex, &target) in vertices.iter().zip(remap) {
        if target != UNUSED {
            out[target as usize] = *vertex;
        }
    }
    out
}

/// Deduplicate in one call
pub fn deduplicate(indices: &[u32], vertices: &[Vertex]) -> Result<(Vec<Vertex>, Vec<u32>)> {
    let (remap, unique) = generate_vertex_remap(indices, vertices)?;
    Ok((
        remap_vertex_buffer(vertices, &remap, unique),
        remap_index_buffer(indices, &remap),
    ))
}

#[cfg(test)]
#[path = "remap_tests.rs"]
mod tests;
