//! Shared test meshes for the mesh pipeline

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use crate::mesh::Vertex;

/// Unit cube with 8 shared corners (no per-face normals, no duplicates)
pub fn cube() -> (Vec<Vertex>, Vec<u32>) {
    let vertices = (0..8)
        .map(|i| {
            let p = Vec3::new(
                if i & 1 != 0 { 1.0 } else { -1.0 },
                if i & 2 != 0 { 1.0 } else { -1.0 },
                if i & 4 != 0 { 1.0 } else { -1.0 },
            );
            Vertex::new(p, p.normalize(), [(i & 1) as f32, ((i >> 1) & 1) as f32])
        })
        .collect();
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -z
        4, 5, 6, 5, 7, 6, // +z
        0, 1, 4, 1, 5, 4, // -y
        2, 6, 3, 3, 6, 7, // +y
        0, 4, 2, 2, 4, 6, // -x
        1, 3, 5, 3, 7, 5, // +x
    ];
    (vertices, indices)
}

/// `n` x `n` quads in the XZ plane
pub fn grid(n: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    for z in 0..=n {
        for x in 0..=n {
            vertices.push(Vertex::new(
                Vec3::new(x as f32, 0.0, z as f32),
                Vec3::Y,
                [x as f32 / n as f32, z as f32 / n as f32],
            ));
        }
    }
    let mut indices = Vec::new();
    let row = n + 1;
    for z in 0..n {
        for x in 0..n {
            let i = z * row + x;
            indices.extend_from_slice(&[i, i + row, i + 1, i + 1, i + row, i + row + 1]);
        }
    }
    (vertices, indices)
}

/// Seeded random triangles over a random vertex cloud, some vertices
/// duplicated bit-for-bit
pub fn random_soup(seed: u64, vertex_count: usize, triangle_count: usize) -> (Vec<Vertex>, Vec<u32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut vertices: Vec<Vertex> = (0..vertex_count)
        .map(|_| {
            let p = Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0));
            Vertex::new(p, p.normalize_or_zero(), [rng.gen(), rng.gen()])
        })
        .collect();
    for i in 0..vertex_count / 4 {
        let copy = vertices[i];
        vertices.push(copy);
    }
    let total = vertices.len() as u32;
    let indices = (0..triangle_count * 3).map(|_| rng.gen_range(0..total)).collect();
    (vertices, indices)
}

/// Smallest rotation of a triangle (winding preserved)
pub fn canonical<T: Ord + Copy>(t: [T; 3]) -> [T; 3] {
    let rotations = [t, [t[1], t[2], t[0]], [t[2], t[0], t[1]]];
    rotations.into_iter().min().unwrap_or(t)
}

/// Sorted canonical triangles of an index list
pub fn triangle_multiset(indices: &[u32]) -> Vec<[u32; 3]> {
    let mut triangles: Vec<[u32; 3]> = indices
        .chunks_exact(3)
        .map(|t| canonical([t[0], t[1], t[2]]))
        .collect();
    triangles.sort_unstable();
    triangles
}

/// Sorted canonical triangles as vertex bit patterns, comparable across
/// reindexing passes
pub fn vertex_triangle_multiset(vertices: &[Vertex], indices: &[u32]) -> Vec<[[u32; 8]; 3]> {
    let mut triangles: Vec<[[u32; 8]; 3]> = indices
        .chunks_exact(3)
        .map(|t| {
            canonical([
                vertices[t[0] as usize].bit_key(),
                vertices[t[1] as usize].bit_key(),
                vertices[t[2] as usize].bit_key(),
            ])
        })
        .collect();
    triangles.sort_unstable();
    triangles
}
