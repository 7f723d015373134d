//! Unit tests for vertex_cache.rs

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use crate::mesh::{optimize_vertex_cache, average_cache_miss_ratio};
use crate::mesh::test_meshes::{grid, cube, random_soup, triangle_multiset};

fn shuffled_triangles(indices: &[u32], seed: u64) -> Vec<u32> {
    let mut triangles: Vec<[u32; 3]> = indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
    triangles.shuffle(&mut StdRng::seed_from_u64(seed));
    triangles.concat()
}

// ============================================================================
// TRIANGLE SET
// ============================================================================

#[test]
fn test_empty_input() {
    assert!(optimize_vertex_cache(&[], 0).is_empty());
}

#[test]
fn test_single_triangle_unchanged() {
    assert_eq!(optimize_vertex_cache(&[2, 0, 1], 3), vec![2, 0, 1]);
}

#[test]
fn test_cube_triangles_preserved() {
    let (vertices, indices) = cube();
    let optimized = optimize_vertex_cache(&indices, vertices.len());
    assert_eq!(triangle_multiset(&optimized), triangle_multiset(&indices));
}

#[test]
fn test_soup_triangles_preserved_with_winding() {
    let (vertices, indices) = random_soup(21, 300, 700);
    let optimized = optimize_vertex_cache(&indices, vertices.len());
    assert_eq!(optimized.len(), indices.len());
    assert_eq!(triangle_multiset(&optimized), triangle_multiset(&indices));
}

// ============================================================================
// CACHE EFFICIENCY
// ============================================================================

#[test]
fn test_shuffled_grid_gets_better_locality() {
    let (vertices, indices) = grid(32);
    let shuffled = shuffled_triangles(&indices, 5);
    let before = average_cache_miss_ratio(&shuffled, vertices.len(), 16);
    let optimized = optimize_vertex_cache(&shuffled, vertices.len());
    let after = average_cache_miss_ratio(&optimized, vertices.len(), 16);
    assert!(after < before * 0.6, "before {} after {}", before, after);
    assert!(after < 1.0, "after {}", after);
}

#[test]
fn test_miss_ratio_bounds() {
    // Disjoint triangles always miss every corner
    assert_eq!(average_cache_miss_ratio(&[0, 1, 2, 3, 4, 5], 6, 16), 3.0);
    // Repeating a triangle hits
    assert_eq!(average_cache_miss_ratio(&[0, 1, 2, 0, 1, 2], 3, 16), 1.5);
    assert_eq!(average_cache_miss_ratio(&[], 0, 16), 0.0);
}
