//! Unit tests for meshlet.rs

use glam::Vec3;
use crate::mesh::{build_meshlets, build_meshlets_bound, padded_triangle_bytes, MeshletSet, Vertex};
use crate::mesh::test_meshes::{cube, grid, random_soup, canonical, triangle_multiset};

fn positions(vertices: &[Vertex]) -> Vec<Vec3> {
    vertices.iter().map(|v| v.position).collect()
}

fn resolved_multiset(set: &MeshletSet) -> Vec<[u32; 3]> {
    let mut triangles: Vec<[u32; 3]> = set
        .meshlets
        .iter()
        .flat_map(|m| set.resolve(m))
        .map(canonical)
        .collect();
    triangles.sort_unstable();
    triangles
}

fn assert_well_formed(set: &MeshletSet, max_vertices: u32, max_triangles: u32) {
    let mut vertex_cursor = 0;
    let mut triangle_cursor = 0;
    for meshlet in &set.meshlets {
        assert!(meshlet.vertex_count >= 1 && meshlet.vertex_count <= max_vertices);
        assert!(meshlet.triangle_count >= 1 && meshlet.triangle_count <= max_triangles);
        assert_eq!(meshlet.vertex_offset, vertex_cursor);
        assert_eq!(meshlet.triangle_offset, triangle_cursor);
        assert_eq!(meshlet.triangle_offset % 4, 0);
        let bytes = &set.triangles[meshlet.triangle_offset as usize..]
            [..meshlet.triangle_count as usize * 3];
        assert!(bytes.iter().all(|&b| (b as u32) < meshlet.vertex_count));
        vertex_cursor += meshlet.vertex_count;
        triangle_cursor += padded_triangle_bytes(meshlet.triangle_count);
    }
    // Regions are trimmed to usage, no trailing capacity
    assert_eq!(set.vertices.len() as u32, vertex_cursor);
    assert_eq!(set.triangles.len() as u32, triangle_cursor);
}

// ============================================================================
// EDGE CASES
// ============================================================================

#[test]
fn test_zero_triangles_gives_empty_set() {
    let set = build_meshlets(&[], &[Vec3::ZERO], 64, 124, 0.25);
    assert!(set.meshlets.is_empty());
    assert!(set.vertices.is_empty());
    assert!(set.triangles.is_empty());
}

#[test]
fn test_single_triangle() {
    let set = build_meshlets(&[0, 1, 2], &[Vec3::ZERO, Vec3::X, Vec3::Y], 64, 124, 0.25);
    assert_eq!(set.meshlets.len(), 1);
    assert_eq!(set.meshlets[0].vertex_count, 3);
    assert_eq!(set.meshlets[0].triangle_count, 1);
    assert_eq!(set.triangles, vec![0, 1, 2, 0]);
}

#[test]
fn test_degenerate_triangle_kept() {
    let set = build_meshlets(&[0, 0, 1], &[Vec3::ZERO, Vec3::X], 64, 124, 0.25);
    assert_eq!(set.meshlets.len(), 1);
    assert_eq!(set.meshlets[0].vertex_count, 2);
    assert_eq!(set.resolve(&set.meshlets[0]), vec![[0, 0, 1]]);
}

// ============================================================================
// CUBE
// ============================================================================

#[test]
fn test_cube_is_one_meshlet() {
    let (vertices, indices) = cube();
    let set = build_meshlets(&indices, &positions(&vertices), 64, 124, 0.25);
    assert_eq!(set.meshlets.len(), 1);
    assert_eq!(set.meshlets[0].vertex_count, 8);
    assert_eq!(set.meshlets[0].triangle_count, 12);
    assert_eq!(set.vertices.len(), 8);
    assert_eq!(set.triangles.len(), 36);
    assert_eq!(resolved_multiset(&set), triangle_multiset(&indices));
}

// ============================================================================
// LIMITS AND COVERAGE
// ============================================================================

#[test]
fn test_grid_respects_limits() {
    let (vertices, indices) = grid(24);
    let set = build_meshlets(&indices, &positions(&vertices), 64, 124, 0.25);
    assert!(set.meshlets.len() > 1);
    assert_well_formed(&set, 64, 124);
    assert_eq!(resolved_multiset(&set), triangle_multiset(&indices));
    assert!(set.meshlets.len() <= build_meshlets_bound(indices.len(), 64, 124));
}

#[test]
fn test_small_limits() {
    let (vertices, indices) = grid(10);
    let set = build_meshlets(&indices, &positions(&vertices), 8, 4, 0.5);
    assert_well_formed(&set, 8, 4);
    assert_eq!(resolved_multiset(&set), triangle_multiset(&indices));
}

#[test]
fn test_soup_covers_every_triangle() {
    for seed in [1, 2, 3] {
        let (vertices, indices) = random_soup(seed, 400, 900);
        let set = build_meshlets(&indices, &positions(&vertices), 64, 124, 0.25);
        assert_well_formed(&set, 64, 124);
        assert_eq!(resolved_multiset(&set), triangle_multiset(&indices));
    }
}

#[test]
fn test_cone_weight_extremes_cover_every_triangle() {
    let (vertices, indices) = grid(16);
    for cone_weight in [0.0, 1.0] {
        let set = build_meshlets(&indices, &positions(&vertices), 64, 124, cone_weight);
        assert_well_formed(&set, 64, 124);
        assert_eq!(resolved_multiset(&set), triangle_multiset(&indices));
    }
}

#[test]
fn test_bound() {
    assert_eq!(build_meshlets_bound(0, 64, 124), 0);
    assert_eq!(build_meshlets_bound(3, 64, 124), 1);
    // 300 triangles / 124 per meshlet
    assert!(build_meshlets_bound(900, 255, 124) >= 3);
}
