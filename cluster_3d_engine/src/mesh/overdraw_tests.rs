//! Unit tests for overdraw.rs

use glam::Vec3;
use crate::mesh::{optimize_overdraw, optimize_vertex_cache, average_cache_miss_ratio};
use crate::mesh::test_meshes::{grid, random_soup, triangle_multiset};

fn positions(vertices: &[crate::mesh::Vertex]) -> Vec<Vec3> {
    vertices.iter().map(|v| v.position).collect()
}

/// Closed UV sphere, poles duplicated per segment
fn uv_sphere(rings: u32, segments: u32) -> (Vec<Vec3>, Vec<u32>) {
    let mut positions = Vec::new();
    for r in 0..=rings {
        let theta = std::f32::consts::PI * r as f32 / rings as f32;
        for s in 0..=segments {
            let phi = std::f32::consts::TAU * s as f32 / segments as f32;
            positions.push(Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()));
        }
    }
    let stride = segments + 1;
    let mut indices = Vec::new();
    for r in 0..rings {
        for s in 0..segments {
            let a = r * stride + s;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    (positions, indices)
}

fn acmr(indices: &[u32], vertex_count: usize) -> f32 {
    average_cache_miss_ratio(indices, vertex_count, 16)
}

#[test]
fn test_single_triangle_unchanged() {
    let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
    assert_eq!(optimize_overdraw(&[0, 1, 2], &positions, 1.05), vec![0, 1, 2]);
}

#[test]
fn test_outward_cluster_drawn_first() {
    // Triangle 0 sits behind the centre facing in, triangle 1 in front facing out
    let positions = [
        Vec3::new(0.0, 0.0, -1.0), Vec3::new(1.0, 0.0, -1.0), Vec3::new(0.0, 1.0, -1.0),
        Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 1.0), Vec3::new(0.0, 1.0, 1.0),
    ];
    let indices = [0, 1, 2, 3, 4, 5];
    assert_eq!(optimize_overdraw(&indices, &positions, 1.05), vec![3, 4, 5, 0, 1, 2]);
}

#[test]
fn test_grid_triangles_preserved() {
    let (vertices, indices) = grid(20);
    let cached = optimize_vertex_cache(&indices, vertices.len());
    let ordered = optimize_overdraw(&cached, &positions(&vertices), 1.05);
    assert_eq!(triangle_multiset(&ordered), triangle_multiset(&indices));
}

#[test]
fn test_soup_triangles_preserved() {
    let (vertices, indices) = random_soup(9, 250, 600);
    let cached = optimize_vertex_cache(&indices, vertices.len());
    let ordered = optimize_overdraw(&cached, &positions(&vertices), 1.05);
    assert_eq!(ordered.len(), indices.len());
    assert_eq!(triangle_multiset(&ordered), triangle_multiset(&indices));
}

#[test]
fn test_large_threshold_still_permutation() {
    let (vertices, indices) = grid(8);
    let ordered = optimize_overdraw(&indices, &positions(&vertices), 3.0);
    assert_eq!(triangle_multiset(&ordered), triangle_multiset(&indices));
}

// ============================================================================
// CACHE EFFICIENCY BOUND
// ============================================================================

#[test]
fn test_sphere_stays_within_threshold() {
    let (positions, indices) = uv_sphere(24, 48);
    let cached = optimize_vertex_cache(&indices, positions.len());
    let ordered = optimize_overdraw(&cached, &positions, 1.05);

    assert_eq!(triangle_multiset(&ordered), triangle_multiset(&indices));
    assert!(acmr(&ordered, positions.len()) <= 1.05 * acmr(&cached, positions.len()));
}

#[test]
fn test_soups_stay_within_threshold() {
    for seed in 1..=6 {
        let (vertices, indices) = random_soup(seed, 300, 800);
        let cached = optimize_vertex_cache(&indices, vertices.len());
        let ordered = optimize_overdraw(&cached, &positions(&vertices), 1.05);

        let before = acmr(&cached, vertices.len());
        let after = acmr(&ordered, vertices.len());
        assert!(after <= 1.05 * before, "seed {}: {} > 1.05 * {}", seed, after, before);
    }
}

#[test]
fn test_threshold_one_keeps_cache_ratio() {
    let (positions, indices) = uv_sphere(16, 32);
    let cached = optimize_vertex_cache(&indices, positions.len());
    let ordered = optimize_overdraw(&cached, &positions, 1.0);
    assert!(acmr(&ordered, positions.len()) <= acmr(&cached, positions.len()));
}
