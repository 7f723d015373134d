/// Overdraw optimization
///
/// Splits a cache-optimized index stream into clusters and sorts the
/// clusters so outward-facing ones are drawn first (Sander et al., "Fast
/// Triangle Reordering for Vertex Locality and Reduced Overdraw").
/// Clusters start where the cache simulation runs cold (hard boundaries)
/// and are subdivided wherever the running miss ratio stays within
/// `threshold` times the cluster's own ratio (soft boundaries).
///
/// The running-ratio test is only a heuristic, so the reordered stream is
/// measured: if its miss ratio exceeds `threshold` times the input's, the
/// sort is redone on hard boundaries alone, and failing that the input
/// order is kept.

use glam::Vec3;
use crate::mesh::average_cache_miss_ratio;

const CACHE_SIZE: u32 = 16;

struct CacheSimulation {
    timestamps: Vec<u32>,
    timestamp: u32,
}

impl CacheSimulation {
    fn new(vertex_count: usize) -> Self {
        Self { timestamps: vec![0; vertex_count], timestamp: CACHE_SIZE + 1 }
    }

    fn flush(&mut self) {
        self.timestamp += CACHE_SIZE + 1;
    }

    fn misses(&mut self, corners: &[u32]) -> u32 {
        let mut misses = 0;
        for &vertex in corners {
            let stamp = &mut self.timestamps[vertex as usize];
            if self.timestamp - *stamp > CACHE_SIZE {
                *stamp = self.timestamp;
                self.timestamp += 1;
                misses += 1;
            }
        }
        misses
    }
}

fn triangle(indices: &[u32], t: usize) -> &[u32] {
    &indices[t * 3..t * 3 + 3]
}

fn hard_boundaries(indices: &[u32], cache: &mut CacheSimulation) -> Vec<usize> {
    let triangle_count = indices.len() / 3;
    let mut boundaries = Vec::new();
    cache.flush();
    for t in 0..triangle_count {
        let misses = cache.misses(triangle(indices, t));
        if t == 0 || misses == 3 {
            boundaries.push(t);
        }
    }
    boundaries
}

fn soft_boundaries(
    indices: &[u32],
    hard: &[usize],
    threshold: f32,
    cache: &mut CacheSimulation,
) -> Vec<usize> {
    let triangle_count = indices.len() / 3;
    let mut boundaries = Vec::with_capacity(hard.len());

    for (i, &start) in hard.iter().enumerate() {
        let end = hard.get(i + 1).copied().unwrap_or(triangle_count);

        cache.flush();
        let cluster_misses: u32 = (start..end).map(|t| cache.misses(triangle(indices, t))).sum();
        let cluster_threshold = threshold * cluster_misses as f32 / (end - start) as f32;

        boundaries.push(start);
        cache.flush();
        let mut soft_start = start;
        let mut running_misses = 0u32;
        for t in start..end {
            running_misses += cache.misses(triangle(indices, t));
            let ratio = running_misses as f32 / (t + 1 - soft_start) as f32;
            if t + 1 < end && ratio <= cluster_threshold {
                boundaries.push(t + 1);
                soft_start = t + 1;
                running_misses = 0;
                cache.flush();
            }
        }
    }

    boundaries
}

/// Area-weighted centroid and average normal of a run of triangles
fn cluster_orientation(indices: &[u32], positions: &[Vec3], triangles: std::ops::Range<usize>) -> (Vec3, Vec3) {
    let mut centroid = Vec3::ZERO;
    let mut normal = Vec3::ZERO;
    let mut area_sum = 0.0;
    let mut plain_sum = Vec3::ZERO;

    for t in triangles.clone() {
        let corners = triangle(indices, t);
        let p0 = positions[corners[0] as usize];
        let p1 = positions[corners[1] as usize];
        let p2 = positions[corners[2] as usize];
        let cross = (p1 - p0).cross(p2 - p0);
        let area = cross.length();
        let center = (p0 + p1 + p2) / 3.0;

        centroid += center * area;
        plain_sum += center;
        normal += cross;
        area_sum += area;
    }

    let centroid = if area_sum > 0.0 {
        centroid / area_sum
    } else {
        plain_sum / triangles.len().max(1) as f32
    };
    (centroid, normal.normalize_or_zero())
}

/// Reorder triangles to reduce overdraw
///
/// # Arguments
///
/// * `indices` - Cache-optimized triangle list
/// * `positions` - Vertex positions, indexed by vertex id
/// * `threshold` - Allowed cache miss ratio growth (1.05 = 5%)
pub fn optimize_overdraw(indices: &[u32], positions: &[Vec3], threshold: f32) -> Vec<u32> {
    let triangle_count = indices.len() / 3;
    if triangle_count < 2 {
        return indices.to_vec();
    }

    let mut cache = CacheSimulation::new(positions.len());
    let hard = hard_boundaries(indices, &mut cache);
    let soft = soft_boundaries(indices, &hard, threshold, &mut cache);

    let budget = threshold * average_cache_miss_ratio(indices, positions.len(), CACHE_SIZE as usize);
    let within_budget =
        |order: &[u32]| average_cache_miss_ratio(order, positions.len(), CACHE_SIZE as usize) <= budget;

    let ordered = sort_clusters(indices, positions, &soft);
    if within_budget(&ordered) {
        return ordered;
    }
    let ordered = sort_clusters(indices, positions, &hard);
    if within_budget(&ordered) {
        return ordered;
    }
    indices.to_vec()
}

/// Concatenate clusters, most outward-facing first
fn sort_clusters(indices: &[u32], positions: &[Vec3], clusters: &[usize]) -> Vec<u32> {
    let triangle_count = indices.len() / 3;
    let mesh_centroid = indices
        .iter()
        .fold(Vec3::ZERO, |sum, &i| sum + positions[i as usize])
        / indices.len() as f32;

    let keys: Vec<f32> = clusters
        .iter()
        .enumerate()
        .map(|(c, &start)| {
            let end = clusters.get(c + 1).copied().unwrap_or(triangle_count);
            let (centroid, normal) = cluster_orientation(indices, positions, start..end);
            (centroid - mesh_centroid).dot(normal)
        })
        .collect();

    // Outward-facing clusters first; stable among equal keys
    let mut order: Vec<usize> = (0..clusters.len()).collect();
    order.sort_by(|&a, &b| keys[b].total_cmp(&keys[a]));

    let mut output = Vec::with_capacity(indices.len());
    for c in order {
        let start = clusters[c];
        let end = clusters.get(c + 1).copied().unwrap_or(triangle_count);
        output.extend_from_slice(&indices[start * 3..end * 3]);
    }
    output
}

#[cfg(test)]
#[path = "overdraw_tests.rs"]
mod tests;
