/// Meshlet clustering
///
/// Greedy clustering of a triangle list into meshlets of bounded vertex and
/// triangle count. A meshlet grows by the adjacent triangle that adds the
/// fewest new vertices; ties are broken by a score mixing distance to the
/// meshlet centre with agreement to its average normal, weighted by
/// `cone_weight` (0 favours compact clusters, 1 favours tight normal cones).

use glam::Vec3;
use crate::mesh::{Meshlet, padded_triangle_bytes};
use crate::mesh::vertex_cache::TriangleAdjacency;

const NOT_IN_MESHLET: u8 = 0xff;

/// Meshlets plus the two shared arrays they reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshletSet {
    pub meshlets: Vec<Meshlet>,
    /// Meshlet-local vertex slot -> vertex index
    pub vertices: Vec<u32>,
    /// Packed meshlet-local triangle corners, each meshlet padded to 4 bytes
    pub triangles: Vec<u8>,
}

impl MeshletSet {
    /// Triangles of one meshlet resolved to vertex indices
    pub fn resolve(&self, meshlet: &Meshlet) -> Vec<[u32; 3]> {
        let vertices = &self.vertices[meshlet.vertex_offset as usize..];
        let bytes = &self.triangles[meshlet.triangle_offset as usize..];
        (0..meshlet.triangle_count as usize)
            .map(|t| {
                [
                    vertices[bytes[t * 3] as usize],
                    vertices[bytes[t * 3 + 1] as usize],
                    vertices[bytes[t * 3 + 2] as usize],
                ]
            })
            .collect()
    }
}

/// Upper bound on the meshlet count for an index buffer
pub fn build_meshlets_bound(index_count: usize, max_vertices: usize, max_triangles: usize) -> usize {
    let max_vertices = max_vertices.max(3);
    let max_triangles = max_triangles.max(1);
    // Each triangle after the first adds at least one vertex
    let by_vertices = (index_count + max_vertices - 3) / (max_vertices - 2);
    let by_triangles = (index_count / 3 + max_triangles - 1) / max_triangles;
    by_vertices.max(by_triangles)
}

struct TriangleInfo {
    centroid: Vec3,
    normal: Vec3,
}

#[derive(Default)]
struct OpenMeshlet {
    vertices: Vec<u32>,
    triangles: Vec<[u8; 3]>,
    centroid_sum: Vec3,
    normal_sum: Vec3,
}

impl OpenMeshlet {
    fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn center(&self) -> Vec3 {
        self.centroid_sum / self.triangles.len().max(1) as f32
    }

    fn axis(&self) -> Vec3 {
        self.normal_sum.normalize_or_zero()
    }
}

struct Clusterer<'a> {
    indices: &'a [u32],
    info: Vec<TriangleInfo>,
    adjacency: TriangleAdjacency,
    emitted: Vec<bool>,
    local: Vec<u8>,
    max_vertices: usize,
    max_triangles: usize,
    cone_weight: f32,
    expected_radius: f32,
    cursor: usize,
    output: MeshletSet,
}

impl<'a> Clusterer<'a> {
    fn corners(&self, triangle: usize) -> [u32; 3] {
        [self.indices[triangle * 3], self.indices[triangle * 3 + 1], self.indices[triangle * 3 + 2]]
    }

    /// Distinct vertices of `triangle` not yet in the open meshlet
    fn new_vertices(&self, triangle: usize) -> usize {
        let [a, b, c] = self.corners(triangle);
        let mut count = 0;
        if self.local[a as usize] == NOT_IN_MESHLET {
            count += 1;
        }
        if b != a && self.local[b as usize] == NOT_IN_MESHLET {
            count += 1;
        }
        if c != a && c != b && self.local[c as usize] == NOT_IN_MESHLET {
            count += 1;
        }
        count
    }

    fn score(&self, triangle: usize, center: Vec3, axis: Vec3) -> f32 {
        let info = &self.info[triangle];
        let distance = (info.centroid - center).length();
        let spread = info.normal.dot(axis);
        let cone = (1.0 - spread * self.cone_weight).max(1e-3);
        (1.0 + distance / self.expected_radius * (1.0 - self.cone_weight)) * cone
    }

    /// Best adjacent triangle that fits the open meshlet
    fn best_neighbor(&self, meshlet: &OpenMeshlet) -> Option<usize> {
        if meshlet.is_empty() || meshlet.triangles.len() >= self.max_triangles {
            return None;
        }

        let center = meshlet.center();
        let axis = meshlet.axis();
        let mut best: Option<(usize, usize, f32)> = None;
        for &vertex in &meshlet.vertices {
            for &triangle in self.adjacency.live(vertex) {
                let triangle = triangle as usize;
                let extra = self.new_vertices(triangle);
                if meshlet.vertices.len() + extra > self.max_vertices {
                    continue;
                }
                let score = self.score(triangle, center, axis);
                let better = match best {
                    None => true,
                    Some((_, best_extra, best_score)) => {
                        extra < best_extra || (extra == best_extra && score < best_score)
                    }
                };
                if better {
                    best = Some((triangle, extra, score));
                }
            }
        }
        best.map(|(triangle, _, _)| triangle)
    }

    /// Start of the next meshlet: near the one just closed when possible
    fn seed(&mut self, previous: &OpenMeshlet) -> Option<usize> {
        let center = previous.center();
        let axis = previous.axis();
        let mut best: Option<(usize, f32)> = None;
        for &vertex in &previous.vertices {
            for &triangle in self.adjacency.live(vertex) {
                let score = self.score(triangle as usize, center, axis);
                if best.map_or(true, |(_, s)| score < s) {
                    best = Some((triangle as usize, score));
                }
            }
        }
        if let Some((triangle, _)) = best {
            return Some(triangle);
        }

        while self.cursor < self.emitted.len() && self.emitted[self.cursor] {
            self.cursor += 1;
        }
        (self.cursor < self.emitted.len()).then_some(self.cursor)
    }

    fn push(&mut self, meshlet: &mut OpenMeshlet, triangle: usize) {
        let corners = self.corners(triangle);
        let mut local = [0u8; 3];
        for (slot, &vertex) in local.iter_mut().zip(&corners) {
            if self.local[vertex as usize] == NOT_IN_MESHLET {
                self.local[vertex as usize] = meshlet.vertices.len() as u8;
                meshlet.vertices.push(vertex);
            }
            *slot = self.local[vertex as usize];
        }
        meshlet.triangles.push(local);
        meshlet.centroid_sum += self.info[triangle].centroid;
        meshlet.normal_sum += self.info[triangle].normal;

        self.emitted[triangle] = true;
        for &vertex in &corners {
            self.adjacency.remove(vertex, triangle as u32);
        }
    }

    fn flush(&mut self, meshlet: &mut OpenMeshlet) {
        if meshlet.is_empty() {
            return;
        }

        let triangle_offset = self.output.triangles.len();
        let descriptor = Meshlet {
            vertex_offset: self.output.vertices.len() as u32,
            triangle_offset: triangle_offset as u32,
            vertex_count: meshlet.vertices.len() as u32,
            triangle_count: meshlet.triangles.len() as u32,
        };

        self.output.vertices.extend_from_slice(&meshlet.vertices);
        for triangle in &meshlet.triangles {
            self.output.triangles.extend_from_slice(triangle);
        }
        let padded = triangle_offset + padded_triangle_bytes(descriptor.triangle_count) as usize;
        self.output.triangles.resize(padded, 0);
        self.output.meshlets.push(descriptor);

        for &vertex in &meshlet.vertices {
            self.local[vertex as usize] = NOT_IN_MESHLET;
        }
    }
}

/// Cluster a triangle list into meshlets
///
/// # Arguments
///
/// * `indices` - Triangle list; every index must be < `positions.len()`
/// * `positions` - Vertex positions
/// * `max_vertices` - Vertex limit per meshlet (clamped to 3..=255)
/// * `max_triangles` - Triangle limit per meshlet (clamped to 1..=512)
/// * `cone_weight` - 0..1 balance between compactness and normal coherence
///
/// An empty index list produces an empty set.
pub fn build_meshlets(
    indices: &[u32],
    positions: &[Vec3],
    max_vertices: usize,
    max_triangles: usize,
    cone_weight: f32,
) -> MeshletSet {
    let triangle_count = indices.len() / 3;
    if triangle_count == 0 {
        return MeshletSet::default();
    }

    let max_vertices = max_vertices.clamp(3, 255);
    let max_triangles = max_triangles.clamp(1, 512);
    let cone_weight = cone_weight.clamp(0.0, 1.0);

    let mut mesh_area = 0.0;
    let info: Vec<TriangleInfo> = indices
        .chunks_exact(3)
        .map(|t| {
            let p0 = positions[t[0] as usize];
            let p1 = positions[t[1] as usize];
            let p2 = positions[t[2] as usize];
            let cross = (p1 - p0).cross(p2 - p0);
            mesh_area += cross.length() * 0.5;
            TriangleInfo {
                centroid: (p0 + p1 + p2) / 3.0,
                normal: cross.normalize_or_zero(),
            }
        })
        .collect();

    // Radius of a disc covering a full meshlet of average-sized triangles
    let expected_radius = (mesh_area / triangle_count as f32 * max_triangles as f32).sqrt() * 0.5;
    let expected_radius = if expected_radius > 0.0 { expected_radius } else { 1.0 };

    let reserve = build_meshlets_bound(indices.len(), max_vertices, max_triangles);
    let mut clusterer = Clusterer {
        indices,
        info,
        adjacency: TriangleAdjacency::new(indices, positions.len()),
        emitted: vec![false; triangle_count],
        local: vec![NOT_IN_MESHLET; positions.len()],
        max_vertices,
        max_triangles,
        cone_weight,
        expected_radius,
        cursor: 0,
        output: MeshletSet {
            meshlets: Vec::with_capacity(reserve),
            vertices: Vec::with_capacity(indices.len()),
            triangles: Vec::with_capacity(indices.len() + reserve * 3),
        },
    };

    let mut meshlet = OpenMeshlet::default();
    for _ in 0..triangle_count {
        let next = match clusterer.best_neighbor(&meshlet) {
            Some(triangle) => Some(triangle),
            None => {
                let seed = clusterer.seed(&meshlet);
                clusterer.flush(&mut meshlet);
                meshlet = OpenMeshlet::default();
                seed
            }
        };
        let Some(triangle) = next else { break };

        clusterer.push(&mut meshlet, triangle);
    }
    clusterer.flush(&mut meshlet);

    clusterer.output
}

#[cfg(test)]
#[path = "meshlet_tests.rs"]
mod tests;
