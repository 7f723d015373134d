/// Meshlet builder - turns shared vertex/index pools into clustered geometry
///
/// Every submesh runs through the same five stages (dedup, vertex cache,
/// overdraw, vertex fetch, clustering) and the results are appended to one
/// set of output arrays ready for upload:
///
/// ```text
/// vertices          optimized vertex pool (all submeshes)
/// indices           optimized index pool, global vertex indices
/// meshlets          offsets into meshlet_vertices / meshlet_triangles
/// meshlet_vertices  global vertex indices, per meshlet
/// meshlet_triangles packed u8 local corners, 4-byte aligned per meshlet
/// mesh_views        one meshlet range per submesh, with its material
/// ```

use std::time::Instant;
use glam::Vec3;
use crate::config::MeshletConfig;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_info};
use crate::mesh::{
    Vertex, Meshlet, MeshView, SubmeshRange,
    deduplicate, optimize_vertex_cache, optimize_overdraw, optimize_vertex_fetch,
    build_meshlets,
};

const SOURCE: &str = "cluster3d::MeshletBuilder";

/// Per-build counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeshletStats {
    pub submeshes: u32,
    pub skipped_submeshes: u32,
    pub input_vertices: u64,
    pub output_vertices: u64,
    pub triangles: u64,
    pub meshlets: u64,
    /// Wall time of every stage, summed over submeshes
    pub remap_ms: f64,
    pub vertex_cache_ms: f64,
    pub overdraw_ms: f64,
    pub vertex_fetch_ms: f64,
    pub meshlet_ms: f64,
}

/// Output of a build, ready for upload
#[derive(Debug, Clone, Default)]
pub struct MeshletGeometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub meshlets: Vec<Meshlet>,
    pub meshlet_vertices: Vec<u32>,
    pub meshlet_triangles: Vec<u8>,
    pub mesh_views: Vec<MeshView>,
    pub stats: MeshletStats,
}

impl MeshletGeometry {
    pub fn meshlet_count(&self) -> u32 {
        self.meshlets.len() as u32
    }

    /// Triangles of one meshlet, resolved to global vertex indices
    pub fn meshlet_triangles_resolved(&self, meshlet: &Meshlet) -> Vec<[u32; 3]> {
        let vertices = &self.meshlet_vertices[meshlet.vertex_offset as usize..];
        let bytes = &self.meshlet_triangles[meshlet.triangle_offset as usize..];
        (0..meshlet.triangle_count as usize)
            .map(|t| [
                vertices[bytes[t * 3] as usize],
                vertices[bytes[t * 3 + 1] as usize],
                vertices[bytes[t * 3 + 2] as usize],
            ])
            .collect()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Clusters imported geometry into meshlets
pub struct MeshletBuilder {
    config: MeshletConfig,
}

impl MeshletBuilder {
    /// # Errors
    ///
    /// `InvalidConfig` when the limits or tuning constants are out of range.
    pub fn new(config: MeshletConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MeshletConfig {
        &self.config
    }

    /// Build meshlet geometry for every submesh range of the pools
    ///
    /// # Errors
    ///
    /// `InvalidResource` when a range is out of bounds or not a whole number
    /// of triangles, or when an index points past the vertex pool.
    pub fn build(
        &self,
        vertices: &[Vertex],
        indices: &[u32],
        submeshes: &[SubmeshRange],
    ) -> Result<MeshletGeometry> {
        let start = Instant::now();
        let mut geometry = MeshletGeometry::default();
        geometry.stats.input_vertices = vertices.len() as u64;

        for (submesh_index, submesh) in submeshes.iter().enumerate() {
            if submesh.start > submesh.end || submesh.end as usize > indices.len() {
                return Err(Error::InvalidResource(format!(
                    "submesh {} range {}..{} outside index pool of {}",
                    submesh_index, submesh.start, submesh.end, indices.len()
                )));
            }
            if submesh.index_count() % 3 != 0 {
                return Err(Error::InvalidResource(format!(
                    "submesh {} has {} indices, not a multiple of 3",
                    submesh_index, submesh.index_count()
                )));
            }
            if submesh.index_count() == 0 {
                engine_debug!(SOURCE, "submesh {} has no triangles, skipped", submesh_index);
                geometry.stats.skipped_submeshes += 1;
                continue;
            }

            let range = submesh.start as usize..submesh.end as usize;
            self.build_submesh(vertices, &indices[range], submesh.material, &mut geometry)?;
            geometry.stats.submeshes += 1;
        }

        geometry.stats.output_vertices = geometry.vertices.len() as u64;
        geometry.stats.triangles = geometry.indices.len() as u64 / 3;
        geometry.stats.meshlets = geometry.meshlets.len() as u64;

        let stats = &geometry.stats;
        engine_debug!(SOURCE,
            "stages: remap {:.2} ms, vertex cache {:.2} ms, overdraw {:.2} ms, vertex fetch {:.2} ms, meshlets {:.2} ms",
            stats.remap_ms, stats.vertex_cache_ms, stats.overdraw_ms, stats.vertex_fetch_ms, stats.meshlet_ms);
        engine_info!(SOURCE,
            "{} submeshes, {} -> {} vertices, {} triangles, {} meshlets in {:.2} ms",
            stats.submeshes, stats.input_vertices, stats.output_vertices,
            stats.triangles, stats.meshlets, elapsed_ms(start));

        Ok(geometry)
    }

    fn build_submesh(
        &self,
        vertices: &[Vertex],
        indices: &[u32],
        material: u32,
        geometry: &mut MeshletGeometry,
    ) -> Result<()> {
        // Imported submeshes own a contiguous vertex run; work on that window
        let (low, high) = indices
            .iter()
            .fold((u32::MAX, 0), |(low, high), &i| (low.min(i), high.max(i)));
        if high as usize >= vertices.len() {
            return Err(Error::InvalidResource(format!(
                "index {} out of range for {} vertices", high, vertices.len()
            )));
        }
        let window = &vertices[low as usize..=high as usize];
        let local: Vec<u32> = indices.iter().map(|&i| i - low).collect();

        let stage = Instant::now();
        let (unique, remapped) = deduplicate(&local, window)?;
        geometry.stats.remap_ms += elapsed_ms(stage);

        let stage = Instant::now();
        let cached = optimize_vertex_cache(&remapped, unique.len());
        geometry.stats.vertex_cache_ms += elapsed_ms(stage);

        let stage = Instant::now();
        let positions: Vec<Vec3> = unique.iter().map(|v| v.position).collect();
        let mut ordered = optimize_overdraw(&cached, &positions, self.config.overdraw_threshold);
        geometry.stats.overdraw_ms += elapsed_ms(stage);

        let stage = Instant::now();
        let fetched = optimize_vertex_fetch(&mut ordered, &unique);
        geometry.stats.vertex_fetch_ms += elapsed_ms(stage);

        let stage = Instant::now();
        let positions: Vec<Vec3> = fetched.iter().map(|v| v.position).collect();
        let set = build_meshlets(
            &ordered,
            &positions,
            self.config.max_vertices,
            self.config.max_triangles,
            self.config.cone_weight,
        );
        geometry.stats.meshlet_ms += elapsed_ms(stage);

        // Rebase onto the shared output arrays
        let vertex_base = geometry.vertices.len() as u32;
        let meshlet_vertex_base = geometry.meshlet_vertices.len() as u32;
        let triangle_base = geometry.meshlet_triangles.len() as u32;
        let first_meshlet = geometry.meshlets.len() as u32;

        geometry.vertices.extend_from_slice(&fetched);
        geometry.indices.extend(ordered.iter().map(|&i| i + vertex_base));
        geometry.meshlet_vertices.extend(set.vertices.iter().map(|&v| v + vertex_base));
        geometry.meshlet_triangles.extend_from_slice(&set.triangles);
        geometry.meshlets.extend(set.meshlets.iter().map(|m| Meshlet {
            vertex_offset: m.vertex_offset + meshlet_vertex_base,
            triangle_offset: m.triangle_offset + triangle_base,
            ..*m
        }));
        geometry.mesh_views.push(MeshView {
            start: first_meshlet,
            end: geometry.meshlets.len() as u32,
            material,
            padding: 0,
        });

        engine_debug!(SOURCE, "submesh: {} triangles, {} -> {} vertices, {} meshlets",
            indices.len() / 3, window.len(), fetched.len(), set.meshlets.len());
        Ok(())
    }
}

#[cfg(test)]
#[path = "meshlet_builder_tests.rs"]
mod tests;
