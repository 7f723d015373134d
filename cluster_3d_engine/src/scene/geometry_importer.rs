/// Geometry importer - flattens parsed submeshes into shared pools
///
/// Positions are transformed by the load transform, normals by its inverse
/// transpose. Indices are widened to u32 and offset by the vertex pool size
/// at import time, so every submesh addresses only its own vertices.

use glam::{Mat3, Mat4, Vec3};
use crate::error::{Error, Result};
use crate::mesh::{Vertex, SubmeshRange};
use crate::scene::material::MaterialIdTable;

/// Index accessor of a parsed primitive
#[derive(Debug, Clone, PartialEq)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(indices) => indices.len(),
            IndexData::U32(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widened index at position `i`
    pub fn get(&self, i: usize) -> u32 {
        match self {
            IndexData::U16(indices) => indices[i] as u32,
            IndexData::U32(indices) => indices[i],
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            IndexData::U16(indices) => Box::new(indices.iter().map(|&i| i as u32)),
            IndexData::U32(indices) => Box::new(indices.iter().copied()),
        }
    }
}

/// One parsed triangle primitive
#[derive(Debug, Clone)]
pub struct SubmeshSource {
    pub positions: Vec<[f32; 3]>,
    /// Defaults to +Y when absent
    pub normals: Option<Vec<[f32; 3]>>,
    /// Defaults to (0, 0) when absent
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub indices: IndexData,
    /// Material index inside the source asset
    pub material: Option<usize>,
}

/// Shared vertex and index pools plus their submesh ranges
#[derive(Debug, Clone, Default)]
pub struct GeometryImporter {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    submeshes: Vec<SubmeshRange>,
}

impl GeometryImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one submesh
    ///
    /// # Errors
    ///
    /// `AssetError` when attribute lengths disagree, an index is out of
    /// range, or the index count is not a whole number of triangles. The
    /// pools are left untouched on error.
    pub fn import(
        &mut self,
        source: &SubmeshSource,
        transform: &Mat4,
        materials: &MaterialIdTable,
    ) -> Result<SubmeshRange> {
        let vertex_count = source.positions.len();
        if let Some(normals) = &source.normals {
            if normals.len() != vertex_count {
                return Err(Error::AssetError(format!(
                    "{} normals for {} positions", normals.len(), vertex_count
                )));
            }
        }
        if let Some(tex_coords) = &source.tex_coords {
            if tex_coords.len() != vertex_count {
                return Err(Error::AssetError(format!(
                    "{} texture coordinates for {} positions", tex_coords.len(), vertex_count
                )));
            }
        }
        if source.indices.len() % 3 != 0 {
            return Err(Error::AssetError(format!(
                "{} indices is not a whole number of triangles", source.indices.len()
            )));
        }
        if let Some(bad) = source.indices.iter().find(|&i| i as usize >= vertex_count) {
            return Err(Error::AssetError(format!(
                "index {} out of range for {} vertices", bad, vertex_count
            )));
        }

        let normal_transform = Mat3::from_mat4(transform.inverse().transpose());
        let base = self.vertices.len() as u32;

        self.vertices.reserve(vertex_count);
        for (i, position) in source.positions.iter().enumerate() {
            let position = transform.transform_point3(Vec3::from_array(*position));
            let normal = source
                .normals
                .as_ref()
                .map(|normals| (normal_transform * Vec3::from_array(normals[i])).normalize_or_zero())
                .unwrap_or(Vec3::Y);
            let uv = source.tex_coords.as_ref().map(|t| t[i]).unwrap_or([0.0, 0.0]);
            self.vertices.push(Vertex::new(position, normal, uv));
        }

        let start = self.indices.len() as u32;
        self.indices.extend(source.indices.iter().map(|i| i + base));
        let range = SubmeshRange {
            start,
            end: self.indices.len() as u32,
            material: materials.resolve(source.material),
        };
        self.submeshes.push(range);
        Ok(range)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn submeshes(&self) -> &[SubmeshRange] {
        &self.submeshes
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[cfg(test)]
#[path = "geometry_importer_tests.rs"]
mod tests;
