/// Vertex cache optimization
///
/// Greedy triangle reordering driven by per-vertex scores (Forsyth): a
/// vertex scores higher the more recently it entered a simulated LRU cache
/// and the fewer unemitted triangles still reference it. Each step emits the
/// best-scoring triangle touching the cache; on a dead end the next
/// unemitted triangle in input order restarts the walk. Triangles are
/// emitted with their original winding.

const CACHE_SIZE: usize = 16;
const CACHE_DECAY_POWER: f32 = 1.5;
const LAST_TRIANGLE_SCORE: f32 = 0.75;
const VALENCE_BOOST_SCALE: f32 = 2.0;
const VALENCE_BOOST_POWER: f32 = 0.5;

fn vertex_score(cache_position: i32, live_triangles: u32) -> f32 {
    if live_triangles == 0 {
        return -1.0;
    }

    let mut score = 0.0;
    if cache_position >= 0 {
        let position = cache_position as usize;
        score = if position < 3 {
            LAST_TRIANGLE_SCORE
        } else {
            let scale = 1.0 / (CACHE_SIZE - 3) as f32;
            (1.0 - (position - 3) as f32 * scale).powf(CACHE_DECAY_POWER)
        };
    }

    score + VALENCE_BOOST_SCALE * (live_triangles as f32).powf(-VALENCE_BOOST_POWER)
}

/// Vertex -> triangles adjacency in CSR form
///
/// The live triangles of vertex `v` are `triangles[offsets[v]..offsets[v] + counts[v]]`;
/// emitted triangles are swapped past the live range.
pub(crate) struct TriangleAdjacency {
    pub counts: Vec<u32>,
    pub offsets: Vec<u32>,
    pub triangles: Vec<u32>,
}

impl TriangleAdjacency {
    pub fn new(indices: &[u32], vertex_count: usize) -> Self {
        let mut counts = vec![0u32; vertex_count];
        for &index in indices {
            counts[index as usize] += 1;
        }

        let mut offsets = vec![0u32; vertex_count];
        let mut total = 0u32;
        for (offset, &count) in offsets.iter_mut().zip(&counts) {
            *offset = total;
            total += count;
        }

        let mut fill = offsets.clone();
        let mut triangles = vec![0u32; indices.len()];
        for (triangle, corners) in indices.chunks_exact(3).enumerate() {
            for &vertex in corners {
                let slot = &mut fill[vertex as usize];
                triangles[*slot as usize] = triangle as u32;
                *slot += 1;
            }
        }

        Self { counts, offsets, triangles }
    }

    /// Live triangles of a vertex
    pub fn live(&self, vertex: u32) -> &[u32] {
        let start = self.offsets[vertex as usize] as usize;
        &self.triangles[start..start + self.counts[vertex as usize] as usize]
    }

    /// Drop one reference of `triangle` from `vertex`
    pub fn remove(&mut self, vertex: u32, triangle: u32) {
        let start = self.offsets[vertex as usize] as usize;
        let count = self.counts[vertex as usize] as usize;
        let list = &mut self.triangles[start..start + count];
        if let Some(position) = list.iter().position(|&t| t == triangle) {
            list.swap(position, count - 1);
            self.counts[vertex as usize] -= 1;
        }
    }
}

/// Reorder triangles for post-transform cache reuse
///
/// # Arguments
///
/// * `indices` - Triangle list (length multiple of 3)
/// * `vertex_count` - Number of vertices referenced (all indices < vertex_count)
pub fn optimize_vertex_cache(indices: &[u32], vertex_count: usize) -> Vec<u32> {
    let triangle_count = indices.len() / 3;
    if triangle_count == 0 {
        return Vec::new();
    }

    let mut adjacency = TriangleAdjacency::new(indices, vertex_count);
    let mut cache_position = vec![-1i32; vertex_count];
    let mut vertex_scores: Vec<f32> = adjacency
        .counts
        .iter()
        .map(|&live| vertex_score(-1, live))
        .collect();
    let mut triangle_scores: Vec<f32> = indices
        .chunks_exact(3)
        .map(|t| t.iter().map(|&v| vertex_scores[v as usize]).sum())
        .collect();
    let mut emitted = vec![false; triangle_count];

    let mut cache: Vec<u32> = Vec::with_capacity(CACHE_SIZE + 3);
    let mut next_cache: Vec<u32> = Vec::with_capacity(CACHE_SIZE + 3);
    let mut output = Vec::with_capacity(indices.len());
    let mut input_cursor = 0usize;

    let mut current = triangle_scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(t, _)| t)
        .unwrap_or(0);

    loop {
        let corners = [indices[current * 3], indices[current * 3 + 1], indices[current * 3 + 2]];
        output.extend_from_slice(&corners);
        emitted[current] = true;
        if output.len() == indices.len() {
            break;
        }

        for &vertex in &corners {
            adjacency.remove(vertex, current as u32);
        }

        // New cache: emitted corners first, then the previous contents
        next_cache.clear();
        for &vertex in corners.iter().chain(cache.iter()) {
            if !next_cache.contains(&vertex) {
                next_cache.push(vertex);
            }
        }
        for (position, &vertex) in next_cache.iter().enumerate() {
            cache_position[vertex as usize] = if position < CACHE_SIZE { position as i32 } else { -1 };
        }

        // Rescore every vertex whose cache slot or valence changed
        for &vertex in &next_cache {
            let score = vertex_score(cache_position[vertex as usize], adjacency.counts[vertex as usize]);
            let delta = score - vertex_scores[vertex as usize];
            vertex_scores[vertex as usize] = score;
            for &triangle in adjacency.live(vertex) {
                triangle_scores[triangle as usize] += delta;
            }
        }

        next_cache.truncate(CACHE_SIZE);
        std::mem::swap(&mut cache, &mut next_cache);

        let mut best: Option<(usize, f32)> = None;
        for &vertex in &cache {
            for &triangle in adjacency.live(vertex) {
                let score = triangle_scores[triangle as usize];
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((triangle as usize, score));
                }
            }
        }

        current = match best {
            Some((triangle, _)) => triangle,
            None => {
                while emitted[input_cursor] {
                    input_cursor += 1;
                }
                input_cursor
            }
        };
    }

    output
}

/// Average post-transform cache misses per triangle with a FIFO cache
///
/// Used to compare orderings; 3.0 is the worst case, 0.5 is typical for a
/// well-optimized regular grid.
pub fn average_cache_miss_ratio(indices: &[u32], vertex_count: usize, cache_size: usize) -> f32 {
    let triangle_count = indices.len() / 3;
    if triangle_count == 0 {
        return 0.0;
    }
    let mut timestamps = vec![0usize; vertex_count];
    let mut timestamp = cache_size + 1;
    let mut misses = 0usize;
    for &index in indices {
        if timestamp - timestamps[index as usize] > cache_size {
            timestamps[index as usize] = timestamp;
            timestamp += 1;
            misses += 1;
        }
    }
    misses as f32 / triangle_count as f32
}

#[cfg(test)]
#[path = "vertex_cache_tests.rs"]
mod tests;
