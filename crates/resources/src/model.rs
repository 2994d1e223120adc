//! Model loading from glTF files.
//!
//! All primitives of all meshes are flattened into one global vertex array
//! and one global index array. [`Submesh`] records each primitive's range so
//! draws can index into the shared buffers.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{ResourceError, ResourceResult};
use crate::vertex::Vertex;

/// Range of one glTF primitive inside the flattened arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submesh {
    /// First vertex in the global vertex array.
    pub vertex_start: u32,
    /// Number of vertices.
    pub vertex_count: u32,
    /// First index in the global index array.
    pub index_start: u32,
    /// Number of indices.
    pub index_count: u32,
}

/// Geometry loaded from a glTF file, flattened for GPU upload.
#[derive(Debug, Default)]
pub struct Model {
    /// All vertices of all submeshes.
    pub vertices: Vec<Vertex>,
    /// All indices of all submeshes, local to each submesh's vertex range.
    pub indices: Vec<u32>,
    /// One entry per loaded primitive.
    pub submeshes: Vec<Submesh>,
}

impl Model {
    /// Loads a model from a .gltf or .glb file.
    ///
    /// Every mesh primitive contributes POSITION (required) and TEXCOORD_0
    /// (optional, zero-filled when absent). Primitives without positions are
    /// skipped with a warning. Index data narrower than u32 is widened;
    /// primitives without indices get a synthesized `0..vertex_count` range.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be parsed or no primitive
    /// yields any geometry.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        let (document, buffers, _images) =
            gltf::import(path).map_err(|e| ResourceError::GltfLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut model = Self::default();

        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

                let Some(position_iter) = reader.read_positions() else {
                    warn!(
                        "Skipping primitive without POSITION in mesh {:?}",
                        mesh.name().unwrap_or("<unnamed>")
                    );
                    continue;
                };
                let positions: Vec<[f32; 3]> = position_iter.collect();

                let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                    Some(tex_coords) => tex_coords.into_f32().collect(),
                    None => vec![[0.0, 0.0]; positions.len()],
                };

                let vertex_start = model.vertices.len() as u32;
                let vertex_count = positions.len() as u32;

                model.vertices.extend(
                    positions
                        .iter()
                        .zip(uvs.iter())
                        .map(|(&position, &uv)| Vertex { position, uv }),
                );

                let index_start = model.indices.len() as u32;
                match reader.read_indices() {
                    Some(indices) => model.indices.extend(indices.into_u32()),
                    None => model.indices.extend(0..vertex_count),
                }
                let index_count = model.indices.len() as u32 - index_start;

                model.submeshes.push(Submesh {
                    vertex_start,
                    vertex_count,
                    index_start,
                    index_count,
                });

                debug!(
                    "Loaded primitive: {} vertices, {} indices",
                    vertex_count, index_count
                );
            }
        }

        if model.submeshes.is_empty() {
            return Err(ResourceError::NoGeometry(path.to_path_buf()));
        }

        info!(
            "Loaded model {:?}: {} submeshes, {} vertices, {} indices",
            path,
            model.submeshes.len(),
            model.vertices.len(),
            model.indices.len()
        );

        Ok(model)
    }

    /// Total vertex count across all submeshes.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Total index count across all submeshes.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_submesh(model: &mut Model, vertices: u32, indices: u32) {
        let vertex_start = model.vertices.len() as u32;
        let index_start = model.indices.len() as u32;
        for i in 0..vertices {
            model
                .vertices
                .push(Vertex::new([i as f32, 0.0, 0.0], [0.0, 0.0]));
        }
        model.indices.extend((0..indices).map(|i| i % vertices));
        model.submeshes.push(Submesh {
            vertex_start,
            vertex_count: vertices,
            index_start,
            index_count: indices,
        });
    }

    #[test]
    fn test_submesh_ranges_cover_arrays() {
        let mut model = Model::default();
        push_submesh(&mut model, 4, 6);
        push_submesh(&mut model, 3, 3);

        let total_vertices: u32 = model.submeshes.iter().map(|s| s.vertex_count).sum();
        let total_indices: u32 = model.submeshes.iter().map(|s| s.index_count).sum();
        assert_eq!(total_vertices as usize, model.vertex_count());
        assert_eq!(total_indices as usize, model.index_count());
    }

    #[test]
    fn test_submesh_starts_are_contiguous() {
        let mut model = Model::default();
        push_submesh(&mut model, 4, 6);
        push_submesh(&mut model, 3, 3);

        assert_eq!(model.submeshes[0].vertex_start, 0);
        assert_eq!(model.submeshes[0].index_start, 0);
        assert_eq!(model.submeshes[1].vertex_start, 4);
        assert_eq!(model.submeshes[1].index_start, 6);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = Model::load(Path::new("does/not/exist.glb"));
        assert!(matches!(result, Err(ResourceError::GltfLoad { .. })));
    }
}
