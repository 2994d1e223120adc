//! Vertex layout shared with the shaders.

use bytemuck::{Pod, Zeroable};

/// One vertex as the vertex shader pulls it from the storage buffer.
///
/// Layout must match the buffer_reference block in the vertex shader, which
/// uses scalar layout. Position and UV pack to 20 bytes with no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Texture coordinate, zero when the source primitive has none.
    pub uv: [f32; 2],
}

impl Vertex {
    /// Creates a vertex from position and texture coordinate.
    pub fn new(position: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, uv }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
    }

    #[test]
    fn test_vertex_bytes() {
        let v = Vertex::new([1.0, 2.0, 3.0], [0.5, 0.25]);
        let bytes = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 20);
        let back: &Vertex = bytemuck::from_bytes(bytes);
        assert_eq!(*back, v);
    }
}
