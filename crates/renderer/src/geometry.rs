//! GPU geometry storage for vertex pulling.
//!
//! One storage buffer holds every vertex of the loaded model and one index
//! buffer holds every index. The vertex buffer's device address is handed to
//! the vertex shader through push constants; the index buffer binds normally.

use std::sync::Arc;

use tracing::info;

use lantern_resources::{Model, Submesh};
use lantern_rhi::buffer::{Buffer, BufferUsage};
use lantern_rhi::device::Device;
use lantern_rhi::{RhiResult, vk};

/// Immutable GPU-resident geometry.
pub struct GeometryStore {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    submeshes: Vec<Submesh>,
}

impl GeometryStore {
    /// Uploads a model's flattened arrays into GPU buffers.
    ///
    /// Contents are written once and never mutated afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error when buffer creation or the upload fails. A model
    /// with empty arrays fails here since zero-sized buffers are rejected.
    pub fn upload(device: Arc<Device>, model: &Model) -> RhiResult<Self> {
        let vertex_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::VertexPulling,
            bytemuck::cast_slice(&model.vertices),
        )?;

        let index_buffer = Buffer::new_with_data(
            device,
            BufferUsage::Index,
            bytemuck::cast_slice(&model.indices),
        )?;

        info!(
            "Uploaded geometry: {} vertices, {} indices, {} submeshes",
            model.vertex_count(),
            model.index_count(),
            model.submeshes.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            submeshes: model.submeshes.clone(),
        })
    }

    /// Device address of the vertex buffer for the shader's
    /// buffer_reference.
    pub fn vertex_address(&self) -> vk::DeviceAddress {
        self.vertex_buffer.device_address()
    }

    /// Returns the index buffer handle for `cmd_bind_index_buffer`.
    #[inline]
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Per-primitive draw ranges.
    #[inline]
    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }
}
