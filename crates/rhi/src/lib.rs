//! Vulkan abstraction layer for the Lantern renderer.
//!
//! This crate wraps `ash` with RAII types for the pieces the renderer needs:
//! - Instance and device bring-up
//! - Swapchain management
//! - Buffers with gpu-allocator backed memory
//! - Runtime GLSL compilation and shader modules
//! - Binary and timeline semaphores
//! - Graphics pipeline construction (dynamic rendering, vertex pulling)
//! - Image layout transitions via synchronization2 barriers

mod error;

pub mod buffer;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod rendering;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
