//! Main rendering pipeline.
//!
//! Orchestrates frame pacing, swapchain lifecycle, and draw submission on
//! top of the rhi layer.

pub mod depth_buffer;
pub mod frame;
pub mod geometry;
pub mod renderer;

pub use frame::{FrameClock, FrameResources};
pub use renderer::Renderer;

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Number of binary acquire semaphores.
///
/// One more than the in-flight slot count so a semaphore handed to a failed
/// acquire is never immediately reused.
pub const ACQUIRE_SEMAPHORE_COUNT: usize = MAX_FRAMES_IN_FLIGHT + 1;
