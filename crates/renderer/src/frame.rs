//! Frame pacing and per-slot resources.
//!
//! Every render attempt gets a fresh frame ID from [`FrameClock`]. The ID
//! drives three derived indices:
//!
//! - the in-flight slot (`id % MAX_FRAMES_IN_FLIGHT`), selecting the command
//!   pool and render-complete semaphore to reuse,
//! - the acquire-semaphore index (`id % ACQUIRE_SEMAPHORE_COUNT`, one more
//!   semaphore than slots so an un-consumed acquire never collides),
//! - the timeline wait target (`id - MAX_FRAMES_IN_FLIGHT`), gating the CPU
//!   until the GPU retired the frame that last used this slot.
//!
//! The timeline semaphore starts at `MAX_FRAMES_IN_FLIGHT - 1`, so the first
//! `MAX_FRAMES_IN_FLIGHT` waits resolve immediately. Frame IDs are consumed
//! even when the frame is later abandoned; the abandoning path host-signals
//! the timeline so the slot's next wait cannot deadlock.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use lantern_rhi::device::Device;
use lantern_rhi::sync::Semaphore;
use lantern_rhi::RhiResult;

use crate::{ACQUIRE_SEMAPHORE_COUNT, MAX_FRAMES_IN_FLIGHT};

/// Monotonic frame counter with derived index arithmetic.
///
/// Pure state, no Vulkan handles. The current value doubles as the timeline
/// semaphore value of the most recently issued frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    timeline_value: u64,
}

impl FrameClock {
    /// Creates a clock matching a timeline semaphore pre-initialized to
    /// `MAX_FRAMES_IN_FLIGHT - 1`.
    pub fn new() -> Self {
        Self {
            timeline_value: (MAX_FRAMES_IN_FLIGHT - 1) as u64,
        }
    }

    /// Initial value for the paired timeline semaphore.
    pub fn initial_timeline_value() -> u64 {
        (MAX_FRAMES_IN_FLIGHT - 1) as u64
    }

    /// Consumes and returns the next frame ID.
    ///
    /// IDs advance by exactly one per call and are never reused, including
    /// for frames that are later abandoned.
    pub fn advance(&mut self) -> u64 {
        self.timeline_value += 1;
        self.timeline_value
    }

    /// ID of the most recently issued frame.
    pub fn current(&self) -> u64 {
        self.timeline_value
    }

    /// In-flight slot for a frame ID.
    pub fn slot_index(frame_id: u64) -> usize {
        (frame_id % MAX_FRAMES_IN_FLIGHT as u64) as usize
    }

    /// Acquire-semaphore index for a frame ID.
    pub fn acquire_index(frame_id: u64) -> usize {
        (frame_id % ACQUIRE_SEMAPHORE_COUNT as u64) as usize
    }

    /// Timeline value a frame must wait for before reusing its slot.
    ///
    /// For the first `MAX_FRAMES_IN_FLIGHT` frames this is at or below the
    /// semaphore's initial value, so those waits return immediately.
    pub fn wait_target(frame_id: u64) -> u64 {
        frame_id - MAX_FRAMES_IN_FLIGHT as u64
    }

    /// Timeline value that must be retired before host-signaling an
    /// abandoned frame's ID.
    ///
    /// A host signal must land above the current counter and below every
    /// pending GPU signal, so the abandoning path waits out all lower
    /// frame IDs first. Bounded: every lower ID was either submitted or
    /// already host-signaled. For the first frame the gate sits at the
    /// semaphore's initial value and the wait is a no-op.
    pub fn host_signal_gate(frame_id: u64) -> u64 {
        frame_id - 1
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Command recording and completion signaling for one in-flight slot.
///
/// The pool is reset in bulk each time the slot is reclaimed; the command
/// buffer is allocated once and reused.
pub struct FrameResources {
    device: Arc<Device>,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    render_complete: Semaphore,
}

impl FrameResources {
    /// Creates the command pool, command buffer, and render-complete
    /// semaphore for one slot.
    pub fn new(device: Arc<Device>, graphics_family: u32) -> RhiResult<Self> {
        let pool_info =
            vk::CommandPoolCreateInfo::default().queue_family_index(graphics_family);

        let command_pool = unsafe { device.handle().create_command_pool(&pool_info, None)? };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffers = unsafe { device.handle().allocate_command_buffers(&alloc_info)? };

        let render_complete = Semaphore::new(device.clone())?;

        debug!("Created frame resources for graphics family {}", graphics_family);

        Ok(Self {
            device,
            command_pool,
            command_buffer: command_buffers[0],
            render_complete,
        })
    }

    /// Resets the slot's command pool, recycling the command buffer.
    ///
    /// Must only be called after the timeline wait for this slot's previous
    /// frame has returned.
    pub fn reset_pool(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())?;
        }
        Ok(())
    }

    /// Returns the slot's command buffer.
    #[inline]
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Returns the slot's render-complete semaphore handle.
    #[inline]
    pub fn render_complete(&self) -> vk::Semaphore {
        self.render_complete.handle()
    }
}

impl Drop for FrameResources {
    fn drop(&mut self) {
        // Destroying the pool frees its command buffer
        unsafe {
            self.device
                .handle()
                .destroy_command_pool(self.command_pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_ids_are_monotonic_without_gaps() {
        let mut clock = FrameClock::new();
        let first = clock.advance();
        let second = clock.advance();
        let third = clock.advance();
        assert_eq!(second, first + 1);
        assert_eq!(third, second + 1);
    }

    #[test]
    fn test_steady_state_sequence() {
        // Two slots, timeline starts at 1: five attempts yield IDs 2..=6
        // alternating between the slots.
        let mut clock = FrameClock::new();
        assert_eq!(clock.current(), FrameClock::initial_timeline_value());

        let ids: Vec<u64> = (0..5).map(|_| clock.advance()).collect();
        assert_eq!(ids, vec![2, 3, 4, 5, 6]);

        let slots: Vec<usize> = ids.iter().map(|&id| FrameClock::slot_index(id)).collect();
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);

        // The first two waits target values at or below the initial
        // timeline value, so they never block.
        assert!(FrameClock::wait_target(ids[0]) <= FrameClock::initial_timeline_value());
        assert!(FrameClock::wait_target(ids[1]) <= FrameClock::initial_timeline_value());
        // From the third frame on, waits target real frame completions.
        assert_eq!(FrameClock::wait_target(ids[2]), ids[0]);
        assert_eq!(FrameClock::wait_target(ids[3]), ids[1]);
    }

    #[test]
    fn test_acquire_index_cycles_wider_than_slots() {
        let mut clock = FrameClock::new();
        let ids: Vec<u64> = (0..ACQUIRE_SEMAPHORE_COUNT + 1)
            .map(|_| clock.advance())
            .collect();

        // Consecutive frames never share an acquire semaphore, and the
        // cycle length exceeds the slot count.
        for pair in ids.windows(2) {
            assert_ne!(
                FrameClock::acquire_index(pair[0]),
                FrameClock::acquire_index(pair[1])
            );
        }
        assert_eq!(
            FrameClock::acquire_index(ids[0]),
            FrameClock::acquire_index(ids[ACQUIRE_SEMAPHORE_COUNT])
        );
    }

    #[test]
    fn test_abandoned_frame_still_consumes_id() {
        // An acquire failure abandons the frame but keeps its ID; the next
        // attempt gets a fresh ID and a different slot when MAX is 2.
        let mut clock = FrameClock::new();
        let abandoned = clock.advance();
        let retry = clock.advance();
        assert_eq!(retry, abandoned + 1);
        assert_ne!(
            FrameClock::slot_index(abandoned),
            FrameClock::slot_index(retry)
        );
        // Host-signaling the timeline to `abandoned` satisfies the wait
        // that will later target it.
        assert_eq!(
            FrameClock::wait_target(abandoned + MAX_FRAMES_IN_FLIGHT as u64),
            abandoned
        );
    }

    #[test]
    fn test_host_signal_gate_retires_all_lower_ids() {
        // With two frames in flight, the slot gate for frame N only proves
        // the timeline reached N-2; frame N-1 may still hold a pending GPU
        // signal. The host-signal gate is N-1, so waiting on it guarantees
        // no queued signal can land at or below the raised counter.
        let mut clock = FrameClock::new();
        let first = clock.advance();
        let second = clock.advance();
        let third = clock.advance();

        assert_eq!(FrameClock::host_signal_gate(third), second);
        assert_eq!(FrameClock::host_signal_gate(second), first);

        // The gate is strictly tighter than the slot gate whenever more
        // than one frame can be in flight.
        assert!(FrameClock::host_signal_gate(third) > FrameClock::wait_target(third));

        // Abandoning the very first frame waits on the semaphore's initial
        // value, which never blocks.
        assert!(FrameClock::host_signal_gate(first) <= FrameClock::initial_timeline_value());
    }
}
