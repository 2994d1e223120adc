//! Synchronization primitives.
//!
//! Binary semaphores order GPU work against presentation, the timeline
//! semaphore paces the CPU against in-flight frames. No fences are used;
//! all host waits go through the timeline.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Binary semaphore for GPU-GPU synchronization.
///
/// Used to chain image acquisition to rendering and rendering to
/// presentation within a single frame.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Timeline semaphore for CPU-GPU frame pacing.
///
/// The counter only ever increases. Host waits use at-least semantics, so
/// waiting on a value that has already been passed returns immediately.
pub struct TimelineSemaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl TimelineSemaphore {
    /// Creates a timeline semaphore with the given initial counter value.
    pub fn new(device: Arc<Device>, initial_value: u64) -> RhiResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);

        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!(
            "Created timeline semaphore with initial value {}",
            initial_value
        );

        Ok(Self { device, semaphore })
    }

    /// Blocks the calling thread until the counter reaches `value`.
    ///
    /// Returns immediately when the counter is already at or past `value`.
    pub fn wait(&self, value: u64) -> RhiResult<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        unsafe {
            self.device.handle().wait_semaphores(&wait_info, u64::MAX)?;
        }

        Ok(())
    }

    /// Reads the current counter value.
    pub fn value(&self) -> RhiResult<u64> {
        let value = unsafe {
            self.device
                .handle()
                .get_semaphore_counter_value(self.semaphore)?
        };
        Ok(value)
    }

    /// Advances the counter to `value` from the host.
    ///
    /// Used when a frame is abandoned before submission so that later
    /// waits on its value do not block forever. `value` must be greater
    /// than the current counter and smaller than the value of every
    /// pending signal operation; callers wait out all lower values first
    /// so no queued GPU signal can land at or below the raised counter.
    pub fn signal(&self, value: u64) -> RhiResult<()> {
        let signal_info = vk::SemaphoreSignalInfo::default()
            .semaphore(self.semaphore)
            .value(value);

        unsafe {
            self.device.handle().signal_semaphore(&signal_info)?;
        }

        Ok(())
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for TimelineSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}
