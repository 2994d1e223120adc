//! Physical device (GPU) selection.
//!
//! Enumerates GPUs, filters out devices missing required queue families or
//! features, and ranks the survivors with a pluggable selection policy.
//!
//! # Required capabilities
//!
//! A device qualifies only when it offers:
//! - a graphics queue family and a present-capable queue family
//! - Vulkan 1.3
//! - `timeline_semaphore`, `buffer_device_address`, `scalar_block_layout`
//!   (1.2) and `dynamic_rendering`, `synchronization2` (1.3)

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Queue family indices used by the renderer.
///
/// Graphics and present are the only families this renderer submits to.
/// They are usually the same family; a split pair is accepted.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that can present to the surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks that both required families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the deduplicated family indices, for device creation.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }
}

/// Device features the renderer cannot run without.
///
/// Queried through the 1.2/1.3 feature chains and re-enabled verbatim at
/// logical device creation.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequiredFeatures {
    pub timeline_semaphore: bool,
    pub buffer_device_address: bool,
    pub scalar_block_layout: bool,
    pub dynamic_rendering: bool,
    pub synchronization2: bool,
}

impl RequiredFeatures {
    /// Queries the feature chain of a physical device.
    pub fn query(instance: &ash::Instance, device: vk::PhysicalDevice) -> Self {
        let mut features_1_2 = vk::PhysicalDeviceVulkan12Features::default();
        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut features_1_2)
            .push_next(&mut features_1_3);

        unsafe { instance.get_physical_device_features2(device, &mut features2) };

        Self {
            timeline_semaphore: features_1_2.timeline_semaphore == vk::TRUE,
            buffer_device_address: features_1_2.buffer_device_address == vk::TRUE,
            scalar_block_layout: features_1_2.scalar_block_layout == vk::TRUE,
            dynamic_rendering: features_1_3.dynamic_rendering == vk::TRUE,
            synchronization2: features_1_3.synchronization2 == vk::TRUE,
        }
    }

    /// Returns true when every required feature is supported.
    pub fn all_supported(&self) -> bool {
        self.missing().is_empty()
    }

    /// Names of the required features this device lacks.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.timeline_semaphore {
            missing.push("timelineSemaphore");
        }
        if !self.buffer_device_address {
            missing.push("bufferDeviceAddress");
        }
        if !self.scalar_block_layout {
            missing.push("scalarBlockLayout");
        }
        if !self.dynamic_rendering {
            missing.push("dynamicRendering");
        }
        if !self.synchronization2 {
            missing.push("synchronization2");
        }
        missing
    }
}

/// Information about a qualified physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for graphics and present.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Total device-local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Scoring function used to rank qualified devices.
///
/// The highest score wins; equal scores keep enumeration order. Filtering
/// (queue families, API version, features) happens before scoring and is
/// not the policy's concern.
pub type SelectionPolicy = fn(&PhysicalDeviceInfo) -> u32;

/// Default selection policy: discrete > integrated > virtual > CPU, with
/// VRAM as a tiebreaker.
pub fn prefer_discrete(info: &PhysicalDeviceInfo) -> u32 {
    let base = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };

    let vram_mb = (info.device_local_memory() / (1024 * 1024)) as u32;
    base + vram_mb.min(8_000)
}

/// Selects a physical device for rendering.
///
/// Every enumerated device is checked against the renderer's hard
/// requirements; qualified devices are ranked by `policy` and the best one
/// returned.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] when no device qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    policy: SelectionPolicy,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let mut best: Option<(PhysicalDeviceInfo, u32)> = None;

    for device in devices {
        let Some(info) = check_device(instance, device, surface, surface_loader) else {
            continue;
        };

        let score = policy(&info);
        debug!(
            "GPU '{}' ({}) scored {}",
            info.device_name(),
            info.device_type_name(),
            score
        );

        // Strict comparison keeps enumeration order on ties
        if best.as_ref().is_none_or(|(_, s)| score > *s) {
            best = Some((info, score));
        }
    }

    let Some((selected, score)) = best else {
        warn!("No GPU satisfies the renderer's requirements");
        return Err(RhiError::NoSuitableGpu);
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) Vulkan {}.{}.{}, score {}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        score
    );

    Ok(selected)
}

/// Returns `Some` when the device satisfies all hard requirements.
fn check_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let device_name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("Unknown")
    };

    if vk::api_version_major(properties.api_version) == 1
        && vk::api_version_minor(properties.api_version) < 3
    {
        debug!(
            "GPU '{}' skipped: Vulkan 1.3 not supported ({}.{})",
            device_name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version)
        );
        return None;
    }

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing queue families (graphics={}, present={})",
            device_name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return None;
    }

    let features = RequiredFeatures::query(instance, device);
    if !features.all_supported() {
        debug!(
            "GPU '{}' skipped: missing features {:?}",
            device_name,
            features.missing()
        );
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
    })
}

/// Finds graphics and present queue families, preferring a combined family.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;

        if family.queue_count == 0 {
            continue;
        }

        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let can_present = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        };

        // A combined family ends the search immediately
        if has_graphics && can_present {
            indices.graphics_family = Some(i);
            indices.present_family = Some(i);
            break;
        }

        if has_graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }
        if can_present && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_family_indices_default_incomplete() {
        let indices = QueueFamilyIndices::default();
        assert!(indices.graphics_family.is_none());
        assert!(indices.present_family.is_none());
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_queue_family_indices_complete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(indices.is_complete());

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert!(split.is_complete());
    }

    #[test]
    fn test_queue_family_indices_partial_incomplete() {
        let graphics_only = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!graphics_only.is_complete());

        let present_only = QueueFamilyIndices {
            graphics_family: None,
            present_family: Some(0),
        };
        assert!(!present_only.is_complete());
    }

    #[test]
    fn test_unique_families_deduplicates_combined() {
        let combined = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(combined.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
        };
        assert_eq!(split.unique_families(), vec![0, 1]);
    }

    #[test]
    fn test_required_features_missing_names() {
        let none = RequiredFeatures::default();
        assert!(!none.all_supported());
        assert_eq!(none.missing().len(), 5);

        let all = RequiredFeatures {
            timeline_semaphore: true,
            buffer_device_address: true,
            scalar_block_layout: true,
            dynamic_rendering: true,
            synchronization2: true,
        };
        assert!(all.all_supported());
        assert!(all.missing().is_empty());

        let partial = RequiredFeatures {
            timeline_semaphore: true,
            dynamic_rendering: true,
            ..Default::default()
        };
        let missing = partial.missing();
        assert!(missing.contains(&"bufferDeviceAddress"));
        assert!(missing.contains(&"scalarBlockLayout"));
        assert!(missing.contains(&"synchronization2"));
        assert!(!missing.contains(&"timelineSemaphore"));
    }

    #[test]
    fn test_prefer_discrete_orders_device_types() {
        let mut discrete_props = vk::PhysicalDeviceProperties::default();
        discrete_props.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;
        let discrete = PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties: discrete_props,
            memory_properties: vk::PhysicalDeviceMemoryProperties::default(),
            queue_families: QueueFamilyIndices::default(),
        };

        let mut integrated_props = vk::PhysicalDeviceProperties::default();
        integrated_props.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;
        let integrated = PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties: integrated_props,
            memory_properties: vk::PhysicalDeviceMemoryProperties::default(),
            queue_families: QueueFamilyIndices::default(),
        };

        assert!(prefer_discrete(&discrete) > prefer_discrete(&integrated));
    }

    #[test]
    fn test_custom_policy_signature() {
        // A policy is a plain function, so callers can swap the default
        fn first_come(_: &PhysicalDeviceInfo) -> u32 {
            1
        }
        let policy: SelectionPolicy = first_come;
        let info = PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties: vk::PhysicalDeviceProperties::default(),
            memory_properties: vk::PhysicalDeviceMemoryProperties::default(),
            queue_families: QueueFamilyIndices::default(),
        };
        assert_eq!(policy(&info), 1);
    }
}
