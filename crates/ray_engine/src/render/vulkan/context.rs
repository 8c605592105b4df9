//! Device context
//!
//! Thin handle bundle over the Vulkan objects the upload stage consumes:
//! instance, device, queue and the ray-tracing extension loaders. The
//! caller owns instance and device creation (surface handling, layer
//! setup and device selection live with the application); this module
//! only derives what the scene pipeline needs from them.

use ash::extensions::khr;
use ash::{vk, Device, Instance};
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// Vulkan API error
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// No suitable memory type found
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Invalid operation for current state
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation is invalid
        reason: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Device handles and extension loaders for scene uploads and
/// acceleration-structure builds.
pub struct DeviceContext {
    /// Vulkan instance functions
    pub instance: Instance,
    /// Logical device functions
    pub device: Device,
    /// Physical device the logical device was created from
    pub physical_device: vk::PhysicalDevice,
    /// Queue used for transfer and build submissions
    pub queue: vk::Queue,
    /// Family index of `queue`
    pub queue_family_index: u32,
    /// Acceleration-structure extension loader
    pub acceleration: khr::AccelerationStructure,
    /// Required scratch-buffer offset alignment
    pub scratch_alignment: u64,
}

impl DeviceContext {
    /// Wrap existing instance and device handles.
    ///
    /// The device must have been created with the acceleration-structure,
    /// ray-tracing-pipeline and buffer-device-address features enabled.
    pub fn new(
        instance: Instance,
        device: Device,
        physical_device: vk::PhysicalDevice,
        queue: vk::Queue,
        queue_family_index: u32,
    ) -> Self {
        let acceleration = khr::AccelerationStructure::new(&instance, &device);

        let mut accel_props =
            vk::PhysicalDeviceAccelerationStructurePropertiesKHR::default();
        let mut props = vk::PhysicalDeviceProperties2::builder().push_next(&mut accel_props);
        unsafe {
            instance.get_physical_device_properties2(physical_device, &mut props);
        }

        Self {
            instance,
            device,
            physical_device,
            queue,
            queue_family_index,
            acceleration,
            scratch_alignment: accel_props.min_acceleration_structure_scratch_offset_alignment
                as u64,
        }
    }
}
