//! Device-side half of the pipeline

pub mod vulkan;

pub use vulkan::{DeviceContext, SceneGpuResources, VulkanError, VulkanResult};
