//! Vulkan upload backend
//!
//! Low-level device plumbing for the scene pipeline: buffers, layered
//! texture arrays, acceleration-structure builds and the descriptor set
//! that exposes the compiled tables to the ray-tracing shaders.

pub mod acceleration;
pub mod bindings;
pub mod buffer;
pub mod commands;
pub mod context;
pub mod texture;
pub mod upload;

pub use acceleration::{BlasGeometryInput, SceneAccelerationStructures};
pub use bindings::{BindingCounts, BindingTable, SceneBufferInfos};
pub use buffer::Buffer;
pub use commands::submit_one_shot;
pub use context::{DeviceContext, VulkanError, VulkanResult};
pub use texture::TextureArray;
pub use upload::SceneGpuResources;
