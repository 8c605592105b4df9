//! # Ray Engine
//!
//! A Vulkan ray-tracing scene compiler: declarative scene descriptions in,
//! flattened GPU tables and two-level acceleration structures out.
//!
//! ## Features
//!
//! - **Scene registries**: arena-style containers for geometry, materials,
//!   textures, environment maps and lights
//! - **Host-side compilation**: attribute flattening, material packing and
//!   table layout with no device dependency
//! - **Two-level acceleration structures**: one bottom-level structure per
//!   geometry, a single top-level structure over all instances
//! - **Descriptor wiring**: one descriptor set exposing the whole compiled
//!   scene to ray-tracing shaders
//!
//! ## Quick Start
//!
//! ```rust
//! use ray_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scene = Scene::new();
//!     let geometry = scene.add_geometry(Mesh {
//!         vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
//!         normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
//!         tangents: vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
//!         uvs: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
//!         indices: vec![0, 1, 2],
//!     })?;
//!     let material = scene.add_material(MaterialDesc::grey(180.0));
//!     scene.add_instance(geometry, Transform::identity(), material)?;
//!
//!     let compiled = compile(&scene)?;
//!     assert_eq!(compiled.instances.len(), 1);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]

pub mod compile;
pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Commonly used types
pub mod prelude {
    pub use crate::compile::{compile, CompileError, CompiledScene};
    pub use crate::config::EngineConfig;
    pub use crate::foundation::math::Transform;
    pub use crate::scene::{
        EnvironmentDesc, MaterialDesc, Mesh, Scene, SceneError, TextureDesc,
    };
}
