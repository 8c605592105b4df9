//! Top-level instance descriptions
//!
//! CPU-side precursors of the Vulkan TLAS instance records: transform,
//! flattened instance index and geometry reference for every placed
//! instance. The device-side packing into
//! `VkAccelerationStructureInstanceKHR` happens in the upload stage once
//! BLAS addresses exist.

use crate::compile::CompileError;
use crate::foundation::math::transform_3x4;
use crate::scene::Scene;

/// Hard ceiling on instance count: the custom index field of a TLAS
/// instance is 24 bits wide.
pub const MAX_INSTANCES: usize = 1 << 24;

/// Visibility mask applied to every instance.
pub const DEFAULT_VISIBILITY_MASK: u8 = 0x80;

/// One top-level instance description.
#[derive(Debug, Clone, PartialEq)]
pub struct TlasInstanceDesc {
    /// Row-major 3x4 object-to-world matrix
    pub transform: [f32; 12],
    /// Flattened instance index, stored in the 24-bit custom index field
    pub instance_index: u32,
    /// Visibility mask
    pub mask: u8,
    /// Geometry table index, selects the BLAS
    pub geometry: u32,
}

/// Reject instance counts that cannot be addressed by the 24-bit custom
/// index field. Checked before any allocation so the failure is cheap.
pub fn ensure_instance_capacity(count: usize) -> Result<(), CompileError> {
    if count >= MAX_INSTANCES {
        return Err(CompileError::InstanceCapacityExceeded { count });
    }
    Ok(())
}

/// Build the top-level instance descriptions in flattened scene order.
pub fn build(scene: &Scene) -> Result<Vec<TlasInstanceDesc>, CompileError> {
    ensure_instance_capacity(scene.instance_count())?;

    Ok(scene
        .instances()
        .enumerate()
        .map(|(index, (geometry_id, instance))| TlasInstanceDesc {
            transform: transform_3x4(&instance.transform.model_matrix()),
            instance_index: index as u32,
            mask: DEFAULT_VISIBILITY_MASK,
            geometry: geometry_id.0,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec3};
    use crate::scene::{MaterialDesc, Mesh};

    fn quad() -> Mesh {
        Mesh {
            vertices: vec![
                -1.0, 0.0, -1.0, 1.0, 0.0, -1.0, 1.0, 0.0, 1.0, -1.0, 0.0, 1.0,
            ],
            normals: vec![
                0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0,
            ],
            tangents: vec![
                1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0,
            ],
            uvs: vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    #[test]
    fn capacity_boundary_is_exclusive() {
        assert!(ensure_instance_capacity(MAX_INSTANCES - 1).is_ok());
        assert!(matches!(
            ensure_instance_capacity(MAX_INSTANCES),
            Err(CompileError::InstanceCapacityExceeded {
                count: MAX_INSTANCES
            })
        ));
    }

    #[test]
    fn descriptions_carry_flattened_indices_and_mask() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(quad()).unwrap();
        let material = scene.add_material(MaterialDesc::default());
        scene
            .add_instance(
                geometry,
                Transform::from_translation(Vec3::new(0.0, 5.0, 0.0)),
                material,
            )
            .unwrap();
        scene
            .add_instance(geometry, Transform::identity(), material)
            .unwrap();

        let descs = build(&scene).unwrap();
        assert_eq!(descs.len(), 2);
        assert_eq!(descs[0].instance_index, 0);
        assert_eq!(descs[1].instance_index, 1);
        assert_eq!(descs[0].mask, DEFAULT_VISIBILITY_MASK);
        assert_eq!(descs[0].geometry, 0);
        assert_eq!(descs[0].transform[7], 5.0);
    }
}
