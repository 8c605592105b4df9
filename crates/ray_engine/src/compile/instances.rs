//! Instance table packing
//!
//! One record per placed instance in flattened scene order: the index
//! triple linking it to its geometry, material and light table rows, the
//! triangle count, a row-major 3x4 object-to-world matrix, and the 3x3
//! normal matrix derived from it.

use crate::compile::CompileDiagnostics;
use crate::foundation::math::{normal_matrix, transform_3x4};
use crate::scene::Scene;
use bytemuck::{Pod, Zeroable};
use log::warn;

/// Packed instance record, 100 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    /// Geometry table index
    pub geometry: u32,
    /// Material table index
    pub material: u32,
    /// Light table index, zero when the instance is not an emitter
    pub light: u32,
    /// Triangle count of the referenced geometry
    pub face_count: u32,
    /// Row-major 3x4 object-to-world matrix
    pub transform: [f32; 12],
    /// Column-major 3x3 inverse-transpose of the model matrix
    pub normal: [f32; 9],
}

/// Pack the instance table in flattened scene order.
///
/// A light handle that no longer resolves is packed as index zero and
/// counted in the diagnostics rather than failing the compile; the shader
/// then samples a valid (if wrong) light instead of reading out of bounds.
pub fn build(scene: &Scene, diagnostics: &mut CompileDiagnostics) -> Vec<InstanceRecord> {
    let light_count = scene.lights().len();
    let mut records = Vec::with_capacity(scene.instance_count());

    for (geometry_id, instance) in scene.instances() {
        let light = match instance.light() {
            Some(id) if id.index() < light_count => id.0,
            Some(id) => {
                warn!(
                    "instance of geometry {} references missing light {}, defaulting to 0",
                    geometry_id.index(),
                    id.index()
                );
                diagnostics.unresolved_light_refs += 1;
                0
            }
            None => 0,
        };

        let model = instance.transform.model_matrix();
        let normal = normal_matrix(&model);
        let mut normal_cols = [0.0f32; 9];
        normal_cols.copy_from_slice(normal.as_slice());

        records.push(InstanceRecord {
            geometry: geometry_id.0,
            material: instance.material.0,
            light,
            face_count: scene.geometries()[geometry_id.index()].mesh().triangle_count() as u32,
            transform: transform_3x4(&model),
            normal: normal_cols,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec3};
    use crate::scene::{LightId, MaterialDesc, Mesh};

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
    fn records_follow_flattened_order() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(quad()).unwrap();
        let material = scene.add_material(MaterialDesc::default());
        scene
            .add_instance(
                geometry,
                Transform::from_translation(Vec3::new(1.0, 2.0, 3.0)),
                material,
            )
            .unwrap();
        let light = scene
            .add_emitter_instance(geometry, Transform::identity(), material)
            .unwrap();

        let mut diagnostics = CompileDiagnostics::default();
        let records = build(&scene, &mut diagnostics);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].geometry, 0);
        assert_eq!(records[0].material, 0);
        assert_eq!(records[0].light, 0);
        assert_eq!(records[0].face_count, 2);
        assert_eq!(records[1].light, light.0);
        assert_eq!(diagnostics.unresolved_light_refs, 0);

        // Row-major translation column of the first record.
        assert_eq!(records[0].transform[3], 1.0);
        assert_eq!(records[0].transform[7], 2.0);
        assert_eq!(records[0].transform[11], 3.0);
    }

    #[test]
    fn dangling_light_reference_fails_open() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(quad()).unwrap();
        let material = scene.add_material(MaterialDesc::default());
        scene
            .add_instance(geometry, Transform::identity(), material)
            .unwrap();
        scene.instance_mut(geometry, 0).light = Some(LightId(9));

        let mut diagnostics = CompileDiagnostics::default();
        let records = build(&scene, &mut diagnostics);
        assert_eq!(records[0].light, 0);
        assert_eq!(diagnostics.unresolved_light_refs, 1);
    }

    #[test]
    fn uniform_scale_shapes_the_normal_matrix() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(quad()).unwrap();
        let material = scene.add_material(MaterialDesc::default());
        scene
            .add_instance(geometry, Transform::from_uniform_scale(2.0), material)
            .unwrap();

        let mut diagnostics = CompileDiagnostics::default();
        let records = build(&scene, &mut diagnostics);
        // Inverse-transpose of 2*I is 0.5*I.
        assert!((records[0].normal[0] - 0.5).abs() < 1e-6);
        assert!((records[0].normal[4] - 0.5).abs() < 1e-6);
        assert!((records[0].normal[8] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn record_size_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<InstanceRecord>(), 100);
    }
}
