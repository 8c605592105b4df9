//! Light table packing
//!
//! One 16-byte record per light, holding nothing but the flattened index
//! of its owning emitter instance. The shader samples the emitter's
//! geometry through the instance table; radiance comes from the instance's
//! material color.

use crate::compile::CompileDiagnostics;
use crate::scene::Scene;
use bytemuck::{Pod, Zeroable};
use log::warn;

/// Packed light record, 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightRecord {
    /// Flattened index of the owning emitter instance
    pub instance: u32,
    _pad: [f32; 3],
}

/// Pack the light table in creation order.
///
/// A light whose owning instance cannot be resolved is packed as instance
/// zero and counted in the diagnostics, mirroring the fail-open handling
/// on the instance side.
pub fn build(scene: &Scene, diagnostics: &mut CompileDiagnostics) -> Vec<LightRecord> {
    scene
        .lights()
        .iter()
        .enumerate()
        .map(|(i, light)| {
            let instance = match scene.light_instance_index(light) {
                Some(index) => index as u32,
                None => {
                    warn!("light {i} has no resolvable owner instance, defaulting to 0");
                    diagnostics.unresolved_instance_refs += 1;
                    0
                }
            };
            LightRecord {
                instance,
                _pad: [0.0; 3],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
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
    fn lights_point_at_flattened_instances() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(quad()).unwrap();
        let material = scene.add_material(MaterialDesc::default());
        scene
            .add_instance(geometry, Transform::identity(), material)
            .unwrap();
        scene
            .add_emitter_instance(geometry, Transform::identity(), material)
            .unwrap();

        let mut diagnostics = CompileDiagnostics::default();
        let records = build(&scene, &mut diagnostics);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instance, 1);
        assert_eq!(diagnostics.unresolved_instance_refs, 0);
    }

    #[test]
    fn record_size_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<LightRecord>(), 16);
    }
}
