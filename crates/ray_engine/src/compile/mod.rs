//! Scene compilation
//!
//! The pure CPU half of the pipeline: turns a validated `Scene` into the
//! flat, GPU-layout tables the upload stage copies to device memory. No
//! Vulkan handle is touched here, which is what makes every table law
//! testable on the host.

pub mod attributes;
pub mod instances;
pub mod lights;
pub mod materials;
pub mod textures;
pub mod tlas;

pub use attributes::{flatten, AttributeRecord, FaceRecord, GeometryBuffers};
pub use instances::InstanceRecord;
pub use lights::LightRecord;
pub use materials::MaterialRecord;
pub use textures::{EnvironmentTable, TextureTable};
pub use tlas::{TlasInstanceDesc, DEFAULT_VISIBILITY_MASK, MAX_INSTANCES};

use crate::scene::Scene;
use log::info;
use thiserror::Error;

/// Fatal cross-object errors detected during compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    /// More instances than the 24-bit TLAS custom index can address
    #[error("instance count {count} exceeds the 24-bit capacity of the top-level structure")]
    InstanceCapacityExceeded {
        /// Offending instance count
        count: usize,
    },

    /// A texture layer does not match the table's shared dimensions
    #[error("texture {index} is {width}x{height}, expected {expected_width}x{expected_height}; all layers of an array image must share dimensions")]
    TextureDimensionMismatch {
        /// Registration index of the offending texture
        index: usize,
        /// Its width
        width: u32,
        /// Its height
        height: u32,
        /// Required width
        expected_width: u32,
        /// Required height
        expected_height: u32,
    },
}

/// Counters for references the compiler repaired instead of rejecting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileDiagnostics {
    /// Instances whose light handle no longer resolved
    pub unresolved_light_refs: usize,
    /// Lights whose owner instance no longer resolved
    pub unresolved_instance_refs: usize,
}

impl CompileDiagnostics {
    /// True when every cross-reference resolved cleanly
    pub fn is_clean(&self) -> bool {
        self.unresolved_light_refs == 0 && self.unresolved_instance_refs == 0
    }
}

/// Every table the upload stage needs, in GPU layout.
#[derive(Debug, Clone)]
pub struct CompiledScene {
    /// Flattened attribute and face buffers, one entry per geometry
    pub geometries: Vec<GeometryBuffers>,
    /// Packed material table
    pub materials: Vec<MaterialRecord>,
    /// Packed instance table in flattened scene order
    pub instances: Vec<InstanceRecord>,
    /// Packed light table in creation order
    pub lights: Vec<LightRecord>,
    /// Top-level instance descriptions, same order as `instances`
    pub tlas_instances: Vec<TlasInstanceDesc>,
    /// Layered RGBA8 texture block
    pub textures: TextureTable,
    /// Layered RGBA32F environment block
    pub environments: EnvironmentTable,
    /// Repair counters accumulated across the stages
    pub diagnostics: CompileDiagnostics,
}

/// Compile a scene into flat GPU tables.
///
/// Stages run in a fixed order so logs read the same from build to build:
/// texture tables first (their dimension check is the earliest fatal
/// error), then geometry flattening, then the packed record tables.
pub fn compile(scene: &Scene) -> Result<CompiledScene, CompileError> {
    // Capacity is the cheapest check, so it runs before any table is
    // materialized.
    tlas::ensure_instance_capacity(scene.instance_count())?;

    let mut diagnostics = CompileDiagnostics::default();

    info!("Compiling texture table ({} textures)", scene.textures().len());
    let textures = textures::build_texture_table(scene.textures())?;

    info!(
        "Compiling environment table ({} maps)",
        scene.environments().len()
    );
    let environments = textures::build_environment_table(scene.environments())?;

    info!("Flattening {} geometries", scene.geometries().len());
    let geometries: Vec<GeometryBuffers> = scene
        .geometries()
        .iter()
        .map(|g| attributes::flatten(g.mesh()))
        .collect();

    info!("Packing {} materials", scene.materials().len());
    let materials = scene
        .materials()
        .iter()
        .map(|m| materials::pack(m, scene.textures().len()))
        .collect();

    info!("Packing {} lights", scene.lights().len());
    let lights = lights::build(scene, &mut diagnostics);

    info!("Packing {} instances", scene.instance_count());
    let instances = instances::build(scene, &mut diagnostics);

    info!("Building top-level instance descriptions");
    let tlas_instances = tlas::build(scene)?;

    if !diagnostics.is_clean() {
        info!(
            "Compilation repaired {} dangling light and {} dangling instance references",
            diagnostics.unresolved_light_refs, diagnostics.unresolved_instance_refs
        );
    }

    Ok(CompiledScene {
        geometries,
        materials,
        instances,
        lights,
        tlas_instances,
        textures,
        environments,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec3};
    use crate::scene::{LightId, MaterialDesc, Mesh};

    fn plane() -> Mesh {
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
    fn empty_scene_compiles_with_placeholder_tables() {
        let compiled = compile(&Scene::new()).unwrap();
        assert!(compiled.geometries.is_empty());
        assert!(compiled.instances.is_empty());
        assert_eq!(compiled.textures.layer_count, 1);
        assert_eq!(compiled.environments.layer_count, 1);
        assert!(compiled.diagnostics.is_clean());
    }

    #[test]
    fn shared_geometry_and_material_compile_positionally() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(plane()).unwrap();
        let material = scene.add_material(MaterialDesc::grey(180.0));
        scene
            .add_instance(geometry, Transform::from_uniform_scale(10.0), material)
            .unwrap();
        scene
            .add_instance(
                geometry,
                Transform::from_translation(Vec3::new(0.0, 20.0, 0.0)),
                material,
            )
            .unwrap();

        let compiled = compile(&scene).unwrap();
        assert_eq!(compiled.geometries.len(), 1);
        assert_eq!(compiled.materials.len(), 1);
        assert_eq!(compiled.instances.len(), 2);
        assert!(compiled.lights.is_empty());
        assert_eq!(compiled.tlas_instances.len(), 2);

        for record in &compiled.instances {
            assert_eq!(record.geometry, 0);
            assert_eq!(record.material, 0);
            assert_eq!(record.light, 0);
        }
        // Floor keeps its scale, ceiling its translation.
        assert_eq!(compiled.instances[0].transform[0], 10.0);
        assert_eq!(compiled.instances[1].transform[7], 20.0);
    }

    #[test]
    fn emitter_tables_cross_reference_symmetrically() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(plane()).unwrap();
        let material = scene.add_material(MaterialDesc::grey(1600.0));
        scene
            .add_instance(geometry, Transform::identity(), material)
            .unwrap();
        let light = scene
            .add_emitter_instance(
                geometry,
                Transform::from_translation(Vec3::new(0.0, 19.0, 0.0)),
                material,
            )
            .unwrap();

        let compiled = compile(&scene).unwrap();
        assert_eq!(compiled.lights.len(), 1);
        let emitter = compiled.lights[0].instance as usize;
        assert_eq!(emitter, 1);
        assert_eq!(compiled.instances[emitter].light, light.0);
    }

    #[test]
    fn dangling_light_handle_is_repaired_and_counted() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(plane()).unwrap();
        let material = scene.add_material(MaterialDesc::default());
        scene
            .add_instance(geometry, Transform::identity(), material)
            .unwrap();
        scene.instance_mut(geometry, 0).light = Some(LightId(3));

        let compiled = compile(&scene).unwrap();
        assert_eq!(compiled.instances[0].light, 0);
        assert_eq!(compiled.diagnostics.unresolved_light_refs, 1);
        assert!(!compiled.diagnostics.is_clean());
    }
}
