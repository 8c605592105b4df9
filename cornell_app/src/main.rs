//! Cornell box demo application
//!
//! Authors the classic Cornell box scene against the engine's scene API
//! and compiles it into the flat GPU tables, logging the resulting table
//! shapes. The compiled output is exactly what `SceneGpuResources::upload`
//! consumes once a ray-tracing capable device context exists.

use ray_engine::prelude::*;
use ray_engine::foundation::math::Vec3;

/// Unit plane in the XZ plane, facing +Y.
fn plane() -> Mesh {
    Mesh {
        vertices: vec![
            -1.0, 0.0, -1.0, //
            1.0, 0.0, -1.0, //
            1.0, 0.0, 1.0, //
            -1.0, 0.0, 1.0,
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

/// Unit cube centered on the origin, four vertices per face.
fn cube() -> Mesh {
    let faces: [([f32; 3], [f32; 3], [[f32; 3]; 4]); 6] = [
        // normal, tangent, corner positions
        (
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0],
            [
                [-1.0, -1.0, 1.0],
                [1.0, -1.0, 1.0],
                [1.0, 1.0, 1.0],
                [-1.0, 1.0, 1.0],
            ],
        ),
        (
            [0.0, 0.0, -1.0],
            [-1.0, 0.0, 0.0],
            [
                [1.0, -1.0, -1.0],
                [-1.0, -1.0, -1.0],
                [-1.0, 1.0, -1.0],
                [1.0, 1.0, -1.0],
            ],
        ),
        (
            [1.0, 0.0, 0.0],
            [0.0, 0.0, -1.0],
            [
                [1.0, -1.0, 1.0],
                [1.0, -1.0, -1.0],
                [1.0, 1.0, -1.0],
                [1.0, 1.0, 1.0],
            ],
        ),
        (
            [-1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [
                [-1.0, -1.0, -1.0],
                [-1.0, -1.0, 1.0],
                [-1.0, 1.0, 1.0],
                [-1.0, 1.0, -1.0],
            ],
        ),
        (
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [
                [-1.0, 1.0, 1.0],
                [1.0, 1.0, 1.0],
                [1.0, 1.0, -1.0],
                [-1.0, 1.0, -1.0],
            ],
        ),
        (
            [0.0, -1.0, 0.0],
            [1.0, 0.0, 0.0],
            [
                [-1.0, -1.0, -1.0],
                [1.0, -1.0, -1.0],
                [1.0, -1.0, 1.0],
                [-1.0, -1.0, 1.0],
            ],
        ),
    ];

    let mut mesh = Mesh::default();
    for (face, (normal, tangent, corners)) in faces.iter().enumerate() {
        let base = (face * 4) as u32;
        for (corner, position) in corners.iter().enumerate() {
            mesh.vertices.extend_from_slice(position);
            mesh.normals.extend_from_slice(normal);
            mesh.tangents.extend_from_slice(tangent);
            let (u, v) = match corner {
                0 => (0.0, 0.0),
                1 => (1.0, 0.0),
                2 => (1.0, 1.0),
                _ => (0.0, 1.0),
            };
            mesh.uvs.extend_from_slice(&[u, v]);
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

fn wall(translation: [f32; 3], rotation_deg: [f32; 3]) -> Transform {
    Transform {
        translation: Vec3::new(translation[0], translation[1], translation[2]),
        rotation_deg: Vec3::new(rotation_deg[0], rotation_deg[1], rotation_deg[2]),
        scale: Vec3::new(128.0, 1.0, 128.0),
    }
}

fn build_scene() -> Result<Scene, SceneError> {
    let mut scene = Scene::new();

    let plane_geo = scene.add_geometry(plane())?;
    let cube_geo = scene.add_geometry(cube())?;

    let white = scene.add_material(MaterialDesc {
        roughness: 0.9,
        ..MaterialDesc::grey(200.0)
    });
    let red = scene.add_material(MaterialDesc {
        roughness: 0.9,
        ..MaterialDesc::colored([180.0, 40.0, 40.0])
    });
    let green = scene.add_material(MaterialDesc {
        roughness: 0.9,
        ..MaterialDesc::colored([40.0, 180.0, 40.0])
    });
    let block = scene.add_material(MaterialDesc {
        roughness: 0.4,
        specular: 0.5,
        ..MaterialDesc::grey(220.0)
    });
    let lamp = scene.add_material(MaterialDesc::grey(1600.0));
    let side_lamp = scene.add_material(MaterialDesc::grey(1400.0));

    // Floor, ceiling and walls form a closed box 256 units across.
    scene.add_instance(plane_geo, wall([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]), white)?;
    scene.add_instance(plane_geo, wall([0.0, 256.0, 0.0], [180.0, 0.0, 0.0]), white)?;
    scene.add_instance(plane_geo, wall([0.0, 128.0, -128.0], [90.0, 0.0, 0.0]), white)?;
    scene.add_instance(plane_geo, wall([0.0, 128.0, 128.0], [-90.0, 0.0, 0.0]), white)?;
    scene.add_instance(plane_geo, wall([-128.0, 128.0, 0.0], [0.0, 0.0, -90.0]), red)?;
    scene.add_instance(plane_geo, wall([128.0, 128.0, 0.0], [0.0, 0.0, 90.0]), green)?;

    scene.add_instance(
        cube_geo,
        Transform {
            translation: Vec3::new(-24.0, 18.0, -20.0),
            rotation_deg: Vec3::new(0.0, 25.0, 0.0),
            scale: Vec3::new(16.0, 16.0, 16.0),
        },
        block,
    )?;

    // Ceiling lamp plus a tilted fill panel near the back wall.
    scene.add_emitter_instance(
        plane_geo,
        Transform {
            translation: Vec3::new(0.0, 255.0, 0.0),
            rotation_deg: Vec3::new(180.0, 0.0, 0.0),
            scale: Vec3::new(18.0, 1.0, 18.0),
        },
        lamp,
    )?;
    scene.add_emitter_instance(
        plane_geo,
        Transform {
            translation: Vec3::new(80.0, 200.0, -120.0),
            rotation_deg: Vec3::new(120.0, 0.0, 0.0),
            scale: Vec3::new(8.0, 1.0, 8.0),
        },
        side_lamp,
    )?;

    Ok(scene)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load_from_file("cornell.toml")?;

    let mut builder = env_logger::Builder::from_default_env();
    if config.verbose_log {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();

    log::info!("Building Cornell box scene...");
    let scene = build_scene()?;
    log::info!(
        "Scene: {} geometries, {} materials, {} instances, {} lights",
        scene.geometries().len(),
        scene.materials().len(),
        scene.instance_count(),
        scene.lights().len()
    );

    let compiled = compile(&scene)?;
    log::info!(
        "Compiled tables: {} geometries, {} materials, {} instances, {} lights, {} top-level descriptions",
        compiled.geometries.len(),
        compiled.materials.len(),
        compiled.instances.len(),
        compiled.lights.len(),
        compiled.tlas_instances.len()
    );
    log::info!(
        "Texture array {}x{} x{} layers, environment array {}x{} x{} layers",
        compiled.textures.width,
        compiled.textures.height,
        compiled.textures.layer_count,
        compiled.environments.width,
        compiled.environments.height,
        compiled.environments.layer_count
    );
    if !compiled.diagnostics.is_clean() {
        log::warn!(
            "Compilation repaired dangling references: {} light, {} instance",
            compiled.diagnostics.unresolved_light_refs,
            compiled.diagnostics.unresolved_instance_refs
        );
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        log::error!("Cornell demo failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cornell_scene_compiles() {
        let scene = build_scene().unwrap();
        let compiled = compile(&scene).unwrap();
        assert_eq!(compiled.geometries.len(), 2);
        assert_eq!(compiled.instances.len(), 9);
        assert_eq!(compiled.lights.len(), 2);
        assert!(compiled.diagnostics.is_clean());
    }

    #[test]
    fn cube_mesh_is_well_formed() {
        let mesh = cube();
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 12);
    }
}
