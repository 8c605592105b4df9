//! Scene description and registries
//!
//! One `Scene` object owns arena-style lists of geometries, materials,
//! textures, environment maps and lights. Handles are stable integer
//! indices into those arenas; every cross-reference in the compiled tables
//! is resolved positionally against them.
//!
//! Authoring calls validate their inputs immediately (schema and type
//! errors surface here, before any device resource is touched).

pub mod material;
pub mod mesh;
pub mod texture;

pub use material::MaterialDesc;
pub use mesh::Mesh;
pub use texture::{EnvironmentDesc, TextureDesc};

use crate::foundation::math::Transform;
use thiserror::Error;

/// Schema and type errors raised at scene-authoring calls.
#[derive(Error, Debug)]
pub enum SceneError {
    /// A required mesh attribute array is missing or empty
    #[error("geometry '{field}' attribute is missing")]
    MissingAttribute {
        /// Name of the missing attribute
        field: &'static str,
    },

    /// An attribute array length does not divide evenly by its stride
    #[error("geometry '{field}' length {len} is not a multiple of {stride}")]
    UnevenAttributeLength {
        /// Name of the malformed attribute
        field: &'static str,
        /// Actual array length
        len: usize,
        /// Required stride
        stride: usize,
    },

    /// An attribute array does not align 1:1 with the vertex count
    #[error("geometry '{field}' length {actual} does not match the {expected} entries implied by the vertex count")]
    AttributeMismatch {
        /// Name of the mismatched attribute
        field: &'static str,
        /// Expected array length
        expected: usize,
        /// Actual array length
        actual: usize,
    },

    /// The index list does not describe whole triangles
    #[error("geometry index count {0} is not a multiple of 3")]
    IndexCountNotTriangles(usize),

    /// An index refers past the end of the vertex arrays
    #[error("geometry index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// The offending index value
        index: u32,
        /// Number of vertices in the mesh
        vertex_count: usize,
    },

    /// A transform component is NaN or infinite
    #[error("instance transform '{component}' must be finite")]
    NonFiniteTransform {
        /// Which transform component failed validation
        component: &'static str,
    },

    /// Texture pixel data does not match the declared dimensions
    #[error("texture data length {actual} does not match {width}x{height} RGBA dimensions ({expected} elements)")]
    TextureSizeMismatch {
        /// Declared width
        width: u32,
        /// Declared height
        height: u32,
        /// Expected element count
        expected: usize,
        /// Actual element count
        actual: usize,
    },

    /// Texture has a zero width or height
    #[error("texture dimensions {width}x{height} must be non-zero")]
    ZeroTextureDimension {
        /// Declared width
        width: u32,
        /// Declared height
        height: u32,
    },

    /// A geometry handle does not belong to this scene
    #[error("unknown geometry handle {0:?}")]
    UnknownGeometry(GeometryId),

    /// A material handle does not belong to this scene
    #[error("unknown material handle {0:?}")]
    UnknownMaterial(MaterialId),
}

macro_rules! arena_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Position of the referenced record within its arena
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// Stable handle to a registered geometry
    GeometryId
);
arena_id!(
    /// Stable handle to a registered material
    MaterialId
);
arena_id!(
    /// Stable handle to a registered texture
    TextureId
);
arena_id!(
    /// Stable handle to a registered environment map
    EnvironmentId
);
arena_id!(
    /// Stable handle to a light record
    LightId
);

/// One placement of a geometry in the scene.
///
/// Emitter instances carry a light handle; there is no separate emitter
/// type, the capability field is the whole distinction.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Placement transform
    pub transform: Transform,
    /// Material assignment
    pub material: MaterialId,
    /// Present iff this instance is a light emitter
    pub(crate) light: Option<LightId>,
}

impl Instance {
    /// Light record owned by this instance, if it is an emitter
    pub fn light(&self) -> Option<LightId> {
        self.light
    }
}

/// A registered geometry: the mesh plus the instances placed from it.
#[derive(Debug, Clone)]
pub struct Geometry {
    mesh: Mesh,
    instances: Vec<Instance>,
}

impl Geometry {
    /// The validated mesh data
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Instances placed from this geometry, in insertion order
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }
}

/// A light record: nothing but the identity of its owning emitter instance.
/// Emission color lives on the instance's material.
#[derive(Debug, Clone)]
pub struct Light {
    pub(crate) geometry: GeometryId,
    pub(crate) local_instance: u32,
}

/// The scene: arena containers for every authored object.
#[derive(Debug, Default)]
pub struct Scene {
    geometries: Vec<Geometry>,
    materials: Vec<MaterialDesc>,
    textures: Vec<TextureDesc>,
    environments: Vec<EnvironmentDesc>,
    lights: Vec<Light>,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a geometry, validating its mesh attributes.
    pub fn add_geometry(&mut self, mesh: Mesh) -> Result<GeometryId, SceneError> {
        mesh.validate()?;
        let id = GeometryId(self.geometries.len() as u32);
        self.geometries.push(Geometry {
            mesh,
            instances: Vec::new(),
        });
        Ok(id)
    }

    /// Register a material. Parameters are taken as-is; clamping happens at
    /// compile time.
    pub fn add_material(&mut self, material: MaterialDesc) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material);
        id
    }

    /// Register a texture, validating its pixel data.
    pub fn add_texture(&mut self, texture: TextureDesc) -> Result<TextureId, SceneError> {
        texture.validate()?;
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(texture);
        Ok(id)
    }

    /// Register an environment map, validating its texel data.
    pub fn add_environment(
        &mut self,
        map: EnvironmentDesc,
    ) -> Result<EnvironmentId, SceneError> {
        map.validate()?;
        let id = EnvironmentId(self.environments.len() as u32);
        self.environments.push(map);
        Ok(id)
    }

    /// Place an instance of a geometry.
    pub fn add_instance(
        &mut self,
        geometry: GeometryId,
        transform: Transform,
        material: MaterialId,
    ) -> Result<(), SceneError> {
        self.validate_instance(geometry, &transform, material)?;
        self.geometries[geometry.index()].instances.push(Instance {
            transform,
            material,
            light: None,
        });
        Ok(())
    }

    /// Place an emitter instance of a geometry.
    ///
    /// The instance and its light record are created together and linked
    /// both ways by index: the instance stores the light handle, the light
    /// stores the owning geometry and the instance's local position.
    pub fn add_emitter_instance(
        &mut self,
        geometry: GeometryId,
        transform: Transform,
        material: MaterialId,
    ) -> Result<LightId, SceneError> {
        self.validate_instance(geometry, &transform, material)?;
        let light_id = LightId(self.lights.len() as u32);
        let local_instance = self.geometries[geometry.index()].instances.len() as u32;
        self.lights.push(Light {
            geometry,
            local_instance,
        });
        self.geometries[geometry.index()].instances.push(Instance {
            transform,
            material,
            light: Some(light_id),
        });
        Ok(light_id)
    }

    fn validate_instance(
        &self,
        geometry: GeometryId,
        transform: &Transform,
        material: MaterialId,
    ) -> Result<(), SceneError> {
        if geometry.index() >= self.geometries.len() {
            return Err(SceneError::UnknownGeometry(geometry));
        }
        if material.index() >= self.materials.len() {
            return Err(SceneError::UnknownMaterial(material));
        }
        if !transform.translation.iter().all(|v| v.is_finite()) {
            return Err(SceneError::NonFiniteTransform {
                component: "translation",
            });
        }
        if !transform.rotation_deg.iter().all(|v| v.is_finite()) {
            return Err(SceneError::NonFiniteTransform {
                component: "rotation",
            });
        }
        if !transform.scale.iter().all(|v| v.is_finite()) {
            return Err(SceneError::NonFiniteTransform { component: "scale" });
        }
        Ok(())
    }

    /// Registered geometries in registration order
    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    /// Registered materials in registration order
    pub fn materials(&self) -> &[MaterialDesc] {
        &self.materials
    }

    /// Registered textures in registration order
    pub fn textures(&self) -> &[TextureDesc] {
        &self.textures
    }

    /// Registered environment maps in registration order
    pub fn environments(&self) -> &[EnvironmentDesc] {
        &self.environments
    }

    /// Light records in creation order
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Order-stable flattened view over all geometries' instances.
    ///
    /// This ordering is the canonical instance-index space: every
    /// cross-reference in the compiled tables counts instances the way this
    /// iterator yields them.
    pub fn instances(&self) -> impl Iterator<Item = (GeometryId, &Instance)> + '_ {
        self.geometries.iter().enumerate().flat_map(|(gi, g)| {
            g.instances
                .iter()
                .map(move |instance| (GeometryId(gi as u32), instance))
        })
    }

    /// Total number of instances across all geometries
    pub fn instance_count(&self) -> usize {
        self.geometries.iter().map(|g| g.instances.len()).sum()
    }

    /// Resolve a light's owning instance to its position in the flattened
    /// instance view. `None` when the link is dangling.
    pub(crate) fn light_instance_index(&self, light: &Light) -> Option<usize> {
        let gi = light.geometry.index();
        if gi >= self.geometries.len() {
            return None;
        }
        let local = light.local_instance as usize;
        if local >= self.geometries[gi].instances.len() {
            return None;
        }
        let before: usize = self.geometries[..gi]
            .iter()
            .map(|g| g.instances.len())
            .sum();
        Some(before + local)
    }

    #[cfg(test)]
    pub(crate) fn instance_mut(
        &mut self,
        geometry: GeometryId,
        local: usize,
    ) -> &mut Instance {
        &mut self.geometries[geometry.index()].instances[local]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn handles_are_positional() {
        let mut scene = Scene::new();
        let a = scene.add_geometry(quad()).unwrap();
        let b = scene.add_geometry(quad()).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
    }

    #[test]
    fn instance_with_unknown_material_is_rejected() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(quad()).unwrap();
        let result = scene.add_instance(geometry, Transform::identity(), MaterialId(7));
        assert!(matches!(result, Err(SceneError::UnknownMaterial(_))));
    }

    #[test]
    fn non_finite_transform_is_rejected() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(quad()).unwrap();
        let material = scene.add_material(MaterialDesc::default());
        let mut transform = Transform::identity();
        transform.scale.x = f32::NAN;
        let result = scene.add_instance(geometry, transform, material);
        assert!(matches!(
            result,
            Err(SceneError::NonFiniteTransform { component: "scale" })
        ));
    }

    #[test]
    fn emitter_instance_links_both_ways() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(quad()).unwrap();
        let material = scene.add_material(MaterialDesc::default());
        scene
            .add_instance(geometry, Transform::identity(), material)
            .unwrap();
        let light = scene
            .add_emitter_instance(geometry, Transform::identity(), material)
            .unwrap();

        assert_eq!(light.index(), 0);
        let instances: Vec<_> = scene.instances().collect();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].1.light(), None);
        assert_eq!(instances[1].1.light(), Some(light));
        assert_eq!(
            scene.light_instance_index(&scene.lights()[0]),
            Some(1)
        );
    }

    #[test]
    fn flattened_view_orders_by_geometry_then_insertion() {
        let mut scene = Scene::new();
        let first = scene.add_geometry(quad()).unwrap();
        let second = scene.add_geometry(quad()).unwrap();
        let material = scene.add_material(MaterialDesc::default());
        scene
            .add_instance(second, Transform::identity(), material)
            .unwrap();
        scene
            .add_instance(first, Transform::identity(), material)
            .unwrap();
        scene
            .add_instance(second, Transform::identity(), material)
            .unwrap();

        let order: Vec<usize> = scene.instances().map(|(g, _)| g.index()).collect();
        assert_eq!(order, vec![0, 1, 1]);
    }
}
