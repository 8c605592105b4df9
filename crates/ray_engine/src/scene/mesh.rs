//! Triangle mesh data
//!
//! A mesh is supplied fully decoded (file parsing is an external concern):
//! flat attribute arrays plus a 32-bit index list. Attribute alignment is
//! validated at registration time, never deferred to compilation.

use super::SceneError;

/// Indexed triangle mesh with per-vertex attributes.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex positions, three floats per vertex
    pub vertices: Vec<f32>,
    /// Vertex normals, three floats per vertex
    pub normals: Vec<f32>,
    /// Vertex tangents, three floats per vertex
    pub tangents: Vec<f32>,
    /// Texture coordinates, two floats per vertex
    pub uvs: Vec<f32>,
    /// Triangle indices into the vertex arrays
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Number of vertices described by the position array
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Number of triangles described by the index list
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Validate that all attribute arrays align 1:1 with the vertex count
    /// and that every index is in range.
    pub(crate) fn validate(&self) -> Result<(), SceneError> {
        if self.vertices.is_empty() {
            return Err(SceneError::MissingAttribute { field: "vertices" });
        }
        if self.vertices.len() % 3 != 0 {
            return Err(SceneError::UnevenAttributeLength {
                field: "vertices",
                len: self.vertices.len(),
                stride: 3,
            });
        }
        let vertex_count = self.vertex_count();
        if self.normals.is_empty() {
            return Err(SceneError::MissingAttribute { field: "normals" });
        }
        if self.normals.len() != vertex_count * 3 {
            return Err(SceneError::AttributeMismatch {
                field: "normals",
                expected: vertex_count * 3,
                actual: self.normals.len(),
            });
        }
        if self.tangents.is_empty() {
            return Err(SceneError::MissingAttribute { field: "tangents" });
        }
        if self.tangents.len() != vertex_count * 3 {
            return Err(SceneError::AttributeMismatch {
                field: "tangents",
                expected: vertex_count * 3,
                actual: self.tangents.len(),
            });
        }
        if self.uvs.is_empty() {
            return Err(SceneError::MissingAttribute { field: "uvs" });
        }
        if self.uvs.len() != vertex_count * 2 {
            return Err(SceneError::AttributeMismatch {
                field: "uvs",
                expected: vertex_count * 2,
                actual: self.uvs.len(),
            });
        }
        if self.indices.is_empty() {
            return Err(SceneError::MissingAttribute { field: "indices" });
        }
        if self.indices.len() % 3 != 0 {
            return Err(SceneError::IndexCountNotTriangles(self.indices.len()));
        }
        for &index in &self.indices {
            if index as usize >= vertex_count {
                return Err(SceneError::IndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
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

    #[test]
    fn valid_mesh_passes() {
        assert!(quad().validate().is_ok());
    }

    #[test]
    fn missing_normals_is_a_schema_error() {
        let mut mesh = quad();
        mesh.normals.clear();
        assert!(matches!(
            mesh.validate(),
            Err(SceneError::MissingAttribute { field: "normals" })
        ));
    }

    #[test]
    fn short_uvs_name_the_field_and_counts() {
        let mut mesh = quad();
        mesh.uvs.truncate(6);
        assert!(matches!(
            mesh.validate(),
            Err(SceneError::AttributeMismatch {
                field: "uvs",
                expected: 8,
                actual: 6,
            })
        ));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut mesh = quad();
        mesh.indices[4] = 9;
        assert!(matches!(
            mesh.validate(),
            Err(SceneError::IndexOutOfRange {
                index: 9,
                vertex_count: 4,
            })
        ));
    }

    #[test]
    fn non_triangle_index_count_is_rejected() {
        let mut mesh = quad();
        mesh.indices.pop();
        assert!(matches!(
            mesh.validate(),
            Err(SceneError::IndexCountNotTriangles(5))
        ));
    }
}
