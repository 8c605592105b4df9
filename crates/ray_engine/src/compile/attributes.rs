//! Attribute flattening
//!
//! Converts an indexed mesh into the de-indexed per-corner layout the
//! shaders read: one 16-float attribute record per index entry and one
//! face record per triangle. Records are `repr(C)` and byte-castable so
//! the upload stage can hand them to staging buffers directly.

use crate::scene::Mesh;
use bytemuck::{Pod, Zeroable};

/// One flattened vertex corner, 64 bytes, std430-aligned to vec4 rows.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AttributeRecord {
    /// Position xyz, w unused
    pub position: [f32; 4],
    /// Normal xyz, w unused
    pub normal: [f32; 4],
    /// Tangent xyz, w unused
    pub tangent: [f32; 4],
    /// u, flipped v, two unused floats
    pub uv: [f32; 4],
}

/// One triangle's corner offsets into the attribute list, 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FaceRecord {
    /// Offsets of the triangle's three corners
    pub indices: [u32; 3],
    _pad: u32,
}

impl FaceRecord {
    fn new(base: u32) -> Self {
        Self {
            indices: [base, base + 1, base + 2],
            _pad: 0,
        }
    }
}

/// The flattened buffers of one geometry, plus the original indexed
/// arrays the acceleration-structure build consumes.
#[derive(Debug, Clone)]
pub struct GeometryBuffers {
    /// De-indexed attribute records, one per index entry
    pub attributes: Vec<AttributeRecord>,
    /// One record per triangle
    pub faces: Vec<FaceRecord>,
    /// Original vertex positions, kept for the BLAS build input
    pub vertices: Vec<f32>,
    /// Original triangle indices, kept for the BLAS build input
    pub indices: Vec<u32>,
}

impl GeometryBuffers {
    /// Number of triangles
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Attribute records as raw bytes
    pub fn attribute_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.attributes)
    }

    /// Face records as raw bytes
    pub fn face_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.faces)
    }
}

/// De-index a mesh into per-corner attribute and face records.
///
/// Shared vertices are duplicated per referencing triangle corner. The V
/// texture coordinate is flipped to match the image-space origin the
/// shaders expect.
pub fn flatten(mesh: &Mesh) -> GeometryBuffers {
    let mut attributes = Vec::with_capacity(mesh.indices.len());
    for &index in &mesh.indices {
        let i = index as usize;
        attributes.push(AttributeRecord {
            position: [
                mesh.vertices[i * 3],
                mesh.vertices[i * 3 + 1],
                mesh.vertices[i * 3 + 2],
                0.0,
            ],
            normal: [
                mesh.normals[i * 3],
                mesh.normals[i * 3 + 1],
                mesh.normals[i * 3 + 2],
                0.0,
            ],
            tangent: [
                mesh.tangents[i * 3],
                mesh.tangents[i * 3 + 1],
                mesh.tangents[i * 3 + 2],
                0.0,
            ],
            uv: [mesh.uvs[i * 2], 1.0 - mesh.uvs[i * 2 + 1], 0.0, 0.0],
        });
    }

    let faces = (0..mesh.triangle_count() as u32)
        .map(|k| FaceRecord::new(k * 3))
        .collect();

    GeometryBuffers {
        attributes,
        faces,
        vertices: mesh.vertices.clone(),
        indices: mesh.indices.clone(),
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
    fn one_record_per_index_entry() {
        let buffers = flatten(&quad());
        assert_eq!(buffers.attributes.len(), 6);
        assert_eq!(buffers.face_count(), 2);
        // Shared vertex 2 is duplicated at corners 2 and 4.
        assert_eq!(buffers.attributes[2], buffers.attributes[4]);
    }

    #[test]
    fn faces_enumerate_corners_sequentially() {
        let buffers = flatten(&quad());
        assert_eq!(buffers.faces[0].indices, [0, 1, 2]);
        assert_eq!(buffers.faces[1].indices, [3, 4, 5]);
    }

    #[test]
    fn v_coordinate_is_flipped() {
        let buffers = flatten(&quad());
        // Corner 0 references vertex 0 with uv (0, 0).
        assert_eq!(buffers.attributes[0].uv[1], 1.0);
        // Corner 2 references vertex 2 with uv (1, 1).
        assert_eq!(buffers.attributes[2].uv[0], 1.0);
        assert_eq!(buffers.attributes[2].uv[1], 0.0);
    }

    #[test]
    fn record_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<AttributeRecord>(), 64);
        assert_eq!(std::mem::size_of::<FaceRecord>(), 16);
    }
}
