//! Math utilities and types
//!
//! Provides the fundamental math types for scene transforms and the packed
//! matrix forms consumed by the ray-tracing tables.

pub use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Transform representing translation, rotation (in degrees) and scale.
///
/// Rotations are applied around the X, then Y, then Z axis, matching the
/// scene-description convention used by the authoring layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Translation in world units
    pub translation: Vec3,

    /// Euler rotation in degrees, applied X then Y then Z
    pub rotation_deg: Vec3,

    /// Per-axis scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation_deg: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform from translation, rotation (degrees) and scale
    pub fn new(translation: Vec3, rotation_deg: Vec3, scale: Vec3) -> Self {
        Self {
            translation,
            rotation_deg,
            scale,
        }
    }

    /// Create a transform with only translation
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Create a transform with uniform scale
    pub fn from_uniform_scale(scale: f32) -> Self {
        Self {
            scale: Vec3::new(scale, scale, scale),
            ..Default::default()
        }
    }

    /// Whether every component of the transform is a finite number
    pub fn is_finite(&self) -> bool {
        self.translation.iter().all(|v| v.is_finite())
            && self.rotation_deg.iter().all(|v| v.is_finite())
            && self.scale.iter().all(|v| v.is_finite())
    }

    /// Convert to a model matrix: T * Rx * Ry * Rz * S
    pub fn model_matrix(&self) -> Mat4 {
        let rad = self.rotation_deg * (std::f32::consts::PI / 180.0);
        Mat4::new_translation(&self.translation)
            * Mat4::new_rotation(Vec3::x() * rad.x)
            * Mat4::new_rotation(Vec3::y() * rad.y)
            * Mat4::new_rotation(Vec3::z() * rad.z)
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Normal matrix: inverse-transpose of the model matrix's upper 3x3.
///
/// Falls back to identity when the matrix is singular (e.g. zero scale).
pub fn normal_matrix(model: &Mat4) -> Mat3 {
    let upper: Mat3 = model.fixed_view::<3, 3>(0, 0).into_owned();
    upper
        .try_inverse()
        .map(|inv| inv.transpose())
        .unwrap_or_else(Mat3::identity)
}

/// Reduce a model matrix to the row-major 3x4 form used by acceleration
/// structures and the instance table. The fourth row is always the identity
/// row and is never stored.
pub fn transform_3x4(model: &Mat4) -> [f32; 12] {
    let mut out = [0.0f32; 12];
    for row in 0..3 {
        for col in 0..4 {
            out[row * 4 + col] = model[(row, col)];
        }
    }
    out
}

/// Expand a row-major 3x4 matrix back to a full 4x4 with an identity row.
pub fn expand_3x4(reduced: &[f32; 12]) -> Mat4 {
    let mut out = Mat4::identity();
    for row in 0..3 {
        for col in 0..4 {
            out[(row, col)] = reduced[row * 4 + col];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_transform_is_identity_matrix() {
        let transform = Transform::identity();
        assert_relative_eq!(transform.model_matrix(), Mat4::identity());
    }

    #[test]
    fn translation_lands_in_fourth_column() {
        let transform = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let model = transform.model_matrix();
        assert_relative_eq!(model[(0, 3)], 1.0);
        assert_relative_eq!(model[(1, 3)], 2.0);
        assert_relative_eq!(model[(2, 3)], 3.0);
    }

    #[test]
    fn reduced_transform_round_trips_on_unit_cube() {
        let transform = Transform::new(
            Vec3::new(-4.0, 18.0, 2.5),
            Vec3::new(140.0, 90.0, 15.0),
            Vec3::new(16.0, 2.0, 16.0),
        );
        let model = transform.model_matrix();
        let reduced = transform_3x4(&model);
        let expanded = expand_3x4(&reduced);

        let corners = [
            Vec4::new(-1.0, -1.0, -1.0, 1.0),
            Vec4::new(1.0, -1.0, -1.0, 1.0),
            Vec4::new(1.0, 1.0, -1.0, 1.0),
            Vec4::new(-1.0, 1.0, -1.0, 1.0),
            Vec4::new(-1.0, -1.0, 1.0, 1.0),
            Vec4::new(1.0, -1.0, 1.0, 1.0),
            Vec4::new(1.0, 1.0, 1.0, 1.0),
            Vec4::new(-1.0, 1.0, 1.0, 1.0),
        ];
        for corner in corners {
            assert_relative_eq!(model * corner, expanded * corner, epsilon = 1e-4);
        }
    }

    #[test]
    fn normal_matrix_of_uniform_scale_preserves_direction() {
        let transform = Transform::from_uniform_scale(10.0);
        let normal = normal_matrix(&transform.model_matrix());
        let n = normal * Vec3::new(0.0, 1.0, 0.0);
        let n = n.normalize();
        assert_relative_eq!(n, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn normal_matrix_of_singular_model_falls_back_to_identity() {
        let transform = Transform {
            scale: Vec3::new(0.0, 0.0, 0.0),
            ..Default::default()
        };
        let normal = normal_matrix(&transform.model_matrix());
        assert_relative_eq!(normal, Mat3::identity());
    }
}
