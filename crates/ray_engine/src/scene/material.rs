//! Material description
//!
//! A flat record of scalar reflectance parameters, all defaulted to zero,
//! plus up to four texture references. Clamping and texture-slot resolution
//! happen when the material table is compiled, not here.

use super::TextureId;

/// Scalar reflectance parameters and texture references of one material.
///
/// `color` is given in 0-255 channel scale and divided by 255 at packing
/// time; every other scalar is clamped into (0.001, 0.999) by the compiler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialDesc {
    /// Base color in 0-255 channel scale
    pub color: [f32; 3],
    /// Metalness amount
    pub metalness: f32,
    /// Specular amount
    pub specular: f32,
    /// Surface roughness
    pub roughness: f32,
    /// Anisotropy amount
    pub anisotropy: f32,
    /// Specular tint
    pub specular_tint: f32,
    /// Sheen tint
    pub sheen_tint: f32,
    /// Sheen amount
    pub sheen: f32,
    /// Clear-coat gloss
    pub clearcoat_gloss: f32,
    /// Clear-coat amount
    pub clearcoat: f32,
    /// Subsurface scattering amount
    pub subsurface: f32,
    /// Albedo texture reference
    pub albedo_texture: Option<TextureId>,
    /// Normal-map texture reference
    pub normal_texture: Option<TextureId>,
    /// Combined metal/roughness texture reference
    pub metal_roughness_texture: Option<TextureId>,
    /// Emissive texture reference
    pub emissive_texture: Option<TextureId>,
}

impl MaterialDesc {
    /// Material with only a base color, everything else at defaults
    pub fn colored(color: [f32; 3]) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    /// Uniform grey color, mirroring the single-element color shorthand of
    /// the authoring layer
    pub fn grey(value: f32) -> Self {
        Self::colored([value, value, value])
    }
}
