//! Material table packing
//!
//! Packs authored materials into the fixed 80-byte records the closest-hit
//! shader indexes by instance. Scalars are clamped into the open interval
//! (0.001, 0.999) so BRDF terms never divide by zero; base color is scaled
//! from 0-255 to 0-1 without clamping, which leaves headroom for emitters
//! whose color doubles as radiance.

use crate::scene::{MaterialDesc, TextureId};
use bytemuck::{Pod, Zeroable};

const SCALAR_MIN: f32 = 0.001;
const SCALAR_MAX: f32 = 0.999;

/// Packed material record, 80 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialRecord {
    /// Base color scaled to 0-1, unclamped
    pub color: [f32; 3],
    _pad0: f32,
    /// Metalness, clamped
    pub metalness: f32,
    /// Specular, clamped
    pub specular: f32,
    /// Roughness, clamped
    pub roughness: f32,
    /// Anisotropy, clamped
    pub anisotropy: f32,
    /// Specular tint, clamped
    pub specular_tint: f32,
    /// Sheen tint, clamped
    pub sheen_tint: f32,
    /// Sheen, clamped
    pub sheen: f32,
    /// Clear-coat gloss, clamped
    pub clearcoat_gloss: f32,
    /// Clear-coat, clamped
    pub clearcoat: f32,
    /// Subsurface, clamped
    pub subsurface: f32,
    _pad1: [f32; 2],
    /// Texture-array slots: albedo, normal, metal/roughness, emissive.
    /// Zero selects the placeholder layer.
    pub textures: [u32; 4],
}

fn clamp_open(value: f32) -> f32 {
    value.clamp(SCALAR_MIN, SCALAR_MAX)
}

/// Resolve a texture reference to a texture-array slot.
///
/// Slot 0 is the all-zero placeholder layer, so valid references shift up
/// by one. An absent or dangling reference resolves to the placeholder;
/// sampling it yields zero, the same contribution an untextured material
/// gets.
pub(crate) fn resolve_slot(reference: Option<TextureId>, texture_count: usize) -> u32 {
    match reference {
        Some(id) if id.index() < texture_count => id.0 + 1,
        _ => 0,
    }
}

/// Pack one material against the scene's texture count.
pub fn pack(material: &MaterialDesc, texture_count: usize) -> MaterialRecord {
    MaterialRecord {
        color: [
            material.color[0] / 255.0,
            material.color[1] / 255.0,
            material.color[2] / 255.0,
        ],
        _pad0: 0.0,
        metalness: clamp_open(material.metalness),
        specular: clamp_open(material.specular),
        roughness: clamp_open(material.roughness),
        anisotropy: clamp_open(material.anisotropy),
        specular_tint: clamp_open(material.specular_tint),
        sheen_tint: clamp_open(material.sheen_tint),
        sheen: clamp_open(material.sheen),
        clearcoat_gloss: clamp_open(material.clearcoat_gloss),
        clearcoat: clamp_open(material.clearcoat),
        subsurface: clamp_open(material.subsurface),
        _pad1: [0.0; 2],
        textures: [
            resolve_slot(material.albedo_texture, texture_count),
            resolve_slot(material.normal_texture, texture_count),
            resolve_slot(material.metal_roughness_texture, texture_count),
            resolve_slot(material.emissive_texture, texture_count),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_clamp_into_open_interval() {
        let material = MaterialDesc {
            metalness: -1.0,
            roughness: 2.0,
            sheen: 0.5,
            ..Default::default()
        };
        let record = pack(&material, 0);
        assert_eq!(record.metalness, 0.001);
        assert_eq!(record.roughness, 0.999);
        assert_eq!(record.sheen, 0.5);
        // Defaulted scalars land on the lower clamp bound, not zero.
        assert_eq!(record.specular, 0.001);
    }

    #[test]
    fn color_scales_without_clamping() {
        let material = MaterialDesc::colored([255.0, 0.0, 1600.0]);
        let record = pack(&material, 0);
        assert_eq!(record.color[0], 1.0);
        assert_eq!(record.color[1], 0.0);
        // Emitter radiance above channel scale survives packing.
        assert!((record.color[2] - 1600.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn texture_slots_shift_past_the_placeholder() {
        assert_eq!(resolve_slot(Some(TextureId(0)), 3), 1);
        assert_eq!(resolve_slot(Some(TextureId(2)), 3), 3);
    }

    #[test]
    fn absent_or_dangling_references_fall_back_to_placeholder() {
        assert_eq!(resolve_slot(None, 3), 0);
        assert_eq!(resolve_slot(Some(TextureId(5)), 3), 0);
    }

    #[test]
    fn record_size_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<MaterialRecord>(), 80);
    }
}
