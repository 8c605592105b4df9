//! Texture and environment table assembly
//!
//! Collapses the registered textures into one layered pixel block suitable
//! for a 2D-array image: layer 0 is an all-zero placeholder, registered
//! textures follow at layer index + 1. Every layer must share the same
//! dimensions; the mismatch is fatal here, before any device allocation.
//! Environment maps get the same treatment at RGBA32F precision.

use crate::compile::CompileError;
use crate::scene::{EnvironmentDesc, TextureDesc};

/// Uniform-dimension RGBA8 texture layers, placeholder first.
#[derive(Debug, Clone)]
pub struct TextureTable {
    /// Shared layer width
    pub width: u32,
    /// Shared layer height
    pub height: u32,
    /// Layer count including the placeholder
    pub layer_count: u32,
    /// Tightly packed layers, `layer_count * width * height * 4` bytes
    pub pixels: Vec<u8>,
}

impl TextureTable {
    /// Bytes per layer
    pub fn layer_stride(&self) -> usize {
        (self.width * self.height * 4) as usize
    }

    /// Byte offset of a layer within the pixel block
    pub fn layer_offset(&self, layer: u32) -> usize {
        layer as usize * self.layer_stride()
    }
}

/// Uniform-dimension RGBA32F environment layers, placeholder first.
#[derive(Debug, Clone)]
pub struct EnvironmentTable {
    /// Shared layer width
    pub width: u32,
    /// Shared layer height
    pub height: u32,
    /// Layer count including the placeholder
    pub layer_count: u32,
    /// Tightly packed layers, `layer_count * width * height * 4` floats
    pub texels: Vec<f32>,
}

impl EnvironmentTable {
    /// Floats per layer
    pub fn layer_stride(&self) -> usize {
        (self.width * self.height * 4) as usize
    }
}

/// Assemble the texture table. An empty scene still yields a single 1x1
/// placeholder layer so the descriptor binding is never empty.
pub fn build_texture_table(textures: &[TextureDesc]) -> Result<TextureTable, CompileError> {
    let (width, height) = match textures.first() {
        Some(first) => (first.width, first.height),
        None => (1, 1),
    };

    for (index, texture) in textures.iter().enumerate() {
        if texture.width != width || texture.height != height {
            return Err(CompileError::TextureDimensionMismatch {
                index,
                width: texture.width,
                height: texture.height,
                expected_width: width,
                expected_height: height,
            });
        }
    }

    let stride = (width * height * 4) as usize;
    let mut pixels = vec![0u8; stride * (textures.len() + 1)];
    for (index, texture) in textures.iter().enumerate() {
        let offset = (index + 1) * stride;
        pixels[offset..offset + stride].copy_from_slice(&texture.data);
    }

    Ok(TextureTable {
        width,
        height,
        layer_count: textures.len() as u32 + 1,
        pixels,
    })
}

/// Assemble the environment table, same layout as the texture table at
/// float precision.
pub fn build_environment_table(
    environments: &[EnvironmentDesc],
) -> Result<EnvironmentTable, CompileError> {
    let (width, height) = match environments.first() {
        Some(first) => (first.width, first.height),
        None => (1, 1),
    };

    for (index, map) in environments.iter().enumerate() {
        if map.width != width || map.height != height {
            return Err(CompileError::TextureDimensionMismatch {
                index,
                width: map.width,
                height: map.height,
                expected_width: width,
                expected_height: height,
            });
        }
    }

    let stride = (width * height * 4) as usize;
    let mut texels = vec![0.0f32; stride * (environments.len() + 1)];
    for (index, map) in environments.iter().enumerate() {
        let offset = (index + 1) * stride;
        texels[offset..offset + stride].copy_from_slice(&map.data);
    }

    Ok(EnvironmentTable {
        width,
        height,
        layer_count: environments.len() as u32 + 1,
        texels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scene_yields_single_placeholder_layer() {
        let table = build_texture_table(&[]).unwrap();
        assert_eq!((table.width, table.height), (1, 1));
        assert_eq!(table.layer_count, 1);
        assert_eq!(table.pixels, vec![0; 4]);
    }

    #[test]
    fn layers_land_after_the_placeholder() {
        let red = TextureDesc::from_color([255, 0, 0, 255], 2, 2);
        let blue = TextureDesc::from_color([0, 0, 255, 255], 2, 2);
        let table = build_texture_table(&[red, blue]).unwrap();
        assert_eq!(table.layer_count, 3);
        assert_eq!(&table.pixels[..table.layer_stride()], &[0u8; 16][..]);
        assert_eq!(table.pixels[table.layer_offset(1)], 255);
        assert_eq!(table.pixels[table.layer_offset(2) + 2], 255);
    }

    #[test]
    fn mismatched_dimensions_are_fatal() {
        let big = TextureDesc::from_color([1, 1, 1, 1], 4, 4);
        let small = TextureDesc::from_color([1, 1, 1, 1], 2, 2);
        let result = build_texture_table(&[big, small]);
        assert!(matches!(
            result,
            Err(CompileError::TextureDimensionMismatch {
                index: 1,
                width: 2,
                height: 2,
                expected_width: 4,
                expected_height: 4,
            })
        ));
    }

    #[test]
    fn environment_table_mirrors_texture_layout() {
        let map = EnvironmentDesc {
            width: 2,
            height: 1,
            data: vec![1.0; 8],
        };
        let table = build_environment_table(&[map]).unwrap();
        assert_eq!(table.layer_count, 2);
        assert_eq!(&table.texels[..8], &[0.0; 8][..]);
        assert_eq!(&table.texels[8..], &[1.0; 8][..]);
    }
}
