//! Texture and environment-map descriptions
//!
//! Pixel data arrives fully decoded (image file parsing is an external
//! concern). Per-texture consistency is validated at registration; the
//! cross-texture uniform-dimension requirement is checked by the compiler
//! before any device allocation.

use super::SceneError;

/// Decoded RGBA8 texture.
#[derive(Debug, Clone, Default)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA8 pixel data, `width * height * 4` bytes
    pub data: Vec<u8>,
}

impl TextureDesc {
    /// Solid-color texture of the given dimensions
    pub fn from_color(color: [u8; 4], width: u32, height: u32) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SceneError> {
        if self.width == 0 || self.height == 0 {
            return Err(SceneError::ZeroTextureDimension {
                width: self.width,
                height: self.height,
            });
        }
        let expected = (self.width * self.height * 4) as usize;
        if self.data.len() != expected {
            return Err(SceneError::TextureSizeMismatch {
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Decoded RGBA32F environment map.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA32F texel data, `width * height * 4` floats
    pub data: Vec<f32>,
}

impl EnvironmentDesc {
    pub(crate) fn validate(&self) -> Result<(), SceneError> {
        if self.width == 0 || self.height == 0 {
            return Err(SceneError::ZeroTextureDimension {
                width: self.width,
                height: self.height,
            });
        }
        let expected = (self.width * self.height * 4) as usize;
        if self.data.len() != expected {
            return Err(SceneError::TextureSizeMismatch {
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_color_texture_is_consistent() {
        let texture = TextureDesc::from_color([255, 0, 0, 255], 4, 2);
        assert!(texture.validate().is_ok());
        assert_eq!(texture.data.len(), 32);
    }

    #[test]
    fn short_pixel_data_is_rejected() {
        let texture = TextureDesc {
            width: 2,
            height: 2,
            data: vec![0; 12],
        };
        assert!(matches!(
            texture.validate(),
            Err(SceneError::TextureSizeMismatch {
                expected: 16,
                actual: 12,
                ..
            })
        ));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let texture = TextureDesc {
            width: 0,
            height: 4,
            data: Vec::new(),
        };
        assert!(matches!(
            texture.validate(),
            Err(SceneError::ZeroTextureDimension { .. })
        ));
    }
}
