//! Texture decoding.
//!
//! Every texture is expanded to tightly packed 8-bit RGBA so it can be
//! copied straight into an `R8G8B8A8_UNORM` image.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ResourceError, ResourceResult};

/// Decoded pixels, row-major, 4 bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Size of the pixel data in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// Decodes the image at `path` into RGBA8.
///
/// # Errors
///
/// Fails if the file is missing, cannot be decoded, or has a zero dimension.
pub fn load_rgba8(path: &Path) -> ResourceResult<TextureData> {
    if !path.exists() {
        return Err(ResourceError::FileNotFound(path.to_path_buf()));
    }

    debug!("Decoding texture {:?}", path);

    let decoded = image::open(path).map_err(|source| ResourceError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = decoded.into_rgba8();
    let (width, height) = rgba.dimensions();

    if width == 0 || height == 0 {
        return Err(ResourceError::InvalidFormat {
            path: path.to_path_buf(),
            reason: format!("empty image ({}x{})", width, height),
        });
    }

    info!("Loaded texture {:?}: {}x{}", path, width, height);

    Ok(TextureData {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}
