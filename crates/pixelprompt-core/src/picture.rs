use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};

use crate::error::{GenerationError, SaveError};

/// Guidance strength passed to every generation call.
pub const GUIDANCE_SCALE: f64 = 7.5;

/// Edge length of the square images the model produces.
pub const IMAGE_SIZE: u32 = 512;

/// Edge length of the square display surface.
pub const DISPLAY_SIZE: u32 = 512;

/// One rendered image, held in memory until replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pixels: RgbImage,
}

impl GeneratedImage {
    pub fn new(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// Build an image from packed RGB bytes (row-major, 3 bytes per pixel).
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, GenerationError> {
        let len = data.len();
        RgbImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| {
                GenerationError::InvalidOutput(format!(
                    "{} bytes cannot fill a {}x{} RGB image",
                    len, width, height
                ))
            })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, SaveError> {
        let mut bytes = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Write the PNG encoding to `path`, adding a `.png` extension when the
    /// path has none. Returns the path actually written.
    pub fn save_png(&self, path: &Path) -> Result<PathBuf, SaveError> {
        let path = with_png_extension(path);
        let bytes = self.encode_png()?;
        std::fs::write(&path, bytes).map_err(|source| SaveError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// A square copy scaled for the display surface. The stored image is
    /// left as generated.
    pub fn to_display(&self, size: u32) -> RgbImage {
        if self.width() == size && self.height() == size {
            return self.pixels.clone();
        }
        imageops::resize(&self.pixels, size, size, FilterType::Triangle)
    }
}

fn with_png_extension(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension("png")
    }
}
