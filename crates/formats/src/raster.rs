//! Decoded world-map rasters.
//!
//! The landmass layer reads only the alpha channel, so images are always
//! normalized to 8-bit RGBA on decode.

use std::io::Cursor;

#[derive(Debug)]
pub enum RasterError {
    Empty,
    SizeMismatch { expected: usize, actual: usize },
    Decode(String),
    /// The image could not be retrieved at all.
    Fetch(String),
}

impl std::fmt::Display for RasterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RasterError::Empty => write!(f, "raster has zero width or height"),
            RasterError::SizeMismatch { expected, actual } => {
                write!(f, "raster buffer is {actual} bytes, expected {expected}")
            }
            RasterError::Decode(msg) => write!(f, "failed to decode raster: {msg}"),
            RasterError::Fetch(msg) => write!(f, "failed to fetch raster: {msg}"),
        }
    }
}

impl std::error::Error for RasterError {}

/// Row-major RGBA8 pixels.
#[derive(Clone, PartialEq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl RasterImage {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::Empty);
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(RasterError::SizeMismatch {
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Decodes PNG/JPEG bytes (format is sniffed from the header).
    pub fn decode(bytes: &[u8]) -> Result<Self, RasterError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| RasterError::Decode(format!("failed to guess format: {e}")))?;
        let img = reader
            .decode()
            .map_err(|e| RasterError::Decode(e.to_string()))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Self::from_rgba(width, height, img.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Alpha of the pixel at (`row`, `col`); coordinates are clamped.
    pub fn alpha_at(&self, row: u32, col: u32) -> u8 {
        let row = row.min(self.height - 1) as usize;
        let col = col.min(self.width - 1) as usize;
        self.rgba[(row * self.width as usize + col) * 4 + 3]
    }
}
