use std::io::Cursor;

use image::{ImageFormat, RgbImage};

use crate::error::EmbedError;

/// Image is a decoded 8-bit RGB raster, row-major, `height x width x 3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Image {
    /// Wrap a raw RGB8 buffer. Fails if either side is zero or the buffer
    /// length is not `width * height * 3`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, EmbedError> {
        if width == 0 || height == 0 {
            return Err(EmbedError::InvalidImage(format!(
                "empty raster {width}x{height}"
            )));
        }
        let want = width as usize * height as usize * 3;
        if data.len() != want {
            return Err(EmbedError::InvalidImage(format!(
                "raster {width}x{height} needs {want} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A raster where every pixel has the same color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, EmbedError> {
        let n = width as usize * height as usize;
        Self::new(width, height, rgb.repeat(n))
    }

    /// Decode an encoded image file (PNG, JPEG) into RGB8.
    pub fn decode(bytes: &[u8]) -> Result<Self, EmbedError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| EmbedError::InvalidImage(e.to_string()))?;
        Ok(Self::from(img.to_rgb8()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// ITU-R BT.601 luma of every pixel, row-major.
    pub fn luma(&self) -> Vec<f32> {
        self.data
            .chunks_exact(3)
            .map(|p| 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32)
            .collect()
    }

    /// Encode the raster as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, EmbedError> {
        let buf = RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| EmbedError::InvalidImage("raster size mismatch".into()))?;
        let mut out = Cursor::new(Vec::new());
        buf.write_to(&mut out, ImageFormat::Png)
            .map_err(|e| EmbedError::InvalidImage(e.to_string()))?;
        Ok(out.into_inner())
    }
}

impl From<RgbImage> for Image {
    fn from(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}
