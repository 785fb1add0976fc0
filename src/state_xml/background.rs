//! Background images stored inline in the state document
//!
//! Images of any format the `image` crate understands are normalized to PNG
//! and embedded as base64 text. Re-encoding means byte identity is not kept,
//! only the decoded pixels.

use crate::error::Result;
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// A decoded image, kept PNG-encoded for persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl BackgroundImage {
    /// Decode an encoded image (PNG, JPEG, ...) and normalize it to PNG
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Self::from_image(&decoded)
    }

    pub fn from_image(img: &DynamicImage) -> Result<Self> {
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(Self {
            png,
            width: img.width(),
            height: img.height(),
        })
    }

    /// Restore from the base64 text written by [`to_base64`](Self::to_base64)
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = general_purpose::STANDARD.decode(text.trim())?;
        Self::from_encoded(&bytes)
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.png)
    }

    pub fn decode(&self) -> Result<DynamicImage> {
        Ok(image::load_from_memory_with_format(&self.png, ImageFormat::Png)?)
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

#[cfg(test)]
pub(crate) fn test_image(width: u32, height: u32) -> DynamicImage {
    let mut img = image::RgbaImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = image::Rgba([(x * 40) as u8, (y * 40) as u8, 128, 255]);
    }
    DynamicImage::ImageRgba8(img)
}
