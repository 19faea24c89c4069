//! Decoded tile images.

use image::ImageReader;
use std::io::Cursor;

use crate::errors::FetchError;

/// RGBA8 pixels of one tile, row-major from the top-left
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TileImage {
    /// Decode PNG or JPEG bytes, whatever the file extension claimed.
    pub fn decode(bytes: &[u8]) -> Result<Self, FetchError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        let image = reader
            .decode()
            .map_err(|e| FetchError::Decode(e.to_string()))?
            .to_rgba8();
        Ok(Self {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        })
    }

    /// RGBA of the pixel at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let px = self.rgba.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn encode(image: &RgbaImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let tile = TileImage::decode(&encode(&img, ImageFormat::Png)).unwrap();
        assert_eq!((tile.width, tile.height), (2, 2));
        assert_eq!(tile.pixel(1, 0), Some([10, 20, 30, 255]));
        assert_eq!(tile.pixel(2, 0), None);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            TileImage::decode(b"<html>rate limited</html>"),
            Err(FetchError::Decode(_))
        ));
        assert!(matches!(TileImage::decode(&[]), Err(FetchError::Decode(_))));
    }
}
