use crate::color::Color3;
use crate::error::{Error, Result};
use crate::utils::clamp;

use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder};
use std::fs::OpenOptions;
use std::path::Path;

/// Row-major HDR RGB image. EXR files round-trip linearly; 8-bit
/// sources are converted from sRGB on load and PNG output applies the
/// forward curve when tonemapping is requested.
pub struct Bitmap {
    width: usize,
    height: usize,
    data: Vec<Color3>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Bitmap {
        let mut data = Vec::new();
        data.resize_with(width * height, Color3::black);
        Bitmap {
            width,
            height,
            data,
        }
    }

    pub fn from_pixels(width: usize, height: usize, data: Vec<Color3>) -> Result<Bitmap> {
        if data.len() != width * height {
            return Err(Error::Config(format!(
                "Bitmap data length {} does not match {}x{}.",
                data.len(),
                width,
                height
            )));
        }
        Ok(Bitmap {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Color3 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: Color3) {
        self.data[y * self.width + x] = value;
    }

    pub fn load(path: &Path) -> Result<Bitmap> {
        let img = image::open(path)?;
        // Float formats are already linear; everything else is assumed
        // to be sRGB-encoded.
        let is_linear = match &img {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => true,
            _ => false,
        };
        let rgb = img.to_rgb32f();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let mut data = Vec::with_capacity(width * height);
        for pixel in rgb.pixels() {
            let c = Color3::new(pixel.0[0], pixel.0[1], pixel.0[2]);
            data.push(if is_linear { c } else { c.to_linear() });
        }
        Bitmap::from_pixels(width, height, data)
    }

    pub fn save_exr(&self, path: &Path) -> Result<()> {
        let mut raw = Vec::with_capacity(self.data.len() * 3);
        for c in &self.data {
            raw.push(c.r());
            raw.push(c.g());
            raw.push(c.b());
        }
        let buffer =
            image::Rgb32FImage::from_raw(self.width as u32, self.height as u32, raw)
                .ok_or_else(|| Error::Config(String::from("Bitmap buffer size mismatch.")))?;
        buffer.save_with_format(path, image::ImageFormat::OpenExr)?;
        Ok(())
    }

    pub fn save_png(&self, path: &Path, tonemap: bool) -> Result<()> {
        let mut raw = Vec::with_capacity(self.data.len() * 3);
        for c in &self.data {
            let c = if tonemap { c.to_srgb() } else { *c };
            raw.push((clamp(c.r(), 0.0_f32, 1.0_f32) * 255.0_f32 + 0.5_f32) as u8);
            raw.push((clamp(c.g(), 0.0_f32, 1.0_f32) * 255.0_f32 + 0.5_f32) as u8);
            raw.push((clamp(c.b(), 0.0_f32, 1.0_f32) * 255.0_f32 + 0.5_f32) as u8);
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        PngEncoder::new(file).write_image(
            &raw,
            self.width as u32,
            self.height as u32,
            ColorType::Rgb8,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pixels_validates_dimensions() {
        assert!(Bitmap::from_pixels(2, 2, vec![Color3::black(); 3]).is_err());
        let bm = Bitmap::from_pixels(2, 1, vec![Color3::white(), Color3::black()]).unwrap();
        assert_eq!(bm.get(0, 0), Color3::white());
        assert_eq!(bm.get(1, 0), Color3::black());
    }
}
