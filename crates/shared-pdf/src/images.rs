//! Raster images as PDF image XObjects

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GenericImageView, GrayImage};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::PdfError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRGB,
}

impl ColorSpace {
    fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
        }
    }
}

/// Flate-compressed 8-bit pixels, with the alpha channel split out as a soft mask
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    data: Vec<u8>,
    soft_mask: Option<Vec<u8>>,
}

impl EmbeddedImage {
    /// Decode PNG or JPEG bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, PdfError> {
        let img = image::load_from_memory(bytes).map_err(|e| PdfError::Image(e.to_string()))?;
        Self::from_dynamic(&img)
    }

    /// Wrap an already-rendered grayscale raster
    pub fn from_gray(img: &GrayImage) -> Result<Self, PdfError> {
        let (width, height) = img.dimensions();
        Self::build(width, height, ColorSpace::DeviceGray, img.as_raw(), None)
    }

    fn from_dynamic(img: &DynamicImage) -> Result<Self, PdfError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(PdfError::Image("Image has no pixels".to_string()));
        }

        let color = img.color();
        let has_alpha = color.has_alpha();
        let is_gray = color.channel_count() <= 2;

        match (is_gray, has_alpha) {
            (true, false) => {
                let gray = img.to_luma8();
                Self::build(width, height, ColorSpace::DeviceGray, gray.as_raw(), None)
            }
            (true, true) => {
                let la = img.to_luma_alpha8();
                let mut gray = Vec::with_capacity(la.len() / 2);
                let mut alpha = Vec::with_capacity(la.len() / 2);
                for pixel in la.pixels() {
                    gray.push(pixel.0[0]);
                    alpha.push(pixel.0[1]);
                }
                Self::build(width, height, ColorSpace::DeviceGray, &gray, Some(&alpha))
            }
            (false, false) => {
                let rgb = img.to_rgb8();
                Self::build(width, height, ColorSpace::DeviceRGB, rgb.as_raw(), None)
            }
            (false, true) => {
                let rgba = img.to_rgba8();
                let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
                let mut alpha = Vec::with_capacity(rgba.len() / 4);
                for pixel in rgba.pixels() {
                    rgb.extend_from_slice(&pixel.0[..3]);
                    alpha.push(pixel.0[3]);
                }
                Self::build(width, height, ColorSpace::DeviceRGB, &rgb, Some(&alpha))
            }
        }
    }

    fn build(
        width: u32,
        height: u32,
        color_space: ColorSpace,
        pixels: &[u8],
        alpha: Option<&[u8]>,
    ) -> Result<Self, PdfError> {
        // A fully opaque alpha channel needs no mask
        let alpha = alpha.filter(|a| a.iter().any(|&v| v != u8::MAX));
        Ok(Self {
            width,
            height,
            color_space,
            data: deflate(pixels)?,
            soft_mask: alpha.map(deflate).transpose()?,
        })
    }

    pub fn has_soft_mask(&self) -> bool {
        self.soft_mask.is_some()
    }

    /// Add the image (and its soft mask) to `doc`, returning the XObject id
    pub fn add_to(&self, doc: &mut Document) -> ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(self.width),
            "Height" => i64::from(self.height),
            "ColorSpace" => self.color_space.pdf_name(),
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };

        if let Some(mask) = &self.soft_mask {
            let mask_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(self.width),
                    "Height" => i64::from(self.height),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                mask.clone(),
            ));
            dict.set("SMask", Object::Reference(mask_id));
        }

        doc.add_object(Stream::new(dict, self.data.clone()))
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfError::Image(format!("Compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| PdfError::Image(format!("Compression failed: {}", e)))
}
