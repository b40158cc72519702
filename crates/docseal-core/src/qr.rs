//! Scannable verification codes

use image::{GrayImage, Luma};
use qrcode::{EcLevel, QrCode};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Failed to encode scannable code: {0}")]
pub struct CodeError(String);

/// Renders a payload into a black-on-white raster
pub trait ScannableCodeGenerator: Send + Sync {
    /// `cell_size` is the pixel size of one module, `border` the quiet zone in modules
    fn generate(&self, payload: &str, cell_size: u32, border: u32) -> Result<GrayImage, CodeError>;
}

/// QR code generator (error correction level M)
#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeGenerator;

impl ScannableCodeGenerator for QrCodeGenerator {
    fn generate(&self, payload: &str, cell_size: u32, border: u32) -> Result<GrayImage, CodeError> {
        let code = QrCode::with_error_correction_level(payload, EcLevel::M)
            .map_err(|e| CodeError(e.to_string()))?;

        let cell_size = cell_size.max(1);
        let modules = code.width() as u32;
        let size = (modules + border * 2) * cell_size;
        let offset = border * cell_size;

        let mut img = GrayImage::from_pixel(size, size, Luma([255]));
        for (row, cells) in code.to_colors().chunks(modules as usize).enumerate() {
            for (col, &cell) in cells.iter().enumerate() {
                if cell != qrcode::Color::Dark {
                    continue;
                }
                let x0 = offset + col as u32 * cell_size;
                let y0 = offset + row as u32 * cell_size;
                for dy in 0..cell_size {
                    for dx in 0..cell_size {
                        img.put_pixel(x0 + dx, y0 + dy, Luma([0]));
                    }
                }
            }
        }

        Ok(img)
    }
}
