use serde::{Deserialize, Serialize};

/// A point in PDF user space (origin bottom-left, units of 1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Shift the point by a delta
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Page bounds as read from a page's MediaBox
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageBox {
    /// A box with its origin at (0, 0)
    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    /// US Letter, the fallback when a page declares no MediaBox
    pub fn letter() -> Self {
        Self::sized(612.0, 792.0)
    }

    /// Same size with the origin moved back to (0, 0)
    pub fn at_origin(&self) -> Self {
        Self::sized(self.width, self.height)
    }

    /// Convert an absolute page-space point into box-relative space
    pub fn relative(&self, point: Point) -> Point {
        Point::new(point.x - self.x, point.y - self.y)
    }

    pub fn has_origin_offset(&self) -> bool {
        self.x != 0.0 || self.y != 0.0
    }
}

/// Typeface chosen by the signer for typed names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    #[default]
    Default,
    Handwritten,
    Serif,
    SimpleScript,
}

impl FontStyle {
    /// Parse a form value. Accepts the legacy Portuguese form values alongside
    /// the English names; anything unknown maps to `Default`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "manuscrita" | "handwritten" => FontStyle::Handwritten,
            "serif" => FontStyle::Serif,
            "cursiva_simples" | "simple_script" | "simple-script" => FontStyle::SimpleScript,
            _ => FontStyle::Default,
        }
    }
}
