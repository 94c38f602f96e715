use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, RgbaImage};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use crate::error::OverlayError;

/// The surface text is composited onto.
///
/// Raster and document output need decoded pixels; the CSS preview can work
/// from a background reference alone.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    source: CanvasSource,
}

#[derive(Debug, Clone)]
enum CanvasSource {
    Pixels(RgbaImage),
    Reference(String),
}

impl Canvas {
    pub fn from_rgba(image: RgbaImage) -> Result<Self, OverlayError> {
        let (width, height) = image.dimensions();
        check_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            source: CanvasSource::Pixels(image),
        })
    }

    pub fn from_image(image: DynamicImage) -> Result<Self, OverlayError> {
        Self::from_rgba(image.into_rgba8())
    }

    pub fn with_reference(
        width: u32,
        height: u32,
        reference: impl Into<String>,
    ) -> Result<Self, OverlayError> {
        check_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            source: CanvasSource::Reference(reference.into()),
        })
    }

    /// Decodes uploaded image bytes (png/jpeg/...) into a canvas.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).with_context(|| "failed to decode image")?;
        Self::from_image(image).map_err(|err| anyhow!(err))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        match &self.source {
            CanvasSource::Pixels(image) => Some(image),
            CanvasSource::Reference(_) => None,
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match &self.source {
            CanvasSource::Pixels(_) => None,
            CanvasSource::Reference(url) => Some(url),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), OverlayError> {
        check_dimensions(self.width, self.height)
    }

    pub(crate) fn require_pixels(&self) -> Result<&RgbaImage, OverlayError> {
        self.pixels().ok_or_else(|| {
            OverlayError::InvalidCanvas("canvas has no decoded pixels to draw on".to_string())
        })
    }

    /// PNG encoding of the untouched canvas pixels.
    pub(crate) fn encode_png(&self) -> Result<Vec<u8>, OverlayError> {
        encode_png(self.require_pixels()?)
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), OverlayError> {
    if width == 0 || height == 0 {
        return Err(OverlayError::InvalidCanvas(format!(
            "dimensions must be positive, got {}x{}",
            width, height
        )));
    }
    Ok(())
}

pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, OverlayError> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|err| OverlayError::Export(format!("failed to encode png: {}", err)))?;
    Ok(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| anyhow!("invalid hex color '{}'", value));
        }
        let lower = trimmed.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_functional(args).ok_or_else(|| anyhow!("invalid rgb color '{}'", value));
        }
        named_color(&lower).ok_or_else(|| anyhow!("unknown color '{}'", value))
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |idx: usize| u8::from_str_radix(&hex[idx..idx + 1], 16).ok().map(|v| v * 17);
    let byte = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Color::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_functional(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |value: &str| value.parse::<u8>().ok();
    let alpha = match parts.get(3) {
        Some(value) => {
            let alpha = value.parse::<f32>().ok()?;
            if !(0.0..=1.0).contains(&alpha) {
                return None;
            }
            (alpha * 255.0).round() as u8
        }
        None => 255,
    };
    Some(Color::rgba(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ))
}

fn named_color(name: &str) -> Option<Color> {
    let color = match name {
        "white" => Color::WHITE,
        "black" => Color::BLACK,
        "red" => Color::rgb(255, 0, 0),
        "green" => Color::rgb(0, 128, 0),
        "blue" => Color::rgb(0, 0, 255),
        "yellow" => Color::rgb(255, 255, 0),
        "orange" => Color::rgb(255, 165, 0),
        "gray" | "grey" => Color::rgb(128, 128, 128),
        "transparent" => Color::rgba(0, 0, 0, 0),
        _ => return None,
    };
    Some(color)
}

/// What to write and how: the caller-supplied half of a compose request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpec {
    pub text: String,
    pub color: Color,
    pub font_family: Option<String>,
    pub font_size_px: Option<f32>,
}

impl TextSpec {
    pub fn new(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
            font_family: None,
            font_size_px: None,
        }
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn with_font_size(mut self, size_px: f32) -> Self {
        self.font_size_px = Some(size_px);
        self
    }

    /// Blank text means there is nothing to overlay.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
