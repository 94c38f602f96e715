use crate::backend::Artifact;
use crate::canvas::{Canvas, Color};
use crate::error::OverlayError;
use crate::font::FontMetrics;
use crate::layout::LayoutResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlineOffsets {
    Four,
    #[default]
    Eight,
}

impl OutlineOffsets {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "four" | "4" => Some(Self::Four),
            "eight" | "8" => Some(Self::Eight),
            _ => None,
        }
    }
}

/// Outline drawn behind the fill: repeated draws around the glyph position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineSpec {
    pub color: Color,
    pub radius_px: f32,
    pub offsets: OutlineOffsets,
}

impl Default for OutlineSpec {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            radius_px: 2.0,
            offsets: OutlineOffsets::Eight,
        }
    }
}

impl OutlineSpec {
    pub fn offset_vectors(&self) -> Vec<(f32, f32)> {
        let r = self.radius_px;
        if r <= 0.0 {
            return Vec::new();
        }
        match self.offsets {
            OutlineOffsets::Four => vec![(0.0, -r), (-r, 0.0), (r, 0.0), (0.0, r)],
            OutlineOffsets::Eight => vec![
                (-r, -r),
                (0.0, -r),
                (r, -r),
                (-r, 0.0),
                (r, 0.0),
                (-r, r),
                (0.0, r),
                (r, r),
            ],
        }
    }
}

/// How a target wants outlines delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineStyle {
    /// One draw per offset vector, then the fill.
    OffsetDraws,
    /// A single draw per line carrying the outline as a shadow description.
    Shadow,
}

/// A single text draw at absolute canvas coordinates; `y` is the baseline.
#[derive(Debug, Clone, Copy)]
pub struct DrawText<'a> {
    pub x: f32,
    pub y: f32,
    pub text: &'a str,
    pub color: Color,
    pub font: &'a FontMetrics,
    pub shadow: Option<&'a OutlineSpec>,
}

/// Output surface for one compose call. Targets copy what they need from the
/// canvas and never modify it.
pub trait RenderTarget {
    fn outline_style(&self) -> OutlineStyle {
        OutlineStyle::OffsetDraws
    }

    fn draw_text(&mut self, draw: &DrawText<'_>);

    fn compose(self: Box<Self>, canvas: &Canvas) -> Result<Artifact, OverlayError>;
}

/// Paints every laid-out line: outline first, fill last, so the fill is always
/// on top.
pub fn render_outlined(
    target: &mut dyn RenderTarget,
    layout: &LayoutResult,
    metrics: &FontMetrics,
    fill: Color,
    outline: &OutlineSpec,
) {
    match target.outline_style() {
        OutlineStyle::Shadow => {
            for line in &layout.lines {
                target.draw_text(&DrawText {
                    x: line.x,
                    y: line.baseline,
                    text: &line.text,
                    color: fill,
                    font: metrics,
                    shadow: Some(outline),
                });
            }
        }
        OutlineStyle::OffsetDraws => {
            let offsets = outline.offset_vectors();
            for line in &layout.lines {
                for (dx, dy) in &offsets {
                    target.draw_text(&DrawText {
                        x: line.x + dx,
                        y: line.baseline + dy,
                        text: &line.text,
                        color: outline.color,
                        font: metrics,
                        shadow: None,
                    });
                }
                target.draw_text(&DrawText {
                    x: line.x,
                    y: line.baseline,
                    text: &line.text,
                    color: fill,
                    font: metrics,
                    shadow: None,
                });
            }
        }
    }
}
