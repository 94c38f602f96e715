use image::{Rgba, RgbaImage};
use tiny_skia::{
    FillRule, Paint, Path, PathBuilder, Pixmap, PremultipliedColorU8, Rect, Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder};

use super::Artifact;
use crate::canvas::{Canvas, Color, encode_png};
use crate::error::OverlayError;
use crate::render::{DrawText, RenderTarget};

/// Draws glyph outlines onto a transparent layer that is blended over the
/// canvas pixels at the end. Pixels the text never touches keep their bytes.
pub struct RasterTarget {
    overlay: Pixmap,
    draws: usize,
}

impl RasterTarget {
    pub fn new(canvas: &Canvas) -> Result<Self, OverlayError> {
        canvas.require_pixels()?;
        let overlay = Pixmap::new(canvas.width(), canvas.height()).ok_or_else(|| {
            OverlayError::InvalidCanvas(format!(
                "cannot allocate {}x{} pixmap",
                canvas.width(),
                canvas.height()
            ))
        })?;
        Ok(Self { overlay, draws: 0 })
    }

    /// The composited pixels as straight RGBA.
    pub(crate) fn into_image(self, canvas: &Canvas) -> Result<RgbaImage, OverlayError> {
        let mut image = canvas.require_pixels()?.clone();
        if self.draws == 0 {
            return Ok(image);
        }
        for (dst, src) in image.pixels_mut().zip(self.overlay.pixels()) {
            if src.alpha() > 0 {
                blend_over(dst, *src);
            }
        }
        Ok(image)
    }

    fn fill_glyph_outlines(&mut self, draw: &DrawText<'_>, origin_x: f32, origin_y: f32) {
        let paint = paint_for(draw.color);
        let face = draw.font.face();
        let size = draw.font.size_px();
        let placements = face.place_glyphs(draw.text, size);
        let pixmap = &mut self.overlay;
        let drawn = face.with_parsed(|parsed| {
            let scale = size / parsed.units_per_em().max(1) as f32;
            for glyph in placements.iter().filter(|glyph| !glyph.ch.is_whitespace()) {
                let mut builder = GlyphPathBuilder::new(origin_x + glyph.x, origin_y, scale);
                if parsed
                    .outline_glyph(GlyphId(glyph.glyph_id), &mut builder)
                    .is_none()
                {
                    continue;
                }
                if let Some(path) = builder.finish() {
                    pixmap.fill_path(
                        &path,
                        &paint,
                        FillRule::Winding,
                        Transform::identity(),
                        None,
                    );
                }
            }
        });
        if drawn.is_none() {
            self.fill_placeholder_boxes(draw, origin_x, origin_y);
        }
    }

    /// The builtin face has no outlines; every visible character becomes a box.
    fn fill_placeholder_boxes(&mut self, draw: &DrawText<'_>, origin_x: f32, origin_y: f32) {
        let paint = paint_for(draw.color);
        let size = draw.font.size_px();
        let box_height = size * 0.7;
        for glyph in draw.font.face().place_glyphs(draw.text, size) {
            if glyph.ch.is_whitespace() {
                continue;
            }
            let inset = glyph.advance * 0.1;
            if let Some(rect) = Rect::from_xywh(
                origin_x + glyph.x + inset,
                origin_y - box_height,
                glyph.advance - inset * 2.0,
                box_height,
            ) {
                self.overlay
                    .fill_rect(rect, &paint, Transform::identity(), None);
            }
        }
    }
}

impl RenderTarget for RasterTarget {
    fn draw_text(&mut self, draw: &DrawText<'_>) {
        if draw.text.is_empty() || draw.color.a == 0 {
            return;
        }
        self.draws += 1;
        self.fill_glyph_outlines(draw, draw.x.round(), draw.y.round());
    }

    fn compose(self: Box<Self>, canvas: &Canvas) -> Result<Artifact, OverlayError> {
        if self.draws == 0 {
            return canvas.encode_png().map(Artifact::Png);
        }
        let image = self.into_image(canvas)?;
        encode_png(&image).map(Artifact::Png)
    }
}

fn paint_for(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

/// Source-over of a premultiplied overlay pixel onto a straight-alpha pixel.
fn blend_over(dst: &mut Rgba<u8>, src: PremultipliedColorU8) {
    let src_alpha = src.alpha() as f32 / 255.0;
    let dst_alpha = dst.0[3] as f32 / 255.0;
    let keep = dst_alpha * (1.0 - src_alpha);
    let out_alpha = src_alpha + keep;
    if out_alpha <= 0.0 {
        return;
    }
    let channel = |src: u8, dst: u8| {
        let value = (src as f32 / 255.0 + dst as f32 / 255.0 * keep) / out_alpha;
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    };
    let [r, g, b, _] = dst.0;
    *dst = Rgba([
        channel(src.red(), r),
        channel(src.green(), g),
        channel(src.blue(), b),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ]);
}

/// Maps font units (y up) to pixmap pixels (y down) around a baseline origin.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x, y) = self.point(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x2, y2) = self.point(x2, y2);
        let (x, y) = self.point(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
