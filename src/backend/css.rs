use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::Artifact;
use crate::canvas::{Canvas, Color};
use crate::error::OverlayError;
use crate::font::{FontMetrics, FontSource};
use crate::render::{DrawText, OutlineSpec, OutlineStyle, RenderTarget};

/// Responsive HTML preview. Positions are percentages of the canvas and sizes
/// are `vw`, so the overlay scales with the page width.
///
/// Outlines become `text-shadow` lists instead of literal offset draws; this is
/// the one place where the preview differs visually from the raster output.
pub struct CssOverlayTarget {
    width: f32,
    height: f32,
    font_face: Option<FontFaceRule>,
    lines: Vec<CssLine>,
}

struct FontFaceRule {
    family: String,
    src: String,
}

/// `center` is the horizontal middle of the line; the browser centers the
/// line box on it with its own font metrics.
struct CssLine {
    center: f32,
    top: f32,
    font_size: f32,
    color: Color,
    shadow: Option<String>,
    family: String,
    text: String,
}

impl CssOverlayTarget {
    pub fn new(canvas: &Canvas) -> Self {
        Self {
            width: canvas.width() as f32,
            height: canvas.height() as f32,
            font_face: None,
            lines: Vec::new(),
        }
    }

    fn vw(&self, px: f32) -> f32 {
        px / self.width * 100.0
    }

    fn text_shadow(&self, outline: &OutlineSpec) -> Option<String> {
        let shadows: Vec<String> = outline
            .offset_vectors()
            .into_iter()
            .map(|(dx, dy)| {
                format!(
                    "{}vw {}vw 0 {}",
                    fmt_num(self.vw(dx)),
                    fmt_num(self.vw(dy)),
                    outline.color.to_hex()
                )
            })
            .collect();
        if shadows.is_empty() {
            None
        } else {
            Some(shadows.join(", "))
        }
    }

    fn remember_font(&mut self, font: &FontMetrics) {
        if self.font_face.is_some() {
            return;
        }
        let face = font.face();
        let src = match face.source() {
            FontSource::Remote(url) => Some(format!("url('{}')", escape_css_string(url))),
            FontSource::File(_) | FontSource::System(_) => face.data().map(|data| {
                format!(
                    "url('data:{};base64,{}')",
                    font_mime(data),
                    BASE64.encode(data)
                )
            }),
            FontSource::Builtin => None,
        };
        if let Some(src) = src {
            self.font_face = Some(FontFaceRule {
                family: face.family().to_string(),
                src,
            });
        }
    }
}

impl RenderTarget for CssOverlayTarget {
    fn outline_style(&self) -> OutlineStyle {
        OutlineStyle::Shadow
    }

    fn draw_text(&mut self, draw: &DrawText<'_>) {
        self.remember_font(draw.font);
        // with line-height 1 the browser puts the baseline half the leftover
        // em below the ascent line
        let size = draw.font.size_px();
        let top = draw.y - (size + draw.font.ascent() - draw.font.descent()) * 0.5;
        let center = draw.x + draw.font.text_width(draw.text) * 0.5;
        let family = if draw.font.face().is_builtin() {
            "sans-serif".to_string()
        } else {
            format!("'{}', sans-serif", escape_css_string(draw.font.family()))
        };
        let line = CssLine {
            center: center / self.width * 100.0,
            top: top / self.height * 100.0,
            font_size: self.vw(size),
            color: draw.color,
            shadow: draw.shadow.and_then(|outline| self.text_shadow(outline)),
            family,
            text: draw.text.to_string(),
        };
        self.lines.push(line);
    }

    fn compose(self: Box<Self>, canvas: &Canvas) -> Result<Artifact, OverlayError> {
        let background = match canvas.reference() {
            Some(url) => url.to_string(),
            None => format!(
                "data:image/png;base64,{}",
                BASE64.encode(canvas.encode_png()?)
            ),
        };

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<style>\n");
        html.push_str("html, body { margin: 0; padding: 0; }\n");
        if let Some(rule) = &self.font_face {
            html.push_str(&format!(
                "@font-face {{ font-family: '{}'; src: {}; }}\n",
                escape_css_string(&rule.family),
                rule.src
            ));
        }
        html.push_str(&format!(
            ".overlay-canvas {{ position: relative; width: 100vw; aspect-ratio: {} / {}; background-image: url('{}'); background-size: 100% 100%; background-repeat: no-repeat; }}\n",
            fmt_num(self.width),
            fmt_num(self.height),
            escape_css_string(&background)
        ));
        html.push_str(
            ".overlay-line { position: absolute; margin: 0; line-height: 1; white-space: pre; transform: translateX(-50%); }\n",
        );
        html.push_str("</style>\n</head>\n<body>\n<div class=\"overlay-canvas\">\n");
        for line in &self.lines {
            let mut style = format!(
                "left: {}%; top: {}%; font-size: {}vw; font-family: {}; color: {};",
                fmt_num(line.center),
                fmt_num(line.top),
                fmt_num(line.font_size),
                line.family,
                line.color.to_hex()
            );
            if let Some(shadow) = &line.shadow {
                style.push_str(&format!(" text-shadow: {};", shadow));
            }
            html.push_str(&format!(
                "<div class=\"overlay-line\" style=\"{}\">{}</div>\n",
                escape_html(&style),
                escape_html(&line.text)
            ));
        }
        html.push_str("</div>\n</body>\n</html>\n");
        Ok(Artifact::Markup(html))
    }
}

fn font_mime(data: &[u8]) -> &'static str {
    match data.get(..4) {
        Some(b"OTTO") => "font/otf",
        Some(b"ttcf") => "font/collection",
        Some(b"wOFF") => "font/woff",
        Some(b"wOF2") => "font/woff2",
        _ => "font/ttf",
    }
}

/// Four decimals, trailing zeros trimmed.
fn fmt_num(value: f32) -> String {
    let text = format!("{:.4}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" || text.is_empty() {
        "0".to_string()
    } else {
        text.to_string()
    }
}

fn escape_css_string(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', " ")
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{FontFace, FontLoader, FontRequest, SystemFontLoader};
    use std::sync::Arc;

    fn markup(target: Box<CssOverlayTarget>, canvas: &Canvas) -> String {
        let Artifact::Markup(html) = target.compose(canvas).expect("compose") else {
            panic!("expected markup");
        };
        html
    }

    #[test]
    fn formats_numbers_compactly() {
        assert_eq!(fmt_num(46.7), "46.7");
        assert_eq!(fmt_num(6.0), "6");
        assert_eq!(fmt_num(-0.00001), "0");
        assert_eq!(fmt_num(-1.0), "-1");
        assert_eq!(fmt_num(33.333333), "33.3333");
    }

    #[test]
    fn escapes_markup_in_text() {
        let canvas = Canvas::with_reference(100, 50, "bg.png").expect("canvas");
        let metrics = FontMetrics::new(Arc::new(FontFace::builtin()), 10.0);
        let mut target = Box::new(CssOverlayTarget::new(&canvas));
        target.draw_text(&DrawText {
            x: 10.0,
            y: 20.0,
            text: "<b>Tom & ஜெர்ரி</b>",
            color: Color::WHITE,
            font: &metrics,
            shadow: None,
        });
        let Artifact::Markup(html) = target.compose(&canvas).expect("compose") else {
            panic!("expected markup");
        };
        assert!(html.contains("&lt;b&gt;Tom &amp; ஜெர்ரி&lt;/b&gt;"));
        assert!(!html.contains("text-shadow"));
        assert!(html.contains("url('bg.png')"));
    }

    #[test]
    fn lines_are_centered_by_the_browser() {
        let canvas = Canvas::with_reference(400, 100, "bg.png").expect("canvas");
        let metrics = FontMetrics::new(Arc::new(FontFace::builtin()), 20.0);
        let width = metrics.text_width("Centered line");
        let mut target = Box::new(CssOverlayTarget::new(&canvas));
        target.draw_text(&DrawText {
            x: (400.0 - width) * 0.5,
            y: 60.0,
            text: "Centered line",
            color: Color::WHITE,
            font: &metrics,
            shadow: None,
        });
        let html = markup(target, &canvas);
        assert!(html.contains("transform: translateX(-50%)"));
        assert!(html.contains("style=\"left: 50%; top: 44%;"), "{}", html);
        assert!(!html.contains("width: "));
    }

    #[test]
    fn installed_faces_are_embedded() {
        let face = SystemFontLoader::new()
            .load(&FontRequest::new("sans-serif"))
            .expect("sans-serif");
        if face.is_builtin() {
            return;
        }
        let family = face.family().to_string();
        let metrics = FontMetrics::new(Arc::new(face), 16.0);
        let canvas = Canvas::with_reference(200, 100, "bg.png").expect("canvas");
        let mut target = Box::new(CssOverlayTarget::new(&canvas));
        target.draw_text(&DrawText {
            x: 20.0,
            y: 50.0,
            text: "Hi",
            color: Color::WHITE,
            font: &metrics,
            shadow: None,
        });
        let html = markup(target, &canvas);
        assert!(
            html.contains(&format!("@font-face {{ font-family: '{}'; src: url('data:font/", family)),
            "{}",
            &html[..html.len().min(400)]
        );
        assert!(html.contains(&format!("font-family: '{}', sans-serif", family)));
    }

    #[test]
    fn font_mime_follows_the_file_signature() {
        assert_eq!(font_mime(b"OTTO\0\0"), "font/otf");
        assert_eq!(font_mime(b"ttcf\0\0"), "font/collection");
        assert_eq!(font_mime(&[0, 1, 0, 0, 0]), "font/ttf");
    }

    #[test]
    fn embeds_pixels_when_no_reference() {
        let canvas = Canvas::from_rgba(image::RgbaImage::new(4, 4)).expect("canvas");
        let target = Box::new(CssOverlayTarget::new(&canvas));
        let Artifact::Markup(html) = target.compose(&canvas).expect("compose") else {
            panic!("expected markup");
        };
        assert!(html.contains("url('data:image/png;base64,"));
        assert!(html.contains("aspect-ratio: 4 / 4"));
    }
}
