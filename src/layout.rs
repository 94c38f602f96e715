use crate::canvas::Canvas;
use crate::font::FontMetrics;
use crate::wrap::WrappedText;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// One wrapped line in canvas coordinates. `x` is the pen origin, `top` the
/// top of its line box.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePlacement {
    pub text: String,
    pub x: f32,
    pub top: f32,
    pub baseline: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    pub bounds: Rect,
    pub line_height: f32,
    pub lines: Vec<LinePlacement>,
}

/// Centers the wrapped block on the canvas and each line within the block.
///
/// A block larger than the canvas stays centered and overflows on every side;
/// there is no shrink-to-fit.
pub fn layout(canvas: &Canvas, wrapped: &WrappedText, metrics: &FontMetrics) -> LayoutResult {
    let canvas_w = canvas.width() as f32;
    let canvas_h = canvas.height() as f32;
    let line_height = metrics.line_height();
    let widths: Vec<f32> = wrapped.iter().map(|line| metrics.text_width(line)).collect();
    let block_w = widths.iter().copied().fold(0.0, f32::max);
    let block_h = wrapped.len() as f32 * line_height;
    let bounds = Rect {
        x: (canvas_w - block_w) * 0.5,
        y: (canvas_h - block_h) * 0.5,
        width: block_w,
        height: block_h,
    };

    let half_leading = (line_height - (metrics.ascent() + metrics.descent())) * 0.5;
    let lines = wrapped
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (text, width))| {
            let top = bounds.y + idx as f32 * line_height;
            LinePlacement {
                text: text.to_string(),
                x: bounds.x + (block_w - width) * 0.5,
                top,
                baseline: top + half_leading + metrics.ascent(),
                width,
            }
        })
        .collect();

    LayoutResult {
        bounds,
        line_height,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontFace;
    use crate::wrap::wrap;
    use std::sync::Arc;

    fn metrics(size: f32) -> FontMetrics {
        FontMetrics::new(Arc::new(FontFace::builtin()), size)
    }

    fn canvas(width: u32, height: u32) -> Canvas {
        Canvas::with_reference(width, height, "bg.png").expect("canvas")
    }

    #[test]
    fn block_is_centered_for_any_line_count() {
        let canvas = canvas(800, 600);
        let metrics = metrics(40.0);
        for count in 1..=8 {
            let lines: Vec<String> = (0..count).map(|idx| "word ".repeat(idx + 1)).collect();
            let wrapped = WrappedText::from(lines);
            let result = layout(&canvas, &wrapped, &metrics);
            let (cx, cy) = result.bounds.center();
            assert!((cx - 400.0).abs() <= 0.5, "cx {} for {} lines", cx, count);
            assert!((cy - 300.0).abs() <= 0.5, "cy {} for {} lines", cy, count);
            assert_eq!(result.lines.len(), count);
        }
    }

    #[test]
    fn lines_stack_downward_without_overlap() {
        let canvas = canvas(400, 400);
        let metrics = metrics(20.0).with_line_spacing(1.25);
        let wrapped = wrap("alpha beta gamma delta epsilon zeta eta theta", 120.0, &metrics);
        let result = layout(&canvas, &wrapped, &metrics);
        assert!(result.lines.len() > 1);
        for pair in result.lines.windows(2) {
            assert!(pair[1].top >= pair[0].top + result.line_height - 1e-3);
            assert!(pair[1].baseline > pair[0].baseline);
        }
        let last = result.lines.last().expect("last line");
        assert!((last.top + result.line_height - result.bounds.bottom()).abs() < 1e-3);
    }

    #[test]
    fn ragged_lines_center_individually() {
        let canvas = canvas(300, 200);
        let metrics = metrics(10.0);
        let wrapped = WrappedText::from(vec!["a".to_string(), "abcdef".to_string()]);
        let result = layout(&canvas, &wrapped, &metrics);
        for line in &result.lines {
            let center = line.x + line.width * 0.5;
            assert!((center - 150.0).abs() < 1e-3);
        }
        assert!(result.lines[0].x > result.lines[1].x);
    }

    #[test]
    fn oversized_block_overflows_but_stays_centered() {
        let canvas = canvas(100, 100);
        let metrics = metrics(12.0);
        let token = "m".repeat(60);
        let wrapped = wrap(&token, 90.0, &metrics);
        let result = layout(&canvas, &wrapped, &metrics);
        assert_eq!(result.lines.len(), 1);
        assert!(result.bounds.x < 0.0);
        assert!(result.bounds.right() > 100.0);
        let (cx, cy) = result.bounds.center();
        assert!((cx - 50.0).abs() <= 0.5);
        assert!((cy - 50.0).abs() <= 0.5);
    }

    #[test]
    fn baseline_sits_inside_line_box() {
        let canvas = canvas(800, 600);
        let metrics = metrics(40.0);
        let wrapped = WrappedText::from(vec!["Hello".to_string()]);
        let result = layout(&canvas, &wrapped, &metrics);
        let line = &result.lines[0];
        assert!(line.baseline > line.top);
        assert!(line.baseline < line.top + result.line_height);
        assert!((line.baseline - 312.0).abs() < 1e-3);
    }
}
