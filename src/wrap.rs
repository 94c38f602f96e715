use crate::font::FontMetrics;

/// Lines produced by [`wrap`], in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrappedText {
    lines: Vec<String>,
}

impl WrappedText {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for WrappedText {
    fn from(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

/// Greedy word wrap against a pixel width.
///
/// Tokens are whitespace-delimited and joined with a single space. A token
/// wider than `available_width_px` is kept whole on a line of its own.
/// Newlines force a break; blank paragraphs produce no line.
pub fn wrap(text: &str, available_width_px: f32, metrics: &FontMetrics) -> WrappedText {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for token in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(token);
                continue;
            }
            let candidate = format!("{} {}", current, token);
            if metrics.text_width(&candidate) <= available_width_px {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(token);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    WrappedText { lines }
}
