/// Failures reported by [`crate::Compositor::compose`].
///
/// Overflowing text blocks and glyphs missing from the chosen font are not
/// errors; they degrade visibly instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OverlayError {
    #[error("font unavailable: {family} ({reason})")]
    FontUnavailable { family: String, reason: String },

    #[error("invalid canvas: {0}")]
    InvalidCanvas(String),

    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("failed to export artifact: {0}")]
    Export(String),
}

impl OverlayError {
    pub(crate) fn font_unavailable(family: &str, reason: impl Into<String>) -> Self {
        Self::FontUnavailable {
            family: family.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_font_unavailable(&self) -> bool {
        matches!(self, Self::FontUnavailable { .. })
    }
}
