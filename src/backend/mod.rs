mod css;
mod document;
mod raster;

use std::fmt;
use std::str::FromStr;

use crate::canvas::Canvas;
use crate::error::OverlayError;
use crate::render::RenderTarget;

pub use css::CssOverlayTarget;
pub use document::{DocumentTarget, PagePlacement, PageSpec};
pub use raster::RasterTarget;

pub const HTML_MIME: &str = "text/html; charset=utf-8";
pub const PNG_MIME: &str = "image/png";
pub const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    CssOverlay,
    RasterBuffer,
    DocumentPage,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::CssOverlay => "css",
            BackendKind::RasterBuffer => "raster",
            BackendKind::DocumentPage => "document",
        }
    }

    pub(crate) fn target(
        self,
        canvas: &Canvas,
        page: &PageSpec,
    ) -> Result<Box<dyn RenderTarget>, OverlayError> {
        let target: Box<dyn RenderTarget> = match self {
            BackendKind::CssOverlay => Box::new(CssOverlayTarget::new(canvas)),
            BackendKind::RasterBuffer => Box::new(RasterTarget::new(canvas)?),
            BackendKind::DocumentPage => Box::new(DocumentTarget::new(canvas, page.clone())?),
        };
        Ok(target)
    }
}

impl FromStr for BackendKind {
    type Err = OverlayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "css" | "html" | "css-overlay" | "preview" => Ok(BackendKind::CssOverlay),
            "raster" | "png" | "image" | "raster-buffer" => Ok(BackendKind::RasterBuffer),
            "document" | "pdf" | "page" | "document-page" => Ok(BackendKind::DocumentPage),
            _ => Err(OverlayError::UnsupportedBackend(value.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finished output of one compose call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Markup(String),
    Png(Vec<u8>),
    Pdf(Vec<u8>),
}

impl Artifact {
    pub fn mime(&self) -> &'static str {
        match self {
            Artifact::Markup(_) => HTML_MIME,
            Artifact::Png(_) => PNG_MIME,
            Artifact::Pdf(_) => PDF_MIME,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Artifact::Markup(_) => "html",
            Artifact::Png(_) => "png",
            Artifact::Pdf(_) => "pdf",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Artifact::Markup(markup) => markup.as_bytes(),
            Artifact::Png(bytes) | Artifact::Pdf(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Artifact::Markup(markup) => markup.into_bytes(),
            Artifact::Png(bytes) | Artifact::Pdf(bytes) => bytes,
        }
    }
}
