use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::{Artifact, BackendKind, PageSpec};
use crate::canvas::{Canvas, Color, TextSpec};
use crate::error::OverlayError;
use crate::font::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_LINE_SPACING, FontCache, FontLoader, FontMetrics,
    FontRequest, SystemFontLoader,
};
use crate::layout::layout;
use crate::render::{OutlineOffsets, OutlineSpec, render_outlined};
use crate::wrap::wrap;

pub const DEFAULT_FONT_FAMILY: &str = "Noto Sans Tamil";
/// Resolves to an installed face, or the builtin face when none exists.
pub const DEFAULT_FALLBACK_FAMILY: &str = "sans-serif";
pub const MIN_FONT_SIZE_PX: f32 = 12.0;
pub const SIZE_DIVISOR: f32 = 20.0;
pub const MAX_TEXT_WIDTH_FRACTION: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct ComposeOptions {
    pub font_family: String,
    /// Substituted once when `font_family` cannot be resolved.
    pub fallback_family: Option<String>,
    pub font_size_px: Option<f32>,
    pub outline_color: Color,
    pub outline_radius_px: f32,
    pub outline_offsets: OutlineOffsets,
    pub line_spacing: f32,
    pub max_text_width_fraction: f32,
    pub min_font_size_px: f32,
    pub size_divisor: f32,
    pub font_fetch_timeout: Duration,
    pub page: PageSpec,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            fallback_family: Some(DEFAULT_FALLBACK_FAMILY.to_string()),
            font_size_px: None,
            outline_color: Color::BLACK,
            outline_radius_px: 2.0,
            outline_offsets: OutlineOffsets::Eight,
            line_spacing: DEFAULT_LINE_SPACING,
            max_text_width_fraction: MAX_TEXT_WIDTH_FRACTION,
            min_font_size_px: MIN_FONT_SIZE_PX,
            size_divisor: SIZE_DIVISOR,
            font_fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            page: PageSpec::default(),
        }
    }
}

impl ComposeOptions {
    /// Explicit size from the request or the options, else
    /// `max(min_font_size, canvas_width / size_divisor)`.
    pub fn font_size_for(&self, canvas: &Canvas, spec: &TextSpec) -> f32 {
        let explicit = spec
            .font_size_px
            .or(self.font_size_px)
            .filter(|size| size.is_finite() && *size > 0.0);
        if let Some(size) = explicit {
            return size;
        }
        let divisor = if self.size_divisor > 0.0 {
            self.size_divisor
        } else {
            SIZE_DIVISOR
        };
        (canvas.width() as f32 / divisor).max(self.min_font_size_px)
    }

    pub fn outline(&self) -> OutlineSpec {
        OutlineSpec {
            color: self.outline_color,
            radius_px: self.outline_radius_px.max(0.0),
            offsets: self.outline_offsets,
        }
    }
}

/// Wires font resolution, wrapping, layout and rendering together. One
/// instance is shared by every request in the process.
pub struct Compositor {
    cache: Arc<FontCache>,
    loader: Arc<dyn FontLoader>,
}

impl Compositor {
    pub fn new(cache: Arc<FontCache>) -> Self {
        Self::with_loader(cache, Arc::new(SystemFontLoader::new()))
    }

    pub fn with_loader(cache: Arc<FontCache>, loader: Arc<dyn FontLoader>) -> Self {
        Self { cache, loader }
    }

    pub fn cache(&self) -> &FontCache {
        &self.cache
    }

    /// Produces exactly one artifact for the request, or an error and nothing.
    pub fn compose(
        &self,
        canvas: &Canvas,
        spec: &TextSpec,
        backend: BackendKind,
        options: &ComposeOptions,
    ) -> Result<Artifact, OverlayError> {
        canvas.validate()?;
        let mut target = backend.target(canvas, &options.page)?;
        if spec.is_blank() {
            debug!("no overlay text; composing {} canvas as-is", backend);
            return target.compose(canvas);
        }

        let size_px = options.font_size_for(canvas, spec);
        let family = spec
            .font_family
            .as_deref()
            .filter(|family| !family.trim().is_empty())
            .unwrap_or(&options.font_family);
        let metrics = self
            .resolve_metrics(family, size_px, options)?
            .with_line_spacing(options.line_spacing);

        let available = canvas.width() as f32 * options.max_text_width_fraction;
        let wrapped = wrap(&spec.text, available, &metrics);
        if wrapped.is_empty() {
            return target.compose(canvas);
        }
        let result = layout(canvas, &wrapped, &metrics);
        debug!(
            "laid out {} line(s) at {:.1}px in {:.1}x{:.1} block",
            result.lines.len(),
            size_px,
            result.bounds.width,
            result.bounds.height
        );
        render_outlined(
            target.as_mut(),
            &result,
            &metrics,
            spec.color,
            &options.outline(),
        );
        target.compose(canvas)
    }

    /// Like [`Compositor::compose`] with the backend given by name.
    pub fn compose_named(
        &self,
        canvas: &Canvas,
        spec: &TextSpec,
        backend: &str,
        options: &ComposeOptions,
    ) -> Result<Artifact, OverlayError> {
        canvas.validate()?;
        let backend = backend.parse::<BackendKind>()?;
        self.compose(canvas, spec, backend, options)
    }

    fn resolve_metrics(
        &self,
        family: &str,
        size_px: f32,
        options: &ComposeOptions,
    ) -> Result<FontMetrics, OverlayError> {
        let request = FontRequest::new(family).with_timeout(options.font_fetch_timeout);
        match self.cache.resolve(self.loader.as_ref(), &request, size_px) {
            Ok(metrics) => Ok(metrics),
            Err(err) => {
                let Some(fallback) = options
                    .fallback_family
                    .as_deref()
                    .filter(|fallback| !fallback.eq_ignore_ascii_case(family))
                else {
                    return Err(err);
                };
                warn!("{}; retrying with fallback font '{}'", err, fallback);
                let request = FontRequest::new(fallback).with_timeout(options.font_fetch_timeout);
                self.cache.resolve(self.loader.as_ref(), &request, size_px)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontFace;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    /// Serves the builtin face for allowed families and fails everything else.
    struct ScriptedLoader {
        available: Vec<String>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedLoader {
        fn new(available: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                available: available.iter().map(|name| name.to_string()).collect(),
                requested: Mutex::new(Vec::new()),
            })
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().expect("requested").clone()
        }
    }

    impl FontLoader for ScriptedLoader {
        fn load(&self, request: &FontRequest<'_>) -> Result<FontFace, OverlayError> {
            self.requested
                .lock()
                .expect("requested")
                .push(request.family.to_string());
            if self.available.iter().any(|name| name == request.family) {
                Ok(FontFace::builtin())
            } else {
                Err(OverlayError::font_unavailable(request.family, "network unreachable"))
            }
        }
    }

    fn canvas(width: u32, height: u32) -> Canvas {
        Canvas::from_rgba(RgbaImage::from_pixel(width, height, Rgba([30, 60, 90, 255])))
            .expect("canvas")
    }

    #[test]
    fn derived_font_size_has_a_floor() {
        let options = ComposeOptions::default();
        let spec = TextSpec::new("hi", Color::WHITE);
        assert_eq!(options.font_size_for(&canvas(100, 100), &spec), 12.0);
        assert_eq!(options.font_size_for(&canvas(800, 600), &spec), 40.0);
        let explicit = spec.clone().with_font_size(18.5);
        assert_eq!(options.font_size_for(&canvas(800, 600), &explicit), 18.5);
        let zero = spec.with_font_size(0.0);
        assert_eq!(options.font_size_for(&canvas(800, 600), &zero), 40.0);
    }

    #[test]
    fn falls_back_once_when_requested_font_fails() {
        let loader = ScriptedLoader::new(&[DEFAULT_FALLBACK_FAMILY]);
        let compositor = Compositor::with_loader(Arc::new(FontCache::new()), loader.clone());
        let spec = TextSpec::new("Hello", Color::WHITE)
            .with_font_family("https://fonts.example.com/tamil.ttf");
        let artifact = compositor
            .compose(
                &canvas(200, 100),
                &spec,
                BackendKind::RasterBuffer,
                &ComposeOptions::default(),
            )
            .expect("compose");
        assert_eq!(artifact.mime(), "image/png");
        assert_eq!(
            loader.requested(),
            vec!["https://fonts.example.com/tamil.ttf", DEFAULT_FALLBACK_FAMILY]
        );
    }

    #[test]
    fn fails_when_fallback_also_fails() {
        let loader = ScriptedLoader::new(&[]);
        let compositor = Compositor::with_loader(Arc::new(FontCache::new()), loader.clone());
        let spec = TextSpec::new("Hello", Color::WHITE);
        let err = compositor
            .compose(
                &canvas(200, 100),
                &spec,
                BackendKind::DocumentPage,
                &ComposeOptions::default(),
            )
            .unwrap_err();
        assert!(err.is_font_unavailable());
        assert_eq!(loader.requested(), vec![DEFAULT_FONT_FAMILY, DEFAULT_FALLBACK_FAMILY]);
    }

    #[test]
    fn blank_text_skips_font_resolution() {
        let loader = ScriptedLoader::new(&[]);
        let compositor = Compositor::with_loader(Arc::new(FontCache::new()), loader.clone());
        let canvas = canvas(32, 32);
        let artifact = compositor
            .compose(
                &canvas,
                &TextSpec::new("   ", Color::WHITE),
                BackendKind::RasterBuffer,
                &ComposeOptions::default(),
            )
            .expect("compose");
        assert_eq!(artifact, Artifact::Png(canvas.encode_png().expect("png")));
        assert!(loader.requested().is_empty());
    }

    #[test]
    fn unknown_backend_name_is_rejected_before_work() {
        let loader = ScriptedLoader::new(&["builtin"]);
        let compositor = Compositor::with_loader(Arc::new(FontCache::new()), loader.clone());
        let err = compositor
            .compose_named(
                &canvas(10, 10),
                &TextSpec::new("x", Color::WHITE),
                "gif",
                &ComposeOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err, OverlayError::UnsupportedBackend("gif".to_string()));
        assert!(loader.requested().is_empty());
    }

    #[test]
    fn warm_cache_skips_loader() {
        let loader = ScriptedLoader::new(&["builtin"]);
        let cache = Arc::new(FontCache::new());
        let compositor = Compositor::with_loader(cache.clone(), loader.clone());
        let options = ComposeOptions {
            font_family: "builtin".to_string(),
            ..ComposeOptions::default()
        };
        let spec = TextSpec::new("வணக்கம் 2024", Color::WHITE);
        for _ in 0..3 {
            compositor
                .compose(&canvas(300, 200), &spec, BackendKind::CssOverlay, &options)
                .expect("compose");
        }
        assert_eq!(loader.requested().len(), 1);
        assert_eq!(cache.len(), 1);
    }
}
