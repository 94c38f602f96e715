use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub mod backend;
pub mod canvas;
pub mod compose;
mod error;
pub mod font;
pub mod layout;
pub mod logging;
pub mod render;
pub mod server;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod wrap;

pub use backend::{Artifact, BackendKind, PageSpec};
pub use canvas::{Canvas, Color, TextSpec};
pub use compose::{ComposeOptions, Compositor};
pub use error::OverlayError;
pub use font::{FontCache, FontLoader, FontMetrics, FontRequest, SystemFontLoader};

/// One command line invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub image: PathBuf,
    pub text: Option<String>,
    pub color: Option<String>,
    pub backend: String,
    pub output: Option<PathBuf>,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub outline_color: Option<String>,
    pub settings_path: Option<String>,
}

/// Composes the configured image and text and writes the artifact. `input` is
/// used when `--text` is absent. Returns the path written.
pub async fn run(config: Config, input: Option<String>) -> Result<PathBuf> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let mut options = settings.compose_options()?;
    if let Some(value) = config.outline_color.as_deref() {
        options.outline_color = value
            .parse::<Color>()
            .with_context(|| format!("invalid --outline-color: {}", value))?;
    }
    let color = match config.color.as_deref() {
        Some(value) => value
            .parse::<Color>()
            .with_context(|| format!("invalid --color: {}", value))?,
        None => settings.text_color()?,
    };
    let backend = config.backend.parse::<BackendKind>()?;

    let bytes = std::fs::read(&config.image)
        .with_context(|| format!("failed to read image: {}", config.image.display()))?;
    let canvas = Canvas::decode(&bytes)
        .with_context(|| format!("failed to load image: {}", config.image.display()))?;

    let text = config.text.or(input).unwrap_or_default();
    let mut spec = TextSpec::new(text, color);
    if let Some(family) = config.font_family {
        spec = spec.with_font_family(family);
    }
    if let Some(size) = config.font_size {
        if !size.is_finite() || size <= 0.0 {
            return Err(anyhow!("--font-size must be positive"));
        }
        spec = spec.with_font_size(size);
    }

    let compositor = Compositor::new(Arc::new(FontCache::new()));
    let artifact = tokio::task::spawn_blocking(move || {
        compositor.compose(&canvas, &spec, backend, &options)
    })
    .await
    .with_context(|| "compose task failed")??;

    let output = config
        .output
        .unwrap_or_else(|| PathBuf::from(format!("result.{}", artifact.extension())));
    std::fs::write(&output, artifact.as_bytes())
        .with_context(|| format!("failed to write output: {}", output.display()))?;
    debug!("wrote {} ({})", output.display(), artifact.mime());
    Ok(output)
}
