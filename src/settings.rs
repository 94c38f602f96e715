use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::PageSpec;
use crate::canvas::Color;
use crate::compose::ComposeOptions;
use crate::render::OutlineOffsets;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub font_family: String,
    pub fallback_family: Option<String>,
    pub font_size: Option<f32>,
    pub text_color: String,
    pub outline_color: String,
    pub outline_radius: f32,
    pub outline_offsets: OutlineOffsets,
    pub line_spacing: f32,
    pub max_text_width_fraction: f32,
    pub min_font_size: f32,
    pub size_divisor: f32,
    pub font_fetch_timeout: Duration,
    pub page: PageSpec,
}

impl Default for Settings {
    fn default() -> Self {
        let options = ComposeOptions::default();
        Self {
            font_family: options.font_family,
            fallback_family: options.fallback_family,
            font_size: options.font_size_px,
            text_color: "#FFFFFF".to_string(),
            outline_color: options.outline_color.to_hex(),
            outline_radius: options.outline_radius_px,
            outline_offsets: options.outline_offsets,
            line_spacing: options.line_spacing,
            max_text_width_fraction: options.max_text_width_fraction,
            min_font_size: options.min_font_size_px,
            size_divisor: options.size_divisor,
            font_fetch_timeout: options.font_fetch_timeout,
            page: options.page,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    overlay: Option<OverlaySettings>,
    document: Option<DocumentSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    font_family: Option<String>,
    fallback_family: Option<String>,
    font_size: Option<f32>,
    text_color: Option<String>,
    outline_color: Option<String>,
    outline_radius: Option<f32>,
    outline_offsets: Option<String>,
    line_spacing: Option<f32>,
    max_text_width_fraction: Option<f32>,
    min_font_size: Option<f32>,
    size_divisor: Option<f32>,
    font_fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentSettings {
    page_width_pt: Option<f32>,
    page_height_pt: Option<f32>,
    margin_pt: Option<f32>,
    max_height_fraction: Option<f32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed)
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(overlay) = incoming.overlay {
            if let Some(family) = non_blank(overlay.font_family) {
                self.font_family = family;
            }
            if let Some(family) = non_blank(overlay.fallback_family) {
                self.fallback_family = if family.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(family)
                };
            }
            if let Some(size) = positive(overlay.font_size) {
                self.font_size = Some(size);
            }
            if let Some(color) = non_blank(overlay.text_color) {
                self.text_color = color;
            }
            if let Some(color) = non_blank(overlay.outline_color) {
                self.outline_color = color;
            }
            if let Some(radius) = overlay.outline_radius.filter(|radius| *radius >= 0.0) {
                self.outline_radius = radius;
            }
            if let Some(value) = non_blank(overlay.outline_offsets) {
                self.outline_offsets = OutlineOffsets::parse(&value)
                    .ok_or_else(|| anyhow!("unknown outline_offsets: {}", value))?;
            }
            if let Some(spacing) = positive(overlay.line_spacing) {
                self.line_spacing = spacing;
            }
            if let Some(fraction) = positive(overlay.max_text_width_fraction) {
                self.max_text_width_fraction = fraction;
            }
            if let Some(size) = positive(overlay.min_font_size) {
                self.min_font_size = size;
            }
            if let Some(divisor) = positive(overlay.size_divisor) {
                self.size_divisor = divisor;
            }
            if let Some(secs) = overlay.font_fetch_timeout_secs.filter(|secs| *secs > 0) {
                self.font_fetch_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(document) = incoming.document {
            if let Some(width) = positive(document.page_width_pt) {
                self.page.width_pt = width;
            }
            if let Some(height) = positive(document.page_height_pt) {
                self.page.height_pt = height;
            }
            if let Some(margin) = document.margin_pt.filter(|margin| *margin >= 0.0) {
                self.page.margin_pt = margin;
            }
            if let Some(fraction) = positive(document.max_height_fraction) {
                self.page.max_height_fraction = fraction;
            }
        }
        Ok(())
    }

    pub fn text_color(&self) -> Result<Color> {
        self.text_color
            .parse::<Color>()
            .with_context(|| format!("invalid text_color in settings: {}", self.text_color))
    }

    pub fn compose_options(&self) -> Result<ComposeOptions> {
        let outline_color = self
            .outline_color
            .parse::<Color>()
            .with_context(|| format!("invalid outline_color in settings: {}", self.outline_color))?;
        Ok(ComposeOptions {
            font_family: self.font_family.clone(),
            fallback_family: self.fallback_family.clone(),
            font_size_px: self.font_size,
            outline_color,
            outline_radius_px: self.outline_radius,
            outline_offsets: self.outline_offsets,
            line_spacing: self.line_spacing,
            max_text_width_fraction: self.max_text_width_fraction,
            min_font_size_px: self.min_font_size,
            size_divisor: self.size_divisor,
            font_fetch_timeout: self.font_fetch_timeout,
            page: self.page.clone(),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn positive(value: Option<f32>) -> Option<f32> {
    value.filter(|value| value.is_finite() && *value > 0.0)
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".overlay-composer"))
        }
    })
}
