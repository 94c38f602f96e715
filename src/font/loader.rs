use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};
use usvg::fontdb;

use super::{FontFace, FontSource};
use crate::error::OverlayError;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontRequest<'a> {
    pub family: &'a str,
    pub fetch_timeout: Duration,
}

impl<'a> FontRequest<'a> {
    pub fn new(family: &'a str) -> Self {
        Self {
            family,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Produces faces for a family string. Implementations must be callable from
/// several threads at once; [`super::FontCache`] serializes loads per key.
pub trait FontLoader: Send + Sync {
    fn load(&self, request: &FontRequest<'_>) -> Result<FontFace, OverlayError>;
}

/// Loads from the builtin face, local files, the system font database or a
/// remote URL, depending on how the family string reads.
#[derive(Default)]
pub struct SystemFontLoader {
    db: OnceLock<fontdb::Database>,
}

impl SystemFontLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn database(&self) -> &fontdb::Database {
        self.db.get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            debug!("loaded {} system font faces", db.len());
            db
        })
    }

    fn load_system(&self, family: &str) -> Result<FontFace, OverlayError> {
        let db = self.database();
        let generic = generic_family(family);
        let id = match generic {
            Some((generic, candidates)) => query_generic(db, generic, candidates),
            None => query_family(db, fontdb::Family::Name(family)),
        };
        let Some(id) = id else {
            if generic.is_some() {
                warn!("no system face for '{}'; using the builtin face", family);
                return Ok(FontFace::builtin());
            }
            return Err(OverlayError::font_unavailable(family, "not installed"));
        };
        let (data, index) = db
            .with_face_data(id, |data, index| (data.to_vec(), index))
            .ok_or_else(|| OverlayError::font_unavailable(family, "failed to read face data"))?;
        FontFace::from_data_at(data, index, FontSource::System(family.to_string()))
            .map_err(|reason| OverlayError::font_unavailable(family, reason))
    }
}

const SANS_SERIF_FAMILIES: &[&str] = &[
    "Noto Sans",
    "DejaVu Sans",
    "Liberation Sans",
    "Arial",
    "Helvetica",
    "Roboto",
];
const SERIF_FAMILIES: &[&str] = &[
    "Noto Serif",
    "DejaVu Serif",
    "Liberation Serif",
    "Times New Roman",
];
const MONOSPACE_FAMILIES: &[&str] = &[
    "Noto Sans Mono",
    "DejaVu Sans Mono",
    "Liberation Mono",
    "Courier New",
];

fn generic_family(family: &str) -> Option<(fontdb::Family<'static>, &'static [&'static str])> {
    match family.trim().to_ascii_lowercase().as_str() {
        "sans-serif" | "sans" => Some((fontdb::Family::SansSerif, SANS_SERIF_FAMILIES)),
        "serif" => Some((fontdb::Family::Serif, SERIF_FAMILIES)),
        "monospace" => Some((fontdb::Family::Monospace, MONOSPACE_FAMILIES)),
        _ => None,
    }
}

fn query_family(db: &fontdb::Database, family: fontdb::Family<'_>) -> Option<fontdb::ID> {
    let families = [family];
    db.query(&fontdb::Query {
        families: &families,
        ..Default::default()
    })
}

/// The database's generic mapping names fonts that are often absent (Arial on
/// Linux), so installed families are tried next and then any regular face.
fn query_generic(
    db: &fontdb::Database,
    generic: fontdb::Family<'_>,
    candidates: &[&str],
) -> Option<fontdb::ID> {
    query_family(db, generic)
        .or_else(|| {
            candidates
                .iter()
                .find_map(|name| query_family(db, fontdb::Family::Name(name)))
        })
        .or_else(|| {
            let first = db.faces().find_map(|face| face.families.first())?;
            query_family(db, fontdb::Family::Name(&first.0))
        })
}

impl FontLoader for SystemFontLoader {
    fn load(&self, request: &FontRequest<'_>) -> Result<FontFace, OverlayError> {
        let family = request.family;
        match FontSource::parse(family) {
            FontSource::Builtin => Ok(FontFace::builtin()),
            FontSource::File(path) => {
                let data = std::fs::read(&path).map_err(|err| {
                    OverlayError::font_unavailable(
                        family,
                        format!("failed to read {}: {}", path.display(), err),
                    )
                })?;
                FontFace::from_data(data, None, FontSource::File(path))
                    .map_err(|reason| OverlayError::font_unavailable(family, reason))
            }
            FontSource::Remote(url) => {
                let data = fetch_font(&url, request.fetch_timeout)
                    .map_err(|reason| OverlayError::font_unavailable(family, reason))?;
                FontFace::from_data(data, None, FontSource::Remote(url))
                    .map_err(|reason| OverlayError::font_unavailable(family, reason))
            }
            FontSource::System(name) => self.load_system(&name),
        }
    }
}

/// Blocking fetch; the timeout covers connect and body.
fn fetch_font(url: &str, timeout: Duration) -> Result<Vec<u8>, String> {
    debug!("fetching font {} (timeout {:.1}s)", url, timeout.as_secs_f32());
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|err| format!("failed to build http client: {}", err))?;
    let response = client
        .get(url)
        .send()
        .map_err(|err| format!("request failed: {}", err))?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("unexpected status {}", status));
    }
    let bytes = response
        .bytes()
        .map_err(|err| format!("failed to read body: {}", err))?;
    Ok(bytes.to_vec())
}
