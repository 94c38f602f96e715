mod cache;
mod loader;

use std::path::PathBuf;
use std::sync::Arc;
use ttf_parser::{Face, GlyphId, name_id};

pub use cache::FontCache;
pub use loader::{DEFAULT_FETCH_TIMEOUT, FontLoader, FontRequest, SystemFontLoader};

/// Family name of the bundled face that needs no font file.
pub const BUILTIN_FAMILY: &str = "builtin";

pub const DEFAULT_LINE_SPACING: f32 = 1.1;

const BUILTIN_UNITS_PER_EM: u16 = 1000;
const BUILTIN_ASCENDER: i16 = 800;
const BUILTIN_DESCENDER: i16 = -200;

/// Where a face came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    Builtin,
    System(String),
    File(PathBuf),
    Remote(String),
}

impl FontSource {
    /// Classifies a requested family string.
    pub fn parse(family: &str) -> Self {
        let family = family.trim();
        if family.eq_ignore_ascii_case(BUILTIN_FAMILY) {
            return FontSource::Builtin;
        }
        let lower = family.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return FontSource::Remote(family.to_string());
        }
        let path = PathBuf::from(family);
        let has_font_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc" | "otc"))
            .unwrap_or(false);
        if has_font_ext || path.is_file() {
            return FontSource::File(path);
        }
        FontSource::System(family.to_string())
    }
}

/// A loaded typeface. Sizes are applied through [`FontMetrics`].
#[derive(Debug)]
pub struct FontFace {
    family: String,
    source: FontSource,
    outlines: Option<OutlineData>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    space_advance: u16,
    missing_advance: u16,
}

#[derive(Debug)]
struct OutlineData {
    data: Arc<Vec<u8>>,
    face_index: u32,
}

pub(crate) struct GlyphPlacement {
    pub(crate) ch: char,
    pub(crate) glyph_id: u16,
    pub(crate) x: f32,
    pub(crate) advance: f32,
}

impl FontFace {
    pub fn builtin() -> Self {
        Self {
            family: BUILTIN_FAMILY.to_string(),
            source: FontSource::Builtin,
            outlines: None,
            units_per_em: BUILTIN_UNITS_PER_EM,
            ascender: BUILTIN_ASCENDER,
            descender: BUILTIN_DESCENDER,
            space_advance: BUILTIN_UNITS_PER_EM / 4,
            missing_advance: BUILTIN_UNITS_PER_EM * 9 / 10,
        }
    }

    /// Parses font bytes, picking the face whose family matches `preferred_family`
    /// inside a collection.
    pub fn from_data(
        data: Vec<u8>,
        preferred_family: Option<&str>,
        source: FontSource,
    ) -> Result<Self, String> {
        let data = Arc::new(data);
        let mut fallback = None;
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        for index in 0..count {
            let Some((candidate, named)) = Self::parse_face(&data, index, preferred_family, &source)
            else {
                continue;
            };
            let matches_preferred = match (preferred_family, named) {
                (Some(preferred), true) => candidate.family.eq_ignore_ascii_case(preferred),
                _ => false,
            };
            if matches_preferred {
                return Ok(candidate);
            }
            if fallback.is_none() {
                fallback = Some(candidate);
            }
        }
        fallback.ok_or_else(|| "failed to parse font data".to_string())
    }

    /// Parses the face at `index` of a font file or collection.
    pub fn from_data_at(data: Vec<u8>, index: u32, source: FontSource) -> Result<Self, String> {
        let data = Arc::new(data);
        Self::parse_face(&data, index, None, &source)
            .map(|(face, _)| face)
            .ok_or_else(|| format!("failed to parse font face {}", index))
    }

    /// The flag tells whether the family came from the name table.
    fn parse_face(
        data: &Arc<Vec<u8>>,
        index: u32,
        preferred_family: Option<&str>,
        source: &FontSource,
    ) -> Option<(Self, bool)> {
        let face = Face::parse(data, index).ok()?;
        let family = extract_family_name(&face);
        let named = family.is_some();
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let missing_advance = face
            .glyph_hor_advance(GlyphId(0))
            .filter(|advance| *advance > 0)
            .unwrap_or(space_advance);
        let parsed = FontFace {
            family: family
                .or_else(|| preferred_family.map(str::to_string))
                .unwrap_or_else(|| "sans-serif".to_string()),
            source: source.clone(),
            outlines: Some(OutlineData {
                data: data.clone(),
                face_index: index,
            }),
            units_per_em,
            ascender: face.ascender(),
            descender: face.descender(),
            space_advance,
            missing_advance,
        };
        Some((parsed, named))
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn source(&self) -> &FontSource {
        &self.source
    }

    pub fn is_builtin(&self) -> bool {
        self.outlines.is_none()
    }

    /// Raw font bytes, absent for the builtin face.
    pub fn data(&self) -> Option<&[u8]> {
        self.outlines.as_ref().map(|outlines| outlines.data.as_slice())
    }

    pub(crate) fn with_parsed<R>(&self, func: impl FnOnce(&Face<'_>) -> R) -> Option<R> {
        let outlines = self.outlines.as_ref()?;
        let face = Face::parse(&outlines.data, outlines.face_index).ok()?;
        Some(func(&face))
    }

    fn scale(&self, size_px: f32) -> f32 {
        size_px / self.units_per_em.max(1) as f32
    }

    /// Pen positions for a single line, relative to its origin. Glyphs the face
    /// does not cover map to `.notdef` (id 0).
    pub(crate) fn place_glyphs(&self, text: &str, size_px: f32) -> Vec<GlyphPlacement> {
        let scale = self.scale(size_px);
        let advances: Vec<(char, u16, u16)> = self
            .with_parsed(|face| {
                text.chars()
                    .filter(|ch| *ch != '\n')
                    .map(|ch| {
                        if ch == ' ' {
                            return (ch, 0, self.space_advance);
                        }
                        match face.glyph_index(ch) {
                            Some(id) => (
                                ch,
                                id.0,
                                face.glyph_hor_advance(id).unwrap_or(self.space_advance),
                            ),
                            None => (ch, 0, self.missing_advance),
                        }
                    })
                    .collect()
            })
            .unwrap_or_else(|| {
                text.chars()
                    .filter(|ch| *ch != '\n')
                    .map(|ch| (ch, 0, builtin_advance(ch)))
                    .collect()
            });

        let mut pen = 0u32;
        advances
            .into_iter()
            .map(|(ch, glyph_id, advance)| {
                let placement = GlyphPlacement {
                    ch,
                    glyph_id,
                    x: pen as f32 * scale,
                    advance: advance as f32 * scale,
                };
                pen = pen.saturating_add(advance as u32);
                placement
            })
            .collect()
    }
}

fn builtin_advance(ch: char) -> u16 {
    let em = BUILTIN_UNITS_PER_EM as f32;
    let units = if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(ch as u32, 0x0B80..=0x0BFF) {
        // Tamil
        0.75
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    };
    (units * em).round() as u16
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSize {
    pub width: f32,
    pub height: f32,
}

/// A face at a pixel size. Cheap to clone; the face is shared.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    face: Arc<FontFace>,
    size_px: f32,
    line_spacing: f32,
}

impl FontMetrics {
    pub fn new(face: Arc<FontFace>, size_px: f32) -> Self {
        Self {
            face,
            size_px,
            line_spacing: DEFAULT_LINE_SPACING,
        }
    }

    pub fn with_line_spacing(mut self, line_spacing: f32) -> Self {
        if line_spacing > 0.0 {
            self.line_spacing = line_spacing;
        }
        self
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }

    pub fn family(&self) -> &str {
        self.face.family()
    }

    pub fn size_px(&self) -> f32 {
        self.size_px
    }

    pub fn line_spacing(&self) -> f32 {
        self.line_spacing
    }

    pub fn line_height(&self) -> f32 {
        self.size_px * self.line_spacing
    }

    pub fn ascent(&self) -> f32 {
        self.face.ascender as f32 * self.face.scale(self.size_px)
    }

    pub fn descent(&self) -> f32 {
        -(self.face.descender as f32) * self.face.scale(self.size_px)
    }

    /// Advance width of a single line.
    pub fn text_width(&self, line: &str) -> f32 {
        self.face
            .place_glyphs(line, self.size_px)
            .last()
            .map(|glyph| glyph.x + glyph.advance)
            .unwrap_or(0.0)
    }

    /// Widest line by summed line heights plus the gaps between them.
    pub fn measure(&self, text: &str) -> TextSize {
        if text.is_empty() {
            return TextSize {
                width: 0.0,
                height: 0.0,
            };
        }
        let lines: Vec<&str> = text.split('\n').collect();
        let width = lines
            .iter()
            .map(|line| self.text_width(line.trim_end_matches('\r')))
            .fold(0.0, f32::max);
        let gap = self.line_height() - self.size_px;
        let count = lines.len() as f32;
        TextSize {
            width,
            height: count * self.size_px + (count - 1.0) * gap,
        }
    }
}
