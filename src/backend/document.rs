use image::{Rgba, RgbaImage};
use std::io::BufWriter;
use time::OffsetDateTime;

use super::Artifact;
use super::raster::RasterTarget;
use crate::canvas::{Canvas, encode_png};
use crate::error::OverlayError;
use crate::render::{DrawText, RenderTarget};

const DOCUMENT_TITLE: &str = "overlay";

/// Page geometry in PDF points. Defaults to US Letter.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSpec {
    pub width_pt: f32,
    pub height_pt: f32,
    pub margin_pt: f32,
    pub max_height_fraction: f32,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            width_pt: 612.0,
            height_pt: 792.0,
            margin_pt: 36.0,
            max_height_fraction: 0.7,
        }
    }
}

/// Where the image lands on the page; `y_pt` is the bottom edge measured from
/// the bottom of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePlacement {
    pub x_pt: f32,
    pub y_pt: f32,
    pub scale: f32,
}

impl PageSpec {
    /// Fits an image (1 px = 1 pt at scale 1) inside the printable region,
    /// preserving aspect ratio, centered horizontally and hung from the top
    /// margin.
    pub fn place(&self, width_px: u32, height_px: u32) -> PagePlacement {
        let width = width_px.max(1) as f32;
        let height = height_px.max(1) as f32;
        let max_w = (self.width_pt - self.margin_pt * 2.0).max(1.0);
        let max_h = (self.height_pt * self.max_height_fraction).max(1.0);
        let scale = (max_w / width).min(max_h / height);
        PagePlacement {
            x_pt: (self.width_pt - width * scale) * 0.5,
            y_pt: self.height_pt - self.margin_pt - height * scale,
            scale,
        }
    }
}

/// Renders through [`RasterTarget`], then lays the bitmap out on one page.
pub struct DocumentTarget {
    raster: RasterTarget,
    page: PageSpec,
}

impl DocumentTarget {
    pub fn new(canvas: &Canvas, page: PageSpec) -> Result<Self, OverlayError> {
        Ok(Self {
            raster: RasterTarget::new(canvas)?,
            page,
        })
    }
}

impl RenderTarget for DocumentTarget {
    fn draw_text(&mut self, draw: &DrawText<'_>) {
        self.raster.draw_text(draw);
    }

    fn compose(self: Box<Self>, canvas: &Canvas) -> Result<Artifact, OverlayError> {
        let DocumentTarget { raster, page } = *self;
        let mut image = raster.into_image(canvas)?;
        flatten_on_white(&mut image);
        let png = encode_png(&image)?;
        image_to_pdf(&png, &page).map(Artifact::Pdf)
    }
}

/// PDF page images carry no alpha; transparent areas show the white page.
fn flatten_on_white(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 255 {
            continue;
        }
        let alpha = a as f32 / 255.0;
        let over_white = |channel: u8| {
            (channel as f32 * alpha + 255.0 * (1.0 - alpha))
                .round()
                .clamp(0.0, 255.0) as u8
        };
        *pixel = Rgba([over_white(r), over_white(g), over_white(b), 255]);
    }
}

fn image_to_pdf(png: &[u8], page: &PageSpec) -> Result<Vec<u8>, OverlayError> {
    use printpdf::{
        CustomPdfConformance, Image, ImageTransform, Mm, PdfConformance, PdfDocument,
    };

    let image = printpdf::image_crate::load_from_memory(png)
        .map_err(|err| OverlayError::Export(format!("failed to decode page image: {}", err)))?;
    let image = printpdf::image_crate::DynamicImage::ImageRgb8(image.to_rgb8());
    let placement = page.place(image.width(), image.height());

    // Fixed dates, no XMP packet and a content-derived id keep the output
    // byte-identical for identical input.
    let document_id = format!("{:x}", md5::compute(png));
    let epoch = OffsetDateTime::UNIX_EPOCH;
    let (doc, page_index, layer_index) = PdfDocument::new(
        DOCUMENT_TITLE,
        Mm(pt_to_mm(page.width_pt)),
        Mm(pt_to_mm(page.height_pt)),
        "Layer 1",
    );
    let doc = doc
        .with_conformance(PdfConformance::Custom(CustomPdfConformance {
            requires_icc_profile: false,
            requires_xmp_metadata: false,
            ..Default::default()
        }))
        .with_document_id(document_id.clone())
        .with_creation_date(epoch)
        .with_mod_date(epoch);

    let layer = doc.get_page(page_index).get_layer(layer_index);
    let transform = ImageTransform {
        translate_x: Some(Mm(pt_to_mm(placement.x_pt))),
        translate_y: Some(Mm(pt_to_mm(placement.y_pt))),
        rotate: None,
        scale_x: Some(placement.scale),
        scale_y: Some(placement.scale),
        dpi: Some(72.0),
    };
    Image::from_dynamic_image(&image).add_to_layer(layer, transform);

    let mut buffer = Vec::new();
    {
        let mut writer = BufWriter::new(&mut buffer);
        doc.save(&mut writer)
            .map_err(|err| OverlayError::Export(format!("failed to write pdf: {}", err)))?;
    }
    pin_trailer_id(&mut buffer, &document_id);
    Ok(buffer)
}

/// Overwrites the strings of the trailer `/ID` entry in place with characters
/// from `seed`. Lengths are unchanged, so cross-reference offsets stay valid.
fn pin_trailer_id(pdf: &mut [u8], seed: &str) {
    let seed = seed.as_bytes();
    if seed.is_empty() {
        return;
    }
    let Some(start) = pdf.windows(3).rposition(|window| window == b"/ID") else {
        return;
    };
    let mut cursor = start + 3;
    let mut strings = 0;
    while cursor < pdf.len() && strings < 2 {
        let close = match pdf[cursor] {
            b'(' => b')',
            b'<' => b'>',
            b' ' | b'\r' | b'\n' | b'\t' | b'[' => {
                cursor += 1;
                continue;
            }
            _ => return,
        };
        let Some(len) = pdf[cursor + 1..].iter().position(|byte| *byte == close) else {
            return;
        };
        for (offset, byte) in pdf[cursor + 1..cursor + 1 + len].iter_mut().enumerate() {
            *byte = seed[offset % seed.len()];
        }
        cursor += len + 2;
        strings += 1;
    }
}

fn pt_to_mm(pt: f32) -> f32 {
    pt / 72.0 * 25.4
}
