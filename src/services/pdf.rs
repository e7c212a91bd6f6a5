//! Shared printpdf drawing helpers

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocumentReference, PdfLayerReference, Point, Rgb,
};
use crate::utils::errors::{MaabaraError, Result};

pub const A4_LANDSCAPE: (f32, f32) = (297.0, 210.0);

/// Rough Helvetica advance width in millimetres per point of font size
const HELVETICA_WIDTH_FACTOR: f32 = 0.19;

pub struct Fonts {
    pub regular: IndirectFontRef,
    pub bold: IndirectFontRef,
    pub italic: IndirectFontRef,
}

impl Fonts {
    pub fn load(doc: &PdfDocumentReference) -> Result<Self> {
        Ok(Self {
            regular: builtin(doc, BuiltinFont::Helvetica)?,
            bold: builtin(doc, BuiltinFont::HelveticaBold)?,
            italic: builtin(doc, BuiltinFont::HelveticaOblique)?,
        })
    }
}

fn builtin(doc: &PdfDocumentReference, font: BuiltinFont) -> Result<IndirectFontRef> {
    doc.add_builtin_font(font)
        .map_err(|e| MaabaraError::Pdf(format!("Failed to add font: {}", e)))
}

/// Serialize a finished document
pub fn finish(doc: PdfDocumentReference) -> Result<Vec<u8>> {
    doc.save_to_bytes()
        .map_err(|e| MaabaraError::Pdf(format!("Failed to save PDF: {}", e)))
}

/// Estimated rendered width of `text` in millimetres
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * HELVETICA_WIDTH_FACTOR
}

pub fn draw_text(layer: &PdfLayerReference, font: &IndirectFontRef, size: f32, x: f32, y: f32, text: &str) {
    layer.set_fill_color(Color::Rgb(Rgb::new(0.1, 0.1, 0.1, None)));
    layer.use_text(text, size, Mm(x), Mm(y), font);
}

/// Draw text centred on `center_x`
pub fn draw_centered(layer: &PdfLayerReference, font: &IndirectFontRef, size: f32, center_x: f32, y: f32, text: &str) {
    let x = (center_x - text_width(text, size) / 2.0).max(0.0);
    draw_text(layer, font, size, x, y, text);
}

pub fn draw_rect(layer: &PdfLayerReference, x: f32, y: f32, width: f32, height: f32, thickness: f32, color: Rgb) {
    let points = vec![
        (Point::new(Mm(x), Mm(y)), false),
        (Point::new(Mm(x + width), Mm(y)), false),
        (Point::new(Mm(x + width), Mm(y + height)), false),
        (Point::new(Mm(x), Mm(y + height)), false),
    ];
    layer.set_outline_color(Color::Rgb(color));
    layer.set_outline_thickness(thickness);
    layer.add_line(Line {
        points,
        is_closed: true,
    });
}

pub fn draw_hline(layer: &PdfLayerReference, x1: f32, x2: f32, y: f32, thickness: f32) {
    layer.set_outline_color(Color::Rgb(Rgb::new(0.6, 0.6, 0.6, None)));
    layer.set_outline_thickness(thickness);
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(x1), Mm(y)), false),
            (Point::new(Mm(x2), Mm(y)), false),
        ],
        is_closed: false,
    });
}
