//! Watermark fonts
//!
//! The watermark is drawn either with the standard Helvetica, which every
//! viewer supplies, or with a TrueType font embedded into the output. Both
//! go through the single-byte WinAnsi encoding, so the text that is
//! measured is exactly the text that is drawn.

use std::path::Path;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;
use crate::error::{Error, Result};
use crate::metrics::{ShapedFont, StandardHelvetica, TextMetrics};

/// Character codes covered by an embedded font's `Widths` array
const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;

/// Stem width written to embedded font descriptors
const DEFAULT_STEM_V: i64 = 80;

/// Font the watermark text is measured and drawn with
#[derive(Debug, Clone, Default)]
pub enum WatermarkFont {
    /// Standard 14 Helvetica, referenced by name only
    #[default]
    Helvetica,
    /// A TrueType font embedded into the output
    TrueType(FontFile),
}

impl WatermarkFont {
    /// Metrics that match what this font puts on the page
    pub fn metrics(&self) -> Result<Box<dyn TextMetrics + '_>> {
        Ok(match self {
            WatermarkFont::Helvetica => Box::new(StandardHelvetica),
            WatermarkFont::TrueType(file) => Box::new(ShapedFont::new(&file.data)?),
        })
    }

    /// Name the font is known by in the output
    pub fn name(&self) -> &str {
        match self {
            WatermarkFont::Helvetica => "Helvetica",
            WatermarkFont::TrueType(file) => &file.name,
        }
    }
}

/// A TrueType font program
#[derive(Clone)]
pub struct FontFile {
    name: String,
    data: Vec<u8>,
}

impl FontFile {
    /// Accept font data under a PostScript-style name
    ///
    /// The data must parse as a font. Characters other than ASCII letters,
    /// digits and `-` are dropped from the name.
    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self> {
        ShapedFont::new(&data)?;

        let name: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        let name = if name.is_empty() {
            "WatermarkFont".to_string()
        } else {
            name
        };

        Ok(Self { name, data })
    }

    /// Load a font from disk, named after its file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let data = std::fs::read(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::from_bytes(&stem, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for FontFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFile")
            .field("name", &self.name)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// WinAnsi code of a character in the supported Latin-1 range
pub(crate) fn win_ansi_code(ch: char) -> Option<u8> {
    match ch as u32 {
        code @ (0x20..=0x7E | 0xA0..=0xFF) => Some(code as u8),
        _ => None,
    }
}

/// The text with every character WinAnsi cannot carry replaced by `?`
pub(crate) fn drawable_text(text: &str) -> String {
    text.chars()
        .map(|ch| if win_ansi_code(ch).is_some() { ch } else { '?' })
        .collect()
}

/// Add the font to the document once; every page references the same object
pub(crate) fn embed_font(doc: &mut Document, font: &WatermarkFont) -> Result<ObjectId> {
    match font {
        WatermarkFont::Helvetica => Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        })),
        WatermarkFont::TrueType(file) => embed_true_type(doc, file),
    }
}

/// Simple TrueType font with WinAnsi widths and the whole program as `FontFile2`
fn embed_true_type(doc: &mut Document, file: &FontFile) -> Result<ObjectId> {
    let shaped = ShapedFont::new(&file.data)?;
    let face = shaped.face();
    let scale = 1000.0 / shaped.units_per_em();
    let to_pdf = |value: f64| (value * scale).round() as i64;

    let widths: Vec<Object> = (FIRST_CHAR..=LAST_CHAR)
        .map(|code| {
            let ch = char::from(code);
            let width = win_ansi_code(ch)
                .and_then(|_| face.glyph_index(ch))
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .map_or(0, |advance| to_pdf(f64::from(advance)));
            Object::Integer(width)
        })
        .collect();

    let bbox = face.global_bounding_box();
    let ascent = to_pdf(f64::from(face.ascender()));
    let descent = to_pdf(f64::from(face.descender()));
    let cap_height = face
        .capital_height()
        .map_or(ascent, |height| to_pdf(f64::from(height)));

    // Nonsymbolic, plus fixed-pitch and italic where they apply
    let mut flags: i64 = 32;
    if face.is_monospaced() {
        flags |= 1;
    }
    if face.is_italic() {
        flags |= 64;
    }

    let font_name = Object::Name(file.name.as_bytes().to_vec());

    let mut program = Stream::new(
        dictionary! { "Length1" => file.data.len() as i64 },
        file.data.clone(),
    );
    program.compress()?;
    let program_id = doc.add_object(program);

    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => font_name.clone(),
        "Flags" => flags,
        "FontBBox" => vec![
            Object::Integer(to_pdf(f64::from(bbox.x_min))),
            Object::Integer(to_pdf(f64::from(bbox.y_min))),
            Object::Integer(to_pdf(f64::from(bbox.x_max))),
            Object::Integer(to_pdf(f64::from(bbox.y_max))),
        ],
        "ItalicAngle" => Object::Real(face.italic_angle().unwrap_or(0.0)),
        "Ascent" => ascent,
        "Descent" => descent,
        "CapHeight" => cap_height,
        "StemV" => DEFAULT_STEM_V,
        "FontFile2" => program_id,
    });

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => font_name,
        "FirstChar" => i64::from(FIRST_CHAR),
        "LastChar" => i64::from(LAST_CHAR),
        "Widths" => widths,
        "FontDescriptor" => descriptor_id,
        "Encoding" => "WinAnsiEncoding",
    });

    debug!("Embedded TrueType font {} as {:?}", file.name, font_id);

    Ok(font_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::system_font_data;

    #[test]
    fn test_win_ansi_range() {
        assert_eq!(win_ansi_code('A'), Some(b'A'));
        assert_eq!(win_ansi_code('é'), Some(0xE9));
        assert_eq!(win_ansi_code('\u{7F}'), None);
        assert_eq!(win_ansi_code('€'), None);
        assert_eq!(drawable_text("Ça coûte 5€"), "Ça coûte 5?");
    }

    #[test]
    fn test_default_font_is_helvetica() {
        let font = WatermarkFont::default();
        assert_eq!(font.name(), "Helvetica");

        let metrics = font.metrics().unwrap();
        assert!((metrics.text_width("CONFIDENTIAL", 1000.0) - 7334.0).abs() < 1e-9);

        let mut doc = Document::with_version("1.5");
        let id = embed_font(&mut doc, &font).unwrap();
        let dict = doc.get_dictionary(id).unwrap();
        assert_eq!(dict.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
        assert_eq!(dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Type1");
    }

    #[test]
    fn test_font_file_rejects_garbage() {
        let result = FontFile::from_bytes("Broken", vec![0, 1, 2, 3]);
        assert!(matches!(result, Err(Error::Font(_))));
    }

    #[test]
    fn test_load_nonexistent_font() {
        let result = FontFile::load(Path::new("missing-font.ttf"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_embed_true_type_font() {
        let Some(data) = system_font_data() else {
            eprintln!("Skipping test: no system font found");
            return;
        };
        let file = FontFile::from_bytes("Sans Regular", data).expect("should parse system font");
        assert_eq!(file.name(), "SansRegular");

        let mut doc = Document::with_version("1.5");
        let id = embed_font(&mut doc, &WatermarkFont::TrueType(file.clone())).unwrap();
        let font = doc.get_dictionary(id).unwrap();
        assert_eq!(font.get(b"Subtype").unwrap().as_name().unwrap(), b"TrueType");
        assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"SansRegular");

        let widths = font.get(b"Widths").unwrap().as_array().unwrap();
        assert_eq!(widths.len(), 224);
        let a_width = widths[usize::from(b'A' - FIRST_CHAR)].as_i64().unwrap();
        assert!(a_width > 0);

        // Widths agree with what the metrics measure
        let shaped = ShapedFont::new(file.data()).unwrap();
        let measured = shaped.text_width("A", 1000.0);
        assert!((measured - a_width as f64).abs() <= 1.0);

        let descriptor_id = font.get(b"FontDescriptor").unwrap().as_reference().unwrap();
        let descriptor = doc.get_dictionary(descriptor_id).unwrap();
        let program_id = descriptor.get(b"FontFile2").unwrap().as_reference().unwrap();
        let program = doc.get_object(program_id).unwrap().as_stream().unwrap();
        assert_eq!(
            program.dict.get(b"Length1").unwrap().as_i64().unwrap(),
            file.data().len() as i64
        );
    }
}
