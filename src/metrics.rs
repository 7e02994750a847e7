//! Text measurement for watermark sizing
//!
//! The layout engine only needs two numbers for a string at a candidate
//! font size: its advance width and the font's line height (ascent plus
//! descent). Both must grow monotonically with font size, otherwise the
//! font-size search in [`crate::layout`] stops at the wrong place.

use crate::error::{Error, Result};

/// Width and height of a string at a given font size, in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f64,
    pub height: f64,
}

/// Measures text set in one fixed reference font
///
/// Built once per request and shared by reference across every page.
pub trait TextMetrics {
    /// Advance width of `text` at `font_size`, in points
    fn text_width(&self, text: &str, font_size: f64) -> f64;

    /// Ascent plus descent at `font_size`, in points
    fn text_height(&self, font_size: f64) -> f64;

    /// Width and height of `text` at `font_size`
    fn measure(&self, text: &str, font_size: f64) -> TextExtent {
        TextExtent {
            width: self.text_width(text, font_size),
            height: self.text_height(font_size),
        }
    }
}

/// Helvetica ascender in 1/1000 em (standard 14 font metrics)
const HELVETICA_ASCENDER: f64 = 718.0;

/// Helvetica descender in 1/1000 em
const HELVETICA_DESCENDER: f64 = -207.0;

/// Width used for characters outside the printable ASCII table
const HELVETICA_FALLBACK_WIDTH: u16 = 556;

/// Helvetica advance widths for characters 32-126, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278,  // 32 space
    278,  // 33 !
    355,  // 34 "
    556,  // 35 #
    556,  // 36 $
    889,  // 37 %
    667,  // 38 &
    191,  // 39 '
    333,  // 40 (
    333,  // 41 )
    389,  // 42 *
    584,  // 43 +
    278,  // 44 ,
    333,  // 45 -
    278,  // 46 .
    278,  // 47 /
    556,  // 48 0
    556,  // 49 1
    556,  // 50 2
    556,  // 51 3
    556,  // 52 4
    556,  // 53 5
    556,  // 54 6
    556,  // 55 7
    556,  // 56 8
    556,  // 57 9
    278,  // 58 :
    278,  // 59 ;
    584,  // 60 <
    584,  // 61 =
    584,  // 62 >
    556,  // 63 ?
    1015, // 64 @
    667,  // 65 A
    667,  // 66 B
    722,  // 67 C
    722,  // 68 D
    667,  // 69 E
    611,  // 70 F
    778,  // 71 G
    722,  // 72 H
    278,  // 73 I
    500,  // 74 J
    667,  // 75 K
    556,  // 76 L
    833,  // 77 M
    722,  // 78 N
    778,  // 79 O
    667,  // 80 P
    778,  // 81 Q
    722,  // 82 R
    667,  // 83 S
    611,  // 84 T
    722,  // 85 U
    667,  // 86 V
    944,  // 87 W
    667,  // 88 X
    667,  // 89 Y
    611,  // 90 Z
    278,  // 91 [
    278,  // 92 \
    278,  // 93 ]
    469,  // 94 ^
    556,  // 95 _
    333,  // 96 `
    556,  // 97 a
    556,  // 98 b
    500,  // 99 c
    556,  // 100 d
    556,  // 101 e
    278,  // 102 f
    556,  // 103 g
    556,  // 104 h
    222,  // 105 i
    222,  // 106 j
    500,  // 107 k
    222,  // 108 l
    833,  // 109 m
    556,  // 110 n
    556,  // 111 o
    556,  // 112 p
    556,  // 113 q
    333,  // 114 r
    500,  // 115 s
    278,  // 116 t
    556,  // 117 u
    500,  // 118 v
    722,  // 119 w
    500,  // 120 x
    500,  // 121 y
    500,  // 122 z
    334,  // 123 {
    260,  // 124 |
    334,  // 125 }
    584,  // 126 ~
];

/// Helvetica kerning pairs (AFM `KPX`) between printable ASCII characters,
/// in 1/1000 em, sorted by left then right character
const HELVETICA_KERNING: [(char, char, i16); 196] = [
    (' ', 'T', -50),
    (' ', 'V', -50),
    (' ', 'W', -40),
    (' ', 'Y', -90),
    ('.', ' ', -60),
    (':', ' ', -50),
    (';', ' ', -50),
    ('A', 'C', -30),
    ('A', 'G', -30),
    ('A', 'O', -30),
    ('A', 'Q', -30),
    ('A', 'T', -120),
    ('A', 'U', -50),
    ('A', 'V', -70),
    ('A', 'W', -50),
    ('A', 'Y', -100),
    ('A', 'u', -30),
    ('A', 'v', -40),
    ('A', 'w', -40),
    ('A', 'y', -40),
    ('B', ',', -20),
    ('B', '.', -20),
    ('B', 'U', -10),
    ('C', ',', -30),
    ('C', '.', -30),
    ('D', ',', -70),
    ('D', '.', -70),
    ('D', 'A', -40),
    ('D', 'V', -70),
    ('D', 'W', -40),
    ('D', 'Y', -90),
    ('F', ',', -150),
    ('F', '.', -150),
    ('F', 'A', -80),
    ('F', 'a', -50),
    ('F', 'e', -30),
    ('F', 'o', -30),
    ('F', 'r', -45),
    ('J', ',', -30),
    ('J', '.', -30),
    ('J', 'A', -20),
    ('J', 'a', -20),
    ('J', 'u', -20),
    ('K', 'O', -50),
    ('K', 'e', -40),
    ('K', 'o', -40),
    ('K', 'u', -30),
    ('K', 'y', -50),
    ('L', 'T', -110),
    ('L', 'V', -110),
    ('L', 'W', -70),
    ('L', 'Y', -140),
    ('L', 'y', -30),
    ('O', ',', -40),
    ('O', '.', -40),
    ('O', 'A', -20),
    ('O', 'T', -40),
    ('O', 'V', -50),
    ('O', 'W', -30),
    ('O', 'X', -60),
    ('O', 'Y', -70),
    ('P', ',', -180),
    ('P', '.', -180),
    ('P', 'A', -120),
    ('P', 'a', -40),
    ('P', 'e', -50),
    ('P', 'o', -50),
    ('Q', 'U', -10),
    ('R', 'O', -20),
    ('R', 'T', -30),
    ('R', 'U', -40),
    ('R', 'V', -50),
    ('R', 'W', -30),
    ('R', 'Y', -50),
    ('S', ',', -20),
    ('S', '.', -20),
    ('T', ',', -120),
    ('T', '-', -140),
    ('T', '.', -120),
    ('T', ':', -20),
    ('T', ';', -20),
    ('T', 'A', -120),
    ('T', 'O', -40),
    ('T', 'a', -120),
    ('T', 'e', -120),
    ('T', 'o', -120),
    ('T', 'r', -120),
    ('T', 'u', -120),
    ('T', 'w', -120),
    ('T', 'y', -120),
    ('U', ',', -40),
    ('U', '.', -40),
    ('U', 'A', -40),
    ('V', ',', -125),
    ('V', '-', -80),
    ('V', '.', -125),
    ('V', ':', -40),
    ('V', ';', -40),
    ('V', 'A', -80),
    ('V', 'G', -40),
    ('V', 'O', -40),
    ('V', 'a', -70),
    ('V', 'e', -80),
    ('V', 'o', -80),
    ('V', 'u', -70),
    ('W', ',', -80),
    ('W', '-', -40),
    ('W', '.', -80),
    ('W', 'A', -50),
    ('W', 'O', -20),
    ('W', 'a', -40),
    ('W', 'e', -30),
    ('W', 'o', -30),
    ('W', 'u', -30),
    ('W', 'y', -20),
    ('Y', ',', -140),
    ('Y', '-', -140),
    ('Y', '.', -140),
    ('Y', ':', -60),
    ('Y', ';', -60),
    ('Y', 'A', -110),
    ('Y', 'O', -85),
    ('Y', 'a', -140),
    ('Y', 'e', -140),
    ('Y', 'i', -20),
    ('Y', 'o', -140),
    ('Y', 'u', -110),
    ('Y', 'v', -110),
    ('a', 'v', -20),
    ('a', 'w', -20),
    ('a', 'y', -30),
    ('b', ',', -40),
    ('b', '.', -40),
    ('b', 'b', -10),
    ('b', 'l', -20),
    ('b', 'u', -20),
    ('b', 'v', -20),
    ('b', 'y', -20),
    ('c', ',', -15),
    ('c', 'k', -20),
    ('e', ',', -15),
    ('e', '.', -15),
    ('e', 'v', -30),
    ('e', 'w', -20),
    ('e', 'x', -30),
    ('e', 'y', -20),
    ('f', ',', -30),
    ('f', '.', -30),
    ('f', 'a', -30),
    ('f', 'e', -30),
    ('f', 'o', -30),
    ('g', 'r', -10),
    ('h', 'y', -30),
    ('k', 'e', -20),
    ('k', 'o', -20),
    ('m', 'u', -10),
    ('m', 'y', -15),
    ('n', 'u', -10),
    ('n', 'v', -20),
    ('n', 'y', -15),
    ('o', ',', -40),
    ('o', '.', -40),
    ('o', 'v', -15),
    ('o', 'w', -15),
    ('o', 'x', -30),
    ('o', 'y', -30),
    ('p', ',', -35),
    ('p', '.', -35),
    ('p', 'y', -30),
    ('r', ',', -50),
    ('r', '-', -20),
    ('r', '.', -50),
    ('r', ':', 30),
    ('r', ';', 30),
    ('r', 'a', -10),
    ('s', ',', -15),
    ('s', '.', -15),
    ('s', 'w', -30),
    ('v', ',', -80),
    ('v', '.', -80),
    ('v', 'a', -25),
    ('v', 'e', -25),
    ('v', 'o', -25),
    ('w', ',', -60),
    ('w', '.', -60),
    ('w', 'a', -15),
    ('w', 'e', -10),
    ('w', 'o', -10),
    ('x', 'e', -30),
    ('y', ',', -100),
    ('y', '.', -100),
    ('y', 'a', -20),
    ('y', 'e', -20),
    ('y', 'o', -20),
    ('z', 'e', -15),
    ('z', 'o', -15),
];

/// Metrics of the standard 14 Helvetica font
///
/// This is the font the stamper draws with by default. Widths include the
/// AFM kerning pairs, so a string measures the same as in other PDF tools
/// that size text with these metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardHelvetica;

impl StandardHelvetica {
    /// Advance width of a single character in 1/1000 em
    pub fn char_units(ch: char) -> u16 {
        let code = ch as u32;
        if (32..=126).contains(&code) {
            HELVETICA_WIDTHS[(code - 32) as usize]
        } else {
            HELVETICA_FALLBACK_WIDTH
        }
    }

    /// Kerning adjustment between two adjacent characters in 1/1000 em
    pub fn kerning(left: char, right: char) -> i16 {
        HELVETICA_KERNING
            .binary_search_by(|&(l, r, _)| (l, r).cmp(&(left, right)))
            .map(|i| HELVETICA_KERNING[i].2)
            .unwrap_or(0)
    }
}

impl TextMetrics for StandardHelvetica {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        let mut units: i64 = 0;
        let mut previous = None;
        for ch in text.chars() {
            units += i64::from(Self::char_units(ch));
            if let Some(left) = previous {
                units += i64::from(Self::kerning(left, ch));
            }
            previous = Some(ch);
        }
        units as f64 * font_size / 1000.0
    }

    fn text_height(&self, font_size: f64) -> f64 {
        (HELVETICA_ASCENDER - HELVETICA_DESCENDER) * font_size / 1000.0
    }
}

/// OpenType features turned off while measuring
///
/// Text drawn through a single-byte PDF font gets one glyph per character
/// advanced by its `Widths` entry, so kerning and ligatures would make the
/// measurement disagree with the page.
const DISABLED_FEATURES: [&[u8; 4]; 2] = [b"kern", b"liga"];

/// Metrics of a TrueType/OpenType font, measured by shaping with rustybuzz
///
/// The face is parsed once and borrows the font data, so build it once per
/// request and share it across pages.
pub struct ShapedFont<'a> {
    face: rustybuzz::Face<'a>,
    features: Vec<rustybuzz::Feature>,
    units_per_em: f64,
    ascender: f64,
    descender: f64,
}

impl<'a> ShapedFont<'a> {
    /// Parse font data (TTF, OTF or the first face of a TTC)
    pub fn new(font_data: &'a [u8]) -> Result<Self> {
        let face = rustybuzz::Face::from_slice(font_data, 0)
            .ok_or_else(|| Error::Font("Failed to parse font data".to_string()))?;

        let units_per_em = f64::from(face.units_per_em());
        if units_per_em <= 0.0 {
            return Err(Error::Font("Font reports zero units per em".to_string()));
        }

        let features = DISABLED_FEATURES
            .iter()
            .map(|tag| rustybuzz::Feature::new(rustybuzz::ttf_parser::Tag::from_bytes(tag), 0, ..))
            .collect();

        Ok(Self {
            ascender: f64::from(face.ascender()),
            descender: f64::from(face.descender()),
            face,
            features,
            units_per_em,
        })
    }

    pub fn units_per_em(&self) -> f64 {
        self.units_per_em
    }

    /// The parsed face, for reading glyph metrics directly
    pub fn face(&self) -> &rustybuzz::Face<'a> {
        &self.face
    }
}

impl TextMetrics for ShapedFont<'_> {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        let mut buffer = rustybuzz::UnicodeBuffer::new();
        buffer.push_str(text);
        let glyphs = rustybuzz::shape(&self.face, &self.features, buffer);

        let advance: i64 = glyphs
            .glyph_positions()
            .iter()
            .map(|pos| i64::from(pos.x_advance))
            .sum();

        advance as f64 / self.units_per_em * font_size
    }

    fn text_height(&self, font_size: f64) -> f64 {
        (self.ascender - self.descender) / self.units_per_em * font_size
    }
}

impl std::fmt::Debug for ShapedFont<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapedFont")
            .field("units_per_em", &self.units_per_em)
            .field("ascender", &self.ascender)
            .field("descender", &self.descender)
            .finish()
    }
}

/// A TrueType font from the usual system locations, if one is installed
#[cfg(test)]
pub(crate) fn system_font_data() -> Option<Vec<u8>> {
    let paths = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];
    paths.iter().find_map(|p| std::fs::read(p).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helvetica_width_of_known_word() {
        // C O N F I D E N T I A L
        let width = StandardHelvetica.text_width("CONFIDENTIAL", 1000.0);
        assert!((width - 7334.0).abs() < 1e-9);
    }

    #[test]
    fn test_helvetica_height() {
        let height = StandardHelvetica.text_height(100.0);
        assert!((height - 92.5).abs() < 1e-9);
    }

    #[test]
    fn test_helvetica_scales_linearly() {
        let m = StandardHelvetica;
        let small = m.text_width("Watermark", 12.0);
        let large = m.text_width("Watermark", 24.0);
        assert!((large - 2.0 * small).abs() < 1e-9);
    }

    #[test]
    fn test_helvetica_empty_and_non_ascii() {
        assert_eq!(StandardHelvetica.text_width("", 50.0), 0.0);
        assert_eq!(StandardHelvetica::char_units('é'), 556);
        assert_eq!(StandardHelvetica::char_units('i'), 222);
    }

    #[test]
    fn test_helvetica_applies_kerning_pairs() {
        assert_eq!(StandardHelvetica::kerning('A', 'V'), -70);
        assert_eq!(StandardHelvetica::kerning('V', 'A'), -80);
        assert_eq!(StandardHelvetica::kerning('A', 'B'), 0);
        assert!((StandardHelvetica.text_width("AV", 1000.0) - 1264.0).abs() < 1e-9);

        // W-A and A-T are the only pairs in the word
        assert!((StandardHelvetica.text_width("WATERMARK", 1000.0) - 6330.0).abs() < 1e-9);
    }

    #[test]
    fn test_kerning_table_is_sorted() {
        for pair in HELVETICA_KERNING.windows(2) {
            assert!((pair[0].0, pair[0].1) < (pair[1].0, pair[1].1), "{:?}", pair);
        }
    }

    #[test]
    fn test_measure_combines_width_and_height() {
        let extent = StandardHelvetica.measure("A", 10.0);
        assert!((extent.width - 6.67).abs() < 1e-9);
        assert!((extent.height - 9.25).abs() < 1e-9);
    }

    #[test]
    fn test_shaped_font_invalid_data() {
        let result = ShapedFont::new(&[0, 1, 2, 3]);
        assert!(matches!(result, Err(Error::Font(_))));
    }

    #[test]
    fn test_shaped_font_measures_system_font() {
        let Some(data) = system_font_data() else {
            eprintln!("Skipping test: no system font found");
            return;
        };
        let font = ShapedFont::new(&data).expect("should parse system font");
        assert!(font.units_per_em() > 0.0);

        let w12 = font.text_width("WATERMARK", 12.0);
        let w24 = font.text_width("WATERMARK", 24.0);
        assert!(w12 > 0.0);
        assert!(w24 >= w12);
        assert!(font.text_height(12.0) > 0.0);
        assert_eq!(font.text_width("", 12.0), 0.0);

        // Kerning is off, so a pair measures as its two glyphs
        let pair = font.text_width("AV", 100.0);
        let single = font.text_width("A", 100.0) + font.text_width("V", 100.0);
        assert!((pair - single).abs() < 1e-9);
    }
}
