//! Fonts for card text
//!
//! Text is written with single-byte WinAnsiEncoding strings. Without a
//! configured font file the standard Helvetica is referenced (no embedding);
//! with one, the TrueType program is embedded and its advance widths are
//! used both for the PDF `Widths` array and for measuring text during layout.

use std::fs;
use std::path::Path;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;
use crate::error::{Error, Result};

const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;

/// WinAnsiEncoding codes 0x80..=0x9F that differ from Latin-1
const WIN_ANSI_HIGH: [(u8, char); 27] = [
    (0x80, '\u{20AC}'), (0x82, '\u{201A}'), (0x83, '\u{0192}'), (0x84, '\u{201E}'),
    (0x85, '\u{2026}'), (0x86, '\u{2020}'), (0x87, '\u{2021}'), (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'), (0x8A, '\u{0160}'), (0x8B, '\u{2039}'), (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'), (0x91, '\u{2018}'), (0x92, '\u{2019}'), (0x93, '\u{201C}'),
    (0x94, '\u{201D}'), (0x95, '\u{2022}'), (0x96, '\u{2013}'), (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'), (0x99, '\u{2122}'), (0x9A, '\u{0161}'), (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'), (0x9E, '\u{017E}'), (0x9F, '\u{0178}'),
];

/// Helvetica widths for ASCII 32..=126, in 1/1000 em
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,      // 112-126
];

/// Encode text as WinAnsiEncoding bytes; unmappable characters become `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| {
            let code = ch as u32;
            if (0x20..0x7F).contains(&code) || (0xA0..=0xFF).contains(&code) {
                code as u8
            } else {
                WIN_ANSI_HIGH
                    .iter()
                    .find(|(_, c)| *c == ch)
                    .map(|(b, _)| *b)
                    .unwrap_or(b'?')
            }
        })
        .collect()
}

/// Character a WinAnsiEncoding byte stands for
fn win_ansi_char(byte: u8) -> Option<char> {
    match byte {
        0x20..=0x7E | 0xA0..=0xFF => Some(byte as char),
        _ => WIN_ANSI_HIGH.iter().find(|(b, _)| *b == byte).map(|(_, c)| *c),
    }
}

/// Parsed TrueType font ready for embedding
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    base_name: String,
    data: Vec<u8>,
    /// Advance widths for codes 32..=255, in 1/1000 em
    widths: Vec<f32>,
    ascent: f32,
    descent: f32,
    cap_height: f32,
    bbox: [f32; 4],
}

impl TrueTypeFont {
    /// Parse a font program; `base_name` becomes the PDF BaseFont
    pub fn from_bytes(base_name: &str, data: Vec<u8>) -> Result<Self> {
        let (widths, bbox, ascent, descent, cap_height) = {
            let face = rustybuzz::Face::from_slice(&data, 0).ok_or_else(|| {
                Error::Font(format!("{} is not a usable TrueType font", base_name))
            })?;

            let scale = 1000.0 / face.units_per_em() as f32;
            let widths: Vec<f32> = (FIRST_CHAR..=LAST_CHAR)
                .map(|byte| {
                    win_ansi_char(byte)
                        .and_then(|ch| face.glyph_index(ch))
                        .and_then(|glyph| face.glyph_hor_advance(glyph))
                        .map(|advance| advance as f32 * scale)
                        .unwrap_or(0.0)
                })
                .collect();

            let rect = face.global_bounding_box();
            let bbox = [
                rect.x_min as f32 * scale,
                rect.y_min as f32 * scale,
                rect.x_max as f32 * scale,
                rect.y_max as f32 * scale,
            ];
            let ascent = face.ascender() as f32 * scale;
            let descent = -(face.descender() as f32) * scale;
            let cap_height = face.capital_height().map(|h| h as f32 * scale).unwrap_or(ascent);
            (widths, bbox, ascent, descent, cap_height)
        };

        Ok(Self {
            base_name: base_name.to_string(),
            data,
            widths,
            ascent,
            descent,
            cap_height,
            bbox,
        })
    }
}

/// Font used for every text run on a card page
#[derive(Debug, Clone)]
pub enum CardFont {
    /// Standard 14 Helvetica, referenced by name
    Helvetica,
    /// Embedded TrueType program
    TrueType(TrueTypeFont),
}

impl CardFont {
    /// Load the configured font
    ///
    /// `None` selects Helvetica. A configured path that does not exist is a
    /// fatal error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(CardFont::Helvetica);
        };
        if !path.exists() {
            return Err(Error::FontNotFound(path.to_path_buf()));
        }

        let base_name: String = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "CardFont".to_string())
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();

        debug!("Loading font {} from {}", base_name, path.display());
        let data = fs::read(path)?;
        Ok(CardFont::TrueType(TrueTypeFont::from_bytes(&base_name, data)?))
    }

    /// Width of one encoded byte in 1/1000 em
    fn glyph_width(&self, byte: u8) -> f32 {
        match self {
            CardFont::Helvetica => match byte {
                32..=126 => HELVETICA_ASCII[(byte - 32) as usize] as f32,
                _ => 556.0,
            },
            CardFont::TrueType(font) => {
                if byte < FIRST_CHAR {
                    0.0
                } else {
                    font.widths[(byte - FIRST_CHAR) as usize]
                }
            }
        }
    }

    /// Advance width of `text` at `size`
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: f32 = encode_win_ansi(text).into_iter().map(|b| self.glyph_width(b)).sum();
        units * size / 1000.0
    }

    /// Distance from the top of the line to the baseline
    pub fn ascent(&self, size: f32) -> f32 {
        let units = match self {
            CardFont::Helvetica => 718.0,
            CardFont::TrueType(font) => font.ascent,
        };
        units * size / 1000.0
    }

    /// Distance from the baseline to the bottom of the line
    pub fn descent(&self, size: f32) -> f32 {
        let units = match self {
            CardFont::Helvetica => 207.0,
            CardFont::TrueType(font) => font.descent,
        };
        units * size / 1000.0
    }

    /// Add the font dictionary (and program, if any) to a document
    pub fn embed(&self, doc: &mut Document) -> Result<ObjectId> {
        match self {
            CardFont::Helvetica => {
                let mut font = Dictionary::new();
                font.set("Type", Object::Name(b"Font".to_vec()));
                font.set("Subtype", Object::Name(b"Type1".to_vec()));
                font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
                font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
                Ok(doc.add_object(Object::Dictionary(font)))
            }
            CardFont::TrueType(ttf) => embed_true_type(doc, ttf),
        }
    }
}

/// Embed a TrueType program with WinAnsiEncoding
fn embed_true_type(doc: &mut Document, ttf: &TrueTypeFont) -> Result<ObjectId> {
    let mut font_stream_dict = Dictionary::new();
    font_stream_dict.set("Length1", Object::Integer(ttf.data.len() as i64));

    let font_stream = Stream {
        dict: font_stream_dict,
        content: ttf.data.clone(),
        allows_compression: true,
        start_position: None,
    };
    let font_stream_id = doc.add_object(Object::Stream(font_stream));

    let name = ttf.base_name.as_bytes().to_vec();

    let mut font_descriptor = Dictionary::new();
    font_descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
    font_descriptor.set("FontName", Object::Name(name.clone()));
    font_descriptor.set("Flags", Object::Integer(32)); // Nonsymbolic
    font_descriptor.set(
        "FontBBox",
        Object::Array(ttf.bbox.iter().map(|v| Object::Integer(v.round() as i64)).collect()),
    );
    font_descriptor.set("ItalicAngle", Object::Integer(0));
    font_descriptor.set("Ascent", Object::Integer(ttf.ascent.round() as i64));
    font_descriptor.set("Descent", Object::Integer(-(ttf.descent.round() as i64)));
    font_descriptor.set("CapHeight", Object::Integer(ttf.cap_height.round() as i64));
    font_descriptor.set("StemV", Object::Integer(80));
    font_descriptor.set("FontFile2", Object::Reference(font_stream_id));
    let font_descriptor_id = doc.add_object(Object::Dictionary(font_descriptor));

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"TrueType".to_vec()));
    font.set("BaseFont", Object::Name(name));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font.set("FontDescriptor", Object::Reference(font_descriptor_id));
    font.set("FirstChar", Object::Integer(FIRST_CHAR as i64));
    font.set("LastChar", Object::Integer(LAST_CHAR as i64));
    font.set(
        "Widths",
        Object::Array(ttf.widths.iter().map(|w| Object::Integer(w.round() as i64)).collect()),
    );

    Ok(doc.add_object(Object::Dictionary(font)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("Ver más"), b"Ver m\xe1s".to_vec());
        assert_eq!(encode_win_ansi("€5"), vec![0x80, b'5']);
        assert_eq!(encode_win_ansi("→"), b"?".to_vec());
    }

    #[test]
    fn test_helvetica_width() {
        let font = CardFont::Helvetica;
        // Digits are 556/1000 em
        assert!((font.text_width("00", 10.0) - 11.12).abs() < 0.001);
        assert_eq!(font.text_width("", 30.0), 0.0);
        assert!(font.text_width("WWW", 30.0) > font.text_width("iii", 30.0));
    }

    #[test]
    fn test_missing_font_is_fatal() {
        let result = CardFont::load(Some(Path::new("assets/fonts/missing.ttf")));
        assert!(matches!(result, Err(Error::FontNotFound(_))));
    }

    #[test]
    fn test_no_font_path_uses_helvetica() {
        assert!(matches!(CardFont::load(None).unwrap(), CardFont::Helvetica));
    }

    #[test]
    fn test_invalid_font_data() {
        let result = TrueTypeFont::from_bytes("Broken", b"not a font".to_vec());
        assert!(matches!(result, Err(Error::Font(_))));
    }

    #[test]
    fn test_embed_helvetica() {
        let mut doc = Document::with_version("1.5");
        let id = CardFont::Helvetica.embed(&mut doc).unwrap();
        let dict = doc.get_dictionary(id).unwrap();
        assert_eq!(dict.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
    }
}
