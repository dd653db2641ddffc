//! Source encoding detection and decoding.
//!
//! Encodings are carried as label strings the way a page declares them
//! (`"UTF-8"`, `"Shift_JIS"`). ISO-8859-1 and the UTF-32 family are decoded
//! here directly; every other label goes through `encoding_rs`.

pub mod bom;
pub mod resolver;
pub mod scanner;

use crate::error::{Result, TranslationError};
use encoding_rs::Encoding;

pub const ISO_8859_1: &str = "ISO-8859-1";
pub const UTF_8: &str = "UTF-8";

fn is_latin1(label: &str) -> bool {
    ["ISO-8859-1", "ISO8859_1", "ISO8859-1", "8859_1", "LATIN1", "ISO-LATIN-1", "L1"]
        .iter()
        .any(|name| name.eq_ignore_ascii_case(label.trim()))
}

#[derive(Clone, Copy)]
enum Utf32 {
    Be,
    Le,
}

fn utf32_order(label: &str) -> Option<Utf32> {
    let label = label.trim();
    if label.eq_ignore_ascii_case("UTF-32")
        || label.eq_ignore_ascii_case("UTF-32BE")
        || label.eq_ignore_ascii_case("ISO-10646-UCS-4")
    {
        Some(Utf32::Be)
    } else if label.eq_ignore_ascii_case("UTF-32LE") {
        Some(Utf32::Le)
    } else {
        None
    }
}

fn decode_utf32(bytes: &[u8], order: Utf32) -> String {
    bytes
        .chunks(4)
        .map(|chunk| {
            if chunk.len() < 4 {
                return char::REPLACEMENT_CHARACTER;
            }
            let quad = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let scalar = match order {
                Utf32::Be => u32::from_be_bytes(quad),
                Utf32::Le => u32::from_le_bytes(quad),
            };
            char::from_u32(scalar).unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect()
}

/// Decode `bytes` (already stripped of any BOM) with the encoding named by
/// `label`, replacing malformed sequences. `None` for unknown labels.
pub fn decode_lossy(bytes: &[u8], label: &str) -> Option<String> {
    if is_latin1(label) {
        return Some(bytes.iter().map(|&b| char::from(b)).collect());
    }
    if let Some(order) = utf32_order(label) {
        return Some(decode_utf32(bytes, order));
    }
    let encoding = Encoding::for_label(label.trim().as_bytes())?;
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    Some(text.into_owned())
}

/// [`decode_lossy`], failing with `UnsupportedEncoding` for unknown labels.
pub fn decode(path: &str, bytes: &[u8], label: &str) -> Result<String> {
    decode_lossy(bytes, label).ok_or_else(|| TranslationError::UnsupportedEncoding {
        path: path.to_string(),
        encoding: label.to_string(),
    })
}

fn canonical(label: &str) -> Option<&'static str> {
    if is_latin1(label) {
        return Some(ISO_8859_1);
    }
    match utf32_order(label) {
        Some(Utf32::Be) => Some("UTF-32BE"),
        Some(Utf32::Le) => Some("UTF-32LE"),
        None => Encoding::for_label(label.trim().as_bytes()).map(Encoding::name),
    }
}

/// Two labels name the same encoding.
pub fn same_encoding(a: &str, b: &str) -> bool {
    if a.trim().eq_ignore_ascii_case(b.trim()) {
        return true;
    }
    matches!((canonical(a), canonical(b)), (Some(x), Some(y)) if x == y)
}

fn is_utf16_family(label: &str) -> bool {
    label
        .trim()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("UTF-16"))
}

/// Declarations that do not conflict: the same encoding, or two members of
/// the UTF-16 family.
pub fn compatible(a: &str, b: &str) -> bool {
    same_encoding(a, b) || (is_utf16_family(a) && is_utf16_family(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_maps_every_byte() {
        let bytes: Vec<u8> = (0..=255).collect();
        let text = decode("/a.jsp", &bytes, "ISO-8859-1").expect("decode");
        assert_eq!(text.chars().count(), 256);
        assert_eq!(text.chars().nth(0xe9), Some('\u{e9}'));
    }

    #[test]
    fn decodes_through_encoding_rs() {
        let text = decode("/a.jsp", "h\u{e9}".as_bytes(), "utf-8").expect("utf-8");
        assert_eq!(text, "h\u{e9}");
        let text = decode("/a.jsp", &[0x00, 0x41, 0x00, 0x42], "UTF-16BE").expect("utf-16");
        assert_eq!(text, "AB");
        let text = decode("/a.jsp", &[0x82, 0xa0], "Shift_JIS").expect("sjis");
        assert_eq!(text, "\u{3042}");
    }

    #[test]
    fn decodes_utf32() {
        let text = decode("/a.jsp", &[0, 0, 0, 0x41, 0, 0, 0x30, 0x42], "UTF-32BE").expect("be");
        assert_eq!(text, "A\u{3042}");
        let text = decode("/a.jsp", &[0x41, 0, 0, 0], "UTF-32LE").expect("le");
        assert_eq!(text, "A");
    }

    #[test]
    fn unknown_label_is_unsupported() {
        let err = decode("/a.jsp", b"x", "no-such-charset").expect_err("unknown");
        assert!(matches!(err, TranslationError::UnsupportedEncoding { .. }));
    }

    #[test]
    fn compatibility_rules() {
        assert!(compatible("utf-8", "UTF-8"));
        assert!(compatible("UTF8", "UTF-8"));
        assert!(compatible("UTF-16", "UTF-16LE"));
        assert!(compatible("utf-16be", "UTF-16LE"));
        assert!(!compatible("UTF-8", "UTF-16"));
        assert!(!compatible("UTF-8", "Shift_JIS"));
        assert!(compatible("latin1", "ISO-8859-1"));
    }
}
