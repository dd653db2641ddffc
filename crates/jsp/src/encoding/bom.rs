//! Byte-order-mark and XML prolog sniffing over the first bytes of a source.

use super::{UTF_8, decode_lossy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bom {
    Utf8,
    Utf16Be,
    Utf16Le,
    Utf32Be,
    Utf32Le,
}

impl Bom {
    pub fn detect(bytes: &[u8]) -> Option<Bom> {
        // UTF-32LE shares its first two bytes with UTF-16LE.
        match bytes {
            [0x00, 0x00, 0xFE, 0xFF, ..] => Some(Bom::Utf32Be),
            [0xFF, 0xFE, 0x00, 0x00, ..] => Some(Bom::Utf32Le),
            [0xEF, 0xBB, 0xBF, ..] => Some(Bom::Utf8),
            [0xFE, 0xFF, ..] => Some(Bom::Utf16Be),
            [0xFF, 0xFE, ..] => Some(Bom::Utf16Le),
            _ => None,
        }
    }

    pub fn len(self) -> usize {
        match self {
            Bom::Utf8 => 3,
            Bom::Utf16Be | Bom::Utf16Le => 2,
            Bom::Utf32Be | Bom::Utf32Le => 4,
        }
    }

    pub fn encoding(self) -> &'static str {
        match self {
            Bom::Utf8 => "UTF-8",
            Bom::Utf16Be => "UTF-16BE",
            Bom::Utf16Le => "UTF-16LE",
            Bom::Utf32Be => "UTF-32BE",
            Bom::Utf32Le => "UTF-32LE",
        }
    }
}

/// What the leading bytes say about an XML-shaped source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlSniff {
    pub bom: Option<Bom>,
    /// Encoding family implied by the BOM or by the byte layout of `<?xml`.
    /// UTF-8 when neither is present.
    pub family: &'static str,
    pub has_prolog: bool,
    /// `encoding` pseudo-attribute of the prolog.
    pub prolog_encoding: Option<String>,
}

impl XmlSniff {
    /// Declared prolog encoding, else the detected family.
    pub fn encoding(&self) -> &str {
        self.prolog_encoding.as_deref().unwrap_or(self.family)
    }

    /// Bytes to skip before decoding.
    pub fn bom_len(&self) -> usize {
        self.bom.map_or(0, Bom::len)
    }
}

const PROLOG_WINDOW: usize = 512;

pub fn sniff(bytes: &[u8]) -> XmlSniff {
    let bom = Bom::detect(bytes);
    let family = match bom {
        Some(bom) => bom.encoding(),
        None => match bytes {
            [0x00, 0x00, 0x00, 0x3C, ..] => "UTF-32BE",
            [0x3C, 0x00, 0x00, 0x00, ..] => "UTF-32LE",
            [0x00, 0x3C, 0x00, 0x3F, ..] => "UTF-16BE",
            [0x3C, 0x00, 0x3F, 0x00, ..] => "UTF-16LE",
            [0x4C, 0x6F, 0xA7, 0x94, ..] => "CP037",
            _ => UTF_8,
        },
    };

    let body = &bytes[bom.map_or(0, Bom::len)..];
    let window = &body[..body.len().min(PROLOG_WINDOW)];
    let (has_prolog, prolog_encoding) = match decode_lossy(window, family) {
        Some(head) => parse_prolog(&head),
        // Only EBCDIC reaches here; its prolog cannot be read without a
        // decoder, so its presence is inferred from the byte pattern.
        None => (true, None),
    };

    XmlSniff {
        bom,
        family,
        has_prolog,
        prolog_encoding,
    }
}

/// `(prolog present, encoding pseudo-attribute)`.
fn parse_prolog(head: &str) -> (bool, Option<String>) {
    let Some(rest) = head.strip_prefix("<?xml") else {
        return (false, None);
    };
    if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
        return (false, None);
    }
    let decl = match rest.find("?>") {
        Some(end) => &rest[..end],
        None => rest,
    };
    let Some(idx) = decl.find("encoding") else {
        return (true, None);
    };
    let after = decl[idx + "encoding".len()..].trim_start();
    let Some(after) = after.strip_prefix('=') else {
        return (true, None);
    };
    let after = after.trim_start();
    let Some(quote) = after.chars().next().filter(|&q| q == '"' || q == '\'') else {
        return (true, None);
    };
    let value = &after[1..];
    match value.find(quote) {
        Some(end) if end > 0 => (true, Some(value[..end].to_string())),
        _ => (true, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_boms() {
        assert_eq!(Bom::detect(b"\xEF\xBB\xBF<"), Some(Bom::Utf8));
        assert_eq!(Bom::detect(b"\xFE\xFF\x00<"), Some(Bom::Utf16Be));
        assert_eq!(Bom::detect(b"\xFF\xFE<\x00"), Some(Bom::Utf16Le));
        assert_eq!(Bom::detect(b"\xFF\xFE\x00\x00"), Some(Bom::Utf32Le));
        assert_eq!(Bom::detect(b"\x00\x00\xFE\xFF"), Some(Bom::Utf32Be));
        assert_eq!(Bom::detect(b"<%@"), None);
    }

    #[test]
    fn reads_prolog_encoding() {
        let sniffed = sniff(b"<?xml version=\"1.0\" encoding='Shift_JIS'?><a/>");
        assert!(sniffed.has_prolog);
        assert_eq!(sniffed.prolog_encoding.as_deref(), Some("Shift_JIS"));
        assert_eq!(sniffed.encoding(), "Shift_JIS");
        assert_eq!(sniffed.bom_len(), 0);
    }

    #[test]
    fn utf16_prolog_without_bom() {
        let bytes: Vec<u8> = "<?xml version=\"1.0\"?><a/>"
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        let sniffed = sniff(&bytes);
        assert_eq!(sniffed.family, "UTF-16LE");
        assert!(sniffed.has_prolog);
        assert_eq!(sniffed.encoding(), "UTF-16LE");
    }

    #[test]
    fn plain_text_defaults_to_utf8() {
        let sniffed = sniff(b"<%@ page %>");
        assert_eq!(sniffed.family, UTF_8);
        assert!(!sniffed.has_prolog);
        assert_eq!(sniffed.prolog_encoding, None);
    }

    #[test]
    fn bom_then_prolog() {
        let sniffed = sniff(b"\xEF\xBB\xBF<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        assert_eq!(sniffed.bom, Some(Bom::Utf8));
        assert_eq!(sniffed.bom_len(), 3);
        assert_eq!(sniffed.prolog_encoding.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn prolog_requires_whitespace_after_target() {
        assert_eq!(parse_prolog("<?xml-stylesheet href='a'?>"), (false, None));
        assert_eq!(parse_prolog("<?xml version='1.0'?>"), (true, None));
    }
}
