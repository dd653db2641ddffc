//! Decides whether a source is a JSP document (XML) or a JSP-syntax page,
//! and which encoding it is read with.
//!
//! Syntax, in priority order: explicit `is-xml` configuration, a JSP-document
//! file extension, then a provisional scan for `<jsp:root`. Encoding of a
//! JSP document follows XML rules (BOM, prolog, UTF-8 default). Encoding of a
//! JSP-syntax page is BOM, else configured `page-encoding`, else the page's
//! own `pageEncoding`/`contentType` declaration, else ISO-8859-1.

use super::bom::{Bom, XmlSniff, sniff};
use super::scanner::{EncodingScan, JspEncodingScanner};
use super::{ISO_8859_1, compatible, decode_lossy};
use crate::config::JspConfiguration;
use crate::error::{EncodingSource, Result, TranslationError};
use crate::names::has_document_suffix;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceResolution {
    pub is_xml: bool,
    pub encoding: String,
    /// Where `encoding` came from; `None` for the ISO-8859-1 default.
    pub encoding_source: Option<EncodingSource>,
    pub bom: Option<Bom>,
}

impl SourceResolution {
    pub fn bom_len(&self) -> usize {
        self.bom.map_or(0, Bom::len)
    }
}

/// Resolve syntax and encoding of `path` from the leading bytes of its
/// content and its configuration.
pub fn resolve(path: &str, prefix: &[u8], config: &JspConfiguration) -> Result<SourceResolution> {
    let sniffed = sniff(prefix);
    let body = &prefix[sniffed.bom_len()..];

    let (is_xml, scan) = match config.is_xml {
        Some(is_xml) => (is_xml, None),
        None if has_document_suffix(path) => (true, None),
        None => {
            let trial = if sniffed.bom.is_some() || sniffed.family != super::UTF_8 {
                sniffed.family
            } else {
                ISO_8859_1
            };
            let text = decode_lossy(body, trial).unwrap_or_default();
            let scan = JspEncodingScanner::new(&text).scan();
            (scan.has_jsp_root, Some(scan))
        }
    };

    let resolution = if is_xml {
        resolve_document(path, &sniffed, config)?
    } else {
        let scan = match scan {
            Some(scan) => scan,
            None => {
                let label = sniffed.bom.map_or(ISO_8859_1, Bom::encoding);
                let text = decode_lossy(body, label).unwrap_or_default();
                JspEncodingScanner::new(&text).scan()
            }
        };
        resolve_page(path, &sniffed, &scan, config)?
    };
    log::debug!(
        target: "jsp.resolver",
        "{path}: is_xml={} encoding={} source={:?}",
        resolution.is_xml,
        resolution.encoding,
        resolution.encoding_source
    );
    Ok(resolution)
}

fn conflict(
    path: &str,
    first: (&str, EncodingSource),
    second: (&str, EncodingSource),
) -> TranslationError {
    TranslationError::EncodingConflict {
        path: path.to_string(),
        first: first.0.to_string(),
        first_source: first.1,
        second: second.0.to_string(),
        second_source: second.1,
    }
}

fn resolve_document(
    path: &str,
    sniffed: &XmlSniff,
    config: &JspConfiguration,
) -> Result<SourceResolution> {
    let (encoding, source) = match (sniffed.bom, sniffed.prolog_encoding.as_deref()) {
        (Some(bom), Some(declared)) => {
            if !compatible(bom.encoding(), declared) {
                return Err(conflict(
                    path,
                    (bom.encoding(), EncodingSource::ByteOrderMark),
                    (declared, EncodingSource::XmlProlog),
                ));
            }
            (bom.encoding().to_string(), EncodingSource::ByteOrderMark)
        }
        (Some(bom), None) => (bom.encoding().to_string(), EncodingSource::ByteOrderMark),
        (None, Some(declared)) => (declared.to_string(), EncodingSource::XmlProlog),
        (None, None) => (sniffed.family.to_string(), EncodingSource::XmlDefault),
    };
    if let Some(configured) = config.page_encoding.as_deref() {
        if !compatible(configured, &encoding) {
            return Err(conflict(
                path,
                (&encoding, source),
                (configured, EncodingSource::Configuration),
            ));
        }
    }
    Ok(SourceResolution {
        is_xml: true,
        encoding,
        encoding_source: Some(source),
        bom: sniffed.bom,
    })
}

fn resolve_page(
    path: &str,
    sniffed: &XmlSniff,
    scan: &EncodingScan,
    config: &JspConfiguration,
) -> Result<SourceResolution> {
    let configured = config.page_encoding.as_deref();
    let declared = scan.declared_encoding();

    let (encoding, source) = if let Some(bom) = sniffed.bom {
        let found = bom.encoding();
        if let Some(configured) = configured.filter(|c| !compatible(c, found)) {
            return Err(conflict(
                path,
                (found, EncodingSource::ByteOrderMark),
                (configured, EncodingSource::Configuration),
            ));
        }
        if let Some(declared) = declared.filter(|d| !compatible(d, found)) {
            return Err(conflict(
                path,
                (found, EncodingSource::ByteOrderMark),
                (declared, EncodingSource::PageDirective),
            ));
        }
        (found.to_string(), Some(EncodingSource::ByteOrderMark))
    } else if let Some(configured) = configured {
        if let Some(directive) = scan.page_encoding.as_deref() {
            if !compatible(configured, directive) {
                if config.servlet_version.rejects_encoding_mismatch() {
                    return Err(conflict(
                        path,
                        (configured, EncodingSource::Configuration),
                        (directive, EncodingSource::PageDirective),
                    ));
                }
                log::debug!(
                    target: "jsp.resolver",
                    "{path}: configured encoding {configured} overrides pageEncoding {directive}"
                );
            }
        }
        (configured.to_string(), Some(EncodingSource::Configuration))
    } else if let Some(declared) = declared {
        (declared.to_string(), Some(EncodingSource::PageDirective))
    } else {
        (ISO_8859_1.to_string(), None)
    };

    Ok(SourceResolution {
        is_xml: false,
        encoding,
        encoding_source: source,
        bom: sniffed.bom,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServletVersion;

    fn config(page_encoding: Option<&str>, is_xml: Option<bool>) -> JspConfiguration {
        JspConfiguration {
            page_encoding: page_encoding.map(str::to_string),
            is_xml,
            ..JspConfiguration::default()
        }
    }

    #[test]
    fn directive_encoding_for_plain_page() {
        let res = resolve(
            "/a.jsp",
            b"<%@ page pageEncoding=\"UTF-8\" %><html>hi</html>",
            &config(None, None),
        )
        .expect("resolve");
        assert!(!res.is_xml);
        assert_eq!(res.encoding, "UTF-8");
        assert_eq!(res.encoding_source, Some(EncodingSource::PageDirective));
    }

    #[test]
    fn utf8_bom_without_other_sources() {
        let res = resolve("/a.jsp", b"\xEF\xBB\xBFhello", &config(None, None)).expect("resolve");
        assert!(!res.is_xml);
        assert_eq!(res.encoding, "UTF-8");
        assert_eq!(res.bom_len(), 3);
    }

    #[test]
    fn default_is_latin1() {
        let res = resolve("/a.jsp", b"plain", &config(None, None)).expect("resolve");
        assert_eq!(res.encoding, ISO_8859_1);
        assert_eq!(res.encoding_source, None);
    }

    #[test]
    fn configuration_beats_directive_when_equal() {
        let res = resolve(
            "/a.jsp",
            b"<%@ page pageEncoding=\"utf-8\" %>",
            &config(Some("UTF-8"), None),
        )
        .expect("resolve");
        assert_eq!(res.encoding, "UTF-8");
        assert_eq!(res.encoding_source, Some(EncodingSource::Configuration));
    }

    #[test]
    fn configuration_directive_mismatch_depends_on_servlet_version() {
        let source = b"<%@ page pageEncoding=\"Shift_JIS\" %>";
        let strict = config(Some("UTF-8"), None);
        assert!(matches!(
            resolve("/a.jsp", source, &strict),
            Err(TranslationError::EncodingConflict { .. })
        ));
        let lenient = JspConfiguration {
            servlet_version: ServletVersion::V2_4,
            ..config(Some("UTF-8"), None)
        };
        let res = resolve("/a.jsp", source, &lenient).expect("lenient");
        assert_eq!(res.encoding, "UTF-8");
    }

    #[test]
    fn bom_conflicts_with_directive() {
        let err = resolve(
            "/a.jsp",
            b"\xEF\xBB\xBF<%@ page pageEncoding=\"Shift_JIS\" %>",
            &config(None, None),
        )
        .expect_err("conflict");
        let msg = err.to_string();
        assert!(msg.contains("UTF-8") && msg.contains("Shift_JIS"));
    }

    #[test]
    fn utf16_family_never_conflicts() {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(
            "<%@ page pageEncoding=\"UTF-16\" %>"
                .encode_utf16()
                .flat_map(u16::to_le_bytes),
        );
        let res = resolve("/a.jsp", &bytes, &config(Some("UTF-16BE"), None)).expect("resolve");
        assert_eq!(res.encoding, "UTF-16LE");
    }

    #[test]
    fn document_suffix_selects_xml() {
        let res = resolve("/a.jspx", b"<root/>", &config(None, None)).expect("resolve");
        assert!(res.is_xml);
        assert_eq!(res.encoding, "UTF-8");
        assert_eq!(res.encoding_source, Some(EncodingSource::XmlDefault));
    }

    #[test]
    fn configuration_overrides_suffix() {
        let res = resolve("/a.jspx", b"<root/>", &config(None, Some(false))).expect("resolve");
        assert!(!res.is_xml);
    }

    #[test]
    fn jsp_root_selects_xml() {
        let res = resolve(
            "/a.jsp",
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<jsp:root version=\"2.0\"/>",
            &config(None, None),
        )
        .expect("resolve");
        assert!(res.is_xml);
        assert_eq!(res.encoding, "ISO-8859-1");
        assert_eq!(res.encoding_source, Some(EncodingSource::XmlProlog));
    }

    #[test]
    fn xml_prolog_conflicts_with_configuration() {
        let err = resolve(
            "/a.jspx",
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a/>",
            &config(Some("UTF-8"), None),
        )
        .expect_err("conflict");
        assert!(matches!(
            err,
            TranslationError::EncodingConflict {
                second_source: EncodingSource::Configuration,
                ..
            }
        ));
    }
}
