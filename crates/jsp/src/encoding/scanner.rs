//! Pre-parse scan for the encoding a JSP-syntax page declares about itself.
//!
//! Only `<%@ page %>` and `<%@ tag %>` directives are examined, and only
//! within the first [`SCAN_LIMIT`] bytes. JSP comments are skipped so a
//! commented-out directive never counts.

use crate::reader::LookaheadReader;

/// Bytes of a source examined before the real parse.
pub const SCAN_LIMIT: usize = 8192;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodingScan {
    pub page_encoding: Option<String>,
    pub content_type_charset: Option<String>,
    /// A literal `<jsp:root` appeared outside JSP comments.
    pub has_jsp_root: bool,
}

impl EncodingScan {
    /// `pageEncoding` if declared, else the `contentType` charset.
    pub fn declared_encoding(&self) -> Option<&str> {
        self.page_encoding
            .as_deref()
            .or(self.content_type_charset.as_deref())
    }
}

pub struct JspEncodingScanner<'a> {
    reader: LookaheadReader<'a>,
    limit: usize,
    result: EncodingScan,
}

impl<'a> JspEncodingScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self::with_limit(text, SCAN_LIMIT)
    }

    pub fn with_limit(text: &'a str, limit: usize) -> Self {
        Self {
            reader: LookaheadReader::new(text),
            limit,
            result: EncodingScan::default(),
        }
    }

    pub fn scan(mut self) -> EncodingScan {
        while self.reader.offset() < self.limit {
            let Some(ch) = self.reader.read() else {
                break;
            };
            if ch != '<' {
                continue;
            }
            if self.reader.starts_with("%--") {
                self.reader.skip_past("--%>");
            } else if self.reader.starts_with("%@") {
                self.reader.read();
                self.reader.read();
                if self.scan_directive() {
                    log::trace!(
                        target: "jsp.scanner",
                        "pageEncoding {:?} at line {}",
                        self.result.page_encoding,
                        self.reader.line()
                    );
                    break;
                }
            } else if self.reader.starts_with("jsp:root")
                && self
                    .reader
                    .peek_nth("jsp:root".len())
                    .is_none_or(|c| c.is_whitespace() || c == '>' || c == '/')
            {
                self.result.has_jsp_root = true;
            }
        }
        self.result
    }

    /// Scan one directive body. Returns true once `pageEncoding` is found.
    fn scan_directive(&mut self) -> bool {
        self.reader.skip_whitespace();
        let name = self.read_name();
        if name != "page" && name != "tag" {
            self.reader.skip_past("%>");
            return false;
        }
        loop {
            self.reader.skip_whitespace();
            if self.reader.starts_with("%>") {
                self.reader.read();
                self.reader.read();
                return false;
            }
            if self.reader.is_eof() || self.reader.offset() >= self.limit {
                return false;
            }
            let attr = self.read_name();
            self.reader.skip_whitespace();
            if self.reader.peek() != Some('=') {
                if attr.is_empty() {
                    self.reader.read();
                }
                continue;
            }
            self.reader.read();
            self.reader.skip_whitespace();
            let Some(quote) = self.reader.peek().filter(|&q| q == '"' || q == '\'') else {
                continue;
            };
            self.reader.read();
            let mut value = String::new();
            loop {
                match self.reader.read() {
                    Some(c) if c == quote => break,
                    Some(c) => value.push(c),
                    None => return false,
                }
            }
            match attr.as_str() {
                "pageEncoding" => {
                    self.result.page_encoding = Some(value.trim().to_string());
                    return true;
                }
                "contentType" if self.result.content_type_charset.is_none() => {
                    self.result.content_type_charset = charset_of(&value);
                }
                _ => {}
            }
        }
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.reader.peek() {
            if c.is_whitespace() || c == '=' || c == '%' || c == '"' || c == '\'' {
                break;
            }
            name.push(c);
            self.reader.read();
        }
        name
    }
}

/// `charset` parameter of a `contentType` value.
pub fn charset_of(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let param = param.trim();
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> EncodingScan {
        JspEncodingScanner::new(text).scan()
    }

    #[test]
    fn finds_page_encoding() {
        let result = scan("<%@ page language=\"java\" pageEncoding='Shift_JIS' %>");
        assert_eq!(result.page_encoding.as_deref(), Some("Shift_JIS"));
        assert_eq!(result.declared_encoding(), Some("Shift_JIS"));
    }

    #[test]
    fn page_encoding_beats_earlier_content_type() {
        let result = scan(
            "<%@ page contentType=\"text/html; charset=EUC-JP\" %>\n<%@ page pageEncoding=\"UTF-8\" %>",
        );
        assert_eq!(result.content_type_charset.as_deref(), Some("EUC-JP"));
        assert_eq!(result.declared_encoding(), Some("UTF-8"));
    }

    #[test]
    fn content_type_charset_is_fallback() {
        let result = scan("<%@ tag contentType=\"text/xml;charset=UTF-16\" %>");
        assert_eq!(result.page_encoding, None);
        assert_eq!(result.declared_encoding(), Some("UTF-16"));
    }

    #[test]
    fn skips_jsp_comments() {
        let result = scan("<%-- <%@ page pageEncoding=\"UTF-8\" %> <jsp:root> --%>text");
        assert_eq!(result, EncodingScan::default());
    }

    #[test]
    fn ignores_other_directives() {
        let result = scan("<%@ include file=\"a.jsp\" %><%@ taglib prefix=\"c\" uri=\"pageEncoding\" %>");
        assert_eq!(result.declared_encoding(), None);
    }

    #[test]
    fn detects_jsp_root() {
        assert!(scan("<jsp:root xmlns:jsp=\"http://java.sun.com/JSP/Page\">").has_jsp_root);
        assert!(!scan("<jsp:rootless/>").has_jsp_root);
    }

    #[test]
    fn stops_at_limit() {
        let mut text = " ".repeat(64);
        text.push_str("<%@ page pageEncoding=\"UTF-8\" %>");
        let result = JspEncodingScanner::with_limit(&text, 16).scan();
        assert_eq!(result.page_encoding, None);
    }

    #[test]
    fn charset_parsing() {
        assert_eq!(charset_of("text/html; Charset=\"UTF-8\"").as_deref(), Some("UTF-8"));
        assert_eq!(charset_of("text/html"), None);
        assert_eq!(charset_of("text/html;charset="), None);
    }
}
