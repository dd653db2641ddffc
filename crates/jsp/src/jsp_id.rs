//! Positional identifiers attached to translated elements and content.
//!
//! Format: `encodedPath[line,column,lineCount]`, with `[endLine,endColumn]`
//! appended once a container element closes. `encodedPath` is the
//! form-urlencoded resolved path, so it never contains `[`.

use std::fmt;
use tools::uri::{decode_path, encode_path};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JspId {
    /// Resolved relative path, decoded.
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub line_count: u32,
    pub end: Option<(u32, u32)>,
}

impl JspId {
    pub fn new(path: &str, line: u32, column: u32, line_count: u32) -> Self {
        Self {
            path: path.to_string(),
            line,
            column,
            line_count,
            end: None,
        }
    }

    /// Identifier of a synthesized `jsp:root`.
    pub fn root(path: &str) -> Self {
        Self::new(path, 0, 1, 1)
    }

    pub fn with_end(mut self, line: u32, column: u32) -> Self {
        self.end = Some((line, column));
        self
    }

    pub fn parse(value: &str) -> Option<Self> {
        let open = value.find('[')?;
        let path = decode_path(&value[..open]);
        let mut groups = value[open..].split_inclusive(']');
        let start = parse_group(groups.next()?)?;
        let [line, column, line_count] = start[..] else {
            return None;
        };
        let end = match groups.next() {
            Some(group) => match parse_group(group)?[..] {
                [end_line, end_column] => Some((end_line, end_column)),
                _ => return None,
            },
            None => None,
        };
        if groups.next().is_some() {
            return None;
        }
        Some(Self {
            path,
            line,
            column,
            line_count,
            end,
        })
    }
}

fn parse_group(group: &str) -> Option<Vec<u32>> {
    let inner = group.strip_prefix('[')?.strip_suffix(']')?;
    inner.split(',').map(|n| n.trim().parse().ok()).collect()
}

impl fmt::Display for JspId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&start_marker(
            &encode_path(&self.path),
            self.line,
            self.column,
            self.line_count,
        ))?;
        if let Some((line, column)) = self.end {
            f.write_str(&end_marker(line, column))?;
        }
        Ok(())
    }
}

/// `encoded[line,column,lineCount]` for an already encoded path.
pub(crate) fn start_marker(encoded_path: &str, line: u32, column: u32, line_count: u32) -> String {
    format!("{encoded_path}[{line},{column},{line_count}]")
}

pub(crate) fn end_marker(line: u32, column: u32) -> String {
    format!("[{line},{column}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_encoded_path() {
        let id = JspId::new("/dir/my page.jsp", 3, 5, 2);
        assert_eq!(id.to_string(), "%2Fdir%2Fmy+page.jsp[3,5,2]");
        assert_eq!(JspId::root("/a.jsp").to_string(), "%2Fa.jsp[0,1,1]");
        assert_eq!(id.with_end(9, 1).to_string(), "%2Fdir%2Fmy+page.jsp[3,5,2][9,1]");
    }

    #[test]
    fn parses_start_and_end() {
        let id = JspId::parse("%2Fa.jsp[4,7,1][6,3]").expect("parse");
        assert_eq!(id.path, "/a.jsp");
        assert_eq!((id.line, id.column, id.line_count), (4, 7, 1));
        assert_eq!(id.end, Some((6, 3)));
        assert_eq!(id.to_string(), "%2Fa.jsp[4,7,1][6,3]");
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(JspId::parse("%2Fa.jsp"), None);
        assert_eq!(JspId::parse("%2Fa.jsp[1,2]"), None);
        assert_eq!(JspId::parse("%2Fa.jsp[1,2,x]"), None);
        assert_eq!(JspId::parse("%2Fa.jsp[1,2,3][4]"), None);
        assert_eq!(JspId::parse("%2Fa.jsp[1,2,3][4,5][6,7]"), None);
    }
}
