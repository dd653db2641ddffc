//! Character reader with position tracking and non-consuming lookahead.

use memchr::memmem;

/// Reads decoded source text one character at a time.
///
/// Invariant: `line`/`column` describe the most recently consumed character.
/// Lines are 1-based; the column resets to 0 after a `\n`, so the first
/// character of a line reports column 1.
#[derive(Debug, Clone)]
pub struct LookaheadReader<'a> {
    text: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    mark: Option<Mark>,
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> LookaheadReader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            column: 0,
            mark: None,
        }
    }

    pub fn read(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        self.advance_position(ch);
        Some(ch)
    }

    pub fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    /// Character `n` places past the next one (`peek_nth(0) == peek()`).
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(n)
    }

    /// Up to `count` upcoming characters, without consuming them.
    pub fn read_ahead(&self, count: usize) -> &'a str {
        let rest = &self.text[self.pos..];
        match rest.char_indices().nth(count) {
            Some((end, _)) => &rest[..end],
            None => rest,
        }
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.text[self.pos..].starts_with(prefix)
    }

    pub fn mark(&mut self) {
        self.mark = Some(Mark {
            pos: self.pos,
            line: self.line,
            column: self.column,
        });
    }

    /// Rewind to the last mark. Returns false when nothing was marked.
    pub fn reset(&mut self) -> bool {
        match self.mark {
            Some(mark) => {
                self.pos = mark.pos;
                self.line = mark.line;
                self.column = mark.column;
                true
            }
            None => false,
        }
    }

    /// Consume whitespace up to the next non-white character.
    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.read();
        }
    }

    /// Consume everything through the next occurrence of `pattern`.
    /// At EOF without a match the reader is left at the end and false is
    /// returned.
    pub fn skip_past(&mut self, pattern: &str) -> bool {
        let rest = &self.text[self.pos..];
        let (consumed, found) = match memmem::find(rest.as_bytes(), pattern.as_bytes()) {
            Some(idx) => (idx + pattern.len(), true),
            None => (rest.len(), false),
        };
        for ch in rest[..consumed].chars() {
            self.advance_position(ch);
        }
        self.pos += consumed;
        found
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Byte offset of the next character.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn advance_position(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LookaheadReader;

    #[test]
    fn tracks_line_and_column() {
        let mut reader = LookaheadReader::new("ab\ncd");
        assert_eq!((reader.line(), reader.column()), (1, 0));
        assert_eq!(reader.read(), Some('a'));
        assert_eq!((reader.line(), reader.column()), (1, 1));
        reader.read();
        reader.read();
        assert_eq!((reader.line(), reader.column()), (2, 0));
        assert_eq!(reader.read(), Some('c'));
        assert_eq!((reader.line(), reader.column()), (2, 1));
    }

    #[test]
    fn lookahead_does_not_consume() {
        let reader = LookaheadReader::new("<%@ page");
        assert_eq!(reader.peek(), Some('<'));
        assert_eq!(reader.peek_nth(2), Some('@'));
        assert_eq!(reader.read_ahead(3), "<%@");
        assert_eq!(reader.read_ahead(100), "<%@ page");
        assert!(reader.starts_with("<%@"));
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn mark_and_reset_restore_position() {
        let mut reader = LookaheadReader::new("x\ny z");
        assert!(!reader.clone().reset());
        reader.read();
        reader.mark();
        reader.read();
        reader.read();
        assert_eq!(reader.line(), 2);
        assert!(reader.reset());
        assert_eq!((reader.line(), reader.column()), (1, 1));
        assert_eq!(reader.peek(), Some('\n'));
    }

    #[test]
    fn skip_past_counts_lines() {
        let mut reader = LookaheadReader::new("<%-- a\nb --%>rest");
        assert!(reader.skip_past("--%>"));
        assert_eq!(reader.line(), 2);
        assert_eq!(reader.column(), 6);
        assert_eq!(reader.peek(), Some('r'));
        assert!(!reader.skip_past("%>"));
        assert!(reader.is_eof());
    }

    #[test]
    fn skip_whitespace_stops_at_content() {
        let mut reader = LookaheadReader::new(" \t\n page");
        reader.skip_whitespace();
        assert_eq!(reader.peek(), Some('p'));
        assert_eq!(reader.line(), 2);
    }
}
