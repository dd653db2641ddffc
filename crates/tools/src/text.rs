/// True when `text` consists only of space, tab, CR and LF.
///
/// Empty text counts as blank.
pub fn is_blank(text: &str) -> bool {
    text.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

/// Number of lines `text` spans: one plus the number of `\n`.
pub fn line_count(text: &str) -> u32 {
    1 + text.bytes().filter(|&b| b == b'\n').count() as u32
}

/// Maps byte offsets in a string to 1-based line and character column.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    /// `(line, column)` of the character starting at `offset`. An offset
    /// inside a character counts as that character.
    pub fn position(&self, text: &str, offset: usize) -> (u32, u32) {
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let start = self.line_starts[line_idx];
        let column = text[start..offset].chars().count() + 1;
        (line_idx as u32 + 1, column as u32)
    }
}
