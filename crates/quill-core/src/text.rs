//! Text model primitives: positions and offset conversions.

/// A position in a text document expressed as a 1-based (line, column) pair.
///
/// This matches the coordinate system the analysis engine reports in, which
/// is 1-based in both dimensions (unlike LSP's 0-based positions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Pre-computed line start offsets for a particular text snapshot.
///
/// Only `\n` terminates a line; a trailing `\n` produces a final empty line,
/// which is what the conversion contract expects.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineMap {
    line_starts: Vec<usize>,
    text_len: usize,
}

impl LineMap {
    pub fn new(text: &str) -> Self {
        let mut line_starts = Vec::with_capacity(16);
        line_starts.push(0);
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            text_len: text.len(),
        }
    }

    #[inline]
    pub fn text_len(&self) -> usize {
        self.text_len
    }

    #[inline]
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    fn line_index(&self, offset: usize) -> usize {
        // Offsets past the end clamp onto the last line; callers may pass
        // `text_len` (or beyond) when referring to EOF.
        let offset = offset.min(self.text_len);
        self.line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    fn line_end(&self, line: usize) -> usize {
        match self.line_starts.get(line + 1) {
            // Exclude the terminating newline itself.
            Some(&next_start) => next_start - 1,
            None => self.text_len,
        }
    }

    /// Converts a byte offset to a 1-based line/column position.
    ///
    /// Offsets beyond the end of the text clamp to the end of the last line
    /// rather than erroring.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text_len);
        let line = self.line_index(offset);
        let column = offset - self.line_starts[line] + 1;
        Position::new(line as u32 + 1, column as u32)
    }

    /// Converts a 1-based line/column position back to a byte offset.
    ///
    /// A line past the last line clamps to end-of-content; a column past the
    /// end of its line clamps to the end of that line (end-of-content on the
    /// last line) rather than spilling into the next one.
    pub fn offset(&self, position: Position) -> usize {
        let line = (position.line.max(1) as usize) - 1;
        if line >= self.line_starts.len() {
            return self.text_len;
        }
        let start = self.line_starts[line];
        let column = (position.column.max(1) as usize) - 1;
        (start + column).min(self.line_end(line))
    }
}

/// Converts `offset` within `content` to a 1-based line/column position.
pub fn offset_to_position(content: &str, offset: usize) -> Position {
    LineMap::new(content).position(offset)
}

/// Converts a 1-based line/column position within `content` to a byte offset.
pub fn position_to_offset(content: &str, position: Position) -> usize {
    LineMap::new(content).offset(position)
}
