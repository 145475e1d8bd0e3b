//! Source text positions.

// Re-export from text-size for compatibility
pub use text_size::TextRange;
pub use text_size::TextSize;

/// Converts a byte offset into a [`TextSize`], saturating at `u32::MAX`
/// for sources past 4 GiB.
pub fn offset_size(offset: usize) -> TextSize {
    TextSize::try_from(offset).unwrap_or(TextSize::from(u32::MAX))
}

/// Converts byte offsets into 1-indexed line numbers.
///
/// Only `\n` starts a new line; a `\r\n` pair counts once.
#[derive(Clone, Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line
    line_starts: Vec<TextSize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::from(0)];

        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset_size(offset + 1));
            }
        }

        Self { line_starts }
    }

    /// Line number (1-indexed) containing `offset`.
    pub fn line(&self, offset: TextSize) -> u32 {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        u32::try_from(line).map_or(u32::MAX, |line| line.saturating_add(1))
    }

    /// Get the number of lines.
    pub fn len(&self) -> usize {
        self.line_starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line_starts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_size_saturates() {
        assert_eq!(offset_size(7), TextSize::from(7));
        assert_eq!(offset_size(u32::MAX as usize), TextSize::from(u32::MAX));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(offset_size(u32::MAX as usize + 10), TextSize::from(u32::MAX));
    }

    #[test]
    fn test_line_index_single_line() {
        let index = LineIndex::new("<?php echo 1;");

        assert_eq!(index.line(TextSize::from(0)), 1);
        assert_eq!(index.line(TextSize::from(12)), 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_line_index_multi_line() {
        let index = LineIndex::new("<?php\r\nclass A\n{\n}");

        assert_eq!(index.line(TextSize::from(0)), 1);
        assert_eq!(index.line(TextSize::from(6)), 1);
        assert_eq!(index.line(TextSize::from(7)), 2);
        assert_eq!(index.line(TextSize::from(15)), 3);
        assert_eq!(index.line(TextSize::from(17)), 4);
    }
}
