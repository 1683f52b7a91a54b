//! Byte offset to line number lookup.

/// Sorted table of the byte offsets at which each line of a text begins.
///
/// Built once per content snapshot; rebuild it after the content changes.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, starts }
    }

    /// 1-based line containing byte `offset`: the number of line starts
    /// at or before it.
    pub fn line_number(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset)
    }

    /// Text of a 1-based line, without its trailing newline.
    pub fn line(&self, number: usize) -> &'a str {
        let Some(&start) = number.checked_sub(1).and_then(|i| self.starts.get(i)) else {
            return "";
        };
        let end = self
            .starts
            .get(number)
            .map_or(self.text.len(), |&next| next - 1);
        &self.text[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_numbers() {
        let text = "one\ntwo\nthree";
        let index = LineIndex::new(text);
        assert_eq!(index.line_number(0), 1);
        assert_eq!(index.line_number(3), 1);
        assert_eq!(index.line_number(4), 2);
        assert_eq!(index.line_number(text.find("three").expect("present")), 3);
    }

    #[test]
    fn test_line_text() {
        let index = LineIndex::new("one\ntwo\r\n\nlast\n");
        assert_eq!(index.line(1), "one");
        assert_eq!(index.line(2), "two\r");
        assert_eq!(index.line(3), "");
        assert_eq!(index.line(4), "last");
        assert_eq!(index.line(5), "");
        assert_eq!(index.line(0), "");
        assert_eq!(index.line(99), "");
    }

    #[test]
    fn test_trailing_newline_starts_new_line() {
        let index = LineIndex::new("a\n");
        assert_eq!(index.line_number(2), 2);
    }
}
