use crate::{Error, Result};

/// 1-indexed view over the lines of a lyrics text.
///
/// Lines are split on `\n` only, so splitting and rejoining the full range reproduces the
/// input byte for byte (a trailing newline yields a final empty line, a `\r` stays attached
/// to its line). An empty text has exactly one, empty, line.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    lines: Vec<&'a str>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.split('\n').collect(),
        }
    }

    /// Total number of lines. Never zero.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render every line prefixed with its number, as shown to the segmentation model.
    pub fn numbered(&self) -> String {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("[Line {}] {}", i + 1, line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Join the lines of the inclusive 1-indexed range `[start, end]` with `\n`.
    ///
    /// Callers must clamp first; a zero, inverted, or out-of-range request is an error.
    pub fn slice(&self, start: usize, end: usize) -> Result<String> {
        if start == 0 || start > end || end > self.lines.len() {
            return Err(Error::invalid_input(format!(
                "line range [{start}, {end}] is outside [1, {}]",
                self.lines.len()
            )));
        }

        Ok(self.lines[start - 1..end].join("\n"))
    }
}
