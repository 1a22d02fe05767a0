//! Append-only text buffer that records which byte ranges belong to which module
//!
//! The closed segments are the input of any downstream source map generator:
//! each one bounds exactly the bytes a module contributed to the final text.

use serde::Serialize;

use crate::error::WriterError;

/// A contiguous byte range of the output attributable to one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub module: String,
    pub start_index: usize,
    pub end_index: usize,
    /// Zero-based line and byte column where the segment starts
    pub start_line: usize,
    pub start_column: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }
}

#[derive(Debug)]
struct OpenSegment {
    module: String,
    start_index: usize,
    start_position: (usize, usize),
}

#[derive(Debug, Default)]
pub struct SegmentWriter {
    buf: String,
    /// Zero-based line of the end of the buffer
    line: usize,
    /// Byte column of the end of the buffer within the current line
    column: usize,
    ends_with_new_line: bool,
    segments: Vec<Segment>,
    open_segment: Option<OpenSegment>,
}

impl SegmentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append all parts to the buffer
    pub fn write(&mut self, parts: &[&str]) {
        for part in parts {
            self.append(part);
        }
    }

    /// Append all parts followed by a newline
    pub fn writeln(&mut self, parts: &[&str]) {
        self.write(parts);
        self.append("\n");
    }

    /// Append a newline unless the buffer is empty or already ends with one
    ///
    /// Keeps keyword-starting lines from being swallowed by a trailing
    /// single-line comment of the previous content.
    pub fn ensure_new_line(&mut self) {
        if !self.ends_with_new_line && !self.buf.is_empty() {
            self.append("\n");
        }
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let trimmed = text.trim_end_matches([' ', '\t']);
        if !trimmed.is_empty() {
            self.ends_with_new_line = trimmed.ends_with(['\n', '\r']);
        }
        match text.rfind('\n') {
            Some(last_newline) => {
                self.line += text.matches('\n').count();
                self.column = text.len() - last_newline - 1;
            }
            None => self.column += text.len(),
        }
        self.buf.push_str(text);
    }

    pub fn start_segment(&mut self, module: &str) -> Result<(), WriterError> {
        if let Some(open) = &self.open_segment {
            return Err(WriterError::SegmentAlreadyOpen {
                open: open.module.clone(),
                requested: module.to_owned(),
            });
        }
        self.open_segment = Some(OpenSegment {
            module: module.to_owned(),
            start_index: self.buf.len(),
            start_position: self.position(),
        });
        Ok(())
    }

    /// Close the open segment and return the number of bytes it covers
    pub fn end_segment(&mut self) -> Result<usize, WriterError> {
        let open = self
            .open_segment
            .take()
            .ok_or(WriterError::NoOpenSegment)?;
        let segment = Segment {
            module: open.module,
            start_index: open.start_index,
            end_index: self.buf.len(),
            start_line: open.start_position.0,
            start_column: open.start_position.1,
        };
        let length = segment.len();
        self.segments.push(segment);
        Ok(length)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn ends_with_new_line(&self) -> bool {
        self.ends_with_new_line
    }

    /// Line and column of the end of the buffer
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_parts(self) -> (String, Vec<Segment>) {
        (self.buf, self.segments)
    }
}

impl std::fmt::Display for SegmentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.buf)
    }
}
