use std::fmt;

use crate::core::format::Format;

/// Growing byte buffer accumulating rendered output.
///
/// Append-only within a render pass; `empty` resets the length and keeps the
/// allocation for the next event.
#[derive(Debug, Default)]
pub struct Buffer {
    bytes: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn empty(&mut self) {
        self.bytes.clear();
    }

    pub fn add_char(&mut self, c: u8) {
        self.bytes.push(c);
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn add_str(&mut self, s: &str) {
        self.bytes.extend_from_slice(s.as_bytes());
    }

    /// Append a string with ASCII uppercase letters lowered.
    pub fn add_str_lowercase(&mut self, s: &str) {
        self.bytes
            .extend(s.bytes().map(|c| c.to_ascii_lowercase()));
    }

    /// Append `n` copies of a byte.
    pub fn add_span(&mut self, c: u8, n: usize) {
        self.bytes.resize(self.bytes.len() + n, c);
    }

    pub fn add_fmt(&mut self, args: fmt::Arguments) {
        // Writing into a byte vector cannot fail.
        let _ = fmt::write(self, args);
    }

    /// Append bytes escaped as XML attribute/text content. Encodes `"`, `<`,
    /// `&` and control bytes as character references; high bytes pass
    /// through unchanged.
    pub fn add_xml_escaped(&mut self, bytes: &[u8]) {
        for &c in bytes {
            match c {
                b'"' => self.add_str("&quot;"),
                b'<' => self.add_str("&lt;"),
                b'&' => self.add_str("&amp;"),
                c if c < 0x20 || c == 0x7f => {
                    self.add_fmt(format_args!("&#x{c:02x};"));
                }
                c => self.add_char(c),
            }
        }
    }

    pub fn add_str_xml(&mut self, s: &str) {
        self.add_xml_escaped(s.as_bytes());
    }

    /// Append bytes escaped as JSON string content. Encodes `"`, `\`, the
    /// short escapes, and other control bytes as `\u00..`; high bytes pass
    /// through unchanged.
    pub fn add_json_escaped(&mut self, bytes: &[u8]) {
        for &c in bytes {
            match c {
                b'"' => self.add_str("\\\""),
                b'\\' => self.add_str("\\\\"),
                0x08 => self.add_str("\\b"),
                0x0c => self.add_str("\\f"),
                b'\n' => self.add_str("\\n"),
                b'\r' => self.add_str("\\r"),
                b'\t' => self.add_str("\\t"),
                c if c < 0x20 || c == 0x7f => {
                    self.add_fmt(format_args!("\\u00{c:02x}"));
                }
                c => self.add_char(c),
            }
        }
    }

    pub fn add_str_json(&mut self, s: &str) {
        self.add_json_escaped(s.as_bytes());
    }

    /// Leading whitespace for the opening of a nested block: a newline (for
    /// non-zero levels) plus indentation when the level is not folded,
    /// nothing otherwise.
    pub fn space_opening(&mut self, format: &Format, level: usize) {
        if level < format.fold_level {
            if level > 0 {
                self.add_char(b'\n');
            }
            self.add_span(b' ', format.init_indent + format.nest_indent * level);
        }
    }

    /// Leading whitespace for the closing of a nested block: a newline plus
    /// indentation when the level above the block is not folded.
    pub fn space_closing(&mut self, format: &Format, level: usize) {
        if level.saturating_add(1) < format.fold_level {
            self.add_char(b'\n');
            self.add_span(b' ', format.init_indent + format.nest_indent * level);
        }
    }
}

impl fmt::Write for Buffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.bytes.extend_from_slice(s.as_bytes());
        Ok(())
    }
}
