use std::sync::OnceLock;

use regex::Regex;

use crate::core::buffer::Buffer;
use crate::core::collect::commit_separator;
use crate::core::error::ConvError;
use crate::core::format::{Format, Lang};
use crate::core::record::{Field, Record};
use crate::core::tree::BufTree;

static ARG_RE: OnceLock<Regex> = OnceLock::new();
static ARG_LEN_RE: OnceLock<Regex> = OnceLock::new();
static ARG_SLICE_RE: OnceLock<Regex> = OnceLock::new();

fn arg_re() -> &'static Regex {
    ARG_RE.get_or_init(|| Regex::new(r"^a(\d+)$").expect("pattern is valid"))
}

fn arg_len_re() -> &'static Regex {
    ARG_LEN_RE.get_or_init(|| Regex::new(r"^a(\d+)_len$").expect("pattern is valid"))
}

fn arg_slice_re() -> &'static Regex {
    ARG_SLICE_RE.get_or_init(|| Regex::new(r"^a(\d+)\[(\d+)\]$").expect("pattern is valid"))
}

fn parse_index(digits: &str) -> Result<usize, ConvError> {
    digits.parse().map_err(|_| ConvError::InvalidExecve)
}

/// Collector reassembling multi-record `EXECVE` argument sequences.
///
/// Arguments arrive whole (`aN`), or sliced (`aN_len` declaring the total
/// transport length, then consecutive `aN[S]` slices). Indices must advance
/// monotonically; skipped indices become empty arguments. The aggregate is
/// committed on `end` as the `execve` container with the joined raw lines
/// and the argument array.
#[derive(Debug)]
pub(super) struct ExecveColl {
    /// Raw lines of the sequence, newline-separated.
    raw: Buffer,
    /// Pre-rendered argument markup.
    args: Buffer,
    /// Number of arguments announced by `argc`.
    arg_num: usize,
    /// Index of the argument being read.
    arg_idx: usize,
    /// True if the in-progress argument declared its length.
    got_len: bool,
    /// Index of the next expected slice of the in-progress argument.
    slice_idx: usize,
    /// Declared transport length of the in-progress argument.
    len_total: usize,
    /// Transport length read so far.
    len_read: usize,
}

impl ExecveColl {
    pub(super) fn new() -> Self {
        Self {
            raw: Buffer::new(),
            args: Buffer::new(),
            arg_num: 0,
            arg_idx: 0,
            got_len: false,
            slice_idx: 0,
            len_total: 0,
            len_read: 0,
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.arg_num == 0
    }

    pub(super) fn empty(&mut self) {
        self.raw.empty();
        self.args.empty();
        self.arg_num = 0;
        self.arg_idx = 0;
        self.got_len = false;
        self.slice_idx = 0;
        self.len_total = 0;
        self.len_read = 0;
    }

    pub(super) fn add(
        &mut self,
        format: &Format,
        level: usize,
        record: &Record,
    ) -> Result<(), ConvError> {
        // Account for the container markup emitted at end.
        let l = level
            + match format.lang {
                Lang::Xml => 1,
                Lang::Json => 2,
            };

        if !self.raw.is_empty() {
            self.raw.add_char(b'\n');
        }
        self.raw.add_str(&record.raw);

        for field in &record.fields {
            let name = field.name.as_str();
            if name == "type" || name == "node" {
                continue;
            }
            if name == "argc" {
                self.add_argc(field)?;
            } else if let Some(caps) = arg_re().captures(name) {
                let arg_idx = parse_index(&caps[1])?;
                self.add_arg(format, l, arg_idx, field)?;
            } else if let Some(caps) = arg_len_re().captures(name) {
                let arg_idx = parse_index(&caps[1])?;
                self.add_arg_len(format, l, arg_idx, field)?;
            } else if let Some(caps) = arg_slice_re().captures(name) {
                let arg_idx = parse_index(&caps[1])?;
                let slice_idx = parse_index(&caps[2])?;
                self.add_arg_slice(format, l, arg_idx, slice_idx, field)?;
            } else {
                return Err(ConvError::InvalidExecve);
            }
        }
        Ok(())
    }

    /// Process the `argc` field: allowed once, before any argument.
    fn add_argc(&mut self, field: &Field) -> Result<(), ConvError> {
        if self.arg_num != 0 {
            return Err(ConvError::InvalidExecve);
        }
        self.arg_num = field.raw.parse().map_err(|_| ConvError::InvalidExecve)?;
        Ok(())
    }

    /// Append the markup for one argument value.
    fn add_arg_str(&mut self, format: &Format, level: usize, value: &str) {
        match format.lang {
            Lang::Xml => {
                self.args.space_opening(format, level);
                self.args.add_str("<a i=\"");
                self.args.add_str_xml(value);
                self.args.add_str("\"/>");
            }
            Lang::Json => {
                if self.arg_idx > 0 {
                    self.args.add_char(b',');
                }
                self.args.space_opening(format, level);
                self.args.add_char(b'"');
                self.args.add_str_json(value);
                self.args.add_char(b'"');
            }
        }
        self.arg_idx += 1;
    }

    /// Process a whole-argument `aN` field.
    fn add_arg(
        &mut self,
        format: &Format,
        level: usize,
        arg_idx: usize,
        field: &Field,
    ) -> Result<(), ConvError> {
        if arg_idx < self.arg_idx || arg_idx >= self.arg_num {
            return Err(ConvError::InvalidExecve);
        }
        while self.arg_idx < arg_idx {
            self.add_arg_str(format, level, "");
        }
        self.add_arg_str(format, level, &field.interpreted);
        Ok(())
    }

    /// Process an `aN_len` field declaring a sliced argument's length.
    fn add_arg_len(
        &mut self,
        format: &Format,
        level: usize,
        arg_idx: usize,
        field: &Field,
    ) -> Result<(), ConvError> {
        if arg_idx < self.arg_idx || arg_idx >= self.arg_num || self.got_len {
            return Err(ConvError::InvalidExecve);
        }
        while self.arg_idx < arg_idx {
            self.add_arg_str(format, level, "");
        }
        self.got_len = true;
        self.len_total = field.raw.parse().map_err(|_| ConvError::InvalidExecve)?;
        Ok(())
    }

    /// Process an `aN[S]` argument slice.
    fn add_arg_slice(
        &mut self,
        format: &Format,
        level: usize,
        arg_idx: usize,
        slice_idx: usize,
        field: &Field,
    ) -> Result<(), ConvError> {
        if arg_idx != self.arg_idx
            || arg_idx >= self.arg_num
            || !self.got_len
            || slice_idx != self.slice_idx
        {
            return Err(ConvError::InvalidExecve);
        }

        // The declared length counts transport bytes; a slice whose
        // interpreted form is exactly half the raw length was hex-encoded
        // and is credited at raw length.
        let raw_len = field.raw.len();
        let int_len = field.interpreted.len();
        let len = if int_len == raw_len / 2 { raw_len } else { int_len };
        if self.len_read + len > self.len_total {
            return Err(ConvError::InvalidExecve);
        }

        if slice_idx == 0 {
            match format.lang {
                Lang::Xml => {
                    self.args.space_opening(format, level);
                    self.args.add_str("<a i=\"");
                }
                Lang::Json => {
                    if self.arg_idx > 0 {
                        self.args.add_char(b',');
                    }
                    self.args.space_opening(format, level);
                    self.args.add_char(b'"');
                }
            }
        }
        match format.lang {
            Lang::Xml => self.args.add_str_xml(&field.interpreted),
            Lang::Json => self.args.add_str_json(&field.interpreted),
        }
        self.len_read += len;

        if self.len_read == self.len_total {
            match format.lang {
                Lang::Xml => self.args.add_str("\"/>"),
                Lang::Json => self.args.add_char(b'"'),
            }
            self.got_len = false;
            self.slice_idx = 0;
            self.len_total = 0;
            self.len_read = 0;
            self.arg_idx += 1;
        } else {
            self.slice_idx += 1;
        }
        Ok(())
    }

    pub(super) fn end(
        &mut self,
        container: &mut BufTree,
        format: &Format,
        count: &mut usize,
        level: usize,
        prio: usize,
    ) -> Result<(), ConvError> {
        // Tolerate the kernel dropping trailing empty arguments.
        let fill_level = level
            + match format.lang {
                Lang::Xml => 1,
                Lang::Json => 2,
            };
        while self.arg_idx < self.arg_num {
            self.add_arg_str(format, fill_level, "");
        }

        commit_separator(container, format, *count, prio);
        let args_empty = self.args.is_empty();
        let buf = container.text();
        match format.lang {
            Lang::Xml => {
                buf.space_opening(format, level);
                buf.add_str("<execve raw=\"");
                buf.add_xml_escaped(self.raw.as_slice());
                buf.add_str("\">");
                buf.add_bytes(self.args.as_slice());
                buf.space_closing(format, level);
                buf.add_str("</execve>");
            }
            Lang::Json => {
                buf.space_opening(format, level);
                buf.add_str("\"execve\":{");
                buf.space_opening(format, level + 1);
                buf.add_str("\"raw\":\"");
                buf.add_json_escaped(self.raw.as_slice());
                buf.add_str("\",");
                buf.space_opening(format, level + 1);
                buf.add_str("\"args\":[");
                buf.add_bytes(self.args.as_slice());
                if !args_empty {
                    buf.space_closing(format, level + 1);
                }
                buf.add_char(b']');
                buf.space_closing(format, level);
                buf.add_char(b'}');
            }
        }
        container.add_text(prio);
        *count += 1;
        Ok(())
    }
}
