use std::collections::VecDeque;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::error::ConvError;
use crate::core::record::{Event, Field, FieldKind, Record, Stamp};
use crate::ports::parser::LogParser;

/// Field names whose values travel hex-encoded when they contain
/// unprintable bytes.
const HEX_TRANSPORT_NAMES: &[&str] = &[
    "name", "exe", "comm", "cwd", "dir", "path", "proctitle", "key", "data",
];

static EXECVE_ARG_RE: OnceLock<Regex> = OnceLock::new();

fn execve_arg_re() -> &'static Regex {
    EXECVE_ARG_RE.get_or_init(|| Regex::new(r"^a\d+(\[\d+\])?$").expect("pattern is valid"))
}

/// Feed-driven audit log parser: splits incoming bytes into records, groups
/// records into events by their timestamp triple, and queues events as they
/// complete. An event completes when a record with a different stamp
/// arrives, when an `EOE` record closes it, or on `flush`.
#[derive(Debug, Default)]
pub struct FeedParser {
    /// Bytes of the incomplete trailing line.
    pending: Vec<u8>,
    /// The event being assembled.
    current: Option<Event>,
    /// Completed events awaiting `pop_event`.
    ready: VecDeque<Event>,
}

impl FeedParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_line(&mut self, line: &[u8]) -> Result<(), ConvError> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return Ok(());
        }
        let (stamp, record) = parse_record(line).ok_or(ConvError::ParseFailed)?;

        let same = self
            .current
            .as_ref()
            .is_some_and(|event| event.stamp.same_event(&stamp));
        if !same {
            self.close_current();
            self.current = Some(Event {
                stamp,
                records: Vec::new(),
            });
        }
        let closes_event = record.type_name == "EOE";
        if let Some(event) = &mut self.current {
            event.records.push(record);
        }
        if closes_event {
            self.close_current();
        }
        Ok(())
    }

    fn close_current(&mut self) {
        if let Some(event) = self.current.take() {
            self.ready.push_back(event);
        }
    }
}

impl LogParser for FeedParser {
    fn feed(&mut self, bytes: &[u8]) -> Result<(), ConvError> {
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.take_line(&line[..line.len() - 1])?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConvError> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.take_line(&line)?;
        }
        self.close_current();
        Ok(())
    }

    fn pop_event(&mut self) -> Option<Event> {
        self.ready.pop_front()
    }
}

/// Parse one record line:
/// `[node=HOST ]type=NAME msg=audit(SEC.MILLI:SERIAL): FIELDS...`
fn parse_record(line: &str) -> Option<(Stamp, Record)> {
    let mut rest = line;

    let mut host = None;
    if let Some(after) = rest.strip_prefix("node=") {
        let (value, after) = after.split_once(' ')?;
        host = Some(value.to_string());
        rest = after;
    }

    let after = rest.strip_prefix("type=")?;
    let (type_name, after) = after.split_once(' ')?;
    let after = after.trim_start();

    let after = after.strip_prefix("msg=audit(")?;
    let (stamp_str, fields_str) = after.split_once("):")?;
    let (seconds, serial) = stamp_str.split_once(':')?;
    let (sec, milli) = seconds.split_once('.')?;
    let stamp = Stamp {
        sec: sec.parse().ok()?,
        milli: milli.parse().ok()?,
        serial: serial.parse().ok()?,
        host: host.clone(),
    };

    let mut fields = Vec::new();
    if let Some(host) = host {
        fields.push(Field::new("node", host.clone(), host, FieldKind::Plain));
    }
    fields.push(Field::new("type", type_name, type_name, FieldKind::Plain));
    lex_fields(fields_str, type_name, &mut fields);

    Some((
        stamp,
        Record {
            type_name: type_name.to_string(),
            raw: line.to_string(),
            fields,
        },
    ))
}

/// Split the field section into key=value pairs. Values may be single- or
/// double-quoted, spanning spaces; tokens without `=` are ignored.
fn lex_fields(s: &str, type_name: &str, fields: &mut Vec<Field>) {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && bytes[i] != b' ' && bytes[i] != b'=' {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        let name = &s[start..i];
        i += 1;
        let value_start = i;
        if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
            let quote = bytes[i];
            i += 1;
            while i < bytes.len() && bytes[i] != quote {
                i += 1;
            }
            if i < bytes.len() {
                i += 1;
            }
        } else {
            while i < bytes.len() && bytes[i] != b' ' {
                i += 1;
            }
        }
        if !name.is_empty() {
            fields.push(make_field(name, &s[value_start..i], type_name));
        }
    }
}

/// Build a field from its value token, deriving the interpreted form:
/// quoted values are unquoted, hex-transported values are decoded, the rest
/// pass through.
fn make_field(name: &str, raw: &str, type_name: &str) -> Field {
    if let Some(inner) = unquote(raw) {
        return Field::new(name, raw, inner, FieldKind::Escaped);
    }
    if is_hex_transport_name(name, type_name) && is_hex_value(raw) {
        return Field::new(name, raw, decode_hex(raw), FieldKind::Escaped);
    }
    Field::new(name, raw, raw, FieldKind::Plain)
}

fn unquote(raw: &str) -> Option<&str> {
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Some(&raw[1..raw.len() - 1]);
        }
    }
    None
}

fn is_hex_transport_name(name: &str, type_name: &str) -> bool {
    HEX_TRANSPORT_NAMES.contains(&name)
        || (type_name == "EXECVE" && execve_arg_re().is_match(name))
}

/// The kernel hex-encodes with uppercase digits and whole bytes.
fn is_hex_value(raw: &str) -> bool {
    raw.len() >= 2
        && raw.len() % 2 == 0
        && raw
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

fn decode_hex(raw: &str) -> String {
    let bytes: Vec<u8> = raw
        .as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            let high = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
            let low = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
            (high << 4) | low
        })
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
