use crate::core::buffer::Buffer;
use crate::core::format::{Format, Lang};
use crate::core::record::{Field, Record};

/// Render one field as `<name i="…" [r="…"]/>` or `"name":[i[, r]]`.
pub fn format_field(buf: &mut Buffer, format: &Format, level: usize, first: bool, field: &Field) {
    let raw = field.raw_to_show();
    match format.lang {
        Lang::Xml => {
            buf.space_opening(format, level);
            buf.add_char(b'<');
            buf.add_str(&field.name);
            buf.add_str(" i=\"");
            buf.add_str_xml(&field.interpreted);
            if let Some(raw) = raw {
                buf.add_str("\" r=\"");
                buf.add_str_xml(raw);
            }
            buf.add_str("\"/>");
        }
        Lang::Json => {
            if !first {
                buf.add_char(b',');
            }
            buf.space_opening(format, level);
            buf.add_char(b'"');
            buf.add_str(&field.name);
            buf.add_str("\":[");
            buf.space_opening(format, level + 1);
            buf.add_char(b'"');
            buf.add_str_json(&field.interpreted);
            buf.add_char(b'"');
            if let Some(raw) = raw {
                buf.add_char(b',');
                buf.space_opening(format, level + 1);
                buf.add_char(b'"');
                buf.add_str_json(raw);
                buf.add_char(b'"');
            }
            buf.space_closing(format, level);
            buf.add_char(b']');
        }
    }
}

/// Render every field of a record except the `type` and `node`
/// pseudo-fields. Returns true if anything was written.
pub fn format_fields(buf: &mut Buffer, format: &Format, level: usize, record: &Record) -> bool {
    let mut first = true;
    for field in &record.fields {
        if field.name == "type" || field.name == "node" {
            continue;
        }
        format_field(buf, format, level, first, field);
        first = false;
    }
    !first
}
