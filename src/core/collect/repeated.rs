use crate::core::buffer::Buffer;
use crate::core::collect::commit_separator;
use crate::core::error::ConvError;
use crate::core::field;
use crate::core::format::{Format, Lang};
use crate::core::record::Record;
use crate::core::tree::BufTree;

/// Collector aggregating any number of same-type records into one named
/// container: the raw lines joined by newlines plus an `items` array of the
/// per-record field maps. Committed on `end`.
#[derive(Debug)]
pub(super) struct RepColl {
    /// Name of the output container.
    name: &'static str,
    /// Raw log lines, newline-separated.
    lines: Buffer,
    /// Pre-rendered item markup.
    items: Buffer,
}

impl RepColl {
    pub(super) fn new(name: &'static str) -> Self {
        Self {
            name,
            lines: Buffer::new(),
            items: Buffer::new(),
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.items.is_empty()
    }

    pub(super) fn empty(&mut self) {
        self.lines.empty();
        self.items.empty();
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

        if !self.lines.is_empty() {
            self.lines.add_char(b'\n');
        }
        self.lines.add_str(&record.raw);

        match format.lang {
            Lang::Xml => {
                self.items.space_opening(format, l);
                self.items.add_str("<item>");
                field::format_fields(&mut self.items, format, l + 1, record);
                self.items.space_closing(format, l);
                self.items.add_str("</item>");
            }
            Lang::Json => {
                if !self.items.is_empty() {
                    self.items.add_char(b',');
                }
                self.items.space_opening(format, l);
                self.items.add_char(b'{');
                let wrote = field::format_fields(&mut self.items, format, l + 1, record);
                if wrote {
                    self.items.space_closing(format, l);
                }
                self.items.add_char(b'}');
            }
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
        commit_separator(container, format, *count, prio);
        let items_empty = self.items.is_empty();
        let buf = container.text();
        match format.lang {
            Lang::Xml => {
                buf.space_opening(format, level);
                buf.add_fmt(format_args!("<{} raw=\"", self.name));
                buf.add_xml_escaped(self.lines.as_slice());
                buf.add_str("\">");
                buf.add_bytes(self.items.as_slice());
                buf.space_closing(format, level);
                buf.add_fmt(format_args!("</{}>", self.name));
            }
            Lang::Json => {
                buf.space_opening(format, level);
                buf.add_fmt(format_args!("\"{}\":{{", self.name));
                buf.space_opening(format, level + 1);
                buf.add_str("\"raw\":\"");
                buf.add_json_escaped(self.lines.as_slice());
                buf.add_str("\",");
                buf.space_opening(format, level + 1);
                buf.add_str("\"items\":[");
                buf.add_bytes(self.items.as_slice());
                if !items_empty {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collect::testing::record;

    fn bare_json() -> Format {
        Format {
            fold_level: 0,
            ..Format::default()
        }
    }

    fn render(tree: &BufTree) -> String {
        let mut out = Buffer::new();
        tree.render(&mut out);
        String::from_utf8(out.as_slice().to_vec()).expect("rendered bytes should be UTF-8")
    }

    #[test]
    fn test_three_records_aggregate() {
        let format = bare_json();
        let mut coll = RepColl::new("avc");
        let mut tree = BufTree::new();
        let mut count = 0;
        let records = [
            record("AVC", &[("pid", "1")]),
            record("AVC", &[("pid", "2")]),
            record("AVC", &[("pid", "3")]),
        ];
        for rec in &records {
            coll.add(&format, 0, rec).expect("add should succeed");
        }
        coll.end(&mut tree, &format, &mut count, 0, 0)
            .expect("end should succeed");
        assert_eq!(count, 1);
        let raw = records
            .iter()
            .map(|r| r.raw.as_str())
            .collect::<Vec<_>>()
            .join("\\n");
        assert_eq!(
            render(&tree),
            format!(
                "\"avc\":{{\"raw\":\"{raw}\",\
                 \"items\":[{{\"pid\":[\"1\"]}},{{\"pid\":[\"2\"]}},{{\"pid\":[\"3\"]}}]}}"
            )
        );
    }

    #[test]
    fn test_empty_then_rearmed() {
        let format = bare_json();
        let mut coll = RepColl::new("obj_pid");
        assert!(coll.is_empty());
        coll.add(&format, 0, &record("OBJ_PID", &[("opid", "7")]))
            .expect("add should succeed");
        assert!(!coll.is_empty());
        coll.empty();
        assert!(coll.is_empty());
    }
}
