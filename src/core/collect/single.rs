use std::collections::HashSet;

use crate::core::collect::commit_separator;
use crate::core::error::ConvError;
use crate::core::field;
use crate::core::format::{Format, Lang};
use crate::core::record::Record;
use crate::core::tree::BufTree;

/// Collector for record types appearing once per event. Each record is
/// committed on `add` as a lowercased-type container holding the raw line
/// and the field map. With `unique` set, a repeated type is an error.
#[derive(Debug)]
pub(super) struct SingleColl {
    unique: bool,
    /// Record type names seen within the current event.
    seen: HashSet<String>,
}

impl SingleColl {
    pub(super) fn new(unique: bool) -> Self {
        Self {
            unique,
            seen: HashSet::new(),
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub(super) fn empty(&mut self) {
        self.seen.clear();
    }

    pub(super) fn add(
        &mut self,
        container: &mut BufTree,
        format: &Format,
        count: &mut usize,
        level: usize,
        prio: usize,
        record: &Record,
    ) -> Result<(), ConvError> {
        if !self.seen.insert(record.type_name.clone()) && self.unique {
            return Err(ConvError::RepeatedRecord);
        }

        commit_separator(container, format, *count, prio);
        let buf = container.text();
        match format.lang {
            Lang::Xml => {
                buf.space_opening(format, level);
                buf.add_char(b'<');
                buf.add_str_lowercase(&record.type_name);
                buf.add_str(" raw=\"");
                buf.add_str_xml(&record.raw);
                buf.add_str("\">");
                field::format_fields(buf, format, level + 1, record);
                buf.space_closing(format, level);
                buf.add_str("</");
                buf.add_str_lowercase(&record.type_name);
                buf.add_char(b'>');
            }
            Lang::Json => {
                buf.space_opening(format, level);
                buf.add_char(b'"');
                buf.add_str_lowercase(&record.type_name);
                buf.add_str("\":{");
                buf.space_opening(format, level + 1);
                buf.add_str("\"raw\":\"");
                buf.add_str_json(&record.raw);
                buf.add_str("\",");
                buf.space_opening(format, level + 1);
                buf.add_str("\"fields\":{");
                let wrote = field::format_fields(buf, format, level + 2, record);
                if wrote {
                    buf.space_closing(format, level + 1);
                }
                buf.add_char(b'}');
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
    use crate::core::buffer::Buffer;
    use crate::core::collect::testing::record;

    fn bare(lang: Lang) -> Format {
        Format {
            lang,
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
    fn test_json_record_markup() {
        let format = bare(Lang::Json);
        let mut coll = SingleColl::new(true);
        let mut tree = BufTree::new();
        let mut count = 0;
        let rec = record("SYSCALL", &[("a0", "1")]);
        coll.add(&mut tree, &format, &mut count, 0, 0, &rec)
            .expect("add should succeed");
        assert_eq!(count, 1);
        let out = render(&tree);
        assert_eq!(
            out,
            format!(
                "\"syscall\":{{\"raw\":\"{}\",\"fields\":{{\"a0\":[\"1\"]}}}}",
                rec.raw
            )
        );
    }

    #[test]
    fn test_xml_record_markup() {
        let format = bare(Lang::Xml);
        let mut coll = SingleColl::new(true);
        let mut tree = BufTree::new();
        let mut count = 0;
        coll.add(&mut tree, &format, &mut count, 0, 0, &record("CWD", &[("cwd", "/root")]))
            .expect("add should succeed");
        let out = render(&tree);
        assert!(out.starts_with("<cwd raw=\""));
        assert!(out.ends_with("<cwd i=\"/root\"/></cwd>"));
    }

    #[test]
    fn test_unique_rejects_repeated_type() {
        let format = bare(Lang::Json);
        let mut coll = SingleColl::new(true);
        let mut tree = BufTree::new();
        let mut count = 0;
        coll.add(&mut tree, &format, &mut count, 0, 0, &record("CRED_ACQ", &[]))
            .expect("first record should be accepted");
        let err = coll
            .add(&mut tree, &format, &mut count, 0, 1, &record("CRED_ACQ", &[]))
            .expect_err("repeated type must be rejected");
        assert_eq!(err, ConvError::RepeatedRecord);
    }

    #[test]
    fn test_non_unique_accepts_repeated_type() {
        let format = bare(Lang::Json);
        let mut coll = SingleColl::new(false);
        let mut tree = BufTree::new();
        let mut count = 0;
        coll.add(&mut tree, &format, &mut count, 0, 0, &record("CRED_ACQ", &[]))
            .expect("first record should be accepted");
        coll.add(&mut tree, &format, &mut count, 0, 1, &record("CRED_ACQ", &[]))
            .expect("repeated type should be accepted without unique");
        assert_eq!(count, 2);
        // Committed records are separated by a comma node.
        assert!(render(&tree).contains("}},\"cred_acq\""));
    }
}
