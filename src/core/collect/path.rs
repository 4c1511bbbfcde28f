use crate::core::collect::commit_separator;
use crate::core::error::ConvError;
use crate::core::field;
use crate::core::format::{Format, Lang};
use crate::core::record::Record;
use crate::core::tree::BufTree;

/// Maximum accepted path item index.
const MAX_ITEM_IDX: usize = 255;

/// Collector reassembling `PATH` records by their `item=N` index.
///
/// Items may arrive in any order; each is rendered into the positional node
/// slot its index maps to, so a duplicate index shows up as an occupied slot
/// and a missing one as a hole failing the solidity check at `end`.
#[derive(Debug)]
pub(super) struct PathColl {
    tree: BufTree,
}

impl PathColl {
    pub(super) fn new() -> Self {
        Self {
            tree: BufTree::new(),
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub(super) fn empty(&mut self) {
        self.tree.empty();
    }

    pub(super) fn add(
        &mut self,
        format: &Format,
        level: usize,
        record: &Record,
    ) -> Result<(), ConvError> {
        let mut l = level;

        if self.tree.is_empty() {
            let buf = self.tree.text();
            buf.space_opening(format, l);
            match format.lang {
                Lang::Xml => buf.add_str("<path>"),
                Lang::Json => buf.add_str("\"path\":["),
            }
            self.tree.add_text(0);
        }

        l += 1;
        let buf = self.tree.text();
        buf.space_opening(format, l);
        match format.lang {
            Lang::Xml => buf.add_str("<item>"),
            Lang::Json => buf.add_char(b'{'),
        }
        l += 1;

        let mut first_field = true;
        let mut item_idx = None;
        for fld in &record.fields {
            match fld.name.as_str() {
                "type" | "node" => {}
                "item" => {
                    if item_idx.is_some() {
                        return Err(ConvError::InvalidPath);
                    }
                    let idx: usize = fld.raw.parse().map_err(|_| ConvError::InvalidPath)?;
                    if idx > MAX_ITEM_IDX {
                        return Err(ConvError::InvalidPath);
                    }
                    item_idx = Some(idx);
                }
                _ => {
                    field::format_field(self.tree.text(), format, l, first_field, fld);
                    first_field = false;
                }
            }
        }
        let idx = item_idx.ok_or(ConvError::InvalidPath)?;

        l -= 1;
        let buf = self.tree.text();
        buf.space_closing(format, l);
        match format.lang {
            Lang::Xml => buf.add_str("</item>"),
            Lang::Json => buf.add_char(b'}'),
        }

        // Commit into the slot the index maps to; JSON leaves even slots
        // free for the separators inserted at end.
        let node_idx = match format.lang {
            Lang::Json => idx * 2,
            Lang::Xml => idx,
        } + 1;
        if self.tree.node_exists(node_idx) {
            return Err(ConvError::InvalidPath);
        }
        self.tree.put_text(node_idx, idx);
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
        // Insert the separators between committed items.
        if format.lang == Lang::Json && self.tree.node_count() > 1 {
            for idx in 1..=(self.tree.node_count() - 1) / 2 {
                self.tree.text().add_char(b',');
                self.tree.put_text(idx * 2, idx);
            }
        }

        // Every index up to the highest must have arrived.
        if !self.tree.is_solid() {
            return Err(ConvError::InvalidPath);
        }

        let has_items = self.tree.node_count() > 1;
        let buf = self.tree.text();
        match format.lang {
            Lang::Xml => {
                buf.space_closing(format, level);
                buf.add_str("</path>");
            }
            Lang::Json => {
                if has_items {
                    buf.space_closing(format, level);
                }
                buf.add_char(b']');
            }
        }
        self.tree.add_text(0);

        commit_separator(container, format, *count, prio);
        container.add_tree(prio, std::mem::take(&mut self.tree));
        *count += 1;
        Ok(())
    }
}
