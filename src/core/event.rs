use chrono::{DateTime, Local};

use crate::core::buffer::Buffer;
use crate::core::collect::Collector;
use crate::core::error::ConvError;
use crate::core::format::{EventsPerDoc, Format, Lang};
use crate::core::record::{Event, Stamp};
use crate::core::tree::BufTree;

/// Per-event assembly buffer.
///
/// Builds each event as a buffer tree: the header text, fixed placeholder
/// slots for the `trimmed` and `error` markers, the raw-text echo subtree,
/// the collected data subtree, and the closing text. The placeholder slots
/// let the markers be filled in after all content is known without
/// re-rendering the subtrees. The finished tree is trimmed to the event
/// budget and rendered into the output buffer.
#[derive(Debug)]
pub struct EventBuf {
    format: Format,
    /// Rendered output awaiting a sink write.
    out: Buffer,
    event: BufTree,
    text: BufTree,
    data: BufTree,
    /// The root dispatching collector.
    coll: Collector,
}

impl EventBuf {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            out: Buffer::new(),
            event: BufTree::new(),
            text: BufTree::new(),
            data: BufTree::new(),
            coll: Collector::dispatch(),
        }
    }

    pub fn out(&self) -> &[u8] {
        self.out.as_slice()
    }

    pub fn empty_out(&mut self) {
        self.out.empty();
    }

    /// Append the document prologue to the output buffer.
    pub fn add_prologue(&mut self) {
        let format = self.format.clone();
        self.out.space_opening(&format, 0);
        match format.lang {
            Lang::Xml => {
                self.out
                    .add_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
                // Unfolded level zero gets a line break between the
                // declaration and the root element.
                if format.fold_level > 0 {
                    self.out.add_char(b'\n');
                }
                self.out.space_opening(&format, 0);
                self.out.add_str("<log>");
            }
            Lang::Json => self.out.add_char(b'['),
        }
    }

    /// Append the document epilogue to the output buffer.
    pub fn add_epilogue(&mut self) {
        let format = self.format.clone();
        self.out.space_closing(&format, 0);
        match format.lang {
            Lang::Xml => self.out.add_str("</log>"),
            Lang::Json => self.out.add_char(b']'),
        }
    }

    /// Assemble, trim and render one event into the output buffer. Returns
    /// false if the event produced no output and was dropped.
    pub fn add_event(&mut self, first: bool, event: &Event) -> bool {
        let emitted = self.render_event(first, event);
        self.coll.empty();
        self.event.empty();
        self.text.empty();
        self.data.empty();
        emitted
    }

    fn render_event(&mut self, first: bool, event: &Event) -> bool {
        let format = self.format.clone();
        let level = match format.events_per_doc {
            EventsPerDoc::None => 0,
            _ => 1,
        };
        let mut l = level;
        let timestamp = format_timestamp(&event.stamp);

        // Event header, then the two placeholder slots reserved for the
        // trimmed and error markers.
        let trimmed_idx;
        let error_idx;
        match format.lang {
            Lang::Xml => {
                let buf = self.event.text();
                buf.space_opening(&format, l);
                buf.add_fmt(format_args!(
                    "<event serial=\"{}\" time=\"{}\"",
                    event.stamp.serial, timestamp
                ));
                if let Some(host) = &event.stamp.host {
                    buf.add_str(" node=\"");
                    buf.add_str_xml(host);
                    buf.add_char(b'"');
                }
                self.event.add_text(0);
                trimmed_idx = self.event.node_count();
                self.event.add_text(0);
                error_idx = self.event.node_count();
                self.event.add_text(0);
                self.event.text().add_char(b'>');
                self.event.add_text(0);
                l += 1;

                let buf = self.text.text();
                buf.space_opening(&format, l);
                buf.add_str("<text>");
                self.text.add_text(0);
                let buf = self.data.text();
                buf.space_opening(&format, l);
                buf.add_str("<data>");
                self.data.add_text(0);
            }
            Lang::Json => {
                let buf = self.event.text();
                if !first {
                    buf.add_char(b',');
                }
                buf.space_opening(&format, l);
                buf.add_char(b'{');
                l += 1;
                buf.space_opening(&format, l);
                buf.add_fmt(format_args!("\"serial\":{}", event.stamp.serial));
                buf.add_char(b',');
                buf.space_opening(&format, l);
                buf.add_fmt(format_args!("\"time\":\"{}\"", timestamp));
                if let Some(host) = &event.stamp.host {
                    buf.add_char(b',');
                    buf.space_opening(&format, l);
                    buf.add_str("\"node\":\"");
                    buf.add_str_json(host);
                    buf.add_char(b'"');
                }
                self.event.add_text(0);
                trimmed_idx = self.event.node_count();
                self.event.add_text(0);
                error_idx = self.event.node_count();
                self.event.add_text(0);

                let buf = self.text.text();
                buf.add_char(b',');
                buf.space_opening(&format, l);
                buf.add_str("\"text\":[");
                self.text.add_text(0);
                let buf = self.data.text();
                buf.add_char(b',');
                buf.space_opening(&format, l);
                buf.add_str("\"data\":{");
                self.data.add_text(0);
            }
        }

        l += 1;

        // Feed the records through: raw lines echo into the text subtree,
        // parsed records go to the collectors. The first collector failure
        // stops collection but not the event.
        let mut line_num = 0usize;
        let mut record_num = 0usize;
        let mut error: Option<ConvError> = None;
        for record in &event.records {
            let buf = self.text.text();
            match format.lang {
                Lang::Xml => {
                    buf.space_opening(&format, l);
                    buf.add_str("<line>");
                    buf.add_str_xml(&record.raw);
                    buf.add_str("</line>");
                }
                Lang::Json => {
                    if line_num > 0 {
                        buf.add_char(b',');
                    }
                    buf.space_opening(&format, l);
                    buf.add_char(b'"');
                    buf.add_str_json(&record.raw);
                    buf.add_char(b'"');
                }
            }
            self.text.add_text(line_num);
            line_num += 1;

            if error.is_none() {
                let prio = record_num;
                if let Err(e) =
                    self.coll
                        .add(&mut self.data, &format, &mut record_num, l, prio, record)
                {
                    error = Some(e);
                }
            }
        }

        if error.is_none() {
            let prio = record_num;
            if let Err(e) = self
                .coll
                .end(&mut self.data, &format, &mut record_num, l, prio)
            {
                error = Some(e);
            }
        }

        // Nothing rendered and nothing to report: drop the event.
        if record_num == 0 && error.is_none() {
            return false;
        }

        l -= 1;

        // Terminate the text subtree.
        let buf = self.text.text();
        match format.lang {
            Lang::Xml => {
                buf.space_closing(&format, l);
                buf.add_str("</text>");
            }
            Lang::Json => {
                if line_num > 0 {
                    buf.space_closing(&format, l);
                }
                buf.add_char(b']');
            }
        }
        self.text.add_text(0);

        // Terminate the data subtree, unless it is to be discarded.
        if error.is_none() {
            let buf = self.data.text();
            match format.lang {
                Lang::Xml => {
                    buf.space_closing(&format, l);
                    buf.add_str("</data>");
                }
                Lang::Json => {
                    if record_num > 0 {
                        buf.space_closing(&format, l);
                    }
                    buf.add_char(b'}');
                }
            }
            self.data.add_text(0);
        }

        // Fill the error marker slot.
        if let Some(e) = &error {
            let buf = self.event.text();
            match format.lang {
                Lang::Xml => {
                    buf.add_str(" error=\"");
                    buf.add_str_xml(&e.to_string());
                    buf.add_char(b'"');
                }
                Lang::Json => {
                    buf.add_char(b',');
                    buf.space_opening(&format, l);
                    buf.add_str("\"error\":\"");
                    buf.add_str_json(&e.to_string());
                    buf.add_char(b'"');
                }
            }
            self.event.put_text(error_idx, 0);
        }

        l -= 1;

        // Attach the subtrees ahead of the closer. The text echo stays in
        // place for an errored event even when it was not asked for; the
        // data subtree of an errored event is discarded.
        if format.with_text || error.is_some() {
            self.event.add_tree(1, std::mem::take(&mut self.text));
        }
        if error.is_none() {
            self.event.add_tree(2, std::mem::take(&mut self.data));
        }

        let buf = self.event.text();
        match format.lang {
            Lang::Xml => {
                buf.space_closing(&format, l);
                buf.add_str("</event>");
            }
            Lang::Json => {
                buf.space_closing(&format, l);
                buf.add_char(b'}');
            }
        }
        self.event.add_text(0);

        // Trim to the event budget; a shortened event gets the trimmed
        // marker and a second pass to account for the marker's own bytes.
        let len = self.event.len(false);
        let trimmed_len = self.event.trim(false, true, format.max_event_size);
        if trimmed_len < len {
            let buf = self.event.text();
            match format.lang {
                Lang::Xml => buf.add_str(" trimmed=\"\""),
                Lang::Json => {
                    buf.add_char(b',');
                    buf.space_opening(&format, level + 1);
                    buf.add_str("\"trimmed\":[]");
                }
            }
            self.event.put_text(trimmed_idx, 0);
            self.event.trim(true, true, format.max_event_size);
        }

        self.event.render(&mut self.out);
        true
    }
}

/// Format an event stamp as `YYYY-MM-DDTHH:MM:SS.mmm±HH:MM` in local time.
fn format_timestamp(stamp: &Stamp) -> String {
    match DateTime::from_timestamp(stamp.sec, 0) {
        Some(utc) => {
            let local = utc.with_timezone(&Local);
            format!(
                "{}.{:03}{}",
                local.format("%Y-%m-%dT%H:%M:%S"),
                stamp.milli,
                local.format("%:z")
            )
        }
        // Out-of-range stamps pass through numerically.
        None => format!("@{}.{:03}", stamp.sec, stamp.milli),
    }
}
