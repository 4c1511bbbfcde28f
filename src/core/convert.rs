use crate::core::error::ConvError;
use crate::core::event::EventBuf;
use crate::core::format::{EventsPerDoc, Format};
use crate::core::record::Event;
use crate::ports::output::OutputSink;
use crate::ports::parser::LogParser;

/// Raw audit log converter: pumps bytes through the parser, renders each
/// assembled event, and frames events into documents according to the
/// format's `events_per_doc` mode.
///
/// The first invalid-state, parse or output failure is sticky: it is
/// returned from every subsequent call until the converter is dropped, and
/// nothing further is written to the sink.
pub struct Converter<P: LogParser> {
    parser: P,
    format: Format,
    output: Box<dyn OutputSink>,
    buf: EventBuf,
    begun: bool,
    ended: bool,
    doc_open: bool,
    /// Events emitted into the open document.
    doc_events: usize,
    /// Rendered event bytes emitted into the open document.
    doc_bytes: usize,
    sticky: Option<ConvError>,
}

impl<P: LogParser> std::fmt::Debug for Converter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter").finish_non_exhaustive()
    }
}

impl<P: LogParser> Converter<P> {
    pub fn new(format: Format, parser: P, output: Box<dyn OutputSink>) -> Result<Self, ConvError> {
        if !format.is_valid() {
            return Err(ConvError::InvalidArgs);
        }
        Ok(Self {
            parser,
            buf: EventBuf::new(format.clone()),
            format,
            output,
            begun: false,
            ended: false,
            doc_open: false,
            doc_events: 0,
            doc_bytes: 0,
            sticky: None,
        })
    }

    /// Begin document output. Must be called once before `input`, `flush`
    /// and `end`. Only the whole-stream document mode opens its document
    /// here, so an empty stream still yields one well-formed document.
    pub fn begin(&mut self) -> Result<(), ConvError> {
        self.check_sticky()?;
        if self.begun {
            return self.stick(ConvError::InvalidState);
        }
        self.begun = true;
        if self.format.events_per_doc == EventsPerDoc::All {
            self.buf.empty_out();
            self.buf.add_prologue();
            self.write_out()?;
            self.doc_open = true;
        }
        Ok(())
    }

    /// Feed a piece of raw audit log, emitting any events that complete.
    pub fn input(&mut self, bytes: &[u8]) -> Result<(), ConvError> {
        self.check_sticky()?;
        if !self.begun || self.ended {
            return self.stick(ConvError::InvalidState);
        }
        if let Err(e) = self.parser.feed(bytes) {
            return self.stick(e);
        }
        self.drain()
    }

    /// Process any input still buffered in the parser.
    pub fn flush(&mut self) -> Result<(), ConvError> {
        self.check_sticky()?;
        if !self.begun || self.ended {
            return self.stick(ConvError::InvalidState);
        }
        if let Err(e) = self.parser.flush() {
            return self.stick(e);
        }
        self.drain()
    }

    /// End document output, closing the open document if any.
    pub fn end(&mut self) -> Result<(), ConvError> {
        self.check_sticky()?;
        if !self.begun || self.ended {
            return self.stick(ConvError::InvalidState);
        }
        self.ended = true;
        if self.doc_open {
            self.buf.empty_out();
            self.buf.add_epilogue();
            self.write_out()?;
            self.doc_open = false;
        }
        Ok(())
    }

    fn check_sticky(&self) -> Result<(), ConvError> {
        match &self.sticky {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn stick(&mut self, e: ConvError) -> Result<(), ConvError> {
        if self.sticky.is_none() {
            self.sticky = Some(e.clone());
        }
        Err(e)
    }

    fn drain(&mut self) -> Result<(), ConvError> {
        while let Some(event) = self.parser.pop_event() {
            if let Err(e) = self.process_event(&event) {
                return self.stick(e);
            }
        }
        Ok(())
    }

    fn process_event(&mut self, event: &Event) -> Result<(), ConvError> {
        self.buf.empty_out();

        // Counted and byte-bounded documents open lazily before the event.
        let opened = match self.format.events_per_doc {
            EventsPerDoc::Count(_) | EventsPerDoc::Bytes(_) if !self.doc_open => {
                self.buf.add_prologue();
                self.doc_open = true;
                self.doc_events = 0;
                self.doc_bytes = 0;
                true
            }
            _ => false,
        };

        let first = match self.format.events_per_doc {
            EventsPerDoc::None => true,
            _ => self.doc_events == 0,
        };
        let prologue_len = self.buf.out().len();
        if !self.buf.add_event(first, event) {
            // Dropped event: forget the unwritten lazy prologue.
            if opened {
                self.doc_open = false;
            }
            return Ok(());
        }
        let event_bytes = self.buf.out().len() - prologue_len;
        self.write_out()?;
        self.doc_events += 1;
        self.doc_bytes += event_bytes;

        match self.format.events_per_doc {
            EventsPerDoc::Count(limit) if self.doc_events >= limit => self.close_doc(),
            EventsPerDoc::Bytes(limit) if self.doc_bytes >= limit => self.close_doc(),
            _ => Ok(()),
        }
    }

    fn close_doc(&mut self) -> Result<(), ConvError> {
        self.buf.empty_out();
        self.buf.add_epilogue();
        self.write_out()?;
        self.doc_open = false;
        self.doc_events = 0;
        self.doc_bytes = 0;
        Ok(())
    }

    fn write_out(&mut self) -> Result<(), ConvError> {
        if self.buf.out().is_empty() {
            return Ok(());
        }
        if self.output.write(self.buf.out()).is_err() {
            self.sticky = Some(ConvError::OutputWrite);
            return Err(ConvError::OutputWrite);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    use crate::adapters::parser::FeedParser;
    use crate::core::format::Lang;

    /// Sink collecting every write as a separate message.
    struct VecSink {
        writes: Rc<RefCell<Vec<Vec<u8>>>>,
        fail: bool,
    }

    impl OutputSink for VecSink {
        fn is_continuous(&self) -> bool {
            true
        }

        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::other("sink failure"));
            }
            self.writes.borrow_mut().push(bytes.to_vec());
            Ok(())
        }
    }

    fn sink() -> (Rc<RefCell<Vec<Vec<u8>>>>, Box<dyn OutputSink>) {
        let writes = Rc::new(RefCell::new(Vec::new()));
        (
            writes.clone(),
            Box::new(VecSink {
                writes,
                fail: false,
            }),
        )
    }

    fn format(events_per_doc: EventsPerDoc) -> Format {
        Format {
            lang: Lang::Json,
            fold_level: 0,
            events_per_doc,
            ..Format::default()
        }
    }

    fn line(serial: u64) -> String {
        format!("type=SYSCALL msg=audit(1.000:{serial}): a0={serial}\n")
    }

    fn convert(format: Format, input: &str) -> Vec<String> {
        let (writes, output) = sink();
        let mut conv = Converter::new(format, FeedParser::new(), output)
            .expect("converter should be created");
        conv.begin().expect("begin should succeed");
        conv.input(input.as_bytes()).expect("input should succeed");
        conv.flush().expect("flush should succeed");
        conv.end().expect("end should succeed");
        let collected = writes
            .borrow()
            .iter()
            .map(|w| String::from_utf8(w.clone()).expect("writes should be UTF-8"))
            .collect();
        collected
    }

    #[test]
    fn test_whole_stream_document() {
        let writes = convert(format(EventsPerDoc::All), &format!("{}{}", line(1), line(2)));
        let doc = writes.concat();
        assert!(doc.starts_with('['));
        assert!(doc.ends_with(']'));
        let value: serde_json::Value =
            serde_json::from_str(&doc).expect("document should be valid JSON");
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_whole_stream_document_empty_input() {
        let writes = convert(format(EventsPerDoc::All), "");
        assert_eq!(writes.concat(), "[]");
    }

    #[test]
    fn test_bare_mode_emits_unwrapped_events() {
        let writes = convert(format(EventsPerDoc::None), &format!("{}{}", line(1), line(2)));
        assert_eq!(writes.len(), 2);
        for write in &writes {
            let value: serde_json::Value =
                serde_json::from_str(write).expect("each event should be valid JSON");
            assert!(value.is_object());
        }
    }

    #[test]
    fn test_one_event_per_document() {
        let writes = convert(
            format(EventsPerDoc::Count(1)),
            &format!("{}{}", line(1), line(2)),
        );
        // Each document: prologue+event write, then epilogue write.
        assert_eq!(writes.len(), 4);
        let first_doc = format!("{}{}", writes[0], writes[1]);
        let value: serde_json::Value =
            serde_json::from_str(&first_doc).expect("document should be valid JSON");
        assert_eq!(value.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_counted_documents_rotate() {
        let writes = convert(
            format(EventsPerDoc::Count(2)),
            &format!("{}{}{}", line(1), line(2), line(3)),
        );
        // First document holds two events, the second the remainder.
        assert_eq!(writes.len(), 5);
        assert!(writes[0].starts_with('['));
        assert!(!writes[1].starts_with('['));
        assert_eq!(writes[2], "]");
        assert!(writes[3].starts_with('['));
        assert_eq!(writes[4], "]");
    }

    #[test]
    fn test_byte_bounded_documents_rotate() {
        let writes = convert(
            format(EventsPerDoc::Bytes(10)),
            &format!("{}{}", line(1), line(2)),
        );
        // Every event exceeds the bound by itself, so each closes its
        // document.
        assert_eq!(writes.len(), 4);
        assert!(writes[0].starts_with('['));
        assert_eq!(writes[1], "]");
        assert!(writes[2].starts_with('['));
        assert_eq!(writes[3], "]");
    }

    #[test]
    fn test_input_before_begin_is_invalid_state() {
        let (_, output) = sink();
        let mut conv = Converter::new(format(EventsPerDoc::All), FeedParser::new(), output)
            .expect("converter should be created");
        let err = conv
            .input(b"type=SYSCALL msg=audit(1.000:1): a0=1\n")
            .expect_err("input before begin must fail");
        assert_eq!(err, ConvError::InvalidState);
        // The failure is sticky.
        let err = conv.begin().expect_err("sticky error must be replayed");
        assert_eq!(err, ConvError::InvalidState);
    }

    #[test]
    fn test_output_failure_is_sticky() {
        let writes = Rc::new(RefCell::new(Vec::new()));
        let output = Box::new(VecSink {
            writes: writes.clone(),
            fail: true,
        });
        let mut conv = Converter::new(format(EventsPerDoc::All), FeedParser::new(), output)
            .expect("converter should be created");
        let err = conv.begin().expect_err("prologue write must fail");
        assert_eq!(err, ConvError::OutputWrite);
        let err = conv.flush().expect_err("sticky error must be replayed");
        assert_eq!(err, ConvError::OutputWrite);
        assert!(writes.borrow().is_empty());
    }

    #[test]
    fn test_undersized_budget_rejected() {
        let bad = Format {
            max_event_size: 16,
            ..format(EventsPerDoc::All)
        };
        let (_, output) = sink();
        let err = Converter::new(bad, FeedParser::new(), output)
            .expect_err("undersized budget must be rejected");
        assert_eq!(err, ConvError::InvalidArgs);
    }
}
