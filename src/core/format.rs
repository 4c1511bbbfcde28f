use clap::ValueEnum;

/// Output language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Lang {
    Xml,
    Json,
}

impl Default for Lang {
    fn default() -> Self {
        Self::Json
    }
}

/// Amount of events wrapped into each output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventsPerDoc {
    /// Bare output: no document wrapping and no event separators.
    None,
    /// At most this many events per document.
    Count(usize),
    /// Close a document once its rendered events reach this many bytes.
    Bytes(usize),
    /// All events in a single document, even if there are none.
    All,
}

/// Output format, immutable for the lifetime of a converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    pub lang: Lang,
    /// Syntactic nesting level at which the output is folded into a single
    /// line. Zero folds the whole output; `usize::MAX` unfolds it fully.
    pub fold_level: usize,
    /// Initial indentation of each output line, in spaces.
    pub init_indent: usize,
    /// Indentation for each nesting level, in spaces.
    pub nest_indent: usize,
    pub events_per_doc: EventsPerDoc,
    /// Echo the source text lines inside each event.
    pub with_text: bool,
    /// Hard per-event byte budget.
    pub max_event_size: usize,
}

impl Format {
    /// Smallest accepted event budget: admits the event framing plus the
    /// trimmed and error markers in either language.
    pub const MIN_MAX_EVENT_SIZE: usize = 512;

    pub fn is_valid(&self) -> bool {
        self.max_event_size >= Self::MIN_MAX_EVENT_SIZE
    }
}

impl Default for Format {
    fn default() -> Self {
        Self {
            lang: Lang::default(),
            fold_level: 5,
            init_indent: 0,
            nest_indent: 4,
            events_per_doc: EventsPerDoc::All,
            with_text: false,
            max_event_size: usize::MAX,
        }
    }
}
