/// Event timestamp triple with the optional origin host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub sec: i64,
    pub milli: u32,
    pub serial: u64,
    pub host: Option<String>,
}

impl Stamp {
    /// True if both stamps identify the same event.
    pub fn same_event(&self, other: &Stamp) -> bool {
        self.sec == other.sec && self.milli == other.milli && self.serial == other.serial
    }
}

/// How a field value arrived on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Quoted or hex-encoded in transport; the raw form carries no extra
    /// information over the interpreted one.
    Escaped,
    /// Passed through as transmitted.
    Plain,
}

/// A key=value pair of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// The value as transmitted.
    pub raw: String,
    /// The human-readable form (unquoted, hex-decoded).
    pub interpreted: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        raw: impl Into<String>,
        interpreted: impl Into<String>,
        kind: FieldKind,
    ) -> Self {
        Self {
            name: name.into(),
            raw: raw.into(),
            interpreted: interpreted.into(),
            kind,
        }
    }

    /// The raw form to emit next to the interpreted one, when it adds
    /// anything.
    pub fn raw_to_show(&self) -> Option<&str> {
        match self.kind {
            FieldKind::Escaped => None,
            FieldKind::Plain => (self.raw != self.interpreted).then_some(self.raw.as_str()),
        }
    }
}

/// One line of audit log: a type name and its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub type_name: String,
    /// The source line as received.
    pub raw: String,
    pub fields: Vec<Field>,
}

/// A sequence of records sharing one timestamp triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub stamp: Stamp,
    pub records: Vec<Record>,
}
