//! Record collectors: each consumes the records of one or more types and
//! contributes markup to the event's data tree.

mod dispatch;
mod execve;
mod path;
mod repeated;
mod single;

use crate::core::error::ConvError;
use crate::core::format::{Format, Lang};
use crate::core::record::Record;
use crate::core::tree::BufTree;

use dispatch::DispColl;
use execve::ExecveColl;
use path::PathColl;
use repeated::RepColl;
use single::SingleColl;

/// The concrete collector behaviors.
#[derive(Debug)]
enum Kind {
    Single(SingleColl),
    Repeated(RepColl),
    /// Silently absorbs its records (e.g. `EOE`).
    Drop,
    Execve(ExecveColl),
    Path(PathColl),
    Dispatch(DispColl),
}

/// A record collector with its sequence lifecycle: records are `add`ed, the
/// sequence is closed with `end`, and `empty` rearms the collector for the
/// next event. An `add` or `end` after `end` is an invalid state.
#[derive(Debug)]
pub struct Collector {
    ended: bool,
    kind: Kind,
}

impl Collector {
    pub fn single(unique: bool) -> Self {
        Self::with_kind(Kind::Single(SingleColl::new(unique)))
    }

    pub fn unique() -> Self {
        Self::single(true)
    }

    pub fn repeated(name: &'static str) -> Self {
        Self::with_kind(Kind::Repeated(RepColl::new(name)))
    }

    pub fn absorbing() -> Self {
        Self::with_kind(Kind::Drop)
    }

    pub fn execve() -> Self {
        Self::with_kind(Kind::Execve(ExecveColl::new()))
    }

    pub fn path() -> Self {
        Self::with_kind(Kind::Path(PathColl::new()))
    }

    /// The root collector: dispatches records by type name to the standard
    /// collector table.
    pub fn dispatch() -> Self {
        Self::with_kind(Kind::Dispatch(DispColl::new()))
    }

    fn with_kind(kind: Kind) -> Self {
        Self { ended: false, kind }
    }

    /// True if no record sequence has been accumulated yet.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            Kind::Single(coll) => coll.is_empty(),
            Kind::Repeated(coll) => coll.is_empty(),
            Kind::Drop => true,
            Kind::Execve(coll) => coll.is_empty(),
            Kind::Path(coll) => coll.is_empty(),
            Kind::Dispatch(coll) => coll.is_empty(),
        }
    }

    /// Discard accumulated state and rearm for the next sequence.
    pub fn empty(&mut self) {
        match &mut self.kind {
            Kind::Single(coll) => coll.empty(),
            Kind::Repeated(coll) => coll.empty(),
            Kind::Drop => {}
            Kind::Execve(coll) => coll.empty(),
            Kind::Path(coll) => coll.empty(),
            Kind::Dispatch(coll) => coll.empty(),
        }
        self.ended = false;
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Add one record of the event's sequence. May commit markup to the
    /// container tree immediately or just accumulate; `count` advances by
    /// one for every committed record.
    pub fn add(
        &mut self,
        container: &mut BufTree,
        format: &Format,
        count: &mut usize,
        level: usize,
        prio: usize,
        record: &Record,
    ) -> Result<(), ConvError> {
        if self.ended {
            return Err(ConvError::InvalidState);
        }
        match &mut self.kind {
            Kind::Single(coll) => coll.add(container, format, count, level, prio, record),
            Kind::Repeated(coll) => coll.add(format, level, record),
            Kind::Drop => Ok(()),
            Kind::Execve(coll) => coll.add(format, level, record),
            Kind::Path(coll) => coll.add(format, level, record),
            Kind::Dispatch(coll) => coll.add(container, format, count, level, prio, record),
        }
    }

    /// Close the event's record sequence, flushing buffered state into the
    /// container tree. A no-op for an empty collector.
    pub fn end(
        &mut self,
        container: &mut BufTree,
        format: &Format,
        count: &mut usize,
        level: usize,
        prio: usize,
    ) -> Result<(), ConvError> {
        if self.ended {
            return Err(ConvError::InvalidState);
        }
        let result = if self.is_empty() {
            Ok(())
        } else {
            match &mut self.kind {
                Kind::Single(_) | Kind::Drop => Ok(()),
                Kind::Repeated(coll) => coll.end(container, format, count, level, prio),
                Kind::Execve(coll) => coll.end(container, format, count, level, prio),
                Kind::Path(coll) => coll.end(container, format, count, level, prio),
                Kind::Dispatch(coll) => coll.end(container, format, count, level, prio),
            }
        };
        self.ended = true;
        result
    }
}

/// Commit the separating comma preceding a record committed to a JSON
/// container, as its own node at the record's priority so trimming drops the
/// two together.
fn commit_separator(container: &mut BufTree, format: &Format, count: usize, prio: usize) {
    if format.lang == Lang::Json && count > 0 {
        container.text().add_char(b',');
        container.add_text(prio);
    }
}
