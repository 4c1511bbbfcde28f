use crate::core::error::ConvError;
use crate::core::record::Event;

/// Streaming audit-log parser contract: the converter pumps raw bytes in and
/// drains assembled events out.
pub trait LogParser {
    /// Feed a chunk of raw log bytes.
    fn feed(&mut self, bytes: &[u8]) -> Result<(), ConvError>;

    /// Process buffered input and close the event in progress.
    fn flush(&mut self) -> Result<(), ConvError>;

    /// Take the next fully assembled event, if any is ready.
    fn pop_event(&mut self) -> Option<Event>;
}
