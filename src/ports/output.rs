use std::io;

/// Byte sink contract for rendered documents.
pub trait OutputSink {
    /// True if the sink accepts arbitrary byte fragments; false if every
    /// write must be a complete framed message.
    fn is_continuous(&self) -> bool;

    /// Write one piece of rendered output.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
}
