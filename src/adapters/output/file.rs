use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::ports::output::OutputSink;

/// Continuous sink writing to a file or stdout. Interrupted writes are
/// retried; any other write error is terminal.
pub struct FileOutput {
    inner: Box<dyn Write>,
}

impl FileOutput {
    pub fn stdout() -> Self {
        Self {
            inner: Box::new(io::stdout()),
        }
    }

    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            inner: Box::new(File::create(path)?),
        })
    }
}

impl OutputSink for FileOutput {
    fn is_continuous(&self) -> bool {
        true
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.inner.flush()
    }
}
