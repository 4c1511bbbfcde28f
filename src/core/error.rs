use thiserror::Error;

/// Conversion failure kinds, worded the way they reach users: per-event
/// recoverable kinds become the event's `error` marker, the rest are sticky
/// on the converter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvError {
    #[error("Invalid arguments supplied")]
    InvalidArgs,
    #[error("Object is in invalid state")]
    InvalidState,
    #[error("Failed parsing the audit log")]
    ParseFailed,
    #[error("Invalid execve record sequence encountered")]
    InvalidExecve,
    #[error("Invalid path record sequence encountered")]
    InvalidPath,
    #[error("An unexpected repeated record type encountered")]
    RepeatedRecord,
    #[error("Output write failed")]
    OutputWrite,
}
