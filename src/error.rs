//! Error types and the crate-wide `Result<T>`.
//!
//! Three kinds of failure surface from the reader:
//!
//! - [`Error::Record`]: a structural problem in parsed ZIP bytes
//! - [`Error::Io`]: a failure in the byte source or the multipart reader
//! - [`Error::NotFound`]: a requested entry name absent from the archive
//!
//! Parse errors are never recovered locally; every validation failure
//! unwinds to the caller with its original message.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for archive reading and extraction.
#[derive(Debug, Error)]
pub enum Error {
    /// An error from the byte source or the multipart reader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A ZIP structure failed to parse or validate.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A requested entry name is not present in the Central Directory map.
    #[error("no entry named `{0}` in the archive")]
    NotFound(String),

    /// A caller violated an API precondition (e.g. an empty name list).
    #[error("{0}")]
    Precondition(&'static str),

    /// The byte source was closed and can no longer serve reads.
    #[error("byte source is closed")]
    Closed,
}

/// A structural problem in parsed ZIP bytes.
///
/// The message names the field that failed validation. When the failure was
/// not a validation check, the cause distinguishes buffer underflow
/// ([`RecordCause::Incomplete`]) from anything else ([`RecordCause::Unknown`]).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RecordError {
    message: String,
    #[source]
    cause: Option<RecordCause>,
}

/// Why a record failed to parse, when the reason was not a field validation.
#[derive(Debug, Error)]
pub enum RecordCause {
    /// The buffer ended before the record did.
    #[error("Incomplete")]
    Incomplete(#[source] std::io::Error),

    /// Any other unexpected failure while decoding.
    #[error("Unknown")]
    Unknown(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RecordError {
    /// A field-level validation failure; `message` identifies the field.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        RecordError {
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap an I/O failure raised while reading record bytes. Underflow
    /// becomes [`RecordCause::Incomplete`], everything else
    /// [`RecordCause::Unknown`].
    pub(crate) fn from_read(record: &'static str, err: std::io::Error) -> Self {
        let cause = if err.kind() == std::io::ErrorKind::UnexpectedEof {
            RecordCause::Incomplete(err)
        } else {
            RecordCause::Unknown(Box::new(err))
        };
        RecordError {
            message: format!("{record} ended unexpectedly"),
            cause: Some(cause),
        }
    }

    /// Wrap a non-I/O decoding failure as [`RecordCause::Unknown`].
    pub(crate) fn unknown(
        record: &'static str,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RecordError {
            message: format!("{record} could not be decoded"),
            cause: Some(RecordCause::Unknown(Box::new(err))),
        }
    }

    /// The message naming the failed field or record.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wrapped cause, when the failure was not a validation check.
    pub fn cause(&self) -> Option<&RecordCause> {
        self.cause.as_ref()
    }

    /// True if this error wraps a buffer underflow.
    pub fn is_incomplete(&self) -> bool {
        matches!(self.cause, Some(RecordCause::Incomplete(_)))
    }
}
