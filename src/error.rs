//! Centralized error types for mailsplit.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailsplit library.
#[derive(Error, Debug)]
pub enum MailsplitError {
    /// I/O error with the associated file path.
    #[error("I/O error writing '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The message framing (header block) could not be parsed.
    #[error("Failed to parse email: {0}")]
    MalformedMessage(String),

    /// The top-level message has no `Content-Type` header.
    #[error("Message has no Content-Type header")]
    MissingContentType,

    /// The top-level `Content-Type` header could not be parsed.
    #[error("Failed to parse content type: {0}")]
    InvalidContentType(String),

    /// The top-level content type is not `multipart/*`.
    #[error("Email is not a multipart email (content type '{0}')")]
    NotMultipart(String),

    /// The multipart content type carries no usable `boundary` parameter.
    #[error("Multipart content type has no boundary parameter")]
    MissingBoundary,

    /// The boundary-delimited body stream is malformed.
    #[error("Malformed multipart body: {0}")]
    MalformedMultipart(String),

    /// A part's `Content-Disposition` header could not be parsed.
    #[error("Invalid Content-Disposition on part {part}: {reason}")]
    InvalidDisposition { part: String, reason: String },

    /// An attachment payload failed to decode.
    #[error("Failed to decode attachment '{filename}': {reason}")]
    Decode { filename: String, reason: String },

    /// The transfer encoding is not a standard MIME encoding.
    #[error("Unsupported transfer encoding: {0}")]
    UnsupportedEncoding(String),

    /// The rebuilt message did not re-parse as a multipart message.
    #[error("Rebuilt message failed verification: {0}")]
    Verification(String),
}

/// Convenience alias for `Result<T, MailsplitError>`.
pub type Result<T> = std::result::Result<T, MailsplitError>;

impl MailsplitError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
