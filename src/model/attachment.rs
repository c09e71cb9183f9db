//! Attachment classification and saved-attachment metadata.

use std::path::PathBuf;

use crate::parser::header::{decode_encoded_words, parse_media_type, HeaderError};

use super::message::{Entity, PartPath};

/// How a part's `Content-Disposition` header classifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No `Content-Disposition` header, or an empty one.
    NoDisposition,

    /// The header is present but does not parse.
    Invalid(HeaderError),

    /// A disposition type other than `attachment*` (usually `inline`).
    NotAttachment(String),

    /// `attachment` disposition without a usable `filename` parameter.
    MissingFilename,

    /// A named attachment. `filename` is the decoded, unsanitized name.
    Attachment { filename: String },
}

impl Classification {
    /// Classify an entity by its `Content-Disposition` header.
    ///
    /// The type prefix match runs on the parsed (lower-cased) type, so
    /// `Attachment` and `attachment-ish` both count.
    pub fn of(entity: &Entity<'_>) -> Self {
        let disposition = match entity.header("Content-Disposition") {
            Some(d) if !d.trim().is_empty() => d,
            _ => return Self::NoDisposition,
        };

        let parsed = match parse_media_type(disposition) {
            Ok(p) => p,
            Err(e) => return Self::Invalid(e),
        };

        if !parsed.value.starts_with("attachment") {
            return Self::NotAttachment(parsed.value);
        }

        match parsed.param("filename") {
            Some(name) if !name.is_empty() => Self::Attachment {
                filename: decode_encoded_words(name),
            },
            _ => Self::MissingFilename,
        }
    }
}

/// An attachment written to disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SavedAttachment {
    /// Position of the part in the message.
    pub part: PartPath,

    /// Filename as declared by the message (decoded).
    pub original_name: String,

    /// Sanitized name used on disk, before collision handling.
    pub file_name: String,

    /// Where the bytes were written.
    pub path: PathBuf,

    /// Decoded size in bytes.
    pub size: u64,
}
