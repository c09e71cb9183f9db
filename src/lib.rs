//! `mailsplit`: pull attachments out of a MIME message.
//!
//! A multipart message is parsed once; every part whose
//! `Content-Disposition` is `attachment` with a filename is decoded into an
//! output directory, and the message is re-serialized without those parts.
//! Everything else is copied through byte for byte.
//!
//! ```no_run
//! let raw = std::fs::read_to_string("message.eml")?;
//! let stripped = mailsplit::process(&raw, std::path::Path::new("out"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod model;
pub mod parser;
pub mod split;

pub use error::{MailsplitError, Result};
pub use split::{process, SplitOptions, SplitOutcome, Splitter};
