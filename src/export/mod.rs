//! The two passes over a parsed message: attachment extraction and
//! attachment-free message rebuilding.

pub mod attachment;
pub mod eml;
