//! Email parsing: header fields, media-type parameters, and MIME structure.

pub mod header;
pub mod mime;
