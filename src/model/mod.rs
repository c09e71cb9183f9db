//! Core data model types: parsed message structure and attachment metadata.

pub mod attachment;
pub mod message;
