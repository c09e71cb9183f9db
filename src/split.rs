//! Coordinator: parse a message once, extract its attachments, then rebuild
//! it without them.

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::events::{EventSink, TracingSink};
use crate::export::attachment::{extract_attachments, CollisionPolicy};
use crate::export::eml::{rebuild_message, verify_rebuilt, HeaderLayout};
use crate::model::attachment::SavedAttachment;
use crate::parser::mime::{parse_message, MAX_DEPTH};

/// Knobs for one split run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// File name collision handling in the output directory.
    pub on_collision: CollisionPolicy,
    /// Top-level header layout of the rebuilt message.
    pub header_layout: HeaderLayout,
    /// Nested multipart levels to descend into (0 = top-level parts only).
    pub max_depth: usize,
    /// Re-read the rebuilt message before returning it.
    pub verify: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            on_collision: CollisionPolicy::default(),
            header_layout: HeaderLayout::default(),
            max_depth: MAX_DEPTH,
            verify: false,
        }
    }
}

impl From<&Config> for SplitOptions {
    fn from(config: &Config) -> Self {
        Self {
            on_collision: config.extract.on_collision,
            header_layout: config.rebuild.header_layout,
            max_depth: config.extract.max_depth,
            verify: config.rebuild.verify,
        }
    }
}

/// Result of a successful split.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    /// The message text without attachment parts.
    pub message: String,
    /// Attachments written to the output directory, in message order.
    pub saved: Vec<SavedAttachment>,
}

/// Runs extraction and rebuilding with a fixed set of options and an event sink.
pub struct Splitter {
    options: SplitOptions,
    sink: Arc<dyn EventSink>,
}

impl Splitter {
    /// A splitter reporting to [`TracingSink`].
    pub fn new(options: SplitOptions) -> Self {
        Self {
            options,
            sink: Arc::new(TracingSink),
        }
    }

    /// Report events to `sink` instead.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Save the attachments of `raw` into `output_dir` (which must exist) and
    /// return the message without them.
    ///
    /// Extraction runs first; if it fails, nothing is rebuilt. If rebuilding
    /// fails after extraction succeeded, the written files stay on disk.
    pub fn process(&self, raw: &str, output_dir: &Path) -> Result<SplitOutcome> {
        let message = parse_message(raw, self.options.max_depth)?;

        let saved = extract_attachments(
            &message,
            output_dir,
            self.options.on_collision,
            self.sink.as_ref(),
        )?;

        let rebuilt = rebuild_message(&message, self.options.header_layout, self.sink.as_ref())?;

        if self.options.verify {
            verify_rebuilt(&rebuilt, &message.body.boundary)?;
        }

        Ok(SplitOutcome {
            message: rebuilt,
            saved,
        })
    }
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(SplitOptions::default())
    }
}

/// Save the attachments of `raw` into `output_dir` and return the message
/// without them, using default options.
pub fn process(raw: &str, output_dir: &Path) -> Result<String> {
    Splitter::default()
        .process(raw, output_dir)
        .map(|outcome| outcome.message)
}
