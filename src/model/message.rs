//! Parsed message structure.
//!
//! Everything borrows from the raw input text, so the rebuilt message can be
//! assembled from untouched slices of the original.

use std::fmt;

/// A single header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField<'a> {
    /// Field name as written (`Content-Type`, `content-type`, ...).
    pub name: &'a str,

    /// Unfolded, trimmed value.
    pub value: String,

    /// Raw text of the whole field, including continuation lines and the
    /// trailing line ending.
    pub raw: &'a str,
}

/// Hierarchical, 1-based position of a part: `"2"`, `"1.3"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(into = "String")]
pub struct PartPath(Vec<usize>);

impl PartPath {
    /// Path of the `index`-th (0-based) child of this path.
    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(index + 1);
        Self(segments)
    }
}

impl fmt::Display for PartPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<PartPath> for String {
    fn from(path: PartPath) -> Self {
        path.to_string()
    }
}

/// A top-level message whose body is a multipart container.
#[derive(Debug, Clone)]
pub struct ParsedMessage<'a> {
    /// Top-level header fields in original order.
    pub headers: Vec<HeaderField<'a>>,

    /// Raw header block, including the line ending of the last field.
    pub head: &'a str,

    /// The empty line separating headers from body.
    pub separator: &'a str,

    /// The multipart body.
    pub body: Multipart<'a>,
}

/// A boundary-delimited container.
#[derive(Debug, Clone)]
pub struct Multipart<'a> {
    /// Lower-cased media type, e.g. `multipart/mixed`.
    pub media_type: String,

    /// Boundary token, without the leading `--`.
    pub boundary: String,

    /// Text before the first delimiter line.
    pub preamble: &'a str,

    /// Body parts in original order.
    pub parts: Vec<Part<'a>>,

    /// The closing delimiter itself (`--boundary--`).
    pub close: &'a str,

    /// Everything after the closing delimiter, starting with the rest of its
    /// line.
    pub epilogue: &'a str,
}

/// One body part of a multipart container.
#[derive(Debug, Clone)]
pub struct Part<'a> {
    /// Position of this part in the message.
    pub path: PartPath,

    /// The opening delimiter line, including its line ending.
    pub delimiter: &'a str,

    /// The part's own headers and body.
    pub entity: Entity<'a>,

    /// Line ending that preceded the following delimiter. Empty when the
    /// part content was empty.
    pub trailer: &'a str,
}

/// Headers plus body of a part.
#[derive(Debug, Clone)]
pub struct Entity<'a> {
    /// Header fields in original order.
    pub headers: Vec<HeaderField<'a>>,

    /// Raw header block.
    pub head: &'a str,

    /// The empty line after the header block (may be empty if the part has no
    /// body).
    pub separator: &'a str,

    /// Raw (still transfer-encoded) body text.
    pub body: &'a str,

    /// Structure of the body.
    pub content: Content<'a>,
}

/// What an entity body contains.
#[derive(Debug, Clone)]
pub enum Content<'a> {
    /// An ordinary body, handled as opaque bytes.
    Single,

    /// A nested multipart container.
    Multipart(Multipart<'a>),

    /// A `multipart/*` body that could not be split; kept verbatim.
    Unreadable(String),
}

impl<'a> Entity<'a> {
    /// First value of the named header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        crate::parser::header::header_value(&self.headers, name)
    }
}

impl<'a> ParsedMessage<'a> {
    /// First value of the named top-level header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        crate::parser::header::header_value(&self.headers, name)
    }
}
