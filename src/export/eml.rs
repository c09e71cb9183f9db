//! Rebuild a message without its attachment parts.
//!
//! Retained parts are copied from the input text untouched: delimiter lines,
//! headers, transfer-encoded bodies and line endings all come straight from
//! the original slices.

use mail_parser::{MessageParser, MimeHeaders};

use crate::error::{MailsplitError, Result};
use crate::events::{EventSink, SplitEvent};
use crate::model::attachment::Classification;
use crate::model::message::{Content, Entity, Multipart, ParsedMessage};

/// Top-level header fields emitted first in [`HeaderLayout::Preferred`].
const PREFERRED_ORDER: [&str; 5] = ["From", "To", "Subject", "Content-Type", "MIME-Version"];

/// How the top-level header block of the rebuilt message is laid out.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum HeaderLayout {
    /// The original header block, byte for byte.
    #[default]
    Verbatim,
    /// `From`, `To`, `Subject`, `Content-Type`, `MIME-Version` first, then
    /// every other field in original order.
    Preferred,
}

/// Serialize `message` without the parts classified as attachments.
///
/// Unlike extraction, an unparseable `Content-Disposition` is fatal here: the
/// part cannot be classified, so the message cannot be rebuilt faithfully.
pub fn rebuild_message(
    message: &ParsedMessage<'_>,
    layout: HeaderLayout,
    sink: &dyn EventSink,
) -> Result<String> {
    let mut out = String::new();

    match layout {
        HeaderLayout::Verbatim => out.push_str(message.head),
        HeaderLayout::Preferred => {
            let is_preferred =
                |name: &str| PREFERRED_ORDER.iter().any(|p| p.eq_ignore_ascii_case(name));
            for preferred in PREFERRED_ORDER {
                for field in message.headers.iter().filter(|f| f.name.eq_ignore_ascii_case(preferred)) {
                    out.push_str(field.raw);
                }
            }
            for field in message.headers.iter().filter(|f| !is_preferred(f.name)) {
                out.push_str(field.raw);
            }
        }
    }

    out.push_str(message.separator);
    write_multipart(&mut out, &message.body, sink)?;
    Ok(out)
}

fn write_multipart(out: &mut String, container: &Multipart<'_>, sink: &dyn EventSink) -> Result<()> {
    out.push_str(container.preamble);

    for part in &container.parts {
        match Classification::of(&part.entity) {
            Classification::Attachment { filename } => {
                sink.emit(SplitEvent::PartRemoved {
                    part: part.path.clone(),
                    filename,
                });
                continue;
            }
            Classification::Invalid(e) => {
                return Err(MailsplitError::InvalidDisposition {
                    part: part.path.to_string(),
                    reason: e.to_string(),
                });
            }
            _ => {}
        }

        out.push_str(part.delimiter);
        write_entity(out, &part.entity, sink)?;
        out.push_str(part.trailer);
        sink.emit(SplitEvent::PartRetained {
            part: part.path.clone(),
        });
    }

    out.push_str(container.close);
    out.push_str(container.epilogue);
    Ok(())
}

fn write_entity(out: &mut String, entity: &Entity<'_>, sink: &dyn EventSink) -> Result<()> {
    out.push_str(entity.head);
    out.push_str(entity.separator);
    match &entity.content {
        Content::Multipart(nested) => write_multipart(out, nested, sink),
        Content::Single | Content::Unreadable(_) => {
            out.push_str(entity.body);
            Ok(())
        }
    }
}

/// Re-read a rebuilt message with `mail-parser` and check that it is still a
/// multipart message with the expected boundary.
pub fn verify_rebuilt(text: &str, boundary: &str) -> Result<()> {
    let parsed = MessageParser::default()
        .parse(text.as_bytes())
        .ok_or_else(|| MailsplitError::Verification("output is not a parsable message".into()))?;

    let content_type = parsed
        .root_part()
        .content_type()
        .ok_or_else(|| MailsplitError::Verification("output has no Content-Type".into()))?;

    if !content_type.ctype().eq_ignore_ascii_case("multipart") {
        return Err(MailsplitError::Verification(format!(
            "output content type is '{}'",
            content_type.ctype()
        )));
    }

    match content_type.attribute("boundary") {
        Some(b) if b == boundary => Ok(()),
        other => Err(MailsplitError::Verification(format!(
            "output boundary is {other:?}, expected {boundary:?}"
        ))),
    }
}
