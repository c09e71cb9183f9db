//! Extract attachments from a parsed message and write them to disk.

use std::path::{Path, PathBuf};

use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::{MailsplitError, Result};
use crate::events::{EventSink, SplitEvent};
use crate::model::attachment::{Classification, SavedAttachment};
use crate::model::message::{Content, Entity, Multipart, ParsedMessage, Part};

/// Padded standard base64 that tolerates non-zero bits in the last symbol.
const PAYLOAD_BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// What to do when two attachments sanitize to the same file name, or the
/// name already exists in the output directory.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the existing file. Repeated runs produce the same files.
    #[default]
    Overwrite,
    /// Append `_1`, `_2`, ... to the file stem until the name is free.
    Suffix,
}

/// Decode and save every named attachment in the message.
///
/// A part whose `Content-Disposition` does not parse is reported to `sink`
/// and skipped; every other failure aborts the walk. Files written before a
/// failure are left in place.
pub fn extract_attachments(
    message: &ParsedMessage<'_>,
    output_dir: &Path,
    policy: CollisionPolicy,
    sink: &dyn EventSink,
) -> Result<Vec<SavedAttachment>> {
    let mut saved = Vec::new();
    extract_from(&message.body, output_dir, policy, sink, &mut saved)?;
    Ok(saved)
}

fn extract_from(
    container: &Multipart<'_>,
    output_dir: &Path,
    policy: CollisionPolicy,
    sink: &dyn EventSink,
    saved: &mut Vec<SavedAttachment>,
) -> Result<()> {
    for part in &container.parts {
        match Classification::of(&part.entity) {
            Classification::Attachment { filename } => {
                let attachment = save_attachment(part, &filename, output_dir, policy)?;
                sink.emit(SplitEvent::AttachmentSaved {
                    part: attachment.part.clone(),
                    path: attachment.path.clone(),
                    size: attachment.size,
                });
                saved.push(attachment);
            }
            Classification::Invalid(e) => {
                sink.emit(SplitEvent::DispositionInvalid {
                    part: part.path.clone(),
                    error: e.to_string(),
                });
            }
            _ => match &part.entity.content {
                Content::Multipart(nested) => {
                    extract_from(nested, output_dir, policy, sink, saved)?;
                }
                Content::Unreadable(error) => {
                    sink.emit(SplitEvent::NestedMultipartUnreadable {
                        part: part.path.clone(),
                        error: error.clone(),
                    });
                }
                Content::Single => {}
            },
        }
    }
    Ok(())
}

fn save_attachment(
    part: &Part<'_>,
    original_name: &str,
    output_dir: &Path,
    policy: CollisionPolicy,
) -> Result<SavedAttachment> {
    let data = decode_body(&part.entity, original_name)?;
    let file_name = sanitize_attachment_name(original_name);

    let path = output_dir.join(&file_name);
    let path = match policy {
        CollisionPolicy::Overwrite => path,
        CollisionPolicy::Suffix => unique_path(&path),
    };

    std::fs::write(&path, &data).map_err(|e| MailsplitError::io(&path, e))?;

    Ok(SavedAttachment {
        part: part.path.clone(),
        original_name: original_name.to_string(),
        file_name,
        path,
        size: data.len() as u64,
    })
}

/// Undo the part's `Content-Transfer-Encoding`.
///
/// A missing encoding header is treated as base64. Base64 payloads may be
/// wrapped and indented but must otherwise be padded base64.
pub fn decode_body(entity: &Entity<'_>, filename: &str) -> Result<Vec<u8>> {
    let encoding = entity
        .header("Content-Transfer-Encoding")
        .map(|e| e.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let decode_error = |reason: String| MailsplitError::Decode {
        filename: filename.to_string(),
        reason,
    };

    match encoding.as_str() {
        "" | "base64" => {
            let compact: Vec<u8> = entity
                .body
                .bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            PAYLOAD_BASE64
                .decode(compact)
                .map_err(|e| decode_error(e.to_string()))
        }
        "quoted-printable" => {
            quoted_printable::decode(entity.body, quoted_printable::ParseMode::Robust)
                .map_err(|e| decode_error(e.to_string()))
        }
        "7bit" | "8bit" | "binary" => Ok(entity.body.as_bytes().to_vec()),
        other => Err(MailsplitError::UnsupportedEncoding(other.to_string())),
    }
}

/// Turn a declared attachment name into a single safe path segment.
///
/// Spaces and `: " / \ ,` become `_`, `<` and `>` are dropped. A name that
/// ends up empty becomes `unknown`; a name made only of dots has them
/// replaced so it cannot address the directory or its parent.
pub fn sanitize_attachment_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .map(|c| match c {
            ' ' | ':' | '"' | '/' | '\\' | ',' => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else if sanitized.chars().all(|c| c == '.') {
        sanitized.replace('.', "_")
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..10_000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    // Fallback, very unlikely
    parent.join(format!("{stem}_dup.{ext}"))
}
