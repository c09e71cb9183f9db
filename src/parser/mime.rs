//! MIME structure parsing: header/body split and boundary-delimited part
//! iteration, with recursive descent into nested multipart bodies.

use crate::error::{MailsplitError, Result};
use crate::model::message::{
    Content, Entity, HeaderField, Multipart, ParsedMessage, Part, PartPath,
};
use crate::parser::header::{header_value, parse_header_fields, parse_media_type};

/// Maximum depth for recursive multipart parsing (to prevent stack overflow on adversarial input).
pub const MAX_DEPTH: usize = 10;

/// Parse a complete raw message whose top-level body is `multipart/*`.
///
/// Nested multipart parts are split up to `max_depth` levels below the top
/// container; `0` keeps every part opaque. A nested container that cannot be
/// split is recorded as [`Content::Unreadable`] instead of failing.
pub fn parse_message(raw: &str, max_depth: usize) -> Result<ParsedMessage<'_>> {
    let text = skip_from_line(raw);
    let (head, separator, body) = split_head(text);

    let headers =
        parse_header_fields(head).map_err(|e| MailsplitError::MalformedMessage(e.to_string()))?;

    let content_type = header_value(&headers, "Content-Type")
        .filter(|ct| !ct.is_empty())
        .ok_or(MailsplitError::MissingContentType)?;
    let media = parse_media_type(content_type)
        .map_err(|e| MailsplitError::InvalidContentType(e.to_string()))?;

    if !media.value.starts_with("multipart/") {
        return Err(MailsplitError::NotMultipart(media.value));
    }

    let boundary = media
        .param("boundary")
        .filter(|b| !b.is_empty())
        .ok_or(MailsplitError::MissingBoundary)?;

    let body = split_multipart(
        body,
        &media.value,
        boundary,
        &PartPath::default(),
        max_depth.min(MAX_DEPTH),
    )?;

    Ok(ParsedMessage {
        headers,
        head,
        separator,
        body,
    })
}

/// Split a multipart body on `--boundary` delimiter lines.
///
/// The line ending preceding a delimiter belongs to the delimiter, not to the
/// part before it. A delimiter line may carry trailing spaces or tabs; any
/// other trailing text means the line is ordinary content.
pub fn split_multipart<'a>(
    body: &'a str,
    media_type: &str,
    boundary: &str,
    parent: &PartPath,
    depth_left: usize,
) -> Result<Multipart<'a>> {
    let dash_boundary = format!("--{boundary}");

    let mut preamble = None;
    let mut parts = Vec::new();
    // (start of the open delimiter line, start of the part content)
    let mut open: Option<(usize, usize)> = None;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        let content = line.trim_end_matches(['\r', '\n']);
        let Some(after) = content.strip_prefix(dash_boundary.as_str()) else {
            continue;
        };
        let (is_close, padding) = match after.strip_prefix("--") {
            Some(rest) => (true, rest),
            None => (false, after),
        };
        if !padding.trim_matches([' ', '\t']).is_empty() {
            continue;
        }

        match open.take() {
            Some((delimiter_start, content_start)) => {
                let content_end = (start - eol_len_before(body, start)).max(content_start);
                let path = parent.child(parts.len());
                let entity = parse_entity(&body[content_start..content_end], &path, depth_left)?;
                parts.push(Part {
                    path,
                    delimiter: &body[delimiter_start..content_start],
                    entity,
                    trailer: &body[content_end..start],
                });
            }
            None => preamble = Some(&body[..start]),
        }

        if is_close {
            let close_end = start + dash_boundary.len() + 2;
            return Ok(Multipart {
                media_type: media_type.to_string(),
                boundary: boundary.to_string(),
                preamble: preamble.unwrap_or_default(),
                parts,
                close: &body[start..close_end],
                epilogue: &body[close_end..],
            });
        }

        open = Some((start, offset));
    }

    let reason = if preamble.is_none() {
        format!("no delimiter for boundary \"{boundary}\"")
    } else {
        format!("missing closing delimiter for boundary \"{boundary}\"")
    };
    Err(MailsplitError::MalformedMultipart(reason))
}

/// Parse one part's headers and body.
fn parse_entity<'a>(text: &'a str, path: &PartPath, depth_left: usize) -> Result<Entity<'a>> {
    let (head, separator, body) = split_head(text);
    let headers = parse_header_fields(head)
        .map_err(|e| MailsplitError::MalformedMultipart(format!("part {path}: {e}")))?;
    let content = nested_content(&headers, body, path, depth_left);

    Ok(Entity {
        headers,
        head,
        separator,
        body,
        content,
    })
}

/// Decide whether a part body is itself a multipart container and split it.
fn nested_content<'a>(
    headers: &[HeaderField<'_>],
    body: &'a str,
    path: &PartPath,
    depth_left: usize,
) -> Content<'a> {
    if depth_left == 0 {
        return Content::Single;
    }
    let Some(media) = header_value(headers, "Content-Type").and_then(|ct| parse_media_type(ct).ok())
    else {
        return Content::Single;
    };
    if !media.value.starts_with("multipart/") {
        return Content::Single;
    }

    let Some(boundary) = media.param("boundary").filter(|b| !b.is_empty()) else {
        return Content::Unreadable(MailsplitError::MissingBoundary.to_string());
    };

    match split_multipart(body, &media.value, boundary, path, depth_left - 1) {
        Ok(multipart) => Content::Multipart(multipart),
        Err(e) => Content::Unreadable(e.to_string()),
    }
}

/// Split text into (header block, empty separator line, body).
///
/// The header block keeps the line ending of its last field. Text without an
/// empty line is all header; text starting with an empty line has no headers.
fn split_head(text: &str) -> (&str, &str, &str) {
    match find_header_end(text) {
        Some((end, separator_len)) => (
            &text[..end],
            &text[end..end + separator_len],
            &text[end + separator_len..],
        ),
        None => (text, "", ""),
    }
}

/// Find the first empty line. Returns its offset and length (1 or 2).
fn find_header_end(text: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line == "\n" || line == "\r\n" {
            return Some((offset, line.len()));
        }
        offset += line.len();
    }
    None
}

fn eol_len_before(text: &str, pos: usize) -> usize {
    let before = &text[..pos];
    if before.ends_with("\r\n") {
        2
    } else if before.ends_with('\n') {
        1
    } else {
        0
    }
}

/// Skip a byte-order mark and the `From ` separator line of MBOX-style input.
///
/// `From : addr` is an obsolete-syntax header field, not a separator, and is
/// left in place.
fn skip_from_line(text: &str) -> &str {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some(rest) = text.strip_prefix("From ") else {
        return text;
    };
    let sender = rest.trim_start_matches([' ', '\t']);
    if sender.is_empty() || sender.starts_with([':', '\r', '\n']) {
        return text;
    }
    match text.find('\n') {
        Some(pos) => &text[pos + 1..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "From: sender@example.com\n\
To: recipient@example.com\n\
Subject: Test email\n\
Content-Type: multipart/mixed; boundary=\"boundary\"\n\
\n\
--boundary\n\
Content-Type: text/plain\n\
\n\
This is the body of the email.\n\
\n\
--boundary\n\
Content-Disposition: attachment; filename=\"test.txt\"\n\
Content-Transfer-Encoding: base64\n\
\n\
dGVzdCBjb250ZW50Cg==\n\
\n\
--boundary--";

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end("From: a@b.com\nSubject: Hi\n\nBody\n"), Some((26, 1)));
        assert_eq!(
            find_header_end("From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n"),
            Some((28, 2))
        );
        assert_eq!(find_header_end("\nBody"), Some((0, 1)));
        assert_eq!(find_header_end("Subject: only"), None);
    }

    #[test]
    fn test_skip_from_line() {
        let data = "From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with("Subject:"));
        let data = "Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
        let data = "From : weird@example.com\nSubject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_obsolete_from_header_is_kept() {
        let raw = SIMPLE.replacen("From: sender@example.com", "From : weird@example.com", 1);
        let msg = parse_message(&raw, MAX_DEPTH).unwrap();
        assert_eq!(msg.headers.len(), 4);
        assert_eq!(msg.header("from"), Some("weird@example.com"));
        assert!(msg.head.starts_with("From : weird@example.com\n"));
    }

    #[test]
    fn test_parse_simple_message() {
        let msg = parse_message(SIMPLE, MAX_DEPTH).unwrap();
        assert_eq!(msg.headers.len(), 4);
        assert_eq!(msg.header("subject"), Some("Test email"));
        assert_eq!(msg.separator, "\n");
        assert_eq!(msg.body.boundary, "boundary");
        assert_eq!(msg.body.media_type, "multipart/mixed");
        assert_eq!(msg.body.preamble, "");
        assert_eq!(msg.body.parts.len(), 2);
        assert_eq!(msg.body.close, "--boundary--");
        assert_eq!(msg.body.epilogue, "");

        let text = &msg.body.parts[0];
        assert_eq!(text.path.to_string(), "1");
        assert_eq!(text.delimiter, "--boundary\n");
        assert_eq!(text.entity.head, "Content-Type: text/plain\n");
        assert_eq!(text.entity.body, "This is the body of the email.\n");
        assert_eq!(text.trailer, "\n");

        let attachment = &msg.body.parts[1];
        assert_eq!(attachment.entity.body, "dGVzdCBjb250ZW50Cg==\n");
    }

    #[test]
    fn test_parse_crlf_message() {
        let raw = SIMPLE.replace('\n', "\r\n");
        let msg = parse_message(&raw, MAX_DEPTH).unwrap();
        assert_eq!(msg.separator, "\r\n");
        assert_eq!(msg.body.parts.len(), 2);
        assert_eq!(msg.body.parts[0].delimiter, "--boundary\r\n");
        assert_eq!(
            msg.body.parts[0].entity.body,
            "This is the body of the email.\r\n"
        );
        assert_eq!(msg.body.parts[0].trailer, "\r\n");
    }

    #[test]
    fn test_preamble_epilogue_and_padding() {
        let raw = "Content-Type: multipart/mixed; boundary=xyz\n\
\n\
This is a preamble.\n\
--xyz  \n\
\n\
body\n\
--xyzzy not a delimiter\n\
--xyz-- \n\
epilogue\n";
        let msg = parse_message(raw, MAX_DEPTH).unwrap();
        assert_eq!(msg.body.preamble, "This is a preamble.\n");
        assert_eq!(msg.body.parts.len(), 1);
        let part = &msg.body.parts[0];
        assert_eq!(part.delimiter, "--xyz  \n");
        assert!(part.entity.headers.is_empty());
        assert_eq!(part.entity.body, "body\n--xyzzy not a delimiter");
        assert_eq!(msg.body.close, "--xyz--");
        assert_eq!(msg.body.epilogue, " \nepilogue\n");
    }

    #[test]
    fn test_nested_multipart() {
        let raw = "Content-Type: multipart/mixed; boundary=outer\n\
\n\
--outer\n\
Content-Type: multipart/alternative; boundary=inner\n\
\n\
--inner\n\
Content-Type: text/plain\n\
\n\
plain\n\
--inner\n\
Content-Type: text/html\n\
\n\
<p>html</p>\n\
--inner--\n\
--outer--\n";
        let msg = parse_message(raw, MAX_DEPTH).unwrap();
        let Content::Multipart(inner) = &msg.body.parts[0].entity.content else {
            panic!("expected nested multipart");
        };
        assert_eq!(inner.boundary, "inner");
        assert_eq!(inner.parts.len(), 2);
        assert_eq!(inner.parts[1].path.to_string(), "1.2");
        assert_eq!(inner.epilogue, "");

        let flat = parse_message(raw, 0).unwrap();
        assert!(matches!(flat.body.parts[0].entity.content, Content::Single));
    }

    #[test]
    fn test_unreadable_nested_multipart_is_kept() {
        let raw = "Content-Type: multipart/mixed; boundary=outer\n\
\n\
--outer\n\
Content-Type: multipart/related; boundary=never\n\
\n\
no delimiters here\n\
--outer--\n";
        let msg = parse_message(raw, MAX_DEPTH).unwrap();
        assert!(matches!(
            msg.body.parts[0].entity.content,
            Content::Unreadable(_)
        ));
    }

    #[test]
    fn test_top_level_errors() {
        assert!(matches!(
            parse_message("Subject: hi\n\nbody", MAX_DEPTH),
            Err(MailsplitError::MissingContentType)
        ));
        assert!(matches!(
            parse_message("Content-Type: text/\n\nbody", MAX_DEPTH),
            Err(MailsplitError::InvalidContentType(_))
        ));
        assert!(matches!(
            parse_message("Content-Type: text/plain\n\nbody", MAX_DEPTH),
            Err(MailsplitError::NotMultipart(_))
        ));
        assert!(matches!(
            parse_message("Content-Type: multipart/mixed\n\nbody", MAX_DEPTH),
            Err(MailsplitError::MissingBoundary)
        ));
        assert!(matches!(
            parse_message("garbage line\n\nbody", MAX_DEPTH),
            Err(MailsplitError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_multipart_stream_errors() {
        let no_delimiter = "Content-Type: multipart/mixed; boundary=b\n\nbody\n";
        assert!(matches!(
            parse_message(no_delimiter, MAX_DEPTH),
            Err(MailsplitError::MalformedMultipart(_))
        ));

        let unterminated = "Content-Type: multipart/mixed; boundary=b\n\n--b\n\nbody\n";
        assert!(matches!(
            parse_message(unterminated, MAX_DEPTH),
            Err(MailsplitError::MalformedMultipart(_))
        ));

        let bad_part_header = "Content-Type: multipart/mixed; boundary=b\n\n--b\nnot a header\n--b--\n";
        assert!(matches!(
            parse_message(bad_part_header, MAX_DEPTH),
            Err(MailsplitError::MalformedMultipart(_))
        ));
    }
}
