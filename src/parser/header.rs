//! RFC 5322 header parsing: field splitting and folding, media-type parameters
//! (RFC 2045/2183/2231), and encoded-words (RFC 2047).

use std::collections::BTreeMap;

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use thiserror::Error;
use tracing::warn;

use crate::model::message::HeaderField;

/// Characters that may not appear in a token (RFC 2045 `tspecials`).
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// Encoded-words in the wild are often missing their padding.
const ENCODED_WORD_BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors produced while parsing a single header block or header value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("malformed header line: {0:?}")]
    MalformedLine(String),

    #[error("no media type")]
    NoMediaType,

    #[error("expected slash after first token")]
    ExpectedSlash,

    #[error("expected token after slash")]
    ExpectedTokenAfterSlash,

    #[error("unexpected content after media subtype")]
    TrailingContent,

    #[error("invalid media parameter")]
    InvalidParameter,

    #[error("duplicate parameter name: {0}")]
    DuplicateParameter(String),
}

/// A parsed `type/subtype; key=value` header value (Content-Type or
/// Content-Disposition).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Lower-cased type, e.g. `multipart/mixed` or `attachment`.
    pub value: String,
    params: BTreeMap<String, String>,
}

impl MediaType {
    /// Look up a parameter by name (case-insensitive).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Split a raw header block into fields, keeping each field's raw text.
///
/// Continuation lines (starting with space or tab) are unfolded into the
/// value of the previous field. A continuation with no preceding field, or a
/// line that is not a `name: value` pair, is an error.
pub fn parse_header_fields(head: &str) -> Result<Vec<HeaderField<'_>>, HeaderError> {
    let mut fields: Vec<HeaderField<'_>> = Vec::new();
    let mut offset = 0;

    for line in head.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let content = line.trim_end_matches(['\r', '\n']);

        if content.starts_with(' ') || content.starts_with('\t') {
            let Some(last) = fields.last_mut() else {
                return Err(HeaderError::MalformedLine(content.to_string()));
            };
            let folded = content.trim();
            if !folded.is_empty() {
                if !last.value.is_empty() {
                    last.value.push(' ');
                }
                last.value.push_str(folded);
            }
            let field_start = field_offset(head, last.raw);
            last.raw = &head[field_start..offset];
            continue;
        }

        if content.is_empty() {
            continue;
        }

        let Some(colon) = content.find(':') else {
            return Err(HeaderError::MalformedLine(content.to_string()));
        };
        // Obsolete syntax allows whitespace before the colon.
        let name = content[..colon].trim_end_matches([' ', '\t']);
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(HeaderError::MalformedLine(content.to_string()));
        }

        fields.push(HeaderField {
            name,
            value: content[colon + 1..].trim().to_string(),
            raw: &head[start..offset],
        });
    }

    Ok(fields)
}

/// Byte offset of `sub` within `head`. `sub` must be a slice of `head`.
fn field_offset(head: &str, sub: &str) -> usize {
    sub.as_ptr() as usize - head.as_ptr() as usize
}

/// Get the first value for a header name (case-insensitive).
pub fn header_value<'h>(fields: &'h [HeaderField<'_>], name: &str) -> Option<&'h str> {
    fields
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name))
        .map(|f| f.value.as_str())
}

/// Parse a media type or disposition value with its parameters.
///
/// The type is lower-cased. Parameter names are lower-cased; values keep
/// their case. RFC 2231 extended values and continuations are assembled.
/// A single trailing `;` is tolerated.
pub fn parse_media_type(input: &str) -> Result<MediaType, HeaderError> {
    let (base, mut rest) = match input.find(';') {
        Some(pos) => (&input[..pos], &input[pos..]),
        None => (input, ""),
    };

    let value = base.trim().to_ascii_lowercase();
    check_media_type(&value)?;

    let mut params = BTreeMap::new();
    let mut continuations: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        let Some((key, val, remaining)) = consume_media_param(rest) else {
            if rest.trim() == ";" {
                break;
            }
            return Err(HeaderError::InvalidParameter);
        };

        let target = match key.find('*') {
            Some(star) => continuations.entry(key[..star].to_string()).or_default(),
            None => &mut params,
        };
        if target.contains_key(&key) {
            return Err(HeaderError::DuplicateParameter(key));
        }
        target.insert(key, val);
        rest = remaining;
    }

    for (name, pieces) in continuations {
        if let Some(resolved) = resolve_extended(&name, &pieces) {
            params.insert(name, resolved);
        }
    }

    Ok(MediaType { value, params })
}

/// Validate `token` or `token/token`.
fn check_media_type(value: &str) -> Result<(), HeaderError> {
    let (main, rest) = consume_token(value);
    if main.is_empty() {
        return Err(HeaderError::NoMediaType);
    }
    if rest.is_empty() {
        return Ok(());
    }
    let Some(rest) = rest.strip_prefix('/') else {
        return Err(HeaderError::ExpectedSlash);
    };
    let (sub, rest) = consume_token(rest);
    if sub.is_empty() {
        return Err(HeaderError::ExpectedTokenAfterSlash);
    }
    if !rest.is_empty() {
        return Err(HeaderError::TrailingContent);
    }
    Ok(())
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !TSPECIALS.contains(c)
}

fn consume_token(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_token_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

/// Consume `; key=value` from the front of `s`.
fn consume_media_param(s: &str) -> Option<(String, String, &str)> {
    let rest = s.trim_start().strip_prefix(';')?.trim_start();
    let (key, rest) = consume_token(rest);
    if key.is_empty() {
        return None;
    }
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let (value, rest) = consume_value(rest)?;
    Some((key.to_ascii_lowercase(), value, rest))
}

/// Consume a token or a quoted-string.
fn consume_value(s: &str) -> Option<(String, &str)> {
    let Some(quoted) = s.strip_prefix('"') else {
        let (token, rest) = consume_token(s);
        if token.is_empty() {
            return None;
        }
        return Some((token.to_string(), rest));
    };

    let mut value = String::new();
    let mut chars = quoted.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, &quoted[i + 1..])),
            '\r' | '\n' => return None,
            // Only tspecials are escaped; `C:\dir` keeps its backslash.
            '\\' => match chars.peek() {
                Some(&(_, next)) if TSPECIALS.contains(next) => {
                    value.push(next);
                    chars.next();
                }
                _ => value.push('\\'),
            },
            c => value.push(c),
        }
    }
    None
}

/// Assemble an RFC 2231 parameter from `name*` or `name*0`, `name*1*`, ...
fn resolve_extended(name: &str, pieces: &BTreeMap<String, String>) -> Option<String> {
    if let Some(encoded) = pieces.get(&format!("{name}*")) {
        return decode_extended_value(encoded);
    }

    let mut bytes = Vec::new();
    let mut charset = None;
    for n in 0.. {
        let simple = pieces.get(&format!("{name}*{n}"));
        let encoded = pieces.get(&format!("{name}*{n}*"));
        match (simple, encoded) {
            (Some(v), _) => bytes.extend_from_slice(v.as_bytes()),
            (None, Some(v)) => {
                let v = if n == 0 {
                    let (cs, rest) = split_charset(v)?;
                    charset = Some(cs);
                    rest
                } else {
                    v.as_str()
                };
                bytes.extend(percent_decode(v)?);
            }
            (None, None) => break,
        }
    }

    if bytes.is_empty() {
        return None;
    }
    Some(decode_charset(charset.unwrap_or("utf-8"), &bytes))
}

/// Decode `charset'language'percent-encoded`.
fn decode_extended_value(v: &str) -> Option<String> {
    let (charset, rest) = split_charset(v)?;
    let bytes = percent_decode(rest)?;
    Some(decode_charset(charset, &bytes))
}

fn split_charset(v: &str) -> Option<(&str, &str)> {
    let mut parts = v.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let rest = parts.next()?;
    let charset = if charset.is_empty() { "us-ascii" } else { charset };
    Some((charset, rest))
}

fn percent_decode(s: &str) -> Option<Vec<u8>> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two adjacent encoded words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(decoded) = try_decode_one_word(after_start) {
            result.push_str(&decoded.text);
            remaining = &remaining[start + 2 + decoded.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed after the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => ENCODED_WORD_BASE64.decode(encoded_text).ok()?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some(DecodedWord {
        text: decode_charset(charset, &bytes),
        consumed: total_consumed,
    })
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                match input.get(i + 1..i + 3).and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    // RFC 2231 allows a language suffix: utf-8*en
    let label = charset.split('*').next().unwrap_or(charset);
    match label.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" | "us-ascii" => String::from_utf8_lossy(bytes).into_owned(),
        _ => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(encoding) => {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            }
            None => {
                warn!(charset = label, "Unknown charset, falling back to UTF-8 lossy");
                String::from_utf8_lossy(bytes).into_owned()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_fields_keeps_raw_text() {
        let head = "From: a@b.com\nSubject: This is a long\n\tsubject line\nTo: c@d.com\n";
        let fields = parse_header_fields(head).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].name, "Subject");
        assert_eq!(fields[1].value, "This is a long subject line");
        assert_eq!(fields[1].raw, "Subject: This is a long\n\tsubject line\n");
        assert_eq!(fields[2].raw, "To: c@d.com\n");
    }

    #[test]
    fn test_parse_header_fields_crlf() {
        let head = "From: a@b.com\r\nSubject: Hi\r\n";
        let fields = parse_header_fields(head).unwrap();
        assert_eq!(fields[0].value, "a@b.com");
        assert_eq!(fields[1].raw, "Subject: Hi\r\n");
    }

    #[test]
    fn test_parse_header_fields_obsolete_space_before_colon() {
        let fields = parse_header_fields("From : a@b.com\n").unwrap();
        assert_eq!(fields[0].name, "From");
        assert_eq!(fields[0].value, "a@b.com");
        assert_eq!(fields[0].raw, "From : a@b.com\n");
    }

    #[test]
    fn test_parse_header_fields_rejects_garbage() {
        assert!(matches!(
            parse_header_fields("not a header\n"),
            Err(HeaderError::MalformedLine(_))
        ));
        assert!(matches!(
            parse_header_fields(" leading continuation\n"),
            Err(HeaderError::MalformedLine(_))
        ));
        assert!(parse_header_fields("Bad Name: x\n").is_err());
    }

    #[test]
    fn test_header_value_case_insensitive_first_wins() {
        let fields = parse_header_fields("X-A: 1\nx-a: 2\n").unwrap();
        assert_eq!(header_value(&fields, "X-a"), Some("1"));
        assert_eq!(header_value(&fields, "missing"), None);
    }

    #[test]
    fn test_parse_media_type_basic() {
        let mt = parse_media_type("Multipart/Mixed; boundary=\"simple boundary\"").unwrap();
        assert_eq!(mt.value, "multipart/mixed");
        assert_eq!(mt.param("BOUNDARY"), Some("simple boundary"));
    }

    #[test]
    fn test_parse_disposition_with_filename() {
        let mt = parse_media_type("attachment; filename=\"test.txt\"").unwrap();
        assert_eq!(mt.value, "attachment");
        assert_eq!(mt.param("filename"), Some("test.txt"));

        let mt = parse_media_type("inline").unwrap();
        assert_eq!(mt.value, "inline");
        assert_eq!(mt.param("filename"), None);
    }

    #[test]
    fn test_parse_media_type_trailing_semicolon() {
        let mt = parse_media_type("attachment; filename=a.txt;").unwrap();
        assert_eq!(mt.param("filename"), Some("a.txt"));
    }

    #[test]
    fn test_parse_media_type_errors() {
        assert_eq!(parse_media_type(""), Err(HeaderError::NoMediaType));
        assert_eq!(parse_media_type("text/"), Err(HeaderError::ExpectedTokenAfterSlash));
        assert_eq!(parse_media_type("text plain"), Err(HeaderError::ExpectedSlash));
        assert_eq!(
            parse_media_type("attachment; filename"),
            Err(HeaderError::InvalidParameter)
        );
        assert_eq!(
            parse_media_type("attachment; filename=\"unterminated"),
            Err(HeaderError::InvalidParameter)
        );
        assert_eq!(
            parse_media_type("attachment; filename=a; FILENAME=b"),
            Err(HeaderError::DuplicateParameter("filename".into()))
        );
    }

    #[test]
    fn test_quoted_string_escapes() {
        let mt = parse_media_type(r#"attachment; filename="say \"hi\".txt""#).unwrap();
        assert_eq!(mt.param("filename"), Some("say \"hi\".txt"));
        let mt = parse_media_type(r#"attachment; filename="C:\dir\f.txt""#).unwrap();
        assert_eq!(mt.param("filename"), Some(r"C:\dir\f.txt"));
    }

    #[test]
    fn test_rfc2231_extended_value() {
        let mt = parse_media_type("attachment; filename*=UTF-8''na%C3%AFve%20file.txt").unwrap();
        assert_eq!(mt.param("filename"), Some("naïve file.txt"));
    }

    #[test]
    fn test_rfc2231_rejects_signed_percent_escape() {
        let mt = parse_media_type("attachment; filename*=UTF-8''%+1.txt").unwrap();
        assert_eq!(mt.param("filename"), None);
        assert_eq!(percent_decode("%+1"), None);
        assert_eq!(percent_decode("a%2Fb"), Some(b"a/b".to_vec()));
    }

    #[test]
    fn test_rfc2231_continuations() {
        let mt = parse_media_type(
            "attachment; filename*0*=UTF-8''long%20; filename*1=\"name.pdf\"",
        )
        .unwrap();
        assert_eq!(mt.param("filename"), Some("long name.pdf"));
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        let input = "=?UTF-8?B?SG9sYSBtdW5kbw==?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        let input = "=?ISO-8859-1?Q?caf=E9?=";
        assert_eq!(decode_encoded_words(input), "café");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_plain_text_untouched() {
        assert_eq!(decode_encoded_words("report.pdf"), "report.pdf");
    }
}
