//! Object-name encodings required by Cloud Files.
//!
//! Two unrelated transforms live here:
//!
//! - [`encode_utf7`] / [`decode_utf7`]: RFC 2152 UTF-7, applied to names of
//!   uploaded objects. The storage API rejects raw multi-byte UTF-8 in object
//!   paths, so non-ASCII characters are rewritten into an ASCII-safe,
//!   reversible form (`ø` becomes `+APg-`). The output matches PHP mbstring,
//!   which produced the names already stored in existing containers.
//! - [`encode_uri_component`]: percent-encoding of a filename appended to a
//!   container CDN URL. `! * ' ( )` stay literal because the CDN serves them
//!   unescaped.

use crate::domain::errors::StorageError;
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything except `A-Z a-z 0-9 - _ . ~` is escaped.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Escapes the CDN accepts literally.
const CDN_LITERALS: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%2A", "*"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
];

/// Percent-encodes a filename for use after a CDN base URL.
///
/// ```
/// use cloudfiles::domain::object_name::encode_uri_component;
///
/// assert_eq!(encode_uri_component("a b!c*d'e(f)g"), "a%20b!c*d'e(f)g");
/// ```
pub fn encode_uri_component(filename: &str) -> String {
    let encoded = utf8_percent_encode(filename, URI_COMPONENT).to_string();
    CDN_LITERALS
        .iter()
        .fold(encoded, |acc, (escaped, literal)| acc.replace(escaped, literal))
}

/// Characters written as themselves: set D and whitespace. The optional
/// direct set (`! _ @ ...`) is shifted like everything else.
fn is_direct(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '\'' | '(' | ')' | ',' | '-' | '.' | '/' | ':' | '?' | ' ' | '\t' | '\r' | '\n' | '\0'
        )
}

fn is_base64(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/'
}

/// Writes a pending shifted run. The closing `-` is only needed when the
/// next character could be read as part of the run, or at the end of input.
fn flush_shifted(out: &mut String, units: &mut Vec<u16>, next: Option<char>) {
    if units.is_empty() {
        return;
    }
    let bytes: Vec<u8> = units.iter().flat_map(|u| u.to_be_bytes()).collect();
    out.push('+');
    out.push_str(&STANDARD_NO_PAD.encode(bytes));
    match next {
        Some(c) if !(c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '-')) => {}
        _ => out.push('-'),
    }
    units.clear();
}

/// Transliterates an object name into UTF-7, byte for byte as PHP's
/// mbstring does: `café.txt` becomes `caf+AOk.txt`, `a_b` becomes `a+AF8-b`.
pub fn encode_utf7(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut shifted: Vec<u16> = Vec::new();
    let mut buf = [0u16; 2];

    for c in name.chars() {
        if c == '+' {
            flush_shifted(&mut out, &mut shifted, Some(c));
            out.push_str("+-");
        } else if is_direct(c) {
            flush_shifted(&mut out, &mut shifted, Some(c));
            out.push(c);
        } else {
            shifted.extend_from_slice(c.encode_utf16(&mut buf));
        }
    }
    flush_shifted(&mut out, &mut shifted, None);
    out
}

/// Reverses [`encode_utf7`]. Accepts runs without the closing `-`.
pub fn decode_utf7(encoded: &str) -> Result<String, StorageError> {
    let bytes = encoded.as_bytes();
    let mut out = String::with_capacity(encoded.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if !b.is_ascii() {
            return Err(StorageError::InvalidObjectName(format!(
                "non-ASCII byte at offset {}",
                i
            )));
        }
        if b != b'+' {
            out.push(b as char);
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && is_base64(bytes[end]) {
            end += 1;
        }

        if end == start {
            if bytes.get(end) == Some(&b'-') {
                out.push('+');
                i = end + 1;
                continue;
            }
            return Err(StorageError::InvalidObjectName(format!(
                "empty shifted sequence at offset {}",
                i
            )));
        }

        let raw = STANDARD_NO_PAD
            .decode(&encoded[start..end])
            .map_err(|e| StorageError::InvalidObjectName(e.to_string()))?;
        if raw.len() % 2 != 0 {
            return Err(StorageError::InvalidObjectName(format!(
                "truncated UTF-16 unit at offset {}",
                i
            )));
        }
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        let text =
            String::from_utf16(&units).map_err(|e| StorageError::InvalidObjectName(e.to_string()))?;
        out.push_str(&text);

        i = end;
        if bytes.get(i) == Some(&b'-') {
            i += 1;
        }
    }

    Ok(out)
}
