//! Query segment encoding for collection URLs.
//!
//! Every parameter on the wire is a path segment of the form `key=value/`.
//! Values are form-urlencoded over UTF-8; keys are written verbatim and must
//! already be URL-safe.

use std::borrow::Cow;

/// Separator between a key and its value.
pub const EQUAL: char = '=';

/// Terminator of every segment.
pub const SLASH: char = '/';

/// Encode a value with `application/x-www-form-urlencoded` rules.
///
/// Alphanumerics and `*-._` pass through, space becomes `+`, everything else
/// is percent-encoded byte by byte.
pub fn encode_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Reverse of [`encode_value`].
pub fn decode_value(encoded: &str) -> String {
    // `parse` treats its input as a query string, so a bare value decodes
    // as a single key with no value.
    form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}

/// Append one `key=value/` segment to `buf`.
///
/// A missing value is written as the empty string.
pub fn append_segment(buf: &mut String, key: &str, value: Option<&str>) {
    let encoded: Cow<'_, str> = match value {
        Some(v) => Cow::Owned(encode_value(v)),
        None => Cow::Borrowed(""),
    };
    buf.push_str(key);
    buf.push(EQUAL);
    buf.push_str(&encoded);
    buf.push(SLASH);
}

/// Build a standalone segment.
pub fn segment(key: &str, value: Option<&str>) -> String {
    let mut buf = String::with_capacity(key.len() + 2);
    append_segment(&mut buf, key, value);
    buf
}
