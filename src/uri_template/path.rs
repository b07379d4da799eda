//! Path helpers: normalization, matrix parameters and percent-coding.

use super::matcher::ParamVec;
use std::borrow::Cow;
use std::sync::Arc;

/// Strip a single leading `/`.
#[must_use]
pub fn normalize(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Remove `;key=value` matrix parameters from every segment.
///
/// Returns the clean path and the parameters in path order. Values stay
/// percent-encoded; a key without `=` gets an empty value.
#[must_use]
pub fn strip_matrix_params(path: &str) -> (String, ParamVec) {
    if !path.contains(';') {
        return (path.to_string(), ParamVec::new());
    }
    let mut clean = String::with_capacity(path.len());
    let mut params = ParamVec::new();
    for (i, segment) in path.split('/').enumerate() {
        if i > 0 {
            clean.push('/');
        }
        let mut parts = segment.split(';');
        clean.push_str(parts.next().unwrap_or_default());
        for raw in parts.filter(|p| !p.is_empty()) {
            let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
            params.push((Arc::from(key), value.to_string()));
        }
    }
    (clean, params)
}

/// Percent-decode a path or matrix value. Invalid UTF-8 keeps the raw text.
#[must_use]
pub fn decode(value: &str) -> String {
    urlencoding::decode(value).map_or_else(|_| value.to_string(), Cow::into_owned)
}

/// Percent-decode a query or form component (`+` is a space).
#[must_use]
pub fn decode_form_component(value: &str) -> String {
    if value.contains('+') {
        decode(&value.replace('+', " "))
    } else {
        decode(value)
    }
}

/// Split a raw `a=1&b=2` string without decoding.
#[must_use]
pub fn split_query(query: &str) -> ParamVec {
    query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (Arc::from(decode_form_component(key)), value.to_string())
        })
        .collect()
}

/// Percent-encode characters a template literal may not carry verbatim.
/// `/`, existing escapes and the RFC 3986 `pchar` set pass through.
#[must_use]
pub fn encode_literal(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if c.is_ascii_alphanumeric() || "/-._~!$&'()*+,;=:@%".contains(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}
