//! Reading conditional headers from incoming requests.

use http::HeaderMap;
use std::borrow::Cow;
use std::collections::HashMap;

/// Default request header carrying the client's cached token.
pub const IF_NONE_MATCH: &str = "If-None-Match";

/// Anything that can answer "what is the value of header `name`?".
///
/// `name` is always a resolved, lowercase header name (see
/// [`resolve_header_name`]). Values that are not valid UTF-8 are reported as
/// absent.
pub trait RequestHeaders {
    fn header_value(&self, name: &str) -> Option<&str>;
}

impl RequestHeaders for HeaderMap {
    fn header_value(&self, name: &str) -> Option<&str> {
        // Not `to_str`: that rejects obs-text, and tokens must compare byte for byte.
        self.get(name)
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
    }
}

impl<B> RequestHeaders for http::Request<B> {
    fn header_value(&self, name: &str) -> Option<&str> {
        self.headers().header_value(name)
    }
}

/// Metadata-style mapping, e.g. `{"HTTP_IF_NONE_MATCH": "abc"}`.
///
/// The CGI key (`HTTP_IF_NONE_MATCH`) wins when present. Otherwise any key
/// resolving to `name` is used; if several do, the smallest key is chosen so
/// the answer never depends on hash order.
impl RequestHeaders for HashMap<String, String> {
    fn header_value(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.get(&meta_key(name)) {
            return Some(value.as_str());
        }
        self.iter()
            .filter(|(key, _)| resolve_header_name(key) == name)
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(_, value)| value.as_str())
    }
}

fn meta_key(name: &str) -> String {
    format!("HTTP_{}", name.replace('-', "_").to_ascii_uppercase())
}

impl<R: RequestHeaders + ?Sized> RequestHeaders for &R {
    fn header_value(&self, name: &str) -> Option<&str> {
        (**self).header_value(name)
    }
}

/// Normalize a configured header slot to a lowercase header name.
///
/// Accepts plain header names (`If-None-Match`) and CGI metadata keys
/// (`HTTP_IF_NONE_MATCH`); both resolve to `if-none-match`.
///
/// # Example
///
/// ```
/// use etag_kit::request::resolve_header_name;
///
/// assert_eq!(resolve_header_name("HTTP_IF_NONE_MATCH"), "if-none-match");
/// assert_eq!(resolve_header_name("If-Match"), "if-match");
/// ```
pub fn resolve_header_name(slot: &str) -> Cow<'_, str> {
    let trimmed = slot.trim();
    let stripped = trimmed.strip_prefix("HTTP_").unwrap_or(trimmed);
    let normalized = stripped.len() == slot.len()
        && !stripped.bytes().any(|b| b == b'_' || b.is_ascii_uppercase());

    if normalized {
        Cow::Borrowed(stripped)
    } else {
        Cow::Owned(stripped.replace('_', "-").to_ascii_lowercase())
    }
}
