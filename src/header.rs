//! Response headers produced by lookup policies.

use crate::error::{Error, Result};
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::collections::BTreeMap;

/// Name of the header carrying the published version.
pub const ETAG: &str = "ETag";

/// Header-name to value mapping returned by `get_header`.
///
/// Empty for the null policy, exactly one `ETag` entry for the ETag policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: BTreeMap<String, String>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mapping holding only `ETag: {etag}`.
    pub fn etag(etag: impl Into<String>) -> Self {
        let mut headers = Self::new();
        headers.insert(ETAG, etag);
        headers
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Look up a header, matching the name exactly.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy every entry into an `http::HeaderMap`, replacing existing values.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if a name or value is not valid in HTTP.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> Result<()> {
        for (name, value) in self.iter() {
            let name = HeaderName::try_from(name)
                .map_err(|e| Error::ConfigError(format!("Invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::try_from(value).map_err(|e| {
                Error::ConfigError(format!("Invalid value for header {}: {}", name, e))
            })?;
            headers.insert(name, value);
        }
        Ok(())
    }
}
