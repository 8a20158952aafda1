//! Configuration for the ETag lookup policy.

use crate::error::{Error, Result};
use crate::key::KeyIdentity;
use crate::request::IF_NONE_MATCH;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`ETagConfig::version_attribute`].
pub const ENV_VERSION_ATTRIBUTE: &str = "ETAG_VERSION_ATTRIBUTE";
/// Environment variable overriding [`ETagConfig::request_header`].
pub const ENV_REQUEST_HEADER: &str = "ETAG_REQUEST_HEADER";
/// Environment variable selecting [`KeyIdentity::Field`].
pub const ENV_KEY_FIELD: &str = "ETAG_KEY_FIELD";

/// Settings for [`ETagLookup`](crate::lookup::ETagLookup).
///
/// Every field has a default, so partial documents deserialize:
///
/// ```
/// use etag_kit::ETagConfig;
///
/// let config: ETagConfig = serde_json::from_str(r#"{"version_attribute": "revision"}"#).unwrap();
/// assert_eq!(config.version_attribute, "revision");
/// assert_eq!(config.request_header, "If-None-Match");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ETagConfig {
    /// Attribute on domain objects holding the version token.
    pub version_attribute: String,
    /// Request header (or CGI metadata key) holding the client's token.
    pub request_header: String,
    /// Identifier used when publishing from `get_header`.
    pub key_identity: KeyIdentity,
}

impl Default for ETagConfig {
    fn default() -> Self {
        ETagConfig {
            version_attribute: "etag".to_string(),
            request_header: IF_NONE_MATCH.to_string(),
            key_identity: KeyIdentity::Placeholder,
        }
    }
}

impl ETagConfig {
    /// Defaults overridden by `ETAG_*` environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if an override is empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = ETagConfig::default();

        if let Some(attribute) = lookup(ENV_VERSION_ATTRIBUTE) {
            config.version_attribute = attribute;
        }
        if let Some(header) = lookup(ENV_REQUEST_HEADER) {
            config.request_header = header;
        }
        if let Some(field) = lookup(ENV_KEY_FIELD) {
            config.key_identity = KeyIdentity::Field(field);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject blank names.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.version_attribute.trim().is_empty() {
            return Err(Error::ConfigError(
                "version_attribute must not be empty".to_string(),
            ));
        }
        if self.request_header.trim().is_empty() {
            return Err(Error::ConfigError(
                "request_header must not be empty".to_string(),
            ));
        }
        if let KeyIdentity::Field(field) = &self.key_identity {
            if field.trim().is_empty() {
                return Err(Error::ConfigError(
                    "key_identity field must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
