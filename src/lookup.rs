//! Pluggable cache lookup policies.
//!
//! A policy answers two questions for the view layer:
//!
//! - which headers to attach to a response (and, for ETags, publishing the
//!   version those headers carry), via [`CacheLookup::get_header`];
//! - whether the client's cached copy is still current, via
//!   [`CacheLookup::resource_unchanged`].
//!
//! [`BaseCacheLookup`] answers "nothing to add" and "changed" unconditionally,
//! so callers can invoke a policy without checking whether caching is on.

use crate::backend::CacheBackend;
use crate::config::ETagConfig;
use crate::entity::{require_attribute, EntityRef, VersionedEntity};
use crate::error::{Error, Result};
use crate::header::ResponseHeaders;
use crate::key::{CacheKeyBuilder, KeyIdentity, PLACEHOLDER_IDENTIFIER};
use crate::observability::{LookupMetrics, NoOpMetrics};
use crate::request::{resolve_header_name, RequestHeaders};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// Capability shared by every lookup policy.
pub trait CacheLookup: Send + Sync {
    /// Headers to attach to the response describing `obj`.
    fn get_header<T>(&self, obj: &T) -> impl Future<Output = Result<ResponseHeaders>> + Send
    where
        T: VersionedEntity + Sync;

    /// `true` if the client's cached copy of the resource under `key` is
    /// still current, `false` if it must be processed in full.
    fn resource_unchanged<R>(&self, request: &R, key: &str) -> impl Future<Output = bool> + Send
    where
        R: RequestHeaders + Sync + ?Sized;
}

/// Null policy used when caching is disabled.
///
/// Adds no headers and reports every resource as changed.
#[derive(Clone, Copy, Debug, Default)]
pub struct BaseCacheLookup;

impl CacheLookup for BaseCacheLookup {
    async fn get_header<T>(&self, _obj: &T) -> Result<ResponseHeaders>
    where
        T: VersionedEntity + Sync,
    {
        Ok(ResponseHeaders::new())
    }

    async fn resource_unchanged<R>(&self, _request: &R, _key: &str) -> bool
    where
        R: RequestHeaders + Sync + ?Sized,
    {
        false
    }
}

/// ETag policy: publishes versions to a store and validates client tokens.
///
/// # Example
///
/// ```
/// use etag_kit::{backend::InMemoryBackend, CacheLookup, EntityRef, ETagLookup, VersionedEntity};
/// use http::HeaderMap;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Widget {
///     etag: String,
/// }
///
/// impl VersionedEntity for Widget {}
///
/// # tokio_test_block_on(async {
/// let lookup = ETagLookup::new(InMemoryBackend::new());
/// let widget = Widget { etag: "abc123".to_string() };
///
/// let headers = lookup.get_header(&widget).await.unwrap();
/// assert_eq!(headers.get("ETag"), Some("abc123"));
///
/// let mut request = HeaderMap::new();
/// request.insert("if-none-match", "abc123".parse().unwrap());
/// let key = lookup.get_cache_key(EntityRef::instance(&widget), "pk");
/// assert!(lookup.resource_unchanged(&request, &key).await);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct ETagLookup<B: CacheBackend> {
    backend: B,
    config: ETagConfig,
    header_name: String,
    metrics: Arc<dyn LookupMetrics>,
}

impl<B: CacheBackend> ETagLookup<B> {
    /// Create a policy over `backend` with default configuration.
    pub fn new(backend: B) -> Self {
        let config = ETagConfig::default();
        ETagLookup {
            backend,
            header_name: resolve_header_name(&config.request_header).into_owned(),
            config,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Replace the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the configuration is invalid.
    pub fn with_config(mut self, config: ETagConfig) -> Result<Self> {
        config.validate()?;
        self.header_name = resolve_header_name(&config.request_header).into_owned();
        self.config = config;
        Ok(self)
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn LookupMetrics>) -> Self {
        self.metrics = Arc::from(metrics);
        self
    }

    pub fn config(&self) -> &ETagConfig {
        &self.config
    }

    /// Resolved, lowercase name of the request header carrying the token.
    pub fn request_header(&self) -> &str {
        &self.header_name
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Cache key for an entity, given by type or by instance.
    ///
    /// Pure and deterministic: `etag-{type_name}-{identifier}`.
    pub fn get_cache_key<T: VersionedEntity>(
        &self,
        entity: EntityRef<'_, T>,
        identifier: impl Display,
    ) -> String {
        CacheKeyBuilder::for_entity(entity, identifier)
    }

    /// Current version token of `obj`.
    ///
    /// # Errors
    ///
    /// - `Error::MissingAttribute` if `obj` lacks the configured attribute
    /// - `Error::SerializationError` if reading the attribute fails
    pub fn get_etag<T: VersionedEntity>(&self, obj: &T) -> Result<String> {
        require_attribute(obj, &self.config.version_attribute)
    }

    /// Key under which `get_header` publishes `obj`'s version.
    ///
    /// With [`KeyIdentity::Placeholder`] this is `etag-{type_name}-pk` for
    /// every instance of the type.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingAttribute` if [`KeyIdentity::Field`] names a
    /// field `obj` does not have.
    pub fn publish_key<T: VersionedEntity>(&self, obj: &T) -> Result<String> {
        let entity = EntityRef::instance(obj);
        match &self.config.key_identity {
            KeyIdentity::Placeholder => {
                debug!(
                    "Publishing {} under placeholder identifier '{}'",
                    entity.type_name(),
                    PLACEHOLDER_IDENTIFIER
                );
                Ok(self.get_cache_key(entity, PLACEHOLDER_IDENTIFIER))
            }
            KeyIdentity::Field(field) => {
                let id = require_attribute(obj, field)?;
                Ok(self.get_cache_key(entity, id))
            }
        }
    }

    /// Guard a write: the request must present `obj`'s current version.
    ///
    /// # Errors
    ///
    /// - `Error::PreconditionFailed` if the header is absent or differs
    /// - `Error::MissingAttribute` if `obj` lacks the version attribute
    pub fn precondition_check<T, R>(&self, obj: &T, request: &R) -> Result<()>
    where
        T: VersionedEntity,
        R: RequestHeaders + ?Sized,
    {
        let etag = self.get_etag(obj)?;
        let presented = request.header_value(&self.header_name);

        if presented == Some(etag.as_str()) {
            debug!("✓ Precondition satisfied for {}", T::entity_name());
            return Ok(());
        }

        debug!(
            "✗ Precondition failed for {}: expected {:?}, got {:?}",
            T::entity_name(),
            etag,
            presented
        );
        self.metrics.record_precondition_failed(T::entity_name());
        Err(Error::PreconditionFailed {
            expected: etag,
            presented: presented.map(str::to_string),
        })
    }
}

impl<B: CacheBackend> CacheLookup for ETagLookup<B> {
    /// Publish `obj`'s version and return `{"ETag": version}`.
    ///
    /// The store write always happens and always overwrites. A failed write
    /// is logged and does not fail the call.
    async fn get_header<T>(&self, obj: &T) -> Result<ResponseHeaders>
    where
        T: VersionedEntity + Sync,
    {
        let key = self.publish_key(obj)?;
        let etag = self.get_etag(obj)?;

        debug!("» Publishing ETag for key: {}", key);

        match self.backend.set(&key, etag.clone().into_bytes(), None).await {
            Ok(()) => self.metrics.record_published(&key),
            Err(e) => warn!("Failed to publish ETag for {}: {}", key, e),
        }

        Ok(ResponseHeaders::etag(etag))
    }

    /// Byte-exact comparison of the stored version against the request header.
    ///
    /// A missing entry, a missing header, or a store failure all count as
    /// changed.
    async fn resource_unchanged<R>(&self, request: &R, key: &str) -> bool
    where
        R: RequestHeaders + Sync + ?Sized,
    {
        let stored = match self.backend.get(key).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("ETag lookup failed for {}, treating as changed: {}", key, e);
                None
            }
        };
        let presented = request.header_value(&self.header_name);

        let unchanged = match (&stored, presented) {
            (Some(stored), Some(presented)) => stored.as_slice() == presented.as_bytes(),
            _ => false,
        };

        if unchanged {
            debug!("✓ Resource unchanged for {}", key);
            self.metrics.record_unchanged(key);
        } else {
            debug!(
                "✗ Resource changed for {} (stored: {}, header: {})",
                key,
                stored.is_some(),
                presented.is_some()
            );
            self.metrics.record_changed(key);
        }
        unchanged
    }
}

/// Either policy, chosen at startup.
#[derive(Clone)]
pub enum LookupPolicy<B: CacheBackend> {
    Disabled(BaseCacheLookup),
    ETag(ETagLookup<B>),
}

impl<B: CacheBackend> LookupPolicy<B> {
    /// The ETag policy, if enabled.
    pub fn as_etag(&self) -> Option<&ETagLookup<B>> {
        match self {
            LookupPolicy::Disabled(_) => None,
            LookupPolicy::ETag(lookup) => Some(lookup),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, LookupPolicy::ETag(_))
    }
}

impl<B: CacheBackend> Default for LookupPolicy<B> {
    fn default() -> Self {
        LookupPolicy::Disabled(BaseCacheLookup)
    }
}

impl<B: CacheBackend> From<ETagLookup<B>> for LookupPolicy<B> {
    fn from(lookup: ETagLookup<B>) -> Self {
        LookupPolicy::ETag(lookup)
    }
}

impl<B: CacheBackend> CacheLookup for LookupPolicy<B> {
    async fn get_header<T>(&self, obj: &T) -> Result<ResponseHeaders>
    where
        T: VersionedEntity + Sync,
    {
        match self {
            LookupPolicy::Disabled(lookup) => lookup.get_header(obj).await,
            LookupPolicy::ETag(lookup) => lookup.get_header(obj).await,
        }
    }

    async fn resource_unchanged<R>(&self, request: &R, key: &str) -> bool
    where
        R: RequestHeaders + Sync + ?Sized,
    {
        match self {
            LookupPolicy::Disabled(lookup) => lookup.resource_unchanged(request, key).await,
            LookupPolicy::ETag(lookup) => lookup.resource_unchanged(request, key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use http::{HeaderMap, HeaderValue};
    use serde::Serialize;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Serialize)]
    struct Widget {
        id: u64,
        etag: String,
    }

    impl VersionedEntity for Widget {}

    #[derive(Serialize)]
    struct Unversioned {
        id: u64,
    }

    impl VersionedEntity for Unversioned {}

    fn widget(id: u64, etag: &str) -> Widget {
        Widget {
            id,
            etag: etag.to_string(),
        }
    }

    fn request_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "if-none-match",
            HeaderValue::from_str(token).expect("Invalid header value"),
        );
        headers
    }

    /// Backend whose every operation fails.
    #[derive(Clone)]
    struct FailingBackend;

    impl CacheBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(Error::BackendError("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            Err(Error::BackendError("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Err(Error::BackendError("connection refused".to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct CountingMetrics {
        unchanged: Arc<AtomicUsize>,
        changed: Arc<AtomicUsize>,
        published: Arc<AtomicUsize>,
        precondition_failed: Arc<AtomicUsize>,
    }

    impl LookupMetrics for CountingMetrics {
        fn record_unchanged(&self, _key: &str) {
            self.unchanged.fetch_add(1, Ordering::SeqCst);
        }

        fn record_changed(&self, _key: &str) {
            self.changed.fetch_add(1, Ordering::SeqCst);
        }

        fn record_published(&self, _key: &str) {
            self.published.fetch_add(1, Ordering::SeqCst);
        }

        fn record_precondition_failed(&self, _type_name: &str) {
            self.precondition_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_base_lookup_is_noop() {
        let lookup = BaseCacheLookup;
        let headers = lookup
            .get_header(&widget(7, "abc123"))
            .await
            .expect("Failed to get header");

        assert!(headers.is_empty());
        assert!(
            !lookup
                .resource_unchanged(&request_with("abc123"), "etag-Widget-7")
                .await
        );
    }

    #[test]
    fn test_get_cache_key() {
        let lookup = ETagLookup::new(InMemoryBackend::new());
        let w = widget(7, "abc123");

        assert_eq!(
            lookup.get_cache_key(EntityRef::<Widget>::of_type(), 7),
            "etag-Widget-7"
        );
        assert_eq!(
            lookup.get_cache_key(EntityRef::instance(&w), 7),
            "etag-Widget-7"
        );
    }

    #[tokio::test]
    async fn test_get_header_publishes_under_placeholder_key() {
        let backend = InMemoryBackend::new();
        let lookup = ETagLookup::new(backend.clone());

        let headers = lookup
            .get_header(&widget(7, "abc123"))
            .await
            .expect("Failed to get header");

        assert_eq!(headers.get("ETag"), Some("abc123"));
        assert_eq!(headers.len(), 1);
        assert_eq!(
            backend.get("etag-Widget-pk").await.expect("Failed to get"),
            Some(b"abc123".to_vec())
        );
        assert!(backend
            .get("etag-Widget-7")
            .await
            .expect("Failed to get")
            .is_none());
    }

    #[tokio::test]
    async fn test_get_header_overwrites() {
        let backend = InMemoryBackend::new();
        let lookup = ETagLookup::new(backend.clone());

        lookup
            .get_header(&widget(7, "v1"))
            .await
            .expect("Failed to get header");
        lookup
            .get_header(&widget(8, "v2"))
            .await
            .expect("Failed to get header");

        assert_eq!(
            backend.get("etag-Widget-pk").await.expect("Failed to get"),
            Some(b"v2".to_vec())
        );
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_header_with_field_identity() {
        let backend = InMemoryBackend::new();
        let lookup = ETagLookup::new(backend.clone())
            .with_config(ETagConfig {
                key_identity: KeyIdentity::Field("id".to_string()),
                ..Default::default()
            })
            .expect("Invalid config");

        lookup
            .get_header(&widget(7, "v7"))
            .await
            .expect("Failed to get header");
        lookup
            .get_header(&widget(8, "v8"))
            .await
            .expect("Failed to get header");

        assert_eq!(
            backend.get("etag-Widget-7").await.expect("Failed to get"),
            Some(b"v7".to_vec())
        );
        assert_eq!(
            backend.get("etag-Widget-8").await.expect("Failed to get"),
            Some(b"v8".to_vec())
        );
    }

    #[tokio::test]
    async fn test_get_header_missing_attribute_writes_nothing() {
        let backend = InMemoryBackend::new();
        let lookup = ETagLookup::new(backend.clone());

        let result = lookup.get_header(&Unversioned { id: 1 }).await;

        match result {
            Err(Error::MissingAttribute {
                type_name,
                attribute,
            }) => {
                assert_eq!(type_name, "Unversioned");
                assert_eq!(attribute, "etag");
            }
            other => panic!("Expected MissingAttribute, got {:?}", other),
        }
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_header_survives_backend_failure() {
        let lookup = ETagLookup::new(FailingBackend);

        let headers = lookup
            .get_header(&widget(7, "abc123"))
            .await
            .expect("Failed to get header");

        assert_eq!(headers.get("ETag"), Some("abc123"));
    }

    #[tokio::test]
    async fn test_resource_unchanged_requires_stored_entry() {
        let lookup = ETagLookup::new(InMemoryBackend::new());

        assert!(
            !lookup
                .resource_unchanged(&request_with("abc123"), "etag-Widget-7")
                .await
        );
        assert!(
            !lookup
                .resource_unchanged(&HeaderMap::new(), "etag-Widget-7")
                .await
        );
    }

    #[tokio::test]
    async fn test_resource_unchanged_compares_exactly() {
        let backend = InMemoryBackend::new();
        backend
            .set("etag-Widget-7", b"\"abc123\"".to_vec(), None)
            .await
            .expect("Failed to set");
        let lookup = ETagLookup::new(backend);

        assert!(
            lookup
                .resource_unchanged(&request_with("\"abc123\""), "etag-Widget-7")
                .await
        );
        assert!(
            !lookup
                .resource_unchanged(&request_with("abc123"), "etag-Widget-7")
                .await
        );
        assert!(
            !lookup
                .resource_unchanged(&request_with("W/\"abc123\""), "etag-Widget-7")
                .await
        );
        assert!(
            !lookup
                .resource_unchanged(&HeaderMap::new(), "etag-Widget-7")
                .await
        );
    }

    #[tokio::test]
    async fn test_resource_unchanged_on_backend_failure() {
        let lookup = ETagLookup::new(FailingBackend);

        assert!(
            !lookup
                .resource_unchanged(&request_with("abc123"), "etag-Widget-pk")
                .await
        );
    }

    #[tokio::test]
    async fn test_publish_then_check_round_trip() {
        let lookup = ETagLookup::new(InMemoryBackend::new());
        let w = widget(7, "abc123");

        let headers = lookup.get_header(&w).await.expect("Failed to get header");
        let token = headers.get("ETag").expect("Missing ETag");
        let key = lookup.publish_key(&w).expect("Failed to derive key");

        assert!(lookup.resource_unchanged(&request_with(token), &key).await);
    }

    #[tokio::test]
    async fn test_non_ascii_token_round_trip() {
        let lookup = ETagLookup::new(InMemoryBackend::new());
        let w = widget(7, "\"café\"");

        lookup.get_header(&w).await.expect("Failed to get header");
        let key = lookup.publish_key(&w).expect("Failed to derive key");

        let mut headers = HeaderMap::new();
        headers.insert(
            "if-none-match",
            HeaderValue::from_bytes("\"café\"".as_bytes()).expect("Invalid header value"),
        );

        assert!(lookup.resource_unchanged(&headers, &key).await);
        assert!(lookup.precondition_check(&w, &headers).is_ok());
    }

    #[tokio::test]
    async fn test_custom_request_header_meta_key() {
        let backend = InMemoryBackend::new();
        backend
            .set("etag-Widget-pk", b"abc123".to_vec(), None)
            .await
            .expect("Failed to set");
        let lookup = ETagLookup::new(backend)
            .with_config(ETagConfig {
                request_header: "HTTP_IF_MATCH".to_string(),
                ..Default::default()
            })
            .expect("Invalid config");

        assert_eq!(lookup.request_header(), "if-match");

        let mut meta = HashMap::new();
        meta.insert("HTTP_IF_MATCH".to_string(), "abc123".to_string());
        assert!(lookup.resource_unchanged(&meta, "etag-Widget-pk").await);

        // The default header is no longer consulted.
        assert!(
            !lookup
                .resource_unchanged(&request_with("abc123"), "etag-Widget-pk")
                .await
        );
    }

    #[tokio::test]
    async fn test_precondition_check() {
        let lookup = ETagLookup::new(InMemoryBackend::new());
        let w = widget(7, "abc123");

        assert!(lookup
            .precondition_check(&w, &request_with("abc123"))
            .is_ok());

        match lookup.precondition_check(&w, &request_with("stale")) {
            Err(Error::PreconditionFailed {
                expected,
                presented,
            }) => {
                assert_eq!(expected, "abc123");
                assert_eq!(presented.as_deref(), Some("stale"));
            }
            other => panic!("Expected PreconditionFailed, got {:?}", other),
        }

        let err = lookup
            .precondition_check(&w, &HeaderMap::new())
            .expect_err("Missing header must fail");
        assert_eq!(err.status_code(), http::StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn test_precondition_check_missing_attribute() {
        let lookup = ETagLookup::new(InMemoryBackend::new());
        let result = lookup.precondition_check(&Unversioned { id: 1 }, &request_with("x"));

        assert!(matches!(result, Err(Error::MissingAttribute { .. })));
    }

    #[tokio::test]
    async fn test_custom_version_attribute() {
        #[derive(Serialize)]
        struct Document {
            revision: u32,
        }

        impl VersionedEntity for Document {}

        let lookup = ETagLookup::new(InMemoryBackend::new())
            .with_config(ETagConfig {
                version_attribute: "revision".to_string(),
                ..Default::default()
            })
            .expect("Invalid config");

        let headers = lookup
            .get_header(&Document { revision: 12 })
            .await
            .expect("Failed to get header");
        assert_eq!(headers.get("ETag"), Some("12"));
    }

    #[tokio::test]
    async fn test_with_config_rejects_invalid() {
        let result = ETagLookup::new(InMemoryBackend::new()).with_config(ETagConfig {
            version_attribute: String::new(),
            ..Default::default()
        });

        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let metrics = CountingMetrics::default();
        let lookup =
            ETagLookup::new(InMemoryBackend::new()).with_metrics(Box::new(metrics.clone()));
        let w = widget(7, "abc123");

        lookup.get_header(&w).await.expect("Failed to get header");
        assert!(
            lookup
                .resource_unchanged(&request_with("abc123"), "etag-Widget-pk")
                .await
        );
        assert!(
            !lookup
                .resource_unchanged(&request_with("old"), "etag-Widget-pk")
                .await
        );
        let _ = lookup.precondition_check(&w, &request_with("old"));

        assert_eq!(metrics.published.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.unchanged.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.changed.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.precondition_failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lookup_policy_dispatch() {
        let backend = InMemoryBackend::new();
        let disabled: LookupPolicy<InMemoryBackend> = LookupPolicy::default();
        let enabled = LookupPolicy::from(ETagLookup::new(backend.clone()));
        let w = widget(7, "abc123");

        assert!(!disabled.is_enabled());
        assert!(disabled.as_etag().is_none());
        assert!(disabled
            .get_header(&w)
            .await
            .expect("Failed to get header")
            .is_empty());

        assert!(enabled.is_enabled());
        let headers = enabled.get_header(&w).await.expect("Failed to get header");
        assert_eq!(headers.get("ETag"), Some("abc123"));

        let request = request_with("abc123");
        assert!(enabled.resource_unchanged(&request, "etag-Widget-pk").await);
        assert!(!disabled.resource_unchanged(&request, "etag-Widget-pk").await);
    }
}
