//! # etag-kit
//!
//! Pluggable cache lookup policies for conditional HTTP requests.
//!
//! A resource's freshness is represented by an opaque version token (ETag)
//! read from the domain object. The policy publishes that token to a
//! key-value store when responding, and later compares the stored token
//! against the client's `If-None-Match` header to decide whether the
//! resource must be processed again, all without re-serializing it.
//!
//! ## Features
//!
//! - **Null policy:** [`BaseCacheLookup`] lets callers invoke a policy unconditionally
//! - **Backend Agnostic:** in-memory, Redis, Memcached, or any [`CacheBackend`]
//! - **Framework Independent:** works on `http::HeaderMap`, `http::Request`, or CGI-style metadata
//! - **Explicit errors:** precondition failures are returned, never panicked, and map to `412`
//!
//! ## Quick Start
//!
//! ```ignore
//! use etag_kit::{
//!     backend::InMemoryBackend, CacheLookup, EntityRef, ETagLookup, VersionedEntity,
//! };
//!
//! // 1. Define your entity
//! #[derive(Serialize)]
//! struct Widget {
//!     id: u64,
//!     etag: String,
//! }
//!
//! // 2. Implement VersionedEntity
//! impl VersionedEntity for Widget {}
//!
//! // 3. Build a policy over a store
//! let lookup = ETagLookup::new(InMemoryBackend::new());
//!
//! // 4. Short-circuit reads the client already has
//! let key = lookup.get_cache_key(EntityRef::<Widget>::of_type(), "pk");
//! if lookup.resource_unchanged(&request, &key).await {
//!     return StatusCode::NOT_MODIFIED;
//! }
//!
//! // 5. Guard writes and publish new versions
//! lookup.precondition_check(&widget, &request)?;
//! let headers = lookup.get_header(&widget).await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod entity;
pub mod error;
pub mod header;
pub mod key;
pub mod lookup;
pub mod observability;
pub mod request;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use config::ETagConfig;
pub use entity::{EntityRef, VersionedEntity};
pub use error::{Error, Result};
pub use header::ResponseHeaders;
pub use key::{CacheKeyBuilder, KeyIdentity};
pub use lookup::{BaseCacheLookup, CacheLookup, ETagLookup, LookupPolicy};
pub use observability::{LookupMetrics, NoOpMetrics};
pub use request::RequestHeaders;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
