//! Metrics hooks for lookup decisions.

/// Receives one callback per lookup outcome.
///
/// All methods default to no-ops; implement the ones you export.
pub trait LookupMetrics: Send + Sync {
    /// The stored version matched the client's token.
    fn record_unchanged(&self, _key: &str) {}

    /// No stored version, no token, or a mismatch.
    fn record_changed(&self, _key: &str) {}

    /// A version was written to the store by `get_header`.
    fn record_published(&self, _key: &str) {}

    /// A guarded write was rejected.
    fn record_precondition_failed(&self, _type_name: &str) {}
}

/// Default metrics implementation that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMetrics;

impl LookupMetrics for NoOpMetrics {}
