//! Cache key construction.

use crate::entity::{EntityRef, VersionedEntity};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Prefix shared by every ETag cache key.
pub const KEY_PREFIX: &str = "etag";

/// Identifier used by `get_header` when no field is configured.
pub const PLACEHOLDER_IDENTIFIER: &str = "pk";

/// Builds cache keys of the form `"etag-{type_name}-{identifier}"`.
///
/// The first separator after the prefix ends the type name, so distinct
/// `(type, identifier)` pairs never share a key as long as the type name has
/// no `-`. Default entity names are Rust identifiers and never do; an
/// overridden [`VersionedEntity::entity_name`] must keep it that way, which
/// [`CacheKeyBuilder::for_entity`] checks in debug builds.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Build a key from a type name and identifier.
    ///
    /// # Example
    ///
    /// ```
    /// use etag_kit::key::CacheKeyBuilder;
    ///
    /// assert_eq!(CacheKeyBuilder::build("Widget", 7), "etag-Widget-7");
    /// ```
    pub fn build(type_name: &str, identifier: impl Display) -> String {
        format!("{}-{}-{}", KEY_PREFIX, type_name, identifier)
    }

    /// Build a key for an entity given by type or by instance.
    ///
    /// Both forms resolve to the type's name, so they agree for the same
    /// identifier.
    pub fn for_entity<T: VersionedEntity>(
        entity: EntityRef<'_, T>,
        identifier: impl Display,
    ) -> String {
        let type_name = entity.type_name();
        debug_assert!(
            !type_name.contains('-'),
            "entity name {:?} contains '-' and would make keys ambiguous",
            type_name
        );
        Self::build(type_name, identifier)
    }

    /// Split a key back into its type name and identifier.
    ///
    /// Returns `None` for keys not produced by [`CacheKeyBuilder::build`].
    pub fn parse(key: &str) -> Option<(&str, &str)> {
        let rest = key.strip_prefix(KEY_PREFIX)?.strip_prefix('-')?;
        rest.split_once('-')
    }
}

/// Which identifier `get_header` places in the key it publishes under.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyIdentity {
    /// Always the literal `"pk"`.
    ///
    /// Every instance of a type then shares one stored version. This is the
    /// historical behavior and stays the default.
    #[default]
    Placeholder,
    /// The object's own value for the named field.
    Field(String),
}
