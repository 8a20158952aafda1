//! Versioned domain objects and the type-or-instance identity they resolve to.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::marker::PhantomData;

/// Trait for domain objects whose freshness is tracked by an ETag.
///
/// The policy never computes a version. It reads whatever the object exposes
/// under the configured attribute name and transports it unchanged, so the
/// value must change whenever the observable state changes.
///
/// # Example
///
/// ```
/// use serde::Serialize;
/// use etag_kit::VersionedEntity;
///
/// #[derive(Serialize)]
/// pub struct Widget {
///     pub id: u64,
///     pub etag: String,
/// }
///
/// impl VersionedEntity for Widget {}
///
/// let widget = Widget { id: 7, etag: "abc123".to_string() };
/// assert_eq!(Widget::entity_name(), "Widget");
/// assert_eq!(widget.attribute("etag").unwrap().as_deref(), Some("abc123"));
/// ```
pub trait VersionedEntity: Serialize {
    /// Name of the type, used as the first component of cache keys.
    ///
    /// Defaults to the last path segment of the Rust type name, with generic
    /// arguments removed: `app::models::Widget` becomes `"Widget"`.
    ///
    /// Overrides must not contain `-`: it separates key components, so
    /// `"Line-Item"` with id `7` and `"Line"` with id `Item-7` would share
    /// `etag-Line-Item-7`.
    fn entity_name() -> &'static str
    where
        Self: Sized,
    {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Read a named attribute as text.
    ///
    /// The default implementation serializes `self` with `serde_json` and
    /// looks up a top-level field. Strings are returned verbatim, numbers and
    /// booleans in their canonical form. Missing fields, `null`, arrays and
    /// objects are reported as `None`.
    ///
    /// Override this when serializing the whole object is too expensive.
    ///
    /// # Errors
    ///
    /// Returns `Error::SerializationError` if `self` cannot be serialized.
    fn attribute(&self, name: &str) -> Result<Option<Cow<'_, str>>> {
        let value = serde_json::to_value(self)?;
        Ok(match value {
            Value::Object(mut fields) => fields.remove(name).and_then(scalar_text).map(Cow::Owned),
            _ => None,
        })
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Strip module path and generic arguments from a full type name.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Read an attribute that must be present.
///
/// # Errors
///
/// - `Error::MissingAttribute` if the object does not expose `name`
/// - `Error::SerializationError` if reading it requires serialization that fails
pub(crate) fn require_attribute<T: VersionedEntity>(obj: &T, name: &str) -> Result<String> {
    match obj.attribute(name)? {
        Some(value) => Ok(value.into_owned()),
        None => Err(Error::MissingAttribute {
            type_name: T::entity_name(),
            attribute: name.to_string(),
        }),
    }
}

/// Reference to an entity either by type or by instance.
///
/// Key derivation accepts both and always resolves to the type's name, so
/// `EntityRef::<Widget>::of_type()` and `EntityRef::from(&widget)` produce the
/// same key for the same identifier.
pub enum EntityRef<'a, T> {
    /// The type itself, with no instance at hand.
    Type(PhantomData<fn() -> T>),
    /// A borrowed instance of the type.
    Instance(&'a T),
}

impl<'a, T: VersionedEntity> EntityRef<'a, T> {
    /// Refer to the type `T` without an instance.
    pub fn of_type() -> Self {
        EntityRef::Type(PhantomData)
    }

    /// Refer to a concrete instance.
    pub fn instance(obj: &'a T) -> Self {
        EntityRef::Instance(obj)
    }

    /// Resolve the type name, whichever variant this is.
    pub fn type_name(&self) -> &'static str {
        T::entity_name()
    }

    /// The instance, if this reference carries one.
    pub fn as_instance(&self) -> Option<&'a T> {
        match self {
            EntityRef::Type(_) => None,
            EntityRef::Instance(obj) => Some(obj),
        }
    }
}

impl<'a, T: VersionedEntity> From<&'a T> for EntityRef<'a, T> {
    fn from(obj: &'a T) -> Self {
        EntityRef::Instance(obj)
    }
}
