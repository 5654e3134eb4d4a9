//! The per-entity-type configuration.

use std::fmt::Debug;
use std::hash::Hash;

use anvil_proto::EntityKind;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Static shape of a synchronized resource kind.
///
/// Implemented once per entity type at startup; everything else in the
/// sync core is generic over it. `KIND` must match the model name the
/// backend uses on the wire, `KEY_FIELD` the primary-key field inside
/// request params (delete responses carry no body, so the key is
/// recovered from the originating request).
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + 'static {
	/// Primary-key type, e.g. `u64` or a `system_id` string.
	type Key: Eq + Hash + Clone + Debug + Serialize + DeserializeOwned + Send + 'static;

	/// Wire name of the entity kind, e.g. `"machine"`.
	const KIND: &'static str;

	/// Name of the primary-key field inside request params, e.g. `"id"`.
	const KEY_FIELD: &'static str;

	/// This item's primary key.
	fn key(&self) -> Self::Key;

	/// The kind as an [`EntityKind`] value.
	#[must_use]
	fn kind() -> EntityKind {
		EntityKind::new(Self::KIND)
	}
}
