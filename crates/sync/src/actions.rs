//! Canonical request constructors per entity type.
//!
//! Builders are total and side-effect-free: they shape envelopes and
//! perform no validation (business rules live behind the backend).
//! Correlation ids are left unset; the dispatcher assigns them at send
//! time.

use std::marker::PhantomData;

use anvil_proto::{EntityKind, Method, RequestEnvelope};
use anvil_store::{Entity, WireEvent};
use serde_json::{Value, json};

/// A lifecycle event that never crosses the channel, addressed to one
/// entity kind's store.
#[derive(Debug, Clone)]
pub struct LocalEvent {
	/// Target entity kind.
	pub entity: EntityKind,
	/// The event to apply.
	pub event: WireEvent,
}

/// Request builders for one entity type.
///
/// Entity types may extend the canonical five with custom verbs via
/// [`Actions::custom`]; the envelope shape is identical.
pub struct Actions<T: Entity>(PhantomData<T>);

impl<T: Entity> Actions<T> {
	fn envelope(method: Method, params: Option<Value>) -> RequestEnvelope {
		RequestEnvelope {
			id: None,
			entity: T::kind(),
			method,
			params,
		}
	}

	fn key_params(key: &T::Key) -> Value {
		let mut params = serde_json::Map::new();
		params.insert(
			T::KEY_FIELD.to_string(),
			serde_json::to_value(key).unwrap_or(Value::Null),
		);
		Value::Object(params)
	}

	/// Fetch the full collection.
	#[must_use]
	pub fn fetch() -> RequestEnvelope {
		Self::envelope(Method::List, None)
	}

	/// Fetch the full collection in pages of `limit` items.
	///
	/// The dispatcher re-issues the request from the last received key
	/// until a short page arrives; the store still sees one complete
	/// fetch. Useful for entity kinds too large for a single response.
	#[must_use]
	pub fn fetch_batched(limit: u64) -> RequestEnvelope {
		Self::envelope(Method::List, Some(json!({"limit": limit})))
	}

	/// Fetch a single item by primary key.
	#[must_use]
	pub fn get(key: &T::Key) -> RequestEnvelope {
		Self::envelope(Method::Get, Some(Self::key_params(key)))
	}

	/// Create an item from backend-shaped params.
	#[must_use]
	pub fn create(params: Value) -> RequestEnvelope {
		Self::envelope(Method::Create, Some(params))
	}

	/// Update an item from backend-shaped params.
	#[must_use]
	pub fn update(params: Value) -> RequestEnvelope {
		Self::envelope(Method::Update, Some(params))
	}

	/// Delete an item by primary key.
	#[must_use]
	pub fn delete(key: &T::Key) -> RequestEnvelope {
		Self::envelope(Method::Delete, Some(Self::key_params(key)))
	}

	/// An entity-specific verb (e.g. a machine `set-zone`).
	#[must_use]
	pub fn custom(verb: &str, params: Option<Value>) -> RequestEnvelope {
		Self::envelope(Method::custom(verb), params)
	}

	/// Reset `errors`/`saved`/`saving`. Local-only: no channel round
	/// trip, dispatched via [`crate::Dispatcher::dispatch_local`].
	#[must_use]
	pub fn cleanup() -> LocalEvent {
		LocalEvent {
			entity: T::kind(),
			event: WireEvent::Cleanup,
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde::{Deserialize, Serialize};
	use serde_json::json;

	use super::*;

	#[derive(Debug, Clone, Serialize, Deserialize)]
	struct Subnet {
		id: u64,
		cidr: String,
	}

	impl Entity for Subnet {
		type Key = u64;
		const KIND: &'static str = "subnet";
		const KEY_FIELD: &'static str = "id";

		fn key(&self) -> u64 {
			self.id
		}
	}

	#[test]
	fn test_fetch_shape() {
		let req = Actions::<Subnet>::fetch();
		assert_eq!(req.id, None);
		assert_eq!(req.entity, EntityKind::new("subnet"));
		assert_eq!(req.method, Method::List);
		assert_eq!(req.params, None);
	}

	#[test]
	fn test_fetch_batched_carries_limit() {
		let req = Actions::<Subnet>::fetch_batched(25);
		assert_eq!(req.method, Method::List);
		assert_eq!(req.params, Some(json!({"limit": 25})));
	}

	#[test]
	fn test_delete_carries_key_params() {
		let req = Actions::<Subnet>::delete(&7);
		assert_eq!(req.method, Method::Delete);
		assert_eq!(req.params, Some(json!({"id": 7})));
	}

	#[test]
	fn test_custom_verb() {
		let req = Actions::<Subnet>::custom("scan", Some(json!({"id": 7})));
		assert_eq!(req.method, Method::custom("scan"));
	}

	#[test]
	fn test_cleanup_is_local_only() {
		let local = Actions::<Subnet>::cleanup();
		assert_eq!(local.entity, EntityKind::new("subnet"));
		assert!(matches!(local.event, WireEvent::Cleanup));
	}
}
