//! Type-erased store access for the dispatcher.
//!
//! The dispatcher routes by [`EntityKind`] and only sees wire payloads
//! (`serde_json::Value`); each registered entity type supplies a
//! [`JsonSink`] that decodes payloads into the typed item and applies
//! the typed [`Lifecycle`] event. Decode failures are logged and
//! surfaced as error events; the store never panics on malformed
//! server data.

use anvil_proto::{EntityKind, Method, NotifyAction};
use serde_json::Value;
use tracing::warn;

use crate::entity::Entity;
use crate::state::{Lifecycle, SharedCollection};

/// A lifecycle event at the wire level, before payload decoding.
#[derive(Debug, Clone)]
pub enum WireEvent {
	/// The request for `method` was handed to the transport.
	Start {
		/// Verb of the originating request.
		method: Method,
	},
	/// The backend accepted the request.
	Success {
		/// Verb of the originating request.
		method: Method,
		/// Verb-specific response payload.
		payload: Value,
		/// Params of the originating request (deletes recover the
		/// primary key from here; the response body is empty).
		params: Option<Value>,
	},
	/// The backend rejected the request, or the transport failed.
	Error {
		/// Verb of the originating request.
		method: Method,
		/// Opaque error payload, stored verbatim.
		payload: Value,
	},
	/// An uncorrelated server-push broadcast.
	Notify {
		/// What happened.
		action: NotifyAction,
		/// The changed item, or its primary key for deletes.
		payload: Value,
	},
	/// Caller-initiated transient-flag reset.
	Cleanup,
}

/// Object-safe store side consumed by the dispatcher.
pub trait CollectionSink: Send + Sync {
	/// The entity kind this sink belongs to.
	fn kind(&self) -> EntityKind;

	/// Name of the primary-key field inside wire payloads. Batched list
	/// continuations start from the last received value of this field.
	fn key_field(&self) -> &'static str;

	/// Applies one wire-level event to the underlying collection.
	fn apply(&self, event: WireEvent);
}

/// Adapts a typed [`SharedCollection`] to the wire level.
pub struct JsonSink<T: Entity> {
	collection: SharedCollection<T>,
}

impl<T: Entity> JsonSink<T> {
	/// Wraps a shared collection.
	pub fn new(collection: SharedCollection<T>) -> Self {
		Self { collection }
	}

	fn decode_error(&self, method: &Method, err: &serde_json::Error) -> Lifecycle<T> {
		warn!(
			entity = T::KIND,
			method = %method,
			error = %err,
			"malformed payload from backend",
		);
		let error = Value::String(format!("malformed {} payload: {err}", T::KIND));
		match method {
			Method::List => Lifecycle::FetchError(error),
			Method::Get => Lifecycle::GetError(error),
			Method::Create => Lifecycle::CreateError(error),
			Method::Update => Lifecycle::UpdateError(error),
			Method::Delete => Lifecycle::DeleteError(error),
			Method::Custom(_) => Lifecycle::CustomError(error),
		}
	}

	fn success_event(&self, method: Method, payload: Value, params: Option<Value>) -> Lifecycle<T> {
		match &method {
			Method::List => match serde_json::from_value::<Vec<T>>(payload) {
				Ok(items) => Lifecycle::FetchSuccess(items),
				Err(err) => self.decode_error(&method, &err),
			},
			Method::Get => match serde_json::from_value::<T>(payload) {
				Ok(item) => Lifecycle::GetSuccess(item),
				Err(err) => self.decode_error(&method, &err),
			},
			Method::Create => match serde_json::from_value::<T>(payload) {
				Ok(item) => Lifecycle::CreateSuccess(item),
				Err(err) => self.decode_error(&method, &err),
			},
			Method::Update => match serde_json::from_value::<T>(payload) {
				Ok(item) => Lifecycle::UpdateSuccess(item),
				Err(err) => self.decode_error(&method, &err),
			},
			Method::Delete => {
				let key = params
					.as_ref()
					.and_then(|params| params.get(T::KEY_FIELD))
					.cloned()
					.map(serde_json::from_value::<T::Key>);
				match key {
					Some(Ok(key)) => Lifecycle::DeleteSuccess(key),
					Some(Err(err)) => self.decode_error(&method, &err),
					None => {
						warn!(
							entity = T::KIND,
							"delete success without {:?} in request params",
							T::KEY_FIELD,
						);
						Lifecycle::DeleteError(Value::String(format!(
							"delete response for {} lacks a primary key",
							T::KIND
						)))
					}
				}
			}
			// Custom verbs may return the updated item, or any other
			// payload; only an item merges into the collection.
			Method::Custom(_) => {
				Lifecycle::CustomSuccess(serde_json::from_value::<T>(payload).ok())
			}
		}
	}
}

impl<T: Entity> CollectionSink for JsonSink<T> {
	fn kind(&self) -> EntityKind {
		T::kind()
	}

	fn key_field(&self) -> &'static str {
		T::KEY_FIELD
	}

	fn apply(&self, event: WireEvent) {
		let lifecycle = match event {
			WireEvent::Start { method } => match method {
				Method::List => Lifecycle::FetchStart,
				Method::Get => Lifecycle::GetStart,
				Method::Create => Lifecycle::CreateStart,
				Method::Update => Lifecycle::UpdateStart,
				Method::Delete => Lifecycle::DeleteStart,
				Method::Custom(_) => Lifecycle::CustomStart,
			},
			WireEvent::Success {
				method,
				payload,
				params,
			} => self.success_event(method, payload, params),
			WireEvent::Error { method, payload } => match method {
				Method::List => Lifecycle::FetchError(payload),
				Method::Get => Lifecycle::GetError(payload),
				Method::Create => Lifecycle::CreateError(payload),
				Method::Update => Lifecycle::UpdateError(payload),
				Method::Delete => Lifecycle::DeleteError(payload),
				Method::Custom(_) => Lifecycle::CustomError(payload),
			},
			WireEvent::Notify { action, payload } => match action {
				NotifyAction::Create | NotifyAction::Update => {
					match serde_json::from_value::<T>(payload) {
						Ok(item) if action == NotifyAction::Create => Lifecycle::NotifyCreate(item),
						Ok(item) => Lifecycle::NotifyUpdate(item),
						Err(err) => {
							// Uncorrelated push, nothing to attribute
							// the failure to: log and drop.
							warn!(
								entity = T::KIND,
								error = %err,
								"discarding undecodable notify payload",
							);
							return;
						}
					}
				}
				NotifyAction::Delete => match serde_json::from_value::<T::Key>(payload) {
					Ok(key) => Lifecycle::NotifyDelete(key),
					Err(err) => {
						warn!(
							entity = T::KIND,
							error = %err,
							"discarding undecodable notify key",
						);
						return;
					}
				},
			},
			WireEvent::Cleanup => Lifecycle::Cleanup,
		};
		self.collection.lock().apply(lifecycle);
	}
}

/// Entity-kind to sink mapping, built once at startup.
///
/// Explicitly injectable: tests construct isolated registries instead
/// of sharing process globals.
#[derive(Default)]
pub struct StoreRegistry {
	sinks: rustc_hash::FxHashMap<EntityKind, Box<dyn CollectionSink>>,
}

impl StoreRegistry {
	/// An empty registry.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an entity type's collection. Replaces any previous
	/// sink for the same kind.
	pub fn register<T: Entity>(&mut self, collection: SharedCollection<T>) {
		self.register_sink(Box::new(JsonSink::new(collection)));
	}

	/// Registers a pre-built sink.
	pub fn register_sink(&mut self, sink: Box<dyn CollectionSink>) {
		self.sinks.insert(sink.kind(), sink);
	}

	/// The sink for an entity kind, if registered.
	#[must_use]
	pub fn sink(&self, kind: &EntityKind) -> Option<&dyn CollectionSink> {
		self.sinks.get(kind).map(Box::as_ref)
	}

	/// Registered entity kinds.
	pub fn kinds(&self) -> impl Iterator<Item = &EntityKind> {
		self.sinks.keys()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde::{Deserialize, Serialize};
	use serde_json::json;

	use super::*;
	use crate::state::shared;

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Tag {
		id: u64,
		name: String,
	}

	impl Entity for Tag {
		type Key = u64;
		const KIND: &'static str = "tag";
		const KEY_FIELD: &'static str = "id";

		fn key(&self) -> u64 {
			self.id
		}
	}

	#[test]
	fn test_sink_decodes_list_payload() {
		let collection = shared::<Tag>();
		let sink = JsonSink::new(collection.clone());
		sink.apply(WireEvent::Success {
			method: Method::List,
			payload: json!([{"id": 1, "name": "virtual"}]),
			params: None,
		});
		let state = collection.lock();
		assert!(state.loaded());
		assert_eq!(state.items().len(), 1);
	}

	#[test]
	fn test_sink_surfaces_decode_failure_as_error() {
		let collection = shared::<Tag>();
		let sink = JsonSink::new(collection.clone());
		sink.apply(WireEvent::Start {
			method: Method::List,
		});
		sink.apply(WireEvent::Success {
			method: Method::List,
			payload: json!("not a list"),
			params: None,
		});
		let state = collection.lock();
		assert!(!state.loading());
		assert!(!state.loaded());
		assert!(state.errors().is_some());
	}

	#[test]
	fn test_sink_recovers_delete_key_from_params() {
		let collection = shared::<Tag>();
		collection.lock().apply(crate::Lifecycle::NotifyCreate(Tag {
			id: 4,
			name: "old".into(),
		}));
		let sink = JsonSink::new(collection.clone());
		sink.apply(WireEvent::Success {
			method: Method::Delete,
			payload: json!(null),
			params: Some(json!({"id": 4})),
		});
		let state = collection.lock();
		assert!(state.items().is_empty());
		assert!(state.saved());
	}

	#[test]
	fn test_sink_custom_verb_merges_returned_item() {
		let collection = shared::<Tag>();
		let sink = JsonSink::new(collection.clone());
		sink.apply(WireEvent::Success {
			method: Method::custom("rename"),
			payload: json!({"id": 2, "name": "renamed"}),
			params: None,
		});
		sink.apply(WireEvent::Success {
			method: Method::custom("refresh"),
			payload: json!(null),
			params: None,
		});
		let state = collection.lock();
		assert_eq!(
			state.get(&2),
			Some(&Tag {
				id: 2,
				name: "renamed".into(),
			})
		);
		assert!(state.saved());
	}

	#[test]
	fn test_sink_drops_undecodable_notify() {
		let collection = shared::<Tag>();
		let sink = JsonSink::new(collection.clone());
		sink.apply(WireEvent::Notify {
			action: NotifyAction::Update,
			payload: json!("garbage"),
		});
		let state = collection.lock();
		assert!(state.items().is_empty());
		assert_eq!(state.errors(), None);
	}

	#[test]
	fn test_registry_routes_by_kind() {
		let collection = shared::<Tag>();
		let mut registry = StoreRegistry::new();
		registry.register(collection.clone());
		let sink = registry.sink(&EntityKind::new("tag")).unwrap();
		assert_eq!(sink.key_field(), "id");
		assert!(registry.sink(&EntityKind::new("machine")).is_none());
	}
}
