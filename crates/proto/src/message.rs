//! Envelope types and inbound message classification.

use std::sync::Arc;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CorrelationId;

/// Name of a synchronized resource kind, e.g. `machine` or `subnet`.
///
/// Cheap to clone and compare; usable as a map key. The backend sees the
/// kind verbatim as the model segment of the RPC method name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKind(Arc<str>);

impl EntityKind {
	/// Creates an entity kind from a name.
	pub fn new(name: impl AsRef<str>) -> Self {
		Self(Arc::from(name.as_ref()))
	}

	/// The kind's name.
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for EntityKind {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl std::fmt::Display for EntityKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl Serialize for EntityKind {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for EntityKind {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let name = String::deserialize(deserializer)?;
		Ok(Self::new(name))
	}
}

/// RPC verb carried by a [`RequestEnvelope`].
///
/// The five canonical verbs cover the generic collection lifecycle;
/// entity types may register additional verbs via [`Method::Custom`]
/// (e.g. a machine `set-zone` action).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
	/// Fetch the full collection.
	List,
	/// Fetch a single item by primary key.
	Get,
	/// Create an item.
	Create,
	/// Update an item.
	Update,
	/// Delete an item by primary key.
	Delete,
	/// An entity-specific verb, same envelope shape.
	Custom(Arc<str>),
}

impl Method {
	/// Creates a custom verb.
	pub fn custom(verb: impl AsRef<str>) -> Self {
		Self::Custom(Arc::from(verb.as_ref()))
	}

	/// The verb name as it appears on the wire.
	#[must_use]
	pub fn as_str(&self) -> &str {
		match self {
			Self::List => "list",
			Self::Get => "get",
			Self::Create => "create",
			Self::Update => "update",
			Self::Delete => "delete",
			Self::Custom(verb) => verb,
		}
	}

	/// Parses a wire verb name. Total: unknown names become [`Method::Custom`].
	#[must_use]
	pub fn parse(name: &str) -> Self {
		match name {
			"list" => Self::List,
			"get" => Self::Get,
			"create" => Self::Create,
			"update" => Self::Update,
			"delete" => Self::Delete,
			verb => Self::custom(verb),
		}
	}

	/// Whether this verb mutates backend state (drives `saving` rather
	/// than `loading` lifecycle flags).
	#[must_use]
	pub fn is_mutation(&self) -> bool {
		!matches!(self, Self::List | Self::Get)
	}
}

impl std::fmt::Display for Method {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Serialize for Method {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for Method {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let name = String::deserialize(deserializer)?;
		Ok(Self::parse(&name))
	}
}

/// An outgoing request. Immutable once sent.
///
/// `id` is left unset by action builders; the dispatcher assigns a fresh
/// [`CorrelationId`] before the envelope reaches the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
	/// Correlation id, assigned at send time when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<CorrelationId>,
	/// The resource kind this request targets.
	pub entity: EntityKind,
	/// The RPC verb.
	pub method: Method,
	/// Verb parameters, opaque to the sync core.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,
}

/// Result of a correlated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
	/// The backend accepted the request; payload is verb-specific.
	Success(Value),
	/// The backend rejected the request; payload is structurally opaque.
	Error(Value),
}

/// The reply to exactly one pending [`RequestEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
	/// Correlation id of the originating request.
	pub id: CorrelationId,
	/// Success or error payload.
	#[serde(flatten)]
	pub outcome: Outcome,
}

/// Action carried by a server-push broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyAction {
	/// An item was created elsewhere.
	Create,
	/// An item changed elsewhere.
	Update,
	/// An item was deleted elsewhere.
	Delete,
}

/// An uncorrelated broadcast: the backend pushes collection changes to
/// every connected console, independent of any request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyMessage {
	/// The resource kind that changed.
	pub entity: EntityKind,
	/// What happened.
	pub action: NotifyAction,
	/// The changed item (or its primary key for deletes).
	pub payload: Value,
}

/// Classification of an inbound wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
	/// A reply to a pending request.
	Response(ResponseEnvelope),
	/// A server-push broadcast.
	Notify(NotifyMessage),
}

impl Inbound {
	/// Decodes an inbound message from its wire JSON.
	pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(raw)
	}

	/// Encodes this message to wire JSON.
	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn test_method_round_trips_custom_verbs() {
		for name in ["list", "get", "create", "update", "delete", "set-zone"] {
			assert_eq!(Method::parse(name).as_str(), name);
		}
		assert_eq!(Method::parse("set-zone"), Method::custom("set-zone"));
	}

	#[test]
	fn test_mutation_classification() {
		assert!(!Method::List.is_mutation());
		assert!(!Method::Get.is_mutation());
		assert!(Method::Create.is_mutation());
		assert!(Method::custom("set-zone").is_mutation());
	}

	#[test]
	fn test_request_wire_layout() {
		let req = RequestEnvelope {
			id: Some(CorrelationId(7)),
			entity: EntityKind::new("machine"),
			method: Method::custom("set-zone"),
			params: Some(json!({"system_id": "abc123", "zone": 2})),
		};
		let encoded = serde_json::to_value(&req).unwrap();
		assert_eq!(
			encoded,
			json!({
				"id": 7,
				"entity": "machine",
				"method": "set-zone",
				"params": {"system_id": "abc123", "zone": 2},
			})
		);
		let decoded: RequestEnvelope = serde_json::from_value(encoded).unwrap();
		assert_eq!(decoded, req);
	}

	#[test]
	fn test_inbound_classifies_response_and_notify() {
		let response = Inbound::from_json(r#"{"type":"response","id":3,"success":[{"id":1}]}"#)
			.unwrap();
		assert_eq!(
			response,
			Inbound::Response(ResponseEnvelope {
				id: CorrelationId(3),
				outcome: Outcome::Success(json!([{"id": 1}])),
			})
		);

		let notify = Inbound::from_json(
			r#"{"type":"notify","entity":"subnet","action":"delete","payload":9}"#,
		)
		.unwrap();
		assert_eq!(
			notify,
			Inbound::Notify(NotifyMessage {
				entity: EntityKind::new("subnet"),
				action: NotifyAction::Delete,
				payload: json!(9),
			})
		);
	}

	#[test]
	fn test_error_outcome_is_opaque() {
		let raw = r#"{"type":"response","id":0,"error":{"hostname":["Already in use"]}}"#;
		let Inbound::Response(resp) = Inbound::from_json(raw).unwrap() else {
			panic!("expected response");
		};
		assert_eq!(
			resp.outcome,
			Outcome::Error(json!({"hostname": ["Already in use"]}))
		);
	}
}
