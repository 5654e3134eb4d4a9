//! The request correlator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anvil_proto::{
	CorrelationId, CorrelationIdGen, EntityKind, Inbound, Method, Outcome, RequestEnvelope,
};
use anvil_store::{StoreRegistry, WireEvent};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::actions::LocalEvent;
use crate::cache::EndpointCache;

/// Default time after which a request with no response resolves as an
/// error. The behavior this replaces was "hang forever" on a live
/// connection that silently dropped a message.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by the outbound channel primitive.
#[derive(Debug, Error)]
pub enum TransportError {
	/// The channel is closed.
	#[error("channel closed")]
	Closed,
	/// The channel rejected the message.
	#[error("send failed: {0}")]
	Send(String),
}

/// The outbound half of the external channel.
///
/// Handshake and session establishment are the caller's concern;
/// inbound traffic reaches the dispatcher through
/// [`Dispatcher::on_message`] (typically via [`crate::pump`]).
pub trait Transport: Send {
	/// Hands one envelope to the channel. Non-blocking.
	fn send(&mut self, req: &RequestEnvelope) -> Result<(), TransportError>;
}

/// Errors a caller can make when dispatching.
#[derive(Debug, Error)]
pub enum DispatchError {
	/// A caller-supplied correlation id is already pending.
	#[error("correlation id {0} is already pending")]
	CorrelationInUse(CorrelationId),
	/// No store is registered for the envelope's entity kind.
	#[error("no store registered for entity kind {0}")]
	UnknownEntity(EntityKind),
}

/// One entry in the pending-request table.
#[derive(Debug, Clone)]
pub struct PendingRequest {
	/// Entity kind the request targets.
	pub entity: EntityKind,
	/// Verb of the request.
	pub method: Method,
	/// Request params; deletes recover the primary key from here.
	pub params: Option<Value>,
	/// When the request was handed to the transport.
	pub issued_at: Instant,
	batch: Option<BatchState>,
}

/// Pages collected so far for a batched list fetch.
#[derive(Debug, Clone)]
struct BatchState {
	collected: Vec<Value>,
	limit: u64,
}

impl BatchState {
	fn new(limit: u64) -> Self {
		Self {
			collected: Vec::new(),
			limit,
		}
	}
}

/// A dispatcher shared between UI call sites and the pump task.
pub type SharedDispatcher = Arc<Mutex<Dispatcher>>;

/// Multiplexes all entity-kind traffic over one channel and routes
/// each response back to the request that produced it.
///
/// Owns the pending-request table exclusively; guarantees at most one
/// lifecycle event per correlation id, independent of response arrival
/// order.
pub struct Dispatcher {
	transport: Box<dyn Transport>,
	registry: StoreRegistry,
	pending: FxHashMap<CorrelationId, PendingRequest>,
	id_gen: CorrelationIdGen,
	request_timeout: Duration,
}

impl Dispatcher {
	/// Creates a dispatcher over a transport and a store registry.
	#[must_use]
	pub fn new(transport: Box<dyn Transport>, registry: StoreRegistry) -> Self {
		Self {
			transport,
			registry,
			pending: FxHashMap::default(),
			id_gen: CorrelationIdGen::new(),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}

	/// Overrides the request timeout.
	#[must_use]
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Number of requests currently awaiting a response.
	#[must_use]
	pub fn pending_count(&self) -> usize {
		self.pending.len()
	}

	/// Sends one request envelope.
	///
	/// Assigns a fresh correlation id when the envelope carries none; a
	/// caller-supplied id colliding with a pending entry is a caller
	/// error. The matching `*Start` event reaches the entity's store
	/// before the envelope reaches the transport; a transport failure
	/// resolves the request immediately with an error event. Returns
	/// the correlation id without waiting for the response.
	///
	/// A `List` request whose params carry a positive `limit` is fetched
	/// in batches: each full page triggers a continuation request and the
	/// store sees a single fetch success once the short page arrives.
	pub fn send(&mut self, mut envelope: RequestEnvelope) -> Result<CorrelationId, DispatchError> {
		let Some(sink) = self.registry.sink(&envelope.entity) else {
			return Err(DispatchError::UnknownEntity(envelope.entity));
		};
		let id = match envelope.id {
			Some(id) if self.pending.contains_key(&id) => {
				return Err(DispatchError::CorrelationInUse(id));
			}
			Some(id) => id,
			None => self.id_gen.next(),
		};
		envelope.id = Some(id);

		sink.apply(WireEvent::Start {
			method: envelope.method.clone(),
		});
		let batch = if envelope.method == Method::List {
			envelope
				.params
				.as_ref()
				.and_then(|params| params.get("limit"))
				.and_then(Value::as_u64)
				.filter(|limit| *limit > 0)
				.map(BatchState::new)
		} else {
			None
		};
		self.pending.insert(
			id,
			PendingRequest {
				entity: envelope.entity.clone(),
				method: envelope.method.clone(),
				params: envelope.params.clone(),
				issued_at: Instant::now(),
				batch,
			},
		);
		debug!(
			correlation_id = %id,
			entity = %envelope.entity,
			method = %envelope.method,
			"request sent",
		);
		if let Err(err) = self.transport.send(&envelope) {
			warn!(correlation_id = %id, error = %err, "transport rejected request");
			self.resolve_error(id, Value::String(err.to_string()));
		}
		Ok(id)
	}

	/// Sends a list request unless the endpoint cache says its data is
	/// already loaded.
	///
	/// The endpoint key is `entity.method`, marked loaded only once the
	/// transport accepted the request; a failed send leaves the key cold
	/// so the next attempt goes out again. Returns `None` when the fetch
	/// was suppressed. Non-list requests always go out; pass `nocache`
	/// semantics by calling [`Dispatcher::send`] directly.
	pub fn send_cached(
		&mut self,
		envelope: RequestEnvelope,
		cache: &EndpointCache,
	) -> Result<Option<CorrelationId>, DispatchError> {
		let endpoint = (envelope.method == Method::List)
			.then(|| format!("{}.{}", envelope.entity, envelope.method));
		if let Some(endpoint) = &endpoint {
			if cache.is_loaded(endpoint) {
				debug!(endpoint = %endpoint, "list fetch suppressed by endpoint cache");
				return Ok(None);
			}
		}
		let id = self.send(envelope)?;
		if let Some(endpoint) = endpoint {
			if self.pending.contains_key(&id) {
				cache.set_loaded(&endpoint);
			}
		}
		Ok(Some(id))
	}

	/// Applies a local-only event (e.g. `cleanup`) to its store.
	pub fn dispatch_local(&self, local: LocalEvent) -> Result<(), DispatchError> {
		let sink = self
			.registry
			.sink(&local.entity)
			.ok_or(DispatchError::UnknownEntity(local.entity.clone()))?;
		sink.apply(local.event);
		Ok(())
	}

	/// Routes one inbound message.
	///
	/// Responses resolve their pending entry; a response with no
	/// pending correlation is logged and discarded (it may belong to a
	/// request that already timed out). Notifies go straight to the
	/// entity's store.
	pub fn on_message(&mut self, inbound: Inbound) {
		match inbound {
			Inbound::Response(response) => {
				let Some(entry) = self.pending.remove(&response.id) else {
					warn!(
						correlation_id = %response.id,
						"discarding response with no pending request",
					);
					return;
				};
				debug!(
					correlation_id = %response.id,
					entity = %entry.entity,
					method = %entry.method,
					"response resolved",
				);
				let entity = entry.entity.clone();
				let event = match response.outcome {
					Outcome::Success(payload) => match self.advance_batch(entry, payload) {
						Some(event) => event,
						// A continuation went out; nothing surfaces yet.
						None => return,
					},
					Outcome::Error(payload) => WireEvent::Error {
						method: entry.method,
						payload,
					},
				};
				self.apply(&entity, event);
			}
			Inbound::Notify(notify) => {
				self.apply(
					&notify.entity,
					WireEvent::Notify {
						action: notify.action,
						payload: notify.payload,
					},
				);
			}
		}
	}

	/// Resolves every pending request with a connection-lost error and
	/// leaves the table empty.
	///
	/// No request is auto-replayed on reconnect: re-issuing a `create`
	/// could duplicate its side effect, so re-fetching is the caller's
	/// decision.
	pub fn on_disconnect(&mut self) {
		let pending = std::mem::take(&mut self.pending);
		if !pending.is_empty() {
			warn!(count = pending.len(), "connection lost with requests pending");
		}
		for (id, entry) in pending {
			debug!(correlation_id = %id, entity = %entry.entity, "resolving as connection lost");
			self.apply(
				&entry.entity,
				WireEvent::Error {
					method: entry.method,
					payload: Value::String("connection lost".to_string()),
				},
			);
		}
	}

	/// Resolves requests pending longer than the configured timeout.
	/// Returns how many were resolved.
	pub fn sweep_timeouts(&mut self, now: Instant) -> usize {
		let expired: Vec<CorrelationId> = self
			.pending
			.iter()
			.filter(|(_, entry)| {
				now.saturating_duration_since(entry.issued_at) >= self.request_timeout
			})
			.map(|(&id, _)| id)
			.collect();
		for &id in &expired {
			warn!(correlation_id = %id, "request timed out");
			self.resolve_error(id, Value::String("request timed out".to_string()));
		}
		expired.len()
	}

	/// Folds one successful response into its batch, if any.
	///
	/// Unbatched requests pass straight through. For a batched list, a
	/// full page (length equal to the current limit) is collected and a
	/// continuation request goes out, starting after the last received
	/// key and switching to `subsequent_limit` when the params carry
	/// one; returns `None` until the short page completes the batch,
	/// at which point the whole reassembled collection surfaces as one
	/// success event. An error or disconnect mid-batch resolves through
	/// the normal error path and abandons the collected pages.
	fn advance_batch(&mut self, entry: PendingRequest, payload: Value) -> Option<WireEvent> {
		let Some(mut batch) = entry.batch else {
			return Some(WireEvent::Success {
				method: entry.method,
				payload,
				params: entry.params,
			});
		};
		let page = match payload {
			Value::Array(page) => page,
			// Not a page; let the sink surface the shape mismatch.
			other => {
				return Some(WireEvent::Success {
					method: entry.method,
					payload: other,
					params: entry.params,
				});
			}
		};
		let full_page = page.len() as u64 == batch.limit;
		batch.collected.extend(page);
		let next_start = if full_page {
			self.registry
				.sink(&entry.entity)
				.map(|sink| sink.key_field())
				.and_then(|field| batch.collected.last()?.get(field).cloned())
		} else {
			None
		};
		let Some(start) = next_start else {
			return Some(WireEvent::Success {
				method: entry.method,
				payload: Value::Array(batch.collected),
				params: entry.params,
			});
		};

		let mut params = entry
			.params
			.as_ref()
			.and_then(Value::as_object)
			.cloned()
			.unwrap_or_default();
		if let Some(limit) = params
			.get("subsequent_limit")
			.and_then(Value::as_u64)
			.filter(|limit| *limit > 0)
		{
			batch.limit = limit;
			params.insert("limit".to_string(), limit.into());
		}
		params.insert("start".to_string(), start);

		let id = self.id_gen.next();
		let envelope = RequestEnvelope {
			id: Some(id),
			entity: entry.entity.clone(),
			method: Method::List,
			params: Some(Value::Object(params)),
		};
		self.pending.insert(
			id,
			PendingRequest {
				entity: entry.entity,
				method: Method::List,
				params: envelope.params.clone(),
				issued_at: Instant::now(),
				batch: Some(batch),
			},
		);
		debug!(
			correlation_id = %id,
			entity = %envelope.entity,
			"batch continuation sent",
		);
		if let Err(err) = self.transport.send(&envelope) {
			warn!(correlation_id = %id, error = %err, "transport rejected batch continuation");
			self.resolve_error(id, Value::String(err.to_string()));
		}
		None
	}

	fn resolve_error(&mut self, id: CorrelationId, payload: Value) {
		let Some(entry) = self.pending.remove(&id) else {
			return;
		};
		self.apply(
			&entry.entity,
			WireEvent::Error {
				method: entry.method,
				payload,
			},
		);
	}

	fn apply(&self, entity: &EntityKind, event: WireEvent) {
		match self.registry.sink(entity) {
			Some(sink) => sink.apply(event),
			None => warn!(entity = %entity, "no store registered for inbound event"),
		}
	}
}
