//! Wire-level types for the fleet console sync channel.
//!
//! Every entity kind (machines, devices, subnets, …) shares a single
//! bidirectional channel to the backend. This crate defines the envelopes
//! that travel over it:
//! * [`RequestEnvelope`]: an outgoing request, correlated by [`CorrelationId`]
//! * [`ResponseEnvelope`]: the reply to exactly one request
//! * [`NotifyMessage`]: an uncorrelated server-push broadcast
//! * [`Inbound`]: classification of an inbound wire message

#![warn(missing_docs)]

mod id;
mod message;

pub use id::{CorrelationId, CorrelationIdGen};
pub use message::{
	EntityKind, Inbound, Method, NotifyAction, NotifyMessage, Outcome, RequestEnvelope,
	ResponseEnvelope,
};
