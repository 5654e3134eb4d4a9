//! Request correlation over the single sync channel.
//!
//! All create/read/update/delete traffic for every entity kind shares
//! one bidirectional channel to the backend. The [`Dispatcher`] is the
//! only component that writes to the pending-request table and the only
//! caller of the outbound [`Transport`]; every inbound response is
//! routed back to the request that produced it regardless of arrival
//! order, and becomes exactly one lifecycle event on the right store.
//!
//! [`actions`] builds the canonical request envelopes per entity type,
//! [`EndpointCache`] suppresses redundant list fetches, and [`pump`]
//! holds the tokio drivers: the channel-event loop and the interval
//! poller.

#![warn(missing_docs)]

pub mod actions;
mod cache;
mod dispatch;
pub mod pump;

pub use actions::{Actions, LocalEvent};
pub use cache::EndpointCache;
pub use dispatch::{
	DispatchError, Dispatcher, PendingRequest, SharedDispatcher, Transport, TransportError,
};
