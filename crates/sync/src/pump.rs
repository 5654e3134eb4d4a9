//! The channel pump task.
//!
//! One tokio task owns the inbound side of the sync channel: it feeds
//! connection events and decoded messages into the dispatcher and runs
//! the periodic timeout sweep. Call sites keep their own clone of the
//! [`SharedDispatcher`] for outbound sends.

use std::time::{Duration, Instant};

use anvil_proto::{Inbound, RequestEnvelope};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cache::EndpointCache;
use crate::dispatch::SharedDispatcher;

/// Interval between pending-request timeout sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// One event from the channel layer.
#[derive(Debug)]
pub enum ChannelEvent {
	/// The channel (re)connected and a session is established.
	Connected,
	/// The channel dropped.
	Disconnected,
	/// A decoded inbound message.
	Inbound(Inbound),
}

/// Drives a dispatcher from a stream of channel events.
///
/// Runs until the event sender is dropped; a closed stream counts as a
/// disconnect so pending requests never hang. Connects clear the
/// endpoint cache wholesale, as cached "loaded" state describes data
/// the backend may have changed while the channel was down.
pub async fn run(
	dispatcher: SharedDispatcher,
	mut events: mpsc::UnboundedReceiver<ChannelEvent>,
	cache: EndpointCache,
) {
	let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
	sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
	loop {
		tokio::select! {
			event = events.recv() => match event {
				Some(ChannelEvent::Connected) => {
					info!("channel connected");
					cache.clear_all();
				}
				Some(ChannelEvent::Disconnected) => {
					info!("channel disconnected");
					dispatcher.lock().on_disconnect();
				}
				Some(ChannelEvent::Inbound(inbound)) => {
					dispatcher.lock().on_message(inbound);
				}
				None => {
					debug!("channel event stream closed, pump exiting");
					dispatcher.lock().on_disconnect();
					return;
				}
			},
			_ = sweep.tick() => {
				let swept = dispatcher.lock().sweep_timeouts(Instant::now());
				if swept > 0 {
					debug!(count = swept, "swept timed-out requests");
				}
			}
		}
	}
}

/// Re-issues a request on a fixed interval until stopped.
///
/// The first send happens immediately. Stops when the `stop` channel
/// fires or its sender is dropped, or when a send is rejected (the
/// entity kind vanished from the registry). Each round gets a fresh
/// correlation id, so responses resolve like any other request.
pub async fn poll(
	dispatcher: SharedDispatcher,
	mut envelope: RequestEnvelope,
	every: Duration,
	mut stop: oneshot::Receiver<()>,
) {
	let mut tick = tokio::time::interval(every);
	tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
	loop {
		tokio::select! {
			_ = &mut stop => {
				debug!(entity = %envelope.entity, "polling stopped");
				return;
			}
			_ = tick.tick() => {
				envelope.id = None;
				if let Err(err) = dispatcher.lock().send(envelope.clone()) {
					warn!(entity = %envelope.entity, error = %err, "poll send failed, stopping");
					return;
				}
			}
		}
	}
}
