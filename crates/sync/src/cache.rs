//! Endpoint fetch-suppression cache.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

/// Tracks which "list" endpoints have already been fetched this
/// session, so mount-triggered refetches can be suppressed.
///
/// Purely an optimization hint: a stale or cleared cache costs an extra
/// round trip, never incorrect data. Clones share the same underlying
/// set; construct a fresh cache per application (or test) context
/// rather than relying on globals. Cleared wholesale on connect and on
/// session reset.
#[derive(Debug, Clone, Default)]
pub struct EndpointCache {
	inner: Arc<Mutex<FxHashSet<String>>>,
}

impl EndpointCache {
	/// An empty cache.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether a list fetch for this endpoint key was already issued.
	#[must_use]
	pub fn is_loaded(&self, key: &str) -> bool {
		self.inner.lock().contains(key)
	}

	/// Records that a list fetch for this endpoint key was issued.
	pub fn set_loaded(&self, key: &str) {
		self.inner.lock().insert(key.to_string());
	}

	/// Forgets everything. Subsequent fetches go to the backend again.
	pub fn clear_all(&self) {
		self.inner.lock().clear();
	}
}
