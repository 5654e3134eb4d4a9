//! Request correlation identifiers.

use serde::{Deserialize, Serialize};

/// Identifies one in-flight request so its response can be routed back.
///
/// Unique among currently-pending requests; reuse after completion is
/// allowed but the generator never recycles within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl std::fmt::Display for CorrelationId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Simple counter-based generator for [`CorrelationId`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrelationIdGen(u64);

impl CorrelationIdGen {
	/// Creates a new generator starting at 0.
	#[must_use]
	pub const fn new() -> Self {
		Self(0)
	}

	/// Generates the next unique id and increments the counter.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&mut self) -> CorrelationId {
		let id = self.0;
		self.0 += 1;
		CorrelationId(id)
	}
}
