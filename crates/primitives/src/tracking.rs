use std::fmt;
use std::sync::Arc;

use crate::changeset::Bias;
use crate::range::CharIdx;
use crate::snapshot::{Snapshot, VersionNode};
use crate::span::Span;

/// How a tracking span's edges react to insertions exactly at them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanTrackingMode {
	/// Text inserted at either edge stays outside the span.
	#[default]
	EdgeExclusive,
	/// Text inserted at either edge becomes part of the span.
	EdgeInclusive,
}

impl SpanTrackingMode {
	fn biases(self) -> (Bias, Bias) {
		match self {
			Self::EdgeExclusive => (Bias::Right, Bias::Left),
			Self::EdgeInclusive => (Bias::Left, Bias::Right),
		}
	}
}

/// A span anchored to the version it was created on, resolvable against
/// any later snapshot of the same buffer.
///
/// Resolution maps both edges through every edit between the anchor
/// version and the target; it is a best-effort projection, not an exact
/// recomputation.
#[derive(Clone)]
pub struct TrackingSpan {
	origin: Arc<VersionNode>,
	start: CharIdx,
	end: CharIdx,
	mode: SpanTrackingMode,
}

impl TrackingSpan {
	pub fn new(span: &Span, mode: SpanTrackingMode) -> Self {
		Self {
			origin: Arc::clone(span.snapshot().node()),
			start: span.start(),
			end: span.end(),
			mode,
		}
	}

	/// Maps the span onto `snapshot`.
	///
	/// Returns `None` when `snapshot` belongs to another buffer or precedes
	/// the anchor version.
	pub fn resolve(&self, snapshot: &Snapshot) -> Option<Span> {
		let changes = self.origin.changes_until(snapshot.node())?;
		let (start_bias, end_bias) = self.mode.biases();

		let mut start = self.start;
		let mut end = self.end;
		for cs in changes {
			start = cs.map_pos(start, start_bias);
			end = cs.map_pos(end, end_bias).max(start);
		}
		Some(Span::new(snapshot.clone(), start, end))
	}
}

impl fmt::Debug for TrackingSpan {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TrackingSpan(v{} {}..{} {:?})", self.origin.number, self.start, self.end, self.mode)
	}
}
