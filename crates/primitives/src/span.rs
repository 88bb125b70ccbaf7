use std::fmt;
use std::ops::Range;

use crate::range::{CharIdx, CharLen};
use crate::snapshot::Snapshot;

/// A character range within one specific [`Snapshot`].
///
/// Spans are only comparable with spans of the same snapshot; every
/// relational helper returns `false`/`None` across snapshots.
#[derive(Clone, PartialEq, Eq)]
pub struct Span {
	snapshot: Snapshot,
	start: CharIdx,
	end: CharIdx,
}

impl Span {
	/// Creates a span over `start..end`, clamped to the snapshot length.
	pub fn new(snapshot: Snapshot, start: CharIdx, end: CharIdx) -> Self {
		debug_assert!(start <= end, "span start {start} after end {end}");
		let len = snapshot.len_chars();
		let end = end.min(len);
		let start = start.min(end);
		Self { snapshot, start, end }
	}

	/// Creates a span covering the whole snapshot.
	pub fn whole(snapshot: Snapshot) -> Self {
		let end = snapshot.len_chars();
		Self { snapshot, start: 0, end }
	}

	/// Returns the snapshot this span is expressed against.
	pub fn snapshot(&self) -> &Snapshot {
		&self.snapshot
	}

	pub fn start(&self) -> CharIdx {
		self.start
	}

	pub fn end(&self) -> CharIdx {
		self.end
	}

	pub fn range(&self) -> Range<CharIdx> {
		self.start..self.end
	}

	pub fn len(&self) -> CharLen {
		self.end - self.start
	}

	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}

	/// Returns true when both spans reference the same snapshot.
	pub fn same_snapshot(&self, other: &Span) -> bool {
		self.snapshot == other.snapshot
	}

	/// Returns true when `other` lies entirely within this span.
	pub fn contains_span(&self, other: &Span) -> bool {
		self.same_snapshot(other) && self.start <= other.start && other.end <= self.end
	}

	/// Returns true when the spans overlap or touch at a boundary.
	pub fn intersects(&self, other: &Span) -> bool {
		self.same_snapshot(other) && self.start <= other.end && other.start <= self.end
	}

	/// Returns the common part of two spans, which may be empty when they only touch.
	pub fn overlap(&self, other: &Span) -> Option<Span> {
		if !self.intersects(other) {
			return None;
		}
		Some(Self {
			snapshot: self.snapshot.clone(),
			start: self.start.max(other.start),
			end: self.end.min(other.end),
		})
	}

	/// Returns the smallest span covering both spans.
	pub fn union(&self, other: &Span) -> Option<Span> {
		if !self.same_snapshot(other) {
			return None;
		}
		Some(Self {
			snapshot: self.snapshot.clone(),
			start: self.start.min(other.start),
			end: self.end.max(other.end),
		})
	}
}

impl fmt::Debug for Span {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Span(v{} {}..{})", self.snapshot.version(), self.start, self.end)
	}
}
