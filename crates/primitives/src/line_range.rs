//! Line-granular ranges, their snapshot-bound form, and normalized sets of them.

use std::fmt;

use smallvec::SmallVec;

use crate::range::LineIdx;
use crate::snapshot::Snapshot;
use crate::span::Span;

/// A non-empty run of consecutive lines: `start..=last_line()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineRange {
	start: LineIdx,
	count: usize,
}

impl LineRange {
	/// Creates a range of `count` lines starting at `start`; `count` is at least 1.
	pub fn new(start: LineIdx, count: usize) -> Self {
		debug_assert!(count > 0, "line range must cover at least one line");
		Self {
			start,
			count: count.max(1),
		}
	}

	/// Creates a range from inclusive bounds.
	pub fn from_bounds(start: LineIdx, last: LineIdx) -> Self {
		debug_assert!(start <= last, "line range start {start} after last {last}");
		Self::new(start, last.saturating_sub(start) + 1)
	}

	pub fn start(&self) -> LineIdx {
		self.start
	}

	pub fn count(&self) -> usize {
		self.count
	}

	pub fn last_line(&self) -> LineIdx {
		self.start + self.count - 1
	}

	/// Returns true when `line` is inside the range.
	pub fn contains_line(&self, line: LineIdx) -> bool {
		self.start <= line && line <= self.last_line()
	}

	/// Returns true when `other` lies entirely within this range.
	pub fn contains(&self, other: &LineRange) -> bool {
		self.start <= other.start && other.last_line() <= self.last_line()
	}

	/// Returns true when the ranges overlap or are adjacent.
	///
	/// Adjacent ranges intersect: `0..=2` and `3..=4` touch at the boundary
	/// between lines 2 and 3.
	pub fn intersects(&self, other: &LineRange) -> bool {
		self.start <= other.last_line() + 1 && other.start <= self.last_line() + 1
	}

	/// Returns the smallest range covering both ranges.
	pub fn union(&self, other: &LineRange) -> LineRange {
		LineRange::from_bounds(self.start.min(other.start), self.last_line().max(other.last_line()))
	}

	/// Splits the range into consecutive pieces of at most `size` lines.
	pub fn chunks(self, size: usize) -> impl Iterator<Item = LineRange> {
		let size = size.max(1);
		let end = self.start + self.count;
		(self.start..end).step_by(size).map(move |start| LineRange::new(start, size.min(end - start)))
	}
}

/// A [`LineRange`] bound to the snapshot it was computed against.
#[derive(Clone, PartialEq, Eq)]
pub struct SnapshotLineRange {
	snapshot: Snapshot,
	range: LineRange,
}

impl SnapshotLineRange {
	/// Binds `range` to `snapshot`, clamping it to the snapshot's lines.
	pub fn new(snapshot: Snapshot, range: LineRange) -> Self {
		let max_line = snapshot.line_count() - 1;
		let start = range.start().min(max_line);
		let last = range.last_line().min(max_line);
		Self {
			snapshot,
			range: LineRange::from_bounds(start, last),
		}
	}

	/// Expands `span` to the whole lines it touches.
	///
	/// The line holding the span's end only counts when the span actually
	/// covers a character on it; a span ending exactly at a line start stops
	/// at the previous line.
	pub fn for_span(span: &Span) -> Self {
		let snapshot = span.snapshot();
		let start = snapshot.char_to_line(span.start());
		let last = if span.is_empty() {
			start
		} else {
			snapshot.char_to_line(span.end() - 1)
		};
		Self {
			snapshot: snapshot.clone(),
			range: LineRange::from_bounds(start, last.max(start)),
		}
	}

	/// Covers every line of `snapshot`.
	pub fn full(snapshot: Snapshot) -> Self {
		let count = snapshot.line_count();
		Self {
			snapshot,
			range: LineRange::new(0, count),
		}
	}

	pub fn snapshot(&self) -> &Snapshot {
		&self.snapshot
	}

	pub fn range(&self) -> LineRange {
		self.range
	}

	pub fn start_line(&self) -> LineIdx {
		self.range.start()
	}

	pub fn last_line(&self) -> LineIdx {
		self.range.last_line()
	}

	pub fn count(&self) -> usize {
		self.range.count()
	}

	/// Returns the span covered by these lines, including the last line break.
	pub fn extent(&self) -> Span {
		let start = self.snapshot.line_start(self.range.start());
		let end = self.snapshot.line_end_including_break(self.range.last_line());
		Span::new(self.snapshot.clone(), start, end)
	}

	/// Splits into consecutive pieces of at most `size` lines.
	pub fn chunks(&self, size: usize) -> impl Iterator<Item = SnapshotLineRange> + '_ {
		self.range.chunks(size).map(|range| Self {
			snapshot: self.snapshot.clone(),
			range,
		})
	}
}

impl fmt::Debug for SnapshotLineRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Lines(v{} {}..={})", self.snapshot.version(), self.range.start(), self.range.last_line())
	}
}

/// Sorted set of line ranges where intersecting or adjacent members are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineRangeSet {
	ranges: SmallVec<[LineRange; 4]>,
}

impl LineRangeSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.ranges.is_empty()
	}

	/// Returns the normalized members in ascending order.
	pub fn ranges(&self) -> &[LineRange] {
		&self.ranges
	}

	/// Returns the range spanning the first through the last member.
	pub fn overarching(&self) -> Option<LineRange> {
		let first = self.ranges.first()?;
		let last = self.ranges.last()?;
		Some(first.union(last))
	}

	/// Returns true when every line of `range` is in the set.
	pub fn contains(&self, range: &LineRange) -> bool {
		self.ranges.iter().any(|r| r.contains(range))
	}

	/// Returns true when any member overlaps or touches `range`.
	pub fn intersects(&self, range: &LineRange) -> bool {
		self.ranges.iter().any(|r| r.intersects(range))
	}

	/// Adds `range`, merging it with every member it intersects.
	pub fn add(&mut self, range: LineRange) {
		let mut merged = range;
		let mut placed = false;
		let mut out: SmallVec<[LineRange; 4]> = SmallVec::with_capacity(self.ranges.len() + 1);

		for existing in self.ranges.drain(..) {
			if existing.intersects(&merged) {
				merged = merged.union(&existing);
			} else if existing.last_line() < merged.start() {
				out.push(existing);
			} else {
				if !placed {
					out.push(merged);
					placed = true;
				}
				out.push(existing);
			}
		}
		if !placed {
			out.push(merged);
		}

		self.ranges = out;
	}
}

impl FromIterator<LineRange> for LineRangeSet {
	fn from_iter<I: IntoIterator<Item = LineRange>>(iter: I) -> Self {
		let mut set = Self::new();
		for range in iter {
			set.add(range);
		}
		set
	}
}
