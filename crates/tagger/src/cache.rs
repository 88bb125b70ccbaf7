//! What a tagger currently knows about tags.
//!
//! The background entry is exact and belongs to one snapshot. When a request
//! arrives for a newer snapshot it degrades into a tracking entry whose spans
//! are remapped through the edits in between; tracking data only ever serves
//! as a stand-in until the new background job reports.

use xeno_primitives::{LineRange, LineRangeSet, Snapshot, SnapshotLineRange, Span, SpanTrackingMode, TrackingSpan};

use crate::source::TagSpan;

/// Result of consulting the cache for one span.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Lookup<T> {
	/// Nothing usable is cached.
	None,
	/// Some tags are known; the span still needs computing.
	Partial(Vec<TagSpan<T>>),
	/// The span is fully computed for its snapshot.
	Complete(Vec<TagSpan<T>>),
}

/// Exact tags for the lines computed so far on one snapshot.
#[derive(Debug, Clone)]
pub(crate) struct BackgroundEntry<T> {
	snapshot: Snapshot,
	covered: LineRangeSet,
	tags: Vec<TagSpan<T>>,
}

impl<T: Clone> BackgroundEntry<T> {
	fn new(snapshot: Snapshot) -> Self {
		Self {
			snapshot,
			covered: LineRangeSet::new(),
			tags: Vec::new(),
		}
	}

	pub(crate) fn snapshot(&self) -> &Snapshot {
		&self.snapshot
	}

	pub(crate) fn covered(&self) -> &LineRangeSet {
		&self.covered
	}

	#[cfg(test)]
	pub(crate) fn tags(&self) -> &[TagSpan<T>] {
		&self.tags
	}

	/// Returns the span from the first to the last computed line.
	pub(crate) fn extent(&self) -> Option<Span> {
		let lines = self.covered.overarching()?;
		Some(SnapshotLineRange::new(self.snapshot.clone(), lines).extent())
	}

	fn covers(&self, lines: &LineRange) -> bool {
		self.covered.contains(lines)
	}

	/// Replaces whatever was known about `lines` with `tags`.
	///
	/// Tags reaching into `lines` from an earlier chunk are kept and not
	/// added a second time.
	fn merge(mut self, lines: &SnapshotLineRange, tags: Vec<TagSpan<T>>) -> Self
	where
		T: PartialEq,
	{
		let extent = lines.extent();
		self.tags.retain(|t| !starts_within(&extent, &t.span));
		for tag in tags {
			if !self.tags.contains(&tag) {
				self.tags.push(tag);
			}
		}
		self.covered.add(lines.range());
		self
	}

	fn degrade(&self) -> Option<TrackingEntry<T>> {
		let region = self.extent()?;
		Some(TrackingEntry {
			region: TrackingSpan::new(&region, SpanTrackingMode::EdgeInclusive),
			tags: self.tags.iter().map(TrackedTag::new).collect(),
		})
	}
}

#[derive(Debug, Clone)]
struct TrackedTag<T> {
	span: TrackingSpan,
	was_empty: bool,
	tag: T,
}

impl<T: Clone> TrackedTag<T> {
	fn new(tag: &TagSpan<T>) -> Self {
		Self {
			span: TrackingSpan::new(&tag.span, SpanTrackingMode::EdgeExclusive),
			was_empty: tag.span.is_empty(),
			tag: tag.tag.clone(),
		}
	}

	/// A non-empty tag whose text was deleted entirely resolves to nothing.
	fn resolve(&self, snapshot: &Snapshot) -> Option<TagSpan<T>> {
		let span = self.span.resolve(snapshot)?;
		if span.is_empty() && !self.was_empty {
			return None;
		}
		Some(TagSpan::new(span, self.tag.clone()))
	}
}

/// Stale tags carried across snapshot transitions.
#[derive(Debug, Clone)]
pub(crate) struct TrackingEntry<T> {
	region: TrackingSpan,
	tags: Vec<TrackedTag<T>>,
}

impl<T: Clone + PartialEq> TrackingEntry<T> {
	pub(crate) fn region(&self, snapshot: &Snapshot) -> Option<Span> {
		self.region.resolve(snapshot)
	}

	pub(crate) fn resolve_tags<'a>(&'a self, snapshot: &'a Snapshot) -> impl Iterator<Item = TagSpan<T>> + 'a {
		self.tags.iter().filter_map(move |t| t.resolve(snapshot))
	}

	/// Combines `newer` and `self` into one entry anchored at `snapshot`.
	///
	/// The region is the union of whichever regions still resolve; tags are
	/// deduplicated by resolved span, preferring `newer`'s.
	fn merge(self, newer: TrackingEntry<T>, snapshot: &Snapshot) -> Option<Self> {
		let region = match (newer.region(snapshot), self.region(snapshot)) {
			(Some(a), Some(b)) => a.union(&b)?,
			(Some(a), None) | (None, Some(a)) => a,
			(None, None) => return None,
		};

		let tags = newer.resolve_tags(snapshot).chain(self.resolve_tags(snapshot));
		Some(Self::anchored(&region, tags))
	}

	/// Re-anchors a single entry at `snapshot`, dropping what no longer resolves.
	fn reanchor(self, snapshot: &Snapshot) -> Option<Self> {
		let region = self.region(snapshot)?;
		Some(Self::anchored(&region, self.resolve_tags(snapshot)))
	}

	fn anchored(region: &Span, tags: impl Iterator<Item = TagSpan<T>>) -> Self {
		let mut resolved: Vec<TagSpan<T>> = Vec::new();
		for tag in tags {
			if !resolved.iter().any(|r| r.span == tag.span) {
				resolved.push(tag);
			}
		}
		Self {
			region: TrackingSpan::new(region, SpanTrackingMode::EdgeInclusive),
			tags: resolved.iter().map(TrackedTag::new).collect(),
		}
	}
}

/// Background entry plus tracking entry for one tagger.
#[derive(Debug)]
pub(crate) struct TagCache<T> {
	background: Option<BackgroundEntry<T>>,
	tracking: Option<TrackingEntry<T>>,
}

impl<T> Default for TagCache<T> {
	fn default() -> Self {
		Self {
			background: None,
			tracking: None,
		}
	}
}

impl<T: Clone + PartialEq> TagCache<T> {
	pub(crate) fn is_empty(&self) -> bool {
		self.background.is_none() && self.tracking.is_none()
	}

	pub(crate) fn clear(&mut self) {
		self.background = None;
		self.tracking = None;
	}

	pub(crate) fn background(&self) -> Option<&BackgroundEntry<T>> {
		self.background.as_ref()
	}

	#[cfg(test)]
	pub(crate) fn tracking(&self) -> Option<&TrackingEntry<T>> {
		self.tracking.as_ref()
	}

	/// Turns a background entry for any other snapshot into tracking data.
	pub(crate) fn degrade_to(&mut self, snapshot: &Snapshot) {
		if self.background.as_ref().is_none_or(|bg| bg.snapshot == *snapshot) {
			return;
		}
		let Some(stale) = self.background.take() else { return };
		let Some(newer) = stale.degrade() else { return };

		self.tracking = match self.tracking.take() {
			Some(older) => older.merge(newer, snapshot),
			None => newer.reanchor(snapshot),
		};
		tracing::trace!(
			from = stale.snapshot.version(),
			to = snapshot.version(),
			tracked = self.tracking.as_ref().map_or(0, |t| t.tags.len()),
			"tagger.cache.degrade"
		);
	}

	/// Classifies what the cache can answer for `span`.
	pub(crate) fn lookup(&self, span: &Span) -> Lookup<T> {
		let snapshot = span.snapshot();
		let lines = SnapshotLineRange::for_span(span).range();
		let background = self.background.as_ref().filter(|bg| bg.snapshot == *snapshot);

		if let Some(bg) = background
			&& bg.covers(&lines)
		{
			return Lookup::Complete(filter_tags(bg.tags.iter().cloned(), span));
		}

		let mut found = false;
		let mut tags = Vec::new();
		if let Some(bg) = background
			&& bg.covered.intersects(&lines)
		{
			found = true;
			tags.extend(filter_tags(bg.tags.iter().cloned(), span));
		}

		if let Some(tracking) = &self.tracking
			&& tracking.region(snapshot).is_some_and(|region| region.intersects(span))
		{
			found = true;
			for tag in filter_tags(self.unshadowed_tracking(tracking, snapshot), span) {
				if !tags.contains(&tag) {
					tags.push(tag);
				}
			}
		}

		if found { Lookup::Partial(tags) } else { Lookup::None }
	}

	/// Tracking tags on lines the current background entry does not cover.
	fn unshadowed_tracking<'a>(
		&'a self,
		tracking: &'a TrackingEntry<T>,
		snapshot: &'a Snapshot,
	) -> impl Iterator<Item = TagSpan<T>> + 'a {
		let covered = self.background.as_ref().filter(|bg| bg.snapshot == *snapshot).map(|bg| &bg.covered);
		tracking.resolve_tags(snapshot).filter(move |t| {
			covered.is_none_or(|covered| !covered.contains(&SnapshotLineRange::for_span(&t.span).range()))
		})
	}

	/// Tags currently shown for `lines`: exact ones first, then projected ones.
	fn shown(&self, lines: &SnapshotLineRange) -> Vec<TagSpan<T>> {
		let snapshot = lines.snapshot();
		let extent = lines.extent();
		let mut shown: Vec<TagSpan<T>> = Vec::new();
		let exact = self
			.background
			.as_ref()
			.filter(|bg| bg.snapshot == *snapshot)
			.into_iter()
			.flat_map(|bg| bg.tags.iter().cloned());
		let projected = self
			.tracking
			.as_ref()
			.into_iter()
			.flat_map(|tracking| self.unshadowed_tracking(tracking, snapshot));
		for tag in exact.chain(projected) {
			if reaches_into(&extent, &tag.span) && !shown.contains(&tag) {
				shown.push(tag);
			}
		}
		shown
	}

	/// Compares `tags` computed for `lines` with what is shown for them now.
	///
	/// Returns the span to redraw when they differ: the lines' extent grown
	/// to cover each added or removed tag.
	pub(crate) fn changed_region(&self, lines: &SnapshotLineRange, tags: &[TagSpan<T>]) -> Option<Span> {
		let extent = lines.extent();
		let shown = self.shown(lines);
		let added = tags.iter().filter(|t| !shown.contains(t));
		// Tags reaching in from earlier lines survive the merge.
		let removed = shown.iter().filter(|t| starts_within(&extent, &t.span) && !tags.contains(t));

		let mut region: Option<Span> = None;
		for tag in added.chain(removed) {
			let grown = match region {
				Some(span) => span.union(&tag.span).unwrap_or(span),
				None => extent.union(&tag.span).unwrap_or_else(|| extent.clone()),
			};
			region = Some(grown);
		}
		region
	}

	/// Folds one computed chunk into the background entry for its snapshot.
	pub(crate) fn merge(&mut self, lines: &SnapshotLineRange, tags: Vec<TagSpan<T>>) {
		self.degrade_to(lines.snapshot());
		let entry = self
			.background
			.take()
			.unwrap_or_else(|| BackgroundEntry::new(lines.snapshot().clone()));
		self.background = Some(entry.merge(lines, tags));
	}

	/// Drops tracking data, returning its region on the background snapshot
	/// when part of that region is not yet covered by exact data.
	pub(crate) fn drop_tracking(&mut self) -> Option<Span> {
		let tracking = self.tracking.take()?;
		let Some(bg) = &self.background else {
			return None;
		};
		let region = tracking.region(&bg.snapshot)?;
		let lines = SnapshotLineRange::for_span(&region).range();
		(!bg.covers(&lines)).then_some(region)
	}
}

/// Keeps the tags touching `span`, boundaries included.
pub(crate) fn filter_tags<T>(tags: impl IntoIterator<Item = TagSpan<T>>, span: &Span) -> Vec<TagSpan<T>> {
	tags.into_iter().filter(|t| span.intersects(&t.span)).collect()
}

/// Whether `span` starts inside `extent` or crosses into it from before.
fn reaches_into(extent: &Span, span: &Span) -> bool {
	starts_within(extent, span) || (extent.same_snapshot(span) && span.start() < extent.start() && span.end() > extent.start())
}

/// A tag belongs to the lines its start falls on.
fn starts_within(extent: &Span, span: &Span) -> bool {
	if !extent.same_snapshot(span) {
		return false;
	}
	let at_document_end = extent.end() == extent.snapshot().len_chars();
	extent.start() <= span.start() && (span.start() < extent.end() || (at_document_end && span.start() == extent.end()))
}
