//! The computation source a tagger drives, and the events it raises.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use xeno_primitives::{Snapshot, SnapshotLineRange, Span};
use xeno_worker::CancelSignal;

use crate::error::ComputeError;

/// A tag payload attached to a span of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpan<T> {
	pub span: Span,
	pub tag: T,
}

impl<T> TagSpan<T> {
	pub fn new(span: Span, tag: T) -> Self {
		Self { span, tag }
	}
}

/// Computes tags for a document, usually expensively.
///
/// Everything except [`Self::tags_in_background`] is called on the owning
/// context. `tags_in_background` runs on the blocking pool, once per chunk,
/// with shrinking or disjoint line ranges of the same snapshot; it should
/// poll `cancel` (`cancel.check()?`) inside long loops.
pub trait AsyncTaggerSource: Send + Sync + 'static {
	/// Per-job context built once from the job's snapshot.
	type Data: Send + 'static;
	type Tag: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

	/// Debounce applied before a job starts computing.
	fn delay(&self) -> Option<Duration> {
		None
	}

	/// Synchronous fast path; returning `Some` bypasses the cache entirely.
	fn prompt(&self, _span: &Span) -> Option<Vec<TagSpan<Self::Tag>>> {
		None
	}

	/// Builds the job context for `snapshot`; `None` means nothing to compute.
	fn data_for_snapshot(&self, snapshot: &Snapshot) -> Option<Self::Data>;

	/// Computes the tags on `lines`.
	fn tags_in_background(
		&self,
		data: &Self::Data,
		lines: &SnapshotLineRange,
		cancel: &CancelSignal,
	) -> Result<Vec<TagSpan<Self::Tag>>, ComputeError>;

	/// Lines currently on screen, if the source is tied to a view.
	fn visible_range(&self) -> Option<SnapshotLineRange> {
		None
	}

	/// Registers for change and layout events. Dropping the returned guard
	/// must stop further notifications.
	fn subscribe(&self, _notifier: SourceNotifier) -> Subscription {
		Subscription::none()
	}
}

/// Event posted by a source to its tagger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
	/// Every previously computed tag is invalid.
	Changed,
	/// The visible range moved.
	LayoutChanged,
}

/// Handle a source uses to notify its tagger from any thread.
///
/// Events are queued and handled by the tagger's next `pump`.
#[derive(Debug, Clone)]
pub struct SourceNotifier {
	tx: mpsc::UnboundedSender<SourceEvent>,
}

impl SourceNotifier {
	pub(crate) fn new(tx: mpsc::UnboundedSender<SourceEvent>) -> Self {
		Self { tx }
	}

	/// Reports that all computed tags must be discarded.
	pub fn changed(&self) {
		self.post(SourceEvent::Changed);
	}

	/// Reports that the visible range changed.
	pub fn layout_changed(&self) {
		self.post(SourceEvent::LayoutChanged);
	}

	fn post(&self, event: SourceEvent) {
		if self.tx.send(event).is_err() {
			tracing::trace!(?event, "tagger.source_event.dropped");
		}
	}
}

/// Guard returned by [`AsyncTaggerSource::subscribe`].
///
/// Runs the unsubscribe closure exactly once when dropped.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
	unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
	pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
		Self {
			unsubscribe: Some(Box::new(unsubscribe)),
		}
	}

	/// A subscription with nothing to undo.
	pub fn none() -> Self {
		Self { unsubscribe: None }
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(unsubscribe) = self.unsubscribe.take() {
			unsubscribe();
		}
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription").field("active", &self.unsubscribe.is_some()).finish()
	}
}
