//! The tagger facade: request routing, job start and supersession, progress
//! merging and change notifications.
//!
//! A [`Tagger`] lives on one owning context (a UI loop) and is never shared
//! across threads. Background jobs talk back through a channel that the
//! owner drains with [`Tagger::pump`], the same way the editor loop polls
//! finished syntax tasks.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use xeno_primitives::{Snapshot, SnapshotLineRange, Span, SpanTrackingMode, TrackingSpan};
use xeno_worker::{GenerationClock, WorkerRuntime};

use crate::cache::{Lookup, TagCache, filter_tags};
use crate::config::{TaggerCfg, TaggerContext};
use crate::error::JobOutcome;
use crate::handoff::HandoffQueue;
use crate::job::{JobId, JobMsg, JobSpec, PendingJob};
use crate::source::{AsyncTaggerSource, SourceEvent, SourceNotifier, Subscription, TagSpan};

/// Identifies a registered change handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&Span)>;

/// Counters describing what a tagger has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaggerStats {
	/// Background jobs started.
	pub jobs_started: u64,
	/// Jobs cancelled because a request arrived for another snapshot.
	pub jobs_superseded: u64,
	/// Jobs that ended with [`JobOutcome::Error`].
	pub jobs_failed: u64,
	/// Progress or completion messages from jobs that were no longer active.
	pub stale_messages: u64,
	/// Change notifications raised.
	pub notifications: u64,
}

/// Asynchronous incremental tagger over one computation source.
pub struct Tagger<S: AsyncTaggerSource> {
	source: Arc<S>,
	runtime: WorkerRuntime,
	cfg: TaggerCfg,
	clock: GenerationClock,
	cache: TagCache<S::Tag>,
	job: Option<PendingJob>,
	/// Union of the spans requested so far.
	requested: Option<Span>,
	handlers: Vec<(HandlerId, Handler)>,
	next_handler: u64,
	job_tx: mpsc::UnboundedSender<JobMsg<S::Tag>>,
	job_rx: mpsc::UnboundedReceiver<JobMsg<S::Tag>>,
	events: mpsc::UnboundedReceiver<SourceEvent>,
	subscription: Option<Subscription>,
	disposed: bool,
	stats: TaggerStats,
}

impl<S: AsyncTaggerSource> Tagger<S> {
	/// Creates a tagger and subscribes to the source's events.
	pub fn new(ctx: &TaggerContext, source: Arc<S>) -> Self {
		let (job_tx, job_rx) = mpsc::unbounded_channel();
		let (event_tx, events) = mpsc::unbounded_channel();
		let subscription = source.subscribe(SourceNotifier::new(event_tx));

		Self {
			source,
			runtime: ctx.runtime.clone(),
			cfg: ctx.cfg.clone(),
			clock: GenerationClock::new(),
			cache: TagCache::default(),
			job: None,
			requested: None,
			handlers: Vec::new(),
			next_handler: 0,
			job_tx,
			job_rx,
			events,
			subscription: Some(subscription),
			disposed: false,
			stats: TaggerStats::default(),
		}
	}

	pub fn source(&self) -> &Arc<S> {
		&self.source
	}

	pub fn cfg(&self) -> &TaggerCfg {
		&self.cfg
	}

	pub fn stats(&self) -> TaggerStats {
		self.stats
	}

	/// Returns the union of every span requested so far.
	pub fn requested_span(&self) -> Option<&Span> {
		self.requested.as_ref()
	}

	pub fn has_pending_job(&self) -> bool {
		self.job.is_some()
	}

	/// Returns the snapshot version the running job computes, if any.
	pub fn pending_snapshot_version(&self) -> Option<u64> {
		self.job.as_ref().map(|job| job.snapshot().version())
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed
	}

	/// Registers `handler` to run for every change notification.
	pub fn on_tags_changed(&mut self, handler: impl FnMut(&Span) + 'static) -> HandlerId {
		let id = HandlerId(self.next_handler);
		self.next_handler += 1;
		self.handlers.push((id, Box::new(handler)));
		id
	}

	/// Unregisters a handler; returns false when it was not registered.
	pub fn remove_handler(&mut self, id: HandlerId) -> bool {
		let before = self.handlers.len();
		self.handlers.retain(|(h, _)| *h != id);
		self.handlers.len() != before
	}

	/// Returns the tags known for `span` right now, starting background work
	/// for whatever is missing.
	///
	/// Never blocks and never fails: missing data shows up later through a
	/// change notification.
	pub fn get_tags(&mut self, span: &Span) -> Vec<TagSpan<S::Tag>> {
		if self.disposed {
			return Vec::new();
		}
		self.remember(span);

		if let Some(tags) = self.source.prompt(span) {
			return filter_tags(tags, span);
		}

		self.cache.degrade_to(span.snapshot());
		match self.cache.lookup(span) {
			Lookup::Complete(tags) => tags,
			Lookup::Partial(tags) => {
				self.request_in_background(span);
				tags
			}
			Lookup::None => {
				self.request_in_background(span);
				Vec::new()
			}
		}
	}

	/// Like [`Self::get_tags`] for several spans at once.
	///
	/// The spans on the first span's snapshot are requested as one
	/// overarching span; the answer keeps only tags touching one of them.
	pub fn get_tags_in(&mut self, spans: &[Span]) -> Vec<TagSpan<S::Tag>> {
		let Some(first) = spans.first() else {
			return Vec::new();
		};
		let same: Vec<&Span> = spans.iter().filter(|s| s.same_snapshot(first)).collect();
		let overarching = same.iter().skip(1).fold(first.clone(), |acc, s| acc.union(s).unwrap_or(acc));

		let mut tags = self.get_tags(&overarching);
		tags.retain(|t| same.iter().any(|s| s.intersects(&t.span)));
		tags
	}

	/// Handles every queued job and source message; returns how many.
	pub fn pump(&mut self) -> usize {
		let mut handled = 0;

		while let Ok(event) = self.events.try_recv() {
			handled += 1;
			if self.disposed {
				continue;
			}
			match event {
				SourceEvent::Changed => self.on_source_changed(),
				SourceEvent::LayoutChanged => self.on_viewport_changed(),
			}
		}

		while let Ok(msg) = self.job_rx.try_recv() {
			handled += 1;
			if self.disposed {
				continue;
			}
			match msg {
				JobMsg::Progress { job, lines, tags } => self.on_progress(job, lines, tags),
				JobMsg::Completed { job, outcome } => self.on_completed(job, outcome),
			}
		}

		handled
	}

	/// Cancels the running job and stops listening to the source.
	///
	/// Idempotent; also run on drop.
	pub fn dispose(&mut self) {
		if self.disposed {
			return;
		}
		self.disposed = true;
		self.subscription = None;
		if let Some(job) = self.job.take() {
			job.cancel();
			tracing::debug!(job = job.id(), "tagger.job.cancelled_on_dispose");
		}
		self.cache.clear();
		self.requested = None;
	}

	#[cfg(test)]
	pub(crate) fn cache(&self) -> &TagCache<S::Tag> {
		&self.cache
	}

	/// Whether the running job's worker is done, its messages possibly unread.
	#[cfg(test)]
	pub(crate) fn job_finished(&self) -> bool {
		self.job.as_ref().is_some_and(PendingJob::is_finished)
	}

	fn remember(&mut self, span: &Span) {
		let merged = match &self.requested {
			Some(prev) if prev.same_snapshot(span) => prev.union(span),
			Some(prev) => TrackingSpan::new(prev, SpanTrackingMode::EdgeInclusive)
				.resolve(span.snapshot())
				.and_then(|prev| prev.union(span)),
			None => None,
		};
		self.requested = Some(merged.unwrap_or_else(|| span.clone()));
	}

	fn is_active(&self, job: JobId) -> bool {
		self.job.as_ref().is_some_and(|j| j.id() == job)
	}

	fn request_in_background(&mut self, span: &Span) {
		let lines = SnapshotLineRange::for_span(span);
		let snapshot = lines.snapshot().clone();

		if let Some(job) = &self.job {
			if *job.snapshot() == snapshot {
				tracing::trace!(job = job.id(), lines = ?lines, "tagger.job.push");
				job.push(lines);
				return;
			}
			tracing::debug!(
				job = job.id(),
				from = job.snapshot().version(),
				to = snapshot.version(),
				"tagger.job.superseded"
			);
			job.cancel();
			self.job = None;
			self.stats.jobs_superseded += 1;
		}

		self.start_job(snapshot, lines);
	}

	fn start_job(&mut self, snapshot: Snapshot, lines: SnapshotLineRange) {
		let Some(data) = self.source.data_for_snapshot(&snapshot) else {
			tracing::trace!(version = snapshot.version(), "tagger.job.no_data");
			return;
		};

		let queue = Arc::new(HandoffQueue::new());
		queue.push(lines.clone());
		if self.cfg.prioritize_viewport
			&& let Some(visible) = self.source.visible_range()
			&& *visible.snapshot() == snapshot
		{
			queue.push(visible);
		}

		let id = self.clock.next();
		let delay = self.cfg.delay().or_else(|| self.source.delay());
		let spec = JobSpec {
			id,
			source: Arc::clone(&self.source),
			data,
			snapshot: snapshot.clone(),
			chunk_lines: self.cfg.chunk_lines,
			delay,
			tx: self.job_tx.clone(),
		};
		self.job = Some(PendingJob::spawn(&self.runtime, spec, queue));
		self.stats.jobs_started += 1;
		tracing::debug!(job = id, version = snapshot.version(), lines = ?lines, ?delay, "tagger.job.start");
	}

	fn on_progress(&mut self, job: JobId, lines: SnapshotLineRange, tags: Vec<TagSpan<S::Tag>>) {
		if !self.is_active(job) {
			self.stats.stale_messages += 1;
			tracing::debug!(job, lines = ?lines, "tagger.job.stale_progress");
			return;
		}

		self.cache.degrade_to(lines.snapshot());
		let changed = self.cache.changed_region(&lines, &tags);
		self.cache.merge(&lines, tags);
		if let Some(region) = changed {
			self.raise_tags_changed(&region);
		}
	}

	fn on_completed(&mut self, job: JobId, outcome: JobOutcome) {
		if !self.is_active(job) {
			self.stats.stale_messages += 1;
			tracing::debug!(job, outcome = outcome.as_str(), "tagger.job.stale_completion");
			return;
		}
		let Some(finished) = self.job.take() else { return };

		match &outcome {
			JobOutcome::Error(reason) => {
				self.stats.jobs_failed += 1;
				tracing::warn!(job, %reason, "tagger.job.failed");
			}
			_ => tracing::debug!(job, outcome = outcome.as_str(), "tagger.job.complete"),
		}

		if let Some(region) = self.cache.drop_tracking() {
			self.raise_tags_changed(&region);
		}

		if outcome == JobOutcome::Finished {
			// Pushed after the worker saw an empty queue.
			for lines in finished.drain_queue() {
				let covered = self
					.cache
					.background()
					.is_some_and(|bg| bg.snapshot() == lines.snapshot() && bg.covered().contains(&lines.range()));
				if covered {
					continue;
				}
				tracing::trace!(job, lines = ?lines, "tagger.job.reissue");
				self.request_in_background(&lines.extent());
			}
		}
	}

	fn on_source_changed(&mut self) {
		tracing::debug!(job = ?self.job.as_ref().map(PendingJob::id), "tagger.source_changed");
		self.cache.clear();
		if let Some(job) = self.job.take() {
			job.cancel();
		}
		if let Some(requested) = self.requested.clone() {
			self.raise_tags_changed(&requested);
		}
	}

	fn on_viewport_changed(&mut self) {
		if !self.cfg.prioritize_viewport {
			return;
		}
		let Some(job) = &self.job else { return };
		if let Some(visible) = self.source.visible_range()
			&& visible.snapshot() == job.snapshot()
		{
			tracing::trace!(job = job.id(), lines = ?visible, "tagger.job.push_visible");
			job.push(visible);
		}
	}

	fn raise_tags_changed(&mut self, span: &Span) {
		self.stats.notifications += 1;
		tracing::trace!(?span, handlers = self.handlers.len(), "tagger.tags_changed");
		for (_, handler) in &mut self.handlers {
			handler(span);
		}
	}
}

impl<S: AsyncTaggerSource> Drop for Tagger<S> {
	fn drop(&mut self) {
		self.dispose();
	}
}

impl<S: AsyncTaggerSource> fmt::Debug for Tagger<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Tagger")
			.field("job", &self.job)
			.field("requested", &self.requested)
			.field("handlers", &self.handlers.len())
			.field("disposed", &self.disposed)
			.field("stats", &self.stats)
			.finish_non_exhaustive()
	}
}
