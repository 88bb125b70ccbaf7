//! Background job supervision: one in-flight computation per tagger.
//!
//! A job owns a [`HandoffQueue`] of line ranges. The owning context pushes
//! requests onto it; the worker, running on the blocking pool, pops the
//! newest range, splits it into chunks and reports every chunk back through
//! an unbounded channel. The owner picks those messages up in
//! [`crate::Tagger::pump`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use xeno_primitives::{LineRange, LineRangeSet, Snapshot, SnapshotLineRange};
use xeno_worker::{CancelSignal, TaskClass, WorkerRuntime};

use crate::error::{ComputeError, JobOutcome};
use crate::handoff::HandoffQueue;
use crate::source::{AsyncTaggerSource, TagSpan};

/// Generation id of a job, unique per tagger.
pub(crate) type JobId = u64;

/// Message posted from a job to its owner.
#[derive(Debug)]
pub(crate) enum JobMsg<T> {
	Progress {
		job: JobId,
		lines: SnapshotLineRange,
		tags: Vec<TagSpan<T>>,
	},
	Completed {
		job: JobId,
		outcome: JobOutcome,
	},
}

/// Everything a job needs to start.
pub(crate) struct JobSpec<S: AsyncTaggerSource> {
	pub(crate) id: JobId,
	pub(crate) source: Arc<S>,
	pub(crate) data: S::Data,
	pub(crate) snapshot: Snapshot,
	pub(crate) chunk_lines: usize,
	pub(crate) delay: Option<Duration>,
	pub(crate) tx: mpsc::UnboundedSender<JobMsg<S::Tag>>,
}

/// Owner-side handle of the running job.
pub(crate) struct PendingJob {
	id: JobId,
	snapshot: Snapshot,
	cancel: CancelSignal,
	queue: Arc<HandoffQueue<SnapshotLineRange>>,
	handle: JoinHandle<()>,
}

impl PendingJob {
	/// Starts a job working through `queue`.
	pub(crate) fn spawn<S: AsyncTaggerSource>(
		runtime: &WorkerRuntime,
		spec: JobSpec<S>,
		queue: Arc<HandoffQueue<SnapshotLineRange>>,
	) -> Self {
		let cancel = CancelSignal::new();
		let id = spec.id;
		let snapshot = spec.snapshot.clone();
		let tx = spec.tx.clone();
		let delay = spec.delay;

		let worker = Worker {
			id,
			source: spec.source,
			data: spec.data,
			chunk_lines: spec.chunk_lines.max(1),
			queue: Arc::clone(&queue),
			cancel: cancel.clone(),
			tx: spec.tx,
		};

		let blocking = runtime.clone();
		let job_cancel = cancel.clone();
		let handle = runtime.spawn(TaskClass::Background, async move {
			if let Some(delay) = delay {
				tokio::select! {
					_ = job_cancel.cancelled() => {
						tracing::trace!(job = id, "tagger.job.cancelled_during_delay");
						let _ = tx.send(JobMsg::Completed { job: id, outcome: JobOutcome::Cancelled });
						return;
					}
					_ = tokio::time::sleep(delay) => {}
				}
			}

			let outcome = match blocking.spawn_blocking(TaskClass::CpuBlocking, move || worker.run()).await {
				Ok(outcome) => outcome,
				Err(err) => JobOutcome::Error(err.to_string()),
			};
			let _ = tx.send(JobMsg::Completed { job: id, outcome });
		});

		Self {
			id,
			snapshot,
			cancel,
			queue,
			handle,
		}
	}

	pub(crate) fn id(&self) -> JobId {
		self.id
	}

	pub(crate) fn snapshot(&self) -> &Snapshot {
		&self.snapshot
	}

	/// Queues `lines`; it is processed before anything queued earlier.
	pub(crate) fn push(&self, lines: SnapshotLineRange) {
		self.queue.push(lines);
	}

	/// Requests cooperative cancellation. The worker stops at its next check.
	pub(crate) fn cancel(&self) {
		self.cancel.cancel();
	}

	#[cfg(test)]
	pub(crate) fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}

	/// Takes every range the worker never got to.
	pub(crate) fn drain_queue(&self) -> Vec<SnapshotLineRange> {
		self.queue.drain()
	}
}

impl fmt::Debug for PendingJob {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PendingJob")
			.field("id", &self.id)
			.field("version", &self.snapshot.version())
			.field("queued", &self.queue.len())
			.field("cancelled", &self.cancel.is_cancelled())
			.field("finished", &self.handle.is_finished())
			.finish()
	}
}

struct Worker<S: AsyncTaggerSource> {
	id: JobId,
	source: Arc<S>,
	data: S::Data,
	chunk_lines: usize,
	queue: Arc<HandoffQueue<SnapshotLineRange>>,
	cancel: CancelSignal,
	tx: mpsc::UnboundedSender<JobMsg<S::Tag>>,
}

impl<S: AsyncTaggerSource> Worker<S> {
	fn run(self) -> JobOutcome {
		let mut visited = LineRangeSet::new();
		let mut deferred: Vec<SnapshotLineRange> = Vec::new();

		loop {
			if self.cancel.is_cancelled() {
				return JobOutcome::Cancelled;
			}

			let version = self.queue.version();
			let Some(lines) = self.queue.pop().or_else(|| deferred.pop()) else {
				return JobOutcome::Finished;
			};
			if visited.contains(&lines.range()) {
				continue;
			}

			for chunk in lines.chunks(self.chunk_lines) {
				if self.cancel.is_cancelled() {
					return JobOutcome::Cancelled;
				}
				if self.queue.version() != version {
					// Newer requests go first; the rest of this range waits.
					let rest = LineRange::from_bounds(chunk.start_line(), lines.last_line());
					deferred.push(SnapshotLineRange::new(lines.snapshot().clone(), rest));
					break;
				}
				if visited.contains(&chunk.range()) {
					continue;
				}
				visited.add(chunk.range());

				match self.source.tags_in_background(&self.data, &chunk, &self.cancel) {
					Ok(tags) => {
						tracing::trace!(job = self.id, lines = ?chunk, tags = tags.len(), "tagger.job.chunk");
						let msg = JobMsg::Progress {
							job: self.id,
							lines: chunk,
							tags,
						};
						if self.tx.send(msg).is_err() {
							return JobOutcome::Cancelled;
						}
					}
					Err(ComputeError::Cancelled) => return JobOutcome::Cancelled,
					Err(ComputeError::Failed(reason)) => {
						tracing::warn!(job = self.id, lines = ?chunk, %reason, "tagger.job.chunk_failed");
					}
				}
			}
		}
	}
}
