//! Error and outcome types for background tag computation.

use std::fmt;

use thiserror::Error;
use xeno_worker::Cancelled;

/// Failure of one chunk of background computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
	/// The job's cancel signal was raised; ends the job as
	/// [`JobOutcome::Cancelled`].
	#[error("computation cancelled")]
	Cancelled,

	/// The chunk could not be tagged. The worker logs it and moves on to
	/// the next chunk.
	#[error("computation failed: {0}")]
	Failed(String),
}

impl ComputeError {
	/// Wraps any displayable error as [`ComputeError::Failed`].
	pub fn failed(err: impl fmt::Display) -> Self {
		Self::Failed(err.to_string())
	}
}

impl From<Cancelled> for ComputeError {
	fn from(_: Cancelled) -> Self {
		Self::Cancelled
	}
}

/// Terminal state of a background job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
	/// The queue was drained.
	Finished,
	/// The job stopped at a cancellation check.
	Cancelled,
	/// The job died outside the per-chunk boundary (for example a panic).
	/// Progress posted before the failure is kept.
	Error(String),
}

impl JobOutcome {
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Finished => "finished",
			Self::Cancelled => "cancelled",
			Self::Error(_) => "error",
		}
	}
}

/// Rejected tagger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
	/// `chunk_lines` must be at least one line.
	#[error("chunk_lines must be greater than zero")]
	ZeroChunkLines,
}
