use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Hands out increasing ids, first id is 1. Clones share the counter.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	next: Arc<AtomicU64>,
}

impl GenerationClock {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// Returned by [`CancelSignal::check`] once cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Cooperative cancellation signal shared between an owner and its worker.
///
/// Workers poll [`Self::check`] at safe points and unwind with `?`; nothing
/// is ever interrupted forcibly.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
	token: CancellationToken,
}

impl CancelSignal {
	pub fn new() -> Self {
		Self::default()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Returns `Err(Cancelled)` once cancellation is requested.
	pub fn check(&self) -> Result<(), Cancelled> {
		if self.is_cancelled() { Err(Cancelled) } else { Ok(()) }
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.token.cancelled().await;
	}
}
