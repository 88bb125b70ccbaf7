//! Lock-free work handoff between the owning context and a background job.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::stack::RangeStack;

/// Shared cell holding a [`RangeStack`] plus a change counter.
///
/// Producers and the consumer swap whole stacks with compare-and-swap retry
/// loops. The version only tells a reader that *something* was pushed since
/// it last looked; concurrent pushes may share a bump.
pub struct HandoffQueue<T> {
	stack: ArcSwap<RangeStack<T>>,
	version: AtomicU64,
}

impl<T: Clone> HandoffQueue<T> {
	pub fn new() -> Self {
		Self {
			stack: ArcSwap::from_pointee(RangeStack::new()),
			version: AtomicU64::new(0),
		}
	}

	/// Pushes `value` on top; it is the next value [`Self::pop`] returns.
	pub fn push(&self, value: T) {
		self.stack.rcu(|current| current.push(value.clone()));
		let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
		tracing::trace!(version, "tagger.handoff.push");
	}

	/// Pops the most recently pushed value without blocking.
	pub fn pop(&self) -> Option<T> {
		let previous = self.stack.rcu(|current| current.tail());
		previous.peek().cloned()
	}

	/// Returns the push counter.
	pub fn version(&self) -> u64 {
		self.version.load(Ordering::Acquire)
	}

	pub fn is_empty(&self) -> bool {
		self.stack.load().is_empty()
	}

	pub fn len(&self) -> usize {
		self.stack.load().len()
	}

	/// Returns the current stack without removing anything.
	pub fn snapshot(&self) -> Arc<RangeStack<T>> {
		self.stack.load_full()
	}

	/// Removes every queued value, most recent first.
	pub fn drain(&self) -> Vec<T> {
		let taken = self.stack.swap(Arc::new(RangeStack::new()));
		taken.iter().cloned().collect()
	}
}

impl<T: Clone> Default for HandoffQueue<T> {
	fn default() -> Self {
		Self::new()
	}
}
