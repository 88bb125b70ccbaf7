use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::TaskClass;

/// Runtime entrypoint for worker task execution.
///
/// Holds the tokio handle the host hands in; no process-wide runtime is
/// created behind the caller's back.
#[derive(Debug, Clone)]
pub struct WorkerRuntime {
	handle: Handle,
}

impl WorkerRuntime {
	/// Wraps an explicit runtime handle.
	pub fn new(handle: Handle) -> Self {
		Self { handle }
	}

	/// Uses the runtime the caller is currently running on.
	///
	/// # Panics
	///
	/// Panics when called outside of a tokio runtime.
	pub fn current() -> Self {
		Self::new(Handle::current())
	}

	/// Like [`Self::current`], returning `None` outside of a runtime.
	pub fn try_current() -> Option<Self> {
		Handle::try_current().ok().map(Self::new)
	}

	/// Returns the wrapped runtime handle.
	pub fn handle(&self) -> &Handle {
		&self.handle
	}

	/// Spawns an async task.
	pub fn spawn<F>(&self, class: TaskClass, fut: F) -> JoinHandle<F::Output>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		debug_assert!(!class.is_blocking(), "{} work spawned as async", class.as_str());
		tracing::trace!(worker_class = class.as_str(), "worker.spawn");
		self.handle.spawn(fut)
	}

	/// Spawns blocking work on the runtime's blocking pool.
	pub fn spawn_blocking<F, R>(&self, class: TaskClass, f: F) -> JoinHandle<R>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		debug_assert!(class.is_blocking(), "{} work spawned on the blocking pool", class.as_str());
		tracing::trace!(worker_class = class.as_str(), "worker.spawn_blocking");
		self.handle.spawn_blocking(f)
	}
}
