/// Where a worker task runs, recorded on every spawn for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Async coordination such as debounce timers and result forwarding.
	Background,
	/// Synchronous computation that must stay off the async executor.
	CpuBlocking,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Background => "background",
			Self::CpuBlocking => "cpu_blocking",
		}
	}

	/// Whether the class belongs on the blocking pool.
	pub const fn is_blocking(self) -> bool {
		matches!(self, Self::CpuBlocking)
	}
}
