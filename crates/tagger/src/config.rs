//! Tagger configuration and the context object taggers are built from.

use std::time::Duration;

use serde::Deserialize;
use xeno_worker::WorkerRuntime;

use crate::error::ConfigError;

/// Lines processed per background computation step.
pub const DEFAULT_CHUNK_LINES: usize = 500;

/// Conventional debounce for sources that react to caret movement.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// Tunables for one tagger instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaggerCfg {
	/// Upper bound on lines handed to the source in one call.
	pub chunk_lines: usize,
	/// Replaces the source's own debounce when set (milliseconds).
	#[serde(rename = "delay_ms")]
	pub delay_override: Option<u64>,
	/// Push the source's visible range after the requested range so it is
	/// computed first.
	pub prioritize_viewport: bool,
}

impl Default for TaggerCfg {
	fn default() -> Self {
		Self {
			chunk_lines: DEFAULT_CHUNK_LINES,
			delay_override: None,
			prioritize_viewport: true,
		}
	}
}

impl TaggerCfg {
	/// Checks value ranges, returning the config unchanged when valid.
	pub fn validate(self) -> Result<Self, ConfigError> {
		if self.chunk_lines == 0 {
			return Err(ConfigError::ZeroChunkLines);
		}
		Ok(self)
	}

	/// Returns the configured debounce override.
	pub fn delay(&self) -> Option<Duration> {
		self.delay_override.map(Duration::from_millis)
	}

	/// Sets the debounce override.
	pub fn with_delay(mut self, delay: Option<Duration>) -> Self {
		self.delay_override = delay.map(|d| d.as_millis().try_into().unwrap_or(u64::MAX));
		self
	}
}

/// Everything a tagger needs from its host, passed explicitly.
#[derive(Debug, Clone)]
pub struct TaggerContext {
	pub runtime: WorkerRuntime,
	pub cfg: TaggerCfg,
}

impl TaggerContext {
	pub fn new(runtime: WorkerRuntime, cfg: TaggerCfg) -> Self {
		Self { runtime, cfg }
	}

	/// Uses the caller's tokio runtime and default settings.
	///
	/// # Panics
	///
	/// Panics when called outside of a tokio runtime.
	pub fn current() -> Self {
		Self::new(WorkerRuntime::current(), TaggerCfg::default())
	}
}
