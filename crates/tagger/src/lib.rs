//! Asynchronous incremental tagging.
//!
//! A [`Tagger`] answers "which tags touch this span?" for a document that
//! changes through immutable [`xeno_primitives::Snapshot`]s. Answers come
//! from a per-snapshot cache when possible. Missing lines are computed by a
//! single background job in bounded chunks, newest request first. Tags from
//! an older snapshot are remapped onto the new one until the job catches
//! up, and consumers only hear about changes when the fresh result differs
//! from what they were already shown.
//!
//! The tagger is owned by one context (typically a UI loop) which must call
//! [`Tagger::pump`] regularly to fold background results in.

mod cache;
/// Tagger settings and the explicit construction context.
pub mod config;
/// Chunk errors, job outcomes and configuration errors.
pub mod error;
/// Lock-free handoff of line ranges to a background job.
pub mod handoff;
mod job;
/// Reference-counted taggers shared per key.
pub mod shared;
/// The computation source trait and its events.
pub mod source;
/// Persistent range stack.
pub mod stack;
mod tagger;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_CHUNK_LINES, DEFAULT_DELAY, TaggerCfg, TaggerContext};
pub use error::{ComputeError, ConfigError, JobOutcome};
pub use handoff::HandoffQueue;
pub use shared::{SharedTagger, SharedTaggers};
pub use source::{AsyncTaggerSource, SourceEvent, SourceNotifier, Subscription, TagSpan};
pub use stack::RangeStack;
pub use tagger::{HandlerId, Tagger, TaggerStats};
