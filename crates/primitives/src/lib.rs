//! Core text types for the tagging runtime: versioned snapshots, spans,
//! line ranges and cross-version span tracking.

/// Retain/delete/insert edit descriptions and position mapping.
pub mod changeset;
/// Line ranges, snapshot-bound line ranges and normalized line range sets.
pub mod line_range;
/// Character and line coordinate types.
pub mod range;
/// Versioned text buffers and immutable snapshots.
pub mod snapshot;
/// Character spans bound to a snapshot.
pub mod span;
/// Spans that follow edits across snapshot versions.
pub mod tracking;

pub use changeset::{Bias, ChangeSet};
pub use line_range::{LineRange, LineRangeSet, SnapshotLineRange};
pub use range::{CharIdx, CharLen, LineIdx};
pub use ropey::{Rope, RopeSlice};
pub use snapshot::{BufferId, Snapshot, TextBuffer};
pub use span::Span;
pub use tracking::{SpanTrackingMode, TrackingSpan};
