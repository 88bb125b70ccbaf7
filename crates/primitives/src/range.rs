//! Coordinate aliases shared by spans, line ranges and changesets.
//!
//! All offsets count `char`s of the snapshot text, never bytes.

/// Offset of a character in a snapshot.
pub type CharIdx = usize;

/// Number of characters; kept apart from [`CharIdx`] in signatures.
pub type CharLen = usize;

/// Zero-based line number within a snapshot.
pub type LineIdx = usize;
