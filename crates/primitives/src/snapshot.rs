//! Versioned text buffers and their immutable snapshots.
//!
//! A [`TextBuffer`] owns the current [`Snapshot`]. Every edit produces a new
//! snapshot with the next version number and records, on the previous
//! version, the [`ChangeSet`] leading to it. Versions therefore form a
//! forward-only chain: an old snapshot can reach every later version (which
//! is what [`crate::TrackingSpan`] walks), but nothing points back, so old
//! versions are freed as soon as nobody holds them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use ropey::Rope;

use crate::changeset::ChangeSet;
use crate::range::{CharIdx, CharLen, LineIdx};

/// Process-unique identifier of a [`TextBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(u64);

impl BufferId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// One link of a buffer's version chain.
pub(crate) struct VersionNode {
	pub(crate) buffer: BufferId,
	pub(crate) number: u64,
	pub(crate) len: CharLen,
	/// Edit leading to the successor version, set exactly once.
	pub(crate) next: OnceLock<(ChangeSet, Arc<VersionNode>)>,
}

impl VersionNode {
	fn root(buffer: BufferId, len: CharLen) -> Arc<Self> {
		Arc::new(Self {
			buffer,
			number: 0,
			len,
			next: OnceLock::new(),
		})
	}

	/// Iterates the changesets from this version up to (excluding) `target`.
	///
	/// Returns `None` when `target` is not reachable by walking forward.
	pub(crate) fn changes_until(self: &Arc<Self>, target: &VersionNode) -> Option<Vec<&ChangeSet>> {
		if self.buffer != target.buffer || self.number > target.number {
			return None;
		}

		let mut out = Vec::with_capacity((target.number - self.number) as usize);
		let mut node: &VersionNode = self;
		while node.number < target.number {
			let (changes, next) = node.next.get()?;
			out.push(changes);
			node = next.as_ref();
		}
		Some(out)
	}
}

impl Drop for VersionNode {
	// Unlinks iteratively; a long unreferenced chain would otherwise recurse once per version.
	fn drop(&mut self) {
		let mut next = self.next.take();
		while let Some((_, node)) = next {
			match Arc::try_unwrap(node) {
				Ok(mut inner) => next = inner.next.take(),
				Err(_) => break,
			}
		}
	}
}

/// Immutable view of a buffer at one version.
///
/// Cloning is cheap: the text is a shared rope and the version node is
/// reference counted. Two snapshots compare equal when they belong to the
/// same buffer and carry the same version number.
#[derive(Clone)]
pub struct Snapshot {
	node: Arc<VersionNode>,
	text: Rope,
}

impl Snapshot {
	/// Returns the owning buffer's identifier.
	pub fn buffer_id(&self) -> BufferId {
		self.node.buffer
	}

	/// Returns the version number; the initial snapshot is version 0.
	pub fn version(&self) -> u64 {
		self.node.number
	}

	/// Returns the snapshot text.
	pub fn text(&self) -> &Rope {
		&self.text
	}

	/// Returns the length in characters.
	pub fn len_chars(&self) -> CharLen {
		self.node.len
	}

	/// Returns the number of lines, including the empty line after a trailing newline.
	pub fn line_count(&self) -> usize {
		self.text.len_lines()
	}

	/// Returns the line containing `pos`, clamping positions past the end.
	pub fn char_to_line(&self, pos: CharIdx) -> LineIdx {
		self.text.char_to_line(pos.min(self.len_chars()))
	}

	/// Returns the first character of `line`.
	pub fn line_start(&self, line: LineIdx) -> CharIdx {
		self.text.line_to_char(line.min(self.line_count()))
	}

	/// Returns the end of `line`, excluding its line break.
	pub fn line_end(&self, line: LineIdx) -> CharIdx {
		let end = self.line_end_including_break(line);
		let start = self.line_start(line);
		let slice = self.text.slice(start..end);
		end - line_break_len(slice)
	}

	/// Returns the end of `line`, including its line break.
	pub fn line_end_including_break(&self, line: LineIdx) -> CharIdx {
		if line + 1 >= self.line_count() {
			self.len_chars()
		} else {
			self.text.line_to_char(line + 1)
		}
	}

	/// Returns true when `later` is this snapshot or one of its successors.
	pub fn precedes_or_equals(&self, later: &Snapshot) -> bool {
		self.node.changes_until(&later.node).is_some()
	}

	pub(crate) fn node(&self) -> &Arc<VersionNode> {
		&self.node
	}
}

fn line_break_len(line: ropey::RopeSlice<'_>) -> CharLen {
	let len = line.len_chars();
	if len == 0 {
		return 0;
	}
	match line.char(len - 1) {
		'\n' if len >= 2 && line.char(len - 2) == '\r' => 2,
		'\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}' => 1,
		_ => 0,
	}
}

impl PartialEq for Snapshot {
	fn eq(&self, other: &Self) -> bool {
		self.node.buffer == other.node.buffer && self.node.number == other.node.number
	}
}

impl Eq for Snapshot {}

impl fmt::Debug for Snapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Snapshot")
			.field("buffer", &self.node.buffer)
			.field("version", &self.node.number)
			.field("len_chars", &self.node.len)
			.finish()
	}
}

/// Mutable document producing a new [`Snapshot`] for every edit.
pub struct TextBuffer {
	current: Snapshot,
}

impl TextBuffer {
	/// Creates a buffer whose version 0 holds `text`.
	pub fn new(text: &str) -> Self {
		let text = Rope::from(text);
		let node = VersionNode::root(BufferId::next(), text.len_chars());
		Self {
			current: Snapshot { node, text },
		}
	}

	/// Returns the buffer identifier.
	pub fn id(&self) -> BufferId {
		self.current.buffer_id()
	}

	/// Returns the current snapshot.
	pub fn snapshot(&self) -> Snapshot {
		self.current.clone()
	}

	/// Applies `changes` to the current snapshot and returns the new one.
	///
	/// # Panics
	///
	/// Panics if `changes` was built for a document of a different length.
	pub fn apply(&mut self, changes: ChangeSet) -> Snapshot {
		assert_eq!(
			changes.len_before(),
			self.current.len_chars(),
			"changeset length does not match buffer length"
		);

		let mut text = self.current.text.clone();
		changes.apply(&mut text);

		let node = Arc::new(VersionNode {
			buffer: self.current.node.buffer,
			number: self.current.node.number + 1,
			len: text.len_chars(),
			next: OnceLock::new(),
		});
		let linked = self.current.node.next.set((changes, Arc::clone(&node))).is_ok();
		debug_assert!(linked, "head version already has a successor");

		self.current = Snapshot { node, text };
		self.snapshot()
	}

	/// Replaces `start..end` with `text`.
	pub fn replace(&mut self, start: CharIdx, end: CharIdx, text: &str) -> Snapshot {
		let changes = ChangeSet::replace(self.current.len_chars(), start, end, text);
		self.apply(changes)
	}

	/// Inserts `text` at `pos`.
	pub fn insert(&mut self, pos: CharIdx, text: &str) -> Snapshot {
		self.replace(pos, pos, text)
	}

	/// Deletes `start..end`.
	pub fn delete(&mut self, start: CharIdx, end: CharIdx) -> Snapshot {
		self.replace(start, end, "")
	}
}

impl fmt::Debug for TextBuffer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TextBuffer").field("current", &self.current).finish()
	}
}
