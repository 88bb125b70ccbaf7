use crate::Rope;
use crate::range::{CharIdx, CharLen};

/// Which side of an insertion a boundary position lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
	/// Stay in front of text inserted at the position.
	Left,
	/// Follow text inserted at the position.
	Right,
}

/// One splice taking a document to its successor version: the characters in
/// `start..start + removed` are replaced by `inserted`.
///
/// The same value maps positions, which is how stale spans are carried
/// forward across versions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
	doc_len: CharLen,
	start: CharIdx,
	removed: CharLen,
	inserted: String,
	inserted_len: CharLen,
}

impl ChangeSet {
	/// Replaces `start..end` of a `doc_len` document with `text`.
	///
	/// Out-of-range bounds are clamped to the document.
	pub fn replace(doc_len: CharLen, start: CharIdx, end: CharIdx, text: &str) -> Self {
		debug_assert!(start <= end && end <= doc_len, "replace {start}..{end} outside 0..{doc_len}");
		let end = end.min(doc_len);
		let start = start.min(end);
		Self {
			doc_len,
			start,
			removed: end - start,
			inserted: text.to_owned(),
			inserted_len: text.chars().count(),
		}
	}

	/// Length of the document the splice applies to.
	pub fn len_before(&self) -> CharLen {
		self.doc_len
	}

	pub fn len_after(&self) -> CharLen {
		self.doc_len - self.removed + self.inserted_len
	}

	/// Removed source range.
	pub fn removed_range(&self) -> std::ops::Range<CharIdx> {
		self.start..self.start + self.removed
	}

	pub fn apply(&self, doc: &mut Rope) {
		debug_assert_eq!(doc.len_chars(), self.doc_len, "changeset applied to a document of the wrong length");
		if self.removed > 0 {
			doc.remove(self.removed_range());
		}
		if self.inserted_len > 0 {
			doc.insert(self.start, &self.inserted);
		}
	}

	/// Maps `pos` in the source document into the resulting one.
	///
	/// Positions strictly inside the removed range land after the inserted
	/// text. `bias` only matters exactly at the splice start.
	pub fn map_pos(&self, pos: CharIdx, bias: Bias) -> CharIdx {
		let end = self.start + self.removed;
		if pos < self.start || (pos == self.start && bias == Bias::Left) {
			pos
		} else if pos < end {
			self.start + self.inserted_len
		} else {
			pos - self.removed + self.inserted_len
		}
	}
}
