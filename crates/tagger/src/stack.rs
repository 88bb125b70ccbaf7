//! Persistent last-in-first-out stack with structural sharing.
//!
//! Every node is immutable once built, so a reader holding an older stack
//! keeps a consistent view no matter how many pushes or pops happen on
//! newer versions. This is what lets [`crate::handoff::HandoffQueue`] swap
//! whole stacks between threads without locking.

use std::fmt;
use std::sync::Arc;

struct Node<T> {
	value: T,
	next: RangeStack<T>,
	len: usize,
}

/// Immutable stack of pending line ranges (or any clonable value).
pub struct RangeStack<T> {
	head: Option<Arc<Node<T>>>,
}

impl<T> RangeStack<T> {
	/// Returns the empty stack.
	pub const fn new() -> Self {
		Self { head: None }
	}

	pub fn is_empty(&self) -> bool {
		self.head.is_none()
	}

	pub fn len(&self) -> usize {
		self.head.as_ref().map_or(0, |node| node.len)
	}

	/// Returns the most recently pushed value.
	pub fn peek(&self) -> Option<&T> {
		self.head.as_ref().map(|node| &node.value)
	}

	/// Returns a new stack with `value` on top; `self` is untouched.
	#[must_use]
	pub fn push(&self, value: T) -> Self {
		let len = self.len() + 1;
		Self {
			head: Some(Arc::new(Node {
				value,
				next: self.clone(),
				len,
			})),
		}
	}

	/// Returns the stack below the top value; popping an empty stack yields an empty stack.
	#[must_use]
	pub fn tail(&self) -> Self {
		match &self.head {
			Some(node) => node.next.clone(),
			None => Self::new(),
		}
	}

	/// Iterates from the top of the stack to the bottom.
	pub fn iter(&self) -> Iter<'_, T> {
		Iter {
			next: self.head.as_deref(),
		}
	}
}

impl<T: Clone> RangeStack<T> {
	/// Returns the top value and the stack below it.
	pub fn pop(&self) -> (Option<T>, Self) {
		(self.peek().cloned(), self.tail())
	}
}

impl<T> Clone for RangeStack<T> {
	fn clone(&self) -> Self {
		Self { head: self.head.clone() }
	}
}

impl<T> Default for RangeStack<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Drop for RangeStack<T> {
	fn drop(&mut self) {
		let mut head = self.head.take();
		while let Some(node) = head {
			match Arc::try_unwrap(node) {
				Ok(mut node) => head = node.next.head.take(),
				Err(_) => break,
			}
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for RangeStack<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}

/// Top-to-bottom iterator over a [`RangeStack`].
pub struct Iter<'a, T> {
	next: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
	type Item = &'a T;

	fn next(&mut self) -> Option<Self::Item> {
		let node = self.next?;
		self.next = node.next.head.as_deref();
		Some(&node.value)
	}
}

impl<'a, T> IntoIterator for &'a RangeStack<T> {
	type Item = &'a T;
	type IntoIter = Iter<'a, T>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}
