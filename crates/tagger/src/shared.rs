//! Taggers shared by every consumer of the same key.
//!
//! Several views of one document usually want the same tags. The registry
//! hands out one tagger per key and disposes it when its last holder goes
//! away.

use std::cell::RefCell;
use std::hash::Hash;
use std::ops::Deref;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::TaggerContext;
use crate::source::AsyncTaggerSource;
use crate::tagger::Tagger;

struct SharedEntry<S: AsyncTaggerSource> {
	tagger: Rc<RefCell<Tagger<S>>>,
	holders: usize,
}

type Entries<K, S> = RefCell<FxHashMap<K, SharedEntry<S>>>;

/// Registry of reference-counted taggers keyed by `K`.
pub struct SharedTaggers<K, S: AsyncTaggerSource> {
	ctx: TaggerContext,
	entries: Rc<Entries<K, S>>,
}

impl<K: Eq + Hash + Clone, S: AsyncTaggerSource> SharedTaggers<K, S> {
	pub fn new(ctx: TaggerContext) -> Self {
		Self {
			ctx,
			entries: Rc::new(RefCell::new(FxHashMap::default())),
		}
	}

	/// Returns the tagger for `key`, building it from `create` on first use.
	pub fn acquire(&self, key: K, create: impl FnOnce() -> Arc<S>) -> SharedTagger<K, S> {
		let mut entries = self.entries.borrow_mut();
		let entry = entries.entry(key.clone()).or_insert_with(|| SharedEntry {
			tagger: Rc::new(RefCell::new(Tagger::new(&self.ctx, create()))),
			holders: 0,
		});
		entry.holders += 1;
		tracing::trace!(holders = entry.holders, "tagger.shared.acquire");

		SharedTagger {
			key,
			tagger: Rc::clone(&entry.tagger),
			entries: Rc::downgrade(&self.entries),
		}
	}

	/// Returns how many holders `key` currently has.
	pub fn holders(&self, key: &K) -> usize {
		self.entries.borrow().get(key).map_or(0, |e| e.holders)
	}

	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}
}

/// One holder's handle on a shared tagger.
///
/// Cloning adds a holder. Dropping the last holder disposes the tagger.
pub struct SharedTagger<K: Eq + Hash, S: AsyncTaggerSource> {
	key: K,
	tagger: Rc<RefCell<Tagger<S>>>,
	entries: Weak<Entries<K, S>>,
}

impl<K: Eq + Hash, S: AsyncTaggerSource> Deref for SharedTagger<K, S> {
	type Target = RefCell<Tagger<S>>;

	fn deref(&self) -> &Self::Target {
		&self.tagger
	}
}

impl<K: Eq + Hash + Clone, S: AsyncTaggerSource> Clone for SharedTagger<K, S> {
	fn clone(&self) -> Self {
		if let Some(entries) = self.entries.upgrade() {
			let mut entries = entries.borrow_mut();
			if let Some(entry) = entries.get_mut(&self.key) {
				entry.holders += 1;
			}
		}
		Self {
			key: self.key.clone(),
			tagger: Rc::clone(&self.tagger),
			entries: Weak::clone(&self.entries),
		}
	}
}

impl<K: Eq + Hash, S: AsyncTaggerSource> Drop for SharedTagger<K, S> {
	fn drop(&mut self) {
		let Some(entries) = self.entries.upgrade() else {
			return;
		};
		let released = {
			let mut entries = entries.borrow_mut();
			let last = entries.get_mut(&self.key).is_some_and(|entry| {
				entry.holders -= 1;
				entry.holders == 0
			});
			if last { entries.remove(&self.key) } else { None }
		};

		if let Some(entry) = released {
			tracing::trace!("tagger.shared.release");
			if let Ok(mut tagger) = entry.tagger.try_borrow_mut() {
				tagger.dispose();
			}
		}
	}
}
