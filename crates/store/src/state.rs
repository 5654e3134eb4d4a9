//! The collection state machine.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::entity::Entity;

/// A collection shared between the dispatcher (writes) and selectors
/// (reads).
pub type SharedCollection<T> = Arc<Mutex<CollectionState<T>>>;

/// Creates an empty shared collection for an entity kind.
#[must_use]
pub fn shared<T: Entity>() -> SharedCollection<T> {
	Arc::new(Mutex::new(CollectionState::new()))
}

/// Lifecycle events driving a collection's state machine.
///
/// Start/success/error triples exist for each canonical verb; notify
/// events are server-push broadcasts that touch items without touching
/// the request flags; `Cleanup` resets transient flags only.
#[derive(Debug, Clone)]
pub enum Lifecycle<T: Entity> {
	/// A list fetch was sent.
	FetchStart,
	/// The full collection arrived; replaces `items`.
	FetchSuccess(Vec<T>),
	/// The list fetch failed.
	FetchError(Value),
	/// A single-item fetch was sent.
	GetStart,
	/// A single item arrived; insert-or-replace by key.
	GetSuccess(T),
	/// The single-item fetch failed.
	GetError(Value),
	/// A create was sent.
	CreateStart,
	/// The created item arrived; insert-or-replace by key.
	CreateSuccess(T),
	/// The create was rejected.
	CreateError(Value),
	/// An update was sent.
	UpdateStart,
	/// The updated item arrived; replace by key, inserting when the
	/// item was never materialized locally (still authoritative).
	UpdateSuccess(T),
	/// The update was rejected.
	UpdateError(Value),
	/// A delete was sent.
	DeleteStart,
	/// The delete succeeded; remove by key.
	DeleteSuccess(T::Key),
	/// The delete was rejected.
	DeleteError(Value),
	/// A custom verb was sent.
	CustomStart,
	/// A custom verb succeeded, optionally returning the updated item.
	CustomSuccess(Option<T>),
	/// A custom verb was rejected.
	CustomError(Value),
	/// Server push: an item was created elsewhere.
	NotifyCreate(T),
	/// Server push: an item changed elsewhere.
	NotifyUpdate(T),
	/// Server push: an item was deleted elsewhere.
	NotifyDelete(T::Key),
	/// Caller-initiated reset of `errors`/`saved`/`saving`. Items and
	/// `loaded` are preserved; cleanup resets transient flags, not
	/// cached data.
	Cleanup,
}

/// Normalized collection plus uniform lifecycle flags for one entity
/// kind.
///
/// Invariants, held after every transition: a success terminates the
/// in-flight flag it belongs to (`loaded ⇒ ¬loading`, `saved ⇒
/// ¬saving`), and an error terminates the in-flight state
/// (`errors ≠ None ⇒ ¬saving ∧ ¬loading` for the affected verb class).
#[derive(Debug)]
pub struct CollectionState<T: Entity> {
	items: Vec<T>,
	index: FxHashMap<T::Key, usize>,
	loading: bool,
	loaded: bool,
	saving: bool,
	saved: bool,
	errors: Option<Value>,
	version: u64,
}

impl<T: Entity> Default for CollectionState<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Entity> CollectionState<T> {
	/// An empty collection with all flags false.
	#[must_use]
	pub fn new() -> Self {
		Self {
			items: Vec::new(),
			index: FxHashMap::default(),
			loading: false,
			loaded: false,
			saving: false,
			saved: false,
			errors: None,
			version: 0,
		}
	}

	/// The items, in unspecified order, unique by primary key.
	#[must_use]
	pub fn items(&self) -> &[T] {
		&self.items
	}

	/// O(1) lookup by primary key.
	#[must_use]
	pub fn get(&self, key: &T::Key) -> Option<&T> {
		self.index.get(key).map(|&idx| &self.items[idx])
	}

	/// A list fetch is in flight.
	#[must_use]
	pub fn loading(&self) -> bool {
		self.loading
	}

	/// The collection has been fetched at least once.
	#[must_use]
	pub fn loaded(&self) -> bool {
		self.loaded
	}

	/// Any mutation for this entity kind is in flight. Coarse
	/// aggregate; callers needing per-item tracking keep their own key
	/// sets.
	#[must_use]
	pub fn saving(&self) -> bool {
		self.saving
	}

	/// The most recent mutation completed successfully.
	#[must_use]
	pub fn saved(&self) -> bool {
		self.saved
	}

	/// The terminal error of the most recent failed request, verbatim
	/// from the backend. Cleared only by success or `Cleanup`.
	#[must_use]
	pub fn errors(&self) -> Option<&Value> {
		self.errors.as_ref()
	}

	/// Monotonic change counter; selectors memoize against it.
	#[must_use]
	pub fn version(&self) -> u64 {
		self.version
	}

	/// Applies one lifecycle event. Pure state transition: never
	/// panics, never reports errors.
	pub fn apply(&mut self, event: Lifecycle<T>) {
		match event {
			Lifecycle::FetchStart | Lifecycle::GetStart => {
				self.loading = true;
			}
			Lifecycle::FetchSuccess(items) => {
				self.replace_items(items);
				self.loading = false;
				self.loaded = true;
				self.errors = None;
			}
			Lifecycle::GetSuccess(item) => {
				self.insert_or_replace(item);
				self.loading = false;
			}
			Lifecycle::FetchError(error) | Lifecycle::GetError(error) => {
				self.loading = false;
				self.errors = Some(error);
			}
			Lifecycle::CreateStart
			| Lifecycle::UpdateStart
			| Lifecycle::DeleteStart
			| Lifecycle::CustomStart => {
				self.saving = true;
				self.saved = false;
			}
			Lifecycle::CreateSuccess(item) | Lifecycle::UpdateSuccess(item) => {
				self.insert_or_replace(item);
				self.mutation_done();
			}
			Lifecycle::DeleteSuccess(key) => {
				self.remove(&key);
				self.mutation_done();
			}
			Lifecycle::CustomSuccess(item) => {
				if let Some(item) = item {
					self.insert_or_replace(item);
				}
				self.mutation_done();
			}
			Lifecycle::CreateError(error)
			| Lifecycle::UpdateError(error)
			| Lifecycle::DeleteError(error)
			| Lifecycle::CustomError(error) => {
				// The item set stays untouched: no partial or
				// optimistic mutation is committed before success.
				self.saving = false;
				self.errors = Some(error);
			}
			Lifecycle::NotifyCreate(item) | Lifecycle::NotifyUpdate(item) => {
				self.insert_or_replace(item);
			}
			Lifecycle::NotifyDelete(key) => {
				self.remove(&key);
			}
			Lifecycle::Cleanup => {
				self.errors = None;
				self.saved = false;
				self.saving = false;
			}
		}
		self.version += 1;
	}

	fn mutation_done(&mut self) {
		self.saving = false;
		self.saved = true;
		self.errors = None;
	}

	fn replace_items(&mut self, items: Vec<T>) {
		self.items = items;
		self.index.clear();
		self.index.reserve(self.items.len());
		for (idx, item) in self.items.iter().enumerate() {
			self.index.insert(item.key(), idx);
		}
	}

	fn insert_or_replace(&mut self, item: T) {
		match self.index.get(&item.key()) {
			Some(&idx) => self.items[idx] = item,
			None => {
				self.index.insert(item.key(), self.items.len());
				self.items.push(item);
			}
		}
	}

	fn remove(&mut self, key: &T::Key) {
		let Some(idx) = self.index.remove(key) else {
			return;
		};
		self.items.swap_remove(idx);
		if let Some(moved) = self.items.get(idx) {
			self.index.insert(moved.key(), idx);
		}
	}
}
