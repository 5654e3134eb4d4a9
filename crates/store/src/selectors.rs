//! Memoized read accessors over a shared collection.

use std::sync::Arc;

use anvil_filter::{FilterSet, Filterable};
use parking_lot::Mutex;
use serde_json::Value;

use crate::entity::Entity;
use crate::state::SharedCollection;

/// Read-side accessors for one entity kind.
///
/// Snapshots are memoized against the collection's version counter:
/// repeated calls with an unchanged collection return the same `Arc`
/// allocation, so downstream consumers can use pointer equality to
/// skip re-rendering.
pub struct Selectors<T: Entity> {
	collection: SharedCollection<T>,
	cache: Mutex<Cache<T>>,
}

struct Cache<T> {
	all: Option<(u64, Arc<[T]>)>,
	search: Option<SearchCache<T>>,
}

struct SearchCache<T> {
	version: u64,
	query: String,
	fields: Vec<String>,
	result: Arc<[T]>,
}

impl<T: Entity> Selectors<T> {
	/// Creates selectors over a shared collection.
	pub fn new(collection: SharedCollection<T>) -> Self {
		Self {
			collection,
			cache: Mutex::new(Cache {
				all: None,
				search: None,
			}),
		}
	}

	/// All items, in unspecified order. Memoized by version.
	pub fn all(&self) -> Arc<[T]> {
		self.versioned().1
	}

	/// Version and snapshot captured under a single state lock; the pair
	/// stays coherent when writes land between selector calls.
	fn versioned(&self) -> (u64, Arc<[T]>) {
		let state = self.collection.lock();
		let version = state.version();
		let mut cache = self.cache.lock();
		if let Some((cached_version, snapshot)) = &cache.all {
			if *cached_version == version {
				return (version, Arc::clone(snapshot));
			}
		}
		let snapshot: Arc<[T]> = state.items().to_vec().into();
		cache.all = Some((version, Arc::clone(&snapshot)));
		(version, snapshot)
	}

	/// One item by primary key, via the collection's O(1) index.
	pub fn get(&self, key: &T::Key) -> Option<T> {
		self.collection.lock().get(key).cloned()
	}

	/// A list fetch is in flight.
	pub fn loading(&self) -> bool {
		self.collection.lock().loading()
	}

	/// The collection has been fetched at least once.
	pub fn loaded(&self) -> bool {
		self.collection.lock().loaded()
	}

	/// Any mutation is in flight.
	pub fn saving(&self) -> bool {
		self.collection.lock().saving()
	}

	/// The most recent mutation completed successfully.
	pub fn saved(&self) -> bool {
		self.collection.lock().saved()
	}

	/// The terminal error of the most recent failed request.
	pub fn errors(&self) -> Option<Value> {
		self.collection.lock().errors().cloned()
	}
}

impl<T: Entity + Filterable> Selectors<T> {
	/// Items matching a user-typed search string.
	///
	/// Composes [`FilterSet::parse`] and evaluation over [`Selectors::all`];
	/// free text matches against `default_fields`. Memoized by
	/// `(version, query, default_fields)`.
	pub fn search(&self, query: &str, default_fields: &[&str]) -> Arc<[T]> {
		let (version, items) = self.versioned();
		{
			let cache = self.cache.lock();
			if let Some(cached) = &cache.search {
				if cached.version == version
					&& cached.query == query
					&& cached.fields.iter().map(String::as_str).eq(default_fields.iter().copied())
				{
					return Arc::clone(&cached.result);
				}
			}
		}
		let set = FilterSet::parse(query);
		let result: Arc<[T]> = items
			.iter()
			.filter(|item| set.matches(*item, default_fields))
			.cloned()
			.collect();
		self.cache.lock().search = Some(SearchCache {
			version,
			query: query.to_string(),
			fields: default_fields.iter().map(ToString::to_string).collect(),
			result: Arc::clone(&result),
		});
		result
	}
}
