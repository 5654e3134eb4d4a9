//! Generic resource collection state.
//!
//! One [`CollectionState`] exists per entity kind, holding the items and
//! the uniform lifecycle flags (`loading`/`loaded`/`saving`/`saved`/
//! `errors`). All mutation goes through [`Lifecycle`] events applied by
//! the reducer; reads go through memoized [`Selectors`].
//!
//! The dispatcher side talks to collections through the type-erased
//! [`CollectionSink`] / [`StoreRegistry`] pair, which decodes wire
//! payloads into the typed item before applying the typed event.

#![warn(missing_docs)]

mod entity;
mod selectors;
mod sink;
mod state;

pub use entity::Entity;
pub use selectors::Selectors;
pub use sink::{CollectionSink, JsonSink, StoreRegistry, WireEvent};
pub use state::{CollectionState, Lifecycle, SharedCollection, shared};
