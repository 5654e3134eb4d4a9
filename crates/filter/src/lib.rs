//! Search filter language for heterogeneous resource collections.
//!
//! A user-typed search string compiles into a [`FilterSet`]: a mapping
//! from field name to accumulated values (repeated keys OR together,
//! `!` negates, bare tokens become free text), which is then evaluated
//! against any collection whose items implement [`Filterable`].
//!
//! The grammar and its URL query-string form are user-visible: search
//! strings are bookmarked and shared, so [`FilterSet::parse`] /
//! [`FilterSet::serialize`] must stay mutual inverses and the accepted
//! syntax must remain stable.

#![warn(missing_docs)]

mod eval;
mod set;
mod value;

#[cfg(test)]
mod tests;

pub use eval::Filterable;
pub use set::FilterSet;
pub use value::{FieldValue, FilterValue, Scalar};
