//! Filter evaluation against heterogeneous items.

use serde_json::Value;

use crate::set::FilterSet;
use crate::value::{FieldValue, FilterValue, Scalar};

/// Items that expose queryable fields to the filter engine.
///
/// A key the item does not declare yields [`FieldValue::Missing`]; a
/// field whose value is not a filter primitive (scalar or array of
/// scalars) yields [`FieldValue::Unsupported`]. Both never match and
/// never panic, so unrecognized keys in a bookmarked query degrade to
/// "no item matches" rather than an error.
pub trait Filterable {
	/// Reads the named field as a filter value.
	fn field(&self, key: &str) -> FieldValue;
}

impl FilterSet {
	/// Evaluates this filter against one item.
	///
	/// An item matches iff every key filter holds (conjunction across
	/// keys) and every free-text term matches at least one of the
	/// caller-designated `default_fields` (case-insensitive substring;
	/// negated terms must match none). Within a key, positive values OR
	/// together while each negated value must independently hold.
	pub fn matches<T: Filterable>(&self, item: &T, default_fields: &[&str]) -> bool {
		for (key, values) in self.keys() {
			if values.is_empty() {
				continue;
			}
			let field = item.field(key);
			let has_positive = values.iter().any(|v| !v.negated);
			let positives_ok = !has_positive
				|| values
					.iter()
					.any(|v| !v.negated && value_matches(&field, v));
			let negatives_ok = values
				.iter()
				.filter(|v| v.negated)
				.all(|v| !value_matches(&field, v));
			if !(positives_ok && negatives_ok) {
				return false;
			}
		}
		for term in self.free_text() {
			let hit = default_fields
				.iter()
				.any(|name| value_matches(&item.field(name), term));
			if hit == term.negated {
				return false;
			}
		}
		true
	}

	/// Filters a slice, preserving input order.
	pub fn apply<'a, T: Filterable>(&self, items: &'a [T], default_fields: &[&str]) -> Vec<&'a T> {
		items
			.iter()
			.filter(|item| self.matches(*item, default_fields))
			.collect()
	}
}

fn value_matches(field: &FieldValue, value: &FilterValue) -> bool {
	match field {
		FieldValue::Scalar(scalar) => scalar_matches(scalar, value),
		FieldValue::Many(scalars) => scalars.iter().any(|s| scalar_matches(s, value)),
		FieldValue::Missing | FieldValue::Unsupported => false,
	}
}

fn scalar_matches(scalar: &Scalar, value: &FilterValue) -> bool {
	match scalar {
		Scalar::Str(s) => {
			let haystack = s.to_lowercase();
			let needle = value.raw.to_lowercase();
			if value.exact {
				haystack == needle
			} else {
				haystack.contains(&needle)
			}
		}
		Scalar::Num(n) => {
			if let Some((lo, hi)) = parse_range(&value.raw) {
				(lo..=hi).contains(n)
			} else {
				value.raw.parse::<f64>() == Ok(*n)
			}
		}
		Scalar::Bool(b) => value.raw.parse::<bool>() == Ok(*b),
	}
}

/// Recognizes a `lo-hi` inclusive numeric range.
///
/// Ranges are expanded here at evaluation time, never stored expanded
/// in the filter set, so serialization reproduces the typed form.
fn parse_range(raw: &str) -> Option<(f64, f64)> {
	let (lo, hi) = raw.split_once('-')?;
	if lo.is_empty() || hi.is_empty() {
		return None;
	}
	let lo: f64 = lo.parse().ok()?;
	let hi: f64 = hi.parse().ok()?;
	Some((lo, hi))
}

impl Filterable for Value {
	fn field(&self, key: &str) -> FieldValue {
		let Some(map) = self.as_object() else {
			return FieldValue::Unsupported;
		};
		match map.get(key) {
			None => FieldValue::Missing,
			Some(value) => json_field(value),
		}
	}
}

fn json_field(value: &Value) -> FieldValue {
	match value {
		Value::String(s) => FieldValue::str(s.clone()),
		Value::Number(n) => n.as_f64().map_or(FieldValue::Unsupported, FieldValue::num),
		Value::Bool(b) => FieldValue::Scalar(Scalar::Bool(*b)),
		Value::Array(items) => {
			let mut scalars = Vec::with_capacity(items.len());
			for item in items {
				match json_field(item) {
					FieldValue::Scalar(s) => scalars.push(s),
					_ => return FieldValue::Unsupported,
				}
			}
			FieldValue::Many(scalars)
		}
		Value::Null | Value::Object(_) => FieldValue::Unsupported,
	}
}
