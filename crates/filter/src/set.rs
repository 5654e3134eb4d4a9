//! The parsed, structured form of a search string.

use indexmap::IndexMap;

use crate::value::FilterValue;

/// A structured filter set: per-key value lists plus free-text terms.
///
/// Keys are conjunctive; values within a key are a disjunction for the
/// positive entries while every negated entry must independently hold.
/// Insertion order is preserved so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
	keys: IndexMap<String, Vec<FilterValue>>,
	free_text: Vec<FilterValue>,
}

impl FilterSet {
	/// An empty filter set, which matches everything.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a user-typed search string.
	///
	/// The grammar is a sequence of whitespace-separated tokens:
	/// * `key:value` sets or extends the filter for `key`
	/// * repeating a key, or `key:v1,v2` / `key:(v1,v2)`, ORs values
	/// * `!key:value`, `key:!value` and `key:!(v1,v2)` negate
	/// * `key:=value` requests exact (still case-insensitive) equality
	/// * a bare token is accumulated into the free-text terms
	///
	/// Parsing is total: malformed fragments (a dangling `key:`,
	/// mismatched parens) are dropped rather than reported.
	#[must_use]
	pub fn parse(query: &str) -> Self {
		let mut set = Self::new();
		for token in query.split_whitespace() {
			let mut rest = token;
			let mut negated = false;
			while let Some(stripped) = rest.strip_prefix('!') {
				negated = !negated;
				rest = stripped;
			}
			if rest.is_empty() {
				continue;
			}
			match rest.split_once(':') {
				Some((key, _)) if key.is_empty() => {}
				Some((key, group)) => {
					if let Some(values) = parse_value_group(group, negated) {
						set.keys.entry(key.to_string()).or_default().extend(values);
					}
				}
				None => {
					set.free_text.push(FilterValue {
						raw: rest.to_string(),
						negated,
						exact: false,
					});
				}
			}
		}
		set
	}

	/// Serializes back to a search string.
	///
	/// Free text comes first, then each key in insertion order as
	/// `key:value` or `key:(v1,v2)`; keys whose value list is empty are
	/// omitted. For any set produced by [`FilterSet::parse`],
	/// `parse(serialize(set)) == set`.
	#[must_use]
	pub fn serialize(&self) -> String {
		let mut parts: Vec<String> = self.free_text.iter().map(FilterValue::render).collect();
		for (key, values) in &self.keys {
			match values.as_slice() {
				[] => {}
				[value] => parts.push(format!("{key}:{}", value.render())),
				values => {
					let joined: Vec<String> = values.iter().map(FilterValue::render).collect();
					parts.push(format!("{key}:({})", joined.join(",")));
				}
			}
		}
		parts.join(" ")
	}

	/// True when no key filters and no free text are present.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.free_text.is_empty() && self.keys.values().all(Vec::is_empty)
	}

	/// The per-key filters, in insertion order.
	pub fn keys(&self) -> impl Iterator<Item = (&str, &[FilterValue])> {
		self.keys.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
	}

	/// The accumulated free-text terms.
	#[must_use]
	pub fn free_text(&self) -> &[FilterValue] {
		&self.free_text
	}

	/// Adds a value to a key's disjunction.
	pub fn insert(&mut self, key: impl Into<String>, value: FilterValue) {
		self.keys.entry(key.into()).or_default().push(value);
	}

	/// Whether `value` is currently active for `key` (case-insensitive).
	#[must_use]
	pub fn is_active(&self, key: &str, value: &str, exact: bool) -> bool {
		self.keys.get(key).is_some_and(|values| {
			values
				.iter()
				.any(|v| !v.negated && v.exact == exact && v.raw.eq_ignore_ascii_case(value))
		})
	}

	/// Toggles a positive value for a key on or off, dropping the key
	/// once its value list empties.
	pub fn toggle(&mut self, key: &str, value: &str, exact: bool) {
		let values = self.keys.entry(key.to_string()).or_default();
		let existing = values
			.iter()
			.position(|v| !v.negated && v.exact == exact && v.raw.eq_ignore_ascii_case(value));
		match existing {
			Some(idx) => {
				values.remove(idx);
				if values.is_empty() {
					self.keys.shift_remove(key);
				}
			}
			None => values.push(FilterValue {
				raw: value.to_string(),
				negated: false,
				exact,
			}),
		}
	}

	/// Decodes the bookmarked URL form (`?q=web&status=new,deployed`).
	///
	/// Each query parameter is a filter key with comma-joined values;
	/// `q` holds the free-text terms. Parameters with empty values are
	/// ignored. This encoding is persisted in user bookmarks and must
	/// stay stable.
	#[must_use]
	pub fn from_query_string(query_string: &str) -> Self {
		let mut set = Self::new();
		let trimmed = query_string.strip_prefix('?').unwrap_or(query_string);
		for (name, joined) in url::form_urlencoded::parse(trimmed.as_bytes()) {
			if joined.is_empty() {
				continue;
			}
			let values = joined
				.split(',')
				.filter(|fragment| !fragment.is_empty())
				.map(|fragment| FilterValue::parse_markers(fragment, false));
			if name == "q" {
				set.free_text.extend(values);
			} else {
				set.keys.entry(name.into_owned()).or_default().extend(values);
			}
		}
		set
	}

	/// Encodes to the bookmarked URL form. Empty keys are dropped.
	#[must_use]
	pub fn to_query_string(&self) -> String {
		let mut encoder = url::form_urlencoded::Serializer::new(String::new());
		if !self.free_text.is_empty() {
			let joined: Vec<String> = self.free_text.iter().map(FilterValue::render).collect();
			encoder.append_pair("q", &joined.join(","));
		}
		for (key, values) in &self.keys {
			if values.is_empty() {
				continue;
			}
			let joined: Vec<String> = values.iter().map(FilterValue::render).collect();
			encoder.append_pair(key, &joined.join(","));
		}
		format!("?{}", encoder.finish())
	}
}

/// Parses the value side of a `key:value` token.
///
/// Accepts `v`, `v1,v2`, `(v1,v2)`, and a `!` prefix on the whole group
/// (`!(v1,v2)`). Returns `None` for malformed groups (mismatched parens,
/// no values), which drops the token.
fn parse_value_group(group: &str, outer_negated: bool) -> Option<Vec<FilterValue>> {
	let mut rest = group;
	let mut negated = outer_negated;
	while let Some(stripped) = rest.strip_prefix('!') {
		negated = !negated;
		rest = stripped;
	}
	let open = rest.starts_with('(');
	let close = rest.ends_with(')');
	if open != close {
		return None;
	}
	if open {
		rest = &rest[1..rest.len() - 1];
	}
	let values: Vec<FilterValue> = rest
		.split(',')
		.filter(|fragment| !fragment.is_empty())
		.map(|fragment| FilterValue::parse_markers(fragment, negated))
		.collect();
	if values.is_empty() { None } else { Some(values) }
}
