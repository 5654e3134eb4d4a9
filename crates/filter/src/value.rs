//! Filter values and the closed union of item field values.

/// One accumulated value for a filter key.
///
/// `negated` comes from a leading `!` on the token or the value,
/// `exact` from a leading `=` on the value. Double negation (`!!`)
/// cancels out during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterValue {
	/// The value text with `!`/`=` markers stripped.
	pub raw: String,
	/// The item must NOT match this value.
	pub negated: bool,
	/// Full case-insensitive equality instead of substring containment.
	pub exact: bool,
}

impl FilterValue {
	/// A plain positive substring value.
	pub fn new(raw: impl Into<String>) -> Self {
		Self {
			raw: raw.into(),
			negated: false,
			exact: false,
		}
	}

	/// Parses the `!`/`=` markers off a raw value fragment.
	///
	/// `outer_negated` folds in negation applied outside the value
	/// itself (a `!` on the whole token or on a paren group).
	pub(crate) fn parse_markers(fragment: &str, outer_negated: bool) -> Self {
		let mut rest = fragment;
		let mut negated = outer_negated;
		while let Some(stripped) = rest.strip_prefix('!') {
			negated = !negated;
			rest = stripped;
		}
		let exact = rest.starts_with('=');
		if exact {
			rest = &rest[1..];
		}
		Self {
			raw: rest.to_string(),
			negated,
			exact,
		}
	}

	/// Renders the value back to its token form (`!`, `=`, raw).
	pub(crate) fn render(&self) -> String {
		let mut out = String::with_capacity(self.raw.len() + 2);
		if self.negated {
			out.push('!');
		}
		if self.exact {
			out.push('=');
		}
		out.push_str(&self.raw);
		out
	}
}

/// A single scalar read from an item field.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
	/// A string field.
	Str(String),
	/// A numeric field.
	Num(f64),
	/// A boolean field.
	Bool(bool),
}

/// The value of an item field as seen by the evaluator.
///
/// A closed union so evaluation can pattern-match exhaustively instead
/// of probing runtime types. Anything that is not a scalar or an array
/// of scalars is [`FieldValue::Unsupported`] and never matches.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	/// A single scalar value.
	Scalar(Scalar),
	/// An array of scalars; the field matches if any element matches.
	Many(Vec<Scalar>),
	/// The item does not declare this field.
	Missing,
	/// The field exists but is not a valid filter primitive.
	Unsupported,
}

impl FieldValue {
	/// Convenience constructor for string fields.
	pub fn str(value: impl Into<String>) -> Self {
		Self::Scalar(Scalar::Str(value.into()))
	}

	/// Convenience constructor for numeric fields.
	#[must_use]
	pub fn num(value: f64) -> Self {
		Self::Scalar(Scalar::Num(value))
	}

	/// Convenience constructor for string-array fields.
	pub fn strs<I: IntoIterator<Item = S>, S: Into<String>>(values: I) -> Self {
		Self::Many(values.into_iter().map(|s| Scalar::Str(s.into())).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_markers_parse_and_render() {
		let value = FilterValue::parse_markers("!=broken", false);
		assert_eq!(
			value,
			FilterValue {
				raw: "broken".into(),
				negated: true,
				exact: true,
			}
		);
		assert_eq!(value.render(), "!=broken");
	}

	#[test]
	fn test_double_negation_cancels() {
		assert!(!FilterValue::parse_markers("!!ready", false).negated);
		assert!(FilterValue::parse_markers("!!ready", true).negated);
		assert!(FilterValue::parse_markers("!!!ready", false).negated);
	}
}
