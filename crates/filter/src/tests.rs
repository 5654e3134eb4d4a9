use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use super::*;

const DEFAULT_FIELDS: &[&str] = &["hostname", "status"];

fn nodes() -> Vec<Value> {
	vec![
		json!({"hostname": "web1", "status": "deployed", "tags": ["first", "second"], "mem": 8}),
		json!({"hostname": "db1", "status": "allocated", "tags": ["second", "third"], "mem": 32}),
		json!({"hostname": "spare", "status": "new", "tags": [], "mem": 4}),
	]
}

/// Runs a query against `nodes()` and returns matching indexes.
fn run(query: &str) -> Vec<usize> {
	let set = FilterSet::parse(query);
	let items = nodes();
	items
		.iter()
		.enumerate()
		.filter(|(_, item)| set.matches(*item, DEFAULT_FIELDS))
		.map(|(idx, _)| idx)
		.collect()
}

#[test]
fn test_empty_query_matches_everything() {
	assert_eq!(run(""), vec![0, 1, 2]);
	assert_eq!(run("   "), vec![0, 1, 2]);
}

#[test]
fn test_evaluation_scenarios() {
	// (description, query, expected matching indexes)
	let scenarios: &[(&str, &str, &[usize])] = &[
		("free text substring", "web", &[0]),
		("free text against any default field", "alloc", &[1]),
		("multiple free text terms accumulate", "1 dep", &[0]),
		("negated free text", "!web", &[1, 2]),
		("attribute substring", "hostname:b1", &[0, 1]),
		("attribute exact", "hostname:=web1", &[0]),
		("attribute exact is case-insensitive", "hostname:=WEB1", &[0]),
		("negated attribute", "hostname:!web", &[1, 2]),
		("double negation cancels", "hostname:!!web", &[0]),
		("repeated key ORs values", "status:deployed status:allocated", &[0, 1]),
		("comma form ORs values", "status:deployed,allocated", &[0, 1]),
		("paren form ORs values", "status:(deployed,allocated)", &[0, 1]),
		("negated paren group", "tags:!(second)", &[2]),
		("all negated values must hold", "tags:(!first,!third)", &[2]),
		("positive and negated mix", "tags:(second,!third)", &[0]),
		("array field matches any element", "tags:third", &[1]),
		("keys are conjunctive", "status:deployed hostname:web", &[0]),
		("conjunction can exclude", "status:deployed hostname:db", &[]),
		("free text plus attribute", "web tags:first", &[0]),
		("numeric equality", "mem:32", &[1]),
		("numeric range is inclusive", "mem:4-16", &[0, 2]),
		("numeric range excludes outside", "mem:9-16", &[]),
		("unknown key never matches", "planet:earth", &[]),
		("negated unknown key holds vacuously", "planet:!earth", &[0, 1, 2]),
		("unsupported field value never matches", "tags:(first) mem:eight", &[]),
		("malformed parens are dropped", "hostname:(= web", &[0]),
		("dangling key is dropped", "hostname: web", &[0]),
	];
	for (description, query, expected) in scenarios {
		assert_eq!(&run(query), expected, "{description}: {query}");
	}
}

#[test]
fn test_status_query_structure() {
	let set = FilterSet::parse("status:deployed status:allocated hostname");
	let (key, values) = set.keys().next().unwrap();
	assert_eq!(key, "status");
	assert_eq!(
		values,
		&[FilterValue::new("deployed"), FilterValue::new("allocated")]
	);
	assert_eq!(set.free_text(), &[FilterValue::new("hostname")]);

	let deployed = json!({"status": "deployed", "hostname": "web1"});
	let fresh = json!({"status": "new", "hostname": "web1"});
	assert!(set.matches(&deployed, &["hostname"]));
	assert!(!set.matches(&fresh, &["hostname"]));
}

#[test]
fn test_token_level_negation() {
	let set = FilterSet::parse("!status:broken");
	assert!(!set.matches(&json!({"status": "broken"}), &[]));
	assert!(set.matches(&json!({"status": "ready"}), &[]));
}

#[test]
fn test_round_trip_law() {
	let queries = [
		"",
		"web",
		"!web db",
		"status:deployed",
		"status:(deployed,allocated)",
		"!status:broken",
		"status:!broken",
		"tags:(first,!third) hostname:=web1 free",
		"mem:4-16",
		"owner:admin owner:ops zone:!(default)",
	];
	for query in queries {
		let parsed = FilterSet::parse(query);
		let reparsed = FilterSet::parse(&parsed.serialize());
		assert_eq!(reparsed, parsed, "round trip failed for {query:?}");
	}
}

#[test]
fn test_serialize_skips_empty_keys() {
	let mut set = FilterSet::parse("status:new");
	set.toggle("status", "new", false);
	assert_eq!(set.serialize(), "");
	// A toggled-off key also disappears from the URL form.
	assert_eq!(set.to_query_string(), "?");
}

#[test]
fn test_toggle_and_is_active() {
	let mut set = FilterSet::new();
	set.toggle("status", "new", false);
	assert!(set.is_active("status", "new", false));
	assert!(set.is_active("status", "NEW", false));
	assert!(!set.is_active("status", "new", true));

	set.toggle("status", "deployed", false);
	assert_eq!(set.serialize(), "status:(new,deployed)");

	set.toggle("status", "New", false);
	assert_eq!(set.serialize(), "status:deployed");
	set.toggle("status", "deployed", false);
	assert!(set.is_empty());
}

#[test]
fn test_query_string_round_trip() {
	let set = FilterSet::parse("web db status:(deployed,!broken) zone:=default");
	let encoded = set.to_query_string();
	assert_eq!(encoded, "?q=web%2Cdb&status=deployed%2C%21broken&zone=%3Ddefault");
	assert_eq!(FilterSet::from_query_string(&encoded), set);
}

#[test]
fn test_query_string_ignores_empty_params() {
	let set = FilterSet::from_query_string("?status=&q=web");
	assert_eq!(set.serialize(), "web");
}
