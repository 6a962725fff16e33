//! Precedence merge over JSON values.
//!
//! The settings sources hold untyped nested values; merging walks the closed
//! value-kind set explicitly instead of duck-typing:
//! - both sides objects: key-by-key union, higher-priority side wins on
//!   conflict, recursing where both sides are objects again;
//! - both sides arrays: concatenation, higher-priority elements first;
//! - anything else (scalars, null, mismatched kinds): the higher-priority
//!   value replaces the lower one outright.

use serde_json::Value;

/// Merge `higher` over `lower`, returning the combined value.
pub fn merge(higher: &Value, lower: &Value) -> Value {
	match (higher, lower) {
		(Value::Object(high), Value::Object(low)) => {
			let mut out = serde_json::Map::with_capacity(high.len() + low.len());
			for (key, low_value) in low {
				out.insert(key.clone(), low_value.clone());
			}
			for (key, high_value) in high {
				let merged = match out.get(key) {
					Some(low_value) => merge(high_value, low_value),
					None => high_value.clone(),
				};
				out.insert(key.clone(), merged);
			}
			Value::Object(out)
		}
		(Value::Array(high), Value::Array(low)) => {
			let mut out = Vec::with_capacity(high.len() + low.len());
			out.extend(high.iter().cloned());
			out.extend(low.iter().cloned());
			Value::Array(out)
		}
		(higher, _) => higher.clone(),
	}
}

/// Fold a list of values, highest priority first, into one merged value.
/// Returns `None` for an empty list.
pub fn merge_all<'a, I>(values: I) -> Option<Value>
where
	I: IntoIterator<Item = &'a Value>,
{
	let mut iter = values.into_iter();
	let first = iter.next()?.clone();
	Some(iter.fold(first, |acc, lower| merge(&acc, lower)))
}


// vim: ts=4
