//! Query-parameter comparison that treats JSON values structurally

use serde_json::Value;

/// Compare two query-parameter lists positionally
///
/// Names must be identical. Values that both decode as JSON are compared as
/// decoded structures, so `{"a":1,"b":2}` equals `{"b": 2, "a": 1}`. If
/// either side is not JSON the raw strings are compared instead.
#[must_use]
pub fn json_query_eq(a: &[(String, String)], b: &[(String, String)]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter()
        .zip(b)
        .all(|((name_a, value_a), (name_b, value_b))| {
            name_a == name_b && json_value_eq(value_a, value_b)
        })
}

fn json_value_eq(a: &str, b: &str) -> bool {
    match (
        serde_json::from_str::<Value>(a),
        serde_json::from_str::<Value>(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
