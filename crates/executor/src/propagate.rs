//! Applies a `propagate_from` descriptor: extracts a JSON-pointer-like
//! path (e.g. `results[*].title`) out of a predecessor's output and
//! writes it into a named parameter slot.

use serde_json::Value;

/// Supports two shapes: `field[*].subfield` (map over an array field,
/// collecting `subfield` from each element) and a plain dotted path.
pub fn extract(output: &Value, source_path: &str) -> Option<Value> {
    if let Some(star_idx) = source_path.find("[*].") {
        let array_field = &source_path[..star_idx];
        let sub_field = &source_path[star_idx + "[*].".len()..];
        let array = output.get(array_field)?.as_array()?;
        let values: Vec<Value> = array.iter().filter_map(|item| item.get(sub_field).cloned()).collect();
        return Some(Value::Array(values));
    }

    let mut current = output;
    for segment in source_path.split('.') {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_array_field_projection() {
        let output = serde_json::json!({
            "results": [{"title": "a", "rating": 4}, {"title": "b", "rating": 2}]
        });
        let extracted = extract(&output, "results[*].rating").unwrap();
        assert_eq!(extracted, serde_json::json!([4, 2]));
    }

    #[test]
    fn extracts_plain_dotted_path() {
        let output = serde_json::json!({"summary": {"count": 3}});
        let extracted = extract(&output, "summary.count").unwrap();
        assert_eq!(extracted, serde_json::json!(3));
    }

    #[test]
    fn empty_array_projects_to_empty_array() {
        let output = serde_json::json!({"results": []});
        assert_eq!(extract(&output, "results[*].rating").unwrap(), serde_json::json!([]));
    }

    #[test]
    fn missing_dotted_path_returns_none() {
        let output = serde_json::json!({"results": []});
        assert!(extract(&output, "nope.nope").is_none());
    }
}
