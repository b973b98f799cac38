//! Pull the first business record out of a Yelp AI chat response.

use serde_json::Value;

/// First element of the first `entities[*].businesses` list that is a non-empty array.
/// Missing or non-array `entities`/`businesses` are skipped.
pub fn first_business(doc: &Value) -> Option<&Value> {
    doc.get("entities")?
        .as_array()?
        .iter()
        .filter_map(|entity| entity.get("businesses").and_then(Value::as_array))
        .find_map(|businesses| businesses.first())
}
