//! Content normalization
//!
//! Host applications describe list items as loosely-shaped JSON objects whose
//! key names vary between integrations (`contentId`, `content_id`, `_id`, ...).
//! [`ContentKeys`] collapses them into a single [`Content`] value once, at the
//! boundary, so the trackers only ever compare normalized identities.

use crate::error::TrackerError;
use crate::types::{Content, VisibleContent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys consulted, in order, for the position hint of a visible item
const POSITION_KEYS: [&str; 2] = ["indexPath", "index_path"];

/// Ordered key chains used to read content fields out of host dictionaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentKeys {
    pub name_keys: Vec<String>,
    pub content_id_keys: Vec<String>,
    pub insertion_id_keys: Vec<String>,
}

impl Default for ContentKeys {
    fn default() -> Self {
        Self {
            name_keys: vec!["name".to_string()],
            content_id_keys: vec![
                "content_id".to_string(),
                "contentId".to_string(),
                "_id".to_string(),
            ],
            insertion_id_keys: vec!["insertion_id".to_string(), "insertionId".to_string()],
        }
    }
}

impl ContentKeys {
    /// Build a [`Content`] from a host dictionary.
    pub fn content_from_value(&self, value: &Value) -> Result<Content, TrackerError> {
        let object = as_object(value)?;
        Ok(self.content_from_object(object))
    }

    /// Build a [`VisibleContent`] from a host dictionary, reading the
    /// optional index path alongside the content fields.
    pub fn visible_from_value(&self, value: &Value) -> Result<VisibleContent, TrackerError> {
        let object = as_object(value)?;
        let content = self.content_from_object(object);
        let position = POSITION_KEYS
            .iter()
            .find_map(|key| object.get(*key))
            .and_then(index_path);
        Ok(VisibleContent { content, position })
    }

    /// Normalize a whole snapshot. Entries that are not objects are skipped.
    pub fn visible_list(&self, values: &[Value]) -> Vec<VisibleContent> {
        values
            .iter()
            .filter_map(|value| match self.visible_from_value(value) {
                Ok(visible) => Some(visible),
                Err(e) => {
                    log::debug!("skipping visible item: {}", e);
                    None
                }
            })
            .collect()
    }

    fn content_from_object(&self, object: &Map<String, Value>) -> Content {
        Content {
            content_id: first_string(object, &self.content_id_keys),
            insertion_id: first_string(object, &self.insertion_id_keys),
            name: first_string(object, &self.name_keys),
        }
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, TrackerError> {
    value
        .as_object()
        .ok_or_else(|| TrackerError::InvalidContent(format!("expected JSON object, got {value}")))
}

/// First key of the chain holding a usable scalar. Numbers are stringified;
/// empty strings count as absent.
fn first_string(object: &Map<String, Value>, keys: &[String]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn index_path(value: &Value) -> Option<Vec<u32>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|n| u32::try_from(n).ok()))
            .collect(),
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).map(|n| vec![n]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_chain_order() {
        let keys = ContentKeys::default();
        let content = keys
            .content_from_value(&json!({
                "_id": "fallback",
                "contentId": "camel",
                "insertionId": "ins-9",
                "name": "Blue Shoes"
            }))
            .unwrap();

        assert_eq!(content.content_id.as_deref(), Some("camel"));
        assert_eq!(content.insertion_id.as_deref(), Some("ins-9"));
        assert_eq!(content.name.as_deref(), Some("Blue Shoes"));
    }

    #[test]
    fn test_numeric_ids_are_stringified() {
        let keys = ContentKeys::default();
        let content = keys.content_from_value(&json!({ "_id": 42 })).unwrap();
        assert_eq!(content.content_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_empty_string_falls_through() {
        let keys = ContentKeys::default();
        let content = keys
            .content_from_value(&json!({ "content_id": "", "_id": "real" }))
            .unwrap();
        assert_eq!(content.content_id.as_deref(), Some("real"));
    }

    #[test]
    fn test_custom_keys() {
        let keys = ContentKeys {
            content_id_keys: vec!["listingId".to_string()],
            ..Default::default()
        };
        let content = keys
            .content_from_value(&json!({ "listingId": "L-1", "contentId": "ignored" }))
            .unwrap();
        assert_eq!(content.content_id.as_deref(), Some("L-1"));
    }

    #[test]
    fn test_visible_position() {
        let keys = ContentKeys::default();
        let visible = keys
            .visible_from_value(&json!({ "contentId": "a", "indexPath": [0, 3] }))
            .unwrap();
        assert_eq!(visible.position, Some(vec![0, 3]));

        let visible = keys
            .visible_from_value(&json!({ "contentId": "a", "index_path": 7 }))
            .unwrap();
        assert_eq!(visible.position, Some(vec![7]));
    }

    #[test]
    fn test_non_object_is_rejected() {
        let keys = ContentKeys::default();
        assert!(keys.content_from_value(&json!("just a string")).is_err());

        let list = keys.visible_list(&[json!({ "contentId": "a" }), json!(3), json!(null)]);
        assert_eq!(list.len(), 1);
    }
}
