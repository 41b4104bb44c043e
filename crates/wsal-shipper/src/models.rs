//! Rows read from the WSAL tables and the flattened export items built from them

use serde::Serialize;
use serde_json::{Map, Value};

/// One row of `<prefix>wsal_occurrences`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EventRecord {
    pub id: i64,
    /// Unix epoch seconds with a fractional part, as WSAL stores it
    pub created_on: f64,
    pub alert_id: i64,
}

impl EventRecord {
    pub fn new(id: i64, created_on: f64, alert_id: i64) -> Self {
        Self {
            id,
            created_on,
            alert_id,
        }
    }
}

/// One row of `<prefix>wsal_metadata`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MetadataRecord {
    /// Id of the owning [`EventRecord`]
    pub occurrence_id: i64,
    pub name: String,
    pub value: Option<String>,
}

impl MetadataRecord {
    pub fn new(occurrence_id: i64, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            occurrence_id,
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// A single event flattened together with all of its metadata.
///
/// Keys keep insertion order: `id`, `created_on`, `alert_id`, then metadata names
/// in fetch order. A later metadata entry with an existing name replaces the value
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExportItem(Map<String, Value>);

impl ExportItem {
    /// Start an item from the event's base fields
    pub fn from_event(event: &EventRecord) -> Self {
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::from(event.id));
        fields.insert("created_on".to_string(), Value::from(event.created_on));
        fields.insert("alert_id".to_string(), Value::from(event.alert_id));
        Self(fields)
    }

    /// Set a metadata field, overwriting any previous value under `name`
    pub fn insert(&mut self, name: &str, value: Option<&str>) {
        let value = value.map_or(Value::Null, Value::from);
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_serializes_as_flat_object_in_insertion_order() {
        let mut item = ExportItem::from_event(&EventRecord::new(11, 1700000000.25, 1000));
        item.insert("UserAgent", Some("curl/8.0"));
        item.insert("ClientIP", Some("1.2.3.4"));

        let text = serde_json::to_string(&item).unwrap();
        assert_eq!(
            text,
            r#"{"id":11,"created_on":1700000000.25,"alert_id":1000,"UserAgent":"curl/8.0","ClientIP":"1.2.3.4"}"#
        );
    }

    #[test]
    fn test_null_metadata_value_serializes_as_null() {
        let mut item = ExportItem::from_event(&EventRecord::new(1, 0.0, 2));
        item.insert("PostTitle", None);
        assert_eq!(item.get("PostTitle"), Some(&json!(null)));
    }

    #[test]
    fn test_insert_overwrites_existing_name() {
        let mut item = ExportItem::from_event(&EventRecord::new(1, 0.0, 2));
        item.insert("IP", Some("1.1.1.1"));
        item.insert("IP", Some("2.2.2.2"));
        assert_eq!(item.len(), 4);
        assert_eq!(item.get("IP"), Some(&json!("2.2.2.2")));
    }
}
