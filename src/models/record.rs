use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One row from the upstream tabular store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// A single cell value. Upstream fields are duck-typed on the wire, so this
/// is an untagged enum; variant order matters because serde tries them
/// top-to-bottom (attachment arrays must win over generic lists).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Attachments(Vec<Attachment>),
    List(Vec<FieldValue>),
    Object(serde_json::Map<String, serde_json::Value>),
    Null,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_attachments(&self) -> Option<&[Attachment]> {
        match self {
            FieldValue::Attachments(items) => Some(items),
            _ => None,
        }
    }
}

/// Upstream attachment object. Only `url` is guaranteed; thumbnail variants
/// are present for image attachments on some tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Thumbnails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small: Option<Thumbnail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large: Option<Thumbnail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<Thumbnail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thumbnail {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserializes_text_and_number_fields() {
        let json = r#"{
            "id": "recAbc123XYZ",
            "fields": {
                "Name": "First Baptist",
                "Latitude": 35.2271,
                "Active": true
            }
        }"#;
        let record: Record = serde_json::from_str(json).expect("deserialize");
        assert_eq!(record.id, "recAbc123XYZ");
        assert_eq!(record.field("Name").unwrap().as_text(), Some("First Baptist"));
        assert_eq!(record.field("Latitude").unwrap().as_number(), Some(35.2271));
        assert_eq!(record.field("Active"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_attachment_array_wins_over_generic_list() {
        let json = r#"{
            "id": "rec000000",
            "fields": {
                "Photos": [
                    {"url": "https://cdn.example.com/a.jpg", "filename": "a.jpg"},
                    {"url": "https://cdn.example.com/b.jpg"}
                ]
            }
        }"#;
        let record: Record = serde_json::from_str(json).expect("deserialize");
        let photos = record.field("Photos").unwrap().as_attachments().unwrap();
        assert_eq!(photos.len(), 2);
        assert_eq!(photos[0].url, "https://cdn.example.com/a.jpg");
        assert_eq!(photos[0].filename.as_deref(), Some("a.jpg"));
    }

    #[test]
    fn test_string_list_deserializes_as_list() {
        let json = r#"{
            "id": "rec000000",
            "fields": {"Tags": ["youth", "music"]}
        }"#;
        let record: Record = serde_json::from_str(json).expect("deserialize");
        match record.field("Tags").unwrap() {
            FieldValue::List(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].as_text(), Some("youth"));
            }
            other => panic!("Expected List, got: {:?}", other),
        }
    }

    #[test]
    fn test_object_field_deserializes_as_object() {
        let json = r#"{
            "id": "rec000000",
            "fields": {"Contact": {"email": "pastor@example.org", "name": "Jo"}}
        }"#;
        let record: Record = serde_json::from_str(json).expect("deserialize");
        match record.field("Contact").unwrap() {
            FieldValue::Object(map) => {
                assert_eq!(map.get("email").unwrap(), "pastor@example.org");
            }
            other => panic!("Expected Object, got: {:?}", other),
        }
    }

    #[test]
    fn test_null_field_deserializes() {
        let json = r#"{"id": "rec000000", "fields": {"Notes": null}}"#;
        let record: Record = serde_json::from_str(json).expect("deserialize");
        assert_eq!(record.field("Notes"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_as_number_parses_text() {
        let value = FieldValue::Text(" 44.98 ".to_string());
        assert_eq!(value.as_number(), Some(44.98));
        assert_eq!(FieldValue::Text("n/a".to_string()).as_number(), None);
    }

    #[test]
    fn test_thumbnails_with_full_variant() {
        let json = r#"{
            "url": "https://cdn.example.com/x.jpg",
            "thumbnails": {"full": {"url": "https://cdn.example.com/x-full.jpg"}}
        }"#;
        let attachment: Attachment = serde_json::from_str(json).expect("deserialize");
        let thumbs = attachment.thumbnails.unwrap();
        assert_eq!(
            thumbs.full.unwrap().url,
            "https://cdn.example.com/x-full.jpg"
        );
        assert!(thumbs.small.is_none());
    }
}
