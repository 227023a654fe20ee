pub mod attachments;

use serde_json::{Map, Value};

use crate::models::{AppConfig, Feature, FieldValue, Geometry, Record};

pub use attachments::resolve_attachment_urls;

/// Collapse an arbitrarily shaped field value into a single display string.
///
/// Nested lists are flattened, repeated scalars deduplicated (first
/// occurrence wins), object-shaped values contribute their preferred display
/// field, and multi-valued results are joined with ", ". Returns `None` when
/// nothing printable remains.
pub fn normalize_value(value: &FieldValue) -> Option<String> {
    let mut parts = Vec::new();
    collect_parts(value, &mut parts);

    let mut unique = Vec::new();
    for part in parts {
        if !unique.contains(&part) {
            unique.push(part);
        }
    }
    if unique.is_empty() {
        None
    } else {
        Some(unique.join(", "))
    }
}

fn collect_parts(value: &FieldValue, parts: &mut Vec<String>) {
    match value {
        FieldValue::Text(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
        FieldValue::Number(n) => {
            if n.is_finite() {
                parts.push(format_number(*n));
            }
        }
        FieldValue::Bool(b) => parts.push(b.to_string()),
        FieldValue::List(items) => {
            for item in items {
                collect_parts(item, parts);
            }
        }
        FieldValue::Object(map) => {
            if let Some(display) = object_display_field(map) {
                parts.push(display);
            }
        }
        // Attachments are resolved separately; they carry no display text.
        FieldValue::Attachments(_) | FieldValue::Null => {}
    }
}

/// Preferred display field for object-shaped values, in priority order.
fn object_display_field(map: &Map<String, Value>) -> Option<String> {
    for key in ["email", "name", "text", "value"] {
        match map.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return Some(s.trim().to_string());
            }
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Drop a trailing parenthetical annotation:
/// "Baptist (Southern Convention)" becomes "Baptist".
pub fn strip_parenthetical(value: &str) -> String {
    match value.find('(') {
        Some(idx) => value[..idx].trim().to_string(),
        None => value.trim().to_string(),
    }
}

/// Property-bag key for an upstream field name ("Denomination" -> "denomination").
fn property_key(field_name: &str) -> String {
    field_name.trim().to_lowercase().replace(' ', "_")
}

/// Convert one upstream record into a map feature.
///
/// Records without a usable geometry (non-finite or missing coordinates, or
/// unparseable geometry text on geometry-bearing tables) yield `None`; they
/// are excluded from the output, not treated as errors.
pub fn record_to_feature(record: &Record, config: &AppConfig) -> Option<Feature> {
    let geometry = extract_geometry(record, config)?;

    let mut properties = Map::new();
    properties.insert("id".to_string(), Value::from(record.id.clone()));

    for field_name in &config.property_fields {
        let Some(value) = record.field(field_name) else {
            continue;
        };
        let Some(mut normalized) = normalize_value(value) else {
            continue;
        };
        if field_name == &config.denomination_field {
            normalized = strip_parenthetical(&normalized);
        }
        if !normalized.is_empty() {
            properties.insert(property_key(field_name), Value::from(normalized));
        }
    }

    let photo_count = record
        .field(&config.photo_field)
        .map(|value| resolve_attachment_urls(value, config.max_images_per_record).len())
        .unwrap_or(0);
    properties.insert("photo_count".to_string(), Value::from(photo_count));

    Some(Feature::new(geometry, properties))
}

fn extract_geometry(record: &Record, config: &AppConfig) -> Option<Geometry> {
    if let Some(field_name) = &config.geometry_field {
        let text = record.field(field_name)?.as_text()?;
        return serde_json::from_str::<Geometry>(text).ok();
    }

    let latitude = record.field(&config.latitude_field)?.as_number()?;
    let longitude = record.field(&config.longitude_field)?.as_number()?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    Some(Geometry::Point {
        coordinates: [longitude, latitude],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_from_json(json: serde_json::Value) -> Record {
        serde_json::from_value(json).expect("record")
    }

    // -----------------------------------------------------------------------
    // normalize_value
    // -----------------------------------------------------------------------

    #[test]
    fn test_normalize_plain_string_is_idempotent() {
        let value = FieldValue::Text("A, B".to_string());
        assert_eq!(normalize_value(&value), Some("A, B".to_string()));
    }

    #[test]
    fn test_normalize_list_dedupes_and_joins() {
        let value = FieldValue::List(vec![
            FieldValue::Text("A".to_string()),
            FieldValue::Text("A".to_string()),
            FieldValue::Text("B".to_string()),
        ]);
        assert_eq!(normalize_value(&value), Some("A, B".to_string()));
    }

    #[test]
    fn test_normalize_object_prefers_email_then_name() {
        let with_name: FieldValue =
            serde_json::from_value(serde_json::json!({"name": "X"})).unwrap();
        assert_eq!(normalize_value(&with_name), Some("X".to_string()));

        let with_both: FieldValue =
            serde_json::from_value(serde_json::json!({"name": "X", "email": "x@example.org"}))
                .unwrap();
        assert_eq!(normalize_value(&with_both), Some("x@example.org".to_string()));
    }

    #[test]
    fn test_normalize_nested_lists_flatten() {
        let value = FieldValue::List(vec![
            FieldValue::List(vec![FieldValue::Text("inner".to_string())]),
            FieldValue::Text("outer".to_string()),
        ]);
        assert_eq!(normalize_value(&value), Some("inner, outer".to_string()));
    }

    #[test]
    fn test_normalize_empty_and_null_yield_none() {
        assert_eq!(normalize_value(&FieldValue::Null), None);
        assert_eq!(normalize_value(&FieldValue::Text("  ".to_string())), None);
        assert_eq!(normalize_value(&FieldValue::List(Vec::new())), None);
    }

    #[test]
    fn test_normalize_whole_numbers_drop_decimal_point() {
        assert_eq!(
            normalize_value(&FieldValue::Number(120.0)),
            Some("120".to_string())
        );
        assert_eq!(
            normalize_value(&FieldValue::Number(3.5)),
            Some("3.5".to_string())
        );
    }

    // -----------------------------------------------------------------------
    // strip_parenthetical
    // -----------------------------------------------------------------------

    #[test]
    fn test_strip_parenthetical_removes_annotation() {
        assert_eq!(strip_parenthetical("Baptist (Southern Convention)"), "Baptist");
        assert_eq!(strip_parenthetical("Baptist"), "Baptist");
        assert_eq!(strip_parenthetical("Lutheran (ELCA) "), "Lutheran");
    }

    // -----------------------------------------------------------------------
    // record_to_feature
    // -----------------------------------------------------------------------

    #[test]
    fn test_record_with_coordinates_converts() {
        let config = AppConfig::default();
        let record = record_from_json(serde_json::json!({
            "id": "recValid01",
            "fields": {
                "Name": "Grace Chapel",
                "Denomination": "Baptist (Southern Convention)",
                "Latitude": 44.97,
                "Longitude": -93.26
            }
        }));
        let feature = record_to_feature(&record, &config).expect("feature");
        assert_eq!(
            feature.geometry,
            Geometry::Point {
                coordinates: [-93.26, 44.97]
            }
        );
        assert_eq!(feature.properties["id"], "recValid01");
        assert_eq!(feature.properties["name"], "Grace Chapel");
        assert_eq!(feature.properties["denomination"], "Baptist");
        assert_eq!(feature.properties["photo_count"], 0);
    }

    #[test]
    fn test_record_without_coordinates_is_dropped() {
        let config = AppConfig::default();
        let record = record_from_json(serde_json::json!({
            "id": "recNoGeo01",
            "fields": {"Name": "Nowhere Fellowship"}
        }));
        assert!(record_to_feature(&record, &config).is_none());
    }

    #[test]
    fn test_record_with_non_numeric_coordinates_is_dropped() {
        let config = AppConfig::default();
        let record = record_from_json(serde_json::json!({
            "id": "recBadGeo1",
            "fields": {
                "Name": "Bad Geo",
                "Latitude": "unknown",
                "Longitude": -93.26
            }
        }));
        assert!(record_to_feature(&record, &config).is_none());
    }

    #[test]
    fn test_geometry_field_table_parses_polygon() {
        let mut config = AppConfig::default();
        config.geometry_field = Some("Boundary".to_string());
        let record = record_from_json(serde_json::json!({
            "id": "recRegion1",
            "fields": {
                "Name": "North District",
                "Boundary": "{\"type\":\"Polygon\",\"coordinates\":[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]]}"
            }
        }));
        let feature = record_to_feature(&record, &config).expect("feature");
        assert!(matches!(feature.geometry, Geometry::Polygon { .. }));
    }

    #[test]
    fn test_geometry_field_table_drops_unparseable_text() {
        let mut config = AppConfig::default();
        config.geometry_field = Some("Boundary".to_string());
        let record = record_from_json(serde_json::json!({
            "id": "recRegion2",
            "fields": {"Name": "Broken", "Boundary": "not geojson"}
        }));
        assert!(record_to_feature(&record, &config).is_none());
    }

    #[test]
    fn test_photo_count_reflects_attachments() {
        let config = AppConfig::default();
        let record = record_from_json(serde_json::json!({
            "id": "recPhotos1",
            "fields": {
                "Latitude": 10.0,
                "Longitude": 10.0,
                "Photos": [
                    {"url": "https://cdn.example.com/1.jpg"},
                    {"url": "https://cdn.example.com/2.jpg"}
                ]
            }
        }));
        let feature = record_to_feature(&record, &config).expect("feature");
        assert_eq!(feature.properties["photo_count"], 2);
    }

    #[test]
    fn test_text_coordinates_are_accepted() {
        let config = AppConfig::default();
        let record = record_from_json(serde_json::json!({
            "id": "recTextGeo",
            "fields": {"Latitude": "44.5", "Longitude": "-93.1"}
        }));
        let feature = record_to_feature(&record, &config).expect("feature");
        assert_eq!(
            feature.geometry,
            Geometry::Point {
                coordinates: [-93.1, 44.5]
            }
        );
    }
}
