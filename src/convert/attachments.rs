use crate::models::{Attachment, FieldValue};

/// Resolve a heterogeneous attachment field into a flat, deduplicated list
/// of canonical URLs, capped at `max`.
///
/// Accepted shapes: a bare URL string, an attachment-object array (preferring
/// the full/large thumbnail over the original), nested lists, a
/// JSON-encoded string holding any of the above, and loose objects with a
/// `url` member.
pub fn resolve_attachment_urls(value: &FieldValue, max: usize) -> Vec<String> {
    let mut urls = Vec::new();
    collect_urls(value, &mut urls);

    let mut unique = Vec::new();
    for url in urls {
        if unique.len() == max {
            break;
        }
        if !unique.contains(&url) {
            unique.push(url);
        }
    }
    unique
}

fn collect_urls(value: &FieldValue, urls: &mut Vec<String>) {
    match value {
        FieldValue::Attachments(items) => {
            for attachment in items {
                urls.push(canonical_url(attachment));
            }
        }
        FieldValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') || trimmed.starts_with('{') {
                // Some tables store attachments as JSON-encoded text.
                if let Ok(parsed) = serde_json::from_str::<FieldValue>(trimmed) {
                    collect_urls(&parsed, urls);
                }
            } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                urls.push(trimmed.to_string());
            }
        }
        FieldValue::List(items) => {
            for item in items {
                collect_urls(item, urls);
            }
        }
        FieldValue::Object(map) => {
            if let Some(serde_json::Value::String(url)) = map.get("url") {
                urls.push(url.clone());
            }
        }
        FieldValue::Number(_) | FieldValue::Bool(_) | FieldValue::Null => {}
    }
}

/// Prefer the largest edge-generated rendition over the original upload.
fn canonical_url(attachment: &Attachment) -> String {
    if let Some(thumbs) = &attachment.thumbnails {
        if let Some(full) = &thumbs.full {
            return full.url.clone();
        }
        if let Some(large) = &thumbs.large {
            return large.url.clone();
        }
    }
    attachment.url.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(json: serde_json::Value) -> FieldValue {
        serde_json::from_value(json).expect("field value")
    }

    #[test]
    fn test_attachment_array_resolves_urls() {
        let value = field(serde_json::json!([
            {"url": "https://cdn.example.com/a.jpg"},
            {"url": "https://cdn.example.com/b.jpg"}
        ]));
        assert_eq!(
            resolve_attachment_urls(&value, 6),
            vec![
                "https://cdn.example.com/a.jpg".to_string(),
                "https://cdn.example.com/b.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_full_thumbnail_preferred_over_original() {
        let value = field(serde_json::json!([{
            "url": "https://cdn.example.com/orig.jpg",
            "thumbnails": {
                "large": {"url": "https://cdn.example.com/large.jpg"},
                "full": {"url": "https://cdn.example.com/full.jpg"}
            }
        }]));
        assert_eq!(
            resolve_attachment_urls(&value, 6),
            vec!["https://cdn.example.com/full.jpg".to_string()]
        );
    }

    #[test]
    fn test_bare_url_string_resolves() {
        let value = FieldValue::Text("https://cdn.example.com/single.jpg".to_string());
        assert_eq!(
            resolve_attachment_urls(&value, 6),
            vec!["https://cdn.example.com/single.jpg".to_string()]
        );
    }

    #[test]
    fn test_json_encoded_string_resolves() {
        let value = FieldValue::Text(
            r#"[{"url": "https://cdn.example.com/enc.jpg"}]"#.to_string(),
        );
        assert_eq!(
            resolve_attachment_urls(&value, 6),
            vec!["https://cdn.example.com/enc.jpg".to_string()]
        );
    }

    #[test]
    fn test_nested_lists_flatten() {
        let value = field(serde_json::json!([
            ["https://cdn.example.com/n1.jpg"],
            "https://cdn.example.com/n2.jpg"
        ]));
        assert_eq!(
            resolve_attachment_urls(&value, 6),
            vec![
                "https://cdn.example.com/n1.jpg".to_string(),
                "https://cdn.example.com/n2.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_duplicates_removed_and_capped() {
        let value = field(serde_json::json!([
            {"url": "https://cdn.example.com/a.jpg"},
            {"url": "https://cdn.example.com/a.jpg"},
            {"url": "https://cdn.example.com/b.jpg"},
            {"url": "https://cdn.example.com/c.jpg"}
        ]));
        assert_eq!(
            resolve_attachment_urls(&value, 2),
            vec![
                "https://cdn.example.com/a.jpg".to_string(),
                "https://cdn.example.com/b.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_non_url_text_yields_nothing() {
        let value = FieldValue::Text("no attachments here".to_string());
        assert!(resolve_attachment_urls(&value, 6).is_empty());
    }

    #[test]
    fn test_zero_cap_yields_nothing() {
        let value = field(serde_json::json!([
            {"url": "https://cdn.example.com/a.jpg"}
        ]));
        assert!(resolve_attachment_urls(&value, 0).is_empty());
    }
}
