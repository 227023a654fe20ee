use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Full URL prefix of the upstream tabular API, including the base id.
    /// Table names are appended as path segments.
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,
    #[serde(default)]
    pub upstream_token: Option<String>,
    /// Optional named upstream view; when set it is passed on every page
    /// request so server-side filtering and ordering apply.
    #[serde(default)]
    pub upstream_view: Option<String>,
    /// Bearer token required on admin routes (regenerate, prewarm).
    /// Unset means admin routes are disabled.
    #[serde(default)]
    pub admin_token: Option<String>,

    #[serde(default = "default_churches_table")]
    pub churches_table: String,
    #[serde(default = "default_fetch_fields")]
    pub fetch_fields: Vec<String>,
    #[serde(default = "default_property_fields")]
    pub property_fields: Vec<String>,
    #[serde(default = "default_latitude_field")]
    pub latitude_field: String,
    #[serde(default = "default_longitude_field")]
    pub longitude_field: String,
    /// When set, the named field holds GeoJSON geometry text and is used
    /// instead of the latitude/longitude pair.
    #[serde(default)]
    pub geometry_field: Option<String>,
    #[serde(default = "default_denomination_field")]
    pub denomination_field: String,
    #[serde(default = "default_photo_field")]
    pub photo_field: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_pages")]
    pub default_max_pages: usize,
    #[serde(default = "default_min_pages_limit")]
    pub min_pages_limit: usize,
    #[serde(default = "default_max_pages_limit")]
    pub max_pages_limit: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_prewarm_max_pages")]
    pub prewarm_max_pages: usize,

    #[serde(default = "default_object_key")]
    pub object_key: String,
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    #[serde(default = "default_document_cache_seconds")]
    pub document_cache_seconds: u64,

    #[serde(default = "default_max_images_per_record")]
    pub max_images_per_record: usize,
    #[serde(default = "default_prewarm_fetch_concurrency")]
    pub prewarm_fetch_concurrency: usize,
    #[serde(default = "default_prewarm_record_concurrency")]
    pub prewarm_record_concurrency: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8643
}

fn default_upstream_base_url() -> String {
    "https://api.airtable.com/v0/appPlaceholder".to_string()
}

fn default_churches_table() -> String {
    "Churches".to_string()
}

fn default_fetch_fields() -> Vec<String> {
    [
        "Name",
        "Denomination",
        "Address",
        "City",
        "State",
        "Website",
        "Phone",
        "Email",
        "Description",
        "Latitude",
        "Longitude",
        "Photos",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_property_fields() -> Vec<String> {
    [
        "Name",
        "Denomination",
        "Address",
        "City",
        "State",
        "Website",
        "Phone",
        "Email",
        "Description",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_latitude_field() -> String {
    "Latitude".to_string()
}

fn default_longitude_field() -> String {
    "Longitude".to_string()
}

fn default_denomination_field() -> String {
    "Denomination".to_string()
}

fn default_photo_field() -> String {
    "Photos".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_max_pages() -> usize {
    10
}

fn default_min_pages_limit() -> usize {
    1
}

fn default_max_pages_limit() -> usize {
    20
}

fn default_max_iterations() -> usize {
    100
}

fn default_prewarm_max_pages() -> usize {
    50
}

fn default_object_key() -> String {
    "churches.geojson".to_string()
}

fn default_cache_prefix() -> String {
    "img-cache".to_string()
}

fn default_document_cache_seconds() -> u64 {
    300
}

fn default_max_images_per_record() -> usize {
    6
}

fn default_prewarm_fetch_concurrency() -> usize {
    4
}

fn default_prewarm_record_concurrency() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: None,
            upstream_base_url: default_upstream_base_url(),
            upstream_token: None,
            upstream_view: None,
            admin_token: None,
            churches_table: default_churches_table(),
            fetch_fields: default_fetch_fields(),
            property_fields: default_property_fields(),
            latitude_field: default_latitude_field(),
            longitude_field: default_longitude_field(),
            geometry_field: None,
            denomination_field: default_denomination_field(),
            photo_field: default_photo_field(),
            page_size: default_page_size(),
            default_max_pages: default_max_pages(),
            min_pages_limit: default_min_pages_limit(),
            max_pages_limit: default_max_pages_limit(),
            max_iterations: default_max_iterations(),
            prewarm_max_pages: default_prewarm_max_pages(),
            object_key: default_object_key(),
            cache_prefix: default_cache_prefix(),
            document_cache_seconds: default_document_cache_seconds(),
            max_images_per_record: default_max_images_per_record(),
            prewarm_fetch_concurrency: default_prewarm_fetch_concurrency(),
            prewarm_record_concurrency: default_prewarm_record_concurrency(),
        }
    }
}

impl AppConfig {
    /// Clamp a caller-supplied page budget into the configured range.
    pub fn clamp_max_pages(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_pages)
            .clamp(self.min_pages_limit, self.max_pages_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8643);
        assert!(config.data_dir.is_none());
        assert_eq!(config.page_size, 100);
        assert_eq!(config.default_max_pages, 10);
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.object_key, "churches.geojson");
        assert_eq!(config.max_images_per_record, 6);
        assert_eq!(config.prewarm_fetch_concurrency, 4);
        assert_eq!(config.prewarm_record_concurrency, 10);
        assert!(config.admin_token.is_none());
        assert!(config.geometry_field.is_none());
    }

    #[test]
    fn test_app_config_partial_deserialization() {
        let json = r#"{"port": 9000, "churches_table": "Congregations"}"#;
        let config: AppConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.host, "127.0.0.1"); // default
        assert_eq!(config.port, 9000); // overridden
        assert_eq!(config.churches_table, "Congregations"); // overridden
        assert_eq!(config.page_size, 100); // default
    }

    #[test]
    fn test_app_config_empty_object_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config.object_key, "churches.geojson");
        assert_eq!(config.cache_prefix, "img-cache");
        assert_eq!(config.document_cache_seconds, 300);
    }

    #[test]
    fn test_clamp_max_pages_default() {
        let config = AppConfig::default();
        assert_eq!(config.clamp_max_pages(None), 10);
    }

    #[test]
    fn test_clamp_max_pages_bounds() {
        let config = AppConfig::default();
        assert_eq!(config.clamp_max_pages(Some(0)), 1);
        assert_eq!(config.clamp_max_pages(Some(5)), 5);
        assert_eq!(config.clamp_max_pages(Some(500)), 20);
    }

    #[test]
    fn test_app_config_serde_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: AppConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.port, config.port);
        assert_eq!(parsed.fetch_fields, config.fetch_fields);
        assert_eq!(parsed.property_fields, config.property_fields);
    }
}
