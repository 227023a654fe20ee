// parishmap serve: run the HTTP server in the foreground

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::images::HttpImageFetcher;
use crate::models::AppConfig;
use crate::server::{create_router, AppState};
use crate::storage::FsBlobStore;
use crate::upstream::HttpTableClient;

/// Load configuration from an optional JSON file, falling back to defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: AppConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Resolve the data directory: explicit setting first, then the platform
/// data dir, then the current directory.
pub fn resolve_data_dir(configured: Option<&Path>) -> PathBuf {
    match configured {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parishmap"),
    }
}

/// parishmap serve
pub async fn cmd_serve(
    host: &str,
    config: Option<&str>,
    port_override: Option<u16>,
    data_dir: Option<&str>,
) -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .try_init();

    let mut config = load_config(config.map(Path::new))?;
    // CLI flags win over the file: use global --host only when it differs
    // from the default.
    if host != "127.0.0.1" {
        config.host = host.to_string();
    }
    if let Some(port) = port_override {
        config.port = port;
    }
    if let Some(dir) = data_dir {
        config.data_dir = Some(PathBuf::from(dir));
    }

    let data_dir = resolve_data_dir(config.data_dir.as_deref());

    if config.admin_token.is_none() {
        tracing::warn!("No admin token configured; regenerate and prewarm routes are disabled");
    }

    let config = Arc::new(config);
    let store = Arc::new(FsBlobStore::new(data_dir.clone()).await?);
    let tables = Arc::new(HttpTableClient::new(
        config.upstream_base_url.clone(),
        config.upstream_token.clone(),
        config.upstream_view.clone(),
    ));
    let images = Arc::new(HttpImageFetcher::new());

    let state = Arc::new(AppState::new(store, tables, images, config.clone()));
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Serving on http://{}", addr);
    tracing::info!("Data directory: {}", data_dir.display());
    tracing::info!("Published document: /{}", config.object_key);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config.port, 8643);
        assert_eq!(config.churches_table, "Churches");
        assert_eq!(config.object_key, "churches.geojson");
    }

    #[test]
    fn test_load_config_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"port": 9100, "admin_token": "s3cret", "churches_table": "Parishes"}}"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.churches_table, "Parishes");
        // Unset fields fall back to defaults.
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let result = load_config(Some(Path::new("/nonexistent/config.json")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_json_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not valid").unwrap();
        let result = load_config(Some(file.path()));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_data_dir_explicit() {
        assert_eq!(
            resolve_data_dir(Some(Path::new("/var/parishmap"))),
            PathBuf::from("/var/parishmap")
        );
    }

    #[test]
    fn test_resolve_data_dir_default_ends_with_app_name() {
        let dir = resolve_data_dir(None);
        assert!(dir.ends_with("parishmap"));
    }
}
