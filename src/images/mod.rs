use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::convert::resolve_attachment_urls;
use crate::errors::ParishError;
use crate::models::{AppConfig, Record};
use crate::storage::BlobStore;

/// Raw image bytes plus the content type reported by the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedImage {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Outbound image fetch seam, so tests never hit the network.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ParishError::Upstream {
                table: "attachment".to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response.bytes().await?.to_vec();
        Ok(FetchedImage { body, content_type })
    }
}

/// Cache key for one attachment slot: `{prefix}/{recordId}/{index}`.
pub fn cache_key(prefix: &str, record_id: &str, index: usize) -> String {
    format!("{}/{}/{}", prefix, record_id, index)
}

/// Record ids on proxy paths must look like upstream ids before any
/// outbound call is made: "rec" followed by at least 5 alphanumerics.
pub fn is_valid_record_id(id: &str) -> bool {
    id.len() >= 8
        && id.len() <= 32
        && id.starts_with("rec")
        && id[3..].chars().all(|c| c.is_ascii_alphanumeric())
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PrewarmSummary {
    pub warmed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PrewarmSummary {
    fn merge(mut self, other: PrewarmSummary) -> Self {
        self.warmed += other.warmed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self
    }
}

/// Best-effort population of the image cache for a batch of records.
///
/// Up to `prewarm_record_concurrency` records are in flight at once, each
/// fetching at most `max_images_per_record` attachments with
/// `prewarm_fetch_concurrency` concurrent requests. With `flush` false,
/// already-cached keys are skipped. Per-item failures are logged and
/// swallowed; one bad attachment never aborts the batch.
pub async fn prewarm(
    store: Arc<dyn BlobStore>,
    fetcher: Arc<dyn ImageFetcher>,
    config: Arc<AppConfig>,
    records: &[Record],
    flush: bool,
) -> PrewarmSummary {
    let summary = stream::iter(records.iter().cloned())
        .map(|record| {
            let store = store.clone();
            let fetcher = fetcher.clone();
            let config = config.clone();
            async move { prewarm_record(store, fetcher, config, record, flush).await }
        })
        .buffer_unordered(config.prewarm_record_concurrency)
        .fold(PrewarmSummary::default(), |acc, item| async move {
            acc.merge(item)
        })
        .await;

    tracing::info!(
        "Prewarm finished: {} warmed, {} skipped, {} failed",
        summary.warmed,
        summary.skipped,
        summary.failed
    );
    summary
}

async fn prewarm_record(
    store: Arc<dyn BlobStore>,
    fetcher: Arc<dyn ImageFetcher>,
    config: Arc<AppConfig>,
    record: Record,
    flush: bool,
) -> PrewarmSummary {
    let Some(field) = record.field(&config.photo_field) else {
        return PrewarmSummary::default();
    };
    let urls = resolve_attachment_urls(field, config.max_images_per_record);
    if urls.is_empty() {
        return PrewarmSummary::default();
    }

    stream::iter(urls.into_iter().enumerate())
        .map(|(index, url)| {
            let store = store.clone();
            let fetcher = fetcher.clone();
            let key = cache_key(&config.cache_prefix, &record.id, index);
            async move { warm_one(store, fetcher, key, url, flush).await }
        })
        .buffer_unordered(config.prewarm_fetch_concurrency)
        .fold(PrewarmSummary::default(), |acc, item| async move {
            acc.merge(item)
        })
        .await
}

async fn warm_one(
    store: Arc<dyn BlobStore>,
    fetcher: Arc<dyn ImageFetcher>,
    key: String,
    url: String,
    flush: bool,
) -> PrewarmSummary {
    if !flush {
        match store.head(&key).await {
            Ok(Some(_)) => {
                return PrewarmSummary {
                    skipped: 1,
                    ..Default::default()
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Prewarm head failed for '{}': {}", key, e);
            }
        }
    }

    let image = match fetcher.fetch(&url).await {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!("Prewarm fetch failed for '{}': {}", key, e);
            return PrewarmSummary {
                failed: 1,
                ..Default::default()
            };
        }
    };

    match store.put(&key, image.body, &image.content_type).await {
        Ok(()) => PrewarmSummary {
            warmed: 1,
            ..Default::default()
        },
        Err(e) => {
            tracing::warn!("Prewarm cache write failed for '{}': {}", key, e);
            PrewarmSummary {
                failed: 1,
                ..Default::default()
            }
        }
    }
}
