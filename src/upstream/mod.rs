pub mod http;
pub mod paginate;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::Record;

pub use http::HttpTableClient;
pub use paginate::{fetch_pages, PageBatch};

/// One page from the upstream tabular API. `offset` is the opaque
/// continuation token; absent means the table is exhausted.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub offset: Option<String>,
}

/// Read access to the upstream tabular store.
#[async_trait]
pub trait TableClient: Send + Sync {
    async fn fetch_page(
        &self,
        table: &str,
        fields: &[String],
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page>;

    /// Fetch a single record by id. `Ok(None)` when the record is absent.
    async fn fetch_record(&self, table: &str, record_id: &str) -> Result<Option<Record>>;
}
