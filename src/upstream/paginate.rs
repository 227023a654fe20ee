use anyhow::Result;

use crate::models::Record;
use crate::upstream::TableClient;

/// Result of one bounded fetch invocation.
#[derive(Debug, Clone)]
pub struct PageBatch {
    pub records: Vec<Record>,
    /// `None` only when the upstream has genuinely exhausted all pages.
    pub next_cursor: Option<String>,
    pub pages_used: usize,
}

/// Fetch up to `max_pages` pages starting at `cursor`, accumulating records.
///
/// Any page failure aborts the whole call; partially accumulated records are
/// discarded and the caller's original cursor stays valid for retry.
pub async fn fetch_pages(
    client: &dyn TableClient,
    table: &str,
    fields: &[String],
    page_size: usize,
    cursor: Option<String>,
    max_pages: usize,
) -> Result<PageBatch> {
    let mut records = Vec::new();
    let mut next_cursor = cursor;
    let mut pages_used = 0;

    loop {
        let page = client
            .fetch_page(table, fields, page_size, next_cursor.as_deref())
            .await?;
        records.extend(page.records);
        pages_used += 1;
        next_cursor = page.offset;

        if next_cursor.is_none() || pages_used >= max_pages {
            break;
        }
    }

    Ok(PageBatch {
        records,
        next_cursor,
        pages_used,
    })
}
