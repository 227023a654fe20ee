use anyhow::Result;
use async_trait::async_trait;

use crate::errors::ParishError;
use crate::models::Record;
use crate::upstream::{Page, TableClient};

/// `TableClient` over the real upstream REST API.
pub struct HttpTableClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    view: Option<String>,
}

impl HttpTableClient {
    pub fn new(base_url: String, token: Option<String>, view: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            view,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl TableClient for HttpTableClient {
    async fn fetch_page(
        &self,
        table: &str,
        fields: &[String],
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page> {
        let mut query: Vec<(String, String)> = fields
            .iter()
            .map(|f| ("fields[]".to_string(), f.clone()))
            .collect();
        query.push(("pageSize".to_string(), page_size.to_string()));
        if let Some(view) = &self.view {
            query.push(("view".to_string(), view.clone()));
        }
        if let Some(offset) = cursor {
            query.push(("offset".to_string(), offset.to_string()));
        }

        let request = self.client.get(self.table_url(table)).query(&query);
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ParishError::Upstream {
                table: table.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        let page = response.json::<Page>().await?;
        Ok(page)
    }

    async fn fetch_record(&self, table: &str, record_id: &str) -> Result<Option<Record>> {
        let url = format!("{}/{}", self.table_url(table), record_id);
        let request = self.client.get(url);
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ParishError::Upstream {
                table: table.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        let record = response.json::<Record>().await?;
        Ok(Some(record))
    }
}
