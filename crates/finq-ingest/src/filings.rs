//! Client for the filings search API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::IngestError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// One filing as returned by the search API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingRef {
    pub link_to_filing_details: String,
    pub filed_at: DateTime<Utc>,
    pub company_name: String,
}

#[derive(Debug, Deserialize)]
struct FilingsResponse {
    #[serde(default)]
    filings: Vec<FilingRef>,
}

pub struct FilingsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for FilingsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilingsClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

impl FilingsClient {
    #[must_use]
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.query(&[("token", key.as_str())]),
            None => request,
        }
    }

    /// Fetch the most recent filings for a ticker, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    pub async fn latest_filings(
        &self,
        ticker: &str,
        form_type: &str,
        size: usize,
    ) -> Result<Vec<FilingRef>, IngestError> {
        debug!(ticker = %ticker, form_type = %form_type, size, "fetching latest filings");
        let query = json!({
            "query": format!("ticker:{ticker} AND formType:\"{form_type}\""),
            "from": "0",
            "size": size.to_string(),
            "sort": [{ "filedAt": { "order": "desc" } }],
        });
        let response = self
            .authorize(self.client.post(&self.base_url))
            .json(&query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        let parsed: FilingsResponse = response.json().await?;
        Ok(parsed.filings)
    }

    /// Retrieve the rendered HTML of a filing.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or returns a non-success status.
    pub async fn fetch_filing(&self, url: &str) -> Result<String, IngestError> {
        let response = self.authorize(self.client.get(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.text().await?)
    }
}
