use async_trait::async_trait;
use gloo_net::http::Request;

use crate::virtual_list::{LoadError, PageRequest, RecordPage, RecordSource};

/// Transactions API base URL
pub const TRANSACTIONS_API_BASE: &str = "/api/v1";

/// Persistence context used when a list is not scoped to an account
pub const DEFAULT_LIST_CONTEXT: &str = "transactions";

/// Record source backed by the transactions page endpoint.
///
/// Pages are requested with `POST {base}/accounts/{account}/transactions/page`
/// and a JSON `PageRequest` body. Without an account the list spans all
/// accounts and uses `POST {base}/transactions/page`.
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    base_url: String,
    account_id: String,
}

impl HttpRecordSource {
    pub fn new(account_id: &str) -> Self {
        Self::with_base_url(TRANSACTIONS_API_BASE, account_id)
    }

    pub fn with_base_url(base_url: &str, account_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: account_id.trim().to_string(),
        }
    }

    /// Key under which this account's scroll position is persisted
    pub fn list_context(&self) -> String {
        if self.account_id.is_empty() {
            DEFAULT_LIST_CONTEXT.to_string()
        } else {
            format!("{}:{}", DEFAULT_LIST_CONTEXT, self.account_id)
        }
    }

    pub fn page_url(&self) -> String {
        if self.account_id.is_empty() {
            return format!("{}/transactions/page", self.base_url);
        }
        format!(
            "{}/accounts/{}/transactions/page",
            self.base_url,
            urlencoding::encode(&self.account_id)
        )
    }
}

#[async_trait(?Send)]
impl RecordSource for HttpRecordSource {
    async fn fetch_page(&self, request: PageRequest) -> Result<RecordPage, LoadError> {
        let url = self.page_url();
        log::debug!(
            "Fetching page from {} (cursor: {:?}, size: {})",
            url,
            request.cursor,
            request.page_size
        );

        let response = Request::post(&url)
            .json(&request)
            .map_err(|e| LoadError::Decode(format!("Failed to encode page request: {}", e)))?
            .send()
            .await
            .map_err(|e| LoadError::Network(format!("Page request failed: {}", e)))?;

        if !response.ok() {
            return Err(LoadError::Http {
                status: response.status(),
                message: response.status_text(),
            });
        }

        response
            .json::<RecordPage>()
            .await
            .map_err(|e| LoadError::Decode(format!("Failed to parse page: {}", e)))
    }
}
