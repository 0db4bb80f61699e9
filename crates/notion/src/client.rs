use async_trait::async_trait;
use portal_migrate_core::{PageRequest, QueryPage, SourceApi, SourceError, SourceErrorCode, truncate};

use crate::api_types::{ErrorBody, QueryBody};

/// Public Notion API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.notion.com";
/// API version pinned in every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Client for the Notion database query API.
pub struct NotionClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("client", &self.client)
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl NotionClient {
    /// Creates a new client with the given integration token and base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(api_key: String, base_url: String) -> Result<Self, SourceError> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| SourceError::ClientInit(e.to_string()))?;
        Ok(Self { client, api_key, base_url })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, SourceError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SourceError::Transport(e.to_string()))?;
        if status.is_success() {
            return Ok(body);
        }
        Err(api_error(status.as_u16(), &body))
    }
}

/// Maps a non-2xx response to a typed error, falling back to the HTTP status
/// when the body carries no `code`.
fn api_error(status: u16, body: &str) -> SourceError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = if parsed.code.is_empty() {
        match status {
            401 => SourceErrorCode::Unauthorized,
            403 => SourceErrorCode::RestrictedResource,
            404 => SourceErrorCode::ObjectNotFound,
            429 => SourceErrorCode::RateLimited,
            _ => SourceErrorCode::Other(format!("http_{status}")),
        }
    } else {
        SourceErrorCode::from_code(&parsed.code)
    };
    let message = if parsed.message.is_empty() { truncate(body, 200).to_owned() } else { parsed.message };
    SourceError::Api { status, code, message }
}

#[async_trait]
impl SourceApi for NotionClient {
    async fn query(&self, collection_id: &str, request: &PageRequest) -> Result<QueryPage, SourceError> {
        let body = QueryBody { page_size: request.page_size, start_cursor: request.cursor.as_deref() };
        let url = format!("{}/v1/databases/{}/query", self.base_url, collection_id);
        let raw = self.send(self.client.post(url).json(&body)).await?;

        let page: QueryPage = serde_json::from_str(&raw).map_err(|e| {
            SourceError::InvalidResponse(format!("database query: {e} (body: {})", truncate(&raw, 200)))
        })?;
        tracing::debug!(
            database = collection_id,
            results = page.results.len(),
            has_more = page.has_more,
            "fetched source page"
        );
        Ok(page)
    }

    async fn ping(&self) -> Result<(), SourceError> {
        let url = format!("{}/v1/users/me", self.base_url);
        self.send(self.client.get(url)).await.map(|_| ())
    }
}
