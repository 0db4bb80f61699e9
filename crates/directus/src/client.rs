use async_trait::async_trait;
use portal_migrate_core::constants::SOURCE_ID_FIELD;
use portal_migrate_core::{CountFilter, DestinationApi, DestinationError, DestinationRecord, SourceIdPair, truncate};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api_types::{CountRow, DataEnvelope, ErrorsBody, IdRow};

/// Local Directus instance used when `DIRECTUS_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8055";

/// Client for the Directus items API, authenticated with a static token.
pub struct DirectusClient {
    pub(crate) client: reqwest::Client,
    pub(crate) token: String,
    pub(crate) base_url: String,
}

impl std::fmt::Debug for DirectusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectusClient")
            .field("client", &self.client)
            .field("token", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DirectusClient {
    /// Creates a new client with the given static token and base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(token: String, base_url: String) -> Result<Self, DestinationError> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| DestinationError::ClientInit(e.to_string()))?;
        Ok(Self { client, token, base_url })
    }

    fn items_url(&self, collection: &str) -> String {
        format!("{}/items/{}", self.base_url, collection)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, DestinationError> {
        let response = builder
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| DestinationError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| DestinationError::Transport(e.to_string()))?;
        if status.is_success() {
            return Ok(body);
        }
        Err(api_error(status.as_u16(), &body))
    }

    async fn fetch_data<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T, DestinationError> {
        let raw = self.send(builder).await?;
        serde_json::from_str::<DataEnvelope<T>>(&raw).map(|env| env.data).map_err(|e| {
            DestinationError::InvalidResponse(format!("{context}: {e} (body: {})", truncate(&raw, 200)))
        })
    }
}

/// Joins every `errors[].message`, falling back to the raw body.
fn api_error(status: u16, body: &str) -> DestinationError {
    let parsed: ErrorsBody = serde_json::from_str(body).unwrap_or_default();
    let messages: Vec<&str> =
        parsed.errors.iter().map(|e| e.message.as_str()).filter(|m| !m.is_empty()).collect();
    let message =
        if messages.is_empty() { truncate(body, 200).to_owned() } else { messages.join("; ") };
    DestinationError::Api { status, message }
}

fn count_filter_param(filter: &CountFilter) -> (String, String) {
    match filter {
        CountFilter::NotNull(field) => (format!("filter[{field}][_nnull]"), "true".to_owned()),
    }
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn id_to_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl DestinationApi for DirectusClient {
    async fn create_many(&self, collection: &str, records: &[DestinationRecord]) -> Result<(), DestinationError> {
        let builder = self.client.post(self.items_url(collection)).json(records);
        self.send(builder).await?;
        tracing::debug!(collection, records = records.len(), "created items");
        Ok(())
    }

    async fn count(&self, collection: &str, filter: Option<&CountFilter>) -> Result<u64, DestinationError> {
        let mut params = vec![("aggregate[count]".to_owned(), "*".to_owned())];
        params.extend(filter.map(count_filter_param));
        let builder = self.client.get(self.items_url(collection)).query(&params);

        let rows: Vec<CountRow> = self.fetch_data(builder, "count aggregate").await?;
        match rows.first() {
            None => Ok(0),
            Some(row) if row.count.is_null() => Ok(0),
            Some(row) => parse_count(&row.count).ok_or_else(|| {
                DestinationError::InvalidResponse(format!("count aggregate: unexpected value {}", row.count))
            }),
        }
    }

    async fn source_id_pairs(&self, collection: &str) -> Result<Vec<SourceIdPair>, DestinationError> {
        let fields = format!("id,{SOURCE_ID_FIELD}");
        let filter = format!("filter[{SOURCE_ID_FIELD}][_nnull]");
        let params = [("fields", fields.as_str()), ("limit", "-1"), (filter.as_str(), "true")];
        let builder = self.client.get(self.items_url(collection)).query(&params);

        let rows: Vec<IdRow> = self.fetch_data(builder, "source id listing").await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let destination_id = id_to_string(&row.id)?;
                row.source_id.map(|source_id| SourceIdPair { source_id, destination_id })
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), DestinationError> {
        let url = format!("{}/server/ping", self.base_url);
        self.send(self.client.get(url)).await.map(|_| ())
    }
}
