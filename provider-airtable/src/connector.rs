//! Airtable API connector implementation
//!
//! Implements the `RemoteClient` trait for the Airtable REST API.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use remote_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use remote_traits::{FieldMap, RemoteClient, RemoteError, RemoteFieldSchema, RemoteRecord, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::types::{ApiRecord, ListRecordsResponse, TablesResponse};

/// Airtable API base URL
const AIRTABLE_API_BASE: &str = "https://api.airtable.com/v0";

/// Maximum results per page (Airtable API limit)
const MAX_PAGE_SIZE: u32 = 100;

/// Request timeout for API calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Airtable API connector
///
/// One connector wraps one base under one personal access token. The engine
/// constructs a connector per tenant from the tenant's stored credentials.
///
/// # Features
///
/// - Paginated record listing with last-modified-time filtering
/// - Partial field updates via PATCH
/// - Table schema discovery via the base metadata API
/// - Retry with exponential backoff delegated to the `HttpClient`
pub struct AirtableConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Personal access token
    api_token: String,

    /// Base identifier ("app...")
    base_id: String,
}

impl AirtableConnector {
    /// Create a new Airtable connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `api_token` - personal access token with data and schema read scopes
    /// * `base_id` - the base this connector is scoped to
    pub fn new(http_client: Arc<dyn HttpClient>, api_token: String, base_id: String) -> Self {
        Self {
            http_client,
            api_token,
            base_id,
        }
    }

    /// Build the change filter formula for a cursor timestamp.
    ///
    /// Strictly greater than, so records modified exactly at the cursor are
    /// not re-fetched.
    fn change_filter(since: DateTime<Utc>) -> String {
        format!(
            "LAST_MODIFIED_TIME() > '{}'",
            since.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }

    /// Parse RFC 3339 timestamp to Unix timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).timestamp())
    }

    /// Convert an API record to the provider-agnostic shape
    fn convert_record(api_record: ApiRecord) -> RemoteRecord {
        RemoteRecord {
            id: api_record.id,
            fields: api_record.fields,
            created_time: api_record
                .created_time
                .as_deref()
                .and_then(Self::parse_timestamp),
        }
    }

    /// Execute a GET request and decode the JSON body
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(&self.api_token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "Airtable API request failed");
            return Err(RemoteError::from_status(response.status, response.text()));
        }

        response.json()
    }
}

#[async_trait]
impl RemoteClient for AirtableConnector {
    #[instrument(skip(self), fields(base_id = %self.base_id))]
    async fn list_changed(
        &self,
        table_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteRecord>> {
        info!(table_id, has_cursor = since.is_some(), "Listing changed records");

        let mut query = format!("pageSize={}", MAX_PAGE_SIZE);
        if let Some(cursor) = since {
            query.push_str(&format!(
                "&filterByFormula={}",
                urlencoding::encode(&Self::change_filter(cursor))
            ));
        }

        let base_url = format!("{}/{}/{}", AIRTABLE_API_BASE, self.base_id, table_id);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut url = format!("{}?{}", base_url, query);
            if let Some(ref token) = offset {
                url.push_str(&format!("&offset={}", urlencoding::encode(token)));
            }

            let page: ListRecordsResponse = self.get_json(url).await?;
            debug!(page_size = page.records.len(), "Fetched record page");

            records.extend(page.records.into_iter().map(Self::convert_record));

            match page.offset {
                Some(token) => offset = Some(token),
                None => break,
            }
        }

        info!(count = records.len(), "Changed record listing complete");
        Ok(records)
    }

    #[instrument(skip(self, fields), fields(base_id = %self.base_id))]
    async fn update_fields(
        &self,
        table_id: &str,
        record_id: &str,
        fields: &FieldMap,
    ) -> Result<()> {
        debug!(table_id, record_id, "Updating record fields");

        let url = format!(
            "{}/{}/{}/{}",
            AIRTABLE_API_BASE, self.base_id, table_id, record_id
        );

        let body = serde_json::json!({ "fields": fields });
        let request = HttpRequest::new(HttpMethod::Patch, url)
            .bearer_token(&self.api_token)
            .json(&body)?
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?;

        if response.status == 404 {
            return Err(RemoteError::RecordNotFound {
                table_id: table_id.to_string(),
                record_id: record_id.to_string(),
            });
        }
        if !response.is_success() {
            warn!(status = response.status, record_id, "Record update failed");
            return Err(RemoteError::from_status(response.status, response.text()));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(base_id = %self.base_id))]
    async fn fetch_schema(&self, table_id: &str) -> Result<Vec<RemoteFieldSchema>> {
        info!(table_id, "Fetching table schema");

        let url = format!("{}/meta/bases/{}/tables", AIRTABLE_API_BASE, self.base_id);
        let response: TablesResponse = self.get_json(url).await?;

        let table = response
            .tables
            .into_iter()
            .find(|t| t.id == table_id || t.name == table_id)
            .ok_or_else(|| {
                RemoteError::Validation(format!("table {} not present in base schema", table_id))
            })?;

        Ok(table
            .fields
            .into_iter()
            .map(|f| RemoteFieldSchema {
                id: f.id,
                name: f.name,
                field_type: f.field_type,
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
