//! Feishu Bitable client
//!
//! Authenticates once with the app credentials and exposes record CRUD over a
//! single `{app_token, table_id}` pair. Every response carries a `code` field
//! that is `0` on success.
use crate::core::config::BitableConfig;
use crate::core::table::{Fields, Record, RecordStore, RecordUpdate, SearchQuery, TableError};
use crate::providers::util::http_client;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, instrument};

pub struct BitableClient {
    client: Client,
    base_url: String,
    app_token: String,
    table_id: String,
    page_size: u32,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    tenant_access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Option<Vec<Record>>,
    #[serde(default)]
    has_more: bool,
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordData {
    record: Record,
}

#[derive(Debug, Deserialize)]
struct RecordsData {
    #[serde(default)]
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct DeleteData {
    deleted: bool,
}

/// Failure reported by the API, before it is mapped onto a `TableError`.
#[derive(Debug)]
struct ApiFailure {
    code: i64,
    message: String,
}

impl ApiFailure {
    fn transport(message: impl Into<String>) -> Self {
        ApiFailure {
            code: -1,
            message: message.into(),
        }
    }

    fn hint(&self) -> Option<&'static str> {
        match self.code {
            91403 => Some("permission denied, check the app's table permissions"),
            19021 => Some("access token expired or invalid"),
            404 => Some("record does not exist or table id is wrong"),
            _ => None,
        }
    }

    fn into_write(self, operation: &'static str) -> TableError {
        let message = match self.hint() {
            Some(hint) => format!("{} ({hint})", self.message),
            None => self.message,
        };
        TableError::Write {
            operation,
            code: self.code,
            message,
        }
    }
}

impl Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

impl BitableClient {
    /// Builds the client and exchanges the app credentials for an access token.
    pub async fn connect(config: &BitableConfig, timeout: Duration) -> Result<Self, TableError> {
        let client = http_client(timeout)
            .map_err(|e| TableError::Auth(format!("failed to build HTTP client: {e}")))?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let access_token = Self::authenticate(&client, &base_url, config).await?;

        Ok(BitableClient {
            client,
            base_url,
            app_token: config.app_token.clone(),
            table_id: config.table_id.clone(),
            page_size: config.page_size.max(1),
            access_token,
        })
    }

    #[instrument(name = "BitableAuth", skip(client, config), fields(app_id = %config.app_id))]
    async fn authenticate(
        client: &Client,
        base_url: &str,
        config: &BitableConfig,
    ) -> Result<String, TableError> {
        let url = format!("{base_url}/auth/v3/tenant_access_token/internal/");
        debug!("Requesting tenant access token from {}", url);

        let response = client
            .post(&url)
            .json(&json!({
                "app_id": config.app_id,
                "app_secret": config.app_secret,
            }))
            .send()
            .await
            .map_err(|e| TableError::Auth(format!("request error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TableError::Auth(format!("HTTP error: {status}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| TableError::Auth(format!("failed to parse token response: {e}")))?;

        if token.code != 0 {
            return Err(TableError::Auth(format!("code {}: {}", token.code, token.msg)));
        }
        token
            .tenant_access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TableError::Auth("response carries no tenant_access_token".to_string()))
    }

    fn records_url(&self, suffix: &str) -> String {
        let base = format!(
            "{}/bitable/v1/apps/{}/tables/{}/records",
            self.base_url, self.app_token, self.table_id
        );
        if suffix.is_empty() {
            base
        } else {
            format!("{base}/{suffix}")
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access_token)
    }

    async fn call<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiFailure> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiFailure::transport(format!("request error: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiFailure::transport(format!("failed to read response body: {e}")))?;

        let envelope: Envelope = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ApiFailure {
                    code: i64::from(status.as_u16()),
                    message: format!("HTTP error: {status}"),
                });
            }
            Err(e) => return Err(ApiFailure::transport(format!("failed to parse response: {e}"))),
        };

        if envelope.code != 0 {
            return Err(ApiFailure {
                code: envelope.code,
                message: envelope.msg,
            });
        }
        if !status.is_success() {
            return Err(ApiFailure {
                code: i64::from(status.as_u16()),
                message: format!("HTTP error: {status}"),
            });
        }

        serde_json::from_value(envelope.data.unwrap_or(Value::Null))
            .map_err(|e| ApiFailure::transport(format!("unexpected response data: {e}")))
    }
}

#[async_trait]
impl RecordStore for BitableClient {
    #[instrument(name = "BitableSearch", skip(self, query), fields(table = %self.table_id))]
    async fn search_records(&self, query: &SearchQuery) -> Result<Vec<Record>, TableError> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        let mut requested = HashSet::new();
        let mut pages = 0;

        loop {
            let mut params = vec![("page_size", self.page_size.to_string())];
            if let Some(token) = &page_token {
                params.push(("page_token", token.clone()));
            }
            let url = Url::parse_with_params(&self.records_url("search"), &params)
                .map_err(|e| TableError::Fetch(format!("invalid search URL: {e}")))?;

            let page: SearchPage = Self::call(self.authorized(self.client.post(url).json(query)))
                .await
                .map_err(|e| TableError::Fetch(format!("page {}: {e}", pages + 1)))?;
            pages += 1;
            records.extend(page.items.unwrap_or_default());

            if !page.has_more {
                break;
            }
            let Some(next) = page.page_token.filter(|t| !t.is_empty()) else {
                return Err(TableError::Fetch(format!(
                    "page {pages}: has_more set without page_token"
                )));
            };
            if !requested.insert(next.clone()) {
                return Err(TableError::Fetch(format!(
                    "page token {next} was returned twice"
                )));
            }
            page_token = Some(next);
        }

        debug!(pages, records = records.len(), "Fetched all record pages");
        Ok(records)
    }

    async fn add_record(&self, fields: Fields) -> Result<Record, TableError> {
        let request = self
            .client
            .post(self.records_url(""))
            .json(&json!({ "fields": fields }));
        let data: RecordData = Self::call(self.authorized(request))
            .await
            .map_err(|e| e.into_write("add_record"))?;
        Ok(data.record)
    }

    async fn batch_add_records(&self, rows: Vec<Fields>) -> Result<Vec<Record>, TableError> {
        let records: Vec<Value> = rows
            .into_iter()
            .map(|fields| json!({ "fields": fields }))
            .collect();
        let request = self
            .client
            .post(self.records_url("batch_create"))
            .json(&json!({ "records": records }));
        let data: RecordsData = Self::call(self.authorized(request))
            .await
            .map_err(|e| e.into_write("batch_add_records"))?;
        Ok(data.records)
    }

    #[instrument(name = "BitableUpdate", skip(self, fields))]
    async fn update_record(&self, record_id: &str, fields: Fields) -> Result<Record, TableError> {
        let request = self
            .client
            .put(self.records_url(record_id))
            .json(&json!({ "fields": fields }));
        let data: RecordData = Self::call(self.authorized(request))
            .await
            .map_err(|e| e.into_write("update_record"))?;
        Ok(data.record)
    }

    async fn batch_update_records(
        &self,
        updates: Vec<RecordUpdate>,
    ) -> Result<Vec<Record>, TableError> {
        debug!("Batch updating {} records", updates.len());
        let request = self
            .client
            .post(self.records_url("batch_update"))
            .json(&json!({ "records": updates }));
        let data: RecordsData = Self::call(self.authorized(request))
            .await
            .map_err(|e| e.into_write("batch_update_records"))?;
        Ok(data.records)
    }

    async fn delete_record(&self, record_id: &str) -> Result<(), TableError> {
        let request = self.client.delete(self.records_url(record_id));
        let data: DeleteData = Self::call(self.authorized(request))
            .await
            .map_err(|e| e.into_write("delete_record"))?;
        if !data.deleted {
            return Err(TableError::Write {
                operation: "delete_record",
                code: 0,
                message: format!("record {record_id} was not deleted"),
            });
        }
        Ok(())
    }
}
