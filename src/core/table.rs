//! Record store abstraction over a remote table

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Record {
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecordUpdate {
    pub record_id: String,
    pub fields: Fields,
}

/// Optional narrowing of a record search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_names: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Failed to list records: {0}")]
    Fetch(String),

    #[error("{operation} failed (code {code}): {message}")]
    Write {
        operation: &'static str,
        code: i64,
        message: String,
    },
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns every matching record, across all pages, in provider order.
    async fn search_records(&self, query: &SearchQuery) -> Result<Vec<Record>, TableError>;

    async fn add_record(&self, fields: Fields) -> Result<Record, TableError>;

    async fn batch_add_records(&self, rows: Vec<Fields>) -> Result<Vec<Record>, TableError>;

    async fn update_record(&self, record_id: &str, fields: Fields) -> Result<Record, TableError>;

    async fn batch_update_records(
        &self,
        updates: Vec<RecordUpdate>,
    ) -> Result<Vec<Record>, TableError>;

    async fn delete_record(&self, record_id: &str) -> Result<(), TableError>;
}
