//! Writes resolved prices back into the table's price column.
use crate::core::config::TableColumns;
use crate::core::sync::{CodeQuote, code_cell};
use crate::core::table::{Fields, Record, RecordStore, RecordUpdate};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteBackSummary {
    pub updated: usize,
    pub failed: usize,
    /// Codes found in the table without a resolved price.
    pub skipped: Vec<String>,
}

/// Groups record ids by the first code of their code cell, keeping first-seen order.
pub fn group_by_code(records: &[Record], code_field: &str) -> Vec<(String, Vec<String>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for record in records {
        let Some(code) = code_cell(record, code_field).and_then(|c| c.codes().into_iter().next())
        else {
            continue;
        };
        match index.get(&code) {
            Some(&i) => groups[i].1.push(record.record_id.clone()),
            None => {
                index.insert(code.clone(), groups.len());
                groups.push((code, vec![record.record_id.clone()]));
            }
        }
    }
    groups
}

fn price_fields(price_field: &str, price: Decimal) -> Fields {
    let mut fields = Fields::new();
    let value = price
        .to_string()
        .parse::<serde_json::Number>()
        .map_or_else(|_| Value::String(price.to_string()), Value::Number);
    fields.insert(price_field.to_string(), value);
    fields
}

/// Writes each resolved price to every record holding that code.
///
/// Each code is written with one batch update. When the batch is rejected
/// the code's records are retried one at a time so a single bad record does
/// not block the rest.
pub async fn write_back(
    store: &dyn RecordStore,
    records: &[Record],
    quotes: &[CodeQuote],
    columns: &TableColumns,
) -> WriteBackSummary {
    let prices: HashMap<&str, Decimal> = quotes
        .iter()
        .filter_map(|q| {
            q.result
                .as_ref()
                .ok()
                .map(|quote| (q.target.code.as_str(), quote.price))
        })
        .collect();

    let mut summary = WriteBackSummary::default();

    for (code, record_ids) in group_by_code(records, &columns.code_field) {
        let Some(price) = prices.get(code.as_str()) else {
            debug!(%code, "No price for code, skipping");
            summary.skipped.push(code);
            continue;
        };
        let fields = price_fields(&columns.price_field, *price);

        let updates: Vec<RecordUpdate> = record_ids
            .iter()
            .map(|id| RecordUpdate {
                record_id: id.clone(),
                fields: fields.clone(),
            })
            .collect();

        match store.batch_update_records(updates).await {
            Ok(_) => {
                info!(%code, records = record_ids.len(), "Batch update succeeded");
                summary.updated += record_ids.len();
            }
            Err(e) => {
                warn!(%code, error = %e, "Batch update failed, updating records one by one");
                for id in &record_ids {
                    match store.update_record(id, fields.clone()).await {
                        Ok(_) => summary.updated += 1,
                        Err(e) => {
                            warn!(%code, record_id = %id, error = %e, "Record update failed");
                            summary.failed += 1;
                        }
                    }
                }
            }
        }
    }

    info!(
        updated = summary.updated,
        failed = summary.failed,
        skipped = summary.skipped.len(),
        "Write-back finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::code::{CodeKind, CodeTarget};
    use crate::core::price::QuoteError;
    use crate::core::price::test_support::quote;
    use crate::core::table::test_support::{MemoryStore, record};
    use serde_json::json;

    fn resolved(code: &str, price: Decimal) -> CodeQuote {
        CodeQuote {
            target: CodeTarget::new(code),
            kind: crate::core::classify(code),
            result: Ok(quote(code, price, "stub")),
        }
    }

    fn failed(code: &str) -> CodeQuote {
        CodeQuote {
            target: CodeTarget::new(code),
            kind: CodeKind::Stock,
            result: Err(QuoteError::network(code, "timeout")),
        }
    }

    fn table() -> Vec<Record> {
        vec![
            record("rec1", json!({"代号": [{"text": "AMZN"}]})),
            record("rec2", json!({"代号": [{"text": "110003"}]})),
            record("rec3", json!({"代号": [{"text": "AMZN"}, {"text": "META"}]})),
            record("rec4", json!({"代号": [{"text": "BIDU"}]})),
            record("rec5", json!({"备注": "no code"})),
        ]
    }

    #[test]
    fn test_group_by_first_code() {
        let groups = group_by_code(&table(), "代号");
        assert_eq!(
            groups,
            vec![
                ("AMZN".to_string(), vec!["rec1".to_string(), "rec3".to_string()]),
                ("110003".to_string(), vec!["rec2".to_string()]),
                ("BIDU".to_string(), vec!["rec4".to_string()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_write_back_batches_per_code() {
        let store = MemoryStore::with_records(table());
        let records = table();
        let quotes = vec![
            resolved("AMZN", Decimal::new(21637, 2)),
            resolved("110003", Decimal::new(20998, 4)),
            failed("BIDU"),
        ];

        let summary = write_back(&store, &records, &quotes, &TableColumns::default()).await;

        assert_eq!(summary.updated, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, vec!["BIDU".to_string()]);
        assert_eq!(*store.batch_calls.lock().unwrap(), 2);
        assert_eq!(*store.single_calls.lock().unwrap(), 0);

        let stored = store.records.lock().unwrap();
        assert_eq!(stored[0].fields["last_price"], json!(216.37));
        assert_eq!(stored[1].fields["last_price"], json!(2.0998));
        assert_eq!(stored[2].fields["last_price"], json!(216.37));
        assert!(stored[3].fields.get("last_price").is_none());
    }

    #[tokio::test]
    async fn test_write_back_falls_back_to_single_updates() {
        let store = MemoryStore {
            fail_batch_update: true,
            fail_record_ids: vec!["rec3".to_string()],
            ..MemoryStore::with_records(table())
        };
        let records = table();
        let quotes = vec![resolved("AMZN", Decimal::new(21637, 2))];

        let summary = write_back(&store, &records, &quotes, &TableColumns::default()).await;

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.skipped,
            vec!["110003".to_string(), "BIDU".to_string()]
        );
        assert_eq!(*store.batch_calls.lock().unwrap(), 1);
        assert_eq!(*store.single_calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_price_fields_uses_json_number() {
        let fields = price_fields("价格", Decimal::new(1622, 3));
        assert_eq!(fields["价格"], json!(1.622));
    }
}
