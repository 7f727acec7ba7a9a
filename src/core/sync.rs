//! Pulls codes out of the table and resolves a price for each of them.
use crate::core::code::{CodeCell, CodeKind, CodeTarget};
use crate::core::config::TableColumns;
use crate::core::price::{PriceResolver, Quote, QuoteError};
use crate::core::table::{Record, RecordStore, SearchQuery, TableError};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome of resolving a single code.
#[derive(Debug, Clone)]
pub struct CodeQuote {
    pub target: CodeTarget,
    pub kind: CodeKind,
    pub result: Result<Quote, QuoteError>,
}

/// Progress notifications emitted while a sync runs.
#[derive(Debug)]
pub enum SyncEvent<'a> {
    Collected { codes: usize },
    Resolved(&'a CodeQuote),
}

#[derive(Debug)]
pub struct SyncReport {
    pub records: Vec<Record>,
    pub quotes: Vec<CodeQuote>,
}

impl SyncReport {
    pub fn succeeded(&self) -> usize {
        self.quotes.iter().filter(|q| q.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.quotes.len() - self.succeeded()
    }
}

/// Reads the code cell of a record, logging cells with an unsupported shape.
pub fn code_cell(record: &Record, code_field: &str) -> Option<CodeCell> {
    let value = record.field(code_field)?;
    let cell = CodeCell::from_value(value);
    if cell.is_none() {
        warn!(
            record_id = %record.record_id,
            field = code_field,
            value = %value,
            "Skipping code cell with unsupported shape"
        );
    }
    cell
}

fn exchange_of(record: &Record, exchange_field: Option<&str>) -> Option<String> {
    let value = record.field(exchange_field?)?;
    CodeCell::from_value(value).and_then(|cell| cell.codes().into_iter().next())
}

/// Collects the unique codes across all records, in order of first appearance.
pub fn collect_targets(records: &[Record], columns: &TableColumns) -> Vec<CodeTarget> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for record in records {
        let Some(cell) = code_cell(record, &columns.code_field) else {
            continue;
        };
        let exchange = exchange_of(record, columns.exchange_field.as_deref());
        for code in cell.codes() {
            if seen.insert(code.clone()) {
                targets.push(CodeTarget {
                    code,
                    exchange: exchange.clone(),
                });
            }
        }
    }

    debug!(
        records = records.len(),
        codes = targets.len(),
        "Collected unique codes"
    );
    targets
}

/// Resolves every target one after another. A failed code never stops the
/// remaining ones; its error is kept in the returned list.
pub async fn resolve_all(
    targets: &[CodeTarget],
    resolver: &PriceResolver,
    on_event: &(dyn Fn(SyncEvent<'_>) + Send + Sync),
) -> Vec<CodeQuote> {
    let mut quotes = Vec::with_capacity(targets.len());
    for target in targets {
        let result = resolver.resolve(target).await;
        match &result {
            Ok(quote) => debug!(code = %target.code, price = %quote.price, source = %quote.source, "Resolved"),
            Err(e) => warn!(code = %target.code, error = %e, "Failed to resolve price"),
        }
        let quote = CodeQuote {
            target: target.clone(),
            kind: target.kind(),
            result,
        };
        on_event(SyncEvent::Resolved(&quote));
        quotes.push(quote);
    }
    quotes
}

/// Lists the table and resolves a price for every unique code in it.
///
/// Only listing failures are returned as errors.
pub async fn run(
    store: &dyn RecordStore,
    resolver: &PriceResolver,
    columns: &TableColumns,
    on_event: &(dyn Fn(SyncEvent<'_>) + Send + Sync),
) -> Result<SyncReport, TableError> {
    let records = store.search_records(&SearchQuery::default()).await?;
    info!("Found {} records", records.len());

    let targets = collect_targets(&records, columns);
    on_event(SyncEvent::Collected {
        codes: targets.len(),
    });
    let quotes = resolve_all(&targets, resolver, on_event).await;

    Ok(SyncReport { records, quotes })
}
