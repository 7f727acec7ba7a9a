use super::ui;
use crate::core::config::TableColumns;
use crate::core::sync::{self, CodeQuote, SyncEvent, SyncReport};
use crate::core::{PriceResolver, RecordStore};
use anyhow::Result;
use comfy_table::Cell;

impl SyncReport {
    pub fn display_as_table(&self) -> String {
        let mut output = format!(
            "{}\n\n",
            ui::style_text("Latest prices", ui::StyleType::Title)
        );
        output.push_str(&quotes_table(&self.quotes));

        let failed = self.failed();
        let total_style_type = if failed == 0 {
            ui::StyleType::TotalValue
        } else {
            ui::StyleType::Error
        };
        output.push_str(&format!(
            "\n\n{} {}",
            ui::style_text("Resolved:", ui::StyleType::TotalLabel),
            ui::style_text(
                &format!("{} of {} codes", self.succeeded(), self.quotes.len()),
                total_style_type
            )
        ));
        output
    }
}

/// Renders one row per code with its price or the reason it failed.
pub fn quotes_table(quotes: &[CodeQuote]) -> String {
    let mut table = ui::new_styled_table();

    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Kind"),
        ui::header_cell("Price"),
        ui::header_cell("Currency"),
        ui::header_cell("Source"),
        ui::header_cell("Status"),
    ]);

    for quote in quotes {
        let row = match &quote.result {
            Ok(q) => vec![
                Cell::new(&quote.target.code),
                Cell::new(quote.kind.to_string()),
                ui::format_optional_cell(Some(q.price), |p| p.to_string()),
                ui::format_optional_cell(q.currency.as_deref(), str::to_string),
                Cell::new(&q.source),
                Cell::new(
                    q.timestamp
                        .map_or("OK".to_string(), |t| format!("OK ({})", t.format("%Y-%m-%d"))),
                ),
            ],
            Err(e) => vec![
                Cell::new(&quote.target.code),
                Cell::new(quote.kind.to_string()),
                ui::na_cell(true),
                ui::na_cell(false),
                Cell::new(""),
                ui::error_cell(&format!("{}: {e}", e.kind())),
            ],
        };
        table.add_row(row);
    }

    table.to_string()
}

pub async fn run(
    store: &dyn RecordStore,
    resolver: &PriceResolver,
    columns: &TableColumns,
) -> Result<()> {
    let report = fetch_with_progress(store, resolver, columns).await?;

    if report.quotes.is_empty() {
        println!(
            "No codes found in column '{}' of {} records.",
            columns.code_field,
            report.records.len()
        );
        return Ok(());
    }

    println!("{}", report.display_as_table());
    Ok(())
}

/// Runs the sync while driving a progress bar sized once the codes are known.
pub async fn fetch_with_progress(
    store: &dyn RecordStore,
    resolver: &PriceResolver,
    columns: &TableColumns,
) -> Result<SyncReport> {
    let pb = ui::new_progress_bar(0, true);
    pb.set_message("Fetching prices...");

    let report = sync::run(store, resolver, columns, &|event| match event {
        SyncEvent::Collected { codes } => pb.set_length(codes as u64),
        SyncEvent::Resolved(quote) => {
            pb.set_message(quote.target.code.clone());
            pb.inc(1);
        }
    })
    .await;
    pb.finish_and_clear();

    Ok(report?)
}
