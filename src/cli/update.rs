use super::{prices, ui};
use crate::core::config::TableColumns;
use crate::core::writeback::{WriteBackSummary, write_back};
use crate::core::{PriceResolver, RecordStore};
use anyhow::Result;

impl WriteBackSummary {
    pub fn display(&self, price_field: &str) -> String {
        let updated = ui::style_text(
            &format!("{} records", self.updated),
            ui::StyleType::TotalValue,
        );
        let mut output = format!(
            "{} {updated}",
            ui::style_text(
                &format!("Updated '{price_field}':"),
                ui::StyleType::TotalLabel
            )
        );
        if self.failed > 0 {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("Failed: {} records", self.failed),
                    ui::StyleType::Error
                )
            ));
        }
        if !self.skipped.is_empty() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("Skipped (no price): {}", self.skipped.join(", ")),
                    ui::StyleType::Subtle
                )
            ));
        }
        output
    }
}

pub async fn run(
    store: &dyn RecordStore,
    resolver: &PriceResolver,
    columns: &TableColumns,
) -> Result<()> {
    let report = prices::fetch_with_progress(store, resolver, columns).await?;
    println!("{}\n", report.display_as_table());

    let summary = write_back(store, &report.records, &report.quotes, columns).await;
    println!("{}", summary.display(&columns.price_field));
    Ok(())
}
