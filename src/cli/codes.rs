use super::ui;
use crate::core::code::CodeTarget;
use crate::core::config::TableColumns;
use crate::core::sync::collect_targets;
use crate::core::{RecordStore, SearchQuery};
use anyhow::Result;
use comfy_table::Cell;

pub fn codes_table(targets: &[CodeTarget]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Kind"),
        ui::header_cell("Exchange"),
    ]);

    for target in targets {
        table.add_row(vec![
            Cell::new(&target.code),
            Cell::new(target.kind().to_string()),
            ui::format_optional_cell(target.exchange.as_deref(), str::to_string),
        ]);
    }
    table.to_string()
}

pub async fn run(store: &dyn RecordStore, columns: &TableColumns) -> Result<()> {
    let query = SearchQuery {
        field_names: Some(
            std::iter::once(columns.code_field.clone())
                .chain(columns.exchange_field.clone())
                .collect(),
        ),
        ..SearchQuery::default()
    };
    let records = store.search_records(&query).await?;
    let targets = collect_targets(&records, columns);

    println!(
        "{}\n\n{}\n\n{}",
        ui::style_text("Tracked codes", ui::StyleType::Title),
        codes_table(&targets),
        ui::style_text(
            &format!(
                "{} unique codes across {} records",
                targets.len(),
                records.len()
            ),
            ui::StyleType::Subtle
        )
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_table_lists_kinds() {
        let targets = vec![
            CodeTarget::new("110003"),
            CodeTarget {
                code: "BABA".to_string(),
                exchange: Some("XNYS".to_string()),
            },
        ];

        let rendered = codes_table(&targets);
        assert!(rendered.contains("110003"));
        assert!(rendered.contains("Fund"));
        assert!(rendered.contains("BABA"));
        assert!(rendered.contains("Stock"));
        assert!(rendered.contains("XNYS"));
    }
}
