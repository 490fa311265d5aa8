//! Terminal rendering for normalised tables.
//!
//! Repeated groups print as a grid; the document-level form prints as a
//! vertical card, one field per line.

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use arrow::util::pretty::pretty_format_batches;
use welldoc_core::SegmentSummary;

const LABEL_WIDTH: usize = 26;

/// Print a table as a bordered grid.
pub fn print_table(title: &str, batch: &RecordBatch) -> anyhow::Result<()> {
    println!("=== {title} ({} rows) ===", batch.num_rows());
    if batch.num_columns() == 0 {
        println!("(no columns)");
        return Ok(());
    }
    println!("{}", pretty_format_batches(std::slice::from_ref(batch))?);
    println!();
    Ok(())
}

/// Print a single-row batch as a card, skipping absent fields.
pub fn print_card(title: &str, batch: &RecordBatch) -> anyhow::Result<()> {
    println!("=== {title} ===");
    for line in card_lines(batch)? {
        println!("{line}");
    }
    println!();
    Ok(())
}

pub fn print_summary(document: &str, summary: &SegmentSummary) -> anyhow::Result<()> {
    println!("{document}");
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

fn card_lines(batch: &RecordBatch) -> anyhow::Result<Vec<String>> {
    if batch.num_rows() == 0 {
        return Ok(Vec::new());
    }
    let options = FormatOptions::default();
    let schema = batch.schema();
    let mut lines = Vec::new();
    for (field, col) in schema.fields().iter().zip(batch.columns()) {
        if col.is_null(0) {
            continue;
        }
        let formatter = ArrayFormatter::try_new(col.as_ref(), &options)?;
        lines.push(format!(
            "  {:<width$} {}",
            field.name(),
            formatter.value(0),
            width = LABEL_WIDTH
        ));
    }
    Ok(lines)
}
