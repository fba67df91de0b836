//! Result rendering for the CLI: table, JSON, or CSV.

use std::io::Write;

use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use serde_json::Value;

use crate::error::Result;
use crate::sql::QueryResult;

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

pub fn write_result<W: Write>(
    writer: &mut W,
    result: &QueryResult,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => write_table(writer, result),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result.to_json_array())
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writeln!(writer, "{json}")?;
            Ok(())
        }
        OutputFormat::Csv => write_csv(writer, result),
    }
}

fn write_table<W: Write>(writer: &mut W, result: &QueryResult) -> Result<()> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(&result.columns);
    for row in &result.rows {
        table.add_row(row.iter().map(value_to_cell));
    }
    writeln!(writer, "{table}")?;
    Ok(())
}

fn write_csv<W: Write>(writer: &mut W, result: &QueryResult) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&result.columns).map_err(csv_err)?;
    for row in &result.rows {
        csv_writer
            .write_record(row.iter().map(value_to_cell))
            .map_err(csv_err)?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn csv_err(e: csv::Error) -> crate::error::Error {
    crate::error::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
