//! Documents derived from flat data: the synthesized summary chart and the
//! single-table report built from one record.

use log::debug;
use serde_json::Value;

use crate::error::ReportError;
use crate::model::{
    CellValue, ChartKind, ChartLabel, ChartSpec, Record, ReportDocument, Section, SectionContent,
    TableData,
};
use crate::schema::record_from_map;

/// Title used for record reports that carry no `title` of their own.
pub const DEFAULT_RECORD_TITLE: &str = "Data Assistant Report";

/// Title of the synthesized summary chart section.
pub const SUMMARY_SECTION_TITLE: &str = "Summary";

/// Title of the table section holding a record report's data.
pub const RECORD_SECTION_TITLE: &str = "Data";

/// Builds a bar chart section from the numeric values of single-record tables.
///
/// Returns `None` when the document already has a chart section or when no
/// numeric value exists.  Booleans are not treated as numbers.
pub fn summary_chart(document: &ReportDocument) -> Option<Section> {
    if document.has_chart_section() {
        return None;
    }

    let (labels, values): (Vec<_>, Vec<_>) = document
        .sections()
        .iter()
        .filter_map(|section| match section.content() {
            SectionContent::Table(TableData::Record(record)) => Some(record),
            _ => None,
        })
        .flat_map(numeric_entries)
        .unzip();

    if values.is_empty() {
        return None;
    }

    debug!("synthesizing summary chart from {} value(s)", values.len());
    Some(Section::chart(
        SUMMARY_SECTION_TITLE,
        ChartSpec::new(ChartKind::Bar, labels, values),
    ))
}

fn numeric_entries(record: &Record) -> impl Iterator<Item = (ChartLabel, f64)> + '_ {
    record.iter().filter_map(|(key, value)| {
        value
            .as_number()
            .filter(|number| number.is_finite())
            .map(|number| (key.as_str().into(), number))
    })
}

/// Builds a report from a flat record.
///
/// Objects keep their key order.  Arrays become `item_1 .. item_n` entries.
/// The record's `title` string, when present and non-empty, titles the report;
/// the whole record (title included) is shown as a key/value table.
pub fn record_document(data: &Value) -> Result<ReportDocument, ReportError> {
    let record: Record = match data {
        Value::Object(map) => record_from_map(map),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (format!("item_{}", index + 1), CellValue::from(item)))
            .collect(),
        Value::Null => Vec::new(),
        other => {
            return Err(ReportError::schema(
                "data_json",
                format!("expected an object or an array, found {}", value_kind(other)),
            ))
        }
    };

    if record.is_empty() {
        return Err(ReportError::schema("data_json", "data cannot be empty"));
    }

    let title = match data.get("title") {
        Some(Value::String(title)) if !title.trim().is_empty() => title.clone(),
        _ => DEFAULT_RECORD_TITLE.to_owned(),
    };

    Ok(ReportDocument::new(title).with_section(Section::table(
        RECORD_SECTION_TITLE,
        TableData::Record(record),
    )))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
