//! Structural validation of document descriptions.
//!
//! [`validate`] walks the raw JSON value and either returns a fully typed
//! [`ReportDocument`] or the first offending field.  Validation is strict:
//! unknown keys at the top level, in `cover`, and in sections are rejected.
//! Chart specs follow their own schema, where unrecognized keys are ignored.

use std::path::PathBuf;

use log::debug;
use serde_json::{Map, Value};

use crate::error::ReportError;
use crate::model::{
    CellValue, ChartKind, ChartLabel, ChartSet, ChartSpec, Cover, Record, ReportDocument,
    Section, SectionContent, TableData,
};

const DOCUMENT_KEYS: &[&str] = &["title", "cover", "summary", "insights", "sections"];
const COVER_KEYS: &[&str] = &["logo_path"];
const SECTION_KEYS: &[&str] = &["title", "type", "text", "data", "chart_spec"];
const CHART_KEYS: &[&str] = &["chart_type", "labels", "values", "color", "width", "height"];

type Result<T> = std::result::Result<T, ReportError>;

/// Validates a document description and converts it into a [`ReportDocument`].
pub fn validate(input: &Value) -> Result<ReportDocument> {
    let root = expect_object(input, "$")?;
    reject_unknown_keys(root, DOCUMENT_KEYS, "")?;

    let title = match root.get("title") {
        None => return Err(ReportError::schema("title", "required field is missing")),
        Some(Value::String(title)) if title.trim().is_empty() => {
            return Err(ReportError::schema("title", "must not be empty"))
        }
        Some(Value::String(title)) => title.clone(),
        Some(other) => return Err(type_error("title", "a string", other)),
    };

    let cover = match root.get("cover") {
        None | Some(Value::Null) => None,
        Some(value) => Some(validate_cover(value)?),
    };

    let summary = optional_string(root, "summary", "summary")?;

    let insights = match root.get("insights") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(text) => Ok(text.clone()),
                other => Err(type_error(format!("insights[{}]", index), "a string", other)),
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => return Err(type_error("insights", "an array of strings", other)),
    };

    let sections = match root.get("sections") {
        None => return Err(ReportError::schema("sections", "required field is missing")),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| validate_section(item, index))
            .collect::<Result<Vec<_>>>()?,
        Some(other) => return Err(type_error("sections", "an array", other)),
    };

    debug!(
        "validated document '{}' with {} section(s)",
        title,
        sections.len()
    );

    let mut document = ReportDocument::new(title)
        .with_cover(cover)
        .with_summary(summary)
        .with_sections(sections);
    for insight in insights {
        document = document.with_insight(insight);
    }
    Ok(document)
}

fn validate_cover(value: &Value) -> Result<Cover> {
    let cover = expect_object(value, "cover")?;
    reject_unknown_keys(cover, COVER_KEYS, "cover.")?;
    let logo_path = optional_string(cover, "logo_path", "cover.logo_path")?;
    Ok(Cover::new().with_logo_path(logo_path.map(PathBuf::from)))
}

fn validate_section(value: &Value, index: usize) -> Result<Section> {
    let base = format!("sections[{}]", index);
    let section = expect_object(value, &base)?;
    reject_unknown_keys(section, SECTION_KEYS, &format!("{}.", base))?;

    let title = match section.get("title") {
        None => {
            return Err(ReportError::schema(
                format!("{}.title", base),
                "required field is missing",
            ))
        }
        Some(Value::String(title)) => title.clone(),
        Some(other) => return Err(type_error(format!("{}.title", base), "a string", other)),
    };

    let kind = match section.get("type") {
        None => {
            return Err(ReportError::schema(
                format!("{}.type", base),
                "required field is missing",
            ))
        }
        Some(Value::String(kind)) => kind.as_str(),
        Some(other) => return Err(type_error(format!("{}.type", base), "a string", other)),
    };

    let content = match kind {
        "paragraph" => SectionContent::Paragraph {
            text: optional_string(section, "text", &format!("{}.text", base))?,
        },
        "table" => SectionContent::Table(validate_table(section.get("data"), &base)?),
        "chart" => SectionContent::Chart(validate_chart_specs(section.get("chart_spec"), &base)?),
        other => {
            return Err(ReportError::schema(
                format!("{}.type", base),
                format!(
                    "unknown section type `{}`; expected one of paragraph, table, chart",
                    other
                ),
            ))
        }
    };

    Ok(Section::new(title, content))
}

fn validate_table(value: Option<&Value>, base: &str) -> Result<TableData> {
    let path = format!("{}.data", base);
    match value {
        None | Some(Value::Null) => Err(ReportError::schema(
            path,
            "required for table sections",
        )),
        Some(Value::Object(map)) => Ok(TableData::Record(record_from_map(map))),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) => Ok(record_from_map(map)),
                other => Err(type_error(
                    format!("{}[{}]", path, index),
                    "an object",
                    other,
                )),
            })
            .collect::<Result<Vec<_>>>()
            .map(TableData::Records),
        Some(other) => Err(type_error(path, "an object or an array of objects", other)),
    }
}

pub(crate) fn record_from_map(map: &Map<String, Value>) -> Record {
    map.iter()
        .map(|(key, value)| (key.clone(), CellValue::from(value)))
        .collect()
}

fn validate_chart_specs(value: Option<&Value>, base: &str) -> Result<ChartSet> {
    let path = format!("{}.chart_spec", base);
    match value {
        None | Some(Value::Null) => Err(ReportError::schema(
            path,
            "required for chart sections",
        )),
        Some(spec @ Value::Object(_)) => Ok(ChartSet::Single(validate_chart_spec(spec, &path)?)),
        Some(Value::Array(items)) if items.is_empty() => Err(ReportError::schema(
            path,
            "must contain at least one chart",
        )),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| validate_chart_spec(item, &format!("{}[{}]", path, index)))
            .collect::<Result<Vec<_>>>()
            .map(ChartSet::List),
        Some(other) => Err(type_error(path, "an object or an array of objects", other)),
    }
}

/// Validates a single chart spec located at `path`.
pub fn validate_chart_spec(value: &Value, path: &str) -> Result<ChartSpec> {
    let spec = expect_object(value, path)?;

    for key in spec.keys() {
        if !CHART_KEYS.contains(&key.as_str()) {
            debug!("ignoring unrecognized chart_spec key `{}` at {}", key, path);
        }
    }

    let kind = match spec.get("chart_type") {
        None => {
            return Err(ReportError::schema(
                format!("{}.chart_type", path),
                "required field is missing",
            ))
        }
        Some(Value::String(tag)) => ChartKind::from_tag(tag).ok_or_else(|| {
            ReportError::schema(
                format!("{}.chart_type", path),
                format!("unsupported chart type `{}`; expected bar, pie or line", tag),
            )
        })?,
        Some(other) => {
            return Err(type_error(
                format!("{}.chart_type", path),
                "a string",
                other,
            ))
        }
    };

    let labels = match spec.get("labels") {
        None => {
            return Err(ReportError::schema(
                format!("{}.labels", path),
                "required field is missing",
            ))
        }
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(text) => Ok(ChartLabel::Text(text.clone())),
                Value::Number(number) => number.as_f64().map(ChartLabel::Number).ok_or_else(|| {
                    ReportError::schema(
                        format!("{}.labels[{}]", path, index),
                        "number is out of range",
                    )
                }),
                other => Err(type_error(
                    format!("{}.labels[{}]", path, index),
                    "a string or a number",
                    other,
                )),
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => return Err(type_error(format!("{}.labels", path), "an array", other)),
    };

    let values = match spec.get("values") {
        None => {
            return Err(ReportError::schema(
                format!("{}.values", path),
                "required field is missing",
            ))
        }
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_f64()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| {
                        type_error(format!("{}.values[{}]", path, index), "a number", item)
                    })
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => return Err(type_error(format!("{}.values", path), "an array", other)),
    };

    if labels.len() != values.len() {
        return Err(ReportError::schema(
            path,
            format!(
                "labels and values must have the same length (got {} labels and {} values)",
                labels.len(),
                values.len()
            ),
        ));
    }

    let color = optional_string(spec, "color", &format!("{}.color", path))?;
    let width = optional_dimension(spec, "width", path)?;
    let height = optional_dimension(spec, "height", path)?;

    Ok(ChartSpec::new(kind, labels, values)
        .with_color(color)
        .with_size(width, height))
}

fn optional_dimension(spec: &Map<String, Value>, key: &str, path: &str) -> Result<Option<f64>> {
    match spec.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_f64() {
            Some(number) if number.is_finite() && number > 0.0 => Ok(Some(number)),
            Some(_) => Err(ReportError::schema(
                format!("{}.{}", path, key),
                "must be a positive number",
            )),
            None => Err(type_error(format!("{}.{}", path, key), "a number", value)),
        },
    }
}

fn optional_string(map: &Map<String, Value>, key: &str, path: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(type_error(path, "a string", other)),
    }
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| type_error(path, "an object", value))
}

fn reject_unknown_keys(map: &Map<String, Value>, allowed: &[&str], prefix: &str) -> Result<()> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(ReportError::schema(
            format!("{}{}", prefix, key),
            "unknown field",
        )),
        None => Ok(()),
    }
}

fn type_error(path: impl Into<String>, expected: &str, found: &Value) -> ReportError {
    ReportError::schema(
        path,
        format!("expected {}, found {}", expected, json_type_name(found)),
    )
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_path(err: ReportError) -> String {
        match err {
            ReportError::Schema { path, .. } => path,
            other => panic!("expected schema error, got {other}"),
        }
    }

    #[test]
    fn accepts_minimal_document() {
        let document = validate(&json!({
            "title": "Sales",
            "sections": [{"title": "Q1", "type": "paragraph", "text": "Up 5%"}]
        }))
        .expect("valid document");

        assert_eq!(document.title(), "Sales");
        assert_eq!(document.sections().len(), 1);
        assert_eq!(
            document.sections()[0].content(),
            &SectionContent::Paragraph {
                text: Some("Up 5%".to_owned())
            }
        );
    }

    #[test]
    fn accepts_empty_sections() {
        let document = validate(&json!({"title": "Empty", "sections": []})).unwrap();
        assert!(document.sections().is_empty());
    }

    #[test]
    fn accepts_full_cover_and_null_optionals() {
        let document = validate(&json!({
            "title": "Report",
            "summary": "S",
            "cover": {"logo_path": null},
            "insights": ["ok", "fine"],
            "sections": []
        }))
        .unwrap();
        assert_eq!(document.summary(), Some("S"));
        assert_eq!(document.cover().and_then(Cover::logo_path), None);
        assert_eq!(document.insights(), ["ok", "fine"]);
    }

    #[test]
    fn preserves_section_and_key_order() {
        let document = validate(&json!({
            "title": "Ordered",
            "sections": [
                {"title": "B", "type": "table", "data": [{"z": 1, "a": 2}]},
                {"title": "A", "type": "paragraph"}
            ]
        }))
        .unwrap();

        let titles: Vec<_> = document.sections().iter().map(Section::title).collect();
        assert_eq!(titles, ["B", "A"]);
        match document.sections()[0].content() {
            SectionContent::Table(TableData::Records(records)) => {
                let keys: Vec<_> = records[0].iter().map(|(key, _)| key.as_str()).collect();
                assert_eq!(keys, ["z", "a"]);
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn missing_title_is_rejected() {
        let err = validate(&json!({"sections": []})).unwrap_err();
        assert_eq!(schema_path(err), "title");
    }

    #[test]
    fn empty_title_is_rejected() {
        let err = validate(&json!({"title": "  ", "sections": []})).unwrap_err();
        assert_eq!(schema_path(err), "title");
    }

    #[test]
    fn missing_sections_is_rejected() {
        let err = validate(&json!({"title": "T"})).unwrap_err();
        assert_eq!(schema_path(err), "sections");
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let err = validate(&json!({"title": "T", "sections": [], "author": "me"})).unwrap_err();
        assert_eq!(schema_path(err), "author");
    }

    #[test]
    fn unknown_section_key_is_rejected() {
        let err = validate(&json!({
            "title": "T",
            "sections": [{"title": "S", "type": "paragraph", "style": "bold"}]
        }))
        .unwrap_err();
        assert_eq!(schema_path(err), "sections[0].style");
    }

    #[test]
    fn unused_fields_are_not_validated() {
        let document = validate(&json!({
            "title": "T",
            "sections": [{"title": "S", "type": "paragraph", "text": "x", "data": 5}]
        }));
        assert!(document.is_ok());
    }

    #[test]
    fn illegal_section_type_is_rejected() {
        let err = validate(&json!({
            "title": "T",
            "sections": [{"title": "S", "type": "list"}]
        }))
        .unwrap_err();
        assert_eq!(schema_path(err), "sections[0].type");
    }

    #[test]
    fn table_requires_data() {
        let err = validate(&json!({
            "title": "T",
            "sections": [{"title": "S", "type": "table"}]
        }))
        .unwrap_err();
        assert_eq!(schema_path(err), "sections[0].data");
    }

    #[test]
    fn table_rows_must_be_objects() {
        let err = validate(&json!({
            "title": "T",
            "sections": [{"title": "S", "type": "table", "data": [{"a": 1}, 2]}]
        }))
        .unwrap_err();
        assert_eq!(schema_path(err), "sections[0].data[1]");
    }

    #[test]
    fn mismatched_chart_lengths_reference_chart_spec() {
        let err = validate(&json!({
            "title": "T",
            "sections": [{
                "title": "C",
                "type": "chart",
                "chart_spec": {"chart_type": "bar", "labels": ["A", "B"], "values": [1, 2, 3]}
            }]
        }))
        .unwrap_err();
        assert_eq!(schema_path(err), "sections[0].chart_spec");
    }

    #[test]
    fn chart_sequences_are_validated_per_item() {
        let err = validate(&json!({
            "title": "T",
            "sections": [{
                "title": "C",
                "type": "chart",
                "chart_spec": [
                    {"chart_type": "bar", "labels": ["A"], "values": [1]},
                    {"chart_type": "area", "labels": ["A"], "values": [1]}
                ]
            }]
        }))
        .unwrap_err();
        assert_eq!(schema_path(err), "sections[0].chart_spec[1].chart_type");
    }

    #[test]
    fn chart_spec_fields_are_typed() {
        let document = validate(&json!({
            "title": "T",
            "sections": [{
                "title": "C",
                "type": "chart",
                "chart_spec": {
                    "chart_type": "line",
                    "labels": [1, "two"],
                    "values": [3, 4.5],
                    "color": "#ff0000",
                    "width": 5,
                    "height": 3,
                    "legend": true
                }
            }]
        }))
        .unwrap();

        match document.sections()[0].content() {
            SectionContent::Chart(charts) => {
                let spec = &charts.specs()[0];
                assert_eq!(spec.kind(), ChartKind::Line);
                assert_eq!(spec.labels()[0], ChartLabel::Number(1.0));
                assert_eq!(spec.values(), [3.0, 4.5]);
                assert_eq!(spec.color(), Some("#ff0000"));
                assert_eq!(spec.width_in(), Some(5.0));
                assert_eq!(spec.height_in(), Some(3.0));
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        let err = validate(&json!({
            "title": "T",
            "sections": [{
                "title": "C",
                "type": "chart",
                "chart_spec": {"chart_type": "pie", "labels": ["A"], "values": ["1"]}
            }]
        }))
        .unwrap_err();
        assert_eq!(schema_path(err), "sections[0].chart_spec.values[0]");
    }

    #[test]
    fn non_positive_dimensions_are_rejected() {
        let err = validate(&json!({
            "title": "T",
            "sections": [{
                "title": "C",
                "type": "chart",
                "chart_spec": {"chart_type": "bar", "labels": [], "values": [], "width": 0}
            }]
        }))
        .unwrap_err();
        assert_eq!(schema_path(err), "sections[0].chart_spec.width");
    }

    #[test]
    fn unknown_cover_key_is_rejected() {
        let err = validate(&json!({
            "title": "T",
            "cover": {"logo": "x.png"},
            "sections": []
        }))
        .unwrap_err();
        assert_eq!(schema_path(err), "cover.logo");
    }
}
