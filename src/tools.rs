//! Static registry of the composer's agent-facing tools.
//!
//! Tools are resolved by name from [`TOOLS`]; every invocation returns a JSON
//! object, either the render outcome or a structured error.

use std::path::PathBuf;

use chrono::Local;
use log::debug;
use serde_json::{json, Map, Value};

use crate::composer::{RenderOptions, RenderOutcome, ReportComposer};
use crate::error::ReportError;

type Handler = fn(&ReportComposer, &Map<String, Value>) -> Result<RenderOutcome, ReportError>;

/// A tool definition with name, description, JSON Schema for input, and handler.
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema of the argument object.
    pub input_schema: &'static str,
    pub handler: Handler,
}

/// Tools exposed to the agent.
pub const TOOLS: &[ToolDef] = &[
    ToolDef {
        name: "pdf",
        description: "Render a multi-section PDF report (cover page, paragraphs, tables, charts) from a JSON document description. Returns the absolute path of the written file.",
        input_schema: r#"{"type":"object","properties":{"data_json":{"type":["string","object"],"description":"Document description with title, optional cover/summary/insights, and sections"},"out_path":{"type":"string","description":"Output file path; defaults to a unique name in the reports directory"},"include_chart":{"type":"boolean","description":"Add a summary bar chart of numeric values when the document has no chart","default":true}},"required":["data_json"]}"#,
        handler: render_document,
    },
    ToolDef {
        name: "pdf_record",
        description: "Render a flat record of key/value pairs as a one-table PDF report. Returns the absolute path of the written file.",
        input_schema: r#"{"type":"object","properties":{"data_json":{"type":["string","object","array"],"description":"Flat record; its optional `title` names the report"},"out_path":{"type":"string","description":"Output file path; defaults to a unique name in the reports directory"},"include_chart":{"type":"boolean","description":"Add a bar chart of the record's numeric values","default":true}},"required":["data_json"]}"#,
        handler: render_record,
    },
];

/// Looks up a tool by name.
pub fn find(name: &str) -> Option<&'static ToolDef> {
    TOOLS.iter().find(|tool| tool.name == name)
}

/// Runs tool `name` with `args` and returns its JSON result.
pub fn invoke(composer: &ReportComposer, name: &str, args: &Value) -> Value {
    let Some(tool) = find(name) else {
        return json!({
            "error": {
                "kind": "unknown_tool",
                "message": format!("unknown tool `{}`", name),
            }
        });
    };

    debug!("invoking tool `{}`", tool.name);
    let result = match args {
        Value::Object(args) => (tool.handler)(composer, args),
        _ => Err(ReportError::schema("arguments", "expected an object")),
    };
    match result {
        Ok(outcome) => outcome_json(&outcome),
        Err(err) => err.to_json(),
    }
}

/// Serializes the registry for capability discovery.
pub fn definitions_json() -> Value {
    Value::Array(
        TOOLS
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": serde_json::from_str::<Value>(tool.input_schema)
                        .unwrap_or(Value::Null),
                })
            })
            .collect(),
    )
}

fn outcome_json(outcome: &RenderOutcome) -> Value {
    json!({
        "path": outcome.path.display().to_string(),
        "pages": outcome.page_count,
        "section_pages": outcome.section_pages,
        "warnings": outcome.warnings,
    })
}

fn render_document(
    composer: &ReportComposer,
    args: &Map<String, Value>,
) -> Result<RenderOutcome, ReportError> {
    let data = data_argument(args)?;
    composer.render_value(&data, &options(args)?)
}

fn render_record(
    composer: &ReportComposer,
    args: &Map<String, Value>,
) -> Result<RenderOutcome, ReportError> {
    let data = data_argument(args)?;
    composer.render_record(&data, &options(args)?)
}

/// Reads `data_json`, parsing it when it arrives as a JSON string.
fn data_argument(args: &Map<String, Value>) -> Result<Value, ReportError> {
    match args.get("data_json") {
        None | Some(Value::Null) => Err(ReportError::schema("data_json", "required")),
        Some(Value::String(text)) => serde_json::from_str(text)
            .map_err(|err| ReportError::schema("data_json", format!("invalid JSON: {}", err))),
        Some(value) => Ok(value.clone()),
    }
}

fn options(args: &Map<String, Value>) -> Result<RenderOptions, ReportError> {
    let output_path = match args.get("out_path") {
        None | Some(Value::Null) => None,
        Some(Value::String(path)) if !path.trim().is_empty() => Some(PathBuf::from(path)),
        Some(_) => return Err(ReportError::schema("out_path", "expected a non-empty string")),
    };
    let include_chart = match args.get("include_chart") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(ReportError::schema("include_chart", "expected a boolean")),
    };

    Ok(RenderOptions::new()
        .with_output_path(output_path)
        .with_summary_chart(include_chart)
        .with_timestamp(Local::now()))
}
