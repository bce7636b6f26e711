//! Data structures describing the logical content of a report.
//!
//! The types in this module are the validated form of a document description.
//! They are produced by [`crate::schema::validate`] (or built directly through
//! the constructors below) and never reference the rendering crate, so the
//! values stay cheap to build and compare in tests.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Root entity of a report: a cover followed by an ordered list of sections.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportDocument {
    title: String,
    cover: Option<Cover>,
    summary: Option<String>,
    insights: Vec<String>,
    sections: Vec<Section>,
}

impl ReportDocument {
    /// Creates a document with the given title and no sections.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            cover: None,
            summary: None,
            insights: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// Returns the document title shown on the cover page.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the cover metadata, if any.
    pub fn cover(&self) -> Option<&Cover> {
        self.cover.as_ref()
    }

    /// Returns the summary paragraph shown on the cover, if any.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Returns the insights rendered as callouts on the cover.
    pub fn insights(&self) -> &[String] {
        &self.insights
    }

    /// Returns the sections in rendering order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Sets the cover and returns the updated document.
    pub fn with_cover(mut self, cover: impl Into<Option<Cover>>) -> Self {
        self.cover = cover.into();
        self
    }

    /// Sets the summary and returns the updated document.
    pub fn with_summary(mut self, summary: impl Into<Option<String>>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Appends an insight and returns the updated document.
    pub fn with_insight(mut self, insight: impl Into<String>) -> Self {
        self.insights.push(insight.into());
        self
    }

    /// Appends a section and returns the updated document.
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Extends the document with multiple sections and returns the updated instance.
    pub fn with_sections<I>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = Section>,
    {
        self.sections.extend(sections);
        self
    }

    /// Returns `true` if any section renders charts.
    pub fn has_chart_section(&self) -> bool {
        self.sections
            .iter()
            .any(|section| matches!(section.content(), SectionContent::Chart(_)))
    }

    pub(crate) fn push_section(&mut self, section: Section) {
        self.sections.push(section);
    }
}

/// Cover page metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cover {
    logo_path: Option<PathBuf>,
}

impl Cover {
    /// Creates an empty cover.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the logo reference, if any.
    pub fn logo_path(&self) -> Option<&Path> {
        self.logo_path.as_deref()
    }

    /// Sets the logo reference and returns the updated cover.
    pub fn with_logo_path(mut self, logo_path: impl Into<Option<PathBuf>>) -> Self {
        self.logo_path = logo_path.into();
        self
    }
}

/// One titled content block of the report body.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    title: String,
    content: SectionContent,
}

impl Section {
    /// Creates a section from a title and its content.
    pub fn new(title: impl Into<String>, content: SectionContent) -> Self {
        Self {
            title: title.into(),
            content,
        }
    }

    /// Convenience helper for a paragraph section.
    pub fn paragraph(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            title,
            SectionContent::Paragraph {
                text: Some(text.into()),
            },
        )
    }

    /// Convenience helper for a table section.
    pub fn table(title: impl Into<String>, data: TableData) -> Self {
        Self::new(title, SectionContent::Table(data))
    }

    /// Convenience helper for a chart section.
    pub fn chart(title: impl Into<String>, charts: impl Into<ChartSet>) -> Self {
        Self::new(title, SectionContent::Chart(charts.into()))
    }

    /// Returns the section heading.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the section content.
    pub fn content(&self) -> &SectionContent {
        &self.content
    }
}

/// Content of a section, keyed by the section `type` tag.
#[derive(Clone, Debug, PartialEq)]
pub enum SectionContent {
    /// Flowing body text.
    Paragraph {
        /// Body text; `None` renders the heading alone.
        text: Option<String>,
    },
    /// Bordered table.
    Table(TableData),
    /// One or more charts, in source order.
    Chart(ChartSet),
}

impl SectionContent {
    /// Returns the `type` tag used in document descriptions.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Paragraph { .. } => "paragraph",
            Self::Table(_) => "table",
            Self::Chart(_) => "chart",
        }
    }
}

/// An ordered record mapping column names to values.
pub type Record = Vec<(String, CellValue)>;

/// Table payload: a single record or an ordered sequence of records.
#[derive(Clone, Debug, PartialEq)]
pub enum TableData {
    /// Rendered as a two-column key/value table.
    Record(Record),
    /// Rendered with the first record's keys as headers.
    Records(Vec<Record>),
}

/// A table cell value as supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    /// No value (`null`).
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    Text(String),
    /// Nested arrays or objects, kept as JSON.
    Json(Value),
}

impl CellValue {
    /// Returns the numeric value, if the cell holds a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&Value> for CellValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => number
                .as_f64()
                .map(Self::Number)
                .unwrap_or_else(|| Self::Text(number.to_string())),
            Value::String(text) => Self::Text(text.clone()),
            other => Self::Json(other.clone()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(flag) => write!(f, "{}", flag),
            Self::Number(value) => f.write_str(&format_number(*value)),
            Self::Text(text) => f.write_str(text),
            Self::Json(value) => write!(f, "{}", value),
        }
    }
}

/// Supported chart kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    /// One bar per label.
    Bar,
    /// One wedge per label.
    Pie,
    /// One connected point per label.
    Line,
}

impl ChartKind {
    /// Parses the `chart_type` tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "bar" => Some(Self::Bar),
            "pie" => Some(Self::Pie),
            "line" => Some(Self::Line),
            _ => None,
        }
    }

    /// Returns the `chart_type` tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Pie => "pie",
            Self::Line => "line",
        }
    }
}

/// A category label; labels are categorical even when numeric.
#[derive(Clone, Debug, PartialEq)]
pub enum ChartLabel {
    /// Text label.
    Text(String),
    /// Numeric label.
    Number(f64),
}

impl fmt::Display for ChartLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(value) => f.write_str(&format_number(*value)),
        }
    }
}

impl From<&str> for ChartLabel {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for ChartLabel {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<f64> for ChartLabel {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// The charts of a chart section.
///
/// Remembers whether `chart_spec` held a single object or a list so that
/// locations name the chart the way the description addresses it.
#[derive(Clone, Debug, PartialEq)]
pub enum ChartSet {
    Single(ChartSpec),
    List(Vec<ChartSpec>),
}

impl ChartSet {
    /// Returns the charts in source order.
    pub fn specs(&self) -> &[ChartSpec] {
        match self {
            Self::Single(spec) => std::slice::from_ref(spec),
            Self::List(specs) => specs,
        }
    }

    /// Location of the chart at `position`, relative to its section.
    pub fn field(&self, position: usize) -> String {
        match self {
            Self::Single(_) => "chart_spec".to_owned(),
            Self::List(_) => format!("chart_spec[{}]", position),
        }
    }
}

impl From<ChartSpec> for ChartSet {
    fn from(spec: ChartSpec) -> Self {
        Self::Single(spec)
    }
}

impl From<Vec<ChartSpec>> for ChartSet {
    fn from(specs: Vec<ChartSpec>) -> Self {
        Self::List(specs)
    }
}

/// Declarative description of one chart.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSpec {
    kind: ChartKind,
    labels: Vec<ChartLabel>,
    values: Vec<f64>,
    color: Option<String>,
    width_in: Option<f64>,
    height_in: Option<f64>,
}

impl ChartSpec {
    /// Creates a chart spec.  Callers are expected to pass equally long
    /// `labels` and `values`; [`crate::schema::validate`] enforces this for
    /// document descriptions.
    pub fn new(kind: ChartKind, labels: Vec<ChartLabel>, values: Vec<f64>) -> Self {
        Self {
            kind,
            labels,
            values,
            color: None,
            width_in: None,
            height_in: None,
        }
    }

    pub fn kind(&self) -> ChartKind {
        self.kind
    }

    pub fn labels(&self) -> &[ChartLabel] {
        &self.labels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Requested figure width in inches.
    pub fn width_in(&self) -> Option<f64> {
        self.width_in
    }

    /// Requested figure height in inches.
    pub fn height_in(&self) -> Option<f64> {
        self.height_in
    }

    /// Sets the uniform mark color and returns the updated spec.
    pub fn with_color(mut self, color: impl Into<Option<String>>) -> Self {
        self.color = color.into();
        self
    }

    /// Sets the figure size in inches and returns the updated spec.
    pub fn with_size(mut self, width_in: Option<f64>, height_in: Option<f64>) -> Self {
        self.width_in = width_in;
        self.height_in = height_in;
        self
    }
}

/// Formats numbers the way they are written in JSON: integral values without a
/// fractional part.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(3.25), "3.25");
    }

    #[test]
    fn cell_values_follow_json_types() {
        assert_eq!(CellValue::from(&json!(null)).to_string(), "");
        assert_eq!(CellValue::from(&json!(true)).to_string(), "true");
        assert_eq!(CellValue::from(&json!(1282.38)).to_string(), "1282.38");
        assert_eq!(CellValue::from(&json!("ACME")).to_string(), "ACME");
        assert_eq!(CellValue::from(&json!([1, 2])).to_string(), "[1,2]");
    }

    #[test]
    fn chart_section_detection() {
        let document = ReportDocument::new("Report")
            .with_section(Section::paragraph("Intro", "Hello"))
            .with_section(Section::chart(
                "Chart",
                vec![ChartSpec::new(
                    ChartKind::Bar,
                    vec!["a".into()],
                    vec![1.0],
                )],
            ));
        assert!(document.has_chart_section());
        assert_eq!(document.sections()[1].content().kind(), "chart");
    }

    #[test]
    fn chart_set_locations_follow_description_shape() {
        let spec = ChartSpec::new(ChartKind::Pie, vec!["a".into()], vec![1.0]);
        let single = ChartSet::from(spec.clone());
        assert_eq!(single.specs().len(), 1);
        assert_eq!(single.field(0), "chart_spec");

        let list = ChartSet::from(vec![spec]);
        assert_eq!(list.specs().len(), 1);
        assert_eq!(list.field(0), "chart_spec[0]");
    }
}
