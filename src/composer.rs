//! Entry point tying validation, layout, and output together.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;

use crate::config::ComposerConfig;
use crate::error::{ReportError, ResourceWarning};
use crate::layout::{self, ComposedReport};
use crate::model::ReportDocument;
use crate::output;
use crate::schema;
use crate::summary;

/// Per-call rendering options.
#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    /// Destination of the artifact; a unique name in the reports directory when unset.
    pub output_path: Option<PathBuf>,
    /// Adds a bar chart of the document's numeric values when it has no chart.
    pub include_summary_chart: bool,
    /// Timestamp printed on the cover page.
    pub generated_at: Option<DateTime<Local>>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_path(mut self, path: impl Into<Option<PathBuf>>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_summary_chart(mut self, include: bool) -> Self {
        self.include_summary_chart = include;
        self
    }

    /// Prints `generated_at` on the cover page.
    pub fn with_timestamp(mut self, generated_at: impl Into<Option<DateTime<Local>>>) -> Self {
        self.generated_at = generated_at.into();
        self
    }
}

/// Result of a successful render call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderOutcome {
    /// Absolute path of the written artifact.
    pub path: PathBuf,
    /// Number of pages, cover included.
    #[serde(rename = "pages")]
    pub page_count: usize,
    /// The page each section starts on, in section order.
    pub section_pages: Vec<Option<usize>>,
    /// Resources that were skipped, e.g. an unreadable logo.
    pub warnings: Vec<ResourceWarning>,
}

/// Renders report documents into PDF files.
///
/// A composer holds only its configuration; every call builds its document
/// from scratch, so one composer can serve any number of calls.
#[derive(Clone, Debug, Default)]
pub struct ReportComposer {
    config: ComposerConfig,
}

impl ReportComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Validates a JSON document description and renders it.
    pub fn render_value(
        &self,
        input: &Value,
        options: &RenderOptions,
    ) -> Result<RenderOutcome, ReportError> {
        let document = schema::validate(input)?;
        self.render(&document, options)
    }

    /// Renders a flat record as a single key/value table report.
    pub fn render_record(
        &self,
        data: &Value,
        options: &RenderOptions,
    ) -> Result<RenderOutcome, ReportError> {
        let document = summary::record_document(data)?;
        self.render(&document, options)
    }

    /// Renders an already validated document.
    pub fn render(
        &self,
        document: &ReportDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutcome, ReportError> {
        let mut document = document.clone();
        if options.include_summary_chart {
            if let Some(section) = summary::summary_chart(&document) {
                document.push_section(section);
            }
        }

        let ComposedReport {
            bytes,
            page_count,
            section_pages,
            warnings,
        } = layout::compose(&document, &self.config, options)?;

        let bytes = self.apply_outline(bytes, &document, &section_pages)?;

        let target = output::resolve_output_path(
            options.output_path.as_deref(),
            &self.config.reports_dir,
            Local::now(),
        );
        let path = output::write_atomically(&target, &bytes)?;
        info!(
            "wrote report '{}' ({} page(s)) to {}",
            document.title(),
            page_count,
            path.display()
        );

        Ok(RenderOutcome {
            path,
            page_count,
            section_pages,
            warnings,
        })
    }

    #[cfg(feature = "bookmarks")]
    fn apply_outline(
        &self,
        bytes: Vec<u8>,
        document: &ReportDocument,
        section_pages: &[Option<usize>],
    ) -> Result<Vec<u8>, ReportError> {
        if !self.config.bookmarks || document.sections().is_empty() {
            return Ok(bytes);
        }
        debug!("adding {} outline entries", document.sections().len());
        crate::bookmarks::apply_section_bookmarks(&bytes, document.sections(), section_pages)
            .map_err(|err| ReportError::render("outline", err.to_string()))
    }

    #[cfg(not(feature = "bookmarks"))]
    fn apply_outline(
        &self,
        bytes: Vec<u8>,
        _document: &ReportDocument,
        _section_pages: &[Option<usize>],
    ) -> Result<Vec<u8>, ReportError> {
        if self.config.bookmarks {
            debug!("outline requested but the `bookmarks` feature is disabled");
        }
        Ok(bytes)
    }
}
