//! Rendering of section content into `genpdf` elements.

use std::ops::Range;

use genpdf::elements::{Break, FrameCellDecorator, LinearLayout, TableLayout};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{Alignment, Element, Margins, Mm, Size};
use log::debug;

use crate::chart::{self, RenderedChart};
use crate::config::ComposerConfig;
use crate::elements::{mm_from_f64, mm_from_inches, AxisLabels, Figure, WrappedText};
use crate::error::ReportError;
use crate::model::{ChartSpec, Record, SectionContent, TableData};

const KEY_VALUE_HEADERS: [&str; 2] = ["Key", "Value"];
const MIN_COLUMN_WEIGHT: usize = 4;
const MAX_COLUMN_WEIGHT: usize = 40;
const CELL_PADDING_MM: f64 = 1.0;
/// Room for the frame lines of the first two table rows.
const FRAME_SLACK_MM: f64 = 2.0;
/// A column holds at least one bold glyph plus the wrapper's trailing space,
/// in ems of the body font.
const MIN_COLUMN_EMS: f64 = 1.6;
const POINT_MM: f64 = 0.3528;
const AXIS_FONT_SIZE: u8 = 8;
/// Height kept below a chart for one line of axis labels.
const AXIS_ALLOWANCE_MM: f64 = 5.0;
/// Resolution of table column weights, in units per millimetre.
const COLUMN_UNITS_PER_MM: f64 = 100.0;

/// Per-section inputs for the renderer.
pub(crate) struct SectionContext<'a> {
    pub config: &'a ComposerConfig,
    pub index: usize,
    /// Width of the page body.
    pub content_width_mm: f64,
    /// Largest figure that fits on an empty page below a heading.
    pub max_figure: Size,
}

impl SectionContext<'_> {
    fn location(&self, field: &str) -> String {
        format!("sections[{}].{}", self.index, field)
    }
}

/// Rendered section content.
pub(crate) struct SectionBody {
    pub layout: LinearLayout,
    /// Body lines that must follow the heading on the same page.
    pub keep_lines: f64,
    /// Extra space that must follow the heading, e.g. the first figure.
    pub keep_space: Mm,
}

/// Renders the content of a section into a vertical layout.
pub(crate) fn render_content(
    content: &SectionContent,
    context: &SectionContext<'_>,
) -> Result<SectionBody, ReportError> {
    let mut body = SectionBody {
        layout: LinearLayout::vertical(),
        keep_lines: 1.0,
        keep_space: mm_from_f64(0.0),
    };
    match content {
        SectionContent::Paragraph { text } => {
            if let Some(text) = text {
                push_paragraphs(&mut body.layout, text);
            }
        }
        SectionContent::Table(data) => {
            let grid = TableGrid::from_data(data, &context.config.missing_cell);
            let min_width = min_column_width(context.config.font_size);
            let groups = column_groups(grid.headers.len(), context.content_width_mm, min_width);
            if groups.len() > 1 {
                debug!(
                    "section {}: {} columns split into {} tables",
                    context.index,
                    grid.headers.len(),
                    groups.len()
                );
            }
            for (position, columns) in groups.into_iter().enumerate() {
                if position > 0 {
                    body.layout.push(Break::new(1.0));
                }
                body.layout.push(build_table(&grid.select(columns), context)?);
                body.keep_lines = 2.0;
                body.keep_space = mm_from_f64(4.0 * CELL_PADDING_MM + FRAME_SLACK_MM);
            }
        }
        SectionContent::Chart(charts) => {
            for (position, spec) in charts.specs().iter().enumerate() {
                let (figure, has_axis) = chart_figure(spec, context, &charts.field(position))?;
                if position == 0 {
                    let width = mm_from_f64(context.content_width_mm);
                    let mut keep = figure.rendered_size(width).height;
                    if has_axis {
                        keep = keep + mm_from_f64(AXIS_ALLOWANCE_MM);
                    }
                    body.keep_space = keep;
                } else {
                    body.layout.push(Break::new(1.0));
                }
                body.layout.push(figure);
            }
        }
    }
    Ok(body)
}

/// Pushes one paragraph per line of `text`; blank lines become spacing.
pub(crate) fn push_paragraphs(layout: &mut LinearLayout, text: &str) {
    for line in text.lines() {
        if line.trim().is_empty() {
            layout.push(Break::new(1.0));
        } else {
            layout.push(WrappedText::new(line));
        }
    }
}

/// Narrowest table column, padding included, at `font_size` points.
fn min_column_width(font_size: u8) -> f64 {
    font_size as f64 * POINT_MM * MIN_COLUMN_EMS + 2.0 * CELL_PADDING_MM
}

/// Splits `columns` into consecutive groups that fit side by side.
pub(crate) fn column_groups(
    columns: usize,
    content_width: f64,
    min_width: f64,
) -> Vec<Range<usize>> {
    let per_group = ((content_width / min_width).floor() as usize).max(1);
    (0..columns)
        .step_by(per_group)
        .map(|start| start..(start + per_group).min(columns))
        .collect()
}

/// Distributes `total` millimetres by `weights`, giving no column less than
/// `min_width`.
pub(crate) fn column_widths(weights: &[usize], total: f64, min_width: f64) -> Vec<f64> {
    let mut pinned = vec![false; weights.len()];
    loop {
        let free_weight: usize = weights
            .iter()
            .zip(&pinned)
            .filter(|(_, pinned)| !**pinned)
            .map(|(weight, _)| *weight)
            .sum();
        let pinned_count = pinned.iter().filter(|pinned| **pinned).count();
        let free_width = total - min_width * pinned_count as f64;

        let widths: Vec<f64> = weights
            .iter()
            .zip(&pinned)
            .map(|(weight, pinned)| {
                if *pinned || free_weight == 0 {
                    min_width
                } else {
                    free_width * *weight as f64 / free_weight as f64
                }
            })
            .collect();

        let mut changed = false;
        for (width, pinned) in widths.iter().zip(pinned.iter_mut()) {
            if !*pinned && *width < min_width {
                *pinned = true;
                changed = true;
            }
        }
        if !changed {
            return widths;
        }
    }
}

/// Table content resolved into rows of display strings.
#[derive(Clone, Debug, PartialEq)]
pub struct TableGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableGrid {
    /// Resolves `data` into headers and rows.
    ///
    /// A single record becomes a key/value table.  For a sequence of records
    /// the first record's keys define the columns; keys missing from later
    /// records show `missing_cell`, keys absent from the first record are
    /// dropped.
    pub fn from_data(data: &TableData, missing_cell: &str) -> Self {
        match data {
            TableData::Record(record) => Self {
                headers: KEY_VALUE_HEADERS.iter().map(|h| h.to_string()).collect(),
                rows: record
                    .iter()
                    .map(|(key, value)| vec![key.clone(), value.to_string()])
                    .collect(),
            },
            TableData::Records(records) => {
                let headers: Vec<String> = records
                    .first()
                    .map(|first| first.iter().map(|(key, _)| key.clone()).collect())
                    .unwrap_or_default();
                let rows = records
                    .iter()
                    .map(|record| {
                        headers
                            .iter()
                            .map(|header| {
                                lookup(record, header)
                                    .map(|value| value.to_string())
                                    .unwrap_or_else(|| missing_cell.to_owned())
                            })
                            .collect()
                    })
                    .collect();
                Self { headers, rows }
            }
        }
    }

    /// Returns the grid restricted to `columns`.
    pub fn select(&self, columns: Range<usize>) -> Self {
        let pick = |cells: &[String]| cells.get(columns.clone()).unwrap_or_default().to_vec();
        Self {
            headers: pick(self.headers.as_slice()),
            rows: self.rows.iter().map(|row| pick(row.as_slice())).collect(),
        }
    }

    /// Relative column widths derived from the longest cell of each column.
    pub fn column_weights(&self) -> Vec<usize> {
        (0..self.headers.len())
            .map(|column| {
                std::iter::once(&self.headers[column])
                    .chain(self.rows.iter().map(|row| &row[column]))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
                    .clamp(MIN_COLUMN_WEIGHT, MAX_COLUMN_WEIGHT)
            })
            .collect()
    }
}

fn lookup<'a>(record: &'a Record, key: &str) -> Option<&'a crate::model::CellValue> {
    record
        .iter()
        .find(|(candidate, _)| candidate == key)
        .map(|(_, value)| value)
}

fn build_table(grid: &TableGrid, context: &SectionContext<'_>) -> Result<TableLayout, ReportError> {
    let widths = column_widths(
        &grid.column_weights(),
        context.content_width_mm,
        min_column_width(context.config.font_size),
    );
    let weights: Vec<usize> = widths
        .iter()
        .map(|width| ((width * COLUMN_UNITS_PER_MM).round() as usize).max(1))
        .collect();

    debug!(
        "section {}: table with {} column(s) and {} row(s)",
        context.index,
        grid.headers.len(),
        grid.rows.len()
    );

    let mut table = TableLayout::new(weights);
    table.set_cell_decorator(FrameCellDecorator::new(true, true, true));

    let header_style = Style::new().bold();
    let mut header = table.row();
    for text in &grid.headers {
        header = header.element(cell(StyledString::new(text.clone(), header_style)));
    }
    header
        .push()
        .map_err(|err| ReportError::render(context.location("data"), err.to_string()))?;

    for row in &grid.rows {
        let mut table_row = table.row();
        for text in row {
            table_row = table_row.element(cell(StyledString::new(text.clone(), Style::new())));
        }
        table_row
            .push()
            .map_err(|err| ReportError::render(context.location("data"), err.to_string()))?;
    }

    Ok(table)
}

fn cell(text: StyledString) -> impl Element {
    WrappedText::new(text).padded(Margins::all(mm_from_f64(CELL_PADDING_MM)))
}

/// Builds the figure for one chart; the flag tells whether it has axis labels.
fn chart_figure(
    spec: &ChartSpec,
    context: &SectionContext<'_>,
    field: &str,
) -> Result<(Figure, bool), ReportError> {
    let rendered = chart::render_chart(spec, &context.config.chart).map_err(|err| {
        ReportError::render(
            context.location(&format!("{}.{}", field, err.field())),
            err.to_string(),
        )
    })?;

    let RenderedChart {
        image,
        width_in,
        axis,
        legend,
        ..
    } = rendered;

    let mut caption = WrappedText::empty();
    for (position, entry) in legend.iter().enumerate() {
        if position > 0 {
            caption.push(StyledString::new("   ", Style::new()));
        }
        let [r, g, b] = entry.color;
        caption.push(StyledString::new(
            entry.label.clone(),
            Style::new().bold().with_color(Color::Rgb(r, g, b)),
        ));
        caption.push(StyledString::new(format!(" {}", entry.detail), Style::new()));
    }

    let axis = axis.map(|axis| {
        AxisLabels::new(
            axis.labels,
            axis.start,
            axis.end,
            Style::new().with_font_size(AXIS_FONT_SIZE),
        )
    });
    let has_axis = axis.is_some();

    let figure = Figure::from_dynamic_image(image)
        .map_err(|err| ReportError::render(context.location(field), err.to_string()))?
        .with_axis(axis)
        .with_caption(if legend.is_empty() { None } else { Some(caption) })
        .with_alignment(Alignment::Center)
        .with_width(mm_from_inches(width_in))
        .with_max_size(context.max_figure);
    Ok((figure, has_axis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, ChartKind, ChartSet};

    fn record(pairs: &[(&str, CellValue)]) -> Record {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn n_records_render_n_rows_and_one_header() {
        let records: Vec<Record> = (0..5)
            .map(|index| {
                record(&[
                    ("month", CellValue::Text(format!("M{}", index))),
                    ("sales", CellValue::Number(index as f64 * 10.0)),
                ])
            })
            .collect();
        let grid = TableGrid::from_data(&TableData::Records(records), "-");
        assert_eq!(grid.headers, ["month", "sales"]);
        assert_eq!(grid.rows.len(), 5);
        assert_eq!(grid.rows[3], ["M3", "30"]);
    }

    #[test]
    fn first_record_defines_columns() {
        let records = vec![
            record(&[("a", CellValue::Number(1.0))]),
            record(&[("b", CellValue::Number(2.0))]),
        ];
        let grid = TableGrid::from_data(&TableData::Records(records), "n/a");
        assert_eq!(grid.headers, ["a"]);
        assert_eq!(grid.rows, vec![vec!["1".to_owned()], vec!["n/a".to_owned()]]);
    }

    #[test]
    fn single_record_becomes_key_value_table() {
        let data = TableData::Record(record(&[
            ("customer", CellValue::Text("ACME".into())),
            ("none_value", CellValue::Null),
            ("flag", CellValue::Bool(true)),
        ]));
        let grid = TableGrid::from_data(&data, "-");
        assert_eq!(grid.headers, ["Key", "Value"]);
        assert_eq!(
            grid.rows,
            vec![
                vec!["customer".to_owned(), "ACME".to_owned()],
                vec!["none_value".to_owned(), String::new()],
                vec!["flag".to_owned(), "true".to_owned()],
            ]
        );
    }

    #[test]
    fn empty_record_sequence_has_no_columns() {
        let grid = TableGrid::from_data(&TableData::Records(Vec::new()), "-");
        assert!(grid.headers.is_empty());
        assert!(grid.rows.is_empty());
    }

    #[test]
    fn column_weights_are_clamped() {
        let grid = TableGrid {
            headers: vec!["id".into(), "description".into()],
            rows: vec![vec!["1".into(), "x".repeat(120)]],
        };
        assert_eq!(grid.column_weights(), [MIN_COLUMN_WEIGHT, MAX_COLUMN_WEIGHT]);
    }

    #[test]
    fn wide_tables_are_split_into_column_groups() {
        let min = min_column_width(11);
        let groups = column_groups(40, 174.0, min);
        assert!(groups.len() > 1);
        assert_eq!(groups.first().map(|group| group.start), Some(0));
        assert_eq!(groups.last().map(|group| group.end), Some(40));
        for group in &groups {
            assert!(group.len() as f64 * min <= 174.0, "{:?}", group);
        }

        assert_eq!(column_groups(2, 174.0, min), vec![0..2]);
        assert_eq!(column_groups(3, 1.0, min), vec![0..1, 1..2, 2..3]);
        assert!(column_groups(0, 174.0, min).is_empty());
    }

    #[test]
    fn column_widths_respect_minimum_and_fill_the_page() {
        let widths = column_widths(&[40, 4, 4, 4], 60.0, 10.0);
        assert!(widths.iter().all(|width| *width >= 10.0 - 1e-9), "{:?}", widths);
        assert!((widths.iter().sum::<f64>() - 60.0).abs() < 1e-9);
        assert!((widths[0] - 30.0).abs() < 1e-9);

        let even = column_widths(&[1, 1], 50.0, 5.0);
        assert_eq!(even, vec![25.0, 25.0]);
    }

    #[test]
    fn forty_column_record_table_fits_in_groups() {
        let record: Record = (0..40)
            .map(|index| (format!("c{}", index), CellValue::Number(index as f64)))
            .collect();
        let grid = TableGrid::from_data(&TableData::Records(vec![record]), "-");
        let min = min_column_width(11);
        let groups = column_groups(grid.headers.len(), 174.0, min);
        for group in groups {
            let part = grid.select(group.clone());
            assert_eq!(part.headers.len(), group.len());
            assert_eq!(part.rows[0].len(), group.len());
            let widths = column_widths(&part.column_weights(), 174.0, min);
            assert!(widths.iter().all(|width| *width >= min - 1e-9));
        }
    }

    fn render_error_location(content: &SectionContent) -> String {
        let config = ComposerConfig::default();
        let context = SectionContext {
            config: &config,
            index: 3,
            content_width_mm: 170.0,
            max_figure: Size::new(mm_from_f64(170.0), mm_from_f64(200.0)),
        };
        match render_content(content, &context).err() {
            Some(ReportError::Render { location, .. }) => location,
            Some(other) => panic!("unexpected error {other}"),
            None => panic!("rendering should fail"),
        }
    }

    #[test]
    fn chart_errors_are_located_like_the_description() {
        let zero_pie = ChartSpec::new(ChartKind::Pie, vec!["a".into()], vec![0.0]);

        let single = SectionContent::Chart(ChartSet::from(zero_pie.clone()));
        assert_eq!(render_error_location(&single), "sections[3].chart_spec.values");

        let listed = SectionContent::Chart(ChartSet::from(vec![zero_pie]));
        assert_eq!(render_error_location(&listed), "sections[3].chart_spec[0].values");
    }
}
