//! Raster chart rendering.
//!
//! Charts are drawn into an [`image::RgbImage`] sized from the requested
//! figure dimensions and the configured DPI.  Text is not rasterized: bar and
//! line charts report their [`CategoryAxis`] so the labels can be typeset
//! under the plot, and every chart carries a colored legend.

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

use crate::config::ChartDefaults;
use crate::model::{ChartKind, ChartLabel, ChartSpec};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const GRID_LINES: usize = 4;
const MAX_DIMENSION_PX: f64 = 4000.0;
/// Horizontal extent of the plot area as fractions of the image width.
const PLOT_LEFT: f64 = 0.08;
const PLOT_RIGHT: f64 = 0.96;

/// Default palette used when a chart does not specify a color.
pub const PALETTE: &[[u8; 3]] = &[
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("yellow", [255, 255, 0]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
];

/// Errors raised while drawing a chart.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ChartError {
    /// The color string is neither a hex color nor a known color name.
    #[error("unsupported color `{0}`; use #RGB, #RRGGBB or a basic color name")]
    InvalidColor(String),
    /// A pie chart needs a positive total to compute proportions.
    #[error("pie chart values must have a positive total, got {0}")]
    NonPositiveTotal(f64),
    /// A pie chart wedge cannot be negative.
    #[error("pie chart value at index {index} is negative ({value})")]
    NegativeValue { index: usize, value: f64 },
}

impl ChartError {
    /// Name of the chart spec field the error is attributed to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidColor(_) => "color",
            Self::NonPositiveTotal(_) | Self::NegativeValue { .. } => "values",
        }
    }
}

/// One legend line printed under the figure.
#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub detail: String,
    pub color: [u8; 3],
}

/// Category labels laid out along the x axis of a bar or line chart.
///
/// The plot spans `start..end` (fractions of the image width) and is divided
/// into one equal slot per label, in label order.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryAxis {
    pub labels: Vec<String>,
    pub start: f64,
    pub end: f64,
}

impl CategoryAxis {
    fn new(labels: &[ChartLabel]) -> Self {
        Self {
            labels: labels.iter().map(ToString::to_string).collect(),
            start: PLOT_LEFT,
            end: PLOT_RIGHT,
        }
    }
}

/// A drawn chart together with its physical size and legend.
pub struct RenderedChart {
    pub image: DynamicImage,
    /// Figure width in inches.
    pub width_in: f64,
    /// Figure height in inches.
    pub height_in: f64,
    /// Category axis labels; `None` for pie charts.
    pub axis: Option<CategoryAxis>,
    pub legend: Vec<LegendEntry>,
}

/// Draws `spec` using `defaults` for omitted dimensions.
pub fn render_chart(spec: &ChartSpec, defaults: &ChartDefaults) -> Result<RenderedChart, ChartError> {
    let uniform = spec.color().map(parse_color).transpose()?;
    let width_in = spec.width_in().unwrap_or(defaults.width_in);
    let height_in = spec.height_in().unwrap_or(defaults.height_in);
    let width_px = pixels(width_in, defaults.dpi);
    let height_px = pixels(height_in, defaults.dpi);

    let mut canvas = Canvas::new(width_px, height_px);
    let color_at = |index: usize| uniform.unwrap_or_else(|| palette_color(index));

    let (axis, legend) = match spec.kind() {
        ChartKind::Bar => {
            canvas.draw_bars(spec.values(), &color_at);
            (
                Some(CategoryAxis::new(spec.labels())),
                value_legend(spec.labels(), spec.values(), &color_at),
            )
        }
        ChartKind::Line => {
            let color = uniform.unwrap_or_else(|| palette_color(0));
            canvas.draw_line_series(spec.values(), color);
            (
                Some(CategoryAxis::new(spec.labels())),
                value_legend(spec.labels(), spec.values(), &|_| color),
            )
        }
        ChartKind::Pie => {
            let total = pie_total(spec.values())?;
            canvas.draw_pie(spec.values(), total, &color_at);
            let legend = spec
                .labels()
                .iter()
                .zip(spec.values())
                .enumerate()
                .map(|(index, (label, value))| LegendEntry {
                    label: label.to_string(),
                    detail: format!("{:.1}%", value / total * 100.0),
                    color: color_at(index).0,
                })
                .collect();
            (None, legend)
        }
    };

    Ok(RenderedChart {
        image: DynamicImage::ImageRgb8(canvas.into_image()),
        width_in,
        height_in,
        axis,
        legend,
    })
}

/// Parses `#RGB`, `#RRGGBB` (the `#` is optional) or a basic color name.
pub fn parse_color(input: &str) -> Result<Rgb<u8>, ChartError> {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();
    if let Some((_, rgb)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return Ok(Rgb(*rgb));
    }

    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChartError::InvalidColor(input.to_owned()));
    }

    let channel = |digits: &str| {
        u8::from_str_radix(digits, 16).map_err(|_| ChartError::InvalidColor(input.to_owned()))
    };
    match hex.len() {
        6 => Ok(Rgb([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?])),
        3 => {
            let expand = |index: usize| channel(hex[index..index + 1].repeat(2).as_str());
            Ok(Rgb([expand(0)?, expand(1)?, expand(2)?]))
        }
        _ => Err(ChartError::InvalidColor(input.to_owned())),
    }
}

fn palette_color(index: usize) -> Rgb<u8> {
    Rgb(PALETTE[index % PALETTE.len()])
}

fn pixels(inches: f64, dpi: f64) -> u32 {
    (inches * dpi).round().clamp(16.0, MAX_DIMENSION_PX) as u32
}

fn pie_total(values: &[f64]) -> Result<f64, ChartError> {
    if let Some((index, value)) = values.iter().enumerate().find(|(_, value)| **value < 0.0) {
        return Err(ChartError::NegativeValue {
            index,
            value: *value,
        });
    }
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        Ok(total)
    } else {
        Err(ChartError::NonPositiveTotal(total))
    }
}

fn value_legend(
    labels: &[ChartLabel],
    values: &[f64],
    color_at: &dyn Fn(usize) -> Rgb<u8>,
) -> Vec<LegendEntry> {
    labels
        .iter()
        .zip(values)
        .enumerate()
        .map(|(index, (label, value))| LegendEntry {
            label: label.to_string(),
            detail: crate::model::format_number(*value),
            color: color_at(index).0,
        })
        .collect()
}

/// Plot area inside the image, in pixels.
#[derive(Clone, Copy, Debug)]
struct PlotArea {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl PlotArea {
    fn width(&self) -> f64 {
        self.right - self.left
    }

    fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Maps `value` within `[low, high]` to a y pixel coordinate.
    fn y_for(&self, value: f64, low: f64, high: f64) -> f64 {
        self.bottom - (value - low) / (high - low) * self.height()
    }
}

struct Canvas {
    image: RgbImage,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            image: ImageBuffer::from_pixel(width, height, BACKGROUND),
        }
    }

    fn into_image(self) -> RgbImage {
        self.image
    }

    fn width(&self) -> f64 {
        self.image.width() as f64
    }

    fn height(&self) -> f64 {
        self.image.height() as f64
    }

    fn plot_area(&self) -> PlotArea {
        PlotArea {
            left: self.width() * PLOT_LEFT,
            top: self.height() * 0.06,
            right: self.width() * PLOT_RIGHT,
            bottom: self.height() * 0.90,
        }
    }

    fn stroke(&self) -> f64 {
        (self.height().min(self.width()) / 200.0).max(1.0)
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height() {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    fn fill_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgb<u8>) {
        let (left, right) = (x0.min(x1).round() as i64, x0.max(x1).round() as i64);
        let (top, bottom) = (y0.min(y1).round() as i64, y0.max(y1).round() as i64);
        for y in top..=bottom {
            for x in left..=right {
                self.put(x, y, color);
            }
        }
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Rgb<u8>) {
        let r = radius.ceil() as i64;
        let (cx_i, cy_i) = (cx.round() as i64, cy.round() as i64);
        for dy in -r..=r {
            for dx in -r..=r {
                if ((dx * dx + dy * dy) as f64) <= radius * radius {
                    self.put(cx_i + dx, cy_i + dy, color);
                }
            }
        }
    }

    fn draw_segment(&mut self, from: (f64, f64), to: (f64, f64), thickness: f64, color: Rgb<u8>) {
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as usize;
        let half = thickness / 2.0;
        for step in 0..=steps {
            let t = step as f64 / steps as f64;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            self.fill_rect(x - half, y - half, x + half, y + half, color);
        }
    }

    fn draw_axes(&mut self, area: PlotArea, baseline_y: f64) {
        let stroke = self.stroke();
        for line in 0..=GRID_LINES {
            let y = area.top + area.height() * line as f64 / GRID_LINES as f64;
            self.draw_segment((area.left, y), (area.right, y), 1.0, GRID);
        }
        self.draw_segment((area.left, area.top), (area.left, area.bottom), stroke, AXIS);
        self.draw_segment((area.left, baseline_y), (area.right, baseline_y), stroke, AXIS);
    }

    fn draw_bars(&mut self, values: &[f64], color_at: &dyn Fn(usize) -> Rgb<u8>) {
        let area = self.plot_area();
        let (low, high) = value_range(values, true);
        let baseline = area.y_for(0.0, low, high);
        self.draw_axes(area, baseline);
        if values.is_empty() {
            return;
        }

        let slot = area.width() / values.len() as f64;
        for (index, value) in values.iter().enumerate() {
            let center = area.left + slot * (index as f64 + 0.5);
            let half = slot * 0.35;
            let top = area.y_for(*value, low, high);
            self.fill_rect(center - half, top, center + half, baseline, color_at(index));
        }
    }

    fn draw_line_series(&mut self, values: &[f64], color: Rgb<u8>) {
        let area = self.plot_area();
        let (low, high) = value_range(values, false);
        self.draw_axes(area, area.bottom);
        if values.is_empty() {
            return;
        }

        let slot = area.width() / values.len() as f64;
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                (
                    area.left + slot * (index as f64 + 0.5),
                    area.y_for(*value, low, high),
                )
            })
            .collect();

        let stroke = self.stroke() * 1.5;
        for pair in points.windows(2) {
            self.draw_segment(pair[0], pair[1], stroke, color);
        }
        for (x, y) in points {
            self.fill_circle(x, y, stroke * 2.0, color);
        }
    }

    fn draw_pie(&mut self, values: &[f64], total: f64, color_at: &dyn Fn(usize) -> Rgb<u8>) {
        let cx = self.width() / 2.0;
        let cy = self.height() / 2.0;
        let radius = self.width().min(self.height()) * 0.45;

        // Cumulative wedge boundaries as fractions of a full turn.
        let mut bounds = Vec::with_capacity(values.len());
        let mut running = 0.0;
        for value in values {
            running += value / total;
            bounds.push(running);
        }

        let r = radius.ceil() as i64;
        for dy in -r..=r {
            for dx in -r..=r {
                let (fx, fy) = (dx as f64, dy as f64);
                if fx * fx + fy * fy > radius * radius {
                    continue;
                }
                // Clockwise from twelve o'clock.
                let mut turn = fx.atan2(-fy) / std::f64::consts::TAU;
                if turn < 0.0 {
                    turn += 1.0;
                }
                let index = bounds
                    .iter()
                    .position(|bound| turn < *bound)
                    .unwrap_or(values.len().saturating_sub(1));
                self.put(cx.round() as i64 + dx, cy.round() as i64 + dy, color_at(index));
            }
        }
    }
}

fn value_range(values: &[f64], include_zero: bool) -> (f64, f64) {
    let mut low = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !low.is_finite() || !high.is_finite() {
        return (0.0, 1.0);
    }
    if include_zero {
        low = low.min(0.0);
        high = high.max(0.0);
    }
    if (high - low).abs() < f64::EPSILON {
        low -= 1.0;
        high += 1.0;
    }
    let pad = (high - low) * 0.05;
    (if low < 0.0 || !include_zero { low - pad } else { low }, high + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn spec(kind: ChartKind, values: &[f64]) -> ChartSpec {
        let labels = (0..values.len())
            .map(|index| ChartLabel::Text(format!("L{}", index)))
            .collect();
        ChartSpec::new(kind, labels, values.to_vec())
    }

    #[test]
    fn default_size_is_six_by_four_inches() {
        let chart = render_chart(&spec(ChartKind::Bar, &[1.0, 2.0]), &ChartDefaults::default())
            .expect("bar chart");
        assert_eq!(chart.width_in, 6.0);
        assert_eq!(chart.height_in, 4.0);
        assert_eq!(chart.image.dimensions(), (600, 400));
    }

    #[test]
    fn explicit_size_overrides_defaults() {
        let chart = render_chart(
            &spec(ChartKind::Line, &[1.0, 4.0, 9.0]).with_size(Some(3.0), Some(2.0)),
            &ChartDefaults::default(),
        )
        .unwrap();
        assert_eq!(chart.image.dimensions(), (300, 200));
    }

    #[test]
    fn uniform_color_applies_to_all_bars() {
        let chart = render_chart(
            &spec(ChartKind::Bar, &[1.0, 2.0, 3.0]).with_color(Some("#ff0000".to_owned())),
            &ChartDefaults::default(),
        )
        .unwrap();
        assert!(chart.legend.iter().all(|entry| entry.color == [255, 0, 0]));

        let rgb = chart.image.to_rgb8();
        assert!(rgb.pixels().any(|pixel| *pixel == Rgb([255, 0, 0])));
    }

    #[test]
    fn bars_use_palette_without_color() {
        let chart =
            render_chart(&spec(ChartKind::Bar, &[1.0, 2.0]), &ChartDefaults::default()).unwrap();
        assert_eq!(chart.legend[0].color, PALETTE[0]);
        assert_eq!(chart.legend[1].color, PALETTE[1]);
        assert_eq!(chart.legend[1].detail, "2");
    }

    #[test]
    fn category_axis_follows_label_order() {
        let chart = render_chart(&spec(ChartKind::Bar, &[4.0, 1.0, 2.0]), &ChartDefaults::default())
            .unwrap();
        let axis = chart.axis.expect("bar charts have a category axis");
        assert_eq!(axis.labels, ["L0", "L1", "L2"]);
        assert!(axis.start < axis.end);

        // The first bar is centered in the first slot of the plot area.
        let rgb = chart.image.to_rgb8();
        let slot = (axis.end - axis.start) * 600.0 / 3.0;
        let center_x = (axis.start * 600.0 + slot * 0.5) as u32;
        assert_eq!(*rgb.get_pixel(center_x, 300), Rgb(PALETTE[0]));

        let line = render_chart(&spec(ChartKind::Line, &[1.0, 2.0]), &ChartDefaults::default())
            .unwrap();
        assert_eq!(line.axis.map(|axis| axis.labels.len()), Some(2));
        let pie = render_chart(&spec(ChartKind::Pie, &[1.0, 2.0]), &ChartDefaults::default())
            .unwrap();
        assert!(pie.axis.is_none());
    }

    #[test]
    fn pie_legend_reports_shares() {
        let chart =
            render_chart(&spec(ChartKind::Pie, &[3.0, 7.0]), &ChartDefaults::default()).unwrap();
        let details: Vec<_> = chart.legend.iter().map(|entry| entry.detail.as_str()).collect();
        assert_eq!(details, ["30.0%", "70.0%"]);
    }

    #[test]
    fn pie_with_zero_total_is_rejected() {
        let err = render_chart(&spec(ChartKind::Pie, &[0.0, 0.0, 0.0]), &ChartDefaults::default())
            .err()
            .expect("zero total must fail");
        assert_eq!(err, ChartError::NonPositiveTotal(0.0));
        assert_eq!(err.field(), "values");
    }

    #[test]
    fn pie_with_negative_wedge_is_rejected() {
        let err = render_chart(&spec(ChartKind::Pie, &[5.0, -1.0]), &ChartDefaults::default())
            .err()
            .unwrap();
        assert_eq!(err, ChartError::NegativeValue { index: 1, value: -1.0 });
    }

    #[test]
    fn negative_bars_render() {
        assert!(render_chart(&spec(ChartKind::Bar, &[-2.0, 3.0]), &ChartDefaults::default()).is_ok());
    }

    #[test]
    fn empty_series_render_axes_only() {
        assert!(render_chart(&spec(ChartKind::Line, &[]), &ChartDefaults::default()).is_ok());
        assert!(render_chart(&spec(ChartKind::Bar, &[]), &ChartDefaults::default()).is_ok());
    }

    #[test]
    fn color_parsing() {
        assert_eq!(parse_color("#00ff7F").unwrap(), Rgb([0, 255, 127]));
        assert_eq!(parse_color("abc").unwrap(), Rgb([0xaa, 0xbb, 0xcc]));
        assert_eq!(parse_color("Navy").unwrap(), Rgb([0, 0, 128]));
        assert!(matches!(parse_color("#12FG34"), Err(ChartError::InvalidColor(_))));
        assert!(matches!(parse_color("#1234"), Err(ChartError::InvalidColor(_))));
        assert_eq!(ChartError::InvalidColor("x".into()).field(), "color");
    }
}
