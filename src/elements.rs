//! Report-specific element implementations built on top of `genpdf` primitives.
//!
//! [`Figure`] places an image (logo or chart) with optional axis labels and a
//! caption, scaled to fit the page.  [`SectionHeading`] keeps a heading
//! together with the first line of its content and records the page it lands
//! on.  [`WrappedText`] is a paragraph that breaks over-long words using the
//! measured glyph widths of the font it is rendered with.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use genpdf::elements::{Image, Paragraph};
use genpdf::error::{Context as _, Error};
use genpdf::style::{Style, StyledString};
use genpdf::{render, Alignment, Element, Mm, Position, RenderResult, Scale, Size};

use crate::builder::PageCounter;

const DEFAULT_IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;
const DEFAULT_CAPTION_SPACING_MM: f64 = 2.0;
/// Room left beside each broken word for rounding in the line wrapper.
const WRAP_SLACK_MM: f64 = 0.2;
/// Axis label slots narrower than this many widest glyphs are merged.
const AXIS_SLOT_GLYPHS: f64 = 3.0;
/// Resolution of the weights used to split areas, in units per millimetre.
const SPLIT_UNITS_PER_MM: f64 = 100.0;

pub(crate) fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

pub(crate) fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

/// Converts inches to millimetres.
pub(crate) fn mm_from_inches(inches: f64) -> Mm {
    mm_from_f64(inches * MM_PER_INCH)
}

fn estimated_image_size(image: &DynamicImage, dpi: f64) -> Size {
    let (px_width, px_height) = image.dimensions();
    let width_mm = MM_PER_INCH * (px_width as f64) / dpi;
    let height_mm = MM_PER_INCH * (px_height as f64) / dpi;
    Size::new(mm_from_f64(width_mm), mm_from_f64(height_mm))
}

/// Loads an image from the given path using the [`image`] crate with descriptive errors.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<DynamicImage, Error> {
    let path = path.as_ref();
    let reader = image::io::Reader::open(path)
        .with_context(|| format!("Failed to open image file {}", path.display()))?;
    reader
        .with_guessed_format()
        .context("Unable to determine image format")?
        .decode()
        .with_context(|| format!("Failed to decode image file {}", path.display()))
}

/// Composites transparent pixels onto white; the PDF backend rejects alpha channels.
pub fn flatten_alpha(image: DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return image;
    }

    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f64 / 255.0;
        let blend = |channel: u8| (channel as f64 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        flattened.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(flattened)
}

/// An image with optional axis labels and a caption stacked underneath.
///
/// The rendered width defaults to the requested physical width and is reduced
/// (keeping the aspect ratio) whenever the image would exceed the maximum size
/// or the width of the render area.  Axis labels are laid out under the image,
/// spanning exactly its rendered width.  Once the image is placed, labels or a
/// caption that spill onto the next page are continued without repeating the
/// image.
pub struct Figure {
    image: Image,
    axis: Option<AxisLabels>,
    caption: Option<WrappedText>,
    alignment: Alignment,
    natural_size: Size,
    requested_width: Option<Mm>,
    max_size: Option<Size>,
    spacing: Mm,
    /// Horizontal offset and width of the placed image.
    placement: Option<(f64, f64)>,
    axis_done: bool,
    caption_started: bool,
    deferred: bool,
}

impl Figure {
    /// Creates a figure from a decoded image.
    pub fn from_dynamic_image(image: DynamicImage) -> Result<Self, Error> {
        let image = flatten_alpha(image);
        let natural_size = estimated_image_size(&image, DEFAULT_IMAGE_DPI);
        let image = Image::from_dynamic_image(image)?;
        Ok(Self {
            image,
            axis: None,
            caption: None,
            alignment: Alignment::Left,
            natural_size,
            requested_width: None,
            max_size: None,
            spacing: mm_from_f64(DEFAULT_CAPTION_SPACING_MM),
            placement: None,
            axis_done: false,
            caption_started: false,
            deferred: false,
        })
    }

    /// Creates a figure from the image file located at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_dynamic_image(decode_image_from_path(path)?)
    }

    /// Sets the caption and returns the updated figure.
    pub fn with_caption(mut self, caption: impl Into<Option<WrappedText>>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Adds category labels under the image.
    pub fn with_axis(mut self, axis: impl Into<Option<AxisLabels>>) -> Self {
        self.axis = axis.into();
        self
    }

    /// Sets the horizontal alignment used by both the image and the caption.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Requests a rendered width while preserving the aspect ratio.
    pub fn with_width(mut self, width: impl Into<Option<Mm>>) -> Self {
        self.requested_width = width.into();
        self
    }

    /// Bounds the rendered image size.
    pub fn with_max_size(mut self, max_size: impl Into<Option<Size>>) -> Self {
        self.max_size = max_size.into();
        self
    }

    /// Returns the rendered image size for an area `available_width` wide.
    pub fn rendered_size(&self, available_width: Mm) -> Size {
        let scale = self.scale(available_width);
        Size::new(
            mm_from_f64(mm_to_f64(self.natural_size.width) * scale),
            mm_from_f64(mm_to_f64(self.natural_size.height) * scale),
        )
    }

    fn scale(&self, available_width: Mm) -> f64 {
        let natural_width = mm_to_f64(self.natural_size.width);
        let natural_height = mm_to_f64(self.natural_size.height);
        if natural_width <= f64::EPSILON || natural_height <= f64::EPSILON {
            return 1.0;
        }

        let mut scale = self
            .requested_width
            .map(|width| mm_to_f64(width) / natural_width)
            .unwrap_or(1.0);
        if let Some(max) = self.max_size {
            scale = scale
                .min(mm_to_f64(max.width) / natural_width)
                .min(mm_to_f64(max.height) / natural_height);
        }
        scale.min(mm_to_f64(available_width) / natural_width)
    }

    fn apply_alignment(&mut self) {
        self.image.set_alignment(self.alignment);
        if let Some(caption) = &mut self.caption {
            caption.set_alignment(self.alignment);
        }
    }

    /// Horizontal offset of an image `width` wide inside `available` millimetres.
    fn offset_for(&self, available: f64, width: f64) -> f64 {
        let free = (available - width).max(0.0);
        match self.alignment {
            Alignment::Left => 0.0,
            Alignment::Center => free / 2.0,
            Alignment::Right => free,
        }
    }
}

impl Element for Figure {
    fn render(
        &mut self,
        context: &genpdf::Context,
        mut area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        self.apply_alignment();
        let mut result = RenderResult::default();

        if self.placement.is_none() {
            let size = self.rendered_size(area.size().width);
            let axis_height = match &self.axis {
                Some(axis) => axis.line_height(context, style),
                None => mm_from_f64(0.0),
            };
            if size.height + axis_height > area.size().height && !self.deferred {
                self.deferred = true;
                return Ok(deferral());
            }

            let scale = self.scale(area.size().width);
            self.image.set_scale(Scale::new(scale, scale));
            let image_result = self.image.render(context, area.clone(), style)?;
            result.size = result.size.stack_vertical(image_result.size);
            if image_result.has_more {
                result.has_more = true;
                return Ok(result);
            }

            let available = mm_to_f64(area.size().width);
            let width = mm_to_f64(size.width).min(available);
            self.placement = Some((self.offset_for(available, width), width));
            area.add_offset(Position::new(0, image_result.size.height));
        }

        if let (Some(axis), false) = (&mut self.axis, self.axis_done) {
            let (offset, width) = self.placement.unwrap_or((0.0, mm_to_f64(area.size().width)));
            let available = mm_to_f64(area.size().width);
            let columns = area.split_horizontally(&[
                split_units(offset),
                split_units(width).max(1),
                split_units(available - offset - width),
            ]);
            let axis_result = match columns.into_iter().nth(1) {
                Some(column) => axis.render(context, column, style)?,
                None => RenderResult::default(),
            };
            result.size = result
                .size
                .stack_vertical(Size::new(mm_from_f64(width), axis_result.size.height));
            if axis_result.has_more {
                result.has_more = true;
                return Ok(result);
            }
            self.axis_done = true;
            area.add_offset(Position::new(0, axis_result.size.height));
        }

        if let Some(caption) = &mut self.caption {
            if !self.caption_started {
                self.caption_started = true;
                area.add_offset(Position::new(0, self.spacing));
                result.size = result.size.stack_vertical(Size::new(0, self.spacing));
            }
            let caption_result = caption.render(context, area, style)?;
            result.size = result.size.stack_vertical(caption_result.size);
            result.has_more |= caption_result.has_more;
        }

        Ok(result)
    }
}

fn split_units(mm: f64) -> usize {
    (mm.max(0.0) * SPLIT_UNITS_PER_MM).round() as usize
}

/// Re-breaks `text` so that no word is wider than `max_width`.
///
/// Words are separated by single spaces; a word wider than `max_width` is
/// split into the longest prefixes that fit (at least one character each).
/// Text whose words all fit is returned unchanged.
pub(crate) fn fit_words(text: &str, max_width: f64, width_of: impl Fn(&str) -> f64) -> String {
    text.split(' ')
        .map(|word| {
            if word.is_empty() || width_of(word) <= max_width {
                return word.to_owned();
            }
            let mut chunks: Vec<String> = Vec::new();
            let mut chunk = String::new();
            for c in word.chars() {
                chunk.push(c);
                if chunk.chars().count() > 1 && width_of(&chunk) > max_width {
                    chunk.pop();
                    chunks.push(std::mem::take(&mut chunk));
                    chunk.push(c);
                }
            }
            if !chunk.is_empty() {
                chunks.push(chunk);
            }
            chunks.join(" ")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A paragraph that never fails on words wider than its area.
///
/// On first render the text is re-broken with [`fit_words`], measuring each
/// word with the effective style of its segment, and then laid out by a plain
/// [`Paragraph`].
pub struct WrappedText {
    segments: Vec<StyledString>,
    alignment: Alignment,
    paragraph: Option<Paragraph>,
}

impl WrappedText {
    /// Creates an empty text element; add segments with [`WrappedText::push`].
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            alignment: Alignment::Left,
            paragraph: None,
        }
    }

    /// Creates a text element with a single segment.
    pub fn new(text: impl Into<StyledString>) -> Self {
        let mut wrapped = Self::empty();
        wrapped.push(text);
        wrapped
    }

    /// Appends a segment.
    pub fn push(&mut self, text: impl Into<StyledString>) {
        self.segments.push(text.into());
    }

    pub fn set_alignment(&mut self, alignment: Alignment) {
        self.alignment = alignment;
    }

    /// Sets the alignment and returns the updated element.
    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.set_alignment(alignment);
        self
    }
}

impl Element for WrappedText {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        if self.paragraph.is_none() {
            let width = mm_to_f64(area.size().width);
            let mut paragraph = Paragraph::default();
            paragraph.set_alignment(self.alignment);
            for segment in self.segments.drain(..) {
                let effective = style.and(segment.style);
                let measure = |s: &str| mm_to_f64(effective.str_width(&context.font_cache, s));
                let budget = width - measure(" ") - WRAP_SLACK_MM;
                let text = fit_words(&segment.s, budget, measure);
                paragraph.push(StyledString::new(text, segment.style));
            }
            self.paragraph = Some(paragraph);
        }

        match &mut self.paragraph {
            Some(paragraph) => paragraph.render(context, area, style),
            None => Ok(RenderResult::default()),
        }
    }
}

/// Category labels laid out under a chart image.
///
/// The image width is split into the plot area (`start..end`, as fractions of
/// the width) and one equal slot per label.  When slots are too narrow for
/// legible text, consecutive slots are merged and only the first label of each
/// merged group is printed.
pub struct AxisLabels {
    labels: Vec<String>,
    start: f64,
    end: f64,
    style: Style,
    cells: Option<Vec<(usize, WrappedText, bool)>>,
}

impl AxisLabels {
    pub fn new(labels: Vec<String>, start: f64, end: f64, style: Style) -> Self {
        Self {
            labels,
            start: start.clamp(0.0, 1.0),
            end: end.clamp(0.0, 1.0),
            style,
            cells: None,
        }
    }

    fn line_height(&self, context: &genpdf::Context, style: Style) -> Mm {
        if self.labels.is_empty() {
            return mm_from_f64(0.0);
        }
        style.and(self.style).line_height(&context.font_cache)
    }

    /// Number of consecutive slots merged per printed label.
    fn step(&self, slot_width: f64, glyph_width: f64) -> usize {
        if slot_width <= 0.0 {
            return self.labels.len().max(1);
        }
        ((glyph_width * AXIS_SLOT_GLYPHS / slot_width).ceil() as usize).max(1)
    }

    /// Split weights: left margin, one weight per printed group, right margin.
    fn weights(&self, step: usize) -> Vec<usize> {
        let count = self.labels.len();
        let boundary = |slot: usize| {
            let fraction = self.start + (self.end - self.start) * slot as f64 / count as f64;
            (fraction * 100.0 * SPLIT_UNITS_PER_MM).round() as usize
        };
        let mut weights = vec![boundary(0)];
        let mut slot = 0;
        while slot < count {
            let next = (slot + step).min(count);
            weights.push(boundary(next) - boundary(slot));
            slot = next;
        }
        weights.push((100.0 * SPLIT_UNITS_PER_MM) as usize - boundary(count));
        weights
    }
}

impl Element for AxisLabels {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        if self.labels.is_empty() || self.end <= self.start {
            return Ok(result);
        }

        let width = mm_to_f64(area.size().width);
        let label_style = style.and(self.style);
        let slot_width = width * (self.end - self.start) / self.labels.len() as f64;
        let glyph_width = mm_to_f64(label_style.char_width(&context.font_cache, 'W'));
        let step = self.step(slot_width, glyph_width);
        let weights = self.weights(step);

        let labels = &self.labels;
        let own_style = self.style;
        let cells = self.cells.get_or_insert_with(|| {
            labels
                .iter()
                .step_by(step)
                .enumerate()
                .map(|(group, label)| {
                    let text = WrappedText::new(StyledString::new(label.clone(), own_style))
                        .aligned(Alignment::Center);
                    (group + 1, text, false)
                })
                .collect()
        });

        let columns = area.split_horizontally(&weights);
        for (column, text, done) in cells.iter_mut() {
            if *done {
                continue;
            }
            let Some(cell_area) = columns.get(*column) else {
                *done = true;
                continue;
            };
            let cell_result = text.render(context, cell_area.clone(), style)?;
            if cell_result.size.height > result.size.height {
                result.size.height = cell_result.size.height;
            }
            *done = !cell_result.has_more;
            result.has_more |= cell_result.has_more;
        }
        result.size.width = area.size().width;
        Ok(result)
    }
}

/// Records the page each section heading lands on.
#[derive(Clone, Debug, Default)]
pub struct SectionPages(Rc<RefCell<Vec<Option<usize>>>>);

impl SectionPages {
    /// Creates a log for `sections` headings.
    pub fn new(sections: usize) -> Self {
        Self(Rc::new(RefCell::new(vec![None; sections])))
    }

    fn record(&self, index: usize, page: usize) {
        let mut pages = self.0.borrow_mut();
        if let Some(slot) = pages.get_mut(index) {
            slot.get_or_insert(page);
        }
    }

    /// Returns the recorded pages in section order.
    pub fn snapshot(&self) -> Vec<Option<usize>> {
        self.0.borrow().clone()
    }
}

/// Asks the layout for a new page without placing anything.
///
/// The non-zero width keeps the document renderer from treating the result as
/// an element that cannot fit on an empty page.
fn deferral() -> RenderResult {
    let mut result = RenderResult::default();
    result.size = Size::new(1, 0);
    result.has_more = true;
    result
}

/// A section heading that is never left alone at the bottom of a page.
///
/// Before rendering, the heading checks that the remaining area can hold the
/// heading plus `keep_lines` lines of body text and any extra `keep_space`.
/// Otherwise it asks for a new page (only once, so oversized headings still
/// render).
pub struct SectionHeading {
    text: String,
    style: Style,
    keep_lines: f64,
    keep_space: Mm,
    index: usize,
    pages: PageCounter,
    log: SectionPages,
    deferred: bool,
    paragraph: Option<WrappedText>,
}

impl SectionHeading {
    /// Creates the heading for section `index`.
    pub fn new(
        text: impl Into<String>,
        style: Style,
        index: usize,
        pages: PageCounter,
        log: SectionPages,
    ) -> Self {
        Self {
            text: text.into(),
            style,
            keep_lines: 1.0,
            keep_space: mm_from_f64(0.0),
            index,
            pages,
            log,
            deferred: false,
            paragraph: None,
        }
    }

    /// Sets how many body lines must fit below the heading.
    pub fn with_keep_lines(mut self, keep_lines: f64) -> Self {
        self.keep_lines = keep_lines;
        self
    }

    /// Reserves additional space below the heading, e.g. for a figure.
    pub fn with_keep_space(mut self, keep_space: Mm) -> Self {
        self.keep_space = keep_space;
        self
    }
}

impl Element for SectionHeading {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        if self.paragraph.is_none() {
            let heading_style = style.and(self.style);
            let needed = mm_to_f64(heading_style.line_height(&context.font_cache))
                + mm_to_f64(style.line_height(&context.font_cache)) * self.keep_lines
                + mm_to_f64(self.keep_space);

            if mm_to_f64(area.size().height) < needed && !self.deferred {
                self.deferred = true;
                return Ok(deferral());
            }

            self.log.record(self.index, self.pages.current());
            self.paragraph = Some(WrappedText::new(StyledString::new(
                self.text.clone(),
                self.style,
            )));
        }

        match &mut self.paragraph {
            Some(paragraph) => paragraph.render(context, area, style),
            None => Ok(RenderResult::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn figure(width: u32, height: u32) -> Figure {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb([10u8, 20, 30]));
        Figure::from_dynamic_image(DynamicImage::ImageRgb8(buffer)).expect("figure")
    }

    #[test]
    fn requested_width_keeps_aspect_ratio() {
        // 600 x 300 px at 300 dpi is 50.8 x 25.4 mm.
        let figure = figure(600, 300).with_width(mm_from_f64(101.6));
        let size = figure.rendered_size(mm_from_f64(500.0));
        assert!((mm_to_f64(size.width) - 101.6).abs() < 1e-6);
        assert!((mm_to_f64(size.height) - 50.8).abs() < 1e-6);
    }

    #[test]
    fn figure_shrinks_to_available_width_and_max_height() {
        let figure = figure(600, 300)
            .with_width(mm_from_f64(200.0))
            .with_max_size(Size::new(mm_from_f64(300.0), mm_from_f64(40.0)));
        let size = figure.rendered_size(mm_from_f64(150.0));
        assert!((mm_to_f64(size.height) - 40.0).abs() < 1e-6);
        assert!((mm_to_f64(size.width) - 80.0).abs() < 1e-6);

        let narrow = figure.rendered_size(mm_from_f64(60.0));
        assert!((mm_to_f64(narrow.width) - 60.0).abs() < 1e-6);
    }

    #[test]
    fn alpha_is_composited_onto_white() {
        let buffer = ImageBuffer::from_pixel(2, 2, Rgba([0u8, 0, 0, 0]));
        let flattened = flatten_alpha(DynamicImage::ImageRgba8(buffer));
        assert!(!flattened.color().has_alpha());
        assert_eq!(flattened.to_rgb8().get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    fn char_count(s: &str) -> f64 {
        s.chars().count() as f64
    }

    #[test]
    fn fit_words_keeps_text_that_fits() {
        assert_eq!(fit_words("short words stay", 6.0, char_count), "short words stay");
        assert_eq!(fit_words("  double  spaces ", 6.0, char_count), "  double  spaces ");
    }

    #[test]
    fn fit_words_splits_by_measured_width() {
        assert_eq!(fit_words("abcdefgh ij", 3.0, char_count), "abc def gh ij");

        // Wide glyphs count double, so fewer of them fit per chunk.
        let wide = |s: &str| s.chars().map(|c| if c == 'W' { 2.0 } else { 1.0 }).sum::<f64>();
        assert_eq!(fit_words("WWWWW", 4.0, wide), "WW WW W");
        assert_eq!(fit_words("iiWii", 4.0, wide), "iiW ii");
    }

    #[test]
    fn fit_words_emits_single_glyphs_when_nothing_fits() {
        assert_eq!(fit_words("abc", 0.5, char_count), "a b c");
    }

    #[test]
    fn axis_slots_merge_when_too_narrow() {
        let labels = (0..10).map(|index| format!("L{}", index)).collect();
        let axis = AxisLabels::new(labels, 0.1, 0.9, Style::new());
        assert_eq!(axis.step(10.0, 2.0), 1);
        assert_eq!(axis.step(2.0, 2.0), 3);
        assert_eq!(axis.step(0.0, 2.0), 10);

        let weights = axis.weights(1);
        assert_eq!(weights.len(), 12);
        assert_eq!(weights.iter().sum::<usize>(), 10_000);
        assert_eq!(weights[0], 1_000);
        assert_eq!(weights[11], 1_000);

        let merged = axis.weights(3);
        assert_eq!(merged.len(), 2 + 4);
        assert_eq!(merged.iter().sum::<usize>(), 10_000);
    }

    #[test]
    fn figure_offsets_follow_alignment() {
        let centered = figure(600, 300).with_alignment(Alignment::Center);
        assert!((centered.offset_for(100.0, 60.0) - 20.0).abs() < 1e-9);
        let right = figure(600, 300).with_alignment(Alignment::Right);
        assert!((right.offset_for(100.0, 60.0) - 40.0).abs() < 1e-9);
        assert_eq!(figure(600, 300).offset_for(50.0, 60.0), 0.0);
    }

    #[test]
    fn section_pages_keep_first_recorded_page() {
        let log = SectionPages::new(2);
        log.record(0, 2);
        log.record(0, 3);
        log.record(5, 1);
        assert_eq!(log.snapshot(), vec![Some(2), None]);
    }
}
