//! Page layout: the cover page followed by the section flow.

use genpdf::elements::{Break, FramedElement, LinearLayout, PageBreak, Paragraph};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{Alignment, Element, Margins, Size};
use log::{debug, warn};

use crate::builder::{DocumentBuilder, FooterSpec, PageCounter};
use crate::composer::RenderOptions;
use crate::config::ComposerConfig;
use crate::elements::{mm_from_f64, mm_to_f64, Figure, SectionHeading, SectionPages, WrappedText};
use crate::error::{ReportError, ResourceWarning};
use crate::model::{Cover, ReportDocument};
use crate::sections::{self, SectionContext};

const TITLE_FONT_SIZE: u8 = 24;
const HEADING_FONT_SIZE: u8 = 16;
/// Gap between a heading and its content, in body lines.
const HEADING_GAP_LINES: f64 = 0.5;
const FOOTER_FONT_SIZE: u8 = 9;
const FOOTER_HEIGHT_MM: f64 = 10.0;
const LOGO_WIDTH_MM: f64 = 50.0;
const LOGO_MAX_HEIGHT_MM: f64 = 40.0;
/// Space kept free above a figure for the section heading.
const HEADING_ALLOWANCE_MM: f64 = 15.0;
/// Space kept free below a figure for its legend.
const LEGEND_ALLOWANCE_MM: f64 = 15.0;
const INSIGHT_COLOR: Color = Color::Rgb(31, 78, 121);
const MUTED_COLOR: Color = Color::Greyscale(110);

/// The rendered document before it is written anywhere.
#[derive(Debug)]
pub(crate) struct ComposedReport {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// The page each section heading landed on, in section order.
    pub section_pages: Vec<Option<usize>>,
    pub warnings: Vec<ResourceWarning>,
}

/// Lays out `document` and renders it into PDF bytes.
pub(crate) fn compose(
    document: &ReportDocument,
    config: &ComposerConfig,
    options: &RenderOptions,
) -> Result<ComposedReport, ReportError> {
    let pages = PageCounter::new();
    let section_log = SectionPages::new(document.sections().len());
    let paper = config.paper.size();

    let footer = FooterSpec::new(mm_from_f64(FOOTER_HEIGHT_MM), |page| {
        let mut paragraph = Paragraph::new(StyledString::new(
            format!("Page {}", page),
            Style::new().with_font_size(FOOTER_FONT_SIZE).with_color(MUTED_COLOR),
        ));
        paragraph.set_alignment(Alignment::Center);
        paragraph
    })
    .skip_first_page(true);

    let mut pdf = DocumentBuilder::new()
        .with_paper_size(paper)
        .with_margins(Margins::all(mm_from_f64(config.margin_mm)))
        .with_fonts_dir(config.fonts_dir.clone())
        .with_font_size(config.font_size)
        .with_title(document.title())
        .with_footer(footer)
        .with_page_counter(pages.clone())
        .build()
        .map_err(ReportError::Font)?;

    let content_width_mm = mm_to_f64(paper.width) - 2.0 * config.margin_mm;
    let content_height_mm = mm_to_f64(paper.height) - 2.0 * config.margin_mm - FOOTER_HEIGHT_MM;
    if content_width_mm <= 0.0 || content_height_mm <= 0.0 {
        return Err(ReportError::render(
            "margin_mm",
            format!("margin of {} mm leaves no printable area", config.margin_mm),
        ));
    }

    let mut warnings = Vec::new();
    pdf.push(cover_page(document, options, &mut warnings));

    if !document.sections().is_empty() {
        pdf.push(PageBreak::new());

        let max_figure = Size::new(
            mm_from_f64(content_width_mm),
            mm_from_f64((content_height_mm - HEADING_ALLOWANCE_MM - LEGEND_ALLOWANCE_MM).max(10.0)),
        );
        let heading_style = Style::new().bold().with_font_size(HEADING_FONT_SIZE);

        for (index, section) in document.sections().iter().enumerate() {
            let context = SectionContext {
                config,
                index,
                content_width_mm,
                max_figure,
            };
            let body = sections::render_content(section.content(), &context)?;
            debug!(
                "section {} ({}): '{}'",
                index,
                section.content().kind(),
                section.title()
            );

            if index > 0 {
                pdf.push(Break::new(1.5));
            }
            pdf.push(
                SectionHeading::new(
                    section.title(),
                    heading_style,
                    index,
                    pages.clone(),
                    section_log.clone(),
                )
                .with_keep_lines(HEADING_GAP_LINES + body.keep_lines)
                .with_keep_space(body.keep_space),
            );
            pdf.push(Break::new(HEADING_GAP_LINES));
            pdf.push(body.layout);
        }
    }

    let mut bytes = Vec::new();
    pdf.render(&mut bytes)
        .map_err(|err| ReportError::render("layout", err.to_string()))?;

    let page_count = pages.current().max(1);
    debug!("laid out {} page(s)", page_count);

    Ok(ComposedReport {
        bytes,
        page_count,
        section_pages: section_log.snapshot(),
        warnings,
    })
}

fn cover_page(
    document: &ReportDocument,
    options: &RenderOptions,
    warnings: &mut Vec<ResourceWarning>,
) -> LinearLayout {
    let mut cover = LinearLayout::vertical();

    if let Some(logo) = document.cover().and_then(|cover| logo_figure(cover, warnings)) {
        cover.push(logo);
        cover.push(Break::new(1.0));
    }

    cover.push(
        WrappedText::new(StyledString::new(
            document.title(),
            Style::new().bold().with_font_size(TITLE_FONT_SIZE),
        ))
        .aligned(Alignment::Center),
    );

    if let Some(generated_at) = &options.generated_at {
        let mut line = Paragraph::new(StyledString::new(
            format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
            Style::new().italic().with_color(MUTED_COLOR),
        ));
        line.set_alignment(Alignment::Center);
        cover.push(line);
    }

    if let Some(summary) = document.summary().filter(|summary| !summary.trim().is_empty()) {
        cover.push(Break::new(2.0));
        sections::push_paragraphs(&mut cover, summary);
    }

    if !document.insights().is_empty() {
        cover.push(Break::new(1.5));
        for insight in document.insights() {
            cover.push(insight_callout(insight));
            cover.push(Break::new(0.5));
        }
    }

    cover
}

fn logo_figure(cover: &Cover, warnings: &mut Vec<ResourceWarning>) -> Option<Figure> {
    let path = cover.logo_path()?;
    match Figure::from_path(path) {
        Ok(figure) => Some(
            figure
                .with_alignment(Alignment::Center)
                .with_width(mm_from_f64(LOGO_WIDTH_MM))
                .with_max_size(Size::new(
                    mm_from_f64(LOGO_WIDTH_MM),
                    mm_from_f64(LOGO_MAX_HEIGHT_MM),
                )),
        ),
        Err(err) => {
            warn!("skipping logo {}: {}", path.display(), err);
            warnings.push(ResourceWarning::new(path.display().to_string(), err.to_string()));
            None
        }
    }
}

/// A framed, highlighted insight box.
fn insight_callout(insight: &str) -> impl Element {
    let text = WrappedText::new(StyledString::new(
        insight.to_owned(),
        Style::new().bold().with_color(INSIGHT_COLOR),
    ))
    .padded(Margins::trbl(
        mm_from_f64(2.0),
        mm_from_f64(3.0),
        mm_from_f64(2.0),
        mm_from_f64(3.0),
    ));
    FramedElement::new(text)
}
