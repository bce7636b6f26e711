//! Document construction helpers.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use crate::fonts;
use genpdf::error::{Error, ErrorKind};
use genpdf::style;
use genpdf::{self, Element, Margins, Mm, PageDecorator, Position, Size};

/// Shared page counter advanced by the page decorator.
///
/// Elements holding a clone observe the number of the page they are being
/// rendered on; after rendering it holds the total page count.
#[derive(Clone, Debug, Default)]
pub struct PageCounter(Rc<Cell<usize>>);

impl PageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the 1-based number of the current page (0 before rendering).
    pub fn current(&self) -> usize {
        self.0.get()
    }

    fn advance(&self) -> usize {
        let page = self.0.get() + 1;
        self.0.set(page);
        page
    }
}

/// Builder for `genpdf::Document` instances pre-configured with the crate defaults.
#[derive(Default)]
pub struct DocumentBuilder {
    paper_size: Option<Size>,
    margins: Option<Margins>,
    fonts_dir: Option<PathBuf>,
    font_size: Option<u8>,
    title: Option<String>,
    footer: Option<FooterSpec>,
    pages: PageCounter,
}

type ElementFactory = dyn Fn(usize) -> Box<dyn Element>;

impl DocumentBuilder {
    /// Creates a new builder instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the paper size used for newly created documents.
    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = Some(paper_size.into());
        self
    }

    /// Sets the margins applied through the page decorator.
    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    /// Searches `fonts_dir` for the font family before the default locations.
    pub fn with_fonts_dir(mut self, fonts_dir: Option<PathBuf>) -> Self {
        self.fonts_dir = fonts_dir;
        self
    }

    /// Sets the body font size in points.
    pub fn with_font_size(mut self, font_size: u8) -> Self {
        self.font_size = Some(font_size);
        self
    }

    /// Sets the document title stored in the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Configures a footer callback with a fixed height.
    pub fn with_footer(mut self, footer: FooterSpec) -> Self {
        self.footer = Some(footer);
        self
    }

    /// Uses `pages` as the counter advanced for every new page.
    pub fn with_page_counter(mut self, pages: PageCounter) -> Self {
        self.pages = pages;
        self
    }

    /// Builds a fully configured `genpdf::Document` instance.
    pub fn build(self) -> Result<genpdf::Document, Error> {
        let font_family = fonts::default_font_family(self.fonts_dir.as_deref())?;
        let mut document = genpdf::Document::new(font_family);

        if let Some(paper_size) = self.paper_size {
            document.set_paper_size(paper_size);
        }
        if let Some(font_size) = self.font_size {
            document.set_font_size(font_size);
        }
        if let Some(title) = self.title {
            document.set_title(title);
        }

        let decorator = ConfiguredPageDecorator {
            pages: self.pages,
            margins: self.margins,
            footer: self.footer,
        };
        document.set_page_decorator(decorator);

        Ok(document)
    }
}

/// Definition of a footer rendered through the page decorator.
pub struct FooterSpec {
    height: Mm,
    skip_first_page: bool,
    factory: Box<ElementFactory>,
}

impl FooterSpec {
    /// Creates a new footer specification.
    pub fn new<F, E>(height: impl Into<Mm>, factory: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        Self {
            height: height.into(),
            skip_first_page: false,
            factory: Box::new(move |page| Box::new(factory(page)) as Box<dyn Element>),
        }
    }

    /// Leaves the first page (the cover) without a footer.
    pub fn skip_first_page(mut self, skip: bool) -> Self {
        self.skip_first_page = skip;
        self
    }
}

struct ConfiguredPageDecorator {
    pages: PageCounter,
    margins: Option<Margins>,
    footer: Option<FooterSpec>,
}

impl PageDecorator for ConfiguredPageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: genpdf::render::Area<'a>,
        style: style::Style,
    ) -> Result<genpdf::render::Area<'a>, Error> {
        let page = self.pages.advance();

        if let Some(margins) = self.margins {
            area.add_margins(margins);
        }

        if let Some(footer) = &self.footer {
            let available = area.size().height;
            if footer.height > available {
                return Err(Error::new(
                    "Footer height exceeds available space",
                    ErrorKind::InvalidData,
                ));
            }

            if !(footer.skip_first_page && page == 1) {
                let mut footer_area = area.clone();
                footer_area.add_offset(Position::new(0, available - footer.height));
                let mut element = (footer.factory)(page);
                let result = element.render(context, footer_area, style)?;
                if result.has_more {
                    return Err(Error::new(
                        "Footer element does not fit into the reserved space",
                        ErrorKind::PageSizeExceeded,
                    ));
                }
            }

            // The body area stays the same on every page so content flows evenly.
            area.set_height(available - footer.height);
        }

        Ok(area)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use genpdf::elements::{PageBreak, Paragraph};

    use super::*;
    use crate::elements::mm_from_f64;

    #[test]
    fn page_counter_is_shared_between_clones() {
        let counter = PageCounter::new();
        let observer = counter.clone();
        assert_eq!(observer.current(), 0);
        counter.advance();
        counter.advance();
        assert_eq!(observer.current(), 2);
    }

    #[test]
    fn footer_skips_the_cover_page() {
        if !fonts::default_fonts_available(None) {
            eprintln!("Skipping footer_skips_the_cover_page: no usable fonts.");
            return;
        }

        let decorated = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&decorated);
        let footer = FooterSpec::new(mm_from_f64(10.0), move |page| {
            log.borrow_mut().push(page);
            Paragraph::new(format!("Page {}", page))
        })
        .skip_first_page(true);

        let pages = PageCounter::new();
        let mut document = DocumentBuilder::new()
            .with_footer(footer)
            .with_page_counter(pages.clone())
            .build()
            .expect("document");
        document.push(Paragraph::new("cover"));
        document.push(PageBreak::new());
        document.push(Paragraph::new("second"));
        document.push(PageBreak::new());
        document.push(Paragraph::new("third"));

        let mut bytes: Vec<u8> = Vec::new();
        document.render(&mut bytes).expect("render");
        assert_eq!(pages.current(), 3);
        assert_eq!(*decorated.borrow(), vec![2, 3]);
    }
}
