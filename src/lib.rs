//! Composes paginated PDF reports from declarative JSON document descriptions.
//!
//! A document has a cover page (title, optional logo, summary, and insight
//! callouts) followed by titled sections holding paragraphs, tables, or
//! charts.  [`ReportComposer`] validates the description, lays it out with
//! `genpdf`, and writes the artifact atomically.

pub mod builder;
pub mod chart;
pub mod composer;
pub mod config;
pub mod elements;
pub mod error;
pub mod fonts;
pub mod model;
pub mod output;
pub mod schema;
pub mod summary;
pub mod tools;

mod layout;
mod sections;

#[cfg(feature = "bookmarks")]
pub mod bookmarks;

pub use composer::{RenderOptions, RenderOutcome, ReportComposer};
pub use config::ComposerConfig;
pub use error::{ReportError, ResourceWarning};
pub use model::ReportDocument;
pub use sections::TableGrid;
