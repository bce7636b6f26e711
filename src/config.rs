//! Composer configuration.
//!
//! Defaults cover every setting, so an empty TOML file (or none at all) is a
//! valid configuration.  Environment variables override file values:
//!
//! - `REPORT_COMPOSER_REPORTS_DIR`: directory for generated report names.
//! - `REPORT_COMPOSER_FONTS_DIR`: directory holding the Roboto font family.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::{PaperSize, Size};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`ComposerConfig::reports_dir`].
pub const REPORTS_DIR_ENV: &str = "REPORT_COMPOSER_REPORTS_DIR";

/// Environment variable overriding [`ComposerConfig::fonts_dir`].
pub const FONTS_DIR_ENV: &str = "REPORT_COMPOSER_FONTS_DIR";

/// Paper formats supported by the layout engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Paper {
    #[default]
    A4,
    Letter,
    Legal,
}

impl Paper {
    /// Returns the page size in millimetres.
    pub fn size(self) -> Size {
        match self {
            Self::A4 => PaperSize::A4.into(),
            Self::Letter => PaperSize::Letter.into(),
            Self::Legal => PaperSize::Legal.into(),
        }
    }
}

/// Defaults applied to charts that omit their size.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartDefaults {
    /// Figure width in inches.
    pub width_in: f64,
    /// Figure height in inches.
    pub height_in: f64,
    /// Raster resolution of chart images.
    pub dpi: f64,
}

impl Default for ChartDefaults {
    fn default() -> Self {
        Self {
            width_in: 6.0,
            height_in: 4.0,
            dpi: 100.0,
        }
    }
}

/// Settings shared by every render call of a [`crate::ReportComposer`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposerConfig {
    /// Directory that receives reports when the caller supplies no path.
    pub reports_dir: PathBuf,
    /// Directory holding the Roboto font family; searched before the defaults.
    pub fonts_dir: Option<PathBuf>,
    pub paper: Paper,
    /// Page margin applied on every side.
    pub margin_mm: f64,
    /// Body text size in points.
    pub font_size: u8,
    /// Placeholder for table cells missing from a record.
    pub missing_cell: String,
    /// Adds a PDF outline entry per section when the `bookmarks` feature is on.
    pub bookmarks: bool,
    pub chart: ChartDefaults,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports"),
            fonts_dir: None,
            paper: Paper::default(),
            margin_mm: 18.0,
            font_size: 11,
            missing_cell: "-".to_owned(),
            bookmarks: true,
            chart: ChartDefaults::default(),
        }
    }
}

impl ComposerConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads a configuration file and applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml(&text).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid config {}: {}", path.display(), err),
            )
        })?;
        Ok(config.with_env_overrides())
    }

    /// Returns the defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `REPORT_COMPOSER_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env_path(REPORTS_DIR_ENV) {
            self.reports_dir = dir;
        }
        if let Some(dir) = env_path(FONTS_DIR_ENV) {
            self.fonts_dir = Some(dir);
        }
        self
    }
}

pub(crate) fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ComposerConfig::from_toml("").unwrap();
        assert_eq!(config, ComposerConfig::default());
        assert_eq!(config.chart.width_in, 6.0);
        assert_eq!(config.chart.height_in, 4.0);
    }

    #[test]
    fn partial_tables_merge_with_defaults() {
        let config = ComposerConfig::from_toml(
            r#"
            reports_dir = "out"
            paper = "letter"
            missing_cell = "n/a"

            [chart]
            dpi = 150.0
            "#,
        )
        .unwrap();

        assert_eq!(config.reports_dir, PathBuf::from("out"));
        assert_eq!(config.paper, Paper::Letter);
        assert_eq!(config.missing_cell, "n/a");
        assert_eq!(config.chart.dpi, 150.0);
        assert_eq!(config.chart.width_in, 6.0);
        assert_eq!(config.margin_mm, 18.0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ComposerConfig::from_toml("colour = \"red\"").is_err());
    }

    #[test]
    fn load_reports_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composer.toml");
        fs::write(&path, "margin_mm = \"wide\"").unwrap();
        let err = ComposerConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
