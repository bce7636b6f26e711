//! Font discovery for report rendering.
//!
//! The Roboto family is searched in, in order: the configured directory,
//! `REPORT_COMPOSER_FONTS_DIR`, `assets/fonts` next to the executable, and
//! `assets/fonts` in the crate.  When none of them holds the full family, the
//! first installed system family from [`SYSTEM_FAMILIES`] is used.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{self, FontData, FontFamily};
use log::{debug, warn};

use crate::config::{env_path, FONTS_DIR_ENV};

/// Name of the preferred font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

const FONT_FILES: &[&str] = &[
    "Roboto-Regular.ttf",
    "Roboto-Bold.ttf",
    "Roboto-Italic.ttf",
    "Roboto-BoldItalic.ttf",
];

/// A font family installed outside the crate.
pub struct SystemFamily {
    pub name: &'static str,
    pub directories: &'static [&'static str],
    pub regular: &'static str,
    pub bold: &'static str,
    pub italic: &'static str,
    pub bold_italic: &'static str,
}

/// System families tried when the Roboto family is unavailable.
pub const SYSTEM_FAMILIES: &[SystemFamily] = &[
    SystemFamily {
        name: "DejaVu Sans",
        directories: &[
            "/usr/share/fonts/truetype/dejavu",
            "/usr/share/fonts/dejavu",
            "/usr/share/fonts/TTF",
            "/usr/local/share/fonts",
        ],
        regular: "DejaVuSans.ttf",
        bold: "DejaVuSans-Bold.ttf",
        italic: "DejaVuSans-Oblique.ttf",
        bold_italic: "DejaVuSans-BoldOblique.ttf",
    },
    SystemFamily {
        name: "Liberation Sans",
        directories: &[
            "/usr/share/fonts/truetype/liberation",
            "/usr/share/fonts/truetype/liberation2",
            "/usr/share/fonts/liberation",
        ],
        regular: "LiberationSans-Regular.ttf",
        bold: "LiberationSans-Bold.ttf",
        italic: "LiberationSans-Italic.ttf",
        bold_italic: "LiberationSans-BoldItalic.ttf",
    },
    SystemFamily {
        name: "Arial",
        directories: &["C:\\Windows\\Fonts", "/Library/Fonts", "/System/Library/Fonts/Supplemental"],
        regular: "arial.ttf",
        bold: "arialbd.ttf",
        italic: "ariali.ttf",
        bold_italic: "arialbi.ttf",
    },
];

impl SystemFamily {
    fn files(&self) -> [&'static str; 4] {
        [self.regular, self.bold, self.italic, self.bold_italic]
    }

    fn directory(&self) -> Option<PathBuf> {
        self.directories
            .iter()
            .map(PathBuf::from)
            .find(|dir| self.files().iter().all(|file| dir.join(file).is_file()))
    }

    fn load(&self, directory: &Path) -> Result<FontFamily<FontData>, Error> {
        Ok(FontFamily {
            regular: load_font(directory, self.regular)?,
            bold: load_font(directory, self.bold)?,
            italic: load_font(directory, self.italic)?,
            bold_italic: load_font(directory, self.bold_italic)?,
        })
    }
}

fn font_directory_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let mut push = |candidate: PathBuf| {
        if !candidates.iter().any(|existing| existing == &candidate) {
            candidates.push(candidate);
        }
    };

    if let Some(path) = configured {
        push(path.to_path_buf());
    }

    if let Some(path) = env_path(FONTS_DIR_ENV) {
        push(path);
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            push(bin_dir.join("assets/fonts"));
        }
    }

    push(bundled_fonts_source_dir());
    candidates
}

/// Location of the font assets inside the crate sources.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn has_bundled_family(path: &Path) -> bool {
    path.is_dir() && FONT_FILES.iter().all(|name| path.join(name).is_file())
}

fn resolve_font_directory(configured: Option<&Path>) -> Option<PathBuf> {
    font_directory_candidates(configured)
        .into_iter()
        .find(|candidate| has_bundled_family(candidate))
}

fn load_font(directory: &Path, file: &str) -> Result<FontData, Error> {
    let path = directory.join(file);
    FontData::load(&path, None).map_err(|err| {
        Error::new(
            format!("Failed to load font {}: {}", path.display(), err),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

fn load_bundled_font_family(directory: &Path) -> Result<FontFamily<FontData>, Error> {
    fonts::from_files(directory, DEFAULT_FONT_FAMILY_NAME, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load font family '{}' from {}: {}",
                DEFAULT_FONT_FAMILY_NAME,
                directory.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

/// Returns the Roboto family if available, otherwise the first installed system family.
pub fn default_font_family(configured: Option<&Path>) -> Result<FontFamily<FontData>, Error> {
    if let Some(directory) = resolve_font_directory(configured) {
        debug!("loading {} fonts from {}", DEFAULT_FONT_FAMILY_NAME, directory.display());
        return load_bundled_font_family(&directory);
    }

    for family in SYSTEM_FAMILIES {
        if let Some(directory) = family.directory() {
            warn!(
                "{} fonts unavailable; falling back to system '{}' family in {}",
                DEFAULT_FONT_FAMILY_NAME,
                family.name,
                directory.display()
            );
            return family.load(&directory);
        }
    }

    let checked = font_directory_candidates(configured)
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::new(
        format!(
            "No usable fonts found. Checked {} and the system font directories; copy the {} family into assets/fonts or set {}.",
            checked, DEFAULT_FONT_FAMILY_NAME, FONTS_DIR_ENV
        ),
        ErrorKind::IoError(io::Error::new(
            io::ErrorKind::NotFound,
            "default fonts are not available",
        )),
    ))
}

/// Indicates whether any usable font family can be found.
pub fn default_fonts_available(configured: Option<&Path>) -> bool {
    resolve_font_directory(configured).is_some()
        || SYSTEM_FAMILIES
            .iter()
            .any(|family| family.directory().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_directory_is_searched_first() {
        let configured = PathBuf::from("/opt/report-fonts");
        let candidates = font_directory_candidates(Some(&configured));
        assert_eq!(candidates.first(), Some(&configured));
        assert!(candidates.contains(&bundled_fonts_source_dir()));
    }

    #[test]
    fn incomplete_directory_is_not_a_family() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Roboto-Regular.ttf"), b"").unwrap();
        assert!(!has_bundled_family(dir.path()));
    }
}
