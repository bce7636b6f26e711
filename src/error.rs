//! Error types for the report composer.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors that abort a render call.
///
/// Schema errors are raised before any rendering work starts.  Render and I/O
/// errors abort the call without leaving an artifact behind.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The document description does not match the recognized shape.
    #[error("invalid document at `{path}`: {message}")]
    Schema {
        /// Path of the first offending field, e.g. `sections[0].chart_spec`.
        path: String,
        /// Human-readable description of the violation.
        message: String,
    },

    /// The rendering backend rejected a value it cannot draw.
    #[error("failed to render `{location}`: {message}")]
    Render {
        /// Section or field the failure is attributed to.
        location: String,
        /// Human-readable description of the failure.
        message: String,
    },

    /// The output artifact could not be written.
    #[error("failed to write report to {}: {source}", path.display())]
    Io {
        /// The attempted output path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// No usable font family could be loaded.
    #[error("failed to load fonts: {0}")]
    Font(#[source] genpdf::error::Error),
}

impl ReportError {
    pub(crate) fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn render(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            location: location.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable identifier of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "schema",
            Self::Render { .. } => "render",
            Self::Io { .. } => "io",
            Self::Font(_) => "font",
        }
    }

    /// Converts the error into the structured object returned to tool callers.
    pub fn to_json(&self) -> Value {
        let path = match self {
            Self::Schema { path, .. } => Some(path.clone()),
            Self::Render { location, .. } => Some(location.clone()),
            Self::Io { path, .. } => Some(path.display().to_string()),
            Self::Font(_) => None,
        };

        let mut error = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Some(path) = path {
            error["path"] = Value::String(path);
        }
        json!({ "error": error })
    }
}

/// A referenced external resource that could not be used.
///
/// Resource problems never abort a render; the resource is omitted and the
/// warning is handed back to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourceWarning {
    /// The resource reference as supplied by the caller.
    pub resource: String,
    /// Why the resource was skipped.
    pub message: String,
}

impl ResourceWarning {
    pub(crate) fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ResourceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.resource, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_serializes_path() {
        let err = ReportError::schema("sections[0].type", "unknown section type `list`");
        let value = err.to_json();
        assert_eq!(value["error"]["kind"], "schema");
        assert_eq!(value["error"]["path"], "sections[0].type");
        assert!(value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("unknown section type"));
    }

    #[test]
    fn io_error_names_attempted_path() {
        let err = ReportError::io(
            "/nope/report.pdf",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), "io");
        assert!(err.to_string().contains("/nope/report.pdf"));
        assert_eq!(err.to_json()["error"]["path"], "/nope/report.pdf");
    }
}
