//! Error types for the syntax host
//!
//! Covers:
//! - Reading and writing source units
//! - Parser initialization
//! - Edit batches that cannot be applied

use std::ops::Range;
use std::path::PathBuf;

/// Errors raised by the syntax host
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// IO error while reading or writing a unit
    #[error("io error on {path}: {source}")]
    Io {
        /// Unit or directory path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Directory walk failed
    #[error("cannot walk {root}: {message}")]
    Walk {
        /// Walk root
        root: PathBuf,
        /// Walker message
        message: String,
    },

    /// The TypeScript grammar could not be loaded
    #[error("parser initialization failed: {0}")]
    ParserInit(String),

    /// The parser returned no tree
    #[error("parse failed for {0}")]
    ParseFailed(PathBuf),

    /// Unit not part of the project
    #[error("unknown unit: {0}")]
    UnknownUnit(PathBuf),

    /// Two edits of one batch touch the same bytes
    #[error("overlapping edits in {path}: {first:?} and {second:?}")]
    OverlappingEdits {
        /// Unit path
        path: PathBuf,
        /// Earlier edit range
        first: Range<usize>,
        /// Later edit range
        second: Range<usize>,
    },

    /// Edit range outside the unit text or not on a char boundary
    #[error("edit {range:?} is out of bounds for {path} ({len} bytes)")]
    EditOutOfBounds {
        /// Unit path
        path: PathBuf,
        /// Offending range
        range: Range<usize>,
        /// Text length
        len: usize,
    },
}

impl HostError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_mentions_path() {
        let err = HostError::io(
            "src/app/store/x/x.actions.ts",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let text = err.to_string();
        assert!(text.contains("x.actions.ts"));
        assert!(text.contains("gone"));
    }

    #[test]
    fn overlapping_edits_display() {
        let err = HostError::OverlappingEdits {
            path: PathBuf::from("a.ts"),
            first: 0..4,
            second: 2..6,
        };
        assert!(err.to_string().contains("overlapping"));
    }
}
