//! Error types for the migration engine
//!
//! Three severities exist:
//! - [`SkipReason`]: the unit is left alone, the run continues
//! - [`MigrationError`]: the unit is aborted, the phase continues
//! - [`ConfigError`]: the run cannot start

use std::path::PathBuf;

use serde::Serialize;

use morph_host::HostError;

/// Fatal-per-unit errors
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The reducing function has no switch statement
    #[error("{function} in {unit} does not include a switch statement, manual migration required")]
    ManualMigrationRequired {
        /// Unit path
        unit: PathBuf,
        /// Reducing function name
        function: String,
    },

    /// An annotated pipeline property is not initialized with a call
    #[error("pipeline property {property} in {unit} is not a call expression, manual migration required")]
    UnrecognizedPipeline {
        /// Unit path
        unit: PathBuf,
        /// Property name
        property: String,
    },

    /// Host failure while editing
    #[error(transparent)]
    Host(#[from] HostError),
}

impl MigrationError {
    /// Whether the error stems from source shape rather than the host
    #[must_use]
    pub fn needs_manual_migration(&self) -> bool {
        !matches!(self, Self::Host(_))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read config {path}: {source}")]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configured pattern is not a valid regex
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Regex error
        #[source]
        source: regex::Error,
    },
}

/// Why a unit was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The store has no such unit
    #[error("unit absent")]
    UnitAbsent,

    /// The unit already uses the target API
    #[error("already migrated")]
    AlreadyMigrated,

    /// Missing an enum or a class
    #[error("not a valid action file")]
    NotActionUnit,

    /// Recognizable but inconsistent shape
    #[error("malformed: {0}")]
    Malformed(String),

    /// No top-level function with the reducer suffix
    #[error("no reducing function")]
    NoReducerFunction,

    /// No annotated pipeline property
    #[error("no annotated pipelines")]
    NoAnnotatedPipelines,
}

/// Result alias for the engine
pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_migration_message() {
        let err = MigrationError::ManualMigrationRequired {
            unit: PathBuf::from("store/x/x.reducer.ts"),
            function: "xReducer".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("xReducer"));
        assert!(text.contains("manual migration required"));
        assert!(err.needs_manual_migration());
    }

    #[test]
    fn host_errors_convert() {
        let err: MigrationError = HostError::UnknownUnit(PathBuf::from("a.ts")).into();
        assert!(!err.needs_manual_migration());
        assert_eq!(err.to_string(), "unknown unit: a.ts");
    }

    #[test]
    fn skip_reason_serializes_tagged() {
        let json = serde_json::to_string(&SkipReason::Malformed("x".into())).unwrap();
        assert_eq!(json, r#"{"kind":"malformed","detail":"x"}"#);
        let json = serde_json::to_string(&SkipReason::AlreadyMigrated).unwrap();
        assert_eq!(json, r#"{"kind":"already_migrated"}"#);
    }
}
