//! Migration configuration
//!
//! Every naming convention and target API name the engine relies on lives
//! here. All fields default to the NgRx 8 conventions so an empty (or
//! missing) `store-morph.toml` is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use morph_host::{HostConfig, ImportTable};

use crate::error::ConfigError;

/// Default config file name looked up at the project root
pub const CONFIG_FILE_NAME: &str = "store-morph.toml";

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// How the project is walked
    pub project: HostConfig,
    /// Unit and symbol naming conventions
    pub naming: NamingConfig,
    /// Target API names
    pub target: TargetApi,
    /// Pipeline operator names
    pub pipeline: PipelineConfig,
    /// Library import table
    pub imports: ImportsConfig,
}

/// Naming conventions of legacy stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Declaration unit suffix
    pub actions_suffix: String,
    /// Reducing-function unit suffix
    pub reducer_suffix: String,
    /// Pipeline unit suffix
    pub effects_suffix: String,
    /// Path fragment marking store directories
    pub store_marker: String,
    /// Suffix of the reducing function's name
    pub reducer_function_suffix: String,
    /// Pattern of the aggregate union alias
    pub aggregate_alias_pattern: String,
    /// Discriminator field of legacy action classes
    pub discriminator_field: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            actions_suffix: ".actions.ts".to_string(),
            reducer_suffix: ".reducer.ts".to_string(),
            effects_suffix: ".effects.ts".to_string(),
            store_marker: "/store/".to_string(),
            reducer_function_suffix: "Reducer".to_string(),
            aggregate_alias_pattern: "Actions?$".to_string(),
            discriminator_field: "type".to_string(),
        }
    }
}

/// Names of the creator-function API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetApi {
    /// Action factory
    pub create_action: String,
    /// Payload type helper
    pub props: String,
    /// Registration-table factory
    pub create_reducer: String,
    /// Registration entry
    pub on: String,
    /// Effect factory
    pub create_effect: String,
    /// Event type of the rewritten reducing function
    pub event_type: String,
    /// Local name of the registration table
    pub table_name: String,
}

impl Default for TargetApi {
    fn default() -> Self {
        Self {
            create_action: "createAction".to_string(),
            props: "props".to_string(),
            create_reducer: "createReducer".to_string(),
            on: "on".to_string(),
            create_effect: "createEffect".to_string(),
            event_type: "Action".to_string(),
            table_name: "reducer".to_string(),
        }
    }
}

/// Names used by effect pipelines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Property annotation
    pub annotation: String,
    /// Combinator whose arity is limited
    pub combinator: String,
    /// Filter operator
    pub filter_operator: String,
    /// Bootstrap markers left untouched by the filter pass
    pub bootstrap_markers: Vec<String>,
    /// Branch operator
    pub branch_operator: String,
    /// Type argument given to the branch operator
    pub branch_type: String,
    /// Operator renames
    pub renames: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            annotation: "Effect".to_string(),
            combinator: "pipe".to_string(),
            filter_operator: "ofType".to_string(),
            bootstrap_markers: vec!["ROOT_EFFECTS_INIT".to_string(), "UPDATE".to_string()],
            branch_operator: "iif".to_string(),
            branch_type: "ApplyConfiguration".to_string(),
            renames: BTreeMap::from([(
                "mapErrorToAction".to_string(),
                "mapErrorToActionV8".to_string(),
            )]),
        }
    }
}

/// Where library symbols are imported from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportsConfig {
    /// Symbol to module specifier; configured entries extend the defaults
    #[serde(deserialize_with = "library_over_defaults")]
    pub library: BTreeMap<String, String>,
}

fn library_over_defaults<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let configured = BTreeMap::<String, String>::deserialize(deserializer)?;
    let mut library = ImportsConfig::default().library;
    library.extend(configured);
    Ok(library)
}

impl Default for ImportsConfig {
    fn default() -> Self {
        let store = [
            "createAction",
            "props",
            "createReducer",
            "on",
            "Action",
        ];
        let mut library: BTreeMap<String, String> = store
            .into_iter()
            .map(|name| (name.to_string(), "@ngrx/store".to_string()))
            .collect();
        library.insert("createEffect".to_string(), "@ngrx/effects".to_string());
        library.insert(
            "mapErrorToActionV8".to_string(),
            "ish-core/utils/operators".to_string(),
        );
        Self { library }
    }
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML and
    /// [`ConfigError::InvalidPattern`] for a bad alias pattern.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.alias_pattern()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load `store-morph.toml` from the project root, or defaults
    ///
    /// # Errors
    ///
    /// Fails when the file exists but is invalid.
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let candidate: PathBuf = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Compiled aggregate alias pattern
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] when the pattern does not compile.
    pub fn alias_pattern(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.naming.aggregate_alias_pattern).map_err(|source| {
            ConfigError::InvalidPattern {
                pattern: self.naming.aggregate_alias_pattern.clone(),
                source,
            }
        })
    }

    /// Library import table for the host
    #[must_use]
    pub fn import_table(&self) -> ImportTable {
        self.imports
            .library
            .iter()
            .map(|(symbol, module)| (symbol.clone(), module.clone()))
            .collect()
    }

    /// Whether a bootstrap marker name
    #[must_use]
    pub fn is_bootstrap_marker(&self, name: &str) -> bool {
        self.pipeline.bootstrap_markers.iter().any(|m| m == name)
    }

    /// Set host configuration
    #[must_use]
    pub fn with_project(mut self, project: HostConfig) -> Self {
        self.project = project;
        self
    }

    /// Add a path alias
    #[must_use]
    pub fn with_path_alias(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.project.path_aliases.insert(prefix.into(), dir.into());
        self
    }

    /// Add an operator rename
    #[must_use]
    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.pipeline.renames.insert(from.into(), to.into());
        self
    }

    /// Add a library import
    #[must_use]
    pub fn with_library_import(mut self, symbol: impl Into<String>, module: impl Into<String>) -> Self {
        self.imports.library.insert(symbol.into(), module.into());
        self
    }

    /// Set the store marker
    #[must_use]
    pub fn with_store_marker(mut self, marker: impl Into<String>) -> Self {
        self.naming.store_marker = marker.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_is_default() {
        let config = MigrationConfig::from_toml_str("").unwrap();
        assert_eq!(config, MigrationConfig::default());
        assert_eq!(config.target.create_action, "createAction");
        assert_eq!(
            config.pipeline.renames.get("mapErrorToAction").map(String::as_str),
            Some("mapErrorToActionV8")
        );
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = MigrationConfig::from_toml_str(
            r#"
[project.path_aliases]
"ish-core/" = "src/app/core"

[naming]
store_marker = "/state/"

[imports.library]
mapErrorToActionV8 = "src/ops"
"#,
        )
        .unwrap();
        assert_eq!(config.naming.store_marker, "/state/");
        assert_eq!(config.naming.actions_suffix, ".actions.ts");
        assert_eq!(config.project.path_aliases.len(), 1);
        let table = config.import_table();
        assert_eq!(table.module_for("mapErrorToActionV8"), Some("src/ops"));
        assert_eq!(table.module_for("createEffect"), Some("@ngrx/effects"));
        assert_eq!(table.module_for("createAction"), Some("@ngrx/store"));
        assert_eq!(config.imports.library.len(), ImportsConfig::default().library.len());
    }

    #[test]
    fn library_entries_extend_the_defaults() {
        let config = MigrationConfig::from_toml_str(
            r#"
[imports.library]
mapResponse = "ish-core/utils/responses"
"#,
        )
        .unwrap();
        let table = config.import_table();
        assert_eq!(table.module_for("mapResponse"), Some("ish-core/utils/responses"));
        assert_eq!(table.module_for("on"), Some("@ngrx/store"));
        assert_eq!(table.module_for("mapErrorToActionV8"), Some("ish-core/utils/operators"));
    }

    #[test]
    fn rejects_bad_pattern() {
        let err = MigrationConfig::from_toml_str("[naming]\naggregate_alias_pattern = \"(\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn rejects_bad_toml() {
        let err = MigrationConfig::from_toml_str("[naming\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MigrationConfig::discover(dir.path()).unwrap();
        assert_eq!(config, MigrationConfig::default());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[target]\ntable_name = \"table\"\n")
            .unwrap();
        let config = MigrationConfig::discover(dir.path()).unwrap();
        assert_eq!(config.target.table_name, "table");
    }

    #[test]
    fn builders() {
        let config = MigrationConfig::new()
            .with_path_alias("ish-core/", "src/app/core")
            .with_rename("a", "b")
            .with_library_import("x", "y");
        assert!(config.is_bootstrap_marker("UPDATE"));
        assert_eq!(config.pipeline.renames.len(), 2);
        assert_eq!(config.import_table().module_for("x"), Some("y"));
    }
}
