//! Host configuration

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a project is walked and how bare specifiers resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Specifier prefix to directory (relative to the project root),
    /// e.g. `ish-core/` to `src/app/core`
    pub path_aliases: BTreeMap<String, PathBuf>,

    /// Directory names skipped while walking
    pub ignore: Vec<String>,

    /// File extensions loaded as units
    pub extensions: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            path_aliases: BTreeMap::new(),
            ignore: ["node_modules", "dist", "coverage"]
                .into_iter()
                .map(String::from)
                .collect(),
            extensions: vec!["ts".to_string()],
        }
    }
}

impl HostConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path alias
    #[must_use]
    pub fn with_alias(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.path_aliases.insert(prefix.into(), dir.into());
        self
    }

    /// Skip an additional directory name
    #[must_use]
    pub fn with_ignore(mut self, dir: impl Into<String>) -> Self {
        self.ignore.push(dir.into());
        self
    }

    /// Whether a directory name is skipped
    #[must_use]
    pub fn is_ignored(&self, name: &str) -> bool {
        name.starts_with('.') || self.ignore.iter().any(|ignored| ignored == name)
    }

    /// Whether a file name is loaded as a unit
    #[must_use]
    pub fn is_unit_file(&self, name: &str) -> bool {
        if name.ends_with(".d.ts") {
            return false;
        }
        self.extensions
            .iter()
            .any(|ext| name.strip_suffix(ext.as_str()).is_some_and(|stem| stem.ends_with('.')))
    }
}

/// Symbols imported from fixed library modules, e.g. `createAction` from `@ngrx/store`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportTable(BTreeMap<String, String>);

impl ImportTable {
    /// Empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    #[must_use]
    pub fn with(mut self, symbol: impl Into<String>, module: impl Into<String>) -> Self {
        self.insert(symbol, module);
        self
    }

    /// Add or replace an entry
    pub fn insert(&mut self, symbol: impl Into<String>, module: impl Into<String>) {
        self.0.insert(symbol.into(), module.into());
    }

    /// Module a symbol is imported from
    #[must_use]
    pub fn module_for(&self, symbol: &str) -> Option<&str> {
        self.0.get(symbol).map(String::as_str)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(symbol, module)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for ImportTable {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ignores() {
        let config = HostConfig::default();
        assert!(config.is_ignored("node_modules"));
        assert!(config.is_ignored(".angular"));
        assert!(!config.is_ignored("store"));
    }

    #[test]
    fn unit_files() {
        let config = HostConfig::new();
        assert!(config.is_unit_file("x.actions.ts"));
        assert!(!config.is_unit_file("x.d.ts"));
        assert!(!config.is_unit_file("x.js"));
        assert!(!config.is_unit_file("ts"));
    }

    #[test]
    fn import_table_lookup() {
        let table = ImportTable::new().with("createAction", "@ngrx/store");
        assert_eq!(table.module_for("createAction"), Some("@ngrx/store"));
        assert_eq!(table.module_for("on"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn deserializes_partial() {
        let config: HostConfig =
            serde_json::from_str(r#"{"path_aliases": {"ish-core/": "src/app/core"}}"#).unwrap();
        assert_eq!(config.extensions, vec!["ts".to_string()]);
        assert_eq!(config.path_aliases.len(), 1);
    }
}
