//! Store discovery
//!
//! A store is a directory holding `<name>.actions.ts`, `<name>.reducer.ts`
//! and any number of `*.effects.ts` units, where `<name>` is the directory
//! name.

use std::path::{Path, PathBuf};

use serde::Serialize;

use morph_host::Project;

use crate::config::NamingConfig;

/// Role a unit plays in a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitRole {
    /// Action declarations
    Declaration,
    /// Reducing function
    Reducer,
    /// Effect pipelines
    Pipeline,
    /// Anything else
    Other,
}

impl UnitRole {
    /// Role derived from the file name suffix
    #[must_use]
    pub fn of(path: &Path, naming: &NamingConfig) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.ends_with(&naming.actions_suffix) {
            Self::Declaration
        } else if name.ends_with(&naming.reducer_suffix) {
            Self::Reducer
        } else if name.ends_with(&naming.effects_suffix) {
            Self::Pipeline
        } else {
            Self::Other
        }
    }
}

/// The units of one store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Store {
    /// Directory name
    pub name: String,
    /// Store directory
    pub dir: PathBuf,
    /// Declaration unit path (may be absent from the project)
    pub declaration: PathBuf,
    /// Reducing-function unit path (may be absent from the project)
    pub reducer: PathBuf,
    /// Pipeline units
    pub pipelines: Vec<PathBuf>,
}

impl Store {
    /// Derive a store from its directory
    #[must_use]
    pub fn from_dir(project: &Project, dir: &Path, naming: &NamingConfig) -> Self {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let in_dir = project.units_in(dir);
        let pick = |suffix: &str| -> PathBuf {
            let conventional = dir.join(format!("{name}{suffix}"));
            if project.contains(&conventional) {
                return conventional;
            }
            let mut matching = in_dir.iter().filter(|p| {
                p.file_name()
                    .is_some_and(|f| f.to_string_lossy().ends_with(suffix))
            });
            match (matching.next(), matching.next()) {
                (Some(only), None) => only.clone(),
                _ => conventional,
            }
        };
        let declaration = pick(&naming.actions_suffix);
        let reducer = pick(&naming.reducer_suffix);
        let pipelines = in_dir
            .iter()
            .filter(|p| UnitRole::of(p, naming) == UnitRole::Pipeline)
            .cloned()
            .collect();
        Self {
            name,
            dir: dir.to_path_buf(),
            declaration,
            reducer,
            pipelines,
        }
    }

    /// Every leaf directory whose path contains the store marker
    #[must_use]
    pub fn discover(project: &Project, naming: &NamingConfig) -> Vec<Self> {
        project
            .leaf_directories()
            .into_iter()
            .filter(|dir| is_store_path(dir, naming))
            .map(|dir| Self::from_dir(project, &dir, naming))
            .filter(|store| store.has_units(project))
            .collect()
    }

    /// Whether any of the store's units is loaded
    #[must_use]
    pub fn has_units(&self, project: &Project) -> bool {
        project.contains(&self.declaration)
            || project.contains(&self.reducer)
            || !self.pipelines.is_empty()
    }
}

/// Whether a path lies inside a store directory
#[must_use]
pub fn is_store_path(path: &Path, naming: &NamingConfig) -> bool {
    let text = path.to_string_lossy().replace('\\', "/");
    format!("/{text}/").contains(&naming.store_marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_host::HostConfig;
    use pretty_assertions::assert_eq;

    fn project(paths: &[&str]) -> Project {
        Project::from_sources("", HostConfig::new(), paths.iter().map(|p| (*p, ""))).unwrap()
    }

    #[test]
    fn roles_by_suffix() {
        let naming = NamingConfig::default();
        assert_eq!(UnitRole::of(Path::new("a/x.actions.ts"), &naming), UnitRole::Declaration);
        assert_eq!(UnitRole::of(Path::new("a/x.reducer.ts"), &naming), UnitRole::Reducer);
        assert_eq!(UnitRole::of(Path::new("a/x-y.effects.ts"), &naming), UnitRole::Pipeline);
        assert_eq!(UnitRole::of(Path::new("a/x.effects.spec.ts"), &naming), UnitRole::Other);
    }

    #[test]
    fn discovers_leaf_store_directories() {
        let p = project(&[
            "src/app/core/store/core-store.module.ts",
            "src/app/core/store/core/error/error.actions.ts",
            "src/app/core/store/core/error/error.reducer.ts",
            "src/app/core/store/shopping/products/products.actions.ts",
            "src/app/core/store/shopping/products/products.effects.ts",
            "src/app/core/store/shopping/products/products-extra.effects.ts",
            "src/app/core/utils/operators.ts",
        ]);
        let stores = Store::discover(&p, &NamingConfig::default());
        let names: Vec<&str> = stores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["error", "products"]);
        assert_eq!(stores[1].pipelines.len(), 2);
        assert!(!p.contains(&stores[1].reducer));
        assert_eq!(
            stores[1].reducer,
            PathBuf::from("src/app/core/store/shopping/products/products.reducer.ts")
        );
    }

    #[test]
    fn falls_back_to_unique_suffix_in_dir() {
        let p = project(&["src/store/order-templates/order-template.reducer.ts"]);
        let store = Store::from_dir(&p, Path::new("src/store/order-templates"), &NamingConfig::default());
        assert_eq!(
            store.reducer,
            PathBuf::from("src/store/order-templates/order-template.reducer.ts")
        );
    }
}
