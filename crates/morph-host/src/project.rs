//! The in-memory project
//!
//! A [`Project`] holds every loaded unit in path order and is the single
//! substrate all migrations mutate. Parsing on open runs in parallel; every
//! mutation afterwards is sequential through `&mut self`.

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::{HostConfig, ImportTable};
use crate::edit::TextEdit;
use crate::error::HostError;
use crate::imports::{self, render_import, ImportDecl};
use crate::resolve::{normalize, relative_specifier, resolve_specifier, shared_prefix_len};
use crate::syntax;
use crate::unit::SourceUnit;

/// A syntactic usage of a symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Unit containing the usage
    pub unit: PathBuf,
    /// Byte range of the identifier
    pub range: Range<usize>,
    /// Whether the usage sits inside an import statement
    pub in_import: bool,
}

/// Import specifiers added and removed by [`Project::reconcile_imports`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportChanges {
    /// Names that gained an import
    pub added: Vec<String>,
    /// Names whose import was dropped
    pub removed: Vec<String>,
}

impl ImportChanges {
    /// Whether nothing changed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// All loaded units of one project
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    config: HostConfig,
    units: IndexMap<PathBuf, SourceUnit>,
}

impl Project {
    /// Walk `root` and load every unit
    ///
    /// # Errors
    ///
    /// Fails when the walk fails or a unit cannot be read.
    pub fn open(root: impl Into<PathBuf>, config: HostConfig) -> Result<Self, HostError> {
        let root = normalize(&root.into());
        let walk_root = if root.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            root.clone()
        };

        let mut paths = Vec::new();
        let walker = WalkDir::new(&walk_root).follow_links(false).into_iter();
        for entry in walker.filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !config.is_ignored(&e.file_name().to_string_lossy())
        }) {
            let entry = entry.map_err(|e| HostError::Walk {
                root: walk_root.clone(),
                message: e.to_string(),
            })?;
            if entry.file_type().is_file()
                && config.is_unit_file(&entry.file_name().to_string_lossy())
            {
                paths.push(normalize(entry.path()));
            }
        }
        paths.sort();

        let units: Vec<SourceUnit> = paths
            .par_iter()
            .map(|path| SourceUnit::load(path))
            .collect::<Result<_, _>>()?;

        let with_errors = units.iter().filter(|u| u.has_syntax_errors()).count();
        tracing::info!(
            root = %walk_root.display(),
            units = units.len(),
            with_errors,
            "project opened"
        );

        Ok(Self {
            root,
            config,
            units: units
                .into_iter()
                .map(|unit| (unit.path().to_path_buf(), unit))
                .collect(),
        })
    }

    /// Build a project from in-memory sources
    ///
    /// # Errors
    ///
    /// Fails when a source cannot be parsed.
    pub fn from_sources<P, T>(
        root: impl Into<PathBuf>,
        config: HostConfig,
        sources: impl IntoIterator<Item = (P, T)>,
    ) -> Result<Self, HostError>
    where
        P: AsRef<Path>,
        T: Into<String>,
    {
        let mut units: Vec<SourceUnit> = sources
            .into_iter()
            .map(|(path, text)| SourceUnit::parse(normalize(path.as_ref()), text))
            .collect::<Result<_, _>>()?;
        units.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(Self {
            root: normalize(&root.into()),
            config,
            units: units
                .into_iter()
                .map(|unit| (unit.path().to_path_buf(), unit))
                .collect(),
        })
    }

    /// Project root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Number of units
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no unit was loaded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit by path
    #[must_use]
    pub fn unit(&self, path: &Path) -> Option<&SourceUnit> {
        self.units
            .get(path)
            .or_else(|| self.units.get(&normalize(path)))
    }

    /// Mutable unit by path
    pub fn unit_mut(&mut self, path: &Path) -> Option<&mut SourceUnit> {
        if self.units.contains_key(path) {
            return self.units.get_mut(path);
        }
        self.units.get_mut(&normalize(path))
    }

    /// Unit by path or [`HostError::UnknownUnit`]
    ///
    /// # Errors
    ///
    /// Fails when the unit is not loaded.
    pub fn require(&self, path: &Path) -> Result<&SourceUnit, HostError> {
        self.unit(path)
            .ok_or_else(|| HostError::UnknownUnit(path.to_path_buf()))
    }

    fn require_mut(&mut self, path: &Path) -> Result<&mut SourceUnit, HostError> {
        let missing = path.to_path_buf();
        self.unit_mut(path).ok_or(HostError::UnknownUnit(missing))
    }

    /// Whether a unit is loaded
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.unit(path).is_some()
    }

    /// All unit paths in order
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.units.keys().map(PathBuf::as_path)
    }

    /// All units in path order
    pub fn units(&self) -> impl Iterator<Item = &SourceUnit> {
        self.units.values()
    }

    /// Units located under a directory
    #[must_use]
    pub fn units_under(&self, dir: &Path) -> Vec<PathBuf> {
        let dir = normalize(dir);
        self.paths()
            .filter(|path| path.starts_with(&dir))
            .map(Path::to_path_buf)
            .collect()
    }

    /// Units located directly in a directory
    #[must_use]
    pub fn units_in(&self, dir: &Path) -> Vec<PathBuf> {
        let dir = normalize(dir);
        self.paths()
            .filter(|path| path.parent() == Some(dir.as_path()))
            .map(Path::to_path_buf)
            .collect()
    }

    /// Every directory that directly contains a unit
    #[must_use]
    pub fn directories(&self) -> BTreeSet<PathBuf> {
        self.paths()
            .filter_map(Path::parent)
            .map(Path::to_path_buf)
            .collect()
    }

    /// Directories containing units but no sub-directory that contains units
    #[must_use]
    pub fn leaf_directories(&self) -> Vec<PathBuf> {
        let dirs: Vec<PathBuf> = self.directories().into_iter().collect();
        // component-wise ordering places descendants right after their ancestor
        dirs.iter()
            .enumerate()
            .filter(|(i, dir)| {
                dirs.get(i + 1)
                    .is_none_or(|next| !next.starts_with(dir.as_path()))
            })
            .map(|(_, dir)| dir.clone())
            .collect()
    }

    /// Apply an edit batch to a unit
    ///
    /// # Errors
    ///
    /// Fails for unknown units and invalid batches.
    pub fn apply(&mut self, path: &Path, edits: Vec<TextEdit>) -> Result<usize, HostError> {
        self.require_mut(path)?.apply(edits)
    }

    /// Append a declaration at the end of a unit
    ///
    /// # Errors
    ///
    /// Fails for unknown units.
    pub fn add_declaration(&mut self, path: &Path, text: &str) -> Result<(), HostError> {
        let unit = self.require_mut(path)?;
        let len = unit.text().len();
        let separator = if unit.text().ends_with('\n') { "\n" } else { "\n\n" };
        unit.apply(vec![TextEdit::insert(len, format!("{separator}{text}\n"))])?;
        Ok(())
    }

    /// Resolve a module specifier written in `importer`
    #[must_use]
    pub fn resolve(&self, importer: &Path, specifier: &str) -> Option<PathBuf> {
        resolve_specifier(
            importer,
            specifier,
            &self.root,
            &self.config,
            |candidate| self.units.contains_key(candidate),
            self.paths(),
        )
    }

    /// Modules through which `name` declared in `target` can be imported,
    /// with the name it is exported under
    fn export_routes(&self, target: &Path, name: &str) -> Vec<(PathBuf, String)> {
        let mut routes = vec![(target.to_path_buf(), name.to_string())];
        for (path, unit) in &self.units {
            if path == target {
                continue;
            }
            for re_export in unit.re_exports() {
                let Some(exported) = re_export.exported_as(name) else {
                    continue;
                };
                if self.resolve(path, &re_export.source).as_deref() == Some(target) {
                    routes.push((path.clone(), exported));
                }
            }
        }
        routes
    }

    /// Every syntactic reference to `name` declared in `declaring`
    ///
    /// Covers the declaring unit itself and every unit importing the name
    /// from it, directly or through one barrel re-export. Aliased imports
    /// track the alias; shadowing is not analyzed.
    #[must_use]
    pub fn references(&self, declaring: &Path, name: &str) -> Vec<Reference> {
        let declaring = normalize(declaring);
        let routes = self.export_routes(&declaring, name);
        let stems: BTreeSet<String> = routes.iter().map(|(module, _)| module_stem(module)).collect();

        let mut out = Vec::new();
        if let Some(unit) = self.units.get(&declaring) {
            out.extend(identifier_references(unit, name));
        }
        for (path, unit) in &self.units {
            if *path == declaring {
                continue;
            }
            let mut locals = BTreeSet::new();
            for import in unit.imports() {
                if !could_name(&import.source, &stems) {
                    continue;
                }
                let Some(resolved) = self.resolve(path, &import.source) else {
                    continue;
                };
                for (module, exported) in &routes {
                    if resolved == *module {
                        if let Some(spec) = import.named_import(exported) {
                            locals.insert(spec.local().to_string());
                        }
                    }
                }
            }
            for local in locals {
                out.extend(identifier_references(unit, &local));
            }
        }
        tracing::trace!(name, references = out.len(), "references collected");
        out
    }

    /// Units whose own declarations export `name`
    #[must_use]
    pub fn exporters_of(&self, name: &str) -> Vec<PathBuf> {
        self.units
            .iter()
            .filter(|(_, unit)| unit.exported_names().iter().any(|n| n == name))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// The unit `importer` should import `name` from
    ///
    /// A unique exporter wins; among several the one sharing the longest
    /// path prefix with the importer wins, ties resolve to none.
    #[must_use]
    pub fn exporter_for(&self, importer: &Path, name: &str) -> Option<PathBuf> {
        let exporters: Vec<PathBuf> = self
            .exporters_of(name)
            .into_iter()
            .filter(|path| path != importer)
            .collect();
        if exporters.len() <= 1 {
            return exporters.into_iter().next();
        }
        let best = exporters
            .iter()
            .map(|path| shared_prefix_len(path, importer))
            .max()?;
        let mut nearest = exporters
            .into_iter()
            .filter(|path| shared_prefix_len(path, importer) == best);
        let first = nearest.next();
        if nearest.next().is_some() {
            tracing::debug!(name, importer = %importer.display(), "ambiguous exporter");
            return None;
        }
        first
    }

    /// Import `name` from a module specifier
    ///
    /// Appends to an existing named import of the same specifier when there
    /// is one. Returns `false` when the name is already bound by an import.
    ///
    /// # Errors
    ///
    /// Fails for unknown units.
    pub fn add_import(&mut self, path: &Path, name: &str, module: &str) -> Result<bool, HostError> {
        self.insert_import(path, name, module, |decl| decl.source == module)
    }

    fn add_import_of_unit(&mut self, path: &Path, name: &str, target: &Path) -> Result<bool, HostError> {
        let specifier = relative_specifier(path, target);
        let resolved: Vec<String> = self
            .require(path)?
            .imports()
            .into_iter()
            .filter(|decl| self.resolve(path, &decl.source).as_deref() == Some(target))
            .map(|decl| decl.source)
            .collect();
        self.insert_import(path, name, &specifier, |decl| resolved.contains(&decl.source))
    }

    fn insert_import(
        &mut self,
        path: &Path,
        name: &str,
        module: &str,
        same_module: impl Fn(&ImportDecl) -> bool,
    ) -> Result<bool, HostError> {
        let unit = self.require(path)?;
        let imports = unit.imports();
        if imports.iter().any(|decl| decl.locals().any(|local| local == name)) {
            return Ok(false);
        }
        let existing = imports.iter().find(|decl| {
            same_module(decl) && decl.named_range.is_some() && !decl.type_only
        });
        let edit = match existing {
            Some(decl) => match (decl.named.last(), &decl.named_range) {
                (Some(last), _) => TextEdit::insert(last.range.end, format!(", {name}")),
                (None, Some(range)) => TextEdit::replace(range.clone(), format!("{{ {name} }}")),
                (None, None) => return Ok(false),
            },
            None => {
                let at = unit.import_insertion_point();
                let statement = render_import(&[name], module);
                if at == 0 {
                    TextEdit::insert(0, format!("{statement}\n"))
                } else {
                    TextEdit::insert(at, format!("\n{statement}"))
                }
            }
        };
        self.require_mut(path)?.apply(vec![edit])?;
        tracing::debug!(unit = %path.display(), name, module, "import added");
        Ok(true)
    }

    /// Add missing imports and drop unused named ones
    ///
    /// Missing names are taken from the library table first, then from the
    /// unique (or nearest) project unit exporting them. Additions run first
    /// so a new name can join an import statement that is about to lose its
    /// last used specifier.
    ///
    /// # Errors
    ///
    /// Fails for unknown units.
    pub fn reconcile_imports(
        &mut self,
        path: &Path,
        table: &ImportTable,
    ) -> Result<ImportChanges, HostError> {
        let mut changes = ImportChanges::default();

        let unit = self.require(path)?;
        let mentioned = imports::mentioned_names(unit.root(), unit.text());
        let bound = imports::bound_names(unit.root(), unit.text());
        let missing: Vec<String> = mentioned.difference(&bound).cloned().collect();
        for name in missing {
            let added = if let Some(module) = table.module_for(&name) {
                let module = module.to_string();
                self.add_import(path, &name, &module)?
            } else if let Some(target) = self.exporter_for(path, &name) {
                self.add_import_of_unit(path, &name, &target)?
            } else {
                false
            };
            if added {
                changes.added.push(name);
            }
        }

        let unit = self.require(path)?;
        let mut edits = Vec::new();
        for decl in unit.imports() {
            let (kept, unused): (Vec<_>, Vec<_>) = decl
                .named
                .iter()
                .partition(|spec| mentioned.contains(spec.local()));
            if unused.is_empty() {
                continue;
            }
            changes
                .removed
                .extend(unused.iter().map(|spec| spec.local().to_string()));
            if !kept.is_empty() {
                if let Some(range) = &decl.named_range {
                    let list: Vec<&str> = kept.iter().map(|spec| spec.text.as_str()).collect();
                    edits.push(TextEdit::replace(range.clone(), format!("{{ {} }}", list.join(", "))));
                }
            } else if let Some(default) = &decl.default {
                let keyword = if decl.type_only { "import type" } else { "import" };
                edits.push(TextEdit::replace(
                    decl.statement.clone(),
                    format!("{keyword} {default} from '{}';", decl.source),
                ));
            } else if decl.namespace.is_none() {
                edits.push(TextEdit::delete(unit.removal_range_of(decl.statement.clone())));
            }
        }
        self.require_mut(path)?.apply(edits)?;

        if !changes.is_empty() {
            tracing::debug!(
                unit = %path.display(),
                added = ?changes.added,
                removed = ?changes.removed,
                "imports reconciled"
            );
        }
        Ok(changes)
    }

    /// Units whose text differs from what was loaded
    #[must_use]
    pub fn changed_units(&self) -> Vec<PathBuf> {
        self.units
            .iter()
            .filter(|(_, unit)| unit.is_changed())
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Write every unit whose text differs from disk
    ///
    /// # Errors
    ///
    /// Fails on the first unit that cannot be written.
    pub fn save(&mut self) -> Result<Vec<PathBuf>, HostError> {
        let mut written = Vec::new();
        for (path, unit) in &mut self.units {
            if !unit.is_dirty() {
                continue;
            }
            std::fs::write(path, unit.text()).map_err(|e| HostError::io(path.as_path(), e))?;
            unit.mark_persisted();
            written.push(path.clone());
        }
        tracing::info!(written = written.len(), "project saved");
        Ok(written)
    }
}

fn identifier_references(unit: &SourceUnit, name: &str) -> Vec<Reference> {
    syntax::descendants(unit.root())
        .into_iter()
        .filter(|node| syntax::is_identifier_like(node.kind()) && unit.text_of(*node) == name)
        .map(|node| Reference {
            unit: unit.path().to_path_buf(),
            range: node.byte_range(),
            in_import: syntax::is_inside(node, "import_statement"),
        })
        .collect()
}

/// Last path segment a specifier for this module could end with
fn module_stem(module: &Path) -> String {
    let stem = module.file_stem().map(|s| s.to_string_lossy().into_owned());
    match stem.as_deref() {
        Some("index") => module
            .parent()
            .and_then(Path::file_name)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Some(stem) => stem.to_string(),
        None => String::new(),
    }
}

fn could_name(specifier: &str, stems: &BTreeSet<String>) -> bool {
    let last = specifier.trim_end_matches('/').rsplit('/').next().unwrap_or(specifier);
    matches!(last, "" | "." | "..") || stems.contains(last) || stems.contains(last.trim_end_matches(".ts"))
}
