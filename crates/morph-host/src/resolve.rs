//! Module specifier resolution
//!
//! Resolution is purely lexical over the set of loaded units: relative
//! specifiers, configured path aliases and, as a last resort, a unique
//! suffix match on at least two path segments.

use std::path::{Component, Path, PathBuf};

use crate::config::HostConfig;

/// Lexically normalize `.` and `..` components
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `specifier` imported from `importer` to a loaded unit
///
/// `is_unit` answers whether a normalized path is a loaded unit.
pub fn resolve_specifier<'a, F, I>(
    importer: &Path,
    specifier: &str,
    root: &Path,
    config: &HostConfig,
    is_unit: F,
    all_units: I,
) -> Option<PathBuf>
where
    F: Fn(&Path) -> bool,
    I: IntoIterator<Item = &'a Path>,
{
    if specifier.starts_with('.') {
        let base = importer.parent().unwrap_or(Path::new("")).join(specifier);
        return probe(&normalize(&base), &is_unit);
    }

    for (prefix, dir) in &config.path_aliases {
        if let Some(rest) = specifier.strip_prefix(prefix.as_str()) {
            let base = root.join(dir).join(rest.trim_start_matches('/'));
            if let Some(found) = probe(&normalize(&base), &is_unit) {
                return Some(found);
            }
        }
    }

    suffix_match(specifier, all_units)
}

fn probe(base: &Path, is_unit: &impl Fn(&Path) -> bool) -> Option<PathBuf> {
    let base_text = base.to_string_lossy();
    let candidates = [
        PathBuf::from(format!("{base_text}.ts")),
        base.join("index.ts"),
        base.to_path_buf(),
    ];
    candidates.into_iter().find(|candidate| {
        candidate.extension().is_some_and(|ext| ext == "ts") && is_unit(candidate)
    })
}

fn suffix_match<'a>(specifier: &str, units: impl IntoIterator<Item = &'a Path>) -> Option<PathBuf> {
    let segments: Vec<&str> = specifier
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect();
    if segments.len() < 2 {
        return None;
    }
    let mut found: Option<PathBuf> = None;
    for unit in units {
        let stem = unit.with_extension("");
        let mut parts: Vec<String> = stem
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.last().is_some_and(|last| last == "index") {
            parts.pop();
        }
        if parts.len() < segments.len() {
            continue;
        }
        let tail = &parts[parts.len() - segments.len()..];
        if tail.iter().zip(&segments).all(|(a, b)| a == b) {
            if found.is_some() {
                return None;
            }
            found = Some(unit.to_path_buf());
        }
    }
    found
}

/// Relative module specifier from `importer` to `target`, without extension
#[must_use]
pub fn relative_specifier(importer: &Path, target: &Path) -> String {
    let from: Vec<_> = importer
        .parent()
        .unwrap_or(Path::new(""))
        .components()
        .collect();
    let mut to_path = target.with_extension("");
    if to_path.file_name().is_some_and(|name| name == "index") {
        to_path.pop();
    }
    let to: Vec<_> = to_path.components().collect();
    let common = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        format!("./{joined}")
    }
}

/// Number of leading path components two paths share
#[must_use]
pub fn shared_prefix_len(a: &Path, b: &Path) -> usize {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn units() -> BTreeSet<PathBuf> {
        [
            "src/app/core/store/error/error.actions.ts",
            "src/app/core/store/error/index.ts",
            "src/app/core/utils/operators.ts",
            "src/app/shop/products/products.effects.ts",
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect()
    }

    fn resolve(importer: &str, spec: &str) -> Option<PathBuf> {
        let units = units();
        let mut config = HostConfig::default();
        config
            .path_aliases
            .insert("ish-core/".to_string(), PathBuf::from("src/app/core"));
        resolve_specifier(
            Path::new(importer),
            spec,
            Path::new(""),
            &config,
            |p| units.contains(p),
            units.iter().map(PathBuf::as_path),
        )
    }

    #[test]
    fn resolves_relative() {
        assert_eq!(
            resolve("src/app/core/store/error/error.reducer.ts", "./error.actions"),
            Some(PathBuf::from("src/app/core/store/error/error.actions.ts"))
        );
        assert_eq!(
            resolve("src/app/core/store/core.ts", "./error"),
            Some(PathBuf::from("src/app/core/store/error/index.ts"))
        );
    }

    #[test]
    fn resolves_alias() {
        assert_eq!(
            resolve("src/app/shop/products/products.effects.ts", "ish-core/utils/operators"),
            Some(PathBuf::from("src/app/core/utils/operators.ts"))
        );
    }

    #[test]
    fn resolves_unique_suffix() {
        assert_eq!(
            resolve("x.ts", "app/core/utils/operators"),
            Some(PathBuf::from("src/app/core/utils/operators.ts"))
        );
        assert_eq!(resolve("x.ts", "operators"), None);
        assert_eq!(resolve("x.ts", "@ngrx/store"), None);
    }

    #[test]
    fn relative_specifiers() {
        assert_eq!(
            relative_specifier(
                Path::new("src/app/shop/products/products.effects.ts"),
                Path::new("src/app/core/store/error/error.actions.ts")
            ),
            "../../core/store/error/error.actions"
        );
        assert_eq!(
            relative_specifier(Path::new("a/b/x.ts"), Path::new("a/b/y.ts")),
            "./y"
        );
    }

    #[test]
    fn normalizes_parent_components() {
        assert_eq!(normalize(Path::new("a/b/../c/./d.ts")), PathBuf::from("a/c/d.ts"));
    }
}
