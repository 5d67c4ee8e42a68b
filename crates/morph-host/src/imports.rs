//! Import and re-export statements
//!
//! Owned snapshots of `import` / `export ... from` statements so callers can
//! keep them across edits of other units.

use std::collections::BTreeSet;
use std::ops::Range;

use tree_sitter::Node;

use crate::syntax;

/// One `name [as alias]` entry of a named import list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Imported name
    pub name: String,
    /// Local alias
    pub alias: Option<String>,
    /// Full specifier text, e.g. `type A as B`
    pub text: String,
    /// Byte range of the specifier
    pub range: Range<usize>,
}

impl ImportSpec {
    /// Name bound in the importing unit
    #[inline]
    #[must_use]
    pub fn local(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An `import` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Byte range of the whole statement
    pub statement: Range<usize>,
    /// Module specifier without quotes
    pub source: String,
    /// Default import binding
    pub default: Option<String>,
    /// `* as x` binding
    pub namespace: Option<String>,
    /// Named imports
    pub named: Vec<ImportSpec>,
    /// Range of the `{ ... }` list
    pub named_range: Option<Range<usize>>,
    /// `import type { ... }`
    pub type_only: bool,
}

impl ImportDecl {
    pub(crate) fn from_node(node: Node<'_>, text: &str) -> Option<Self> {
        let source = node.child_by_field_name("source")?;
        let mut decl = ImportDecl {
            statement: node.byte_range(),
            source: unquote(&text[source.byte_range()]).to_string(),
            default: None,
            namespace: None,
            named: Vec::new(),
            named_range: None,
            type_only: syntax::children(node)
                .iter()
                .any(|child| child.kind() == "type"),
        };
        let Some(clause) = syntax::child_of_kind(node, "import_clause") else {
            return Some(decl);
        };
        for part in syntax::named_children(clause) {
            match part.kind() {
                "identifier" => decl.default = Some(text[part.byte_range()].to_string()),
                "namespace_import" => {
                    decl.namespace = syntax::named_children(part)
                        .first()
                        .map(|id| text[id.byte_range()].to_string());
                }
                "named_imports" => {
                    decl.named_range = Some(part.byte_range());
                    for spec in syntax::named_children(part) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        decl.named.push(ImportSpec {
                            name: text[name.byte_range()].to_string(),
                            alias: spec
                                .child_by_field_name("alias")
                                .map(|alias| text[alias.byte_range()].to_string()),
                            text: text[spec.byte_range()].to_string(),
                            range: spec.byte_range(),
                        });
                    }
                }
                _ => {}
            }
        }
        Some(decl)
    }

    /// Local names bound by this statement
    pub fn locals(&self) -> impl Iterator<Item = &str> {
        self.default
            .as_deref()
            .into_iter()
            .chain(self.namespace.as_deref())
            .chain(self.named.iter().map(ImportSpec::local))
    }

    /// Named import whose imported name is `name`
    #[must_use]
    pub fn named_import(&self, name: &str) -> Option<&ImportSpec> {
        self.named.iter().find(|spec| spec.name == name)
    }

    /// Whether the specifier is relative
    #[inline]
    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.source.starts_with('.')
    }
}

/// An `export ... from` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReExport {
    /// Module specifier without quotes
    pub source: String,
    /// `(imported, exported)` pairs; `None` for `export * from`
    pub names: Option<Vec<(String, String)>>,
}

impl ReExport {
    pub(crate) fn from_node(node: Node<'_>, text: &str) -> Option<Self> {
        let source = node.child_by_field_name("source")?;
        let source = unquote(&text[source.byte_range()]).to_string();
        let Some(clause) = syntax::child_of_kind(node, "export_clause") else {
            return Some(Self {
                source,
                names: None,
            });
        };
        let names = syntax::named_children(clause)
            .into_iter()
            .filter_map(|spec| {
                let name = text[spec.child_by_field_name("name")?.byte_range()].to_string();
                let exported = spec
                    .child_by_field_name("alias")
                    .map_or_else(|| name.clone(), |alias| text[alias.byte_range()].to_string());
                Some((name, exported))
            })
            .collect();
        Some(Self {
            source,
            names: Some(names),
        })
    }

    /// Name under which `name` leaves the barrel, if it does
    #[must_use]
    pub fn exported_as(&self, name: &str) -> Option<String> {
        match &self.names {
            None => Some(name.to_string()),
            Some(pairs) => pairs
                .iter()
                .find(|(imported, _)| imported == name)
                .map(|(_, exported)| exported.clone()),
        }
    }
}

/// Render `import { a, b } from 'module';`
#[must_use]
pub fn render_import(names: &[&str], module: &str) -> String {
    format!("import {{ {} }} from '{module}';", names.join(", "))
}

/// Strip matching quotes around a string literal
#[must_use]
pub fn unquote(literal: &str) -> &str {
    let trimmed = literal.trim();
    for quote in ['\'', '"', '`'] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}

/// Names mentioned by identifiers outside import statements
#[must_use]
pub fn mentioned_names(root: Node<'_>, text: &str) -> BTreeSet<String> {
    syntax::descendants(root)
        .into_iter()
        .filter(|node| syntax::is_identifier_like(node.kind()))
        .filter(|node| !syntax::is_inside(*node, "import_statement"))
        .filter(|node| !is_reexport_name(*node))
        .map(|node| text[node.byte_range()].to_string())
        .collect()
}

/// Names bound anywhere in the unit: declarations, parameters, patterns and imports
///
/// Scopes are not analyzed; a name bound anywhere counts as bound everywhere.
#[must_use]
pub fn bound_names(root: Node<'_>, text: &str) -> BTreeSet<String> {
    let mut bound = BTreeSet::new();
    for node in syntax::descendants(root) {
        let binding = match node.kind() {
            "import_specifier" => node
                .child_by_field_name("alias")
                .or_else(|| node.child_by_field_name("name")),
            "import_clause" => syntax::child_of_kind(node, "identifier"),
            "namespace_import" => syntax::child_of_kind(node, "identifier"),
            "variable_declarator"
            | "function_declaration"
            | "generator_function_declaration"
            | "class_declaration"
            | "abstract_class_declaration"
            | "enum_declaration"
            | "interface_declaration"
            | "type_alias_declaration"
            | "type_parameter" => node.child_by_field_name("name"),
            "required_parameter" | "optional_parameter" => node.child_by_field_name("pattern"),
            "arrow_function" => node.child_by_field_name("parameter"),
            "catch_clause" => node.child_by_field_name("parameter"),
            "shorthand_property_identifier_pattern" => Some(node),
            _ => None,
        };
        let Some(binding) = binding else { continue };
        if binding.kind() == "identifier"
            || binding.kind() == "type_identifier"
            || binding.kind() == "shorthand_property_identifier_pattern"
        {
            bound.insert(text[binding.byte_range()].to_string());
        } else {
            // destructuring patterns bind every identifier inside them
            for inner in syntax::descendants(binding) {
                if matches!(
                    inner.kind(),
                    "identifier" | "shorthand_property_identifier_pattern"
                ) && !is_pattern_key(inner)
                {
                    bound.insert(text[inner.byte_range()].to_string());
                }
            }
        }
    }
    bound
}

fn is_pattern_key(node: Node<'_>) -> bool {
    node.parent().is_some_and(|parent| {
        parent.kind() == "pair_pattern"
            && parent
                .child_by_field_name("key")
                .is_some_and(|key| key.id() == node.id())
    })
}

fn is_reexport_name(node: Node<'_>) -> bool {
    syntax::first_ancestor(node, "export_statement")
        .is_some_and(|stmt| stmt.child_by_field_name("source").is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::SourceUnit;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_import_shapes() {
        let unit = SourceUnit::parse(
            "a.ts",
            "import Def, { A, B as C } from './x';\nimport * as ns from \"y\";\nimport type { T } from 'z';\n",
        )
        .unwrap();
        let imports = unit.imports();
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].source, "./x");
        assert_eq!(imports[0].default.as_deref(), Some("Def"));
        let locals: Vec<_> = imports[0].locals().collect();
        assert_eq!(locals, vec!["Def", "A", "C"]);
        assert_eq!(imports[1].namespace.as_deref(), Some("ns"));
        assert!(imports[2].type_only);
    }

    #[test]
    fn reads_re_exports() {
        let unit = SourceUnit::parse(
            "index.ts",
            "export * from './a';\nexport { B as Bee, C } from './b';\n",
        )
        .unwrap();
        let re = unit.re_exports();
        assert_eq!(re.len(), 2);
        assert_eq!(re[0].exported_as("X").as_deref(), Some("X"));
        assert_eq!(re[1].exported_as("B").as_deref(), Some("Bee"));
        assert_eq!(re[1].exported_as("D"), None);
    }

    #[test]
    fn mentions_skip_imports() {
        let src = "import { A, B } from './x';\nconst c: A = make(d);\n";
        let unit = SourceUnit::parse("a.ts", src).unwrap();
        let mentioned = mentioned_names(unit.root(), src);
        assert!(mentioned.contains("A"));
        assert!(!mentioned.contains("B"));
        assert!(mentioned.contains("make"));
    }

    #[test]
    fn bindings_cover_params_and_patterns() {
        let src = "function f(state = s, { a, b: c }) { const [x] = g; return (y) => y; }";
        let unit = SourceUnit::parse("a.ts", src).unwrap();
        let bound = bound_names(unit.root(), src);
        for name in ["f", "state", "a", "c", "x", "y"] {
            assert!(bound.contains(name), "{name} should be bound");
        }
        assert!(!bound.contains("b"));
        assert!(!bound.contains("g"));
    }

    #[test]
    fn unquotes_literals() {
        assert_eq!(unquote("'@ngrx/store'"), "@ngrx/store");
        assert_eq!(unquote("\"./x\""), "./x");
    }
}
