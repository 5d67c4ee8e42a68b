//! Project-wide reference rewriting
//!
//! For a declared symbol, every syntactic usage outside the declaring unit
//! and outside import statements is offered to a rewrite function. Rounds
//! repeat per unit until no usage yields an edit; when two edits overlap the
//! outer one wins and the inner site is picked up again next round. Every
//! unit that received an edit gets its imports reconciled.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;

use morph_host::{retain_outermost, syntax, HostError, ImportTable, Node, Project, SourceUnit, TextEdit};

use crate::naming::lower_first;

/// Upper bound on rewrite rounds for one symbol
const MAX_ROUNDS: usize = 32;

/// A classified usage of an action class
#[derive(Debug, Clone, Copy)]
pub enum Site<'t> {
    /// Target of `new`
    Construction {
        /// The `new_expression`
        expression: Node<'t>,
    },
    /// Member of a type union
    UnionMember {
        /// The outermost enclosing `union_type`
        union: Node<'t>,
    },
    /// Bare identifier passed positionally to a call
    CallArgument {
        /// The identifier
        identifier: Node<'t>,
    },
}

/// Site tag without tree references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    /// `new X(...)`
    Construction,
    /// `X | Y`
    UnionMember,
    /// `f(X)`
    CallArgument,
}

impl Site<'_> {
    /// Tag of this site
    #[must_use]
    pub fn kind(&self) -> SiteKind {
        match self {
            Site::Construction { .. } => SiteKind::Construction,
            Site::UnionMember { .. } => SiteKind::UnionMember,
            Site::CallArgument { .. } => SiteKind::CallArgument,
        }
    }
}

/// Classify a usage; `None` leaves it untouched
#[must_use]
pub fn classify(identifier: Node<'_>) -> Option<Site<'_>> {
    let parent = identifier.parent()?;
    match parent.kind() {
        "new_expression"
            if parent
                .child_by_field_name("constructor")
                .is_some_and(|c| c.id() == identifier.id()) =>
        {
            Some(Site::Construction { expression: parent })
        }
        "union_type" => Some(Site::UnionMember {
            union: syntax::outermost_union(parent),
        }),
        "arguments"
            if identifier.kind() == "identifier"
                && parent
                    .parent()
                    .is_some_and(|call| call.kind() == "call_expression") =>
        {
            Some(Site::CallArgument { identifier })
        }
        _ => None,
    }
}

/// The factory replacing an action class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryTarget {
    /// Factory name, e.g. `loadFail`
    pub name: String,
    /// Payload field name, the class's constructor parameter
    pub payload_field: Option<String>,
}

/// `ReturnType<typeof a | typeof b>` over factory names
#[must_use]
pub fn return_type_of(factories: &[String]) -> String {
    let members: Vec<String> = factories.iter().map(|f| format!("typeof {f}")).collect();
    format!("ReturnType<{}>", members.join(" | "))
}

/// Edit rewriting a classified site to its factory form
#[must_use]
pub fn rewrite_site(unit: &SourceUnit, site: Site<'_>, target: &FactoryTarget) -> TextEdit {
    match site {
        Site::Construction { expression } => {
            let arguments = syntax::call_arguments(expression);
            let call = match (arguments.first(), &target.payload_field) {
                (Some(argument), Some(field)) => {
                    format!("{}({{ {field}: {} }})", target.name, unit.text_of(*argument))
                }
                (Some(argument), None) => {
                    format!("{}({{ payload: {} }})", target.name, unit.text_of(*argument))
                }
                (None, _) => format!("{}()", target.name),
            };
            TextEdit::replace_node(expression, call)
        }
        Site::UnionMember { union } => {
            let members: Vec<String> = syntax::flatten_union(union)
                .into_iter()
                .map(|member| lower_first(unit.text_of(member)))
                .collect();
            TextEdit::replace_node(union, return_type_of(&members))
        }
        Site::CallArgument { identifier } => TextEdit::replace_node(identifier, target.name.clone()),
    }
}

/// Result of rewriting one symbol's references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Number of edits applied
    pub rewritten: usize,
    /// Units that received edits
    pub units: BTreeSet<PathBuf>,
}

impl RewriteOutcome {
    /// Merge another outcome into this one
    pub fn absorb(&mut self, other: RewriteOutcome) {
        self.rewritten += other.rewritten;
        self.units.extend(other.units);
    }
}

/// Rewrite every external usage of `symbol` declared in `declaring`
///
/// `skip` excludes further units. `rewrite` maps a usage (an identifier
/// node) to an edit, or `None` to leave it.
///
/// # Errors
///
/// Fails when an edit batch cannot be applied.
pub fn rewrite_references<S, F>(
    project: &mut Project,
    declaring: &Path,
    symbol: &str,
    skip: S,
    imports: &ImportTable,
    mut rewrite: F,
) -> Result<RewriteOutcome, HostError>
where
    S: Fn(&Path) -> bool,
    F: for<'t> FnMut(&'t SourceUnit, Node<'t>) -> Option<TextEdit>,
{
    let mut outcome = RewriteOutcome::default();
    for round in 0.. {
        if round == MAX_ROUNDS {
            tracing::warn!(symbol, "reference rewrite did not settle");
            break;
        }
        let mut per_unit: BTreeMap<PathBuf, Vec<Range<usize>>> = BTreeMap::new();
        for reference in project.references(declaring, symbol) {
            if reference.in_import || reference.unit == declaring || skip(&reference.unit) {
                continue;
            }
            per_unit.entry(reference.unit).or_default().push(reference.range);
        }

        let mut applied = 0;
        for (path, ranges) in per_unit {
            let Some(unit) = project.unit(&path) else { continue };
            let mut edits = Vec::new();
            for range in ranges {
                let Some(node) = unit.node_at(range) else { continue };
                match rewrite(unit, node) {
                    Some(edit) if unit.slice(edit.range.clone()) != edit.replacement => {
                        edits.push(edit);
                    }
                    _ => tracing::debug!(
                        symbol,
                        unit = %path.display(),
                        line = unit.line_of(node.start_byte()),
                        "reference left unrewritten"
                    ),
                }
            }
            let edits = retain_outermost(edits);
            if edits.is_empty() {
                continue;
            }
            applied += project.apply(&path, edits)?;
            outcome.units.insert(path);
        }
        if applied == 0 {
            break;
        }
        outcome.rewritten += applied;
    }

    for path in &outcome.units {
        project.reconcile_imports(path, imports)?;
    }
    if outcome.rewritten > 0 {
        tracing::info!(symbol, count = outcome.rewritten, "updated {} references", outcome.rewritten);
    } else {
        tracing::info!(symbol, "no references found");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_host::HostConfig;
    use pretty_assertions::assert_eq;

    fn first_named<'t>(unit: &'t SourceUnit, text: &str) -> Node<'t> {
        syntax::descendants(unit.root())
            .into_iter()
            .find(|n| syntax::is_identifier_like(n.kind()) && unit.text_of(*n) == text)
            .unwrap()
    }

    #[test]
    fn classifies_sites() {
        let unit = SourceUnit::parse(
            "a.ts",
            "const a = new LoadFail(e);\ntype T = Load | Other;\nf(Save);\nconst x: Keep = y;\n",
        )
        .unwrap();
        let kind = |name| classify(first_named(&unit, name)).map(|s| s.kind());
        assert_eq!(kind("LoadFail"), Some(SiteKind::Construction));
        assert_eq!(kind("Load"), Some(SiteKind::UnionMember));
        assert_eq!(kind("Save"), Some(SiteKind::CallArgument));
        assert_eq!(kind("Keep"), None);
    }

    #[test]
    fn rewrites_construction_with_payload_field() {
        let unit = SourceUnit::parse("a.ts", "store.dispatch(new LoadFail(err));").unwrap();
        let site = classify(first_named(&unit, "LoadFail")).unwrap();
        let target = FactoryTarget {
            name: "loadFail".into(),
            payload_field: Some("error".into()),
        };
        let edit = rewrite_site(&unit, site, &target);
        assert_eq!(edit.replacement, "loadFail({ error: err })");
    }

    #[test]
    fn rewrites_whole_union() {
        let unit = SourceUnit::parse("a.ts", "type T = Load | LoadFail | LoadSuccess;").unwrap();
        let site = classify(first_named(&unit, "LoadFail")).unwrap();
        let target = FactoryTarget {
            name: "loadFail".into(),
            payload_field: None,
        };
        let edit = rewrite_site(&unit, site, &target);
        assert_eq!(
            edit.replacement,
            "ReturnType<typeof load | typeof loadFail | typeof loadSuccess>"
        );
    }

    #[test]
    fn rewrites_across_units_and_reconciles() {
        let mut project = Project::from_sources(
            "",
            HostConfig::new(),
            [
                ("store/x/x.actions.ts", "export const load = createAction('load');\n"),
                (
                    "app/page.ts",
                    "import { Load } from '../store/x/x.actions';\n\nexport function go(store) {\n  store.dispatch(new Load());\n  return [new Load(), other(Load)];\n}\n",
                ),
            ],
        )
        .unwrap();
        let target = FactoryTarget {
            name: "load".into(),
            payload_field: None,
        };
        let outcome = rewrite_references(
            &mut project,
            Path::new("store/x/x.actions.ts"),
            "Load",
            |_| false,
            &ImportTable::new(),
            |unit, node| classify(node).map(|site| rewrite_site(unit, site, &target)),
        )
        .unwrap();
        assert_eq!(outcome.rewritten, 3);
        assert_eq!(
            project.unit(Path::new("app/page.ts")).unwrap().text(),
            "import { load } from '../store/x/x.actions';\n\nexport function go(store) {\n  store.dispatch(load());\n  return [load(), other(load)];\n}\n"
        );
    }
}
