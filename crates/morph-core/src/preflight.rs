//! Pre-flight gate
//!
//! Static checks over store units that must hold before migrating. A store
//! failing them would migrate partially or lose references.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use morph_host::{syntax, DeclarationKind, Node, Project, SourceUnit};

use crate::actions::{inspect_class, mentions_call, read_enum, Discriminator};
use crate::config::MigrationConfig;
use crate::store::{is_store_path, UnitRole};

/// A pre-flight rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    /// `import * as x` in a store unit
    NoStarImportsInStore,
    /// `//` comment where a doc comment is expected
    ForceJsdocComments,
    /// Action class the creator migration cannot convert
    CheckActionsForCreatorMigration,
}

impl Rule {
    /// Rule identifier
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::NoStarImportsInStore => "no-star-imports-in-store",
            Self::ForceJsdocComments => "force-jsdoc-comments",
            Self::CheckActionsForCreatorMigration => "check-actions-for-creator-migration",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One rule violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Violated rule
    pub rule: Rule,
    /// Unit path
    pub unit: PathBuf,
    /// 1-based line
    pub line: usize,
    /// What is wrong
    pub message: String,
}

/// Result of the gate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreflightReport {
    /// Violations in unit order
    pub violations: Vec<Violation>,
    /// Store units inspected
    pub units_checked: usize,
}

impl PreflightReport {
    /// Whether the gate passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations of one rule
    pub fn of_rule(&self, rule: Rule) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.rule == rule)
    }

    /// Human-readable report
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut report = String::new();
        for v in &self.violations {
            report.push_str(&format!(
                "{}:{}: [{}] {}\n",
                v.unit.display(),
                v.line,
                v.rule,
                v.message
            ));
        }
        report.push_str(&format!(
            "Pre-flight: {} unit(s) checked, {} violation(s): {}\n",
            self.units_checked,
            self.violations.len(),
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}

/// The gate
#[derive(Debug, Clone, Copy)]
pub struct Preflight<'c> {
    config: &'c MigrationConfig,
}

impl<'c> Preflight<'c> {
    /// Create a gate
    #[must_use]
    pub fn new(config: &'c MigrationConfig) -> Self {
        Self { config }
    }

    /// Check every store unit of the project
    #[must_use]
    pub fn run(project: &Project, config: &MigrationConfig) -> PreflightReport {
        Preflight::new(config).check(project)
    }

    /// Check every store unit of the project
    #[must_use]
    pub fn check(&self, project: &Project) -> PreflightReport {
        let mut report = PreflightReport::default();
        for unit in project.units() {
            if !is_store_path(unit.path(), &self.config.naming) || unit.file_name().ends_with(".spec.ts") {
                continue;
            }
            report.units_checked += 1;
            self.star_imports(unit, &mut report.violations);
            self.doc_comments(unit, &mut report.violations);
            if UnitRole::of(unit.path(), &self.config.naming) == UnitRole::Declaration {
                self.action_classes(unit, &mut report.violations);
            }
        }
        tracing::info!(
            units = report.units_checked,
            violations = report.violations.len(),
            "pre-flight finished"
        );
        report
    }

    fn star_imports(&self, unit: &SourceUnit, out: &mut Vec<Violation>) {
        for import in unit.imports() {
            let Some(namespace) = &import.namespace else {
                continue;
            };
            out.push(violation(
                Rule::NoStarImportsInStore,
                unit,
                import.statement.start,
                format!("namespace import `{namespace}` from '{}'", import.source),
            ));
        }
    }

    fn doc_comments(&self, unit: &SourceUnit, out: &mut Vec<Violation>) {
        let naming = &self.config.naming;
        let mut targets: Vec<(Node<'_>, String)> = Vec::new();
        match UnitRole::of(unit.path(), naming) {
            UnitRole::Declaration => {
                for decl in unit.declarations_of(DeclarationKind::Class) {
                    let name = unit.name_of(&decl).unwrap_or_default();
                    targets.push((decl.statement, format!("action class {name}")));
                }
            }
            UnitRole::Reducer => {
                for decl in unit.declarations_of(DeclarationKind::Function) {
                    let name = unit.name_of(&decl).unwrap_or_default();
                    if name.ends_with(&naming.reducer_function_suffix) {
                        targets.push((decl.statement, format!("reducing function {name}")));
                    }
                }
            }
            UnitRole::Pipeline => {
                let annotation = self.config.pipeline.annotation.as_str();
                for property in syntax::descendants(unit.root()) {
                    if property.kind() != "public_field_definition" {
                        continue;
                    }
                    let annotated = syntax::decorators_of(property)
                        .into_iter()
                        .any(|d| syntax::decorator_name(d, unit.text()) == Some(annotation));
                    if annotated {
                        let name = property
                            .child_by_field_name("name")
                            .map_or("", |n| unit.text_of(n));
                        targets.push((property, format!("pipeline {name}")));
                    }
                }
            }
            UnitRole::Other => {}
        }
        for (node, what) in targets {
            let Some(comment) = unit.leading_comment(node) else {
                continue;
            };
            if unit.text_of(comment).starts_with("//") {
                out.push(violation(
                    Rule::ForceJsdocComments,
                    unit,
                    comment.start_byte(),
                    format!("use a /** */ comment to document {what}"),
                ));
            }
        }
    }

    fn action_classes(&self, unit: &SourceUnit, out: &mut Vec<Violation>) {
        if mentions_call(unit, &self.config.target.create_action) {
            return;
        }
        let enums: Vec<(String, _)> = unit
            .declarations_of(DeclarationKind::Enum)
            .into_iter()
            .map(|decl| {
                let name = unit.name_of(&decl).unwrap_or_default().to_string();
                (name, read_enum(unit, decl.node))
            })
            .collect();
        for decl in unit.declarations_of(DeclarationKind::Class) {
            let Some(shape) = inspect_class(unit, &decl, &self.config.naming) else {
                continue;
            };
            let at = decl.node.start_byte();
            match &shape.discriminator {
                Some(Discriminator::Member { qualifier, member }) => {
                    let known = enums
                        .iter()
                        .any(|(name, types)| name == qualifier && types.contains(member));
                    if !known {
                        out.push(violation(
                            Rule::CheckActionsForCreatorMigration,
                            unit,
                            at,
                            format!("{}: {qualifier}.{member} is not declared in this unit", shape.name),
                        ));
                    }
                }
                _ => out.push(violation(
                    Rule::CheckActionsForCreatorMigration,
                    unit,
                    at,
                    format!(
                        "{}: `{}` must reference an action type enum member",
                        shape.name, self.config.naming.discriminator_field
                    ),
                )),
            }
            if shape.params.len() > 1 {
                out.push(violation(
                    Rule::CheckActionsForCreatorMigration,
                    unit,
                    at,
                    format!(
                        "{}: constructor takes {} parameters, at most one payload is supported",
                        shape.name,
                        shape.params.len()
                    ),
                ));
            }
        }
    }
}

fn violation(rule: Rule, unit: &SourceUnit, offset: usize, message: String) -> Violation {
    Violation {
        rule,
        unit: unit.path().to_path_buf(),
        line: unit.line_of(offset),
        message,
    }
}
