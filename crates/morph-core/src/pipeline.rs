//! Pipeline unit migration
//!
//! Every `@Effect` property runs through an ordered list of passes, then is
//! wrapped in the effect factory. Each pass is applied to a fixpoint: the
//! unit is reparsed and the property located again after every round, so a
//! pass never sees node identities from before an earlier edit.

use std::path::Path;

use indexmap::IndexMap;

use morph_host::{retain_outermost, syntax, Node, Project, SourceUnit, TextEdit};

use crate::actions::mentions_call;
use crate::chunk::{StagedCall, ARITY_LIMIT};
use crate::config::MigrationConfig;
use crate::error::{MigrationError, SkipReason};
use crate::naming::factory_name;

/// Upper bound on rounds for one pass over one property
const MAX_ROUNDS: usize = 32;

/// One rewrite over a pipeline expression
pub trait PipelinePass {
    /// Name used in logs and summaries
    fn name(&self) -> &'static str;

    /// Edits for one round over `pipeline`; empty once the pass is done
    fn round(&self, unit: &SourceUnit, pipeline: Node<'_>, config: &MigrationConfig) -> Vec<TextEdit>;
}

/// Re-emits oversized combinator calls as staged calls
#[derive(Debug, Clone, Copy, Default)]
pub struct AritySafety;

impl AritySafety {
    fn is_offender(unit: &SourceUnit, node: Node<'_>, combinator: &str) -> bool {
        node.kind() == "call_expression"
            && node
                .child_by_field_name("function")
                .is_some_and(|f| unit.text_of(f).contains(combinator))
            && syntax::call_arguments(node).len() > ARITY_LIMIT
    }
}

impl PipelinePass for AritySafety {
    fn name(&self) -> &'static str {
        "arity-safety"
    }

    fn round(&self, unit: &SourceUnit, pipeline: Node<'_>, config: &MigrationConfig) -> Vec<TextEdit> {
        let combinator = config.pipeline.combinator.as_str();
        syntax::descendants(pipeline)
            .into_iter()
            .filter(|node| Self::is_offender(unit, *node, combinator))
            .filter(|node| {
                !syntax::descendants(*node)
                    .into_iter()
                    .skip(1)
                    .any(|inner| Self::is_offender(unit, inner, combinator))
            })
            .filter_map(|call| {
                let callee = unit.text_of(call.child_by_field_name("function")?);
                let arguments: Vec<String> = syntax::call_arguments(call)
                    .into_iter()
                    .map(|a| unit.text_of(a).to_string())
                    .collect();
                Some(TextEdit::replace_node(call, StagedCall::new(callee, &arguments).render()))
            })
            .collect()
    }
}

/// Normalizes filter-operator calls to factory arguments
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterOperator;

impl PipelinePass for FilterOperator {
    fn name(&self) -> &'static str {
        "filter-operator"
    }

    fn round(&self, unit: &SourceUnit, pipeline: Node<'_>, config: &MigrationConfig) -> Vec<TextEdit> {
        let mut edits = Vec::new();
        for call in calls_named(unit, pipeline, &config.pipeline.filter_operator) {
            let Some(function) = call.child_by_field_name("function") else {
                continue;
            };
            let is_marker = |a: &Node<'_>| config.is_bootstrap_marker(syntax::last_segment(unit.text_of(*a)));
            let arguments = syntax::call_arguments(call);
            // a bootstrap marker keeps the type arguments
            let type_arguments = if arguments.iter().any(is_marker) {
                syntax::type_arguments(call).map_or("", |t| unit.text_of(t))
            } else {
                ""
            };
            let rendered: Vec<String> = arguments
                .iter()
                .map(|a| {
                    if is_marker(a) {
                        unit.text_of(*a).to_string()
                    } else {
                        factory_name(unit.text_of(*a))
                    }
                })
                .collect();
            edits.push(TextEdit::replace_node(
                call,
                format!("{}{type_arguments}({})", unit.text_of(function), rendered.join(", ")),
            ));
        }
        edits
    }
}

/// Gives the branch operator explicit type arguments
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchOperator;

impl PipelinePass for BranchOperator {
    fn name(&self) -> &'static str {
        "branch-operator"
    }

    fn round(&self, unit: &SourceUnit, pipeline: Node<'_>, config: &MigrationConfig) -> Vec<TextEdit> {
        let ty = &config.pipeline.branch_type;
        calls_named(unit, pipeline, &config.pipeline.branch_operator)
            .into_iter()
            .filter(|call| syntax::type_arguments(*call).is_none())
            .filter_map(|call| {
                let function = call.child_by_field_name("function")?;
                (unit.text_of(function) == config.pipeline.branch_operator)
                    .then(|| TextEdit::insert(function.end_byte(), format!("<{ty}, {ty}>")))
            })
            .collect()
    }
}

/// Renames operators by callee
#[derive(Debug, Clone, Copy, Default)]
pub struct Rename;

impl PipelinePass for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn round(&self, unit: &SourceUnit, pipeline: Node<'_>, config: &MigrationConfig) -> Vec<TextEdit> {
        syntax::descendants(pipeline)
            .into_iter()
            .filter(|node| node.kind() == "call_expression")
            .filter_map(|call| call.child_by_field_name("function"))
            .filter(|function| function.kind() == "identifier")
            .filter_map(|function| {
                let to = config.pipeline.renames.get(unit.text_of(function))?;
                Some(TextEdit::replace_node(function, to.clone()))
            })
            .collect()
    }
}

/// The passes in the order they must run
#[must_use]
pub fn default_passes() -> Vec<Box<dyn PipelinePass>> {
    vec![
        Box::new(AritySafety),
        Box::new(FilterOperator),
        Box::new(BranchOperator),
        Box::new(Rename),
    ]
}

fn calls_named<'t>(unit: &SourceUnit, root: Node<'t>, name: &str) -> Vec<Node<'t>> {
    syntax::descendants(root)
        .into_iter()
        .filter(|node| node.kind() == "call_expression")
        .filter(|call| {
            call.child_by_field_name("function")
                .is_some_and(|f| syntax::last_segment(unit.text_of(f)) == name)
        })
        .collect()
}

/// Counts of one pipeline migration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Properties wrapped
    pub properties: usize,
    /// Edits applied per pass, in pass order
    pub edits: IndexMap<&'static str, usize>,
}

/// Result of migrating a pipeline unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Converted
    Migrated(PipelineSummary),
    /// Left untouched
    Skipped(SkipReason),
}

/// An annotated property
#[derive(Debug, Clone, Copy)]
struct Annotated<'t> {
    property: Node<'t>,
    decorator: Node<'t>,
}

impl<'t> Annotated<'t> {
    fn name(&self, unit: &'t SourceUnit) -> &'t str {
        self.property
            .child_by_field_name("name")
            .map_or("", |n| unit.text_of(n))
    }

    fn value(&self) -> Option<Node<'t>> {
        self.property.child_by_field_name("value")
    }
}

/// Migrates pipeline units
pub struct PipelineMigrator<'c> {
    config: &'c MigrationConfig,
    passes: Vec<Box<dyn PipelinePass>>,
}

impl std::fmt::Debug for PipelineMigrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.passes.iter().map(|p| p.name()).collect();
        f.debug_struct("PipelineMigrator").field("passes", &names).finish_non_exhaustive()
    }
}

impl<'c> PipelineMigrator<'c> {
    /// Create a migrator with the default passes
    #[must_use]
    pub fn new(config: &'c MigrationConfig) -> Self {
        Self {
            config,
            passes: default_passes(),
        }
    }

    /// Replace the pass list
    #[must_use]
    pub fn with_passes(mut self, passes: Vec<Box<dyn PipelinePass>>) -> Self {
        self.passes = passes;
        self
    }

    /// Migrate one pipeline unit
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::UnrecognizedPipeline`] before any edit when
    /// an annotated property is not initialized with a call.
    pub fn migrate(&self, project: &mut Project, path: &Path) -> Result<PipelineOutcome, MigrationError> {
        let Some(unit) = project.unit(path) else {
            return Ok(PipelineOutcome::Skipped(SkipReason::UnitAbsent));
        };
        tracing::info!(unit = %path.display(), "migrating pipelines");

        let annotated = self.annotated(unit);
        if annotated.is_empty() {
            let reason = if mentions_call(unit, &self.config.target.create_effect) {
                SkipReason::AlreadyMigrated
            } else {
                SkipReason::NoAnnotatedPipelines
            };
            tracing::info!(unit = %path.display(), %reason, "skipping");
            return Ok(PipelineOutcome::Skipped(reason));
        }
        if let Some(bad) = annotated
            .iter()
            .find(|a| a.value().is_none_or(|v| v.kind() != "call_expression"))
        {
            return Err(MigrationError::UnrecognizedPipeline {
                unit: path.to_path_buf(),
                property: bad.name(unit).to_string(),
            });
        }

        let mut summary = PipelineSummary::default();
        for pass in &self.passes {
            summary.edits.insert(pass.name(), 0);
        }
        loop {
            for pass in &self.passes {
                let applied = self.run_pass(project, path, pass.as_ref())?;
                *summary.edits.entry(pass.name()).or_default() += applied;
            }
            if !self.wrap_first(project, path)? {
                break;
            }
            summary.properties += 1;
        }

        let imports = self.config.import_table();
        project.reconcile_imports(path, &imports)?;
        tracing::info!(unit = %path.display(), properties = summary.properties, "pipelines migrated");
        Ok(PipelineOutcome::Migrated(summary))
    }

    fn annotated<'t>(&self, unit: &'t SourceUnit) -> Vec<Annotated<'t>> {
        let annotation = self.config.pipeline.annotation.as_str();
        syntax::descendants(unit.root())
            .into_iter()
            .filter(|node| node.kind() == "public_field_definition")
            .filter_map(|property| {
                let decorator = syntax::decorators_of(property)
                    .into_iter()
                    .find(|d| syntax::decorator_name(*d, unit.text()) == Some(annotation))?;
                Some(Annotated { property, decorator })
            })
            .collect()
    }

    fn run_pass(&self, project: &mut Project, path: &Path, pass: &dyn PipelinePass) -> Result<usize, MigrationError> {
        let mut total = 0;
        for _ in 0..MAX_ROUNDS {
            let unit = project.require(path)?;
            let Some(pipeline) = self.annotated(unit).first().and_then(Annotated::value) else {
                return Ok(total);
            };
            let edits: Vec<TextEdit> = pass
                .round(unit, pipeline, self.config)
                .into_iter()
                .filter(|e| unit.slice(e.range.clone()) != e.replacement)
                .collect();
            let edits = retain_outermost(edits);
            if edits.is_empty() {
                return Ok(total);
            }
            tracing::debug!(unit = %path.display(), pass = pass.name(), edits = edits.len(), "pass round");
            total += project.apply(path, edits)?;
        }
        tracing::warn!(unit = %path.display(), pass = pass.name(), "pass did not settle");
        Ok(total)
    }

    /// Wrap the first annotated property; `false` when none is left
    fn wrap_first(&self, project: &mut Project, path: &Path) -> Result<bool, MigrationError> {
        let unit = project.require(path)?;
        let Some(found) = self.annotated(unit).into_iter().next() else {
            return Ok(false);
        };
        let (Some(name), Some(value)) = (found.property.child_by_field_name("name"), found.value()) else {
            return Ok(false);
        };
        let modifiers = unit.slice(found.decorator.end_byte()..name.start_byte()).trim_start();
        let config = syntax::named_children(found.decorator)
            .into_iter()
            .next()
            .filter(|expr| expr.kind() == "call_expression")
            .and_then(|call| syntax::call_arguments(call).into_iter().next())
            .map(|arg| format!(", {}", unit.text_of(arg)))
            .unwrap_or_default();
        let replacement = format!(
            "{modifiers}{} = {}(() => {}{config})",
            unit.text_of(name),
            self.config.target.create_effect,
            unit.text_of(value)
        );
        tracing::debug!(unit = %path.display(), property = unit.text_of(name), "wrapping pipeline");
        let edit = TextEdit::replace(found.decorator.start_byte()..found.property.end_byte(), replacement);
        project.apply(path, vec![edit])?;
        Ok(true)
    }
}
