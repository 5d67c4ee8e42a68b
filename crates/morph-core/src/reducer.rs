//! Reducer unit migration
//!
//! Rewrites the switch-based reducing function of a store into a
//! registration table built with `createReducer` and `on`, and reduces the
//! function itself to a delegation:
//!
//! ```text
//! const reducer = createReducer(
//!   initialState,
//!   on(loadProduct, state => ({ ...state, loading: true })),
//! );
//!
//! export function productsReducer(state = initialState, action: Action) {
//!   return reducer(state, action);
//! }
//! ```

use std::path::Path;

use serde::Serialize;

use morph_host::{syntax, DeclarationKind, Node, Project, SourceUnit, TextEdit};

use crate::actions::{mentions_call, ActionTypeMap};
use crate::chunk::chunk_labels;
use crate::config::MigrationConfig;
use crate::error::{MigrationError, SkipReason};
use crate::naming::factory_name;

/// One non-empty case clause of the legacy switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducerClause {
    /// Case label text, e.g. `ProductsActionTypes.LoadProduct`
    pub label: String,
    /// Handler body: a block, or an expression for a concise arrow
    pub body: String,
    /// Whether the body mentions the state parameter
    pub depends_on_state: bool,
    /// Whether the body mentions the event parameter
    pub depends_on_action: bool,
    /// Labels of the empty clauses falling through into this one
    pub preceding: Vec<String>,
}

impl ReducerClause {
    /// Handler parameter list for this clause
    #[must_use]
    pub fn shape(&self) -> HandlerShape {
        HandlerShape::from_flags(self.depends_on_state, self.depends_on_action)
    }
}

/// Parameter list of a registration handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandlerShape {
    /// `(state, action) =>`
    StateAndAction,
    /// `state =>`
    StateOnly,
    /// `(_, action) =>`
    ActionOnly,
    /// `() =>`
    Neither,
}

impl HandlerShape {
    /// Shape from the two dependency flags
    #[must_use]
    pub fn from_flags(state: bool, action: bool) -> Self {
        match (state, action) {
            (true, true) => Self::StateAndAction,
            (true, false) => Self::StateOnly,
            (false, true) => Self::ActionOnly,
            (false, false) => Self::Neither,
        }
    }

    /// Parameter text using the reducing function's parameter names
    #[must_use]
    pub fn params(self, state: &str, action: &str) -> String {
        match self {
            Self::StateAndAction => format!("({state}, {action})"),
            Self::StateOnly => state.to_string(),
            Self::ActionOnly => format!("(_, {action})"),
            Self::Neither => "()".to_string(),
        }
    }
}

/// Counts of one reducer migration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReducerSummary {
    /// Non-empty clauses extracted
    pub clauses: usize,
    /// `on(...)` registrations emitted after label chunking
    pub registrations: usize,
    /// Case labels not declared by this store
    pub dependencies: Vec<String>,
}

/// Result of migrating a reducer unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReducerOutcome {
    /// Converted
    Migrated(ReducerSummary),
    /// Left untouched
    Skipped(SkipReason),
}

#[derive(Debug)]
struct Signature {
    name: String,
    state: String,
    action: String,
    initial_state: String,
}

/// Migrates reducer units
#[derive(Debug, Clone, Copy)]
pub struct ReducerMigrator<'c> {
    config: &'c MigrationConfig,
}

impl<'c> ReducerMigrator<'c> {
    /// Create a migrator
    #[must_use]
    pub fn new(config: &'c MigrationConfig) -> Self {
        Self { config }
    }

    /// Migrate one reducer unit
    ///
    /// `types` is the store's action type map; labels missing from it are
    /// reported as dependencies on other stores. Without a map the audit is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::ManualMigrationRequired`] when the reducing
    /// function has no switch statement.
    pub fn migrate(
        &self,
        project: &mut Project,
        path: &Path,
        types: Option<&ActionTypeMap>,
    ) -> Result<ReducerOutcome, MigrationError> {
        let Some(unit) = project.unit(path) else {
            return Ok(ReducerOutcome::Skipped(SkipReason::UnitAbsent));
        };
        tracing::info!(unit = %path.display(), "migrating reducer");
        if mentions_call(unit, &self.config.target.create_reducer) {
            tracing::info!(unit = %path.display(), "already migrated, skipping");
            return Ok(ReducerOutcome::Skipped(SkipReason::AlreadyMigrated));
        }
        let Some(function) = self.reducer_function(unit) else {
            tracing::debug!(unit = %path.display(), "no reducing function");
            return Ok(ReducerOutcome::Skipped(SkipReason::NoReducerFunction));
        };
        let signature = signature_of(unit, function);

        let Some(switch) = syntax::descendants(function)
            .into_iter()
            .find(|n| n.kind() == "switch_statement")
        else {
            return Err(MigrationError::ManualMigrationRequired {
                unit: path.to_path_buf(),
                function: signature.name,
            });
        };

        let clauses = extract_clauses(unit, switch, &signature);
        let dependencies = types.map_or_else(Vec::new, |map| audit(&clauses, map));
        for dependency in &dependencies {
            tracing::warn!(unit = %path.display(), %dependency, "store depends on foreign action");
        }

        let (table, registrations) = self.render_table(&clauses, &signature);
        let edits = self.rewrite_function(unit, function, &signature, table);
        project.apply(path, edits)?;

        let imports = self.config.import_table();
        let on = &self.config.target.on;
        let module = imports.module_for(on).unwrap_or("@ngrx/store").to_string();
        project.add_import(path, on, &module)?;
        project.reconcile_imports(path, &imports)?;

        tracing::info!(
            unit = %path.display(),
            clauses = clauses.len(),
            registrations,
            "reducer migrated"
        );
        Ok(ReducerOutcome::Migrated(ReducerSummary {
            clauses: clauses.len(),
            registrations,
            dependencies,
        }))
    }

    fn reducer_function<'t>(&self, unit: &'t SourceUnit) -> Option<Node<'t>> {
        unit.declarations_of(DeclarationKind::Function)
            .into_iter()
            .find(|d| {
                unit.name_of(d)
                    .is_some_and(|n| n.ends_with(&self.config.naming.reducer_function_suffix))
            })
            .map(|d| d.node)
    }

    fn render_table(&self, clauses: &[ReducerClause], signature: &Signature) -> (String, usize) {
        let target = &self.config.target;
        let mut entries = vec![signature.initial_state.clone()];
        for clause in clauses {
            let handler = format!(
                "{} => {}",
                clause.shape().params(&signature.state, &signature.action),
                clause.body
            );
            let own = factory_name(&clause.label);
            let preceding: Vec<String> = clause.preceding.iter().map(|l| factory_name(l)).collect();
            for group in chunk_labels(&own, &preceding) {
                entries.push(format!("{}({}, {handler})", target.on, group.join(", ")));
            }
        }
        let registrations = entries.len() - 1;
        let table = format!(
            "const {} = {}(\n  {},\n);\n\n",
            target.table_name,
            target.create_reducer,
            entries.join(",\n  ")
        );
        (table, registrations)
    }

    fn rewrite_function(
        &self,
        unit: &SourceUnit,
        function: Node<'_>,
        signature: &Signature,
        table: String,
    ) -> Vec<TextEdit> {
        let statement = function
            .parent()
            .filter(|p| p.kind() == "export_statement")
            .unwrap_or(function);
        let mut edits = vec![TextEdit::insert(unit.start_with_doc(statement), table)];

        let event_param = format!("{}: {}", signature.action, self.config.target.event_type);
        if let Some(params) = function.child_by_field_name("parameters") {
            let list = parameters(params);
            match (list.first(), list.get(1)) {
                (_, Some(event)) => edits.push(TextEdit::replace_node(*event, event_param)),
                (Some(state), None) => {
                    edits.push(TextEdit::insert(state.end_byte(), format!(", {event_param}")));
                }
                (None, None) => edits.push(TextEdit::replace_node(
                    params,
                    format!("({}, {event_param})", signature.state),
                )),
            }
        }
        if let Some(body) = function.child_by_field_name("body") {
            edits.push(TextEdit::replace_node(
                body,
                format!(
                    "{{\n  return {}({}, {});\n}}",
                    self.config.target.table_name, signature.state, signature.action
                ),
            ));
        }
        edits
    }
}

fn parameters(params: Node<'_>) -> Vec<Node<'_>> {
    syntax::named_children(params)
        .into_iter()
        .filter(|p| matches!(p.kind(), "required_parameter" | "optional_parameter"))
        .collect()
}

fn signature_of(unit: &SourceUnit, function: Node<'_>) -> Signature {
    let list = function
        .child_by_field_name("parameters")
        .map(parameters)
        .unwrap_or_default();
    let pattern = |i: usize| {
        list.get(i)
            .and_then(|p| p.child_by_field_name("pattern"))
            .map(|p| unit.text_of(p).to_string())
    };
    Signature {
        name: function
            .child_by_field_name("name")
            .map(|n| unit.text_of(n).to_string())
            .unwrap_or_default(),
        state: pattern(0).unwrap_or_else(|| "state".to_string()),
        action: pattern(1).unwrap_or_else(|| "action".to_string()),
        initial_state: list
            .first()
            .and_then(|p| p.child_by_field_name("value"))
            .map_or_else(|| "initialState".to_string(), |v| unit.text_of(v).to_string()),
    }
}

/// Walk the switch's clauses in order, folding fallthrough labels
fn extract_clauses(unit: &SourceUnit, switch: Node<'_>, signature: &Signature) -> Vec<ReducerClause> {
    let Some(body) = switch.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut clauses = Vec::new();
    let mut buffered: Vec<String> = Vec::new();
    for case in syntax::named_children(body) {
        if case.kind() != "switch_case" {
            continue;
        }
        let Some(value) = case.child_by_field_name("value") else {
            continue;
        };
        let label = unit.text_of(value).to_string();
        let statements: Vec<Node<'_>> = syntax::named_children(case)
            .into_iter()
            .filter(|n| n.id() != value.id())
            .collect();
        if statements.is_empty() {
            buffered.push(label);
            continue;
        }

        let (statements, breaks) = strip_trailing_break(statements);
        let (mut depends_on_state, depends_on_action) = mentions(unit, &statements, signature);
        let body = if breaks {
            depends_on_state = true;
            body_returning_state(unit, &statements, &signature.state)
        } else {
            handler_body(unit, &statements)
        };
        let clause = ReducerClause {
            label,
            body,
            depends_on_state,
            depends_on_action,
            preceding: std::mem::take(&mut buffered),
        };
        tracing::debug!(
            label = %clause.label,
            preceding = clause.preceding.len(),
            shape = ?clause.shape(),
            "clause extracted"
        );
        clauses.push(clause);
    }
    if !buffered.is_empty() {
        tracing::debug!(labels = ?buffered, "dropping trailing fallthrough labels");
    }
    clauses
}

fn mentions(unit: &SourceUnit, statements: &[Node<'_>], signature: &Signature) -> (bool, bool) {
    let mut state = false;
    let mut action = false;
    for node in statements.iter().flat_map(|s| syntax::descendants(*s)) {
        if !matches!(node.kind(), "identifier" | "shorthand_property_identifier") {
            continue;
        }
        let text = unit.text_of(node);
        state |= text == signature.state;
        action |= text == signature.action;
    }
    (state, action)
}

fn handler_body(unit: &SourceUnit, statements: &[Node<'_>]) -> String {
    if let [only] = statements {
        match only.kind() {
            "statement_block" => return unit.text_of(*only).to_string(),
            "return_statement" => {
                if let Some(expr) = syntax::named_children(*only).into_iter().next() {
                    let text = unit.text_of(expr);
                    return if matches!(expr.kind(), "object" | "sequence_expression") {
                        format!("({text})")
                    } else {
                        text.to_string()
                    };
                }
            }
            _ => {}
        }
    }
    let (Some(first), Some(last)) = (statements.first(), statements.last()) else {
        return "{}".to_string();
    };
    format!("{{\n{}\n}}", unit.slice(first.start_byte()..last.end_byte()))
}

/// Drops an unlabeled `break` ending the clause, looking inside a lone block
fn strip_trailing_break(statements: Vec<Node<'_>>) -> (Vec<Node<'_>>, bool) {
    let inner = match statements.as_slice() {
        [block] if block.kind() == "statement_block" => syntax::named_children(*block),
        _ => statements.clone(),
    };
    match inner.split_last() {
        Some((last, rest))
            if last.kind() == "break_statement" && last.child_by_field_name("label").is_none() =>
        {
            (rest.to_vec(), true)
        }
        _ => (statements, false),
    }
}

/// A clause that breaks out of the switch leaves with the current state
fn body_returning_state(unit: &SourceUnit, statements: &[Node<'_>], state: &str) -> String {
    let (Some(first), Some(last)) = (statements.first(), statements.last()) else {
        return state.to_string();
    };
    let indent = " ".repeat(last.start_position().column);
    format!(
        "{{\n{}\n{indent}return {state};\n}}",
        unit.slice(first.start_byte()..last.end_byte())
    )
}

/// Labels whose member is not declared by this store
fn audit(clauses: &[ReducerClause], types: &ActionTypeMap) -> Vec<String> {
    clauses
        .iter()
        .flat_map(|c| c.preceding.iter().chain(std::iter::once(&c.label)))
        .filter(|label| {
            !types.contains(syntax::last_segment(label))
        })
        .cloned()
        .collect()
}
