//! Action unit migration
//!
//! Converts one declaration unit from the enum + class pattern to factory
//! declarations:
//!
//! ```text
//! export enum XActionTypes { LoadFail = '[X] Load Fail' }
//! export class LoadFail implements Action {
//!   readonly type = XActionTypes.LoadFail;
//!   constructor(public payload: { error: HttpError }) {}
//! }
//! ```
//!
//! becomes
//!
//! ```text
//! export const loadFail = createAction('[X] Load Fail', props<{ payload: { error: HttpError } }>());
//! ```
//!
//! The whole plan is read before the first edit, so a malformed unit is
//! skipped untouched.

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;

use morph_host::{syntax, Declaration, DeclarationKind, Node, Project, SourceUnit, TextEdit};

use crate::config::{MigrationConfig, NamingConfig};
use crate::error::{ConfigError, MigrationError, SkipReason};
use crate::naming::lower_first;
use crate::references::{classify, return_type_of, rewrite_references, rewrite_site, FactoryTarget};
use crate::store::UnitRole;

/// Enum member name to literal discriminator text, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionTypeMap(IndexMap<String, String>);

impl ActionTypeMap {
    /// Literal text for a member, quotes included
    #[must_use]
    pub fn get(&self, member: &str) -> Option<&str> {
        self.0.get(member).map(String::as_str)
    }

    /// Whether a member exists
    #[inline]
    #[must_use]
    pub fn contains(&self, member: &str) -> bool {
        self.0.contains_key(member)
    }

    /// Number of members
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Member names in order
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<(String, String)> for ActionTypeMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What an action migration learned about its store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionCatalog {
    /// Enum members and their literals
    pub types: ActionTypeMap,
    /// Enum member to factory name, for members with a class
    pub factories: IndexMap<String, String>,
}

impl ActionCatalog {
    /// Factory for an enum member, falling back to its lower-camel form
    #[must_use]
    pub fn factory_for_member(&self, member: &str) -> String {
        self.factories
            .get(member)
            .cloned()
            .unwrap_or_else(|| lower_first(member))
    }
}

/// Counts of one action migration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSummary {
    /// Classes converted to factories
    pub actions: usize,
    /// Class references rewritten
    pub class_references: usize,
    /// `Enum.Member` references rewritten
    pub enum_references: usize,
    /// Aggregate alias references rewritten
    pub alias_references: usize,
    /// Units touched outside the declaration unit
    pub units: BTreeSet<PathBuf>,
}

impl ActionSummary {
    /// All rewritten references
    #[must_use]
    pub fn references(&self) -> usize {
        self.class_references + self.enum_references + self.alias_references
    }
}

/// Result of migrating a declaration unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Converted
    Migrated {
        /// Type map and factory names
        catalog: ActionCatalog,
        /// Counts
        summary: ActionSummary,
    },
    /// Left untouched
    Skipped(SkipReason),
}

/// Discriminator of a legacy action class
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Discriminator {
    /// `type = Enum.Member`
    Member {
        /// Qualifier text
        qualifier: String,
        /// Member name
        member: String,
    },
    /// `type = '[X] Literal'`
    Literal(String),
    /// Anything else
    Other(String),
}

/// A constructor parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Param {
    pub(crate) name: String,
    pub(crate) optional: bool,
    pub(crate) type_text: Option<String>,
}

/// Shape of a legacy action class
#[derive(Debug, Clone)]
pub(crate) struct ClassShape<'t> {
    pub(crate) name: String,
    pub(crate) node: Node<'t>,
    pub(crate) statement: Node<'t>,
    pub(crate) exported: bool,
    pub(crate) discriminator: Option<Discriminator>,
    pub(crate) params: Vec<Param>,
}

pub(crate) fn inspect_class<'t>(
    unit: &'t SourceUnit,
    decl: &Declaration<'t>,
    naming: &NamingConfig,
) -> Option<ClassShape<'t>> {
    let name = unit.name_of(decl)?.to_string();
    let body = decl.node.child_by_field_name("body")?;
    let mut shape = ClassShape {
        name,
        node: decl.node,
        statement: decl.statement,
        exported: decl.exported,
        discriminator: None,
        params: Vec::new(),
    };
    for member in syntax::named_children(body) {
        match member.kind() {
            "public_field_definition" => {
                let is_discriminator = member
                    .child_by_field_name("name")
                    .is_some_and(|n| unit.text_of(n) == naming.discriminator_field);
                if !is_discriminator {
                    continue;
                }
                shape.discriminator = member.child_by_field_name("value").map(|value| {
                    match (
                        value.kind(),
                        value.child_by_field_name("object"),
                        value.child_by_field_name("property"),
                    ) {
                        ("member_expression", Some(object), Some(property)) => {
                            Discriminator::Member {
                                qualifier: unit.text_of(object).to_string(),
                                member: unit.text_of(property).to_string(),
                            }
                        }
                        ("string", ..) => Discriminator::Literal(unit.text_of(value).to_string()),
                        _ => Discriminator::Other(unit.text_of(value).to_string()),
                    }
                });
            }
            "method_definition" => {
                let is_constructor = member
                    .child_by_field_name("name")
                    .is_some_and(|n| unit.text_of(n) == "constructor");
                if !is_constructor {
                    continue;
                }
                let Some(params) = member.child_by_field_name("parameters") else {
                    continue;
                };
                shape.params = syntax::named_children(params)
                    .into_iter()
                    .filter(|p| matches!(p.kind(), "required_parameter" | "optional_parameter"))
                    .filter_map(|p| {
                        Some(Param {
                            name: unit.text_of(p.child_by_field_name("pattern")?).to_string(),
                            optional: p.kind() == "optional_parameter",
                            type_text: p
                                .child_by_field_name("type")
                                .and_then(|t| syntax::named_children(t).into_iter().next())
                                .map(|t| unit.text_of(t).to_string()),
                        })
                    })
                    .collect();
            }
            _ => {}
        }
    }
    Some(shape)
}

/// Enum members with an initializer, in order
pub(crate) fn read_enum(unit: &SourceUnit, enum_node: Node<'_>) -> ActionTypeMap {
    let Some(body) = enum_node.child_by_field_name("body") else {
        return ActionTypeMap::default();
    };
    syntax::named_children(body)
        .into_iter()
        .filter(|member| member.kind() == "enum_assignment")
        .filter_map(|member| {
            let name = unit.text_of(member.child_by_field_name("name")?);
            let value = unit.text_of(member.child_by_field_name("value")?);
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[derive(Debug)]
struct ClassPlan {
    name: String,
    factory: String,
    member: Option<String>,
    payload_field: Option<String>,
    statement: Range<usize>,
    replacement: String,
}

#[derive(Debug)]
struct ActionPlan {
    enum_name: String,
    types: ActionTypeMap,
    classes: Vec<ClassPlan>,
    alias: Option<(String, Vec<String>)>,
}

/// Migrates declaration units
#[derive(Debug, Clone)]
pub struct ActionMigrator<'c> {
    config: &'c MigrationConfig,
    alias_pattern: Regex,
}

impl<'c> ActionMigrator<'c> {
    /// Create a migrator
    ///
    /// # Errors
    ///
    /// Fails when the aggregate alias pattern does not compile.
    pub fn new(config: &'c MigrationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            config,
            alias_pattern: config.alias_pattern()?,
        })
    }

    /// Migrate one declaration unit
    ///
    /// # Errors
    ///
    /// Only host failures while editing are returned; shape problems skip.
    pub fn migrate(&self, project: &mut Project, path: &Path) -> Result<ActionOutcome, MigrationError> {
        let Some(unit) = project.unit(path) else {
            return Ok(ActionOutcome::Skipped(SkipReason::UnitAbsent));
        };
        tracing::info!(unit = %path.display(), "migrating actions");
        let plan = match self.plan(unit) {
            Ok(plan) => plan,
            Err(reason) => {
                tracing::warn!(unit = %path.display(), %reason, "skipping action unit");
                return Ok(ActionOutcome::Skipped(reason));
            }
        };
        tracing::debug!(
            unit = %path.display(),
            types = plan.types.len(),
            classes = plan.classes.len(),
            "action types read"
        );

        let imports = self.config.import_table();
        let mut summary = ActionSummary {
            actions: plan.classes.len(),
            ..ActionSummary::default()
        };

        // classes become factory declarations in place
        let edits = plan
            .classes
            .iter()
            .map(|class| TextEdit::replace(class.statement.clone(), class.replacement.clone()))
            .collect();
        project.apply(path, edits)?;

        for class in &plan.classes {
            let target = FactoryTarget {
                name: class.factory.clone(),
                payload_field: class.payload_field.clone(),
            };
            tracing::debug!(class = %class.name, "updating references");
            let outcome = rewrite_references(
                project,
                path,
                &class.name,
                |_| false,
                &imports,
                |unit, node| classify(node).map(|site| rewrite_site(unit, site, &target)),
            )?;
            summary.class_references += outcome.rewritten;
            summary.units.extend(outcome.units);
        }

        let catalog = ActionCatalog {
            types: plan.types.clone(),
            factories: plan
                .classes
                .iter()
                .filter_map(|c| c.member.clone().map(|m| (m, c.factory.clone())))
                .collect(),
        };

        let naming = &self.config.naming;
        let outcome = rewrite_references(
            project,
            path,
            &plan.enum_name,
            |unit| matches!(UnitRole::of(unit, naming), UnitRole::Reducer | UnitRole::Pipeline),
            &imports,
            |unit, node| {
                let access = node.parent().filter(|p| p.kind() == "member_expression")?;
                if access.child_by_field_name("object")?.id() != node.id() {
                    return None;
                }
                let member = unit.text_of(access.child_by_field_name("property")?);
                Some(TextEdit::replace_node(
                    access,
                    format!("{}.type", catalog.factory_for_member(member)),
                ))
            },
        )?;
        summary.enum_references = outcome.rewritten;
        summary.units.extend(outcome.units);

        if let Some((alias, factories)) = &plan.alias {
            let replacement = return_type_of(factories);
            let outcome = rewrite_references(
                project,
                path,
                alias,
                |_| false,
                &imports,
                |_, node| Some(TextEdit::replace_node(node, replacement.clone())),
            )?;
            summary.alias_references = outcome.rewritten;
            summary.units.extend(outcome.units);
        }

        // drop the enum and the alias
        let unit = project.require(path)?;
        let mut removals = Vec::new();
        for name in std::iter::once(&plan.enum_name).chain(plan.alias.as_ref().map(|(a, _)| a)) {
            if let Some(decl) = unit.declaration(name) {
                removals.push(TextEdit::delete(unit.removal_range(decl.statement)));
            }
        }
        project.apply(path, removals)?;
        project.reconcile_imports(path, &imports)?;
        summary.units.remove(path);

        tracing::info!(
            unit = %path.display(),
            actions = summary.actions,
            references = summary.references(),
            "actions migrated"
        );
        Ok(ActionOutcome::Migrated { catalog, summary })
    }

    fn plan(&self, unit: &SourceUnit) -> Result<ActionPlan, SkipReason> {
        let declarations = unit.declarations();
        let enums: Vec<_> = declarations
            .iter()
            .filter(|d| d.kind == DeclarationKind::Enum)
            .collect();
        let classes: Vec<_> = declarations
            .iter()
            .filter(|d| d.kind == DeclarationKind::Class)
            .collect();
        if enums.is_empty() || classes.is_empty() {
            let migrated = enums.is_empty()
                && classes.is_empty()
                && mentions_call(unit, &self.config.target.create_action);
            return Err(if migrated {
                SkipReason::AlreadyMigrated
            } else {
                SkipReason::NotActionUnit
            });
        }

        let enum_decl = enums[0];
        let enum_name = unit
            .name_of(enum_decl)
            .ok_or_else(|| SkipReason::Malformed("unnamed enum".into()))?
            .to_string();
        let types = read_enum(unit, enum_decl.node);

        let mut plans = Vec::new();
        for decl in classes {
            let shape = inspect_class(unit, decl, &self.config.naming)
                .ok_or_else(|| SkipReason::Malformed("unnamed class".into()))?;
            let (member, literal) = match &shape.discriminator {
                Some(Discriminator::Member { member, .. }) => {
                    let literal = types.get(member).ok_or_else(|| {
                        SkipReason::Malformed(format!(
                            "class {} refers to unknown action type {member}",
                            shape.name
                        ))
                    })?;
                    (Some(member.clone()), literal.to_string())
                }
                Some(Discriminator::Literal(literal)) => (None, literal.clone()),
                Some(Discriminator::Other(text)) => {
                    return Err(SkipReason::Malformed(format!(
                        "class {} has unsupported {} {text}",
                        shape.name, self.config.naming.discriminator_field
                    )))
                }
                None => {
                    return Err(SkipReason::Malformed(format!(
                        "class {} has no {} field",
                        shape.name, self.config.naming.discriminator_field
                    )))
                }
            };
            plans.push(self.plan_class(&shape, member, &literal));
        }

        let alias = unit
            .declarations_of(DeclarationKind::TypeAlias)
            .into_iter()
            .filter_map(|d| Some((unit.name_of(&d)?.to_string(), d)))
            .find(|(name, _)| self.alias_pattern.is_match(name))
            .and_then(|(name, decl)| {
                let value = decl.node.child_by_field_name("value")?;
                let members = syntax::flatten_union(value)
                    .into_iter()
                    .map(|m| lower_first(unit.text_of(m)))
                    .collect();
                Some((name, members))
            });

        Ok(ActionPlan {
            enum_name,
            types,
            classes: plans,
            alias,
        })
    }

    fn plan_class(&self, shape: &ClassShape<'_>, member: Option<String>, literal: &str) -> ClassPlan {
        let target = &self.config.target;
        let factory = lower_first(&shape.name);
        let payload = shape.params.first();
        let props = payload.map(|param| {
            format!(
                ", {}<{{ {}{}: {} }}>()",
                target.props,
                param.name,
                if param.optional { "?" } else { "" },
                param.type_text.as_deref().unwrap_or("unknown")
            )
        });
        let replacement = format!(
            "{}const {factory} = {}({literal}{});",
            if shape.exported { "export " } else { "" },
            target.create_action,
            props.unwrap_or_default()
        );
        ClassPlan {
            name: shape.name.clone(),
            factory,
            member,
            payload_field: payload.map(|p| p.name.clone()),
            statement: shape.statement.byte_range(),
            replacement,
        }
    }
}

/// Whether the unit calls `function_name(...)` anywhere
pub(crate) fn mentions_call(unit: &SourceUnit, function_name: &str) -> bool {
    syntax::descendants(unit.root()).into_iter().any(|node| {
        node.kind() == "call_expression"
            && node
                .child_by_field_name("function")
                .is_some_and(|f| unit.text_of(f) == function_name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_host::HostConfig;
    use pretty_assertions::assert_eq;

    const ACTIONS: &str = r"import { Action } from '@ngrx/store';

import { HttpError } from 'ish-core/models/http-error/http-error.model';

export enum CountryActionTypes {
  LoadCountries = '[Core] Load Countries',
  LoadCountriesFail = '[Core] Load Countries Fail',
}

export class LoadCountries implements Action {
  readonly type = CountryActionTypes.LoadCountries;
}

/** loading failed */
export class LoadCountriesFail implements Action {
  readonly type = CountryActionTypes.LoadCountriesFail;
  constructor(public payload: { error: HttpError }) {}
}

export type CountryAction = LoadCountries | LoadCountriesFail;
";

    fn project(extra: &[(&str, &str)]) -> Project {
        let mut sources = vec![("src/store/countries/countries.actions.ts", ACTIONS)];
        sources.extend_from_slice(extra);
        Project::from_sources("", HostConfig::new(), sources).unwrap()
    }

    #[test]
    fn reads_enum_in_order() {
        let unit = SourceUnit::parse("a.ts", ACTIONS).unwrap();
        let decl = unit.declaration("CountryActionTypes").unwrap();
        let map = read_enum(&unit, decl.node);
        let members: Vec<_> = map.members().collect();
        assert_eq!(members, vec!["LoadCountries", "LoadCountriesFail"]);
        assert_eq!(map.get("LoadCountries"), Some("'[Core] Load Countries'"));
    }

    #[test]
    fn inspects_class_shape() {
        let unit = SourceUnit::parse("a.ts", ACTIONS).unwrap();
        let decl = unit.declaration("LoadCountriesFail").unwrap();
        let shape = inspect_class(&unit, &decl, &NamingConfig::default()).unwrap();
        assert_eq!(
            shape.discriminator,
            Some(Discriminator::Member {
                qualifier: "CountryActionTypes".into(),
                member: "LoadCountriesFail".into()
            })
        );
        assert_eq!(
            shape.params,
            vec![Param {
                name: "payload".into(),
                optional: false,
                type_text: Some("{ error: HttpError }".into())
            }]
        );
    }

    #[test]
    fn migrates_declaration_unit() {
        let config = MigrationConfig::default();
        let mut p = project(&[]);
        let path = Path::new("src/store/countries/countries.actions.ts");
        let outcome = ActionMigrator::new(&config).unwrap().migrate(&mut p, path).unwrap();
        let ActionOutcome::Migrated { catalog, summary } = outcome else {
            panic!("expected migration");
        };
        assert_eq!(summary.actions, 2);
        assert_eq!(catalog.types.len(), 2);
        assert_eq!(catalog.factory_for_member("LoadCountriesFail"), "loadCountriesFail");
        assert_eq!(
            p.unit(path).unwrap().text(),
            r"import { createAction, props } from '@ngrx/store';

import { HttpError } from 'ish-core/models/http-error/http-error.model';

export const loadCountries = createAction('[Core] Load Countries');

/** loading failed */
export const loadCountriesFail = createAction('[Core] Load Countries Fail', props<{ payload: { error: HttpError } }>());
"
        );
    }

    #[test]
    fn skips_unit_without_classes() {
        let config = MigrationConfig::default();
        let mut p = Project::from_sources(
            "",
            HostConfig::new(),
            [("x.actions.ts", "export enum A { B = 'b' }\n")],
        )
        .unwrap();
        let outcome = ActionMigrator::new(&config)
            .unwrap()
            .migrate(&mut p, Path::new("x.actions.ts"))
            .unwrap();
        assert_eq!(outcome, ActionOutcome::Skipped(SkipReason::NotActionUnit));
        assert!(p.changed_units().is_empty());
    }

    #[test]
    fn skips_malformed_before_editing() {
        let config = MigrationConfig::default();
        let mut p = Project::from_sources(
            "",
            HostConfig::new(),
            [(
                "x.actions.ts",
                "export enum T { A = 'a' }\nexport class A { readonly type = T.Missing; }\n",
            )],
        )
        .unwrap();
        let outcome = ActionMigrator::new(&config)
            .unwrap()
            .migrate(&mut p, Path::new("x.actions.ts"))
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Skipped(SkipReason::Malformed(_))));
        assert!(p.changed_units().is_empty());
    }

    #[test]
    fn absent_unit_is_skipped() {
        let config = MigrationConfig::default();
        let mut p = project(&[]);
        let outcome = ActionMigrator::new(&config)
            .unwrap()
            .migrate(&mut p, Path::new("nope.actions.ts"))
            .unwrap();
        assert_eq!(outcome, ActionOutcome::Skipped(SkipReason::UnitAbsent));
    }
}
