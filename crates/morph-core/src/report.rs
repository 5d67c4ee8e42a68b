//! Run report
//!
//! Every unit the orchestrator visits ends up here with one of three
//! outcomes. The report renders as text for humans and serializes to JSON.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SkipReason;

/// Outcome of one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// Rewritten
    Migrated {
        /// Short description of what changed
        detail: String,
        /// References rewritten in other units
        references: usize,
        /// Case labels this store borrows from other stores
        #[serde(skip_serializing_if = "Vec::is_empty")]
        dependencies: Vec<String>,
    },
    /// Left untouched
    Skipped {
        /// Why
        reason: SkipReason,
    },
    /// Aborted, manual work needed
    Failed {
        /// Error message
        error: String,
    },
}

impl UnitOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Migrated { .. } => "migrated",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "FAILED",
        }
    }
}

/// One unit and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    /// Unit path
    pub unit: PathBuf,
    /// Outcome
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

impl UnitReport {
    /// Create a unit report
    #[must_use]
    pub fn new(unit: impl Into<PathBuf>, outcome: UnitOutcome) -> Self {
        Self {
            unit: unit.into(),
            outcome,
        }
    }
}

/// Everything that happened to one store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreReport {
    /// Store name
    pub name: String,
    /// Store directory
    pub dir: PathBuf,
    /// Declaration unit
    pub actions: Option<UnitReport>,
    /// Reducing-function unit
    pub reducer: Option<UnitReport>,
    /// Pipeline units
    pub pipelines: Vec<UnitReport>,
}

impl StoreReport {
    /// Empty report for a store
    #[must_use]
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            actions: None,
            reducer: None,
            pipelines: Vec::new(),
        }
    }

    /// All unit reports in phase order
    pub fn units(&self) -> impl Iterator<Item = &UnitReport> {
        self.actions
            .iter()
            .chain(self.reducer.iter())
            .chain(self.pipelines.iter())
    }
}

/// Outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    /// Migrated units
    pub migrated: usize,
    /// Skipped units
    pub skipped: usize,
    /// Failed units
    pub failed: usize,
}

/// Report of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: Option<DateTime<Utc>>,
    /// Nothing was written
    pub dry_run: bool,
    /// Per-store outcomes
    pub stores: Vec<StoreReport>,
    /// Units written to disk
    pub written: Vec<PathBuf>,
    /// Units whose text changed, written or not
    pub changed: Vec<PathBuf>,
}

impl RunReport {
    /// Start a report now
    #[must_use]
    pub fn start(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            stores: Vec::new(),
            written: Vec::new(),
            changed: Vec::new(),
        }
    }

    /// Stamp the end time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// All unit reports
    pub fn units(&self) -> impl Iterator<Item = &UnitReport> {
        self.stores.iter().flat_map(StoreReport::units)
    }

    /// Outcome counts over all units
    #[must_use]
    pub fn counts(&self) -> OutcomeCounts {
        self.units()
            .fold(OutcomeCounts::default(), |mut counts, unit| {
                match unit.outcome {
                    UnitOutcome::Migrated { .. } => counts.migrated += 1,
                    UnitOutcome::Skipped { .. } => counts.skipped += 1,
                    UnitOutcome::Failed { .. } => counts.failed += 1,
                }
                counts
            })
    }

    /// Whether any unit failed
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.counts().failed > 0
    }

    /// Cross-store dependencies, `(store, label)`
    #[must_use]
    pub fn dependency_warnings(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for store in &self.stores {
            for unit in store.units() {
                if let UnitOutcome::Migrated { dependencies, .. } = &unit.outcome {
                    out.extend(dependencies.iter().map(|d| (store.name.as_str(), d.as_str())));
                }
            }
        }
        out
    }

    /// Human-readable report
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut report = String::new();
        let counts = self.counts();

        report.push_str("=== store-morph report ===\n\n");
        if self.dry_run {
            report.push_str("(dry run, nothing written)\n\n");
        }
        for store in &self.stores {
            report.push_str(&format!("{} ({})\n", store.name, store.dir.display()));
            for unit in store.units() {
                report.push_str(&format!("  {:<9} {}", unit.outcome.label(), unit.unit.display()));
                match &unit.outcome {
                    UnitOutcome::Migrated { detail, .. } => report.push_str(&format!(": {detail}")),
                    UnitOutcome::Skipped { reason } => report.push_str(&format!(": {reason}")),
                    UnitOutcome::Failed { error } => report.push_str(&format!(": {error}")),
                }
                report.push('\n');
            }
        }

        let warnings = self.dependency_warnings();
        if !warnings.is_empty() {
            report.push_str("\n=== Cross-store dependencies ===\n");
            for (store, label) in warnings {
                report.push_str(&format!("  {store} handles {label}\n"));
            }
        }

        report.push_str(&format!(
            "\nMigrated: {}  Skipped: {}  Failed: {}\n",
            counts.migrated, counts.skipped, counts.failed
        ));
        report.push_str(&format!("Units changed: {}  written: {}\n", self.changed.len(), self.written.len()));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> RunReport {
        let mut report = RunReport::start(true);
        let mut store = StoreReport::new("products", "store/products");
        store.actions = Some(UnitReport::new(
            "store/products/products.actions.ts",
            UnitOutcome::Migrated {
                detail: "2 actions".into(),
                references: 3,
                dependencies: Vec::new(),
            },
        ));
        store.reducer = Some(UnitReport::new(
            "store/products/products.reducer.ts",
            UnitOutcome::Migrated {
                detail: "2 clauses".into(),
                references: 0,
                dependencies: vec!["UserActionTypes.Logout".into()],
            },
        ));
        store.pipelines.push(UnitReport::new(
            "store/products/products.effects.ts",
            UnitOutcome::Failed {
                error: "manual migration required".into(),
            },
        ));
        report.stores.push(store);
        report.finish();
        report
    }

    #[test]
    fn counts_and_failures() {
        let report = sample();
        assert_eq!(
            report.counts(),
            OutcomeCounts {
                migrated: 2,
                skipped: 0,
                failed: 1
            }
        );
        assert!(report.has_failures());
        assert_eq!(report.dependency_warnings(), vec![("products", "UserActionTypes.Logout")]);
    }

    #[test]
    fn renders_text() {
        let text = sample().render_text();
        assert!(text.contains("(dry run, nothing written)"));
        assert!(text.contains("  migrated  store/products/products.actions.ts: 2 actions\n"));
        assert!(text.contains("  FAILED    store/products/products.effects.ts: manual migration required\n"));
        assert!(text.contains("products handles UserActionTypes.Logout"));
        assert!(text.contains("Migrated: 2  Skipped: 0  Failed: 1"));
    }

    #[test]
    fn serializes_tagged_outcomes() {
        let skipped = UnitReport::new(
            "a.ts",
            UnitOutcome::Skipped {
                reason: SkipReason::Malformed("unknown member X".into()),
            },
        );
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "unit": "a.ts",
                "status": "skipped",
                "reason": { "kind": "malformed", "detail": "unknown member X" }
            })
        );
    }
}
