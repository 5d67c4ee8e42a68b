//! Migration orchestrator
//!
//! Runs the three migrators over every store in fixed phase order:
//! 1. all declaration units, then checkpoint
//! 2. all reducer units (with the type maps from phase 1), then checkpoint
//! 3. all pipeline units, then checkpoint
//!
//! A unit that fails is recorded and the phase moves on. Only host errors
//! while checkpointing abort the run.

use std::path::{Path, PathBuf};

use morph_host::resolve::normalize;
use morph_host::{HostError, Project};

use crate::actions::{ActionMigrator, ActionOutcome, ActionTypeMap};
use crate::config::MigrationConfig;
use crate::error::{ConfigError, MigrationError};
use crate::pipeline::{PipelineMigrator, PipelineOutcome};
use crate::reducer::{ReducerMigrator, ReducerOutcome};
use crate::report::{RunReport, StoreReport, UnitOutcome, UnitReport};
use crate::store::Store;

/// Drives a whole migration run
#[derive(Debug)]
pub struct Orchestrator<'c> {
    config: &'c MigrationConfig,
    actions: ActionMigrator<'c>,
    dry_run: bool,
}

impl<'c> Orchestrator<'c> {
    /// Create an orchestrator
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid.
    pub fn new(config: &'c MigrationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            config,
            actions: ActionMigrator::new(config)?,
            dry_run: false,
        })
    }

    /// Keep every change in memory
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Stores to migrate: the given directories, or every discovered store
    #[must_use]
    pub fn discover(&self, project: &Project, dirs: &[PathBuf]) -> Vec<Store> {
        if dirs.is_empty() {
            let stores = Store::discover(project, &self.config.naming);
            tracing::info!(stores = stores.len(), "stores discovered");
            return stores;
        }
        dirs.iter()
            .map(|dir| {
                let dir = if dir.is_absolute() || dir.starts_with(project.root()) {
                    normalize(dir)
                } else {
                    normalize(&project.root().join(dir))
                };
                Store::from_dir(project, &dir, &self.config.naming)
            })
            .collect()
    }

    /// Migrate the given stores
    ///
    /// # Errors
    ///
    /// Fails only when a checkpoint cannot be written.
    pub fn run(&self, project: &mut Project, stores: &[Store]) -> Result<RunReport, HostError> {
        let mut report = RunReport::start(self.dry_run);
        report.stores = stores
            .iter()
            .map(|s| StoreReport::new(s.name.clone(), s.dir.clone()))
            .collect();

        tracing::info!(stores = stores.len(), "phase 1: action declarations");
        let mut types: Vec<Option<ActionTypeMap>> = Vec::with_capacity(stores.len());
        for (store, entry) in stores.iter().zip(&mut report.stores) {
            let (outcome, map) = self.migrate_actions(project, &store.declaration);
            entry.actions = Some(UnitReport::new(&store.declaration, outcome));
            types.push(map);
        }
        self.checkpoint(project, &mut report)?;

        tracing::info!("phase 2: reducers");
        for ((store, entry), map) in stores.iter().zip(&mut report.stores).zip(&types) {
            let outcome = self.migrate_reducer(project, &store.reducer, map.as_ref());
            entry.reducer = Some(UnitReport::new(&store.reducer, outcome));
        }
        self.checkpoint(project, &mut report)?;

        tracing::info!("phase 3: pipelines");
        for (store, entry) in stores.iter().zip(&mut report.stores) {
            for path in &store.pipelines {
                let outcome = self.migrate_pipeline(project, path);
                entry.pipelines.push(UnitReport::new(path, outcome));
            }
        }
        self.checkpoint(project, &mut report)?;

        report.changed = project.changed_units();
        report.finish();
        let counts = report.counts();
        tracing::info!(
            migrated = counts.migrated,
            skipped = counts.skipped,
            failed = counts.failed,
            "migration finished"
        );
        Ok(report)
    }

    fn migrate_actions(&self, project: &mut Project, path: &Path) -> (UnitOutcome, Option<ActionTypeMap>) {
        match self.actions.migrate(project, path) {
            Ok(ActionOutcome::Migrated { catalog, summary }) => (
                UnitOutcome::Migrated {
                    detail: format!(
                        "{} action(s), {} reference(s) in {} other unit(s)",
                        summary.actions,
                        summary.references(),
                        summary.units.len()
                    ),
                    references: summary.references(),
                    dependencies: Vec::new(),
                },
                Some(catalog.types),
            ),
            Ok(ActionOutcome::Skipped(reason)) => (UnitOutcome::Skipped { reason }, None),
            Err(error) => (failed(path, &error), None),
        }
    }

    fn migrate_reducer(
        &self,
        project: &mut Project,
        path: &Path,
        types: Option<&ActionTypeMap>,
    ) -> UnitOutcome {
        match ReducerMigrator::new(self.config).migrate(project, path, types) {
            Ok(ReducerOutcome::Migrated(summary)) => UnitOutcome::Migrated {
                detail: format!(
                    "{} clause(s), {} registration(s)",
                    summary.clauses, summary.registrations
                ),
                references: 0,
                dependencies: summary.dependencies,
            },
            Ok(ReducerOutcome::Skipped(reason)) => UnitOutcome::Skipped { reason },
            Err(error) => failed(path, &error),
        }
    }

    fn migrate_pipeline(&self, project: &mut Project, path: &Path) -> UnitOutcome {
        match PipelineMigrator::new(self.config).migrate(project, path) {
            Ok(PipelineOutcome::Migrated(summary)) => UnitOutcome::Migrated {
                detail: format!("{} pipeline(s)", summary.properties),
                references: 0,
                dependencies: Vec::new(),
            },
            Ok(PipelineOutcome::Skipped(reason)) => UnitOutcome::Skipped { reason },
            Err(error) => failed(path, &error),
        }
    }

    fn checkpoint(&self, project: &mut Project, report: &mut RunReport) -> Result<(), HostError> {
        if self.dry_run {
            tracing::debug!("dry run, checkpoint skipped");
            return Ok(());
        }
        let written = project.save()?;
        tracing::info!(units = written.len(), "checkpoint written");
        for path in written {
            if !report.written.contains(&path) {
                report.written.push(path);
            }
        }
        Ok(())
    }
}

fn failed(path: &Path, error: &MigrationError) -> UnitOutcome {
    tracing::error!(unit = %path.display(), %error, "unit migration failed");
    UnitOutcome::Failed {
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_host::HostConfig;

    #[test]
    fn explicit_dirs_are_joined_to_the_root() {
        let config = MigrationConfig::default();
        let project = Project::from_sources(
            "web",
            HostConfig::new(),
            [("web/src/store/a/a.actions.ts", ""), ("web/src/store/b/b.actions.ts", "")],
        )
        .unwrap();
        let orchestrator = Orchestrator::new(&config).unwrap();
        let stores = orchestrator.discover(&project, &[PathBuf::from("src/store/b")]);
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].declaration, PathBuf::from("web/src/store/b/b.actions.ts"));
        assert_eq!(orchestrator.discover(&project, &[]).len(), 2);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let config = MigrationConfig::default();
        let mut project = Project::from_sources(
            "",
            HostConfig::new(),
            [(
                "store/a/a.actions.ts",
                "export enum AActionTypes {\n  Go = '[A] Go',\n}\n\nexport class Go implements Action {\n  readonly type = AActionTypes.Go;\n}\n",
            )],
        )
        .unwrap();
        let orchestrator = Orchestrator::new(&config).unwrap().with_dry_run(true);
        let stores = orchestrator.discover(&project, &[]);
        let report = orchestrator.run(&mut project, &stores).unwrap();
        assert!(report.dry_run);
        assert!(report.written.is_empty());
        assert_eq!(report.changed, vec![PathBuf::from("store/a/a.actions.ts")]);
        assert_eq!(report.counts().migrated, 1);
        assert_eq!(report.counts().skipped, 1);
    }
}
