//! Store Morph Core - legacy NgRx store migration
//!
//! Rewrites class-based NgRx stores to the creator-function API:
//! - Action classes and their type enum become `createAction` factories,
//!   with every reference across the project rewritten
//! - Switch-based reducing functions become `createReducer` tables
//! - `@Effect` properties become `createEffect` pipelines
//!
//! # Example
//!
//! ```rust,ignore
//! use morph_core::{MigrationConfig, Orchestrator, Preflight};
//! use morph_host::Project;
//!
//! let config = MigrationConfig::discover(root)?;
//! let mut project = Project::open(root, config.project.clone())?;
//! if Preflight::run(&project, &config).passed() {
//!     let orchestrator = Orchestrator::new(&config)?;
//!     let stores = orchestrator.discover(&project, &[]);
//!     let report = orchestrator.run(&mut project, &stores)?;
//!     print!("{}", report.render_text());
//! }
//! ```

#![warn(unreachable_pub)]

// Building blocks
pub mod chunk;
pub mod config;
pub mod error;
pub mod naming;
pub mod references;
pub mod store;

// Migrators
pub mod actions;
pub mod pipeline;
pub mod reducer;

// Run control
pub mod orchestrator;
pub mod preflight;
pub mod report;

// Re-exports for convenience
pub use actions::{ActionCatalog, ActionMigrator, ActionOutcome, ActionSummary, ActionTypeMap};
pub use chunk::{chunk_arguments, chunk_labels, ArgumentChunk, StageStyle, StagedCall, ARITY_LIMIT};
pub use config::{
    ImportsConfig, MigrationConfig, NamingConfig, PipelineConfig, TargetApi, CONFIG_FILE_NAME,
};
pub use error::{ConfigError, MigrationError, SkipReason};
pub use orchestrator::Orchestrator;
pub use pipeline::{
    AritySafety, BranchOperator, FilterOperator, PipelineMigrator, PipelineOutcome, PipelinePass,
    PipelineSummary, Rename,
};
pub use preflight::{Preflight, PreflightReport, Rule, Violation};
pub use reducer::{HandlerShape, ReducerClause, ReducerMigrator, ReducerOutcome, ReducerSummary};
pub use references::{rewrite_references, FactoryTarget, RewriteOutcome, Site, SiteKind};
pub use report::{OutcomeCounts, RunReport, StoreReport, UnitOutcome, UnitReport};
pub use store::{Store, UnitRole};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a migration
    pub use crate::{
        MigrationConfig, MigrationError, Orchestrator, Preflight, PreflightReport, RunReport,
        SkipReason, Store,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
