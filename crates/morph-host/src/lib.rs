//! TypeScript Syntax Host
//!
//! Loads a TypeScript project into concrete syntax trees and offers the
//! operations a source-to-source migration needs:
//!
//! - Open a project and enumerate units by path or directory
//! - Apply byte-range edit batches with reparse
//! - Resolve module specifiers (relative, path aliases, barrels)
//! - Find syntactic references to an exported symbol
//! - Reconcile imports after a rewrite
//! - Persist changed units
//!
//! # Example
//!
//! ```rust,ignore
//! use morph_host::{HostConfig, Project};
//!
//! let project = Project::open("./my-app", HostConfig::default())?;
//! for unit in project.units() {
//!     println!("{}", unit.path().display());
//! }
//! ```

pub mod config;
pub mod edit;
pub mod error;
pub mod imports;
pub mod project;
pub mod resolve;
pub mod syntax;
pub mod unit;

pub use config::{HostConfig, ImportTable};
pub use edit::{apply_edits, retain_outermost, TextEdit};
pub use error::HostError;
pub use imports::{ImportDecl, ImportSpec, ReExport};
pub use project::{ImportChanges, Project, Reference};
pub use unit::{Declaration, DeclarationKind, SourceUnit};

/// Re-exported so callers can name node types without a direct dependency
pub use tree_sitter::Node;

/// Host version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
