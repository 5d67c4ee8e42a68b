//! `store-morph` command line

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use morph_core::{MigrationConfig, Orchestrator, Preflight};
use morph_host::Project;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

fn cli() -> Command {
    let project = Arg::new("project")
        .long("project")
        .value_name("DIR")
        .default_value(".")
        .value_parser(value_parser!(PathBuf))
        .help("Project root to migrate");
    let config = Arg::new("config")
        .long("config")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("Configuration file (default: <project>/store-morph.toml)");

    Command::new("store-morph")
        .version(morph_core::VERSION)
        .about("Migrates legacy NgRx stores to the creator-function API")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("check")
                .about("Run the pre-flight checks over all store units")
                .arg(project.clone())
                .arg(config.clone()),
        )
        .subcommand(
            Command::new("migrate")
                .about("Migrate stores: actions, then reducers, then effects")
                .arg(
                    Arg::new("stores")
                        .value_name("STORE_DIR")
                        .num_args(0..)
                        .value_parser(value_parser!(PathBuf))
                        .help("Store directories (default: every store found)"),
                )
                .arg(project)
                .arg(config)
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Do not write any file"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the run report as JSON"),
                )
                .arg(
                    Arg::new("skip-preflight")
                        .long("skip-preflight")
                        .action(ArgAction::SetTrue)
                        .help("Migrate even when pre-flight checks fail"),
                ),
        )
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn load(args: &ArgMatches) -> anyhow::Result<(MigrationConfig, Project)> {
    let root = args
        .get_one::<PathBuf>("project")
        .map_or_else(|| PathBuf::from("."), Clone::clone);
    let config = match args.get_one::<PathBuf>("config") {
        Some(file) => MigrationConfig::load(file),
        None => MigrationConfig::discover(&root),
    }
    .context("loading configuration")?;
    let project = Project::open(&root, config.project.clone())
        .with_context(|| format!("opening project {}", root.display()))?;
    Ok((config, project))
}

fn check(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let (config, project) = load(args)?;
    let report = Preflight::run(&project, &config);
    print!("{}", report.render_text());
    Ok(if report.passed() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn migrate(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let (config, mut project) = load(args)?;

    if !args.get_flag("skip-preflight") {
        let gate = Preflight::run(&project, &config);
        if !gate.passed() {
            eprint!("{}", gate.render_text());
            tracing::error!(violations = gate.violations.len(), "pre-flight failed, nothing migrated");
            return Ok(ExitCode::FAILURE);
        }
    }

    let dirs: Vec<PathBuf> = args
        .get_many::<PathBuf>("stores")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let orchestrator = Orchestrator::new(&config)
        .context("invalid configuration")?
        .with_dry_run(args.get_flag("dry-run"));
    let stores = orchestrator.discover(&project, &dirs);
    if stores.is_empty() {
        tracing::warn!(root = %display_root(project.root()), "no stores found");
    }
    let report = orchestrator
        .run(&mut project, &stores)
        .context("writing migrated units")?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(ExitCode::SUCCESS)
}

fn display_root(root: &Path) -> String {
    if root.as_os_str().is_empty() {
        ".".to_string()
    } else {
        root.display().to_string()
    }
}

fn main() -> ExitCode {
    init_tracing();
    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("check", args)) => check(args),
        Some(("migrate", args)) => migrate(args),
        _ => Ok(ExitCode::SUCCESS),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn parses_migrate_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "store-morph",
                "migrate",
                "src/app/core/store/shopping/products",
                "--project",
                "web",
                "--dry-run",
                "--json",
            ])
            .unwrap();
        let Some(("migrate", args)) = matches.subcommand() else {
            panic!("expected migrate");
        };
        let stores: Vec<&PathBuf> = args.get_many::<PathBuf>("stores").unwrap().collect();
        assert_eq!(stores, vec![&PathBuf::from("src/app/core/store/shopping/products")]);
        assert_eq!(args.get_one::<PathBuf>("project"), Some(&PathBuf::from("web")));
        assert!(args.get_flag("dry-run"));
        assert!(args.get_flag("json"));
        assert!(!args.get_flag("skip-preflight"));
    }

    #[test]
    fn check_defaults_to_current_directory() {
        let matches = cli().try_get_matches_from(["store-morph", "check"]).unwrap();
        let Some(("check", args)) = matches.subcommand() else {
            panic!("expected check");
        };
        assert_eq!(args.get_one::<PathBuf>("project"), Some(&PathBuf::from(".")));
        assert!(args.get_one::<PathBuf>("config").is_none());
    }
}
