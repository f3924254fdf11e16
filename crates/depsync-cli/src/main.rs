#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use commands::Target;
use depsync_core::Config;
use depsync_engine::InstallOptions;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "depsync")]
#[command(author, version, about = "Keep bower.json and installed packages in step", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Installer binary to drive [default: $DEPSYNC_TOOL, else bower]
    #[arg(long, global = true, value_name = "BIN")]
    tool: Option<String>,

    /// Operate on a sub-project, relative to the project root
    #[arg(long, global = true, value_name = "DIR")]
    path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Create a bower.json in the working directory
    Init {
        /// Package name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// List installed packages
    List {
        /// Group into production, development and transitive packages
        #[arg(long)]
        summary: bool,
    },

    /// Compare installed packages with the manifest
    Status,

    /// Install one or more packages
    Install {
        /// Packages to install (name or name#range)
        #[arg(required = true)]
        packages: Vec<String>,

        /// Range applied to packages given without one
        #[arg(long)]
        version: Option<String>,

        /// Save to dependencies
        #[arg(short = 'S', long)]
        save: bool,

        /// Save to devDependencies
        #[arg(short = 'D', long)]
        save_dev: bool,
    },

    /// Uninstall a package
    Uninstall {
        package: String,

        /// Remove even if other packages depend on it
        #[arg(short, long)]
        force: bool,
    },

    /// Update a package, optionally to a new range
    Update {
        package: String,

        /// New range to record and install
        #[arg(long)]
        version: Option<String>,
    },

    /// Declare an installed package in the manifest
    Track {
        package: String,

        /// Declare under devDependencies
        #[arg(short = 'D', long)]
        dev: bool,
    },

    /// Remove a package from the manifest, leaving it installed
    Untrack { package: String },

    /// Reconcile packages and manifest
    Sync {
        #[command(subcommand)]
        direction: SyncCommands,
    },

    /// Uninstall packages nothing declares or depends on
    Prune,

    /// Search the registry
    Search { query: String },

    /// Show registry information for a package
    Info { package: String },

    /// Follow manifest and rc edits, streaming notifications
    Watch,
}

#[derive(clap::Subcommand, Debug)]
enum SyncCommands {
    /// Install and uninstall until packages match the manifest
    Packages,
    /// Rewrite the manifest to match the installed packages
    Manifest,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json)
        .with_tool(cli.tool);

    logging::init(config.verbosity, config.json_logs);

    let json = cli.json;
    let target = Target {
        config,
        path: cli.path,
    };

    let Some(command) = cli.command else {
        return commands::version::run(json);
    };

    let span = tracing::info_span!("cmd", cwd = %cwd.display());
    let _guard = span.enter();

    match command {
        Commands::Version => commands::version::run(json),
        Commands::Init { name } => commands::init::run(&cwd, name, json),
        Commands::List { summary } => commands::list::list(&target, json, summary),
        Commands::Status => commands::list::status(&target, json),
        Commands::Install {
            packages,
            version,
            save,
            save_dev,
        } => commands::pkg::install(
            &target,
            json,
            packages,
            InstallOptions {
                version,
                save,
                save_dev,
            },
        ),
        Commands::Uninstall { package, force } => {
            commands::pkg::uninstall(&target, json, package, force)
        }
        Commands::Update { package, version } => {
            commands::pkg::update(&target, json, package, version)
        }
        Commands::Track { package, dev } => commands::manifest::track(&target, json, package, dev),
        Commands::Untrack { package } => commands::manifest::untrack(&target, json, package),
        Commands::Sync { direction } => match direction {
            SyncCommands::Packages => commands::manifest::sync_packages(&target, json),
            SyncCommands::Manifest => commands::manifest::sync_manifest(&target, json),
        },
        Commands::Prune => commands::pkg::prune(&target, json),
        Commands::Search { query } => commands::pkg::search(&target, json, query),
        Commands::Info { package } => commands::pkg::info(&target, json, package),
        Commands::Watch => commands::watch::run(&target, json),
    }
}
