//! Command implementations and shared output plumbing.
//!
//! Every command prints either a human summary or, with `--json`, a single
//! pretty-printed object on stdout:
//!
//! ```json
//! {"ok": true, ...}
//! {"ok": false, "error": {"code": "NO_MANIFEST", "message": "..."}}
//! ```

pub mod init;
pub mod list;
pub mod manifest;
pub mod pkg;
pub mod version;
pub mod watch;

use depsync_core::pkg::SyncError;
use depsync_core::{paths, Config, LocalFs};
use depsync_engine::{CliExecutor, CoordinatorOptions, ProjectCoordinator};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// Exit code when the project or installer cannot be set up.
pub const EXIT_SETUP: i32 = 1;

/// Exit code for a failed operation.
pub const EXIT_FAILED: i32 = 2;

/// Where a command operates.
#[derive(Debug, Clone)]
pub struct Target {
    pub config: Config,
    /// Sub-project directory, relative to the project root.
    pub path: Option<PathBuf>,
}

/// Why a command failed.
#[derive(Debug)]
pub enum Failure {
    Setup(depsync_core::Error),
    Sync(SyncError),
}

impl From<SyncError> for Failure {
    fn from(e: SyncError) -> Self {
        Self::Sync(e)
    }
}

impl From<depsync_core::Error> for Failure {
    fn from(e: depsync_core::Error) -> Self {
        Self::Setup(e)
    }
}

impl Failure {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Setup(_) => EXIT_SETUP,
            Self::Sync(_) => EXIT_FAILED,
        }
    }

    fn info(&self) -> ErrorInfo {
        match self {
            Self::Sync(e) => ErrorInfo {
                code: e.code().to_string(),
                message: e.to_string(),
                dependants: match e {
                    SyncError::Conflict { dependants, .. } => dependants.clone(),
                    _ => Vec::new(),
                },
            },
            Self::Setup(e) => ErrorInfo {
                code: setup_code(e).to_string(),
                message: e.to_string(),
                dependants: Vec::new(),
            },
        }
    }
}

fn setup_code(e: &depsync_core::Error) -> &'static str {
    match e {
        depsync_core::Error::ToolNotFound { .. } => "TOOL_NOT_FOUND",
        depsync_core::Error::Other(_) => "INTERNAL",
    }
}

/// Error details in JSON output.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependants: Vec<String>,
}

/// Top-level JSON object for every command.
#[derive(Serialize)]
struct Report<'a, T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    result: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

/// Print the outcome of a command; exits the process on failure.
pub fn finish<T: Serialize>(
    outcome: std::result::Result<T, Failure>,
    json: bool,
    human: impl FnOnce(&T),
) -> Result<()> {
    match outcome {
        Ok(value) => {
            if json {
                print_json(&Report {
                    ok: true,
                    result: Some(&value),
                    error: None,
                })?;
            } else {
                human(&value);
            }
            Ok(())
        }
        Err(failure) => {
            let info = failure.info();
            if json {
                print_json(&Report::<()> {
                    ok: false,
                    result: None,
                    error: Some(info),
                })?;
            } else {
                eprintln!("error[{}]: {}", info.code, info.message);
            }
            std::process::exit(failure.exit_code());
        }
    }
}

/// Open the project containing the target's working directory.
///
/// The project root is the nearest ancestor holding `bower.json` or `.git`,
/// else the working directory itself.
pub async fn open_project(target: &Target) -> std::result::Result<ProjectCoordinator, Failure> {
    let config = &target.config;
    let root = paths::project_root(&config.cwd).unwrap_or_else(|| config.cwd.clone());
    let executor = CliExecutor::new(&config.tool)?;
    tracing::debug!(
        root = %root.display(),
        tool = %executor.program().display(),
        "Opening project"
    );

    let coordinator = ProjectCoordinator::open(
        root,
        Arc::new(executor),
        Arc::new(LocalFs),
        CoordinatorOptions::default(),
    )
    .await?;

    if let Some(path) = &target.path {
        coordinator.set_active_path(path.clone()).await?;
    }
    Ok(coordinator)
}

/// Open the project, run `op` on it, and print the outcome.
pub fn run_project<T, F, Fut>(target: &Target, json: bool, op: F, human: impl FnOnce(&T)) -> Result<()>
where
    T: Serialize,
    F: FnOnce(ProjectCoordinator) -> Fut,
    Fut: Future<Output = std::result::Result<T, Failure>>,
{
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let outcome = runtime.block_on(async {
        let coordinator = open_project(target).await?;
        let result = op(coordinator.clone()).await;
        coordinator.close();
        result
    });
    finish(outcome, json, human)
}
