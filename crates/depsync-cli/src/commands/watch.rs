//! `depsync watch`: follow edits to the manifest and rc file.
//!
//! Notifications are streamed to stdout as they happen, one JSON object per
//! line with `--json`. Runs until interrupted.

use super::{finish, open_project, Failure, Target};
use depsync_core::pkg::SyncStatus;
use depsync_engine::{ProjectEvent, ProjectWatcher};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Serialize)]
struct WatchResult {
    root: PathBuf,
}

pub fn run(target: &Target, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let outcome = runtime.block_on(watch(target, json));
    finish(outcome, json, |result| {
        println!("Stopped watching {}", result.root.display());
    })
}

async fn watch(target: &Target, json: bool) -> std::result::Result<WatchResult, Failure> {
    let project = open_project(target).await?;
    let root = project.root().await;
    let mut events = project.subscribe();

    let (tx, mut changes) = mpsc::unbounded_channel();
    let _watcher = ProjectWatcher::start(&root, tx)
        .map_err(|e| Failure::Setup(depsync_core::Error::other(e.to_string())))?;
    info!(root = %root.display(), "Watching for project file changes");

    print_event(
        json,
        &ProjectEvent::StatusChanged {
            status: project.status().await,
        },
    );

    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                if let Err(e) = project.handle_change(change).await {
                    warn!(change = %change, error = %e, "Rebuild after change failed");
                }
            }
            event = events.recv() => match event {
                Ok(event) => print_event(json, &event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Dropped notifications");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    project.close();
    Ok(WatchResult { root })
}

fn print_event(json: bool, event: &ProjectEvent) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "Failed to encode notification"),
        }
        return;
    }

    match event {
        ProjectEvent::DependenciesAdded { names } => println!("+ {}", names.join(", ")),
        ProjectEvent::DependenciesRemoved { names } => println!("- {}", names.join(", ")),
        ProjectEvent::DependenciesUpdated { names } => println!("~ {}", names.join(", ")),
        ProjectEvent::StatusChanged { status } => println!("status: {}", describe(status)),
        ProjectEvent::ActivePathChanged { path } => println!("active: {}", path.display()),
    }
}

fn describe(status: &SyncStatus) -> String {
    if status.is_synced() {
        return "in sync".to_string();
    }
    format!(
        "{} missing, {} untracked, {} out of sync",
        status.missing.len(),
        status.untracked.len(),
        status.version_out_of_sync.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_status() {
        assert_eq!(describe(&SyncStatus::default()), "in sync");

        let mut status = SyncStatus::default();
        status.missing.insert("qunit".to_string());
        status.untracked.insert("lodash".to_string());
        assert_eq!(describe(&status), "1 missing, 1 untracked, 0 out of sync");
    }
}
