//! `depsync track|untrack|sync`.

use super::list::{print_status, StatusResult};
use super::{run_project, Failure, Target};
use depsync_core::pkg::DependencyKind;
use depsync_engine::SyncReport;
use miette::Result;
use serde::Serialize;

#[derive(Serialize)]
struct TrackResult {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<DependencyKind>,
}

pub fn track(target: &Target, json: bool, package: String, dev: bool) -> Result<()> {
    let kind = if dev {
        DependencyKind::Development
    } else {
        DependencyKind::Production
    };
    run_project(
        target,
        json,
        |project| async move {
            project.track_package(&package, kind).await?;
            Ok::<_, Failure>(TrackResult {
                name: package,
                kind: Some(kind),
            })
        },
        |result| println!("Tracking {}", result.name),
    )
}

pub fn untrack(target: &Target, json: bool, package: String) -> Result<()> {
    run_project(
        target,
        json,
        |project| async move {
            project.untrack_package(&package).await?;
            Ok::<_, Failure>(TrackResult {
                name: package,
                kind: None,
            })
        },
        |result| println!("No longer tracking {}", result.name),
    )
}

/// Install and uninstall until the packages match the manifest.
pub fn sync_packages(target: &Target, json: bool) -> Result<()> {
    run_project(
        target,
        json,
        |project| async move { Ok::<_, Failure>(project.sync_with_manifest().await?) },
        |report: &SyncReport| {
            for name in &report.removed {
                println!("- {name}");
            }
            for name in &report.installed {
                println!("+ {name}");
            }
            for name in &report.updated {
                println!("~ {name}");
            }
        },
    )
}

/// Rewrite the manifest to describe the installed packages.
pub fn sync_manifest(target: &Target, json: bool) -> Result<()> {
    run_project(
        target,
        json,
        |project| async move {
            project.sync_with_installed_state().await?;
            let status = project.status().await;
            Ok::<_, Failure>(StatusResult {
                synced: status.is_synced(),
                status,
                manifest_error: None,
            })
        },
        print_status,
    )
}
