//! `depsync list` and `depsync status`.

use super::{run_project, Failure, Target};
use depsync_core::pkg::{PackageNode, PackageStatus, PackagesSummary, SyncStatus};
use miette::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Serialize)]
struct ListResult {
    root: PathBuf,
    packages: Vec<PackageNode>,
}

#[derive(Serialize)]
struct SummaryResult {
    root: PathBuf,
    summary: PackagesSummary,
}

#[derive(Serialize)]
pub struct StatusResult {
    pub synced: bool,
    pub status: SyncStatus,
    /// Why the manifest is being ignored, if it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_error: Option<String>,
}

/// List every package in the graph, or grouped by kind with `summary`.
pub fn list(target: &Target, json: bool, summary: bool) -> Result<()> {
    if summary {
        return run_project(
            target,
            json,
            |project| async move {
                Ok::<_, Failure>(SummaryResult {
                    root: project.root().await,
                    summary: project.packages_summary().await,
                })
            },
            |result| {
                print_group("dependencies", &result.summary.production);
                print_group("devDependencies", &result.summary.development);
                print_group("other", &result.summary.dependencies);
            },
        );
    }

    run_project(
        target,
        json,
        |project| async move {
            Ok::<_, Failure>(ListResult {
                root: project.root().await,
                packages: project.packages().await,
            })
        },
        |result| {
            if result.packages.is_empty() {
                println!("No packages in {}", result.root.display());
            }
            for node in &result.packages {
                print_node(node);
            }
        },
    )
}

/// Report how the installed packages differ from the manifest.
pub fn status(target: &Target, json: bool) -> Result<()> {
    run_project(
        target,
        json,
        |project| async move {
            let status = project.status().await;
            Ok::<_, Failure>(StatusResult {
                synced: status.is_synced(),
                status,
                manifest_error: project.manifest_error().await.map(|e| e.to_string()),
            })
        },
        print_status,
    )
}

pub fn print_status(result: &StatusResult) {
    if let Some(error) = &result.manifest_error {
        eprintln!("warning: {error}");
    }
    if result.synced {
        println!("Installed packages match the manifest");
        return;
    }
    print_names("missing", &result.status.missing);
    print_names("untracked", &result.status.untracked);
    print_names("version out of sync", &result.status.version_out_of_sync);
}

fn print_names(label: &str, names: &BTreeSet<String>) {
    if !names.is_empty() {
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        println!("{label}: {}", names.join(", "));
    }
}

fn print_group(label: &str, nodes: &[PackageNode]) {
    if nodes.is_empty() {
        return;
    }
    println!("{label}:");
    for node in nodes {
        print!("  ");
        print_node(node);
    }
}

fn print_node(node: &PackageNode) {
    let marker = match node.status {
        PackageStatus::Installed => '+',
        PackageStatus::Missing => '!',
        PackageStatus::Untracked => '?',
    };
    let version = node.installed_version.as_deref().unwrap_or("-");
    let mut line = format!("{marker} {} {version}", node.name);
    if let Some(range) = &node.manifest_range {
        line.push_str(&format!(" ({range})"));
    }
    if node.status != PackageStatus::Installed {
        line.push_str(&format!(" [{}]", node.status));
    }
    if let Some(latest) = &node.latest_known_version {
        if node.installed_version.as_ref() != Some(latest) {
            line.push_str(&format!(" latest {latest}"));
        }
    }
    println!("{line}");
    if !node.dependencies.is_empty() {
        let deps: Vec<&str> = node.dependencies.iter().map(String::as_str).collect();
        println!("    requires {}", deps.join(", "));
    }
}
