//! `depsync install|uninstall|update|prune|search|info`.

use super::{run_project, Failure, Target};
use depsync_core::pkg::{AddOutcome, PackageInfo, SearchHit};
use depsync_engine::{InstallOptions, UpdateOptions};
use miette::Result;
use serde::Serialize;

#[derive(Serialize)]
struct RemoveResult {
    removed: Vec<String>,
}

#[derive(Serialize)]
struct SearchResult {
    results: Vec<SearchHit>,
}

#[derive(Serialize)]
struct InfoResult {
    info: PackageInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest: Option<String>,
}

pub fn install(target: &Target, json: bool, packages: Vec<String>, options: InstallOptions) -> Result<()> {
    run_project(
        target,
        json,
        |project| async move { Ok::<_, Failure>(project.install(&packages, options).await?) },
        print_outcome,
    )
}

pub fn uninstall(target: &Target, json: bool, package: String, force: bool) -> Result<()> {
    run_project(
        target,
        json,
        |project| async move {
            Ok::<_, Failure>(RemoveResult {
                removed: project.uninstall(&package, force).await?,
            })
        },
        print_removed,
    )
}

pub fn update(target: &Target, json: bool, package: String, version: Option<String>) -> Result<()> {
    run_project(
        target,
        json,
        |project| async move {
            Ok::<_, Failure>(project.update(&package, UpdateOptions { version }).await?)
        },
        print_outcome,
    )
}

pub fn prune(target: &Target, json: bool) -> Result<()> {
    run_project(
        target,
        json,
        |project| async move {
            Ok::<_, Failure>(RemoveResult {
                removed: project.prune().await?,
            })
        },
        print_removed,
    )
}

pub fn search(target: &Target, json: bool, query: String) -> Result<()> {
    run_project(
        target,
        json,
        |project| async move {
            Ok::<_, Failure>(SearchResult {
                results: project.search(&query).await?,
            })
        },
        |result| {
            if result.results.is_empty() {
                println!("No packages found");
            }
            for hit in &result.results {
                println!("{} {}", hit.name, hit.url);
            }
        },
    )
}

pub fn info(target: &Target, json: bool, package: String) -> Result<()> {
    run_project(
        target,
        json,
        |project| async move {
            let info = project.info(&package).await?;
            let latest = info.latest_version().map(str::to_string);
            Ok::<_, Failure>(InfoResult { info, latest })
        },
        |result| {
            println!("{}", result.info.name);
            if let Some(latest) = &result.latest {
                println!("latest: {latest}");
            }
            if !result.info.versions.is_empty() {
                println!("versions: {}", result.info.versions.join(", "));
            }
        },
    )
}

fn print_outcome(outcome: &AddOutcome) {
    for name in &outcome.installed {
        println!("+ {name}");
    }
    for name in &outcome.updated {
        println!("~ {name}");
    }
}

fn print_removed(result: &RemoveResult) {
    if result.removed.is_empty() {
        println!("Nothing removed");
    }
    for name in &result.removed {
        println!("- {name}");
    }
}
