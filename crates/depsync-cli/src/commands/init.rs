//! `depsync init`: create a manifest in the working directory.

use super::{finish, Failure};
use depsync_core::pkg::ManifestDocument;
use depsync_core::{paths, LocalFs};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Serialize)]
struct InitResult {
    path: PathBuf,
    name: String,
}

/// Default package name: the directory's name.
fn default_name(dir: &Path) -> String {
    dir.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("app")
        .to_string()
}

pub fn run(cwd: &Path, name: Option<String>, json: bool) -> Result<()> {
    let name = name.unwrap_or_else(|| default_name(cwd));
    let path = paths::manifest_path(cwd);

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let outcome = runtime.block_on(async {
        ManifestDocument::create(Arc::new(LocalFs), &path, &name)
            .await
            .map_err(Failure::from)?;
        Ok::<_, Failure>(InitResult {
            path: path.clone(),
            name: name.clone(),
        })
    });

    finish(outcome, json, |result| {
        println!("Created {} for {}", result.path.display(), result.name);
    })
}
