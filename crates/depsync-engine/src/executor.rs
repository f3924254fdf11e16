//! Installer invocation.
//!
//! `ToolExecutor` is the seam between the coordinator and the external
//! installer. `CliExecutor` drives a bower-compatible binary with `--json`
//! and parses its structured output.

use async_trait::async_trait;
use depsync_core::pkg::{InstalledSet, PackageInfo, PackageSpec, RawTree, SearchHit, SyncError};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Error code the installer reports for unsatisfiable requirements.
pub const CONFLICT_CODE: &str = "ECONFLICT";

/// Where and how the installer runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Project directory the installer runs in.
    pub cwd: PathBuf,
    /// Install directory name, relative to `cwd`.
    pub directory: String,
}

/// Operations the coordinator needs from the installer.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Report the installed tree.
    async fn list(&self, config: &ToolConfig) -> Result<RawTree, SyncError>;

    /// Install packages, returning every package written.
    async fn install(
        &self,
        config: &ToolConfig,
        specs: &[PackageSpec],
    ) -> Result<InstalledSet, SyncError>;

    /// Uninstall packages, returning the names removed.
    async fn uninstall(
        &self,
        config: &ToolConfig,
        names: &[String],
        force: bool,
    ) -> Result<Vec<String>, SyncError>;

    /// Update packages to the newest version their manifest range allows.
    async fn update(&self, config: &ToolConfig, names: &[String])
        -> Result<InstalledSet, SyncError>;

    /// Remove extraneous packages, returning the names removed.
    async fn prune(&self, config: &ToolConfig) -> Result<Vec<String>, SyncError>;

    async fn search(&self, config: &ToolConfig, query: &str) -> Result<Vec<SearchHit>, SyncError>;

    async fn info(&self, config: &ToolConfig, name: &str) -> Result<PackageInfo, SyncError>;
}

/// Executor that spawns the installer binary.
#[derive(Debug, Clone)]
pub struct CliExecutor {
    program: PathBuf,
}

impl CliExecutor {
    /// Resolve the installer binary.
    ///
    /// A bare name is looked up on `PATH`; anything containing a path
    /// separator must point at an existing file.
    pub fn new(tool: &str) -> Result<Self, depsync_core::Error> {
        Ok(Self {
            program: resolve_program(tool)?,
        })
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(
        &self,
        config: &ToolConfig,
        args: &[String],
        subject: &str,
    ) -> Result<Value, SyncError> {
        debug!(
            program = %self.program.display(),
            cwd = %config.cwd.display(),
            args = ?args,
            "Running installer"
        );

        let output = Command::new(&self.program)
            .args(args)
            .arg("--json")
            .arg("--config.interactive=false")
            .arg(format!("--config.directory={}", config.directory))
            .current_dir(&config.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SyncError::tool(
                    None,
                    format!("Failed to execute '{}': {e}", self.program.display()),
                )
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let err = parse_tool_error(&stderr, output.status.code(), subject);
            warn!(code = %err.code(), error = %err, "Installer failed");
            return Err(err);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout)
            .map_err(|e| SyncError::tool(None, format!("Unreadable installer output: {e}")))
    }
}

#[async_trait]
impl ToolExecutor for CliExecutor {
    async fn list(&self, config: &ToolConfig) -> Result<RawTree, SyncError> {
        let value = self
            .run(config, &["list".to_string()], &config.cwd.display().to_string())
            .await?;
        decode(value)
    }

    async fn install(
        &self,
        config: &ToolConfig,
        specs: &[PackageSpec],
    ) -> Result<InstalledSet, SyncError> {
        let mut args = vec!["install".to_string()];
        args.extend(specs.iter().map(ToString::to_string));
        let subject = join_names(specs.iter().map(|s| s.name.as_str()));
        decode(self.run(config, &args, &subject).await?)
    }

    async fn uninstall(
        &self,
        config: &ToolConfig,
        names: &[String],
        force: bool,
    ) -> Result<Vec<String>, SyncError> {
        let mut args = vec!["uninstall".to_string()];
        args.extend(names.iter().cloned());
        if force {
            args.push("--force".to_string());
        }
        let value = self
            .run(config, &args, &join_names(names.iter().map(String::as_str)))
            .await?;
        Ok(removed_names(&value))
    }

    async fn update(
        &self,
        config: &ToolConfig,
        names: &[String],
    ) -> Result<InstalledSet, SyncError> {
        let mut args = vec!["update".to_string()];
        args.extend(names.iter().cloned());
        decode(
            self.run(config, &args, &join_names(names.iter().map(String::as_str)))
                .await?,
        )
    }

    async fn prune(&self, config: &ToolConfig) -> Result<Vec<String>, SyncError> {
        let value = self.run(config, &["prune".to_string()], "prune").await?;
        Ok(removed_names(&value))
    }

    async fn search(&self, config: &ToolConfig, query: &str) -> Result<Vec<SearchHit>, SyncError> {
        let args = ["search".to_string(), query.to_string()];
        decode(self.run(config, &args, query).await?)
    }

    async fn info(&self, config: &ToolConfig, name: &str) -> Result<PackageInfo, SyncError> {
        let args = ["info".to_string(), name.to_string()];
        let value = self.run(config, &args, name).await?;
        Ok(parse_info(name, &value))
    }
}

fn resolve_program(tool: &str) -> Result<PathBuf, depsync_core::Error> {
    let not_found = || depsync_core::Error::ToolNotFound {
        name: tool.to_string(),
    };

    if tool.contains(std::path::MAIN_SEPARATOR) || tool.contains('/') {
        let path = PathBuf::from(tool);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(not_found())
        };
    }

    which::which(tool).map_err(|_| not_found())
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// Decode installer output; no output at all decodes as the default value.
fn decode<T: DeserializeOwned + Default>(value: Value) -> Result<T, SyncError> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value)
        .map_err(|e| SyncError::tool(None, format!("Unexpected installer output: {e}")))
}

/// Names from a `name -> directory` result object.
fn removed_names(value: &Value) -> Vec<String> {
    value
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

/// `info` reports `latest` as the latest package metadata.
fn parse_info(name: &str, value: &Value) -> PackageInfo {
    let versions = value
        .get("versions")
        .and_then(Value::as_array)
        .map(|vs| {
            vs.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let latest = match value.get("latest") {
        Some(Value::String(v)) => Some(v.clone()),
        Some(Value::Object(meta)) => meta
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };

    PackageInfo {
        name: value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string(),
        versions,
        latest,
    }
}

/// Build an error from the installer's JSON log on stderr.
///
/// The log is a JSON array of entries, or one entry per line; the last
/// entry with level `error` wins.
fn parse_tool_error(stderr: &str, status: Option<i32>, subject: &str) -> SyncError {
    let entries: Vec<Value> = match serde_json::from_str::<Value>(stderr.trim()) {
        Ok(Value::Array(entries)) => entries,
        Ok(entry @ Value::Object(_)) => vec![entry],
        _ => stderr
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line.trim().trim_end_matches(',')).ok())
            .collect(),
    };

    let error = entries
        .iter()
        .rev()
        .find(|e| e.get("level").and_then(Value::as_str) == Some("error"));

    let Some(error) = error else {
        let text = stderr.trim();
        let message = if text.is_empty() {
            match status {
                Some(code) => format!("Installer exited with status {code}"),
                None => "Installer terminated by signal".to_string(),
            }
        } else {
            text.to_string()
        };
        return SyncError::tool(None, message);
    };

    let code = error
        .get("code")
        .or_else(|| error.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Installer failed")
        .to_string();

    if code.as_deref() == Some(CONFLICT_CODE) {
        return SyncError::Conflict {
            name: subject.to_string(),
            dependants: conflict_dependants(error),
        };
    }

    SyncError::tool(code, message)
}

/// Names listed under `data.picks`, when the installer provides them.
fn conflict_dependants(error: &Value) -> Vec<String> {
    let picks: IndexMap<String, ()> = error
        .pointer("/data/picks")
        .and_then(Value::as_array)
        .map(|picks| {
            picks
                .iter()
                .filter_map(|p| p.pointer("/dependants").and_then(Value::as_array))
                .flatten()
                .filter_map(|d| d.pointer("/pkgMeta/name").and_then(Value::as_str))
                .map(|n| (n.to_string(), ()))
                .collect()
        })
        .unwrap_or_default();
    picks.into_keys().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use depsync_core::pkg::codes;

    #[test]
    fn test_parse_error_array() {
        let stderr = r#"[{"level":"info","id":"resolve","message":"jquery#*"},
            {"level":"error","id":"ENOTFOUND","message":"Package nope not found"}]"#;

        let err = parse_tool_error(stderr, Some(1), "nope");

        assert_eq!(err.code(), codes::TOOL_FAILED);
        assert_eq!(err.to_string(), "Package nope not found");
        assert_eq!(
            err,
            SyncError::tool(Some("ENOTFOUND".to_string()), "Package nope not found")
        );
    }

    #[test]
    fn test_parse_error_lines() {
        let stderr = "{\"level\":\"warn\",\"message\":\"old\"},\n{\"level\":\"error\",\"code\":\"EINVALID\",\"message\":\"bad\"}\n";
        let err = parse_tool_error(stderr, Some(1), "x");
        assert_eq!(err, SyncError::tool(Some("EINVALID".to_string()), "bad"));
    }

    #[test]
    fn test_parse_error_plain_text() {
        let err = parse_tool_error("bower: command crashed\n", Some(2), "x");
        assert_eq!(err.to_string(), "bower: command crashed");

        let err = parse_tool_error("", Some(3), "x");
        assert_eq!(err.to_string(), "Installer exited with status 3");
    }

    #[test]
    fn test_conflict_maps_to_conflict_error() {
        let stderr = r#"[{"level":"error","id":"ECONFLICT","message":"Unable to find suitable version for angular",
            "data":{"name":"angular","picks":[
                {"dependants":[{"pkgMeta":{"name":"angular-route"}},{"pkgMeta":{"name":"site"}}]},
                {"dependants":[{"pkgMeta":{"name":"angular-route"}}]}
            ]}}]"#;

        let err = parse_tool_error(stderr, Some(1), "angular");

        assert_eq!(err.code(), codes::CONFLICT);
        assert_eq!(
            err,
            SyncError::Conflict {
                name: "angular".to_string(),
                dependants: vec!["angular-route".to_string(), "site".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_info_latest_object() {
        let value: Value = serde_json::from_str(
            r#"{"name":"jquery","versions":["3.1.0","3.0.0"],"latest":{"name":"jquery","version":"3.1.0"}}"#,
        )
        .unwrap();

        let info = parse_info("jquery", &value);
        assert_eq!(info.versions, vec!["3.1.0", "3.0.0"]);
        assert_eq!(info.latest.as_deref(), Some("3.1.0"));
    }

    #[test]
    fn test_parse_info_sparse() {
        let info = parse_info("jquery", &Value::Null);
        assert_eq!(info.name, "jquery");
        assert!(info.versions.is_empty());
        assert!(info.latest_version().is_none());
    }

    #[test]
    fn test_removed_names() {
        let value: Value =
            serde_json::from_str(r#"{"jquery":"/site/bower_components/jquery","lodash":"/x"}"#)
                .unwrap();
        assert_eq!(removed_names(&value), vec!["jquery", "lodash"]);
        assert!(removed_names(&Value::Null).is_empty());
    }

    #[test]
    fn test_decode_empty_output() {
        let set: InstalledSet = decode(Value::Null).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_tool_binary() {
        let err = CliExecutor::new("depsync-no-such-installer-binary").unwrap_err();
        assert!(matches!(err, depsync_core::Error::ToolNotFound { .. }));

        let err = CliExecutor::new("/no/such/dir/bower").unwrap_err();
        assert!(matches!(err, depsync_core::Error::ToolNotFound { .. }));
    }
}
