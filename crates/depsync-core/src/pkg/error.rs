//! Dependency synchronization error types.

use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes surfaced to callers.
pub mod codes {
    pub const NO_PROJECT: &str = "NO_PROJECT";
    pub const NO_MANIFEST: &str = "NO_MANIFEST";
    pub const MALFORMED_MANIFEST: &str = "MALFORMED_MANIFEST";
    pub const PKG_NOT_INSTALLED: &str = "PKG_NOT_INSTALLED";
    pub const ENTRY_NOT_FOUND: &str = "ENTRY_NOT_FOUND";
    pub const NOTHING_TO_SYNC: &str = "NOTHING_TO_SYNC";
    pub const NOTHING_TO_UPDATE: &str = "NOTHING_TO_UPDATE";
    pub const CONFLICT: &str = "CONFLICT";
    pub const FS_ACTION_FAILED: &str = "FS_ACTION_FAILED";
    pub const TOOL_FAILED: &str = "TOOL_FAILED";
    pub const QUEUE_CLOSED: &str = "QUEUE_CLOSED";
    pub const INVALID_SPEC: &str = "INVALID_SPEC";
}

/// Error returned by graph, manifest and coordinator operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("No project directory at {}", path.display())]
    NoProject { path: PathBuf },

    #[error("No manifest found for project at {}", root.display())]
    NoManifest { root: PathBuf },

    #[error("Malformed manifest {}: {message}", path.display())]
    MalformedManifest { path: PathBuf, message: String },

    #[error("Package is not installed: {name}")]
    PkgNotInstalled { name: String },

    #[error("Manifest has no entry for {name}")]
    EntryNotFound { name: String },

    #[error("Installed packages already match the manifest")]
    NothingToSync,

    #[error("No changes requested for manifest entry {name}")]
    NothingToUpdate { name: String },

    /// Uninstall refused because other packages still depend on the target,
    /// or the installer could not satisfy conflicting requirements.
    #[error("{}", conflict_message(name, dependants))]
    Conflict {
        name: String,
        dependants: Vec<String>,
    },

    #[error("File action failed on {}: {message}", path.display())]
    FsActionFailed { path: PathBuf, message: String },

    /// Installer failure, message passed through verbatim.
    #[error("{message}")]
    Tool {
        code: Option<String>,
        message: String,
    },

    #[error("Command queue is closed")]
    QueueClosed,

    #[error("Invalid package spec: {message}")]
    InvalidSpec { message: String },
}

fn conflict_message(name: &str, dependants: &[String]) -> String {
    if dependants.is_empty() {
        format!("{name} has conflicting requirements")
    } else {
        format!("{name} is required by {}", dependants.join(", "))
    }
}

impl SyncError {
    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoProject { .. } => codes::NO_PROJECT,
            Self::NoManifest { .. } => codes::NO_MANIFEST,
            Self::MalformedManifest { .. } => codes::MALFORMED_MANIFEST,
            Self::PkgNotInstalled { .. } => codes::PKG_NOT_INSTALLED,
            Self::EntryNotFound { .. } => codes::ENTRY_NOT_FOUND,
            Self::NothingToSync => codes::NOTHING_TO_SYNC,
            Self::NothingToUpdate { .. } => codes::NOTHING_TO_UPDATE,
            Self::Conflict { .. } => codes::CONFLICT,
            Self::FsActionFailed { .. } => codes::FS_ACTION_FAILED,
            Self::Tool { .. } => codes::TOOL_FAILED,
            Self::QueueClosed => codes::QUEUE_CLOSED,
            Self::InvalidSpec { .. } => codes::INVALID_SPEC,
        }
    }

    /// Create a malformed manifest error.
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MalformedManifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file action failed error.
    pub fn fs_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FsActionFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an entry not found error.
    pub fn entry_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound { name: name.into() }
    }

    /// Create a not installed error.
    pub fn not_installed(name: impl Into<String>) -> Self {
        Self::PkgNotInstalled { name: name.into() }
    }

    /// Create an invalid spec error.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    /// Create a tool failure carrying the installer's own message.
    pub fn tool(code: Option<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            code,
            message: message.into(),
        }
    }
}
