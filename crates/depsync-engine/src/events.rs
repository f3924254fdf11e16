//! Notifications emitted by the coordinator and change events it consumes.

use depsync_core::pkg::SyncStatus;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Default broadcast buffer for project notifications.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Notification sent after a mutation and status recomputation are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProjectEvent {
    DependenciesAdded { names: Vec<String> },
    DependenciesRemoved { names: Vec<String> },
    DependenciesUpdated { names: Vec<String> },
    StatusChanged { status: SyncStatus },
    ActivePathChanged { path: PathBuf },
}

impl ProjectEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DependenciesAdded { .. } => "dependencies_added",
            Self::DependenciesRemoved { .. } => "dependencies_removed",
            Self::DependenciesUpdated { .. } => "dependencies_updated",
            Self::StatusChanged { .. } => "status_changed",
            Self::ActivePathChanged { .. } => "active_path_changed",
        }
    }
}

/// An on-disk change to one of the project's own files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectChange {
    ManifestCreated,
    ManifestChanged,
    ManifestDeleted,
    RcCreated,
    RcChanged,
    RcDeleted,
}

impl ProjectChange {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManifestCreated => "manifest_created",
            Self::ManifestChanged => "manifest_changed",
            Self::ManifestDeleted => "manifest_deleted",
            Self::RcCreated => "rc_created",
            Self::RcChanged => "rc_changed",
            Self::RcDeleted => "rc_deleted",
        }
    }

    #[must_use]
    pub fn is_manifest(&self) -> bool {
        matches!(
            self,
            Self::ManifestCreated | Self::ManifestChanged | Self::ManifestDeleted
        )
    }
}

impl fmt::Display for ProjectChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = ProjectEvent::DependenciesAdded {
            names: vec!["jquery".to_string()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "dependencies_added");
        assert_eq!(json["names"][0], "jquery");
        assert_eq!(event.name(), "dependencies_added");
    }

    #[test]
    fn test_status_event_carries_sets() {
        let mut status = SyncStatus::default();
        status.missing.insert("moment".to_string());
        let json = serde_json::to_value(ProjectEvent::StatusChanged { status }).unwrap();
        assert_eq!(json["status"]["missing"][0], "moment");
    }

    #[test]
    fn test_change_classification() {
        assert!(ProjectChange::ManifestDeleted.is_manifest());
        assert!(!ProjectChange::RcChanged.is_manifest());
        assert_eq!(ProjectChange::RcCreated.to_string(), "rc_created");
    }
}
