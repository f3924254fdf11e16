//! Sync status of installed packages against the manifest.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::graph::{PackageGraph, PackageStatus};
use super::manifest::ManifestDeps;
use super::range::version_satisfies;

/// Differences between what is installed and what the manifest declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub missing: BTreeSet<String>,
    pub untracked: BTreeSet<String>,
    pub version_out_of_sync: BTreeSet<String>,
}

impl SyncStatus {
    /// Compute the status from scratch.
    ///
    /// Version checks only apply when a manifest is present. A range that
    /// cannot be evaluated (URL, git ref, local path) counts as satisfied,
    /// as does an installed version that is not semver.
    #[must_use]
    pub fn compute(graph: &PackageGraph, manifest: Option<&ManifestDeps>) -> Self {
        let mut status = Self::default();

        for node in graph.iter() {
            match node.status {
                PackageStatus::Missing => {
                    status.missing.insert(node.name.clone());
                }
                PackageStatus::Untracked => {
                    status.untracked.insert(node.name.clone());
                }
                PackageStatus::Installed => {
                    if manifest.is_none() {
                        continue;
                    }
                    let (Some(version), Some(range)) =
                        (&node.installed_version, &node.manifest_range)
                    else {
                        continue;
                    };
                    if version_satisfies(version, range) == Some(false) {
                        status.version_out_of_sync.insert(node.name.clone());
                    }
                }
            }
        }

        status
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.missing.is_empty() && self.untracked.is_empty() && self.version_out_of_sync.is_empty()
    }

    /// Pair each name with the installed version the manifest should record.
    #[must_use]
    pub fn reconciliation(&self, graph: &PackageGraph) -> StatusReconciliation {
        let installed = |name: &String| {
            let version = graph
                .get(name)
                .and_then(|n| n.installed_version.clone())
                .unwrap_or_else(|| "*".to_string());
            (name.clone(), version)
        };

        StatusReconciliation {
            missing: self.missing.clone(),
            untracked: self.untracked.iter().map(installed).collect(),
            version_out_of_sync: self.version_out_of_sync.iter().map(installed).collect(),
        }
    }
}

/// Input to `ManifestDocument::sync_with_status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReconciliation {
    /// Entries to remove.
    pub missing: BTreeSet<String>,
    /// Name to installed version, added when not declared yet.
    pub untracked: BTreeMap<String, String>,
    /// Name to installed version, rewritten in place.
    pub version_out_of_sync: BTreeMap<String, String>,
}

impl StatusReconciliation {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.untracked.is_empty() && self.version_out_of_sync.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::tree::{RawPackage, RawTree};

    fn deps(entries: &[(&str, &str)]) -> ManifestDeps {
        ManifestDeps {
            dependencies: entries
                .iter()
                .map(|(n, r)| ((*n).to_string(), (*r).to_string()))
                .collect(),
            dev_dependencies: BTreeMap::new(),
        }
    }

    #[test]
    fn test_tilde_range_out_of_sync() {
        let tree = RawTree::default().with_child("a", RawPackage::installed("a", "1.2.0"));
        let m = deps(&[("a", "~1.0.0")]);
        let graph = PackageGraph::build_from_installed_tree(&tree, Some(&m));

        let status = SyncStatus::compute(&graph, Some(&m));

        assert_eq!(status.version_out_of_sync.iter().collect::<Vec<_>>(), vec!["a"]);
        assert!(status.missing.is_empty());
        assert!(status.untracked.is_empty());
        assert!(!status.is_synced());
    }

    #[test]
    fn test_synced_project() {
        let tree = RawTree::default().with_child("a", RawPackage::installed("a", "1.0.4"));
        let m = deps(&[("a", "~1.0.0")]);
        let graph = PackageGraph::build_from_installed_tree(&tree, Some(&m));

        assert!(SyncStatus::compute(&graph, Some(&m)).is_synced());
    }

    #[test]
    fn test_missing_and_untracked() {
        let tree = RawTree::default()
            .with_child("b", RawPackage::default().as_missing())
            .with_child("c", RawPackage::installed("c", "0.1.0").as_extraneous());
        let m = deps(&[("b", "^1.0.0")]);
        let graph = PackageGraph::build_from_installed_tree(&tree, Some(&m));

        let status = SyncStatus::compute(&graph, Some(&m));
        assert!(status.missing.contains("b"));
        assert!(status.untracked.contains("c"));
    }

    #[test]
    fn test_invalid_range_always_satisfied() {
        let tree = RawTree::default()
            .with_child("a", RawPackage::installed("a", "1.2.0"))
            .with_child("b", RawPackage::installed("b", "master"));
        let m = deps(&[("a", "https://example.com/a.git#v1.0.0"), ("b", "^1.0.0")]);
        let graph = PackageGraph::build_from_installed_tree(&tree, Some(&m));

        assert!(SyncStatus::compute(&graph, Some(&m)).is_synced());
    }

    #[test]
    fn test_no_manifest_skips_version_checks() {
        let tree = RawTree::default().with_child("a", RawPackage::installed("a", "1.2.0"));
        let m = deps(&[("a", "~1.0.0")]);
        let graph = PackageGraph::build_from_installed_tree(&tree, Some(&m));

        assert!(SyncStatus::compute(&graph, None).version_out_of_sync.is_empty());
    }

    #[test]
    fn test_reconciliation_carries_installed_versions() {
        let tree = RawTree::default()
            .with_child("a", RawPackage::installed("a", "1.2.0"))
            .with_child("c", RawPackage::installed("c", "0.1.0").as_extraneous());
        let m = deps(&[("a", "~1.0.0"), ("b", "^2.0.0")]);
        let graph = PackageGraph::build_from_installed_tree(&tree, Some(&m));

        let rec = SyncStatus::compute(&graph, Some(&m)).reconciliation(&graph);

        assert_eq!(rec.missing.iter().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(rec.untracked.get("c").map(String::as_str), Some("0.1.0"));
        assert_eq!(rec.version_out_of_sync.get("a").map(String::as_str), Some("1.2.0"));
        assert!(!rec.is_empty());
    }
}
