//! Structured results reported by the installer.
//!
//! `list` reports the installed state as a tree rooted at the project. The
//! same package name may appear under several parents and nesting is
//! unbounded; the graph builder collapses it to one node per name.
//! `install` and `update` report a flat map of the packages they touched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Package metadata as read from the installed package's own manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkgMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Declared dependency ranges of this package.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dependencies: IndexMap<String, String>,
}

/// One entry of the installer's tree output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPackage {
    #[serde(default)]
    pub pkg_meta: PkgMeta,
    /// Absolute install directory, absent for missing packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_dir: Option<PathBuf>,
    /// Declared by the manifest but not present on disk.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing: bool,
    /// Present on disk but not declared by the manifest.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub extraneous: bool,
    /// Nested entries, keyed by package name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dependencies: IndexMap<String, RawPackage>,
}

impl RawPackage {
    /// Create an installed entry with the given version.
    #[must_use]
    pub fn installed(name: &str, version: &str) -> Self {
        Self {
            pkg_meta: PkgMeta {
                name: Some(name.to_string()),
                version: Some(version.to_string()),
                dependencies: IndexMap::new(),
            },
            ..Self::default()
        }
    }

    /// Set the install directory.
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.canonical_dir = Some(dir.into());
        self
    }

    /// Declare a dependency range in the package metadata.
    #[must_use]
    pub fn requiring(mut self, name: &str, range: &str) -> Self {
        self.pkg_meta
            .dependencies
            .insert(name.to_string(), range.to_string());
        self
    }

    /// Nest a child entry.
    #[must_use]
    pub fn with_child(mut self, name: &str, child: RawPackage) -> Self {
        self.dependencies.insert(name.to_string(), child);
        self
    }

    /// Mark as missing.
    #[must_use]
    pub fn as_missing(mut self) -> Self {
        self.missing = true;
        self
    }

    /// Mark as extraneous.
    #[must_use]
    pub fn as_extraneous(mut self) -> Self {
        self.extraneous = true;
        self
    }

    /// Names this package declares, from its metadata and its nested entries.
    pub fn required_names(&self) -> impl Iterator<Item = &String> {
        self.pkg_meta
            .dependencies
            .keys()
            .chain(self.dependencies.keys())
    }
}

/// Root of the `list` output. The root itself is the project.
pub type RawTree = RawPackage;

/// Packages touched by an `install` or `update`, keyed by name.
pub type InstalledSet = IndexMap<String, RawPackage>;

/// One registry search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// Registry information for a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    /// Published versions, newest first.
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
}

impl PackageInfo {
    /// Latest known version: the explicit `latest` field, else the newest listed version.
    #[must_use]
    pub fn latest_version(&self) -> Option<&str> {
        self.latest
            .as_deref()
            .or_else(|| self.versions.first().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_list_tree() {
        let json = r#"{
            "pkgMeta": { "name": "site", "dependencies": { "bootstrap": "~3.3.0" } },
            "canonicalDir": "/work/site",
            "dependencies": {
                "bootstrap": {
                    "pkgMeta": {
                        "name": "bootstrap",
                        "version": "3.3.7",
                        "dependencies": { "jquery": ">= 1.9.1" }
                    },
                    "canonicalDir": "/work/site/bower_components/bootstrap",
                    "dependencies": {
                        "jquery": {
                            "pkgMeta": { "name": "jquery", "version": "3.1.0" },
                            "canonicalDir": "/work/site/bower_components/jquery"
                        }
                    }
                },
                "moment": { "pkgMeta": { "name": "moment" }, "missing": true },
                "lodash": {
                    "pkgMeta": { "name": "lodash", "version": "4.17.4" },
                    "extraneous": true,
                    "endpoint": { "name": "lodash", "source": "lodash", "target": "*" }
                }
            }
        }"#;

        let tree: RawTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.dependencies.len(), 3);

        let bootstrap = &tree.dependencies["bootstrap"];
        assert_eq!(bootstrap.pkg_meta.version.as_deref(), Some("3.3.7"));
        assert_eq!(
            bootstrap.required_names().collect::<Vec<_>>(),
            vec!["jquery", "jquery"]
        );
        assert!(tree.dependencies["moment"].missing);
        assert!(tree.dependencies["lodash"].extraneous);
    }

    #[test]
    fn test_entry_order_preserved() {
        let json = r#"{ "dependencies": { "zebra": {}, "alpha": {}, "mid": {} } }"#;
        let tree: RawTree = serde_json::from_str(json).unwrap();
        let names: Vec<&String> = tree.dependencies.keys().collect();
        assert_eq!(names, vec!["zebra", "alpha", "mid"]);
    }

    #[test]
    fn test_package_info_latest() {
        let info = PackageInfo {
            name: "jquery".to_string(),
            versions: vec!["3.1.0".to_string(), "3.0.0".to_string()],
            latest: None,
        };
        assert_eq!(info.latest_version(), Some("3.1.0"));

        let pinned = PackageInfo {
            latest: Some("2.2.4".to_string()),
            ..info
        };
        assert_eq!(pinned.latest_version(), Some("2.2.4"));
    }
}
