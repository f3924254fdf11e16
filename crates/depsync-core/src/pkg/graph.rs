//! Package dependency graph.
//!
//! Nodes live in a name-keyed arena owned by the graph; edges are names.
//! Every mutation keeps the edge invariant:
//! `B ∈ A.dependencies ⇔ A ∈ B.dependants`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use super::manifest::ManifestDeps;
use super::tree::{RawPackage, RawTree};

/// Which manifest section declares a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Production,
    Development,
    #[default]
    Unknown,
}

impl DependencyKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk state of a package relative to the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Installed,
    /// Declared in the manifest, absent on disk.
    Missing,
    /// Present on disk, absent from the manifest.
    Untracked,
}

impl PackageStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Missing => "missing",
            Self::Untracked => "untracked",
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package known to the project, installed or declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageNode {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_range: Option<String>,
    /// From a registry lookup. Never consulted for sync status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_known_version: Option<String>,
    pub kind: DependencyKind,
    pub status: PackageStatus,
    pub direct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
    /// Dependency names the package declares, resolved or not.
    pub requires: BTreeSet<String>,
    /// Forward edges.
    pub dependencies: BTreeSet<String>,
    /// Back edges, derived from other nodes' forward edges.
    pub dependants: BTreeSet<String>,
}

impl PackageNode {
    /// Materialize a node from an installer entry and classify it against the manifest.
    #[must_use]
    pub fn from_raw(name: &str, raw: &RawPackage, manifest: Option<&ManifestDeps>) -> Self {
        let status = if raw.missing {
            PackageStatus::Missing
        } else if raw.extraneous {
            PackageStatus::Untracked
        } else {
            PackageStatus::Installed
        };
        let on_disk = status != PackageStatus::Missing;

        let mut node = Self {
            name: name.to_string(),
            installed_version: raw.pkg_meta.version.clone().filter(|_| on_disk),
            manifest_range: None,
            latest_known_version: None,
            kind: DependencyKind::Unknown,
            status,
            direct: false,
            install_path: raw.canonical_dir.clone().filter(|_| on_disk),
            requires: raw
                .required_names()
                .filter(|n| n.as_str() != name)
                .cloned()
                .collect(),
            dependencies: BTreeSet::new(),
            dependants: BTreeSet::new(),
        };
        node.classify(manifest);
        node
    }

    /// A manifest-declared package with nothing on disk.
    #[must_use]
    pub fn missing(name: &str, kind: DependencyKind, range: &str) -> Self {
        Self {
            name: name.to_string(),
            installed_version: None,
            manifest_range: Some(range.to_string()),
            latest_known_version: None,
            kind,
            status: PackageStatus::Missing,
            direct: true,
            install_path: None,
            requires: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            dependants: BTreeSet::new(),
        }
    }

    /// Derive kind, range and directness from the manifest.
    fn classify(&mut self, manifest: Option<&ManifestDeps>) {
        match manifest.and_then(|m| m.lookup(&self.name)) {
            Some((kind, range)) => {
                self.kind = kind;
                self.manifest_range = Some(range.to_string());
                self.direct = true;
            }
            None => {
                self.kind = DependencyKind::Unknown;
                self.manifest_range = None;
                // Missing and untracked packages are direct by definition.
                self.direct = self.status != PackageStatus::Installed;
            }
        }
    }

    /// Whether the package is present on disk.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.status != PackageStatus::Missing
    }
}

/// Names classified by `PackageGraph::add_packages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    /// No installed node existed before.
    pub installed: Vec<String>,
    /// Replaced a node that was already installed.
    pub updated: Vec<String>,
}

/// Direct production, direct development, and everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackagesSummary {
    pub production: Vec<PackageNode>,
    pub development: Vec<PackageNode>,
    pub dependencies: Vec<PackageNode>,
}

/// Dependency graph of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageGraph {
    nodes: BTreeMap<String, PackageNode>,
}

impl PackageGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from the installer's `list` tree.
    ///
    /// Pass one materializes one node per distinct name. The tree is walked
    /// level by level and each level is visited in (name, parent chain)
    /// order, so the first occurrence of a name is the shallowest one and
    /// ties break the same way whatever order the input lists entries in.
    /// Later occurrences of a materialized name are not descended, which
    /// also bounds the walk on self-referencing input.
    ///
    /// Pass two wires edges between materialized nodes. Manifest entries
    /// with no occurrence in the tree become missing nodes.
    #[must_use]
    pub fn build_from_installed_tree(tree: &RawTree, manifest: Option<&ManifestDeps>) -> Self {
        let mut materialized: BTreeMap<String, PackageNode> = BTreeMap::new();

        let mut level: Vec<(Vec<&str>, &str, &RawPackage)> = tree
            .dependencies
            .iter()
            .map(|(name, raw)| (Vec::new(), name.as_str(), raw))
            .collect();

        while !level.is_empty() {
            level.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));

            let mut next = Vec::new();
            for (chain, name, raw) in level {
                if materialized.contains_key(name) {
                    continue;
                }
                materialized.insert(name.to_string(), PackageNode::from_raw(name, raw, manifest));

                let mut child_chain = chain;
                child_chain.push(name);
                for (child_name, child) in &raw.dependencies {
                    next.push((child_chain.clone(), child_name.as_str(), child));
                }
            }
            level = next;
        }

        if let Some(manifest) = manifest {
            for (name, kind, range) in manifest.entries() {
                materialized
                    .entry(name.to_string())
                    .or_insert_with(|| PackageNode::missing(name, kind, range));
            }
        }

        let mut graph = Self::new();
        graph.set_packages(materialized.into_values().collect());
        graph
    }

    /// Replace the whole graph and re-derive every edge.
    pub fn set_packages(&mut self, packages: Vec<PackageNode>) {
        self.nodes.clear();
        for mut pkg in packages {
            pkg.dependencies.clear();
            pkg.dependants.clear();
            self.nodes.insert(pkg.name.clone(), pkg);
        }

        let edges: Vec<(String, String)> = self
            .nodes
            .values()
            .flat_map(|node| {
                node.requires
                    .iter()
                    .filter(|target| self.nodes.contains_key(*target))
                    .map(|target| (node.name.clone(), target.clone()))
            })
            .collect();

        for (from, to) in edges {
            self.link(&from, &to);
        }
    }

    /// Insert or replace packages after an install or update.
    ///
    /// A package is "updated" when it replaces a node that was on disk
    /// (installed or untracked), otherwise "installed". Outgoing edges are re-derived from the new
    /// node's requirements; nodes that depended on the old node keep
    /// depending on the new one.
    pub fn add_packages(&mut self, packages: Vec<PackageNode>) -> AddOutcome {
        let mut outcome = AddOutcome::default();

        for mut pkg in packages {
            let name = pkg.name.clone();
            pkg.dependencies.clear();
            pkg.dependants.clear();

            match self.nodes.remove(&name) {
                Some(prior) => {
                    if prior.is_installed() {
                        outcome.updated.push(name.clone());
                    } else {
                        outcome.installed.push(name.clone());
                    }
                    for dep in &prior.dependencies {
                        if let Some(target) = self.nodes.get_mut(dep) {
                            target.dependants.remove(&name);
                        }
                    }
                    pkg.dependants = prior.dependants;
                }
                None => outcome.installed.push(name.clone()),
            }

            let incoming: Vec<String> = self
                .nodes
                .values()
                .filter(|n| n.requires.contains(&name))
                .map(|n| n.name.clone())
                .collect();
            let outgoing: Vec<String> = pkg
                .requires
                .iter()
                .filter(|r| self.nodes.contains_key(*r))
                .cloned()
                .collect();

            self.nodes.insert(name.clone(), pkg);
            for from in incoming {
                self.link(&from, &name);
            }
            for to in outgoing {
                self.link(&name, &to);
            }
        }

        outcome
    }

    /// Remove packages, returning the names that were present.
    ///
    /// Each removed node is dropped from its dependencies' `dependants`,
    /// and forward edges that pointed at it are dropped from its dependants.
    pub fn remove_packages<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let mut removed = Vec::new();

        for name in names {
            let name = name.as_ref();
            let Some(node) = self.nodes.remove(name) else {
                continue;
            };
            for dep in &node.dependencies {
                if let Some(target) = self.nodes.get_mut(dep) {
                    target.dependants.remove(name);
                }
            }
            for dependant in &node.dependants {
                if let Some(source) = self.nodes.get_mut(dependant) {
                    source.dependencies.remove(name);
                }
            }
            removed.push(node.name);
        }

        removed
    }

    /// Re-classify every node after the manifest changed.
    ///
    /// Newly declared untracked packages become installed; undeclared
    /// missing packages disappear; undeclared installed packages that
    /// nothing depends on become untracked; declared names with no node
    /// become missing nodes. Without a manifest nothing is demoted to
    /// untracked.
    pub fn apply_manifest(&mut self, manifest: Option<&ManifestDeps>) {
        let mut dropped = Vec::new();

        for node in self.nodes.values_mut() {
            if manifest.and_then(|m| m.lookup(&node.name)).is_some() {
                if node.status == PackageStatus::Untracked {
                    node.status = PackageStatus::Installed;
                }
            } else {
                match node.status {
                    PackageStatus::Missing => dropped.push(node.name.clone()),
                    PackageStatus::Installed
                        if manifest.is_some() && node.dependants.is_empty() =>
                    {
                        node.status = PackageStatus::Untracked;
                    }
                    _ => {}
                }
            }
            node.classify(manifest);
        }

        self.remove_packages(&dropped);

        if let Some(manifest) = manifest {
            let absent: Vec<PackageNode> = manifest
                .entries()
                .filter(|(name, _, _)| !self.nodes.contains_key(*name))
                .map(|(name, kind, range)| PackageNode::missing(name, kind, range))
                .collect();
            self.add_packages(absent);
        }
    }

    /// Record a registry lookup result. Returns false if the package is unknown.
    pub fn set_latest_known_version(&mut self, name: &str, version: Option<String>) -> bool {
        match self.nodes.get_mut(name) {
            Some(node) => {
                node.latest_known_version = version;
                true
            }
            None => false,
        }
    }

    /// Partition nodes into production, development and the rest.
    #[must_use]
    pub fn summary(&self) -> PackagesSummary {
        let mut summary = PackagesSummary::default();
        for node in self.nodes.values() {
            match node.kind {
                DependencyKind::Production => summary.production.push(node.clone()),
                DependencyKind::Development => summary.development.push(node.clone()),
                DependencyKind::Unknown => summary.dependencies.push(node.clone()),
            }
        }
        summary
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PackageNode> {
        self.nodes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in name order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageNode> {
        self.nodes.values()
    }

    /// Check the edge invariant and that no edge points outside the graph.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.nodes.values().all(|node| {
            node.dependencies.iter().all(|dep| {
                self.nodes
                    .get(dep)
                    .is_some_and(|target| target.dependants.contains(&node.name))
            }) && node.dependants.iter().all(|dependant| {
                self.nodes
                    .get(dependant)
                    .is_some_and(|source| source.dependencies.contains(&node.name))
            })
        })
    }

    fn link(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        if let Some(source) = self.nodes.get_mut(from) {
            source.dependencies.insert(to.to_string());
        }
        if let Some(target) = self.nodes.get_mut(to) {
            target.dependants.insert(from.to_string());
        }
    }
}
