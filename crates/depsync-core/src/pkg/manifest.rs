//! Manifest (`bower.json`) reading and rewriting.
//!
//! The full JSON document is kept alongside the extracted dependency
//! sections so that unrelated fields and key order survive a rewrite.
//! Every mutation builds a new document, writes it as one atomic replace,
//! and only then swaps it into the cache.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::error::SyncError;
use super::graph::DependencyKind;
use super::range::default_range;
use super::status::StatusReconciliation;
use crate::fs::FileAccess;

/// Manifest file name.
pub const MANIFEST_FILE: &str = "bower.json";

const DEPENDENCIES: &str = "dependencies";
const DEV_DEPENDENCIES: &str = "devDependencies";

fn section_key(kind: DependencyKind) -> &'static str {
    match kind {
        DependencyKind::Development => DEV_DEPENDENCIES,
        DependencyKind::Production | DependencyKind::Unknown => DEPENDENCIES,
    }
}

/// The two declared dependency sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDeps {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl ManifestDeps {
    /// Find a declaration. `dependencies` wins over `devDependencies`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<(DependencyKind, &str)> {
        if let Some(range) = self.dependencies.get(name) {
            return Some((DependencyKind::Production, range));
        }
        self.dev_dependencies
            .get(name)
            .map(|range| (DependencyKind::Development, range.as_str()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Every declared name once, production first.
    pub fn entries(&self) -> impl Iterator<Item = (&str, DependencyKind, &str)> {
        let production = self
            .dependencies
            .iter()
            .map(|(n, r)| (n.as_str(), DependencyKind::Production, r.as_str()));
        let development = self
            .dev_dependencies
            .iter()
            .filter(|(n, _)| !self.dependencies.contains_key(*n))
            .map(|(n, r)| (n.as_str(), DependencyKind::Development, r.as_str()));
        production.chain(development)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.dev_dependencies.is_empty()
    }

    /// Extract both sections from a parsed document.
    fn extract(path: &Path, root: &Map<String, Value>) -> Result<Self, SyncError> {
        Ok(Self {
            dependencies: extract_section(path, root, DEPENDENCIES)?,
            dev_dependencies: extract_section(path, root, DEV_DEPENDENCIES)?,
        })
    }
}

/// Extract one section. A missing section is empty.
fn extract_section(
    path: &Path,
    root: &Map<String, Value>,
    section: &str,
) -> Result<BTreeMap<String, String>, SyncError> {
    let Some(section_value) = root.get(section) else {
        return Ok(BTreeMap::new());
    };

    let section_obj = section_value.as_object().ok_or_else(|| {
        SyncError::malformed(
            path,
            format!("'{section}' must be an object, got {}", json_type_name(section_value)),
        )
    })?;

    let mut out = BTreeMap::new();
    for (name, range_value) in section_obj {
        let range = range_value.as_str().ok_or_else(|| {
            SyncError::malformed(
                path,
                format!(
                    "range for '{name}' must be a string, got {}",
                    json_type_name(range_value)
                ),
            )
        })?;
        out.insert(name.clone(), range.to_string());
    }
    Ok(out)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub version: String,
    pub kind: DependencyKind,
}

/// Requested change to an existing declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryUpdate {
    /// New range.
    pub version: Option<String>,
    /// Section to move the entry to.
    pub kind: Option<DependencyKind>,
}

impl EntryUpdate {
    #[must_use]
    pub fn version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            kind: None,
        }
    }

    #[must_use]
    pub fn kind(kind: DependencyKind) -> Self {
        Self {
            version: None,
            kind: Some(kind),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.version.is_none() && self.kind.is_none()
    }

    /// Update that restores `entry` exactly.
    #[must_use]
    pub fn restoring(entry: &ManifestEntry) -> Self {
        Self {
            version: Some(entry.version.clone()),
            kind: Some(entry.kind),
        }
    }
}

/// A project's manifest with its raw document.
pub struct ManifestDocument {
    path: PathBuf,
    raw: Map<String, Value>,
    deps: ManifestDeps,
    fs: Arc<dyn FileAccess>,
}

impl fmt::Debug for ManifestDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestDocument")
            .field("path", &self.path)
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

impl ManifestDocument {
    /// Parse manifest text.
    ///
    /// A non-object root, a non-object section, or a non-string range is
    /// `MALFORMED_MANIFEST`.
    pub fn parse(fs: Arc<dyn FileAccess>, path: &Path, text: &str) -> Result<Self, SyncError> {
        let (raw, deps) = parse_text(path, text)?;
        Ok(Self {
            path: path.to_path_buf(),
            raw,
            deps,
            fs,
        })
    }

    /// Read and parse the manifest at `path`.
    pub async fn load(fs: Arc<dyn FileAccess>, path: &Path) -> Result<Self, SyncError> {
        let text = fs.read(path).await?;
        Self::parse(fs, path, &text)
    }

    /// Write a minimal manifest for a new project.
    pub async fn create(fs: Arc<dyn FileAccess>, path: &Path, name: &str) -> Result<Self, SyncError> {
        if fs.exists(path).await {
            return Err(SyncError::fs_failed(path, "Manifest already exists"));
        }

        let mut raw = Map::new();
        raw.insert("name".to_string(), Value::String(name.to_string()));
        raw.insert(DEPENDENCIES.to_string(), Value::Object(Map::new()));

        let mut doc = Self {
            path: path.to_path_buf(),
            raw: Map::new(),
            deps: ManifestDeps::default(),
            fs,
        };
        doc.commit(raw).await?;
        Ok(doc)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn deps(&self) -> &ManifestDeps {
        &self.deps
    }

    /// Look up a declaration in either section.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<ManifestEntry> {
        self.deps.lookup(name).map(|(kind, range)| ManifestEntry {
            name: name.to_string(),
            version: range.to_string(),
            kind,
        })
    }

    /// Rewrite an existing declaration's range, section, or both.
    ///
    /// Moving to the other section keeps the current range unless a new one
    /// is given. Nothing is written on error.
    pub async fn update_entry(
        &mut self,
        name: &str,
        update: Option<&EntryUpdate>,
    ) -> Result<(), SyncError> {
        let current = self
            .entry(name)
            .ok_or_else(|| SyncError::entry_not_found(name))?;
        let update = match update {
            Some(u) if !u.is_empty() => u,
            _ => {
                return Err(SyncError::NothingToUpdate {
                    name: name.to_string(),
                })
            }
        };

        let version = update.version.clone().unwrap_or(current.version);
        let kind = update.kind.unwrap_or(current.kind);

        let mut raw = self.raw.clone();
        if kind != current.kind {
            remove_from_section(&mut raw, section_key(current.kind), name);
        }
        set_in_section(&mut raw, section_key(kind), name, version);

        debug!(name = %name, kind = %kind, "Updating manifest entry");
        self.commit(raw).await
    }

    /// Declare a package. An existing declaration is replaced in place.
    pub async fn add_entry(
        &mut self,
        name: &str,
        version: &str,
        production: bool,
    ) -> Result<(), SyncError> {
        self.add_entries(&[(name.to_string(), version.to_string())], production)
            .await
    }

    /// Declare several packages in one write. Either all of them land on
    /// disk or none do.
    pub async fn add_entries(
        &mut self,
        entries: &[(String, String)],
        production: bool,
    ) -> Result<(), SyncError> {
        let (kind, other) = if production {
            (DependencyKind::Production, DependencyKind::Development)
        } else {
            (DependencyKind::Development, DependencyKind::Production)
        };

        let mut raw = self.raw.clone();
        for (name, version) in entries {
            remove_from_section(&mut raw, section_key(other), name);
            set_in_section(&mut raw, section_key(kind), name, version.clone());
            debug!(name = %name, version = %version, kind = %kind, "Adding manifest entry");
        }
        self.commit(raw).await
    }

    /// Remove a declaration from whichever section holds it.
    pub async fn remove_entry(&mut self, name: &str) -> Result<(), SyncError> {
        if !self.deps.contains(name) {
            return Err(SyncError::entry_not_found(name));
        }

        let mut raw = self.raw.clone();
        remove_everywhere(&mut raw, name);

        debug!(name = %name, "Removing manifest entry");
        self.commit(raw).await
    }

    /// Make the manifest describe what is installed.
    ///
    /// Missing entries are removed, untracked packages are declared in
    /// `dependencies` at a range derived from their installed version, and
    /// out-of-sync ranges are rewritten to the installed version in place.
    pub async fn sync_with_status(
        &mut self,
        reconciliation: &StatusReconciliation,
    ) -> Result<(), SyncError> {
        if reconciliation.is_empty() {
            return Err(SyncError::NothingToSync);
        }

        let mut raw = self.raw.clone();

        for name in &reconciliation.missing {
            remove_everywhere(&mut raw, name);
        }

        for (name, version) in &reconciliation.untracked {
            if !self.deps.contains(name) {
                set_in_section(&mut raw, DEPENDENCIES, name, default_range(version));
            }
        }

        for (name, version) in &reconciliation.version_out_of_sync {
            if let Some((kind, _)) = self.deps.lookup(name) {
                set_in_section(&mut raw, section_key(kind), name, version.clone());
            }
        }

        debug!(
            missing = reconciliation.missing.len(),
            untracked = reconciliation.untracked.len(),
            out_of_sync = reconciliation.version_out_of_sync.len(),
            "Syncing manifest with installed state"
        );
        self.commit(raw).await
    }

    /// Whether `fresh` differs from the cached sections.
    ///
    /// Only the two dependency sections are compared; key order and other
    /// top-level fields do not count.
    #[must_use]
    pub fn detect_external_change(&self, fresh: &ManifestDeps) -> bool {
        &self.deps != fresh
    }

    /// Serialize, write, then replace the cache.
    async fn commit(&mut self, raw: Map<String, Value>) -> Result<(), SyncError> {
        let deps = ManifestDeps::extract(&self.path, &raw)?;

        let mut text = serde_json::to_string_pretty(&raw)
            .map_err(|e| SyncError::fs_failed(&self.path, e.to_string()))?;
        text.push('\n');

        self.fs.write(&self.path, &text).await?;

        self.raw = raw;
        self.deps = deps;
        Ok(())
    }
}

/// Parse manifest text into its raw document and sections.
pub fn parse_text(path: &Path, text: &str) -> Result<(Map<String, Value>, ManifestDeps), SyncError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| SyncError::malformed(path, format!("Invalid JSON: {e}")))?;

    let Value::Object(raw) = value else {
        return Err(SyncError::malformed(path, "manifest must be a JSON object"));
    };

    let deps = ManifestDeps::extract(path, &raw)?;
    Ok((raw, deps))
}

/// Insert into a section, creating it when absent.
fn set_in_section(raw: &mut Map<String, Value>, key: &str, name: &str, version: String) {
    let value = raw
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    match value {
        Value::Object(section) => {
            section.insert(name.to_string(), Value::String(version));
        }
        other => {
            let mut section = Map::new();
            section.insert(name.to_string(), Value::String(version));
            *other = Value::Object(section);
        }
    }
}

fn remove_from_section(raw: &mut Map<String, Value>, key: &str, name: &str) {
    if let Some(Value::Object(section)) = raw.get_mut(key) {
        section.shift_remove(name);
    }
}

fn remove_everywhere(raw: &mut Map<String, Value>, name: &str) {
    for key in [DEPENDENCIES, DEV_DEPENDENCIES] {
        remove_from_section(raw, key, name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use crate::pkg::error::codes;

    const PATH: &str = "/work/site/bower.json";

    const SITE: &str = r#"{
  "name": "site",
  "main": "index.js",
  "dependencies": {
    "jquery": "~1.0.0",
    "bootstrap": "~3.3.0"
  },
  "devDependencies": {
    "qunit": "^2.0.0"
  },
  "private": true
}
"#;

    async fn load(text: &str) -> (Arc<MemoryFs>, ManifestDocument) {
        let fs = Arc::new(MemoryFs::new());
        fs.insert(PATH, text);
        let doc = ManifestDocument::load(fs.clone(), Path::new(PATH)).await.unwrap();
        (fs, doc)
    }

    fn on_disk(fs: &MemoryFs) -> String {
        fs.contents(Path::new(PATH)).unwrap()
    }

    #[tokio::test]
    async fn test_load_extracts_sections() {
        let (_fs, doc) = load(SITE).await;

        assert_eq!(doc.deps().dependencies.len(), 2);
        assert_eq!(
            doc.entry("qunit"),
            Some(ManifestEntry {
                name: "qunit".to_string(),
                version: "^2.0.0".to_string(),
                kind: DependencyKind::Development,
            })
        );
        assert!(doc.entry("lodash").is_none());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let fs: Arc<dyn FileAccess> = Arc::new(MemoryFs::new());
        for text in [
            "not json",
            "[1, 2]",
            r#"{"dependencies": ["jquery"]}"#,
            r#"{"devDependencies": {"qunit": 2}}"#,
        ] {
            let err = ManifestDocument::parse(fs.clone(), Path::new(PATH), text).unwrap_err();
            assert_eq!(err.code(), codes::MALFORMED_MANIFEST, "{text}");
        }
    }

    #[tokio::test]
    async fn test_update_version_in_place_keeps_order() {
        let (fs, mut doc) = load(SITE).await;

        doc.update_entry("jquery", Some(&EntryUpdate::version("~1.2.0")))
            .await
            .unwrap();

        let written = on_disk(&fs);
        assert!(written.contains(r#""jquery": "~1.2.0""#));
        let jquery = written.find("jquery").unwrap();
        let bootstrap = written.find("bootstrap").unwrap();
        assert!(jquery < bootstrap);
        assert!(written.find("\"main\"").unwrap() < written.find("\"private\"").unwrap());
        assert!(written.ends_with("}\n"));
        assert_eq!(doc.entry("jquery").unwrap().version, "~1.2.0");
    }

    #[tokio::test]
    async fn test_update_moves_between_sections() {
        let (_fs, mut doc) = load(SITE).await;

        doc.update_entry("qunit", Some(&EntryUpdate::kind(DependencyKind::Production)))
            .await
            .unwrap();

        let entry = doc.entry("qunit").unwrap();
        assert_eq!(entry.kind, DependencyKind::Production);
        assert_eq!(entry.version, "^2.0.0");
        assert!(doc.deps().dev_dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_update_absent_entry_writes_nothing() {
        let (fs, mut doc) = load(SITE).await;

        let err = doc
            .update_entry("lodash", Some(&EntryUpdate::version("^4.0.0")))
            .await
            .unwrap_err();

        assert_eq!(err.code(), codes::ENTRY_NOT_FOUND);
        assert_eq!(on_disk(&fs), SITE);
    }

    #[tokio::test]
    async fn test_update_without_changes_is_noop() {
        let (fs, mut doc) = load(SITE).await;

        for update in [None, Some(&EntryUpdate::default())] {
            let err = doc.update_entry("jquery", update).await.unwrap_err();
            assert_eq!(err.code(), codes::NOTHING_TO_UPDATE);
        }

        assert_eq!(on_disk(&fs), SITE);
        let reread = ManifestDocument::load(fs.clone(), Path::new(PATH)).await.unwrap();
        assert!(!doc.detect_external_change(reread.deps()));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cache() {
        let (fs, mut doc) = load(SITE).await;
        fs.set_fail_writes(true);

        let err = doc.add_entry("lodash", "^4.17.4", true).await.unwrap_err();

        assert_eq!(err.code(), codes::FS_ACTION_FAILED);
        assert!(doc.entry("lodash").is_none());
        assert_eq!(on_disk(&fs), SITE);
    }

    #[tokio::test]
    async fn test_rollback_restores_captured_entry() {
        let (fs, mut doc) = load(SITE).await;
        let before = doc.entry("jquery").unwrap();

        doc.update_entry("jquery", Some(&EntryUpdate::version("^3.0.0")))
            .await
            .unwrap();
        doc.update_entry("jquery", Some(&EntryUpdate::restoring(&before)))
            .await
            .unwrap();

        assert_eq!(doc.entry("jquery"), Some(before));
        let reread = ManifestDocument::load(fs.clone(), Path::new(PATH)).await.unwrap();
        assert!(!doc.detect_external_change(reread.deps()));
    }

    #[tokio::test]
    async fn test_add_and_remove_entry() {
        let (_fs, mut doc) = load(SITE).await;

        doc.add_entry("lodash", "^4.17.4", false).await.unwrap();
        assert_eq!(doc.entry("lodash").unwrap().kind, DependencyKind::Development);

        doc.remove_entry("lodash").await.unwrap();
        assert!(doc.entry("lodash").is_none());

        let err = doc.remove_entry("lodash").await.unwrap_err();
        assert_eq!(err.code(), codes::ENTRY_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_add_entries_is_one_write() {
        let (fs, mut doc) = load(SITE).await;
        let entries = [
            ("lodash".to_string(), "^4.17.4".to_string()),
            ("qunit".to_string(), "^2.1.0".to_string()),
        ];

        doc.add_entries(&entries, true).await.unwrap();

        assert_eq!(fs.write_count(), 1);
        assert_eq!(doc.entry("lodash").unwrap().kind, DependencyKind::Production);
        let qunit = doc.entry("qunit").unwrap();
        assert_eq!(qunit.kind, DependencyKind::Production);
        assert_eq!(qunit.version, "^2.1.0");
        assert!(doc.deps().dev_dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_add_entries_failed_write_adds_none() {
        let (fs, mut doc) = load(SITE).await;
        fs.set_fail_writes(true);
        let entries = [
            ("lodash".to_string(), "^4.17.4".to_string()),
            ("moment".to_string(), "^2.29.4".to_string()),
        ];

        let err = doc.add_entries(&entries, true).await.unwrap_err();

        assert_eq!(err.code(), codes::FS_ACTION_FAILED);
        assert!(doc.entry("lodash").is_none());
        assert!(doc.entry("moment").is_none());
        assert_eq!(on_disk(&fs), SITE);
    }

    #[tokio::test]
    async fn test_sync_with_status() {
        let (_fs, mut doc) = load(SITE).await;
        let reconciliation = StatusReconciliation {
            missing: ["bootstrap".to_string()].into_iter().collect(),
            untracked: [
                ("lodash".to_string(), "4.17.4".to_string()),
                ("qunit".to_string(), "2.1.1".to_string()),
            ]
            .into_iter()
            .collect(),
            version_out_of_sync: [("jquery".to_string(), "1.2.0".to_string())]
                .into_iter()
                .collect(),
        };

        doc.sync_with_status(&reconciliation).await.unwrap();

        assert!(doc.entry("bootstrap").is_none());
        assert_eq!(doc.entry("lodash").unwrap().version, "^4.17.4");
        // already declared, left alone
        assert_eq!(doc.entry("qunit").unwrap().version, "^2.0.0");
        assert_eq!(doc.entry("jquery").unwrap().version, "1.2.0");
    }

    #[tokio::test]
    async fn test_sync_with_nothing_to_do() {
        let (fs, mut doc) = load(SITE).await;

        let err = doc
            .sync_with_status(&StatusReconciliation::default())
            .await
            .unwrap_err();

        assert_eq!(err.code(), codes::NOTHING_TO_SYNC);
        assert_eq!(on_disk(&fs), SITE);
    }

    #[tokio::test]
    async fn test_detect_external_change_ignores_order_and_other_fields() {
        let (_fs, doc) = load(SITE).await;

        let reordered = r#"{
            "devDependencies": { "qunit": "^2.0.0" },
            "dependencies": { "bootstrap": "~3.3.0", "jquery": "~1.0.0" },
            "version": "9.9.9"
        }"#;
        let (_, same) = parse_text(Path::new(PATH), reordered).unwrap();
        assert!(!doc.detect_external_change(&same));

        let changed = r#"{ "dependencies": { "jquery": "~1.0.0" } }"#;
        let (_, different) = parse_text(Path::new(PATH), changed).unwrap();
        assert!(doc.detect_external_change(&different));
    }

    #[tokio::test]
    async fn test_create_writes_minimal_manifest() {
        let fs = Arc::new(MemoryFs::new());

        let doc = ManifestDocument::create(fs.clone(), Path::new(PATH), "site")
            .await
            .unwrap();

        assert!(doc.deps().is_empty());
        assert_eq!(
            on_disk(&fs),
            "{\n  \"name\": \"site\",\n  \"dependencies\": {}\n}\n"
        );

        let err = ManifestDocument::create(fs.clone(), Path::new(PATH), "site")
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::FS_ACTION_FAILED);
    }

    #[test]
    fn test_entries_lists_each_name_once() {
        let deps = ManifestDeps {
            dependencies: [("a".to_string(), "1".to_string())].into_iter().collect(),
            dev_dependencies: [
                ("a".to_string(), "2".to_string()),
                ("b".to_string(), "3".to_string()),
            ]
            .into_iter()
            .collect(),
        };

        let entries: Vec<_> = deps.entries().collect();
        assert_eq!(
            entries,
            vec![
                ("a", DependencyKind::Production, "1"),
                ("b", DependencyKind::Development, "3"),
            ]
        );
    }
}
