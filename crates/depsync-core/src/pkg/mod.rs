//! Package state tracking.
//!
//! Provides:
//! - The dependency graph built from the installer's `list` tree
//! - Sync status of installed packages against the manifest
//! - Manifest reading and atomic rewriting
//! - Version range satisfaction
//! - `.bowerrc` settings and package spec parsing

pub mod error;
pub mod graph;
pub mod manifest;
pub mod range;
pub mod settings;
pub mod spec;
pub mod status;
pub mod tree;

pub use error::{codes, SyncError};
pub use graph::{
    AddOutcome, DependencyKind, PackageGraph, PackageNode, PackageStatus, PackagesSummary,
};
pub use manifest::{
    parse_text, EntryUpdate, ManifestDeps, ManifestDocument, ManifestEntry, MANIFEST_FILE,
};
pub use range::{default_range, is_valid_range, version_satisfies};
pub use settings::{Settings, DEFAULT_DIRECTORY, RC_FILE};
pub use spec::PackageSpec;
pub use status::{StatusReconciliation, SyncStatus};
pub use tree::{InstalledSet, PackageInfo, PkgMeta, RawPackage, RawTree, SearchHit};
