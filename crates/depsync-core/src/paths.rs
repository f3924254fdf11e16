use std::path::{Path, PathBuf};

use crate::pkg::manifest::MANIFEST_FILE;
use crate::pkg::settings::RC_FILE;

/// Find the project root by walking up from `cwd` looking for `bower.json` or `.git`.
///
/// Returns the first directory containing either marker, or `None` if neither is found.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(MANIFEST_FILE).exists() || current.join(".git").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Manifest path for a project root.
#[must_use]
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

/// Rc file path for a project root.
#[must_use]
pub fn rc_path(root: &Path) -> PathBuf {
    root.join(RC_FILE)
}

/// User-level rc file (`~/.bowerrc`), if a home directory is known.
#[must_use]
pub fn user_rc_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(RC_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_project_root_with_manifest() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("bower.json"), "{}").unwrap();

        let root = project_root(&nested);
        assert_eq!(root, Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_project_root_with_git() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("src");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let root = project_root(&nested);
        assert_eq!(root, Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_nearest_manifest_wins() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("themes").join("dark");
        fs::create_dir_all(&sub).unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(sub.join("bower.json"), "{}").unwrap();

        assert_eq!(project_root(&sub), Some(sub.clone()));
    }

    #[test]
    fn test_project_file_paths() {
        let root = Path::new("/site");
        assert_eq!(manifest_path(root), PathBuf::from("/site/bower.json"));
        assert_eq!(rc_path(root), PathBuf::from("/site/.bowerrc"));
    }

    #[test]
    fn test_user_rc_path_named_after_rc_file() {
        if let Some(path) = user_rc_path() {
            assert!(path.ends_with(RC_FILE));
        }
    }
}
