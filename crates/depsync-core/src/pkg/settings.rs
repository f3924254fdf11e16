//! `.bowerrc` settings.
//!
//! Only `directory` (where packages are installed, relative to the project
//! root) is read. A missing or malformed rc file yields the defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::fs::FileAccess;
use crate::paths;

/// Rc file name.
pub const RC_FILE: &str = ".bowerrc";

/// Default install directory.
pub const DEFAULT_DIRECTORY: &str = "bower_components";

/// Parsed rc settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub directory: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directory: DEFAULT_DIRECTORY.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawSettings {
    directory: Option<String>,
}

impl Settings {
    /// Parse rc file content.
    ///
    /// # Errors
    /// Returns the JSON error when the content is not an object.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let mut settings = Self::default();
        settings.apply(content)?;
        Ok(settings)
    }

    /// Overlay one rc file's values.
    fn apply(&mut self, content: &str) -> Result<(), serde_json::Error> {
        let raw: RawSettings = serde_json::from_str(content)?;
        if let Some(directory) = raw
            .directory
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
        {
            self.directory = directory;
        }
        Ok(())
    }

    /// Load settings for a project root.
    ///
    /// The user-level rc file is applied first, then the project's own.
    /// Unreadable or malformed files are skipped.
    pub async fn load(fs: &dyn FileAccess, root: &Path, user_rc: Option<&Path>) -> Self {
        let mut settings = Self::default();
        let project_rc = paths::rc_path(root);

        for path in user_rc.into_iter().chain(std::iter::once(project_rc.as_path())) {
            if !fs.exists(path).await {
                continue;
            }
            let content = match fs.read(path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read rc file");
                    continue;
                }
            };
            if let Err(e) = settings.apply(&content) {
                warn!(path = %path.display(), error = %e, "Ignoring malformed rc file");
            }
        }

        settings
    }

    /// Absolute install directory for a project root.
    #[must_use]
    pub fn install_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    #[test]
    fn test_parse_directory() {
        let settings = Settings::parse(r#"{ "directory": "vendor/components" }"#).unwrap();
        assert_eq!(settings.directory, "vendor/components");
        assert_eq!(
            settings.install_dir(Path::new("/site")),
            PathBuf::from("/site/vendor/components")
        );
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(Settings::parse("{}").unwrap(), Settings::default());
        assert_eq!(
            Settings::parse(r#"{ "directory": "  " }"#).unwrap().directory,
            DEFAULT_DIRECTORY
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(Settings::parse("directory=lib").is_err());
    }

    #[tokio::test]
    async fn test_load_falls_back_to_defaults() {
        let fs = MemoryFs::new();
        let root = Path::new("/site");

        assert_eq!(Settings::load(&fs, root, None).await, Settings::default());

        fs.insert(root.join(RC_FILE), "{ not json");
        assert_eq!(Settings::load(&fs, root, None).await, Settings::default());

        fs.insert(root.join(RC_FILE), r#"{ "directory": "lib" }"#);
        assert_eq!(Settings::load(&fs, root, None).await.directory, "lib");
    }

    #[tokio::test]
    async fn test_project_rc_overrides_user_rc() {
        let fs = MemoryFs::new();
        let root = Path::new("/site");
        let user_rc = Path::new("/home/dev/.bowerrc");
        fs.insert(user_rc, r#"{ "directory": "components" }"#);

        let settings = Settings::load(&fs, root, Some(user_rc)).await;
        assert_eq!(settings.directory, "components");

        fs.insert(root.join(RC_FILE), r#"{ "directory": "lib" }"#);
        let settings = Settings::load(&fs, root, Some(user_rc)).await;
        assert_eq!(settings.directory, "lib");
    }
}
