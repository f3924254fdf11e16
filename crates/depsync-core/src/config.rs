use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the installer binary.
pub const TOOL_ENV: &str = "DEPSYNC_TOOL";

/// Installer used when nothing else is configured.
pub const DEFAULT_TOOL: &str = "bower";

/// Runtime configuration for the depsync CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Installer binary, a bare name looked up on PATH or a path.
    pub tool: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            tool: tool_from_env(),
        }
    }
}

/// Installer named by `DEPSYNC_TOOL`, or the default.
fn tool_from_env() -> String {
    std::env::var(TOOL_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TOOL.to_string())
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Override the installer binary. `None` keeps the current one.
    #[must_use]
    pub fn with_tool(mut self, tool: Option<String>) -> Self {
        if let Some(tool) = tool {
            self.tool = tool;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_tool_from_env() {
        std::env::set_var(TOOL_ENV, "/opt/bin/bower");
        assert_eq!(Config::new(PathBuf::from("/site")).tool, "/opt/bin/bower");

        std::env::set_var(TOOL_ENV, "  ");
        assert_eq!(Config::new(PathBuf::from("/site")).tool, DEFAULT_TOOL);

        std::env::remove_var(TOOL_ENV);
        assert_eq!(Config::new(PathBuf::from("/site")).tool, DEFAULT_TOOL);
    }

    #[test]
    #[serial]
    fn test_flag_overrides_env() {
        std::env::set_var(TOOL_ENV, "from-env");
        let config = Config::new(PathBuf::from("/site")).with_tool(Some("from-flag".to_string()));
        assert_eq!(config.tool, "from-flag");

        let config = Config::new(PathBuf::from("/site")).with_tool(None);
        assert_eq!(config.tool, "from-env");
        std::env::remove_var(TOOL_ENV);
    }

    #[test]
    fn test_builders() {
        let config = Config::new(PathBuf::from("/site"))
            .with_verbosity(2)
            .with_json_logs(true);
        assert_eq!(config.verbosity, 2);
        assert!(config.json_logs);
        assert_eq!(config.cwd, PathBuf::from("/site"));
    }
}
