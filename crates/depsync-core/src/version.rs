/// Crate version, shared by every depsync binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shape version of the `--json` output. Bumped on breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Human-readable version line, e.g. `depsync 0.2.0 (json schema 1)`.
#[must_use]
pub fn version_string() -> String {
    format!("depsync {VERSION} (json schema {SCHEMA_VERSION})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_semver() {
        assert!(semver::Version::parse(VERSION).is_ok());
    }

    #[test]
    fn test_version_string_format() {
        let line = version_string();
        assert!(line.starts_with("depsync "));
        assert!(line.contains(VERSION));
        assert!(line.ends_with("(json schema 1)"));
    }
}
