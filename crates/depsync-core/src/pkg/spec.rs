//! Package spec parsing.
//!
//! Parses install targets like:
//! - `jquery`
//! - `jquery#3.1.0`
//! - `jquery#~3.1.0`
//! - `jquery@^3.0.0`

use std::fmt;

use super::error::SyncError;

/// A package name with an optional range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    /// Version range or tag (None means latest).
    pub range: Option<String>,
}

impl PackageSpec {
    /// Create a spec from parts.
    #[must_use]
    pub fn new(name: impl Into<String>, range: Option<String>) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }

    /// Parse a package specification string.
    ///
    /// `#` is the installer's own separator; `@` is accepted as well.
    pub fn parse(input: &str) -> Result<Self, SyncError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(SyncError::invalid_spec("Empty package spec"));
        }

        let split = input.split_once('#').or_else(|| input.split_once('@'));
        let Some((name, range)) = split else {
            Self::validate_name(input)?;
            return Ok(Self::new(input, None));
        };

        if name.is_empty() {
            return Err(SyncError::invalid_spec(format!("empty name in '{input}'")));
        }
        if range.is_empty() {
            return Err(SyncError::invalid_spec(format!(
                "empty version range in '{input}'"
            )));
        }
        Self::validate_name(name)?;

        Ok(Self::new(name, Some(range.to_string())))
    }

    fn validate_name(name: &str) -> Result<(), SyncError> {
        if name.starts_with('.') || name.starts_with('-') {
            return Err(SyncError::invalid_spec(format!(
                "name cannot start with '.' or '-': '{name}'"
            )));
        }
        if name.chars().any(|c| c.is_whitespace() || c == '\\') {
            return Err(SyncError::invalid_spec(format!(
                "name contains invalid characters: '{name}'"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for PackageSpec {
    /// Format the way the installer expects endpoints.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}#{range}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;

    #[test]
    fn test_bare_name() {
        let spec = PackageSpec::parse("jquery").unwrap();
        assert_eq!(spec.name, "jquery");
        assert!(spec.range.is_none());
    }

    #[test]
    fn test_hash_range() {
        let spec = PackageSpec::parse("jquery#~3.1.0").unwrap();
        assert_eq!(spec.name, "jquery");
        assert_eq!(spec.range.as_deref(), Some("~3.1.0"));
    }

    #[test]
    fn test_at_range() {
        let spec = PackageSpec::parse(" bootstrap@^3.3.0 ").unwrap();
        assert_eq!(spec.name, "bootstrap");
        assert_eq!(spec.range.as_deref(), Some("^3.3.0"));
    }

    #[test]
    fn test_github_shorthand() {
        let spec = PackageSpec::parse("desandro/masonry#^4.0.0").unwrap();
        assert_eq!(spec.name, "desandro/masonry");
    }

    #[test]
    fn test_display_uses_hash() {
        assert_eq!(
            PackageSpec::new("jquery", Some(">= 1.9.1".to_string())).to_string(),
            "jquery#>= 1.9.1"
        );
        assert_eq!(PackageSpec::new("jquery", None).to_string(), "jquery");
    }

    #[test]
    fn test_invalid_specs() {
        for input in ["", "#1.0.0", "jquery#", "jquery@", ".hidden", "a b", "a\\b"] {
            let err = PackageSpec::parse(input).unwrap_err();
            assert_eq!(err.code(), codes::INVALID_SPEC, "{input:?}");
        }
    }
}
