//! Version range satisfaction using semver.
//!
//! Manifest ranges follow npm/bower conventions, which are looser than the
//! `semver` crate's grammar. Ranges are normalized here before matching:
//! - Bare versions (`1.2.0`) are exact, bare partials (`1.2`) behave like `1.2.x`
//! - X-ranges: `1.x`, `1.0.x`, `*`, empty string
//! - Hyphen ranges: `1.0.0 - 2.0.0`
//! - Space-separated comparators: `>= 2.1.2 < 3.0.0`
//! - OR ranges: `^1.0.0 || ^2.0.0`
//!
//! Endpoints that are not version ranges at all (URLs, git refs, local paths)
//! are invalid ranges. Callers treat them as always satisfied.

use semver::{Version, VersionReq};

/// Check whether `range` is a version range this module can evaluate.
#[must_use]
pub fn is_valid_range(range: &str) -> bool {
    parse_alternatives(range).is_some()
}

/// Check an installed version against a manifest range.
///
/// Returns `None` when either side cannot be interpreted (invalid range,
/// non-semver installed version).
#[must_use]
pub fn version_satisfies(version: &str, range: &str) -> Option<bool> {
    let reqs = parse_alternatives(range)?;
    let version = parse_version(version)?;
    Some(reqs.iter().any(|req| req.matches(&version)))
}

/// Default manifest range recorded for a package installed at `version`.
///
/// Semver versions get a caret range; anything else is recorded verbatim.
#[must_use]
pub fn default_range(version: &str) -> String {
    match parse_version(version) {
        Some(v) => format!("^{v}"),
        None => version.to_string(),
    }
}

/// Parse an installed version, tolerating a leading `v` or `=`.
fn parse_version(version: &str) -> Option<Version> {
    let trimmed = version.trim().trim_start_matches(['v', '=']);
    Version::parse(trimmed).ok()
}

/// Parse a full range, splitting `||` alternatives.
fn parse_alternatives(range: &str) -> Option<Vec<VersionReq>> {
    let range = range.trim();

    if range.contains("||") {
        let mut reqs = Vec::new();
        for alt in range.split("||").map(str::trim) {
            if alt.is_empty() {
                continue;
            }
            // Any unparseable alternative makes the whole range invalid.
            reqs.push(parse_range(alt)?);
        }
        return if reqs.is_empty() { None } else { Some(reqs) };
    }

    parse_range(range).map(|req| vec![req])
}

/// Parse a single version range, handling npm-specific syntax.
fn parse_range(range: &str) -> Option<VersionReq> {
    let range = range.trim();

    if range.is_empty() || range == "latest" {
        return Some(VersionReq::STAR);
    }

    // Hyphen ranges: "1.0.0 - 2.0.0" -> ">=1.0.0, <=2.0.0"
    if let Some((start, end)) = parse_hyphen_range(range) {
        return VersionReq::parse(&format!(">={start}, <={end}")).ok();
    }

    // Bare versions are exact in npm/bower, unlike the semver crate's default caret.
    if let Some(exact) = parse_version(range) {
        if !range.starts_with(['^', '~', '>', '<']) {
            return VersionReq::parse(&format!("={exact}")).ok();
        }
    }

    if is_bare_partial(range) {
        return VersionReq::parse(&format!("~{range}")).ok();
    }

    if range.contains(['x', 'X']) || range == "*" {
        return VersionReq::parse(&convert_x_range(range)).ok();
    }

    VersionReq::parse(&convert_space_separated_comparators(range)).ok()
}

/// `1` or `1.2` with no operator.
fn is_bare_partial(range: &str) -> bool {
    let parts: Vec<&str> = range.split('.').collect();
    parts.len() < 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// Parse a hyphen range like "1.0.0 - 2.0.0".
fn parse_hyphen_range(range: &str) -> Option<(String, String)> {
    let (start, end) = range.split_once(" - ")?;
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() || end.is_empty() || end.contains(" - ") {
        return None;
    }
    Some((start.to_string(), end.to_string()))
}

/// Convert space-separated comparators to comma-separated.
///
/// npm allows `>= 2.1.2 < 3.0.0` meaning `>=2.1.2 AND <3.0.0`;
/// the semver crate requires `>=2.1.2, <3.0.0`.
fn convert_space_separated_comparators(range: &str) -> String {
    let mut result = String::new();
    let mut need_comma = false;

    for token in range.split_whitespace() {
        if token_has_version(token) {
            if need_comma {
                result.push_str(", ");
            }
            result.push_str(token);
            need_comma = true;
        } else {
            // Operator separated from its version by a space.
            if need_comma {
                result.push_str(", ");
                need_comma = false;
            }
            result.push_str(token);
        }
    }

    if result.is_empty() {
        range.to_string()
    } else {
        result
    }
}

fn token_has_version(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
}

/// Convert an x-range to a semver range.
fn convert_x_range(range: &str) -> String {
    if range == "*" || range == "x" || range == "X" {
        return ">=0.0.0".to_string();
    }

    let parts: Vec<&str> = range.split('.').collect();

    match parts.as_slice() {
        [major, "x" | "X" | "*"] | [major, "x" | "X" | "*", "x" | "X" | "*"] => {
            if let Ok(m) = major.parse::<u64>() {
                return format!(">={m}.0.0, <{}.0.0", m + 1);
            }
        }
        [major, minor, "x" | "X" | "*"] => {
            if let (Ok(m), Ok(n)) = (major.parse::<u64>(), minor.parse::<u64>()) {
                return format!(">={m}.{n}.0, <{m}.{}.0", n + 1);
            }
        }
        _ => {}
    }

    range.replace(['x', 'X'], "0")
}
