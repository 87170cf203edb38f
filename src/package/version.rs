//! Version ranges and best-version selection.
//!
//! Ranges are written the way package authors usually write them
//! (`>=1.0.0 <2.0.0`, `^1.2`, `1.4.0`) and are evaluated with `semver`.

use anyhow::{Result, bail};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use super::PackageMeta;

/// A semantic-version range.
///
/// Whitespace-separated comparators are conjunctive. A bare version means an
/// exact match, `*` (or an empty string) matches any release.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    raw: String,
    req: VersionReq,
}

impl VersionRange {
    /// A range matching every release.
    pub fn any() -> Self {
        Self {
            raw: "*".into(),
            req: VersionReq::STAR,
        }
    }

    /// A range matching exactly one version.
    pub fn exact(version: &Version) -> Self {
        let raw = format!("={}", version);
        let req = VersionReq::parse(&raw).unwrap_or(VersionReq::STAR);
        Self { raw, req }
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn normalize(raw: &str) -> Result<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok("*".into());
        }
        if trimmed.contains("||") {
            bail!("Alternative ranges ('||') are not supported: {}", raw);
        }

        let tokens: Vec<String> = if trimmed.contains(',') {
            trimmed.split(',').map(|t| t.trim().to_string()).collect()
        } else {
            // Glue a detached operator (">= 1.0.0") to the version that follows it.
            let mut tokens: Vec<String> = Vec::new();
            let mut pending_op = String::new();
            for token in trimmed.split_whitespace() {
                if token.chars().all(is_operator_char) {
                    pending_op.push_str(token);
                } else {
                    tokens.push(format!("{}{}", pending_op, token));
                    pending_op.clear();
                }
            }
            if !pending_op.is_empty() {
                bail!("Dangling operator '{}' in range: {}", pending_op, raw);
            }
            tokens
        };

        let comparators: Vec<String> = tokens
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| normalize_comparator(t))
            .collect();
        Ok(comparators.join(", "))
    }
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '~' | '^')
}

fn normalize_comparator(token: &str) -> String {
    let split = token
        .find(|c: char| !is_operator_char(c))
        .unwrap_or(token.len());
    let (op, rest) = token.split_at(split);
    let rest = rest.strip_prefix('v').unwrap_or(rest);
    let is_wildcard = rest.contains('*') || rest.split('.').any(|p| p == "x" || p == "X");

    if op.is_empty() && !is_wildcard {
        format!("={}", rest)
    } else {
        format!("{}{}", op, rest)
    }
}

impl FromStr for VersionRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = Self::normalize(s)?;
        let req = VersionReq::parse(&normalized)
            .map_err(|e| anyhow::anyhow!("Invalid version range '{}': {}", s, e))?;
        Ok(Self {
            raw: s.trim().to_string(),
            req,
        })
    }
}

impl TryFrom<String> for VersionRange {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionRange> for String {
    fn from(range: VersionRange) -> Self {
        range.raw
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionRange {}

impl Hash for VersionRange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

/// Version resolver - pure functions for picking versions out of a range.
pub struct VersionResolver;

impl VersionResolver {
    /// Highest version inside `range`, by semantic-version ordering.
    pub fn best_version<'a>(
        versions: impl IntoIterator<Item = &'a Version>,
        range: &VersionRange,
    ) -> Option<&'a Version> {
        versions.into_iter().filter(|v| range.matches(v)).max()
    }

    /// Package with the highest version inside `range`.
    ///
    /// The id is not checked; callers pass candidates of a single series.
    pub fn best_match<'a>(
        candidates: impl IntoIterator<Item = &'a PackageMeta>,
        range: &VersionRange,
    ) -> Option<&'a PackageMeta> {
        candidates
            .into_iter()
            .filter(|m| range.matches(&m.version))
            .max_by(|a, b| a.version.cmp(&b.version))
    }

    /// Parse a version string, tolerating a leading `v`.
    pub fn parse(version: &str) -> Result<Version> {
        let trimmed = version.trim();
        let normalized = trimmed.strip_prefix('v').unwrap_or(trimmed);
        Version::parse(normalized)
            .map_err(|e| anyhow::anyhow!("Invalid version '{}': {}", version, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn range(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    #[test]
    fn test_best_version_within_range() {
        let versions = [v("1.0.0"), v("1.2.0"), v("2.0.0")];
        let best = VersionResolver::best_version(&versions, &range(">=1.0.0 <2.0.0"));
        assert_eq!(best, Some(&v("1.2.0")));
    }

    #[test]
    fn test_best_version_none_in_range() {
        let versions = [v("0.9.0"), v("2.0.0")];
        assert_eq!(
            VersionResolver::best_version(&versions, &range(">=1.0.0 <2.0.0")),
            None
        );
    }

    #[test]
    fn test_best_match_uses_semver_not_string_order() {
        let metas = [
            PackageMeta::new("lib", v("1.9.0"), "archive", "none"),
            PackageMeta::new("lib", v("1.10.0"), "archive", "none"),
            PackageMeta::new("lib", v("1.2.0"), "archive", "none"),
        ];
        let best = VersionResolver::best_match(&metas, &VersionRange::any()).unwrap();
        assert_eq!(best.version, v("1.10.0"));
    }

    #[test]
    fn test_bare_version_is_exact() {
        let r = range("1.2.0");
        assert!(r.matches(&v("1.2.0")));
        assert!(!r.matches(&v("1.2.1")));
    }

    #[test]
    fn test_detached_operator_and_v_prefix() {
        let r = range(">= v1.0.0 < 2.0.0");
        assert!(r.matches(&v("1.0.0")));
        assert!(r.matches(&v("1.99.0")));
        assert!(!r.matches(&v("2.0.0")));
    }

    #[test]
    fn test_comma_separated_and_caret() {
        assert!(range(">=1.0.0, <1.5.0").matches(&v("1.4.9")));
        assert!(range("^1.2").matches(&v("1.7.0")));
        assert!(!range("^1.2").matches(&v("2.0.0")));
        assert!(range("1.*").matches(&v("1.3.0")));
    }

    #[test]
    fn test_any_range() {
        assert!(range("*").matches(&v("0.0.1")));
        assert!(range("").matches(&v("9.9.9")));
        assert!(VersionRange::any().matches(&v("3.0.0")));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!("1.0.0 || 2.0.0".parse::<VersionRange>().is_err());
        assert!(">= ".parse::<VersionRange>().is_err());
        assert!("not-a-version".parse::<VersionRange>().is_err());
    }

    #[test]
    fn test_range_serde_keeps_original_text() {
        let r = range(">=1.0.0 <2.0.0");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"">=1.0.0 <2.0.0""#);
        let back: VersionRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert!(serde_json::from_str::<VersionRange>(r#""|| 1""#).is_err());
    }

    #[test]
    fn test_exact_range() {
        let r = VersionRange::exact(&v("0.2.0"));
        assert!(r.matches(&v("0.2.0")));
        assert!(!r.matches(&v("0.2.1")));
    }

    #[test]
    fn test_parse_tolerates_v_prefix() {
        assert_eq!(VersionResolver::parse("v1.2.3").unwrap(), v("1.2.3"));
        assert!(VersionResolver::parse("latest").is_err());
    }
}
