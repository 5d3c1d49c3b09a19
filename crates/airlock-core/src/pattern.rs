//! Block patterns for the outbound connection guard.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A pattern describing remote endpoints that must not hold live
/// connections into the environment.
///
/// Three shapes are recognised, checked in this order:
///
/// 1. `8.212.*`: everything before the trailing `.*` is a prefix match;
/// 2. `*.qoder.sh`: everything after the leading `*` is a suffix match;
/// 3. anything else matches when the candidate ends with the pattern
///    **or** contains it as a substring.
///
/// The plain form is deliberately permissive: `cursor.sh` matches
/// `api.cursor.sh` and also `cursor.sh.evil.example`. Matching is
/// case-sensitive and a `*` anywhere else in the pattern is literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockPattern(String);

impl BlockPattern {
    /// Wrap a raw pattern string.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// The raw pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Test a candidate endpoint (an IP address or hostname in string
    /// form) against this pattern.
    ///
    /// Empty candidates and empty patterns never match.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        if candidate.is_empty() || self.0.is_empty() {
            return false;
        }

        if let Some(prefix) = self.0.strip_suffix(".*") {
            candidate.starts_with(prefix)
        } else if let Some(suffix) = self.0.strip_prefix('*') {
            candidate.ends_with(suffix)
        } else {
            candidate.ends_with(self.0.as_str()) || candidate.contains(self.0.as_str())
        }
    }
}

impl fmt::Display for BlockPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockPattern {
    fn from(pattern: &str) -> Self {
        Self(pattern.to_string())
    }
}

impl From<String> for BlockPattern {
    fn from(pattern: String) -> Self {
        Self(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_matches_leading_octets() {
        let pattern = BlockPattern::from("8.212.*");
        assert!(pattern.matches("8.212.1.5"));
        assert!(pattern.matches("8.212.255.255"));
        assert!(!pattern.matches("9.212.1.5"));
    }

    #[test]
    fn suffix_pattern_matches_trailing_domain() {
        let pattern = BlockPattern::from("*.qoder.sh");
        assert!(pattern.matches("api.qoder.sh"));
        assert!(pattern.matches("deep.sub.qoder.sh"));
        assert!(!pattern.matches("qoder.sh.example.org"));
    }

    #[test]
    fn plain_pattern_matches_suffix_and_substring() {
        let pattern = BlockPattern::from("cursor.sh");
        assert!(pattern.matches("api.cursor.sh"));
        // Substring branch is intentional, not an accident.
        assert!(pattern.matches("cursor.sh.fallback.example"));
        assert!(!pattern.matches("cursor-sh.example"));
    }

    #[test]
    fn empty_inputs_never_match() {
        assert!(!BlockPattern::from("").matches("1.2.3.4"));
        assert!(!BlockPattern::from("1.2.3.4").matches(""));
        assert!(!BlockPattern::from("").matches(""));
    }

    #[test]
    fn embedded_star_is_literal() {
        let pattern = BlockPattern::from("a*b");
        assert!(!pattern.matches("axb"));
        assert!(pattern.matches("ca*b"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let pattern = BlockPattern::from("*.Qoder.sh");
        assert!(!pattern.matches("api.qoder.sh"));
        assert!(pattern.matches("api.Qoder.sh"));
    }

    #[test]
    fn serde_round_trips_as_bare_string() {
        let pattern: BlockPattern = serde_json::from_str("\"8.212.*\"").unwrap();
        assert_eq!(pattern.as_str(), "8.212.*");
        assert_eq!(serde_json::to_string(&pattern).unwrap(), "\"8.212.*\"");
    }
}
