//! Named rate limit policies.
//!
//! Each rate-limited portal action gets a policy name that maps to the
//! options passed to the limiter:
//!
//! ```yaml
//! policies:
//!   login:
//!     limit: 5
//!     window_ms: 60000
//!   report_submit:
//!     limit: 10
//!     window_ms: 3600000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::counter::RateLimitOptions;
use crate::error::{RateLimitError, Result};

/// Policy used for login attempts.
pub const LOGIN: &str = "login";
/// Policy used for incident report submission.
pub const REPORT_SUBMIT: &str = "report_submit";
/// Policy used for compliance report generation.
pub const COMPLIANCE_REPORT: &str = "compliance_report";

/// A set of named policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    /// Map of policy name to options
    #[serde(default)]
    pub policies: HashMap<String, RateLimitOptions>,
}

impl Default for PolicySet {
    fn default() -> Self {
        let mut policies = HashMap::new();
        policies.insert(LOGIN.to_string(), RateLimitOptions::new(5, 60_000));
        policies.insert(
            REPORT_SUBMIT.to_string(),
            RateLimitOptions::new(10, 3_600_000),
        );
        policies.insert(
            COMPLIANCE_REPORT.to_string(),
            RateLimitOptions::new(3, 3_600_000),
        );
        Self { policies }
    }
}

impl PolicySet {
    /// Create a set with no policies.
    pub fn empty() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    /// Load policies from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            RateLimitError::Config(format!("Failed to parse rate limit policies: {}", e))
        })
    }

    /// Add or replace a policy.
    pub fn insert(&mut self, name: impl Into<String>, options: RateLimitOptions) {
        self.policies.insert(name.into(), options);
    }

    /// Get the options for a policy.
    pub fn get(&self, name: &str) -> Option<&RateLimitOptions> {
        self.policies.get(name)
    }

    /// Get the options for a policy, failing if it is not configured.
    pub fn require(&self, name: &str) -> Result<&RateLimitOptions> {
        self.get(name)
            .ok_or_else(|| RateLimitError::UnknownPolicy(name.to_string()))
    }

    /// Merge `other` into this set; policies in `other` win.
    pub fn merge(&mut self, other: PolicySet) {
        self.policies.extend(other.policies);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let policies = PolicySet::default();

        assert_eq!(policies.get(LOGIN), Some(&RateLimitOptions::new(5, 60_000)));
        assert!(policies.get(REPORT_SUBMIT).is_some());
        assert!(policies.get(COMPLIANCE_REPORT).is_some());
    }

    #[test]
    fn test_parse_policies() {
        let yaml = r#"
policies:
  login:
    limit: 3
    window_ms: 1000
  export:
    limit: 1
    window_ms: 86400000
"#;
        let policies = PolicySet::from_yaml(yaml).unwrap();

        assert_eq!(policies.policies.len(), 2);
        assert_eq!(policies.get("login"), Some(&RateLimitOptions::new(3, 1_000)));
        assert_eq!(
            policies.get("export"),
            Some(&RateLimitOptions::new(1, 86_400_000))
        );
    }

    #[test]
    fn test_parse_empty_document() {
        let policies = PolicySet::from_yaml("{}").unwrap();
        assert!(policies.policies.is_empty());
    }

    #[test]
    fn test_parse_invalid_policy() {
        let yaml = r#"
policies:
  login:
    limit: lots
"#;
        let err = PolicySet::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, RateLimitError::Config(_)));
    }

    #[test]
    fn test_require_unknown_policy() {
        let policies = PolicySet::empty();

        let err = policies.require("login").unwrap_err();
        assert!(matches!(err, RateLimitError::UnknownPolicy(name) if name == "login"));
    }

    #[test]
    fn test_merge_overrides() {
        let mut policies = PolicySet::default();
        let mut overrides = PolicySet::empty();
        overrides.insert(LOGIN, RateLimitOptions::new(50, 1_000));

        policies.merge(overrides);

        assert_eq!(policies.get(LOGIN), Some(&RateLimitOptions::new(50, 1_000)));
        assert!(policies.get(REPORT_SUBMIT).is_some());
    }
}
