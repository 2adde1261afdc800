//! Routes on which authentication failures degrade to `Skipped`.

use axum::http::Method;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Skip rule as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkipRuleConfig {
    pub method: String,
    pub pattern: String,
}

impl SkipRuleConfig {
    pub fn new(method: &str, pattern: &str) -> Self {
        Self {
            method: method.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

/// Public routes: challenge issuance and user retrieval.
pub fn default_skip_rules() -> Vec<SkipRuleConfig> {
    vec![
        SkipRuleConfig::new("GET", "^/challenges$"),
        SkipRuleConfig::new("GET", "^/users/[a-zA-Z0-9_]+$"),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum SkipListError {
    #[error("Invalid HTTP method in skip rule: {0:?}")]
    InvalidMethod(String),

    #[error("Invalid pattern in skip rule {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone)]
pub struct SkipRule {
    pub method: Method,
    pub pattern: Regex,
}

/// Ordered skip rules, compiled once at startup.
#[derive(Debug, Clone, Default)]
pub struct SkipList {
    rules: Vec<SkipRule>,
}

impl SkipList {
    pub fn compile(rules: &[SkipRuleConfig]) -> Result<Self, SkipListError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let method = Method::from_bytes(rule.method.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|_| SkipListError::InvalidMethod(rule.method.clone()))?;
                let pattern =
                    Regex::new(&rule.pattern).map_err(|source| SkipListError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        source,
                    })?;
                Ok(SkipRule { method, pattern })
            })
            .collect::<Result<Vec<_>, SkipListError>>()?;

        Ok(Self { rules })
    }

    /// Whether `(method, path)` is skip-eligible. `path` excludes the query.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.method == method && rule.pattern.is_match(path))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
