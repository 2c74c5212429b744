//! Configured handler rules: regex patterns bound to registered capabilities.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::handlers::{Capability, HandlerRegistry};

/// Serialized form of a rule, as read from the rules file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Regular expression searched for anywhere in the file path.
    pub pattern: String,
    /// Registry identifier of the capability to use.
    pub handler: String,
    /// Lower values are tried first.
    #[serde(default)]
    pub priority: i32,
}

/// Errors raised while building a rule set.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The pattern is not a valid regular expression.
    #[error("invalid rule pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// Offending pattern.
        pattern: String,
        /// Regex compilation failure.
        #[source]
        source: regex::Error,
    },
    /// The rule names a capability the registry does not know.
    #[error("rule `{pattern}` references unknown handler `{handler}`")]
    UnknownHandler {
        /// Pattern of the rule.
        pattern: String,
        /// Unknown identifier.
        handler: String,
    },
    /// The rules file could not be read.
    #[error("failed to read rules file {path}: {source}")]
    Io {
        /// Rules file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The rules file is not a JSON array of rules.
    #[error("failed to parse rules file {path}: {source}")]
    Parse {
        /// Rules file.
        path: PathBuf,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
}

/// A compiled rule.
#[derive(Clone)]
pub struct HandlerRule {
    pattern: Regex,
    capability: Capability,
    priority: i32,
}

impl HandlerRule {
    /// Compile a rule for an already resolved capability.
    pub fn new(pattern: &str, capability: Capability, priority: i32) -> Result<Self, RuleError> {
        let pattern = Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            capability,
            priority,
        })
    }

    /// Capability this rule selects.
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Ordering key; ascending values are tried first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether the pattern occurs anywhere in the path.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

impl std::fmt::Debug for HandlerRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRule")
            .field("pattern", &self.pattern.as_str())
            .field("capability", &self.capability.id())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Rules in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<HandlerRule>,
}

impl RuleSet {
    /// Empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; declaration order breaks priority ties.
    pub fn push(&mut self, rule: HandlerRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Compile serialized rules against a registry.
    pub fn from_specs(specs: &[RuleSpec], registry: &HandlerRegistry) -> Result<Self, RuleError> {
        let mut rules = Self::new();
        for spec in specs {
            let capability = registry
                .get(&spec.handler)
                .ok_or_else(|| RuleError::UnknownHandler {
                    pattern: spec.pattern.clone(),
                    handler: spec.handler.clone(),
                })?;
            rules.push(HandlerRule::new(&spec.pattern, capability, spec.priority)?);
        }
        Ok(rules)
    }

    /// Load a JSON array of [`RuleSpec`] from disk.
    pub fn load(path: &Path, registry: &HandlerRegistry) -> Result<Self, RuleError> {
        let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let specs: Vec<RuleSpec> = serde_json::from_str(&text).map_err(|source| RuleError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_specs(&specs, registry)
    }

    /// Rules matching `path`, sorted by ascending priority with ties in declaration order.
    pub fn candidates(&self, path: &Path) -> Vec<&HandlerRule> {
        let text = path.to_string_lossy();
        let mut matched: Vec<&HandlerRule> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(&text))
            .collect();
        matched.sort_by_key(|rule| rule.priority);
        matched
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ids;
    use std::io::Write;

    fn registry() -> HandlerRegistry {
        HandlerRegistry::builtin()
    }

    #[test]
    fn candidates_sorted_by_priority_then_declaration() {
        let specs = vec![
            RuleSpec {
                pattern: r"\.nc$".into(),
                handler: ids::NETCDF.into(),
                priority: 5,
            },
            RuleSpec {
                pattern: "faam".into(),
                handler: ids::NASA_AMES.into(),
                priority: 1,
            },
            RuleSpec {
                pattern: "core".into(),
                handler: ids::GENERIC.into(),
                priority: 5,
            },
        ];
        let rules = RuleSet::from_specs(&specs, &registry()).expect("rules");
        let selected: Vec<&str> = rules
            .candidates(Path::new("/badc/faam/core_b512.nc"))
            .into_iter()
            .map(|rule| rule.capability().id())
            .collect();
        assert_eq!(selected, vec!["nasa-ames", "netcdf", "generic"]);
        assert!(rules.candidates(Path::new("/tmp/other.txt")).is_empty());
    }

    #[test]
    fn unknown_handler_and_bad_regex_are_rejected() {
        let unknown = [RuleSpec {
            pattern: ".*".into(),
            handler: "hdf4".into(),
            priority: 0,
        }];
        assert!(matches!(
            RuleSet::from_specs(&unknown, &registry()),
            Err(RuleError::UnknownHandler { .. })
        ));

        let bad = [RuleSpec {
            pattern: "(".into(),
            handler: ids::GENERIC.into(),
            priority: 0,
        }];
        assert!(matches!(
            RuleSet::from_specs(&bad, &registry()),
            Err(RuleError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn loads_rules_file_with_default_priority() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"[{{"pattern": "\\.pp$", "handler": "pp"}}]"#).expect("write");
        let rules = RuleSet::load(file.path(), &registry()).expect("load");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.candidates(Path::new("a.pp"))[0].priority(), 0);
    }
}
