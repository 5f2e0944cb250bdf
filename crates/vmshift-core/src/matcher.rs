//! Name matching for volumes, exclusion lists, and lock-check tasks.
//!
//! All matching is case-insensitive. Exclusion sets match whole names;
//! volume and task patterns are unanchored regular expressions, so a
//! plain word behaves like a substring check.

use std::collections::HashSet;

use regex::Regex;

use crate::error::{ConfigError, ConfigResult};

/// Compile `pattern` case-insensitively, reporting which pattern failed.
fn compile(pattern: &str) -> ConfigResult<Regex> {
    Regex::new(&format!("(?i){pattern}")).map_err(|source| ConfigError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Set of names matched by exact, case-insensitive membership.
#[derive(Debug, Clone, Default)]
pub struct NameSet {
    names: HashSet<String>,
}

impl NameSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.trim().to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

/// Volume name patterns, compiled into one alternation.
#[derive(Debug, Clone)]
pub struct VolumePatterns {
    regex: Regex,
}

impl VolumePatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> ConfigResult<Self> {
        if patterns.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one storage volume pattern is required".to_string(),
            ));
        }

        // Compile each alone first so a bad entry is named in the error.
        for p in patterns {
            compile(p.as_ref())?;
        }

        let alternation = patterns
            .iter()
            .map(|p| format!("(?:{})", p.as_ref()))
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            regex: compile(&alternation)?,
        })
    }

    pub fn is_match(&self, volume: &str) -> bool {
        self.regex.is_match(volume)
    }
}

/// Pattern selecting relocation tasks during the lock check.
#[derive(Debug, Clone)]
pub struct TaskPattern {
    source: String,
    regex: Regex,
}

impl TaskPattern {
    pub fn new(pattern: &str) -> ConfigResult<Self> {
        Ok(Self {
            source: pattern.to_string(),
            regex: compile(pattern)?,
        })
    }

    pub fn is_match(&self, task_name: &str) -> bool {
        self.regex.is_match(task_name)
    }

    /// The pattern as written in the config.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}
