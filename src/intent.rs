//! Rule-based classification of user turns.
//!
//! The rules live in a YAML table (see `assets/intents.yaml`) so that a new
//! language is a data change. Rules are tried in table order and the first
//! matching rule decides; text matching no rule is [`Intent::General`].

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::IntentTableError;

const DEFAULT_TABLE: &str = include_str!("../assets/intents.yaml");

/// Classification of a single user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// "Where am I" style questions, answered locally.
    Location,
    /// Market price questions, which want coordinates.
    Price,
    General,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::Location => "location",
            Intent::Price => "price",
            Intent::General => "general",
        };
        f.write_str(s)
    }
}

/// One entry of the table as written in YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternSpec {
    pub script: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntentRule {
    pub intent: Intent,
    pub patterns: Vec<PatternSpec>,
}

struct CompiledPattern {
    script: String,
    regex: Regex,
}

struct CompiledRule {
    intent: Intent,
    patterns: Vec<CompiledPattern>,
}

pub struct IntentClassifier {
    rules: Vec<CompiledRule>,
}

impl IntentClassifier {
    /// Classifier over the table embedded in the binary.
    pub fn builtin() -> Result<Self, IntentTableError> {
        Self::from_yaml(DEFAULT_TABLE)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, IntentTableError> {
        let rules: Vec<IntentRule> = serde_yaml::from_str(yaml)?;
        Self::from_rules(rules)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IntentTableError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| IntentTableError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn from_rules(rules: Vec<IntentRule>) -> Result<Self, IntentTableError> {
        let rules = rules
            .into_iter()
            .map(|rule| -> Result<CompiledRule, IntentTableError> {
                let patterns = rule
                    .patterns
                    .into_iter()
                    .map(|spec| {
                        RegexBuilder::new(&spec.pattern)
                            .case_insensitive(true)
                            .build()
                            .map(|regex| CompiledPattern {
                                script: spec.script.clone(),
                                regex,
                            })
                            .map_err(|source| IntentTableError::Pattern {
                                intent: rule.intent.to_string(),
                                script: spec.script,
                                pattern: spec.pattern,
                                source,
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledRule {
                    intent: rule.intent,
                    patterns,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded intent table with {} rules", rules.len());
        Ok(Self { rules })
    }

    /// Classify already-trimmed, non-empty text.
    pub fn classify(&self, text: &str) -> Intent {
        for rule in &self.rules {
            if let Some(hit) = rule.patterns.iter().find(|p| p.regex.is_match(text)) {
                tracing::debug!(intent = %rule.intent, script = %hit.script, "Intent pattern matched");
                return rule.intent;
            }
        }
        Intent::General
    }
}
