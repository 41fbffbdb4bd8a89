use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GrammarError, Result};
use crate::pattern::{parse_pattern, Pattern};

/// Rules the recognizer provides without a definition.
pub const BUILTIN_RULES: &[&str] = &["dgndictation", "dgnletters", "dgnwords"];

/// Body of one rule: a single pattern or a list of alternative patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleBody {
    Pattern(String),
    Alternatives(Vec<String>),
}

impl RuleBody {
    /// Parse the body into one pattern; alternatives become a top-level choice.
    pub fn parse(&self, rule: &str) -> Result<Pattern> {
        let parse = |src: &str| {
            parse_pattern(src).map_err(|source| GrammarError::Pattern {
                rule: rule.to_string(),
                source,
            })
        };
        match self {
            RuleBody::Pattern(src) => parse(src.as_str()),
            RuleBody::Alternatives(alts) => {
                if alts.is_empty() {
                    return Err(GrammarError::EmptyRule(rule.to_string()));
                }
                let mut parsed = alts
                    .iter()
                    .map(|src| parse(src.as_str()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(if parsed.len() == 1 {
                    parsed.remove(0)
                } else {
                    Pattern::Alternatives(parsed)
                })
            }
        }
    }
}

impl From<&str> for RuleBody {
    fn from(src: &str) -> Self {
        RuleBody::Pattern(src.to_string())
    }
}

impl From<String> for RuleBody {
    fn from(src: String) -> Self {
        RuleBody::Pattern(src)
    }
}

impl From<Vec<String>> for RuleBody {
    fn from(alts: Vec<String>) -> Self {
        RuleBody::Alternatives(alts)
    }
}

/// A named grammar: exported (public) rules plus helper (private) rules.
///
/// Rules are kept in sorted maps so the encoded command is the same for the
/// same definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrammarSpec {
    pub name: String,
    pub public: BTreeMap<String, RuleBody>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub private: BTreeMap<String, RuleBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

/// Outcome of a successful [`GrammarSpec::check`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GrammarSummary {
    /// Built-in rules the grammar uses.
    pub imports: BTreeSet<String>,
    /// Lists the grammar references; their items are set separately.
    pub lists: BTreeSet<String>,
}

impl GrammarSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn public_rule(mut self, name: impl Into<String>, body: impl Into<RuleBody>) -> Self {
        self.public.insert(name.into(), body.into());
        self
    }

    pub fn private_rule(mut self, name: impl Into<String>, body: impl Into<RuleBody>) -> Self {
        self.private.insert(name.into(), body.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Parse every rule and resolve references.
    ///
    /// Fails on syntax errors, rules defined twice, references to undefined
    /// rules, or a grammar without public rules.
    pub fn check(&self) -> Result<GrammarSummary> {
        if self.name.trim().is_empty() {
            return Err(GrammarError::EmptyName);
        }
        if self.public.is_empty() {
            return Err(GrammarError::NoPublicRules(self.name.clone()));
        }
        if let Some(name) = self.public.keys().find(|name| self.private.contains_key(*name)) {
            return Err(GrammarError::DuplicateRule(name.clone()));
        }

        let mut summary = GrammarSummary::default();
        for (rule, body) in self.private.iter().chain(self.public.iter()) {
            let pattern = body.parse(rule)?;
            for reference in pattern.rule_refs() {
                if self.public.contains_key(reference) || self.private.contains_key(reference) {
                    continue;
                }
                if BUILTIN_RULES.contains(&reference) {
                    summary.imports.insert(reference.to_string());
                    continue;
                }
                return Err(GrammarError::UndefinedRule {
                    rule: reference.to_string(),
                    referenced_by: rule.clone(),
                });
            }
            summary
                .lists
                .extend(pattern.list_refs().into_iter().map(str::to_string));
        }

        debug!(
            grammar = %self.name,
            public = self.public.len(),
            private = self.private.len(),
            lists = summary.lists.len(),
            "grammar checked"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> GrammarSpec {
        GrammarSpec::new("test")
            .public_rule("cat", "feed [the] (cat | kitty)")
            .public_rule("doors", "(open | lock | close) ([the] <door> door | all doors)")
            .public_rule(
                "weather",
                "(what will | what's | what is) the weather [be] [at] <dgndictation>",
            )
            .private_rule("door", "{door}")
            .private_rule("room", "{room}")
    }

    #[test]
    fn check_collects_lists_and_imports() {
        let summary = home().check().unwrap();
        assert_eq!(
            summary.lists.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["door", "room"]
        );
        assert!(summary.imports.contains("dgndictation"));
    }

    #[test]
    fn undefined_rule_is_reported_with_referrer() {
        let grammar = GrammarSpec::new("test").public_rule("lights", "<lightaction> lights");
        match grammar.check().unwrap_err() {
            GrammarError::UndefinedRule {
                rule,
                referenced_by,
            } => {
                assert_eq!(rule, "lightaction");
                assert_eq!(referenced_by, "lights");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn grammar_without_public_rules_is_rejected() {
        let grammar = GrammarSpec::new("test").private_rule("room", "{room}");
        assert!(matches!(
            grammar.check(),
            Err(GrammarError::NoPublicRules(ref name)) if name == "test"
        ));
    }

    #[test]
    fn duplicate_rule_is_rejected() {
        let grammar = GrammarSpec::new("test")
            .public_rule("room", "kitchen")
            .private_rule("room", "{room}");
        assert!(matches!(grammar.check(), Err(GrammarError::DuplicateRule(_))));
    }

    #[test]
    fn pattern_error_names_the_rule() {
        let grammar = GrammarSpec::new("test").public_rule("cat", "feed [the cat");
        let err = grammar.check().unwrap_err();
        assert_eq!(err.to_string(), "rule \"cat\": unclosed '[' at byte 5");
    }

    #[test]
    fn alternatives_body() {
        let body = RuleBody::from(vec!["lights on".to_string(), "lights off".to_string()]);
        let pattern = body.parse("lightaction").unwrap();
        assert!(matches!(pattern, Pattern::Alternatives(ref alts) if alts.len() == 2));

        let empty = RuleBody::Alternatives(Vec::new());
        assert!(matches!(empty.parse("x"), Err(GrammarError::EmptyRule(_))));
    }

    #[test]
    fn rule_body_accepts_string_or_array() {
        let single: RuleBody = serde_json::from_str(r#""feed the cat""#).unwrap();
        assert_eq!(single, RuleBody::from("feed the cat"));

        let many: RuleBody = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(
            many,
            RuleBody::Alternatives(vec!["a".to_string(), "b".to_string()])
        );

        assert!(serde_json::from_str::<RuleBody>("42").is_err());
    }
}
