use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Issue, Label};

pub const DEFAULT_SOURCE: &str = "linear";
pub const UNESTIMATED: &str = "Unestimated";
pub const OTHER_TYPE: &str = "Other";

/// Team-name patterns per upstream source: `source -> unified -> [patterns]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamPatterns(pub BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl TeamPatterns {
    /// Unified team names configured for a source, sorted.
    pub fn unified_names(&self, source: &str) -> Vec<&str> {
        self.0
            .get(source)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Patterns for one unified team in one source. Unknown names yield `&[]`.
    pub fn patterns_for(&self, source: &str, unified: &str) -> &[String] {
        self.0
            .get(source)
            .and_then(|m| m.get(unified))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sources(&self) -> BTreeSet<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRuleConfig {
    pub name: String,
    pub label_pattern: String,
    #[serde(default)]
    pub title_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeBucket {
    pub name: String,
    /// Inclusive upper bound; `None` means unbounded.
    #[serde(default)]
    pub max_estimate: Option<f64>,
}

/// Issue classification settings, as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Classification {
    pub bug_label_pattern: String,
    pub blocked_state_pattern: String,
    pub review_state_pattern: String,
    pub type_rules: Vec<TypeRuleConfig>,
    pub size_buckets: Vec<SizeBucket>,
}

impl Default for Classification {
    fn default() -> Self {
        let rule = |name: &str, pattern: &str, keywords: &[&str]| TypeRuleConfig {
            name: name.to_string(),
            label_pattern: pattern.to_string(),
            title_keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };
        let size = |name: &str, max: Option<f64>| SizeBucket {
            name: name.to_string(),
            max_estimate: max,
        };
        Self {
            bug_label_pattern: r"(?i)\bbug\b|defect".to_string(),
            blocked_state_pattern: r"(?i)blocked".to_string(),
            review_state_pattern: r"(?i)review".to_string(),
            type_rules: vec![
                rule("Bug", r"(?i)\bbug\b|defect", &["bug", "fix", "error", "crash", "broken"]),
                rule("Feature", r"(?i)feature|enhancement", &["add", "implement", "support", "new"]),
                rule(
                    "Chore",
                    r"(?i)chore|maintenance|tech.?debt|refactor",
                    &["refactor", "cleanup", "upgrade", "bump", "chore"],
                ),
                rule("Documentation", r"(?i)\bdocs?\b|documentation", &["docs", "documentation", "readme"]),
            ],
            size_buckets: vec![
                size("XS", Some(1.0)),
                size("S", Some(2.0)),
                size("M", Some(3.0)),
                size("L", Some(5.0)),
                size("XL", None),
            ],
        }
    }
}

/// On-disk configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub teams: TeamPatterns,
    pub classification: Classification,
}

impl Config {
    /// Default config location (`~/.flowmetrics/config.json`).
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".flowmetrics");
        Ok(dir.join("config.json"))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the default config file, or built-in defaults when it does not exist.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Compile the classification settings into immutable [`Rules`].
    pub fn compile(&self) -> Result<Rules> {
        Rules::compile(&self.classification)
    }
}

#[derive(Debug, Clone)]
pub struct TypeRule {
    pub name: String,
    pub label_pattern: Regex,
    pub title_keywords: Vec<String>,
}

/// Compiled classification rules shared by the calculators.
#[derive(Debug, Clone)]
pub struct Rules {
    pub bug_label: Regex,
    pub blocked_state: Regex,
    pub review_state: Regex,
    pub type_rules: Vec<TypeRule>,
    pub size_buckets: Vec<SizeBucket>,
}

impl Default for Rules {
    fn default() -> Self {
        Self::compile(&Classification::default()).expect("built-in classification patterns are valid")
    }
}

impl Rules {
    pub fn compile(c: &Classification) -> Result<Self> {
        let type_rules = c
            .type_rules
            .iter()
            .map(|r| {
                Ok(TypeRule {
                    name: r.name.clone(),
                    label_pattern: compile_pattern(&r.label_pattern)?,
                    title_keywords: r.title_keywords.iter().map(|k| k.to_lowercase()).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            bug_label: compile_pattern(&c.bug_label_pattern)?,
            blocked_state: compile_pattern(&c.blocked_state_pattern)?,
            review_state: compile_pattern(&c.review_state_pattern)?,
            type_rules,
            size_buckets: c.size_buckets.clone(),
        })
    }

    pub fn is_bug(&self, labels: &[Label]) -> bool {
        labels.iter().any(|l| self.bug_label.is_match(&l.name))
    }

    /// Issue type: the first rule whose label pattern matches any label,
    /// else the first rule with a keyword among the title's words, else
    /// [`OTHER_TYPE`].
    pub fn classify<'a>(&'a self, issue: &Issue) -> &'a str {
        if let Some(rule) = self
            .type_rules
            .iter()
            .find(|r| issue.labels.iter().any(|l| r.label_pattern.is_match(&l.name)))
        {
            return &rule.name;
        }

        let words: Vec<String> = issue
            .title
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        self.type_rules
            .iter()
            .find(|r| r.title_keywords.iter().any(|k| words.contains(k)))
            .map_or(OTHER_TYPE, |r| r.name.as_str())
    }

    pub fn size_bucket(&self, estimate: Option<f64>) -> &str {
        let Some(estimate) = estimate else {
            return UNESTIMATED;
        };
        self.size_buckets
            .iter()
            .find(|b| b.max_estimate.map_or(true, |max| estimate <= max))
            .or(self.size_buckets.last())
            .map_or(UNESTIMATED, |b| b.name.as_str())
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(pattern)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(title: &str, labels: &[&str]) -> Issue {
        Issue {
            id: "i".into(),
            title: title.into(),
            created_at: "2025-01-01".into(),
            labels: labels.iter().map(|n| Label { name: n.to_string() }).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_from_json_with_defaults() {
        let json = r#"{"teams": {"linear": {"Platform": ["Platform*", "Infra"]}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.teams.unified_names("linear"), vec!["Platform"]);
        assert_eq!(
            config.teams.patterns_for("linear", "Platform"),
            &["Platform*".to_string(), "Infra".to_string()]
        );
        assert!(config.teams.patterns_for("github", "Platform").is_empty());
        assert_eq!(config.classification, Classification::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"classification": {"bug_label_pattern": "(?i)incident"}}"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        let rules = config.compile().unwrap();
        assert!(rules.is_bug(&[Label { name: "Incident".into() }]));
        assert!(!rules.is_bug(&[Label { name: "Bug".into() }]));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let classification = Classification {
            review_state_pattern: "(unclosed".into(),
            ..Default::default()
        };
        let err = Rules::compile(&classification).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_is_bug_default_pattern() {
        let rules = Rules::default();
        assert!(rules.is_bug(&[Label { name: "Bug".into() }]));
        assert!(rules.is_bug(&[Label { name: "type: bug".into() }]));
        assert!(!rules.is_bug(&[Label { name: "Debugging".into() }]));
        assert!(!rules.is_bug(&[]));
    }

    #[test]
    fn test_classify_label_wins_over_title() {
        let rules = Rules::default();
        assert_eq!(rules.classify(&issue("Fix crash on save", &["Feature"])), "Feature");
    }

    #[test]
    fn test_classify_title_fallback_and_other() {
        let rules = Rules::default();
        assert_eq!(rules.classify(&issue("Fix crash on save", &[])), "Bug");
        assert_eq!(rules.classify(&issue("Refactor the parser", &["misc"])), "Chore");
        assert_eq!(rules.classify(&issue("Address feedback", &[])), "Other");
    }

    #[test]
    fn test_size_bucket() {
        let rules = Rules::default();
        assert_eq!(rules.size_bucket(None), UNESTIMATED);
        assert_eq!(rules.size_bucket(Some(1.0)), "XS");
        assert_eq!(rules.size_bucket(Some(3.0)), "M");
        assert_eq!(rules.size_bucket(Some(4.0)), "L");
        assert_eq!(rules.size_bucket(Some(21.0)), "XL");
    }
}
