//! Candidate selection policy for the dispatcher.
//!
//! Controls how the user text and use case name narrow the stored parameter
//! sets before perplexity ranking.

use gptoolkit_db::{ParameterFilter, TextMatch};
use serde::{Deserialize, Serialize};

/// How one input is compared against its stored column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPolicy {
    /// Do not filter on this column
    Ignore,
    /// Case-insensitive substring match
    #[default]
    Substring,
    /// Case-sensitive equality
    Exact,
}

impl TextPolicy {
    fn to_match(self, value: &str) -> Option<TextMatch> {
        match self {
            TextPolicy::Ignore => None,
            TextPolicy::Substring => Some(TextMatch::Contains(value.to_string())),
            TextPolicy::Exact => Some(TextMatch::Exact(value.to_string())),
        }
    }
}

impl std::fmt::Display for TextPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextPolicy::Ignore => write!(f, "ignore"),
            TextPolicy::Substring => write!(f, "substring"),
            TextPolicy::Exact => write!(f, "exact"),
        }
    }
}

impl std::str::FromStr for TextPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ignore" | "none" => Ok(TextPolicy::Ignore),
            "substring" | "contains" => Ok(TextPolicy::Substring),
            "exact" => Ok(TextPolicy::Exact),
            _ => Err(format!("Unknown match policy: {}", s)),
        }
    }
}

/// Which stored rows compete for a completion.
///
/// The default lets every prompt of a matching use case compete, so the user
/// text only influences the perplexity ranking. [`MatchPolicy::legacy`]
/// additionally requires the stored prompt text to contain the user text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchPolicy {
    #[serde(default = "default_prompt_policy")]
    pub prompt: TextPolicy,
    #[serde(default)]
    pub use_case: TextPolicy,
}

fn default_prompt_policy() -> TextPolicy {
    TextPolicy::Ignore
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            prompt: TextPolicy::Ignore,
            use_case: TextPolicy::Substring,
        }
    }
}

impl MatchPolicy {
    /// Substring match on both prompt text and use case name.
    pub fn legacy() -> Self {
        Self {
            prompt: TextPolicy::Substring,
            use_case: TextPolicy::Substring,
        }
    }

    /// Exact use case name, prompt text ignored.
    pub fn strict() -> Self {
        Self {
            prompt: TextPolicy::Ignore,
            use_case: TextPolicy::Exact,
        }
    }

    /// Store filter for one dispatch.
    pub fn filter(&self, user_text: &str, use_case_name: &str) -> ParameterFilter {
        ParameterFilter {
            prompt_text: self.prompt.to_match(user_text),
            engine_name: None,
            use_case_name: self.use_case.to_match(use_case_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_ignores_prompt() {
        let filter = MatchPolicy::default().filter("hello", "chat");
        assert_eq!(filter.prompt_text, None);
        assert_eq!(filter.engine_name, None);
        assert_eq!(
            filter.use_case_name,
            Some(TextMatch::Contains("chat".to_string()))
        );
    }

    #[test]
    fn test_legacy_filter_matches_both() {
        let filter = MatchPolicy::legacy().filter("hello", "chat");
        assert_eq!(
            filter.prompt_text,
            Some(TextMatch::Contains("hello".to_string()))
        );
        assert_eq!(
            filter.use_case_name,
            Some(TextMatch::Contains("chat".to_string()))
        );
    }

    #[test]
    fn test_strict_filter() {
        let filter = MatchPolicy::strict().filter("hello", "chat");
        assert_eq!(filter.prompt_text, None);
        assert_eq!(
            filter.use_case_name,
            Some(TextMatch::Exact("chat".to_string()))
        );
    }

    #[test]
    fn test_parse_and_display() {
        for policy in [TextPolicy::Ignore, TextPolicy::Substring, TextPolicy::Exact] {
            assert_eq!(policy.to_string().parse::<TextPolicy>().unwrap(), policy);
        }
        assert_eq!("CONTAINS".parse::<TextPolicy>().unwrap(), TextPolicy::Substring);
        assert!("fuzzy".parse::<TextPolicy>().is_err());
    }

    #[test]
    fn test_deserialize_partial_table() {
        let policy: MatchPolicy = toml::from_str(r#"use_case = "exact""#).unwrap();
        assert_eq!(policy, MatchPolicy::strict());

        let policy: MatchPolicy = toml::from_str("").unwrap();
        assert_eq!(policy, MatchPolicy::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<MatchPolicy, _> = toml::from_str(r#"promt = "exact""#);
        assert!(result.is_err());
    }
}
