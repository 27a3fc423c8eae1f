//! Keyword relevancy heuristic.
//!
//! A question is in-domain when its lower-cased text contains any cricket
//! keyword or any alias of a known player. This is the gate used when no
//! model is configured, and the fallback when the model-backed gate fails.

use crate::fallback::KNOWN_PLAYERS;

/// Built-in cricket vocabulary. Matched as lower-case substrings.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "cricket",
    "test",
    "odi",
    "t20",
    "ipl",
    "runs",
    "average",
    "strike rate",
    "century",
    "centuries",
    "hundred",
    "fifty",
    "fifties",
    "duck",
    "batsman",
    "batsmen",
    "batter",
    "batting",
    "innings",
    "match",
    "top",
    "score",
    "player",
    "wicket",
    "bowler",
    "captain",
    "highest",
    "stats",
    "statistic",
    "career",
];

/// Keyword gate over the built-in vocabulary plus configured extras.
#[derive(Debug, Clone, Default)]
pub struct KeywordGate {
    extra: Vec<String>,
}

impl KeywordGate {
    pub fn new<I, S>(extra_keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra = extra_keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { extra }
    }

    /// Pure function of the question text.
    pub fn is_relevant(&self, question: &str) -> bool {
        let q = question.to_lowercase();
        DEFAULT_KEYWORDS.iter().any(|k| q.contains(k))
            || self.extra.iter().any(|k| q.contains(k.as_str()))
            || KNOWN_PLAYERS
                .iter()
                .any(|p| p.aliases.iter().any(|a| q.contains(a)))
    }
}
