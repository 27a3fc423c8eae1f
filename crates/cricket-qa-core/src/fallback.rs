//! Deterministic question → query mapping used when no model is available
//! or the model's output cannot be used.
//!
//! Rules are tried in order and the first match wins:
//!
//! | # | Rule | Query |
//! |---|------|-------|
//! | 1 | known player + format | `findOne` on that player in that format |
//! | 2 | known player | `find` on that player, runs descending |
//! | 3 | format | `find` in that format, top 5 by the ranking stat |
//! | 4 | default | `find` everything, top 5 by the ranking stat |
//!
//! The ranking stat is `runs` unless the question names another one
//! ("average", "strike rate", "centuries", ...).

use serde::Serialize;
use serde_json::json;

use crate::query::{CricketFormat, Field, QueryCandidate};

/// Number of rows returned by the ranking rules.
pub const FALLBACK_LIMIT: u32 = 5;

/// A player the fallback can recognise without a model.
#[derive(Debug)]
pub struct KnownPlayer {
    /// Name as stored in the player table.
    pub name: &'static str,
    /// Lower-case substrings that identify the player in a question.
    pub aliases: &'static [&'static str],
}

pub const KNOWN_PLAYERS: &[KnownPlayer] = &[
    KnownPlayer {
        name: "Virat Kohli",
        aliases: &["virat kohli", "kohli", "virat"],
    },
    KnownPlayer {
        name: "Babar Azam",
        aliases: &["babar azam", "babar"],
    },
    KnownPlayer {
        name: "Rohit Sharma",
        aliases: &["rohit sharma", "rohit"],
    },
    KnownPlayer {
        name: "Joe Root",
        aliases: &["joe root"],
    },
    KnownPlayer {
        name: "Steve Smith",
        aliases: &["steve smith", "steven smith"],
    },
    KnownPlayer {
        name: "Kane Williamson",
        aliases: &["kane williamson", "williamson"],
    },
    KnownPlayer {
        name: "Sachin Tendulkar",
        aliases: &["sachin tendulkar", "tendulkar", "sachin"],
    },
    KnownPlayer {
        name: "MS Dhoni",
        aliases: &["ms dhoni", "dhoni"],
    },
    KnownPlayer {
        name: "David Warner",
        aliases: &["david warner", "warner"],
    },
    KnownPlayer {
        name: "Jos Buttler",
        aliases: &["jos buttler", "buttler"],
    },
];

/// Which rule produced a fallback query. Recorded in the trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FallbackRule {
    PlayerInFormat { player: String, format: String },
    Player { player: String },
    Format { format: String, rank_by: String },
    Default { rank_by: String },
}

/// Pick the first matching rule for a question.
pub fn match_rule(question: &str) -> FallbackRule {
    let q = question.to_lowercase();
    let player = find_player(&q);
    let format = find_format(&q);

    match (player, format) {
        (Some(p), Some(f)) => FallbackRule::PlayerInFormat {
            player: p.name.to_string(),
            format: f.as_str().to_string(),
        },
        (Some(p), None) => FallbackRule::Player {
            player: p.name.to_string(),
        },
        (None, Some(f)) => FallbackRule::Format {
            format: f.as_str().to_string(),
            rank_by: ranking_field(&q).key().to_string(),
        },
        (None, None) => FallbackRule::Default {
            rank_by: ranking_field(&q).key().to_string(),
        },
    }
}

/// Build the fallback query for a question. Pure; never fails.
pub fn synthesize_fallback(question: &str) -> QueryCandidate {
    rule_query(&match_rule(question))
}

/// The query a rule stands for.
pub fn rule_query(rule: &FallbackRule) -> QueryCandidate {
    let doc = match rule {
        FallbackRule::PlayerInFormat { player, format } => json!({
            "type": "findOne",
            "filter": { "name": name_pattern(player), "format": format },
        }),
        FallbackRule::Player { player } => json!({
            "type": "find",
            "filter": { "name": name_pattern(player) },
            "sort": { "runs": -1 },
        }),
        FallbackRule::Format { format, rank_by } => json!({
            "type": "find",
            "filter": { "format": format },
            "sort": { rank_by.as_str(): -1 },
            "limit": FALLBACK_LIMIT,
        }),
        FallbackRule::Default { rank_by } => json!({
            "type": "find",
            "filter": {},
            "sort": { rank_by.as_str(): -1 },
            "limit": FALLBACK_LIMIT,
        }),
    };
    QueryCandidate::from_value(doc).unwrap_or_default()
}

fn name_pattern(player: &str) -> serde_json::Value {
    json!({ "$regex": regex::escape(player), "$options": "i" })
}

/// First known player with an alias in the (lower-cased) question.
pub fn find_player(q: &str) -> Option<&'static KnownPlayer> {
    KNOWN_PLAYERS
        .iter()
        .find(|p| p.aliases.iter().any(|a| q.contains(a)))
}

/// Format named by a whole word of the question.
///
/// Matched on words rather than substrings so "latest" or "greatest" do
/// not read as Test cricket.
pub fn find_format(q: &str) -> Option<CricketFormat> {
    q.split(|c: char| !c.is_alphanumeric())
        .find_map(|word| match word {
            "test" | "tests" => Some(CricketFormat::Test),
            "odi" | "odis" => Some(CricketFormat::Odi),
            "t20" | "t20i" | "t20s" | "t20is" => Some(CricketFormat::T20),
            _ => None,
        })
}

/// Statistic the question asks to rank by.
fn ranking_field(q: &str) -> Field {
    const RANKINGS: &[(&[&str], Field)] = &[
        (&["strike rate", "strike-rate", "strikerate"], Field::StrikeRate),
        (&["average"], Field::Average),
        (&["fifties", "fifty", "half centur", "half-centur"], Field::Fifties),
        (&["centur", "hundred"], Field::Centuries),
        (&["duck"], Field::Ducks),
        (&["innings"], Field::Innings),
        (&["matches", "appearances", "games"], Field::Matches),
    ];
    RANKINGS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| q.contains(n)))
        .map(|(_, field)| *field)
        .unwrap_or(Field::Runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize;

    #[test]
    fn test_player_and_format_beats_player_alone() {
        for _ in 0..3 {
            assert_eq!(
                match_rule("babar azam t20"),
                FallbackRule::PlayerInFormat {
                    player: "Babar Azam".to_string(),
                    format: "t20".to_string(),
                }
            );
        }
        let q = synthesize_fallback("babar azam t20");
        assert_eq!(q.kind.as_deref(), Some("findOne"));
        assert_eq!(q.filter["format"], "t20");
        assert_eq!(q.filter["name"]["$regex"], "Babar Azam");
    }

    #[test]
    fn test_player_alone() {
        assert_eq!(
            match_rule("How good is Kohli?"),
            FallbackRule::Player {
                player: "Virat Kohli".to_string()
            }
        );
    }

    #[test]
    fn test_format_alone() {
        let rule = match_rule("best ODI batsmen");
        assert_eq!(
            rule,
            FallbackRule::Format {
                format: "odi".to_string(),
                rank_by: "runs".to_string()
            }
        );
        let q = rule_query(&rule);
        assert_eq!(q.limit, Some(json!(5)));
    }

    #[test]
    fn test_latest_is_not_test_format() {
        assert!(find_format("latest greatest stats").is_none());
        assert_eq!(find_format("test runs"), Some(CricketFormat::Test));
        assert_eq!(find_format("t20i averages"), Some(CricketFormat::T20));
    }

    #[test]
    fn test_default_top_scorers() {
        let q = synthesize_fallback("top scorers");
        let s = sanitize(&q);
        assert_eq!(
            s.to_json(),
            json!({ "type": "find", "filter": {}, "sort": { "runs": -1 }, "limit": 5 })
        );
    }

    #[test]
    fn test_ranking_stat_changes_sort() {
        assert_eq!(
            match_rule("highest strike rate in t20"),
            FallbackRule::Format {
                format: "t20".to_string(),
                rank_by: "strikeRate".to_string()
            }
        );
        assert_eq!(
            match_rule("who has the most half centuries"),
            FallbackRule::Default {
                rank_by: "fifties".to_string()
            }
        );
    }

    #[test]
    fn test_fallback_queries_survive_sanitizer() {
        for q in [
            "babar azam t20",
            "kohli",
            "test centuries",
            "anything else",
        ] {
            let candidate = synthesize_fallback(q);
            let sanitized = sanitize(&candidate);
            assert_eq!(
                sanitized.filter().len(),
                candidate.filter.len(),
                "sanitizer dropped a fallback filter for {:?}",
                q
            );
        }
    }
}
