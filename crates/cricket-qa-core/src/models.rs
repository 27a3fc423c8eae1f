//! Core data models shared by the pipeline, the stores, and the HTTP layer.
//!
//! [`PlayerRecord`] rows are written by ingestion and are read-only to the
//! pipeline. [`ConversationTurn`] and [`UserSummary`] are the per-user memory
//! records owned by the memory manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Career statistics for one player in one format.
///
/// Numeric columns are optional because ingested sheets are not always
/// complete; the formatter renders missing values as `0` / `0.00`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    /// Lower-case format tag: `test`, `odi`, or `t20`.
    #[serde(default)]
    pub format: Option<String>,
    /// Career span, e.g. `"2008-2023"`.
    #[serde(default)]
    pub span: Option<String>,
    #[serde(default)]
    pub matches: Option<i64>,
    #[serde(default)]
    pub innings: Option<i64>,
    #[serde(default)]
    pub runs: Option<i64>,
    /// Highest score as printed, e.g. `"183"` or `"254*"` (not out).
    #[serde(default)]
    pub highest_score: Option<String>,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub strike_rate: Option<f64>,
    #[serde(default)]
    pub centuries: Option<i64>,
    #[serde(default)]
    pub fifties: Option<i64>,
    #[serde(default)]
    pub ducks: Option<i64>,
}

impl PlayerRecord {
    /// A record with only a name set. Handy for seeding and tests.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: None,
            format: None,
            span: None,
            matches: None,
            innings: None,
            runs: None,
            highest_score: None,
            average: None,
            strike_rate: None,
            centuries: None,
            fifties: None,
            ducks: None,
        }
    }
}

/// How an answer is meant to be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayFormat {
    Text,
    Table,
}

impl DisplayFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayFormat::Text => "text",
            DisplayFormat::Table => "table",
        }
    }

    /// Parses a stored format tag. Unknown tags read back as text.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "table" => DisplayFormat::Table,
            _ => DisplayFormat::Text,
        }
    }
}

/// One question/answer exchange for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub id: String,
    pub user_id: String,
    pub question: String,
    /// Literal text answer, or a `"Table with K results"` descriptor.
    pub answer: String,
    pub format: DisplayFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// A fresh turn stamped with a new id and the current time.
    pub fn new(
        user_id: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
        format: DisplayFormat,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            question: question.into(),
            answer: answer.into(),
            format,
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Running summary of a user's compacted conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: String,
    pub summary: String,
    /// Number of turns the user had when the summary was last written.
    pub conversation_count: i64,
    pub last_updated: DateTime<Utc>,
}
