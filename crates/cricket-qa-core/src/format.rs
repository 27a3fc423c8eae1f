//! Turns executor output into a display-ready answer.
//!
//! - nothing found → the fixed [`NO_DATA_MESSAGE`] text
//! - one record → a single descriptive sentence
//! - several records → table rows, in executor order
//!
//! Missing numbers render as `0` or `0.00`, never empty.

use serde::{Deserialize, Serialize};

use crate::models::{DisplayFormat, PlayerRecord};
use crate::query::QueryOutcome;

pub const NO_DATA_MESSAGE: &str = "No data found for your query.";

/// One row of a multi-record answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Format")]
    pub format: String,
    #[serde(rename = "Runs")]
    pub runs: i64,
    #[serde(rename = "Average")]
    pub average: String,
    #[serde(rename = "Strike Rate")]
    pub strike_rate: String,
    #[serde(rename = "Highest Score")]
    pub highest_score: String,
    #[serde(rename = "Matches")]
    pub matches: i64,
}

impl TableRow {
    pub fn from_record(r: &PlayerRecord) -> Self {
        Self {
            name: r.name.clone(),
            country: r.country.clone().unwrap_or_default(),
            format: format_tag(r),
            runs: r.runs.unwrap_or(0),
            average: two_dp(r.average),
            strike_rate: two_dp(r.strike_rate),
            highest_score: highest_score(r),
            matches: r.matches.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerData {
    Text(String),
    Table(Vec<TableRow>),
}

/// A formatted answer: display hint plus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub format: DisplayFormat,
    pub data: AnswerData,
}

impl Answer {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            format: DisplayFormat::Text,
            data: AnswerData::Text(text.into()),
        }
    }

    pub fn table(rows: Vec<TableRow>) -> Self {
        Self {
            format: DisplayFormat::Table,
            data: AnswerData::Table(rows),
        }
    }

    /// What conversation memory keeps for this answer: the text itself, or
    /// a size descriptor for tables.
    pub fn memory_text(&self) -> String {
        match &self.data {
            AnswerData::Text(t) => t.clone(),
            AnswerData::Table(rows) => format!("Table with {} results", rows.len()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            AnswerData::Text(t) => Some(t),
            AnswerData::Table(_) => None,
        }
    }

    pub fn data_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.data).unwrap_or(serde_json::Value::Null)
    }
}

/// Format executor output. Row order is preserved exactly.
pub fn format_answer(outcome: &QueryOutcome) -> Answer {
    match outcome {
        QueryOutcome::One(None) => Answer::text(NO_DATA_MESSAGE),
        QueryOutcome::One(Some(record)) => Answer::text(describe_player(record)),
        QueryOutcome::Many(records) => match records.as_slice() {
            [] => Answer::text(NO_DATA_MESSAGE),
            [record] => Answer::text(describe_player(record)),
            _ => Answer::table(records.iter().map(TableRow::from_record).collect()),
        },
    }
}

/// Single-record sentence, e.g.
/// `Virat Kohli (IND) - Format: ODI, Runs: 13848, Average: 58.07, Highest Score: 183, Strike Rate: 93.35`.
pub fn describe_player(r: &PlayerRecord) -> String {
    format!(
        "{} ({}) - Format: {}, Runs: {}, Average: {}, Highest Score: {}, Strike Rate: {}",
        r.name,
        r.country.as_deref().unwrap_or("Unknown"),
        format_tag(r),
        r.runs.unwrap_or(0),
        two_dp(r.average),
        highest_score(r),
        two_dp(r.strike_rate),
    )
}

fn format_tag(r: &PlayerRecord) -> String {
    r.format
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| "ALL".to_string())
}

fn highest_score(r: &PlayerRecord) -> String {
    r.highest_score
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("0")
        .to_string()
}

fn two_dp(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{:.2}", x),
        _ => "0.00".to_string(),
    }
}
