//! Query synthesis: question + memory → [`QueryCandidate`].
//!
//! The model is asked for a strict JSON query document. Its output goes
//! through [`parse_json_object`] and [`QueryCandidate::from_value`]; any
//! failure along the way (timeout, transport error, no object, bad JSON)
//! is handled here by switching to the deterministic rules in
//! [`cricket_qa_core::fallback`]. There is exactly one model attempt.

use serde_json::json;

use cricket_qa_core::fallback::{match_rule, rule_query};
use cricket_qa_core::json::parse_json_object;
use cricket_qa_core::query::{Field, QueryCandidate};
use cricket_qa_core::trace::Trace;

use crate::llm::ModelClient;

pub struct QuerySynthesizer {
    model: Option<ModelClient>,
}

impl QuerySynthesizer {
    pub fn new(model: Option<ModelClient>) -> Self {
        Self { model }
    }

    /// Produce an untrusted query candidate and record one trace step.
    pub async fn synthesize(
        &self,
        question: &str,
        memory_context: &str,
        trace: &mut Trace,
    ) -> QueryCandidate {
        let Some(model) = &self.model else {
            return fallback(question, false, None, trace);
        };

        let prompt = synthesis_prompt(question, memory_context);
        let raw = match model.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "query synthesis model call failed; using fallback");
                return fallback(question, true, Some(e.to_string()), trace);
            }
        };

        let candidate = parse_json_object(&raw)
            .ok()
            .and_then(QueryCandidate::from_value);
        match candidate {
            Some(candidate) => {
                trace.record(
                    "Query synthesis (model)",
                    true,
                    json!({ "question": question, "memory": memory_context }),
                    candidate.to_json(),
                );
                candidate
            }
            None => {
                tracing::warn!(raw = %raw, "model output is not a JSON query; using fallback");
                fallback(
                    question,
                    true,
                    Some("model output is not a JSON object".to_string()),
                    trace,
                )
            }
        }
    }
}

fn fallback(
    question: &str,
    used_model: bool,
    error: Option<String>,
    trace: &mut Trace,
) -> QueryCandidate {
    let rule = match_rule(question);
    let candidate = rule_query(&rule);
    trace.record(
        "Query synthesis (fallback)",
        used_model,
        json!({ "question": question, "modelError": error }),
        json!({ "rule": rule, "query": candidate.to_json() }),
    );
    candidate
}

/// Prompt asking for a single JSON query document.
pub fn synthesis_prompt(question: &str, memory_context: &str) -> String {
    let fields: Vec<&str> = Field::ALL.iter().map(|f| f.key()).collect();
    let memory = if memory_context.trim().is_empty() {
        "(none)"
    } else {
        memory_context
    };

    format!(
        r#"You translate cricket statistics questions into a JSON query over a collection of player records.

Allowed fields: {fields}
The "format" field is one of "test", "odi", "t20".
Text fields may use {{"$regex": "...", "$options": "i"}}. Numeric fields may use $eq, $ne, $gt, $gte, $lt, $lte.

Respond with ONLY a JSON object of this shape, no prose:
{{"type": "find" | "findOne", "filter": {{...}}, "sort": {{"<field>": 1 | -1}}, "limit": <number>}}

Examples:
Q: Top 5 run scorers in ODIs
A: {{"type": "find", "filter": {{"format": "odi"}}, "sort": {{"runs": -1}}, "limit": 5}}
Q: Virat Kohli's Test stats
A: {{"type": "findOne", "filter": {{"name": {{"$regex": "Virat Kohli", "$options": "i"}}, "format": "test"}}}}
Q: Players with an average above 50 in T20
A: {{"type": "find", "filter": {{"format": "t20", "average": {{"$gt": 50}}}}, "sort": {{"average": -1}}, "limit": 10}}

Conversation so far:
{memory}

Question: {question}"#,
        fields = fields.join(", "),
        memory = memory,
        question = question,
    )
}
