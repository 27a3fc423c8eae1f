//! Relevancy gate.
//!
//! With a model configured the question is classified by the model, which
//! must answer exactly `true` or `false`. Any model failure falls back to the
//! keyword heuristic, so the gate itself never fails.

use serde_json::json;

use cricket_qa_core::relevancy::KeywordGate;
use cricket_qa_core::trace::Trace;

use crate::llm::ModelClient;

pub struct RelevancyGate {
    keywords: KeywordGate,
    model: Option<ModelClient>,
}

impl RelevancyGate {
    pub fn new(keywords: KeywordGate, model: Option<ModelClient>) -> Self {
        Self { keywords, model }
    }

    /// Decide whether `question` is about cricket statistics and record one
    /// trace step naming the strategy that decided.
    pub async fn is_relevant(&self, question: &str, trace: &mut Trace) -> bool {
        let Some(model) = &self.model else {
            let relevant = self.keywords.is_relevant(question);
            trace.record(
                "Relevancy check (heuristic)",
                false,
                json!({ "question": question }),
                json!({ "relevant": relevant }),
            );
            return relevant;
        };

        match model.complete(&relevancy_prompt(question)).await {
            Ok(raw) => {
                let relevant = raw.trim().to_lowercase() == "true";
                trace.record(
                    "Relevancy check (model)",
                    true,
                    json!({ "question": question }),
                    json!({ "relevant": relevant, "raw": raw }),
                );
                relevant
            }
            Err(e) => {
                tracing::warn!(error = %e, "relevancy model call failed; using keyword heuristic");
                let relevant = self.keywords.is_relevant(question);
                trace.record(
                    "Relevancy check (heuristic fallback)",
                    true,
                    json!({ "question": question }),
                    json!({ "relevant": relevant, "error": e.to_string() }),
                );
                relevant
            }
        }
    }
}

pub fn relevancy_prompt(question: &str) -> String {
    format!(
        "You are a classifier for a cricket statistics assistant.\n\
         Decide whether the question below asks about cricket players, matches, \
         formats or batting statistics.\n\
         Respond with exactly one word: true or false.\n\n\
         Question: {}",
        question
    )
}
