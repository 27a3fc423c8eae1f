//! The question → answer pipeline.
//!
//! ```text
//! question ─▶ relevancy gate ─▶ memory retrieve ─▶ synthesize ─▶ sanitize
//!                 │                                                  │
//!              reject                                             execute
//!                 │                                                  │
//!                 ▼                                                  ▼
//!            memory save ◀────────── narrate? ◀──────────────── format
//! ```
//!
//! Every stage appends one step to the request's [`Trace`]. [`QaService::ask`]
//! never returns an error: model problems are absorbed by the stages, and
//! the remaining failures (store errors while executing, narration without
//! fallback) come back as `success: false` with the trace collected so far.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use cricket_qa_core::format::{format_answer, Answer, AnswerData};
use cricket_qa_core::models::DisplayFormat;
use cricket_qa_core::query::QueryOutcome;
use cricket_qa_core::relevancy::KeywordGate;
use cricket_qa_core::sanitize::sanitize;
use cricket_qa_core::store::Store;
use cricket_qa_core::trace::Trace;

use crate::config::{AnswerConfig, Config};
use crate::db;
use crate::gate::RelevancyGate;
use crate::llm::{create_model, ModelClient};
use crate::memory::{MemoryManager, SaveOutcome};
use crate::migrate;
use crate::sqlite_store::SqliteStore;
use crate::synth::QuerySynthesizer;

/// Answer for off-topic questions.
pub const REJECTION_MESSAGE: &str = "I can only answer questions about cricket statistics.";

/// Result of one `ask`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<DisplayFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AnswerData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub trace: Trace,
}

impl AskResponse {
    fn answered(answer: Answer, trace: Trace) -> Self {
        Self {
            success: true,
            format: Some(answer.format),
            data: Some(answer.data),
            message: None,
            trace,
        }
    }

    fn failed(message: impl Into<String>, trace: Trace) -> Self {
        Self {
            success: false,
            format: None,
            data: None,
            message: Some(message.into()),
            trace,
        }
    }
}

pub struct QaService {
    store: Arc<dyn Store>,
    gate: RelevancyGate,
    synth: QuerySynthesizer,
    memory: MemoryManager,
    narrator: Option<ModelClient>,
    answer: AnswerConfig,
}

impl QaService {
    /// Wire the pipeline over an existing store and (optional) model.
    pub fn new(config: &Config, store: Arc<dyn Store>, model: Option<ModelClient>) -> Self {
        let narrator = if config.answer.narrate {
            model.clone()
        } else {
            None
        };

        Self {
            gate: RelevancyGate::new(
                KeywordGate::new(&config.relevancy.extra_keywords),
                model.clone(),
            ),
            synth: QuerySynthesizer::new(model.clone()),
            memory: MemoryManager::new(store.clone(), model, config.memory.clone()),
            store,
            narrator,
            answer: config.answer.clone(),
        }
    }

    /// Open the SQLite database (migrating it if needed) and build the
    /// configured model.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate(&pool).await?;
        let model = create_model(&config.model)?;
        Ok(Self::new(config, Arc::new(SqliteStore::new(pool)), model))
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Run one question through the pipeline.
    pub async fn ask(&self, question: &str, user_id: &str) -> AskResponse {
        let question = question.trim();
        let mut trace = Trace::new();

        if !self.gate.is_relevant(question, &mut trace).await {
            tracing::info!(user_id, "question rejected as off-topic");
            self.save_turn(user_id, question, &Answer::text(REJECTION_MESSAGE), &mut trace)
                .await;
            return AskResponse::failed(REJECTION_MESSAGE, trace);
        }

        let context = self.memory.retrieve(user_id).await;
        trace.record(
            "Memory retrieval",
            false,
            json!({ "userId": user_id }),
            json!({ "context": context }),
        );

        let candidate = self.synth.synthesize(question, &context, &mut trace).await;

        let query = sanitize(&candidate);
        trace.record(
            "Query sanitization",
            false,
            candidate.to_json(),
            query.to_json(),
        );

        let outcome = match self.store.find_players(&query).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(user_id, error = %e, "query execution failed");
                trace.record(
                    "Query execution",
                    false,
                    query.to_json(),
                    json!({ "error": e.to_string() }),
                );
                return AskResponse::failed(format!("Failed to execute query: {}", e), trace);
            }
        };
        trace.record(
            "Query execution",
            false,
            query.to_json(),
            json!({ "count": outcome.len() }),
        );

        let mut answer = format_answer(&outcome);
        trace.record(
            "Answer formatting",
            false,
            json!({ "count": outcome.len() }),
            json!({ "format": answer.format, "data": answer.data }),
        );

        if let Some(model) = &self.narrator {
            if let Some(sentence) = single_record_text(&outcome, &answer) {
                match model.complete(&narration_prompt(question, &sentence)).await {
                    Ok(text) if !text.trim().is_empty() => {
                        trace.record(
                            "Answer narration",
                            true,
                            json!({ "text": sentence }),
                            json!({ "text": text.trim() }),
                        );
                        answer = Answer::text(text.trim());
                    }
                    result => {
                        let error = match result {
                            Err(e) => e.to_string(),
                            Ok(_) => "model returned an empty narration".to_string(),
                        };
                        tracing::warn!(user_id, error = %error, "answer narration failed");
                        trace.record(
                            "Answer narration (fallback)",
                            true,
                            json!({ "text": sentence }),
                            json!({ "error": error }),
                        );
                        if !self.answer.narrate_fallback {
                            return AskResponse::failed(
                                format!("Failed to generate answer: {}", error),
                                trace,
                            );
                        }
                    }
                }
            }
        }

        self.save_turn(user_id, question, &answer, &mut trace).await;
        AskResponse::answered(answer, trace)
    }

    async fn save_turn(&self, user_id: &str, question: &str, answer: &Answer, trace: &mut Trace) {
        let (saved, outcome) = match self.memory.save(user_id, question, answer).await {
            Ok(outcome) => (true, outcome),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "failed to save conversation turn");
                (false, SaveOutcome::default())
            }
        };
        trace.record(
            "Memory save",
            outcome.used_model,
            json!({ "userId": user_id, "answer": answer.memory_text() }),
            json!({ "saved": saved, "compacted": outcome.compacted }),
        );
    }
}

/// The sentence to narrate, when the answer describes exactly one record.
fn single_record_text(outcome: &QueryOutcome, answer: &Answer) -> Option<String> {
    if outcome.len() != 1 {
        return None;
    }
    answer.as_text().map(str::to_string)
}

fn narration_prompt(question: &str, sentence: &str) -> String {
    format!(
        "Rewrite these cricket statistics as one or two friendly sentences answering the \
         question. Do not add or change any numbers.\n\nQuestion: {}\nStatistics: {}",
        question, sentence
    )
}
