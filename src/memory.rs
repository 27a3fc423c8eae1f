//! Per-user conversation memory.
//!
//! Turns are appended after every answered (or rejected) question. Once a
//! user has more than `compaction_threshold` turns, everything except the
//! newest `keep_recent` is folded into a model-written summary and deleted.
//! Compaction needs a model; without one, history simply grows.
//!
//! Memory is advisory: read failures produce an empty context, and neither
//! save nor compaction failures ever fail a request.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use cricket_qa_core::format::{Answer, AnswerData};
use cricket_qa_core::models::{ConversationTurn, UserSummary};
use cricket_qa_core::store::Store;

use crate::config::MemoryConfig;
use crate::llm::ModelClient;

/// What happened to the conversation after a turn was stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Older turns were folded into the summary and removed.
    pub compacted: bool,
    /// The summarization prompt was sent, whether or not it succeeded.
    pub used_model: bool,
}

pub struct MemoryManager {
    store: Arc<dyn Store>,
    model: Option<ModelClient>,
    config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(store: Arc<dyn Store>, model: Option<ModelClient>, config: MemoryConfig) -> Self {
        Self {
            store,
            model,
            config,
        }
    }

    /// Context block for the synthesis prompt: summary first, then the most
    /// recent turns oldest first. Empty on any read failure.
    pub async fn retrieve(&self, user_id: &str) -> String {
        match self.render_context(user_id).await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "memory retrieval failed; using empty context");
                String::new()
            }
        }
    }

    async fn render_context(&self, user_id: &str) -> Result<String> {
        let summary = self.store.get_summary(user_id).await?;
        let turns = self
            .store
            .recent_turns(user_id, self.config.recent_turns)
            .await?;

        let mut parts = Vec::new();
        if let Some(s) = summary {
            if !s.summary.trim().is_empty() {
                parts.push(format!("Summary of earlier conversation: {}", s.summary.trim()));
            }
        }
        if !turns.is_empty() {
            parts.push(render_turns(&turns));
        }
        Ok(parts.join("\n\n"))
    }

    /// Append a turn, then compact if the user is over the threshold.
    ///
    /// Only the append can fail; compaction problems are logged and show up
    /// as `compacted: false`.
    pub async fn save(&self, user_id: &str, question: &str, answer: &Answer) -> Result<SaveOutcome> {
        let data = match &answer.data {
            AnswerData::Table(_) => Some(answer.data_json()),
            AnswerData::Text(_) => None,
        };
        let turn = ConversationTurn::new(user_id, question, answer.memory_text(), answer.format, data);
        self.store.append_turn(&turn).await?;

        let mut used_model = false;
        let compacted = match self.run_compaction(user_id, &mut used_model).await {
            Ok(summary) => summary.is_some(),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "memory compaction failed");
                false
            }
        };
        Ok(SaveOutcome {
            compacted,
            used_model,
        })
    }

    /// Summarize and delete all but the newest turns once the user is over
    /// the threshold. Returns the new summary when compaction ran.
    pub async fn compact(&self, user_id: &str) -> Result<Option<UserSummary>> {
        let mut used_model = false;
        self.run_compaction(user_id, &mut used_model).await
    }

    async fn run_compaction(
        &self,
        user_id: &str,
        used_model: &mut bool,
    ) -> Result<Option<UserSummary>> {
        let Some(model) = &self.model else {
            return Ok(None);
        };

        let count = self.store.count_turns(user_id).await?;
        if count <= self.config.compaction_threshold as i64 {
            return Ok(None);
        }

        let turns = self.store.list_turns(user_id).await?;
        let cut = turns.len().saturating_sub(self.config.keep_recent);
        let older = &turns[..cut];
        if older.is_empty() {
            return Ok(None);
        }

        let prior = self.store.get_summary(user_id).await?;
        let prompt = summary_prompt(
            prior.as_ref().map(|s| s.summary.as_str()),
            older,
            self.config.summary_max_words,
        );
        *used_model = true;
        let raw = model.complete(&prompt).await?;
        let text = truncate_words(raw.trim(), self.config.summary_max_words);
        if text.is_empty() {
            anyhow::bail!("model returned an empty summary");
        }

        let summary = UserSummary {
            user_id: user_id.to_string(),
            summary: text,
            conversation_count: count,
            last_updated: Utc::now(),
        };
        self.store.upsert_summary(&summary).await?;

        let ids: Vec<String> = older.iter().map(|t| t.id.clone()).collect();
        let removed = self.store.delete_turns(user_id, &ids).await?;
        tracing::info!(user_id, summarized = ids.len(), removed, "compacted conversation memory");

        Ok(Some(summary))
    }

    /// The newest `limit` turns, oldest first.
    pub async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        self.store.recent_turns(user_id, limit).await
    }

    pub async fn summary(&self, user_id: &str) -> Result<Option<UserSummary>> {
        self.store.get_summary(user_id).await
    }

    pub async fn clear(&self, user_id: &str) -> Result<()> {
        self.store.clear_user(user_id).await
    }
}

/// `N. User: <q>\n   Bot: <a>` lines, numbered from 1.
pub fn render_turns(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. User: {}\n   Bot: {}", i + 1, t.question, t.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn summary_prompt(prior: Option<&str>, turns: &[ConversationTurn], max_words: usize) -> String {
    let mut prompt = format!(
        "Summarize the following conversation between a user and a cricket statistics assistant \
         in at most {} words. Keep player names, formats and statistics the user cared about.\n\n",
        max_words
    );
    if let Some(prior) = prior.filter(|p| !p.trim().is_empty()) {
        prompt.push_str("Previous summary:\n");
        prompt.push_str(prior.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str("Conversation:\n");
    prompt.push_str(&render_turns(turns));
    prompt
}

fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}
