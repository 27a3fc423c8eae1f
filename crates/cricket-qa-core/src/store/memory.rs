//! In-memory [`Store`] implementation for tests and embedded use.
//!
//! Uses `Vec` and `HashMap` behind `std::sync::RwLock`. Player queries are
//! evaluated with the same [`RecordMatcher`](crate::query::RecordMatcher)
//! and sort rules the SQLite store uses for regex filters.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{ConversationTurn, PlayerRecord, UserSummary};
use crate::query::{QueryKind, QueryOutcome, SanitizedQuery};

use super::Store;

/// In-memory store.
pub struct InMemoryStore {
    players: RwLock<Vec<PlayerRecord>>,
    turns: RwLock<Vec<ConversationTurn>>,
    summaries: RwLock<HashMap<String, UserSummary>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            players: RwLock::new(Vec::new()),
            turns: RwLock::new(Vec::new()),
            summaries: RwLock::new(HashMap::new()),
        }
    }

    /// A store pre-loaded with player rows.
    pub fn with_players(players: Vec<PlayerRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut guard) = store.players.write() {
            *guard = players;
        }
        store
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_players(&self, query: &SanitizedQuery) -> Result<QueryOutcome> {
        let matcher = query.matcher()?;
        let mut hits: Vec<PlayerRecord> = read(&self.players)?
            .iter()
            .filter(|r| matcher.matches(r))
            .cloned()
            .collect();
        query.sort_records(&mut hits);

        Ok(match query.kind() {
            QueryKind::FindOne => QueryOutcome::One(hits.into_iter().next()),
            QueryKind::Find => {
                if let Some(limit) = query.limit() {
                    hits.truncate(limit as usize);
                }
                QueryOutcome::Many(hits)
            }
        })
    }

    async fn insert_players(&self, players: &[PlayerRecord]) -> Result<usize> {
        write(&self.players)?.extend_from_slice(players);
        Ok(players.len())
    }

    async fn count_players(&self) -> Result<i64> {
        Ok(read(&self.players)?.len() as i64)
    }

    async fn sum_runs(&self) -> Result<i64> {
        Ok(read(&self.players)?.iter().filter_map(|r| r.runs).sum())
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        write(&self.turns)?.push(turn.clone());
        Ok(())
    }

    async fn list_turns(&self, user_id: &str) -> Result<Vec<ConversationTurn>> {
        let mut turns: Vec<ConversationTurn> = read(&self.turns)?
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        turns.sort_by_key(|t| t.timestamp);
        Ok(turns)
    }

    async fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let turns = self.list_turns(user_id).await?;
        let skip = turns.len().saturating_sub(limit);
        Ok(turns.into_iter().skip(skip).collect())
    }

    async fn count_turns(&self, user_id: &str) -> Result<i64> {
        Ok(read(&self.turns)?
            .iter()
            .filter(|t| t.user_id == user_id)
            .count() as i64)
    }

    async fn delete_turns(&self, user_id: &str, ids: &[String]) -> Result<u64> {
        let mut turns = write(&self.turns)?;
        let before = turns.len();
        turns.retain(|t| !(t.user_id == user_id && ids.contains(&t.id)));
        Ok((before - turns.len()) as u64)
    }

    async fn get_summary(&self, user_id: &str) -> Result<Option<UserSummary>> {
        Ok(read(&self.summaries)?.get(user_id).cloned())
    }

    async fn upsert_summary(&self, summary: &UserSummary) -> Result<()> {
        write(&self.summaries)?.insert(summary.user_id.clone(), summary.clone());
        Ok(())
    }

    async fn clear_user(&self, user_id: &str) -> Result<()> {
        write(&self.turns)?.retain(|t| t.user_id != user_id);
        write(&self.summaries)?.remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DisplayFormat;
    use crate::query::QueryCandidate;
    use crate::sanitize::sanitize;
    use chrono::Utc;
    use serde_json::json;

    fn player(name: &str, format: &str, runs: i64) -> PlayerRecord {
        PlayerRecord {
            format: Some(format.to_string()),
            runs: Some(runs),
            ..PlayerRecord::named(name)
        }
    }

    fn store() -> InMemoryStore {
        InMemoryStore::with_players(vec![
            player("Virat Kohli", "odi", 13848),
            player("Virat Kohli", "test", 8848),
            player("Babar Azam", "t20", 4145),
            player("Rohit Sharma", "odi", 10866),
            player("Joe Root", "test", 12402),
        ])
    }

    fn query(v: serde_json::Value) -> SanitizedQuery {
        sanitize(&QueryCandidate::from_value(v).unwrap())
    }

    #[tokio::test]
    async fn test_find_sorted_and_limited() {
        let out = store()
            .find_players(&query(json!({ "sort": { "runs": -1 }, "limit": 2 })))
            .await
            .unwrap();
        let QueryOutcome::Many(rows) = out else {
            panic!("expected many");
        };
        let runs: Vec<i64> = rows.iter().filter_map(|r| r.runs).collect();
        assert_eq!(runs, vec![13848, 12402]);
    }

    #[tokio::test]
    async fn test_find_one_ignores_limit() {
        let out = store()
            .find_players(&query(json!({
                "type": "findOne",
                "filter": { "name": { "$regex": "kohli", "$options": "i" }, "format": "TEST" },
                "limit": 10
            })))
            .await
            .unwrap();
        assert_eq!(out, QueryOutcome::One(Some(player("Virat Kohli", "test", 8848))));
    }

    #[tokio::test]
    async fn test_aggregates() {
        let s = store();
        assert_eq!(s.count_players().await.unwrap(), 5);
        assert_eq!(
            s.sum_runs().await.unwrap(),
            13848 + 8848 + 4145 + 10866 + 12402
        );
    }

    #[tokio::test]
    async fn test_turns_per_user() {
        let s = InMemoryStore::new();
        for i in 0..4 {
            s.append_turn(&ConversationTurn::new("u1", format!("q{}", i), "a", DisplayFormat::Text, None))
                .await
                .unwrap();
        }
        s.append_turn(&ConversationTurn::new("u2", "other", "a", DisplayFormat::Text, None))
            .await
            .unwrap();

        assert_eq!(s.count_turns("u1").await.unwrap(), 4);
        let recent = s.recent_turns("u1", 2).await.unwrap();
        let qs: Vec<&str> = recent.iter().map(|t| t.question.as_str()).collect();
        assert_eq!(qs, vec!["q2", "q3"]);

        let all = s.list_turns("u1").await.unwrap();
        let removed = s.delete_turns("u1", &[all[0].id.clone()]).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(s.count_turns("u1").await.unwrap(), 3);

        s.upsert_summary(&UserSummary {
            user_id: "u1".to_string(),
            summary: "talked about kohli".to_string(),
            conversation_count: 4,
            last_updated: Utc::now(),
        })
        .await
        .unwrap();
        s.clear_user("u1").await.unwrap();
        s.clear_user("u1").await.unwrap();
        assert_eq!(s.count_turns("u1").await.unwrap(), 0);
        assert!(s.get_summary("u1").await.unwrap().is_none());
        assert_eq!(s.count_turns("u2").await.unwrap(), 1);
    }
}
