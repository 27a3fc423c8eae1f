//! Storage abstraction for Cricket Q&A.
//!
//! The [`Store`] trait covers everything the pipeline reads or writes:
//! player lookups driven by a [`SanitizedQuery`], player seeding and
//! aggregate stats, and per-user conversation turns and summaries.
//! Backends: [`memory::InMemoryStore`] here, and the SQLite store in the
//! `cricket-qa` crate.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ConversationTurn, PlayerRecord, UserSummary};
use crate::query::{QueryOutcome, SanitizedQuery};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_players`](Store::find_players) | Execute a sanitized find / find-one |
/// | [`insert_players`](Store::insert_players) | Seed player rows |
/// | [`count_players`](Store::count_players) | Number of player rows |
/// | [`sum_runs`](Store::sum_runs) | Total runs across all rows |
/// | [`append_turn`](Store::append_turn) | Persist one conversation turn |
/// | [`list_turns`](Store::list_turns) | All turns for a user, oldest first |
/// | [`recent_turns`](Store::recent_turns) | Newest `limit` turns, oldest first |
/// | [`count_turns`](Store::count_turns) | Turn count for a user |
/// | [`delete_turns`](Store::delete_turns) | Remove specific turns |
/// | [`get_summary`](Store::get_summary) | Read the running summary |
/// | [`upsert_summary`](Store::upsert_summary) | Replace the running summary |
/// | [`clear_user`](Store::clear_user) | Drop all turns and the summary |
#[async_trait]
pub trait Store: Send + Sync {
    /// Run a sanitized query. Find-one ignores the limit; find-many honours
    /// sort then limit. Storage identifiers never appear in the result.
    async fn find_players(&self, query: &SanitizedQuery) -> Result<QueryOutcome>;

    /// Insert player rows, returning how many were written.
    async fn insert_players(&self, players: &[PlayerRecord]) -> Result<usize>;

    async fn count_players(&self) -> Result<i64>;

    async fn sum_runs(&self) -> Result<i64>;

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()>;

    /// All turns for a user in chronological order.
    async fn list_turns(&self, user_id: &str) -> Result<Vec<ConversationTurn>>;

    /// The `limit` most recent turns, returned oldest first.
    async fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;

    async fn count_turns(&self, user_id: &str) -> Result<i64>;

    /// Delete the given turn ids for a user, returning how many were removed.
    async fn delete_turns(&self, user_id: &str, ids: &[String]) -> Result<u64>;

    async fn get_summary(&self, user_id: &str) -> Result<Option<UserSummary>>;

    /// Insert or fully replace the user's summary.
    async fn upsert_summary(&self, summary: &UserSummary) -> Result<()>;

    /// Delete every turn and the summary for a user. Idempotent.
    async fn clear_user(&self, user_id: &str) -> Result<()>;
}
