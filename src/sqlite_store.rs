//! SQLite-backed [`Store`] implementation.
//!
//! Sanitized filters are translated into bound SQL predicates. Regex
//! filters cannot be expressed in SQLite without an extension, so when a
//! query carries one the SQL side only applies the other conditions and the
//! ordering, and the regex match plus the row cap happen in Rust afterwards.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use cricket_qa_core::models::{ConversationTurn, DisplayFormat, PlayerRecord, UserSummary};
use cricket_qa_core::query::{
    Condition, Field, QueryKind, QueryOutcome, SanitizedQuery, SortDirection,
};
use cricket_qa_core::store::Store;

const PLAYER_COLUMNS: &str = "name, country, format, span, matches, innings, runs, \
     highest_score, average, strike_rate, centuries, fifties, ducks";

const TURN_COLUMNS: &str = "id, user_id, question, answer, format, data_json, created_at";

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Column backing an allowlisted field.
fn column(field: Field) -> &'static str {
    match field {
        Field::Name => "name",
        Field::Country => "country",
        Field::Format => "format",
        Field::Runs => "runs",
        Field::Average => "average",
        Field::StrikeRate => "strike_rate",
        Field::Matches => "matches",
        Field::Innings => "innings",
        Field::Centuries => "centuries",
        Field::Fifties => "fifties",
        Field::Ducks => "ducks",
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid stored timestamp: {}", raw))?
        .with_timezone(&Utc))
}

fn player_from_row(row: &SqliteRow) -> PlayerRecord {
    PlayerRecord {
        name: row.get("name"),
        country: row.get("country"),
        format: row.get("format"),
        span: row.get("span"),
        matches: row.get("matches"),
        innings: row.get("innings"),
        runs: row.get("runs"),
        highest_score: row.get("highest_score"),
        average: row.get("average"),
        strike_rate: row.get("strike_rate"),
        centuries: row.get("centuries"),
        fifties: row.get("fifties"),
        ducks: row.get("ducks"),
    }
}

fn turn_from_row(row: &SqliteRow) -> Result<ConversationTurn> {
    let format: String = row.get("format");
    let data_json: Option<String> = row.get("data_json");
    let created_at: String = row.get("created_at");
    let data = match data_json {
        Some(raw) => Some(serde_json::from_str(&raw).context("invalid stored turn data")?),
        None => None,
    };

    Ok(ConversationTurn {
        id: row.get("id"),
        user_id: row.get("user_id"),
        question: row.get("question"),
        answer: row.get("answer"),
        format: DisplayFormat::from_tag(&format),
        data,
        timestamp: parse_ts(&created_at)?,
    })
}

/// Build the SELECT for a sanitized query. Regex conditions are skipped and
/// the row cap is only applied in SQL when there are none.
fn build_player_select(query: &SanitizedQuery) -> QueryBuilder<'_, Sqlite> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM players", PLAYER_COLUMNS));

    let mut first = true;
    for (field, cond) in query.filter() {
        let col = column(*field);
        match cond {
            Condition::Pattern(_) => {}
            Condition::Equals(s) => {
                qb.push(if first { " WHERE " } else { " AND " });
                qb.push(col).push(" = ").push_bind(s.as_str());
                first = false;
            }
            Condition::Format(f) => {
                qb.push(if first { " WHERE " } else { " AND " });
                qb.push("LOWER(REPLACE(")
                    .push(col)
                    .push(", ' ', '')) = ")
                    .push_bind(f.as_str());
                first = false;
            }
            Condition::Number(n) => {
                qb.push(if first { " WHERE " } else { " AND " });
                qb.push(col).push(" = ").push_bind(*n);
                first = false;
            }
            Condition::Compare(cmps) => {
                for c in cmps {
                    qb.push(if first { " WHERE " } else { " AND " });
                    qb.push(col)
                        .push(" ")
                        .push(c.op.sql())
                        .push(" ")
                        .push_bind(c.value);
                    first = false;
                }
            }
        }
    }

    // SQLite orders NULL lowest, which matches the in-memory store.
    qb.push(" ORDER BY ");
    for key in query.sort() {
        qb.push(column(key.field));
        qb.push(match key.direction {
            SortDirection::Ascending => " ASC, ",
            SortDirection::Descending => " DESC, ",
        });
    }
    qb.push("id ASC");

    if !query.has_patterns() {
        if let Some(limit) = query.effective_limit() {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }
    }

    qb
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_players(&self, query: &SanitizedQuery) -> Result<QueryOutcome> {
        let matcher = query.matcher()?;
        let mut qb = build_player_select(query);
        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut hits: Vec<PlayerRecord> = rows
            .iter()
            .map(player_from_row)
            .filter(|r| matcher.matches(r))
            .collect();
        if let Some(limit) = query.effective_limit() {
            hits.truncate(limit as usize);
        }

        Ok(match query.kind() {
            QueryKind::FindOne => QueryOutcome::One(hits.into_iter().next()),
            QueryKind::Find => QueryOutcome::Many(hits),
        })
    }

    async fn insert_players(&self, players: &[PlayerRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for p in players {
            sqlx::query(
                r#"
                INSERT INTO players (name, country, format, span, matches, innings, runs,
                                     highest_score, average, strike_rate, centuries, fifties, ducks)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&p.name)
            .bind(&p.country)
            .bind(p.format.as_deref().map(str::to_lowercase))
            .bind(&p.span)
            .bind(p.matches)
            .bind(p.innings)
            .bind(p.runs)
            .bind(&p.highest_score)
            .bind(p.average)
            .bind(p.strike_rate)
            .bind(p.centuries)
            .bind(p.fifties)
            .bind(p.ducks)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(players.len())
    }

    async fn count_players(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM players")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn sum_runs(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(runs), 0) FROM players")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let data_json = turn
            .data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, question, answer, format, data_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&turn.id)
        .bind(&turn.user_id)
        .bind(&turn.question)
        .bind(&turn.answer)
        .bind(turn.format.as_str())
        .bind(data_json)
        .bind(format_ts(&turn.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_turns(&self, user_id: &str) -> Result<Vec<ConversationTurn>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversations WHERE user_id = ? ORDER BY created_at ASC, seq ASC",
            TURN_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(turn_from_row).collect()
    }

    async fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversations WHERE user_id = ? \
             ORDER BY created_at DESC, seq DESC LIMIT ?",
            TURN_COLUMNS
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut turns = rows
            .iter()
            .map(turn_from_row)
            .collect::<Result<Vec<_>>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn count_turns(&self, user_id: &str) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn delete_turns(&self, user_id: &str, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM conversations WHERE user_id = ");
        qb.push_bind(user_id);
        qb.push(" AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn get_summary(&self, user_id: &str) -> Result<Option<UserSummary>> {
        let row = sqlx::query(
            "SELECT user_id, summary, conversation_count, last_updated FROM user_summaries WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let last_updated: String = row.get("last_updated");
                Ok(Some(UserSummary {
                    user_id: row.get("user_id"),
                    summary: row.get("summary"),
                    conversation_count: row.get("conversation_count"),
                    last_updated: parse_ts(&last_updated)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert_summary(&self, summary: &UserSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_summaries (user_id, summary, conversation_count, last_updated)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                summary = excluded.summary,
                conversation_count = excluded.conversation_count,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&summary.user_id)
        .bind(&summary.summary)
        .bind(summary.conversation_count)
        .bind(format_ts(&summary.last_updated))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_user(&self, user_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM conversations WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_summaries WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
