//! Schema creation.
//!
//! | Table | Contents |
//! |-------|----------|
//! | `players` | One row per player per format |
//! | `conversations` | Question/answer turns, ordered by `created_at` then `seq` |
//! | `user_summaries` | One running summary per user |
//!
//! Every statement is idempotent, so `init` can be re-run safely.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Connect and create all tables and indexes.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an existing pool.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            country TEXT,
            format TEXT,
            span TEXT,
            matches INTEGER,
            innings INTEGER,
            runs INTEGER,
            highest_score TEXT,
            average REAL,
            strike_rate REAL,
            centuries INTEGER,
            fifties INTEGER,
            ducks INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // `seq` breaks ties between turns written in the same instant.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            format TEXT NOT NULL,
            data_json TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_summaries (
            user_id TEXT PRIMARY KEY,
            summary TEXT NOT NULL,
            conversation_count INTEGER NOT NULL,
            last_updated TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_players_format ON players(format)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_players_name ON players(name)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, created_at, seq)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
