//! Database statistics.
//!
//! Used by `cricq stats` to confirm that player data is loaded and to show
//! how much conversation memory is being kept.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use cricket_qa_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Counts shown by `cricq stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStats {
    pub players: i64,
    pub total_runs: i64,
    pub turns: i64,
    pub users: i64,
    pub summaries: i64,
    pub by_format: Vec<FormatStats>,
}

/// Per-format player breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatStats {
    pub format: String,
    pub players: i64,
    pub runs: i64,
}

/// Gather player and memory counts from the store.
pub async fn collect_stats(store: &SqliteStore) -> Result<DbStats> {
    let pool = store.pool();

    let turns: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
        .fetch_one(pool)
        .await?;
    let users: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM conversations")
        .fetch_one(pool)
        .await?;
    let summaries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_summaries")
        .fetch_one(pool)
        .await?;

    Ok(DbStats {
        players: store.count_players().await?,
        total_runs: store.sum_runs().await?,
        turns,
        users,
        summaries,
        by_format: format_breakdown(pool).await?,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    let store = SqliteStore::new(pool);
    let stats = collect_stats(&store).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Cricket Q&A Database Stats");
    println!("==========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Players:     {}", stats.players);
    println!("  Total runs:  {}", stats.total_runs);
    println!("  Turns:       {} across {} users", stats.turns, stats.users);
    println!("  Summaries:   {}", stats.summaries);

    if !stats.by_format.is_empty() {
        println!();
        println!("  By format:");
        println!("  {:<10} {:>8} {:>12}", "FORMAT", "PLAYERS", "RUNS");
        println!("  {}", "-".repeat(32));
        for f in &stats.by_format {
            println!("  {:<10} {:>8} {:>12}", f.format, f.players, f.runs);
        }
    }

    println!();

    store.pool().close().await;
    Ok(())
}

async fn format_breakdown(pool: &SqlitePool) -> Result<Vec<FormatStats>> {
    let rows = sqlx::query(
        r#"
        SELECT
            COALESCE(format, '-') AS format,
            COUNT(*) AS players,
            COALESCE(SUM(runs), 0) AS runs
        FROM players
        GROUP BY format
        ORDER BY runs DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| FormatStats {
            format: row.get::<String, _>("format").to_uppercase(),
            players: row.get("players"),
            runs: row.get("runs"),
        })
        .collect())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
