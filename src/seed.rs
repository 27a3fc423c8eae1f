//! Player table seeding from a JSON export.
//!
//! The file is a JSON array of player objects using the same camelCase
//! field names as [`PlayerRecord`]:
//!
//! ```json
//! [{ "name": "Virat Kohli", "country": "IND", "format": "odi", "runs": 13848, "average": 58.07 }]
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};

use cricket_qa_core::models::PlayerRecord;
use cricket_qa_core::query::CricketFormat;
use cricket_qa_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Parse and normalize a player export. Format tags are lower-cased;
/// records with an unknown format or a blank name are rejected.
pub fn parse_players(content: &str) -> Result<Vec<PlayerRecord>> {
    let mut players: Vec<PlayerRecord> =
        serde_json::from_str(content).context("player file must be a JSON array of players")?;

    for (i, p) in players.iter_mut().enumerate() {
        if p.name.trim().is_empty() {
            bail!("player #{} has an empty name", i + 1);
        }
        p.name = p.name.trim().to_string();
        if let Some(raw) = p.format.as_deref() {
            match CricketFormat::parse(raw) {
                Some(f) => p.format = Some(f.as_str().to_string()),
                None => bail!("player '{}' has unknown format '{}'", p.name, raw),
            }
        }
    }

    Ok(players)
}

/// Load players from `path` into the configured database.
pub async fn run_seed(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read player file: {}", path.display()))?;
    let players = parse_players(&content)?;

    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    let store = SqliteStore::new(pool);
    let inserted = store.insert_players(&players).await?;

    println!(
        "Seeded {} players from {} ({} in table)",
        inserted,
        path.display(),
        store.count_players().await?
    );

    store.pool().close().await;
    Ok(())
}
