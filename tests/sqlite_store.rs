//! SQLite store tests against a temporary database file.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;

use cricket_qa::config::Config;
use cricket_qa::db;
use cricket_qa::migrate;
use cricket_qa::pipeline::QaService;
use cricket_qa::sqlite_store::SqliteStore;
use cricket_qa::stats::{self, FormatStats};
use cricket_qa_core::format::AnswerData;
use cricket_qa_core::models::{ConversationTurn, DisplayFormat, PlayerRecord, UserSummary};
use cricket_qa_core::query::{QueryCandidate, QueryOutcome, SanitizedQuery};
use cricket_qa_core::sanitize::sanitize;
use cricket_qa_core::store::Store;

fn player(name: &str, country: &str, format: &str, runs: Option<i64>, average: f64) -> PlayerRecord {
    PlayerRecord {
        country: Some(country.to_string()),
        format: Some(format.to_string()),
        runs,
        average: Some(average),
        ..PlayerRecord::named(name)
    }
}

async fn setup() -> (TempDir, Config, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("data").join("cricket.sqlite"));
    migrate::run_migrations(&config).await.unwrap();
    // Running twice must be harmless.
    migrate::run_migrations(&config).await.unwrap();

    let pool = db::connect(&config).await.unwrap();
    let store = SqliteStore::new(pool);
    store
        .insert_players(&[
            player("Virat Kohli", "IND", "odi", Some(13848), 58.07),
            player("Virat Kohli", "IND", "test", Some(8848), 49.15),
            player("Babar Azam", "PAK", "T20", Some(4145), 41.03),
            player("Rohit Sharma", "IND", "odi", Some(10866), 49.12),
            player("Joe Root", "ENG", "test", Some(12402), 50.62),
            player("Unknown Opener", "ENG", "odi", None, 0.0),
        ])
        .await
        .unwrap();
    (tmp, config, store)
}

fn query(v: serde_json::Value) -> SanitizedQuery {
    sanitize(&QueryCandidate::from_value(v).unwrap())
}

fn names(outcome: &QueryOutcome) -> Vec<String> {
    outcome.records().iter().map(|r| r.name.clone()).collect()
}

#[tokio::test]
async fn test_aggregates() {
    let (_tmp, _config, store) = setup().await;
    assert_eq!(store.count_players().await.unwrap(), 6);
    assert_eq!(
        store.sum_runs().await.unwrap(),
        13848 + 8848 + 4145 + 10866 + 12402
    );
}

#[tokio::test]
async fn test_find_sort_and_limit() {
    let (_tmp, _config, store) = setup().await;

    let out = store
        .find_players(&query(json!({ "sort": { "runs": -1 }, "limit": 3 })))
        .await
        .unwrap();
    assert_eq!(names(&out), vec!["Virat Kohli", "Joe Root", "Rohit Sharma"]);

    let out = store
        .find_players(&query(json!({ "filter": { "format": "odi" }, "sort": { "runs": 1 } })))
        .await
        .unwrap();
    // NULL runs sort lowest.
    assert_eq!(
        names(&out),
        vec!["Unknown Opener", "Rohit Sharma", "Virat Kohli"]
    );
}

#[tokio::test]
async fn test_format_stored_lowercase() {
    let (_tmp, _config, store) = setup().await;
    let out = store
        .find_players(&query(json!({ "filter": { "format": " t20 " } })))
        .await
        .unwrap();
    assert_eq!(names(&out), vec!["Babar Azam"]);
    assert_eq!(out.records()[0].format.as_deref(), Some("t20"));
}

#[tokio::test]
async fn test_numeric_comparisons() {
    let (_tmp, _config, store) = setup().await;
    let out = store
        .find_players(&query(json!({
            "filter": { "runs": { "$gte": 10000, "$lt": 13000 } },
            "sort": { "runs": -1 }
        })))
        .await
        .unwrap();
    assert_eq!(names(&out), vec!["Joe Root", "Rohit Sharma"]);

    let out = store
        .find_players(&query(json!({ "filter": { "country": "ENG", "runs": 12402 } })))
        .await
        .unwrap();
    assert_eq!(names(&out), vec!["Joe Root"]);
}

#[tokio::test]
async fn test_regex_filter_applies_limit_after_matching() {
    let (_tmp, _config, store) = setup().await;

    let out = store
        .find_players(&query(json!({
            "filter": { "name": { "$regex": "^virat", "$options": "i" } },
            "sort": { "runs": 1 },
            "limit": 1
        })))
        .await
        .unwrap();
    let records = out.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].runs, Some(8848));

    let out = store
        .find_players(&query(json!({
            "type": "findOne",
            "filter": { "name": { "$regex": "root", "$options": "i" }, "format": "TEST" }
        })))
        .await
        .unwrap();
    match out {
        QueryOutcome::One(Some(r)) => assert_eq!(r.name, "Joe Root"),
        other => panic!("expected one record, got {:?}", other),
    }

    let out = store
        .find_players(&query(json!({
            "type": "findOne",
            "filter": { "name": { "$regex": "tendulkar", "$options": "i" } }
        })))
        .await
        .unwrap();
    assert_eq!(out, QueryOutcome::One(None));
}

#[tokio::test]
async fn test_turn_ordering_and_deletion() {
    let (_tmp, _config, store) = setup().await;
    let base = Utc::now();

    let mut ids = Vec::new();
    for i in 0..5 {
        let mut turn = ConversationTurn::new(
            "u1",
            format!("q{}", i),
            "Table with 2 results",
            DisplayFormat::Table,
            Some(json!([{ "Name": "Joe Root" }])),
        );
        turn.timestamp = base + Duration::seconds(i);
        ids.push(turn.id.clone());
        store.append_turn(&turn).await.unwrap();
    }
    // Same timestamp as q4: insertion order breaks the tie.
    let mut tie = ConversationTurn::new("u1", "q5", "a", DisplayFormat::Text, None);
    tie.timestamp = base + Duration::seconds(4);
    store.append_turn(&tie).await.unwrap();
    store
        .append_turn(&ConversationTurn::new("u2", "other", "a", DisplayFormat::Text, None))
        .await
        .unwrap();

    let all = store.list_turns("u1").await.unwrap();
    let qs: Vec<&str> = all.iter().map(|t| t.question.as_str()).collect();
    assert_eq!(qs, vec!["q0", "q1", "q2", "q3", "q4", "q5"]);
    assert_eq!(all[0].format, DisplayFormat::Table);
    assert_eq!(all[0].data, Some(json!([{ "Name": "Joe Root" }])));
    assert_eq!(all[5].data, None);

    let recent = store.recent_turns("u1", 2).await.unwrap();
    let qs: Vec<&str> = recent.iter().map(|t| t.question.as_str()).collect();
    assert_eq!(qs, vec!["q4", "q5"]);

    let removed = store.delete_turns("u1", &ids[..3]).await.unwrap();
    assert_eq!(removed, 3);
    assert_eq!(store.count_turns("u1").await.unwrap(), 3);
    // Ids belonging to another user are never touched.
    let other = store.list_turns("u2").await.unwrap();
    assert_eq!(store.delete_turns("u1", &[other[0].id.clone()]).await.unwrap(), 0);
    assert_eq!(store.delete_turns("u1", &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_summary_upsert_and_clear() {
    let (_tmp, _config, store) = setup().await;

    assert!(store.get_summary("u1").await.unwrap().is_none());
    for (count, text) in [(21, "first"), (37, "second")] {
        store
            .upsert_summary(&UserSummary {
                user_id: "u1".to_string(),
                summary: text.to_string(),
                conversation_count: count,
                last_updated: Utc::now(),
            })
            .await
            .unwrap();
    }
    let s = store.get_summary("u1").await.unwrap().unwrap();
    assert_eq!(s.summary, "second");
    assert_eq!(s.conversation_count, 37);

    store
        .append_turn(&ConversationTurn::new("u1", "q", "a", DisplayFormat::Text, None))
        .await
        .unwrap();
    store.clear_user("u1").await.unwrap();
    store.clear_user("u1").await.unwrap();
    assert_eq!(store.count_turns("u1").await.unwrap(), 0);
    assert!(store.get_summary("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_pipeline_over_sqlite() {
    let (_tmp, config, store) = setup().await;
    let service = QaService::new(&config, Arc::new(store), None);

    let resp = service.ask("Virat Kohli test career", "u1").await;
    assert!(resp.success);
    match resp.data {
        Some(AnswerData::Text(t)) => {
            assert!(t.starts_with("Virat Kohli (IND) - Format: TEST, Runs: 8848"))
        }
        other => panic!("expected text, got {:?}", other),
    }

    let resp = service.ask("top scorers", "u1").await;
    match resp.data {
        Some(AnswerData::Table(rows)) => {
            let runs: Vec<i64> = rows.iter().map(|r| r.runs).collect();
            assert_eq!(runs, vec![13848, 12402, 10866, 8848, 4145]);
        }
        other => panic!("expected table, got {:?}", other),
    }

    let history = service.memory().history("u1", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].answer, "Table with 5 results");
}

#[tokio::test]
async fn test_stats_counts() {
    let (_tmp, _config, store) = setup().await;
    store
        .append_turn(&ConversationTurn::new("u1", "q", "a", DisplayFormat::Text, None))
        .await
        .unwrap();
    store
        .append_turn(&ConversationTurn::new("u2", "q", "a", DisplayFormat::Text, None))
        .await
        .unwrap();

    let s = stats::collect_stats(&store).await.unwrap();
    assert_eq!(s.players, 6);
    assert_eq!(s.total_runs, 13848 + 8848 + 4145 + 10866 + 12402);
    assert_eq!(s.turns, 2);
    assert_eq!(s.users, 2);
    assert_eq!(s.summaries, 0);

    let f = |format: &str, players, runs| FormatStats {
        format: format.to_string(),
        players,
        runs,
    };
    assert_eq!(
        s.by_format,
        vec![f("ODI", 3, 13848 + 10866), f("TEST", 2, 8848 + 12402), f("T20", 1, 4145)]
    );
}

#[tokio::test]
async fn test_stats_on_fresh_database() {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("fresh.sqlite"));

    stats::run_stats(&config).await.unwrap();

    let pool = db::connect(&config).await.unwrap();
    let s = stats::collect_stats(&SqliteStore::new(pool)).await.unwrap();
    assert_eq!(s.players, 0);
    assert_eq!(s.total_runs, 0);
    assert!(s.by_format.is_empty());
}
