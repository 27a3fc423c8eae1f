//! # Cricket Q&A
//!
//! Natural-language questions about cricket batting statistics, answered
//! from a local SQLite player table.
//!
//! A question passes a relevancy gate, is turned into a structured query
//! (by a completion model when one is configured, else by deterministic
//! rules), is checked against a field allowlist, and runs against the
//! store. Results come back as a sentence or a table together with a
//! per-request trace. Each user's turns are remembered and periodically
//! compacted into a summary.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │ CLI/HTTP │──▶│ gate → synth → sanitize →    │──▶│  SQLite  │
//! │ (cricq)  │   │ execute → format → memory    │   │ players  │
//! └──────────┘   └──────────────┬───────────────┘   │ turns    │
//!                               ▼                   └──────────┘
//!                        ┌──────────────┐
//!                        │ chat model   │ (optional)
//!                        └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite [`Store`](cricket_qa_core::store::Store) backend |
//! | [`llm`] | Completion model client |
//! | [`gate`] | Relevancy gate |
//! | [`synth`] | Query synthesis with fallback |
//! | [`memory`] | Conversation memory and compaction |
//! | [`pipeline`] | The `ask` pipeline |
//! | [`output`] | CLI rendering |
//! | [`server`] | HTTP API |
//! | [`seed`] | Player table seeding |
//! | [`stats`] | Database statistics |
//!
//! Pure logic (sanitizer, fallback rules, formatter, trace) lives in the
//! `cricket-qa-core` crate.

pub mod config;
pub mod db;
pub mod gate;
pub mod llm;
pub mod memory;
pub mod migrate;
pub mod output;
pub mod pipeline;
pub mod seed;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod synth;
