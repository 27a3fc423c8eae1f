//! # Cricket Q&A Core
//!
//! Pure logic for the Cricket Q&A pipeline: player and conversation models,
//! the untrusted/trusted query types, the allowlist sanitizer, the
//! deterministic fallback synthesizer, the keyword relevancy heuristic,
//! answer formatting, model-output cleaning, the execution trace, and the
//! store abstraction.
//!
//! This crate contains no tokio, sqlx, or network dependencies. Everything
//! that talks to a model or a database lives in the `cricket-qa` crate.

pub mod fallback;
pub mod format;
pub mod json;
pub mod models;
pub mod query;
pub mod relevancy;
pub mod sanitize;
pub mod store;
pub mod trace;
