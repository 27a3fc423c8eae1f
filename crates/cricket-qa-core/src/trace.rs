//! Per-request execution trace.
//!
//! A [`Trace`] is created for each question and passed by `&mut` through
//! every pipeline stage; each stage appends exactly one [`TraceStep`].
//! Step ids are assigned in append order, so the trace always reflects the
//! order in which stages actually ran. Traces are returned to the caller
//! and never persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub step_id: u32,
    pub step_name: String,
    pub used_external_model: bool,
    pub input: Value,
    pub output: Value,
    pub timestamp: DateTime<Utc>,
}

/// Append-only list of pipeline steps.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Trace {
    steps: Vec<TraceStep>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step and return its id.
    pub fn record(
        &mut self,
        step_name: impl Into<String>,
        used_external_model: bool,
        input: Value,
        output: Value,
    ) -> u32 {
        let step_id = self.steps.len() as u32 + 1;
        self.steps.push(TraceStep {
            step_id,
            step_name: step_name.into(),
            used_external_model,
            input,
            output,
            timestamp: Utc::now(),
        });
        step_id
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in order. Mostly useful in tests and logs.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.step_name.as_str()).collect()
    }

    pub fn into_steps(self) -> Vec<TraceStep> {
        self.steps
    }
}
