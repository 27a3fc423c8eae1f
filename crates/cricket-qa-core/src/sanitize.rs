//! Allowlist sanitizer: the boundary between synthesized queries and the store.
//!
//! [`sanitize`] is total. Whatever a [`QueryCandidate`] contains, the result
//! only mentions fields from [`Field::ALL`], only uses condition shapes from
//! [`Condition`], and carries a limit in `[MIN_LIMIT, MAX_LIMIT]` or none.
//! Anything it does not recognise is dropped, never passed through.
//!
//! # Rules
//!
//! 1. `type` is `findOne` only when the candidate says exactly `"findOne"`.
//! 2. Filter keys outside the allowlist are dropped.
//!    - `format`: a string normalizing to `test`, `odi`, or `t20`.
//!    - `name` / `country`: a primitive, or `{ "$regex": str, "$options": str }`
//!      with option characters outside `imsx` stripped. Patterns that fail
//!      to compile are dropped.
//!    - numeric fields: a number, or an object of `$eq/$ne/$gt/$gte/$lt/$lte`
//!      with numeric operands.
//! 3. Sort keys outside the allowlist are dropped; direction is ascending
//!    only for exactly `1`.
//! 4. Limit is coerced to a number; non-finite means no limit, otherwise it
//!    is clamped to `[1, 50]` and truncated.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::query::{
    CompareOp, Comparison, Condition, CricketFormat, Field, QueryCandidate, QueryKind,
    SanitizedQuery, SortDirection, SortKey, TextPattern,
};

pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 50;

/// Longest regex source accepted on a text field.
pub const MAX_PATTERN_LEN: usize = 200;

const PATTERN_FLAGS: &str = "imsx";

/// Validate and clamp an untrusted query.
pub fn sanitize(candidate: &QueryCandidate) -> SanitizedQuery {
    let kind = match candidate.kind.as_deref() {
        Some("findOne") => QueryKind::FindOne,
        _ => QueryKind::Find,
    };

    SanitizedQuery {
        kind,
        filter: sanitize_filter(&candidate.filter),
        sort: sanitize_sort(&candidate.sort),
        limit: candidate.limit.as_ref().and_then(sanitize_limit),
    }
}

fn sanitize_filter(raw: &Map<String, Value>) -> BTreeMap<Field, Condition> {
    let mut filter = BTreeMap::new();
    for (key, value) in raw {
        let Some(field) = Field::from_key(key) else {
            continue;
        };
        let condition = match field {
            Field::Format => format_condition(value),
            Field::Name | Field::Country => text_condition(value),
            _ => numeric_condition(value),
        };
        if let Some(condition) = condition {
            filter.insert(field, condition);
        }
    }
    filter
}

fn format_condition(value: &Value) -> Option<Condition> {
    value
        .as_str()
        .and_then(CricketFormat::parse)
        .map(Condition::Format)
}

fn text_condition(value: &Value) -> Option<Condition> {
    match value {
        Value::String(s) => Some(Condition::Equals(s.clone())),
        Value::Number(n) => Some(Condition::Equals(n.to_string())),
        Value::Bool(b) => Some(Condition::Equals(b.to_string())),
        Value::Object(obj) => pattern_condition(obj),
        Value::Null | Value::Array(_) => None,
    }
}

fn pattern_condition(obj: &Map<String, Value>) -> Option<Condition> {
    if obj.keys().any(|k| k != "$regex" && k != "$options") {
        return None;
    }
    let pattern = obj.get("$regex")?.as_str()?;
    if pattern.len() > MAX_PATTERN_LEN {
        return None;
    }
    let raw_flags = match obj.get("$options") {
        None => "",
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return None,
    };
    let mut flags = String::new();
    for c in raw_flags.chars() {
        if PATTERN_FLAGS.contains(c) && !flags.contains(c) {
            flags.push(c);
        }
    }

    let pattern = TextPattern {
        pattern: pattern.to_string(),
        flags,
    };
    pattern.compile().ok()?;
    Some(Condition::Pattern(pattern))
}

fn numeric_condition(value: &Value) -> Option<Condition> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Condition::Number),
        Value::Object(obj) if !obj.is_empty() => {
            let mut comparisons = Vec::with_capacity(obj.len());
            for (key, operand) in obj {
                let op = CompareOp::from_key(key)?;
                let value = operand.as_f64().filter(|v| v.is_finite())?;
                comparisons.push(Comparison { op, value });
            }
            Some(Condition::Compare(comparisons))
        }
        _ => None,
    }
}

fn sanitize_sort(raw: &Map<String, Value>) -> Vec<SortKey> {
    raw.iter()
        .filter_map(|(key, direction)| {
            let field = Field::from_key(key)?;
            let direction = if direction.as_f64() == Some(1.0) {
                SortDirection::Ascending
            } else {
                SortDirection::Descending
            };
            Some(SortKey { field, direction })
        })
        .collect()
}

fn sanitize_limit(raw: &Value) -> Option<u32> {
    let n = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.clamp(f64::from(MIN_LIMIT), f64::from(MAX_LIMIT)).trunc() as u32)
}
