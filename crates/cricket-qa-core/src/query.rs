//! Query types on both sides of the sanitizer.
//!
//! A [`QueryCandidate`] is whatever the model (or the fallback synthesizer)
//! produced, decoded into a fixed shape but otherwise untrusted. The only way
//! to obtain a [`SanitizedQuery`] is [`crate::sanitize::sanitize`], and the
//! stores only execute `SanitizedQuery` values.
//!
//! Both shapes serialize to the same document-query JSON used in prompts and
//! traces:
//!
//! ```json
//! { "type": "find", "filter": { "format": "odi" }, "sort": { "runs": -1 }, "limit": 5 }
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use anyhow::Result;
use regex::{Regex, RegexBuilder};
use serde_json::{json, Map, Value};

use crate::models::PlayerRecord;

/// Compiled size cap for name/country patterns.
const PATTERN_SIZE_LIMIT: usize = 1 << 16;

// ============ Untrusted candidate ============

/// A query as produced by the synthesizers, before any validation.
///
/// Decoding never fails on unexpected shapes: a non-object `filter` or
/// `sort` decodes as empty, and `limit` keeps its raw JSON value for the
/// sanitizer to coerce.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryCandidate {
    /// Raw `type` (or `kind`) string, e.g. `"find"` / `"findOne"`.
    pub kind: Option<String>,
    pub filter: Map<String, Value>,
    pub sort: Map<String, Value>,
    pub limit: Option<Value>,
}

impl QueryCandidate {
    /// Decode a parsed JSON document. Returns `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut obj) = value else {
            return None;
        };

        let kind = obj
            .remove("type")
            .or_else(|| obj.remove("kind"))
            .and_then(|v| v.as_str().map(str::to_string));
        let filter = match obj.remove("filter") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let sort = match obj.remove("sort") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let limit = obj.remove("limit").filter(|v| !v.is_null());

        Some(Self {
            kind,
            filter,
            sort,
            limit,
        })
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        if let Some(kind) = &self.kind {
            out.insert("type".to_string(), Value::String(kind.clone()));
        }
        out.insert("filter".to_string(), Value::Object(self.filter.clone()));
        if !self.sort.is_empty() {
            out.insert("sort".to_string(), Value::Object(self.sort.clone()));
        }
        if let Some(limit) = &self.limit {
            out.insert("limit".to_string(), limit.clone());
        }
        Value::Object(out)
    }
}

// ============ Allowlisted vocabulary ============

/// Find-many or find-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Find,
    FindOne,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Find => "find",
            QueryKind::FindOne => "findOne",
        }
    }
}

/// The player fields a query may filter or sort on.
///
/// This enum *is* the allowlist. A field missing here can never reach a
/// store, so adding a queryable column means adding a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Country,
    Format,
    Runs,
    Average,
    StrikeRate,
    Matches,
    Innings,
    Centuries,
    Fifties,
    Ducks,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::Name,
        Field::Country,
        Field::Format,
        Field::Runs,
        Field::Average,
        Field::StrikeRate,
        Field::Matches,
        Field::Innings,
        Field::Centuries,
        Field::Fifties,
        Field::Ducks,
    ];

    /// Exact, case-sensitive lookup of a query key.
    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.key() == key)
    }

    /// The key used in query documents.
    pub fn key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Country => "country",
            Field::Format => "format",
            Field::Runs => "runs",
            Field::Average => "average",
            Field::StrikeRate => "strikeRate",
            Field::Matches => "matches",
            Field::Innings => "innings",
            Field::Centuries => "centuries",
            Field::Fifties => "fifties",
            Field::Ducks => "ducks",
        }
    }

    pub fn is_text(self) -> bool {
        matches!(self, Field::Name | Field::Country)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Field::Name | Field::Country | Field::Format)
    }

    /// Numeric value of this field on a record, if the field is numeric and set.
    pub fn number(self, record: &PlayerRecord) -> Option<f64> {
        match self {
            Field::Runs => record.runs.map(|v| v as f64),
            Field::Average => record.average,
            Field::StrikeRate => record.strike_rate,
            Field::Matches => record.matches.map(|v| v as f64),
            Field::Innings => record.innings.map(|v| v as f64),
            Field::Centuries => record.centuries.map(|v| v as f64),
            Field::Fifties => record.fifties.map(|v| v as f64),
            Field::Ducks => record.ducks.map(|v| v as f64),
            Field::Name | Field::Country | Field::Format => None,
        }
    }

    /// Text value of this field on a record, if the field is textual and set.
    pub fn text(self, record: &PlayerRecord) -> Option<&str> {
        match self {
            Field::Name => Some(record.name.as_str()),
            Field::Country => record.country.as_deref(),
            Field::Format => record.format.as_deref(),
            _ => None,
        }
    }
}

/// Cricket formats the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CricketFormat {
    Test,
    Odi,
    T20,
}

impl CricketFormat {
    pub const ALL: [CricketFormat; 3] = [CricketFormat::Test, CricketFormat::Odi, CricketFormat::T20];

    /// Case- and whitespace-insensitive parse: `" T20 "` and `"t 20"` are both `T20`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "test" => Some(CricketFormat::Test),
            "odi" => Some(CricketFormat::Odi),
            "t20" => Some(CricketFormat::T20),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CricketFormat::Test => "test",
            CricketFormat::Odi => "odi",
            CricketFormat::T20 => "t20",
        }
    }
}

/// A regular-expression filter on a text field.
///
/// `flags` only ever contains characters from `imsx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPattern {
    pub pattern: String,
    pub flags: String,
}

impl TextPattern {
    pub fn is_case_insensitive(&self) -> bool {
        self.flags.contains('i')
    }

    /// Compile with a bounded program size.
    pub fn compile(&self) -> Result<Regex, regex::Error> {
        RegexBuilder::new(&self.pattern)
            .case_insensitive(self.flags.contains('i'))
            .multi_line(self.flags.contains('m'))
            .dot_matches_new_line(self.flags.contains('s'))
            .ignore_whitespace(self.flags.contains('x'))
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
    }
}

/// Comparison operators accepted on numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "$eq" => Some(CompareOp::Eq),
            "$ne" => Some(CompareOp::Ne),
            "$gt" => Some(CompareOp::Gt),
            "$gte" => Some(CompareOp::Gte),
            "$lt" => Some(CompareOp::Lt),
            "$lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            CompareOp::Eq => "$eq",
            CompareOp::Ne => "$ne",
            CompareOp::Gt => "$gt",
            CompareOp::Gte => "$gte",
            CompareOp::Lt => "$lt",
            CompareOp::Lte => "$lte",
        }
    }

    /// SQL operator with the same meaning.
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Gte => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Lte => lhs <= rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub op: CompareOp,
    pub value: f64,
}

/// A validated filter condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Exact match on a text field.
    Equals(String),
    /// Regex match on a text field.
    Pattern(TextPattern),
    /// Exact match on the format field.
    Format(CricketFormat),
    /// Exact match on a numeric field.
    Number(f64),
    /// Conjunction of comparisons on a numeric field.
    Compare(Vec<Comparison>),
}

impl Condition {
    fn to_json(&self) -> Value {
        match self {
            Condition::Equals(s) => Value::String(s.clone()),
            Condition::Pattern(p) => json!({ "$regex": p.pattern, "$options": p.flags }),
            Condition::Format(f) => Value::String(f.as_str().to_string()),
            Condition::Number(n) => json!(n),
            Condition::Compare(cmps) => {
                let mut map = Map::new();
                for c in cmps {
                    map.insert(c.op.key().to_string(), json!(c.value));
                }
                Value::Object(map)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_i8(&self) -> i8 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: Field,
    pub direction: SortDirection,
}

// ============ Trusted query ============

/// A query that passed the allowlist sanitizer.
///
/// Fields are private to this crate so that [`crate::sanitize::sanitize`]
/// stays the only constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedQuery {
    pub(crate) kind: QueryKind,
    pub(crate) filter: BTreeMap<Field, Condition>,
    pub(crate) sort: Vec<SortKey>,
    pub(crate) limit: Option<u32>,
}

impl SanitizedQuery {
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn filter(&self) -> &BTreeMap<Field, Condition> {
        &self.filter
    }

    /// Sort keys in priority order. Empty means "no sort".
    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    /// Clamped limit, or `None` for "no limit".
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Row cap the store should apply: 1 for find-one, else the limit.
    pub fn effective_limit(&self) -> Option<u32> {
        match self.kind {
            QueryKind::FindOne => Some(1),
            QueryKind::Find => self.limit,
        }
    }

    pub fn has_patterns(&self) -> bool {
        self.filter
            .values()
            .any(|c| matches!(c, Condition::Pattern(_)))
    }

    /// Compile the filter into a record predicate.
    pub fn matcher(&self) -> Result<RecordMatcher> {
        let mut conditions = Vec::with_capacity(self.filter.len());
        for (field, cond) in &self.filter {
            let compiled = match cond {
                Condition::Equals(s) => Compiled::Equals(s.clone()),
                Condition::Pattern(p) => Compiled::Pattern(p.compile()?),
                Condition::Format(f) => Compiled::Format(*f),
                Condition::Number(n) => Compiled::Number(*n),
                Condition::Compare(c) => Compiled::Compare(c.clone()),
            };
            conditions.push((*field, compiled));
        }
        Ok(RecordMatcher { conditions })
    }

    /// Sort records in place by this query's sort keys.
    ///
    /// Missing values order below present ones, as in most document stores.
    pub fn sort_records(&self, records: &mut [PlayerRecord]) {
        if self.sort.is_empty() {
            return;
        }
        records.sort_by(|a, b| {
            for key in &self.sort {
                let ord = compare_field(key.field, a, b);
                let ord = match key.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".to_string(), json!(self.kind.as_str()));
        let filter: Map<String, Value> = self
            .filter
            .iter()
            .map(|(f, c)| (f.key().to_string(), c.to_json()))
            .collect();
        out.insert("filter".to_string(), Value::Object(filter));
        if !self.sort.is_empty() {
            let sort: Map<String, Value> = self
                .sort
                .iter()
                .map(|k| (k.field.key().to_string(), json!(k.direction.as_i8())))
                .collect();
            out.insert("sort".to_string(), Value::Object(sort));
        }
        if let Some(limit) = self.limit {
            out.insert("limit".to_string(), json!(limit));
        }
        Value::Object(out)
    }
}

fn compare_field(field: Field, a: &PlayerRecord, b: &PlayerRecord) -> Ordering {
    if field.is_numeric() {
        match (field.number(a), field.number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    } else {
        field.text(a).cmp(&field.text(b))
    }
}

enum Compiled {
    Equals(String),
    Pattern(Regex),
    Format(CricketFormat),
    Number(f64),
    Compare(Vec<Comparison>),
}

/// Predicate compiled from a [`SanitizedQuery`] filter.
pub struct RecordMatcher {
    conditions: Vec<(Field, Compiled)>,
}

impl RecordMatcher {
    pub fn matches(&self, record: &PlayerRecord) -> bool {
        self.conditions.iter().all(|(field, cond)| match cond {
            Compiled::Equals(s) => field.text(record) == Some(s.as_str()),
            Compiled::Pattern(re) => field.text(record).is_some_and(|t| re.is_match(t)),
            Compiled::Format(f) => record
                .format
                .as_deref()
                .and_then(CricketFormat::parse)
                .is_some_and(|rf| rf == *f),
            Compiled::Number(n) => field.number(record) == Some(*n),
            Compiled::Compare(cmps) => field
                .number(record)
                .is_some_and(|v| cmps.iter().all(|c| c.op.holds(v, c.value))),
        })
    }
}

// ============ Execution outcome ============

/// What the executor hands to the formatter.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    One(Option<PlayerRecord>),
    Many(Vec<PlayerRecord>),
}

impl QueryOutcome {
    pub fn len(&self) -> usize {
        match self {
            QueryOutcome::One(r) => usize::from(r.is_some()),
            QueryOutcome::Many(rs) => rs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<&PlayerRecord> {
        match self {
            QueryOutcome::One(r) => r.iter().collect(),
            QueryOutcome::Many(rs) => rs.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str, format: &str, runs: Option<i64>) -> PlayerRecord {
        PlayerRecord {
            format: Some(format.to_string()),
            runs,
            ..PlayerRecord::named(name)
        }
    }

    #[test]
    fn test_candidate_from_non_object() {
        assert!(QueryCandidate::from_value(json!([1, 2])).is_none());
        assert!(QueryCandidate::from_value(json!("find")).is_none());
    }

    #[test]
    fn test_candidate_lenient_shapes() {
        let c = QueryCandidate::from_value(json!({
            "type": "findOne",
            "filter": null,
            "sort": "runs",
            "limit": null
        }))
        .unwrap();
        assert_eq!(c.kind.as_deref(), Some("findOne"));
        assert!(c.filter.is_empty());
        assert!(c.sort.is_empty());
        assert!(c.limit.is_none());
    }

    #[test]
    fn test_candidate_accepts_kind_alias() {
        let c = QueryCandidate::from_value(json!({ "kind": "find" })).unwrap();
        assert_eq!(c.kind.as_deref(), Some("find"));
    }

    #[test]
    fn test_field_keys_round_trip() {
        for f in Field::ALL {
            assert_eq!(Field::from_key(f.key()), Some(f));
        }
        assert_eq!(Field::from_key("strike_rate"), None);
        assert_eq!(Field::from_key("Name"), None);
    }

    #[test]
    fn test_format_parse_normalizes() {
        assert_eq!(CricketFormat::parse(" T20 "), Some(CricketFormat::T20));
        assert_eq!(CricketFormat::parse("O D I"), Some(CricketFormat::Odi));
        assert_eq!(CricketFormat::parse("t10"), None);
        assert_eq!(CricketFormat::parse(""), None);
    }

    #[test]
    fn test_sort_missing_values_last_when_descending() {
        let q = SanitizedQuery {
            kind: QueryKind::Find,
            filter: BTreeMap::new(),
            sort: vec![SortKey {
                field: Field::Runs,
                direction: SortDirection::Descending,
            }],
            limit: None,
        };
        let mut records = vec![
            player("A", "odi", Some(10)),
            player("B", "odi", None),
            player("C", "odi", Some(30)),
        ];
        q.sort_records(&mut records);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_matcher_pattern_and_compare() {
        let mut filter = BTreeMap::new();
        filter.insert(
            Field::Name,
            Condition::Pattern(TextPattern {
                pattern: "kohli".to_string(),
                flags: "i".to_string(),
            }),
        );
        filter.insert(
            Field::Runs,
            Condition::Compare(vec![Comparison {
                op: CompareOp::Gte,
                value: 10000.0,
            }]),
        );
        let q = SanitizedQuery {
            kind: QueryKind::Find,
            filter,
            sort: Vec::new(),
            limit: None,
        };
        let m = q.matcher().unwrap();
        assert!(m.matches(&player("Virat Kohli", "odi", Some(13848))));
        assert!(!m.matches(&player("Virat Kohli", "t20", Some(4008))));
        assert!(!m.matches(&player("Joe Root", "test", Some(12000))));
    }

    #[test]
    fn test_matcher_format_is_normalized_on_record() {
        let mut filter = BTreeMap::new();
        filter.insert(Field::Format, Condition::Format(CricketFormat::Odi));
        let q = SanitizedQuery {
            kind: QueryKind::Find,
            filter,
            sort: Vec::new(),
            limit: None,
        };
        let m = q.matcher().unwrap();
        assert!(m.matches(&player("A", "ODI", None)));
        assert!(!m.matches(&player("A", "test", None)));
    }

    #[test]
    fn test_outcome_len() {
        assert_eq!(QueryOutcome::One(None).len(), 0);
        assert_eq!(QueryOutcome::One(Some(PlayerRecord::named("A"))).len(), 1);
        assert!(QueryOutcome::Many(vec![]).is_empty());
    }
}
