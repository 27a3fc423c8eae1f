//! Recovering a JSON object from free-form model output.
//!
//! Completion models wrap JSON in code fences, prefix it with prose, or
//! trail it with explanations. [`extract_json_object`] applies, in order:
//!
//! 1. strip code-fence markers (```` ``` ```` and ```` ```json ````),
//! 2. trim leading characters before the first `{` and trailing
//!    characters after the last `}`,
//! 3. slice from the first `{` to the last `}`.
//!
//! [`parse_json_object`] then parses the slice and insists on an object.

use anyhow::{anyhow, bail, Result};
use serde_json::Value;

/// Isolate the outermost `{ ... }` span of a model response.
pub fn extract_json_object(raw: &str) -> Option<String> {
    let unfenced = raw.replace("```json", "").replace("```JSON", "").replace("```", "");
    let trimmed = unfenced
        .trim_start_matches(|c: char| c != '{')
        .trim_end_matches(|c: char| c != '}');
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(trimmed[start..=end].to_string())
}

/// Clean and parse model output into a JSON object.
pub fn parse_json_object(raw: &str) -> Result<Value> {
    let slice = extract_json_object(raw).ok_or_else(|| anyhow!("no JSON object in model output"))?;
    let value: Value = serde_json::from_str(&slice)?;
    if !value.is_object() {
        bail!("model output is not a JSON object");
    }
    Ok(value)
}
