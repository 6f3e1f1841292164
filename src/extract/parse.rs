//! Parse and validate the model's structured extraction answer.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{PapergraphError, Result};
use crate::graph::PartialGraph;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```[\w-]*\s*(.*?)```").expect("fence pattern is valid"))
}

/// Outermost `{ ... }` span of `raw`.
fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Decode the JSON object in a raw answer.
///
/// A fenced block is tried first, whatever its info string; if it is
/// missing or does not decode, the outermost `{ ... }` span is used.
fn json_payload(raw: &str) -> Result<serde_json::Value> {
    let fenced = fence_regex()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim());
    if let Some(value) = fenced.and_then(|payload| serde_json::from_str(payload).ok()) {
        return Ok(value);
    }

    let payload = brace_span(raw)
        .ok_or_else(|| PapergraphError::Parse("no JSON object in model response".to_string()))?;
    serde_json::from_str(payload).map_err(|e| PapergraphError::Parse(format!("invalid JSON: {}", e)))
}

/// Parse a model answer into a partial graph.
///
/// Fails with [`PapergraphError::Parse`] when the answer holds no JSON
/// object, lacks both `entities` and `relations`, uses a type outside the
/// vocabulary, or names an empty entity or endpoint.
pub fn parse_partial_graph(raw: &str) -> Result<PartialGraph> {
    let value = json_payload(raw)?;

    let object = value
        .as_object()
        .ok_or_else(|| PapergraphError::Parse("response is not a JSON object".to_string()))?;
    if !object.contains_key("entities") && !object.contains_key("relations") {
        return Err(PapergraphError::Parse(
            "response has neither 'entities' nor 'relations'".to_string(),
        ));
    }

    let partial: PartialGraph = serde_json::from_value(value)
        .map_err(|e| PapergraphError::Parse(format!("schema mismatch: {}", e)))?;

    if let Some(entity) = partial.entities.iter().find(|e| e.name.trim().is_empty()) {
        return Err(PapergraphError::Parse(format!(
            "entity of type {} has an empty name",
            entity.entity_type
        )));
    }
    if let Some(relation) = partial
        .relations
        .iter()
        .find(|r| r.source.trim().is_empty() || r.target.trim().is_empty())
    {
        return Err(PapergraphError::Parse(format!(
            "{} relation has an empty endpoint",
            relation.relation_type
        )));
    }

    Ok(partial)
}
