//! Lenient parsing of LLM responses
//!
//! Models wrap JSON in prose and code fences, return a bare array where an
//! object was asked for, or get single items wrong. Extraction takes the
//! outermost JSON value; items that fail to deserialize are skipped one by
//! one so a single bad action does not cost the whole plan.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::actions::Action;
use crate::core::error::{CivError, Result};
use crate::state::diplomacy::OutgoingMessage;

/// Extract the outermost JSON object or array from a response
pub fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find(|c| c == '{' || c == '[')
        .ok_or_else(|| CivError::LlmError("No JSON found in response".into()))?;
    let close = if response[start..].starts_with('{') { '}' } else { ']' };
    let end = response
        .rfind(close)
        .filter(|end| *end > start)
        .ok_or_else(|| CivError::LlmError("No closing bracket found in response".into()))?;
    Ok(&response[start..=end])
}

/// Items under `key`, or the top-level array itself
fn items(response: &str, key: &str) -> Result<Vec<Value>> {
    let json = extract_json(response)?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| CivError::LlmError(format!("Malformed JSON: {}", e)))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(CivError::LlmError(format!("'{}' is not an array", key))),
            // A single item on its own
            None => Ok(vec![Value::Object(map)]),
        },
        _ => Err(CivError::LlmError("Expected a JSON object or array".into())),
    }
}

fn parse_each<T: DeserializeOwned>(values: Vec<Value>, what: &str) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value.clone()) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(error = %e, item = %value, "skipping malformed {}", what);
                None
            }
        })
        .collect()
}

/// Parse a planned-actions response
pub fn parse_actions(response: &str) -> Result<Vec<Action>> {
    Ok(parse_each(items(response, "actions")?, "action"))
}

/// Parse a diplomacy response
pub fn parse_messages(response: &str) -> Result<Vec<OutgoingMessage>> {
    Ok(parse_each(items(response, "messages")?, "message"))
}

/// Narration is plain prose, optionally wrapped as `{"narration": "..."}`
pub fn parse_narration(response: &str) -> Result<String> {
    let wrapped = extract_json(response)
        .ok()
        .and_then(|json| serde_json::from_str::<Value>(json).ok())
        .and_then(|v| v.get("narration").and_then(Value::as_str).map(str::to_string));
    let text = wrapped.unwrap_or_else(|| response.to_string());
    let text = text.trim();
    if text.is_empty() {
        return Err(CivError::LlmError("Empty narration".into()));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::diplomacy::MessageKind;

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let response = "Here is my plan:\n```json\n{\"actions\": []}\n```\nGood luck.";
        assert_eq!(extract_json(response).unwrap(), "{\"actions\": []}");
    }

    #[test]
    fn test_extract_json_array() {
        let response = "[{\"type\": \"fortify\", \"unitId\": \"unit-1\"}]";
        assert_eq!(extract_json(response).unwrap(), response);
    }

    #[test]
    fn test_extract_json_no_json() {
        assert!(extract_json("I will wait and see").is_err());
    }

    #[test]
    fn test_malformed_actions_skipped() {
        let response = r#"{"actions": [
            {"type": "move_unit", "unitId": "unit-3", "x": 4, "y": 5},
            {"type": "teleport", "unitId": "unit-3"},
            {"type": "set_research", "techId": "writing"},
            {"type": "move_unit", "unitId": "unit-4"}
        ]}"#;
        let actions = parse_actions(response).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].name(), "set_research");
    }

    #[test]
    fn test_bare_array_of_messages() {
        let response = r#"[{"to": "all", "type": "message", "content": "Greetings"},
                          {"to": "egypt", "type": "alliance_proposal"}]"#;
        let messages = parse_messages(response).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].kind, MessageKind::AllianceProposal);
    }

    #[test]
    fn test_non_array_actions_rejected() {
        assert!(parse_actions(r#"{"actions": "none"}"#).is_err());
    }

    #[test]
    fn test_narration_unwrapped() {
        let text = parse_narration(r#"{"narration": "Rome prospered."}"#).unwrap();
        assert_eq!(text, "Rome prospered.");
        let plain = parse_narration("  The world held its breath.  ").unwrap();
        assert_eq!(plain, "The world held its breath.");
        assert!(parse_narration("   ").is_err());
    }
}
