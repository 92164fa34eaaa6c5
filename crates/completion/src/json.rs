//! Lenient extraction of JSON objects from model output.
//!
//! Even in JSON mode, models occasionally wrap output in markdown fences
//! or prepend prose. Callers degrade gracefully when extraction fails, so
//! this module returns `Option` rather than an error.

use serde_json::Value;

/// Extract the first JSON object from model output.
///
/// Handles three shapes: a bare object, an object inside a ``` fence
/// (with or without a `json` tag), and an object embedded in surrounding
/// prose (matched by the outermost brace pair).
pub fn extract_json_object(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();

    // Bare object.
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    // Fenced block.
    if let Some(inner) = strip_fence(trimmed) {
        if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(inner) {
            return Some(v);
        }
    }

    // Outermost brace pair inside prose.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

fn strip_fence(s: &str) -> Option<&str> {
    let rest = s.strip_prefix("```")?;
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.rfind("```")?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object() {
        let v = extract_json_object(r#"{"step": "analyze_actors"}"#).unwrap();
        assert_eq!(v["step"], "analyze_actors");
    }

    #[test]
    fn fenced_object_with_tag() {
        let raw = "```json\n{\"action\": \"refine\"}\n```";
        let v = extract_json_object(raw).unwrap();
        assert_eq!(v["action"], "refine");
    }

    #[test]
    fn fenced_object_without_tag() {
        let raw = "```\n{\"confidence\": 0.8}\n```";
        let v = extract_json_object(raw).unwrap();
        assert_eq!(v["confidence"], 0.8);
    }

    #[test]
    fn object_embedded_in_prose() {
        let raw = "Here is my answer:\n{\"type\": \"new_conversation\"}\nHope that helps.";
        let v = extract_json_object(raw).unwrap();
        assert_eq!(v["type"], "new_conversation");
    }

    #[test]
    fn garbage_returns_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("").is_none());
        assert!(extract_json_object("{broken").is_none());
    }

    #[test]
    fn top_level_array_is_rejected() {
        // Callers expect an object; arrays mean the model ignored the schema.
        assert!(extract_json_object(r#"[1, 2, 3]"#).is_none());
    }
}
