//! Reply extraction for chat completion responses.
//!
//! Completion services disagree on where the generated text lives. The
//! candidates below are tried in order and the first present, non-null value
//! wins. When none match, the whole document is returned serialized.

use serde_json::Value;

/// JSON pointers probed for the reply text, highest priority first.
pub const REPLY_POINTERS: [&str; 4] = ["/reply", "/result", "/output", "/choices/0/text"];

/// Pull the reply text out of a completion response.
pub fn extract_reply(data: &Value) -> String {
    REPLY_POINTERS
        .iter()
        .filter_map(|pointer| data.pointer(pointer))
        .find(|value| !value.is_null())
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| data.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_order() {
        let data = json!({"output": "third", "result": "second", "reply": "first"});
        assert_eq!(extract_reply(&data), "first");

        let data = json!({"output": "third", "result": "second"});
        assert_eq!(extract_reply(&data), "second");
    }

    #[test]
    fn test_choices_text() {
        let data = json!({"choices": [{"text": "hello"}, {"text": "ignored"}]});
        assert_eq!(extract_reply(&data), "hello");
    }

    #[test]
    fn test_null_falls_through() {
        let data = json!({"reply": null, "output": "out"});
        assert_eq!(extract_reply(&data), "out");
    }

    #[test]
    fn test_non_string_value_is_serialized() {
        let data = json!({"result": {"text": "x"}});
        assert_eq!(extract_reply(&data), r#"{"text":"x"}"#);
    }

    #[test]
    fn test_fallback_stringifies_document() {
        let data = json!({"candidates": []});
        assert_eq!(extract_reply(&data), r#"{"candidates":[]}"#);
    }
}
