//! Tolerant extraction of JSON structures from model output.

use log::debug;
use regex::Regex;
use serde_json::Value;

/// Pull a list of JSON objects out of free-form model text.
///
/// Models wrap structured output in prose, markdown fences, or emit a bare
/// object instead of a list. Tries, in order: the widest `[{...}]` span, a
/// bare `{...}` object promoted to a one-element list, and the text with
/// markdown fences stripped. Anything unparseable yields an empty list
/// rather than an error.
pub fn extract_json_list(text: &str) -> Vec<Value> {
    let list_re = Regex::new(r"(?s)\[\s*\{.*\}\s*\]").unwrap();
    if let Some(m) = list_re.find(text) {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(m.as_str()) {
            return items;
        }
    }

    let object_re = Regex::new(r"(?s)\{.*\}").unwrap();
    if let Some(m) = object_re.find(text) {
        match serde_json::from_str::<Value>(m.as_str()) {
            Ok(Value::Array(items)) => return items,
            Ok(obj @ Value::Object(_)) => return vec![obj],
            _ => {}
        }
    }

    let stripped = text
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();
    match serde_json::from_str::<Value>(&stripped) {
        Ok(Value::Array(items)) => items,
        Ok(obj @ Value::Object(_)) => vec![obj],
        _ => {
            debug!("no JSON structure found in model output");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::extract_json_list;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn finds_a_list_embedded_in_prose() {
        let text = "Here are the claims:\n[{\"claim_summary\": \"a\"}, {\"claim_summary\": \"b\"}]\nDone.";
        let items = extract_json_list(text);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], json!({"claim_summary": "a"}));
    }

    #[test]
    fn promotes_a_bare_object_to_a_single_element_list() {
        let items = extract_json_list("{\"claim_summary\": \"only one\"}");
        assert_eq!(items, vec![json!({"claim_summary": "only one"})]);
    }

    #[test]
    fn strips_markdown_fences() {
        let text = "```json\n[{\"k\": 1}]\n```";
        assert_eq!(extract_json_list(text), vec![json!({"k": 1})]);
    }

    #[test]
    fn unparseable_text_yields_empty() {
        assert_eq!(extract_json_list("no structure here"), Vec::<serde_json::Value>::new());
        assert_eq!(extract_json_list(""), Vec::<serde_json::Value>::new());
    }

    #[test]
    fn nested_objects_survive_the_greedy_span() {
        let text = "[{\"outer\": {\"inner\": true}}]";
        let items = extract_json_list(text);
        assert_eq!(items[0]["outer"]["inner"], json!(true));
    }
}
