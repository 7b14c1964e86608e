/// Parses a raw LLM text response as JSON, per spec §4.4 "Response
/// parsing": prefer a fenced ```json block; fall back to parsing the raw
/// string directly; on both failures, return `None` so the caller can
/// fall back to treating the text as a plain string result.
pub fn parse_json_response(text: &str) -> Option<serde_json::Value> {
    if let Some(fenced) = extract_fenced_json(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&fenced) {
            return Some(value);
        }
    }
    serde_json::from_str::<serde_json::Value>(text.trim()).ok()
}

/// Extracts the contents of the first ` ```json ... ``` ` (or bare ` ``` `)
/// fenced block in `text`, if any.
fn extract_fenced_json(text: &str) -> Option<String> {
    let start_marker_json = "```json";
    let start_marker_bare = "```";

    let (start, marker_len) = if let Some(idx) = text.find(start_marker_json) {
        (idx, start_marker_json.len())
    } else if let Some(idx) = text.find(start_marker_bare) {
        (idx, start_marker_bare.len())
    } else {
        return None;
    };

    let body_start = start + marker_len;
    let rest = &text[body_start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_block() {
        let text = "Here is the result:\n```json\n{\"a\": 1}\n```\nThanks.";
        let parsed = parse_json_response(text).unwrap();
        assert_eq!(parsed["a"], 1);
    }

    #[test]
    fn parses_bare_fenced_block() {
        let text = "```\n{\"b\": 2}\n```";
        let parsed = parse_json_response(text).unwrap();
        assert_eq!(parsed["b"], 2);
    }

    #[test]
    fn falls_back_to_raw_json_parse() {
        let text = "{\"c\": 3}";
        let parsed = parse_json_response(text).unwrap();
        assert_eq!(parsed["c"], 3);
    }

    #[test]
    fn returns_none_when_neither_parses() {
        assert!(parse_json_response("not json at all").is_none());
    }

    #[test]
    fn prefers_fenced_block_over_surrounding_prose_with_braces() {
        let text = "Notes {draft}\n```json\n{\"d\": 4}\n```";
        let parsed = parse_json_response(text).unwrap();
        assert_eq!(parsed["d"], 4);
    }
}
