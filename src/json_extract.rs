//! Span selection for JSON embedded in model prose.
//!
//! Nothing here repairs JSON. The worst case is the input handed back
//! unchanged.

use serde::de::IgnoredAny;

const FENCE: &str = "```";

/// Returns the most likely JSON substring of `text`.
///
/// Priority: a fenced block tagged `json`, any fenced block, the span from
/// the first `{` to the last `}` (or a leading `[`…`]` span, see
/// `bracketed_span`), then `text`.
pub fn extract_json_candidate(text: &str) -> &str {
    if let Some(inner) = fenced_json_block(text) {
        return inner;
    }
    if let Some(inner) = any_fenced_block(text) {
        return inner;
    }
    bracketed_span(text).unwrap_or(text)
}

fn fenced_json_block(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(FENCE) {
        let after_fence = search_from + offset + FENCE.len();
        let rest = &text[after_fence..];
        let info_end = rest.find('\n').unwrap_or(rest.len());
        if rest[..info_end].trim().eq_ignore_ascii_case("json") {
            return Some(block_body(&rest[info_end..]));
        }
        // Skip past the closing fence of this non-json block.
        match rest.find(FENCE) {
            Some(close) => search_from = after_fence + close + FENCE.len(),
            None => return None,
        }
    }
    None
}

fn any_fenced_block(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let rest = &text[start..];
    let info_end = rest.find('\n').unwrap_or(rest.len());
    let info = rest[..info_end].trim();
    // A bare language tag sits on the fence line; JSON on the same line does not.
    let body = if info.is_empty() || info.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        &rest[info_end..]
    } else {
        rest
    };
    Some(block_body(body))
}

/// Content up to the closing fence, or to the end when the reply was cut off.
fn block_body(body: &str) -> &str {
    let end = body.find(FENCE).unwrap_or(body.len());
    body[..end].trim()
}

/// The `{`…`}` span, unless a `[` comes first and its `[`…`]` span is
/// either valid JSON on its own or the only span there is. Brackets in
/// prose such as "plan for [2 days]" must not cut into the object.
fn bracketed_span(text: &str) -> Option<&str> {
    let brace = span_between(text, '{', '}');
    let array_first = match (text.find('['), text.find('{')) {
        (Some(bracket), Some(brace)) => bracket < brace,
        (Some(_), None) => true,
        _ => false,
    };
    if array_first {
        if let Some(array) = span_between(text, '[', ']') {
            if brace.is_none() || serde_json::from_str::<IgnoredAny>(array).is_ok() {
                return Some(array);
            }
        }
    }
    brace
}

fn span_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fence_wins_over_other_fences() {
        let text = "Intro\n```text\nnot this\n```\nThen:\n```json\n{\"a\": 1}\n```\nbye";
        assert_eq!(extract_json_candidate(text), "{\"a\": 1}");
    }

    #[test]
    fn json_fence_tag_is_case_insensitive() {
        let text = "```JSON\n[1, 2]\n```";
        assert_eq!(extract_json_candidate(text), "[1, 2]");
    }

    #[test]
    fn untagged_fence_is_used() {
        let text = "Here you go:\n```\n{\"days\": []}\n```";
        assert_eq!(extract_json_candidate(text), "{\"days\": []}");
    }

    #[test]
    fn fence_with_json_on_the_first_line() {
        let text = "```{\"a\": true}```";
        assert_eq!(extract_json_candidate(text), "{\"a\": true}");
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        let text = "```json\n{\"days\": [";
        assert_eq!(extract_json_candidate(text), "{\"days\": [");
    }

    #[test]
    fn brace_span_without_fences() {
        let text = "Sure! {\"a\": {\"b\": 2}} Hope this helps.";
        assert_eq!(extract_json_candidate(text), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn array_span_when_bracket_comes_first() {
        let text = "List: [{\"label\": \"egg\"}, {\"label\": \"milk\"}] done";
        assert_eq!(
            extract_json_candidate(text),
            "[{\"label\": \"egg\"}, {\"label\": \"milk\"}]"
        );
    }

    #[test]
    fn bracketed_prose_before_an_object_keeps_the_object() {
        let text = "Plan for [2 days] as requested:\n{\"days\": []}";
        assert_eq!(extract_json_candidate(text), "{\"days\": []}");
    }

    #[test]
    fn unparsed_array_span_is_kept_when_no_object_exists() {
        let text = "You need tomatoes [about 6] and olive oil";
        assert_eq!(extract_json_candidate(text), "[about 6]");
    }

    #[test]
    fn brace_span_when_brace_comes_first() {
        let text = "{\"list\": [1, 2]} trailing ]";
        assert_eq!(extract_json_candidate(text), "{\"list\": [1, 2]}");
    }

    #[test]
    fn returns_input_when_nothing_matches() {
        assert_eq!(extract_json_candidate("no json here"), "no json here");
        assert_eq!(extract_json_candidate("} backwards {"), "} backwards {");
        assert_eq!(extract_json_candidate(""), "");
    }
}
