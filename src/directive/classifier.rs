// Directive classifier
//
// Pure function from the accumulated text of a message to its
// ContentClassification. Rules are evaluated in a fixed order, first match
// wins:
//
//   1. the whole (trimmed) text is a JSON object      -> directive, no prose
//   2. first complete fenced block (`json` tag first,
//      then untagged)                                  -> directive or ParseError
//   3. a `json` fence is open without its closing fence -> StreamingDirective
//   4. anything else                                    -> PlainText

use serde_json::Value;
use tracing::debug;

use super::shapes;
use super::types::ContentClassification;

const FENCE: &str = "```";
const JSON_TAG: &str = "json";

/// Opening backticks found in the text, in byte offsets
#[derive(Debug, Clone, PartialEq)]
struct Opener<'a> {
    /// Offset of the opening backticks
    start: usize,
    /// Info string after the opening backticks (`json`, `python`, ``)
    tag: &'a str,
    /// Whether the info line has been terminated by a newline yet
    tag_complete: bool,
    /// Offset where the interior starts
    body_start: usize,
}

impl Opener<'_> {
    fn is_json(&self) -> bool {
        self.tag.eq_ignore_ascii_case(JSON_TAG)
    }

    /// An untagged fence whose info line has ended
    fn is_untagged(&self) -> bool {
        self.tag.is_empty() && self.tag_complete
    }

    /// A tag still being typed that could become `json`
    fn could_become_json(&self) -> bool {
        !self.tag_complete && JSON_TAG.starts_with(self.tag.to_ascii_lowercase().as_str())
    }
}

/// A fence that has found its closing backticks
#[derive(Debug, Clone, PartialEq)]
struct Fence<'a> {
    start: usize,
    /// Interior between the info line and the closing fence
    body: &'a str,
    /// Offset just past the closing backticks
    end: usize,
}

/// Every run of ``` in `text`. Openers are not paired with each other, so a
/// stray fence in the prose does not shift the fences after it.
fn openers(text: &str) -> Vec<Opener<'_>> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(FENCE) {
        let start = cursor + offset;
        let after_ticks = start + FENCE.len();

        let tag_len = text[after_ticks..]
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-')
            .unwrap_or(text.len() - after_ticks);
        let tag = &text[after_ticks..after_ticks + tag_len];

        // Skip the remainder of the info line (trailing spaces, then one newline)
        let rest = &text[after_ticks + tag_len..];
        let trailing_ws = rest.len() - rest.trim_start_matches([' ', '\t', '\r']).len();
        let mut body_start = after_ticks + tag_len + trailing_ws;
        let tag_complete = text[body_start..].starts_with('\n');
        if tag_complete {
            body_start += 1;
        }

        found.push(Opener {
            start,
            tag,
            tag_complete,
            body_start,
        });
        cursor = after_ticks;
    }

    found
}

/// The next closing fence after `opener`, if one has arrived
fn close<'a>(text: &'a str, opener: &Opener<'_>) -> Option<Fence<'a>> {
    let close_start = opener.body_start + text[opener.body_start..].find(FENCE)?;
    Some(Fence {
        start: opener.start,
        body: &text[opener.body_start..close_start],
        end: close_start + FENCE.len(),
    })
}

/// Backticks at the very end of the text that start a new block rather than
/// close the block opened before them
fn typing_opener<'a, 'b>(text: &str, openers: &'b [Opener<'a>]) -> Option<&'b Opener<'a>> {
    let mut open = false;
    for opener in openers {
        if !opener.tag_complete && opener.body_start == text.len() {
            return (!open).then_some(opener);
        }
        if open {
            open = false;
        } else if opener.tag_complete {
            open = true;
        }
    }
    None
}

/// Classify the current text of a message
pub fn classify(text: &str) -> ContentClassification {
    if let Some(classification) = classify_raw_object(text) {
        return classification;
    }

    let openers = openers(text);

    if let Some(classification) = classify_fenced(text, &openers) {
        return classification;
    }

    let open_json = openers
        .iter()
        .find(|o| o.is_json() && close(text, o).is_none())
        .or_else(|| typing_opener(text, &openers).filter(|o| o.could_become_json()));
    if let Some(open) = open_json {
        return ContentClassification::StreamingDirective {
            text_before: text[..open.start].trim().to_string(),
        };
    }

    ContentClassification::PlainText
}

/// Rule 1: the whole message is one JSON object (persisted receipts)
fn classify_raw_object(text: &str) -> Option<ContentClassification> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return None;
    }

    let value = serde_json::from_str::<Value>(trimmed).ok()?;
    let directive = shapes::recognize(value)?;
    Some(ContentClassification::CompleteDirective {
        directive,
        text_before: String::new(),
        text_after: String::new(),
    })
}

/// Rule 2: the first closed `json` fence, else the first closed untagged
/// fence whose interior opens an object
fn classify_fenced(text: &str, openers: &[Opener<'_>]) -> Option<ContentClassification> {
    let fence = openers
        .iter()
        .filter(|o| o.is_json())
        .find_map(|o| close(text, o))
        .or_else(|| {
            openers
                .iter()
                .filter(|o| o.is_untagged())
                .filter_map(|o| close(text, o))
                .find(|f| f.body.trim_start().starts_with('{'))
        })?;

    let text_before = text[..fence.start].trim().to_string();
    let text_after = text[fence.end..].trim().to_string();

    let raw = fence.body.trim();
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(e) => {
            debug!("Fenced directive failed to parse: {}", e);
            return Some(ContentClassification::ParseError {
                raw: raw.to_string(),
                message: e.to_string(),
                text_before,
                text_after,
            });
        }
    };

    let directive = shapes::recognize_wrapped(value)?;
    Some(ContentClassification::CompleteDirective {
        directive,
        text_before,
        text_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::types::{Directive, DirectiveKind};

    #[test]
    fn test_openers_and_closes() {
        let text = "a\n```python\nx = 1\n```\nb\n```json\n{}\n```\nc";
        let found = openers(text);
        assert_eq!(found.len(), 4);
        assert_eq!(found[0].tag, "python");
        assert_eq!(close(text, &found[0]).unwrap().body, "x = 1\n");
        assert!(found[2].is_json());
        assert_eq!(close(text, &found[2]).unwrap().body, "{}\n");
        assert!(close(text, &found[3]).is_none());
    }

    #[test]
    fn test_unclosed_json_opener() {
        let text = "intro\n```json\n{\"to\":";
        let found = openers(text);
        assert_eq!(found.len(), 1);
        assert!(found[0].tag_complete);
        assert_eq!(found[0].start, 6);
        assert!(close(text, &found[0]).is_none());
    }

    #[test]
    fn test_stray_fence_in_prose_does_not_hide_directive() {
        let text = "Para código usa ``` al inicio.\n```json\n{\"to\":\"a@x.com\",\"subject\":\"S\",\"body\":\"B\"}\n```\nListo, ¿lo envío?";
        let ContentClassification::CompleteDirective {
            directive,
            text_before,
            text_after,
        } = classify(text)
        else {
            panic!("expected directive");
        };
        assert_eq!(directive.kind(), DirectiveKind::EmailDraft);
        assert_eq!(text_before, "Para código usa ``` al inicio.");
        assert_eq!(text_after, "Listo, ¿lo envío?");
    }

    #[test]
    fn test_stray_fence_before_open_json_is_streaming() {
        let text = "Usa ``` así.\n```json\n{\"to\":\"a@";
        assert_eq!(
            classify(text),
            ContentClassification::StreamingDirective {
                text_before: "Usa ``` así.".to_string()
            }
        );
        // A lone inline fence is just prose
        assert_eq!(
            classify("Usa ``` así, sin más."),
            ContentClassification::PlainText
        );
    }

    #[test]
    fn test_parse_error_keeps_surrounding_prose() {
        let text = "Aquí tienes el protocolo:\n```json\n{not valid}\n```\nAvísame si procedes.";
        let ContentClassification::ParseError {
            raw,
            text_before,
            text_after,
            ..
        } = classify(text)
        else {
            panic!("expected parse error");
        };
        assert_eq!(raw, "{not valid}");
        assert_eq!(text_before, "Aquí tienes el protocolo:");
        assert_eq!(text_after, "Avísame si procedes.");
    }

    #[test]
    fn test_closing_backticks_at_the_end_are_not_an_opener() {
        assert_eq!(
            classify("Ejemplo:\n```python\nx = 1\n```"),
            ContentClassification::PlainText
        );
        assert!(matches!(
            classify("Ejemplo:\n```python\nx = 1\n```\nAhora:\n```"),
            ContentClassification::StreamingDirective { .. }
        ));
    }

    #[test]
    fn test_plain_prose() {
        assert_eq!(
            classify("Hola, ¿en qué te puedo ayudar?"),
            ContentClassification::PlainText
        );
        assert_eq!(classify(""), ContentClassification::PlainText);
    }

    #[test]
    fn test_code_block_in_other_language_is_prose() {
        let text = "Ejemplo:\n```python\nprint('hola')\n```\nListo.";
        assert_eq!(classify(text), ContentClassification::PlainText);
    }

    #[test]
    fn test_untagged_non_object_block_is_prose() {
        let text = "Ejemplo:\n```\nsolo texto\n```";
        assert_eq!(classify(text), ContentClassification::PlainText);
    }

    #[test]
    fn test_untagged_object_block_is_a_directive() {
        let text = "Borrador:\n```\n{\"to\":\"a@x.com\",\"subject\":\"S\",\"body\":\"B\"}\n```";
        assert_eq!(classify(text).kind(), Some(DirectiveKind::EmailDraft));
    }

    #[test]
    fn test_json_fence_preferred_over_earlier_untagged() {
        let text = concat!(
            "```\n{\"to\":\"a@x.com\",\"subject\":\"S\",\"body\":\"B\"}\n```\n",
            "y luego\n",
            "```json\n{\"summary\":\"R\",\"start_time\":\"2025-01-01T10:00\",\"end_time\":\"2025-01-01T11:00\"}\n```"
        );
        assert_eq!(classify(text).kind(), Some(DirectiveKind::CalendarDraft));
    }

    #[test]
    fn test_first_json_fence_wins() {
        let text = concat!(
            "```json\n{\"to\":\"a@x.com\",\"subject\":\"S\",\"body\":\"B\"}\n```\n",
            "```json\n{\"protocol_name\":\"P\",\"steps\":[]}\n```"
        );
        let ContentClassification::CompleteDirective { directive, text_after, .. } =
            classify(text)
        else {
            panic!("expected directive");
        };
        assert_eq!(directive.kind(), DirectiveKind::EmailDraft);
        assert!(text_after.starts_with("```json"));
    }

    #[test]
    fn test_raw_object_with_unknown_shape_is_prose() {
        assert_eq!(
            classify("{\"hello\": \"world\"}"),
            ContentClassification::PlainText
        );
    }

    #[test]
    fn test_partial_tag_counts_as_streaming() {
        for prefix in ["```", "```j", "```js", "Mira:\n```jso"] {
            assert!(
                matches!(
                    classify(prefix),
                    ContentClassification::StreamingDirective { .. }
                ),
                "prefix {:?} should be streaming",
                prefix
            );
        }
        // A finished info line that is not json is ordinary prose
        assert_eq!(
            classify("```rust\nfn main() {"),
            ContentClassification::PlainText
        );
    }

    #[test]
    fn test_fenced_success_receipt() {
        let text = "Listo:\n```json\n{\"type\":\"calendar_success\",\"summary\":\"R\",\"start_time\":\"2025-01-01T10:00\",\"end_time\":\"2025-01-01T11:00\",\"event_id\":\"ev1\"}\n```";
        let classification = classify(text);
        let Some(Directive::CalendarSuccess(receipt)) = classification.directive() else {
            panic!("expected calendar receipt, got {:?}", classification);
        };
        assert_eq!(receipt.delivery.event_id.as_deref(), Some("ev1"));
    }
}
