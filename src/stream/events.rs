// Stream records and their decoding
//
// The backend writes one JSON record per line:
//   {"type":"thinking","content":"..."}
//   {"type":"content","content":"..."}
//   {"type":"suggestions","content":["...", "..."]}
// Anything else is recovered here and never fails the stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A decoded stream record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Replaces the status line
    Thinking(String),
    /// Appended to the reply text
    Content(String),
    /// Replaces the follow-up suggestions
    Suggestions(Vec<String>),
}

/// What to do with a record whose `type` is not one we know
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownRecordPolicy {
    /// Show its `content`/`response` text as reply content
    #[default]
    Literal,
    /// Log it and drop it
    Drop,
}

/// Decode one line into an event. `None` means the line carries nothing to show.
pub fn decode_record(line: &str, policy: UnknownRecordPolicy) -> Option<StreamEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    // Tolerate SSE framing around the same records
    let (payload, raw_text) = match trimmed.strip_prefix("data:") {
        Some(data) => {
            let data = data.trim();
            if data.is_empty() || data == "[DONE]" {
                return None;
            }
            (data, data)
        }
        None => (trimmed, line),
    };

    if let Ok(event) = serde_json::from_str::<StreamEvent>(payload) {
        return Some(event);
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(obj)) => {
            let record_type = obj.get("type").and_then(Value::as_str).unwrap_or("<none>");
            let text = obj
                .get("content")
                .and_then(Value::as_str)
                .or_else(|| obj.get("response").and_then(Value::as_str));

            match (text, policy) {
                (Some(text), UnknownRecordPolicy::Literal) => {
                    debug!("Unrecognized record type '{}' shown as content", record_type);
                    Some(StreamEvent::Content(text.to_string()))
                }
                (Some(_), UnknownRecordPolicy::Drop) => {
                    warn!("Dropping unrecognized record type '{}'", record_type);
                    None
                }
                (None, _) => {
                    warn!("Dropping record type '{}' with no text", record_type);
                    None
                }
            }
        }
        Ok(_) => Some(StreamEvent::Content(format!("{}\n", raw_text))),
        Err(e) => {
            if payload.starts_with('{') {
                warn!("Dropping malformed JSON record: {}", e);
                None
            } else {
                Some(StreamEvent::Content(format!("{}\n", raw_text)))
            }
        }
    }
}
