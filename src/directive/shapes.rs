// Directive shape recognition
//
// A parsed JSON object is matched against an explicit `type` tag first and
// then against an ordered list of field-shape rules. The order of
// SHAPE_RULES is the precedence contract: a payload carrying the fields of
// several kinds resolves to the earliest rule.

use serde_json::{Map, Value};
use tracing::debug;

use super::types::{
    CalendarDraft, CalendarReceipt, Directive, DirectiveKind, EmailDraft, EmailReceipt,
    ProtocolPayload,
};

/// Field-shape rule: a kind and the predicate that recognizes it
struct ShapeRule {
    kind: DirectiveKind,
    matches: fn(&Map<String, Value>) -> bool,
}

const SHAPE_RULES: &[ShapeRule] = &[
    ShapeRule {
        kind: DirectiveKind::Protocol,
        matches: is_protocol_shape,
    },
    ShapeRule {
        kind: DirectiveKind::EmailDraft,
        matches: is_email_shape,
    },
    ShapeRule {
        kind: DirectiveKind::CalendarDraft,
        matches: is_calendar_shape,
    },
];

/// Keys under which the backend nests a draft one level deep, with the kind
/// the wrapper implies when the inner object carries no discriminator.
const WRAPPERS: &[(&str, DirectiveKind)] = &[
    ("prepare_email", DirectiveKind::EmailDraft),
    ("email_preparation", DirectiveKind::EmailDraft),
    ("draft_email", DirectiveKind::EmailDraft),
    ("prepare_calendar_event", DirectiveKind::CalendarDraft),
    ("calendar_preparation", DirectiveKind::CalendarDraft),
    ("create_calendar_event", DirectiveKind::CalendarDraft),
];

fn has_all(obj: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().all(|k| obj.contains_key(*k))
}

fn is_protocol_shape(obj: &Map<String, Value>) -> bool {
    has_all(obj, &["protocol_name", "steps"])
}

fn is_email_shape(obj: &Map<String, Value>) -> bool {
    has_all(obj, &["to", "subject", "body"])
}

fn is_calendar_shape(obj: &Map<String, Value>) -> bool {
    has_all(obj, &["summary", "start_time", "end_time"])
}

/// Decide which kind an object is, without building the payload
pub fn identify(value: &Value) -> Option<DirectiveKind> {
    let obj = value.as_object()?;

    if let Some(kind) = obj
        .get("type")
        .and_then(Value::as_str)
        .and_then(DirectiveKind::from_type_tag)
    {
        return Some(kind);
    }

    SHAPE_RULES
        .iter()
        .find(|rule| (rule.matches)(obj))
        .map(|rule| rule.kind)
}

/// Deserialize `value` as the payload of `kind`
pub fn build(kind: DirectiveKind, value: Value) -> Option<Directive> {
    let built = match kind {
        DirectiveKind::Protocol => {
            serde_json::from_value::<ProtocolPayload>(value).map(|mut protocol| {
                protocol.normalize_step_ids();
                Directive::Protocol(protocol)
            })
        }
        DirectiveKind::EmailDraft => {
            serde_json::from_value::<EmailDraft>(value).map(Directive::EmailDraft)
        }
        DirectiveKind::CalendarDraft => {
            serde_json::from_value::<CalendarDraft>(value).map(Directive::CalendarDraft)
        }
        DirectiveKind::EmailSuccess => {
            serde_json::from_value::<EmailReceipt>(value).map(Directive::EmailSuccess)
        }
        DirectiveKind::CalendarSuccess => {
            serde_json::from_value::<CalendarReceipt>(value).map(Directive::CalendarSuccess)
        }
    };

    match built {
        Ok(directive) => Some(directive),
        Err(e) => {
            debug!("Object looked like {} but did not fit: {}", kind, e);
            None
        }
    }
}

/// Recognize a top-level directive object
pub fn recognize(value: Value) -> Option<Directive> {
    let kind = identify(&value)?;
    build(kind, value)
}

/// Recognize a directive that may be nested one level under a wrapper key
pub fn recognize_wrapped(value: Value) -> Option<Directive> {
    if let Some((key, hint)) = find_wrapper(&value) {
        let inner = value.get(key).cloned().unwrap_or(Value::Null);
        let kind = identify(&inner).unwrap_or(hint);
        debug!("Unwrapped '{}' directive as {}", key, kind);
        return build(kind, inner);
    }
    recognize(value)
}

fn find_wrapper(value: &Value) -> Option<(&'static str, DirectiveKind)> {
    let obj = value.as_object()?;
    WRAPPERS
        .iter()
        .find(|(key, _)| obj.get(*key).is_some_and(Value::is_object))
        .copied()
}
