// Directive payloads and content classification
//
// Payload structs mirror the JSON the assistant embeds in its replies.
// Classification is derived from message text and never stored.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// The structured shapes a directive can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Protocol,
    EmailDraft,
    CalendarDraft,
    EmailSuccess,
    CalendarSuccess,
}

impl DirectiveKind {
    /// Map an explicit `type` discriminator to a kind
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "protocol" => Some(Self::Protocol),
            "email_draft" | "email" => Some(Self::EmailDraft),
            "calendar_draft" | "calendar_event" | "calendar" => Some(Self::CalendarDraft),
            "email_success" | "email_sent" => Some(Self::EmailSuccess),
            "calendar_success" | "calendar_event_created" => Some(Self::CalendarSuccess),
            _ => None,
        }
    }

    /// Draft kinds are user-editable and end in a side effect
    pub fn is_draft(self) -> bool {
        matches!(self, Self::EmailDraft | Self::CalendarDraft)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protocol => "protocol",
            Self::EmailDraft => "email_draft",
            Self::CalendarDraft => "calendar_draft",
            Self::EmailSuccess => "email_success",
            Self::CalendarSuccess => "calendar_success",
        }
    }
}

impl std::fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of an action protocol. `id` is the 1-based position in the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, skip_deserializing)]
    pub id: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub protocol_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_instruction: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<Step>,
}

impl ProtocolPayload {
    /// Renumber steps by sequence position, ignoring whatever ids the model wrote
    pub(crate) fn normalize_step_ids(&mut self) {
        for (index, step) in self.steps.iter_mut().enumerate() {
            step.id = index as u32 + 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDraft {
    #[serde(default, deserialize_with = "null_as_default")]
    pub to: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDraft {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attendees: Vec<String>,
}

impl CalendarDraft {
    pub fn start(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.start_time)
    }

    pub fn end(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.end_time)
    }
}

/// Accepts RFC 3339 and the offset-less `YYYY-MM-DDTHH:MM[:SS]` form models
/// tend to emit; the latter is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Delivery details attached to a success receipt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailReceipt {
    #[serde(flatten)]
    pub draft: EmailDraft,
    #[serde(flatten)]
    pub delivery: Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarReceipt {
    #[serde(flatten)]
    pub draft: CalendarDraft,
    #[serde(flatten)]
    pub delivery: Delivery,
}

/// Missing and `null` fields both read as empty. The kind is decided before
/// the payload is read, so a sparse payload still lands in its kind.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A parsed directive, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Directive {
    Protocol(ProtocolPayload),
    EmailDraft(EmailDraft),
    CalendarDraft(CalendarDraft),
    EmailSuccess(EmailReceipt),
    CalendarSuccess(CalendarReceipt),
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Protocol(_) => DirectiveKind::Protocol,
            Directive::EmailDraft(_) => DirectiveKind::EmailDraft,
            Directive::CalendarDraft(_) => DirectiveKind::CalendarDraft,
            Directive::EmailSuccess(_) => DirectiveKind::EmailSuccess,
            Directive::CalendarSuccess(_) => DirectiveKind::CalendarSuccess,
        }
    }
}

/// What the current text of a message is, structurally
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "classification", rename_all = "snake_case")]
pub enum ContentClassification {
    PlainText,
    CompleteDirective {
        directive: Directive,
        text_before: String,
        text_after: String,
    },
    /// A `json` fence has opened and its closing fence has not arrived yet
    StreamingDirective { text_before: String },
    /// The fenced interior is not valid JSON
    ParseError {
        raw: String,
        message: String,
        text_before: String,
        text_after: String,
    },
}

impl ContentClassification {
    pub fn directive(&self) -> Option<&Directive> {
        match self {
            ContentClassification::CompleteDirective { directive, .. } => Some(directive),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<DirectiveKind> {
        self.directive().map(Directive::kind)
    }
}
