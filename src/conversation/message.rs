// Chat messages
//
// A message is created when a turn starts. Assistant messages grow while
// their reply streams and are frozen once `is_streaming` goes false.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directive::{self, ContentClassification};

/// Unique identifier for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One part of a multimodal user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text { value: String },
    FileRef { uri: String },
}

/// Message body: a plain string, or ordered parts for multimodal user input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageText {
    Plain(String),
    Parts(Vec<MessagePart>),
}

impl MessageText {
    /// Concatenated text parts; file references are skipped
    pub fn as_plain(&self) -> String {
        match self {
            MessageText::Plain(text) => text.clone(),
            MessageText::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    MessagePart::Text { value } => Some(value.as_str()),
                    MessagePart::FileRef { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl Default for MessageText {
    fn default() -> Self {
        MessageText::Plain(String::new())
    }
}

/// Attachment descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: MessageId,
    pub sender: Sender,
    pub text: MessageText,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
    /// Follow-up questions, assistant only
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub is_streaming: bool,
    /// Transport failure that ended the turn early; `text` keeps what arrived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            sender: Sender::User,
            text: MessageText::Plain(text.into()),
            files: Vec::new(),
            suggestions: Vec::new(),
            is_streaming: false,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// User message with text and file parts
    pub fn user_parts(parts: Vec<MessagePart>, files: Vec<FileAttachment>) -> Self {
        Self {
            text: MessageText::Parts(parts),
            files,
            ..Self::user(String::new())
        }
    }

    /// Empty assistant message at the start of a streamed turn
    pub fn assistant_streaming() -> Self {
        Self {
            id: MessageId::new(),
            sender: Sender::Assistant,
            text: MessageText::Plain(String::new()),
            files: Vec::new(),
            suggestions: Vec::new(),
            is_streaming: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Finished assistant message, e.g. loaded from history
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: MessageText::Plain(text.into()),
            is_streaming: false,
            ..Self::assistant_streaming()
        }
    }

    pub fn plain_text(&self) -> String {
        self.text.as_plain()
    }

    /// Classification of the current text. User messages are never directives.
    pub fn classify(&self) -> ContentClassification {
        match self.sender {
            Sender::Assistant => directive::classify(&self.plain_text()),
            Sender::User => ContentClassification::PlainText,
        }
    }
}
