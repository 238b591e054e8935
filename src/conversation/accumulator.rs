// Message accumulator
//
// Owns the growing state of one in-flight assistant message: the reply
// text, a single status line and the suggestion list. The classification
// is recomputed from the whole text after every content event rather than
// patched incrementally.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::message::{Message, MessageText};
use crate::directive::{self, ContentClassification};
use crate::errors::StreamError;
use crate::stream::{StreamEvent, StreamReader};

/// Which slot an applied event changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Status,
    Content,
    Suggestions,
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    Failed(StreamError),
}

pub struct MessageAccumulator {
    message: Message,
    buffer: String,
    status: Option<String>,
    classification: ContentClassification,
}

impl MessageAccumulator {
    /// Start accumulating a fresh assistant message
    pub fn new() -> Self {
        Self::for_message(Message::assistant_streaming())
    }

    /// Continue accumulating into `message`
    pub fn for_message(message: Message) -> Self {
        let buffer = message.plain_text();
        let classification = directive::classify(&buffer);
        Self {
            message,
            buffer,
            status: None,
            classification,
        }
    }

    /// Apply one event. Returns `None` once the message has been finished.
    pub fn apply(&mut self, event: StreamEvent) -> Option<Change> {
        if !self.message.is_streaming {
            warn!(
                "Ignoring stream event for finished message {}",
                self.message.id
            );
            return None;
        }

        match event {
            StreamEvent::Thinking(text) => {
                self.status = Some(text);
                Some(Change::Status)
            }
            StreamEvent::Content(delta) => {
                self.buffer.push_str(&delta);
                self.classification = directive::classify(&self.buffer);
                Some(Change::Content)
            }
            StreamEvent::Suggestions(items) => {
                if !self.message.suggestions.is_empty() {
                    debug!("Replacing earlier suggestions for {}", self.message.id);
                }
                self.message.suggestions = items;
                Some(Change::Suggestions)
            }
        }
    }

    /// Record a transport failure. The text received so far is kept.
    pub fn fail(&mut self, error: &StreamError) {
        self.message.error = Some(error.to_string());
    }

    /// Freeze the message: stop streaming and clear the status line
    pub fn finish(&mut self) {
        self.message.text = MessageText::Plain(self.buffer.clone());
        self.message.is_streaming = false;
        self.status = None;
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn suggestions(&self) -> &[String] {
        &self.message.suggestions
    }

    pub fn classification(&self) -> &ContentClassification {
        &self.classification
    }

    pub fn is_streaming(&self) -> bool {
        self.message.is_streaming
    }

    pub fn id(&self) -> super::message::MessageId {
        self.message.id
    }

    /// Snapshot of the message with the current text
    pub fn message(&self) -> Message {
        let mut message = self.message.clone();
        message.text = MessageText::Plain(self.buffer.clone());
        message
    }

    /// Finish and hand back the message
    pub fn into_message(mut self) -> Message {
        self.finish();
        self.message
    }
}

impl Default for MessageAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull events from `reader` into `accumulator` until the stream closes,
/// fails, or `cancel` fires. `on_update` runs after every applied event.
/// The message is always finished on return.
pub async fn drive<F>(
    reader: &mut StreamReader,
    accumulator: &mut MessageAccumulator,
    cancel: &CancellationToken,
    mut on_update: F,
) -> TurnOutcome
where
    F: FnMut(&MessageAccumulator, Change),
{
    let outcome = loop {
        match reader.next().await {
            Some(Ok(event)) => {
                if let Some(change) = accumulator.apply(event) {
                    on_update(accumulator, change);
                }
            }
            Some(Err(e)) => {
                accumulator.fail(&e);
                break TurnOutcome::Failed(e);
            }
            None if cancel.is_cancelled() || reader.is_cancelled() => {
                break TurnOutcome::Cancelled;
            }
            None => break TurnOutcome::Completed,
        }
    };

    accumulator.finish();
    info!(
        "Turn for message {} ended: {:?} ({} chars)",
        accumulator.id(),
        outcome,
        accumulator.text().len()
    );
    outcome
}
