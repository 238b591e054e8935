// Conversation: the ordered history of one chat session
//
// Each conversation owns its messages and its draft state; nothing is
// shared between conversations, so several can stream at once.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::accumulator::{drive, Change, MessageAccumulator, TurnOutcome};
use super::message::{Message, MessageId, Sender};
use crate::config::StreamConfig;
use crate::draft::DraftRegistry;
use crate::render::{self, DirectiveView};
use crate::stream::{ChatRequest, ChatTransport, StreamReader};

pub struct Conversation {
    session_id: String,
    case_id: Option<String>,
    title: Option<String>,
    messages: Vec<Message>,
    drafts: DraftRegistry,
}

impl Conversation {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            case_id: None,
            title: None,
            messages: Vec::new(),
            drafts: DraftRegistry::new(),
        }
    }

    /// Rebuild a conversation from persisted messages. Any message still
    /// marked as streaming is treated as finished.
    pub fn from_history(session_id: impl Into<String>, history: Vec<Message>) -> Self {
        let mut conversation = Self::new(session_id);
        conversation.messages = history
            .into_iter()
            .map(|mut message| {
                if message.is_streaming {
                    warn!("Loaded message {} still marked as streaming", message.id);
                    message.is_streaming = false;
                }
                message
            })
            .collect();
        conversation
    }

    pub fn with_case(mut self, case_id: impl Into<String>) -> Self {
        self.case_id = Some(case_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Assistant)
    }

    pub fn drafts(&self) -> &DraftRegistry {
        &self.drafts
    }

    fn request_for(&self, text: &str) -> ChatRequest {
        let mut request = ChatRequest::new(text, self.session_id.clone());
        if let Some(case_id) = &self.case_id {
            request = request.with_case(case_id.clone());
        }
        if let Some(title) = &self.title {
            request = request.with_title(title.clone());
        }
        request
    }

    /// Run one turn: record the user message, stream the assistant reply
    /// into a new message and append it once the stream ends.
    ///
    /// A transport failure is reported through the outcome and stored on
    /// the assistant message; the text received before it is kept.
    pub async fn send<F>(
        &mut self,
        transport: &dyn ChatTransport,
        text: &str,
        cancel: &CancellationToken,
        config: &StreamConfig,
        on_update: F,
    ) -> TurnOutcome
    where
        F: FnMut(&MessageAccumulator, Change),
    {
        let request = self.request_for(text);
        self.messages.push(Message::user(text));

        let mut accumulator = MessageAccumulator::new();
        info!(
            "Starting turn {} in session {}",
            accumulator.id(),
            self.session_id
        );

        let outcome = match StreamReader::open(transport, &request, cancel, config).await {
            Ok(mut reader) => drive(&mut reader, &mut accumulator, cancel, on_update).await,
            Err(e) => {
                tracing::error!("Could not open reply stream: {}", e);
                accumulator.fail(&e);
                accumulator.finish();
                TurnOutcome::Failed(e)
            }
        };

        self.messages.push(accumulator.into_message());
        outcome
    }

    /// View of a message, with any draft state applied
    pub fn view(&self, id: MessageId) -> Option<DirectiveView> {
        self.message(id)
            .map(|message| render::resolve(message, &self.drafts))
    }

    /// Drop a message (e.g. when it is regenerated) and its draft state
    pub fn remove_message(&mut self, id: MessageId) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        self.drafts.release_message(id);
        Some(self.messages.remove(index))
    }
}
