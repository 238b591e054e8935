// Draft state registry
//
// One controller per (message, draft kind), created the first time the
// draft is rendered and kept until the message is released. Once created,
// the controller is what a later render sees, whatever the text of the
// message is reclassified as.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::controller::{DraftInteractionController, DraftKey};
use crate::conversation::MessageId;
use crate::directive::{ContentClassification, DirectiveKind};

#[derive(Debug, Default)]
pub struct DraftRegistry {
    entries: DashMap<DraftKey, Arc<DraftInteractionController>>,
}

impl DraftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller for the draft in `classification`, creating it on first
    /// sight. `None` unless the classification is a complete draft directive.
    pub fn track(
        &self,
        message_id: MessageId,
        classification: &ContentClassification,
    ) -> Option<Arc<DraftInteractionController>> {
        let directive = classification.directive()?;
        let kind = directive.kind();
        if !kind.is_draft() {
            return None;
        }

        let key = DraftKey { message_id, kind };
        if let Some(existing) = self.entries.get(&key) {
            return Some(existing.value().clone());
        }

        let controller = Arc::new(DraftInteractionController::for_directive(
            message_id, directive,
        )?);
        let entry = self.entries.entry(key).or_insert_with(|| {
            debug!("Tracking {} draft for message {}", kind, message_id);
            controller
        });
        Some(entry.value().clone())
    }

    pub fn get(
        &self,
        message_id: MessageId,
        kind: DirectiveKind,
    ) -> Option<Arc<DraftInteractionController>> {
        self.entries
            .get(&DraftKey { message_id, kind })
            .map(|entry| entry.value().clone())
    }

    /// A draft on this message that has already been sent or cancelled
    pub fn resolved_for(&self, message_id: MessageId) -> Option<Arc<DraftInteractionController>> {
        [DirectiveKind::EmailDraft, DirectiveKind::CalendarDraft]
            .into_iter()
            .filter_map(|kind| self.get(message_id, kind))
            .find(|controller| controller.state().is_terminal())
    }

    /// Forget all draft state of a message. Returns how many drafts were dropped.
    pub fn release_message(&self, message_id: MessageId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.message_id != message_id);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
