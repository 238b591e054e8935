// Directive views
//
// Resolves a message into what the frontend should show. For draft kinds
// the controller state wins over the text: once a draft is sent or
// cancelled the message renders as a receipt or dismissal even if its text
// would classify differently.

use std::sync::Arc;

use super::markup::Document;
use crate::conversation::{Message, MessageId, Sender};
use crate::directive::{ContentClassification, Directive, DirectiveKind, ProtocolPayload};
use crate::draft::{DraftInteractionController, DraftReceipt, DraftRegistry, DraftState};

#[derive(Debug, Clone)]
pub enum DirectiveView {
    /// Ordinary prose
    Prose(Document),
    /// A directive is arriving; show the prose before it and a placeholder
    Streaming { before: Document },
    Protocol {
        before: Document,
        protocol: ProtocolPayload,
        after: Document,
    },
    /// Editable draft with its live controller
    Draft {
        before: Document,
        controller: Arc<DraftInteractionController>,
        after: Document,
    },
    /// Delivered draft, either persisted as a success directive or sent here
    Receipt {
        before: Document,
        receipt: DraftReceipt,
        after: Document,
    },
    /// Cancelled draft; the prose around it still shows
    Dismissed {
        before: Document,
        kind: DirectiveKind,
        after: Document,
    },
    ParseError {
        before: Document,
        raw: String,
        message: String,
        after: Document,
    },
}

/// View of a finished or in-flight message
pub fn resolve(message: &Message, registry: &DraftRegistry) -> DirectiveView {
    let text = message.plain_text();
    if message.sender == Sender::User {
        return DirectiveView::Prose(Document::parse(&text));
    }
    resolve_classified(message.id, &text, &message.classify(), registry)
}

/// View for a message whose classification is already at hand
pub fn resolve_classified(
    message_id: MessageId,
    text: &str,
    classification: &ContentClassification,
    registry: &DraftRegistry,
) -> DirectiveView {
    let controller = match classification.kind() {
        Some(kind) if kind.is_draft() => registry.track(message_id, classification),
        _ => registry.resolved_for(message_id),
    };

    let (before, after) = surroundings(text, classification);

    if let Some(controller) = controller {
        match controller.state() {
            DraftState::Sent(receipt) => {
                return DirectiveView::Receipt {
                    before,
                    receipt,
                    after,
                }
            }
            DraftState::Cancelled => {
                return DirectiveView::Dismissed {
                    before,
                    kind: controller.kind(),
                    after,
                }
            }
            DraftState::Pending { .. } => {
                if classification.kind().is_some_and(DirectiveKind::is_draft) {
                    return DirectiveView::Draft {
                        before,
                        controller,
                        after,
                    };
                }
            }
        }
    }

    match classification {
        ContentClassification::PlainText => DirectiveView::Prose(Document::parse(text)),
        ContentClassification::StreamingDirective { .. } => DirectiveView::Streaming { before },
        ContentClassification::ParseError { raw, message, .. } => DirectiveView::ParseError {
            before,
            raw: raw.clone(),
            message: message.clone(),
            after,
        },
        ContentClassification::CompleteDirective { directive, .. } => match directive {
            Directive::Protocol(protocol) => DirectiveView::Protocol {
                before,
                protocol: protocol.clone(),
                after,
            },
            Directive::EmailSuccess(_) | Directive::CalendarSuccess(_) => {
                match DraftReceipt::from_directive(directive) {
                    Some(receipt) => DirectiveView::Receipt {
                        before,
                        receipt,
                        after,
                    },
                    None => DirectiveView::Prose(Document::parse(text)),
                }
            }
            // Tracked above; only reachable if the payload could not seed a controller
            Directive::EmailDraft(_) | Directive::CalendarDraft(_) => {
                DirectiveView::Prose(Document::parse(text))
            }
        },
    }
}

/// Prose around the directive. Text with no directive in it is all `before`.
fn surroundings(text: &str, classification: &ContentClassification) -> (Document, Document) {
    match classification {
        ContentClassification::CompleteDirective {
            text_before,
            text_after,
            ..
        }
        | ContentClassification::ParseError {
            text_before,
            text_after,
            ..
        } => (Document::parse(text_before), Document::parse(text_after)),
        ContentClassification::StreamingDirective { text_before } => {
            (Document::parse(text_before), Document::default())
        }
        ContentClassification::PlainText => (Document::parse(text), Document::default()),
    }
}
