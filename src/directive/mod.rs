// Directives embedded in assistant replies
//
// An assistant reply is prose that may carry one structured payload: an
// action protocol, an email or calendar draft, or the receipt of a draft
// that was already delivered. This module recognizes those payloads in the
// accumulated reply text.

pub mod classifier;
pub mod shapes;
pub mod types;

pub use classifier::classify;
pub use types::{
    parse_timestamp, CalendarDraft, CalendarReceipt, ContentClassification, Delivery, Directive,
    DirectiveKind, EmailDraft, EmailReceipt, ProtocolPayload, Step,
};
