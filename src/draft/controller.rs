// Draft interaction controller
//
// Lifecycle of one draft directive on one message:
//
//   Pending --submit ok--> Sent       (terminal)
//   Pending --cancel-----> Cancelled  (terminal)
//   Pending --submit err-> Pending    (error kept for display, retry allowed)
//
// Edits go to a private copy of the fields, never to the classified
// payload. At most one submission runs at a time; the guard lives under the
// same lock as the state so that cancel and submit cannot interleave.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::dispatcher::{DraftDispatcher, SubmitContext};
use crate::conversation::MessageId;
use crate::directive::{
    CalendarDraft, CalendarReceipt, Directive, DirectiveKind, EmailDraft, EmailReceipt,
};
use crate::errors::{DraftError, SubmitError};

/// Identifies the draft state of one directive kind on one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub message_id: MessageId,
    pub kind: DirectiveKind,
}

/// Editable fields of a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "fields", rename_all = "snake_case")]
pub enum DraftFields {
    Email(EmailDraft),
    Calendar(CalendarDraft),
}

impl DraftFields {
    pub fn from_directive(directive: &Directive) -> Option<Self> {
        match directive {
            Directive::EmailDraft(draft) => Some(DraftFields::Email(draft.clone())),
            Directive::CalendarDraft(draft) => Some(DraftFields::Calendar(draft.clone())),
            _ => None,
        }
    }

    pub fn kind(&self) -> DirectiveKind {
        match self {
            DraftFields::Email(_) => DirectiveKind::EmailDraft,
            DraftFields::Calendar(_) => DirectiveKind::CalendarDraft,
        }
    }

    /// Check the fields before anything leaves the client
    pub fn validate(&self) -> Result<(), SubmitError> {
        match self {
            DraftFields::Email(draft) => {
                let to = draft.to.trim();
                if to.is_empty() {
                    return Err(invalid("to", "a recipient is required"));
                }
                if !to.contains('@') {
                    return Err(invalid("to", format!("'{}' is not an email address", to)));
                }
                if let Some(bad) = draft.cc.iter().find(|cc| !cc.contains('@')) {
                    return Err(invalid("cc", format!("'{}' is not an email address", bad)));
                }
                if draft.subject.trim().is_empty() {
                    return Err(invalid("subject", "a subject is required"));
                }
                Ok(())
            }
            DraftFields::Calendar(draft) => {
                if draft.summary.trim().is_empty() {
                    return Err(invalid("summary", "a title is required"));
                }
                let start = draft
                    .start()
                    .ok_or_else(|| invalid("start_time", "not a valid date and time"))?;
                let end = draft
                    .end()
                    .ok_or_else(|| invalid("end_time", "not a valid date and time"))?;
                if end <= start {
                    return Err(invalid("end_time", "must be after the start"));
                }
                if let Some(bad) = draft.attendees.iter().find(|a| !a.contains('@')) {
                    return Err(invalid(
                        "attendees",
                        format!("'{}' is not an email address", bad),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SubmitError {
    SubmitError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// What a delivered draft turned into
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "receipt", rename_all = "snake_case")]
pub enum DraftReceipt {
    Email(EmailReceipt),
    Calendar(CalendarReceipt),
}

impl DraftReceipt {
    /// Receipt carried by a success directive
    pub fn from_directive(directive: &Directive) -> Option<Self> {
        match directive {
            Directive::EmailSuccess(receipt) => Some(DraftReceipt::Email(receipt.clone())),
            Directive::CalendarSuccess(receipt) => Some(DraftReceipt::Calendar(receipt.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftState {
    Pending { last_error: Option<SubmitError> },
    Sent(DraftReceipt),
    Cancelled,
}

impl DraftState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DraftState::Pending { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            DraftState::Pending { .. } => "pending",
            DraftState::Sent(_) => "sent",
            DraftState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: DraftState,
    editable: DraftFields,
    submitting: bool,
}

#[derive(Debug)]
pub struct DraftInteractionController {
    key: DraftKey,
    original: DraftFields,
    inner: Mutex<Inner>,
}

/// Clears the in-flight flag even if the submit future is dropped midway
struct SubmitGuard<'a> {
    controller: &'a DraftInteractionController,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.controller.lock().submitting = false;
    }
}

impl DraftInteractionController {
    pub fn new(message_id: MessageId, fields: DraftFields) -> Self {
        Self {
            key: DraftKey {
                message_id,
                kind: fields.kind(),
            },
            original: fields.clone(),
            inner: Mutex::new(Inner {
                state: DraftState::Pending { last_error: None },
                editable: fields,
                submitting: false,
            }),
        }
    }

    /// Controller for a draft directive; `None` for other kinds
    pub fn for_directive(message_id: MessageId, directive: &Directive) -> Option<Self> {
        DraftFields::from_directive(directive).map(|fields| Self::new(message_id, fields))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Draft {:?} lock poisoned, recovering", self.key);
                poisoned.into_inner()
            }
        }
    }

    pub fn key(&self) -> DraftKey {
        self.key
    }

    pub fn kind(&self) -> DirectiveKind {
        self.key.kind
    }

    /// Fields as they were classified
    pub fn original(&self) -> &DraftFields {
        &self.original
    }

    /// Fields as the user has edited them
    pub fn editable(&self) -> DraftFields {
        self.lock().editable.clone()
    }

    pub fn state(&self) -> DraftState {
        self.lock().state.clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.lock().submitting
    }

    pub fn last_error(&self) -> Option<SubmitError> {
        match &self.lock().state {
            DraftState::Pending { last_error } => last_error.clone(),
            _ => None,
        }
    }

    fn check_editable(inner: &Inner) -> Result<(), DraftError> {
        if inner.submitting {
            return Err(DraftError::InFlight);
        }
        if inner.state.is_terminal() {
            return Err(DraftError::AlreadyResolved {
                state: inner.state.name(),
            });
        }
        Ok(())
    }

    pub fn edit_email(&self, f: impl FnOnce(&mut EmailDraft)) -> Result<(), DraftError> {
        let mut inner = self.lock();
        Self::check_editable(&inner)?;
        match &mut inner.editable {
            DraftFields::Email(draft) => {
                f(draft);
                Ok(())
            }
            DraftFields::Calendar(_) => Err(DraftError::NotADraft),
        }
    }

    pub fn edit_calendar(&self, f: impl FnOnce(&mut CalendarDraft)) -> Result<(), DraftError> {
        let mut inner = self.lock();
        Self::check_editable(&inner)?;
        match &mut inner.editable {
            DraftFields::Calendar(draft) => {
                f(draft);
                Ok(())
            }
            DraftFields::Email(_) => Err(DraftError::NotADraft),
        }
    }

    /// Throw away edits and start again from the classified fields
    pub fn reset_edits(&self) -> Result<(), DraftError> {
        let mut inner = self.lock();
        Self::check_editable(&inner)?;
        inner.editable = self.original.clone();
        Ok(())
    }

    /// Deliver the edited fields through `dispatcher`.
    ///
    /// Rejected while another submission is running or once the draft is
    /// resolved. On failure the draft stays pending with the error recorded.
    pub async fn submit(
        &self,
        dispatcher: &dyn DraftDispatcher,
        context: &SubmitContext,
    ) -> Result<DraftReceipt, DraftError> {
        let fields = {
            let mut inner = self.lock();
            Self::check_editable(&inner)?;
            inner.submitting = true;
            inner.editable.clone()
        };
        let _guard = SubmitGuard { controller: self };

        if let Err(e) = fields.validate() {
            debug!("Draft {:?} failed validation: {}", self.key, e);
            self.lock().state = DraftState::Pending {
                last_error: Some(e.clone()),
            };
            return Err(e.into());
        }

        let result = match &fields {
            DraftFields::Email(draft) => dispatcher
                .send_email(draft, context)
                .await
                .map(|delivery| {
                    DraftReceipt::Email(EmailReceipt {
                        draft: draft.clone(),
                        delivery,
                    })
                }),
            DraftFields::Calendar(draft) => dispatcher
                .create_event(draft, context)
                .await
                .map(|delivery| {
                    DraftReceipt::Calendar(CalendarReceipt {
                        draft: draft.clone(),
                        delivery,
                    })
                }),
        };

        let mut inner = self.lock();
        match result {
            Ok(receipt) => {
                info!("Draft {:?} delivered", self.key);
                inner.state = DraftState::Sent(receipt.clone());
                Ok(receipt)
            }
            Err(e) => {
                warn!("Draft {:?} delivery failed: {}", self.key, e);
                inner.state = DraftState::Pending {
                    last_error: Some(e.clone()),
                };
                Err(e.into())
            }
        }
    }

    /// Dismiss the draft. Idempotent; a sent draft stays sent.
    ///
    /// Fails with [`DraftError::InFlight`] while a submit is running: the
    /// send may already have happened. Once the submit settles, cancel
    /// applies to whatever state it left.
    pub fn cancel(&self) -> Result<DraftState, DraftError> {
        let mut inner = self.lock();
        if inner.submitting {
            return Err(DraftError::InFlight);
        }
        match inner.state {
            DraftState::Pending { .. } => {
                info!("Draft {:?} cancelled", self.key);
                inner.state = DraftState::Cancelled;
            }
            DraftState::Sent(_) => debug!("Cancel ignored, draft {:?} already sent", self.key),
            DraftState::Cancelled => {}
        }
        Ok(inner.state.clone())
    }
}
