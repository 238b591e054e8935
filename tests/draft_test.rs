// Draft interaction integration tests
//
// Single-flight submission, retries after a failed delivery, and the rule
// that a resolved draft keeps rendering as resolved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use aula::config::{BackendConfig, Config};
use aula::conversation::{Conversation, Message, MessageId};
use aula::directive::{CalendarDraft, Delivery, DirectiveKind, EmailDraft};
use aula::draft::{
    DraftDispatcher, DraftFields, DraftInteractionController, DraftReceipt, DraftState,
    HttpDispatcher, SubmitContext,
};
use aula::errors::{DraftError, SubmitError};
use aula::render::DirectiveView;

const EMAIL_REPLY: &str = "Te dejo el borrador:\n```json\n{\"to\":\"apoderado@familia.cl\",\"subject\":\"Citación\",\"body\":\"Estimada familia\"}\n```\n¿Lo envío?";

fn email() -> EmailDraft {
    EmailDraft {
        to: "apoderado@familia.cl".to_string(),
        subject: "Citación".to_string(),
        body: "Estimada familia".to_string(),
        cc: Vec::new(),
    }
}

fn context() -> SubmitContext {
    SubmitContext {
        sender: Some("orientacion@colegio.cl".to_string()),
        session_id: "s-1".to_string(),
        message_id: MessageId::new(),
    }
}

/// Holds every send open until released
#[derive(Default)]
struct GatedDispatcher {
    started: Notify,
    release: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl DraftDispatcher for GatedDispatcher {
    async fn send_email(
        &self,
        _draft: &EmailDraft,
        _context: &SubmitContext,
    ) -> Result<Delivery, SubmitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(Delivery {
            message_id: Some("m-1".to_string()),
            ..Delivery::default()
        })
    }

    async fn create_event(
        &self,
        _draft: &CalendarDraft,
        _context: &SubmitContext,
    ) -> Result<Delivery, SubmitError> {
        Err(SubmitError::Rejected {
            message: "calendar unavailable".to_string(),
        })
    }
}

/// Fails the first send, records what each send carried
#[derive(Default)]
struct FlakyDispatcher {
    subjects: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl DraftDispatcher for FlakyDispatcher {
    async fn send_email(
        &self,
        draft: &EmailDraft,
        _context: &SubmitContext,
    ) -> Result<Delivery, SubmitError> {
        let mut subjects = self.subjects.lock().unwrap();
        subjects.push(draft.subject.clone());
        if subjects.len() == 1 {
            return Err(SubmitError::Transport("timeout".to_string()));
        }
        Ok(Delivery::default())
    }

    async fn create_event(
        &self,
        _draft: &CalendarDraft,
        _context: &SubmitContext,
    ) -> Result<Delivery, SubmitError> {
        Ok(Delivery::default())
    }
}

#[tokio::test]
async fn test_second_submit_while_in_flight_is_rejected() {
    let controller = Arc::new(DraftInteractionController::new(
        MessageId::new(),
        DraftFields::Email(email()),
    ));
    let dispatcher = Arc::new(GatedDispatcher::default());

    let first = {
        let controller = controller.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { controller.submit(dispatcher.as_ref(), &context()).await })
    };
    dispatcher.started.notified().await;

    assert!(controller.is_submitting());
    assert_eq!(
        controller.submit(dispatcher.as_ref(), &context()).await,
        Err(DraftError::InFlight)
    );
    assert_eq!(controller.cancel(), Err(DraftError::InFlight));
    assert_eq!(
        controller.edit_email(|d| d.subject = "otro".to_string()),
        Err(DraftError::InFlight)
    );

    dispatcher.release.notify_one();
    let receipt = first.await.unwrap().unwrap();
    let DraftReceipt::Email(receipt) = receipt else {
        panic!("expected an email receipt");
    };
    assert_eq!(receipt.delivery.message_id.as_deref(), Some("m-1"));
    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);
    assert!(!controller.is_submitting());

    // Sent is terminal: no resubmission, cancel is a no-op
    assert_eq!(
        controller.submit(dispatcher.as_ref(), &context()).await,
        Err(DraftError::AlreadyResolved { state: "sent" })
    );
    assert!(matches!(controller.cancel(), Ok(DraftState::Sent(_))));
    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_submit_stays_pending_and_retries_with_edits() {
    let controller = DraftInteractionController::new(MessageId::new(), DraftFields::Email(email()));
    let dispatcher = FlakyDispatcher::default();

    let err = controller.submit(&dispatcher, &context()).await.unwrap_err();
    assert_eq!(
        err,
        DraftError::Submit(SubmitError::Transport("timeout".to_string()))
    );
    assert_eq!(
        controller.last_error(),
        Some(SubmitError::Transport("timeout".to_string()))
    );

    controller
        .edit_email(|d| d.subject = "Citación urgente".to_string())
        .unwrap();
    controller.submit(&dispatcher, &context()).await.unwrap();

    assert!(matches!(controller.state(), DraftState::Sent(_)));
    assert_eq!(
        *dispatcher.subjects.lock().unwrap(),
        vec!["Citación".to_string(), "Citación urgente".to_string()]
    );
    // The classified payload is never touched by edits
    assert_eq!(controller.original(), &DraftFields::Email(email()));
}

#[tokio::test]
async fn test_invalid_draft_never_reaches_the_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/email/send")
        .expect(0)
        .create_async()
        .await;
    let config = Config {
        backend: BackendConfig {
            base_url: server.url(),
            ..BackendConfig::default()
        },
        ..Config::default()
    };
    let dispatcher = HttpDispatcher::new(&config).unwrap();

    let mut draft = email();
    draft.to = "apoderado".to_string();
    let controller = DraftInteractionController::new(MessageId::new(), DraftFields::Email(draft));

    let err = controller.submit(&dispatcher, &context()).await.unwrap_err();
    assert!(matches!(
        err,
        DraftError::Submit(SubmitError::Invalid { field: "to", .. })
    ));
    assert!(matches!(controller.state(), DraftState::Pending { .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_delivery_reports_server_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/email/send")
        .with_status(500)
        .with_body(json!({"success": false, "error": "cuota excedida"}).to_string())
        .create_async()
        .await;
    let config = Config {
        backend: BackendConfig {
            base_url: server.url(),
            ..BackendConfig::default()
        },
        ..Config::default()
    };
    let dispatcher = HttpDispatcher::new(&config).unwrap();
    let controller = DraftInteractionController::new(MessageId::new(), DraftFields::Email(email()));

    let err = controller.submit(&dispatcher, &context()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "submission failed: cuota excedida"
    );
    assert_eq!(
        controller.last_error(),
        Some(SubmitError::Rejected {
            message: "cuota excedida".to_string()
        })
    );
}

#[tokio::test]
async fn test_sent_draft_renders_as_receipt_from_then_on() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/email/send")
        .match_body(mockito::Matcher::PartialJson(json!({
            "to": "apoderado@familia.cl",
            "sender": "orientacion@colegio.cl",
            "session_id": "s-1"
        })))
        .with_body(json!({"success": true, "message_id": "gmail-42"}).to_string())
        .create_async()
        .await;
    let config = Config {
        backend: BackendConfig {
            base_url: server.url(),
            ..BackendConfig::default()
        },
        ..Config::default()
    };

    let reply = Message::assistant(EMAIL_REPLY);
    let reply_id = reply.id;
    let conversation = Conversation::from_history("s-1", vec![Message::user("redacta"), reply]);

    let Some(DirectiveView::Draft { controller, .. }) = conversation.view(reply_id) else {
        panic!("expected a draft view");
    };
    let context = SubmitContext {
        sender: Some("orientacion@colegio.cl".to_string()),
        session_id: "s-1".to_string(),
        message_id: reply_id,
    };
    controller
        .submit(&HttpDispatcher::new(&config).unwrap(), &context)
        .await
        .unwrap();
    mock.assert_async().await;

    // Every later render shows the receipt, not a fresh draft
    for _ in 0..2 {
        let Some(DirectiveView::Receipt { receipt, before, .. }) = conversation.view(reply_id)
        else {
            panic!("expected a receipt view");
        };
        assert_eq!(before.blocks[0].text(), "Te dejo el borrador:");
        let DraftReceipt::Email(receipt) = receipt else {
            panic!("expected an email receipt");
        };
        assert_eq!(receipt.delivery.message_id.as_deref(), Some("gmail-42"));
    }
    assert_eq!(conversation.drafts().len(), 1);
    assert!(conversation
        .drafts()
        .get(reply_id, DirectiveKind::EmailDraft)
        .is_some());
}
