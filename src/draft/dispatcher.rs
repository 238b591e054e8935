// Draft dispatch: the side effects behind "send email" and "create event"

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::conversation::MessageId;
use crate::directive::{CalendarDraft, Delivery, EmailDraft};
use crate::errors::SubmitError;

/// Who is acting and which conversation/message the action belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub session_id: String,
    pub message_id: MessageId,
}

/// Performs the external action for a draft
#[async_trait]
pub trait DraftDispatcher: Send + Sync {
    async fn send_email(
        &self,
        draft: &EmailDraft,
        context: &SubmitContext,
    ) -> Result<Delivery, SubmitError>;

    async fn create_event(
        &self,
        draft: &CalendarDraft,
        context: &SubmitContext,
    ) -> Result<Delivery, SubmitError>;
}

#[derive(Serialize)]
struct DispatchRequest<'a, T: Serialize> {
    #[serde(flatten)]
    draft: &'a T,
    #[serde(flatten)]
    context: &'a SubmitContext,
}

#[derive(Debug, Deserialize)]
struct DispatchResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    delivery: Delivery,
}

fn default_success() -> bool {
    true
}

/// Dispatcher over the backend's email and calendar endpoints
#[derive(Clone)]
pub struct HttpDispatcher {
    client: Client,
    email_url: String,
    calendar_url: String,
    token: Option<String>,
}

impl HttpDispatcher {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let backend = &config.backend;
        let client = Client::builder()
            .timeout(Duration::from_secs(backend.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            email_url: backend.endpoint(&backend.email_path),
            calendar_url: backend.endpoint(&backend.calendar_path),
            token: backend.token.clone(),
        })
    }

    async fn post<T: Serialize + Sync>(
        &self,
        url: &str,
        draft: &T,
        context: &SubmitContext,
    ) -> Result<Delivery, SubmitError> {
        let mut builder = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(&DispatchRequest { draft, context });
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let parsed = serde_json::from_str::<DispatchResponse>(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("server answered {}: {}", status, body.trim()));
            return Err(SubmitError::Rejected { message });
        }

        match parsed {
            Some(response) if response.success => Ok(response.delivery),
            Some(response) => Err(SubmitError::Rejected {
                message: response
                    .error
                    .unwrap_or_else(|| "the server reported a failure".to_string()),
            }),
            // A success status with an empty or non-JSON body still counts
            None => Ok(Delivery::default()),
        }
    }
}

#[async_trait]
impl DraftDispatcher for HttpDispatcher {
    async fn send_email(
        &self,
        draft: &EmailDraft,
        context: &SubmitContext,
    ) -> Result<Delivery, SubmitError> {
        tracing::info!("Sending email to {} for message {}", draft.to, context.message_id);
        self.post(&self.email_url, draft, context).await
    }

    async fn create_event(
        &self,
        draft: &CalendarDraft,
        context: &SubmitContext,
    ) -> Result<Delivery, SubmitError> {
        tracing::info!(
            "Creating event '{}' for message {}",
            draft.summary,
            context.message_id
        );
        self.post(&self.calendar_url, draft, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_flattens_draft_and_context() {
        let draft = EmailDraft {
            to: "apoderado@example.com".to_string(),
            subject: "Citación".to_string(),
            body: "Estimado apoderado".to_string(),
            cc: vec!["inspectoria@example.com".to_string()],
        };
        let context = SubmitContext {
            sender: Some("orientacion@example.com".to_string()),
            session_id: "s1".to_string(),
            message_id: MessageId::new(),
        };

        let value = serde_json::to_value(DispatchRequest {
            draft: &draft,
            context: &context,
        })
        .unwrap();
        assert_eq!(value["to"], "apoderado@example.com");
        assert_eq!(value["cc"][0], "inspectoria@example.com");
        assert_eq!(value["sender"], "orientacion@example.com");
        assert_eq!(value["session_id"], "s1");
        assert!(value["message_id"].is_string());
    }

    #[test]
    fn test_response_defaults_to_success() {
        let response: DispatchResponse =
            serde_json::from_str(r#"{"message_id":"m-1"}"#).unwrap();
        assert!(response.success);
        assert_eq!(response.delivery.message_id.as_deref(), Some("m-1"));

        let response: DispatchResponse =
            serde_json::from_str(r#"{"success":false,"error":"quota"}"#).unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("quota"));
    }
}
