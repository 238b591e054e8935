// Error taxonomy for the reply pipeline
//
// Record decode failures and directive parse failures are not errors here:
// the former are recovered inside the reader, the latter are a
// classification value. What remains is transport, submit and draft
// transition failures.

use thiserror::Error;

/// Failure to open or read the reply stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The request never reached the backend
    #[error("failed to open reply stream: {0}")]
    Connect(String),

    /// The backend answered with a non-success status
    #[error("reply stream rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The connection broke after the stream started
    #[error("reply stream interrupted: {0}")]
    Read(String),
}

/// Failure of a side-effecting draft action (send email / create event).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The editable copy failed local validation
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The collaborator could not be reached
    #[error("could not reach the server: {0}")]
    Transport(String),

    /// The collaborator answered but refused the action
    #[error("{message}")]
    Rejected { message: String },
}

/// Rejected transition on a draft controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("a submission for this draft is already in progress")]
    InFlight,

    #[error("draft is already {state}")]
    AlreadyResolved { state: &'static str },

    #[error("directive is not an editable draft")]
    NotADraft,

    #[error("submission failed: {0}")]
    Submit(#[from] SubmitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_error_messages_are_user_facing() {
        let invalid = SubmitError::Invalid {
            field: "to",
            reason: "recipient is required".to_string(),
        };
        assert_eq!(invalid.to_string(), "to: recipient is required");

        let rejected = SubmitError::Rejected {
            message: "mailbox full".to_string(),
        };
        assert_eq!(rejected.to_string(), "mailbox full");
    }

    #[test]
    fn test_draft_error_wraps_submit_error() {
        let err: DraftError = SubmitError::Transport("timeout".to_string()).into();
        assert_eq!(
            err.to_string(),
            "submission failed: could not reach the server: timeout"
        );
    }
}
