// Draft directives: user-editable email and calendar drafts and the
// actions that deliver them

pub mod controller;
pub mod dispatcher;
pub mod registry;

pub use controller::{DraftFields, DraftInteractionController, DraftKey, DraftReceipt, DraftState};
pub use dispatcher::{DraftDispatcher, HttpDispatcher, SubmitContext};
pub use registry::DraftRegistry;
