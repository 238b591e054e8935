// Conversations and their messages
//
// A conversation owns its message history. While an assistant turn is in
// flight, its message lives in a MessageAccumulator fed by the stream
// reader; when the stream ends it is frozen and appended to the history.

pub mod accumulator;
pub mod message;
pub mod session;

pub use accumulator::{drive, Change, MessageAccumulator, TurnOutcome};
pub use message::{FileAttachment, Message, MessageId, MessagePart, MessageText, Sender};
pub use session::Conversation;
