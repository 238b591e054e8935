// Assistant reply streaming
//
// transport (raw bytes) -> reader (lines -> events) -> conversation::accumulator

pub mod events;
pub mod reader;
pub mod transport;

pub use events::{decode_record, StreamEvent, UnknownRecordPolicy};
pub use reader::{LineBuffer, StreamReader};
pub use transport::{ByteStream, ChatRequest, ChatTransport, HttpTransport};
