// Project-wide constants
//
// Centralised here so endpoint paths and other magic values have one
// source of truth.

/// Config directory under the user's home
pub const CONFIG_DIR: &str = ".aula";

/// Config file name inside CONFIG_DIR
pub const CONFIG_FILE: &str = "config.toml";

/// Endpoint that streams an assistant reply
pub const DEFAULT_STREAM_PATH: &str = "/chat/stream";

/// Endpoint that sends an email draft
pub const DEFAULT_EMAIL_PATH: &str = "/email/send";

/// Endpoint that creates a calendar event
pub const DEFAULT_CALENDAR_PATH: &str = "/calendar/events";

/// Whole-request timeout for draft submission
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Longest silence tolerated between chunks of a reply stream
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 120;

/// Events buffered between the reader task and the consumer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;
