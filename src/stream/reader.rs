// Reply stream reader
//
// A background task pulls raw chunks from the transport, cuts them into
// complete lines, decodes each line and forwards the events over a bounded
// channel. The consumer pulls events with `next()`.
//
// Cancellation is cooperative: the task observes the token between chunks
// and simply stops reading. A cancelled stream ends like a closed one.
// There is no limit on the length of a reply, only on the silence between
// two chunks.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::events::{decode_record, StreamEvent, UnknownRecordPolicy};
use super::transport::{ByteStream, ChatRequest, ChatTransport};
use crate::config::StreamConfig;
use crate::errors::StreamError;

/// Accumulates bytes until whole lines are available
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk and return every line it completed, without the newline.
    /// Decoding happens per line, so multi-byte characters split across
    /// chunks come out intact.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line_bytes[..newline_pos]);
            lines.push(line.into_owned());
        }
        lines
    }

    /// Take the unterminated tail, if any
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    /// Bytes held back waiting for a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Pull side of a reply stream
///
/// Dropping the reader stops the background task.
pub struct StreamReader {
    rx: mpsc::Receiver<Result<StreamEvent, StreamError>>,
    cancel: CancellationToken,
}

impl StreamReader {
    /// Open a turn on `transport` and start reading it.
    ///
    /// Cancelling `cancel` while the request is still being opened yields a
    /// reader that is already finished.
    pub async fn open(
        transport: &dyn ChatTransport,
        request: &ChatRequest,
        cancel: &CancellationToken,
        config: &StreamConfig,
    ) -> Result<Self, StreamError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("[STREAM] Cancelled before the stream opened");
                Ok(Self::finished(cancel.child_token()))
            }
            opened = transport.open(request) => {
                let stream = opened?;
                Ok(Self::spawn(stream, cancel, config))
            }
        }
    }

    /// Start reading an already opened byte stream. The reader listens on a
    /// child of `cancel`, so dropping it never cancels the caller's token.
    pub fn spawn(stream: ByteStream, cancel: &CancellationToken, config: &StreamConfig) -> Self {
        let cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let idle = (config.idle_timeout_secs > 0)
            .then(|| Duration::from_secs(config.idle_timeout_secs));
        tokio::spawn(pump(stream, tx, cancel.clone(), config.unknown_records, idle));
        Self { rx, cancel }
    }

    fn finished(cancel: CancellationToken) -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self { rx, cancel }
    }

    /// Next event; `None` once the stream closed or was cancelled
    pub async fn next(&mut self) -> Option<Result<StreamEvent, StreamError>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Next chunk, or a read error once `idle` passes without one
async fn next_chunk(
    stream: &mut ByteStream,
    idle: Option<Duration>,
) -> Option<Result<Bytes, StreamError>> {
    let Some(idle) = idle else {
        return stream.next().await;
    };
    match tokio::time::timeout(idle, stream.next()).await {
        Ok(chunk) => chunk,
        Err(_) => Some(Err(StreamError::Read(format!(
            "no data received for {}s",
            idle.as_secs()
        )))),
    }
}

async fn pump(
    mut stream: ByteStream,
    tx: mpsc::Sender<Result<StreamEvent, StreamError>>,
    cancel: CancellationToken,
    policy: UnknownRecordPolicy,
    idle: Option<Duration>,
) {
    debug!("[STREAM] Reader task started");
    let mut lines = LineBuffer::new();
    let mut records = 0usize;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(
                    "[STREAM] Cancelled after {} records, discarding {} buffered bytes",
                    records,
                    lines.pending()
                );
                return;
            }
            chunk = next_chunk(&mut stream, idle) => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for line in lines.push(&bytes) {
                    records += 1;
                    if let Some(event) = decode_record(&line, policy) {
                        if tx.send(Ok(event)).await.is_err() {
                            debug!("[STREAM] Consumer went away");
                            return;
                        }
                    }
                }
            }
            Some(Err(e)) => {
                error!("Stream error: {}", e);
                let _ = tx.send(Err(e)).await;
                return;
            }
            None => break,
        }
    }

    // The final record may arrive without a trailing newline
    if let Some(rest) = lines.take_remainder() {
        records += 1;
        if let Some(event) = decode_record(&rest, policy) {
            let _ = tx.send(Ok(event)).await;
        }
    }

    debug!("[STREAM] Reader task finished after {} records", records);
}
