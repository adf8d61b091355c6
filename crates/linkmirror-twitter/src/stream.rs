//! Line framing for the streaming endpoint
//!
//! The filter stream is one long HTTP response. Each message is a single
//! line terminated by `\r\n`; blank lines are keep-alives sent every
//! 30 seconds or so. Chunks do not respect line boundaries.

use linkmirror_core::traits::LineStream;
use linkmirror_core::{Error, Result};
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

/// No bytes for this long means the connection is dead
pub(crate) const STALL_TIMEOUT: Duration = Duration::from_secs(90);

/// Lines buffered between the reader task and the consumer
const LINE_BUFFER: usize = 64;

/// Longest unterminated line accepted before the connection is dropped
pub(crate) const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a byte stream into lines
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    pending: Vec<u8>,
    // Prefix of `pending` already known to hold no newline
    scanned: usize,
}

impl LineSplitter {
    /// Feed a chunk, returning every line it completes
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(offset) = self.pending[self.scanned..].iter().position(|&b| b == b'\n') {
            let pos = self.scanned + offset;
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.scanned = 0;
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        self.scanned = self.pending.len();

        if self.pending.len() > MAX_LINE_BYTES {
            let held = self.pending.len();
            self.pending.clear();
            self.scanned = 0;
            return Err(Error::stream(format!(
                "Line exceeds {} bytes without a terminator ({} held)",
                MAX_LINE_BYTES, held
            )));
        }
        Ok(lines)
    }
}

/// Turn an open streaming response into a line stream
///
/// A reader task owns the response and forwards lines until the server
/// closes, the connection stalls, or the receiving side is dropped.
pub(crate) fn into_lines(mut response: reqwest::Response) -> LineStream {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<String>>(LINE_BUFFER);

    tokio::spawn(async move {
        let mut splitter = LineSplitter::default();

        loop {
            let chunk = match tokio::time::timeout(STALL_TIMEOUT, response.chunk()).await {
                Ok(Ok(Some(chunk))) => chunk,
                // Server closed; dropping tx ends the stream
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    let _ = tx.send(Err(Error::stream(format!("Read failed: {}", e)))).await;
                    break;
                }
                Err(_) => {
                    let _ = tx
                        .send(Err(Error::stream(format!(
                            "No data for {}s",
                            STALL_TIMEOUT.as_secs()
                        ))))
                        .await;
                    break;
                }
            };

            let lines = match splitter.push(&chunk) {
                Ok(lines) => lines,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            };

            for line in lines {
                if tx.send(Ok(line)).await.is_err() {
                    tracing::debug!("Line receiver dropped, closing stream");
                    return;
                }
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
