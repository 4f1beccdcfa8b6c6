//! Incremental decoder for the commit feed.
//!
//! Converts a raw byte stream into [`CommitEvent`] values. Chunks may split
//! a message (or a UTF-8 sequence) anywhere; bytes are buffered until a full
//! line is available.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use medic_core::{Error, Result, Revision};
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// A push to an upstream project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    /// Upstream repository name, e.g. `cordova-android`.
    pub project: String,
    /// Revision at the tip of the push.
    pub sha: Revision,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    #[serde(alias = "repository")]
    project: String,
    #[serde(alias = "hash")]
    sha: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedMessage {
    Envelope { commit: CommitBody },
    Flat(CommitBody),
    // Keep-alives and anything else without a commit.
    Other(IgnoredAny),
}

/// Longest incomplete line kept while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, String>> + Send>>;

/// Stream adapter yielding one [`CommitEvent`] per feed message.
///
/// A transport error is yielded once as [`Error::Stream`]; the stream then
/// ends. It cannot be restarted.
pub struct CommitStream {
    inner: ByteStream,
    buffer: Vec<u8>,
    /// Set while skipping the rest of an oversized line.
    discarding: bool,
    finished: bool,
}

impl CommitStream {
    pub fn new<S, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        Self {
            inner: Box::pin(byte_stream.map(|chunk| chunk.map_err(|e| e.to_string()))),
            buffer: Vec::new(),
            discarding: false,
            finished: false,
        }
    }

    fn push_chunk(&mut self, chunk: &[u8]) {
        let chunk = if self.discarding {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    &chunk[pos + 1..]
                }
                None => return,
            }
        } else {
            chunk
        };
        self.buffer.extend_from_slice(chunk);

        let pending = match self.buffer.iter().rposition(|b| *b == b'\n') {
            Some(pos) => self.buffer.len() - pos - 1,
            None => self.buffer.len(),
        };
        if pending > MAX_LINE_BYTES {
            warn!(bytes = pending, "Dropping oversized feed line");
            self.buffer.truncate(self.buffer.len() - pending);
            self.discarding = true;
        }
    }
}

impl Stream for CommitStream {
    type Item = Result<CommitEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = next_event(&mut this.buffer) {
                return Poll::Ready(Some(Ok(event)));
            }

            if this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.push_chunk(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(Error::Stream(e))));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    // A final message may arrive without its trailing newline.
                    if !this.buffer.is_empty() {
                        this.buffer.push(b'\n');
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Pop complete lines off the buffer until one decodes to an event.
/// Returns `None` once no complete line remains.
fn next_event(buffer: &mut Vec<u8>) -> Option<CommitEvent> {
    loop {
        let newline_pos = buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = buffer.drain(..=newline_pos).collect();

        if let Some(event) = decode_line(&line) {
            return Some(event);
        }
    }
}

fn decode_line(line: &[u8]) -> Option<CommitEvent> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => {
            warn!(error = %e, "Skipping feed line with invalid UTF-8");
            return None;
        }
    };

    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<FeedMessage>(text) {
        Ok(FeedMessage::Envelope { commit }) | Ok(FeedMessage::Flat(commit)) => {
            Some(CommitEvent {
                project: commit.project,
                sha: Revision::new(commit.sha),
            })
        }
        Ok(FeedMessage::Other(_)) => {
            debug!("Skipping feed message without a commit");
            None
        }
        Err(e) => {
            warn!(
                error = %e,
                line = %text.chars().take(200).collect::<String>(),
                "Skipping malformed feed line"
            );
            None
        }
    }
}
