//! Server-sent events push channel.
//!
//! The server publishes `progress_update` and `research_update` events on a
//! long-lived `text/event-stream` response. Each frame's `data:` payload is
//! a JSON `{message, type}` object.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::PushChannel;
use crate::error::{Result, TransportError};
use crate::event::{PushEvent, PushMessage};

/// Capacity of the subscription channel.
const CHANNEL_CAPACITY: usize = 256;

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name; `message` when the frame has no `event:` field.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
}

/// Incremental decoder for a `text/event-stream` body.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut frames = Vec::new();
        while let Some(pos) = find_double_newline(&self.buf) {
            let raw = self.buf.drain(..pos + 2).collect::<Vec<_>>();
            if let Some(frame) = parse_frame(&String::from_utf8_lossy(&raw)) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Find the position of a double newline in the buffer.
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(text: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }
    if data.is_empty() {
        return None;
    }
    Some(SseFrame {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

/// Stream the frames of one SSE response.
fn frames(response: reqwest::Response) -> impl Stream<Item = Result<SseFrame>> {
    let byte_stream = response.bytes_stream();
    async_stream::try_stream! {
        let mut decoder = SseDecoder::new();
        futures::pin_mut!(byte_stream);
        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk?;
            for frame in decoder.push(&chunk) {
                yield frame;
            }
        }
        Err::<(), _>(TransportError::StreamEnded)?;
    }
}

/// [`PushChannel`] over a server-sent events endpoint, reconnecting on loss.
#[derive(Debug, Clone)]
pub struct SsePushChannel {
    url: Url,
    http: reqwest::Client,
    reconnect_delay: Duration,
}

impl SsePushChannel {
    /// Create a channel for `events_path` relative to `base_url`.
    pub fn new(
        base_url: impl AsRef<str>,
        events_path: &str,
        reconnect_delay: Duration,
    ) -> Result<Self> {
        let url = Url::parse(base_url.as_ref())?.join(events_path)?;
        Ok(Self {
            url,
            http: reqwest::Client::new(),
            reconnect_delay,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn connect(&self) -> Result<reqwest::Response> {
        let response = self
            .http
            .get(self.url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: format!("push channel rejected with {status}"),
            });
        }
        Ok(response)
    }

    /// Pump one connection until it ends. Returns `false` once the
    /// subscriber is gone.
    async fn pump(&self, response: reqwest::Response, tx: &mpsc::Sender<PushMessage>) -> bool {
        let stream = frames(response);
        futures::pin_mut!(stream);
        while let Some(frame) = stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(name: "push.stream.ended", url = %self.url, error = %e, "Push stream ended");
                    break;
                }
            };
            match PushEvent::from_frame(&frame.event, &frame.data) {
                Some(Ok(event)) => {
                    if tx.send(PushMessage::Event(event)).await.is_err() {
                        return false;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        name: "push.frame.malformed",
                        event = %frame.event,
                        error = %e,
                        "Dropping malformed push frame"
                    );
                }
                None => {
                    tracing::trace!(name: "push.frame.ignored", event = %frame.event, "Ignoring push frame");
                }
            }
        }
        true
    }

    async fn run(self, tx: mpsc::Sender<PushMessage>, shutdown: CancellationToken) {
        loop {
            let connected = tokio::select! {
                () = shutdown.cancelled() => return,
                result = self.connect() => result,
            };

            match connected {
                Ok(response) => {
                    tracing::info!(name: "push.connected", url = %self.url, "Push channel connected");
                    if tx.send(PushMessage::Connected).await.is_err() {
                        return;
                    }
                    let keep_going = tokio::select! {
                        () = shutdown.cancelled() => return,
                        keep_going = self.pump(response, &tx) => keep_going,
                    };
                    if !keep_going || tx.send(PushMessage::Disconnected).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(name: "push.connect.failed", url = %self.url, error = %e, "Push channel connect failed");
                }
            }

            tokio::select! {
                () = shutdown.cancelled() => return,
                () = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }
}

impl PushChannel for SsePushChannel {
    fn subscribe(&self, shutdown: CancellationToken) -> mpsc::Receiver<PushMessage> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(self.clone().run(tx, shutdown));
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: progress_update\nda").is_empty());
        let frames = decoder.push(b"ta: {\"message\":\"hi\"}\n\nevent: x\ndata: 1\n\n");
        assert_eq!(
            frames,
            vec![
                SseFrame {
                    event: "progress_update".to_string(),
                    data: "{\"message\":\"hi\"}".to_string(),
                },
                SseFrame {
                    event: "x".to_string(),
                    data: "1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_decoder_crlf_comments_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\r\n\r\ndata: a\r\ndata: b\r\n\r\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "message".to_string(),
                data: "a\nb".to_string(),
            }]
        );
    }
}
