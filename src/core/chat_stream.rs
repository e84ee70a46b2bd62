use futures_util::StreamExt;
use memchr::memchr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{GenerateContentRequest, GenerateContentResponse};
use crate::core::error::CompletionError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    Chunk(String),
    Error(CompletionError),
    End,
}

/// Producer side of a [`CompletionStream`].
#[derive(Clone)]
pub struct StreamSender {
    tx: mpsc::UnboundedSender<StreamMessage>,
}

impl StreamSender {
    /// Returns `false` once the consumer is gone.
    pub fn chunk(&self, text: impl Into<String>) -> bool {
        self.tx.send(StreamMessage::Chunk(text.into())).is_ok()
    }

    pub fn error(&self, err: CompletionError) -> bool {
        self.tx.send(StreamMessage::Error(err)).is_ok()
    }

    pub fn end(&self) -> bool {
        self.tx.send(StreamMessage::End).is_ok()
    }
}

/// A finite, forward-only sequence of text fragments from one remote call.
///
/// Fragments come out in exactly the order the producer sent them. The
/// sequence ends with `None` after `End`, after the first error, or once the
/// stream is cancelled. Dropping the stream cancels the producer.
pub struct CompletionStream {
    rx: mpsc::UnboundedReceiver<StreamMessage>,
    cancel_token: CancellationToken,
    finished: bool,
}

impl CompletionStream {
    pub fn channel(cancel_token: CancellationToken) -> (StreamSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            StreamSender { tx },
            Self {
                rx,
                cancel_token,
                finished: false,
            },
        )
    }

    /// A stream that yields a single error and stops.
    pub fn failed(err: CompletionError) -> Self {
        let (sender, stream) = Self::channel(CancellationToken::new());
        sender.error(err);
        stream
    }

    pub async fn next(&mut self) -> Option<Result<String, CompletionError>> {
        if self.finished {
            return None;
        }

        let message = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => None,
            message = self.rx.recv() => message,
        };

        match message {
            Some(StreamMessage::Chunk(text)) => Some(Ok(text)),
            Some(StreamMessage::Error(err)) => {
                self.finished = true;
                Some(Err(err))
            }
            Some(StreamMessage::End) | None => {
                self.finished = true;
                None
            }
        }
    }

    /// Drain the stream into one string.
    pub async fn collect_text(mut self) -> Result<String, CompletionError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str, tx: &StreamSender) -> bool {
    if payload.trim().is_empty() {
        return false;
    }

    let value = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => value,
        Err(_) => {
            tx.error(CompletionError::from_stream_payload(payload));
            return true;
        }
    };

    if value.get("error").is_some() {
        tx.error(CompletionError::from_stream_payload(payload));
        return true;
    }

    match serde_json::from_value::<GenerateContentResponse>(value) {
        Ok(response) => {
            let text = response.text();
            if !text.is_empty() {
                tx.chunk(text);
            }
            false
        }
        Err(err) => {
            tx.error(CompletionError::transport(format!(
                "malformed stream payload: {err}"
            )));
            true
        }
    }
}

/// Returns `true` when the line terminated the stream.
fn process_sse_line(line: &str, tx: &StreamSender) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx))
        .unwrap_or(false)
}

/// Like [`process_sse_line`] for a raw line; bytes that are not UTF-8 end the
/// stream with a transport error.
fn process_sse_bytes(line: &[u8], tx: &StreamSender) -> bool {
    match std::str::from_utf8(line) {
        Ok(line) => process_sse_line(line.trim(), tx),
        Err(err) => {
            warn!("invalid UTF-8 in stream: {err}");
            tx.error(CompletionError::transport(format!(
                "invalid UTF-8 in stream: {err}"
            )));
            true
        }
    }
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub url: String,
    pub api_key: String,
    pub request: GenerateContentRequest,
    /// Longest wait for the response headers or for the next body chunk.
    pub idle_timeout: Duration,
    pub cancel_token: CancellationToken,
}

/// Open a streaming request on a background task and hand back its fragments.
pub fn spawn_stream(params: StreamParams) -> CompletionStream {
    let StreamParams {
        client,
        url,
        api_key,
        request,
        idle_timeout,
        cancel_token,
    } = params;

    let (tx, stream) = CompletionStream::channel(cancel_token.clone());

    tokio::spawn(async move {
        tokio::select! {
            _ = pump_sse(client, url, api_key, request, idle_timeout, &tx) => {}
            _ = cancel_token.cancelled() => {
                debug!("stream cancelled before completion");
            }
        }
    });

    stream
}

async fn pump_sse(
    client: reqwest::Client,
    url: String,
    api_key: String,
    request: GenerateContentRequest,
    idle_timeout: Duration,
    tx: &StreamSender,
) {
    let send = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", api_key)
        .json(&request)
        .send();

    let response = match tokio::time::timeout(idle_timeout, send).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            tx.error(CompletionError::from(err));
            return;
        }
        Err(_) => {
            tx.error(stalled(idle_timeout));
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        let err = CompletionError::from_response(status, &error_text);
        debug!(status, kind = err.kind.as_str(), "stream request rejected");
        tx.error(err);
        return;
    }

    let mut body = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        let chunk = match tokio::time::timeout(idle_timeout, body.next()).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(_) => {
                tx.error(stalled(idle_timeout));
                return;
            }
        };
        let chunk_bytes = match chunk {
            Ok(bytes) => bytes,
            Err(err) => {
                tx.error(CompletionError::from(err));
                return;
            }
        };
        buffer.extend_from_slice(&chunk_bytes);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let should_end = process_sse_bytes(&buffer[..newline_pos], tx);
            buffer.drain(..=newline_pos);
            if should_end {
                return;
            }
        }
    }

    if process_sse_bytes(&buffer, tx) {
        return;
    }

    tx.end();
}

fn stalled(idle_timeout: Duration) -> CompletionError {
    CompletionError::transport(format!(
        "no data from the API for {}s",
        idle_timeout.as_secs()
    ))
}
