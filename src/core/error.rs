//! Classified failures of the completion path.

use std::fmt;

/// Failure categories surfaced to callers. None of them is retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or unusable credential; raised before any request is sent.
    Configuration,
    /// The credential was rejected or lacks access to the model.
    Authorization,
    /// The backend does not recognize the model id.
    NotFound,
    /// Network, timeout, malformed payload, or any other remote failure.
    Transport,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not found",
            ErrorKind::Transport => "transport",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status of the failed response, when there was one.
    pub status: Option<u16>,
}

impl CompletionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn missing_credential(var: &str) -> Self {
        Self::configuration(format!(
            "{var} environment variable not set. Export your API key, e.g. export {var}=\"your-api-key-here\""
        ))
    }

    /// Classify a non-success HTTP response from its status and body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = extract_error_summary(body).unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("request failed with status {status}")
            } else {
                trimmed.to_string()
            }
        });

        let kind = match status {
            404 => ErrorKind::NotFound,
            401 | 403 => ErrorKind::Authorization,
            400 if reports_invalid_key(body) => ErrorKind::Authorization,
            _ => ErrorKind::Transport,
        };

        Self {
            kind,
            message,
            status: Some(status),
        }
    }

    /// Classify an error payload that arrived inside an open stream.
    pub fn from_stream_payload(payload: &str) -> Self {
        let value = serde_json::from_str::<serde_json::Value>(payload.trim()).ok();
        let status = value
            .as_ref()
            .and_then(|v| v.pointer("/error/code"))
            .and_then(|code| code.as_u64())
            .and_then(|code| u16::try_from(code).ok());

        match status {
            Some(status) => Self::from_response(status, payload),
            None => Self::transport(
                extract_error_summary(payload).unwrap_or_else(|| payload.trim().to_string()),
            ),
        }
    }

    /// First line of the message, cut to `max_chars`.
    pub fn summary(&self, max_chars: usize) -> String {
        let first_line = self.message.lines().next().unwrap_or_default();
        first_line.chars().take(max_chars).collect()
    }
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} error ({status}): {}", self.kind.as_str(), self.message),
            None => write!(f, "{} error: {}", self.kind.as_str(), self.message),
        }
    }
}

impl std::error::Error for CompletionError {}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_response(status.as_u16(), &err.to_string()),
            None if err.is_timeout() => Self::transport(format!("request timed out: {err}")),
            None => Self::transport(err.to_string()),
        }
    }
}

fn reports_invalid_key(body: &str) -> bool {
    body.contains("API_KEY_INVALID") || body.contains("API key not valid")
}

/// Pull a human-readable message out of a JSON error body.
pub(crate) fn extract_error_summary(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body.trim()).ok()?;
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = collapsed.trim();
    (!collapsed.is_empty()).then(|| collapsed.to_string())
}
