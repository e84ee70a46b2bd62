use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Role name used on the wire; the remote API calls assistant turns `model`.
    pub fn to_api_role(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "assistant" | "model" => Ok(Role::Assistant),
            _ => Err(format!("invalid role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// Lifecycle of an assistant turn.
///
/// `Empty -> Streaming -> Final` when the stream is exhausted, or
/// `Empty | Streaming -> Failed` when it errors or is invalidated.
/// Neither terminal state has outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    Empty,
    Streaming,
    Final,
    Failed,
}

impl TurnState {
    pub fn is_open(self) -> bool {
        matches!(self, TurnState::Empty | TurnState::Streaming)
    }
}

/// Opaque message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(random_urlsafe(12))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn random_urlsafe(len: usize) -> String {
    static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut bytes = vec![0_u8; len];
    if getrandom::fill(&mut bytes).is_err() {
        // No entropy source; a timestamp plus a process-wide counter is still unique.
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
        let seed = nanos.to_le_bytes().into_iter().chain(count.to_le_bytes());
        for (slot, byte) in bytes.iter_mut().zip(seed) {
            *slot = byte;
        }
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// One conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Always `Final` for user turns.
    pub state: TurnState,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            state: TurnState::Final,
        }
    }

    pub fn assistant_placeholder() -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::Assistant,
            content: String::new(),
            timestamp: Utc::now(),
            state: TurnState::Empty,
        }
    }

    pub fn is_final(&self) -> bool {
        self.state == TurnState::Final
    }
}

/// The role-tagged text of one earlier turn, as sent with a new request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

impl HistoryTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}
