//! Drives one conversation: user input in, streamed answer into the store.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::client::CompletionBackend;
use crate::core::conversation::Conversation;
use crate::core::error::CompletionError;
use crate::core::message::{Message, TurnState};
use crate::core::mode::Mode;
use crate::utils::logging::LoggingState;

/// How an assistant turn ended.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The stream ran to completion.
    Completed(Message),
    /// The remote call failed; the turn now shows the fallback text.
    Failed {
        error: CompletionError,
        message: Message,
    },
    /// The caller cancelled mid-stream; the turn keeps what had arrived.
    Interrupted(Message),
}

impl TurnOutcome {
    pub fn message(&self) -> &Message {
        match self {
            TurnOutcome::Completed(message)
            | TurnOutcome::Interrupted(message)
            | TurnOutcome::Failed { message, .. } => message,
        }
    }

    pub fn error(&self) -> Option<&CompletionError> {
        match self {
            TurnOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

pub struct ChatSession {
    backend: Arc<dyn CompletionBackend>,
    conversation: Conversation,
    mode: Mode,
    logging: LoggingState,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn CompletionBackend>, mode: Mode) -> Self {
        Self {
            backend,
            conversation: Conversation::new(),
            mode,
            logging: LoggingState::disabled(),
        }
    }

    pub fn with_logging(mut self, logging: LoggingState) -> Self {
        self.logging = logging;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Applies to requests started after this call only.
    pub fn set_mode(&mut self, mode: Mode) {
        debug!(mode = %mode.id, "mode changed");
        self.mode = mode;
    }

    pub fn logging(&self) -> &LoggingState {
        &self.logging
    }

    pub fn logging_mut(&mut self) -> &mut LoggingState {
        &mut self.logging
    }

    pub fn reset(&mut self) {
        self.conversation.reset();
    }

    /// Send `prompt` and stream the answer into the conversation.
    pub async fn send(&mut self, prompt: &str, on_fragment: impl FnMut(&str)) -> TurnOutcome {
        self.send_with_cancel(prompt, &CancellationToken::new(), on_fragment)
            .await
    }

    /// Like [`send`](Self::send), stopping early once `cancel` fires.
    pub async fn send_with_cancel(
        &mut self,
        prompt: &str,
        cancel: &CancellationToken,
        mut on_fragment: impl FnMut(&str),
    ) -> TurnOutcome {
        let history = self.conversation.history();
        let mode = self.mode.clone();

        self.conversation.append_user(prompt);
        self.log_line(&format!("You: {prompt}"));

        let handle = self.conversation.begin_assistant_turn();
        let turn_token = handle.cancel_token();
        let mut stream = self.backend.stream_complete(prompt, &history, &mode);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = turn_token.cancelled() => break,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(fragment)) => {
                    if !self.conversation.append_to_handle(&handle, &fragment) {
                        break;
                    }
                    on_fragment(&fragment);
                }
                Some(Err(error)) => {
                    warn!(kind = error.kind.as_str(), "completion failed: {}", error.message);
                    stream.cancel();
                    let message = self
                        .conversation
                        .fail(handle)
                        .cloned()
                        .unwrap_or_else(Message::assistant_placeholder);
                    return TurnOutcome::Failed { error, message };
                }
                None => {
                    let message = self
                        .conversation
                        .finish(handle)
                        .cloned()
                        .unwrap_or_else(Message::assistant_placeholder);
                    self.log_line(&message.content);
                    return TurnOutcome::Completed(message);
                }
            }
        }

        stream.cancel();
        let has_content = self
            .conversation
            .get(handle.message_id())
            .is_some_and(|msg| msg.state == TurnState::Streaming && !msg.content.is_empty());
        let message = if has_content {
            self.conversation.finish(handle).cloned()
        } else {
            self.conversation.fail(handle).cloned()
        }
        .unwrap_or_else(Message::assistant_placeholder);
        if has_content {
            self.log_line(&message.content);
        }
        debug!(message_id = %message.id, "turn interrupted");
        TurnOutcome::Interrupted(message)
    }

    /// Non-streamed variant: wait for the whole answer, then record it.
    pub async fn send_complete(&mut self, prompt: &str) -> TurnOutcome {
        let history = self.conversation.history();
        let mode = self.mode.clone();

        self.conversation.append_user(prompt);
        self.log_line(&format!("You: {prompt}"));
        let handle = self.conversation.begin_assistant_turn();

        match self.backend.complete(prompt, &history, &mode).await {
            Ok(text) => {
                self.conversation.append_to_handle(&handle, &text);
                let message = self
                    .conversation
                    .finish(handle)
                    .cloned()
                    .unwrap_or_else(Message::assistant_placeholder);
                self.log_line(&message.content);
                TurnOutcome::Completed(message)
            }
            Err(error) => {
                warn!(kind = error.kind.as_str(), "completion failed: {}", error.message);
                let message = self
                    .conversation
                    .fail(handle)
                    .cloned()
                    .unwrap_or_else(Message::assistant_placeholder);
                TurnOutcome::Failed { error, message }
            }
        }
    }

    fn log_line(&self, content: &str) {
        if let Err(e) = self.logging.log_message(content) {
            eprintln!("Failed to log message: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat_stream::StreamMessage;
    use crate::core::conversation::FALLBACK_MESSAGE;
    use crate::core::error::ErrorKind;
    use crate::core::message::{HistoryTurn, Role};
    use crate::core::mode::ModeRegistry;
    use crate::utils::test_utils::ScriptedBackend;

    fn session_with(backend: Arc<ScriptedBackend>, mode_id: &str) -> ChatSession {
        let mode = ModeRegistry::builtin().get(mode_id).unwrap().clone();
        ChatSession::new(backend, mode)
    }

    #[tokio::test]
    async fn developer_mode_streams_hello() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fragments(&["He", "llo", "!"]);
        let mut session = session_with(backend.clone(), "Developer");

        let mut seen = Vec::new();
        let outcome = session.send("Hello", |f| seen.push(f.to_string())).await;

        let message = match outcome {
            TurnOutcome::Completed(message) => message,
            other => panic!("expected completion, got {other:?}"),
        };
        assert_eq!(message.content, "Hello!");
        assert_eq!(message.state, TurnState::Final);
        assert_eq!(seen, ["He", "llo", "!"]);

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, "Hello");
        assert_eq!(calls[0].mode_id, "Developer");
        assert!(calls[0].history.is_empty());

        let roles: Vec<Role> = session
            .conversation()
            .messages()
            .iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, [Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn authorization_failure_leaves_fallback_turn() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(CompletionError::from_response(
            403,
            r#"{"error":{"code":403,"message":"denied"}}"#,
        ));
        let mut session = session_with(backend, "General");

        let outcome = session.send("Hello", |_| {}).await;
        assert_eq!(outcome.error().unwrap().kind, ErrorKind::Authorization);
        let message = outcome.message();
        assert_eq!(message.state, TurnState::Failed);
        assert_eq!(message.content, FALLBACK_MESSAGE);
        assert_eq!(
            session.conversation().last().unwrap().content,
            FALLBACK_MESSAGE
        );
    }

    #[tokio::test]
    async fn partial_stream_then_error_is_not_left_partial() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_script(vec![
            StreamMessage::Chunk("half an ans".into()),
            StreamMessage::Error(CompletionError::transport("connection reset")),
        ]);
        let mut session = session_with(backend, "General");

        let outcome = session.send("Hello", |_| {}).await;
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        assert_eq!(outcome.message().content, FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn history_and_mode_are_captured_per_call() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fragments(&["first answer"]);
        backend.push_fragments(&["second answer"]);
        let mut session = session_with(backend.clone(), "General");

        session.send("first", |_| {}).await;
        let research = ModeRegistry::builtin().get("Research").unwrap().clone();
        session.set_mode(research);
        session.send("second", |_| {}).await;

        let calls = backend.calls();
        assert_eq!(calls[0].mode_id, "General");
        assert_eq!(calls[1].mode_id, "Research");
        assert_eq!(
            calls[1].history,
            vec![
                HistoryTurn::user("first"),
                HistoryTurn::assistant("first answer")
            ]
        );
        assert_eq!(session.conversation().len(), 4);
    }

    #[tokio::test]
    async fn cancel_keeps_received_text() {
        let backend = Arc::new(ScriptedBackend::new());
        let sender = backend.push_open_stream();
        let mut session = session_with(backend, "General");
        let cancel = CancellationToken::new();

        sender.chunk("partial");
        let outcome = session
            .send_with_cancel("Hello", &cancel, |_| cancel.cancel())
            .await;

        let message = match outcome {
            TurnOutcome::Interrupted(message) => message,
            other => panic!("expected interruption, got {other:?}"),
        };
        assert_eq!(message.content, "partial");
        assert_eq!(message.state, TurnState::Final);
        assert!(!sender.chunk("late"));
        assert!(!session.conversation().is_streaming());
    }

    #[tokio::test]
    async fn interrupted_partial_answer_reaches_transcript() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        let backend = Arc::new(ScriptedBackend::new());
        let sender = backend.push_open_stream();
        let _failed = backend.push_open_stream();
        let logging = LoggingState::to_file(path.to_string_lossy()).unwrap();
        let mut session = session_with(backend, "General").with_logging(logging);

        sender.chunk("partial");
        let cancel = CancellationToken::new();
        session
            .send_with_cancel("Hello", &cancel, |_| cancel.cancel())
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        session.send_with_cancel("Again", &cancel, |_| {}).await;

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "You: Hello\n\npartial\n\nYou: Again\n\n");
    }

    #[tokio::test]
    async fn cancel_before_any_text_fails_turn() {
        let backend = Arc::new(ScriptedBackend::new());
        let _sender = backend.push_open_stream();
        let mut session = session_with(backend, "General");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = session.send_with_cancel("Hello", &cancel, |_| {}).await;
        assert!(matches!(outcome, TurnOutcome::Interrupted(_)));
        assert_eq!(outcome.message().state, TurnState::Failed);
        assert_eq!(outcome.message().content, FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn send_complete_records_whole_answer() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fragments(&["Hel", "lo"]);
        let mut session = session_with(backend, "Exam");

        let outcome = session.send_complete("Hi").await;
        assert_eq!(outcome.message().content, "Hello");
        assert_eq!(outcome.message().state, TurnState::Final);
    }

    #[tokio::test]
    async fn reset_clears_conversation() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fragments(&["ok"]);
        let mut session = session_with(backend, "General");

        session.send("Hello", |_| {}).await;
        session.reset();
        session.reset();
        assert!(session.conversation().is_empty());
    }
}
