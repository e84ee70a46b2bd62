use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::chat_stream::{CompletionStream, StreamMessage, StreamSender};
use crate::core::client::CompletionBackend;
use crate::core::error::CompletionError;
use crate::core::message::HistoryTurn;
use crate::core::mode::Mode;

/// What a backend call was given.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub history: Vec<HistoryTurn>,
    pub mode_id: String,
}

enum Script {
    Messages(Vec<StreamMessage>),
    Open(CompletionStream),
}

/// In-process backend that replays queued scripts, one per call.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_script(&self, messages: Vec<StreamMessage>) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::Messages(messages));
    }

    pub fn push_fragments(&self, fragments: &[&str]) {
        let mut messages: Vec<StreamMessage> = fragments
            .iter()
            .map(|f| StreamMessage::Chunk(f.to_string()))
            .collect();
        messages.push(StreamMessage::End);
        self.push_script(messages);
    }

    pub fn push_error(&self, err: CompletionError) {
        self.push_script(vec![StreamMessage::Error(err)]);
    }

    /// Queue a stream the test keeps feeding by hand.
    pub fn push_open_stream(&self) -> StreamSender {
        let (sender, stream) = CompletionStream::channel(CancellationToken::new());
        self.scripts.lock().unwrap().push_back(Script::Open(stream));
        sender
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, prompt: &str, history: &[HistoryTurn], mode: &Mode) -> Option<Script> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            history: history.to_vec(),
            mode_id: mode.id.clone(),
        });
        self.scripts.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        mode: &Mode,
    ) -> Result<String, CompletionError> {
        self.stream_complete(prompt, history, mode)
            .collect_text()
            .await
    }

    fn stream_complete(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        mode: &Mode,
    ) -> CompletionStream {
        match self.record(prompt, history, mode) {
            Some(Script::Open(stream)) => stream,
            Some(Script::Messages(messages)) => {
                let (sender, stream) = CompletionStream::channel(CancellationToken::new());
                for message in messages {
                    match message {
                        StreamMessage::Chunk(text) => sender.chunk(text),
                        StreamMessage::Error(err) => sender.error(err),
                        StreamMessage::End => sender.end(),
                    };
                }
                stream
            }
            None => CompletionStream::failed(CompletionError::transport("no scripted response")),
        }
    }
}
