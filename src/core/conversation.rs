//! In-memory turn history and the single-writer protocol for streamed answers.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::message::{HistoryTurn, Message, MessageId, Role, TurnState};

/// Shown in place of an assistant turn whose stream failed.
pub const FALLBACK_MESSAGE: &str =
    "I encountered an error in my neural pathways. Please check my configuration or try again.";

/// Exclusive write access to one open assistant turn.
///
/// Not `Clone`: there is exactly one writer per turn. The handle goes stale
/// when the conversation is reset or a newer turn supersedes it; writes through
/// a stale handle are ignored.
#[derive(Debug)]
pub struct AssistantHandle {
    id: MessageId,
    index: usize,
    generation: u64,
    cancel_token: CancellationToken,
}

impl AssistantHandle {
    pub fn message_id(&self) -> &MessageId {
        &self.id
    }

    /// Cancelled as soon as the handle is invalidated.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

#[derive(Debug)]
struct OpenTurn {
    index: usize,
    cancel_token: CancellationToken,
}

/// Ordered user/assistant turns for one session. Nothing is persisted.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    generation: u64,
    open_turn: Option<OpenTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|msg| &msg.id == id)
    }

    /// True while an assistant turn is accepting fragments.
    pub fn is_streaming(&self) -> bool {
        self.open_turn.is_some()
    }

    /// Append a user turn. Blank text is accepted here; rejecting it is up to the caller.
    pub fn append_user(&mut self, text: impl Into<String>) -> &Message {
        self.messages.push(Message::user(text));
        let index = self.messages.len() - 1;
        &self.messages[index]
    }

    /// Append an empty assistant turn and hand out its only writer.
    ///
    /// A turn that is still open is closed as failed first and its stream is
    /// cancelled.
    pub fn begin_assistant_turn(&mut self) -> AssistantHandle {
        if let Some(open) = self.open_turn.take() {
            warn!("new assistant turn requested while a stream was still open");
            open.cancel_token.cancel();
            if let Some(msg) = self.messages.get_mut(open.index) {
                msg.content = FALLBACK_MESSAGE.to_string();
                msg.state = TurnState::Failed;
            }
        }

        let placeholder = Message::assistant_placeholder();
        let id = placeholder.id.clone();
        self.messages.push(placeholder);
        let index = self.messages.len() - 1;
        let cancel_token = CancellationToken::new();

        self.open_turn = Some(OpenTurn {
            index,
            cancel_token: cancel_token.clone(),
        });

        AssistantHandle {
            id,
            index,
            generation: self.generation,
            cancel_token,
        }
    }

    fn is_live(&self, handle: &AssistantHandle) -> bool {
        handle.generation == self.generation
            && self
                .open_turn
                .as_ref()
                .is_some_and(|open| open.index == handle.index)
            && self
                .messages
                .get(handle.index)
                .is_some_and(|msg| msg.id == handle.id && msg.state.is_open())
    }

    /// Append a fragment to the handle's turn. Returns `false`, changing
    /// nothing, when the handle is stale.
    pub fn append_to_handle(&mut self, handle: &AssistantHandle, fragment: &str) -> bool {
        if !self.is_live(handle) {
            debug!(message_id = %handle.id, "dropping fragment for stale handle");
            return false;
        }

        let msg = &mut self.messages[handle.index];
        msg.content.push_str(fragment);
        msg.state = TurnState::Streaming;
        true
    }

    /// Freeze the turn with the content received so far.
    pub fn finish(&mut self, handle: AssistantHandle) -> Option<&Message> {
        self.close(handle, TurnState::Final)
    }

    /// Mark the turn failed and replace whatever arrived with [`FALLBACK_MESSAGE`].
    pub fn fail(&mut self, handle: AssistantHandle) -> Option<&Message> {
        self.close(handle, TurnState::Failed)
    }

    fn close(&mut self, handle: AssistantHandle, state: TurnState) -> Option<&Message> {
        if !self.is_live(&handle) {
            return None;
        }

        self.open_turn = None;
        let msg = &mut self.messages[handle.index];
        msg.state = state;
        if state == TurnState::Failed {
            msg.content = FALLBACK_MESSAGE.to_string();
        }
        Some(&self.messages[handle.index])
    }

    /// Drop every turn. Outstanding handles become stale and their streams are cancelled.
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(open) = self.open_turn.take() {
            open.cancel_token.cancel();
        }
        self.messages.clear();
    }

    /// Completed exchanges, in order, for the next request.
    ///
    /// Open, failed, or empty assistant turns are left out together with the
    /// user turn directly before them, so roles keep alternating.
    pub fn history(&self) -> Vec<HistoryTurn> {
        let mut turns: Vec<(usize, HistoryTurn)> = Vec::with_capacity(self.messages.len());

        for (index, msg) in self.messages.iter().enumerate() {
            match msg.role {
                Role::User => turns.push((index, HistoryTurn::user(msg.content.clone()))),
                Role::Assistant if msg.is_final() && !msg.content.is_empty() => {
                    turns.push((index, HistoryTurn::assistant(msg.content.clone())));
                }
                Role::Assistant => {
                    let drop_prompt = turns
                        .last()
                        .is_some_and(|(prev, turn)| turn.role.is_user() && prev + 1 == index);
                    if drop_prompt {
                        turns.pop();
                    }
                }
            }
        }

        turns.into_iter().map(|(_, turn)| turn).collect()
    }
}
