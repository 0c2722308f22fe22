use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::citation::CitationSet;

/// Opaque, unique message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Time-ordered, so ids sort in creation order.
    pub fn new_v7() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Sequence number of one submitted turn.
///
/// Changes on every submit so transitions from an earlier turn can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl TurnId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub streaming: bool,
    pub citations: CitationSet,
    /// Interim text shown while streaming and before any content arrived.
    pub notice: Option<String>,
}

impl Message {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_v7(),
            sender,
            content: content.into(),
            created_at: Utc::now(),
            streaming: false,
            citations: CitationSet::new(),
            notice: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Sender::System, content)
    }

    /// Empty assistant message that will receive streamed fragments.
    pub fn assistant_streaming(notice: impl Into<String>) -> Self {
        Self {
            streaming: true,
            notice: Some(notice.into()),
            ..Self::assistant(String::new())
        }
    }

    /// Text a front end should render for this message.
    pub fn display_text(&self) -> &str {
        match &self.notice {
            Some(notice) if self.content.is_empty() => notice,
            _ => &self.content,
        }
    }

    /// False for a finalized assistant placeholder that never got content.
    pub fn is_displayable(&self) -> bool {
        self.streaming || !self.content.is_empty() || !self.citations.is_empty()
    }

    /// Appends a streamed delta and merges citations. Returns the new URLs.
    fn apply_fragment(&mut self, delta: &str, citations: &[String]) -> Vec<String> {
        if !delta.is_empty() {
            self.notice = None;
            self.content.push_str(delta);
        }
        self.citations.merge(citations.iter().cloned())
    }

    fn finalize(&mut self) {
        self.streaming = false;
        self.notice = None;
    }
}

/// Why a message-level edit was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEditRejection {
    NotFound(MessageId),
    NotStreaming(MessageId),
    AlreadyStreaming(MessageId),
}

/// Ordered, append-only message list plus the state of the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    turn_state: TurnState,
    next_turn: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn turn_state(&self) -> &TurnState {
        &self.turn_state
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    /// The message currently receiving fragments, if any.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|message| message.streaming)
    }

    /// Appends a non-streaming message.
    pub fn push(&mut self, message: Message) -> MessageId {
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Appends a streaming placeholder; refused while another one is open.
    pub fn push_streaming(&mut self, message: Message) -> Result<MessageId, MessageEditRejection> {
        if let Some(active) = self.streaming_message() {
            return Err(MessageEditRejection::AlreadyStreaming(active.id));
        }

        Ok(self.push(message))
    }

    pub fn apply_fragment(
        &mut self,
        id: MessageId,
        delta: &str,
        citations: &[String],
    ) -> Result<Vec<String>, MessageEditRejection> {
        let message = self.streaming_mut(id)?;
        Ok(message.apply_fragment(delta, citations))
    }

    pub fn finalize(&mut self, id: MessageId) -> Result<(), MessageEditRejection> {
        self.streaming_mut(id)?.finalize();
        Ok(())
    }

    /// Allocates the id of the next turn.
    pub fn next_turn_id(&mut self) -> TurnId {
        self.next_turn = self.next_turn.saturating_add(1);
        TurnId::new(self.next_turn)
    }

    /// Applies a deterministic turn transition.
    pub fn apply_turn_transition(&mut self, transition: TurnTransition) -> TurnTransitionResult {
        let next_state = self.turn_state.apply(transition)?;
        self.turn_state = next_state.clone();
        Ok(next_state)
    }

    fn streaming_mut(&mut self, id: MessageId) -> Result<&mut Message, MessageEditRejection> {
        let message = self
            .messages
            .iter_mut()
            .find(|message| message.id == id)
            .ok_or(MessageEditRejection::NotFound(id))?;

        if !message.streaming {
            return Err(MessageEditRejection::NotStreaming(id));
        }

        Ok(message)
    }
}

/// Lifecycle of one turn: `Idle -> Sending -> Streaming -> {Completed | Failed}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Sending(TurnId),
    Streaming(TurnId),
    Completed(TurnId),
    Failed { turn: TurnId, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransition {
    Submit(TurnId),
    FirstFragment(TurnId),
    Complete(TurnId),
    Fail { turn: TurnId, message: String },
    ResetToIdle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransitionRejection {
    AlreadyInFlight { active: TurnId, attempted: TurnId },
    NoActiveTurn,
    TurnMismatch { active: TurnId, attempted: TurnId },
}

pub type TurnTransitionResult = Result<TurnState, TurnTransitionRejection>;

impl TurnState {
    /// Returns the in-flight turn for `Sending` and `Streaming`.
    pub fn active_turn(&self) -> Option<TurnId> {
        match self {
            Self::Sending(turn) | Self::Streaming(turn) => Some(*turn),
            Self::Idle | Self::Completed(_) | Self::Failed { .. } => None,
        }
    }

    /// Applies one transition deterministically.
    ///
    /// A new turn may only be submitted when nothing is in flight. Fragment and
    /// terminal transitions must name the active turn exactly.
    pub fn apply(&self, transition: TurnTransition) -> TurnTransitionResult {
        match transition {
            TurnTransition::Submit(turn) => self.apply_submit(turn),
            TurnTransition::FirstFragment(turn) => self.apply_first_fragment(turn),
            TurnTransition::Complete(turn) => {
                self.check_active(turn)?;
                Ok(Self::Completed(turn))
            }
            TurnTransition::Fail { turn, message } => {
                self.check_active(turn)?;
                Ok(Self::Failed { turn, message })
            }
            TurnTransition::ResetToIdle => Ok(Self::Idle),
        }
    }

    fn apply_submit(&self, turn: TurnId) -> TurnTransitionResult {
        match self.active_turn() {
            Some(active) => Err(TurnTransitionRejection::AlreadyInFlight {
                active,
                attempted: turn,
            }),
            None => Ok(Self::Sending(turn)),
        }
    }

    fn apply_first_fragment(&self, turn: TurnId) -> TurnTransitionResult {
        self.check_active(turn)?;
        Ok(Self::Streaming(turn))
    }

    fn check_active(&self, turn: TurnId) -> Result<(), TurnTransitionRejection> {
        match self.active_turn() {
            Some(active) if active == turn => Ok(()),
            Some(active) => Err(TurnTransitionRejection::TurnMismatch {
                active,
                attempted: turn,
            }),
            None => Err(TurnTransitionRejection::NoActiveTurn),
        }
    }
}
