//! Sequences one user turn against the streaming client.
//!
//! A turn appends the user message and a streaming assistant placeholder,
//! folds every fragment into that placeholder and finalizes it. On failure a
//! separate error message follows the placeholder. Only one turn runs at a
//! time and the in-flight flag is released however the turn ends, including
//! when its future is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::adapter::StreamingClient;
use crate::domain::LegalDomain;
use crate::error::ChatError;
use crate::message::{
    Conversation, Message, MessageEditRejection, MessageId, TurnId, TurnState, TurnTransition,
};
use crate::persona::{GREETING, SEARCHING_NOTICE, failure_message};

/// Change notifications for a front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    MessageAppended(Message),
    FragmentApplied {
        message_id: MessageId,
        delta: String,
        new_citations: Vec<String>,
    },
    TurnFinished {
        assistant_message_id: MessageId,
        failed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRejection {
    EmptyInput,
    TurnInFlight,
}

#[derive(Debug)]
pub enum TurnOutcome {
    /// Nothing was appended.
    Rejected(TurnRejection),
    Completed {
        user_message_id: MessageId,
        assistant_message_id: MessageId,
    },
    Failed {
        user_message_id: MessageId,
        assistant_message_id: MessageId,
        error_message_id: MessageId,
        error: ChatError,
    },
}

impl TurnOutcome {
    pub fn assistant_message_id(&self) -> Option<MessageId> {
        match self {
            Self::Rejected(_) => None,
            Self::Completed {
                assistant_message_id,
                ..
            }
            | Self::Failed {
                assistant_message_id,
                ..
            } => Some(*assistant_message_id),
        }
    }
}

pub struct ConversationOrchestrator {
    client: Arc<StreamingClient>,
    conversation: Mutex<Conversation>,
    in_flight: AtomicBool,
    events: Option<mpsc::UnboundedSender<ConversationEvent>>,
}

impl ConversationOrchestrator {
    pub fn new(client: Arc<StreamingClient>) -> Self {
        Self {
            client,
            conversation: Mutex::new(Conversation::new()),
            in_flight: AtomicBool::new(false),
            events: None,
        }
    }

    pub fn with_event_sink(mut self, sink: mpsc::UnboundedSender<ConversationEvent>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Seeds the welcome message into an empty conversation.
    pub fn greet(&self) -> Option<MessageId> {
        let greeting = {
            let mut conversation = self.conversation();
            if !conversation.is_empty() {
                return None;
            }
            let greeting = Message::assistant(GREETING);
            conversation.push(greeting.clone());
            greeting
        };

        let id = greeting.id;
        self.publish(ConversationEvent::MessageAppended(greeting));
        Some(id)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.conversation().messages().to_vec()
    }

    pub fn turn_state(&self) -> TurnState {
        self.conversation().turn_state().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one full turn for `raw_input` narrowed to `domain`.
    pub async fn submit_turn(&self, raw_input: &str, domain: LegalDomain) -> TurnOutcome {
        if raw_input.trim().is_empty() {
            return TurnOutcome::Rejected(TurnRejection::EmptyInput);
        }

        let Some(mut guard) = TurnGuard::acquire(self) else {
            tracing::debug!("turn rejected, another turn is in flight");
            return TurnOutcome::Rejected(TurnRejection::TurnInFlight);
        };

        let prompt = domain.compose_prompt(raw_input);
        let (turn, user_message, placeholder) = {
            let mut conversation = self.conversation();
            let turn = conversation.next_turn_id();
            apply_transition(&mut conversation, TurnTransition::Submit(turn));

            let user_message = Message::user(raw_input);
            conversation.push(user_message.clone());
            let placeholder = open_placeholder(&mut conversation);
            (turn, user_message, placeholder)
        };

        let user_message_id = user_message.id;
        let assistant_message_id = placeholder.id;
        guard.placeholder = Some(assistant_message_id);
        self.publish(ConversationEvent::MessageAppended(user_message));
        self.publish(ConversationEvent::MessageAppended(placeholder));

        tracing::debug!(turn = turn.0, domain = %domain, "turn submitted");

        match self.drive_stream(turn, assistant_message_id, prompt).await {
            Ok(()) => {
                {
                    let mut conversation = self.conversation();
                    finalize_placeholder(&mut conversation, assistant_message_id);
                    apply_transition(&mut conversation, TurnTransition::Complete(turn));
                }
                self.publish(ConversationEvent::TurnFinished {
                    assistant_message_id,
                    failed: false,
                });

                TurnOutcome::Completed {
                    user_message_id,
                    assistant_message_id,
                }
            }
            Err(error) => {
                tracing::warn!(turn = turn.0, error = %error, "turn failed");

                let description = error.to_string();
                let error_message = Message::system(failure_message(&description));
                let error_message_id = error_message.id;
                {
                    let mut conversation = self.conversation();
                    finalize_placeholder(&mut conversation, assistant_message_id);
                    apply_transition(
                        &mut conversation,
                        TurnTransition::Fail {
                            turn,
                            message: description,
                        },
                    );
                    conversation.push(error_message.clone());
                }
                self.publish(ConversationEvent::MessageAppended(error_message));
                self.publish(ConversationEvent::TurnFinished {
                    assistant_message_id,
                    failed: true,
                });

                TurnOutcome::Failed {
                    user_message_id,
                    assistant_message_id,
                    error_message_id,
                    error,
                }
            }
        }
    }

    async fn drive_stream(
        &self,
        turn: TurnId,
        message_id: MessageId,
        prompt: String,
    ) -> Result<(), ChatError> {
        let mut fragments = self.client.send_prompt(prompt);
        let mut streaming = false;

        while let Some(item) = fragments.next().await {
            let fragment = item?;

            let new_citations = {
                let mut conversation = self.conversation();
                if !streaming {
                    apply_transition(&mut conversation, TurnTransition::FirstFragment(turn));
                    streaming = true;
                }
                let citations = fragment.citations.as_deref().unwrap_or_default();
                match conversation.apply_fragment(message_id, &fragment.text, citations) {
                    Ok(new_citations) => new_citations,
                    Err(rejection) => {
                        tracing::warn!(?rejection, "dropping fragment for closed message");
                        continue;
                    }
                }
            };

            if fragment.text.is_empty() && new_citations.is_empty() {
                continue;
            }

            self.publish(ConversationEvent::FragmentApplied {
                message_id,
                delta: fragment.text,
                new_citations,
            });
        }

        Ok(())
    }

    fn conversation(&self) -> MutexGuard<'_, Conversation> {
        self.conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ConversationEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                tracing::trace!("conversation event receiver dropped");
            }
        }
    }
}

/// Holds the in-flight flag for one turn.
///
/// Dropping it closes a placeholder left streaming, returns the turn state
/// to `Idle` and clears the flag.
struct TurnGuard<'a> {
    orchestrator: &'a ConversationOrchestrator,
    placeholder: Option<MessageId>,
}

impl<'a> TurnGuard<'a> {
    fn acquire(orchestrator: &'a ConversationOrchestrator) -> Option<Self> {
        orchestrator
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                orchestrator,
                placeholder: None,
            })
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        {
            let mut conversation = self.orchestrator.conversation();
            if let Some(id) = self.placeholder {
                if conversation.finalize(id).is_ok() {
                    tracing::debug!(message_id = %id, "closed abandoned placeholder");
                }
            }
            apply_transition(&mut conversation, TurnTransition::ResetToIdle);
        }
        self.orchestrator.in_flight.store(false, Ordering::Release);
    }
}

fn open_placeholder(conversation: &mut Conversation) -> Message {
    let placeholder = Message::assistant_streaming(SEARCHING_NOTICE);

    if let Err(MessageEditRejection::AlreadyStreaming(stale)) =
        conversation.push_streaming(placeholder.clone())
    {
        tracing::warn!(message_id = %stale, "closing stale streaming message");
        finalize_placeholder(conversation, stale);
        conversation.push(placeholder.clone());
    }

    placeholder
}

fn finalize_placeholder(conversation: &mut Conversation, id: MessageId) {
    if let Err(rejection) = conversation.finalize(id) {
        tracing::warn!(?rejection, "placeholder was already finalized");
    }
}

fn apply_transition(conversation: &mut Conversation, transition: TurnTransition) {
    if let Err(rejection) = conversation.apply_turn_transition(transition) {
        tracing::warn!(?rejection, state = ?conversation.turn_state(), "turn transition rejected");
    }
}
