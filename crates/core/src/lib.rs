pub mod adapter;
pub mod citation;
pub mod config;
pub mod domain;
mod error;
pub mod message;
pub mod orchestrator;
pub mod persona;
#[cfg(test)]
mod testing;

pub use adapter::{Fragment, FragmentStream, StreamingClient};
pub use citation::CitationSet;
pub use config::{Settings, credential_from_env};
pub use domain::{LegalDomain, UnknownDomain};
pub use error::{ChatError, ChatResult};
pub use message::{Conversation, Message, MessageId, Sender, TurnState};
pub use orchestrator::{ConversationEvent, ConversationOrchestrator, TurnOutcome, TurnRejection};

/// Builds the Gemini-backed client described by `settings`.
///
/// A missing `api_key` is not an error here; it surfaces when the first
/// session is opened.
pub fn connect(settings: &Settings, api_key: Option<String>) -> ChatResult<StreamingClient> {
    let backend = zhifa_llm::create_backend(settings.provider_config(api_key))
        .map_err(|error| ChatError::from_provider("create-backend", error))?;

    Ok(StreamingClient::new(backend, settings.session_config()))
}
