use std::sync::Arc;

mod gemini;
mod provider;
mod sse;
mod wire;

pub use gemini::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, GEMINI_PROVIDER_ID, GeminiBackend};
pub use provider::{
    BoxFuture, ChatBackend, ChatSession, DEFAULT_CONNECT_TIMEOUT, GroundingReference,
    ProviderConfig, ProviderError, ProviderResult, ResponseUnit, SessionConfig, UnitStream,
};

pub fn create_backend(mut config: ProviderConfig) -> ProviderResult<Arc<dyn ChatBackend>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = GEMINI_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "gemini" | "google" => {
            config.provider_id = GEMINI_PROVIDER_ID.to_string();
            Ok(Arc::new(GeminiBackend::new(config)?))
        }
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-backend",
            provider_id: config.provider_id,
        }),
    }
}
