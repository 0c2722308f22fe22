use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use snafu::Snafu;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: Option<String>,
    pub endpoint: String,
    pub connect_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: Option<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            endpoint: endpoint.into().trim().trim_end_matches('/').to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// Fixed parameters a remote chat session is opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub system_instruction: String,
    pub model_id: String,
    pub temperature: f64,
    pub grounding_enabled: bool,
}

impl SessionConfig {
    pub fn new(model_id: impl Into<String>, system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            model_id: model_id.into(),
            temperature: 1.0,
            grounding_enabled: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_grounding(mut self, enabled: bool) -> Self {
        self.grounding_enabled = enabled;
        self
    }
}

/// One web source the model attached to part of its answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroundingReference {
    pub uri: Option<String>,
    pub title: Option<String>,
}

impl GroundingReference {
    pub fn web(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            title: None,
        }
    }
}

/// One unit of the remote response stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseUnit {
    pub text: Option<String>,
    pub grounding: Vec<GroundingReference>,
}

impl ResponseUnit {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            grounding: Vec::new(),
        }
    }

    pub fn with_grounding(mut self, grounding: Vec<GroundingReference>) -> Self {
        self.grounding = grounding;
        self
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderResult<T> = Result<T, ProviderError>;
pub type UnitStream = BoxStream<'static, ProviderResult<ResponseUnit>>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("invalid session configuration: {details}"))]
    InvalidSessionConfig {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("failed to build http client on `{stage}`, {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("cannot send an empty message"))]
    EmptyMessage { stage: &'static str },
    #[snafu(display("request failed on `{stage}`, {source}"))]
    SendRequest {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("provider returned status {status}: {body}"))]
    ResponseStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to read response stream on `{stage}`, {source}"))]
    ReadStream {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("malformed event stream: {details}"))]
    InvalidEventStream {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("failed to decode response payload on `{stage}`, {source}"))]
    DecodePayload {
        stage: &'static str,
        payload: String,
        source: serde_json::Error,
    },
    #[snafu(display("provider refused to answer: {reason}"))]
    Blocked {
        stage: &'static str,
        reason: String,
    },
    #[snafu(display("provider returned an empty answer"))]
    EmptyResponse { stage: &'static str },
    #[snafu(display("provider reported an error: {message}"))]
    RemoteError {
        stage: &'static str,
        code: Option<i64>,
        message: String,
    },
}

impl ProviderError {
    /// Errors caused by local setup rather than by talking to the provider.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey { .. }
                | Self::UnsupportedProvider { .. }
                | Self::InvalidSessionConfig { .. }
                | Self::BuildHttpClient { .. }
        )
    }
}

/// A remote chat service able to open conversational sessions.
pub trait ChatBackend: Send + Sync {
    fn id(&self) -> &str;
    fn create_session<'a>(
        &'a self,
        config: SessionConfig,
    ) -> BoxFuture<'a, ProviderResult<Arc<dyn ChatSession>>>;
}

/// An open session. Context accumulates across `send_message` calls.
pub trait ChatSession: Send + Sync {
    fn model_id(&self) -> &str;
    fn send_message<'a>(&'a self, message: String) -> BoxFuture<'a, ProviderResult<UnitStream>>;
}
