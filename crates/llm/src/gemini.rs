use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, BoxStream, StreamExt};
use snafu::{OptionExt, ResultExt, ensure};

use super::provider::{
    BoxFuture, BuildHttpClientSnafu, ChatBackend, ChatSession, DecodePayloadSnafu,
    EmptyMessageSnafu, InvalidSessionConfigSnafu, MissingApiKeySnafu, ProviderConfig,
    ProviderError, ProviderResult, ResponseUnit, SendRequestSnafu, SessionConfig, UnitStream,
};
use super::sse::SseDecoder;
use super::wire::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Tool};

pub const GEMINI_PROVIDER_ID: &str = "gemini";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_LOGGED_PAYLOAD_CHARS: usize = 512;

pub struct GeminiBackend {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context(BuildHttpClientSnafu {
                stage: "gemini-backend-new",
            })?;

        Ok(Self { config, client })
    }

    fn stream_url(&self, model_id: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.endpoint, model_id
        )
    }
}

impl ChatBackend for GeminiBackend {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn create_session<'a>(
        &'a self,
        config: SessionConfig,
    ) -> BoxFuture<'a, ProviderResult<Arc<dyn ChatSession>>> {
        Box::pin(async move {
            let api_key = self.config.api_key.clone().context(MissingApiKeySnafu {
                stage: "gemini-create-session",
                provider_id: self.config.provider_id.clone(),
            })?;

            let model_id = config.model_id.trim().to_string();
            ensure!(
                !model_id.is_empty(),
                InvalidSessionConfigSnafu {
                    stage: "gemini-create-session",
                    details: "model id is empty".to_string(),
                }
            );

            tracing::info!(
                provider_id = %self.config.provider_id,
                model_id = %model_id,
                temperature = config.temperature,
                grounding_enabled = config.grounding_enabled,
                "opened gemini chat session"
            );

            let session = GeminiSession {
                inner: Arc::new(SessionInner {
                    client: self.client.clone(),
                    url: self.stream_url(&model_id),
                    api_key,
                    model_id,
                    config,
                    history: Mutex::new(Vec::new()),
                }),
            };

            Ok(Arc::new(session) as Arc<dyn ChatSession>)
        })
    }
}

/// Gemini's REST surface is stateless, so the session replays its own history.
pub struct GeminiSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model_id: String,
    config: SessionConfig,
    history: Mutex<Vec<Content>>,
}

impl SessionInner {
    fn history(&self) -> std::sync::MutexGuard<'_, Vec<Content>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_contents(&self, message: &str) -> Vec<Content> {
        let mut contents = self.history().clone();
        contents.push(Content::user(message));
        contents
    }

    async fn open_stream(self: Arc<Self>, message: String) -> ProviderResult<UnitStream> {
        ensure!(
            !message.trim().is_empty(),
            EmptyMessageSnafu {
                stage: "gemini-open-stream",
            }
        );

        let contents = self.build_contents(&message);
        let tools = if self.config.grounding_enabled {
            vec![Tool::default()]
        } else {
            Vec::new()
        };
        let request = GenerateContentRequest {
            system_instruction: Some(Content::instruction(&self.config.system_instruction))
                .filter(|_| !self.config.system_instruction.trim().is_empty()),
            contents: &contents,
            tools,
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .context(SendRequestSnafu {
                stage: "gemini-send-request",
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                model_id = %self.model_id,
                status = status.as_u16(),
                "gemini rejected stream request"
            );
            return Err(ProviderError::ResponseStatus {
                stage: "gemini-response-status",
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            model_id = %self.model_id,
            history_len = contents.len(),
            "gemini stream opened"
        );

        let state = StreamState {
            bytes: response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            eof: false,
            done: false,
            deferred: None,
            session: Arc::clone(&self),
            prompt: message,
            reply: String::new(),
        };

        Ok(stream::unfold(state, next_unit).boxed())
    }

    fn commit_turn(&self, prompt: String, reply: String) {
        let mut history = self.history();
        history.push(Content::user(prompt));
        history.push(Content::model(reply));
    }
}

impl ChatSession for GeminiSession {
    fn model_id(&self) -> &str {
        &self.inner.model_id
    }

    fn send_message<'a>(&'a self, message: String) -> BoxFuture<'a, ProviderResult<UnitStream>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(inner.open_stream(message))
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    eof: bool,
    done: bool,
    deferred: Option<ProviderError>,
    session: Arc<SessionInner>,
    prompt: String,
    reply: String,
}

async fn next_unit(mut state: StreamState) -> Option<(ProviderResult<ResponseUnit>, StreamState)> {
    loop {
        if let Some(error) = state.deferred.take() {
            state.done = true;
            return Some((Err(error), state));
        }

        if state.done {
            return None;
        }

        if let Some(payload) = state.pending.pop_front() {
            match decode_payload(&payload) {
                Ok(Some(response)) => {
                    let unit = response.to_unit();
                    if let Some(text) = &unit.text {
                        state.reply.push_str(text);
                    }

                    if let Some(reason) = response.stop_reason() {
                        tracing::warn!(
                            model_id = %state.session.model_id,
                            reason = %reason,
                            "gemini stopped the answer"
                        );
                        let error = ProviderError::Blocked {
                            stage: "gemini-stop-reason",
                            reason,
                        };
                        if unit == ResponseUnit::default() {
                            state.done = true;
                            return Some((Err(error), state));
                        }
                        // Hand out what was generated before failing.
                        state.deferred = Some(error);
                    }

                    return Some((Ok(unit), state));
                }
                Ok(None) => continue,
                Err(error) => {
                    tracing::warn!(
                        model_id = %state.session.model_id,
                        error = %error,
                        "gemini stream emitted an error payload"
                    );
                    state.done = true;
                    return Some((Err(error), state));
                }
            }
        }

        if state.eof {
            state.done = true;
            if state.reply.is_empty() {
                tracing::warn!(model_id = %state.session.model_id, "gemini answer was empty");
                return Some((
                    Err(ProviderError::EmptyResponse {
                        stage: "gemini-end-of-stream",
                    }),
                    state,
                ));
            }

            let prompt = std::mem::take(&mut state.prompt);
            let reply = std::mem::take(&mut state.reply);
            state.session.commit_turn(prompt, reply);
            return None;
        }

        match state.bytes.next().await {
            Some(Ok(chunk)) => match state.decoder.push(&chunk) {
                Ok(events) => state.pending.extend(events),
                Err(error) => {
                    state.done = true;
                    return Some((Err(error), state));
                }
            },
            Some(Err(source)) => {
                tracing::warn!(
                    model_id = %state.session.model_id,
                    error = %source,
                    "gemini stream interrupted"
                );
                state.done = true;
                return Some((
                    Err(ProviderError::ReadStream {
                        stage: "gemini-read-chunk",
                        source,
                    }),
                    state,
                ));
            }
            None => {
                state.eof = true;
                match state.decoder.finish() {
                    Ok(Some(event)) => state.pending.push_back(event),
                    Ok(None) => {}
                    Err(error) => {
                        state.done = true;
                        return Some((Err(error), state));
                    }
                }
            }
        }
    }
}

fn decode_payload(payload: &str) -> ProviderResult<Option<GenerateContentResponse>> {
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return Ok(None);
    }

    let mut response: GenerateContentResponse =
        serde_json::from_str(payload).context(DecodePayloadSnafu {
            stage: "gemini-decode-payload",
            payload: payload.chars().take(MAX_LOGGED_PAYLOAD_CHARS).collect::<String>(),
        })?;

    if let Some(error) = response.error.take() {
        return Err(ProviderError::RemoteError {
            stage: "gemini-stream-error",
            code: error.code,
            message: error.message,
        });
    }

    Ok(Some(response))
}
