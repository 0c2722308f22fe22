//! In-memory backend driven by queued scripts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use futures::stream;
use tokio::sync::Notify;
use zhifa_llm::{
    BoxFuture, ChatBackend, ChatSession, ProviderError, ProviderResult, ResponseUnit,
    SessionConfig, UnitStream,
};

pub enum Step {
    Unit(ResponseUnit),
    Fail(ProviderError),
    /// Parks the stream until the notify fires.
    WaitFor(Arc<Notify>),
}

enum Script {
    Turn(Vec<Step>),
    OpenFailure(ProviderError),
}

#[derive(Default)]
struct Shared {
    scripts: Mutex<VecDeque<Script>>,
    prompts: Mutex<Vec<String>>,
    sessions_created: Mutex<usize>,
    last_config: Mutex<Option<SessionConfig>>,
}

pub struct ScriptedBackend {
    shared: Arc<Shared>,
    credential: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            credential: true,
        }
    }

    pub fn without_credential() -> Self {
        Self {
            credential: false,
            ..Self::new()
        }
    }

    pub fn push_turn(&self, steps: Vec<Step>) {
        lock(&self.shared.scripts).push_back(Script::Turn(steps));
    }

    pub fn push_open_failure(&self, error: ProviderError) {
        lock(&self.shared.scripts).push_back(Script::OpenFailure(error));
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.shared.prompts).clone()
    }

    pub fn sessions_created(&self) -> usize {
        *lock(&self.shared.sessions_created)
    }

    pub fn last_session_config(&self) -> Option<SessionConfig> {
        lock(&self.shared.last_config).clone()
    }
}

impl ChatBackend for ScriptedBackend {
    fn id(&self) -> &str {
        "scripted"
    }

    fn create_session<'a>(
        &'a self,
        config: SessionConfig,
    ) -> BoxFuture<'a, ProviderResult<Arc<dyn ChatSession>>> {
        Box::pin(async move {
            if !self.credential {
                return Err(ProviderError::MissingApiKey {
                    stage: "create-session",
                    provider_id: "scripted".to_string(),
                });
            }

            *lock(&self.shared.sessions_created) += 1;
            let model_id = config.model_id.clone();
            *lock(&self.shared.last_config) = Some(config);

            Ok(Arc::new(ScriptedSession {
                shared: Arc::clone(&self.shared),
                model_id,
            }) as Arc<dyn ChatSession>)
        })
    }
}

struct ScriptedSession {
    shared: Arc<Shared>,
    model_id: String,
}

impl ChatSession for ScriptedSession {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn send_message<'a>(&'a self, message: String) -> BoxFuture<'a, ProviderResult<UnitStream>> {
        Box::pin(async move {
            lock(&self.shared.prompts).push(message);
            let script = lock(&self.shared.scripts)
                .pop_front()
                .unwrap_or(Script::Turn(Vec::new()));

            let steps = match script {
                Script::Turn(steps) => steps,
                Script::OpenFailure(error) => return Err(error),
            };

            let units = stream::unfold(VecDeque::from(steps), |mut steps| async move {
                loop {
                    match steps.pop_front()? {
                        Step::Unit(unit) => return Some((Ok(unit), steps)),
                        Step::Fail(error) => return Some((Err(error), steps)),
                        Step::WaitFor(notify) => notify.notified().await,
                    }
                }
            });

            Ok(units.boxed())
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
