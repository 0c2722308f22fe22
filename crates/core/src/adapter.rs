//! Streaming client adapter over a remote chat backend.
//!
//! Owns the lazily created session handle and turns the backend's response
//! units into text fragments with per-unit deduplicated citation URLs.

use std::sync::Arc;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio::sync::OnceCell;
use zhifa_llm::{ChatBackend, ChatSession, ResponseUnit, SessionConfig};

use crate::citation::CitationSet;
use crate::error::{ChatError, ChatResult};

/// One incremental piece of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    /// URLs first seen in this unit; `None` when the unit carried none.
    pub citations: Option<Vec<String>>,
}

impl Fragment {
    /// Maps one response unit; units with neither text nor URLs yield nothing.
    pub fn from_unit(unit: ResponseUnit) -> Option<Self> {
        let urls = unit
            .grounding
            .into_iter()
            .filter_map(|reference| reference.uri)
            .map(|uri| uri.trim().to_string())
            .filter(|uri| !uri.is_empty())
            .collect::<CitationSet>();
        let text = unit.text.unwrap_or_default();

        if text.is_empty() && urls.is_empty() {
            return None;
        }

        Some(Self {
            text,
            citations: if urls.is_empty() {
                None
            } else {
                Some(urls.into_vec())
            },
        })
    }
}

pub type FragmentStream<'a> = BoxStream<'a, ChatResult<Fragment>>;

pub struct StreamingClient {
    backend: Arc<dyn ChatBackend>,
    session_config: SessionConfig,
    session: OnceCell<Arc<dyn ChatSession>>,
}

impl StreamingClient {
    pub fn new(backend: Arc<dyn ChatBackend>, session_config: SessionConfig) -> Self {
        Self {
            backend,
            session_config,
            session: OnceCell::new(),
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.initialized()
    }

    /// Opens the remote session on first use and reuses it afterwards.
    ///
    /// Concurrent first calls share one creation attempt; a failed attempt
    /// leaves the cell empty so a later call can try again.
    pub async fn ensure_session(&self) -> ChatResult<Arc<dyn ChatSession>> {
        let session = self
            .session
            .get_or_try_init(|| async {
                tracing::debug!(
                    backend = %self.backend.id(),
                    model_id = %self.session_config.model_id,
                    "creating chat session"
                );
                self.backend
                    .create_session(self.session_config.clone())
                    .await
                    .map_err(|error| ChatError::from_provider("ensure-session", error))
            })
            .await?;

        Ok(Arc::clone(session))
    }

    /// Sends `prompt` and returns its response fragments.
    ///
    /// Nothing happens until the stream is polled. The stream ends after the
    /// first error it yields.
    pub fn send_prompt(&self, prompt: impl Into<String>) -> FragmentStream<'_> {
        let prompt = prompt.into();

        stream::once(async move {
            let session = self.ensure_session().await?;
            let units = session
                .send_message(prompt)
                .await
                .map_err(|error| ChatError::from_provider("send-prompt", error))?;

            Ok::<_, ChatError>(
                units.map_err(|error| ChatError::from_provider("stream-unit", error)),
            )
        })
        .try_flatten()
        .try_filter_map(|unit| future::ready(Ok(Fragment::from_unit(unit))))
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use zhifa_llm::{GroundingReference, ProviderError, ResponseUnit};

    use super::*;
    use crate::testing::{ScriptedBackend, Step};

    fn unit(text: &str, uris: &[&str]) -> ResponseUnit {
        ResponseUnit::text(text).with_grounding(
            uris.iter()
                .map(|uri| GroundingReference::web(*uri))
                .collect(),
        )
    }

    fn client(backend: Arc<ScriptedBackend>) -> StreamingClient {
        StreamingClient::new(backend, SessionConfig::new("test-model", "persona"))
    }

    #[test]
    fn fragment_dedups_urls_within_one_unit() {
        let fragment = Fragment::from_unit(unit("A", &["u1", "u2", "u1", " "])).unwrap();

        assert_eq!(fragment.text, "A");
        assert_eq!(
            fragment.citations,
            Some(vec!["u1".to_string(), "u2".to_string()])
        );
    }

    #[test]
    fn fragment_without_urls_has_no_citations() {
        let fragment = Fragment::from_unit(ResponseUnit {
            text: Some("A".to_string()),
            grounding: vec![GroundingReference::default()],
        })
        .unwrap();

        assert_eq!(fragment.citations, None);
        assert_eq!(Fragment::from_unit(ResponseUnit::default()), None);
    }

    #[test]
    fn citation_only_unit_still_yields_fragment() {
        let fragment = Fragment::from_unit(ResponseUnit {
            text: None,
            grounding: vec![GroundingReference::web("u9")],
        })
        .unwrap();

        assert_eq!(fragment.text, "");
        assert_eq!(fragment.citations, Some(vec!["u9".to_string()]));
    }

    #[tokio::test]
    async fn session_is_created_once_and_reused() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_turn(vec![Step::Unit(unit("one", &[]))]);
        backend.push_turn(vec![Step::Unit(unit("two", &[]))]);
        let client = client(Arc::clone(&backend));

        assert!(!client.has_session());
        let first = client.send_prompt("p1").collect::<Vec<_>>().await;
        let second = client.send_prompt("p2").collect::<Vec<_>>().await;

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert!(client.has_session());
        assert_eq!(backend.sessions_created(), 1);
        assert_eq!(backend.prompts(), vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(backend.last_session_config().unwrap().model_id, "test-model");
    }

    #[tokio::test]
    async fn stream_is_lazy_until_polled() {
        let backend = Arc::new(ScriptedBackend::new());
        let client = client(Arc::clone(&backend));

        let stream = client.send_prompt("never sent");
        drop(stream);

        assert_eq!(backend.sessions_created(), 0);
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_surfaces_configuration_error() {
        let backend = Arc::new(ScriptedBackend::without_credential());
        let client = client(Arc::clone(&backend));

        let error = match client.ensure_session().await {
            Ok(_) => panic!("session must not open"),
            Err(error) => error,
        };
        assert!(error.is_configuration());

        let items = client.send_prompt("hi").collect::<Vec<_>>().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(error) if error.is_configuration()));
    }

    #[tokio::test]
    async fn error_mid_stream_ends_the_sequence() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_turn(vec![
            Step::Unit(unit("partial", &[])),
            Step::Fail(ProviderError::RemoteError {
                stage: "test",
                code: None,
                message: "reset".to_string(),
            }),
            Step::Unit(unit("after", &[])),
        ]);
        let client = client(backend);

        let items = client.send_prompt("q").collect::<Vec<_>>().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text, "partial");
        assert!(matches!(&items[1], Err(error) if error.is_transport()));
    }

    #[tokio::test]
    async fn open_failure_is_a_transport_error() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_open_failure(ProviderError::ResponseStatus {
            stage: "test",
            status: 500,
            body: "oops".to_string(),
        });
        let client = client(backend);

        let items = client.send_prompt("q").collect::<Vec<_>>().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(ChatError::Transport { .. })));
    }
}
