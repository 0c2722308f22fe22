use snafu::Snafu;
use zhifa_llm::ProviderError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("configuration error on `{stage}`: {source}"))]
    Configuration {
        stage: &'static str,
        source: ProviderError,
    },
    #[snafu(display("invalid settings: {details}"))]
    InvalidSettings {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("failed to load settings on `{stage}`: {source}"))]
    LoadSettings {
        stage: &'static str,
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
    #[snafu(display("{source}"))]
    Transport {
        stage: &'static str,
        source: ProviderError,
    },
}

pub type ChatResult<T> = Result<T, ChatError>;

impl ChatError {
    /// Splits provider failures into configuration and transport errors.
    pub fn from_provider(stage: &'static str, source: ProviderError) -> Self {
        if source.is_configuration() {
            Self::Configuration { stage, source }
        } else {
            Self::Transport { stage, source }
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::InvalidSettings { .. } | Self::LoadSettings { .. }
        )
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
