use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};
use zhifa_llm::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, GEMINI_PROVIDER_ID,
    ProviderConfig, SessionConfig,
};

use crate::error::{ChatResult, InvalidSettingsSnafu, LoadSettingsSnafu};
use crate::persona::SYSTEM_INSTRUCTION;

pub const SETTINGS_DIRECTORY_NAME: &str = "zhifa";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "ZHIFA_";
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Checked in order; the first non-blank value wins.
pub const CREDENTIAL_VARIABLES: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

/// Runtime settings. The credential is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: String,
    pub model_id: String,
    pub temperature: f64,
    pub grounding_enabled: bool,
    pub connect_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            model_id: DEFAULT_GEMINI_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            grounding_enabled: true,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

impl Settings {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".zhifa"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Defaults, then the JSON file at `path` (or the default path), then
    /// `ZHIFA_*` environment variables.
    pub fn load(path: Option<&Path>) -> ChatResult<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_config_path);

        Self::from_figment(Self::file_layers(&path).merge(Env::prefixed(ENV_PREFIX)))
    }

    pub fn from_figment(figment: Figment) -> ChatResult<Self> {
        let settings = figment
            .extract::<Settings>()
            .context(LoadSettingsSnafu {
                stage: "extract-settings",
            })?;

        settings.validated()
    }

    fn file_layers(path: &Path) -> Figment {
        let figment = Figment::from(Serialized::defaults(Settings::default()));
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
            return figment;
        }

        tracing::debug!(path = %path.display(), "loading settings file");
        figment.merge(Json::file(path))
    }

    pub fn validated(mut self) -> ChatResult<Self> {
        self.endpoint = self.endpoint.trim().to_string();
        if self.endpoint.is_empty() {
            self.endpoint = DEFAULT_GEMINI_ENDPOINT.to_string();
        }
        self.model_id = self.model_id.trim().to_string();

        ensure!(
            !self.model_id.is_empty(),
            InvalidSettingsSnafu {
                stage: "validate-settings",
                details: "model_id must not be empty",
            }
        );
        ensure!(
            self.temperature.is_finite() && (0.0..=2.0).contains(&self.temperature),
            InvalidSettingsSnafu {
                stage: "validate-settings",
                details: format!(
                    "temperature must be within 0.0..=2.0, got {}",
                    self.temperature
                ),
            }
        );

        Ok(self)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(&self.model_id, SYSTEM_INSTRUCTION)
            .with_temperature(self.temperature)
            .with_grounding(self.grounding_enabled)
    }

    pub fn provider_config(&self, api_key: Option<String>) -> ProviderConfig {
        ProviderConfig::new(GEMINI_PROVIDER_ID, api_key, &self.endpoint)
            .with_connect_timeout(self.connect_timeout())
    }
}

/// Reads the API credential from the process environment.
pub fn credential_from_env() -> Option<String> {
    credential_from(|name| std::env::var(name).ok())
}

fn credential_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    CREDENTIAL_VARIABLES.iter().find_map(|name| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
