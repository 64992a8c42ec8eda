use serde::{Deserialize, Serialize};

/// Top-level application settings.
///
/// Loaded from an optional `intervox.toml` file, then overridden by
/// `INTERVOX__`-prefixed environment variables (`__` separates nesting,
/// e.g. `INTERVOX__AGENT__BASE_URL`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub agent: AgentServiceSettings,
    #[serde(default)]
    pub captions: CaptionSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

/// Agent-service endpoint used for the interview invitation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentServiceSettings {
    /// Base URL of the interviewer agent service, no trailing slash.
    pub base_url: String,
    /// Request timeout for the invitation call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AgentServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Live-captioning options passed to the media provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSettings {
    /// BCP-47 language tag for closed captions (e.g. "en-US").
    pub language: String,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
        }
    }
}

/// Session lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// How long to wait after the sole remote participant leaves before
    /// ending the session, absorbing transient reconnects.
    pub leave_debounce_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            leave_debounce_ms: 500,
        }
    }
}

impl Settings {
    /// Loads settings from `intervox.toml` (if present) and the environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("intervox").required(false))
            .add_source(
                config::Environment::with_prefix("INTERVOX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
