use std::time::Duration;

use crate::core::config::data::Config;
use crate::core::error::CompletionError;
use crate::utils::url::normalize_base_url;

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Optional environment override for the API root.
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";

/// Everything the completion client needs, captured once at startup.
#[derive(Clone)]
pub struct ClientSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl ClientSettings {
    /// Resolve settings from the config file plus the process environment.
    pub fn from_env(config: &Config) -> Result<Self, CompletionError> {
        Self::resolve(
            config,
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(BASE_URL_ENV).ok(),
        )
    }

    /// Resolve settings from explicit values; an absent or blank key is a
    /// configuration error.
    pub fn resolve(
        config: &Config,
        api_key: Option<String>,
        base_url_override: Option<String>,
    ) -> Result<Self, CompletionError> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| CompletionError::missing_credential(API_KEY_ENV))?;

        let base_url = base_url_override
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| config.base_url().to_string());

        Ok(Self {
            api_key,
            base_url: normalize_base_url(&base_url),
            model: config.model().to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs()),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
