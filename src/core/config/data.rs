use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model requested when the config does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Models checked by `jarvis probe` when neither the command line nor the config lists any.
pub const DEFAULT_PROBE_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite-preview-02-05",
    "gemini-2.0-pro-exp-02-05",
    "gemini-2.0-flash-thinking-exp-01-21",
    "gemini-2.0-flash-exp",
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-3.0-flash",
    "gemini-3.0-pro",
    "gemini-3.1-preview",
];

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Model id sent with every request
    pub model: Option<String>,
    /// API root, e.g. a proxy in front of the generative language API
    pub base_url: Option<String>,
    /// Mode selected at startup (e.g., "Developer")
    pub default_mode: Option<String>,
    /// Seconds to wait for a whole single completion, or for each next chunk of a stream
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probe_models: Vec<String>,
}

impl Config {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn probe_models(&self) -> Vec<String> {
        if self.probe_models.is_empty() {
            DEFAULT_PROBE_MODELS.iter().map(|m| m.to_string()).collect()
        } else {
            self.probe_models.clone()
        }
    }

    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  model: {}", self.model());
        println!("  base-url: {}", self.base_url());
        match &self.default_mode {
            Some(mode) => println!("  default-mode: {mode}"),
            None => println!("  default-mode: (unset)"),
        }
        println!("  request-timeout-secs: {}", self.request_timeout_secs());
    }
}

/// Get a user-friendly display string for a path, using `~` for the home
/// directory on Unix-like systems.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
