//! Persona modes and the system instruction they produce.

use serde::Deserialize;
use std::fmt;

/// Base persona prompt shared by every mode.
pub const BASE_PERSONA: &str = include_str!("../builtins/persona.md");

/// Mode used when neither the command line nor the config picks one.
pub const DEFAULT_MODE_ID: &str = "General";

/// A named persona directive. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Mode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub directive: String,
}

impl Mode {
    /// Full system instruction for requests made in this mode.
    pub fn system_instruction(&self) -> String {
        format!(
            "{}\n\nCURRENT MODE: {}\n{}",
            BASE_PERSONA.trim_end(),
            self.id,
            self.directive
        )
    }
}

/// Returned when a mode id is not part of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode {
    pub id: String,
    pub available: Vec<String>,
}

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mode '{}' not found. Available modes: {}",
            self.id,
            self.available.join(", ")
        )
    }
}

impl std::error::Error for UnknownMode {}

#[derive(Debug, Deserialize)]
struct BuiltinModeConfig {
    modes: Vec<Mode>,
}

/// The fixed, ordered set of modes.
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    modes: Vec<Mode>,
}

impl ModeRegistry {
    /// Parse the table shipped with the binary.
    pub fn builtin() -> Self {
        const CONFIG_CONTENT: &str = include_str!("../builtins/modes.toml");
        let config: BuiltinModeConfig =
            toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtins/modes.toml");
        Self {
            modes: config.modes,
        }
    }

    pub fn list_modes(&self) -> &[Mode] {
        &self.modes
    }

    /// Exact id lookup.
    pub fn get(&self, id: &str) -> Result<&Mode, UnknownMode> {
        self.modes
            .iter()
            .find(|mode| mode.id == id)
            .ok_or_else(|| self.unknown(id))
    }

    /// Case-insensitive lookup for ids typed by a user.
    pub fn resolve(&self, input: &str) -> Result<&Mode, UnknownMode> {
        let needle = input.trim();
        self.modes
            .iter()
            .find(|mode| mode.id.eq_ignore_ascii_case(needle))
            .ok_or_else(|| self.unknown(needle))
    }

    pub fn directive_for(&self, id: &str) -> Result<&str, UnknownMode> {
        self.get(id).map(|mode| mode.directive.as_str())
    }

    /// The default mode; falls back to the first entry if the table is edited
    /// without a `General` row.
    pub fn default_mode(&self) -> &Mode {
        self.get(DEFAULT_MODE_ID)
            .ok()
            .or_else(|| self.modes.first())
            .expect("builtin mode table is empty")
    }

    fn unknown(&self, id: &str) -> UnknownMode {
        UnknownMode {
            id: id.to_string(),
            available: self.modes.iter().map(|mode| mode.id.clone()).collect(),
        }
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
