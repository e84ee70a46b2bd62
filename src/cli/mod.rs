//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, sets up diagnostics, and
//! dispatches to the chat, say, modes, probe, and config commands.

pub mod chat;
pub mod mode_list;
pub mod probe;
pub mod say;

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::chat::run_chat;
use crate::cli::mode_list::list_modes;
use crate::cli::probe::run_probe;
use crate::cli::say::run_say;
use crate::core::client::CompletionClient;
use crate::core::config::{ClientSettings, Config};
use crate::core::mode::{Mode, ModeRegistry};
use crate::core::session::ChatSession;
use crate::utils::logging::LoggingState;

/// Environment variable read by the diagnostics filter.
pub const LOG_FILTER_ENV: &str = "JARVIS_LOG";

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "jarvis", version = VERSION)]
#[command(about = "A terminal chat client for the Gemini API with persona modes")]
#[command(
    long_about = "Jarvis is a terminal chat client that streams answers from the Gemini API. \
Each request carries the Jarvis persona plus the directive of the active mode \
(General, Developer, Exam, Startup, Research).\n\n\
Environment Variables:\n\
  GEMINI_API_KEY    Your Gemini API key (required)\n\
  GEMINI_BASE_URL   Custom API base URL (optional)\n\
  JARVIS_LOG        Diagnostics filter, e.g. debug or jarvis=trace (default: warn)\n\n\
Chat commands:\n\
  /mode [ID]        Show or switch the active mode\n\
  /modes            List available modes\n\
  /reset            Clear the conversation\n\
  /log              Pause or resume transcript logging\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Persona mode for this session (e.g. Developer)
    #[arg(short = 'M', long, global = true, value_name = "MODE")]
    pub mode: Option<String>,

    /// Model id to request instead of the configured one
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Write a transcript of the conversation to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Send a single prompt and print the answer
    Say {
        /// Wait for the whole answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
        /// Prompt text (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List the available persona modes
    Modes,
    /// Check which models the configured key can use
    Probe {
        /// Model ids to check (defaults to the built-in list)
        models: Vec<String>,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        value: Option<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(args.mode, args.model, args.log).await,
        Commands::Say { no_stream, prompt } => {
            run_say(prompt, args.mode, args.model, args.log, no_stream).await
        }
        Commands::Modes => {
            let config = Config::load()?;
            let registry = ModeRegistry::builtin();
            let active = select_mode(&registry, args.mode.as_deref(), &config)?;
            list_modes(&registry, Some(active.id.as_str()));
            Ok(())
        }
        Commands::Probe { models } => run_probe(models).await,
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            match apply_setting(&mut config, &key, value.as_deref()) {
                Ok(Some(message)) => {
                    config.save()?;
                    println!("✅ {message}");
                }
                Ok(None) => config.print_all(),
                Err(message) => {
                    eprintln!("❌ {message}");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            match clear_setting(&mut config, &key) {
                Ok(message) => {
                    config.save()?;
                    println!("✅ {message}");
                }
                Err(message) => {
                    eprintln!("❌ {message}");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
    }
}

/// Build a chat session from config, environment, and command-line overrides.
///
/// A missing credential ends the process with a diagnostic before anything
/// is sent.
pub(crate) fn open_session(
    mode: Option<String>,
    model: Option<String>,
    log: Option<String>,
) -> Result<ChatSession, Box<dyn Error>> {
    let config = Config::load()?;
    let registry = ModeRegistry::builtin();
    let mode = select_mode(&registry, mode.as_deref(), &config)?;

    let settings = match ClientSettings::from_env(&config) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("❌ Error: {}", err.message);
            std::process::exit(1);
        }
    };
    let settings = match model {
        Some(model) => settings.with_model(model),
        None => settings,
    };
    let client = CompletionClient::new(settings)?;

    let logging = match log {
        Some(path) => LoggingState::to_file(path)?,
        None => LoggingState::disabled(),
    };

    Ok(ChatSession::new(Arc::new(client), mode).with_logging(logging))
}

/// An explicit `--mode` must be valid; a stale config default only warns.
fn select_mode(
    registry: &ModeRegistry,
    requested: Option<&str>,
    config: &Config,
) -> Result<Mode, Box<dyn Error>> {
    if let Some(requested) = requested {
        return Ok(registry.resolve(requested)?.clone());
    }

    if let Some(default_mode) = config.default_mode.as_deref() {
        match registry.resolve(default_mode) {
            Ok(mode) => return Ok(mode.clone()),
            Err(err) => warn!("ignoring configured default-mode: {err}"),
        }
    }

    Ok(registry.default_mode().clone())
}

/// `Ok(None)` means no value was given and the caller should print the config.
fn apply_setting(
    config: &mut Config,
    key: &str,
    value: Option<&str>,
) -> Result<Option<String>, String> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    match key {
        "default-mode" => {
            let registry = ModeRegistry::builtin();
            let mode = registry.resolve(value).map_err(|err| err.to_string())?;
            config.default_mode = Some(mode.id.clone());
            Ok(Some(format!("Set default-mode to: {}", mode.id)))
        }
        "model" => {
            config.model = Some(value.to_string());
            Ok(Some(format!("Set model to: {value}")))
        }
        "base-url" => {
            config.base_url = Some(value.to_string());
            Ok(Some(format!("Set base-url to: {value}")))
        }
        "request-timeout-secs" => {
            let secs = value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| format!("Invalid timeout: {value} (expected whole seconds > 0)"))?;
            config.request_timeout_secs = Some(secs);
            Ok(Some(format!("Set request-timeout-secs to: {secs}")))
        }
        _ => Err(format!("Unknown config key: {key}")),
    }
}

fn clear_setting(config: &mut Config, key: &str) -> Result<String, String> {
    match key {
        "default-mode" => config.default_mode = None,
        "model" => config.model = None,
        "base-url" => config.base_url = None,
        "request-timeout-secs" => config.request_timeout_secs = None,
        _ => return Err(format!("Unknown config key: {key}")),
    }
    Ok(format!("Unset {key}"))
}
