//! Jarvis is a terminal chat client that streams answers from the Gemini API
//! through a small set of persona modes.
//!
//! The crate is organized around a few collaborating layers:
//! - [`core`] owns the conversation store, the mode registry, the completion
//!   client and its streaming plumbing, and configuration.
//! - [`api`] defines the request/response payloads of the remote API.
//! - [`cli`] implements the command-line surfaces (`chat`, `say`, `modes`,
//!   `probe`, `set`/`unset`).
//! - [`utils`] holds URL and transcript-logging helpers.
//!
//! The binary (`src/main.rs`) routes straight into [`cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
