//! Line-oriented interactive chat

use std::error::Error;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::cli::open_session;
use crate::cli::mode_list::list_modes;
use crate::core::mode::ModeRegistry;
use crate::core::session::{ChatSession, TurnOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// `/mode` with no argument shows the active mode.
    Mode(Option<String>),
    Modes,
    Reset,
    Log,
    Help,
    Quit,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Blank,
    Message(String),
    Command(ChatCommand),
}

pub fn parse_input(line: &str) -> ChatInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChatInput::Blank;
    }

    let Some(rest) = trimmed.strip_prefix('/') else {
        return ChatInput::Message(trimmed.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(str::to_string);

    let command = match name.as_str() {
        "mode" => ChatCommand::Mode(arg),
        "modes" => ChatCommand::Modes,
        "reset" | "clear" => ChatCommand::Reset,
        "log" => ChatCommand::Log,
        "help" => ChatCommand::Help,
        "quit" | "exit" => ChatCommand::Quit,
        _ => ChatCommand::Unknown(name),
    };
    ChatInput::Command(command)
}

/// Routes Ctrl+C to the turn being streamed, if any.
#[derive(Clone, Default)]
struct InterruptSlot {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl InterruptSlot {
    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(token.clone());
        }
        token
    }

    fn disarm(&self) {
        if let Ok(mut current) = self.current.lock() {
            current.take();
        }
    }

    /// Returns `false` when no turn was streaming.
    fn interrupt(&self) -> bool {
        match self.current.lock().ok().and_then(|mut current| current.take()) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// One listener for the whole chat: a second Ctrl+C at the prompt leaves.
    fn listen(&self) -> tokio::task::JoinHandle<()> {
        let slot = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !slot.interrupt() {
                    println!();
                    std::process::exit(130);
                }
            }
        })
    }
}

const HELP_TEXT: &str = "\
Commands:
  /mode [ID]   Show or switch the active mode
  /modes       List available modes
  /reset       Clear the conversation
  /log         Pause or resume transcript logging
  /help        Show this help
  /quit        Leave the chat
Ctrl+C while an answer is streaming stops it; at the prompt it leaves.";

pub async fn run_chat(
    mode: Option<String>,
    model: Option<String>,
    log: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let mut session = open_session(mode, model, log)?;
    let registry = ModeRegistry::builtin();

    eprintln!("🚀 Jarvis online, {} mode", session.mode().label);
    eprintln!("💡 Type /help for commands, /quit to leave");
    if session.logging().is_active() {
        eprintln!("📝 Transcript {}", session.logging().get_status_string());
    }

    let interrupts = InterruptSlot::default();
    let listener = interrupts.listen();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou ({}) > ", session.mode().id);
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            ChatInput::Blank => continue,
            ChatInput::Message(text) => stream_answer(&mut session, &interrupts, &text).await?,
            ChatInput::Command(command) => {
                if !handle_command(&mut session, &registry, command) {
                    break;
                }
            }
        }
    }

    listener.abort();
    Ok(())
}

/// Returns `false` when the chat should end.
fn handle_command(
    session: &mut ChatSession,
    registry: &ModeRegistry,
    command: ChatCommand,
) -> bool {
    match command {
        ChatCommand::Mode(None) => {
            let mode = session.mode();
            println!("Current mode: {} ({})", mode.label, mode.description);
        }
        ChatCommand::Mode(Some(id)) => match registry.resolve(&id) {
            Ok(mode) => {
                println!("Switched to {} mode", mode.label);
                session.set_mode(mode.clone());
            }
            Err(err) => println!("❌ {err}"),
        },
        ChatCommand::Modes => list_modes(registry, Some(session.mode().id.as_str())),
        ChatCommand::Reset => {
            session.reset();
            println!("Conversation cleared");
        }
        ChatCommand::Log => match session.logging_mut().toggle_logging() {
            Ok(status) => println!("{status}"),
            Err(err) => println!("❌ {err}"),
        },
        ChatCommand::Help => println!("{HELP_TEXT}"),
        ChatCommand::Quit => return false,
        ChatCommand::Unknown(name) => {
            println!("❌ Unknown command: /{name}. Type /help for commands.")
        }
    }
    true
}

async fn stream_answer(
    session: &mut ChatSession,
    interrupts: &InterruptSlot,
    text: &str,
) -> Result<(), Box<dyn Error>> {
    let cancel = interrupts.arm();

    println!();
    let mut stdout = io::stdout();
    let outcome = session
        .send_with_cancel(text, &cancel, |fragment| {
            print!("{fragment}");
            let _ = stdout.flush();
        })
        .await;
    interrupts.disarm();

    match outcome {
        TurnOutcome::Completed(_) => println!(),
        TurnOutcome::Interrupted(_) => println!("\n⏹  Stopped"),
        TurnOutcome::Failed { error, message } => {
            println!("{}", message.content);
            eprintln!("❌ {error}");
        }
    }
    Ok(())
}
