//! One-shot "say" command

use std::error::Error;
use std::io::{self, Write};

use crate::cli::open_session;
use crate::core::session::TurnOutcome;

pub async fn run_say(
    prompt: Vec<String>,
    mode: Option<String>,
    model: Option<String>,
    log: Option<String>,
    no_stream: bool,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: jarvis say <prompt>");
        std::process::exit(1);
    }

    let mut session = open_session(mode, model, log)?;

    let outcome = if no_stream {
        let outcome = session.send_complete(&prompt).await;
        if let TurnOutcome::Completed(message) = &outcome {
            print!("{}", message.content);
        }
        outcome
    } else {
        let mut stdout = io::stdout();
        session
            .send(&prompt, |fragment| {
                print!("{fragment}");
                let _ = stdout.flush();
            })
            .await
    };

    match outcome {
        TurnOutcome::Failed { error, .. } => {
            eprintln!("\n\n❌ Error: {error}");
            std::process::exit(1);
        }
        _ => {
            println!();
            Ok(())
        }
    }
}
