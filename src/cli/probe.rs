//! Model availability probe
//!
//! Sends a one-word prompt to each model id and reports whether the current
//! credential can use it. Individual failures never change the exit code.

use std::error::Error;
use std::io::{self, Write};

use async_trait::async_trait;

use crate::api::GenerateContentRequest;
use crate::core::client::CompletionClient;
use crate::core::config::{ClientSettings, Config};
use crate::core::error::CompletionError;

const PROBE_PROMPT: &str = "Hello";
const ERROR_SUMMARY_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    NotFound,
    Forbidden,
    Error(String),
}

impl ProbeOutcome {
    /// Status code first; without a usable one, the truncated message.
    pub fn classify(result: Result<(), CompletionError>) -> Self {
        match result {
            Ok(()) => ProbeOutcome::Success,
            Err(err) => match err.status {
                Some(404) => ProbeOutcome::NotFound,
                Some(403) => ProbeOutcome::Forbidden,
                _ => ProbeOutcome::Error(err.summary(ERROR_SUMMARY_CHARS)),
            },
        }
    }

    pub fn label(&self) -> String {
        match self {
            ProbeOutcome::Success => "✅ SUCCESS".to_string(),
            ProbeOutcome::NotFound => "❌ NOT FOUND".to_string(),
            ProbeOutcome::Forbidden => {
                "❌ FORBIDDEN (No access or invalid key for this model)".to_string()
            }
            ProbeOutcome::Error(summary) => format!("❌ ERROR: {summary}..."),
        }
    }
}

/// Anything that can issue a minimal single-turn request against a model id.
#[async_trait]
pub trait ModelProbe: Send + Sync {
    async fn probe(&self, model: &str) -> Result<(), CompletionError>;
}

#[async_trait]
impl ModelProbe for CompletionClient {
    async fn probe(&self, model: &str) -> Result<(), CompletionError> {
        let request = GenerateContentRequest::new(None, &[], PROBE_PROMPT);
        self.generate(model, &request).await.map(|_| ())
    }
}

/// Probe each model in order, writing one line per model to `out`.
pub async fn probe_models<P, W>(
    probe: &P,
    models: &[String],
    out: &mut W,
) -> io::Result<Vec<ProbeOutcome>>
where
    P: ModelProbe + ?Sized,
    W: Write,
{
    let mut outcomes = Vec::with_capacity(models.len());
    for model in models {
        write!(out, "Testing {model:<40} ... \t")?;
        out.flush()?;
        let outcome = ProbeOutcome::classify(probe.probe(model).await);
        writeln!(out, "{}", outcome.label())?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

pub async fn run_probe(models: Vec<String>) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let client = match ClientSettings::from_env(&config).and_then(CompletionClient::new) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("❌ {}", err.message);
            std::process::exit(1);
        }
    };

    let models = if models.is_empty() {
        config.probe_models()
    } else {
        models
    };

    println!("🚀 Starting Gemini Model Tester...");
    println!();
    probe_models(&client, &models, &mut io::stdout()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeProbe {
        results: HashMap<String, Result<(), CompletionError>>,
    }

    #[async_trait]
    impl ModelProbe for FakeProbe {
        async fn probe(&self, model: &str) -> Result<(), CompletionError> {
            self.results
                .get(model)
                .cloned()
                .unwrap_or_else(|| Err(CompletionError::transport("unexpected model")))
        }
    }

    #[tokio::test]
    async fn reports_outcomes_in_list_order() {
        let probe = FakeProbe {
            results: HashMap::from([
                ("alpha".to_string(), Ok(())),
                (
                    "beta".to_string(),
                    Err(CompletionError::from_response(404, "not found")),
                ),
                (
                    "gamma".to_string(),
                    Err(CompletionError::from_response(403, "forbidden")),
                ),
            ]),
        };
        let models = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let mut out = Vec::new();

        let outcomes = probe_models(&probe, &models, &mut out).await.unwrap();

        assert_eq!(
            outcomes,
            [
                ProbeOutcome::Success,
                ProbeOutcome::NotFound,
                ProbeOutcome::Forbidden
            ]
        );
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Testing alpha "));
        assert!(lines[0].ends_with("✅ SUCCESS"));
        assert!(lines[1].ends_with("❌ NOT FOUND"));
        assert!(lines[2].contains("FORBIDDEN"));
    }

    #[test]
    fn errors_without_known_status_use_truncated_first_line() {
        let long = format!("{}\nstack trace", "quota exceeded ".repeat(10));
        let outcome = ProbeOutcome::classify(Err(CompletionError::transport(long)));
        match &outcome {
            ProbeOutcome::Error(summary) => {
                assert_eq!(summary.chars().count(), 60);
                assert!(summary.starts_with("quota exceeded"));
            }
            other => panic!("expected error outcome, got {other:?}"),
        }
        assert!(outcome.label().ends_with("..."));
    }

    #[test]
    fn unauthorized_is_reported_as_error_not_forbidden() {
        let outcome = ProbeOutcome::classify(Err(CompletionError::from_response(
            401,
            r#"{"error":{"message":"API key invalid"}}"#,
        )));
        assert_eq!(outcome, ProbeOutcome::Error("API key invalid".to_string()));
    }
}
