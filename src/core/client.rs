//! The completion client: one remote call per request, single or streamed.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{generate_url, stream_url, GenerateContentRequest, GenerateContentResponse};
use crate::core::chat_stream::{spawn_stream, CompletionStream, StreamParams};
use crate::core::config::ClientSettings;
use crate::core::error::CompletionError;
use crate::core::message::HistoryTurn;
use crate::core::mode::Mode;

/// Seam between conversation handling and the remote API.
///
/// Each call captures the mode it is given; later mode changes never affect
/// a call already in flight.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send the history plus `prompt` and wait for the whole answer.
    async fn complete(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        mode: &Mode,
    ) -> Result<String, CompletionError>;

    /// Open a new remote stream for the answer. Not restartable.
    fn stream_complete(&self, prompt: &str, history: &[HistoryTurn], mode: &Mode)
        -> CompletionStream;
}

/// HTTP implementation of [`CompletionBackend`].
#[derive(Clone, Debug)]
pub struct CompletionClient {
    http: reqwest::Client,
    settings: ClientSettings,
}

impl CompletionClient {
    /// Fails with a configuration error, without touching the network, when
    /// the credential is blank.
    pub fn new(settings: ClientSettings) -> Result<Self, CompletionError> {
        if settings.api_key.trim().is_empty() {
            return Err(CompletionError::missing_credential(
                crate::core::config::settings::API_KEY_ENV,
            ));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(settings.request_timeout)
            .build()
            .map_err(|err| {
                CompletionError::configuration(format!("failed to build HTTP client: {err}"))
            })?;

        Ok(Self { http, settings })
    }

    fn build_request(prompt: &str, history: &[HistoryTurn], mode: &Mode) -> GenerateContentRequest {
        GenerateContentRequest::new(Some(mode.system_instruction()), history, prompt)
    }

    /// Single non-streamed call against an explicit model id.
    pub async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<String, CompletionError> {
        let response = self
            .http
            .post(generate_url(&self.settings.base_url, model))
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.settings.api_key)
            .timeout(self.settings.request_timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            let err = CompletionError::from_response(status.as_u16(), &error_text);
            debug!(model, status = status.as_u16(), kind = err.kind.as_str(), "completion rejected");
            return Err(err);
        }

        let body = response.json::<GenerateContentResponse>().await?;
        Ok(body.text())
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        mode: &Mode,
    ) -> Result<String, CompletionError> {
        let request = Self::build_request(prompt, history, mode);
        self.generate(&self.settings.model, &request).await
    }

    fn stream_complete(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        mode: &Mode,
    ) -> CompletionStream {
        debug!(
            model = %self.settings.model,
            mode = %mode.id,
            history = history.len(),
            "opening completion stream"
        );
        spawn_stream(StreamParams {
            client: self.http.clone(),
            url: stream_url(&self.settings.base_url, &self.settings.model),
            api_key: self.settings.api_key.clone(),
            request: Self::build_request(prompt, history, mode),
            idle_timeout: self.settings.request_timeout,
            cancel_token: CancellationToken::new(),
        })
    }
}
