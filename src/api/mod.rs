//! Request and response payloads for the `generateContent` REST API.

use serde::{Deserialize, Serialize};

use crate::core::message::HistoryTurn;
use crate::utils::url::construct_api_url;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Part {
    pub text: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part { text: text.into() }],
        }
    }
}

impl From<&HistoryTurn> for Content {
    fn from(turn: &HistoryTurn) -> Self {
        Content::text(Some(turn.role.to_api_role()), turn.text.clone())
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// Prior history followed by the new user prompt.
    pub fn new(system_instruction: Option<String>, history: &[HistoryTurn], prompt: &str) -> Self {
        let mut contents: Vec<Content> = history.iter().map(Content::from).collect();
        contents.push(Content::text(Some("user"), prompt));
        Self {
            system_instruction: system_instruction.map(|text| Content::text(None, text)),
            contents,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<ResponseContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts joined in order.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

pub fn generate_url(base_url: &str, model: &str) -> String {
    construct_api_url(base_url, &format!("models/{model}:generateContent"))
}

pub fn stream_url(base_url: &str, model: &str) -> String {
    construct_api_url(
        base_url,
        &format!("models/{model}:streamGenerateContent?alt=sse"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_history_then_prompt() {
        let history = vec![HistoryTurn::user("Hi"), HistoryTurn::assistant("Hello!")];
        let request = GenerateContentRequest::new(Some("be brief".into()), &history, "Again");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "systemInstruction": {"parts": [{"text": "be brief"}]},
                "contents": [
                    {"role": "user", "parts": [{"text": "Hi"}]},
                    {"role": "model", "parts": [{"text": "Hello!"}]},
                    {"role": "user", "parts": [{"text": "Again"}]}
                ]
            })
        );
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"He"},{"thought":true},{"text":"llo"}]},"finishReason":"STOP"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text(), "Hello");
        assert_eq!(
            response.candidates[0].finish_reason.as_deref(),
            Some("STOP")
        );
    }

    #[test]
    fn response_without_candidates_is_empty_text() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"usageMetadata":{"totalTokenCount":3}}"#).unwrap();
        assert_eq!(response.text(), "");
    }

    #[test]
    fn endpoints_include_model_and_method() {
        assert_eq!(
            generate_url("https://example.test/v1beta/", "gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            stream_url("https://example.test/v1beta", "gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:streamGenerateContent?alt=sse"
        );
    }
}
