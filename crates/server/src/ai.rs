//! Client for the generative model API backing the property assistant.
//!
//! A [`ChatSession`] carries the model-side view of a conversation as a
//! list of "user"/"model" turns. Sessions are cheap to rebuild from
//! persisted messages, so losing one (restart, cache eviction) never
//! loses a conversation.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::db::{Message, Sender};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    pub text: String,
}

/// One turn of model context. `role` is "user" or "model"; the model API
/// has no separate system role, so hidden system messages are replayed
/// as user turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Live handle on one conversation's model context.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    history: Vec<Content>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session from already-persisted turns.
    pub fn from_contents(history: Vec<Content>) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }
}

/// Map persisted messages onto model roles: "system" and "user" rows
/// replay as "user" turns, "ai" rows as "model" turns.
pub fn contents_from_messages(messages: &[Message]) -> Vec<Content> {
    messages
        .iter()
        .map(|message| match message.sender {
            Sender::Ai => Content::model(message.content.clone()),
            Sender::User | Sender::System => Content::user(message.content.clone()),
        })
        .collect()
}

#[derive(Clone)]
pub struct AiClient {
    client: Client,
    config: AiConfig,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client, config })
    }

    /// Send one user turn through the session. The session history is
    /// only extended after the model answered, so a failed call leaves it
    /// unchanged.
    pub async fn send(&self, session: &mut ChatSession, text: &str) -> Result<String> {
        let mut contents = session.history.clone();
        contents.push(Content::user(text));

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_url, self.config.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&GenerateContentRequest { contents })
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach model API: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&error_text) {
                return Err(anyhow!(
                    "Model API error ({}): {}",
                    status.as_u16(),
                    api_error.error.message
                ));
            }
            return Err(anyhow!(
                "Model API error ({}): {}",
                status.as_u16(),
                error_text
            ));
        }

        let completion: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse model response: {}", e))?;

        let reply: String = completion
            .candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| anyhow!("Model returned no candidates"))?;

        tracing::debug!("Model replied with {} characters", reply.len());

        session.history.push(Content::user(text));
        session.history.push(Content::model(reply.clone()));

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: Sender, content: &str, is_visible: bool) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: "c1".to_string(),
            sender,
            content: content.to_string(),
            token_count: None,
            is_visible,
            property_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_role_mapping_from_persisted_messages() {
        let messages = vec![
            message(Sender::System, "prompt + properties", false),
            message(Sender::Ai, "welcome", true),
            message(Sender::User, "show me apartments", true),
            message(Sender::Ai, "here are some", true),
        ];

        let contents = contents_from_messages(&messages);
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[2].role, "user");
        assert_eq!(contents[3].role, "model");
        assert_eq!(contents[0].parts[0].text, "prompt + properties");
    }

    #[test]
    fn test_rebuilt_session_preserves_turns() {
        let messages = vec![
            message(Sender::System, "seed", false),
            message(Sender::Ai, "welcome", true),
            message(Sender::User, "question", true),
            message(Sender::Ai, "answer", true),
        ];
        let session = ChatSession::from_contents(contents_from_messages(&messages));
        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history()[3], Content::model("answer"));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "there"}]}}
            ]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, "Hello there");
    }
}
