/// Text-generation API client
///
/// One request per chat turn: the session's full history (oldest first)
/// plus a fixed system instruction go out, one assistant reply comes
/// back. No streaming, no retries — an upstream failure surfaces to
/// the caller as an error.
///
/// The wire contract is the `generateContent` shape: `contents` with
/// `user`/`model` roles, a `systemInstruction`, and the reply in the
/// first candidate's first text part.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Fixed instruction prepended to every generation request
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful AI assistant for a Project Management System. \
     You help users manage their projects, tasks, and collaborate with team members. \
     Be friendly, professional, and provide actionable advice.";

/// Generation errors
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Non-success response from the generation API
    #[error("Generation API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Response parsed but carried no usable candidate
    #[error("Generation API returned no candidates")]
    EmptyResponse,

    /// Transport-level failure
    #[error("Generation API request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        AssistantError::Transport(err.to_string())
    }
}

/// Who produced a turn, in the generation API's vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The human user
    User,

    /// A previous assistant reply
    Model,
}

/// One turn of replayed conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

/// Generation API seam
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Sends the history plus system instruction, returns the reply text
    async fn generate(
        &self,
        history: &[ChatTurn],
        system_instruction: &str,
    ) -> Result<String, AssistantError>;
}

/// Gemini connection configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API base URL, overridable for tests and proxies
    pub base_url: String,

    /// API key, passed as the `key` query parameter
    pub api_key: String,

    /// Model name, e.g. `gemini-2.5-flash`
    pub model: String,
}

impl GeminiConfig {
    /// Loads the generation API settings from the environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            api_key: env::var("GEMINI_API_KEY")
                .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable is required"))?,
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: SystemInstruction<'a>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
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
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Gemini implementation of [`GenerationClient`]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key
        )
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(
        &self,
        history: &[ChatTurn],
        system_instruction: &str,
    ) -> Result<String, AssistantError> {
        let contents: Vec<Content<'_>> = history
            .iter()
            .map(|turn| Content {
                role: match turn.role {
                    TurnRole::User => "user",
                    TurnRole::Model => "model",
                },
                parts: vec![Part { text: &turn.text }],
            })
            .collect();

        let request = GenerateRequest {
            contents,
            system_instruction: SystemInstruction {
                parts: vec![Part { text: system_instruction }],
            },
        };

        let response = self.http.post(self.url()).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .filter(|text| !text.is_empty())
            .ok_or(AssistantError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_role_serde() {
        assert_eq!(serde_json::to_string(&TurnRole::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&TurnRole::Model).unwrap(), "\"model\"");
    }

    #[test]
    fn test_request_serialization_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "hello" }],
            }],
            system_instruction: SystemInstruction {
                parts: vec![Part { text: SYSTEM_INSTRUCTION }],
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert!(json["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Project Management System"));
    }

    #[test]
    fn test_response_parsing_takes_first_candidate() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "first"}]}},
                {"content": {"parts": [{"text": "second"}]}}
            ]
        }"#;

        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap();

        assert_eq!(text, "first");
    }

    #[test]
    fn test_response_parsing_tolerates_missing_candidates() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
