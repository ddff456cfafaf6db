//! LLM client - provider dispatch and HTTP adapters.
//!
//! One adapter per provider behind the [`CompletionBackend`] trait, selected
//! once at client construction from the resolved configuration. Both adapters
//! send a single completion request with a bounded timeout and no retry;
//! retrying is the caller's decision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::models::{AiProvider, AssistantError, ProviderKind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Low temperature favours deterministic SQL generation over creative
/// phrasing.
const TEMPERATURE: f32 = 0.1;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Completion capability: send a system+user prompt pair, get raw text back.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AssistantError>;
}

/// Provider-dispatching client. Construction fails for provider names outside
/// the supported set without performing any network call.
pub struct LlmClient {
    backend: Box<dyn CompletionBackend>,
    provider: String,
}

impl LlmClient {
    pub fn for_provider(config: &AiProvider) -> Result<Self, AssistantError> {
        let backend: Box<dyn CompletionBackend> = match ProviderKind::parse(&config.provider) {
            Some(ProviderKind::OpenAi) => Box::new(OpenAiBackend::new(
                config.api_key_encrypted.clone(),
                config.model_name.clone(),
            )?),
            Some(ProviderKind::Gemini) => Box::new(GeminiBackend::new(
                config.api_key_encrypted.clone(),
                config.model_name.clone(),
            )?),
            None => return Err(AssistantError::UnsupportedProvider(config.provider.clone())),
        };

        Ok(Self { backend, provider: config.provider.clone() })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AssistantError> {
        self.backend.complete(system_prompt, user_prompt).await
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient").field("provider", &self.provider).finish()
    }
}

fn build_http_client() -> Result<reqwest::Client, AssistantError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AssistantError::ProviderRequest(format!("Failed to build HTTP client: {}", e)))
}

fn request_error(provider: &str, e: reqwest::Error) -> AssistantError {
    if e.is_timeout() {
        AssistantError::ProviderRequest(format!(
            "{} request timed out after {}s",
            provider,
            REQUEST_TIMEOUT.as_secs()
        ))
    } else {
        AssistantError::ProviderRequest(format!("{} request failed: {}", provider, e))
    }
}

// ============================================================================
// OpenAI adapter (chat-completion envelope)
// ============================================================================

pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model: String) -> Result<Self, AssistantError> {
        Ok(Self { client: build_http_client()?, api_key, model })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AssistantError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: user_prompt.to_string() },
            ],
            temperature: TEMPERATURE,
        };

        tracing::debug!("Calling OpenAI with model {}", self.model);

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error("OpenAI", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AssistantError::ProviderRequest(format!(
                "OpenAI API error {}: {}",
                status, error_text
            )));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::ProviderRequest(format!("OpenAI response parse failed: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                AssistantError::ProviderRequest("Empty response from OpenAI".to_string())
            })
    }
}

// ============================================================================
// Gemini adapter (generate-content envelope)
// ============================================================================

pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    parts: Vec<GeminiPart>,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: String) -> Result<Self, AssistantError> {
        Ok(Self { client: build_http_client()?, api_key, model })
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AssistantError> {
        // Gemini has no separate system role on this endpoint; both prompts
        // travel in one text part.
        let request = GenerateContentRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: format!("{}\n\nUser Question: {}", system_prompt, user_prompt),
                }],
            }],
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );

        tracing::debug!("Calling Gemini with model {}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error("Gemini", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AssistantError::ProviderRequest(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::ProviderRequest(format!("Gemini response parse failed: {}", e)))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| {
                AssistantError::ProviderRequest("Empty response from Gemini".to_string())
            })
    }
}
