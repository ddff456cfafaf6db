//! Assistant data models: provider configuration, chat audit rows, and the
//! request/response contracts of the chat endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

// ============================================================================
// Provider
// ============================================================================

/// Supported LLM backends. Adding a provider means adding a variant here and
/// an adapter in the client; nothing else changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    /// Case-insensitive match against the stored provider name.
    pub fn parse(provider: &str) -> Option<Self> {
        match provider.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }
}

/// AI provider configuration row. The API key never leaves this struct
/// unmasked; read surfaces go through [`AiProviderInfo`].
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AiProvider {
    pub id: i64,
    pub provider: String,
    #[serde(skip_serializing)]
    pub api_key_encrypted: String,
    pub model_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Provider info for external display (without sensitive data)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AiProviderInfo {
    pub id: i64,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_masked: Option<String>,
    pub model_name: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&AiProvider> for AiProviderInfo {
    fn from(p: &AiProvider) -> Self {
        let key = &p.api_key_encrypted;
        let api_key_masked = if key.len() > 8 {
            Some(format!("{}...{}", &key[..4], &key[key.len() - 4..]))
        } else {
            Some("****".to_string())
        };

        Self {
            id: p.id,
            provider: p.provider.clone(),
            api_key_masked,
            model_name: p.model_name.clone(),
            is_active: p.is_active,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateProviderRequest {
    pub provider: String,
    pub api_key: String,
    pub model_name: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateProviderRequest {
    pub api_key: Option<String>,
    pub model_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssistantStatusResponse {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_provider: Option<AiProviderInfo>,
    pub provider_count: usize,
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChatRequest {
    pub dashboard_id: i64,
    #[validate(length(min = 1, message = "prompt cannot be empty"))]
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
    pub sql_query: Option<String>,
}

/// Audit row for one assistant interaction. Written exactly once per
/// orchestrated query, after generation and any SQL execution completed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatLog {
    pub id: i64,
    pub user_id: i64,
    pub dashboard_id: i64,
    pub prompt: String,
    pub response_text: Option<String>,
    pub response_sql: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Chat log joined with user and dashboard display fields, for the history
/// listing.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ChatLogEntry {
    pub id: i64,
    pub user_name: String,
    pub dashboard_title: String,
    pub prompt: String,
    pub response_text: Option<String>,
    pub response_sql: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Errors
// ============================================================================

/// Assistant domain errors. The split between request-aborting and absorbed
/// failures lives in the orchestrator: everything here aborts the request;
/// SQL execution failures never become an `AssistantError`.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("AI Provider is not configured.")]
    NotConfigured,

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("AI provider request failed: {0}")]
    ProviderRequest(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(i64),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AssistantError> for crate::utils::ApiError {
    fn from(err: AssistantError) -> Self {
        use crate::utils::ApiError;
        match err {
            AssistantError::NotConfigured => ApiError::bad_request(err.to_string()),
            AssistantError::UnsupportedProvider(_) => ApiError::internal_error(err.to_string()),
            AssistantError::ProviderRequest(msg) => {
                ApiError::internal_error(format!("AI Error: {}", msg))
            },
            AssistantError::ProviderNotFound(_) => ApiError::not_found(err.to_string()),
            AssistantError::Conflict(msg) => ApiError::conflict(msg),
            AssistantError::Database(e) => {
                tracing::error!("Assistant database error: {}", e);
                ApiError::internal_error(format!("Database error: {}", e))
            },
        }
    }
}
