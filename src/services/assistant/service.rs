//! Assistant service - the end-to-end chat orchestration plus the provider
//! management facade used by the REST layer.

use std::sync::Arc;

use sqlx::SqlitePool;

use super::client::{CompletionBackend, LlmClient};
use super::context;
use super::models::*;
use super::parser;
use super::repository::AssistantRepository;
use crate::models::AuthUser;
use crate::services::dashboard_service::DashboardService;
use crate::services::warehouse_client::{QueryResult, SqlExecutor};
use crate::utils::{ApiError, ApiResult};

pub struct AssistantService {
    repository: AssistantRepository,
    dashboards: Arc<DashboardService>,
    executor: Arc<dyn SqlExecutor>,
    backend_override: Option<Arc<dyn CompletionBackend>>,
}

impl AssistantService {
    pub fn new(
        pool: SqlitePool,
        dashboards: Arc<DashboardService>,
        executor: Arc<dyn SqlExecutor>,
    ) -> Self {
        Self {
            repository: AssistantRepository::new(pool),
            dashboards,
            executor,
            backend_override: None,
        }
    }

    /// Create with a fixed completion backend instead of per-provider
    /// construction (for testing).
    pub fn with_backend(
        pool: SqlitePool,
        dashboards: Arc<DashboardService>,
        executor: Arc<dyn SqlExecutor>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            repository: AssistantRepository::new(pool),
            dashboards,
            executor,
            backend_override: Some(backend),
        }
    }

    /// Run one chat interaction end to end:
    /// validate access, build the schema context, call the configured LLM,
    /// extract SQL, execute it against the dashboard's warehouse, and append
    /// the audit row.
    ///
    /// Failure policy: anything that goes wrong before a usable answer exists
    /// (unknown dashboard, denied access, missing configuration, provider
    /// failure) aborts the request and nothing is logged. Once the model has
    /// answered, SQL execution failures are absorbed into the response text
    /// and the interaction is logged and returned as a success.
    pub async fn chat(&self, user: &AuthUser, req: ChatRequest) -> ApiResult<ChatResponse> {
        // Validating
        let dashboard = self.dashboards.get_dashboard(req.dashboard_id).await?;
        self.dashboards.ensure_read_access(&dashboard, user.id)?;

        // BuildingContext
        let datasources = self.dashboards.get_datasource_details(dashboard.id).await?;
        let schema_context = context::render_schema_context(&datasources);
        let system_prompt = context::build_system_prompt(&schema_context);

        // Generating
        let provider = self
            .repository
            .get_active_provider()
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::from(AssistantError::NotConfigured))?;

        tracing::debug!(
            "Assistant query for dashboard {} via provider '{}' ({})",
            dashboard.id,
            provider.provider,
            provider.model_name
        );

        let raw_reply = match &self.backend_override {
            Some(backend) => backend.complete(&system_prompt, &req.prompt).await,
            None => {
                let client = LlmClient::for_provider(&provider).map_err(ApiError::from)?;
                client.complete(&system_prompt, &req.prompt).await
            },
        }
        .map_err(|e| {
            tracing::error!("AI query failed: {}", e);
            ApiError::from(e)
        })?;

        // Parsing
        let parsed = parser::parse_reply(&raw_reply);
        let mut response_text = parsed.response_text;

        // ExecutingSql. Multi-warehouse dashboards are not fanned out: the
        // generated SQL always runs against the first datasource's warehouse.
        if let Some(sql) = &parsed.sql_query
            && let Some(first) = datasources.first()
        {
            match self.execute_generated_sql(first.warehouse_id, sql).await {
                Ok(result) if result.is_empty() => {
                    response_text.push_str("\n\n**Result:** No data found.");
                },
                Ok(result) => {
                    response_text.push_str("\n\n**Result:**\n");
                    response_text.push_str(&render_markdown_table(&result));
                },
                Err(message) => {
                    tracing::error!("SQL execution failed: {}", message);
                    response_text.push_str(&format!("\n\n**Error executing query:** {}", message));
                },
            }
        }

        // Logging
        self.repository
            .insert_chat_log(
                user.id,
                dashboard.id,
                &req.prompt,
                &response_text,
                parsed.sql_query.as_deref(),
            )
            .await
            .map_err(ApiError::from)?;

        Ok(ChatResponse { response: response_text, sql_query: parsed.sql_query })
    }

    /// Resolve the warehouse and run the generated SQL. Every failure mode
    /// (missing warehouse row, connectivity, SQL errors) collapses into a
    /// message the orchestrator narrates instead of propagating.
    async fn execute_generated_sql(
        &self,
        warehouse_id: i64,
        sql: &str,
    ) -> Result<QueryResult, String> {
        let warehouse = self
            .dashboards
            .get_warehouse(warehouse_id)
            .await
            .map_err(|e| e.message)?;

        self.executor
            .run_query(&warehouse, sql)
            .await
            .map_err(|e| e.to_string())
    }

    pub async fn history(
        &self,
        dashboard_id: Option<i64>,
        limit: i64,
    ) -> ApiResult<Vec<ChatLogEntry>> {
        let logs = self.repository.list_chat_logs(dashboard_id, limit).await?;
        Ok(logs)
    }

    // ------------------------------------------------------------------
    // Provider management facade
    // ------------------------------------------------------------------

    pub async fn list_providers(&self) -> ApiResult<Vec<AiProviderInfo>> {
        let providers = self.repository.list_providers().await?;
        Ok(providers.iter().map(AiProviderInfo::from).collect())
    }

    pub async fn get_provider(&self, id: i64) -> ApiResult<AiProviderInfo> {
        let provider = self
            .repository
            .get_provider(id)
            .await?
            .ok_or(AssistantError::ProviderNotFound(id))?;
        Ok(AiProviderInfo::from(&provider))
    }

    pub async fn get_active_provider(&self) -> ApiResult<Option<AiProviderInfo>> {
        let provider = self.repository.get_active_provider().await?;
        Ok(provider.as_ref().map(AiProviderInfo::from))
    }

    pub async fn create_provider(&self, req: CreateProviderRequest) -> ApiResult<AiProviderInfo> {
        if req.provider.trim().is_empty() {
            return Err(ApiError::validation_error("Provider name cannot be empty"));
        }
        if req.api_key.trim().is_empty() {
            return Err(ApiError::validation_error("API key cannot be empty"));
        }
        // Provider-name validation stays lazy: an unsupported value is
        // accepted here and fails at query time.
        let provider = self.repository.create_provider(req).await?;
        Ok(AiProviderInfo::from(&provider))
    }

    pub async fn update_provider(
        &self,
        id: i64,
        req: UpdateProviderRequest,
    ) -> ApiResult<AiProviderInfo> {
        let provider = self.repository.update_provider(id, req).await?;
        Ok(AiProviderInfo::from(&provider))
    }

    pub async fn delete_provider(&self, id: i64) -> ApiResult<()> {
        self.repository.delete_provider(id).await?;
        Ok(())
    }

    pub async fn activate_provider(&self, id: i64) -> ApiResult<AiProviderInfo> {
        self.repository.activate_provider(id).await?;
        self.get_provider(id).await
    }

    pub async fn deactivate_provider(&self, id: i64) -> ApiResult<AiProviderInfo> {
        self.repository.deactivate_provider(id).await?;
        self.get_provider(id).await
    }

    pub async fn status(&self) -> ApiResult<AssistantStatusResponse> {
        let providers = self.repository.list_providers().await?;
        let active = providers.iter().find(|p| p.is_active);
        Ok(AssistantStatusResponse {
            configured: active.is_some(),
            active_provider: active.map(AiProviderInfo::from),
            provider_count: providers.len(),
        })
    }
}

/// Render a tabular result as a markdown table appended below the narrative.
pub(super) fn render_markdown_table(result: &QueryResult) -> String {
    let mut out = String::new();
    out.push_str("| ");
    out.push_str(&result.columns.join(" | "));
    out.push_str(" |\n|");
    for _ in &result.columns {
        out.push_str(" --- |");
    }
    for row in &result.rows {
        out.push_str("\n| ");
        out.push_str(&row.join(" | "));
        out.push_str(" |");
    }
    out
}
