//! Assistant unit and scenario tests.
//!
//! Everything runs against an in-memory SQLite database; the LLM backend and
//! the warehouse executor are stubbed through their seams.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::http::StatusCode;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::time::Duration;

use super::*;
use crate::models::{AuthUser, DatasourceDetail, Warehouse};
use crate::services::dashboard_service::DashboardService;
use crate::services::warehouse_client::{QueryResult, SqlExecutor, WarehouseError};

// ============================================================================
// Fixtures
// ============================================================================

async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(3))
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

async fn seed_user(pool: &SqlitePool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
        .bind(username)
        .bind("$2b$12$hashed_password")
        .execute(pool)
        .await
        .expect("Failed to create test user")
        .last_insert_rowid()
}

async fn seed_warehouse(pool: &SqlitePool) -> i64 {
    sqlx::query(
        r#"INSERT INTO warehouses (name, host, port, username, password, database_name)
           VALUES ('analytics', '127.0.0.1', 9030, 'reader', '', 'analytics')"#,
    )
    .execute(pool)
    .await
    .expect("Failed to create test warehouse")
    .last_insert_rowid()
}

async fn seed_datasource(
    pool: &SqlitePool,
    warehouse_id: i64,
    table_name: &str,
    columns: &[&str],
) -> i64 {
    let datasource_id =
        sqlx::query("INSERT INTO datasources (warehouse_id, table_name) VALUES (?, ?)")
            .bind(warehouse_id)
            .bind(table_name)
            .execute(pool)
            .await
            .expect("Failed to create test datasource")
            .last_insert_rowid();

    for (ordinal, column) in columns.iter().enumerate() {
        sqlx::query(
            "INSERT INTO datasource_columns (datasource_id, column_name, ordinal) VALUES (?, ?, ?)",
        )
        .bind(datasource_id)
        .bind(column)
        .bind(ordinal as i64)
        .execute(pool)
        .await
        .expect("Failed to create test column");
    }

    datasource_id
}

async fn seed_rls(pool: &SqlitePool, datasource_id: i64, clause: &str) {
    sqlx::query("INSERT INTO rls_filters (datasource_id, clause) VALUES (?, ?)")
        .bind(datasource_id)
        .bind(clause)
        .execute(pool)
        .await
        .expect("Failed to create test RLS filter");
}

async fn seed_dashboard(pool: &SqlitePool, title: &str, owner_id: i64, published: bool) -> i64 {
    sqlx::query("INSERT INTO dashboards (title, owner_id, is_published) VALUES (?, ?, ?)")
        .bind(title)
        .bind(owner_id)
        .bind(published)
        .execute(pool)
        .await
        .expect("Failed to create test dashboard")
        .last_insert_rowid()
}

async fn attach_datasource(pool: &SqlitePool, dashboard_id: i64, datasource_id: i64, position: i64) {
    sqlx::query(
        "INSERT INTO dashboard_datasources (dashboard_id, datasource_id, position) VALUES (?, ?, ?)",
    )
    .bind(dashboard_id)
    .bind(datasource_id)
    .bind(position)
    .execute(pool)
    .await
    .expect("Failed to attach datasource");
}

async fn seed_provider(pool: &SqlitePool, provider: &str, active: bool) -> i64 {
    sqlx::query(
        r#"INSERT INTO ai_providers (provider, api_key_encrypted, model_name, is_active)
           VALUES (?, 'sk-test-key-12345', 'gpt-4', ?)"#,
    )
    .bind(provider)
    .bind(active)
    .execute(pool)
    .await
    .expect("Failed to create test provider")
    .last_insert_rowid()
}

async fn count_chat_logs(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM ai_chat_log")
        .fetch_one(pool)
        .await
        .expect("Failed to count chat logs")
}

// ============================================================================
// Stubs
// ============================================================================

/// Completion backend returning a fixed reply, recording every call.
struct StubBackend {
    reply: Result<String, String>,
    calls: AtomicUsize,
    last_system_prompt: Mutex<Option<String>>,
    last_user_prompt: Mutex<Option<String>>,
}

impl StubBackend {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            last_system_prompt: Mutex::new(None),
            last_user_prompt: Mutex::new(None),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_system_prompt: Mutex::new(None),
            last_user_prompt: Mutex::new(None),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn system_prompt(&self) -> Option<String> {
        self.last_system_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for StubBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_system_prompt.lock().unwrap() = Some(system_prompt.to_string());
        *self.last_user_prompt.lock().unwrap() = Some(user_prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(AssistantError::ProviderRequest(message.clone())),
        }
    }
}

enum StubOutcome {
    Rows(Vec<String>, Vec<Vec<String>>),
    Empty,
    Fail(String),
}

/// Warehouse executor stub recording the SQL it was asked to run.
struct StubExecutor {
    outcome: StubOutcome,
    calls: AtomicUsize,
    last_sql: Mutex<Option<String>>,
}

impl StubExecutor {
    fn returning(columns: &[&str], rows: &[&[&str]]) -> Arc<Self> {
        Arc::new(Self {
            outcome: StubOutcome::Rows(
                columns.iter().map(|c| c.to_string()).collect(),
                rows.iter()
                    .map(|r| r.iter().map(|v| v.to_string()).collect())
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
            last_sql: Mutex::new(None),
        })
    }

    fn empty() -> Arc<Self> {
        Arc::new(Self {
            outcome: StubOutcome::Empty,
            calls: AtomicUsize::new(0),
            last_sql: Mutex::new(None),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: StubOutcome::Fail(message.to_string()),
            calls: AtomicUsize::new(0),
            last_sql: Mutex::new(None),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn executed_sql(&self) -> Option<String> {
        self.last_sql.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for StubExecutor {
    async fn run_query(
        &self,
        _warehouse: &Warehouse,
        sql: &str,
    ) -> Result<QueryResult, WarehouseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_sql.lock().unwrap() = Some(sql.to_string());
        match &self.outcome {
            StubOutcome::Rows(columns, rows) => {
                Ok(QueryResult { columns: columns.clone(), rows: rows.clone() })
            },
            StubOutcome::Empty => Ok(QueryResult { columns: Vec::new(), rows: Vec::new() }),
            StubOutcome::Fail(message) => Err(WarehouseError::Execution(message.clone())),
        }
    }
}

fn service_with(
    pool: &SqlitePool,
    backend: Arc<StubBackend>,
    executor: Arc<StubExecutor>,
) -> AssistantService {
    let dashboards = Arc::new(DashboardService::new(pool.clone()));
    AssistantService::with_backend(pool.clone(), dashboards, executor, backend)
}

// ============================================================================
// Parser tests
// ============================================================================

mod parser_tests {
    use super::super::parser::parse_reply;

    #[test]
    fn extracts_well_formed_sql_block() {
        let raw = "Here you go:\n```sql\nSELECT COUNT(*) FROM sales\n```\nDone.";
        let parsed = parse_reply(raw);
        assert_eq!(parsed.sql_query.as_deref(), Some("SELECT COUNT(*) FROM sales"));
        assert_eq!(parsed.response_text, raw);
    }

    #[test]
    fn no_marker_yields_no_sql() {
        let raw = "The sales table has 12 columns.";
        let parsed = parse_reply(raw);
        assert!(parsed.sql_query.is_none());
        assert_eq!(parsed.response_text, raw);
    }

    #[test]
    fn unterminated_fence_yields_no_sql() {
        let raw = "```sql\nSELECT * FROM sales";
        let parsed = parse_reply(raw);
        assert!(parsed.sql_query.is_none());
        assert_eq!(parsed.response_text, raw);
    }

    #[test]
    fn first_block_wins() {
        let raw = "```sql\nSELECT 1\n```\ntext\n```sql\nSELECT 2\n```";
        let parsed = parse_reply(raw);
        assert_eq!(parsed.sql_query.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn empty_block_yields_no_sql() {
        let parsed = parse_reply("```sql\n   \n```");
        assert!(parsed.sql_query.is_none());
    }

    #[test]
    fn plain_fence_without_language_is_ignored() {
        let parsed = parse_reply("```\nSELECT 1\n```");
        assert!(parsed.sql_query.is_none());
    }

    #[test]
    fn trims_block_whitespace() {
        let parsed = parse_reply("```sql\n\n  SELECT region FROM sales  \n\n```");
        assert_eq!(parsed.sql_query.as_deref(), Some("SELECT region FROM sales"));
    }
}

// ============================================================================
// Context tests
// ============================================================================

mod context_tests {
    use super::super::context::{RLS_MARKER, build_system_prompt, render_schema_context};
    use super::DatasourceDetail;

    fn datasource(table: &str, columns: &[&str], clauses: &[&str]) -> DatasourceDetail {
        DatasourceDetail {
            id: 1,
            warehouse_id: 1,
            table_name: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rls_clauses: clauses.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn empty_dashboard_renders_empty_context() {
        assert_eq!(render_schema_context(&[]), "");
    }

    #[test]
    fn renders_table_and_columns() {
        let context = render_schema_context(&[datasource("sales", &["id", "region", "amount"], &[])]);
        assert_eq!(context, "Table: sales\nColumns: id, region, amount");
        assert!(!context.contains(RLS_MARKER));
    }

    #[test]
    fn renders_rls_marker_with_all_clauses() {
        let context = render_schema_context(&[datasource(
            "sales",
            &["id"],
            &["region = 'EMEA'", "tenant_id = 7"],
        )]);
        assert!(context.contains("RLS Constraints (MUST APPLY): region = 'EMEA'; tenant_id = 7"));
    }

    #[test]
    fn joins_datasources_with_blank_line() {
        let context = render_schema_context(&[
            datasource("sales", &["id"], &[]),
            datasource("customers", &["id", "name"], &[]),
        ]);
        assert_eq!(
            context,
            "Table: sales\nColumns: id\n\nTable: customers\nColumns: id, name"
        );
    }

    #[test]
    fn system_prompt_embeds_context_and_instructions() {
        let prompt = build_system_prompt("Table: sales\nColumns: id");
        assert!(prompt.contains("Table: sales"));
        assert!(prompt.contains("MUST include these constraints in the WHERE clause"));
        assert!(prompt.contains("```sql"));
    }
}

// ============================================================================
// Markdown rendering tests
// ============================================================================

mod markdown_tests {
    use super::super::service::render_markdown_table;
    use super::QueryResult;

    #[test]
    fn renders_header_separator_and_rows() {
        let result = QueryResult {
            columns: vec!["region".to_string(), "total".to_string()],
            rows: vec![
                vec!["EMEA".to_string(), "42".to_string()],
                vec!["APAC".to_string(), "7".to_string()],
            ],
        };
        assert_eq!(
            render_markdown_table(&result),
            "| region | total |\n| --- | --- |\n| EMEA | 42 |\n| APAC | 7 |"
        );
    }
}

// ============================================================================
// Client tests
// ============================================================================

mod client_tests {
    use super::*;
    use chrono::Utc;

    fn provider(name: &str) -> AiProvider {
        AiProvider {
            id: 1,
            provider: name.to_string(),
            api_key_encrypted: "sk-test".to_string(),
            model_name: "gpt-4".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_unsupported_provider_naming_it() {
        let err = LlmClient::for_provider(&provider("azure")).unwrap_err();
        assert!(matches!(err, AssistantError::UnsupportedProvider(ref name) if name == "azure"));
        assert_eq!(err.to_string(), "Unsupported provider: azure");
    }

    #[test]
    fn provider_match_is_case_insensitive() {
        assert!(LlmClient::for_provider(&provider("OpenAI")).is_ok());
        assert!(LlmClient::for_provider(&provider("GEMINI")).is_ok());
    }

    #[test]
    fn keeps_provider_name_for_diagnostics() {
        let client = LlmClient::for_provider(&provider("openai")).unwrap();
        assert_eq!(client.provider(), "openai");
    }

    #[test]
    fn parse_kind_covers_supported_set() {
        assert_eq!(ProviderKind::parse("openai"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("Gemini"), Some(ProviderKind::Gemini));
        assert_eq!(ProviderKind::parse("mistral"), None);
    }
}

// ============================================================================
// Repository tests
// ============================================================================

mod repository_tests {
    use super::*;

    fn create_request(provider: &str) -> CreateProviderRequest {
        CreateProviderRequest {
            provider: provider.to_string(),
            api_key: "sk-test-key-12345".to_string(),
            model_name: "gpt-4".to_string(),
            is_active: false,
        }
    }

    #[tokio::test]
    async fn active_provider_absent_is_none() {
        let pool = setup_test_db().await;
        let repo = AssistantRepository::new(pool);

        let active = repo.get_active_provider().await.expect("query failed");
        assert!(active.is_none());
    }

    #[tokio::test]
    async fn first_active_row_wins() {
        let pool = setup_test_db().await;
        seed_provider(&pool, "openai", true).await;
        seed_provider(&pool, "gemini", false).await;
        // Simulate a writer bug leaving two active rows
        sqlx::query("UPDATE ai_providers SET is_active = TRUE WHERE provider = 'gemini'")
            .execute(&pool)
            .await
            .unwrap();

        let repo = AssistantRepository::new(pool);
        let active = repo.get_active_provider().await.unwrap().unwrap();
        assert_eq!(active.provider, "openai");
    }

    #[tokio::test]
    async fn create_and_get_provider() {
        let pool = setup_test_db().await;
        let repo = AssistantRepository::new(pool);

        let created = repo.create_provider(create_request("openai")).await.unwrap();
        assert_eq!(created.provider, "openai");
        assert!(!created.is_active);

        let fetched = repo.get_provider(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.model_name, "gpt-4");
    }

    #[tokio::test]
    async fn activation_is_exclusive() {
        let pool = setup_test_db().await;
        let repo = AssistantRepository::new(pool);

        let openai = repo.create_provider(create_request("openai")).await.unwrap();
        let gemini = repo.create_provider(create_request("gemini")).await.unwrap();

        repo.activate_provider(openai.id).await.unwrap();
        repo.activate_provider(gemini.id).await.unwrap();

        let active = repo.get_active_provider().await.unwrap().unwrap();
        assert_eq!(active.id, gemini.id);

        let openai = repo.get_provider(openai.id).await.unwrap().unwrap();
        assert!(!openai.is_active);
    }

    #[tokio::test]
    async fn activate_unknown_provider_fails() {
        let pool = setup_test_db().await;
        let repo = AssistantRepository::new(pool);

        let err = repo.activate_provider(9999).await.unwrap_err();
        assert!(matches!(err, AssistantError::ProviderNotFound(9999)));
    }

    #[tokio::test]
    async fn delete_active_provider_is_rejected() {
        let pool = setup_test_db().await;
        let repo = AssistantRepository::new(pool);

        let provider = repo.create_provider(create_request("openai")).await.unwrap();
        repo.activate_provider(provider.id).await.unwrap();

        let err = repo.delete_provider(provider.id).await.unwrap_err();
        assert!(matches!(err, AssistantError::Conflict(_)));

        repo.deactivate_provider(provider.id).await.unwrap();
        repo.delete_provider(provider.id).await.unwrap();
        assert!(repo.get_provider(provider.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_provider_changes_only_given_fields() {
        let pool = setup_test_db().await;
        let repo = AssistantRepository::new(pool);

        let provider = repo.create_provider(create_request("openai")).await.unwrap();
        let updated = repo
            .update_provider(
                provider.id,
                UpdateProviderRequest {
                    api_key: None,
                    model_name: Some("gpt-4o".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.model_name, "gpt-4o");
        assert_eq!(updated.api_key_encrypted, "sk-test-key-12345");
    }

    #[tokio::test]
    async fn chat_log_appends_and_lists_newest_first() {
        let pool = setup_test_db().await;
        let user_id = seed_user(&pool, "alice").await;
        let dashboard_id = seed_dashboard(&pool, "Sales Overview", user_id, true).await;
        let repo = AssistantRepository::new(pool.clone());

        repo.insert_chat_log(user_id, dashboard_id, "first?", "answer one", None)
            .await
            .unwrap();
        repo.insert_chat_log(user_id, dashboard_id, "second?", "answer two", Some("SELECT 1"))
            .await
            .unwrap();

        let logs = repo.list_chat_logs(Some(dashboard_id), 50).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].prompt, "second?");
        assert_eq!(logs[0].user_name, "alice");
        assert_eq!(logs[0].dashboard_title, "Sales Overview");
        assert_eq!(logs[0].response_sql.as_deref(), Some("SELECT 1"));
        assert_eq!(logs[1].response_sql, None);
    }
}

// ============================================================================
// Orchestration scenarios
// ============================================================================

mod chat_scenarios {
    use super::*;

    struct Fixture {
        pool: SqlitePool,
        user: AuthUser,
        dashboard_id: i64,
    }

    /// One published dashboard with one `sales` datasource (RLS: region
    /// restriction) and an active openai provider.
    async fn fixture() -> Fixture {
        let pool = setup_test_db().await;
        let user_id = seed_user(&pool, "alice").await;
        let warehouse_id = seed_warehouse(&pool).await;
        let datasource_id =
            seed_datasource(&pool, warehouse_id, "sales", &["id", "region", "amount"]).await;
        seed_rls(&pool, datasource_id, "region = 'EMEA'").await;
        let dashboard_id = seed_dashboard(&pool, "Sales Overview", user_id, true).await;
        attach_datasource(&pool, dashboard_id, datasource_id, 0).await;
        seed_provider(&pool, "openai", true).await;

        Fixture {
            pool,
            user: AuthUser { id: user_id, username: "alice".to_string() },
            dashboard_id,
        }
    }

    fn chat_request(fixture: &Fixture, prompt: &str) -> ChatRequest {
        ChatRequest { dashboard_id: fixture.dashboard_id, prompt: prompt.to_string() }
    }

    #[tokio::test]
    async fn generated_sql_is_executed_and_logged() {
        let fx = fixture().await;
        let backend = StubBackend::replying(
            "Counting rows now.\n```sql\nSELECT COUNT(*) FROM sales\n```",
        );
        let executor = StubExecutor::returning(&["count"], &[&["42"]]);
        let service = service_with(&fx.pool, backend.clone(), executor.clone());

        let response = service
            .chat(&fx.user, chat_request(&fx, "How many rows in sales?"))
            .await
            .expect("chat failed");

        assert_eq!(response.sql_query.as_deref(), Some("SELECT COUNT(*) FROM sales"));
        assert!(response.response.contains("Counting rows now."));
        assert!(response.response.contains("**Result:**"));
        assert!(response.response.contains("| count |"));
        assert!(response.response.contains("| 42 |"));

        assert_eq!(executor.call_count(), 1);
        assert_eq!(executor.executed_sql().as_deref(), Some("SELECT COUNT(*) FROM sales"));

        // The model was told about the schema and the RLS constraint
        let system_prompt = backend.system_prompt().unwrap();
        assert!(system_prompt.contains("Table: sales"));
        assert!(system_prompt.contains("RLS Constraints (MUST APPLY): region = 'EMEA'"));

        // Exactly one audit row, with matching fields
        assert_eq!(count_chat_logs(&fx.pool).await, 1);
        let log: ChatLog = sqlx::query_as("SELECT * FROM ai_chat_log")
            .fetch_one(&fx.pool)
            .await
            .unwrap();
        assert_eq!(log.user_id, fx.user.id);
        assert_eq!(log.dashboard_id, fx.dashboard_id);
        assert_eq!(log.prompt, "How many rows in sales?");
        assert_eq!(log.response_text.as_deref(), Some(response.response.as_str()));
        assert_eq!(log.response_sql.as_deref(), Some("SELECT COUNT(*) FROM sales"));
    }

    #[tokio::test]
    async fn text_only_answer_skips_execution() {
        let fx = fixture().await;
        let backend = StubBackend::replying("The sales table has three columns.");
        let executor = StubExecutor::returning(&["count"], &[&["42"]]);
        let service = service_with(&fx.pool, backend, executor.clone());

        let response = service
            .chat(&fx.user, chat_request(&fx, "What columns does sales have?"))
            .await
            .unwrap();

        assert!(response.sql_query.is_none());
        assert_eq!(response.response, "The sales table has three columns.");
        assert_eq!(executor.call_count(), 0);

        let log: ChatLog = sqlx::query_as("SELECT * FROM ai_chat_log")
            .fetch_one(&fx.pool)
            .await
            .unwrap();
        assert_eq!(log.response_sql, None);
    }

    #[tokio::test]
    async fn empty_result_set_narrates_no_data() {
        let fx = fixture().await;
        let backend = StubBackend::replying("```sql\nSELECT * FROM sales WHERE 1=0\n```");
        let executor = StubExecutor::empty();
        let service = service_with(&fx.pool, backend, executor);

        let response = service.chat(&fx.user, chat_request(&fx, "Any rows?")).await.unwrap();

        assert!(response.response.contains("**Result:** No data found."));
        assert_eq!(count_chat_logs(&fx.pool).await, 1);
    }

    #[tokio::test]
    async fn execution_failure_is_absorbed_and_logged() {
        let fx = fixture().await;
        let backend = StubBackend::replying("```sql\nSELECT missing_col FROM sales\n```");
        let executor = StubExecutor::failing("Unknown column 'missing_col'");
        let service = service_with(&fx.pool, backend, executor);

        let response = service
            .chat(&fx.user, chat_request(&fx, "Sum the missing column"))
            .await
            .expect("execution failure must not abort the request");

        assert_eq!(response.sql_query.as_deref(), Some("SELECT missing_col FROM sales"));
        assert!(
            response
                .response
                .contains("**Error executing query:** SQL execution failed: Unknown column")
        );

        assert_eq!(count_chat_logs(&fx.pool).await, 1);
        let log: ChatLog = sqlx::query_as("SELECT * FROM ai_chat_log")
            .fetch_one(&fx.pool)
            .await
            .unwrap();
        assert!(log.response_text.unwrap().contains("**Error executing query:**"));
    }

    #[tokio::test]
    async fn provider_failure_aborts_without_logging() {
        let fx = fixture().await;
        let backend = StubBackend::failing("OpenAI request timed out after 60s");
        let executor = StubExecutor::empty();
        let service = service_with(&fx.pool, backend, executor.clone());

        let err = service
            .chat(&fx.user, chat_request(&fx, "How many rows in sales?"))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.starts_with("AI Error:"));
        assert!(err.message.contains("timed out"));
        assert_eq!(executor.call_count(), 0);
        assert_eq!(count_chat_logs(&fx.pool).await, 0);
    }

    #[tokio::test]
    async fn missing_configuration_short_circuits() {
        let fx = fixture().await;
        sqlx::query("DELETE FROM ai_providers")
            .execute(&fx.pool)
            .await
            .unwrap();
        let backend = StubBackend::replying("never used");
        let service = service_with(&fx.pool, backend.clone(), StubExecutor::empty());

        let err = service
            .chat(&fx.user, chat_request(&fx, "How many rows in sales?"))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "AI Provider is not configured.");
        assert_eq!(backend.call_count(), 0);
        assert_eq!(count_chat_logs(&fx.pool).await, 0);
    }

    #[tokio::test]
    async fn inactive_provider_counts_as_not_configured() {
        let fx = fixture().await;
        sqlx::query("UPDATE ai_providers SET is_active = FALSE")
            .execute(&fx.pool)
            .await
            .unwrap();
        let service =
            service_with(&fx.pool, StubBackend::replying("never"), StubExecutor::empty());

        let err = service
            .chat(&fx.user, chat_request(&fx, "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn denied_access_returns_forbidden_before_generation() {
        let fx = fixture().await;
        sqlx::query("UPDATE dashboards SET is_published = FALSE WHERE id = ?")
            .bind(fx.dashboard_id)
            .execute(&fx.pool)
            .await
            .unwrap();
        let intruder_id = seed_user(&fx.pool, "mallory").await;
        let intruder = AuthUser { id: intruder_id, username: "mallory".to_string() };

        let backend = StubBackend::replying("never used");
        let service = service_with(&fx.pool, backend.clone(), StubExecutor::empty());

        let err = service.chat(&intruder, chat_request(&fx, "show me")).await.unwrap_err();

        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(backend.call_count(), 0);
        assert_eq!(count_chat_logs(&fx.pool).await, 0);
    }

    #[tokio::test]
    async fn owner_reads_unpublished_dashboard() {
        let fx = fixture().await;
        sqlx::query("UPDATE dashboards SET is_published = FALSE WHERE id = ?")
            .bind(fx.dashboard_id)
            .execute(&fx.pool)
            .await
            .unwrap();

        let backend = StubBackend::replying("fine");
        let service = service_with(&fx.pool, backend, StubExecutor::empty());

        let response = service.chat(&fx.user, chat_request(&fx, "hi")).await.unwrap();
        assert_eq!(response.response, "fine");
    }

    #[tokio::test]
    async fn unknown_dashboard_returns_not_found() {
        let fx = fixture().await;
        let backend = StubBackend::replying("never used");
        let service = service_with(&fx.pool, backend.clone(), StubExecutor::empty());

        let err = service
            .chat(&fx.user, ChatRequest { dashboard_id: 9999, prompt: "hi".to_string() })
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(backend.call_count(), 0);
        assert_eq!(count_chat_logs(&fx.pool).await, 0);
    }

    #[tokio::test]
    async fn unsupported_stored_provider_fails_at_query_time() {
        let fx = fixture().await;
        sqlx::query("UPDATE ai_providers SET provider = 'azure'")
            .execute(&fx.pool)
            .await
            .unwrap();

        // No backend override: the real client construction must reject the
        // provider before any network call.
        let dashboards = Arc::new(DashboardService::new(fx.pool.clone()));
        let service = AssistantService::new(fx.pool.clone(), dashboards, StubExecutor::empty());

        let err = service.chat(&fx.user, chat_request(&fx, "hi")).await.unwrap_err();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("Unsupported provider: azure"));
        assert_eq!(count_chat_logs(&fx.pool).await, 0);
    }

    #[tokio::test]
    async fn dashboard_without_datasources_still_answers() {
        let fx = fixture().await;
        sqlx::query("DELETE FROM dashboard_datasources")
            .execute(&fx.pool)
            .await
            .unwrap();

        let backend =
            StubBackend::replying("No tables here.\n```sql\nSELECT 1\n```");
        let executor = StubExecutor::returning(&["x"], &[&["1"]]);
        let service = service_with(&fx.pool, backend.clone(), executor.clone());

        let response = service.chat(&fx.user, chat_request(&fx, "anything?")).await.unwrap();

        // SQL was extracted but there is no warehouse to run it against
        assert_eq!(response.sql_query.as_deref(), Some("SELECT 1"));
        assert_eq!(executor.call_count(), 0);
        assert!(!response.response.contains("**Result:**"));
        assert_eq!(count_chat_logs(&fx.pool).await, 1);

        let system_prompt = backend.system_prompt().unwrap();
        assert!(system_prompt.contains("You are a Prism Data Assistant."));
    }

    #[tokio::test]
    async fn multi_datasource_dashboard_executes_against_first_warehouse() {
        let fx = fixture().await;
        // Attach a second datasource on another warehouse at a later position
        let second_warehouse = seed_warehouse_named(&fx.pool, "secondary").await;
        let second_ds = seed_datasource(&fx.pool, second_warehouse, "customers", &["id"]).await;
        attach_datasource(&fx.pool, fx.dashboard_id, second_ds, 1).await;

        let backend = StubBackend::replying("```sql\nSELECT 1\n```");
        let executor = StubExecutor::returning(&["x"], &[&["1"]]);
        let service = service_with(&fx.pool, backend, executor.clone());

        service.chat(&fx.user, chat_request(&fx, "hi")).await.unwrap();
        assert_eq!(executor.call_count(), 1);
    }

    async fn seed_warehouse_named(pool: &SqlitePool, name: &str) -> i64 {
        sqlx::query(
            r#"INSERT INTO warehouses (name, host, port, username, password, database_name)
               VALUES (?, '127.0.0.1', 9030, 'reader', '', 'secondary')"#,
        )
        .bind(name)
        .execute(pool)
        .await
        .expect("Failed to create warehouse")
        .last_insert_rowid()
    }
}

// ============================================================================
// Provider facade tests
// ============================================================================

mod provider_facade_tests {
    use super::*;

    fn facade(pool: &SqlitePool) -> AssistantService {
        let dashboards = Arc::new(DashboardService::new(pool.clone()));
        AssistantService::new(pool.clone(), dashboards, StubExecutor::empty())
    }

    #[tokio::test]
    async fn masks_api_keys_in_listings() {
        let pool = setup_test_db().await;
        seed_provider(&pool, "openai", true).await;
        let service = facade(&pool);

        let providers = service.list_providers().await.unwrap();
        assert_eq!(providers.len(), 1);
        let masked = providers[0].api_key_masked.as_deref().unwrap();
        assert_eq!(masked, "sk-t...2345");
        assert!(!masked.contains("key"));
    }

    #[tokio::test]
    async fn status_reflects_active_provider() {
        let pool = setup_test_db().await;
        let service = facade(&pool);

        let status = service.status().await.unwrap();
        assert!(!status.configured);
        assert_eq!(status.provider_count, 0);

        seed_provider(&pool, "gemini", true).await;
        let status = service.status().await.unwrap();
        assert!(status.configured);
        assert_eq!(status.active_provider.unwrap().provider, "gemini");
        assert_eq!(status.provider_count, 1);
    }

    #[tokio::test]
    async fn create_rejects_blank_fields() {
        let pool = setup_test_db().await;
        let service = facade(&pool);

        let err = service
            .create_provider(CreateProviderRequest {
                provider: "  ".to_string(),
                api_key: "sk".to_string(),
                model_name: "gpt-4".to_string(),
                is_active: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn creating_active_provider_deactivates_others() {
        let pool = setup_test_db().await;
        seed_provider(&pool, "openai", true).await;
        let service = facade(&pool);

        service
            .create_provider(CreateProviderRequest {
                provider: "gemini".to_string(),
                api_key: "g-key-123456".to_string(),
                model_name: "gemini-pro".to_string(),
                is_active: true,
            })
            .await
            .unwrap();

        let active = service.get_active_provider().await.unwrap().unwrap();
        assert_eq!(active.provider, "gemini");
    }
}
