use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use prism::config::Config;
use prism::db;
use prism::services::assistant::AssistantService;
use prism::services::{AuthService, DashboardService, WarehouseClient, WarehousePoolManager};
use prism::utils::JwtUtil;
use prism::{AppState, handlers, middleware, services};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::get_me,
        // Dashboards
        handlers::dashboard::list_dashboards,
        handlers::dashboard::get_dashboard,
        // Assistant
        handlers::assistant::chat,
        handlers::assistant::history,
        // AI Providers
        handlers::provider::list_providers,
        handlers::provider::get_provider,
        handlers::provider::get_active_provider,
        handlers::provider::create_provider,
        handlers::provider::update_provider,
        handlers::provider::delete_provider,
        handlers::provider::activate_provider,
        handlers::provider::deactivate_provider,
        handlers::provider::get_status,
    ),
    components(
        schemas(
            prism::models::RegisterRequest,
            prism::models::LoginRequest,
            prism::models::LoginResponse,
            prism::models::UserResponse,
            prism::models::DashboardSummary,
            prism::models::DashboardDetail,
            prism::models::DatasourceDetail,
            services::assistant::ChatRequest,
            services::assistant::ChatResponse,
            services::assistant::ChatLogEntry,
            services::assistant::AiProviderInfo,
            services::assistant::CreateProviderRequest,
            services::assistant::UpdateProviderRequest,
            services::assistant::AssistantStatusResponse,
        )
    ),
    tags(
        (name = "Authentication", description = "User authentication endpoints"),
        (name = "Dashboards", description = "Dashboard read endpoints"),
        (name = "Assistant", description = "Natural-language query assistant"),
        (name = "AI Providers", description = "LLM provider configuration"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration first
    let config = Config::load()?;

    // Initialize logging
    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    // Add file logging if configured
    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("prism.log");
        // Remove .log extension if present (rolling appender adds date suffix)
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!("Prism starting up");

    let pool = db::create_pool(&config.database.url).await?;
    tracing::info!("Database pool created and migrations applied");

    // Initialize core components
    let jwt_util = Arc::new(JwtUtil::new(&config.auth.jwt_secret, &config.auth.jwt_expires_in));
    let warehouse_pools = WarehousePoolManager::new();

    let auth_service = Arc::new(AuthService::new(pool.clone(), Arc::clone(&jwt_util)));
    let dashboard_service = Arc::new(DashboardService::new(pool.clone()));

    let warehouse_client = Arc::new(WarehouseClient::new(warehouse_pools.clone()));
    let assistant_service = Arc::new(AssistantService::new(
        pool.clone(),
        Arc::clone(&dashboard_service),
        warehouse_client,
    ));
    tracing::info!("Assistant service initialized");

    let app_state = AppState {
        db: pool.clone(),
        jwt_util: Arc::clone(&jwt_util),
        warehouse_pools,
        auth_service: Arc::clone(&auth_service),
        dashboard_service: Arc::clone(&dashboard_service),
        assistant_service: Arc::clone(&assistant_service),
    };

    let app_state_arc = Arc::new(app_state);

    // Auth state for middleware
    let auth_state = middleware::AuthState { jwt_util: Arc::clone(&jwt_util) };

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .with_state(Arc::clone(&app_state_arc));

    // Protected routes (require authentication)
    let protected_routes = Router::new()
        // Auth
        .route("/api/auth/me", get(handlers::auth::get_me))
        // Dashboards
        .route("/api/dashboards", get(handlers::dashboard::list_dashboards))
        .route("/api/dashboards/:id", get(handlers::dashboard::get_dashboard))
        // Assistant
        .route("/api/assistant/chat", post(handlers::assistant::chat))
        .route("/api/assistant/history", get(handlers::assistant::history))
        .route("/api/assistant/status", get(handlers::provider::get_status))
        // AI Providers
        .route(
            "/api/assistant/providers",
            get(handlers::provider::list_providers).post(handlers::provider::create_provider),
        )
        .route("/api/assistant/providers/active", get(handlers::provider::get_active_provider))
        .route(
            "/api/assistant/providers/:id",
            get(handlers::provider::get_provider)
                .put(handlers::provider::update_provider)
                .delete(handlers::provider::delete_provider),
        )
        .route(
            "/api/assistant/providers/:id/activate",
            post(handlers::provider::activate_provider),
        )
        .route(
            "/api/assistant/providers/:id/deactivate",
            post(handlers::provider::deactivate_provider),
        )
        .with_state(Arc::clone(&app_state_arc))
        .layer(axum_middleware::from_fn_with_state(auth_state, middleware::auth_middleware));

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check));

    // Build the main app router
    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public_routes)
        .merge(protected_routes)
        .merge(health_routes);

    let app = app
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);
    tracing::info!("Prism is ready to serve requests");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ready_check() -> &'static str {
    "READY"
}
