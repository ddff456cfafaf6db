pub mod assistant;
pub mod auth_service;
pub mod dashboard_service;
pub mod warehouse_client;
pub mod warehouse_pool_manager;

pub use assistant::{AssistantService, LlmClient};
pub use auth_service::AuthService;
pub use dashboard_service::DashboardService;
pub use warehouse_client::{QueryResult, SqlExecutor, WarehouseClient, WarehouseError};
pub use warehouse_pool_manager::WarehousePoolManager;
