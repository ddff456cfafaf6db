//! Prism Library
//!
//! This library contains all the core modules for the Prism application.

use std::sync::Arc;

use sqlx::SqlitePool;

pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use services::assistant::{AssistantError, AssistantService, ChatRequest, ChatResponse};
pub use services::{AuthService, DashboardService, WarehouseClient, WarehousePoolManager};
pub use utils::JwtUtil;

#[cfg(test)]
mod tests;

/// Application shared state
///
/// Design Philosophy: Keep it simple - Rust's type system IS our DI container.
/// All services are wrapped in Arc for cheap cloning and thread safety.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,

    pub jwt_util: Arc<JwtUtil>,
    pub warehouse_pools: WarehousePoolManager,

    pub auth_service: Arc<AuthService>,
    pub dashboard_service: Arc<DashboardService>,
    pub assistant_service: Arc<AssistantService>,
}
