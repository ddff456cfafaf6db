use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A MySQL-protocol warehouse connection record. One warehouse backs many
/// datasources; the assistant executes generated SQL against it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: i64,
    pub name: String,
    pub host: String,
    pub port: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database_name: String,
    pub created_at: DateTime<Utc>,
}

/// A queryable table attached to dashboards, owning a reference to its
/// backing warehouse.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Datasource {
    pub id: i64,
    pub warehouse_id: i64,
    pub table_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Dashboard {
    pub id: i64,
    pub title: String,
    pub owner_id: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One datasource with the metadata the assistant needs: column names in
/// ordinal order and the RLS clauses that apply to it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DatasourceDetail {
    pub id: i64,
    pub warehouse_id: i64,
    pub table_name: String,
    pub columns: Vec<String>,
    pub rls_clauses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardDetail {
    pub id: i64,
    pub title: String,
    pub owner_id: i64,
    pub is_published: bool,
    pub datasources: Vec<DatasourceDetail>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DashboardSummary {
    pub id: i64,
    pub title: String,
    pub owner_id: i64,
    pub is_published: bool,
}
