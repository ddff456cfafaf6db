use sqlx::SqlitePool;

use crate::models::{
    Dashboard, DashboardDetail, DashboardSummary, Datasource, DatasourceDetail, Warehouse,
};
use crate::utils::{ApiError, ApiResult};

/// Read surface over the dashboard domain model. Supplies everything the
/// assistant needs: the dashboard row, the access decision, and the
/// per-datasource metadata (columns in ordinal order, RLS clauses, backing
/// warehouse).
#[derive(Clone)]
pub struct DashboardService {
    pool: SqlitePool,
}

impl DashboardService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Dashboards readable by the given user: own dashboards plus anything
    /// published.
    pub async fn list_dashboards(&self, user_id: i64) -> ApiResult<Vec<DashboardSummary>> {
        let dashboards: Vec<DashboardSummary> = sqlx::query_as(
            r#"SELECT id, title, owner_id, is_published FROM dashboards
               WHERE owner_id = ? OR is_published = TRUE
               ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(dashboards)
    }

    pub async fn get_dashboard(&self, dashboard_id: i64) -> ApiResult<Dashboard> {
        let dashboard: Option<Dashboard> =
            sqlx::query_as("SELECT * FROM dashboards WHERE id = ?")
                .bind(dashboard_id)
                .fetch_optional(&self.pool)
                .await?;

        dashboard.ok_or_else(|| ApiError::not_found("Dashboard not found"))
    }

    /// Access rule: the owner may always read; everyone else only when the
    /// dashboard is published.
    pub fn ensure_read_access(&self, dashboard: &Dashboard, user_id: i64) -> ApiResult<()> {
        if dashboard.owner_id == user_id || dashboard.is_published {
            return Ok(());
        }
        tracing::warn!(
            "User {} denied access to dashboard {} ('{}')",
            user_id,
            dashboard.id,
            dashboard.title
        );
        Err(ApiError::forbidden("You don't have access to this dashboard"))
    }

    /// Datasources attached to a dashboard, in position order, each with its
    /// column list and RLS clauses.
    pub async fn get_datasource_details(
        &self,
        dashboard_id: i64,
    ) -> ApiResult<Vec<DatasourceDetail>> {
        let datasources: Vec<Datasource> = sqlx::query_as(
            r#"SELECT d.* FROM datasources d
               JOIN dashboard_datasources dd ON dd.datasource_id = d.id
               WHERE dd.dashboard_id = ?
               ORDER BY dd.position ASC, d.id ASC"#,
        )
        .bind(dashboard_id)
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(datasources.len());
        for datasource in datasources {
            let columns: Vec<String> = sqlx::query_scalar(
                r#"SELECT column_name FROM datasource_columns
                   WHERE datasource_id = ? ORDER BY ordinal ASC, id ASC"#,
            )
            .bind(datasource.id)
            .fetch_all(&self.pool)
            .await?;

            let rls_clauses: Vec<String> =
                sqlx::query_scalar("SELECT clause FROM rls_filters WHERE datasource_id = ? ORDER BY id ASC")
                    .bind(datasource.id)
                    .fetch_all(&self.pool)
                    .await?;

            details.push(DatasourceDetail {
                id: datasource.id,
                warehouse_id: datasource.warehouse_id,
                table_name: datasource.table_name,
                columns,
                rls_clauses,
            });
        }

        Ok(details)
    }

    pub async fn get_dashboard_detail(&self, dashboard_id: i64) -> ApiResult<DashboardDetail> {
        let dashboard = self.get_dashboard(dashboard_id).await?;
        let datasources = self.get_datasource_details(dashboard_id).await?;
        Ok(DashboardDetail {
            id: dashboard.id,
            title: dashboard.title,
            owner_id: dashboard.owner_id,
            is_published: dashboard.is_published,
            datasources,
        })
    }

    pub async fn get_warehouse(&self, warehouse_id: i64) -> ApiResult<Warehouse> {
        let warehouse: Option<Warehouse> =
            sqlx::query_as("SELECT * FROM warehouses WHERE id = ?")
                .bind(warehouse_id)
                .fetch_optional(&self.pool)
                .await?;

        warehouse.ok_or_else(|| ApiError::not_found("Warehouse not found"))
    }
}
