use async_trait::async_trait;
use mysql_async::prelude::Queryable;

use crate::models::Warehouse;
use crate::services::warehouse_pool_manager::WarehousePoolManager;

#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("Failed to get connection: {0}")]
    Connection(String),

    #[error("SQL execution failed: {0}")]
    Execution(String),
}

/// Tabular result of one warehouse query: column names plus stringified rows.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Seam for generated-SQL execution. The production implementation speaks the
/// MySQL protocol; tests substitute a stub.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn run_query(&self, warehouse: &Warehouse, sql: &str)
    -> Result<QueryResult, WarehouseError>;
}

/// MySQL-protocol executor backed by the per-warehouse pool manager. The
/// connection is acquired, used, and dropped inside `run_query`; it is never
/// held across other awaits.
#[derive(Clone)]
pub struct WarehouseClient {
    pools: WarehousePoolManager,
}

impl WarehouseClient {
    pub fn new(pools: WarehousePoolManager) -> Self {
        Self { pools }
    }
}

#[async_trait]
impl SqlExecutor for WarehouseClient {
    async fn run_query(
        &self,
        warehouse: &Warehouse,
        sql: &str,
    ) -> Result<QueryResult, WarehouseError> {
        let pool = self.pools.get_pool(warehouse);
        let mut conn = pool.get_conn().await.map_err(|e| {
            tracing::error!("Failed to get connection from pool: {}", e);
            WarehouseError::Connection(e.to_string())
        })?;

        let rows: Vec<mysql_async::Row> = conn.query(sql).await.map_err(|e| {
            tracing::error!("Warehouse query execution failed: {}", e);
            WarehouseError::Execution(e.to_string())
        })?;

        tracing::debug!("Query returned {} rows", rows.len());

        drop(conn);

        Ok(process_query_result(rows))
    }
}

fn process_query_result(rows: Vec<mysql_async::Row>) -> QueryResult {
    if rows.is_empty() {
        return QueryResult { columns: Vec::new(), rows: Vec::new() };
    }

    let col_count = rows[0].columns_ref().len();

    let mut columns = Vec::with_capacity(col_count);
    for col in rows[0].columns_ref().iter() {
        columns.push(col.name_str().to_string());
    }

    let mut result_rows = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        let mut row_data = Vec::with_capacity(col_count);
        for col_idx in 0..col_count {
            row_data.push(value_to_string(&row[col_idx]));
        }
        result_rows.push(row_data);
    }

    QueryResult { columns, rows: result_rows }
}

fn value_to_string(value: &mysql_async::Value) -> String {
    match value {
        mysql_async::Value::NULL => "NULL".to_string(),
        mysql_async::Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).to_string(),
        },
        mysql_async::Value::Int(i) => i.to_string(),
        mysql_async::Value::UInt(u) => u.to_string(),
        mysql_async::Value::Float(f) => f.to_string(),
        mysql_async::Value::Double(d) => d.to_string(),
        mysql_async::Value::Date(year, month, day, hour, minute, second, _micro) => {
            format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            )
        },
        mysql_async::Value::Time(_neg, days, hours, minutes, seconds, _micro) => {
            let total_hours = days * 24 + (*hours as u32);
            format!("{}:{:02}:{:02}", total_hours, minutes, seconds)
        },
    }
}
