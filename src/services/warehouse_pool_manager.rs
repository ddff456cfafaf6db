use crate::models::Warehouse;
use dashmap::DashMap;
use mysql_async::{OptsBuilder, Pool, SslOpts};
use std::sync::Arc;

/// Manager for warehouse connection pools using mysql_async with DashMap.
///
/// Maintains a pool per warehouse to avoid reconnecting on every generated
/// query. Lock-free concurrent access; pools are created lazily on first use.
#[derive(Clone)]
pub struct WarehousePoolManager {
    pools: Arc<DashMap<i64, Pool>>,
}

impl WarehousePoolManager {
    pub fn new() -> Self {
        Self { pools: Arc::new(DashMap::new()) }
    }

    /// Get or create a connection pool for the given warehouse.
    pub fn get_pool(&self, warehouse: &Warehouse) -> Pool {
        if let Some(pool) = self.pools.get(&warehouse.id) {
            return pool.clone();
        }

        let pool = Self::create_pool(warehouse);
        self.pools.insert(warehouse.id, pool.clone());

        tracing::info!(
            "Created connection pool for warehouse {} ({}:{})",
            warehouse.id,
            warehouse.host,
            warehouse.port
        );

        pool
    }

    /// Remove a pool, e.g. when a warehouse's credentials change.
    pub fn remove_pool(&self, warehouse_id: i64) {
        if let Some((_, pool)) = self.pools.remove(&warehouse_id) {
            drop(pool);
            tracing::info!("Removed connection pool for warehouse {}", warehouse_id);
        }
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    fn create_pool(warehouse: &Warehouse) -> Pool {
        let opts = OptsBuilder::default()
            .ip_or_hostname(&warehouse.host)
            .tcp_port(warehouse.port as u16)
            .user(Some(&warehouse.username))
            .pass(Some(&warehouse.password))
            .db_name(Some(&warehouse.database_name))
            .prefer_socket(false)
            .ssl_opts(None::<SslOpts>)
            .tcp_keepalive(Some(30_000_u32))
            .tcp_nodelay(true);

        Pool::new(opts)
    }
}

impl Default for WarehousePoolManager {
    fn default() -> Self {
        Self::new()
    }
}
