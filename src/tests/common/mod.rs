// Common test utilities and helpers

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::time::Duration;

/// Create an in-memory SQLite database for testing
pub async fn create_test_db() -> SqlitePool {
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

/// Create a test user with a pre-hashed password, returning its id
pub async fn create_test_user(pool: &SqlitePool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, password_hash, email) VALUES (?, ?, ?)")
        .bind(username)
        .bind("$2b$12$hashed_password")
        .bind(format!("{}@test.com", username))
        .execute(pool)
        .await
        .expect("Failed to create test user")
        .last_insert_rowid()
}

/// Create a test warehouse connection record
pub async fn create_test_warehouse(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query(
        r#"INSERT INTO warehouses (name, host, port, username, password, database_name)
           VALUES (?, '127.0.0.1', 9030, 'reader', '', 'analytics')"#,
    )
    .bind(name)
    .execute(pool)
    .await
    .expect("Failed to create test warehouse")
    .last_insert_rowid()
}

/// Create a datasource with the given columns (in order)
pub async fn create_test_datasource(
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

/// Create a dashboard and attach the given datasources in order
pub async fn create_test_dashboard(
    pool: &SqlitePool,
    title: &str,
    owner_id: i64,
    published: bool,
    datasource_ids: &[i64],
) -> i64 {
    let dashboard_id =
        sqlx::query("INSERT INTO dashboards (title, owner_id, is_published) VALUES (?, ?, ?)")
            .bind(title)
            .bind(owner_id)
            .bind(published)
            .execute(pool)
            .await
            .expect("Failed to create test dashboard")
            .last_insert_rowid();

    for (position, datasource_id) in datasource_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO dashboard_datasources (dashboard_id, datasource_id, position) VALUES (?, ?, ?)",
        )
        .bind(dashboard_id)
        .bind(datasource_id)
        .bind(position as i64)
        .execute(pool)
        .await
        .expect("Failed to attach datasource");
    }

    dashboard_id
}

/// Add an RLS clause to a datasource
pub async fn add_rls_filter(pool: &SqlitePool, datasource_id: i64, clause: &str) {
    sqlx::query("INSERT INTO rls_filters (datasource_id, clause) VALUES (?, ?)")
        .bind(datasource_id)
        .bind(clause)
        .execute(pool)
        .await
        .expect("Failed to create RLS filter");
}
