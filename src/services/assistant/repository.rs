//! Assistant repository - database operations for provider configuration and
//! the chat audit log.

use sqlx::SqlitePool;

use super::models::*;

pub struct AssistantRepository {
    pool: SqlitePool,
}

impl AssistantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve the currently active provider. Absence is a normal state; the
    /// caller surfaces it as "not configured". If several rows are active
    /// (a writer bug), the first by id wins.
    pub async fn get_active_provider(&self) -> Result<Option<AiProvider>, AssistantError> {
        sqlx::query_as::<_, AiProvider>(
            "SELECT * FROM ai_providers WHERE is_active = TRUE ORDER BY id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(AssistantError::from)
    }

    pub async fn list_providers(&self) -> Result<Vec<AiProvider>, AssistantError> {
        sqlx::query_as::<_, AiProvider>("SELECT * FROM ai_providers ORDER BY provider ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(AssistantError::from)
    }

    pub async fn get_provider(&self, id: i64) -> Result<Option<AiProvider>, AssistantError> {
        sqlx::query_as::<_, AiProvider>("SELECT * FROM ai_providers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AssistantError::from)
    }

    pub async fn create_provider(
        &self,
        req: CreateProviderRequest,
    ) -> Result<AiProvider, AssistantError> {
        let mut tx = self.pool.begin().await?;

        if req.is_active {
            sqlx::query("UPDATE ai_providers SET is_active = FALSE")
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query(
            r#"INSERT INTO ai_providers (provider, api_key_encrypted, model_name, is_active)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(&req.provider)
        .bind(&req.api_key)
        .bind(&req.model_name)
        .bind(req.is_active)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        tx.commit().await?;

        sqlx::query_as::<_, AiProvider>("SELECT * FROM ai_providers WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(AssistantError::from)
    }

    pub async fn update_provider(
        &self,
        id: i64,
        req: UpdateProviderRequest,
    ) -> Result<AiProvider, AssistantError> {
        let mut sql = String::from("UPDATE ai_providers SET updated_at = CURRENT_TIMESTAMP");
        let mut args = sqlx::sqlite::SqliteArguments::default();
        use sqlx::Arguments;

        if let Some(v) = &req.api_key {
            sql.push_str(", api_key_encrypted = ?");
            args.add(v);
        }
        if let Some(v) = &req.model_name {
            sql.push_str(", model_name = ?");
            args.add(v);
        }

        sql.push_str(" WHERE id = ?");
        args.add(id);

        let result = sqlx::query_with(&sql, args).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(AssistantError::ProviderNotFound(id));
        }

        sqlx::query_as::<_, AiProvider>("SELECT * FROM ai_providers WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(AssistantError::from)
    }

    pub async fn delete_provider(&self, id: i64) -> Result<(), AssistantError> {
        let provider = self.get_provider(id).await?;
        match provider {
            None => return Err(AssistantError::ProviderNotFound(id)),
            Some(p) if p.is_active => {
                return Err(AssistantError::Conflict(
                    "Cannot delete active provider. Deactivate it first.".to_string(),
                ));
            },
            _ => {},
        }

        sqlx::query("DELETE FROM ai_providers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Activate a provider, deactivating every other row in the same
    /// transaction so "at most one active" holds across writers.
    pub async fn activate_provider(&self, id: i64) -> Result<(), AssistantError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE ai_providers SET is_active = FALSE")
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "UPDATE ai_providers SET is_active = TRUE, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AssistantError::ProviderNotFound(id));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn deactivate_provider(&self, id: i64) -> Result<(), AssistantError> {
        let result = sqlx::query(
            "UPDATE ai_providers SET is_active = FALSE, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AssistantError::ProviderNotFound(id));
        }
        Ok(())
    }

    /// Append one chat interaction. This is the only write path into the
    /// audit log; rows are never updated or deleted here.
    pub async fn insert_chat_log(
        &self,
        user_id: i64,
        dashboard_id: i64,
        prompt: &str,
        response_text: &str,
        response_sql: Option<&str>,
    ) -> Result<i64, AssistantError> {
        let result = sqlx::query(
            r#"INSERT INTO ai_chat_log (user_id, dashboard_id, prompt, response_text, response_sql, timestamp)
               VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)"#,
        )
        .bind(user_id)
        .bind(dashboard_id)
        .bind(prompt)
        .bind(response_text)
        .bind(response_sql)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_chat_logs(
        &self,
        dashboard_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatLogEntry>, AssistantError> {
        let rows = match dashboard_id {
            Some(dashboard_id) => {
                sqlx::query_as::<_, ChatLogEntry>(
                    r#"SELECT l.id, u.username AS user_name, d.title AS dashboard_title,
                              l.prompt, l.response_text, l.response_sql, l.timestamp
                       FROM ai_chat_log l
                       JOIN users u ON u.id = l.user_id
                       JOIN dashboards d ON d.id = l.dashboard_id
                       WHERE l.dashboard_id = ?
                       ORDER BY l.timestamp DESC, l.id DESC
                       LIMIT ?"#,
                )
                .bind(dashboard_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            },
            None => {
                sqlx::query_as::<_, ChatLogEntry>(
                    r#"SELECT l.id, u.username AS user_name, d.title AS dashboard_title,
                              l.prompt, l.response_text, l.response_sql, l.timestamp
                       FROM ai_chat_log l
                       JOIN users u ON u.id = l.user_id
                       JOIN dashboards d ON d.id = l.dashboard_id
                       ORDER BY l.timestamp DESC, l.id DESC
                       LIMIT ?"#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            },
        };

        Ok(rows)
    }
}
