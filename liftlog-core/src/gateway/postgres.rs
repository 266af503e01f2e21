use async_trait::async_trait;
use sqlx::PgPool;

use super::{GatewayError, SessionGateway};
use crate::models::session::{NewSession, Session, SessionId};

/// Reads and writes `lifting_sessions` directly through a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgSessionGateway {
    pool: PgPool,
    table: String,
}

impl PgSessionGateway {
    pub fn new(pool: PgPool, table: String) -> Self {
        Self { pool, table }
    }
}

#[async_trait]
impl SessionGateway for PgSessionGateway {
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, GatewayError> {
        let sql = format!(
            "SELECT id, user_id, exercise, weight, reps, date FROM {} WHERE user_id = $1 ORDER BY date DESC",
            self.table
        );
        let rows = sqlx::query_as::<_, Session>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn insert_session(&self, session: &NewSession) -> Result<(), GatewayError> {
        let sql = format!(
            "INSERT INTO {} (user_id, exercise, weight, reps, date) VALUES ($1, $2, $3, $4, $5)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&session.user_id)
            .bind(&session.exercise)
            .bind(session.weight)
            .bind(session.reps)
            .bind(session.date)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), GatewayError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        tracing::debug!(session_id = id, rows = result.rows_affected(), "Deleted session row");
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
