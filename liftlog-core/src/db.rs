use crate::config::DatabaseConfig;
use crate::error::LiftlogError;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, LiftlogError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> Result<String, LiftlogError> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn table_identifier(table: &str) -> Result<&str, LiftlogError> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(table)
    } else {
        Err(LiftlogError::InvalidTable(table.to_string()))
    }
}

/// Confirms the sessions table exists and is readable.
pub async fn check_sessions_table(pool: &PgPool, table: &str) -> Result<i64, LiftlogError> {
    let sql = format!("SELECT COUNT(*) FROM {}", table_identifier(table)?);
    let row: (i64,) = sqlx::query_as(&sql).fetch_one(pool).await?;
    Ok(row.0)
}
