//! Remote session gateway: the boundary between the tracker and the data store
//!
//! Provides a `SessionGateway` trait with implementations for:
//! - **REST**: a PostgREST-style data API (`/rest/v1/{table}`)
//! - **Postgres**: direct `sqlx` access to the same table
//! - **Memory**: in-process store for tests and local demos
//!
//! Every call is a single attempt. Failures are returned to the caller as-is.

mod memory;
mod postgres;
mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use crate::config::{BackendKind, RemoteConfig};
use crate::models::session::{NewSession, Session, SessionId};

pub use memory::MemoryGateway;
pub use postgres::PgSessionGateway;
pub use rest::RestSessionGateway;

// ============================================================================
// SessionGateway trait
// ============================================================================

/// The three remote operations the tracker needs.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// All sessions owned by `user_id`, most recent `date` first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, GatewayError>;

    /// Insert a new session. The store assigns its id.
    async fn insert_session(&self, session: &NewSession) -> Result<(), GatewayError>;

    /// Delete a session by id.
    async fn delete_session(&self, id: SessionId) -> Result<(), GatewayError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Missing API key")]
    MissingApiKey,
}

// ============================================================================
// Query primitives
// ============================================================================

/// Equality predicate `field = value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFilter {
    pub field: String,
    pub value: String,
}

impl DataFilter {
    pub fn eq(field: impl Into<String>, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// PostgREST query pair, e.g. `("user_id", "eq.u1")`.
    pub fn to_query_pair(&self) -> (String, String) {
        (self.field.clone(), format!("eq.{}", self.value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataOrder {
    pub field: String,
    pub direction: OrderDirection,
}

impl DataOrder {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// PostgREST query pair, e.g. `("order", "date.desc")`.
    pub fn to_query_pair(&self) -> (String, String) {
        let direction = match self.direction {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        };
        ("order".to_string(), format!("{}.{}", self.field, direction))
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Create the configured backend. `pool` is required for `postgres`.
pub fn create_gateway(
    config: &RemoteConfig,
    pool: Option<PgPool>,
) -> Result<Arc<dyn SessionGateway>, GatewayError> {
    match config.backend {
        BackendKind::Rest => Ok(Arc::new(RestSessionGateway::new(config)?)),
        BackendKind::Postgres => {
            crate::db::table_identifier(&config.table)
                .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
            let pool = pool.ok_or_else(|| {
                GatewayError::Unavailable("postgres backend requires a database pool".to_string())
            })?;
            Ok(Arc::new(PgSessionGateway::new(pool, config.table.clone())))
        }
        BackendKind::Memory => Ok(Arc::new(MemoryGateway::new())),
    }
}
