use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{DataFilter, DataOrder, GatewayError, SessionGateway};
use crate::config::RemoteConfig;
use crate::models::session::{NewSession, Session, SessionId};

// ============================================================================
// Data API structs (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct DataApiError {
    message: Option<String>,
}

// ============================================================================
// RestSessionGateway
// ============================================================================

/// Client for a PostgREST-style data API (`{base}/rest/v1/{table}`).
#[derive(Debug, Clone)]
pub struct RestSessionGateway {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestSessionGateway {
    pub fn new(config: &RemoteConfig) -> Result<Self, GatewayError> {
        Self::with_base_url(config, config.base_url.clone())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: &RemoteConfig, base_url: String) -> Result<Self, GatewayError> {
        let api_key = config.resolved_api_key();
        if api_key.is_empty() {
            return Err(GatewayError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            table: config.table.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// `select *` from `table` filtered by one equality predicate and ordered.
    pub async fn list<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &DataFilter,
        order: &DataOrder,
    ) -> Result<Vec<T>, GatewayError> {
        let query = [
            ("select".to_string(), "*".to_string()),
            filter.to_query_pair(),
            order.to_query_pair(),
        ];

        let response = self
            .client
            .get(self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    pub async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.table_url(table))
            .header("apikey", &self.api_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(&self.api_key)
            .json(&[row])
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    pub async fn delete(&self, table: &str, filter: &DataFilter) -> Result<(), GatewayError> {
        let response = self
            .client
            .delete(self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&[filter.to_query_pair()])
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<DataApiError>(&error_body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or(error_body);

    tracing::error!(code = status.as_u16(), message = %message, "Data API error");

    Err(GatewayError::Api {
        code: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SessionGateway for RestSessionGateway {
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, GatewayError> {
        self.list(
            &self.table,
            &DataFilter::eq("user_id", user_id),
            &DataOrder::desc("date"),
        )
        .await
    }

    async fn insert_session(&self, session: &NewSession) -> Result<(), GatewayError> {
        self.insert(&self.table, session).await
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), GatewayError> {
        self.delete(&self.table, &DataFilter::eq("id", id)).await
    }

    fn name(&self) -> &str {
        "rest"
    }
}

// ============================================================================
// TESTS
// ============================================================================
