//! Messages exchanged between a presentation layer and the session tracker.

use serde::{Deserialize, Serialize};

use crate::models::session::SessionId;

pub const PROTOCOL_VERSION: &str = "liftlog/1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TrackerRequest {
    Ping,
    Health,
    Snapshot,
    Refresh,
    SubmitAdd,
    SubmitDelete {
        id: SessionId,
    },
    SelectExercise {
        exercise: Option<String>,
    },
    UpdateField {
        field: String,
        value: String,
    },
    AuthChanged {
        user_id: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrackerResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Machine-readable failure class, e.g. `busy` or `validation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub version: String,
}

impl TrackerResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            kind: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// An error that still carries the tracker snapshot, so a client can re-render.
    pub fn err_with(msg: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            status: "error".to_string(),
            data,
            error: Some(msg.into()),
            kind: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self::err_with(msg, None)
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
