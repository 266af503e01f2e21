use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a recorded set.
pub type SessionId = i64;

/// One recorded set, as stored in `lifting_sessions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: SessionId,
    pub user_id: String,
    pub exercise: String,
    /// Kilograms.
    pub weight: f64,
    pub reps: i32,
    pub date: DateTime<Utc>,
}

/// A validated session awaiting insertion. The store assigns `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub user_id: String,
    pub exercise: String,
    pub weight: f64,
    pub reps: i32,
    pub date: DateTime<Utc>,
}

impl NewSession {
    pub fn into_session(self, id: SessionId) -> Session {
        Session {
            id,
            user_id: self.user_id,
            exercise: self.exercise,
            weight: self.weight,
            reps: self.reps,
            date: self.date,
        }
    }
}
