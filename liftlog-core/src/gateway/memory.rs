use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{GatewayError, SessionGateway};
use crate::models::session::{NewSession, Session, SessionId};

/// In-process store with the same contract as the remote backends.
///
/// Every call suspends at least once, like a real network round trip.
///
/// The public counters and `fail_*` switches, and `hold_lists`, exist for
/// driving the tracker in tests. Nothing in the server sets them, so with
/// `backend = "memory"` no call fails and no list call is parked.
pub struct MemoryGateway {
    rows: Mutex<Vec<Session>>,
    next_id: AtomicI64,
    latency: Duration,
    gate: Mutex<Option<Arc<Notify>>>,
    pub list_calls: AtomicU64,
    pub insert_calls: AtomicU64,
    pub delete_calls: AtomicU64,
    pub fail_list: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            latency: Duration::ZERO,
            gate: Mutex::new(None),
            list_calls: AtomicU64::new(0),
            insert_calls: AtomicU64::new(0),
            delete_calls: AtomicU64::new(0),
            fail_list: AtomicBool::new(false),
            fail_insert: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Replace the stored rows. Later inserts get ids above the highest seeded id.
    pub fn seed(&self, sessions: Vec<Session>) {
        let max_id = sessions.iter().map(|s| s.id).max().unwrap_or(0);
        self.next_id.store(max_id + 1, Ordering::SeqCst);
        *self.lock_rows() = sessions;
    }

    pub fn rows(&self) -> Vec<Session> {
        self.lock_rows().clone()
    }

    /// Park subsequent `list_sessions` calls until the returned handle is notified.
    pub fn hold_lists(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(notify.clone());
        notify
    }

    /// Drop the gate installed by `hold_lists`, waking any parked list call.
    pub fn release_lists(&self) {
        let gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(gate) = gate {
            gate.notify_waiters();
        }
    }

    fn lock_rows(&self) -> MutexGuard<'_, Vec<Session>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn round_trip(&self) {
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl SessionGateway for MemoryGateway {
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        let gate = self
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_list.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("list failed".to_string()));
        }

        let mut sessions: Vec<Session> = self
            .lock_rows()
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(sessions)
    }

    async fn insert_session(&self, session: &NewSession) -> Result<(), GatewayError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("insert failed".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock_rows().push(session.clone().into_session(id));
        Ok(())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), GatewayError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("delete failed".to_string()));
        }

        self.lock_rows().retain(|s| s.id != id);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn draft(user: &str, exercise: &str, day: u32) -> NewSession {
        NewSession {
            user_id: user.to_string(),
            exercise: exercise.to_string(),
            weight: 50.0,
            reps: 5,
            date: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_user_and_most_recent_first() {
        let gateway = MemoryGateway::new();
        gateway.insert_session(&draft("u1", "Squat", 1)).await.unwrap();
        gateway.insert_session(&draft("u2", "Bench", 2)).await.unwrap();
        gateway.insert_session(&draft("u1", "Row", 3)).await.unwrap();

        let sessions = gateway.list_sessions("u1").await.unwrap();
        let exercises: Vec<&str> = sessions.iter().map(|s| s.exercise.as_str()).collect();
        assert_eq!(exercises, vec!["Row", "Squat"]);
        assert_eq!(sessions[0].id, 3);
    }

    #[tokio::test]
    async fn test_seeded_ids_are_not_reused() {
        let gateway = MemoryGateway::new();
        gateway.seed(vec![draft("u1", "Squat", 1).into_session(10)]);
        gateway.insert_session(&draft("u1", "Squat", 2)).await.unwrap();

        let ids: Vec<SessionId> = gateway.rows().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_rows_untouched() {
        let gateway = MemoryGateway::new();
        gateway.seed(vec![draft("u1", "Squat", 1).into_session(1)]);
        gateway.fail_delete.store(true, Ordering::SeqCst);

        assert!(gateway.delete_session(1).await.is_err());
        assert_eq!(gateway.rows().len(), 1);
        assert_eq!(gateway.delete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_lists_unparks_later_calls() {
        let gateway = Arc::new(MemoryGateway::new());
        let _gate = gateway.hold_lists();

        let parked = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            gateway.list_sessions("u1"),
        )
        .await;
        assert!(parked.is_err(), "list should wait while the gate is held");

        gateway.release_lists();
        assert!(gateway.list_sessions("u1").await.unwrap().is_empty());
    }
}
