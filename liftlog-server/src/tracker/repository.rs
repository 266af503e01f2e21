use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use liftlog_core::{GatewayError, NewSession, Session, SessionGateway, SessionId};

/// Owns the local cache of the current user's sessions.
///
/// The cache is only ever replaced wholesale by `fetch_all` or emptied by
/// `clear`. `add` and `delete` touch the remote store alone; callers refetch
/// to observe them.
pub struct SessionRepository {
    gateway: Arc<dyn SessionGateway>,
    cache: RwLock<SessionCache>,
}

#[derive(Default)]
struct SessionCache {
    /// Bumped by `clear`; a fetch started under an older generation is dropped.
    generation: u64,
    sessions: Vec<Session>,
}

impl SessionRepository {
    pub fn new(gateway: Arc<dyn SessionGateway>) -> Self {
        Self {
            gateway,
            cache: RwLock::new(SessionCache::default()),
        }
    }

    pub fn cache(&self) -> Vec<Session> {
        self.read().sessions.clone()
    }

    pub fn backend_name(&self) -> &str {
        self.gateway.name()
    }

    /// Replace the cache with the user's sessions, most recent first.
    ///
    /// On failure the previous cache is left as it was. Returns `Ok(false)`
    /// without touching the cache when `clear` ran while the request was in
    /// flight.
    pub async fn fetch_all(&self, user_id: &str) -> Result<bool, GatewayError> {
        let generation = self.read().generation;
        let rows = self.gateway.list_sessions(user_id).await?;
        let sessions = normalize(rows, user_id);

        let mut cache = self.write();
        if cache.generation != generation {
            tracing::debug!(user_id, "Dropping fetch result for a cleared cache");
            return Ok(false);
        }
        cache.sessions = sessions;
        tracing::debug!(user_id, count = cache.sessions.len(), "Session cache replaced");
        Ok(true)
    }

    /// Count the user's sessions in the store. The cache is not touched.
    pub async fn count_remote(&self, user_id: &str) -> Result<usize, GatewayError> {
        Ok(self.gateway.list_sessions(user_id).await?.len())
    }

    pub async fn add(&self, session: &NewSession) -> Result<(), GatewayError> {
        self.gateway.insert_session(session).await
    }

    pub async fn delete(&self, id: SessionId) -> Result<(), GatewayError> {
        self.gateway.delete_session(id).await
    }

    pub fn clear(&self) {
        let mut cache = self.write();
        cache.generation += 1;
        cache.sessions.clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One entry per id, only the given user's rows, `date` descending.
fn normalize(rows: Vec<Session>, user_id: &str) -> Vec<Session> {
    let mut seen = HashSet::new();
    let mut sessions: Vec<Session> = rows
        .into_iter()
        .filter(|s| {
            if s.user_id != user_id {
                tracing::warn!(session_id = s.id, owner = %s.user_id, "Dropping session owned by another user");
                return false;
            }
            seen.insert(s.id)
        })
        .collect();
    sessions.sort_by(|a, b| b.date.cmp(&a.date));
    sessions
}
