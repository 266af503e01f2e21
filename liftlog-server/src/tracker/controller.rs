//! View-state controller for the lifting-session screen.
//!
//! Sequences fetch/add/delete against the repository and exposes an
//! `Idle`/`Loading`/`Error` status to the presentation layer. Only one
//! remote operation may be outstanding: requests made while `Loading` are
//! rejected with `TrackerError::Busy`. Each operation carries a request
//! token; completions whose token is no longer current (the identity
//! changed while they were in flight) are discarded. An operation whose
//! future is dropped before it settles leaves the controller in `Error`,
//! never stuck in `Loading`.
//!
//! The session cache lives in `SessionRepository`; the exercise index and
//! chart are derived from it whenever a snapshot is taken.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use liftlog_core::{GatewayError, Session, SessionGateway, SessionId};
use serde::Serialize;
use thiserror::Error;

use super::chart::{project, ChartSeries};
use super::exercise_index::ExerciseIndex;
use super::form::{FormField, FormFields, SessionFormController, ValidatedEntry, ValidationError};
use super::repository::SessionRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ViewStatus {
    Idle,
    Loading,
    Error(String),
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Remote store error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("no authenticated user")]
    IdentityMissing,

    #[error("another request is still in progress")]
    Busy,

    #[error("unknown form field: {0}")]
    UnknownField(String),
}

impl TrackerError {
    /// Stable name used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackerError::Validation(_) => "validation",
            TrackerError::Gateway(_) => "gateway",
            TrackerError::IdentityMissing => "identity_missing",
            TrackerError::Busy => "busy",
            TrackerError::UnknownField(_) => "unknown_field",
        }
    }
}

/// How a controller operation resolved.
#[derive(Debug)]
pub enum Outcome {
    /// Finished successfully; the controller is `Idle`.
    Settled,
    /// Refused before any remote call; status unchanged.
    Rejected(TrackerError),
    /// Failed; the controller is in `Error`.
    Failed(TrackerError),
    /// The identity changed while in flight; the completion was discarded.
    Superseded,
}

impl Outcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, Outcome::Settled)
    }

    pub fn error(&self) -> Option<&TrackerError> {
        match self {
            Outcome::Rejected(e) | Outcome::Failed(e) => Some(e),
            Outcome::Settled | Outcome::Superseded => None,
        }
    }
}

/// Everything the presentation layer renders from.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub user_id: Option<String>,
    pub status: ViewStatus,
    pub sessions: Vec<Session>,
    pub exercise_index: ExerciseIndex,
    pub selected_exercise: Option<String>,
    pub chart_series: ChartSeries,
    pub chart_labels: Vec<String>,
    pub chart_values: Vec<f64>,
    pub form: FormFields,
    pub validation_error: Option<ValidationError>,
    pub notice: Option<String>,
    pub can_submit: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub backend: String,
    pub reachable: bool,
    pub sessions: Option<usize>,
    pub error: Option<String>,
}

struct ViewState {
    user_id: Option<String>,
    status: ViewStatus,
    token: u64,
    selected: Option<String>,
    form: SessionFormController,
    validation_error: Option<ValidationError>,
    notice: Option<String>,
}

impl ViewState {
    fn new(user_id: Option<String>) -> Self {
        Self {
            user_id,
            status: ViewStatus::Idle,
            token: 0,
            selected: None,
            form: SessionFormController::new(),
            validation_error: None,
            notice: None,
        }
    }
}

/// An admitted operation. Dropping it while its token is still current and
/// the status is still `Loading` means the operation never settled; the
/// status then moves to `Error` so the next request is admitted.
struct Ticket<'a> {
    token: u64,
    user_id: String,
    state: &'a Mutex<ViewState>,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.token == self.token && state.status == ViewStatus::Loading {
            tracing::warn!(token = self.token, "Request cancelled before it settled");
            state.status = ViewStatus::Error(CANCELLED.to_string());
        }
    }
}

const CANCELLED: &str = "request cancelled before it completed";

pub struct ViewStateController {
    state: Mutex<ViewState>,
    repository: SessionRepository,
}

impl ViewStateController {
    /// Start `Idle` with an empty cache for a known user.
    pub fn new(
        gateway: Arc<dyn SessionGateway>,
        user_id: impl Into<String>,
    ) -> Result<Self, TrackerError> {
        let user_id = non_blank(Some(user_id.into())).ok_or(TrackerError::IdentityMissing)?;
        Ok(Self {
            state: Mutex::new(ViewState::new(Some(user_id))),
            repository: SessionRepository::new(gateway),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ViewStatus {
        self.lock_state().status.clone()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let state = self.lock_state();
        let sessions = self.repository.cache();
        let chart = project(&sessions, state.selected.as_deref());
        ViewSnapshot {
            user_id: state.user_id.clone(),
            status: state.status.clone(),
            exercise_index: ExerciseIndex::from_sessions(&sessions),
            selected_exercise: state.selected.clone(),
            chart_labels: chart.labels(),
            chart_values: chart.values(),
            chart_series: chart,
            sessions,
            form: state.form.fields().clone(),
            validation_error: state.validation_error,
            notice: state.notice.clone(),
            can_submit: state.user_id.is_some()
                && state.status != ViewStatus::Loading
                && state.form.is_complete(),
        }
    }

    // ------------------------------------------------------------------
    // Remote operations
    // ------------------------------------------------------------------

    /// Refetch the user's sessions.
    pub async fn refresh(&self) -> Outcome {
        let (ticket, ()) = match self.begin(|_| Ok(())) {
            Ok(admitted) => admitted,
            Err(outcome) => return outcome,
        };

        self.refetch(&ticket).await
    }

    /// Validate the form, insert the session, then refetch.
    pub async fn submit_add(&self) -> Outcome {
        let (ticket, entry) = match self.begin(validate_form) {
            Ok(admitted) => admitted,
            Err(outcome) => return outcome,
        };

        let draft = entry.into_new_session(ticket.user_id.clone(), Utc::now());

        if let Err(e) = self.repository.add(&draft).await {
            return self.fail(ticket.token, e.into());
        }

        tracing::info!(user_id = %ticket.user_id, exercise = %draft.exercise, "Lifting session added");
        let current = self.with_current(ticket.token, |state| {
            state.form.clear();
            state.notice = Some("Lifting session added".to_string());
        });
        if !current {
            return Outcome::Superseded;
        }

        self.refetch(&ticket).await
    }

    /// Delete a session by id, then refetch.
    pub async fn submit_delete(&self, id: SessionId) -> Outcome {
        let (ticket, ()) = match self.begin(|_| Ok(())) {
            Ok(admitted) => admitted,
            Err(outcome) => return outcome,
        };

        if let Err(e) = self.repository.delete(id).await {
            return self.fail(ticket.token, e.into());
        }

        tracing::info!(user_id = %ticket.user_id, session_id = id, "Lifting session deleted");
        let current = self.with_current(ticket.token, |state| {
            state.notice = Some("Lifting session deleted".to_string());
        });
        if !current {
            return Outcome::Superseded;
        }

        self.refetch(&ticket).await
    }

    // ------------------------------------------------------------------
    // Local operations
    // ------------------------------------------------------------------

    /// The chart follows the selection on the next snapshot.
    pub fn select_exercise(&self, exercise: Option<String>) {
        self.lock_state().selected = non_blank(exercise);
    }

    /// Edit one form field. Refused with `Busy` while a request is in flight,
    /// so a pending add never clears input typed after it was submitted.
    pub fn update_field(&self, field: &str, value: impl Into<String>) -> Result<(), TrackerError> {
        let field: FormField = field.parse().map_err(TrackerError::UnknownField)?;
        let mut state = self.lock_state();
        if state.status == ViewStatus::Loading {
            return Err(TrackerError::Busy);
        }
        state.form.update(field, value);
        state.validation_error = None;
        Ok(())
    }

    /// Switch identity. In-flight work for the previous user is discarded and
    /// all per-user state is reset. `None` signs out.
    pub fn on_auth_change(&self, user_id: Option<String>) {
        let user_id = non_blank(user_id);
        let mut state = self.lock_state();
        let token = state.token + 1;
        *state = ViewState::new(user_id.clone());
        state.token = token;
        self.repository.clear();
        tracing::info!(user_id = ?user_id, "Identity changed");
    }

    /// Check the store is reachable for the current user without touching the cache.
    pub async fn health(&self) -> HealthReport {
        let backend = self.repository.backend_name().to_string();
        let user_id = self.lock_state().user_id.clone();
        let Some(user_id) = user_id else {
            return HealthReport {
                backend,
                reachable: false,
                sessions: None,
                error: Some(TrackerError::IdentityMissing.to_string()),
            };
        };

        match self.repository.count_remote(&user_id).await {
            Ok(count) => HealthReport {
                backend,
                reachable: true,
                sessions: Some(count),
                error: None,
            },
            Err(e) => HealthReport {
                backend,
                reachable: false,
                sessions: None,
                error: Some(e.to_string()),
            },
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Admit an operation: identity, single-flight, then `admit` (e.g. form
    /// validation). On success the controller is `Loading` under a fresh token.
    fn begin<T>(
        &self,
        admit: impl FnOnce(&mut ViewState) -> Result<T, TrackerError>,
    ) -> Result<(Ticket<'_>, T), Outcome> {
        let mut state = self.lock_state();

        let Some(user_id) = state.user_id.clone() else {
            state.status = ViewStatus::Error(TrackerError::IdentityMissing.to_string());
            tracing::error!("Operation attempted without an authenticated user");
            return Err(Outcome::Failed(TrackerError::IdentityMissing));
        };

        if state.status == ViewStatus::Loading {
            tracing::warn!(user_id = %user_id, "Rejecting request while another is in flight");
            return Err(Outcome::Rejected(TrackerError::Busy));
        }

        let admitted = admit(&mut *state).map_err(Outcome::Rejected)?;

        state.validation_error = None;
        state.notice = None;
        state.status = ViewStatus::Loading;
        state.token += 1;
        tracing::debug!(token = state.token, "Status -> loading");

        Ok((
            Ticket {
                token: state.token,
                user_id,
                state: &self.state,
            },
            admitted,
        ))
    }

    async fn refetch(&self, ticket: &Ticket<'_>) -> Outcome {
        if let Err(e) = self.repository.fetch_all(&ticket.user_id).await {
            return self.fail(ticket.token, e.into());
        }

        let mut state = self.lock_state();
        if state.token != ticket.token {
            tracing::debug!(token = ticket.token, "Discarding superseded fetch");
            return Outcome::Superseded;
        }
        state.status = ViewStatus::Idle;
        tracing::debug!(token = ticket.token, "Status -> idle");
        Outcome::Settled
    }

    fn fail(&self, token: u64, error: TrackerError) -> Outcome {
        let mut state = self.lock_state();
        if state.token != token {
            return Outcome::Superseded;
        }
        tracing::error!(error = %error, "Remote operation failed");
        state.status = ViewStatus::Error(error.to_string());
        Outcome::Failed(error)
    }

    fn with_current(&self, token: u64, f: impl FnOnce(&mut ViewState)) -> bool {
        let mut state = self.lock_state();
        if state.token != token {
            return false;
        }
        f(&mut *state);
        true
    }
}

fn validate_form(state: &mut ViewState) -> Result<ValidatedEntry, TrackerError> {
    state.form.validate().map_err(|e| {
        tracing::debug!(error = %e, "Form validation failed");
        state.validation_error = Some(e);
        TrackerError::Validation(e)
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use liftlog_core::MemoryGateway;
    use std::sync::atomic::Ordering;

    fn session(id: i64, exercise: &str, weight: f64, day: u32) -> Session {
        Session {
            id,
            user_id: "u1".to_string(),
            exercise: exercise.to_string(),
            weight,
            reps: 5,
            date: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        }
    }

    fn controller(gateway: &Arc<MemoryGateway>) -> ViewStateController {
        ViewStateController::new(gateway.clone(), "u1").unwrap()
    }

    #[test]
    fn test_blank_identity_is_refused() {
        let gateway: Arc<dyn SessionGateway> = Arc::new(MemoryGateway::new());
        assert!(matches!(
            ViewStateController::new(gateway, "  "),
            Err(TrackerError::IdentityMissing)
        ));
    }

    #[test]
    fn test_initial_state_is_idle_and_empty() {
        let gateway = Arc::new(MemoryGateway::new());
        let snap = controller(&gateway).snapshot();
        assert_eq!(snap.status, ViewStatus::Idle);
        assert!(snap.sessions.is_empty());
        assert!(snap.exercise_index.is_empty());
        assert!(!snap.can_submit);
        assert_eq!(gateway.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_populates_cache_and_derivations() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.seed(vec![session(2, "Squat", 90.0, 1), session(1, "Squat", 100.0, 2)]);
        let ctl = controller(&gateway);

        assert!(ctl.refresh().await.is_settled());
        ctl.select_exercise(Some("Squat".to_string()));

        let snap = ctl.snapshot();
        assert_eq!(snap.status, ViewStatus::Idle);
        assert_eq!(snap.sessions.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(snap.exercise_index.names(), ["Squat"]);
        assert_eq!(snap.chart_values, vec![100.0, 90.0]);
        assert_eq!(snap.chart_labels, vec!["2024-01-02", "2024-01-01"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cache_and_reports_error() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.seed(vec![session(1, "Squat", 100.0, 1)]);
        let ctl = controller(&gateway);
        ctl.refresh().await;

        gateway.fail_list.store(true, Ordering::SeqCst);
        let outcome = ctl.refresh().await;

        assert!(matches!(outcome, Outcome::Failed(TrackerError::Gateway(_))));
        let snap = ctl.snapshot();
        assert!(matches!(snap.status, ViewStatus::Error(_)));
        assert_eq!(snap.sessions.len(), 1);
        assert_eq!(snap.exercise_index.names(), ["Squat"]);
    }

    #[tokio::test]
    async fn test_error_state_accepts_next_request() {
        let gateway = Arc::new(MemoryGateway::new());
        let ctl = controller(&gateway);
        gateway.fail_list.store(true, Ordering::SeqCst);
        ctl.refresh().await;
        assert!(matches!(ctl.status(), ViewStatus::Error(_)));

        gateway.fail_list.store(false, Ordering::SeqCst);
        assert!(ctl.refresh().await.is_settled());
        assert_eq!(ctl.status(), ViewStatus::Idle);
    }

    #[tokio::test]
    async fn test_unknown_field_is_rejected() {
        let gateway = Arc::new(MemoryGateway::new());
        let ctl = controller(&gateway);
        assert!(matches!(
            ctl.update_field("sets", "3"),
            Err(TrackerError::UnknownField(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_out_makes_operations_fail_without_remote_calls() {
        let gateway = Arc::new(MemoryGateway::new());
        let ctl = controller(&gateway);
        ctl.on_auth_change(None);

        let outcome = ctl.refresh().await;
        assert!(matches!(outcome, Outcome::Failed(TrackerError::IdentityMissing)));
        assert_eq!(
            ctl.status(),
            ViewStatus::Error("no authenticated user".to_string())
        );
        assert_eq!(gateway.list_calls.load(Ordering::SeqCst), 0);

        let report = ctl.health().await;
        assert!(!report.reachable);
    }

    #[tokio::test]
    async fn test_selection_survives_refresh_and_tracks_cache() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.seed(vec![session(1, "Squat", 100.0, 1)]);
        let ctl = controller(&gateway);
        ctl.select_exercise(Some("Squat".to_string()));
        assert!(ctl.snapshot().chart_series.is_empty());

        ctl.refresh().await;
        assert_eq!(ctl.snapshot().chart_series.len(), 1);

        ctl.select_exercise(Some("Deadlift".to_string()));
        let snap = ctl.snapshot();
        assert_eq!(snap.selected_exercise.as_deref(), Some("Deadlift"));
        assert!(snap.chart_series.is_empty());
    }

    #[test]
    fn test_status_serializes_with_message() {
        let json = serde_json::to_value(ViewStatus::Error("boom".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"state": "error", "message": "boom"}));
        let json = serde_json::to_value(ViewStatus::Idle).unwrap();
        assert_eq!(json, serde_json::json!({"state": "idle"}));
    }

    #[tokio::test]
    async fn test_dropped_operation_does_not_leave_loading() {
        let gateway = Arc::new(MemoryGateway::new());
        let _gate = gateway.hold_lists();
        let ctl = controller(&gateway);

        let held = tokio::time::timeout(std::time::Duration::from_millis(20), ctl.refresh()).await;
        assert!(held.is_err(), "refresh should still be parked");
        assert_eq!(ctl.status(), ViewStatus::Error(CANCELLED.to_string()));

        gateway.release_lists();
        assert!(ctl.refresh().await.is_settled());
        assert_eq!(ctl.status(), ViewStatus::Idle);
    }

    #[tokio::test]
    async fn test_form_is_read_only_while_loading() {
        let gateway = Arc::new(MemoryGateway::new());
        let gate = gateway.hold_lists();
        let ctl = controller(&gateway);

        let (outcome, edit) = tokio::join!(ctl.refresh(), async {
            tokio::task::yield_now().await;
            let edit = ctl.update_field("exercise", "Bench");
            gate.notify_one();
            edit
        });

        assert!(outcome.is_settled());
        assert!(matches!(edit, Err(TrackerError::Busy)));
        assert_eq!(ctl.snapshot().form.exercise, "");
        ctl.update_field("exercise", "Bench").unwrap();
        assert_eq!(ctl.snapshot().form.exercise, "Bench");
    }

    #[tokio::test]
    async fn test_snapshot_derives_from_repository_cache() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.seed(vec![session(1, "Squat", 100.0, 2), session(2, "Bench", 70.0, 1)]);
        let ctl = controller(&gateway);
        ctl.refresh().await;
        ctl.select_exercise(Some("Bench".to_string()));

        let snap = ctl.snapshot();
        assert_eq!(snap.sessions, ctl.repository.cache());
        assert_eq!(snap.exercise_index.names(), ["Squat", "Bench"]);
        assert_eq!(snap.chart_values, vec![70.0]);

        ctl.on_auth_change(Some("u2".to_string()));
        assert!(ctl.repository.cache().is_empty());
        assert!(ctl.snapshot().exercise_index.is_empty());
    }
}
