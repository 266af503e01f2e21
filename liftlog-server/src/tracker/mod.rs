//! Session state-synchronization: a local view of a user's lifting sessions
//! kept consistent with the remote store, plus the projections derived from it.

pub mod chart;
pub mod controller;
pub mod exercise_index;
pub mod form;
pub mod repository;

pub use chart::{project, ChartPoint, ChartSeries};
pub use controller::{HealthReport, Outcome, TrackerError, ViewSnapshot, ViewStateController, ViewStatus};
pub use exercise_index::ExerciseIndex;
pub use form::{FormField, FormFields, SessionFormController, ValidatedEntry, ValidationError};
pub use repository::SessionRepository;
