use std::collections::HashSet;

use liftlog_core::Session;
use serde::Serialize;

/// Distinct exercise names, in order of first appearance in the cache.
///
/// Rebuilt from the whole cache after each successful fetch, so an exercise
/// disappears once its last session is deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExerciseIndex {
    names: Vec<String>,
}

impl ExerciseIndex {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut index = Self::default();
        index.update(sessions);
        index
    }

    pub fn update(&mut self, sessions: &[Session]) -> &[String] {
        let mut seen = HashSet::new();
        self.names = sessions
            .iter()
            .filter(|s| seen.insert(s.exercise.as_str()))
            .map(|s| s.exercise.clone())
            .collect();
        &self.names
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, exercise: &str) -> bool {
        self.names.iter().any(|n| n == exercise)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
