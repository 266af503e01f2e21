use chrono::{DateTime, Utc};
use liftlog_core::Session;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: DateTime<Utc>,
    pub weight: f64,
}

/// Weight over time for one exercise, in cache order (most recent first).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChartSeries {
    points: Vec<ChartPoint>,
}

impl ChartSeries {
    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    /// X-axis labels, `YYYY-MM-DD`.
    pub fn labels(&self) -> Vec<String> {
        self.points
            .iter()
            .map(|p| p.date.format("%Y-%m-%d").to_string())
            .collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.weight).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Project the cache onto `exercise`. No selection or no match gives an empty series.
pub fn project(sessions: &[Session], exercise: Option<&str>) -> ChartSeries {
    let Some(exercise) = exercise else {
        return ChartSeries::default();
    };

    ChartSeries {
        points: sessions
            .iter()
            .filter(|s| s.exercise == exercise)
            .map(|s| ChartPoint {
                date: s.date,
                weight: s.weight,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

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

    #[test]
    fn test_projection_keeps_cache_order() {
        let cache = vec![
            session(1, "Squat", 100.0, 2),
            session(3, "Bench", 70.0, 2),
            session(2, "Squat", 90.0, 1),
        ];

        let series = project(&cache, Some("Squat"));
        assert_eq!(series.len(), 2);
        assert_eq!(series.values(), vec![100.0, 90.0]);
        assert_eq!(series.labels(), vec!["2024-01-02", "2024-01-01"]);
    }

    #[test]
    fn test_projection_count_matches_cache_for_every_exercise() {
        let cache = vec![
            session(1, "Squat", 100.0, 5),
            session(2, "Bench", 70.0, 4),
            session(3, "Squat", 95.0, 3),
            session(4, "Row", 60.0, 2),
            session(5, "Bench", 65.0, 1),
        ];
        for name in ["Squat", "Bench", "Row", "Press"] {
            let expected = cache.iter().filter(|s| s.exercise == name).count();
            assert_eq!(project(&cache, Some(name)).len(), expected, "exercise {}", name);
        }
    }

    #[test]
    fn test_no_selection_or_no_match_is_empty() {
        let cache = vec![session(1, "Squat", 100.0, 1)];
        assert!(project(&cache, None).is_empty());
        assert!(project(&cache, Some("Deadlift")).is_empty());
        assert!(project(&[], Some("Squat")).is_empty());
    }
}
