use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// One executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

/// Result of one full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
    pub rows: usize,
    pub columns: usize,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl RunReport {
    pub(crate) fn start(rows: usize, columns: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            steps: Vec::new(),
            rows,
            columns,
            duration: Duration::ZERO,
        }
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name.as_str()).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} step(s) in {}, result {} row(s) x {} column(s)",
            self.steps.len(),
            humantime::format_duration(truncate_to_millis(self.duration)),
            self.rows,
            self.columns
        )
    }
}

/// Outcome of advancing a resumable session by one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Advanced(StepRecord),
    Complete,
}

fn truncate_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
