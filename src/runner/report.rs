//! Run report - a read-only summary derived from a session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::result::{RequestResult, StepStatus};
use crate::runner::session::{RunSession, RunStatus};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub collection_name: String,
    pub folder_path: Vec<String>,
    pub status: RunStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Only known once the run has ended
    pub duration_ms: Option<u64>,
    pub total_requests: usize,
    pub results: Vec<RequestResult>,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub assertions_passed: usize,
    pub assertions_failed: usize,
}

impl RunReport {
    /// Snapshot of `session`; callable at any point of the run
    pub fn from_session(session: &RunSession) -> Self {
        let results = session.results();
        let count = |status: StepStatus| results.iter().filter(|r| r.status == status).count();

        let duration_ms = match (session.start_time(), session.end_time()) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        };

        RunReport {
            collection_name: session.collection_name().to_string(),
            folder_path: session.folder_path().to_vec(),
            status: session.status(),
            start_time: session.start_time(),
            end_time: session.end_time(),
            duration_ms,
            total_requests: session.total_requests(),
            results: results.to_vec(),
            passed: count(StepStatus::Passed),
            failed: count(StepStatus::Failed),
            errored: count(StepStatus::Error),
            skipped: count(StepStatus::Skipped),
            assertions_passed: results.iter().map(RequestResult::assertions_passed).sum(),
            assertions_failed: results.iter().map(RequestResult::assertions_failed).sum(),
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.results.len()
    }

    /// One-line summary for status bars and logs
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: {} passed, {} failed, {} errored, {} skipped",
            self.status, self.passed, self.failed, self.errored, self.skipped
        );
        if self.assertions_passed + self.assertions_failed > 0 {
            line.push_str(&format!(
                " | assertions {}/{}",
                self.assertions_passed,
                self.assertions_passed + self.assertions_failed
            ));
        }
        if let Some(ms) = self.duration_ms {
            line.push_str(&format!(" | {}ms", ms));
        }
        line
    }
}
