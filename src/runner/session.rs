//! Run session - the aggregate owning a run's environment, results and status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::models::{Environment, Request};
use crate::runner::config::RunConfig;
use crate::runner::result::RequestResult;

/// Lifecycle of a run: `Pending -> Running -> {Completed, Cancelled, Stopped}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    Stopped,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Cancelled | RunStatus::Stopped
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one run.
///
/// Only the step executor, the scheduler and the cancellation path mutate a
/// session. Transitions out of a terminal status are refused, and once a
/// session is terminal its results never change.
#[derive(Clone, Debug)]
pub struct RunSession {
    collection_name: String,
    folder_path: Vec<String>,
    session_env: HashMap<String, String>,
    config: RunConfig,
    results: Vec<RequestResult>,
    current_index: usize,
    total_requests: usize,
    status: RunStatus,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl RunSession {
    /// New pending session, seeded with the environment's active variables
    pub fn new(
        collection_name: impl Into<String>,
        folder_path: Vec<String>,
        environment: Option<&Environment>,
        config: RunConfig,
    ) -> Self {
        RunSession {
            collection_name: collection_name.into(),
            folder_path,
            session_env: environment
                .map(Environment::active_variables)
                .unwrap_or_default(),
            config,
            results: Vec::new(),
            current_index: 0,
            total_requests: 0,
            status: RunStatus::Pending,
            start_time: None,
            end_time: None,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn folder_path(&self) -> &[String] {
        &self.folder_path
    }

    /// Human readable location of the run, e.g. `Sample / Auth`
    pub fn target_label(&self) -> String {
        std::iter::once(self.collection_name.as_str())
            .chain(self.folder_path.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" / ")
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn session_env(&self) -> &HashMap<String, String> {
        &self.session_env
    }

    pub fn results(&self) -> &[RequestResult] {
        &self.results
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn total_requests(&self) -> usize {
        self.total_requests
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `Pending -> Running`; returns false if the session had already started
    pub fn start(&mut self, total: usize) -> bool {
        if self.status != RunStatus::Pending {
            return false;
        }
        self.status = RunStatus::Running;
        self.total_requests = total;
        self.current_index = 0;
        self.start_time = Some(Utc::now());
        true
    }

    /// Appends a step outcome and advances the cursor.
    ///
    /// Refused once the session is terminal or every request has a result.
    pub fn add_result(&mut self, result: RequestResult) -> bool {
        if self.status != RunStatus::Running || self.results.len() >= self.total_requests {
            return false;
        }
        self.results.push(result);
        self.current_index += 1;
        true
    }

    pub fn complete(&mut self) -> bool {
        self.finish(RunStatus::Completed)
    }

    pub fn stop(&mut self) -> bool {
        self.finish(RunStatus::Stopped)
    }

    pub fn cancel(&mut self) -> bool {
        self.finish(RunStatus::Cancelled)
    }

    /// Records every not-yet-attempted request as skipped, then moves to
    /// `status`. Shared by the stop-on-failure and cancellation paths.
    pub fn halt(&mut self, status: RunStatus, requests: &[Request]) -> bool {
        if self.status != RunStatus::Running || !status.is_terminal() {
            return false;
        }
        let remaining = requests
            .iter()
            .skip(self.current_index)
            .take(self.total_requests.saturating_sub(self.current_index));
        for request in remaining {
            self.add_result(RequestResult::skipped(request.clone()));
        }
        self.finish(status)
    }

    fn finish(&mut self, status: RunStatus) -> bool {
        if self.status != RunStatus::Running {
            return false;
        }
        self.status = status;
        self.end_time = Some(Utc::now());
        true
    }

    /// Sets a session variable, returning the value it replaced
    pub fn set_session_env_variable(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.session_env.insert(name.into(), value.into())
    }

    /// Removes a session variable, returning its last value
    pub fn unset_session_env_variable(&mut self, name: &str) -> Option<String> {
        self.session_env.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpMethod;
    use crate::runner::result::StepStatus;

    fn requests(n: usize) -> Vec<Request> {
        (0..n)
            .map(|i| Request::new(format!("r{}", i), HttpMethod::GET, format!("/r/{}", i)))
            .collect()
    }

    fn running(n: usize) -> RunSession {
        let mut session = RunSession::new("col", vec![], None, RunConfig::default());
        assert!(session.start(n));
        session
    }

    #[test]
    fn test_new_session_seeds_active_variables_only() {
        let mut env = Environment::new("dev");
        env.set("base", "http://localhost");
        env.set("hidden", "x");
        env.disable("hidden");

        let session = RunSession::new("col", vec!["a".into()], Some(&env), RunConfig::default());
        assert_eq!(session.status(), RunStatus::Pending);
        assert_eq!(session.session_env().get("base").map(String::as_str), Some("http://localhost"));
        assert!(!session.session_env().contains_key("hidden"));
        assert_eq!(session.target_label(), "col / a");
    }

    #[test]
    fn test_start_only_once() {
        let mut session = running(2);
        assert_eq!(session.status(), RunStatus::Running);
        assert!(session.start_time().is_some());
        assert!(!session.start(5));
        assert_eq!(session.total_requests(), 2);
    }

    #[test]
    fn test_results_never_exceed_total() {
        let reqs = requests(2);
        let mut session = running(2);
        assert!(session.add_result(RequestResult::running(reqs[0].clone())));
        assert!(session.add_result(RequestResult::running(reqs[1].clone())));
        assert!(!session.add_result(RequestResult::running(reqs[1].clone())));
        assert_eq!(session.results().len(), 2);
        assert_eq!(session.current_index(), 2);
    }

    #[test]
    fn test_terminal_status_is_final_and_freezes_results() {
        let reqs = requests(3);
        let mut session = running(3);
        session.add_result(RequestResult::running(reqs[0].clone()));
        assert!(session.cancel());
        assert!(session.end_time().is_some());

        assert!(!session.complete());
        assert!(!session.stop());
        assert!(!session.add_result(RequestResult::running(reqs[1].clone())));
        assert_eq!(session.status(), RunStatus::Cancelled);
        assert_eq!(session.results().len(), 1);
    }

    #[test]
    fn test_pending_session_cannot_finish() {
        let mut session = RunSession::new("col", vec![], None, RunConfig::default());
        assert!(!session.complete());
        assert!(!session.halt(RunStatus::Cancelled, &requests(1)));
        assert_eq!(session.status(), RunStatus::Pending);
    }

    #[test]
    fn test_halt_skips_remaining_in_order() {
        let reqs = requests(4);
        let mut session = running(4);
        session.add_result(RequestResult::running(reqs[0].clone()));

        assert!(session.halt(RunStatus::Stopped, &reqs));
        assert_eq!(session.status(), RunStatus::Stopped);
        let names: Vec<_> = session.results().iter().map(|r| r.request.name.as_str()).collect();
        assert_eq!(names, ["r0", "r1", "r2", "r3"]);
        assert!(session.results()[1..]
            .iter()
            .all(|r| r.status == StepStatus::Skipped));
    }

    #[test]
    fn test_halt_rejects_non_terminal_target() {
        let mut session = running(1);
        assert!(!session.halt(RunStatus::Running, &requests(1)));
        assert!(session.results().is_empty());
    }

    #[test]
    fn test_env_mutation_returns_previous() {
        let mut session = running(0);
        assert_eq!(session.set_session_env_variable("k", "1"), None);
        assert_eq!(session.set_session_env_variable("k", "2"), Some("1".into()));
        assert_eq!(session.unset_session_env_variable("k"), Some("2".into()));
        assert_eq!(session.unset_session_env_variable("k"), None);
    }
}
