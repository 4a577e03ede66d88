//! Step executor - runs exactly one request of a run per call

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::errors::NetworkError;
use crate::models::Request;
use crate::runner::millis;
use crate::runner::report::RunReport;
use crate::runner::result::{ErrorKind, HttpResponse, RequestResult, StepStatus};
use crate::runner::script::{
    apply_env_changes, apply_request_edits, ScriptErrorInfo, ScriptRequest, ScriptResponse,
    ScriptResult, ScriptRunner,
};
use crate::runner::session::{RunSession, RunStatus};
use crate::runner::substitute::{substitute_request, unresolved_placeholders};

/// Transport performing one HTTP call. No retries.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: &Request) -> Result<HttpResponse, NetworkError>;
}

/// What a call to [`execute_step`] did
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// One request ran and the run may continue
    Stepped(RequestResult),
    /// The session is terminal. `last` is the step that ended it, if any
    Finished {
        last: Option<RequestResult>,
        report: RunReport,
    },
}

impl StepOutcome {
    pub fn result(&self) -> Option<&RequestResult> {
        match self {
            StepOutcome::Stepped(result) => Some(result),
            StepOutcome::Finished { last, .. } => last.as_ref(),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, StepOutcome::Finished { .. })
    }
}

/// Runs the request at `session.current_index()`: pre-request script,
/// substitution, send, post-response script, then records the result.
///
/// Safe to call after the run has ended; it then only returns the report.
/// A pending session is started with `requests.len()` as its total.
#[instrument(skip_all, fields(run = %session.target_label(), index = session.current_index()))]
pub async fn execute_step(
    session: &mut RunSession,
    requests: &[Request],
    sender: &dyn HttpSender,
    scripts: &dyn ScriptRunner,
) -> StepOutcome {
    if session.is_terminal() {
        return finished(session, None);
    }
    if session.status() == RunStatus::Pending {
        session.start(requests.len());
    }

    let index = session.current_index();
    if index >= requests.len() || index >= session.total_requests() {
        session.complete();
        let report = RunReport::from_session(session);
        info!(summary = %report.summary(), "Run completed");
        return StepOutcome::Finished { last: None, report };
    }

    let started = Instant::now();
    let mut outgoing = requests[index].clone();
    let mut result = RequestResult::running(outgoing.clone());
    debug!(name = %outgoing.name, "Starting step");

    // Pre-request phase runs on the unsubstituted request
    if let Some(script) = script_source(&outgoing.pre_request_script) {
        let mut working = ScriptRequest::from_request(&outgoing);
        let outcome = scripts
            .execute_pre_request(&script, &mut working, session.session_env())
            .await;
        match into_script_result(outcome) {
            Ok(script_result) => {
                // Variables first: the substitution below must see them
                apply_env_changes(session, &script_result.env_changes);
                apply_request_edits(&mut outgoing, &working);
                result.pre_script_result = Some(script_result);
            }
            Err(script_result) => {
                let message = describe_script_error(script_result.error.as_ref());
                warn!(name = %outgoing.name, error = %message, "Pre-request script failed");
                result.set_error(ErrorKind::Script, format!("pre-request script: {}", message));
                result.pre_script_result = Some(script_result);
                return record(session, requests, result, started);
            }
        }
    }

    let resolved = substitute_request(&outgoing, session.session_env());
    let unresolved = unresolved_placeholders(&resolved.url, session.session_env());
    if !unresolved.is_empty() {
        warn!(name = %resolved.name, ?unresolved, "Unresolved placeholders in URL");
    }
    result.request = resolved.clone();

    let response = match sender.send(&resolved).await {
        Ok(response) => response,
        Err(err) => {
            let kind = if err.is_timeout() {
                ErrorKind::Timeout
            } else {
                ErrorKind::Network
            };
            warn!(url = %resolved.url, %kind, error = %err, "Request failed");
            result.set_error(kind, err.message);
            return record(session, requests, result, started);
        }
    };
    debug!(status = response.status_code, time_ms = response.time_ms, "Response received");

    let response_view = ScriptResponse::from_response(&response);
    result.response = Some(response);
    result.status = StepStatus::Passed;

    if let Some(script) = script_source(&resolved.post_response_script) {
        let request_view = ScriptRequest::from_request(&resolved);
        let outcome = scripts
            .execute_post_response(&script, &request_view, &response_view, session.session_env())
            .await;
        match into_script_result(outcome) {
            Ok(script_result) => {
                apply_env_changes(session, &script_result.env_changes);
                if script_result.has_failed_assertions() {
                    result.status = StepStatus::Failed;
                }
                result.post_script_result = Some(script_result);
            }
            Err(script_result) => {
                let message = describe_script_error(script_result.error.as_ref());
                warn!(name = %resolved.name, error = %message, "Post-response script failed");
                result.set_error(ErrorKind::Script, format!("post-response script: {}", message));
                result.post_script_result = Some(script_result);
            }
        }
    }

    record(session, requests, result, started)
}

/// Finalizes timing, appends the result and applies the stop-on-failure rule
fn record(
    session: &mut RunSession,
    requests: &[Request],
    mut result: RequestResult,
    started: Instant,
) -> StepOutcome {
    result.duration_ms = millis(started.elapsed());
    let status = result.status;
    info!(
        name = %result.request.name,
        %status,
        duration_ms = result.duration_ms,
        "Step finished"
    );
    session.add_result(result.clone());

    if session.config().stop_on_failure && status.is_failure() {
        session.halt(RunStatus::Stopped, requests);
        let report = RunReport::from_session(session);
        info!(summary = %report.summary(), "Run stopped on failure");
        return StepOutcome::Finished {
            last: Some(result),
            report,
        };
    }
    StepOutcome::Stepped(result)
}

fn finished(session: &RunSession, last: Option<RequestResult>) -> StepOutcome {
    StepOutcome::Finished {
        last,
        report: RunReport::from_session(session),
    }
}

fn script_source(script: &Option<String>) -> Option<String> {
    script.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

/// A result carrying an error counts as a failed script
fn into_script_result(
    outcome: Result<ScriptResult, crate::errors::ScriptError>,
) -> Result<ScriptResult, ScriptResult> {
    match outcome {
        Ok(result) if result.error.is_none() => Ok(result),
        Ok(result) => Err(result),
        Err(err) => Err(ScriptResult::from_error(&err)),
    }
}

fn describe_script_error(info: Option<&ScriptErrorInfo>) -> String {
    match info {
        Some(ScriptErrorInfo {
            message,
            line: Some(line),
        }) => format!("line {}: {}", line, message),
        Some(info) => info.message.clone(),
        None => String::from("unknown error"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::ScriptError;
    use crate::models::HttpMethod;
    use crate::runner::config::RunConfig;
    use crate::runner::script::{AssertionResult, EnvChange};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Sender answering 200 unless the URL is listed as failing
    #[derive(Default)]
    pub(crate) struct MockSender {
        pub failures: HashMap<String, String>,
        pub sent: Mutex<Vec<String>>,
    }

    impl MockSender {
        pub(crate) fn failing(url: &str, message: &str) -> Self {
            let mut sender = MockSender::default();
            sender.failures.insert(url.to_string(), message.to_string());
            sender
        }

        pub(crate) fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpSender for MockSender {
        async fn send(&self, request: &Request) -> Result<HttpResponse, NetworkError> {
            self.sent.lock().unwrap().push(request.url.clone());
            match self.failures.get(&request.url) {
                Some(message) => Err(NetworkError::new(message.clone())),
                None => Ok(HttpResponse {
                    status_code: 200,
                    status_text: "OK".into(),
                    headers: vec![],
                    body: format!("echo {}", request.url),
                    time_ms: 1,
                }),
            }
        }
    }

    /// Script runner understanding a handful of fixed commands
    pub(crate) struct MockScripts;

    #[async_trait]
    impl ScriptRunner for MockScripts {
        async fn execute_pre_request(
            &self,
            script: &str,
            request: &mut ScriptRequest,
            env: &HashMap<String, String>,
        ) -> Result<ScriptResult, ScriptError> {
            let mut result = ScriptResult::default();
            for line in script.lines() {
                match line.split_once(' ') {
                    Some(("set", rest)) => {
                        let (name, value) = rest.split_once('=').unwrap();
                        result
                            .env_changes
                            .push(EnvChange::set(name, value, env.get(name).cloned()));
                    }
                    Some(("url", url)) => request.url = url.to_string(),
                    Some(("throw", msg)) => return Err(ScriptError::at_line(1, msg)),
                    _ => {}
                }
            }
            Ok(result)
        }

        async fn execute_post_response(
            &self,
            script: &str,
            _request: &ScriptRequest,
            response: &ScriptResponse,
            _env: &HashMap<String, String>,
        ) -> Result<ScriptResult, ScriptError> {
            let mut result = ScriptResult::default();
            for line in script.lines() {
                match line.split_once(' ') {
                    Some(("expect", code)) => {
                        let expected: u16 = code.parse().unwrap();
                        result.assertions.push(if response.status_code == expected {
                            AssertionResult::pass(line)
                        } else {
                            AssertionResult::fail(line, "status mismatch")
                        });
                    }
                    Some(("set", rest)) => {
                        let (name, value) = rest.split_once('=').unwrap();
                        result.env_changes.push(EnvChange::set(name, value, None));
                    }
                    Some(("throw", msg)) => {
                        result.error = Some(ScriptErrorInfo {
                            message: msg.to_string(),
                            line: None,
                        })
                    }
                    _ => {}
                }
            }
            Ok(result)
        }
    }

    pub(crate) fn get(name: &str, url: &str) -> Request {
        Request::new(name, HttpMethod::GET, url)
    }

    fn session(stop_on_failure: bool) -> RunSession {
        RunSession::new("col", vec![], None, RunConfig::new(stop_on_failure, 0))
    }

    async fn drain(
        session: &mut RunSession,
        requests: &[Request],
        sender: &MockSender,
    ) -> RunReport {
        loop {
            if let StepOutcome::Finished { report, .. } =
                execute_step(session, requests, sender, &MockScripts).await
            {
                return report;
            }
        }
    }

    #[tokio::test]
    async fn test_three_successful_requests_complete() {
        let requests = vec![get("a", "http://h/a"), get("b", "http://h/b"), get("c", "http://h/c")];
        let sender = MockSender::default();
        let mut session = session(false);

        let report = drain(&mut session, &requests, &sender).await;
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(
            (report.passed, report.failed, report.errored, report.skipped),
            (3, 0, 0, 0)
        );
        assert_eq!(sender.sent(), ["http://h/a", "http://h/b", "http://h/c"]);
    }

    #[tokio::test]
    async fn test_network_failure_stops_run() {
        let requests = vec![get("a", "http://h/a"), get("b", "http://h/b"), get("c", "http://h/c")];
        let sender = MockSender::failing("http://h/b", "Connection failed: refused");
        let mut session = session(true);

        let first = execute_step(&mut session, &requests, &sender, &MockScripts).await;
        assert!(matches!(first, StepOutcome::Stepped(_)));
        let second = execute_step(&mut session, &requests, &sender, &MockScripts).await;
        let StepOutcome::Finished { last, report } = second else {
            panic!("expected the run to stop");
        };

        let last = last.unwrap();
        assert_eq!(last.status, StepStatus::Error);
        assert_eq!(last.error.unwrap().kind, ErrorKind::Network);
        assert_eq!(report.status, RunStatus::Stopped);
        assert_eq!(
            (report.passed, report.failed, report.errored, report.skipped),
            (1, 0, 1, 1)
        );
        assert_eq!(sender.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_without_stop_keeps_going() {
        let requests = vec![get("a", "http://h/a"), get("b", "http://h/b")];
        let sender = MockSender::failing("http://h/a", "Request timed out (30s)");
        let mut session = session(false);

        let report = drain(&mut session, &requests, &sender).await;
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.results[0].error.as_ref().unwrap().kind, ErrorKind::Timeout);
        assert_eq!(report.results[1].status, StepStatus::Passed);
    }

    #[tokio::test]
    async fn test_stop_on_failure_skips_rest_in_order() {
        let n = 5;
        let k = 2;
        let requests: Vec<_> = (0..n)
            .map(|i| get(&format!("r{}", i), &format!("http://h/{}", i)))
            .collect();
        let sender = MockSender::failing(&format!("http://h/{}", k), "boom");
        let mut session = session(true);

        let report = drain(&mut session, &requests, &sender).await;
        assert_eq!(report.status, RunStatus::Stopped);
        assert_eq!(report.results.len(), n);
        assert!(report.results[..k].iter().all(|r| r.status == StepStatus::Passed));
        assert_eq!(report.results[k].status, StepStatus::Error);
        assert!(report.results[k + 1..].iter().all(|r| r.status == StepStatus::Skipped));
        let names: Vec<_> = report.results.iter().map(|r| r.request.name.clone()).collect();
        assert_eq!(names, ["r0", "r1", "r2", "r3", "r4"]);
    }

    #[tokio::test]
    async fn test_pre_script_variables_visible_to_same_step() {
        let request = get("a", "{{base}}/x?auth={{token}}")
            .with_pre_request_script("set token=abc");
        let mut env = crate::models::Environment::new("e");
        env.set("base", "http://h");
        let mut session = RunSession::new("col", vec![], Some(&env), RunConfig::default());
        let sender = MockSender::default();

        let outcome = execute_step(&mut session, &[request.clone()], &sender, &MockScripts).await;
        let result = outcome.result().unwrap();
        assert!(result.request.url.contains("auth=abc"));
        assert_eq!(sender.sent(), ["http://h/x?auth=abc"]);
        assert_eq!(session.session_env()["token"], "abc");
    }

    #[tokio::test]
    async fn test_pre_script_url_edit_is_substituted() {
        let request = get("a", "http://ignored").with_pre_request_script("set id=9\nurl http://h/{{id}}");
        let sender = MockSender::default();
        let mut session = session(false);

        execute_step(&mut session, &[request], &sender, &MockScripts).await;
        assert_eq!(sender.sent(), ["http://h/9"]);
    }

    #[tokio::test]
    async fn test_pre_script_error_skips_send() {
        let requests = vec![
            get("a", "{{base}}/a").with_pre_request_script("throw kaput"),
            get("b", "http://h/b"),
        ];
        let sender = MockSender::default();
        let mut session = session(true);

        let outcome = execute_step(&mut session, &requests, &sender, &MockScripts).await;
        let StepOutcome::Finished { last, report } = outcome else {
            panic!("expected stop");
        };
        let last = last.unwrap();
        assert_eq!(last.error.as_ref().unwrap().kind, ErrorKind::Script);
        assert!(last.error.unwrap().message.contains("line 1: kaput"));
        assert_eq!(last.request.url, "{{base}}/a");
        assert!(last.pre_script_result.unwrap().error.is_some());
        assert!(sender.sent().is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_failed_assertion_marks_step_failed() {
        let requests = vec![
            get("a", "http://h/a").with_post_response_script("expect 200\nexpect 201\nset seen=1"),
            get("b", "http://h/b"),
        ];
        let sender = MockSender::default();
        let mut session = session(true);

        let outcome = execute_step(&mut session, &requests, &sender, &MockScripts).await;
        let StepOutcome::Finished { report, .. } = outcome else {
            panic!("failed assertion should stop the run");
        };
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!((report.assertions_passed, report.assertions_failed), (1, 1));
        assert_eq!(session.session_env()["seen"], "1");
    }

    #[tokio::test]
    async fn test_post_script_error_keeps_response() {
        let requests = vec![get("a", "http://h/a").with_post_response_script("set x=1\nthrow bad")];
        let sender = MockSender::default();
        let mut session = session(false);

        let outcome = execute_step(&mut session, &requests, &sender, &MockScripts).await;
        let result = outcome.result().unwrap();
        assert_eq!(result.status, StepStatus::Error);
        assert_eq!(result.error.as_ref().unwrap().kind, ErrorKind::Script);
        assert_eq!(result.response.as_ref().unwrap().status_code, 200);
        assert!(!session.session_env().contains_key("x"));
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_calls_after_terminal_are_idempotent() {
        let requests = vec![get("a", "http://h/a")];
        let sender = MockSender::default();
        let mut session = session(false);

        let report = drain(&mut session, &requests, &sender).await;
        let again = execute_step(&mut session, &requests, &sender, &MockScripts).await;
        assert_eq!(
            again,
            StepOutcome::Finished {
                last: None,
                report: report.clone()
            }
        );
        assert_eq!(session.results().len(), 1);
        assert_eq!(sender.sent().len(), 1);
    }
}
