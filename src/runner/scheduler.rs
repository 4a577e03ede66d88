//! Scheduler - drives the step executor until the session is terminal
//!
//! Steps run strictly one after another. Cancellation is checked between
//! steps and while pacing; a request already in flight always finishes.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::RunError;
use crate::models::Request;
use crate::runner::executor::{execute_step, HttpSender, StepOutcome};
use crate::runner::millis;
use crate::runner::report::RunReport;
use crate::runner::result::{RequestResult, StepStatus};
use crate::runner::script::ScriptRunner;
use crate::runner::session::{RunSession, RunStatus};

/// What to do after a step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextAction {
    RunNow,
    RunAfter(Duration),
    Done,
}

/// Lifecycle notifications for the host
#[derive(Clone, Debug)]
pub enum RunEvent {
    Started {
        session: RunSession,
        requests: Vec<Request>,
    },
    StepCompleted {
        result: RequestResult,
        session: RunSession,
    },
    /// Completed, stopped or cancelled; the report's status says which
    Finished(RunReport),
    /// The run could not start
    Failed(RunError),
}

pub struct Scheduler {
    sender: Arc<dyn HttpSender>,
    scripts: Arc<dyn ScriptRunner>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(sender: Arc<dyn HttpSender>, scripts: Arc<dyn ScriptRunner>) -> Self {
        Scheduler {
            sender,
            scripts,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one kept by the network actor
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests cancellation; takes effect before the next step starts
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn next_action(session: &RunSession, outcome: &StepOutcome) -> NextAction {
        if outcome.is_finished() || session.is_terminal() {
            return NextAction::Done;
        }
        // Nothing left to pace: the next call only completes the session
        if session.current_index() >= session.total_requests() {
            return NextAction::RunNow;
        }
        match session.config().delay() {
            Some(delay) => NextAction::RunAfter(delay),
            None => NextAction::RunNow,
        }
    }

    /// Runs every step of `session`, reporting progress through `on_event`
    pub async fn run<F>(
        &self,
        session: &mut RunSession,
        requests: &[Request],
        mut on_event: F,
    ) -> RunReport
    where
        F: FnMut(RunEvent) + Send,
    {
        session.start(requests.len());
        info!(
            run = %session.target_label(),
            total = session.total_requests(),
            stop_on_failure = session.config().stop_on_failure,
            delay_ms = session.config().delay_ms,
            "Run started"
        );
        on_event(RunEvent::Started {
            session: session.clone(),
            requests: requests.to_vec(),
        });

        loop {
            if self.cancel.is_cancelled() {
                let report = cancel_run(session, requests);
                on_event(RunEvent::Finished(report.clone()));
                return report;
            }

            let outcome = execute_step(session, requests, &*self.sender, &*self.scripts).await;
            if let Some(result) = outcome.result() {
                on_event(RunEvent::StepCompleted {
                    result: result.clone(),
                    session: session.clone(),
                });
            }

            match Self::next_action(session, &outcome) {
                NextAction::Done => {
                    let report = match outcome {
                        StepOutcome::Finished { report, .. } => report,
                        StepOutcome::Stepped(_) => RunReport::from_session(session),
                    };
                    on_event(RunEvent::Finished(report.clone()));
                    return report;
                }
                NextAction::RunNow => {}
                NextAction::RunAfter(delay) => {
                    debug!(
                        delay_ms = millis(delay),
                        "Pacing before next request"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {}
                    }
                }
            }
        }
    }
}

/// Cancels a running session, marking unexecuted requests as skipped
pub fn cancel_run(session: &mut RunSession, requests: &[Request]) -> RunReport {
    if session.halt(RunStatus::Cancelled, requests) {
        info!(
            run = %session.target_label(),
            completed = session
                .results()
                .iter()
                .filter(|r| r.status != StepStatus::Skipped)
                .count(),
            "Run cancelled"
        );
    }
    RunReport::from_session(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NetworkError;
    use crate::runner::config::RunConfig;
    use crate::runner::executor::tests::{get, MockScripts, MockSender};
    use crate::runner::result::HttpResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Cancels the run while its `cancel_after`-th request is in flight
    struct CancellingSender {
        token: CancellationToken,
        cancel_after: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpSender for CancellingSender {
        async fn send(&self, _request: &Request) -> Result<HttpResponse, NetworkError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.cancel_after {
                self.token.cancel();
            }
            Ok(HttpResponse::new(200, "ok"))
        }
    }

    fn requests(n: usize) -> Vec<Request> {
        (0..n)
            .map(|i| get(&format!("r{}", i), &format!("http://h/{}", i)))
            .collect()
    }

    fn scheduler(sender: Arc<dyn HttpSender>) -> Scheduler {
        Scheduler::new(sender, Arc::new(MockScripts))
    }

    #[tokio::test]
    async fn test_events_follow_lifecycle() {
        let reqs = requests(3);
        let mut session = RunSession::new("col", vec![], None, RunConfig::default());
        let mut events = Vec::new();

        let report = scheduler(Arc::new(MockSender::default()))
            .run(&mut session, &reqs, |e| events.push(e))
            .await;

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], RunEvent::Started { requests, .. } if requests.len() == 3));
        for (i, event) in events[1..4].iter().enumerate() {
            let RunEvent::StepCompleted { result, session } = event else {
                panic!("expected step event");
            };
            assert_eq!(result.request.name, format!("r{}", i));
            assert_eq!(session.results().len(), i + 1);
        }
        assert!(matches!(&events[4], RunEvent::Finished(r) if r.passed == 3));
    }

    #[tokio::test]
    async fn test_cancel_after_k_steps_skips_rest() {
        let (n, k) = (5, 2);
        let reqs = requests(n);
        let token = CancellationToken::new();
        let sender = Arc::new(CancellingSender {
            token: token.clone(),
            cancel_after: k,
            calls: AtomicUsize::new(0),
        });
        let mut session = RunSession::new("col", vec![], None, RunConfig::default());

        let report = scheduler(sender.clone())
            .with_cancel_token(token)
            .run(&mut session, &reqs, |_| {})
            .await;

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(sender.calls.load(Ordering::SeqCst), k);
        assert!(report.results[..k].iter().all(|r| r.status == StepStatus::Passed));
        assert_eq!(report.skipped, n - k);
        assert_eq!(report.results.len(), n);
    }

    #[tokio::test]
    async fn test_cancel_before_first_step() {
        let reqs = requests(2);
        let mut session = RunSession::new("col", vec![], None, RunConfig::default());
        let sender = Arc::new(MockSender::default());
        let scheduler = scheduler(sender.clone());
        scheduler.cancel();

        let report = scheduler.run(&mut session, &reqs, |_| {}).await;
        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.skipped, 2);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_delay_paces_between_requests_only() {
        let reqs = requests(3);
        let mut session = RunSession::new("col", vec![], None, RunConfig::new(false, 40));
        let started = Instant::now();

        let report = scheduler(Arc::new(MockSender::default()))
            .run(&mut session, &reqs, |_| {})
            .await;

        let elapsed = started.elapsed();
        assert_eq!(report.status, RunStatus::Completed);
        assert!(elapsed >= Duration::from_millis(80), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(2_000));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_delay() {
        let reqs = requests(3);
        let token = CancellationToken::new();
        let sender = Arc::new(CancellingSender {
            token: token.clone(),
            cancel_after: 1,
            calls: AtomicUsize::new(0),
        });
        let mut session = RunSession::new("col", vec![], None, RunConfig::new(false, 60_000));

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            scheduler(sender)
                .with_cancel_token(token)
                .run(&mut session, &reqs, |_| {}),
        )
        .await
        .expect("cancellation should cut the delay short");

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!((report.passed, report.skipped), (1, 2));
    }

    #[test]
    fn test_next_action() {
        let reqs = requests(2);
        let mut session = RunSession::new("col", vec![], None, RunConfig::new(false, 250));
        session.start(2);
        let stepped = StepOutcome::Stepped(RequestResult::running(reqs[0].clone()));
        session.add_result(RequestResult::running(reqs[0].clone()));
        assert_eq!(
            Scheduler::next_action(&session, &stepped),
            NextAction::RunAfter(Duration::from_millis(250))
        );

        session.add_result(RequestResult::running(reqs[1].clone()));
        assert_eq!(Scheduler::next_action(&session, &stepped), NextAction::RunNow);

        session.complete();
        let finished = StepOutcome::Finished {
            last: None,
            report: RunReport::from_session(&session),
        };
        assert_eq!(Scheduler::next_action(&session, &finished), NextAction::Done);
    }
}
