//! Collection runner - executes an ordered list of requests as one run
//!
//! The host prepares a session with [`prepare_run`], then either drives
//! [`execute_step`] itself or hands both to a [`Scheduler`]. Every step is
//! recorded on the session; [`RunReport`] summarises it at any time.

pub mod collect;
pub mod config;
pub mod executor;
pub mod report;
pub mod result;
pub mod scheduler;
pub mod script;
pub mod session;
pub mod substitute;

pub use collect::collect_requests;
pub use config::RunConfig;
pub use executor::{execute_step, HttpSender, StepOutcome};
pub use report::RunReport;
pub use result::{ErrorKind, HttpResponse, RequestResult, StepError, StepStatus};
pub use scheduler::{cancel_run, NextAction, RunEvent, Scheduler};
pub use script::{
    AssertionResult, EnvChange, EnvChangeKind, ScriptRequest, ScriptResponse, ScriptResult,
    ScriptRunner,
};
pub use session::{RunSession, RunStatus};
pub use substitute::{substitute, substitute_request};

use std::time::Duration;

use crate::errors::RunError;
use crate::models::{Collection, Environment, Request};

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Validates `config` and resolves the requests of a run.
///
/// Errors here are fatal to starting the run only.
pub fn prepare_run(
    collection: &Collection,
    folder_path: &[String],
    environment: Option<&Environment>,
    config: RunConfig,
) -> Result<(RunSession, Vec<Request>), RunError> {
    config.validate()?;
    let requests = collect_requests(collection, folder_path)?;
    let session = RunSession::new(
        collection.name.clone(),
        folder_path.to_vec(),
        environment,
        config,
    );
    Ok((session, requests))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionItem, HttpMethod};

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_micros(2_500)), 2);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_prepare_run_checks_config_before_requests() {
        let empty = Collection::new("empty");
        let err = prepare_run(&empty, &[], None, RunConfig::new(false, -1)).unwrap_err();
        assert!(matches!(err, RunError::Config(_)));

        let err = prepare_run(&empty, &[], None, RunConfig::default()).unwrap_err();
        assert!(matches!(err, RunError::NoRequests(_)));
    }

    #[test]
    fn test_prepare_run_builds_pending_session() {
        let col = Collection::new("api").with_item(CollectionItem::Request(Request::new(
            "ping",
            HttpMethod::GET,
            "{{base}}/ping",
        )));
        let env = Environment::sample();

        let (session, requests) =
            prepare_run(&col, &[], Some(&env), RunConfig::new(true, 10)).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(session.status(), RunStatus::Pending);
        assert_eq!(session.collection_name(), "api");
        assert!(session.session_env().contains_key("base"));
        assert!(session.config().stop_on_failure);
    }
}
