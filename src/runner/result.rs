//! Outcome record of one executed or skipped step

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Request;
use crate::runner::script::ScriptResult;

/// Status of a single step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Passed,
    Failed,
    Error,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StepStatus::Running => "running",
            StepStatus::Passed => "passed",
            StepStatus::Failed => "failed",
            StepStatus::Error => "error",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Statuses that trip the stop-on-failure policy
    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed | StepStatus::Error)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a step error
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Network,
    Timeout,
    Script,
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Script => "script",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Response as returned by an `HttpSender`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
    pub time_ms: u64,
}

impl HttpResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            status_code,
            status_text: String::new(),
            headers: Vec::new(),
            body: body.into(),
            time_ms: 0,
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// One entry of `RunSession::results`.
///
/// `request` is the snapshot that was actually used: the resolved request
/// once substitution ran, the original one when the step ended earlier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestResult {
    pub request: Request,
    pub response: Option<HttpResponse>,
    pub error: Option<StepError>,
    pub status: StepStatus,
    pub pre_script_result: Option<ScriptResult>,
    pub post_script_result: Option<ScriptResult>,
    pub duration_ms: u64,
}

impl RequestResult {
    pub fn running(request: Request) -> Self {
        RequestResult {
            request,
            response: None,
            error: None,
            status: StepStatus::Running,
            pre_script_result: None,
            post_script_result: None,
            duration_ms: 0,
        }
    }

    pub fn skipped(request: Request) -> Self {
        RequestResult {
            status: StepStatus::Skipped,
            ..RequestResult::running(request)
        }
    }

    pub(crate) fn set_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.status = StepStatus::Error;
        self.error = Some(StepError {
            kind,
            message: message.into(),
        });
    }

    pub fn assertions_passed(&self) -> usize {
        self.post_script_result
            .as_ref()
            .map_or(0, |r| r.assertions.iter().filter(|a| a.passed).count())
    }

    pub fn assertions_failed(&self) -> usize {
        self.post_script_result
            .as_ref()
            .map_or(0, |r| r.assertions.iter().filter(|a| !a.passed).count())
    }
}
