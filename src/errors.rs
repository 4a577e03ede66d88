//! Error types for the collection runner

use thiserror::Error;

/// Failures that can end or prevent a run.
///
/// Per-step failures never surface through this type while a run is in
/// progress; they are recorded on the step's `RequestResult` instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No requests to run in {0}")]
    NoRequests(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Export error: {0}")]
    Export(String),
}

/// Transport failure reported by an `HttpSender`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct NetworkError {
    pub message: String,
    timed_out: bool,
}

impl NetworkError {
    /// Classifies the failure from its text, for senders that only have a message
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let timed_out = reads_like_timeout(&message);
        NetworkError { message, timed_out }
    }

    /// A failure the transport itself reported as a deadline being exceeded
    pub fn timeout(message: impl Into<String>) -> Self {
        NetworkError {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Any other transport failure, whatever its text says
    pub fn transport(message: impl Into<String>) -> Self {
        NetworkError {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }
}

fn reads_like_timeout(message: &str) -> bool {
    let text = message.to_lowercase();
    ["timeout", "timed out", "deadline"]
        .iter()
        .any(|needle| text.contains(needle))
}

/// Failure of a pre-request or post-response script
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{message}", line_prefix(.line))]
pub struct ScriptError {
    pub message: String,
    /// 1-based line of the failing statement, when known
    pub line: Option<usize>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        ScriptError {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(line: usize, message: impl Into<String>) -> Self {
        ScriptError {
            message: message.into(),
            line: Some(line),
        }
    }
}

fn line_prefix(line: &Option<usize>) -> String {
    line.map(|n| format!("line {}: ", n)).unwrap_or_default()
}
