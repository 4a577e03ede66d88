//! Network messages - communication between App and Network layers

use crate::models::{Collection, Environment, Request};
use crate::runner::{RunConfig, RunEvent};

/// Commands sent from App layer to Network layer
#[derive(Debug, Clone)]
pub enum NetworkCommand {
    /// Send a single request from the editor
    ExecuteRequest {
        id: u64,
        request: Request,
        environment: Option<Environment>,
    },
    /// Run every request under `folder_path` (empty = whole collection)
    StartRun {
        id: u64,
        collection: Collection,
        folder_path: Vec<String>,
        environment: Option<Environment>,
        config: RunConfig,
    },
    /// Cancel a run; takes effect before its next request
    CancelRun(u64),
    /// Shutdown the network actor
    Shutdown,
}

/// Responses sent from Network layer to App layer
#[derive(Debug, Clone)]
pub enum NetworkResponse {
    /// Successful HTTP response (complete)
    Success {
        id: u64,
        status: u16,
        body: String,
        time_ms: u64,
    },
    /// Error response
    Error {
        id: u64,
        message: String,
        time_ms: u64,
    },
    /// Progress of a collection run
    Run { id: u64, event: RunEvent },
}

impl NetworkResponse {
    /// Get the request or run ID from the response
    pub fn id(&self) -> u64 {
        match self {
            NetworkResponse::Success { id, .. } => *id,
            NetworkResponse::Error { id, .. } => *id,
            NetworkResponse::Run { id, .. } => *id,
        }
    }

    /// Check if this is a terminal response (no more messages expected for this id)
    pub fn is_terminal(&self) -> bool {
        match self {
            NetworkResponse::Success { .. } | NetworkResponse::Error { .. } => true,
            NetworkResponse::Run { event, .. } => {
                matches!(event, RunEvent::Finished(_) | RunEvent::Failed(_))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RunError;

    #[test]
    fn test_run_events_terminal_only_at_end() {
        let failed = NetworkResponse::Run {
            id: 4,
            event: RunEvent::Failed(RunError::NoRequests("api".into())),
        };
        assert_eq!(failed.id(), 4);
        assert!(failed.is_terminal());

        let ok = NetworkResponse::Success {
            id: 1,
            status: 200,
            body: String::new(),
            time_ms: 3,
        };
        assert!(ok.is_terminal());
    }
}
