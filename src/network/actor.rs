//! Network actor - runs single requests and collection runs in the Tokio runtime

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::messages::{NetworkCommand, NetworkResponse};
use crate::models::{Collection, Environment};
use crate::network::client::{create_client, execute_request, ReqwestSender};
use crate::runner::{prepare_run, RunConfig, RunEvent, Scheduler, ScriptRunner};
use crate::scripting::DirectiveScriptRunner;

/// Network actor that processes HTTP request and run commands
pub struct NetworkActor {
    client: reqwest::Client,
    scripts: Arc<dyn ScriptRunner>,
    response_tx: mpsc::UnboundedSender<NetworkResponse>,
    /// Finished tasks yield the id of the run they drove, if any
    active_tasks: JoinSet<Option<u64>>,
    runs: HashMap<u64, CancellationToken>,
}

impl NetworkActor {
    pub fn new(response_tx: mpsc::UnboundedSender<NetworkResponse>, timeout: Duration) -> Self {
        NetworkActor {
            client: create_client(timeout),
            scripts: Arc::new(DirectiveScriptRunner::new()),
            response_tx,
            active_tasks: JoinSet::new(),
            runs: HashMap::new(),
        }
    }

    /// Swap the script runner used by collection runs
    pub fn with_script_runner(mut self, scripts: Arc<dyn ScriptRunner>) -> Self {
        self.scripts = scripts;
        self
    }

    /// Run the network actor message loop
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<NetworkCommand>) {
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(NetworkCommand::ExecuteRequest { id, request, environment }) => {
                            let response_tx = self.response_tx.clone();
                            let client = self.client.clone();

                            self.active_tasks.spawn(async move {
                                tracing::info!(id, url = %request.url, method = ?request.method, "Executing request");
                                let result = execute_request(&client, request, environment, id).await;
                                tracing::info!(id, terminal = result.is_terminal(), "Request completed");
                                let _ = response_tx.send(result);
                                None
                            });
                        }

                        Some(NetworkCommand::StartRun { id, collection, folder_path, environment, config }) => {
                            self.start_run(id, collection, folder_path, environment, config);
                        }

                        Some(NetworkCommand::CancelRun(id)) => {
                            if let Some(token) = self.runs.get(&id) {
                                tracing::info!(id, "Cancelling run");
                                token.cancel();
                            }
                        }

                        Some(NetworkCommand::Shutdown) => {
                            for (_, token) in self.runs.drain() {
                                token.cancel();
                            }
                            break;
                        }

                        None => break,
                    }
                }

                Some(finished) = self.active_tasks.join_next() => {
                    match finished {
                        Ok(Some(run_id)) => {
                            self.runs.remove(&run_id);
                        }
                        Ok(None) => {}
                        Err(e) => tracing::error!(error = %e, "Network task failed"),
                    }
                }
            }
        }
    }

    fn start_run(
        &mut self,
        id: u64,
        collection: Collection,
        folder_path: Vec<String>,
        environment: Option<Environment>,
        config: RunConfig,
    ) {
        let (mut session, requests) =
            match prepare_run(&collection, &folder_path, environment.as_ref(), config) {
                Ok(prepared) => prepared,
                Err(e) => {
                    tracing::warn!(id, error = %e, "Run could not start");
                    let _ = self.response_tx.send(NetworkResponse::Run {
                        id,
                        event: RunEvent::Failed(e),
                    });
                    return;
                }
            };

        let token = CancellationToken::new();
        self.runs.insert(id, token.clone());

        let scheduler = Scheduler::new(
            Arc::new(ReqwestSender::new(self.client.clone())),
            self.scripts.clone(),
        )
        .with_cancel_token(token);
        let response_tx = self.response_tx.clone();

        self.active_tasks.spawn(async move {
            let report = scheduler
                .run(&mut session, &requests, |event| {
                    let _ = response_tx.send(NetworkResponse::Run { id, event });
                })
                .await;
            tracing::info!(id, summary = %report.summary(), "Run finished");
            Some(id)
        });
    }
}
