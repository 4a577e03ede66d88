//! Command handlers - business logic for processing UI events

use crate::app::state::{build_tree, RequestLocation, RunnerView, TreeRowKind};
use crate::app::AppState;
use crate::constants::DELAY_STEP_MS;
use crate::errors::RunError;
use crate::messages::ui_events::{AuthField, InputMode, Panel};
use crate::messages::{NetworkCommand, NetworkResponse};
use crate::models::{AuthType, Header, HistoryEntry, Request};
use crate::runner::{collect_requests, RunEvent};

impl AppState {
    // ========================
    // Navigation
    // ========================

    pub fn next_panel(&mut self) {
        self.active_panel = self.active_panel.next();
    }

    pub fn prev_panel(&mut self) {
        self.active_panel = self.active_panel.prev();
    }

    // ========================
    // Input editing
    // ========================

    pub fn start_editing(&mut self) {
        if self.current_input_mut().is_none() {
            return;
        }
        self.input_mode = InputMode::Editing;
        self.cursor_position = self.current_input().len();
    }

    pub fn stop_editing(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    pub fn move_cursor_left(&mut self) {
        let input = self.current_input();
        if self.cursor_position > 0 {
            let new_pos = input[..self.cursor_position]
                .char_indices()
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.cursor_position = new_pos;
        }
    }

    pub fn move_cursor_right(&mut self) {
        let input = self.current_input();
        if self.cursor_position < input.len() {
            let new_pos = input[self.cursor_position..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| self.cursor_position + i)
                .unwrap_or(input.len());
            self.cursor_position = new_pos;
        }
    }

    pub fn enter_char(&mut self, c: char) {
        let cursor_pos = self.cursor_position;
        if let Some(input) = self.current_input_mut() {
            if cursor_pos <= input.len() {
                input.insert(cursor_pos, c);
                self.cursor_position = cursor_pos + c.len_utf8();
            }
        }
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position == 0 {
            return;
        }
        let cursor_pos = self.cursor_position;
        if let Some(input) = self.current_input_mut() {
            let prev_pos = input[..cursor_pos]
                .char_indices()
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
            input.remove(prev_pos);
            self.cursor_position = prev_pos;
        }
    }

    // ========================
    // HTTP Method
    // ========================

    pub fn cycle_method(&mut self) {
        if !self.is_loading {
            self.request.method = self.request.method.next();
        }
    }

    // ========================
    // Response scrolling
    // ========================

    pub fn scroll_up(&mut self) {
        self.response_scroll = self.response_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.response_scroll = self.response_scroll.saturating_add(1);
    }

    // ========================
    // Headers
    // ========================

    pub fn next_header(&mut self) {
        if !self.request.headers.is_empty() {
            self.selected_header = (self.selected_header + 1) % self.request.headers.len();
        }
    }

    pub fn prev_header(&mut self) {
        if !self.request.headers.is_empty() {
            self.selected_header = self
                .selected_header
                .checked_sub(1)
                .unwrap_or(self.request.headers.len() - 1);
        }
    }

    pub fn toggle_header(&mut self) {
        if let Some(header) = self.request.headers.get_mut(self.selected_header) {
            header.enabled = !header.enabled;
        }
    }

    pub fn add_header(&mut self) {
        self.request.headers.push(Header::new("X-Custom", "value"));
        self.selected_header = self.request.headers.len() - 1;
    }

    pub fn delete_header(&mut self) {
        if self.selected_header < self.request.headers.len() {
            self.request.headers.remove(self.selected_header);
            if self.selected_header > 0 {
                self.selected_header -= 1;
            }
        }
    }

    // ========================
    // Auth
    // ========================

    pub fn cycle_auth(&mut self) {
        (self.request.auth, self.auth_field) = match &self.request.auth {
            AuthType::None => (AuthType::Bearer(String::new()), AuthField::Token),
            AuthType::Bearer(_) => (
                AuthType::Basic {
                    username: String::new(),
                    password: String::new(),
                },
                AuthField::Username,
            ),
            AuthType::Basic { .. } => (AuthType::None, AuthField::Token),
        };
    }

    pub fn next_auth_field(&mut self) {
        if matches!(self.request.auth, AuthType::Basic { .. }) {
            self.auth_field = match self.auth_field {
                AuthField::Username => AuthField::Password,
                _ => AuthField::Username,
            };
            self.cursor_position = self.current_input().len();
        }
    }

    // ========================
    // Scripts
    // ========================

    pub fn toggle_script_field(&mut self) {
        self.script_field = self.script_field.toggle();
    }

    // ========================
    // History
    // ========================

    pub fn history_prev(&mut self) {
        if self.storage.history_len() == 0 {
            return;
        }

        let idx = match self.history_index {
            None => 0,
            Some(i) if i + 1 < self.storage.history_len() => i + 1,
            Some(i) => i,
        };

        if let Some(entry) = self.storage.get_history(idx) {
            self.request = entry.request.clone();
            self.response = entry.response.clone();
            self.history_index = Some(idx);
            self.loaded_from = None;
            self.cursor_position = self.request.url.len();
        }
    }

    pub fn history_next(&mut self) {
        let Some(idx) = self.history_index else {
            return;
        };
        if idx > 0 {
            if let Some(entry) = self.storage.get_history(idx - 1) {
                self.request = entry.request.clone();
                self.response = entry.response.clone();
                self.history_index = Some(idx - 1);
            }
        } else {
            self.request = Request::default();
            self.history_index = None;
        }
        self.loaded_from = None;
        self.cursor_position = self.request.url.len();
    }

    // ========================
    // Collection tree
    // ========================

    pub fn tree_up(&mut self) {
        self.selected_row = self.selected_row.saturating_sub(1);
    }

    pub fn tree_down(&mut self) {
        if self.selected_row + 1 < self.tree.len() {
            self.selected_row += 1;
        }
    }

    /// Loads a request into the editor, or opens the runner for a folder
    pub fn open_tree_item(&mut self) {
        let Some(row) = self.selected_tree_row().cloned() else {
            return;
        };
        match (row.kind, row.item_index) {
            (TreeRowKind::Request, Some(index)) => {
                let request = self
                    .storage
                    .collections
                    .get(row.collection)
                    .and_then(|c| c.request_at(&row.folder_path, index))
                    .cloned();
                if let Some(request) = request {
                    self.notification = Some(format!("Loaded {}", request.name));
                    self.request = request;
                    self.cursor_position = self.request.url.len();
                    self.selected_header = 0;
                    self.history_index = None;
                    self.loaded_from = Some(RequestLocation {
                        collection: row.collection,
                        folder_path: row.folder_path,
                        index,
                    });
                }
            }
            _ => self.open_runner(),
        }
    }

    /// Writes the edited request back into its collection and saves it
    pub fn save_request(&mut self) {
        let Some(location) = self.loaded_from.clone() else {
            self.notification = Some("Load a request from the collection first".into());
            return;
        };
        let Some(collection) = self.storage.collections.get_mut(location.collection) else {
            return;
        };
        match collection.request_at_mut(&location.folder_path, location.index) {
            Some(slot) => *slot = self.request.clone(),
            None => {
                self.notification = Some("Request no longer exists".into());
                return;
            }
        }

        let collection = collection.clone();
        self.notification = Some(match self.storage.save_collection(&collection) {
            Ok(path) => format!("Saved {}", path.display()),
            Err(e) => format!("Save failed: {:#}", e),
        });
        self.tree = build_tree(&self.storage.collections);
    }

    // ========================
    // Environment
    // ========================

    pub fn cycle_environment(&mut self) {
        self.storage.cycle_environment();
        self.notification = Some(match self.storage.current_environment() {
            Some(env) => format!("Environment: {}", env.name),
            None => "No environment".to_string(),
        });
    }

    // ========================
    // Runner view
    // ========================

    /// Opens the runner for the selected folder or collection. A request
    /// row targets the folder that holds it.
    pub fn open_runner(&mut self) {
        if self.runner.is_some() {
            return;
        }
        let Some(row) = self.selected_tree_row().cloned() else {
            return;
        };
        let Some(collection) = self.storage.collections.get(row.collection) else {
            return;
        };

        let label = std::iter::once(collection.name.as_str())
            .chain(row.folder_path.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" / ");
        let (requests, error) = match collect_requests(collection, &row.folder_path) {
            Ok(requests) => (requests, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };

        self.input_mode = InputMode::Normal;
        self.runner = Some(RunnerView {
            collection: row.collection,
            folder_path: row.folder_path,
            label,
            config: self.config.run_config(),
            run_id: None,
            requests,
            session: None,
            report: None,
            error,
            selected: 0,
        });
    }

    /// Closes the runner view, cancelling a run still in flight
    pub fn close_runner(&mut self) -> Option<NetworkCommand> {
        let runner = self.runner.take()?;
        runner.run_id.map(NetworkCommand::CancelRun)
    }

    pub fn start_run(&mut self) -> Option<NetworkCommand> {
        let id = self.next_id();
        let environment = self.storage.current_environment().cloned();
        let runner = self.runner.as_mut().filter(|r| !r.is_running())?;
        let collection = self.storage.collections.get(runner.collection)?.clone();

        runner.run_id = Some(id);
        runner.session = None;
        runner.report = None;
        runner.error = None;
        runner.selected = 0;

        Some(NetworkCommand::StartRun {
            id,
            collection,
            folder_path: runner.folder_path.clone(),
            environment,
            config: runner.config,
        })
    }

    pub fn cancel_run(&mut self) -> Option<NetworkCommand> {
        let id = self.runner.as_ref()?.run_id?;
        self.notification = Some("Cancelling run...".into());
        Some(NetworkCommand::CancelRun(id))
    }

    pub fn toggle_stop_on_failure(&mut self) {
        if let Some(runner) = self.runner.as_mut().filter(|r| !r.is_running()) {
            runner.config.stop_on_failure = !runner.config.stop_on_failure;
        }
    }

    pub fn increase_delay(&mut self) {
        if let Some(runner) = self.runner.as_mut().filter(|r| !r.is_running()) {
            runner.config.delay_ms = runner.config.delay_ms.saturating_add(DELAY_STEP_MS);
        }
    }

    pub fn decrease_delay(&mut self) {
        if let Some(runner) = self.runner.as_mut().filter(|r| !r.is_running()) {
            runner.config.delay_ms = (runner.config.delay_ms - DELAY_STEP_MS).max(0);
        }
    }

    pub fn runner_up(&mut self) {
        if let Some(runner) = self.runner.as_mut() {
            runner.selected = runner.selected.saturating_sub(1);
        }
    }

    pub fn runner_down(&mut self) {
        if let Some(runner) = self.runner.as_mut() {
            if runner.selected + 1 < runner.requests.len() {
                runner.selected += 1;
            }
        }
    }

    /// Exports the finished run's report; never touches the run itself
    pub fn export_report(&mut self) {
        let report = self
            .runner
            .as_ref()
            .filter(|r| !r.is_running())
            .and_then(|r| r.report.clone());
        self.notification = Some(match report {
            Some(report) => match self.storage.export_run_report(&report) {
                Ok(path) => format!("Report saved to {}", path.display()),
                Err(e) => {
                    let err = RunError::Export(format!("{:#}", e));
                    tracing::warn!(error = %err, "Report export failed");
                    err.to_string()
                }
            },
            None => "Nothing to export yet".to_string(),
        });
    }

    fn handle_run_event(&mut self, id: u64, event: RunEvent) {
        let Some(runner) = self.runner.as_mut().filter(|r| r.run_id == Some(id)) else {
            return;
        };
        match event {
            RunEvent::Started { session, requests } => {
                runner.requests = requests;
                runner.session = Some(session);
            }
            RunEvent::StepCompleted { session, .. } => {
                runner.selected = session.results().len().saturating_sub(1);
                runner.session = Some(session);
            }
            RunEvent::Finished(report) => {
                self.notification = Some(report.summary());
                runner.report = Some(report);
                runner.run_id = None;
            }
            RunEvent::Failed(err) => {
                self.notification = Some(format!("Run failed: {}", err));
                runner.error = Some(err.to_string());
                runner.run_id = None;
            }
        }
    }

    // ========================
    // Request sending
    // ========================

    pub fn prepare_request(&mut self) -> Option<NetworkCommand> {
        if self.is_loading {
            return None;
        }

        self.is_loading = true;
        self.response.body = String::from("Loading...");
        self.response.status_code = None;

        let id = self.next_id();
        self.pending_request_id = Some(id);

        Some(NetworkCommand::ExecuteRequest {
            id,
            request: self.request.clone(),
            environment: self.storage.current_environment().cloned(),
        })
    }

    // ========================
    // Response handling
    // ========================

    pub fn handle_response(&mut self, response: NetworkResponse) {
        let is_for_pending = self.pending_request_id == Some(response.id());

        match response {
            NetworkResponse::Success {
                status,
                body,
                time_ms,
                ..
            } => {
                if is_for_pending {
                    self.response.status_code = Some(status);
                    self.response.body = body;
                    self.response.time_ms = time_ms;
                    self.finalize_request();
                }
            }
            NetworkResponse::Error {
                message, time_ms, ..
            } => {
                if is_for_pending {
                    self.response.status_code = None;
                    self.response.body = message;
                    self.response.time_ms = time_ms;
                    self.finalize_request();
                }
            }
            NetworkResponse::Run { id, event } => self.handle_run_event(id, event),
        }
    }

    // ========================
    // Help popup
    // ========================

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn close_help(&mut self) {
        self.show_help = false;
    }

    /// Finalize a completed request (add to history, reset state)
    fn finalize_request(&mut self) {
        self.is_loading = false;
        self.pending_request_id = None;
        self.response_scroll = 0;

        let entry = HistoryEntry {
            request: self.request.clone(),
            response: self.response.clone(),
            timestamp: chrono::Utc::now(),
        };
        self.storage.add_to_history(entry);
        self.history_index = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::runner::{RunConfig, RunReport, RunSession, RunStatus};
    use crate::storage::Storage;
    use tempfile::{tempdir, TempDir};

    fn state() -> (AppState, TempDir) {
        let dir = tempdir().unwrap();
        let storage = Storage::with_dir(dir.path());
        (AppState::new(storage, AppConfig::default()), dir)
    }

    fn select(state: &mut AppState, label: &str) {
        state.selected_row = state.tree.iter().position(|r| r.label == label).unwrap();
    }

    #[test]
    fn test_open_request_loads_editor() {
        let (mut state, _dir) = state();
        select(&mut state, "Fetch profile");
        state.open_tree_item();

        assert_eq!(state.request.name, "Fetch profile");
        assert_eq!(
            state.loaded_from,
            Some(RequestLocation {
                collection: 0,
                folder_path: vec!["Auth".into()],
                index: 1
            })
        );
        assert!(state.runner.is_none());
    }

    #[test]
    fn test_open_folder_previews_requests() {
        let (mut state, _dir) = state();
        select(&mut state, "Auth");
        state.open_tree_item();

        let runner = state.runner.as_ref().unwrap();
        assert_eq!(runner.label, "Sample / Auth");
        assert_eq!(runner.requests.len(), 2);
        assert!(runner.error.is_none());
    }

    #[test]
    fn test_run_lifecycle_through_events() {
        let (mut state, _dir) = state();
        select(&mut state, "Sample");
        state.open_runner();
        state.increase_delay();
        state.toggle_stop_on_failure();

        let Some(NetworkCommand::StartRun { id, folder_path, config, environment, .. }) =
            state.start_run()
        else {
            panic!("expected StartRun");
        };
        assert!(folder_path.is_empty());
        assert_eq!(config, RunConfig::new(true, DELAY_STEP_MS));
        assert!(environment.is_some());
        assert!(state.start_run().is_none(), "second start while running");

        state.increase_delay();
        assert_eq!(state.runner.as_ref().unwrap().config.delay_ms, DELAY_STEP_MS);

        let requests = state.runner.as_ref().unwrap().requests.clone();
        let mut session = RunSession::new("Sample", vec![], None, config);
        session.start(requests.len());
        state.handle_response(NetworkResponse::Run {
            id,
            event: RunEvent::Started {
                session: session.clone(),
                requests: requests.clone(),
            },
        });
        state.handle_response(NetworkResponse::Run { id: id + 100, event: RunEvent::Failed(RunError::NoRequests("x".into())) });
        assert!(state.runner.as_ref().unwrap().error.is_none());

        crate::runner::cancel_run(&mut session, &requests);
        state.handle_response(NetworkResponse::Run {
            id,
            event: RunEvent::Finished(RunReport::from_session(&session)),
        });

        let runner = state.runner.as_ref().unwrap();
        assert!(!runner.is_running());
        assert_eq!(runner.report.as_ref().unwrap().status, RunStatus::Cancelled);
        let render = state.to_render_state().runner.unwrap();
        assert_eq!(render.completed, requests.len());
        assert!(state.notification.as_deref().unwrap().starts_with("cancelled"));

        state.export_report();
        assert!(state.notification.as_deref().unwrap().starts_with("Report saved"));
    }

    #[test]
    fn test_close_runner_cancels_active_run() {
        let (mut state, _dir) = state();
        state.open_runner();
        let Some(NetworkCommand::StartRun { id, .. }) = state.start_run() else {
            panic!("expected StartRun");
        };
        assert!(matches!(state.close_runner(), Some(NetworkCommand::CancelRun(c)) if c == id));
        assert!(state.runner.is_none());
        assert!(state.close_runner().is_none());
    }

    #[test]
    fn test_delay_never_negative() {
        let (mut state, _dir) = state();
        state.open_runner();
        state.decrease_delay();
        assert_eq!(state.runner.as_ref().unwrap().config.delay_ms, 0);
    }

    #[test]
    fn test_save_request_persists_collection() {
        let (mut state, dir) = state();
        select(&mut state, "Health");
        state.open_tree_item();
        state.request.url = "https://example.test/health".into();
        state.save_request();

        assert!(state.notification.as_deref().unwrap().starts_with("Saved"));
        let reloaded = Storage::with_dir(dir.path());
        assert_eq!(
            reloaded.collections[0].request_at(&[], 2).unwrap().url,
            "https://example.test/health"
        );
    }

    #[test]
    fn test_editing_scripts_creates_script() {
        let (mut state, _dir) = state();
        state.active_panel = Panel::Scripts;
        state.toggle_script_field();
        state.start_editing();
        for c in "assert status == 200".chars() {
            state.enter_char(c);
        }
        assert_eq!(
            state.request.post_response_script.as_deref(),
            Some("assert status == 200")
        );
    }

    #[test]
    fn test_auth_none_is_not_editable() {
        let (mut state, _dir) = state();
        state.active_panel = Panel::Auth;
        state.start_editing();
        assert_eq!(state.input_mode, InputMode::Normal);
        state.cycle_auth();
        state.start_editing();
        assert_eq!(state.input_mode, InputMode::Editing);
    }
}
