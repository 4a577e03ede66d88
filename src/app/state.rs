//! App state - pure data structure with no I/O logic

use crate::config::AppConfig;
use crate::messages::render::{RunRow, RunnerRender};
use crate::messages::ui_events::{AuthField, InputMode, Overlay, Panel, ScriptField};
use crate::messages::RenderState;
use crate::models::{AuthType, Collection, CollectionItem, HttpMethod, Request, Response};
use crate::runner::{RequestResult, RunConfig, RunReport, RunSession};
use crate::storage::Storage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeRowKind {
    Collection,
    Folder,
    Request,
}

/// A visible line of the collection tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeRow {
    pub kind: TreeRowKind,
    pub depth: usize,
    pub label: String,
    pub method: Option<HttpMethod>,
    pub collection: usize,
    /// Path of the folder itself, or of the folder holding the request
    pub folder_path: Vec<String>,
    /// Position of a request inside its folder
    pub item_index: Option<usize>,
}

/// Flattens every collection into display rows, folders always expanded
pub fn build_tree(collections: &[Collection]) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    for (ci, collection) in collections.iter().enumerate() {
        rows.push(TreeRow {
            kind: TreeRowKind::Collection,
            depth: 0,
            label: collection.name.clone(),
            method: None,
            collection: ci,
            folder_path: Vec::new(),
            item_index: None,
        });
        push_items(&collection.items, ci, &mut Vec::new(), 1, &mut rows);
    }
    rows
}

fn push_items(
    items: &[CollectionItem],
    collection: usize,
    path: &mut Vec<String>,
    depth: usize,
    rows: &mut Vec<TreeRow>,
) {
    for (index, item) in items.iter().enumerate() {
        match item {
            CollectionItem::Request(request) => rows.push(TreeRow {
                kind: TreeRowKind::Request,
                depth,
                label: request.name.clone(),
                method: Some(request.method.clone()),
                collection,
                folder_path: path.clone(),
                item_index: Some(index),
            }),
            CollectionItem::Folder(folder) => {
                path.push(folder.name.clone());
                rows.push(TreeRow {
                    kind: TreeRowKind::Folder,
                    depth,
                    label: folder.name.clone(),
                    method: None,
                    collection,
                    folder_path: path.clone(),
                    item_index: None,
                });
                push_items(&folder.items, collection, path, depth + 1, rows);
                path.pop();
            }
        }
    }
}

/// Where the request in the editor was loaded from
#[derive(Clone, Debug, PartialEq)]
pub struct RequestLocation {
    pub collection: usize,
    pub folder_path: Vec<String>,
    pub index: usize,
}

/// Runner view for one collection or folder
#[derive(Clone, Debug)]
pub struct RunnerView {
    pub collection: usize,
    pub folder_path: Vec<String>,
    pub label: String,
    pub config: RunConfig,
    /// Set while a run is in flight
    pub run_id: Option<u64>,
    pub requests: Vec<Request>,
    pub session: Option<RunSession>,
    pub report: Option<RunReport>,
    pub error: Option<String>,
    pub selected: usize,
}

impl RunnerView {
    pub fn is_running(&self) -> bool {
        self.run_id.is_some()
    }

    /// Final report once finished, otherwise a snapshot of the live session
    pub fn current_report(&self) -> Option<RunReport> {
        self.report
            .clone()
            .or_else(|| self.session.as_ref().map(RunReport::from_session))
    }

    fn to_render(&self) -> RunnerRender {
        let report = self.current_report();
        let results: &[RequestResult] = report.as_ref().map_or(&[], |r| r.results.as_slice());

        let rows = self
            .requests
            .iter()
            .enumerate()
            .map(|(i, request)| match results.get(i) {
                Some(result) => RunRow {
                    name: request.name.clone(),
                    method: request.method.clone(),
                    status: Some(result.status),
                    status_code: result.response.as_ref().map(|r| r.status_code),
                    time_ms: result.response.as_ref().map(|r| r.time_ms),
                    note: step_note(result),
                },
                None => RunRow {
                    name: request.name.clone(),
                    method: request.method.clone(),
                    status: None,
                    status_code: None,
                    time_ms: None,
                    note: String::new(),
                },
            })
            .collect();

        RunnerRender {
            label: self.label.clone(),
            stop_on_failure: self.config.stop_on_failure,
            delay_ms: self.config.delay_ms,
            running: self.is_running(),
            status: report.as_ref().map(|r| r.status),
            completed: results.len(),
            total: self.requests.len(),
            rows,
            selected: self.selected,
            detail: results.get(self.selected).map(step_detail).unwrap_or_default(),
            summary: report.as_ref().map(RunReport::summary),
            error: self.error.clone(),
        }
    }
}

fn step_note(result: &RequestResult) -> String {
    if let Some(error) = &result.error {
        return format!("{}: {}", error.kind, error.message);
    }
    let (passed, failed) = (result.assertions_passed(), result.assertions_failed());
    if passed + failed > 0 {
        format!("{}/{} assertions", passed, passed + failed)
    } else {
        String::new()
    }
}

fn step_detail(result: &RequestResult) -> Vec<String> {
    let mut lines = vec![format!("{} {}", result.request.method.as_str(), result.request.url)];
    if let Some(error) = &result.error {
        lines.push(format!("error ({}): {}", error.kind, error.message));
    }
    let scripts = [
        ("pre", result.pre_script_result.as_ref()),
        ("post", result.post_script_result.as_ref()),
    ];
    for (phase, script) in scripts {
        let Some(script) = script else { continue };
        for line in &script.console_output {
            lines.push(format!("[{}] {}", phase, line));
        }
        for assertion in &script.assertions {
            let mark = if assertion.passed { "✓" } else { "✗" };
            match &assertion.message {
                Some(message) => lines.push(format!("{} {} ({})", mark, assertion.name, message)),
                None => lines.push(format!("{} {}", mark, assertion.name)),
            }
        }
        for change in &script.env_changes {
            lines.push(format!("[{}] {:?} {}", phase, change.kind, change.name));
        }
    }
    lines
}

/// Main application state - pure data, no I/O
pub struct AppState {
    // HTTP Request data
    pub request: Request,
    pub loaded_from: Option<RequestLocation>,
    pub cursor_position: usize,

    // UI state
    pub active_panel: Panel,
    pub input_mode: InputMode,
    pub response_scroll: u16,

    // HTTP Response
    pub response: Response,
    pub is_loading: bool,
    pub next_request_id: u64,
    pub pending_request_id: Option<u64>,

    // Headers panel
    pub selected_header: usize,

    // Auth panel
    pub auth_field: AuthField,

    // Scripts panel
    pub script_field: ScriptField,

    // History
    pub history_index: Option<usize>,

    // Collection tree
    pub tree: Vec<TreeRow>,
    pub selected_row: usize,

    // Runner view
    pub runner: Option<RunnerView>,

    // Storage (persisted data)
    pub storage: Storage,
    pub config: AppConfig,

    // Popups
    pub show_help: bool,
    pub notification: Option<String>,
}

impl AppState {
    pub fn new(storage: Storage, config: AppConfig) -> Self {
        let request = Request::default();
        let cursor_position = request.url.len();
        let tree = build_tree(&storage.collections);
        AppState {
            request,
            loaded_from: None,
            cursor_position,
            active_panel: Panel::Tree,
            input_mode: InputMode::Normal,
            response_scroll: 0,
            response: Response::default(),
            is_loading: false,
            next_request_id: 1,
            pending_request_id: None,
            selected_header: 0,
            auth_field: AuthField::Token,
            script_field: ScriptField::default(),
            history_index: None,
            tree,
            selected_row: 0,
            runner: None,
            storage,
            config,
            show_help: false,
            notification: None,
        }
    }

    /// Generate a unique request ID
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn script(&self) -> &Option<String> {
        match self.script_field {
            ScriptField::PreRequest => &self.request.pre_request_script,
            ScriptField::PostResponse => &self.request.post_response_script,
        }
    }

    /// Get the current input field content
    pub fn current_input(&self) -> &str {
        match self.active_panel {
            Panel::Url => &self.request.url,
            Panel::Body => &self.request.body,
            Panel::Scripts => self.script().as_deref().unwrap_or(""),
            Panel::Auth => match &self.request.auth {
                AuthType::Bearer(token) => token,
                AuthType::Basic { username, password } => match self.auth_field {
                    AuthField::Token => "",
                    AuthField::Username => username,
                    AuthField::Password => password,
                },
                AuthType::None => "",
            },
            _ => "",
        }
    }

    /// Mutable reference to the current input field, if the panel has one
    pub fn current_input_mut(&mut self) -> Option<&mut String> {
        match self.active_panel {
            Panel::Url => Some(&mut self.request.url),
            Panel::Body => Some(&mut self.request.body),
            Panel::Scripts => Some(match self.script_field {
                ScriptField::PreRequest => self
                    .request
                    .pre_request_script
                    .get_or_insert_with(String::new),
                ScriptField::PostResponse => self
                    .request
                    .post_response_script
                    .get_or_insert_with(String::new),
            }),
            Panel::Auth => match &mut self.request.auth {
                AuthType::Bearer(token) => Some(token),
                AuthType::Basic { username, password } => match self.auth_field {
                    AuthField::Token => None,
                    AuthField::Username => Some(username),
                    AuthField::Password => Some(password),
                },
                AuthType::None => None,
            },
            _ => None,
        }
    }

    pub fn selected_tree_row(&self) -> Option<&TreeRow> {
        self.tree.get(self.selected_row)
    }

    pub fn overlay(&self) -> Overlay {
        if self.show_help {
            Overlay::Help
        } else if self.runner.is_some() {
            Overlay::Runner
        } else {
            Overlay::None
        }
    }

    /// Convert state to RenderState for UI
    pub fn to_render_state(&self) -> RenderState {
        RenderState {
            tree: self.tree.clone(),
            selected_row: self.selected_row,
            environment: self.storage.current_environment().map(|e| e.name.clone()),
            request_name: self.request.name.clone(),
            method: self.request.method.clone(),
            url: self.request.url.clone(),
            body: self.request.body.clone(),
            headers: self.request.headers.clone(),
            auth: self.request.auth.clone(),
            script_field: self.script_field,
            script: self.script().clone().unwrap_or_default(),
            active_panel: self.active_panel,
            input_mode: self.input_mode,
            cursor_position: self.cursor_position,
            overlay: self.overlay(),
            response: self.response.clone(),
            response_scroll: self.response_scroll,
            is_loading: self.is_loading,
            selected_header: self.selected_header,
            auth_field: self.auth_field,
            history_index: self.history_index,
            runner: self.runner.as_ref().map(RunnerView::to_render),
            notification: self.notification.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_rows_follow_collection_order() {
        let rows = build_tree(&[Collection::sample()]);
        let labels: Vec<(&str, usize)> = rows.iter().map(|r| (r.label.as_str(), r.depth)).collect();
        assert_eq!(
            labels,
            [
                ("Sample", 0),
                ("Auth", 1),
                ("Issue token", 2),
                ("Fetch profile", 2),
                ("Missing page", 1),
                ("Health", 1)
            ]
        );
        assert_eq!(rows[1].folder_path, ["Auth"]);
        assert_eq!(rows[3].folder_path, ["Auth"]);
        assert_eq!(rows[3].item_index, Some(1));
        assert_eq!(rows[4].folder_path, Vec::<String>::new());
        assert_eq!(rows[4].item_index, Some(1));
    }
}
