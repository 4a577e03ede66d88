//! Render state - data structure sent from App layer to UI for rendering

use crate::app::state::TreeRow;
use crate::messages::ui_events::{AuthField, InputMode, Overlay, Panel, ScriptField};
use crate::models::{AuthType, Header, HttpMethod, Response};
use crate::runner::{RunStatus, StepStatus};

/// One line of the runner's step list
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub name: String,
    pub method: HttpMethod,
    /// `None` while the request has not been reached yet
    pub status: Option<StepStatus>,
    pub status_code: Option<u16>,
    pub time_ms: Option<u64>,
    pub note: String,
}

/// Everything the runner view draws
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerRender {
    pub label: String,
    pub stop_on_failure: bool,
    pub delay_ms: i64,
    pub running: bool,
    pub status: Option<RunStatus>,
    pub completed: usize,
    pub total: usize,
    pub rows: Vec<RunRow>,
    pub selected: usize,
    /// Console output, assertions and errors of the selected step
    pub detail: Vec<String>,
    pub summary: Option<String>,
    pub error: Option<String>,
}

/// Complete state needed by the UI to render
#[derive(Debug, Clone)]
pub struct RenderState {
    // Collection tree
    pub tree: Vec<TreeRow>,
    pub selected_row: usize,
    pub environment: Option<String>,

    // HTTP Request data
    pub request_name: String,
    pub method: HttpMethod,
    pub url: String,
    pub body: String,
    pub headers: Vec<Header>,
    pub auth: AuthType,
    pub script_field: ScriptField,
    pub script: String,

    // UI state
    pub active_panel: Panel,
    pub input_mode: InputMode,
    pub cursor_position: usize,
    pub overlay: Overlay,

    // HTTP Response
    pub response: Response,
    pub response_scroll: u16,
    pub is_loading: bool,

    // Headers panel
    pub selected_header: usize,

    // Auth panel
    pub auth_field: AuthField,

    // History
    pub history_index: Option<usize>,

    // Runner view
    pub runner: Option<RunnerRender>,

    pub notification: Option<String>,
}

impl Default for RenderState {
    fn default() -> Self {
        let request = crate::models::Request::default();
        RenderState {
            tree: Vec::new(),
            selected_row: 0,
            environment: None,
            request_name: request.name,
            method: request.method,
            url: request.url,
            body: request.body,
            headers: request.headers,
            auth: request.auth,
            script_field: ScriptField::default(),
            script: String::new(),
            active_panel: Panel::Tree,
            input_mode: InputMode::Normal,
            cursor_position: 0,
            overlay: Overlay::None,
            response: Response::default(),
            response_scroll: 0,
            is_loading: false,
            selected_header: 0,
            auth_field: AuthField::Token,
            history_index: None,
            runner: None,
            notification: None,
        }
    }
}
