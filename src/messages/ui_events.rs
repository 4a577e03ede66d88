//! UI events - messages from UI layer to App layer

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Events generated from user input in the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    // Panel navigation
    NextPanel,
    PrevPanel,
    ScrollUp,
    ScrollDown,

    // Collection tree
    TreeUp,
    TreeDown,
    OpenTreeItem,
    SaveRequest,

    // Input editing
    StartEditing,
    StopEditing,
    CharInput(char),
    Backspace,
    CursorLeft,
    CursorRight,

    // HTTP Request actions
    SendRequest,
    CycleMethod,

    // Headers
    NextHeader,
    PrevHeader,
    ToggleHeader,
    AddHeader,
    DeleteHeader,

    // Auth
    CycleAuth,
    NextAuthField,

    // Scripts
    ToggleScriptField,

    // History
    HistoryPrev,
    HistoryNext,

    // Environment
    CycleEnvironment,

    // Runner view
    OpenRunner,
    CloseRunner,
    StartRun,
    CancelRun,
    ToggleStopOnFailure,
    IncreaseDelay,
    DecreaseDelay,
    ExportReport,
    RunnerUp,
    RunnerDown,

    // Popups
    ToggleHelp,
    CloseHelp,

    // System
    Quit,
}

/// Active panel in the UI (needed for context-aware event mapping)
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Panel {
    Tree,
    Url,
    Body,
    Headers,
    Auth,
    Scripts,
    Response,
}

impl Panel {
    pub fn next(&self) -> Panel {
        match self {
            Panel::Tree => Panel::Url,
            Panel::Url => Panel::Body,
            Panel::Body => Panel::Headers,
            Panel::Headers => Panel::Auth,
            Panel::Auth => Panel::Scripts,
            Panel::Scripts => Panel::Response,
            Panel::Response => Panel::Tree,
        }
    }

    pub fn prev(&self) -> Panel {
        match self {
            Panel::Tree => Panel::Response,
            Panel::Url => Panel::Tree,
            Panel::Body => Panel::Url,
            Panel::Headers => Panel::Body,
            Panel::Auth => Panel::Headers,
            Panel::Scripts => Panel::Auth,
            Panel::Response => Panel::Scripts,
        }
    }

    /// Multi-line editors take Enter as a newline
    pub fn is_multiline(&self) -> bool {
        matches!(self, Panel::Body | Panel::Scripts)
    }
}

/// Input mode
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Auth editing field
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum AuthField {
    Token,
    Username,
    Password,
}

/// Which script the Scripts panel edits
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub enum ScriptField {
    #[default]
    PreRequest,
    PostResponse,
}

impl ScriptField {
    pub fn toggle(&self) -> ScriptField {
        match self {
            ScriptField::PreRequest => ScriptField::PostResponse,
            ScriptField::PostResponse => ScriptField::PreRequest,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ScriptField::PreRequest => "Pre-request",
            ScriptField::PostResponse => "Post-response",
        }
    }
}

/// Overlay currently capturing keys, if any
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Overlay {
    None,
    Help,
    Runner,
}

/// Convert a key event to a UiEvent based on current UI context
pub fn key_to_ui_event(
    key: KeyEvent,
    active_panel: Panel,
    input_mode: InputMode,
    overlay: Overlay,
) -> Option<UiEvent> {
    use crossterm::event::KeyEventKind;

    if key.kind != KeyEventKind::Press {
        return None;
    }

    // Global Ctrl shortcuts
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => return Some(UiEvent::Quit),
            KeyCode::Up if input_mode == InputMode::Normal => return Some(UiEvent::HistoryPrev),
            KeyCode::Down if input_mode == InputMode::Normal => {
                return Some(UiEvent::HistoryNext)
            }
            _ => {}
        }
    }

    match overlay {
        Overlay::Help => Some(UiEvent::CloseHelp),
        Overlay::Runner => handle_runner_keys(key),
        Overlay::None => handle_main_keys(key, active_panel, input_mode),
    }
}

/// Keys while the runner view is open
fn handle_runner_keys(key: KeyEvent) -> Option<UiEvent> {
    match key.code {
        KeyCode::Enter => Some(UiEvent::StartRun),
        KeyCode::Char('f') => Some(UiEvent::ToggleStopOnFailure),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(UiEvent::IncreaseDelay),
        KeyCode::Char('-') => Some(UiEvent::DecreaseDelay),
        KeyCode::Char('x') => Some(UiEvent::CancelRun),
        KeyCode::Char('e') => Some(UiEvent::ExportReport),
        KeyCode::Up => Some(UiEvent::RunnerUp),
        KeyCode::Down => Some(UiEvent::RunnerDown),
        KeyCode::Esc | KeyCode::Char('q') => Some(UiEvent::CloseRunner),
        _ => None,
    }
}

/// Handle keys for the main screen
fn handle_main_keys(key: KeyEvent, active_panel: Panel, input_mode: InputMode) -> Option<UiEvent> {
    match input_mode {
        InputMode::Normal => match key.code {
            KeyCode::Char('q') => Some(UiEvent::Quit),
            KeyCode::Char('?') => Some(UiEvent::ToggleHelp),
            KeyCode::Tab => Some(UiEvent::NextPanel),
            KeyCode::BackTab => Some(UiEvent::PrevPanel),
            KeyCode::Char('e') | KeyCode::Enter => match active_panel {
                Panel::Tree => Some(UiEvent::OpenTreeItem),
                Panel::Url | Panel::Body | Panel::Auth | Panel::Scripts => {
                    Some(UiEvent::StartEditing)
                }
                Panel::Headers => Some(UiEvent::ToggleHeader),
                Panel::Response => None,
            },
            KeyCode::Char('m') => Some(UiEvent::CycleMethod),
            KeyCode::Char('s') => Some(UiEvent::SendRequest),
            KeyCode::Char('r') => Some(UiEvent::OpenRunner),
            KeyCode::Char('v') => Some(UiEvent::CycleEnvironment),
            KeyCode::Char('w') => Some(UiEvent::SaveRequest),
            KeyCode::Up => match active_panel {
                Panel::Tree => Some(UiEvent::TreeUp),
                Panel::Headers => Some(UiEvent::PrevHeader),
                Panel::Response => Some(UiEvent::ScrollUp),
                _ => None,
            },
            KeyCode::Down => match active_panel {
                Panel::Tree => Some(UiEvent::TreeDown),
                Panel::Headers => Some(UiEvent::NextHeader),
                Panel::Response => Some(UiEvent::ScrollDown),
                _ => None,
            },
            KeyCode::Char('a') if active_panel == Panel::Headers => Some(UiEvent::AddHeader),
            KeyCode::Char('d') if active_panel == Panel::Headers => Some(UiEvent::DeleteHeader),
            KeyCode::Char('t') if active_panel == Panel::Auth => Some(UiEvent::CycleAuth),
            KeyCode::Char('p') if active_panel == Panel::Scripts => {
                Some(UiEvent::ToggleScriptField)
            }
            _ => None,
        },
        InputMode::Editing => match key.code {
            KeyCode::Esc => Some(UiEvent::StopEditing),
            KeyCode::Left => Some(UiEvent::CursorLeft),
            KeyCode::Right => Some(UiEvent::CursorRight),
            KeyCode::Backspace => Some(UiEvent::Backspace),
            KeyCode::Char(c) => Some(UiEvent::CharInput(c)),
            KeyCode::Tab if active_panel == Panel::Auth => Some(UiEvent::NextAuthField),
            KeyCode::Enter => {
                if active_panel == Panel::Url {
                    Some(UiEvent::SendRequest)
                } else if active_panel.is_multiline() {
                    Some(UiEvent::CharInput('\n'))
                } else {
                    Some(UiEvent::StopEditing)
                }
            }
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_runner_overlay_captures_keys() {
        let ev = |c| key_to_ui_event(press(c), Panel::Tree, InputMode::Normal, Overlay::Runner);
        assert_eq!(ev(KeyCode::Enter), Some(UiEvent::StartRun));
        assert_eq!(ev(KeyCode::Char('x')), Some(UiEvent::CancelRun));
        assert_eq!(ev(KeyCode::Char('+')), Some(UiEvent::IncreaseDelay));
        assert_eq!(ev(KeyCode::Esc), Some(UiEvent::CloseRunner));
        assert_eq!(ev(KeyCode::Char('s')), None);
    }

    #[test]
    fn test_enter_depends_on_panel() {
        let normal = |p| key_to_ui_event(press(KeyCode::Enter), p, InputMode::Normal, Overlay::None);
        assert_eq!(normal(Panel::Tree), Some(UiEvent::OpenTreeItem));
        assert_eq!(normal(Panel::Headers), Some(UiEvent::ToggleHeader));

        let editing = |p| key_to_ui_event(press(KeyCode::Enter), p, InputMode::Editing, Overlay::None);
        assert_eq!(editing(Panel::Url), Some(UiEvent::SendRequest));
        assert_eq!(editing(Panel::Scripts), Some(UiEvent::CharInput('\n')));
        assert_eq!(editing(Panel::Auth), Some(UiEvent::StopEditing));
    }

    #[test]
    fn test_help_closes_on_any_key() {
        let event = key_to_ui_event(press(KeyCode::Char('r')), Panel::Tree, InputMode::Normal, Overlay::Help);
        assert_eq!(event, Some(UiEvent::CloseHelp));
    }

    #[test]
    fn test_panel_cycle_is_closed() {
        let mut panel = Panel::Tree;
        for _ in 0..7 {
            assert_eq!(panel.next().prev(), panel);
            panel = panel.next();
        }
        assert_eq!(panel, Panel::Tree);
    }
}
