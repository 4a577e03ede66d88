//! Courier TUI - Actor-based API client with a collection runner
//!
//! Architecture:
//! - UI Layer (Ratatui) - synchronous terminal rendering
//! - App Layer - central state machine processing events
//! - Network Layer (Tokio) - async HTTP execution and collection runs

use std::io;
use std::time::Duration;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use courier_tui::app::state::TreeRowKind;
use courier_tui::app::{AppActor, AppState};
use courier_tui::config::AppConfig;
use courier_tui::constants::{APP_NAME, APP_VERSION};
use courier_tui::messages::render::RunnerRender;
use courier_tui::messages::ui_events::{key_to_ui_event, InputMode, Overlay, Panel};
use courier_tui::messages::{NetworkCommand, NetworkResponse, RenderState, UiEvent};
use courier_tui::models::AuthType;
use courier_tui::network::NetworkActor;
use courier_tui::storage::Storage;
use courier_tui::ui::{self, highlight_json, method_color, run_status_color, status_color, step_status_color};

/// Terminal cleanup guard
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Initialize logging to file
    let file_appender = tracing_appender::rolling::never(".", &config.log_file);
    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    tracing::info!(version = APP_VERSION, "Starting {}", APP_NAME);

    let storage = Storage::new();
    tracing::info!(
        dir = %storage.config_dir().display(),
        collections = storage.collections.len(),
        environments = storage.environments.len(),
        "Storage loaded"
    );
    let state = AppState::new(storage, config.clone());

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let _guard = TerminalGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create channels
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (net_cmd_tx, net_cmd_rx) = mpsc::unbounded_channel::<NetworkCommand>();
    let (net_resp_tx, net_resp_rx) = mpsc::unbounded_channel::<NetworkResponse>();
    let (render_tx, mut render_rx) = mpsc::unbounded_channel::<RenderState>();

    // Spawn network actor
    let network_actor = NetworkActor::new(net_resp_tx, config.request_timeout());
    tokio::spawn(network_actor.run(net_cmd_rx));

    // Spawn app actor
    let app_actor = AppActor::new(state, net_cmd_tx, render_tx);
    tokio::spawn(app_actor.run(ui_rx, net_resp_rx));

    // Run UI loop (synchronous with async polling)
    run_ui_loop(&mut terminal, ui_tx, &mut render_rx).await?;

    tracing::info!("Shutting down");
    Ok(())
}

/// Run the synchronous UI rendering loop
async fn run_ui_loop(
    terminal: &mut Terminal<impl Backend>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    render_rx: &mut mpsc::UnboundedReceiver<RenderState>,
) -> anyhow::Result<()> {
    let mut current_state = RenderState::default();

    loop {
        terminal.draw(|f| draw_ui(f, &current_state))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Some(event) = key_to_ui_event(
                    key,
                    current_state.active_panel,
                    current_state.input_mode,
                    current_state.overlay,
                ) {
                    let quit = event == UiEvent::Quit;
                    let _ = ui_tx.send(event);
                    if quit {
                        break;
                    }
                }
            }
        }

        while let Ok(state) = render_rx.try_recv() {
            current_state = state;
        }
    }

    Ok(())
}

// ============================================================================
// UI Drawing Functions
// ============================================================================

fn draw_ui(f: &mut Frame, state: &RenderState) {
    let area = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),     // Content
            Constraint::Length(1),  // Status bar
        ])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
        .split(main_chunks[0]);

    draw_tree(f, state, columns[0]);
    draw_editor(f, state, columns[1]);
    draw_status_bar(f, state, main_chunks[1]);

    match state.overlay {
        Overlay::Help => draw_help_popup(f, area),
        Overlay::Runner => {
            if let Some(runner) = &state.runner {
                draw_runner_popup(f, runner, area);
            }
        }
        Overlay::None => {}
    }
}

fn focus_style(state: &RenderState, panel: Panel) -> Style {
    let is_focused = state.active_panel == panel;
    if is_focused && state.input_mode == InputMode::Editing {
        Style::default().fg(Color::Yellow)
    } else if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn draw_tree(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Tree;

    let items: Vec<ListItem> = state
        .tree
        .iter()
        .map(|row| {
            let indent = "  ".repeat(row.depth);
            let line = match row.kind {
                TreeRowKind::Collection => Line::from(Span::styled(
                    format!("{}▣ {}", indent, row.label),
                    Style::default().bold(),
                )),
                TreeRowKind::Folder => Line::from(Span::raw(format!("{}▸ {}", indent, row.label))),
                TreeRowKind::Request => {
                    let method = row.method.as_ref().map(|m| m.as_str()).unwrap_or("");
                    Line::from(vec![
                        Span::raw(indent),
                        Span::styled(format!("{:4} ", &method[..method.len().min(4)]), Style::default().fg(method_color(method))),
                        Span::raw(row.label.clone()),
                    ])
                }
            };
            ListItem::new(line)
        })
        .collect();

    let highlight_style = if is_focused {
        Style::default().fg(Color::Yellow).bold()
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };

    let env = state.environment.as_deref().unwrap_or("no env");
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(focus_style(state, Panel::Tree))
                .title(" Collections (r:run) ")
                .title_bottom(Line::from(format!(" env: {} (v) ", env)).right_aligned()),
        )
        .highlight_style(highlight_style)
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    if !state.tree.is_empty() {
        list_state.select(Some(state.selected_row));
    }
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_editor(f: &mut Frame, state: &RenderState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Method + URL
            Constraint::Length(9),  // Panels (Body/Headers/Auth/Scripts)
            Constraint::Min(5),     // Response
        ])
        .split(area);

    draw_url_bar(f, state, chunks[0]);
    draw_middle_panels(f, state, chunks[1]);
    draw_response(f, state, chunks[2]);
}

fn set_cursor(f: &mut Frame, state: &RenderState, panel: Panel, area: Rect) {
    if state.active_panel != panel || state.input_mode != InputMode::Editing {
        return;
    }
    // Position on the last line for multi-line editors
    let text = match panel {
        Panel::Url => state.url.as_str(),
        Panel::Body => state.body.as_str(),
        Panel::Scripts => state.script.as_str(),
        _ => "",
    };
    let before = &text[..state.cursor_position.min(text.len())];
    let row = before.matches('\n').count() as u16;
    let col = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) as u16;
    let max_x = area.x + area.width.saturating_sub(2);
    let max_y = area.y + area.height.saturating_sub(2);
    f.set_cursor_position(Position::new(
        (area.x + col + 1).min(max_x),
        (area.y + row + 1).min(max_y),
    ));
}

fn draw_url_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    let mcolor = method_color(state.method.as_str());

    let loading = if state.is_loading { " [...]" } else { "" };
    let history_indicator = state.history_index.map(|i| format!(" [{}]", i + 1)).unwrap_or_default();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(state, Panel::Url))
        .title(format!(" {} · {}{}{} ", state.method.as_str(), state.request_name, loading, history_indicator))
        .title_style(Style::default().fg(mcolor).bold());

    let input = Paragraph::new(state.url.as_str()).block(block);
    f.render_widget(input, area);
    set_cursor(f, state, Panel::Url, area);
}

fn draw_middle_panels(f: &mut Frame, state: &RenderState, area: Rect) {
    let tabs_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    let tab_titles = vec!["Body", "Headers", "Auth", "Scripts"];
    let selected_tab = match state.active_panel {
        Panel::Headers => 1,
        Panel::Auth => 2,
        Panel::Scripts => 3,
        _ => 0,
    };

    let tabs = ui::render_tabs(&tab_titles, selected_tab);
    f.render_widget(tabs, tabs_area[0]);

    let content_area = tabs_area[1];
    match state.active_panel {
        Panel::Headers => draw_headers_panel(f, state, content_area),
        Panel::Auth => draw_auth_panel(f, state, content_area),
        Panel::Scripts => draw_scripts_panel(f, state, content_area),
        _ => draw_body_panel(f, state, content_area),
    }
}

fn draw_body_panel(f: &mut Frame, state: &RenderState, area: Rect) {
    let title = if state.method.has_body() {
        " Body (JSON) "
    } else {
        " Body (not sent for this method) "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(state, Panel::Body))
        .title(title);

    let body = Paragraph::new(state.body.as_str())
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(body, area);
    set_cursor(f, state, Panel::Body, area);
}

fn draw_headers_panel(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Headers;

    let items: Vec<ListItem> = state.headers.iter()
        .enumerate()
        .map(|(i, h)| {
            let style = if !h.enabled {
                Style::default().fg(Color::DarkGray)
            } else if is_focused && i == state.selected_header {
                Style::default().fg(Color::Yellow).bold()
            } else {
                Style::default()
            };
            let prefix = if h.enabled { "[x]" } else { "[ ]" };
            ListItem::new(format!("{} {}: {}", prefix, h.key, h.value)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(state, Panel::Headers))
            .title(" Headers (a:add d:del Enter:toggle) "));
    f.render_widget(list, area);
}

fn draw_auth_panel(f: &mut Frame, state: &RenderState, area: Rect) {
    let (auth_type, content) = match &state.auth {
        AuthType::None => ("None", String::from("Press 't' to cycle auth type")),
        AuthType::Bearer(token) => ("Bearer", format!("Token: {}", if token.is_empty() { "<empty>" } else { token })),
        AuthType::Basic { username, password } => {
            let pass_display = if password.is_empty() {
                "<empty>".to_string()
            } else {
                "*".repeat(password.len())
            };
            ("Basic", format!("User: {}  Pass: {}",
                if username.is_empty() { "<empty>" } else { username },
                pass_display
            ))
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(state, Panel::Auth))
        .title(format!(" Auth: {} (t:cycle) ", auth_type));

    let auth = Paragraph::new(content).block(block);
    f.render_widget(auth, area);

    if state.active_panel == Panel::Auth && state.input_mode == InputMode::Editing {
        let max_x = area.x + area.width.saturating_sub(2);
        let cursor_x = (area.x + state.cursor_position as u16 + 1).min(max_x);
        f.set_cursor_position(Position::new(cursor_x, area.y + 1));
    }
}

fn draw_scripts_panel(f: &mut Frame, state: &RenderState, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(state, Panel::Scripts))
        .title(format!(" {} script (p:switch) ", state.script_field.title()));

    let content = if state.script.is_empty() && state.input_mode == InputMode::Normal {
        Text::from(Span::styled(
            "set / unset / log / fail, url / header / body, assert / extract",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(state.script.as_str())
    };

    let script = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(script, area);
    set_cursor(f, state, Panel::Scripts, area);
}

fn draw_response(f: &mut Frame, state: &RenderState, area: Rect) {
    let status_text = match state.response.status_code {
        Some(code) => {
            let color = status_color(code);
            Span::styled(format!(" {} ", code), Style::default().fg(color).bold())
        }
        None => Span::raw(" Response "),
    };

    let time_text = if state.response.time_ms > 0 {
        format!(" {}ms ", state.response.time_ms)
    } else {
        String::new()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(state, Panel::Response))
        .title(status_text)
        .title_bottom(Line::from(time_text).right_aligned());

    let lines = highlight_json(&state.response.body);
    let response = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((state.response_scroll, 0));
    f.render_widget(response, area);
}

fn draw_runner_popup(f: &mut Frame, runner: &RunnerRender, area: Rect) {
    let popup_area = centered_rect(80, 80, area);
    f.render_widget(Clear, popup_area);

    let status = runner
        .status
        .map(|s| Span::styled(format!(" {} ", s), Style::default().fg(run_status_color(s)).bold()))
        .unwrap_or_else(|| Span::raw(" ready "));
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Line::from(vec![Span::raw(format!(" Run: {} ", runner.label)), status]))
        .title_bottom(Line::from(" Enter:start f:stop-on-failure +/-:delay x:cancel e:export Esc:close ").centered())
        .style(Style::default().bg(Color::Black));
    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),       // Config + progress
            Constraint::Percentage(55),  // Steps
            Constraint::Min(3),          // Detail
        ])
        .split(inner);

    let ratio = if runner.total == 0 {
        0.0
    } else {
        runner.completed as f64 / runner.total as f64
    };
    let header = vec![
        Line::from(format!(
            " stop on failure: {}   delay: {}ms   progress: {}/{}",
            if runner.stop_on_failure { "on" } else { "off" },
            runner.delay_ms,
            runner.completed,
            runner.total
        )),
        Line::from(match (&runner.error, &runner.summary) {
            (Some(error), _) => Span::styled(format!(" {}", error), Style::default().fg(Color::Red)),
            (None, Some(summary)) => Span::raw(format!(" {}", summary)),
            (None, None) => Span::styled(" not started", Style::default().fg(Color::DarkGray)),
        }),
    ];
    f.render_widget(Paragraph::new(header), chunks[0]);

    let items: Vec<ListItem> = runner
        .rows
        .iter()
        .map(|row| {
            let status = row.status.map(|s| s.as_str().to_string()).unwrap_or_else(|| "pending".into());
            let code = row.status_code.map(|c| c.to_string()).unwrap_or_default();
            let time = row.time_ms.map(|t| format!("{}ms", t)).unwrap_or_default();
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:8}", status), Style::default().fg(step_status_color(row.status))),
                Span::styled(format!("{:8}", row.method.as_str()), Style::default().fg(method_color(row.method.as_str()))),
                Span::raw(format!("{:28} {:>4} {:>7}  ", row.name, code, time)),
                Span::styled(row.note.clone(), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();
    let mut list_state = ListState::default();
    if !runner.rows.is_empty() {
        list_state.select(Some(runner.selected));
    }
    let steps = List::new(items)
        .block(Block::default().borders(Borders::TOP).title(format!(" Steps {:.0}% ", ratio * 100.0)))
        .highlight_style(Style::default().fg(Color::Yellow).bold());
    f.render_stateful_widget(steps, chunks[1], &mut list_state);

    let detail: Vec<Line> = runner.detail.iter().map(|l| Line::from(l.as_str())).collect();
    let detail = Paragraph::new(detail)
        .block(Block::default().borders(Borders::TOP).title(" Details "))
        .wrap(Wrap { trim: false });
    f.render_widget(detail, chunks[2]);
}

fn draw_status_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    let text = if let Some(note) = &state.notification {
        format!(" {} ", note)
    } else if state.is_loading {
        " Loading... ".to_string()
    } else if state.input_mode == InputMode::Editing {
        " ESC:stop editing | arrows:move | Enter:newline in body/scripts ".to_string()
    } else {
        " Tab:panel | Enter:open | r:run | s:send | w:save | v:env | ?:help | q:quit ".to_string()
    };

    let bar = Paragraph::new(text)
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(bar, area);
}

fn draw_help_popup(f: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 80, area);

    let help_text = r#"
 COURIER - Keyboard Shortcuts

 NAVIGATION
   Tab / Shift+Tab    Switch panels
   ↑ / ↓              Browse tree / headers / scroll response
   Ctrl+↑ / Ctrl+↓    Navigate history

 COLLECTIONS
   Enter              Load request / open runner on folder
   r                  Run selected folder or collection
   w                  Save edited request to its collection
   v                  Cycle environment

 REQUEST
   m                  Cycle HTTP method
   s                  Send request
   e                  Edit current field
   a / d              Add / delete header
   t                  Cycle auth type
   p                  Switch pre-request / post-response script

 RUNNER
   Enter              Start run
   f                  Toggle stop on failure
   + / -              Adjust delay between requests
   x                  Cancel run
   e                  Export report
   Esc                Close (cancels a running run)

 GENERAL
   ?                  Toggle this help
   q / Ctrl+C         Quit

 Press any key to close...
"#;

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));

    let help = Paragraph::new(help_text)
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
