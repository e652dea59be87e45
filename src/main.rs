use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{
    DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange, KeyCode,
    KeyEvent, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};
use tracing_subscriber::EnvFilter;

use dxdaily::api::{CaseApi, CaseContext, GenerateCaseRequest, SubmitCaseRequest};
use dxdaily::app::{App, AppScreen, StatusKind};
use dxdaily::config::{Config, PLAYER_ROLES};
use dxdaily::event::{AppEvent, EventHandler};
use dxdaily::session::controller::SessionController;
use dxdaily::session::state::{Phase, Role};
use dxdaily::session::timer::format_time;
use dxdaily::store::json_store::JsonStore;
use dxdaily::ui::components::activity_heatmap::ActivityHeatmap;
use dxdaily::ui::components::chat_log::{Bubble, ChatLog};
use dxdaily::ui::components::stats_panel::{StatsPanel, summary_rows};
use dxdaily::ui::layout::{AppLayout, centered_rect, pack_hint_lines};
use dxdaily::ui::theme::Theme;
use dxdaily::worker::Worker;

const LOG_FILE: &str = "dxdaily.log";
const LOG_ENV: &str = "DXDAILY_LOG";
const HEATMAP_HEIGHT: u16 = 10;
const PAGE_LINES: usize = 10;

#[derive(Parser)]
#[command(
    name = "dxdaily",
    version,
    about = "Interview today's patient and name the diagnosis"
)]
struct Cli {
    #[arg(short, long, help = "Game server base URL")]
    server: Option<String>,

    #[arg(short, long, help = "Theme name")]
    theme: Option<String>,

    #[arg(long, help = "Directory for saved progress and the log file")]
    data_dir: Option<PathBuf>,

    #[arg(short, long, help = "Training level reported with each conversation")]
    role: Option<String>,

    #[arg(
        long,
        requires = "custom_description",
        help = "Play a shared case with this diagnosis instead of today's"
    )]
    custom_disease: Option<String>,

    #[arg(long, requires = "custom_disease", help = "Case text for --custom-disease")]
    custom_description: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print your stats and exit
    Stats,
    /// Publish a case you wrote and print its shareable link
    SubmitCase {
        #[arg(long)]
        disease: String,
        #[arg(long)]
        description: String,
    },
    /// Have the server write a case and print its shareable link
    GenerateCase {
        #[arg(long)]
        chief_complaint: String,
        #[arg(long)]
        specialty: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {e:#}");
        Config::default()
    });
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(theme) = cli.theme {
        config.theme = theme;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    let data_dir = config.data_dir();
    let store = JsonStore::with_base_dir(data_dir.clone())
        .with_context(|| format!("cannot use data directory {}", data_dir.display()))?;
    if let Err(e) = init_logging(&data_dir) {
        eprintln!("Logging disabled: {e:#}");
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), data_dir = %data_dir.display(), "starting");

    match cli.command {
        Some(Command::Stats) => {
            for (label, value) in summary_rows(&store.load_user_stats()) {
                println!("{label:<16}{value}");
            }
            return Ok(());
        }
        Some(Command::SubmitCase {
            disease,
            description,
        }) => {
            let api = build_api(&config)?;
            let url = api.submit_case(&SubmitCaseRequest {
                disease: &disease,
                description: &description,
            })?;
            println!("{url}");
            return Ok(());
        }
        Some(Command::GenerateCase {
            chief_complaint,
            specialty,
        }) => {
            let api = build_api(&config)?;
            let url = api.generate_case_by_criteria(&GenerateCaseRequest {
                chief_complaint: &chief_complaint,
                specialty: &specialty,
            })?;
            println!("{url}");
            return Ok(());
        }
        None => {}
    }

    if store.sweep_interrupted_writes() {
        tracing::info!("removed files left by interrupted writes");
    }

    let api = build_api(&config)?;
    let custom_case = match (cli.custom_disease, cli.custom_description) {
        (Some(disease), Some(case)) => Some(CaseContext {
            disease,
            case,
            placeholder_snippet: None,
        }),
        _ => None,
    };

    let theme = Theme::load(&config.theme).unwrap_or_else(|| {
        tracing::warn!(theme = %config.theme, "unknown theme, using the default");
        Theme::default()
    });
    let theme: &'static Theme = Box::leak(Box::new(theme));

    let mut controller = SessionController::new(Some(store), config.reference_clock(), custom_case);
    // A flag always wins; the config value only fills in a missing saved role.
    if let Some(role) = cli.role.as_deref() {
        controller.set_player_role(role);
    } else if controller.player_role().is_none()
        && let Some(role) = config.player_role.as_deref()
    {
        controller.set_player_role(role);
    }
    let mut app = App::new(config, controller, theme);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableFocusChange,
        EnableBracketedPaste
    )?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = EventHandler::new(Duration::from_millis(250));
    app.attach_worker(Worker::new(api, events.sender()));
    app.boot();

    let result = run_app(&mut terminal, &mut app, &events);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        DisableFocusChange,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        tracing::error!(error = %err, "event loop failed");
        eprintln!("Error: {err:?}");
    }
    tracing::info!("exiting");

    Ok(())
}

fn init_logging(data_dir: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join(LOG_FILE))?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

#[cfg(feature = "network")]
fn build_api(config: &Config) -> Result<Arc<dyn CaseApi>> {
    let api = dxdaily::api::http::HttpCaseApi::new(&config.server_url, config.request_timeout())?;
    Ok(Arc::new(api))
}

#[cfg(not(feature = "network"))]
fn build_api(_config: &Config) -> Result<Arc<dyn CaseApi>> {
    anyhow::bail!("this build has no network support; rebuild with the `network` feature")
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        match events.next()? {
            AppEvent::Key(key) => handle_key(app, key),
            AppEvent::Paste(text) => {
                if app.screen == AppScreen::Chat {
                    app.input.insert_str(&text);
                }
            }
            AppEvent::Focus(focused) => app.on_focus(focused),
            AppEvent::Tick => {}
            AppEvent::Resize(_, _) => {}
            AppEvent::Net(net) => app.on_net(net),
        }
        app.on_tick();

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    match app.screen {
        AppScreen::Welcome => handle_welcome_key(app, key),
        AppScreen::Chat => handle_chat_key(app, key),
        AppScreen::Stats | AppScreen::Help => handle_overlay_key(app, key),
    }
}

fn handle_welcome_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => app.start_game(),
        KeyCode::Left | KeyCode::Up | KeyCode::Char('k') => app.cycle_role(false),
        KeyCode::Right | KeyCode::Down | KeyCode::Char('j') => app.cycle_role(true),
        KeyCode::Char('n') => app.new_case(),
        KeyCode::Char('s') => app.show_overlay(AppScreen::Stats),
        KeyCode::Char('?') | KeyCode::F(1) => app.show_overlay(AppScreen::Help),
        _ => {}
    }
}

fn handle_chat_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('n') if ctrl => app.new_case(),
        KeyCode::Char('s') if ctrl => app.show_overlay(AppScreen::Stats),
        KeyCode::F(1) => app.show_overlay(AppScreen::Help),
        KeyCode::PageUp => app.scroll(true, PAGE_LINES),
        KeyCode::PageDown => app.scroll(false, PAGE_LINES),
        _ => app.handle_input_key(key),
    }
}

fn handle_overlay_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => app.close_overlay(),
        KeyCode::Char('?') | KeyCode::F(1) => app.show_overlay(AppScreen::Help),
        KeyCode::Char('s') => app.show_overlay(AppScreen::Stats),
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let colors = &app.theme.colors;

    let bg = Block::default().style(Style::default().bg(colors.bg()));
    frame.render_widget(bg, area);

    match app.screen {
        AppScreen::Welcome => render_welcome(frame, app),
        AppScreen::Chat => render_chat(frame, app),
        AppScreen::Stats => render_stats(frame, app),
        AppScreen::Help => render_help(frame, app),
    }
}

fn header_line<'a>(app: &App, info: String) -> Paragraph<'a> {
    let colors = &app.theme.colors;
    Paragraph::new(Line::from(vec![
        Span::styled(
            " dxdaily ",
            Style::default()
                .fg(colors.header_fg())
                .bg(colors.header_bg())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            info,
            Style::default().fg(colors.text_muted()).bg(colors.header_bg()),
        ),
    ]))
    .style(Style::default().bg(colors.header_bg()))
}

/// The status message if there is one, otherwise the key hints.
fn footer_line<'a>(app: &App, hints: &[&str], width: u16) -> Paragraph<'a> {
    let colors = &app.theme.colors;
    let line = match &app.status {
        Some(status) => {
            let color = match status.kind {
                StatusKind::Info => colors.accent(),
                StatusKind::Success => colors.success(),
                StatusKind::Error => colors.error(),
            };
            Line::from(Span::styled(
                format!(" {}", status.text),
                Style::default().fg(color),
            ))
        }
        None => {
            let packed = pack_hint_lines(hints, width as usize);
            Line::from(Span::styled(
                packed.into_iter().next().unwrap_or_default(),
                Style::default().fg(colors.text_muted()),
            ))
        }
    };
    Paragraph::new(line)
}

fn render_welcome(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let colors = &app.theme.colors;

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let stats = app.controller.stats();
    let streak = if stats.consecutive_play_streak > 0 {
        format!(" {} day streak", stats.consecutive_play_streak)
    } else {
        String::new()
    };
    frame.render_widget(header_line(app, streak), layout[0]);

    let centered = centered_rect(60, 70, layout[1]);
    let block = Block::bordered()
        .title(" Today's Patient ")
        .border_style(Style::default().fg(colors.accent()))
        .style(Style::default().bg(colors.bg()));
    let inner = block.inner(centered);
    block.render(centered, frame.buffer_mut());

    let state = app.controller.state();
    let (case_status, case_color) = match state.phase() {
        Phase::Preloading => ("Preparing today's case...".to_string(), colors.text_muted()),
        Phase::ReadyToStart => ("Today's case is ready.".to_string(), colors.success()),
        Phase::Idle if state.has_error() => (
            app.controller
                .last_error()
                .unwrap_or("The case could not be loaded.")
                .to_string(),
            colors.error(),
        ),
        _ => (String::new(), colors.text_muted()),
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  A patient is waiting. Ask questions, order tests and name the",
            Style::default().fg(colors.fg()),
        )),
        Line::from(Span::styled(
            "  diagnosis. You have two guesses. The clock runs while you play.",
            Style::default().fg(colors.fg()),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "  Your training level:",
            Style::default().fg(colors.text_muted()),
        )),
    ];
    let selected = app.selected_role();
    let mut roles: Vec<Span> = vec![Span::raw("  ")];
    for role in PLAYER_ROLES {
        let style = if *role == selected {
            Style::default()
                .fg(colors.bg())
                .bg(colors.accent())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(colors.accent_dim())
        };
        roles.push(Span::styled(format!(" {role} "), style));
        roles.push(Span::raw(" "));
    }
    lines.push(Line::from(roles));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("  {case_status}"),
        Style::default().fg(case_color),
    )));

    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .render(inner, frame.buffer_mut());

    let hints = if state.has_error() {
        vec!["[Enter] Start", "[n] Retry", "[←→] Role", "[s] Stats", "[?] Help", "[q] Quit"]
    } else {
        vec!["[Enter] Start", "[←→] Role", "[s] Stats", "[?] Help", "[q] Quit"]
    };
    frame.render_widget(footer_line(app, &hints, layout[2].width), layout[2]);
}

fn render_chat(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let app_layout = AppLayout::new(area, app.input.value());
    let state = app.controller.state();
    let timer = app.controller.timer();

    let phase = match state.phase() {
        Phase::Preloading => "loading case".to_string(),
        Phase::Completed => match state.outcome() {
            Some(outcome) => format!("{outcome:?}").to_lowercase(),
            None => "finished".to_string(),
        },
        _ if state.is_in_flight() => "patient is answering".to_string(),
        _ if !app.focused && timer.is_running() => "paused".to_string(),
        _ => String::new(),
    };
    let mut info = format!(
        " {} | Guesses left: {}",
        format_time(timer.elapsed()),
        state.attempts_remaining()
    );
    if !app_layout.tier.show_sidebar() {
        info.push_str(&format!(
            " | Streak {}",
            app.controller.stats().consecutive_play_streak
        ));
    }
    if !phase.is_empty() {
        info.push_str(&format!(" | {phase}"));
    }
    frame.render_widget(header_line(app, info), app_layout.header);

    let mut bubbles: Vec<Bubble> = state
        .messages()
        .iter()
        .map(Bubble::from_message)
        .collect();
    if state.is_in_flight() {
        let reply = app.controller.streaming_reply().unwrap_or("");
        bubbles.push(Bubble {
            role: Role::Patient,
            text: if reply.is_empty() { "..." } else { reply },
            wide: app.controller.streaming_is_wide(),
        });
    }
    let title = if state.is_custom_case() {
        " Shared Case "
    } else {
        " Patient Interview "
    };
    frame.render_widget(
        ChatLog::new(bubbles, app.scroll_back, app.theme).title(title),
        app_layout.chat,
    );

    render_input(frame, app, app_layout.input);

    if let Some(sidebar) = app_layout.sidebar {
        render_sidebar(frame, app, sidebar, app_layout.tier.show_heatmap(area.height));
    }

    let hints = [
        "[Enter] Send",
        "[↑↓] Recall",
        "[PgUp/PgDn] Scroll",
        "[Ctrl+N] New case",
        "[Ctrl+S] Stats",
        "[F1] Help",
        "[Esc] Quit",
    ];
    frame.render_widget(
        footer_line(app, &hints, app_layout.footer.width),
        app_layout.footer,
    );
}

fn render_input(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let colors = &app.theme.colors;
    let state = app.controller.state();
    let accepting = state.accepts_input();

    let title = if state.is_completed() {
        " Case closed "
    } else if state.is_in_flight() {
        " Waiting for the patient "
    } else {
        " Ask the patient "
    };
    let border = if accepting {
        colors.border_focused()
    } else {
        colors.border()
    };
    let block = Block::bordered()
        .title(title)
        .border_style(Style::default().fg(border));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let line = if app.input.is_empty() {
        let mut spans = vec![Span::styled(
            " ",
            Style::default().fg(colors.bg()).bg(colors.fg()),
        )];
        if let Some(placeholder) = app.input.placeholder() {
            spans.push(Span::styled(
                placeholder.to_string(),
                Style::default().fg(colors.text_muted()),
            ));
        }
        Line::from(spans)
    } else {
        let (before, cursor, after) = app.input.render_parts();
        let cursor = cursor.map(String::from).unwrap_or_else(|| " ".to_string());
        Line::from(vec![
            Span::styled(before.to_string(), Style::default().fg(colors.fg())),
            Span::styled(cursor, Style::default().fg(colors.bg()).bg(colors.fg())),
            Span::styled(after.to_string(), Style::default().fg(colors.fg())),
        ])
    };
    Paragraph::new(line)
        .wrap(Wrap { trim: false })
        .render(inner, frame.buffer_mut());
}

fn render_sidebar(frame: &mut ratatui::Frame, app: &App, area: Rect, with_heatmap: bool) {
    let stats = app.controller.stats();
    if with_heatmap {
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(8), Constraint::Length(HEATMAP_HEIGHT)])
            .split(area);
        frame.render_widget(StatsPanel::new(stats, app.theme), parts[0]);
        let today = app.controller.clock().today(chrono::Utc::now());
        frame.render_widget(
            ActivityHeatmap::new(&stats.game_history, today, app.theme),
            parts[1],
        );
    } else {
        frame.render_widget(StatsPanel::new(stats, app.theme), area);
    }
}

fn render_stats(frame: &mut ratatui::Frame, app: &App) {
    let area = centered_rect(70, 80, frame.area());
    let stats = app.controller.stats();
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(HEATMAP_HEIGHT)])
        .split(area);
    frame.render_widget(StatsPanel::new(stats, app.theme), parts[0]);
    let today = app.controller.clock().today(chrono::Utc::now());
    frame.render_widget(
        ActivityHeatmap::new(&stats.game_history, today, app.theme),
        parts[1],
    );
}

fn render_help(frame: &mut ratatui::Frame, app: &App) {
    let colors = &app.theme.colors;
    let area = centered_rect(60, 70, frame.area());

    let block = Block::bordered()
        .title(" Help ")
        .border_style(Style::default().fg(colors.accent()))
        .style(Style::default().bg(colors.bg()));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let rows = [
        ("Enter", "Send your question or guess"),
        ("Up / Down", "Recall earlier questions"),
        ("PgUp / PgDn", "Scroll the conversation"),
        ("Ctrl+N", "New random case once this one is finished"),
        ("Ctrl+S", "Your stats"),
        ("Ctrl+U / Ctrl+W", "Clear the line / delete a word"),
        ("Esc", "Quit (progress is saved)"),
    ];
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Name the diagnosis in the chat to make a guess.",
            Style::default().fg(colors.fg()),
        )),
        Line::from(""),
    ];
    for (keys, action) in rows {
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {keys:<18}"),
                Style::default()
                    .fg(colors.accent())
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(action, Style::default().fg(colors.fg())),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  [Esc] Back",
        Style::default().fg(colors.text_muted()),
    )));
    Paragraph::new(lines).render(inner, frame.buffer_mut());
}
