use crate::config::{Config, PLAYER_ROLES};
use crate::event::NetEvent;
use crate::session::controller::{Effect, Moment, Notice, SessionController};
use crate::session::state::Phase;
use crate::session::timer::format_time;
use crate::ui::line_input::{InputResult, LineInput};
use crate::ui::theme::Theme;
use crate::worker::Worker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppScreen {
    Welcome,
    Chat,
    Stats,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub kind: StatusKind,
}

pub struct App {
    pub screen: AppScreen,
    /// Where Esc on the stats/help overlays returns to.
    pub previous_screen: AppScreen,
    pub controller: SessionController,
    pub input: LineInput,
    pub theme: &'static Theme,
    pub config: Config,
    pub status: Option<StatusLine>,
    pub scroll_back: usize,
    pub role_selected: usize,
    pub focused: bool,
    pub should_quit: bool,
    worker: Option<Worker>,
    /// Effects produced while no worker is attached.
    pending: Vec<Effect>,
}

impl App {
    pub fn new(config: Config, controller: SessionController, theme: &'static Theme) -> Self {
        let role_selected = controller
            .player_role()
            .or(config.player_role.as_deref())
            .and_then(|role| PLAYER_ROLES.iter().position(|r| *r == role))
            .unwrap_or(0);
        Self {
            screen: AppScreen::Welcome,
            previous_screen: AppScreen::Welcome,
            controller,
            input: LineInput::default(),
            theme,
            config,
            status: None,
            scroll_back: 0,
            role_selected,
            focused: true,
            should_quit: false,
            worker: None,
            pending: Vec::new(),
        }
    }

    pub fn attach_worker(&mut self, worker: Worker) {
        for effect in self.pending.drain(..) {
            worker.dispatch(effect);
        }
        self.worker = Some(worker);
    }

    /// Effects that are waiting for a worker.
    pub fn take_pending(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.pending)
    }

    pub fn boot(&mut self) {
        let effects = self.controller.boot(Moment::now());
        if matches!(self.controller.state().phase(), Phase::Active | Phase::Completed) {
            self.screen = AppScreen::Chat;
            self.sync_placeholder();
            let text = if self.controller.state().is_completed() {
                "Today's case is finished. Press Ctrl+N for another."
            } else {
                "Welcome back. Today's case is still open."
            };
            self.set_status(StatusKind::Info, text);
        }
        self.run(effects);
    }

    fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify(notice) => self.notify(notice),
                other => match self.worker.as_ref() {
                    Some(worker) => worker.dispatch(other),
                    None => self.pending.push(other),
                },
            }
        }
    }

    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::Solved(summary) => {
                let mut text = format!(
                    "Correct! Solved in {}. Streak: {} day{}.",
                    format_time(summary.final_time_seconds),
                    summary.consecutive_play_streak,
                    if summary.consecutive_play_streak == 1 { "" } else { "s" },
                );
                if summary.new_personal_best {
                    text.push_str(" New personal best!");
                }
                self.set_status(StatusKind::Success, text);
            }
            Notice::Failed { disease } => {
                let text = match disease {
                    Some(d) if !d.is_empty() => format!("Not this time. The diagnosis was {d}."),
                    _ => "Not this time.".to_string(),
                };
                self.set_status(StatusKind::Error, text);
            }
            Notice::Error(message) => self.set_status(StatusKind::Error, message),
        }
    }

    pub fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(StatusLine {
            text: text.into(),
            kind,
        });
    }

    pub fn selected_role(&self) -> &'static str {
        PLAYER_ROLES[self.role_selected.min(PLAYER_ROLES.len() - 1)]
    }

    pub fn cycle_role(&mut self, forward: bool) {
        let len = PLAYER_ROLES.len();
        self.role_selected = if forward {
            (self.role_selected + 1) % len
        } else {
            (self.role_selected + len - 1) % len
        };
    }

    /// The welcome screen's start action: remember the role and open the case.
    pub fn start_game(&mut self) {
        let role = self.selected_role();
        self.controller.set_player_role(role);
        self.input.reset();
        self.scroll_back = 0;
        match self.controller.start_game(Moment::now()) {
            Ok(effects) => {
                self.screen = AppScreen::Chat;
                self.status = None;
                if self.controller.state().phase() == Phase::Preloading {
                    self.set_status(StatusKind::Info, "Loading your case...");
                }
                self.sync_placeholder();
                self.run(effects);
            }
            Err(e) => self.set_status(StatusKind::Error, e.to_string()),
        }
    }

    pub fn handle_input_key(&mut self, key: crossterm::event::KeyEvent) {
        match self.input.handle(key) {
            InputResult::Submit => self.submit(),
            InputResult::Cancel => self.should_quit = true,
            InputResult::Continue => {}
        }
    }

    pub fn submit(&mut self) {
        if self.input.value().trim().is_empty() {
            return;
        }
        if !self.controller.state().accepts_input() {
            if self.controller.state().is_completed() {
                self.set_status(StatusKind::Info, "This case is finished. Press Ctrl+N for a new one.");
            }
            return;
        }
        let text = self.input.take();
        match self.controller.submit_message(&text, Moment::now()) {
            Ok(effects) => {
                self.scroll_back = 0;
                self.status = None;
                self.run(effects);
            }
            Err(e) => self.set_status(StatusKind::Error, e.to_string()),
        }
    }

    pub fn new_case(&mut self) {
        match self.controller.new_random_case() {
            Ok(effects) => {
                self.input.reset();
                self.scroll_back = 0;
                self.screen = AppScreen::Chat;
                self.set_status(StatusKind::Info, "Fetching a new case...");
                self.run(effects);
            }
            Err(e) => self.set_status(StatusKind::Error, e.to_string()),
        }
    }

    pub fn on_net(&mut self, event: NetEvent) {
        let now = Moment::now();
        let effects = match event {
            NetEvent::CaseLoaded(result) => {
                let ok = result.is_ok();
                let effects = self.controller.on_case_loaded(result, now);
                if ok {
                    self.sync_placeholder();
                    if self.controller.state().phase() == Phase::Active {
                        self.status = None;
                    }
                }
                effects
            }
            NetEvent::StreamChunk(request, chunk) => {
                self.controller.on_stream_chunk(request, &chunk, now)
            }
            NetEvent::StreamFinished(request) => self.controller.on_stream_finished(request, now),
            NetEvent::StreamFailed(request, err) => {
                self.controller.on_stream_failed(request, err, now)
            }
            NetEvent::RequestFailed(request, err) => {
                self.controller.on_request_failed(request, err)
            }
        };
        self.run(effects);
    }

    pub fn on_focus(&mut self, focused: bool) {
        self.focused = focused;
        self.controller
            .set_focused(std::time::Instant::now(), focused);
    }

    pub fn on_tick(&mut self) {
        self.controller.tick(std::time::Instant::now());
    }

    pub fn show_overlay(&mut self, screen: AppScreen) {
        if self.screen != screen {
            if matches!(self.screen, AppScreen::Welcome | AppScreen::Chat) {
                self.previous_screen = self.screen;
            }
            self.screen = screen;
        }
    }

    pub fn close_overlay(&mut self) {
        self.screen = self.previous_screen;
    }

    pub fn scroll(&mut self, up: bool, lines: usize) {
        self.scroll_back = if up {
            self.scroll_back.saturating_add(lines)
        } else {
            self.scroll_back.saturating_sub(lines)
        };
    }

    fn sync_placeholder(&mut self) {
        let snippet = self
            .controller
            .state()
            .case()
            .and_then(|c| c.placeholder_snippet.clone());
        self.input.set_placeholder(snippet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CaseContext;
    use crate::engine::ReferenceClock;

    fn app() -> App {
        let theme: &'static Theme = Box::leak(Box::new(Theme::default()));
        let controller = SessionController::new(None, ReferenceClock::default(), None);
        App::new(Config::default(), controller, theme)
    }

    fn case() -> CaseContext {
        CaseContext {
            disease: "Pheochromocytoma".to_string(),
            case: "A 40 year old with episodic headaches".to_string(),
            placeholder_snippet: Some("Ask about palpitations".to_string()),
        }
    }

    fn type_text(app: &mut App, text: &str) {
        app.input.insert_str(text);
    }

    #[test]
    fn test_boot_queues_case_fetch_until_worker() {
        let mut app = app();
        app.boot();
        assert_eq!(app.screen, AppScreen::Welcome);
        assert_eq!(app.take_pending(), vec![Effect::FetchCase { custom: None }]);
    }

    #[test]
    fn test_start_before_case_arrives_then_chat() {
        let mut app = app();
        app.boot();
        app.start_game();
        assert_eq!(app.screen, AppScreen::Chat);
        assert_eq!(app.controller.player_role(), Some(PLAYER_ROLES[0]));
        app.on_net(NetEvent::CaseLoaded(Ok(case())));
        assert_eq!(app.controller.state().phase(), Phase::Active);
        assert_eq!(app.input.placeholder(), Some("Ask about palpitations"));
        assert_eq!(app.status, None);
    }

    #[test]
    fn test_full_round_trip_through_events() {
        let mut app = app();
        app.boot();
        app.on_net(NetEvent::CaseLoaded(Ok(case())));
        app.start_game();
        app.take_pending();

        type_text(&mut app, "Is it a pheochromocytoma?");
        app.submit();
        assert!(app.input.is_empty());
        let pending = app.take_pending();
        let [Effect::Ask { request, .. }] = pending[..] else {
            panic!("expected an ask, got {pending:?}");
        };

        app.on_net(NetEvent::StreamChunk(request, "%%% **Correct**".to_string()));
        assert_eq!(
            app.status.as_ref().map(|s| s.kind),
            Some(StatusKind::Success)
        );
        app.on_net(NetEvent::StreamFinished(request));
        assert!(matches!(
            app.take_pending()[..],
            [Effect::SaveConversation(_)]
        ));

        type_text(&mut app, "one more");
        app.submit();
        assert_eq!(app.input.value(), "one more");
        assert_eq!(
            app.status.as_ref().map(|s| s.kind),
            Some(StatusKind::Info)
        );

        app.new_case();
        assert!(matches!(
            app.take_pending()[..],
            [Effect::FetchRandomCase { .. }]
        ));
    }

    #[test]
    fn test_failed_load_surfaces_error_on_start() {
        let mut app = app();
        app.boot();
        app.on_net(NetEvent::CaseLoaded(Err(crate::api::ApiError::Status(503))));
        app.start_game();
        assert_eq!(app.screen, AppScreen::Welcome);
        let status = app.status.clone().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert!(status.text.contains("failed to load"));
    }

    #[test]
    fn test_role_cycles_both_ways() {
        let mut app = app();
        app.cycle_role(false);
        assert_eq!(app.selected_role(), *PLAYER_ROLES.last().unwrap());
        app.cycle_role(true);
        assert_eq!(app.selected_role(), PLAYER_ROLES[0]);
    }

    #[test]
    fn test_overlays_return_to_previous_screen() {
        let mut app = app();
        app.screen = AppScreen::Chat;
        app.show_overlay(AppScreen::Stats);
        app.show_overlay(AppScreen::Help);
        app.close_overlay();
        assert_eq!(app.screen, AppScreen::Chat);
    }
}
