use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::browser::Browser;
use crate::config::Config;
use crate::controller::{Controller, Trigger};
use crate::detect::discover_videos;
use crate::injector::{Injector, TabId, TabStatus};
use crate::loader;
use crate::logging;
use crate::page::Page;
use crate::panel::{PanelField, PanelOutcome};
use crate::storage::open_settings_store;
use crate::ui::board::Board;
use crate::ui::windows::{help::HelpWindow, prompt::PromptWindow, settings::SettingsWindow};

const COMPONENT: &str = "session";
const MESSAGE_LIFETIME: Duration = Duration::from_secs(3);
const FRAME_INTERVAL: Duration = Duration::from_millis(100);
/// Seconds before the end that `e` seeks to.
const NEAR_END: f64 = 3.0;

/// Everything the watch session knows, apart from the terminal.
pub struct SessionState {
    pub browser: Browser,
    pub injector: Injector,
    pub config: Config,
    pub active_tab: Option<TabId>,
    pub should_quit: bool,
    pub show_help: bool,
    pub skip_pressed: bool,
    pub message: Option<String>,
    pub message_time: Option<Instant>,
}

impl SessionState {
    pub fn new(browser: Browser, config: Config) -> Self {
        Self {
            browser,
            injector: Injector::new(),
            config,
            active_tab: None,
            should_quit: false,
            show_help: false,
            skip_pressed: false,
            message: None,
            message_time: None,
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
        self.message_time = Some(Instant::now());
    }

    pub fn message_expired(&self) -> bool {
        self.message_time
            .map(|t| t.elapsed() >= MESSAGE_LIFETIME)
            .unwrap_or(false)
    }

    pub fn clear_message(&mut self) {
        self.message = None;
        self.message_time = None;
    }

    /// Open one tab per source; the first becomes active.
    pub fn open(&mut self, sources: &[String]) -> eyre::Result<()> {
        for source in sources {
            let url = loader::source_url(source)?;
            let tab = self.browser.open_tab(url.as_str());
            self.active_tab.get_or_insert(tab);
            self.load(tab, url.as_str());
        }
        Ok(())
    }

    /// Fetch `source` into `tab`. Failures leave the tab loading.
    pub fn load(&mut self, tab: TabId, source: &str) {
        match loader::load_page(source, self.config.viewport) {
            Ok(page) => self.load_page(tab, page),
            Err(err) => {
                logging::warn(COMPONENT, format!("could not load {source}: {err:#}"));
                self.set_message(format!("Could not load {source}"));
            }
        }
    }

    /// Hand a parsed page to `tab`, give its videos metadata and attach the overlay.
    pub fn load_page(&mut self, tab: TabId, mut page: Page) {
        for candidate in discover_videos(&page) {
            if !candidate.state.has_duration() {
                page.load_media(candidate.video, self.config.media_duration_secs);
            }
        }
        let url = page.url().clone();
        if let Err(err) = self.browser.finish_loading(tab, page) {
            logging::warn(COMPONENT, format!("{err:#}"));
            return;
        }
        // Local files were opened explicitly, so they get the overlay as well.
        let attached = if url.scheme() == "file" {
            self.browser.attach_overlay(tab).is_ok()
        } else {
            self.injector
                .on_tab_updated(&mut self.browser, tab, TabStatus::Complete, url.as_str())
        };
        if !attached {
            self.set_message(format!("Overlay not attached to {url}"));
        }
    }

    /// Advance the browser by `dt` and load whatever pages asked to navigate.
    pub fn tick(&mut self, dt: Duration) {
        for request in self.browser.advance(dt) {
            logging::info(COMPONENT, format!("tab {} -> {}", request.tab, request.url));
            self.load(request.tab, &request.url);
        }
    }

    fn with_overlay<R>(&mut self, f: impl FnOnce(&mut Page, &mut Controller) -> R) -> Option<R> {
        let tab = self.active_tab?;
        let (page, controller) = self.browser.tab_mut(tab)?.parts_mut()?;
        Some(f(page, controller))
    }

    fn controller(&self) -> Option<&Controller> {
        self.browser.tab(self.active_tab?)?.controller()
    }

    pub fn panel_open(&self) -> bool {
        self.controller().and_then(Controller::panel).is_some()
    }

    fn cycle_tab(&mut self, forward: bool) {
        let ids = self.browser.tab_ids();
        if ids.is_empty() {
            return;
        }
        let current = self
            .active_tab
            .and_then(|tab| ids.iter().position(|id| *id == tab))
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % ids.len()
        } else {
            (current + ids.len() - 1) % ids.len()
        };
        self.active_tab = Some(ids[next]);
    }

    fn release_skip(&mut self) {
        self.skip_pressed = false;
        self.with_overlay(|page, controller| controller.release_skip(page));
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.show_help {
            if matches!(key.code, KeyCode::Char('q') | KeyCode::Char('?') | KeyCode::Esc) {
                self.show_help = false;
            }
            return;
        }

        // Any key other than `x` ends a pending press; `h` ends it and nothing else.
        if self.skip_pressed {
            match key.code {
                KeyCode::Char('x') => {}
                KeyCode::Char('h') => {
                    self.release_skip();
                    return;
                }
                _ => self.release_skip(),
            }
        }

        if self.panel_open() {
            self.handle_panel_keys(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char(']') => self.cycle_tab(true),
            KeyCode::Char('[') => self.cycle_tab(false),
            KeyCode::Char(' ') => {
                self.with_overlay(|page, controller| {
                    let Some(video) = controller.current_video() else {
                        return;
                    };
                    match page.media(video) {
                        Some(state) if state.is_playing() => page.pause(video),
                        Some(_) => page.play(video),
                        None => {}
                    }
                });
            }
            KeyCode::Char('e') => {
                self.with_overlay(|page, controller| {
                    let Some(video) = controller.current_video() else {
                        return;
                    };
                    if let Some(state) = page.media(video) {
                        if state.has_duration() {
                            page.seek(video, (state.duration - NEAR_END).max(0.0));
                        }
                    }
                });
            }
            KeyCode::Char('s') => {
                self.with_overlay(|page, controller| controller.click_skip(page));
            }
            KeyCode::Char('h') => {
                if self.with_overlay(|_, controller| controller.press_skip()).is_some() {
                    self.skip_pressed = true;
                }
            }
            KeyCode::Char('x') => {
                self.skip_pressed = false;
                self.with_overlay(|_, controller| controller.leave_skip());
            }
            KeyCode::Char('n') => {
                self.with_overlay(|page, controller| controller.click_next(page));
            }
            KeyCode::Char('N') => {
                self.with_overlay(|page, controller| controller.go_to_next(page));
            }
            KeyCode::Char('c') => {
                self.with_overlay(|page, controller| controller.cancel_auto_next(page));
            }
            KeyCode::Char('o') => {
                self.with_overlay(|page, controller| controller.open_settings_panel(page));
            }
            KeyCode::Char('r') => {
                self.with_overlay(|page, controller| controller.detect(page, Trigger::Poll));
            }
            _ => {}
        }
    }

    fn handle_panel_keys(&mut self, key: KeyEvent) {
        let outcome = self.with_overlay(|page, controller| match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                controller.click_panel_backdrop(page);
                Some(PanelOutcome::Closed)
            }
            KeyCode::Tab | KeyCode::Down | KeyCode::Char('j') => {
                controller.edit_panel(page, |panel| {
                    panel.focus_next();
                    PanelOutcome::Open
                })
            }
            KeyCode::BackTab | KeyCode::Up | KeyCode::Char('k') => {
                controller.edit_panel(page, |panel| {
                    panel.focus_prev();
                    PanelOutcome::Open
                })
            }
            KeyCode::Left | KeyCode::Right => {
                let steps = if key.code == KeyCode::Left { -1 } else { 1 };
                controller.edit_panel(page, |panel| {
                    if panel.focused() == PanelField::Slider {
                        panel.step_slider(steps);
                    }
                    PanelOutcome::Open
                })
            }
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                controller.edit_panel(page, |panel| {
                    panel.apply_preset(index);
                    PanelOutcome::Open
                })
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                controller.edit_panel(page, |panel| panel.activate())
            }
            _ => None,
        });
        if let Some(Some(PanelOutcome::Saved { skip_time, .. })) = outcome {
            self.set_message(format!("Settings saved: skip {skip_time}s"));
        }
    }

    /// Destroy every overlay, as closing the browser would.
    pub fn shutdown(&mut self) {
        for tab in self.browser.tab_ids() {
            self.browser.close_tab(tab);
        }
        self.active_tab = None;
    }
}

/// Interactive session: open pages in tabs and drive the overlay from the keyboard.
pub struct Session {
    state: Rc<RefCell<SessionState>>,
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl Session {
    pub fn new(config: Config) -> eyre::Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;

        let store = open_settings_store(&config.storage_path);
        logging::debug(COMPONENT, format!("settings store: {}", store.borrow().kind()));
        let browser = Browser::new(store, &config);
        let state = SessionState::new(browser, config);
        state.injector.on_installed();

        Ok(Self {
            state: Rc::new(RefCell::new(state)),
            terminal,
        })
    }

    pub fn open(&mut self, sources: &[String]) -> eyre::Result<()> {
        self.state.borrow_mut().open(sources)
    }

    /// Run the main application loop
    pub fn run(&mut self) -> eyre::Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(io::stdout(), crossterm::terminal::EnterAlternateScreen)?;

        self.terminal.clear()?;
        self.terminal.hide_cursor()?;

        let mut last_tick = Instant::now();
        loop {
            if self.state.borrow().should_quit {
                break;
            }

            {
                let mut state = self.state.borrow_mut();
                if state.message_expired() {
                    state.clear_message();
                }
                let now = Instant::now();
                state.tick(now - last_tick);
                last_tick = now;
            }

            {
                let state = self.state.clone();
                self.terminal.draw(|f| {
                    let state_ref = state.borrow();
                    Self::render_static(f, &state_ref);
                })?;
            }

            if !crossterm::event::poll(FRAME_INTERVAL)? {
                continue;
            }

            if let Ok(Event::Key(key)) = crossterm::event::read() {
                if key.kind == KeyEventKind::Press {
                    self.state.borrow_mut().handle_key(key);
                }
            }
        }

        self.state.borrow_mut().shutdown();

        self.terminal.clear()?;
        self.terminal.show_cursor()?;
        crossterm::execute!(io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
        crossterm::terminal::disable_raw_mode()?;

        Ok(())
    }

    fn render_static(frame: &mut Frame, state: &SessionState) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(frame.area());

        let mut tabs = Vec::new();
        for id in state.browser.tab_ids() {
            let Some(tab) = state.browser.tab(id) else {
                continue;
            };
            let style = if Some(id) == state.active_tab {
                Style::default().bg(Color::Blue).fg(Color::White)
            } else {
                Style::default()
            };
            let status = match tab.status {
                TabStatus::Loading => " (loading)",
                TabStatus::Complete => "",
            };
            tabs.push(Span::styled(format!(" {id}: {}{status} ", tab.url), style));
        }
        frame.render_widget(Paragraph::new(Line::from(tabs)), rows[0]);

        let active = state.active_tab.and_then(|id| state.browser.tab(id));
        Board::render(frame, rows[1], active);

        let status = match &state.message {
            Some(message) => Line::from(message.as_str()),
            None => Line::from(Span::styled(
                "? help | s skip | n next | o settings | q quit",
                Style::default().fg(Color::DarkGray),
            )),
        };
        frame.render_widget(Paragraph::new(status), rows[2]);

        let controller = active.and_then(|tab| tab.controller());
        if let Some(remaining) = controller.and_then(Controller::countdown) {
            PromptWindow::render(frame, frame.area(), remaining);
        }
        if let Some(panel) = controller.and_then(Controller::panel) {
            SettingsWindow::render(frame, frame.area(), panel);
        }
        if state.show_help {
            HelpWindow::render(frame, frame.area());
        }
    }
}
