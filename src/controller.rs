use crate::config::Timings;
use crate::detect::{discover_videos, select_best_video};
use crate::heuristics::HeuristicTable;
use crate::logging;
use crate::models::{ChangeNotification, ControlKind, ElementHandle, Scope, VideoRef};
use crate::next_episode::find_next_episode_links;
use crate::overlay::{
    self, COUNTDOWN_ID, STYLESHEET_HREF, STYLESHEET_ID, auto_next_prompt_markup,
    message_markup, next_button_markup, skip_button_markup, skip_feedback_markup,
};
use crate::page::Page;
use crate::panel::{PanelOutcome, SettingsPanel};
use crate::scheduler::{Scheduler, TimerId};
use crate::settings::{NextBehavior, Settings};
use crate::storage::SharedStore;
use std::collections::HashMap;
use std::time::Duration;

const COMPONENT: &str = "overlay";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Ready,
    Active(VideoRef),
    Destroyed,
}

/// What asked for a detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Initial,
    Poll,
    Mutation,
    Navigation,
    MediaEvent,
}

#[derive(Debug, Clone, PartialEq)]
enum Task {
    Detect(Trigger),
    WatchAddress,
    HoldElapsed,
    RemoveControl(ElementHandle),
    CountdownTick,
    PromptCeiling,
    NavigateFallback(ElementHandle),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub detections: u64,
    pub mounts: u64,
    pub unmounts: u64,
    pub navigations: u64,
}

/// A control that removes itself when its timer fires.
#[derive(Debug, Clone, Copy)]
struct TimedControl {
    node: ElementHandle,
    timer: TimerId,
}

#[derive(Debug, Default)]
struct MountedControls {
    container: Option<ElementHandle>,
    skip: Option<ElementHandle>,
    next: Option<ElementHandle>,
    feedback: Option<TimedControl>,
}

#[derive(Debug)]
struct AutoNextPrompt {
    node: ElementHandle,
    remaining: u32,
    tick: TimerId,
    ceiling: TimerId,
}

#[derive(Debug, Default)]
struct SkipPress {
    hold: Option<TimerId>,
    held: bool,
}

#[derive(Debug)]
struct OpenPanel {
    panel: SettingsPanel,
    node: ElementHandle,
}

/// Per-page overlay: finds the video, keeps the controls attached to it and
/// runs the skip / next / settings interactions.
pub struct Controller {
    state: Lifecycle,
    settings: Settings,
    store: SharedStore,
    timings: Timings,
    heuristics: HeuristicTable,
    scheduler: Scheduler<Task>,
    controls: MountedControls,
    ended_listener: Option<VideoRef>,
    prompt: Option<AutoNextPrompt>,
    press: Option<SkipPress>,
    panel: Option<OpenPanel>,
    message: Option<TimedControl>,
    debounce: HashMap<Trigger, TimerId>,
    intervals: Vec<TimerId>,
    last_url: String,
    stats: ControllerStats,
}

impl Controller {
    pub fn new(store: SharedStore, timings: Timings, heuristics: HeuristicTable) -> Self {
        Self {
            state: Lifecycle::Uninitialized,
            settings: Settings::default(),
            store,
            timings,
            heuristics,
            scheduler: Scheduler::new(),
            controls: MountedControls::default(),
            ended_listener: None,
            prompt: None,
            press: None,
            panel: None,
            message: None,
            debounce: HashMap::new(),
            intervals: Vec::new(),
            last_url: String::new(),
            stats: ControllerStats::default(),
        }
    }

    /// Construct and start a controller unless the page already has one.
    pub fn inject(
        page: &mut Page,
        store: SharedStore,
        timings: Timings,
        heuristics: HeuristicTable,
    ) -> Option<Self> {
        if !page.mark_injected() {
            logging::debug(COMPONENT, format!("page {:?} already has an overlay", page.id()));
            return None;
        }
        let mut controller = Self::new(store, timings, heuristics);
        controller.start(page);
        Some(controller)
    }

    pub fn start(&mut self, page: &mut Page) {
        if self.state != Lifecycle::Uninitialized {
            return;
        }
        self.settings = match self.store.borrow().load_settings() {
            Ok(settings) => settings,
            Err(err) => {
                logging::warn(COMPONENT, format!("could not load settings: {err:#}"));
                Settings::default()
            }
        };
        self.state = Lifecycle::Ready;
        self.last_url = page.url().to_string();
        page.link_stylesheet(STYLESHEET_ID, STYLESHEET_HREF);

        self.detect(page, Trigger::Initial);
        let poll = self
            .scheduler
            .set_interval(self.timings.poll_interval, Task::Detect(Trigger::Poll));
        let address = self
            .scheduler
            .set_interval(self.timings.address_poll, Task::WatchAddress);
        self.intervals = vec![poll, address];
        logging::info(COMPONENT, format!("overlay started on {}", self.last_url));
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn current_video(&self) -> Option<VideoRef> {
        match self.state {
            Lifecycle::Active(video) => Some(video),
            _ => None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn control(&self, kind: ControlKind) -> Option<ElementHandle> {
        match kind {
            ControlKind::SkipButton => self.controls.skip,
            ControlKind::NextButton => self.controls.next,
            ControlKind::SkipFeedback => self.controls.feedback.map(|t| t.node),
            ControlKind::AutoNextPrompt => self.prompt.as_ref().map(|p| p.node),
            ControlKind::Message => self.message.map(|t| t.node),
            ControlKind::SettingsPanel => self.panel.as_ref().map(|p| p.node),
        }
    }

    pub fn container(&self) -> Option<ElementHandle> {
        self.controls.container
    }

    pub fn countdown(&self) -> Option<u32> {
        self.prompt.as_ref().map(|p| p.remaining)
    }

    pub fn panel(&self) -> Option<&SettingsPanel> {
        self.panel.as_ref().map(|p| &p.panel)
    }

    fn is_live(&self) -> bool {
        !matches!(self.state, Lifecycle::Uninitialized | Lifecycle::Destroyed)
    }

    /// Run everything due within the next `dt`, handling page notifications
    /// before each timer.
    pub fn advance(&mut self, page: &mut Page, dt: Duration) {
        if !self.is_live() {
            return;
        }
        let until = self.scheduler.now() + dt;
        loop {
            self.process_notifications(page);
            if !self.is_live() {
                return;
            }
            let Some((_, task)) = self.scheduler.pop_due(until) else {
                break;
            };
            self.run_task(page, task);
        }
        self.scheduler.settle(until);
    }

    /// Drain the page's change notifications.
    pub fn process_notifications(&mut self, page: &mut Page) {
        for notification in page.drain_notifications() {
            if !self.is_live() {
                return;
            }
            match notification {
                ChangeNotification::ChildInserted { contains_video: true } => {
                    self.debounce(Trigger::Mutation, self.timings.mutation_debounce);
                }
                ChangeNotification::ChildInserted { .. } => {}
                ChangeNotification::MediaEvent { kind, target } => {
                    logging::trace(COMPONENT, format!("{kind:?} on {target}"));
                    self.debounce(Trigger::MediaEvent, self.timings.media_debounce);
                }
                ChangeNotification::Ended(video) => {
                    if self.ended_listener == Some(video) {
                        self.show_auto_next_prompt(page);
                    }
                }
                ChangeNotification::Unload => self.destroy(page),
            }
        }
    }

    fn debounce(&mut self, trigger: Trigger, delay: Duration) {
        if let Some(id) = self.debounce.remove(&trigger) {
            self.scheduler.cancel(id);
        }
        let id = self.scheduler.set_timeout(delay, Task::Detect(trigger));
        self.debounce.insert(trigger, id);
    }

    fn run_task(&mut self, page: &mut Page, task: Task) {
        match task {
            Task::Detect(trigger) => {
                if trigger != Trigger::Poll {
                    self.debounce.remove(&trigger);
                }
                self.detect(page, trigger);
            }
            Task::WatchAddress => {
                let url = page.url().to_string();
                if url != self.last_url {
                    logging::debug(COMPONENT, format!("address changed to {url}"));
                    self.last_url = url;
                    self.debounce(Trigger::Navigation, self.timings.address_settle);
                }
            }
            Task::HoldElapsed => {
                if let Some(press) = self.press.as_mut() {
                    press.hold = None;
                    press.held = true;
                }
                self.open_settings_panel(page);
            }
            Task::RemoveControl(handle) => {
                page.remove_element(handle);
                if self.controls.feedback.is_some_and(|t| t.node == handle) {
                    self.controls.feedback = None;
                }
                if self.message.is_some_and(|t| t.node == handle) {
                    self.message = None;
                }
            }
            Task::CountdownTick => self.countdown_tick(page),
            Task::PromptCeiling => self.close_prompt(page),
            Task::NavigateFallback(link) => {
                if page.is_unloading() {
                    return;
                }
                let target = page
                    .document(link.scope)
                    .and_then(|doc| doc.attr(link.node, "href"))
                    .filter(|href| !href.trim().is_empty())
                    .and_then(|href| page.resolve(&href));
                if let Some(url) = target {
                    logging::debug(COMPONENT, format!("click did not navigate, going to {url}"));
                    page.navigate(&url);
                }
            }
        }
    }

    /// One detection pass: discover, select, and re-attach when the best
    /// video changed.
    pub fn detect(&mut self, page: &mut Page, trigger: Trigger) {
        if !self.is_live() {
            return;
        }
        self.stats.detections += 1;
        let candidates = discover_videos(page);
        let best = select_best_video(&candidates, &page.viewport()).map(|c| c.video);

        match (best, self.current_video()) {
            (None, None) => {}
            (None, Some(previous)) => {
                logging::debug(COMPONENT, format!("video {previous} lost ({trigger:?})"));
                self.teardown(page);
                self.state = Lifecycle::Ready;
            }
            (Some(best), Some(current)) if best == current => {}
            (Some(best), _) => {
                logging::debug(
                    COMPONENT,
                    format!(
                        "selected {best} out of {} candidate(s) ({trigger:?})",
                        candidates.len()
                    ),
                );
                self.teardown(page);
                self.state = Lifecycle::Active(best);
                self.mount(page);
            }
        }
    }

    fn mount(&mut self, page: &mut Page) {
        let Some(video) = self.current_video() else {
            return;
        };
        let container = page
            .document(video.scope)
            .and_then(|doc| overlay::resolve_container(doc, video.node));
        let Some(container) = container else {
            logging::debug(COMPONENT, format!("no container for {video}"));
            return;
        };
        if let Some(doc) = page.document_mut(video.scope) {
            overlay::ensure_positioned(doc, container);
        }
        self.controls.container = Some(ElementHandle::new(video.scope, container));
        self.stats.mounts += 1;

        if self.settings.skip_button_enabled {
            self.create_skip_button(page);
        }
        if self.wants_next_button() {
            self.create_next_button(page);
        }
        self.setup_ended_listener();
    }

    fn wants_next_button(&self) -> bool {
        self.settings.next_behavior == NextBehavior::Manual && self.settings.next_button_enabled
    }

    fn insert_into_container(&mut self, page: &mut Page, markup: &str) -> Option<ElementHandle> {
        let container = self
            .controls
            .container
            .filter(|c| page.is_connected(*c))?;
        page.insert_html(container.scope, container.node, markup)
            .into_iter()
            .next()
            .map(|node| ElementHandle::new(container.scope, node))
    }

    fn insert_into_body(&mut self, page: &mut Page, markup: &str) -> Option<ElementHandle> {
        let body = page
            .main()
            .body()
            .unwrap_or_else(|| page.main().root_element());
        page.insert_html(Scope::Main, body, markup)
            .into_iter()
            .next()
            .map(ElementHandle::main)
    }

    fn create_skip_button(&mut self, page: &mut Page) {
        let markup = skip_button_markup(self.settings.skip_time);
        self.controls.skip = self.insert_into_container(page, &markup);
    }

    fn create_next_button(&mut self, page: &mut Page) {
        self.controls.next = self.insert_into_container(page, &next_button_markup());
    }

    fn setup_ended_listener(&mut self) {
        self.ended_listener = match self.settings.next_behavior {
            NextBehavior::Auto => self.current_video(),
            NextBehavior::Manual => None,
        };
    }

    /// Remove every mounted control; the video itself is left alone.
    pub fn teardown(&mut self, page: &mut Page) {
        let had_controls = self.controls.container.is_some();
        self.cancel_press();
        for handle in [self.controls.skip.take(), self.controls.next.take()]
            .into_iter()
            .flatten()
        {
            page.remove_element(handle);
        }
        if let Some(toast) = self.controls.feedback.take() {
            self.remove_timed(page, toast);
        }
        self.close_prompt(page);
        self.controls.container = None;
        self.ended_listener = None;
        if had_controls {
            self.stats.unmounts += 1;
        }
    }

    /// Page teardown. Terminal.
    pub fn destroy(&mut self, page: &mut Page) {
        if self.state == Lifecycle::Destroyed {
            return;
        }
        self.teardown(page);
        if let Some(open) = self.panel.take() {
            page.remove_element(open.node);
        }
        if let Some(message) = self.message.take() {
            self.remove_timed(page, message);
        }
        for id in self.intervals.drain(..) {
            self.scheduler.cancel(id);
        }
        self.debounce.clear();
        self.scheduler.clear();
        self.state = Lifecycle::Destroyed;
        logging::info(COMPONENT, "overlay destroyed");
    }

    /// Pointer down on the skip control: arms the hold timer.
    pub fn press_skip(&mut self) {
        if !self.is_live() || self.controls.skip.is_none() {
            return;
        }
        self.cancel_press();
        let hold = self
            .scheduler
            .set_timeout(self.timings.hold_threshold, Task::HoldElapsed);
        self.press = Some(SkipPress {
            hold: Some(hold),
            held: false,
        });
    }

    /// Pointer up: a short press skips, a completed hold already opened the panel.
    pub fn release_skip(&mut self, page: &mut Page) {
        let Some(press) = self.press.take() else {
            return;
        };
        if let Some(hold) = press.hold {
            self.scheduler.cancel(hold);
        }
        if !press.held {
            self.skip(page);
        }
    }

    /// Pointer left the control: the hold is abandoned, nothing fires.
    pub fn leave_skip(&mut self) {
        self.cancel_press();
    }

    pub fn click_skip(&mut self, page: &mut Page) {
        self.press_skip();
        self.release_skip(page);
    }

    fn cancel_press(&mut self) {
        if let Some(hold) = self.press.take().and_then(|p| p.hold) {
            self.scheduler.cancel(hold);
        }
    }

    /// Jump ahead by the configured amount, clamped to the duration.
    pub fn skip(&mut self, page: &mut Page) {
        let Some(video) = self.current_video() else {
            return;
        };
        let skip_time = f64::from(self.settings.skip_time);
        let Some(state) = page.media_mut(video) else {
            return;
        };
        if !state.has_duration() {
            logging::debug(COMPONENT, "skip ignored: duration unknown");
            return;
        }
        state.current_time = (state.current_time + skip_time).min(state.duration);
        self.show_skip_feedback(page);
    }

    fn show_skip_feedback(&mut self, page: &mut Page) {
        if let Some(previous) = self.controls.feedback.take() {
            self.remove_timed(page, previous);
        }
        let markup = skip_feedback_markup(self.settings.skip_time);
        if let Some(node) = self.insert_into_container(page, &markup) {
            let timer = self
                .scheduler
                .set_timeout(self.timings.feedback_lifetime, Task::RemoveControl(node));
            self.controls.feedback = Some(TimedControl { node, timer });
        }
    }

    fn remove_timed(&mut self, page: &mut Page, control: TimedControl) {
        self.scheduler.cancel(control.timer);
        page.remove_element(control.node);
    }

    pub fn click_next(&mut self, page: &mut Page) {
        if self.controls.next.is_some() {
            self.go_to_next(page);
        }
    }

    /// Follow the best next-episode link, or tell the user there is none.
    pub fn go_to_next(&mut self, page: &mut Page) {
        if !self.is_live() {
            return;
        }
        let links = find_next_episode_links(page, &self.heuristics);
        let Some(first) = links.into_iter().next() else {
            self.show_message(page, "Next episode not found");
            return;
        };
        self.stats.navigations += 1;
        logging::info(COMPONENT, format!("next episode: {}", first.url));
        self.scheduler.set_timeout(
            self.timings.navigation_fallback,
            Task::NavigateFallback(first.element),
        );
        page.click(first.element);
    }

    pub fn show_message(&mut self, page: &mut Page, text: &str) {
        if let Some(previous) = self.message.take() {
            self.remove_timed(page, previous);
        }
        if let Some(node) = self.insert_into_body(page, &message_markup(text)) {
            let timer = self
                .scheduler
                .set_timeout(self.timings.message_lifetime, Task::RemoveControl(node));
            self.message = Some(TimedControl { node, timer });
        }
    }

    fn show_auto_next_prompt(&mut self, page: &mut Page) {
        if self.prompt.is_some() {
            return;
        }
        let seconds = self.timings.countdown_seconds;
        let Some(node) = self.insert_into_body(page, &auto_next_prompt_markup(seconds)) else {
            return;
        };
        let tick = self
            .scheduler
            .set_interval(self.timings.countdown_tick, Task::CountdownTick);
        let ceiling = self
            .scheduler
            .set_timeout(self.timings.prompt_ceiling, Task::PromptCeiling);
        self.prompt = Some(AutoNextPrompt {
            node,
            remaining: seconds,
            tick,
            ceiling,
        });
    }

    fn countdown_tick(&mut self, page: &mut Page) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        prompt.remaining = prompt.remaining.saturating_sub(1);
        let remaining = prompt.remaining;
        let node = prompt.node;
        let counter = page.main().find_within(node.node, &format!("#{COUNTDOWN_ID}"));
        if let Some(counter) = counter {
            page.main_mut().set_text(counter, &remaining.to_string());
        }
        if remaining == 0 {
            self.close_prompt(page);
            self.go_to_next(page);
        }
    }

    /// Cancel button of the auto-next prompt.
    pub fn cancel_auto_next(&mut self, page: &mut Page) {
        self.close_prompt(page);
    }

    fn close_prompt(&mut self, page: &mut Page) {
        if let Some(prompt) = self.prompt.take() {
            self.scheduler.cancel(prompt.tick);
            self.scheduler.cancel(prompt.ceiling);
            page.remove_element(prompt.node);
        }
    }

    pub fn open_settings_panel(&mut self, page: &mut Page) {
        if !self.is_live() || self.panel.is_some() {
            return;
        }
        let panel = SettingsPanel::open(&self.settings);
        if let Some(node) = self.insert_into_body(page, &panel.markup()) {
            self.panel = Some(OpenPanel { panel, node });
        }
    }

    /// Apply an edit to the open panel, re-render it and act on the outcome.
    pub fn edit_panel<F>(&mut self, page: &mut Page, edit: F) -> Option<PanelOutcome>
    where
        F: FnOnce(&mut SettingsPanel) -> PanelOutcome,
    {
        let mut open = self.panel.take()?;
        let outcome = edit(&mut open.panel);
        page.remove_element(open.node);
        match outcome {
            PanelOutcome::Open => {
                if let Some(node) = self.insert_into_body(page, &open.panel.markup()) {
                    open.node = node;
                    self.panel = Some(open);
                }
            }
            PanelOutcome::Saved {
                skip_time,
                next_behavior,
            } => {
                let settings = Settings {
                    skip_time,
                    next_behavior,
                    ..self.settings.clone()
                };
                self.apply_settings(page, settings);
            }
            PanelOutcome::Closed => {}
        }
        Some(outcome)
    }

    /// Click on the panel backdrop.
    pub fn click_panel_backdrop(&mut self, page: &mut Page) {
        self.edit_panel(page, |_| PanelOutcome::Closed);
    }

    /// Adopt new settings, persist them and refresh the controls in place.
    pub fn apply_settings(&mut self, page: &mut Page, settings: Settings) {
        self.settings = settings;
        if let Err(err) = self.store.borrow_mut().save_settings(&self.settings) {
            logging::warn(COMPONENT, format!("could not save settings: {err:#}"));
        }
        self.update_buttons(page);
    }

    /// Re-label skip, add or drop next, refresh the ended listener.
    pub fn update_buttons(&mut self, page: &mut Page) {
        if self.current_video().is_none() {
            return;
        }
        match (self.settings.skip_button_enabled, self.controls.skip) {
            (true, Some(skip)) => {
                let label = self.settings.skip_label();
                if let Some(doc) = page.document_mut(skip.scope) {
                    doc.set_text(skip.node, &label);
                }
            }
            (true, None) => self.create_skip_button(page),
            (false, Some(skip)) => {
                page.remove_element(skip);
                self.controls.skip = None;
                self.cancel_press();
            }
            (false, None) => {}
        }
        match (self.wants_next_button(), self.controls.next) {
            (true, None) => self.create_next_button(page),
            (false, Some(next)) => {
                page.remove_element(next);
                self.controls.next = None;
            }
            _ => {}
        }
        self.setup_ended_listener();
    }
}
