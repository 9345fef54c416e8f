use crate::logging;
use crate::settings::Settings;
use crate::storage::SharedStore;
use eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use url::Url;

const COMPONENT: &str = "injector";

pub type TabId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub status: TabStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectError {
    DisallowedScheme(String),
    NoSuchTab(TabId),
    /// The tab has no document to inject into yet.
    NotLoaded(TabId),
}

impl fmt::Display for InjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectError::DisallowedScheme(url) => write!(f, "injection not allowed on {url}"),
            InjectError::NoSuchTab(id) => write!(f, "no tab with id {id}"),
            InjectError::NotLoaded(id) => write!(f, "tab {id} has no document"),
        }
    }
}

impl std::error::Error for InjectError {}

/// Browser side of injection: enumerate tabs, load the overlay into one.
pub trait TabHost {
    fn tabs(&self) -> Result<Vec<TabInfo>>;
    fn ensure_loaded(&mut self, tab: TabId) -> std::result::Result<(), InjectError>;
}

/// Only `http` and `https` documents get an overlay.
pub fn is_injectable_url(url: &str) -> bool {
    Url::parse(url)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectorStats {
    pub attempts: u64,
    pub failures: u64,
}

/// Reacts to browser lifecycle events by loading the overlay into pages.
/// Failures are logged and dropped; nothing is retried.
#[derive(Debug, Default)]
pub struct Injector {
    stats: InjectorStats,
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> InjectorStats {
        self.stats
    }

    pub fn on_installed(&self) {
        logging::info(COMPONENT, "skip & next overlay installed");
    }

    pub fn on_startup<H: TabHost>(&mut self, host: &mut H) -> usize {
        self.inject_all(host)
    }

    pub fn on_tab_updated<H: TabHost>(
        &mut self,
        host: &mut H,
        tab: TabId,
        status: TabStatus,
        url: &str,
    ) -> bool {
        if status != TabStatus::Complete || !is_injectable_url(url) {
            return false;
        }
        self.inject(host, tab)
    }

    /// Toolbar action on a tab.
    pub fn on_action_clicked<H: TabHost>(&mut self, host: &mut H, tab: &TabInfo) -> bool {
        if !is_injectable_url(&tab.url) {
            return false;
        }
        self.inject(host, tab.id)
    }

    pub fn inject<H: TabHost>(&mut self, host: &mut H, tab: TabId) -> bool {
        self.stats.attempts += 1;
        match host.ensure_loaded(tab) {
            Ok(()) => true,
            Err(err) => {
                self.stats.failures += 1;
                logging::debug(COMPONENT, format!("could not inject into tab {tab}: {err}"));
                false
            }
        }
    }

    /// Inject into every open http(s) tab; returns how many succeeded.
    pub fn inject_all<H: TabHost>(&mut self, host: &mut H) -> usize {
        let tabs = match host.tabs() {
            Ok(tabs) => tabs,
            Err(err) => {
                logging::error(COMPONENT, format!("error listing tabs: {err:#}"));
                return 0;
            }
        };
        tabs.iter()
            .filter(|tab| is_injectable_url(&tab.url))
            .filter(|tab| self.inject(host, tab.id))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetSettings,
    SaveSettings { settings: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Saved { success: bool },
    Settings(Value),
}

/// Answers settings requests from pages: exactly one response per request.
pub struct SettingsRelay {
    store: SharedStore,
}

impl SettingsRelay {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::GetSettings => {
                let stored = match self.store.borrow().get() {
                    Ok(value) => value,
                    Err(err) => {
                        logging::warn(COMPONENT, format!("settings read failed: {err:#}"));
                        None
                    }
                };
                Response::Settings(stored.unwrap_or_else(|| Value::Object(Default::default())))
            }
            Request::SaveSettings { settings } => {
                let success = match self.store.borrow_mut().set(&settings) {
                    Ok(()) => true,
                    Err(err) => {
                        logging::warn(COMPONENT, format!("settings write failed: {err:#}"));
                        false
                    }
                };
                Response::Saved { success }
            }
        }
    }

    /// JSON-in, JSON-out form of [`SettingsRelay::handle`].
    pub fn handle_json(&self, message: &str) -> Result<String> {
        let request: Request = serde_json::from_str(message)?;
        Ok(serde_json::to_string(&self.handle(request))?)
    }

    /// Effective settings as a page would see them after merging defaults.
    pub fn effective_settings(&self) -> Settings {
        match self.handle(Request::GetSettings) {
            Response::Settings(value) => Settings::from_persisted(Some(&value)),
            Response::Saved { .. } => Settings::default(),
        }
    }
}
