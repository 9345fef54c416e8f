use crate::config::{Config, Timings};
use crate::controller::Controller;
use crate::heuristics::HeuristicTable;
use crate::injector::{InjectError, TabHost, TabId, TabInfo, TabStatus, is_injectable_url};
use crate::logging;
use crate::page::Page;
use crate::storage::SharedStore;
use eyre::Result;
use std::time::Duration;

pub struct Tab {
    pub id: TabId,
    pub url: String,
    pub status: TabStatus,
    page: Option<Page>,
    controller: Option<Controller>,
}

impl Tab {
    pub fn info(&self) -> TabInfo {
        TabInfo {
            id: self.id,
            url: self.url.clone(),
            status: self.status,
        }
    }

    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    pub fn controller(&self) -> Option<&Controller> {
        self.controller.as_ref()
    }

    /// Page and overlay together, for driving interactions.
    pub fn parts_mut(&mut self) -> Option<(&mut Page, &mut Controller)> {
        match (self.page.as_mut(), self.controller.as_mut()) {
            (Some(page), Some(controller)) => Some((page, controller)),
            _ => None,
        }
    }
}

/// A navigation a page asked for; the host loads it and hands the page back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub tab: TabId,
    pub url: String,
}

/// Tabs, their pages and the overlay attached to each.
pub struct Browser {
    tabs: Vec<Tab>,
    next_id: TabId,
    store: SharedStore,
    timings: Timings,
    extra_next_patterns: Vec<String>,
}

impl Browser {
    pub fn new(store: SharedStore, config: &Config) -> Self {
        Self::with_timings(store, config.timings, config.extra_next_patterns.clone())
    }

    pub fn with_timings(
        store: SharedStore,
        timings: Timings,
        extra_next_patterns: Vec<String>,
    ) -> Self {
        Self {
            tabs: Vec::new(),
            next_id: 1,
            store,
            timings,
            extra_next_patterns,
        }
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Open a tab that is still loading `url`.
    pub fn open_tab(&mut self, url: &str) -> TabId {
        let id = self.next_id;
        self.next_id += 1;
        self.tabs.push(Tab {
            id,
            url: url.to_string(),
            status: TabStatus::Loading,
            page: None,
            controller: None,
        });
        id
    }

    /// Hand a loaded document to the tab. Any previous overlay is destroyed.
    pub fn finish_loading(&mut self, tab: TabId, page: Page) -> Result<()> {
        let tab = self
            .tab_mut(tab)
            .ok_or_else(|| eyre::eyre!("no tab with id {tab}"))?;
        if let (Some(old_page), Some(controller)) = (tab.page.as_mut(), tab.controller.as_mut()) {
            controller.destroy(old_page);
        }
        tab.url = page.url().to_string();
        tab.status = TabStatus::Complete;
        tab.page = Some(page);
        tab.controller = None;
        Ok(())
    }

    pub fn close_tab(&mut self, tab: TabId) {
        if let Some(index) = self.tabs.iter().position(|t| t.id == tab) {
            let mut closed = self.tabs.remove(index);
            if let Some((page, controller)) = closed.parts_mut() {
                controller.destroy(page);
            }
        }
    }

    pub fn tab(&self, tab: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == tab)
    }

    pub fn tab_mut(&mut self, tab: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == tab)
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|t| t.id).collect()
    }

    /// Start an overlay in the tab's page, whatever its scheme. A page that
    /// already has one keeps it.
    pub fn attach_overlay(&mut self, tab: TabId) -> std::result::Result<(), InjectError> {
        let store = self.store.clone();
        let timings = self.timings;
        let heuristics = HeuristicTable::with_extra(&self.extra_next_patterns);
        let tab = self.tab_mut(tab).ok_or(InjectError::NoSuchTab(tab))?;
        let page = tab.page.as_mut().ok_or(InjectError::NotLoaded(tab.id))?;
        if let Some(controller) = Controller::inject(page, store, timings, heuristics) {
            tab.controller = Some(controller);
        }
        Ok(())
    }

    /// Advance every tab's media and overlay by `dt`.
    pub fn advance(&mut self, dt: Duration) -> Vec<NavigationRequest> {
        let mut requests = Vec::new();
        for tab in &mut self.tabs {
            let Some(page) = tab.page.as_mut() else {
                continue;
            };
            page.advance_playback(dt.as_secs_f64());
            if let Some(controller) = tab.controller.as_mut() {
                controller.advance(page, dt);
            }
            if page.is_unloading() {
                if let Some(url) = page.navigations().last().cloned() {
                    logging::debug("browser", format!("tab {} navigating to {url}", tab.id));
                    requests.push(NavigationRequest {
                        tab: tab.id,
                        url: url.clone(),
                    });
                    tab.url = url;
                }
                tab.status = TabStatus::Loading;
                tab.page = None;
                tab.controller = None;
            }
        }
        requests
    }
}

impl TabHost for Browser {
    fn tabs(&self) -> Result<Vec<TabInfo>> {
        Ok(self.tabs.iter().map(Tab::info).collect())
    }

    fn ensure_loaded(&mut self, tab: TabId) -> std::result::Result<(), InjectError> {
        let url = self.tab(tab).ok_or(InjectError::NoSuchTab(tab))?.url.clone();
        if !is_injectable_url(&url) {
            return Err(InjectError::DisallowedScheme(url));
        }
        self.attach_overlay(tab)
    }
}
