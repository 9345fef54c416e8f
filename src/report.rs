use crate::config::Config;
use crate::controller::Controller;
use crate::detect::{Candidate, discover_videos, select_best_video};
use crate::heuristics::HeuristicTable;
use crate::models::{ControlKind, NextLink};
use crate::next_episode::find_next_episode_links;
use crate::page::Page;
use crate::storage::SharedStore;
use serde::Serialize;
use std::fmt;

/// What the overlay makes of one page: its videos, the one it picked, where
/// the controls went and which link "next" would follow.
#[derive(Debug, Serialize)]
pub struct PageReport {
    pub url: String,
    pub videos: Vec<Candidate>,
    pub selected: Option<usize>,
    pub container: Option<String>,
    pub controls: Vec<ControlKind>,
    pub next_links: Vec<NextLink>,
    pub rejected_patterns: Vec<String>,
}

impl PageReport {
    /// Run one overlay pass over `page` and tear it down again.
    pub fn build(page: &mut Page, store: SharedStore, config: &Config) -> Self {
        let heuristics = HeuristicTable::with_extra(&config.extra_next_patterns);
        let rejected_patterns = heuristics
            .rejected
            .iter()
            .map(|err| err.to_string())
            .collect();
        let videos = discover_videos(page);
        let selected = select_best_video(&videos, &page.viewport())
            .and_then(|best| videos.iter().position(|c| c.video == best.video));
        let next_links = find_next_episode_links(page, &heuristics);

        let mut container = None;
        let mut controls = Vec::new();
        if let Some(mut controller) = Controller::inject(page, store, config.timings, heuristics) {
            container = controller.container().and_then(|handle| {
                let doc = page.document(handle.scope)?;
                let tag = doc.tag_name(handle.node)?;
                let class_name = doc.class_name(handle.node);
                Some(if class_name.is_empty() {
                    tag
                } else {
                    format!("{tag}.{}", class_name.split_whitespace().collect::<Vec<_>>().join("."))
                })
            });
            controls = [ControlKind::SkipButton, ControlKind::NextButton]
                .into_iter()
                .filter(|kind| controller.control(*kind).is_some())
                .collect();
            controller.destroy(page);
        }

        Self {
            url: page.url().to_string(),
            videos,
            selected,
            container,
            controls,
            next_links,
            rejected_patterns,
        }
    }
}

impl fmt::Display for PageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "page: {}", self.url)?;
        writeln!(f, "videos: {}", self.videos.len())?;
        for (index, video) in self.videos.iter().enumerate() {
            let marker = if self.selected == Some(index) { "*" } else { " " };
            let state = if video.state.ended {
                "ended"
            } else if video.is_playing() {
                "playing"
            } else {
                "paused"
            };
            writeln!(
                f,
                " {marker} [{index}] {} {}x{} at y={} {state}",
                video.scope, video.layout.width, video.layout.height, video.layout.y
            )?;
        }
        match &self.container {
            Some(container) => writeln!(f, "container: {container}")?,
            None => writeln!(f, "container: none")?,
        }
        let controls: Vec<&str> = self.controls.iter().map(|k| k.class_name()).collect();
        let controls = if controls.is_empty() {
            "none".to_string()
        } else {
            controls.join(", ")
        };
        writeln!(f, "controls: {controls}")?;
        if self.next_links.is_empty() {
            writeln!(f, "next episode: not found")?;
        } else {
            writeln!(f, "next episode:")?;
            for link in &self.next_links {
                writeln!(f, "  {} {:?}", link.url, link.label)?;
            }
        }
        for rejected in &self.rejected_patterns {
            writeln!(f, "rejected pattern: {rejected}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    #[test]
    fn test_report_marks_selection_and_controls() {
        let mut page = Page::new(
            "https://watch.example/show/cap-12",
            r#"<html><head></head><body>
                <div class="player-wrap"><video id="main"></video></div>
                <a href="/show/cap-13">Siguiente</a>
            </body></html>"#,
        )
        .unwrap();
        let config = Config::in_dir(PathBuf::from("/nonexistent"));
        let store: SharedStore = Rc::new(RefCell::new(MemoryStore::new()));
        let report = PageReport::build(&mut page, store, &config);

        assert_eq!(report.videos.len(), 1);
        assert_eq!(report.selected, Some(0));
        assert_eq!(report.container.as_deref(), Some("div.player-wrap"));
        assert_eq!(report.controls, vec![ControlKind::SkipButton]);
        assert_eq!(report.next_links[0].url, "https://watch.example/show/cap-13");
        assert!(page.main().first(".snc-skip-button").is_none());

        let text = report.to_string();
        assert!(text.contains("* [0] main"));
        assert!(text.contains("https://watch.example/show/cap-13"));
    }
}
