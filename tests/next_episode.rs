#[cfg(test)]
mod tests {
    use serde_json::json;
    use skipnext::config::Timings;
    use skipnext::controller::Controller;
    use skipnext::heuristics::HeuristicTable;
    use skipnext::models::ControlKind;
    use skipnext::next_episode::{find_next_episode_links, numeric_matches};
    use skipnext::page::Page;
    use skipnext::storage::{MemoryStore, SettingsStore, SharedStore};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn page(url: &str, body: &str) -> Page {
        Page::new(url, &format!("<html><head></head><body>{body}</body></html>")).unwrap()
    }

    fn controller(page: &mut Page, persisted: serde_json::Value) -> Controller {
        let mut store = MemoryStore::new();
        store.set(&persisted).unwrap();
        let shared: SharedStore = Rc::new(RefCell::new(store));
        Controller::inject(page, shared, Timings::default(), HeuristicTable::builtin()).unwrap()
    }

    fn count(page: &Page, css: &str) -> usize {
        page.main().select_css(css).unwrap().len()
    }

    #[test]
    fn test_numeric_successor_from_url() {
        let page = page(
            "https://anime.example/ver/serie-12",
            r#"<a href="/ver/serie-11">11</a><a href="/ver/serie-13">13</a>"#,
        );
        let links = find_next_episode_links(&page, &HeuristicTable::builtin());
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://anime.example/ver/serie-13"]);
        assert_eq!(links[0].label, "13");
    }

    #[test]
    fn test_cap_page_links_to_the_following_chapter() {
        let page = page(
            "https://anime.example/ver/cap-12.html",
            r#"<a href="cap-12.html#comments">Comments</a><a href="cap-13.html">13</a>"#,
        );
        let table = HeuristicTable::builtin();
        assert_eq!(table.episode_number(page.url().as_str()), Some(12));

        let numeric = numeric_matches(page.main(), &table, page.url().as_str());
        assert_eq!(numeric.len(), 1);
        assert_eq!(page.main().attr(numeric[0], "href").as_deref(), Some("cap-13.html"));

        let links = find_next_episode_links(&page, &table);
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://anime.example/ver/cap-13.html"]);
        assert_eq!(links[0].label, "13");
    }

    #[test]
    fn test_structural_matches_come_first_and_dedupe() {
        let page = page(
            "https://watch.example/show/episode-4",
            r#"<a href="/show/episode-5">5</a>
               <a class="next-episode" href="/show/episode-5">Next episode</a>
               <a rel="next" href="/show/episode-5">»</a>"#,
        );
        let links = find_next_episode_links(&page, &HeuristicTable::builtin());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://watch.example/show/episode-5");
    }

    #[test]
    fn test_self_links_and_empty_hrefs_are_dropped() {
        let page = page(
            "https://watch.example/show/ep-2",
            r#"<a class="next-episode" href="">x</a><a class="siguiente" href="/show/ep-2">same</a>"#,
        );
        assert!(find_next_episode_links(&page, &HeuristicTable::builtin()).is_empty());
    }

    #[test]
    fn test_extra_patterns_extend_the_table() {
        let page = page(
            "https://watch.example/watch?v=abc",
            r#"<a class="upnext-card" href="/watch?v=def">Continue</a>"#,
        );
        assert!(find_next_episode_links(&page, &HeuristicTable::builtin()).is_empty());

        let table = HeuristicTable::with_extra(&["a.upnext-card".to_string(), "a[".to_string()]);
        assert_eq!(table.rejected.len(), 1);
        let links = find_next_episode_links(&page, &table);
        assert_eq!(links[0].url, "https://watch.example/watch?v=def");
    }

    #[test]
    fn test_missing_next_shows_message() {
        let mut page = page(
            "https://watch.example/movie",
            "<div class=\"player\"><video></video></div>",
        );
        let mut controller = controller(&mut page, json!({"nextBehavior": "manual"}));
        controller.click_next(&mut page);

        assert_eq!(count(&page, "body > .snc-message"), 1);
        let message = controller.control(ControlKind::Message).unwrap();
        assert_eq!(page.main().text(message.node), "Next episode not found");
        assert!(page.navigations().is_empty());

        controller.advance(&mut page, Duration::from_millis(2999));
        assert_eq!(count(&page, ".snc-message"), 1);
        controller.advance(&mut page, Duration::from_millis(1));
        assert_eq!(count(&page, ".snc-message"), 0);
    }

    #[test]
    fn test_manual_next_navigates() {
        let mut page = page(
            "https://watch.example/show/ep-7",
            r#"<div class="player"><video></video></div><a href="/show/ep-8">Next</a>"#,
        );
        let mut controller = controller(&mut page, json!({"nextBehavior": "manual"}));
        controller.click_next(&mut page);
        assert_eq!(page.navigations(), ["https://watch.example/show/ep-8"]);
        assert!(page.is_unloading());
        assert_eq!(controller.stats().navigations, 1);
    }

    #[test]
    fn test_intercepted_click_falls_back_to_href() {
        let mut page = page(
            "https://watch.example/show/ep-7",
            r#"<div class="player"><video></video></div>
               <a class="next-episode" href="/show/ep-8" onclick="return router(this)">Next</a>"#,
        );
        let mut controller = controller(&mut page, json!({"nextBehavior": "manual"}));
        controller.click_next(&mut page);
        assert!(page.navigations().is_empty());

        controller.advance(&mut page, Duration::from_millis(99));
        assert!(page.navigations().is_empty());
        controller.advance(&mut page, Duration::from_millis(1));
        assert_eq!(page.navigations(), ["https://watch.example/show/ep-8"]);
    }

    #[test]
    fn test_auto_next_counts_down_and_navigates() {
        let mut page = page(
            "https://watch.example/show/ep-7",
            r#"<div class="player"><video></video></div><a href="/show/ep-8">8</a>"#,
        );
        let mut controller = controller(&mut page, json!({"nextBehavior": "auto"}));
        let video = controller.current_video().unwrap();
        page.load_media(video, 10.0);
        page.play(video);
        page.advance_playback(10.0);
        controller.advance(&mut page, Duration::ZERO);

        assert_eq!(controller.countdown(), Some(5));
        assert_eq!(count(&page, "body > .snc-auto-next-prompt"), 1);
        assert_eq!(page.main().text(page.main().first("#snc-countdown").unwrap()), "5");

        controller.advance(&mut page, Duration::from_secs(1));
        assert_eq!(controller.countdown(), Some(4));
        assert_eq!(page.main().text(page.main().first("#snc-countdown").unwrap()), "4");

        controller.advance(&mut page, Duration::from_secs(4));
        assert_eq!(controller.countdown(), None);
        assert_eq!(count(&page, ".snc-auto-next-prompt"), 0);
        assert_eq!(page.navigations(), ["https://watch.example/show/ep-8"]);
    }

    #[test]
    fn test_cancel_stops_the_countdown() {
        let mut page = page(
            "https://watch.example/show/ep-7",
            r#"<div class="player"><video></video></div><a href="/show/ep-8">8</a>"#,
        );
        let mut controller = controller(&mut page, json!({}));
        let video = controller.current_video().unwrap();
        page.load_media(video, 5.0);
        page.play(video);
        page.advance_playback(5.0);
        controller.advance(&mut page, Duration::from_secs(2));
        assert_eq!(controller.countdown(), Some(3));

        controller.cancel_auto_next(&mut page);
        controller.advance(&mut page, Duration::from_secs(10));
        assert_eq!(count(&page, ".snc-auto-next-prompt"), 0);
        assert!(page.navigations().is_empty());
    }

    #[test]
    fn test_manual_mode_ignores_ended() {
        let mut page = page(
            "https://watch.example/show/ep-7",
            r#"<div class="player"><video></video></div><a href="/show/ep-8">8</a>"#,
        );
        let mut controller = controller(&mut page, json!({"nextBehavior": "manual"}));
        let video = controller.current_video().unwrap();
        page.load_media(video, 5.0);
        page.play(video);
        page.advance_playback(5.0);
        controller.advance(&mut page, Duration::from_secs(1));
        assert_eq!(controller.countdown(), None);
        assert_eq!(count(&page, ".snc-auto-next-prompt"), 0);
    }

    #[test]
    fn test_prompt_ceiling_closes_a_stalled_countdown() {
        let timings = Timings {
            countdown_tick: Duration::from_secs(10),
            ..Timings::default()
        };
        let mut page = page(
            "https://watch.example/show/ep-7",
            r#"<div class="player"><video></video></div><a href="/show/ep-8">8</a>"#,
        );
        let shared: SharedStore = Rc::new(RefCell::new(MemoryStore::new()));
        let mut controller =
            Controller::inject(&mut page, shared, timings, HeuristicTable::builtin()).unwrap();
        let video = controller.current_video().unwrap();
        page.load_media(video, 5.0);
        page.play(video);
        page.advance_playback(5.0);
        controller.advance(&mut page, Duration::from_secs(6));

        assert_eq!(controller.countdown(), None);
        assert_eq!(count(&page, ".snc-auto-next-prompt"), 0);
        assert!(page.navigations().is_empty());
    }
}
