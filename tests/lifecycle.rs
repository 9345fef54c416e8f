#[cfg(test)]
mod tests {
    use skipnext::config::Timings;
    use skipnext::controller::{Controller, Lifecycle};
    use skipnext::heuristics::HeuristicTable;
    use skipnext::models::{ControlKind, LayoutBox, Scope, VideoRef};
    use skipnext::overlay::STYLESHEET_ID;
    use skipnext::page::Page;
    use skipnext::storage::{MemoryStore, SharedStore};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    const PLAYER_PAGE: &str = r#"<html><head></head><body>
        <div class="video-player"><video id="v1"></video></div>
    </body></html>"#;

    fn store() -> SharedStore {
        Rc::new(RefCell::new(MemoryStore::new()))
    }

    fn page(html: &str) -> Page {
        Page::new("https://watch.example/show/ep-1", html).unwrap()
    }

    fn start_with(page: &mut Page, timings: Timings) -> Controller {
        Controller::inject(page, store(), timings, HeuristicTable::builtin()).unwrap()
    }

    fn start(page: &mut Page) -> Controller {
        start_with(page, Timings::default())
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn count(page: &Page, css: &str) -> usize {
        page.main().select_css(css).unwrap().len()
    }

    #[test]
    fn test_injection_activates_on_the_only_video() {
        let mut page = page(PLAYER_PAGE);
        let controller = start(&mut page);
        let video = VideoRef::main(page.main().first("#v1").unwrap());

        assert_eq!(controller.state(), Lifecycle::Active(video));
        assert_eq!(count(&page, ".video-player > .snc-skip-button"), 1);
        assert_eq!(count(&page, &format!("head > #{STYLESHEET_ID}")), 1);
        let skip = controller.control(ControlKind::SkipButton).unwrap();
        assert_eq!(page.main().text(skip.node), "Skip 85s");
    }

    #[test]
    fn test_second_injection_is_refused() {
        let mut page = page(PLAYER_PAGE);
        assert!(!page.is_injected());
        let _first = start(&mut page);
        assert!(page.is_injected());
        let second =
            Controller::inject(&mut page, store(), Timings::default(), HeuristicTable::builtin());
        assert!(second.is_none());
        assert_eq!(count(&page, ".snc-skip-button"), 1);
        assert_eq!(count(&page, &format!("#{STYLESHEET_ID}")), 1);
    }

    #[test]
    fn test_polling_does_not_remount() {
        let mut page = page(PLAYER_PAGE);
        let mut controller = start(&mut page);
        controller.advance(&mut page, Duration::from_secs(10));

        let stats = controller.stats();
        assert_eq!(stats.detections, 6);
        assert_eq!(stats.mounts, 1);
        assert_eq!(stats.unmounts, 0);
        assert_eq!(count(&page, ".snc-skip-button"), 1);
    }

    #[test]
    fn test_empty_page_waits_in_ready() {
        let mut page = page("<html><head></head><body><div id=\"slot\"></div></body></html>");
        let mut controller = start(&mut page);
        assert_eq!(controller.state(), Lifecycle::Ready);

        let slot = page.main().first("#slot").unwrap();
        page.insert_html(Scope::Main, slot, r#"<div class="player"><video></video></div>"#);
        controller.advance(&mut page, ms(99));
        assert_eq!(controller.state(), Lifecycle::Ready);
        controller.advance(&mut page, ms(1));
        assert!(matches!(controller.state(), Lifecycle::Active(_)));
        assert_eq!(count(&page, ".player > .snc-skip-button"), 1);
    }

    #[test]
    fn test_mutation_bursts_are_coalesced() {
        let mut page = page(PLAYER_PAGE);
        let mut controller = start(&mut page);
        let body = page.main().body().unwrap();
        assert_eq!(controller.stats().detections, 1);

        page.insert_html(Scope::Main, body, "<video></video>");
        controller.advance(&mut page, ms(60));
        page.insert_html(Scope::Main, body, "<video></video>");
        controller.advance(&mut page, ms(60));
        assert_eq!(controller.stats().detections, 1);
        controller.advance(&mut page, ms(50));
        assert_eq!(controller.stats().detections, 2);
    }

    #[test]
    fn test_inserting_plain_markup_does_not_trigger_detection() {
        let mut page = page(PLAYER_PAGE);
        let mut controller = start(&mut page);
        let body = page.main().body().unwrap();
        page.insert_html(Scope::Main, body, "<p>comment</p>");
        controller.advance(&mut page, ms(500));
        assert_eq!(controller.stats().detections, 1);
    }

    #[test]
    fn test_larger_inserted_video_takes_over() {
        let mut page = page(PLAYER_PAGE);
        let v1 = VideoRef::main(page.main().first("#v1").unwrap());
        page.set_layout(v1, LayoutBox::new(0.0, 0.0, 320.0, 180.0));
        let mut controller = start(&mut page);
        assert_eq!(controller.current_video(), Some(v1));

        let body = page.main().body().unwrap();
        let wrapper = page.insert_html(
            Scope::Main,
            body,
            r#"<div class="main-player"><video id="v2"></video></div>"#,
        )[0];
        let v2 = VideoRef::main(page.main().find_within(wrapper, "video").unwrap());
        page.set_layout(v2, LayoutBox::new(0.0, 180.0, 1280.0, 540.0));
        controller.advance(&mut page, ms(100));

        assert_eq!(controller.current_video(), Some(v2));
        assert_eq!(controller.stats().mounts, 2);
        assert_eq!(controller.stats().unmounts, 1);
        assert_eq!(count(&page, ".snc-skip-button"), 1);
        assert_eq!(count(&page, ".main-player > .snc-skip-button"), 1);
    }

    #[test]
    fn test_media_events_are_debounced() {
        let mut page = page(PLAYER_PAGE);
        let mut controller = start(&mut page);
        let video = controller.current_video().unwrap();
        page.load_media(video, 1440.0);

        controller.advance(&mut page, ms(499));
        assert_eq!(controller.stats().detections, 1);
        controller.advance(&mut page, ms(2));
        assert_eq!(controller.stats().detections, 2);
    }

    #[test]
    fn test_address_change_triggers_detection_after_settling() {
        let timings = Timings {
            poll_interval: Duration::from_secs(60),
            ..Timings::default()
        };
        let mut page = page(PLAYER_PAGE);
        let mut controller = start_with(&mut page, timings);
        page.push_state("/show/ep-2").unwrap();

        controller.advance(&mut page, ms(1500));
        assert_eq!(controller.stats().detections, 1);
        controller.advance(&mut page, ms(600));
        assert_eq!(controller.stats().detections, 2);
        // The same address is not reported twice.
        controller.advance(&mut page, Duration::from_secs(5));
        assert_eq!(controller.stats().detections, 2);
    }

    #[test]
    fn test_losing_the_video_returns_to_ready() {
        let mut page = page(PLAYER_PAGE);
        let mut controller = start(&mut page);
        let video = controller.current_video().unwrap();
        page.remove_element(video);

        controller.advance(&mut page, Duration::from_secs(2));
        assert_eq!(controller.state(), Lifecycle::Ready);
        assert_eq!(controller.container(), None);
        assert!(controller.control(ControlKind::SkipButton).is_none());
        assert_eq!(controller.stats().unmounts, 1);
    }

    #[test]
    fn test_teardown_cancels_toast_timer() {
        let mut page = page(PLAYER_PAGE);
        let mut controller = start(&mut page);
        let before = controller.pending_timers();
        let video = controller.current_video().unwrap();
        page.load_media(video, 1440.0);

        controller.click_skip(&mut page);
        assert_eq!(controller.pending_timers(), before + 1);

        page.remove_element(video);
        controller.detect(&mut page, skipnext::controller::Trigger::Poll);
        assert_eq!(controller.state(), Lifecycle::Ready);
        assert_eq!(count(&page, ".snc-skip-feedback"), 0);
        assert_eq!(controller.pending_timers(), before);
    }

    #[test]
    fn test_replacing_a_message_cancels_its_timer() {
        let mut page = page(PLAYER_PAGE);
        let mut controller = start(&mut page);
        let before = controller.pending_timers();

        controller.show_message(&mut page, "first");
        controller.show_message(&mut page, "second");
        assert_eq!(controller.pending_timers(), before + 1);
        assert_eq!(count(&page, ".snc-message"), 1);
        let message = controller.control(ControlKind::Message).unwrap();
        assert_eq!(page.main().text(message.node), "second");
    }

    #[test]
    fn test_unload_destroys_everything() {
        let mut page = page(PLAYER_PAGE);
        let mut controller = start(&mut page);
        controller.show_message(&mut page, "hello");
        controller.open_settings_panel(&mut page);
        assert!(controller.pending_timers() > 0);

        page.navigate("https://elsewhere.example/");
        controller.advance(&mut page, ms(1));

        assert_eq!(controller.state(), Lifecycle::Destroyed);
        assert_eq!(controller.pending_timers(), 0);
        for kind in [
            ControlKind::SkipButton,
            ControlKind::Message,
            ControlKind::SettingsPanel,
        ] {
            assert_eq!(count(&page, &format!(".{}", kind.class_name())), 0);
        }
    }

    #[test]
    fn test_destroyed_controller_stays_inert() {
        let mut page = page(PLAYER_PAGE);
        let mut controller = start(&mut page);
        controller.destroy(&mut page);
        controller.destroy(&mut page);

        let body = page.main().body().unwrap();
        page.insert_html(Scope::Main, body, "<video></video>");
        controller.advance(&mut page, Duration::from_secs(5));
        controller.detect(&mut page, skipnext::controller::Trigger::Poll);
        controller.open_settings_panel(&mut page);

        assert_eq!(controller.state(), Lifecycle::Destroyed);
        assert_eq!(controller.stats().detections, 1);
        assert_eq!(count(&page, ".snc-skip-button"), 0);
        assert_eq!(count(&page, ".snc-config-panel"), 0);
    }
}
