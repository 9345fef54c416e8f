use crate::models::{ControlKind, Position};
use crate::page::{Document, escape_html};
use ego_tree::NodeId;

pub const STYLESHEET_ID: &str = "snc-injected-styles";
pub const STYLESHEET_HREF: &str = "skipnext://overlay/styles.css";

const CONTAINER_CLASS_HINTS: &[&str] = &["video", "player", "media"];

/// Element the overlay controls are positioned against.
///
/// Walks up from the video's parent to the first positioned ancestor or the
/// first one whose class hints at a player; without a match the direct
/// parent is used.
pub fn resolve_container(doc: &Document, video: NodeId) -> Option<NodeId> {
    let parent = doc.parent_element(video)?;
    let mut cursor = Some(parent);
    while let Some(node) = cursor {
        if matches!(doc.tag_name(node).as_deref(), Some("body") | Some("html")) {
            break;
        }
        if doc.computed_position(node) != Position::Static {
            return Some(node);
        }
        let class_name = doc.class_name(node).to_lowercase();
        if CONTAINER_CLASS_HINTS
            .iter()
            .any(|hint| class_name.contains(hint))
        {
            return Some(node);
        }
        cursor = doc.parent_element(node);
    }
    Some(parent)
}

/// Make sure absolutely positioned children anchor to `container`.
pub fn ensure_positioned(doc: &mut Document, container: NodeId) {
    if doc.computed_position(container) == Position::Static {
        doc.set_position(container, Position::Relative);
    }
}

fn control(kind: ControlKind, extra_class: &str, body: &str) -> String {
    format!(
        r#"<div class="{} {}">{}</div>"#,
        kind.class_name(),
        extra_class,
        body
    )
}

pub fn skip_button_markup(skip_time: u32) -> String {
    control(
        ControlKind::SkipButton,
        "snc-glassmorphism",
        &escape_html(&format!("Skip {skip_time}s")),
    )
}

pub fn next_button_markup() -> String {
    control(ControlKind::NextButton, "snc-glassmorphism", "Next ▶")
}

pub fn skip_feedback_markup(skip_time: u32) -> String {
    control(
        ControlKind::SkipFeedback,
        "snc-glassmorphism",
        &escape_html(&format!("⏩ +{skip_time}s")),
    )
}

pub fn message_markup(text: &str) -> String {
    control(ControlKind::Message, "snc-glassmorphism", &escape_html(text))
}

pub const COUNTDOWN_ID: &str = "snc-countdown";

pub fn auto_next_prompt_markup(seconds: u32) -> String {
    format!(
        r#"<div class="{}"><div class="snc-prompt-content snc-glassmorphism"><div class="snc-prompt-text">Next episode in <span id="{COUNTDOWN_ID}">{seconds}</span>s</div><button class="snc-cancel-button snc-glassmorphism">Cancel</button></div></div>"#,
        ControlKind::AutoNextPrompt.class_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positioned_ancestor_wins() {
        let doc = Document::parse(
            r#"<body><div id="outer" style="position:absolute"><div id="inner"><video></video></div></div></body>"#,
        );
        let video = doc.videos()[0];
        assert_eq!(resolve_container(&doc, video), doc.first("#outer"));
    }

    #[test]
    fn test_class_hint_wins() {
        let doc = Document::parse(
            r#"<body><section id="s" class="Main-Player-Wrap"><span><video></video></span></section></body>"#,
        );
        let video = doc.videos()[0];
        assert_eq!(resolve_container(&doc, video), doc.first("#s"));
    }

    #[test]
    fn test_falls_back_to_direct_parent() {
        let mut doc = Document::parse(r#"<body><div><p id="p"><video></video></p></div></body>"#);
        let video = doc.videos()[0];
        let container = resolve_container(&doc, video).unwrap();
        assert_eq!(Some(container), doc.first("#p"));
        ensure_positioned(&mut doc, container);
        assert_eq!(doc.computed_position(container), Position::Relative);
    }

    #[test]
    fn test_video_directly_in_body() {
        let doc = Document::parse("<body><video></video></body>");
        let video = doc.videos()[0];
        assert_eq!(resolve_container(&doc, video), doc.body());
    }
}
