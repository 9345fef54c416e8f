use crate::models::{
    ChangeNotification, ElementHandle, LayoutBox, MediaEventKind, MediaState, Position, Scope,
    VideoRef, Viewport,
};
use ego_tree::{NodeId, Tree};
use eyre::{Result, WrapErr, eyre};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

static VIDEO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("video").expect("valid selector"));
static IFRAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe").expect("valid selector"));
static ANY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("*").expect("valid selector"));
static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|;)\s*position\s*:\s*([a-z]+)").expect("valid regex")
});

/// One DOM tree plus the runtime state a browser would keep beside it.
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
    media: HashMap<NodeId, MediaState>,
    layout: HashMap<NodeId, LayoutBox>,
    position_overrides: HashMap<NodeId, Position>,
}

impl Document {
    pub fn parse(source: &str) -> Self {
        Self::from_html(Html::parse_document(source))
    }

    /// Parse a fragment, as used for shadow trees.
    pub fn parse_fragment(source: &str) -> Self {
        Self::from_html(Html::parse_fragment(source))
    }

    fn from_html(html: Html) -> Self {
        Self {
            html,
            media: HashMap::new(),
            layout: HashMap::new(),
            position_overrides: HashMap::new(),
        }
    }

    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    /// Connected elements matching `selector`, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        self.html.select(selector).map(|el| el.id()).collect()
    }

    pub fn select_css(&self, css: &str) -> Result<Vec<NodeId>> {
        let selector =
            Selector::parse(css).map_err(|err| eyre!("invalid selector {css:?}: {err:?}"))?;
        Ok(self.select(&selector))
    }

    pub fn first(&self, css: &str) -> Option<NodeId> {
        self.select_css(css).ok()?.into_iter().next()
    }

    /// First descendant of `root` matching `css`.
    pub fn find_within(&self, root: NodeId, css: &str) -> Option<NodeId> {
        let selector = Selector::parse(css).ok()?;
        self.element(root)?
            .select(&selector)
            .find(|el| el.id() != root)
            .map(|el| el.id())
    }

    /// Playable `<video>` elements; template content is inert and skipped.
    pub fn videos(&self) -> Vec<NodeId> {
        self.html
            .select(&VIDEO_SELECTOR)
            .filter(|video| {
                !video
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|ancestor| ancestor.value().name() == "template")
            })
            .map(|video| video.id())
            .collect()
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        let root = self.html.tree.root().id();
        match self.html.tree.get(id) {
            Some(node) => node.id() == root || node.ancestors().any(|a| a.id() == root),
            None => false,
        }
    }

    pub fn body(&self) -> Option<NodeId> {
        self.first("body")
    }

    pub fn head(&self) -> Option<NodeId> {
        self.first("head")
    }

    /// Root element: `<html>` for documents and fragments alike.
    pub fn root_element(&self) -> NodeId {
        self.html.root_element().id()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<String> {
        self.element(id).map(|el| el.value().name().to_string())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id)
            .and_then(|el| el.value().attr(name).map(|v| v.to_string()))
    }

    pub fn class_name(&self, id: NodeId) -> String {
        self.attr(id, "class").unwrap_or_default()
    }

    pub fn text(&self, id: NodeId) -> String {
        self.element(id)
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default()
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.html
            .tree
            .get(id)?
            .parent()
            .and_then(ElementRef::wrap)
            .map(|el| el.id())
    }

    /// Append parsed `markup` under `parent`; returns the inserted top-level elements.
    pub fn append_html(&mut self, parent: NodeId, markup: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(markup);
        let mut inserted = Vec::new();
        for child in fragment.root_element().children() {
            if let Some(id) = graft(&mut self.html.tree, parent, child) {
                if child.value().is_element() {
                    inserted.push(id);
                }
            }
        }
        inserted
    }

    /// Detach `id` from the tree. Returns false when it was already gone.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if !self.is_connected(id) {
            return false;
        }
        match self.html.tree.get_mut(id) {
            Some(mut node) => {
                node.detach();
                true
            }
            None => false,
        }
    }

    /// Replace the children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let children: Vec<NodeId> = match self.html.tree.get(id) {
            Some(node) => node.children().map(|c| c.id()).collect(),
            None => return,
        };
        for child in children {
            if let Some(mut node) = self.html.tree.get_mut(child) {
                node.detach();
            }
        }
        self.append_html(id, &escape_html(text));
    }

    pub fn computed_position(&self, id: NodeId) -> Position {
        if let Some(position) = self.position_overrides.get(&id) {
            return *position;
        }
        self.attr(id, "style")
            .and_then(|style| {
                POSITION_RE
                    .captures(&style)
                    .and_then(|caps| Position::parse(&caps[1]))
            })
            .unwrap_or_default()
    }

    pub fn set_position(&mut self, id: NodeId, position: Position) {
        self.position_overrides.insert(id, position);
    }

    pub fn media(&self, id: NodeId) -> MediaState {
        self.media.get(&id).copied().unwrap_or_default()
    }

    pub fn media_mut(&mut self, id: NodeId) -> &mut MediaState {
        self.media.entry(id).or_default()
    }

    pub fn layout(&self, id: NodeId) -> LayoutBox {
        self.layout.get(&id).copied().unwrap_or_default()
    }

    pub fn set_layout(&mut self, id: NodeId, layout: LayoutBox) {
        self.layout.insert(id, layout);
    }
}

fn graft(
    tree: &mut Tree<Node>,
    parent: NodeId,
    source: ego_tree::NodeRef<'_, Node>,
) -> Option<NodeId> {
    let id = tree.get_mut(parent)?.append(source.value().clone()).id();
    for child in source.children() {
        graft(tree, id, child);
    }
    Some(id)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub enum FrameContent {
    SameOrigin(Document),
    CrossOrigin { src: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAccessError {
    CrossOrigin(String),
    NotLoaded,
}

impl fmt::Display for FrameAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameAccessError::CrossOrigin(src) => write!(f, "cross-origin frame: {src}"),
            FrameAccessError::NotLoaded => f.write_str("frame has no document"),
        }
    }
}

impl std::error::Error for FrameAccessError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);

/// A loaded page: main document, frames, shadow trees and the queue of
/// change notifications the overlay observes.
#[derive(Debug)]
pub struct Page {
    id: PageId,
    url: Url,
    viewport: Viewport,
    main: Document,
    frames: HashMap<NodeId, FrameContent>,
    shadows: HashMap<NodeId, Document>,
    notifications: VecDeque<ChangeNotification>,
    navigations: Vec<String>,
    overlay_injected: bool,
    unloading: bool,
}

impl Page {
    pub fn new(url: &str, source: &str) -> Result<Self> {
        let url = Url::parse(url).wrap_err_with(|| format!("invalid page url {url:?}"))?;
        Ok(Self::from_document(url, Document::parse(source)))
    }

    pub fn from_document(url: Url, main: Document) -> Self {
        Self {
            id: PageId(NEXT_PAGE_ID.fetch_add(1, Ordering::Relaxed)),
            url,
            viewport: Viewport::default(),
            main,
            frames: HashMap::new(),
            shadows: HashMap::new(),
            notifications: VecDeque::new(),
            navigations: Vec::new(),
            overlay_injected: false,
            unloading: false,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn main(&self) -> &Document {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut Document {
        &mut self.main
    }

    /// Set the "overlay injected" flag; false when it was already set.
    pub fn mark_injected(&mut self) -> bool {
        !std::mem::replace(&mut self.overlay_injected, true)
    }

    pub fn is_injected(&self) -> bool {
        self.overlay_injected
    }

    pub fn is_unloading(&self) -> bool {
        self.unloading
    }

    pub fn attach_frame(&mut self, iframe: NodeId, content: FrameContent) {
        self.frames.insert(iframe, content);
    }

    /// Attach an open shadow tree to `host` in the main document.
    pub fn attach_shadow(&mut self, host: NodeId, markup: &str) -> Scope {
        self.shadows.insert(host, Document::parse_fragment(markup));
        Scope::Shadow(host)
    }

    /// Connected `<iframe>` elements of the main document, in order.
    pub fn frame_elements(&self) -> Vec<NodeId> {
        self.main.select(&IFRAME_SELECTOR)
    }

    /// Connected shadow hosts, in document order.
    pub fn shadow_hosts(&self) -> Vec<NodeId> {
        if self.shadows.is_empty() {
            return Vec::new();
        }
        self.main
            .select(&ANY_SELECTOR)
            .into_iter()
            .filter(|id| self.shadows.contains_key(id))
            .collect()
    }

    pub fn frame_document(&self, iframe: NodeId) -> Result<&Document, FrameAccessError> {
        if !self.main.is_connected(iframe) {
            return Err(FrameAccessError::NotLoaded);
        }
        match self.frames.get(&iframe) {
            Some(FrameContent::SameOrigin(doc)) => Ok(doc),
            Some(FrameContent::CrossOrigin { src }) => {
                Err(FrameAccessError::CrossOrigin(src.clone()))
            }
            None => Err(FrameAccessError::NotLoaded),
        }
    }

    pub fn document(&self, scope: Scope) -> Option<&Document> {
        match scope {
            Scope::Main => Some(&self.main),
            Scope::Frame(iframe) => self.frame_document(iframe).ok(),
            Scope::Shadow(host) => {
                if self.main.is_connected(host) {
                    self.shadows.get(&host)
                } else {
                    None
                }
            }
        }
    }

    pub fn document_mut(&mut self, scope: Scope) -> Option<&mut Document> {
        match scope {
            Scope::Main => Some(&mut self.main),
            Scope::Frame(iframe) => match self.frames.get_mut(&iframe) {
                Some(FrameContent::SameOrigin(doc)) => Some(doc),
                _ => None,
            },
            Scope::Shadow(host) => self.shadows.get_mut(&host),
        }
    }

    pub fn is_connected(&self, handle: ElementHandle) -> bool {
        self.document(handle.scope)
            .map(|doc| doc.is_connected(handle.node))
            .unwrap_or(false)
    }

    /// Insert markup and notify observers the way a mutation observer would.
    pub fn insert_html(&mut self, scope: Scope, parent: NodeId, markup: &str) -> Vec<NodeId> {
        let contains_video = Html::parse_fragment(markup)
            .select(&VIDEO_SELECTOR)
            .next()
            .is_some();
        let Some(doc) = self.document_mut(scope) else {
            return Vec::new();
        };
        let inserted = doc.append_html(parent, markup);
        if !inserted.is_empty() {
            self.notifications
                .push_back(ChangeNotification::ChildInserted { contains_video });
        }
        inserted
    }

    pub fn remove_element(&mut self, handle: ElementHandle) -> bool {
        self.document_mut(handle.scope)
            .map(|doc| doc.remove(handle.node))
            .unwrap_or(false)
    }

    pub fn media(&self, video: VideoRef) -> Option<MediaState> {
        self.document(video.scope).map(|doc| doc.media(video.node))
    }

    pub fn media_mut(&mut self, video: VideoRef) -> Option<&mut MediaState> {
        self.document_mut(video.scope)
            .map(|doc| doc.media_mut(video.node))
    }

    pub fn layout(&self, handle: ElementHandle) -> LayoutBox {
        self.document(handle.scope)
            .map(|doc| doc.layout(handle.node))
            .unwrap_or_default()
    }

    pub fn set_layout(&mut self, handle: ElementHandle, layout: LayoutBox) {
        if let Some(doc) = self.document_mut(handle.scope) {
            doc.set_layout(handle.node, layout);
        }
    }

    /// Metadata arrives: fires `loadstart`, `loadeddata` and `canplay`.
    pub fn load_media(&mut self, video: VideoRef, duration: f64) {
        let Some(state) = self.media_mut(video) else {
            return;
        };
        state.duration = duration;
        state.ended = false;
        for kind in [
            MediaEventKind::LoadStart,
            MediaEventKind::LoadedData,
            MediaEventKind::CanPlay,
        ] {
            self.notifications
                .push_back(ChangeNotification::MediaEvent { kind, target: video });
        }
    }

    pub fn play(&mut self, video: VideoRef) {
        if let Some(state) = self.media_mut(video) {
            if state.ended {
                state.current_time = 0.0;
                state.ended = false;
            }
            state.paused = false;
        }
    }

    pub fn pause(&mut self, video: VideoRef) {
        if let Some(state) = self.media_mut(video) {
            state.paused = true;
        }
    }

    pub fn seek(&mut self, video: VideoRef, time: f64) {
        if let Some(state) = self.media_mut(video) {
            state.current_time = time.max(0.0);
            if state.has_duration() && state.current_time < state.duration {
                state.ended = false;
            }
        }
    }

    /// Advance every playing video by `seconds`, firing `ended` where reached.
    pub fn advance_playback(&mut self, seconds: f64) {
        let mut ended = Vec::new();
        let mut scopes = vec![Scope::Main];
        scopes.extend(self.frame_elements().into_iter().map(Scope::Frame));
        scopes.extend(self.shadow_hosts().into_iter().map(Scope::Shadow));
        for scope in scopes {
            let Some(doc) = self.document_mut(scope) else {
                continue;
            };
            for node in doc.videos() {
                let state = doc.media_mut(node);
                if !state.is_playing() {
                    continue;
                }
                state.current_time += seconds;
                if state.has_duration() && state.current_time >= state.duration {
                    state.current_time = state.duration;
                    state.paused = true;
                    state.ended = true;
                    ended.push(VideoRef::new(scope, node));
                }
            }
        }
        for video in ended {
            self.notifications.push_back(ChangeNotification::Ended(video));
        }
    }

    pub fn resolve(&self, href: &str) -> Option<String> {
        self.url.join(href.trim()).ok().map(|url| url.to_string())
    }

    /// Client-side navigation: the address changes, the document stays.
    pub fn push_state(&mut self, href: &str) -> Result<()> {
        self.url = self
            .url
            .join(href)
            .wrap_err_with(|| format!("invalid history url {href:?}"))?;
        Ok(())
    }

    /// Full navigation: the page starts unloading.
    pub fn navigate(&mut self, url: &str) {
        if self.unloading {
            return;
        }
        self.navigations.push(url.to_string());
        self.unloading = true;
        self.notifications.push_back(ChangeNotification::Unload);
    }

    /// Requested navigations, oldest first.
    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    /// Dispatch a click. Anchors navigate unless an inline handler claims the event.
    pub fn click(&mut self, handle: ElementHandle) -> bool {
        let Some(doc) = self.document(handle.scope) else {
            return false;
        };
        if doc.tag_name(handle.node).as_deref() != Some("a")
            || doc.attr(handle.node, "onclick").is_some()
        {
            return false;
        }
        let Some(target) = doc
            .attr(handle.node, "href")
            .and_then(|href| self.resolve(&href))
        else {
            return false;
        };
        self.navigate(&target);
        true
    }

    pub fn has_element_id(&self, id: &str) -> bool {
        self.main.first(&format!("#{id}")).is_some()
    }

    /// Link a stylesheet into `<head>` once per page.
    pub fn link_stylesheet(&mut self, id: &str, href: &str) -> bool {
        if self.has_element_id(id) {
            return false;
        }
        let Some(head) = self.main.head() else {
            return false;
        };
        let markup = format!(
            r#"<link id="{}" rel="stylesheet" type="text/css" href="{}">"#,
            escape_html(id),
            escape_html(href)
        );
        !self.main.append_html(head, &markup).is_empty()
    }

    pub fn drain_notifications(&mut self) -> Vec<ChangeNotification> {
        self.notifications.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head></head><body>
        <div id="player" style="position: relative"><video id="v1"></video></div>
        <template><video id="inert"></video></template>
        <iframe id="same" srcdoc="x"></iframe>
    </body></html>"#;

    #[test]
    fn test_videos_skip_template_content() {
        let doc = Document::parse(PAGE);
        let videos = doc.videos();
        assert_eq!(videos.len(), 1);
        assert_eq!(doc.attr(videos[0], "id").as_deref(), Some("v1"));
    }

    #[test]
    fn test_append_and_remove() {
        let mut doc = Document::parse(PAGE);
        let body = doc.body().unwrap();
        let inserted = doc.append_html(body, r#"<div class="snc-message">hi</div>"#);
        assert_eq!(inserted.len(), 1);
        assert_eq!(doc.text(inserted[0]), "hi");
        assert_eq!(doc.select_css(".snc-message").unwrap().len(), 1);

        doc.set_text(inserted[0], "a < b");
        assert_eq!(doc.text(inserted[0]), "a < b");

        assert!(doc.remove(inserted[0]));
        assert!(!doc.remove(inserted[0]));
        assert!(doc.select_css(".snc-message").unwrap().is_empty());
    }

    #[test]
    fn test_computed_position() {
        let mut doc = Document::parse(PAGE);
        let player = doc.first("#player").unwrap();
        let body = doc.body().unwrap();
        assert_eq!(doc.computed_position(player), Position::Relative);
        assert_eq!(doc.computed_position(body), Position::Static);
        doc.set_position(body, Position::Relative);
        assert_eq!(doc.computed_position(body), Position::Relative);
    }

    #[test]
    fn test_cross_origin_frame_is_denied() {
        let mut page = Page::new("https://example.com/watch", PAGE).unwrap();
        let iframe = page.main().first("#same").unwrap();
        assert_eq!(page.frame_document(iframe).err(), Some(FrameAccessError::NotLoaded));
        page.attach_frame(
            iframe,
            FrameContent::CrossOrigin {
                src: "https://cdn.other/embed".to_string(),
            },
        );
        assert!(matches!(
            page.frame_document(iframe),
            Err(FrameAccessError::CrossOrigin(_))
        ));
        assert!(page.document(Scope::Frame(iframe)).is_none());
    }

    #[test]
    fn test_stylesheet_linked_once() {
        let mut page = Page::new("https://example.com/", PAGE).unwrap();
        assert!(page.link_stylesheet("snc-injected-styles", "styles.css"));
        assert!(!page.link_stylesheet("snc-injected-styles", "styles.css"));
        assert_eq!(page.main().select_css("link").unwrap().len(), 1);
    }

    #[test]
    fn test_playback_reaches_end() {
        let mut page = Page::new("https://example.com/", PAGE).unwrap();
        let video = VideoRef::main(page.main().videos()[0]);
        page.load_media(video, 10.0);
        page.drain_notifications();
        page.play(video);
        page.advance_playback(4.0);
        assert_eq!(page.media(video).unwrap().current_time, 4.0);
        page.advance_playback(10.0);
        let state = page.media(video).unwrap();
        assert!(state.ended);
        assert_eq!(state.current_time, 10.0);
        assert_eq!(
            page.drain_notifications(),
            vec![ChangeNotification::Ended(video)]
        );
    }

    #[test]
    fn test_click_respects_inline_handlers() {
        let mut page = Page::new(
            "https://example.com/show/cap-1",
            r#"<body><a id="a" href="cap-2">next</a><a id="b" href="cap-3" onclick="go()">x</a></body>"#,
        )
        .unwrap();
        let intercepted = ElementHandle::main(page.main().first("#b").unwrap());
        assert!(!page.click(intercepted));
        assert!(!page.is_unloading());
        let plain = ElementHandle::main(page.main().first("#a").unwrap());
        assert!(page.click(plain));
        assert_eq!(page.navigations(), ["https://example.com/show/cap-2"]);
    }
}
