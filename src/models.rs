use ego_tree::NodeId;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LayoutBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LayoutBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn has_size(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

impl Viewport {
    /// Vertical intersection only; horizontal overflow still counts as visible.
    pub fn intersects_vertically(&self, layout: &LayoutBox) -> bool {
        layout.top() < self.height && layout.bottom() > 0.0
    }
}

/// Computed CSS `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

impl Position {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "static" => Some(Position::Static),
            "relative" => Some(Position::Relative),
            "absolute" => Some(Position::Absolute),
            "fixed" => Some(Position::Fixed),
            "sticky" => Some(Position::Sticky),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MediaState {
    pub paused: bool,
    pub ended: bool,
    pub current_time: f64,
    /// `NaN` until metadata is known.
    pub duration: f64,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            paused: true,
            ended: false,
            current_time: 0.0,
            duration: f64::NAN,
        }
    }
}

impl MediaState {
    pub fn is_playing(&self) -> bool {
        !self.paused && !self.ended
    }

    pub fn has_duration(&self) -> bool {
        !self.duration.is_nan()
    }
}

/// Which document a node lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Main,
    /// Document of the `<iframe>` element with this id in the main document.
    Frame(NodeId),
    /// Shadow tree attached to this host element in the main document.
    Shadow(NodeId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Main => f.write_str("main"),
            Scope::Frame(id) => write!(f, "frame{:?}", id),
            Scope::Shadow(id) => write!(f, "shadow{:?}", id),
        }
    }
}

/// Stable identity of an element across detection passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle {
    pub scope: Scope,
    pub node: NodeId,
}

impl ElementHandle {
    pub fn new(scope: Scope, node: NodeId) -> Self {
        Self { scope, node }
    }

    pub fn main(node: NodeId) -> Self {
        Self::new(Scope::Main, node)
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.scope, self.node)
    }
}

pub type VideoRef = ElementHandle;

/// Media lifecycle events the controller listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEventKind {
    LoadStart,
    LoadedData,
    CanPlay,
}

/// Page-side change notifications, drained by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeNotification {
    /// An element was inserted; `contains_video` is true when it is or holds a `<video>`.
    ChildInserted { contains_video: bool },
    MediaEvent {
        kind: MediaEventKind,
        target: VideoRef,
    },
    Ended(VideoRef),
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlKind {
    SkipButton,
    NextButton,
    SkipFeedback,
    AutoNextPrompt,
    Message,
    SettingsPanel,
}

impl ControlKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            ControlKind::SkipButton => "snc-skip-button",
            ControlKind::NextButton => "snc-next-button",
            ControlKind::SkipFeedback => "snc-skip-feedback",
            ControlKind::AutoNextPrompt => "snc-auto-next-prompt",
            ControlKind::Message => "snc-message",
            ControlKind::SettingsPanel => "snc-config-panel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextLink {
    #[serde(skip)]
    pub element: ElementHandle,
    pub url: String,
    pub label: String,
}
