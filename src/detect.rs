use crate::logging;
use crate::models::{LayoutBox, MediaState, Scope, VideoRef, Viewport};
use crate::page::{FrameAccessError, Page};
use serde::Serialize;

/// A discovered `<video>` with the attributes selection looks at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    #[serde(skip)]
    pub video: VideoRef,
    pub scope: String,
    pub state: MediaState,
    pub layout: LayoutBox,
}

impl Candidate {
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn is_visible(&self, viewport: &Viewport) -> bool {
        self.layout.has_size() && viewport.intersects_vertically(&self.layout)
    }
}

/// Every playable video reachable from the page: main document first, then
/// same-origin frames, then shadow trees, each in document order.
pub fn discover_videos(page: &Page) -> Vec<Candidate> {
    let mut found: Vec<VideoRef> = page
        .main()
        .videos()
        .into_iter()
        .map(VideoRef::main)
        .collect();

    for iframe in page.frame_elements() {
        match page.frame_document(iframe) {
            Ok(doc) => found.extend(
                doc.videos()
                    .into_iter()
                    .map(|node| VideoRef::new(Scope::Frame(iframe), node)),
            ),
            Err(FrameAccessError::CrossOrigin(src)) => {
                logging::trace("detect", format!("skipping cross-origin frame {src}"));
            }
            Err(FrameAccessError::NotLoaded) => {}
        }
    }

    for host in page.shadow_hosts() {
        if let Some(doc) = page.document(Scope::Shadow(host)) {
            found.extend(
                doc.videos()
                    .into_iter()
                    .map(|node| VideoRef::new(Scope::Shadow(host), node)),
            );
        }
    }

    found
        .into_iter()
        .map(|video| Candidate {
            video,
            scope: video.scope.to_string(),
            state: page.media(video).unwrap_or_default(),
            layout: page.layout(video),
        })
        .collect()
}

/// Pick the video the controls should attach to.
///
/// A single playing video wins outright. Otherwise the largest visible one
/// is chosen (all candidates when none is visible); equal areas keep the
/// earliest candidate.
pub fn select_best_video<'a>(
    candidates: &'a [Candidate],
    viewport: &Viewport,
) -> Option<&'a Candidate> {
    match candidates {
        [] => return None,
        [only] => return Some(only),
        _ => {}
    }

    let mut playing = candidates.iter().filter(|c| c.is_playing());
    if let (Some(single), None) = (playing.next(), playing.next()) {
        return Some(single);
    }

    let visible: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.is_visible(viewport))
        .collect();
    let pool: Vec<&Candidate> = if visible.is_empty() {
        candidates.iter().collect()
    } else {
        visible
    };

    pool.into_iter().fold(None, |best: Option<&Candidate>, current| match best {
        Some(best) if current.layout.area() <= best.layout.area() => Some(best),
        _ => Some(current),
    })
}
