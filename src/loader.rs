use crate::logging;
use crate::models::{LayoutBox, Viewport};
use crate::page::{Document, FrameContent, Page};
use eyre::{Result, WrapErr, eyre};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use url::Url;

const DEFAULT_VIDEO_WIDTH: f64 = 640.0;
const DEFAULT_VIDEO_HEIGHT: f64 = 360.0;

static STYLE_LENGTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|;)\s*(width|height)\s*:\s*([0-9.]+)\s*px").expect("valid regex")
});
static DISPLAY_NONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|;)\s*display\s*:\s*none").expect("valid regex"));

/// Turn a CLI argument into a URL: absolute URLs pass through, anything
/// else is a filesystem path.
pub fn source_url(source: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(source) {
        if matches!(url.scheme(), "http" | "https" | "file") {
            return Ok(url);
        }
    }
    let path = Path::new(source)
        .canonicalize()
        .wrap_err_with(|| format!("cannot open {source}"))?;
    Url::from_file_path(&path).map_err(|_| eyre!("cannot build a file url for {}", path.display()))
}

pub fn fetch(url: &Url) -> Result<String> {
    match url.scheme() {
        "http" | "https" => {
            let body = reqwest::blocking::get(url.as_str())
                .and_then(|resp| resp.error_for_status())
                .and_then(|resp| resp.text())
                .wrap_err_with(|| format!("failed to fetch {url}"))?;
            Ok(body)
        }
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| eyre!("not a local path: {url}"))?;
            std::fs::read_to_string(&path)
                .wrap_err_with(|| format!("cannot read {}", path.display()))
        }
        other => Err(eyre!("unsupported scheme {other:?}")),
    }
}

pub fn load_page(source: &str, viewport: Viewport) -> Result<Page> {
    let url = source_url(source)?;
    let html = fetch(&url)?;
    Ok(build_page(url, &html, viewport, fetch))
}

fn same_origin(a: &Url, b: &Url) -> bool {
    if a.scheme() == "file" && b.scheme() == "file" {
        return true;
    }
    a.origin() == b.origin()
}

/// Assemble a page: parse the document, load its frames through `fetch_frame`
/// and lay its videos out.
pub fn build_page<F>(url: Url, html: &str, viewport: Viewport, fetch_frame: F) -> Page
where
    F: Fn(&Url) -> Result<String>,
{
    let mut main = Document::parse(html);
    lay_out_videos(&mut main);
    let mut page = Page::from_document(url, main);
    page.set_viewport(viewport);

    for iframe in page.frame_elements() {
        let content = frame_content(&page, iframe, &fetch_frame);
        if let Some(content) = content {
            page.attach_frame(iframe, content);
        }
    }
    page
}

fn frame_content<F>(page: &Page, iframe: ego_tree::NodeId, fetch_frame: &F) -> Option<FrameContent>
where
    F: Fn(&Url) -> Result<String>,
{
    let main = page.main();
    if let Some(srcdoc) = main.attr(iframe, "srcdoc") {
        let mut doc = Document::parse(&srcdoc);
        lay_out_videos(&mut doc);
        return Some(FrameContent::SameOrigin(doc));
    }
    let src = main.attr(iframe, "src")?;
    let frame_url = page.url().join(&src).ok()?;
    if !same_origin(page.url(), &frame_url) {
        return Some(FrameContent::CrossOrigin {
            src: frame_url.to_string(),
        });
    }
    match fetch_frame(&frame_url) {
        Ok(html) => {
            let mut doc = Document::parse(&html);
            lay_out_videos(&mut doc);
            Some(FrameContent::SameOrigin(doc))
        }
        Err(err) => {
            logging::debug("loader", format!("frame {frame_url} not loaded: {err:#}"));
            None
        }
    }
}

/// Static layout: videos stack vertically at their declared size; hidden
/// ones get an empty box; `autoplay` ones start playing.
pub fn lay_out_videos(doc: &mut Document) {
    let mut y = 0.0;
    for video in doc.videos() {
        let style = doc.attr(video, "style").unwrap_or_default();
        let hidden = doc.attr(video, "hidden").is_some() || DISPLAY_NONE_RE.is_match(&style);
        let layout = if hidden {
            LayoutBox::new(0.0, y, 0.0, 0.0)
        } else {
            let mut width = doc
                .attr(video, "width")
                .and_then(|w| w.trim().parse::<f64>().ok())
                .unwrap_or(DEFAULT_VIDEO_WIDTH);
            let mut height = doc
                .attr(video, "height")
                .and_then(|h| h.trim().parse::<f64>().ok())
                .unwrap_or(DEFAULT_VIDEO_HEIGHT);
            for caps in STYLE_LENGTH_RE.captures_iter(&style) {
                if let Ok(value) = caps[2].parse::<f64>() {
                    if caps[1].eq_ignore_ascii_case("width") {
                        width = value;
                    } else {
                        height = value;
                    }
                }
            }
            LayoutBox::new(0.0, y, width, height)
        };
        y += layout.height;
        doc.set_layout(video, layout);
        if doc.attr(video, "autoplay").is_some() {
            doc.media_mut(video).paused = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scope;

    fn no_fetch(url: &Url) -> Result<String> {
        Err(eyre!("offline: {url}"))
    }

    #[test]
    fn test_layout_stacks_declared_sizes() {
        let mut doc = Document::parse(
            r#"<body>
                <video width="100" height="50"></video>
                <video style="width: 320px; height:180px" autoplay></video>
                <video hidden></video>
            </body>"#,
        );
        lay_out_videos(&mut doc);
        let videos = doc.videos();
        assert_eq!(doc.layout(videos[0]), LayoutBox::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(doc.layout(videos[1]), LayoutBox::new(0.0, 50.0, 320.0, 180.0));
        assert!(!doc.layout(videos[2]).has_size());
        assert!(doc.media(videos[1]).is_playing());
        assert!(!doc.media(videos[0]).is_playing());
    }

    #[test]
    fn test_frames_by_origin() {
        let url = Url::parse("https://watch.example/show/ep-3").unwrap();
        let html = r#"<body>
            <iframe id="inline" srcdoc="<video></video>"></iframe>
            <iframe id="same" src="/embed/3"></iframe>
            <iframe id="other" src="https://cdn.example/embed/3"></iframe>
        </body>"#;
        let fetch_same = |frame: &Url| -> Result<String> {
            if frame.path() == "/embed/3" {
                Ok("<body><video></video></body>".to_string())
            } else {
                no_fetch(frame)
            }
        };
        let page = build_page(url, html, Viewport::default(), fetch_same);
        let inline = page.main().first("#inline").unwrap();
        let same = page.main().first("#same").unwrap();
        let other = page.main().first("#other").unwrap();
        assert_eq!(page.document(Scope::Frame(inline)).unwrap().videos().len(), 1);
        assert_eq!(page.document(Scope::Frame(same)).unwrap().videos().len(), 1);
        assert!(page.document(Scope::Frame(other)).is_none());
    }

    #[test]
    fn test_source_url_accepts_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<video></video>").unwrap();
        let url = source_url(path.to_str().unwrap()).unwrap();
        assert_eq!(url.scheme(), "file");
        let page = load_page(path.to_str().unwrap(), Viewport::default()).unwrap();
        assert_eq!(page.main().videos().len(), 1);
    }
}
