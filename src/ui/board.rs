use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};

use crate::browser::Tab;
use crate::controller::{Controller, Lifecycle};
use crate::detect::{discover_videos, select_best_video};
use crate::models::{ControlKind, MediaState};
use crate::page::Page;

/// One row of the board, styled by what it shows.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardLine {
    Heading(String),
    Plain(String),
    Selected(String),
    Control(String),
    Muted(String),
}

impl BoardLine {
    pub fn text(&self) -> &str {
        match self {
            BoardLine::Heading(s)
            | BoardLine::Plain(s)
            | BoardLine::Selected(s)
            | BoardLine::Control(s)
            | BoardLine::Muted(s) => s,
        }
    }

    fn to_line(&self) -> Line<'_> {
        match self {
            BoardLine::Heading(s) => Line::from(Span::styled(
                s.as_str(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            BoardLine::Plain(s) => Line::from(s.as_str()),
            BoardLine::Selected(s) => Line::from(Span::styled(
                s.as_str(),
                Style::default().fg(Color::Yellow),
            )),
            BoardLine::Control(s) => Line::from(Span::styled(
                s.as_str(),
                Style::default().fg(Color::Cyan),
            )),
            BoardLine::Muted(s) => Line::from(Span::styled(
                s.as_str(),
                Style::default().fg(Color::DarkGray),
            )),
        }
    }
}

pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "--:--".to_string();
    }
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn media_label(state: &MediaState) -> String {
    let status = if state.ended {
        "ended"
    } else if state.is_playing() {
        "playing"
    } else {
        "paused"
    };
    format!(
        "{status} {}/{}",
        format_time(state.current_time),
        format_time(state.duration)
    )
}

fn control_text(page: &Page, controller: &Controller, kind: ControlKind) -> Option<String> {
    let handle = controller.control(kind)?;
    let doc = page.document(handle.scope)?;
    Some(doc.text(handle.node).trim().to_string())
}

/// Text view of a tab: its videos and the overlay attached to them.
pub struct Board;

impl Board {
    pub fn describe(tab: &Tab) -> Vec<BoardLine> {
        let mut lines = vec![BoardLine::Heading(tab.url.clone())];
        let Some(page) = tab.page() else {
            lines.push(BoardLine::Muted("loading...".to_string()));
            return lines;
        };

        let candidates = discover_videos(page);
        let best = select_best_video(&candidates, &page.viewport()).map(|c| c.video);
        let current = tab.controller().and_then(Controller::current_video);
        lines.push(BoardLine::Plain(format!("videos: {}", candidates.len())));
        for (index, candidate) in candidates.iter().enumerate() {
            let text = format!(
                "  [{index}] {} {}x{} {}",
                candidate.scope,
                candidate.layout.width,
                candidate.layout.height,
                media_label(&candidate.state)
            );
            if Some(candidate.video) == current
                || (current.is_none() && Some(candidate.video) == best)
            {
                lines.push(BoardLine::Selected(format!("*{}", &text[1..])));
            } else {
                lines.push(BoardLine::Plain(text));
            }
        }

        let Some(controller) = tab.controller() else {
            lines.push(BoardLine::Muted("overlay: not attached".to_string()));
            return lines;
        };
        let state = match controller.state() {
            Lifecycle::Uninitialized => "uninitialized".to_string(),
            Lifecycle::Ready => "ready".to_string(),
            Lifecycle::Active(video) => format!("active on {video}"),
            Lifecycle::Destroyed => "destroyed".to_string(),
        };
        lines.push(BoardLine::Plain(format!("overlay: {state}")));
        let settings = controller.settings();
        lines.push(BoardLine::Muted(format!(
            "settings: skip {}s, next {}",
            settings.skip_time, settings.next_behavior
        )));

        for kind in [
            ControlKind::SkipButton,
            ControlKind::NextButton,
            ControlKind::SkipFeedback,
            ControlKind::Message,
        ] {
            if let Some(text) = control_text(page, controller, kind) {
                lines.push(BoardLine::Control(format!("  [{text}]")));
            }
        }
        lines
    }

    pub fn render(frame: &mut Frame, area: Rect, tab: Option<&Tab>) {
        let block = Block::default().borders(Borders::ALL).title("Page");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(tab) = tab else {
            let paragraph = Paragraph::new("No page open")
                .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC));
            frame.render_widget(paragraph, inner);
            return;
        };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let described = Self::describe(tab);
        let lines: Vec<Line> = described.iter().map(BoardLine::to_line).collect();
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), rows[0]);

        let progress = tab.page().and_then(|page| {
            let video = tab.controller()?.current_video()?;
            page.media(video)
        });
        if let Some(state) = progress {
            let ratio = if state.has_duration() && state.duration > 0.0 {
                (state.current_time / state.duration).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(Color::Green))
                .ratio(ratio)
                .label(media_label(&state));
            frame.render_widget(gauge, rows[1]);
        }
    }
}
