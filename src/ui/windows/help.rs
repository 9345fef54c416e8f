use ratatui::{
    Frame,
    layout::Rect,
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
};

use super::fixed_popup_area;

pub struct HelpWindow;

const HELP_TEXT: &[&str] = &[
    " Playback:",
    "   Space             Play / Pause",
    "   e                 Seek close to the end",
    "",
    " Overlay:",
    "   s                 Skip (click)",
    "   h                 Press / release skip (hold opens settings)",
    "   x                 Move pointer off the skip button",
    "   n                 Next button",
    "   N                 Go to next episode",
    "   c                 Cancel auto-next",
    "   o                 Settings panel",
    "   r                 Detect videos now",
    "",
    " Settings panel:",
    "   Tab / Down        Next field",
    "   Shift+Tab / Up    Previous field",
    "   Left / Right      Move the slider",
    "   1-4               Presets",
    "   Enter             Activate",
    "   Esc               Close without saving",
    "",
    " Session:",
    "   ] / [             Next / previous tab",
    "   q                 Quit / Close Window",
    "   ?                 Help",
];

impl HelpWindow {
    pub fn render(frame: &mut Frame, area: Rect) {
        let help_content: Vec<Line> = HELP_TEXT.iter().map(|&s| Line::from(s)).collect();

        let max_width = help_content.iter().map(|l| l.width()).max().unwrap_or(0) as u16;
        let popup_area = fixed_popup_area(area, max_width + 4, help_content.len() as u16 + 2);

        frame.render_widget(Clear, popup_area);

        let help_paragraph = Paragraph::new(help_content)
            .block(Block::default().title("Help").borders(Borders::ALL));

        frame.render_widget(help_paragraph, popup_area);
    }
}
