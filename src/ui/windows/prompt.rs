use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use super::fixed_popup_area;

/// Auto-next countdown shown when the watched video ends.
pub struct PromptWindow;

impl PromptWindow {
    pub fn render(frame: &mut Frame, area: Rect, remaining: u32) {
        let popup_area = fixed_popup_area(area, 32, 5);
        frame.render_widget(Clear, popup_area);

        let lines = vec![
            Line::from(vec![
                Span::raw("Next episode in "),
                Span::styled(
                    remaining.to_string(),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
                Span::raw("s"),
            ]),
            Line::from(Span::styled("[c] Cancel", Style::default().fg(Color::DarkGray))),
        ];
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().title("Auto next").borders(Borders::ALL));
        frame.render_widget(paragraph, popup_area);
    }
}
