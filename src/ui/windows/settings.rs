use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use super::fixed_popup_area;
use crate::panel::{PanelField, SettingsPanel};
use crate::settings::{NextBehavior, SKIP_TIME_MAX, SKIP_TIME_MIN, SKIP_TIME_PRESETS};

const SLIDER_WIDTH: u32 = 30;

pub struct SettingsWindow;

fn focus_style(panel: &SettingsPanel, field: PanelField) -> Style {
    if panel.focused() == field {
        Style::default().bg(Color::Blue).fg(Color::White)
    } else {
        Style::default()
    }
}

/// `[=====|------]` for the current skip time.
pub fn slider_bar(skip_time: u32) -> String {
    let span = SKIP_TIME_MAX - SKIP_TIME_MIN;
    let filled =
        (skip_time.clamp(SKIP_TIME_MIN, SKIP_TIME_MAX) - SKIP_TIME_MIN) * SLIDER_WIDTH / span;
    let mut bar = String::with_capacity(SLIDER_WIDTH as usize + 3);
    bar.push('[');
    for i in 0..=SLIDER_WIDTH {
        bar.push(if i == filled {
            '|'
        } else if i < filled {
            '='
        } else {
            '-'
        });
    }
    bar.push(']');
    bar
}

impl SettingsWindow {
    pub fn render(frame: &mut Frame, area: Rect, panel: &SettingsPanel) {
        let popup_area = fixed_popup_area(area, 48, 12);

        frame.render_widget(Clear, popup_area);
        let block = Block::default().title("Settings").borders(Borders::ALL);
        let inner = block.inner(popup_area);
        frame.render_widget(block, popup_area);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let mut presets = vec![Span::raw("Presets: ")];
        for (index, value) in SKIP_TIME_PRESETS.iter().enumerate() {
            presets.push(Span::styled(
                format!("[{value}s]"),
                focus_style(panel, PanelField::Preset(index)),
            ));
            presets.push(Span::raw(" "));
        }

        let radio = |behavior: NextBehavior, label: &str| {
            let mark = if panel.next_behavior() == behavior { "(•)" } else { "( )" };
            Span::styled(
                format!("{mark} {label}"),
                focus_style(panel, PanelField::Behavior(behavior)),
            )
        };

        let lines = vec![
            Line::from(format!("Skip time: {}", panel.value_label())),
            Line::from(Span::styled(
                slider_bar(panel.skip_time()),
                focus_style(panel, PanelField::Slider),
            )),
            Line::from(presets),
            Line::from(""),
            Line::from("Next episode:"),
            Line::from(vec![
                radio(NextBehavior::Auto, "Auto next"),
                Span::raw("  "),
                radio(NextBehavior::Manual, "Manual button"),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled("[ Save ]", focus_style(panel, PanelField::Save)),
                Span::raw("  "),
                Span::styled("[ Cancel ]", focus_style(panel, PanelField::Cancel)),
            ]),
        ];

        frame.render_widget(Paragraph::new(lines), rows[0]);
        let footer = Paragraph::new("Tab move | ←/→ slide | Enter select | Esc close")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(footer, rows[1]);
    }
}
