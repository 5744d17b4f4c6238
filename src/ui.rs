pub mod charting;
pub mod game;
pub mod results;
pub mod setup;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{App, AppState};
use tock::clock::Clock;

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;
const TOAST_WIDTH: u16 = 44;

/// Shared palette, cycled by floaters and rating rows.
pub const PALETTE: [Color; 7] = [
    Color::Yellow,
    Color::Magenta,
    Color::Cyan,
    Color::Green,
    Color::Red,
    Color::Blue,
    Color::LightYellow,
];

pub fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

pub fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

pub fn legend_style() -> Style {
    Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::ITALIC)
}

impl<C: Clock + Clone> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = area.inner(ratatui::layout::Margin {
            horizontal: HORIZONTAL_MARGIN,
            vertical: VERTICAL_MARGIN,
        });
        match self.state {
            AppState::Setup => setup::render(self, inner, buf),
            AppState::Playing => game::render(self, inner, buf),
            AppState::Results => results::render(self, inner, buf),
        }
        render_toasts(self, area, buf);
    }
}

/// Stack the live toasts in the top-right corner.
fn render_toasts<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    if app.toasts.is_empty() || area.width < 10 {
        return;
    }
    let width = TOAST_WIDTH.min(area.width);
    let mut y = area.y;
    for toast in app.toasts.iter() {
        let text_width = toast.text.width() as u16;
        let lines = text_width.div_ceil(width.saturating_sub(2).max(1)).max(1);
        let height = lines + 2;
        if y + height > area.bottom() {
            break;
        }
        let rect = Rect::new(area.right() - width, y, width, height);
        Clear.render(rect, buf);
        Paragraph::new(Line::styled(toast.text.clone(), bold()))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .render(rect, buf);
        y += height;
    }
}
