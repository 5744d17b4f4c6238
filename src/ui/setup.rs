use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use super::{bold, dim, legend_style};
use crate::{App, SetupFocus};
use tock::clock::Clock;
use tock::difficulty::Difficulty;
use tock::util::format_clock;

pub fn render<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let form = &app.setup;
    let [title, name, picker, details, error, _, legend] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    Paragraph::new(Line::styled(
        "New player",
        bold().fg(Color::Cyan),
    ))
    .alignment(Alignment::Center)
    .render(title, buf);

    let focused = |f: SetupFocus| {
        if form.focus == f {
            Style::default().fg(Color::Yellow)
        } else {
            dim()
        }
    };

    let cursor = if form.focus == SetupFocus::Name { "▏" } else { "" };
    Paragraph::new(Line::from(vec![
        Span::styled(form.name.clone(), bold()),
        Span::styled(cursor, Style::default().add_modifier(Modifier::SLOW_BLINK)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Name")
            .border_style(focused(SetupFocus::Name)),
    )
    .render(name, buf);

    let options: Vec<Span> = Difficulty::ALL
        .iter()
        .flat_map(|d| {
            let label = format!(" {} ", d.profile().label);
            let style = if *d == form.difficulty {
                bold().fg(Color::Black).bg(Color::Yellow)
            } else {
                dim()
            };
            [Span::styled(label, style), Span::raw("  ")]
        })
        .collect();
    Paragraph::new(Line::from(options))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Difficulty")
                .border_style(focused(SetupFocus::Difficulty)),
        )
        .render(picker, buf);

    let profile = form.difficulty.profile();
    Paragraph::new(format!(
        "Time {} · tolerance {} ms · penalty {} · distractions {}",
        format_clock(profile.global_time_secs),
        profile.tolerance_ms,
        profile.penalty_factor,
        profile.distraction
    ))
    .style(dim())
    .alignment(Alignment::Center)
    .render(details, buf);

    if let Some(message) = &form.error {
        Paragraph::new(Line::styled(message.clone(), bold().fg(Color::Red)))
            .alignment(Alignment::Center)
            .render(error, buf);
    }

    Paragraph::new("(tab) switch field / (←/→) difficulty / (enter) play / (esc)ape")
        .style(legend_style())
        .render(legend, buf);
}
