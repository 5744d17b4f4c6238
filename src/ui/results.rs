use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, List, ListItem, Paragraph, Widget},
};

use super::charting::{level_bars, points_per_round};
use super::{bold, dim, legend_style, PALETTE};
use crate::App;
use tock::clock::Clock;
use tock::difficulty::Difficulty;
use tock::level::LevelId;
use tock::rating::{RatingEntry, OVERALL_BUCKET};
use tock::session::Session;
use tock::util::{format_clock, truncate_text};

/// Display columns for names in the rating tables.
pub const NAME_COLUMNS: usize = 12;

pub fn render<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let session = if app.results.from_game {
        app.store.last_session()
    } else {
        None
    };
    let summary_height = if session.is_some() { 14 } else { 0 };

    let [title, summary, ratings, confirm, legend] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(summary_height),
        Constraint::Min(5),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    Paragraph::new(Line::styled("Results", bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(title, buf);

    if let Some(session) = &session {
        render_summary(session, summary, buf);
    }

    let book = app.store.rating();
    let buckets = book.shown_buckets(app.settings.rating_scheme);
    let columns = Layout::horizontal(
        buckets
            .iter()
            .map(|_| Constraint::Ratio(1, buckets.len() as u32)),
    )
    .split(ratings);
    for (key, column) in buckets.iter().zip(columns.iter()) {
        render_rating(bucket_title(key), book.bucket(key), *column, buf);
    }

    if app.results.confirm_clear {
        Paragraph::new(Line::styled(
            "Delete every rating entry? (y/n)",
            bold().fg(Color::Red),
        ))
        .alignment(Alignment::Center)
        .render(confirm, buf);
    }

    Paragraph::new("(r)estart / (n)ew game / (c)lear rating / (esc)ape")
        .style(legend_style())
        .render(legend, buf);
}

fn render_summary(session: &Session, area: Rect, buf: &mut Buffer) {
    let [top, rounds] =
        Layout::vertical([Constraint::Length(8), Constraint::Min(3)]).areas(area);
    let [facts, chart] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(top);

    let mut status = format!("Status: {}", session.status.label());
    if let Some(last) = session.last_level_result() {
        status.push_str(&format!(" · {}", last.id.title()));
    }
    if let Some(message) = &session.message {
        status.push_str(&format!(" · {message}"));
    }
    let mut lines = vec![
        Line::from(vec![
            Span::raw("Player: "),
            Span::styled(truncate_text(&session.player_name, 32), bold()),
        ]),
        Line::raw(format!("Score: {}", session.total_score)),
        Line::styled(
            format!("Penalties: {}", session.penalties),
            Style::default().fg(Color::Red),
        ),
        Line::raw(format!(
            "Time spent: {}",
            format_clock(session.duration_secs())
        )),
        Line::raw(status),
    ];
    if let Some(avg) = points_per_round(&session.level_results) {
        lines.push(Line::styled(format!("{avg:.0} pts per round"), dim()));
    }
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Last game"))
        .render(facts, buf);

    let bars = level_bars(&session.level_results);
    BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Best per level"))
        .bar_width(8)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Magenta))
        .value_style(bold().fg(Color::Black).bg(Color::Magenta))
        .data(bars.as_slice())
        .render(chart, buf);

    let log = session
        .last_level_result()
        .map(|r| r.rounds_log.as_slice())
        .unwrap_or_default();
    let items: Vec<ListItem> = if log.is_empty() {
        vec![ListItem::new(Span::styled("No round data.", dim()))]
    } else {
        log.iter().map(|e| ListItem::new(e.clone())).collect()
    };
    List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Rounds"))
        .render(rounds, buf);
}

fn bucket_title(key: &str) -> String {
    if key == OVERALL_BUCKET {
        return "Overall".to_string();
    }
    if let Some(level) = LevelId::ORDER.iter().find(|l| l.to_string() == key) {
        return level.title().to_string();
    }
    Difficulty::from_stored(key).profile().label.to_string()
}

fn render_rating(title: String, entries: &[RatingEntry], area: Rect, buf: &mut Buffer) {
    let items: Vec<ListItem> = if entries.is_empty() {
        vec![ListItem::new(Span::styled("No results yet.", dim()))]
    } else {
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:>2}. {:<width$}", i + 1, truncate_text(&entry.name, NAME_COLUMNS), width = NAME_COLUMNS),
                        Style::default().fg(PALETTE[i % PALETTE.len()]),
                    ),
                    Span::raw(format!(" {} pts", entry.score)),
                    Span::styled(format!(" · penalty {}", entry.penalty), dim()),
                ]))
            })
            .collect()
    };
    List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_titles() {
        assert_eq!(bucket_title("overall"), "Overall");
        assert_eq!(bucket_title("runner"), "Mouse and Tunnel");
        assert_eq!(bucket_title("rush"), "Assault");
        assert_eq!(bucket_title("calm"), "Warm-up");
    }
}
