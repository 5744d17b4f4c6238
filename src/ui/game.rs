use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Widget, Wrap},
};

use super::{bold, dim, legend_style, PALETTE};
use crate::{App, Game};
use tock::clock::Clock;
use tock::controller::ControllerState;
use tock::distraction::Distractions;
use tock::level::runner::{TOKEN_START, TRACK_HALF_WIDTH, TRACK_LENGTH};
use tock::level::{LevelId, LevelView, TrackPoint};
use tock::util::format_ms;

const LOG_ROWS: u16 = 6;

pub fn render<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let Some(game) = app.game.as_ref() else {
        return;
    };
    let ctl = &game.controller;

    let [header, intro, progress, playground, log, legend] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Min(6),
        Constraint::Length(LOG_ROWS),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(game, header, buf);

    let level = ctl.current_level().or(ctl.upcoming_level());
    let heading = match (ctl.current_level(), level) {
        (Some(id), _) => format!(
            "Level {}: {}",
            ctl.level_label().unwrap_or_default(),
            id.title()
        ),
        (None, Some(id)) => format!(
            "Next up: {} · press enter to {}",
            id.title(),
            ctl.start_label().to_lowercase()
        ),
        (None, None) => ctl.start_label().to_string(),
    };
    Paragraph::new(vec![
        Line::styled(heading, bold().fg(Color::Cyan)),
        Line::styled(
            level.map(LevelId::description).unwrap_or_default(),
            dim(),
        ),
    ])
    .wrap(Wrap { trim: true })
    .render(intro, buf);

    let (done, total) = ctl.progress();
    Gauge::default()
        .gauge_style(Style::default().fg(Color::Green).bg(Color::DarkGray))
        .percent(ctl.progress_percent())
        .label(format!("Round {done} / {total} · {}%", ctl.progress_percent()))
        .render(progress, buf);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(ctl.current_level().map_or("Playground", LevelId::title));
    let inner = block.inner(playground);
    block.render(playground, buf);
    app.playground.set(inner);

    render_floaters(&game.distractions, inner, buf);
    match ctl.level_view() {
        Some(view) => render_level(&view, inner, buf),
        None if ctl.state() == ControllerState::Idle => {
            Paragraph::new(Line::styled(
                format!("[enter] {}", ctl.start_label()),
                bold().fg(Color::Yellow),
            ))
            .alignment(Alignment::Center)
            .render(centered_row(inner), buf);
        }
        None => {}
    }

    let entries = ctl.round_log();
    let skip = entries.len().saturating_sub(LOG_ROWS.saturating_sub(2) as usize);
    let items: Vec<ListItem> = entries
        .iter()
        .skip(skip)
        .map(|e| ListItem::new(e.clone()))
        .collect();
    List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Rounds"))
        .render(log, buf);

    let keys = match ctl.current_level() {
        Some(LevelId::Lamp) => "(enter) attempt / (space) stop the lamp / (x) stop level / (esc) end game",
        Some(LevelId::Runner) => "drag with the mouse or (space) grab, arrows move, (space) drop / (r) move burrow / (x) stop level",
        Some(LevelId::Pulse) => "(enter) show the rhythm / double-click or (space) on the beat / (x) stop level",
        None => "(enter) start / (esc) end game",
    };
    Paragraph::new(keys).style(legend_style()).render(legend, buf);
}

fn render_header<C: Clock>(game: &Game<C>, area: Rect, buf: &mut Buffer) {
    let ctl = &game.controller;
    let session = ctl.session();
    Paragraph::new(Line::from(vec![
        Span::styled(session.player_name.clone(), bold()),
        Span::styled(format!(" · {}", ctl.profile().label), dim()),
        Span::raw(format!("   Score {}", session.total_score)),
        Span::styled(
            format!("   Penalties {}", session.penalties),
            Style::default().fg(Color::Red),
        ),
    ]))
    .render(area, buf);

    let timer_style = if ctl.remaining_secs() <= 10 {
        bold().fg(Color::Red)
    } else {
        bold()
    };
    Paragraph::new(Span::styled(ctl.timer_display(), timer_style))
        .alignment(Alignment::Right)
        .render(area, buf);
}

fn centered_row(area: Rect) -> Rect {
    Rect::new(area.x, area.y + area.height / 2, area.width, 1.min(area.height))
}

fn render_floaters(distractions: &Distractions, area: Rect, buf: &mut Buffer) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    for floater in &distractions.floaters {
        let x = area.x + ((floater.x / 100.0) * area.width as f64) as u16;
        let y = area.y + ((floater.y / 100.0) * area.height as f64) as u16;
        if x < area.right() && y < area.bottom() {
            let color = PALETTE[floater.color_index % PALETTE.len()];
            buf.set_string(
                x,
                y,
                floater.symbol.to_string(),
                Style::default().fg(color).add_modifier(Modifier::DIM),
            );
        }
    }
}

fn render_level(view: &LevelView, area: Rect, buf: &mut Buffer) {
    match view {
        LevelView::Lamp {
            armed,
            lit,
            target_ms,
            hint,
        } => {
            let bulb_style = if *lit {
                bold().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let status = match (armed, target_ms) {
                (true, _) => "Armed".to_string(),
                (false, Some(ms)) => format!("Last delay {} s", format_ms(*ms)),
                (false, None) => String::new(),
            };
            let lines = vec![
                Line::styled("╭─────╮", bulb_style),
                Line::styled(if *lit { "│  ●  │" } else { "│  ○  │" }, bulb_style),
                Line::styled("╰─────╯", bulb_style),
                Line::raw(""),
                Line::styled(hint.clone(), dim()),
                Line::styled(status, dim()),
            ];
            let top = area.y + area.height.saturating_sub(lines.len() as u16) / 2;
            let rect = Rect::new(area.x, top, area.width, area.bottom().saturating_sub(top));
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .render(rect, buf);
        }
        LevelView::Runner {
            ready,
            dragging,
            token,
            goal,
            goal_radius,
            hint,
            ..
        } => {
            for row in area.top()..area.bottom() {
                for col in area.left()..area.right() {
                    let centre = cell_to_track(area, col, row);
                    if centre.distance(goal) < *goal_radius {
                        buf.set_string(col, row, "░", Style::default().fg(Color::Green));
                    }
                }
            }
            let (sx, sy) = track_to_cell(area, TrackPoint::at_progress(TOKEN_START, 0.0));
            buf.set_string(sx, sy, "▶", dim());
            let (gx, gy) = track_to_cell(area, *goal);
            buf.set_string(gx, gy, "◎", bold().fg(Color::Green));
            let token_style = if *dragging {
                bold().fg(Color::Yellow)
            } else {
                bold()
            };
            let (tx, ty) = track_to_cell(area, *token);
            buf.set_string(tx, ty, "●", token_style);

            let caption = if *ready || *dragging {
                hint.clone()
            } else {
                "Preparing the next run...".to_string()
            };
            Paragraph::new(Line::styled(caption, dim()))
                .alignment(Alignment::Center)
                .render(Rect::new(area.x, area.y, area.width, 1.min(area.height)), buf);
        }
        LevelView::Pulse { flash, ready, hint } => {
            let pad_style = if *flash {
                Style::default().fg(Color::Magenta)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let glyph = if *flash { "█" } else { "░" };
            let width = 16.min(area.width);
            let height = 4.min(area.height.saturating_sub(2));
            let pad = Rect::new(
                area.x + (area.width - width) / 2,
                area.y + area.height.saturating_sub(height + 2) / 2,
                width,
                height,
            );
            for row in pad.top()..pad.bottom() {
                buf.set_string(pad.x, row, glyph.repeat(width as usize), pad_style);
            }
            let caption_style = if *ready { bold().fg(Color::Yellow) } else { dim() };
            Paragraph::new(Line::styled(hint.clone(), caption_style))
                .alignment(Alignment::Center)
                .render(
                    Rect::new(
                        area.x,
                        pad.bottom().min(area.bottom().saturating_sub(1)),
                        area.width,
                        1.min(area.height),
                    ),
                    buf,
                );
        }
    }
}

/// Track coordinates at the centre of a terminal cell. Cells outside `area`
/// are pulled onto its edge.
pub fn cell_to_track(area: Rect, col: u16, row: u16) -> TrackPoint {
    if area.width == 0 || area.height == 0 {
        return TrackPoint::default();
    }
    let col = col.clamp(area.left(), area.right() - 1) - area.x;
    let row = row.clamp(area.top(), area.bottom() - 1) - area.y;
    let fx = (col as f64 + 0.5) / area.width as f64;
    let fy = (row as f64 + 0.5) / area.height as f64;
    TrackPoint::new(fx * TRACK_LENGTH, (fy - 0.5) * 2.0 * TRACK_HALF_WIDTH)
}

/// The cell a track point falls into.
pub fn track_to_cell(area: Rect, point: TrackPoint) -> (u16, u16) {
    let fx = (point.x / TRACK_LENGTH).clamp(0.0, 1.0);
    let fy = (point.y / (2.0 * TRACK_HALF_WIDTH) + 0.5).clamp(0.0, 1.0);
    let col = ((fx * area.width as f64) as u16).min(area.width.saturating_sub(1));
    let row = ((fy * area.height as f64) as u16).min(area.height.saturating_sub(1));
    (area.x + col, area.y + row)
}
