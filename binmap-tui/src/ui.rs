use chrono::{Local, NaiveDate};
use ratatui::{
    prelude::*,
    widgets::{
        Block, Borders, Clear, Paragraph, Wrap,
        canvas::{Canvas, Context},
    },
};

use binmap_core::{
    controller::LOCATION_PROMPT,
    model::{CanType, MarkerHandle, ViewState},
    overlay::OverlayView,
};

use crate::app::App;
use crate::terminal_map::{Glyph, MapSnapshot, MapView};

// Half the visible latitude span at level 1; each level up doubles it.
const BASE_SPAN_DEG: f64 = 0.0025;

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new("binmap – waste bins around you")
        .block(Block::default().borders(Borders::ALL).title("Binmap"));
    frame.render_widget(header, *header_area);

    match app.state() {
        ViewState::Loading => draw_loading(frame, *content_area),
        ViewState::LocationError => draw_location_prompt(frame, *content_area),
        ViewState::Ready => {
            draw_map(frame, app, *content_area);
            if let Some(view) = app.overlay() {
                draw_overlay(frame, &view, *content_area);
            }
        }
    }

    draw_status(frame, app, *status_area);
}

fn draw_status(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let nav_hint = match app.state() {
        ViewState::Loading => "q/Ctrl-C quit",
        ViewState::LocationError => "Enter/Esc try again · q/Ctrl-C quit",
        ViewState::Ready if app.overlay().is_some() => "Esc close · ←/→ select · q/Ctrl-C quit",
        ViewState::Ready => "←/→ select bin · Enter open · r refresh · q/Ctrl-C quit",
    };

    let notice = app
        .status
        .as_deref()
        .or_else(|| app.controller.fetch_error().map(|_| "Could not load nearby bins"));

    let status_text = if app.busy {
        format!("Refreshing… · {nav_hint}")
    } else if let Some(msg) = notice {
        format!("{msg} · {nav_hint}")
    } else {
        format!("{} bins · {nav_hint}", app.controller.marker_count())
    };

    let status_style = if notice.is_some() {
        Style::default().fg(Color::Red)
    } else if app.busy {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, area);
}

fn draw_loading(frame: &mut Frame<'_>, area: Rect) {
    let paragraph = Paragraph::new("Finding nearby bins…")
        .block(Block::default().borders(Borders::ALL).title("Map"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn draw_location_prompt(frame: &mut Frame<'_>, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Map");
    frame.render_widget(block, area);

    let popup = centered_rect(60, 30, area);
    let prompt = Paragraph::new(LOCATION_PROMPT)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Location unavailable")
                .style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(Clear, popup);
    frame.render_widget(prompt, popup);
}

fn draw_map(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let snapshot = app.snapshot();
    let Some(view) = snapshot.view else {
        let paragraph = Paragraph::new("The map could not be shown.")
            .block(Block::default().borders(Borders::ALL).title("Map"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    };

    let selected = app.selected_marker();
    let (x_bounds, y_bounds) = bounds(&view);
    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Map · level {}", view.level)),
        )
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(move |ctx| paint_markers(ctx, &snapshot, selected));
    frame.render_widget(canvas, area);
}

fn bounds(view: &MapView) -> ([f64; 2], [f64; 2]) {
    let half = BASE_SPAN_DEG * 2f64.powi(i32::from(view.level.saturating_sub(1)));
    let center = view.center;
    (
        [center.longitude - half, center.longitude + half],
        [center.latitude - half, center.latitude + half],
    )
}

fn paint_markers(ctx: &mut Context<'_>, snapshot: &MapSnapshot, selected: Option<MarkerHandle>) {
    // The user marker goes last so it stays visible on top of nearby bins.
    let mut markers = snapshot.markers.clone();
    markers.sort_by_key(|marker| marker.glyph == Glyph::User);

    for marker in markers {
        let (symbol, color) = glyph_symbol(marker.glyph);
        let mut style = Style::default().fg(color);
        if Some(marker.handle) == selected {
            style = style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
        }
        ctx.print(
            marker.position.longitude,
            marker.position.latitude,
            Span::styled(symbol, style),
        );
    }
}

fn glyph_symbol(glyph: Glyph) -> (&'static str, Color) {
    match glyph {
        Glyph::User => ("@", Color::Cyan),
        Glyph::General => ("■", Color::Gray),
        Glyph::Recyclable => ("♻", Color::Green),
    }
}

fn draw_overlay(frame: &mut Frame<'_>, view: &OverlayView, area: Rect) {
    let record = &view.record;
    let today = Local::now().date_naive();

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Type: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(can_type_label(record.can_type)),
        ]),
        Line::from(vec![
            Span::styled("Address: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(record.address.as_deref().unwrap_or("unknown").to_owned()),
        ]),
    ];
    if let Some(description) = record.description.as_deref().filter(|text| !text.is_empty()) {
        lines.push(Line::from(description.to_owned()));
    }
    if let Some(created_at) = record.created_at {
        lines.push(Line::from(format!(
            "Reported {} ({})",
            relative_day_label(created_at.date(), today),
            created_at.format("%Y-%m-%d")
        )));
    }
    lines.push(Line::from(""));
    if view.access.can_edit() && view.access.can_delete() {
        lines.push(Line::styled(
            "You reported this bin; you may edit or delete it.",
            Style::default().fg(Color::Green),
        ));
    }

    let popup = centered_rect(60, 50, area);
    let overlay = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Bin #{} (Esc to close)", record.id)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(Clear, popup);
    frame.render_widget(overlay, popup);
}

fn can_type_label(can_type: CanType) -> &'static str {
    match can_type {
        CanType::General => "General waste",
        CanType::Recyclable => "Recyclables",
    }
}

fn relative_day_label(date: NaiveDate, today: NaiveDate) -> String {
    let delta = (today - date).num_days();
    match delta {
        0 => "today".to_owned(),
        1 => "yesterday".to_owned(),
        days if days > 1 => format!("{days} days ago"),
        _ => "recently".to_owned(),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let [_, middle, _] = vertical.as_ref() else {
        return area;
    };
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(*middle);
    let [_, popup, _] = horizontal.as_ref() else {
        return *middle;
    };
    *popup
}
