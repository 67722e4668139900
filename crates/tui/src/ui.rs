use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style, Modifier},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};

use courier_core::logger::{COLOR_BLUE, COLOR_GRAY, COLOR_GREEN, COLOR_MAGENTA};
use courier_core::types::LogLine;
use crate::app::{App, Mode};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    // -- Left panel: banner, message, contacts, progress --

    let (banner_label, banner_bg) = if app.running {
        (format!("SENDING {}% (Press c to cancel)", app.progress), Color::Green)
    } else {
        match app.last_run {
            Some(true) => ("DONE".to_string(), Color::Cyan),
            Some(false) => ("FAILED (see log)".to_string(), Color::Red),
            None => ("IDLE".to_string(), Color::DarkGray),
        }
    };

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    // Full-width centered banner
    let banner_width = left_chunks[0].width as usize;
    let pad_total = banner_width.saturating_sub(banner_label.len());
    let pad_left = pad_total / 2;
    let pad_right = pad_total - pad_left;
    let centered_banner = format!("{}{}{}", " ".repeat(pad_left), banner_label, " ".repeat(pad_right));
    let banner = Paragraph::new(Line::from(Span::styled(
        centered_banner,
        Style::default().fg(Color::Black).bg(banner_bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, left_chunks[0]);

    let editing = matches!(app.mode, Mode::EditMessage);
    let message_text = if editing {
        format!("{}_", app.message)
    } else if app.message.is_empty() {
        "(empty, press e to edit)".to_string()
    } else {
        app.message.clone()
    };
    let message = Paragraph::new(message_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(if editing { " Message (Enter to finish) " } else { " Message " })
            .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::Cyan })),
    );
    f.render_widget(message, left_chunks[1]);

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(vec![
        Span::styled(" j", Style::default().fg(Color::Yellow)),
        Span::raw("/"),
        Span::styled("k", Style::default().fg(Color::Yellow)),
        Span::raw(" select, "),
        Span::styled("enter", Style::default().fg(Color::Yellow)),
        Span::raw(" send, "),
        Span::styled("b", Style::default().fg(Color::Yellow)),
        Span::raw(" send all, "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" reload"),
    ]));
    lines.push(Line::from(""));

    if app.contacts.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("  no contacts in {}", app.contacts_path.display()),
            Style::default().fg(Color::DarkGray),
        )));
    }

    for (i, row) in app.contacts.iter().enumerate() {
        let prefix = if i == app.selected { "> " } else { "  " };
        let (mark, mark_color) = match row.result {
            Some(true) => ("[ok]", Color::Green),
            Some(false) => ("[x] ", Color::Red),
            None => ("[ ] ", Color::DarkGray),
        };
        lines.push(Line::from(vec![
            Span::raw(prefix),
            Span::styled(mark, Style::default().fg(mark_color)),
            Span::raw(" "),
            Span::styled(
                row.target.name.clone(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    let contact_list = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .title(format!(" Contacts ({}) ", app.contacts.len()))
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(contact_list, left_chunks[2]);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Progress "))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(app.progress.min(100) as u16);
    f.render_widget(gauge, left_chunks[3]);

    // -- Right panel: logs --
    if app.log_visible && chunks.len() > 1 {
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_lines.len();
        let max_scroll = total.saturating_sub(visible_height);
        let scroll = app.log_scroll.min(max_scroll);
        let start = total.saturating_sub(visible_height + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app.log_lines[start..end]
            .iter()
            .map(render_log_line)
            .collect();

        let log_panel = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Logs ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(log_panel, chunks[1]);
    }

    if let Mode::ConfirmBatch(dialog) = &app.mode {
        dialog.render(f);
    }
}

fn render_log_line(line: &LogLine) -> Line<'_> {
    let prefix_color = match line.color {
        COLOR_GRAY => Color::DarkGray,
        COLOR_BLUE => Color::LightBlue,
        COLOR_GREEN => Color::LightGreen,
        COLOR_MAGENTA => Color::LightMagenta,
        _ => Color::White,
    };

    let mut spans = vec![
        Span::styled(line.timestamp.as_str(), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
    ];

    // Level tag: only show for warn/error
    match line.level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        _ => {}
    }

    if !line.prefix.is_empty() {
        spans.push(Span::styled(
            line.prefix.as_str(),
            Style::default().fg(prefix_color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" "));
    }

    spans.push(Span::styled(line.message.as_str(), Style::default().fg(prefix_color)));
    Line::from(spans)
}
