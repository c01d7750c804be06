use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, ChatEntry, EntryBody, InputMode, Role};
use crate::table::format_table;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = if app.server_up {
        Span::styled(" online ", Style::default().fg(Color::Green))
    } else {
        Span::styled(" offline ", Style::default().fg(Color::Red))
    };

    let title = Line::from(vec![
        Span::styled(" datachat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.client.base_url().to_string(), Style::default().fg(Color::Gray)),
        status,
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus
    // borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let chat_text = if app.transcript.is_empty() && !app.is_loading() {
        Text::from(Span::styled(
            "Ask a question about your data...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for entry in &app.transcript {
            push_entry_lines(&mut lines, entry, app.show_sql);
        }

        if app.is_loading() {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn push_entry_lines(lines: &mut Vec<Line<'static>>, entry: &ChatEntry, show_sql: bool) {
    match entry.role {
        Role::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
        }
        Role::Assistant => {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
        }
    }

    match &entry.body {
        EntryBody::Text(text) => {
            for line in text.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        EntryBody::Table(table) => {
            let grid = format_table(&table.columns, &table.rows);
            for (i, line) in grid.into_iter().enumerate() {
                let style = if i == 0 {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else if i == 1 {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default()
                };
                lines.push(Line::from(Span::styled(line, style)));
            }
            if let Some(insight) = &table.insight {
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    insight.clone(),
                    Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC),
                )));
            }
        }
    }

    if entry.role == Role::Assistant {
        if let Some(meta) = &entry.meta {
            let mut parts: Vec<String> = Vec::new();
            if let Some(source) = &meta.source {
                parts.push(format!("source: {}", source));
            }
            if show_sql {
                if let Some(sql) = &meta.sql_used {
                    parts.push(format!("sql: {}", sql));
                }
                if let Some(tables) = &meta.tables_used {
                    if !tables.is_empty() {
                        parts.push(format!("tables: {}", tables.join(", ")));
                    }
                }
            }
            if !parts.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("[{}]", parts.join(" · ")),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
    }

    lines.push(Line::default());
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(if app.is_loading() {
            " Ask (waiting for reply) "
        } else {
            " Ask "
        });

    // Horizontal scrolling keeps the cursor visible in a long question.
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Editing => (" ASK ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        InputMode::Normal => (" BROWSE ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    let hints = match app.input_mode {
        InputMode::Editing => " Enter send · ↑/↓ scroll · Esc browse · Ctrl-C quit",
        InputMode::Normal => " i edit · j/k scroll · g/G top/bottom · s sql · q quit",
    };

    let footer = Line::from(vec![
        Span::styled(mode_text, mode_style),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}
