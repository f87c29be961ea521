use ratatui::{prelude::*, widgets::*};

use crate::constants::{APP_NAME, APP_VERSION};
use crate::messages::ui_events::InputMode;
use crate::messages::RenderState;
use crate::models::{DraftField, SessionStatus, TextField};

/// Get color for a session status
pub fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::Disconnected => Color::Red,
        SessionStatus::Connecting => Color::Yellow,
        SessionStatus::Connected => Color::Green,
        SessionStatus::Subscribed => Color::Cyan,
    }
}

pub fn draw_ui(f: &mut Frame, state: &RenderState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Connection line
            Constraint::Length(3), // Subscribe
            Constraint::Min(5),    // Messages
            Constraint::Length(3), // Publish
            Constraint::Length(1), // Key hints
        ])
        .split(area);

    draw_connection_line(f, state, chunks[0]);
    draw_subscribe_panel(f, state, chunks[1]);
    draw_messages(f, state, chunks[2]);
    draw_publish_panel(f, state, chunks[3]);
    draw_hint_bar(f, state, chunks[4]);

    if state.show_help {
        draw_help_popup(f, area);
    }
}

fn draw_connection_line(f: &mut Frame, state: &RenderState, area: Rect) {
    let server = match (&state.server, state.status) {
        (Some(server), _) => server.clone(),
        (None, SessionStatus::Connecting) => state.servers.join(", "),
        (None, _) => String::new(),
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", APP_NAME),
            Style::default().fg(Color::Black).bg(Color::Magenta).bold(),
        ),
        Span::raw(" "),
        Span::styled(
            format!("[{}]", state.status.as_str()),
            Style::default().fg(status_color(state.status)).bold(),
        ),
        Span::raw(" "),
        Span::styled(server, Style::default().fg(Color::Gray)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn field_block<'a>(title: String, focused: bool, input_mode: InputMode) -> Block<'a> {
    let border_style = if focused && input_mode == InputMode::Editing {
        Style::default().fg(Color::Yellow)
    } else if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title)
}

fn place_cursor(f: &mut Frame, field: &TextField, area: Rect) {
    let max_x = area.x + area.width.saturating_sub(2);
    let cursor_x = (area.x + field.cursor() as u16 + 1).min(max_x);
    f.set_cursor_position(Position::new(cursor_x, area.y + 1));
}

fn draw_subscribe_panel(f: &mut Frame, state: &RenderState, area: Rect) {
    let focused = state.focus == DraftField::SubscribeSubject;

    let detail = match &state.subscription {
        Some(sub) if sub.live => format!(" listening on '{}', {} received", sub.subject, sub.processed),
        Some(sub) => format!(
            " '{}' stopped: {}",
            sub.subject,
            sub.error.as_deref().unwrap_or("stream ended")
        ),
        None => " not subscribed".to_string(),
    };

    let block = field_block(
        format!(" Subscribe (s) |{} ", detail),
        focused,
        state.input_mode,
    );
    f.render_widget(Paragraph::new(state.subscribe_subject.value()).block(block), area);

    if focused && state.input_mode == InputMode::Editing {
        place_cursor(f, &state.subscribe_subject, area);
    }
}

fn draw_messages(f: &mut Frame, state: &RenderState, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Messages ({}) ", state.messages.len()));

    let mut lines: Vec<Line> = state
        .messages
        .iter()
        .map(|m| {
            Line::from(vec![
                Span::styled(format!("{} ", m.time_label()), Style::default().fg(Color::DarkGray)),
                Span::styled(format!("{}: ", m.subject), Style::default().fg(Color::Cyan)),
                Span::raw(m.payload.clone()),
            ])
        })
        .collect();

    if lines.is_empty() {
        let hint = if state.status.is_connected() {
            "No messages yet. Press 's' to subscribe, 'p' to publish."
        } else {
            "Not connected. Press 'c' to connect."
        };
        lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));
    }

    // Follow the newest message unless scrolled back
    let visible = area.height.saturating_sub(2) as usize;
    let total = lines.len();
    let top = total
        .saturating_sub(visible)
        .saturating_sub(state.log_scroll as usize);

    let messages = Paragraph::new(lines)
        .block(block)
        .scroll((top.min(u16::MAX as usize) as u16, 0));
    f.render_widget(messages, area);
}

fn draw_publish_panel(f: &mut Frame, state: &RenderState, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    for (field, text, rect) in [
        (DraftField::PublishSubject, &state.publish_subject, halves[0]),
        (DraftField::PublishPayload, &state.publish_payload, halves[1]),
    ] {
        let focused = state.focus == field;
        let title = match field {
            DraftField::PublishPayload => format!(" {} (p) ", field.label()),
            _ => format!(" {} ", field.label()),
        };
        let block = field_block(title, focused, state.input_mode);
        f.render_widget(Paragraph::new(text.value()).block(block), rect);

        if focused && state.input_mode == InputMode::Editing {
            place_cursor(f, text, rect);
        }
    }
}

fn draw_hint_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    let hints = if state.input_mode == InputMode::Editing {
        " ESC:stop editing | Enter:submit | arrows:move | Tab:next field "
    } else {
        " c:connect | d:disconnect | s:subscribe | u:unsubscribe | p:publish | Tab:field | e:edit | ?:help | q:quit "
    };

    let bar = Paragraph::new(hints).style(Style::default().fg(Color::DarkGray));
    f.render_widget(bar, area);
}

fn draw_help_popup(f: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);

    let help_text = format!(
        r#"
 {} {} - Keyboard Shortcuts

 SESSION
   c                  Connect to the broker
   d                  Disconnect (drains the connection)
   s                  Subscribe to the subject (clears messages)
   u                  Unsubscribe
   p                  Publish the message

 FIELDS
   Tab / Shift+Tab    Move between subject, publish subject, message
   e / Enter          Edit focused field
   Enter (editing)    Subscribe / publish from the focused form
   Esc                Stop editing

 MESSAGES
   ↑ / ↓              Scroll

 GENERAL
   ?                  Toggle this help
   q / Ctrl+C         Quit

 Press any key to close...
"#,
        APP_NAME, APP_VERSION
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));

    let help = Paragraph::new(help_text)
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
