use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use chrono::Local;
use docchat::{ChatState, Role};
use crate::app::{App, FocusPane, InputMode};

/// Render a line of assistant text, turning **bold** runs into bold spans.
/// An unmatched `**` is kept as literal text.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let parts: Vec<&str> = text.split("**").collect();
    // An even part count means the last `**` has no partner.
    let unclosed = parts.len() % 2 == 0;

    let mut spans: Vec<Span<'static>> = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;
        if i % 2 == 1 && !(unclosed && is_last) {
            if !part.is_empty() {
                spans.push(Span::styled(
                    part.to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            }
        } else if unclosed && is_last {
            spans.push(Span::raw(format!("**{}", part)));
        } else if !part.is_empty() {
            spans.push(Span::raw(part.to_string()));
        }
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let state = app.session.state().snapshot();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, &state, frame, header_area);

    if app.show_documents {
        let [thread_area, documents_area] = Layout::horizontal([
            Constraint::Percentage(70),
            Constraint::Percentage(30),
        ])
        .areas(body_area);
        render_thread(app, &state, frame, thread_area);
        render_documents(app, &state, frame, documents_area);
    } else {
        app.documents_area = None;
        render_thread(app, &state, frame, body_area);
    }

    render_footer(app, &state, frame, footer_area);

    if app.show_upload_prompt {
        render_upload_prompt(app, frame, area);
    }
}

fn render_header(app: &App, state: &ChatState, frame: &mut Frame, area: Rect) {
    let indexing = if state.is_indexing { " [indexing]" } else { "" };

    let title = Line::from(vec![
        Span::styled(" Document Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("[{}]", app.backend_label()), Style::default().fg(Color::Gray)),
        Span::styled(indexing, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, state: &ChatState, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = if app.show_upload_prompt {
        (" UPLOAD ", Style::default().bg(Color::Magenta).fg(Color::White))
    } else {
        match app.input_mode {
            InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
            InputMode::Editing => (" ASK ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        }
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let disabled_style = Style::default().bg(Color::Black).fg(Color::DarkGray);

    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let mut hints: Vec<Span> = Vec::new();
    if app.show_upload_prompt {
        hints.extend(hint("Enter", "upload"));
        hints.extend(hint("Esc", "cancel"));
    } else {
        match app.input_mode {
            InputMode::Editing => {
                if state.is_processing {
                    hints.push(Span::styled(" Enter ", key_style));
                    hints.push(Span::styled(" waiting for reply ", disabled_style));
                } else {
                    hints.extend(hint("Enter", "send"));
                }
                hints.extend(hint("Esc", "stop typing"));
            }
            InputMode::Normal => {
                hints.extend(hint("i", "ask"));
                hints.extend(hint("j/k", "scroll"));
                hints.extend(hint("Tab", "focus"));
                hints.extend(hint("d", if app.show_documents { "hide docs" } else { "docs" }));
                if state.is_indexing {
                    hints.push(Span::styled(" u ", key_style));
                    hints.push(Span::styled(" indexing... ", disabled_style));
                } else {
                    hints.extend(hint("u", "upload"));
                }
                hints.extend(hint("r", "refresh"));
                hints.extend(hint("q", "quit"));
            }
        }
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// The conversation as displayed: one block per message, then the pending
/// reply placeholder while a query is in flight.
fn thread_text(state: &ChatState, animation_frame: u8) -> Text<'static> {
    if state.messages.is_empty() && !state.is_processing {
        return Text::from(Span::styled(
            "Ask a question about your documents...",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in &state.messages {
        let time = msg.timestamp.with_timezone(&Local).format("%H:%M").to_string();
        let (label, color) = match msg.role {
            Role::User => ("You", Color::Cyan),
            Role::Assistant => ("Assistant", Color::Yellow),
        };
        lines.push(Line::from(vec![
            Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(format!(" {}", time), Style::default().fg(Color::DarkGray)),
        ]));

        match msg.role {
            Role::User => {
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            Role::Assistant => {
                for line in msg.content.lines() {
                    lines.push(parse_markdown_line(line));
                }
                if !msg.sources.is_empty() {
                    lines.push(Line::from(Span::styled(
                        "Sources:",
                        Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC),
                    )));
                    for (i, source) in msg.sources.iter().enumerate() {
                        lines.push(Line::from(vec![
                            Span::styled(format!("  [{}] ", i + 1), Style::default().fg(Color::Magenta)),
                            Span::raw(source.title.clone()),
                            Span::styled(
                                format!(" - {}", source.locator),
                                Style::default().fg(Color::DarkGray),
                            ),
                        ]));
                    }
                }
            }
        }
        lines.push(Line::default());
    }

    if state.is_processing {
        lines.push(Line::from(Span::styled(
            "Assistant",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Searching documents{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    Text::from(lines)
}

fn render_thread(app: &mut App, state: &ChatState, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    let chat_text = thread_text(state, app.animation_frame);

    // Wrapped height, counted with the wrapping the paragraph renders with
    let wrapped_lines = Paragraph::new(chat_text.clone())
        .wrap(Wrap { trim: false })
        .line_count(chat_area.width.saturating_sub(2));

    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_lines = u16::try_from(wrapped_lines).unwrap_or(u16::MAX);
    app.follow_new_messages(state.messages.len());

    let chat_focused = app.focus == FocusPane::Chat && app.input_mode == InputMode::Normal;
    let border_color = if chat_focused { Color::Cyan } else { Color::DarkGray };

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Conversation ({}) ", state.messages.len()));

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    render_input(app, state, frame, input_area);
}

fn render_input(app: &App, state: &ChatState, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && !app.show_upload_prompt;
    let border_color = if state.is_processing {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };

    let title = if state.is_processing {
        " Ask (waiting for reply) "
    } else {
        " Ask (Enter to send) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width > 0 && app.query_cursor >= inner_width {
        app.query_cursor - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .query_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (app.query_cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_documents(app: &mut App, state: &ChatState, frame: &mut Frame, area: Rect) {
    app.documents_area = Some(area);

    let focused = app.focus == FocusPane::Documents && app.input_mode == InputMode::Normal;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(
            " Documents {}/{} ",
            state.indexed_count,
            state.documents.len()
        ));

    let [list_area, status_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(block.inner(area));
    frame.render_widget(block, area);

    if state.documents.is_empty() {
        let placeholder = Paragraph::new("No documents yet.\nPress 'u' to upload one.")
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(placeholder, list_area);
    } else {
        let items: Vec<ListItem> = state
            .documents
            .iter()
            .map(|doc| {
                if doc.status.is_indexed() {
                    ListItem::new(Line::from(vec![
                        Span::styled("● ", Style::default().fg(Color::Green)),
                        Span::raw(doc.name.clone()),
                    ]))
                } else {
                    ListItem::new(Line::from(vec![
                        Span::styled("○ ", Style::default().fg(Color::Yellow)),
                        Span::raw(doc.name.clone()),
                        Span::styled(" (pending)", Style::default().fg(Color::DarkGray)),
                    ]))
                }
            })
            .collect();

        let list = List::new(items)
            .highlight_style(
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        frame.render_stateful_widget(list, list_area, &mut app.documents_state);
    }

    let status = if state.is_indexing {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Line::from(Span::styled(
            format!("Indexing{}", dots),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ))
    } else {
        Line::from(vec![
            Span::styled(" u ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::styled(" upload document", Style::default().fg(Color::Gray)),
        ])
    };
    frame.render_widget(Paragraph::new(status), status_area);
}

fn render_upload_prompt(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered, clamped to the frame)
    let popup_width = 64.min(area.width.saturating_sub(4));
    let popup_height = 6.min(area.height);

    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height).intersection(area);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Upload Document ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let instructions = Paragraph::new("Path to the file. Enter to upload, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    if inner.height < 3 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let width = input_area.width as usize;
    let scroll_offset = if app.upload_cursor >= width {
        app.upload_cursor - width + 1
    } else {
        0
    };
    let visible: String = app.upload_input.chars().skip(scroll_offset).take(width).collect();

    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    let cursor_x = (app.upload_cursor - scroll_offset) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}
