use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_upload_prompt {
        handle_upload_prompt(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('d') => app.scroll_chat_down((app.chat_height / 2).max(1)),
            KeyCode::Char('u') => app.scroll_chat_up((app.chat_height / 2).max(1)),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Enter => {
            app.focus = FocusPane::Chat;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Tab => app.cycle_focus(),

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Chat => app.scroll_chat_down(1),
            FocusPane::Documents => app.documents_nav_down(),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Chat => app.scroll_chat_up(1),
            FocusPane::Documents => app.documents_nav_up(),
        },
        KeyCode::PageDown => app.scroll_chat_down((app.chat_height / 2).max(1)),
        KeyCode::PageUp => app.scroll_chat_up((app.chat_height / 2).max(1)),
        KeyCode::Char('G') => app.scroll_chat_to_end(),
        KeyCode::Char('g') => app.chat_scroll = 0,

        // Documents panel
        KeyCode::Char('d') => app.toggle_documents(),
        KeyCode::Char('u') => app.open_upload_prompt(),
        KeyCode::Char('r') => app.request_refresh(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => app.submit_query(),
        _ => {
            edit_line(&mut app.query_input, &mut app.query_cursor, key.code);
        }
    }
}

fn handle_upload_prompt(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_upload_prompt(),
        KeyCode::Enter => app.submit_upload(),
        _ => {
            edit_line(&mut app.upload_input, &mut app.upload_cursor, key.code);
        }
    }
}

/// Single-line editing shared by the query box and the upload prompt.
fn edit_line(input: &mut String, cursor: &mut usize, code: KeyCode) {
    match code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < input.chars().count() {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            *cursor = (*cursor + 1).min(input.chars().count());
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .is_some_and(|r| point_in_rect(mouse.column, mouse.row, r));
    let in_documents = app
        .documents_area
        .is_some_and(|r| point_in_rect(mouse.column, mouse.row, r));

    match mouse.kind {
        MouseEventKind::ScrollDown if in_chat => app.scroll_chat_down(3),
        MouseEventKind::ScrollUp if in_chat => app.scroll_chat_up(3),
        MouseEventKind::ScrollDown if in_documents => app.documents_nav_down(),
        MouseEventKind::ScrollUp if in_documents => app.documents_nav_up(),
        _ => {}
    }
}
