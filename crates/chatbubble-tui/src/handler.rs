use anyhow::Result;
use chatbubble_core::ChatTransport;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::App;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event<T: ChatTransport + ?Sized + 'static>(app: &mut App<T>, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick();
            app.poll_request().await;
        }
    }
    Ok(())
}

fn handle_key<T: ChatTransport + ?Sized + 'static>(app: &mut App<T>, key: KeyEvent) {
    // Global keys that work in any state
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.is_open() {
        handle_open(app, key);
    } else {
        handle_closed(app, key);
    }
}

fn handle_closed<T: ChatTransport + ?Sized + 'static>(app: &mut App<T>, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('o') => app.open(),
        _ => {}
    }
}

fn handle_open<T: ChatTransport + ?Sized + 'static>(app: &mut App<T>, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.close();
            return;
        }
        KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.clear_conversation();
            return;
        }
        // Transcript scrolling works even while a request is outstanding
        KeyCode::Up => {
            app.scroll_up(1);
            return;
        }
        KeyCode::Down => {
            app.scroll_down(1);
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(app.chat_height.max(1) / 2);
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(app.chat_height.max(1) / 2);
            return;
        }
        _ => {}
    }

    if !app.can_edit() {
        return;
    }

    let mut input = app.input().to_string();
    let mut cursor = app.input_cursor;

    match key.code {
        KeyCode::Enter => {
            app.send();
            return;
        }
        KeyCode::Backspace => {
            if cursor > 0 {
                cursor -= 1;
                let byte_pos = char_to_byte_index(&input, cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if cursor < input.chars().count() {
                let byte_pos = char_to_byte_index(&input, cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            cursor = (cursor + 1).min(input.chars().count());
        }
        KeyCode::Home => {
            cursor = 0;
        }
        KeyCode::End => {
            cursor = input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&input, cursor);
            input.insert(byte_pos, c);
            cursor += 1;
        }
        _ => return,
    }

    app.set_input(input, cursor);
}

fn hit(area: Option<Rect>, column: u16, row: u16) -> bool {
    area.map_or(false, |r| {
        column >= r.x && column < r.x + r.width && row >= r.y && row < r.y + r.height
    })
}

fn handle_mouse<T: ChatTransport + ?Sized + 'static>(app: &mut App<T>, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if !app.is_open() {
                if hit(app.toggle_area, mouse.column, mouse.row) {
                    app.open();
                }
            } else if hit(app.close_area, mouse.column, mouse.row) {
                app.close();
            } else if hit(app.send_area, mouse.column, mouse.row) {
                // Ignored while a request is outstanding
                app.send();
            } else if hit(app.input_area, mouse.column, mouse.row) && app.focus_at.is_none() {
                app.input_focused = true;
            }
        }
        MouseEventKind::ScrollDown if app.is_open() => app.scroll_down(3),
        MouseEventKind::ScrollUp if app.is_open() => app.scroll_up(3),
        _ => {}
    }
}
