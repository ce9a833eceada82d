use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // A notice blocks everything until it is dismissed
    if app.notice.is_some() {
        app.dismiss_notice();
        return;
    }

    match app.input_mode {
        InputMode::Prompt => handle_prompt_mode(app, key),
        InputMode::SaveDialog => handle_save_dialog(app, key),
    }
}

fn handle_prompt_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => app.start_generation(),
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.open_save_dialog();
        }
        // The prompt is locked while the model is running
        _ if app.is_generating() => {}
        _ => edit_line(&mut app.prompt_input, &mut app.prompt_cursor, key),
    }
}

fn handle_save_dialog(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_save(),
        KeyCode::Enter => app.confirm_save(),
        _ => edit_line(&mut app.save_input, &mut app.save_cursor, key),
    }
}

/// Single-line text editing shared by the prompt and the save dialog.
fn edit_line(input: &mut String, cursor: &mut usize, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = input.chars().count();
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = input.chars().count();
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = input.chars().count();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            input.clear();
            *cursor = 0;
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
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
    if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
        return;
    }
    if app.notice.is_some() {
        app.dismiss_notice();
        return;
    }
    if app.input_mode != InputMode::Prompt {
        return;
    }

    let (x, y) = (mouse.column, mouse.row);
    if app.generate_button.map(|r| point_in_rect(x, y, r)).unwrap_or(false) {
        app.start_generation();
    } else if app.download_button.map(|r| point_in_rect(x, y, r)).unwrap_or(false) {
        app.open_save_dialog();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;
    use crossterm::event::KeyEventState;
    use crate::testing::{test_app, wait_for_generation};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn ctrl(c: char) -> KeyEvent {
        let mut event = key(KeyCode::Char(c));
        event.modifiers = KeyModifiers::CONTROL;
        event
    }

    fn press(app: &mut App, event: KeyEvent) {
        handle_event(app, AppEvent::Key(event)).unwrap();
    }

    fn click(app: &mut App, column: u16, row: u16) {
        let mouse = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        };
        handle_event(app, AppEvent::Mouse(mouse)).unwrap();
    }

    async fn app_with_image() -> App {
        let (mut app, _) = test_app();
        app.prompt_input = "a red bicycle".to_string();
        press(&mut app, key(KeyCode::Enter));
        wait_for_generation(&mut app).await;
        app
    }

    fn type_text(input: &mut String, cursor: &mut usize, text: &str) {
        for c in text.chars() {
            edit_line(input, cursor, key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_edit_line_inserts_at_cursor() {
        let (mut input, mut cursor) = (String::new(), 0);
        type_text(&mut input, &mut cursor, "a bicycle");
        for _ in 0..7 {
            edit_line(&mut input, &mut cursor, key(KeyCode::Left));
        }
        type_text(&mut input, &mut cursor, "red ");
        assert_eq!(input, "a red bicycle");
        assert_eq!(cursor, 6);
    }

    #[test]
    fn test_edit_line_handles_multibyte() {
        let (mut input, mut cursor) = (String::new(), 0);
        type_text(&mut input, &mut cursor, "café ☕");
        edit_line(&mut input, &mut cursor, key(KeyCode::Backspace));
        edit_line(&mut input, &mut cursor, key(KeyCode::Home));
        edit_line(&mut input, &mut cursor, key(KeyCode::Delete));
        assert_eq!(input, "afé ");
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_edit_line_ignores_control_chars() {
        let (mut input, mut cursor) = ("abc".to_string(), 3);
        let mut ctrl_s = key(KeyCode::Char('s'));
        ctrl_s.modifiers = KeyModifiers::CONTROL;
        edit_line(&mut input, &mut cursor, ctrl_s);
        assert_eq!(input, "abc");
    }

    #[test]
    fn test_point_in_rect_edges() {
        let rect = Rect::new(2, 3, 4, 2);
        assert!(point_in_rect(2, 3, rect));
        assert!(point_in_rect(5, 4, rect));
        assert!(!point_in_rect(6, 4, rect));
        assert!(!point_in_rect(2, 5, rect));
    }

    #[tokio::test]
    async fn test_enter_starts_generation() {
        let (mut app, backend) = test_app();
        for c in "a red bicycle".chars() {
            press(&mut app, key(KeyCode::Char(c)));
        }

        press(&mut app, key(KeyCode::Enter));
        assert!(app.is_generating());
        wait_for_generation(&mut app).await;

        assert_eq!(backend.calls(), 1);
        assert_eq!(app.caption.as_deref(), Some("a red bicycle"));
    }

    #[tokio::test]
    async fn test_ctrl_s_opens_save_dialog() {
        let mut app = app_with_image().await;

        press(&mut app, ctrl('s'));

        assert_eq!(app.input_mode, InputMode::SaveDialog);
        assert!(app.save_input.ends_with("generated_image.png"));
        assert_eq!(app.save_cursor, app.save_input.chars().count());
    }

    #[tokio::test]
    async fn test_ctrl_s_without_image_shows_notice() {
        let (mut app, _) = test_app();

        press(&mut app, ctrl('s'));

        assert_eq!(app.input_mode, InputMode::Prompt);
        assert_eq!(app.notice.as_ref().map(|n| n.title), Some("No Image"));
    }

    #[tokio::test]
    async fn test_notice_swallows_next_key() {
        let (mut app, backend) = test_app();
        press(&mut app, key(KeyCode::Enter));
        assert_eq!(app.notice.as_ref().map(|n| n.title), Some("Input Error"));

        // Dismisses the notice without typing or quitting
        press(&mut app, key(KeyCode::Char('x')));
        assert!(app.notice.is_none());
        assert!(app.prompt_input.is_empty());

        press(&mut app, key(KeyCode::Esc));
        assert!(app.should_quit);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_notice_swallows_next_click() {
        let (mut app, backend) = test_app();
        app.generate_button = Some(Rect::new(0, 5, 22, 3));
        app.prompt_input = "a red bicycle".to_string();
        press(&mut app, ctrl('s'));
        assert!(app.notice.is_some());

        click(&mut app, 3, 6);

        assert!(app.notice.is_none());
        assert!(app.generation_task.is_none());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_even_with_notice() {
        let (mut app, _) = test_app();
        press(&mut app, key(KeyCode::Enter));
        assert!(app.notice.is_some());

        press(&mut app, ctrl('c'));

        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_prompt_is_locked_while_generating() {
        let (mut app, backend) = test_app();
        app.prompt_input = "a cat".to_string();
        app.prompt_cursor = 5;
        press(&mut app, key(KeyCode::Enter));
        assert!(app.is_generating());

        press(&mut app, key(KeyCode::Char('s')));
        press(&mut app, key(KeyCode::Backspace));
        press(&mut app, ctrl('u'));
        press(&mut app, key(KeyCode::Enter));
        press(&mut app, ctrl('s'));

        assert_eq!(app.prompt_input, "a cat");
        assert_eq!(app.input_mode, InputMode::Prompt);
        wait_for_generation(&mut app).await;
        assert_eq!(backend.calls(), 1);

        press(&mut app, key(KeyCode::Char('s')));
        assert_eq!(app.prompt_input, "a cats");
    }

    #[tokio::test]
    async fn test_esc_cancels_save_dialog_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with_image().await;
        press(&mut app, ctrl('s'));

        press(&mut app, ctrl('u'));
        let target = dir.path().join("out.png");
        for c in target.display().to_string().chars() {
            press(&mut app, key(KeyCode::Char(c)));
        }
        press(&mut app, key(KeyCode::Esc));

        assert_eq!(app.input_mode, InputMode::Prompt);
        assert!(!app.should_quit);
        assert!(app.notice.is_none());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_enter_in_save_dialog_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with_image().await;
        press(&mut app, ctrl('s'));

        press(&mut app, ctrl('u'));
        for c in dir.path().join("picture").display().to_string().chars() {
            press(&mut app, key(KeyCode::Char(c)));
        }
        press(&mut app, key(KeyCode::Enter));

        assert_eq!(app.notice.as_ref().map(|n| n.title), Some("Success"));
        assert!(dir.path().join("picture.png").exists());
    }

    #[tokio::test]
    async fn test_button_clicks_dispatch() {
        let (mut app, backend) = test_app();
        app.generate_button = Some(Rect::new(0, 5, 22, 3));
        app.download_button = Some(Rect::new(22, 5, 22, 3));
        app.prompt_input = "a red bicycle".to_string();

        // Outside both buttons
        click(&mut app, 50, 6);
        assert!(app.generation_task.is_none());

        click(&mut app, 21, 7);
        assert!(app.is_generating());
        wait_for_generation(&mut app).await;
        assert_eq!(backend.calls(), 1);

        click(&mut app, 22, 5);
        assert_eq!(app.input_mode, InputMode::SaveDialog);

        // Buttons are inert while the dialog is open
        click(&mut app, 3, 6);
        assert!(app.generation_task.is_none());
        assert_eq!(app.input_mode, InputMode::SaveDialog);
    }
}
