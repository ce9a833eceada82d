use image::RgbImage;
use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use pixelprompt_core::NoticeLevel;
use crate::app::{App, InputMode};

/// Draws an RGB image with half-block cells: each terminal cell shows two
/// vertically stacked pixels, so the picture stays square on screen.
pub struct ImageCanvas<'a> {
    image: &'a RgbImage,
}

impl<'a> ImageCanvas<'a> {
    pub fn new(image: &'a RgbImage) -> Self {
        Self { image }
    }
}

impl Widget for ImageCanvas<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Side length in half-cell pixels, rounded down to fill whole cells
        let side = area.width.min(area.height.saturating_mul(2)) & !1;
        if side == 0 {
            return;
        }
        let cols = side;
        let rows = side / 2;
        let x0 = area.x + (area.width - cols) / 2;
        let y0 = area.y + (area.height - rows) / 2;

        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let side = u32::from(side);

        for row in 0..rows {
            let top_y = (u32::from(row) * 2 * height) / side;
            let bottom_y = ((u32::from(row) * 2 + 1) * height) / side;

            for col in 0..cols {
                let x = (u32::from(col) * width) / side;
                let top = self.image.get_pixel(x, top_y).0;
                let bottom = self.image.get_pixel(x, bottom_y).0;

                if let Some(cell) = buf.cell_mut((x0 + col, y0 + row)) {
                    cell.set_symbol("▀")
                        .set_fg(Color::Rgb(top[0], top[1], top[2]))
                        .set_bg(Color::Rgb(bottom[0], bottom[1], bottom[2]));
                }
            }
        }
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, prompt, buttons, image, footer
    let [header_area, prompt_area, buttons_area, image_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_prompt(app, frame, prompt_area);
    render_buttons(app, frame, buttons_area);
    render_image(app, frame, image_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.notice.is_some() {
        render_notice(app, frame, area);
    } else if app.input_mode == InputMode::SaveDialog {
        render_save_dialog(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" AI Text to Image Generator ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(format!("[{}]", app.backend_label), Style::default().fg(Color::Gray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let editable = app.input_mode == InputMode::Prompt && app.notice.is_none() && !app.is_generating();
    let border_color = if editable { Color::Yellow } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Enter prompt: ");

    let inner = block.inner(area);
    let (shown, cursor_x) = scroll_to_cursor(&app.prompt_input, app.prompt_cursor, inner.width);

    let text = if app.prompt_input.is_empty() && editable {
        Span::styled("Describe the image you want...", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(shown)
    };

    frame.render_widget(Paragraph::new(text).block(block), area);

    if editable {
        frame.set_cursor_position((inner.x + cursor_x, inner.y));
    }
}

/// The slice of a single-line input that fits in `width` columns with the
/// cursor kept visible, plus the cursor column inside that slice.
fn scroll_to_cursor(input: &str, cursor: usize, width: u16) -> (String, u16) {
    let visible = width.saturating_sub(1) as usize;
    let cursor = cursor.min(input.chars().count());
    let skip = cursor.saturating_sub(visible);
    let shown = input.chars().skip(skip).take(visible + 1).collect();
    (shown, (cursor - skip) as u16)
}

fn render_buttons(app: &mut App, frame: &mut Frame, area: Rect) {
    let [generate_area, download_area, _] = Layout::horizontal([
        Constraint::Length(22),
        Constraint::Length(22),
        Constraint::Min(0),
    ])
    .areas(area);

    // Store areas for mouse hit-testing
    app.generate_button = Some(generate_area);
    app.download_button = Some(download_area);

    let generate_enabled = !app.is_generating();
    let download_enabled = !app.is_generating() && app.session.current().is_some();

    render_button(frame, generate_area, "Generate Image", generate_enabled);
    render_button(frame, download_area, "Download Image", download_enabled);
}

fn render_button(frame: &mut Frame, area: Rect, label: &str, enabled: bool) {
    let color = if enabled { Color::Cyan } else { Color::DarkGray };
    let button = Paragraph::new(label)
        .alignment(Alignment::Center)
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color)));
    frame.render_widget(button, area);
}

fn render_image(app: &App, frame: &mut Frame, area: Rect) {
    let title = match (&app.caption, app.is_generating()) {
        (_, true) => {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            format!(" Generating{} ", dots)
        }
        (Some(caption), false) => format!(" {} ", caption),
        (None, false) => " Image ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match &app.display {
        Some(image) => frame.render_widget(ImageCanvas::new(image), inner),
        None => {
            let hint = if app.is_generating() {
                "Sampling... this can take a while on CPU."
            } else {
                "Type a prompt and press Enter to generate an image."
            };
            let placeholder = Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray)))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            frame.render_widget(placeholder, inner);
        }
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match (app.input_mode, app.is_generating()) {
        (_, true) => (" BUSY ", Style::default().bg(Color::Magenta).fg(Color::White)),
        (InputMode::Prompt, false) => (" PROMPT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        (InputMode::SaveDialog, false) => (" SAVE ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    let hints: &[(&str, &str)] = if app.notice.is_some() {
        &[(" any key ", " close ")]
    } else {
        match app.input_mode {
            InputMode::Prompt => &[
                (" Enter ", " generate "),
                (" Ctrl+S ", " download "),
                (" Ctrl+U ", " clear "),
                (" Esc ", " quit "),
            ],
            InputMode::SaveDialog => &[(" Enter ", " save "), (" Esc ", " cancel ")],
        }
    };
    for (key, label) in hints {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Centered popup area of the given size, clipped to `area`.
fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height);

    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;

    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };

    let border_color = match notice.level {
        NoticeLevel::Info => Color::Green,
        NoticeLevel::Error => Color::Red,
    };

    let mut lines: Vec<Line> = notice.message.lines().map(Line::from).collect();
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Press any key to close.",
        Style::default().fg(Color::DarkGray),
    )));

    // Borders plus wrapped message; long errors get a taller box
    let height = (lines.len() as u16 + 4).max(7);
    let popup_area = popup_rect(area, 64, height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", notice.title));

    let body = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(body, popup_area);
}

fn render_save_dialog(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = popup_rect(area, 70, 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Save Generated Image ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    // Instructions
    let instructions = Paragraph::new("PNG file path. Press Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));

    let instructions_area = Rect::new(inner.x, inner.y, inner.width, 1);
    frame.render_widget(instructions, instructions_area);

    // Input field, scrolled so the cursor stays visible
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let (shown, cursor_x) = scroll_to_cursor(&app.save_input, app.save_cursor, input_area.width);

    let input = Paragraph::new(shown).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}
