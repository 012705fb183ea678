use chatbubble_core::{parse_inline, ChatTransport, Entry, EntryKind};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

const BUBBLE_WIDTH: u16 = 8;
const BUBBLE_HEIGHT: u16 = 3;
const PANEL_WIDTH: u16 = 56;
const PANEL_HEIGHT: u16 = 30;
const MARGIN: u16 = 2;

/// Anchor a box of the given size to the bottom-right corner of `area`
fn bottom_right(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(MARGIN));
    let height = height.min(area.height.saturating_sub(MARGIN / 2));
    Rect::new(
        area.x + area.width.saturating_sub(width + MARGIN),
        area.y + area.height.saturating_sub(height + MARGIN / 2),
        width,
        height,
    )
}

fn formatted_lines(content: &str, style: Style) -> Vec<Line<'static>> {
    parse_inline(content)
        .into_iter()
        .map(|segments| {
            let spans: Vec<Span<'static>> = segments
                .into_iter()
                .map(|seg| {
                    if seg.bold {
                        Span::styled(seg.text, style.add_modifier(Modifier::BOLD))
                    } else {
                        Span::styled(seg.text, style)
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

/// Transcript entry as terminal lines. `frame` animates the typing indicator.
pub fn entry_lines(entry: &Entry, frame: u8) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    match entry.kind {
        EntryKind::User => {
            lines.push(
                Line::from(Span::styled(
                    "You",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
                .alignment(Alignment::Right),
            );
            // Shown literally, never interpreted
            for text in entry.content.split('\n') {
                lines.push(Line::from(text.to_string()).alignment(Alignment::Right));
            }
        }
        EntryKind::Greeting | EntryKind::Assistant => {
            lines.push(Line::from(Span::styled(
                "Assistant",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.extend(formatted_lines(&entry.content, Style::default()));

            if !entry.sources.is_empty() {
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    "Sources:",
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
                )));
                for source in &entry.sources {
                    lines.push(Line::from(vec![
                        Span::styled(format!("• {}", source.title), Style::default().fg(Color::Cyan)),
                        Span::styled(format!("  {}", source.url), Style::default().fg(Color::DarkGray)),
                    ]));
                }
            }
        }
        EntryKind::Error => {
            let style = Style::default().fg(Color::LightRed);
            for text in entry.content.split('\n') {
                lines.push(Line::from(Span::styled(text.to_string(), style)));
            }
        }
        EntryKind::Typing => {
            // Cycles through ".", "..", "..."
            let dots = ".".repeat(((frame / 3) % 3) as usize + 1);
            lines.push(Line::from(Span::styled(
                format!("Typing{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
    }

    lines.push(Line::default());
    lines
}

pub fn render<T: ChatTransport + ?Sized + 'static>(app: &mut App<T>, frame: &mut Frame) {
    let area = frame.area();

    let hint = if app.is_open() {
        " Enter send · Esc close · Ctrl-L clear · ↑/↓ scroll · Ctrl-C quit "
    } else {
        " Enter open chat · q quit "
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" chatbubble ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(hint, Style::default().fg(Color::DarkGray)),
    ]));
    frame.render_widget(header, Rect::new(area.x, area.y, area.width, 1.min(area.height)));

    if app.is_open() {
        app.toggle_area = None;
        render_panel(app, frame, area);
    } else {
        app.close_area = None;
        app.input_area = None;
        app.send_area = None;
        render_toggle(app, frame, area);
    }
}

fn render_toggle<T: ChatTransport + ?Sized + 'static>(app: &mut App<T>, frame: &mut Frame, area: Rect) {
    let bubble_area = bottom_right(area, BUBBLE_WIDTH, BUBBLE_HEIGHT);
    app.toggle_area = Some(bubble_area);

    let bubble = Paragraph::new("💬")
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    frame.render_widget(bubble, bubble_area);
}

fn render_panel<T: ChatTransport + ?Sized + 'static>(app: &mut App<T>, frame: &mut Frame, area: Rect) {
    let panel_area = bottom_right(area, PANEL_WIDTH, PANEL_HEIGHT);
    frame.render_widget(Clear, panel_area);

    let panel = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Blue));
    let inner = panel.inner(panel_area);
    frame.render_widget(panel, panel_area);

    let [header_area, chat_area, input_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(inner);

    // Header: title, subtitle, close control
    let config = app.widget.config();
    let header = Paragraph::new(Text::from(vec![
        Line::from(Span::styled(
            config.title.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            config.subtitle.clone(),
            Style::default().fg(Color::DarkGray),
        )),
    ]))
    .block(Block::default().borders(Borders::BOTTOM).border_style(Style::default().fg(Color::DarkGray)));
    frame.render_widget(header, header_area);

    let close_area = Rect::new(
        header_area.x + header_area.width.saturating_sub(3),
        header_area.y,
        3.min(header_area.width),
        1,
    );
    frame.render_widget(
        Paragraph::new("✕").style(Style::default().fg(Color::Gray)),
        close_area,
    );
    app.close_area = Some(close_area);

    // Transcript
    let lines: Vec<Line<'static>> = app
        .widget
        .state()
        .transcript
        .entries()
        .iter()
        .flat_map(|entry| entry_lines(entry, app.animation_frame))
        .collect();

    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });

    // Rows after word wrapping; scroll offsets can't address past u16::MAX
    let total = u16::try_from(chat.line_count(chat_area.width)).unwrap_or(u16::MAX);
    app.chat_height = chat_area.height;
    app.follow_transcript(total);

    frame.render_widget(chat.scroll((app.chat_scroll, 0)), chat_area);

    let [input_area, send_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(5)]).areas(input_area);
    render_input(app, frame, input_area);
    render_send(app, frame, send_area);
}

fn render_send<T: ChatTransport + ?Sized + 'static>(app: &mut App<T>, frame: &mut Frame, area: Rect) {
    app.send_area = Some(area);
    let color = if app.widget.state().is_busy() {
        Color::DarkGray
    } else {
        Color::Cyan
    };
    let send = Paragraph::new("➤")
        .alignment(Alignment::Center)
        .style(Style::default().fg(color))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(color)),
        );
    frame.render_widget(send, area);
}

fn render_input<T: ChatTransport + ?Sized + 'static>(app: &mut App<T>, frame: &mut Frame, area: Rect) {
    app.input_area = Some(area);
    let busy = app.widget.state().is_busy();

    // Dimmed while a request is outstanding
    let border_color = if busy {
        Color::DarkGray
    } else if app.input_focused {
        Color::Yellow
    } else {
        Color::Gray
    };
    let title = if busy { " Waiting for reply " } else { " Message (Enter to send) " };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Keep the cursor visible with horizontal scrolling
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.input().is_empty() && !app.input_focused {
        Paragraph::new(Span::styled(
            app.widget.config().placeholder.clone(),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible: String = app.input().chars().skip(scroll_offset).take(inner_width).collect();
        let style = if busy {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Cyan)
        };
        Paragraph::new(visible).style(style)
    };
    frame.render_widget(input.block(block), area);

    if app.can_edit() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}
