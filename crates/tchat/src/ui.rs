use crate::theme;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use std::collections::VecDeque;
use tchat_core::ChatRecord;

pub const DEFAULT_SCROLLBACK: usize = 2000;
const INPUT_HEIGHT: u16 = 3;

/// What the screen shows; `TerminalSurface` mutates it and `render` draws it.
pub struct ChatView {
    lines: VecDeque<Line<'static>>,
    scrollback: usize,
    prompt: String,
    input: String,
    status: Option<String>,
}

impl ChatView {
    pub fn new(scrollback: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            scrollback: scrollback.max(1),
            prompt: String::new(),
            input: String::new(),
            status: None,
        }
    }

    pub fn push(&mut self, record: &ChatRecord) {
        if self.lines.len() == self.scrollback {
            self.lines.pop_front();
        }
        self.lines.push_back(record_line(record));
    }

    pub fn set_input(&mut self, prompt: &str, buffer: &str) {
        self.prompt.clear();
        self.prompt.push_str(prompt);
        self.input.clear();
        self.input.push_str(buffer);
    }

    pub fn set_status(&mut self, status: Option<String>) {
        self.status = status;
    }
}

fn record_line(record: &ChatRecord) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("[ {} ]", record.display_time()), theme::TIMESTAMP_STYLE),
        Span::raw(" "),
        Span::styled(format!("( {} )", record.author()), theme::AUTHOR_STYLE),
        Span::raw(" : "),
        Span::styled(record.body().to_string(), theme::BODY_STYLE),
    ])
}

pub fn render(f: &mut Frame, view: &ChatView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(INPUT_HEIGHT)])
        .split(f.size());
    render_feed(f, view, chunks[0]);
    render_input(f, view, chunks[1]);
}

fn render_feed(f: &mut Frame, view: &ChatView, area: Rect) {
    let width = area.width.max(1);
    let height = area.height as usize;

    // Walk back from the newest line until the area is full.
    let mut rows = 0usize;
    let mut start = view.lines.len();
    while start > 0 && rows < height {
        start -= 1;
        rows += wrapped_rows(&view.lines[start], width);
    }
    let lines: Vec<Line> = view.lines.range(start..).cloned().collect();
    let feed = Paragraph::new(lines).wrap(Wrap { trim: false });
    let overflow = feed
        .line_count(width)
        .saturating_sub(height)
        .min(u16::MAX as usize) as u16;
    f.render_widget(feed.scroll((overflow, 0)), area);
}

fn render_input(f: &mut Frame, view: &ChatView, area: Rect) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(theme::BORDER_STYLE);
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let mut prompt = vec![Span::styled(view.prompt.clone(), theme::PROMPT_STYLE)];
    if let Some(status) = &view.status {
        prompt.push(Span::raw("  "));
        prompt.push(Span::styled(status.clone(), theme::STATUS_STYLE));
    }
    let visible = input_tail(&view.input, inner.width.saturating_sub(1) as usize);
    let text = vec![Line::from(prompt), Line::from(visible.to_string())];
    f.render_widget(Paragraph::new(text), inner);

    if inner.height > 1 {
        let cursor_x = inner.x + visible.chars().count() as u16;
        f.set_cursor(cursor_x, inner.y + 1);
    }
}

/// Rows `line` takes under the same word wrapping the feed renders with.
fn wrapped_rows(line: &Line<'static>, width: u16) -> usize {
    Paragraph::new(line.clone())
        .wrap(Wrap { trim: false })
        .line_count(width)
        .max(1)
}

/// Longest suffix of `input` that fits in `width` columns.
fn input_tail(input: &str, width: usize) -> &str {
    let count = input.chars().count();
    if count <= width {
        return input;
    }
    let skip = count - width;
    match input.char_indices().nth(skip) {
        Some((idx, _)) => &input[idx..],
        None => "",
    }
}
