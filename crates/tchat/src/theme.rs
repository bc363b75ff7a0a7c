use ratatui::style::{Color, Modifier, Style};

pub const TIMESTAMP_STYLE: Style = Style::new()
    .fg(Color::Rgb(168, 153, 132))
    .add_modifier(Modifier::DIM);
pub const AUTHOR_STYLE: Style = Style::new().fg(Color::Cyan);
pub const BODY_STYLE: Style = Style::new();
pub const PROMPT_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const STATUS_STYLE: Style = Style::new()
    .fg(Color::Rgb(250, 189, 47))
    .add_modifier(Modifier::BOLD);
pub const BORDER_STYLE: Style = Style::new().fg(Color::Rgb(80, 73, 69));
