use crate::ui::{self, ChatView};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;
use tchat_core::{ChatRecord, ChatSurface, KeyInput, SurfaceError};

/// Full-screen chat surface: scrolling feed on top, prompt pinned below.
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    view: ChatView,
}

impl TerminalSurface {
    pub fn enter(scrollback: usize) -> io::Result<Self> {
        Ok(Self {
            terminal: setup_terminal()?,
            view: ChatView::new(scrollback),
        })
    }

    pub fn leave(mut self) -> io::Result<()> {
        restore_terminal(&mut self.terminal)
    }
}

impl ChatSurface for TerminalSurface {
    fn draw_input(&mut self, prompt: &str, buffer: &str) -> Result<(), SurfaceError> {
        self.view.set_input(prompt, buffer);
        Ok(())
    }

    fn append_line(&mut self, record: &ChatRecord) -> Result<(), SurfaceError> {
        self.view.push(record);
        Ok(())
    }

    fn set_status(&mut self, status: Option<String>) -> Result<(), SurfaceError> {
        self.view.set_status(status);
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), SurfaceError> {
        let view = &self.view;
        self.terminal.draw(|f| ui::render(f, view))?;
        Ok(())
    }

    fn poll_key(&mut self) -> Result<Option<KeyInput>, SurfaceError> {
        if !event::poll(Duration::ZERO)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(map_key(key)),
            _ => Ok(None),
        }
    }
}

/// Press and repeat events only; releases are ignored.
pub fn map_key(key: KeyEvent) -> Option<KeyInput> {
    if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
        return None;
    }
    let input = match key.code {
        KeyCode::Enter => KeyInput::Submit,
        KeyCode::Backspace => KeyInput::Backspace,
        KeyCode::Esc => KeyInput::Interrupt,
        KeyCode::Char('c') | KeyCode::Char('d')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            KeyInput::Interrupt
        }
        KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => KeyInput::Other,
        KeyCode::Char(c) => KeyInput::Char(c),
        _ => KeyInput::Other,
    };
    Some(input)
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
