/// Keystroke as seen by the UI loop, independent of the terminal backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Submit,
    Backspace,
    Char(char),
    Interrupt,
    Other,
}

/// What happens to typed text when the send collaborator fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearPolicy {
    #[default]
    Always,
    /// Keep the text so the operator can retry.
    OnSuccess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    None,
    Edited,
    Send(String),
    Quit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBuffer {
    text: String,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Applies one key. A submit never clears the buffer itself; the caller
    /// does that once it knows how the send went.
    pub fn apply(&mut self, key: KeyInput) -> InputAction {
        match key {
            KeyInput::Submit => {
                let trimmed = self.text.trim();
                if trimmed.is_empty() {
                    InputAction::None
                } else {
                    InputAction::Send(trimmed.to_string())
                }
            }
            KeyInput::Backspace => {
                if self.text.pop().is_some() {
                    InputAction::Edited
                } else {
                    InputAction::None
                }
            }
            KeyInput::Char(ch) if is_single_byte_printable(ch) => {
                self.text.push(ch);
                InputAction::Edited
            }
            KeyInput::Interrupt => InputAction::Quit,
            KeyInput::Char(_) | KeyInput::Other => InputAction::None,
        }
    }
}

fn is_single_byte_printable(ch: char) -> bool {
    matches!(ch as u32, 0x20..=0x7e | 0xa0..=0xff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> InputBuffer {
        let mut buffer = InputBuffer::new();
        for ch in text.chars() {
            buffer.apply(KeyInput::Char(ch));
        }
        buffer
    }

    #[test]
    fn submit_yields_trimmed_text() {
        let mut buffer = typed("  hello there ");
        assert_eq!(
            buffer.apply(KeyInput::Submit),
            InputAction::Send("hello there".to_string())
        );
        assert_eq!(buffer.as_str(), "  hello there ");
    }

    #[test]
    fn whitespace_submit_does_nothing() {
        let mut buffer = typed("   ");
        assert_eq!(buffer.apply(KeyInput::Submit), InputAction::None);
        assert_eq!(InputBuffer::new().apply(KeyInput::Submit), InputAction::None);
    }

    #[test]
    fn backspace_pops_last_char() {
        let mut buffer = typed("ab");
        assert_eq!(buffer.apply(KeyInput::Backspace), InputAction::Edited);
        assert_eq!(buffer.as_str(), "a");
        buffer.apply(KeyInput::Backspace);
        assert_eq!(buffer.apply(KeyInput::Backspace), InputAction::None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn only_single_byte_printables_are_accepted() {
        let mut buffer = InputBuffer::new();
        assert_eq!(buffer.apply(KeyInput::Char('é')), InputAction::Edited);
        assert_eq!(buffer.apply(KeyInput::Char('\t')), InputAction::None);
        assert_eq!(buffer.apply(KeyInput::Char('\u{7f}')), InputAction::None);
        assert_eq!(buffer.apply(KeyInput::Char('✓')), InputAction::None);
        assert_eq!(buffer.apply(KeyInput::Char('~')), InputAction::Edited);
        assert_eq!(buffer.as_str(), "é~");
    }

    #[test]
    fn interrupt_quits() {
        assert_eq!(
            InputBuffer::new().apply(KeyInput::Interrupt),
            InputAction::Quit
        );
    }
}
