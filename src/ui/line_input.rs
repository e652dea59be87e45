use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputResult {
    Continue,
    Submit,
    Cancel,
}

/// Single-line editor for questions to the patient. Up/Down walk back
/// through what was already sent this session.
#[derive(Debug, Default)]
pub struct LineInput {
    text: String,
    /// Cursor position as a char index (0 = before first char).
    cursor: usize,
    placeholder: Option<String>,
    sent: Vec<String>,
    recall: Option<usize>,
}

impl LineInput {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.chars().count(),
            ..Self::default()
        }
    }

    pub fn value(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Hint shown while the line is empty, e.g. the case's suggested opener.
    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    pub fn set_placeholder(&mut self, placeholder: Option<String>) {
        self.placeholder = placeholder.filter(|p| !p.trim().is_empty());
    }

    /// Clear the line and hand back its text, remembering it for recall.
    pub fn take(&mut self) -> String {
        let text = std::mem::take(&mut self.text);
        self.cursor = 0;
        self.recall = None;
        if !text.trim().is_empty() && self.sent.last() != Some(&text) {
            self.sent.push(text.clone());
        }
        text
    }

    /// Forget the recall list, for a fresh case.
    pub fn reset(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.sent.clear();
        self.recall = None;
    }

    /// Insert pasted text at the cursor. Line breaks become spaces.
    pub fn insert_str(&mut self, pasted: &str) {
        for ch in pasted.chars() {
            let ch = if ch == '\n' || ch == '\r' { ' ' } else { ch };
            if ch.is_control() {
                continue;
            }
            let byte_offset = self.char_to_byte(self.cursor);
            self.text.insert(byte_offset, ch);
            self.cursor += 1;
        }
    }

    /// Returns (before_cursor, cursor_char, after_cursor) for styled rendering.
    /// When cursor is at end of text, cursor_char is None.
    pub fn render_parts(&self) -> (&str, Option<char>, &str) {
        let byte_offset = self.char_to_byte(self.cursor);
        match self.text[byte_offset..].chars().next() {
            Some(ch) => {
                let next_byte = byte_offset + ch.len_utf8();
                (&self.text[..byte_offset], Some(ch), &self.text[next_byte..])
            }
            None => (&self.text, None, ""),
        }
    }

    pub fn handle(&mut self, key: KeyEvent) -> InputResult {
        match key.code {
            KeyCode::Esc => return InputResult::Cancel,
            KeyCode::Enter => return InputResult::Submit,

            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => {
                let len = self.text.chars().count();
                if self.cursor < len {
                    self.cursor += 1;
                }
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.text.chars().count(),
            KeyCode::Up => self.recall_older(),
            KeyCode::Down => self.recall_newer(),
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.remove_char_at(self.cursor - 1);
                    self.cursor -= 1;
                }
            }
            KeyCode::Delete => self.remove_char_at(self.cursor),
            KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.cursor = 0;
            }
            KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.cursor = self.text.chars().count();
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.text.clear();
                self.cursor = 0;
            }
            KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.delete_word_back();
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let byte_offset = self.char_to_byte(self.cursor);
                self.text.insert(byte_offset, ch);
                self.cursor += 1;
            }
            _ => {}
        }
        InputResult::Continue
    }

    /// Convert char index to byte offset.
    fn char_to_byte(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map(|(b, _)| b)
            .unwrap_or(self.text.len())
    }

    fn remove_char_at(&mut self, char_idx: usize) {
        let byte_offset = self.char_to_byte(char_idx);
        if let Some(ch) = self.text[byte_offset..].chars().next() {
            self.text
                .replace_range(byte_offset..byte_offset + ch.len_utf8(), "");
        }
    }

    /// Delete word before cursor (unix-word-rubout: skip whitespace, then non-whitespace).
    fn delete_word_back(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let chars: Vec<char> = self.text.chars().collect();
        let mut pos = self.cursor;

        while pos > 0 && chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        while pos > 0 && !chars[pos - 1].is_whitespace() {
            pos -= 1;
        }

        let start_byte = self.char_to_byte(pos);
        let end_byte = self.char_to_byte(self.cursor);
        self.text.replace_range(start_byte..end_byte, "");
        self.cursor = pos;
    }

    fn recall_older(&mut self) {
        if self.sent.is_empty() {
            return;
        }
        let idx = match self.recall {
            Some(0) => 0,
            Some(i) => i - 1,
            None => self.sent.len() - 1,
        };
        self.show_recalled(Some(idx));
    }

    fn recall_newer(&mut self) {
        match self.recall {
            Some(i) if i + 1 < self.sent.len() => self.show_recalled(Some(i + 1)),
            Some(_) => self.show_recalled(None),
            None => {}
        }
    }

    fn show_recalled(&mut self, idx: Option<usize>) {
        self.recall = idx;
        self.text = idx
            .and_then(|i| self.sent.get(i))
            .cloned()
            .unwrap_or_default();
        self.cursor = self.text.chars().count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn type_str(input: &mut LineInput, text: &str) {
        for ch in text.chars() {
            input.handle(key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn insert_at_start_middle_end() {
        let mut input = LineInput::new("ac");
        input.handle(key(KeyCode::Char('d')));
        assert_eq!(input.value(), "acd");

        input.handle(key(KeyCode::Home));
        input.handle(key(KeyCode::Char('z')));
        assert_eq!(input.value(), "zacd");
        assert_eq!(input.cursor, 1);

        input.handle(key(KeyCode::Right));
        input.handle(key(KeyCode::Char('b')));
        assert_eq!(input.value(), "zabcd");
        assert_eq!(input.cursor, 3);
    }

    #[test]
    fn backspace_and_delete_at_boundaries() {
        let mut input = LineInput::new("ab");
        input.handle(key(KeyCode::Backspace));
        input.handle(key(KeyCode::Backspace));
        input.handle(key(KeyCode::Backspace));
        assert_eq!(input.value(), "");
        assert_eq!(input.cursor, 0);

        let mut input = LineInput::new("ab");
        input.handle(key(KeyCode::Home));
        input.handle(key(KeyCode::Delete));
        assert_eq!(input.value(), "b");
        input.handle(key(KeyCode::End));
        input.handle(key(KeyCode::Delete));
        assert_eq!(input.value(), "b");
    }

    #[test]
    fn multibyte_editing() {
        let mut input = LineInput::new("café");
        input.handle(key(KeyCode::Backspace));
        assert_eq!(input.value(), "caf");
        type_str(&mut input, "é?");
        assert_eq!(input.value(), "café?");
        assert_eq!(input.render_parts(), ("café?", None, ""));
    }

    #[test]
    fn ctrl_w_and_ctrl_u() {
        let mut input = LineInput::new("any chest pain  ");
        input.handle(ctrl('w'));
        assert_eq!(input.value(), "any chest ");
        input.handle(ctrl('u'));
        assert_eq!(input.value(), "");
        assert_eq!(input.cursor, 0);
    }

    #[test]
    fn render_parts_at_middle() {
        let mut input = LineInput::new("abc");
        input.cursor = 1;
        assert_eq!(input.render_parts(), ("a", Some('b'), "c"));
    }

    #[test]
    fn submit_and_cancel() {
        let mut input = LineInput::new("test");
        assert_eq!(input.handle(key(KeyCode::Enter)), InputResult::Submit);
        assert_eq!(input.handle(key(KeyCode::Esc)), InputResult::Cancel);
    }

    #[test]
    fn take_clears_and_recall_walks_history() {
        let mut input = LineInput::default();
        type_str(&mut input, "any fever?");
        assert_eq!(input.take(), "any fever?");
        assert!(input.is_empty());
        type_str(&mut input, "any cough?");
        input.take();

        input.handle(key(KeyCode::Up));
        assert_eq!(input.value(), "any cough?");
        input.handle(key(KeyCode::Up));
        assert_eq!(input.value(), "any fever?");
        input.handle(key(KeyCode::Up));
        assert_eq!(input.value(), "any fever?");
        input.handle(key(KeyCode::Down));
        assert_eq!(input.value(), "any cough?");
        input.handle(key(KeyCode::Down));
        assert_eq!(input.value(), "");
    }

    #[test]
    fn paste_flattens_newlines() {
        let mut input = LineInput::new("Q: ");
        input.insert_str("fever\r\nand\tchills");
        assert_eq!(input.value(), "Q: fever  andchills");
    }

    #[test]
    fn blank_placeholder_is_dropped() {
        let mut input = LineInput::default();
        input.set_placeholder(Some("   ".to_string()));
        assert_eq!(input.placeholder(), None);
        input.set_placeholder(Some("Ask about the rash".to_string()));
        assert_eq!(input.placeholder(), Some("Ask about the rash"));
    }
}
