//! Character sources feeding the lexer.
//!
//! `None` is the end-of-input sentinel; it is distinct from every character
//! a source can produce.

pub trait CharSource {
    /// Consumes and returns the next character.
    fn get_char(&mut self) -> Option<char>;

    fn peek_char(&self) -> Option<char>;

    /// The character after the one `peek_char` would return.
    fn peek_next_char(&self) -> Option<char>;

    /// Steps back over the last consumed character. A no-op at the start.
    fn unget_char(&mut self);

    /// Consumes the rest of the current line, excluding the newline.
    fn get_line(&mut self) -> String;

    /// Character offset of the next character to be consumed.
    fn position(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct StringSource {
    chars: Vec<char>,
    current: usize,
}

impl StringSource {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            current: 0,
        }
    }
}

impl CharSource for StringSource {
    fn get_char(&mut self) -> Option<char> {
        let c = self.chars.get(self.current).copied();
        if c.is_some() {
            self.current += 1;
        }
        c
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek_next_char(&self) -> Option<char> {
        self.chars.get(self.current + 1).copied()
    }

    fn unget_char(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    fn get_line(&mut self) -> String {
        let mut line = String::new();
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            line.push(c);
            self.current += 1;
        }
        line
    }

    fn position(&self) -> usize {
        self.current
    }
}
