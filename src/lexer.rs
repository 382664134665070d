use crate::error::{Diagnostics, Span, SysyError};
use crate::source::{CharSource, StringSource};
use std::num::IntErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Equal,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAnd,
    OrOr,

    // Literals
    IntConst,
    Identifier,

    // Keywords
    Const,
    Int,
    Void,
    If,
    Else,
    While,
    Break,
    Continue,
    Return,

    // Special
    Eof,
}

/// One lexical unit. For `IntConst` the lexeme is the canonical decimal text
/// of the literal, whatever base it was written in.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: u32,
    pub span: Span,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, line: u32, span: Span) -> Self {
        Self {
            token_type,
            lexeme,
            line,
            span,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.token_type == TokenType::Eof
    }

    /// How the token reads in a diagnostic.
    pub fn describe(&self) -> String {
        if self.is_eof() {
            "end of input".to_string()
        } else {
            format!("'{}'", self.lexeme)
        }
    }
}

const KEYWORDS: [(&str, TokenType); 9] = [
    ("const", TokenType::Const),
    ("int", TokenType::Int),
    ("void", TokenType::Void),
    ("if", TokenType::If),
    ("else", TokenType::Else),
    ("while", TokenType::While),
    ("break", TokenType::Break),
    ("continue", TokenType::Continue),
    ("return", TokenType::Return),
];

const ALPHABET: usize = 26;
const DEAD: usize = 0;
const START: usize = 1;

/// Transition table over (partial-match state, lowercase letter). Any
/// character outside the keyword alphabet drops into the dead state, which
/// means "identifier".
#[derive(Debug, Clone)]
pub struct KeywordDfa {
    transitions: Vec<[usize; ALPHABET]>,
    accepting: Vec<Option<TokenType>>,
}

impl KeywordDfa {
    pub fn new() -> Self {
        let mut dfa = Self {
            transitions: vec![[DEAD; ALPHABET]; 2],
            accepting: vec![None, None],
        };

        for (word, token_type) in KEYWORDS {
            let mut state = START;
            for b in word.bytes() {
                let column = (b - b'a') as usize;
                if dfa.transitions[state][column] == DEAD {
                    dfa.transitions.push([DEAD; ALPHABET]);
                    dfa.accepting.push(None);
                    dfa.transitions[state][column] = dfa.transitions.len() - 1;
                }
                state = dfa.transitions[state][column];
            }
            dfa.accepting[state] = Some(token_type);
        }

        dfa
    }

    pub fn start(&self) -> usize {
        START
    }

    pub fn step(&self, state: usize, c: char) -> usize {
        if state == DEAD || !c.is_ascii_lowercase() {
            return DEAD;
        }
        self.transitions[state][(c as u8 - b'a') as usize]
    }

    pub fn accept(&self, state: usize) -> TokenType {
        self.accepting[state].unwrap_or(TokenType::Identifier)
    }

    pub fn classify(&self, text: &str) -> TokenType {
        let state = text.chars().fold(self.start(), |state, c| self.step(state, c));
        self.accept(state)
    }
}

impl Default for KeywordDfa {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Lexer<S: CharSource = StringSource> {
    source: S,
    keywords: KeywordDfa,
    line: u32,
    start: usize,
    start_line: u32,
    text: String,
    pending: Option<Token>,
    last: Option<Token>,
    diagnostics: Diagnostics,
}

impl Lexer<StringSource> {
    pub fn new(source: &str) -> Self {
        Self::from_source(StringSource::new(source))
    }
}

impl<S: CharSource> Lexer<S> {
    pub fn from_source(source: S) -> Self {
        Self {
            source,
            keywords: KeywordDfa::new(),
            line: 1,
            start: 0,
            start_line: 1,
            text: String::new(),
            pending: None,
            last: None,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Lexes everything up to and including the end-of-file token.
    pub fn scan_tokens(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        let token = match self.pending.take() {
            Some(token) => token,
            None => self.scan_token(),
        };
        self.last = Some(token.clone());
        token
    }

    /// Pushes the last token back. Calling it twice in a row has the same
    /// effect as calling it once.
    pub fn unget_token(&mut self) {
        if let Some(token) = self.last.take() {
            self.pending = Some(token);
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    fn scan_token(&mut self) -> Token {
        loop {
            self.skip_trivia();
            self.start = self.source.position();
            self.start_line = self.line;
            self.text.clear();

            let c = match self.advance() {
                Some(c) => c,
                None => return self.make_token(TokenType::Eof, String::new()),
            };

            let token_type = match c {
                '(' => TokenType::LeftParen,
                ')' => TokenType::RightParen,
                '{' => TokenType::LeftBrace,
                '}' => TokenType::RightBrace,
                '[' => TokenType::LeftBracket,
                ']' => TokenType::RightBracket,
                ',' => TokenType::Comma,
                ';' => TokenType::Semicolon,
                '+' => TokenType::Plus,
                '-' => TokenType::Minus,
                '*' => TokenType::Star,
                '/' => TokenType::Slash,
                '%' => TokenType::Percent,
                '!' => {
                    if self.match_char('=') {
                        TokenType::BangEqual
                    } else {
                        TokenType::Bang
                    }
                }
                '=' => {
                    if self.match_char('=') {
                        TokenType::EqualEqual
                    } else {
                        TokenType::Equal
                    }
                }
                '<' => {
                    if self.match_char('=') {
                        TokenType::LessEqual
                    } else {
                        TokenType::Less
                    }
                }
                '>' => {
                    if self.match_char('=') {
                        TokenType::GreaterEqual
                    } else {
                        TokenType::Greater
                    }
                }
                '&' => {
                    if !self.match_char('&') {
                        self.error("expected '&&', found '&'".to_string());
                    }
                    TokenType::AndAnd
                }
                '|' => {
                    if !self.match_char('|') {
                        self.error("expected '||', found '|'".to_string());
                    }
                    TokenType::OrOr
                }
                '"' | '\'' => {
                    self.skip_quoted(c);
                    continue;
                }
                c if c.is_ascii_digit() => return self.number(c),
                c if c.is_ascii_alphabetic() || c == '_' => return self.identifier(c),
                _ => {
                    self.error(format!("unexpected character '{}'", c));
                    continue;
                }
            };

            let lexeme = self.text.clone();
            return self.make_token(token_type, lexeme);
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.source.peek_char() {
                Some(' ' | '\t' | '\r') => {
                    self.source.get_char();
                }
                Some('\n') => {
                    self.source.get_char();
                    self.line += 1;
                }
                Some('/') => match self.source.peek_next_char() {
                    Some('/') => {
                        self.source.get_line();
                    }
                    Some('*') => self.block_comment(),
                    _ => return,
                },
                _ => return,
            }
        }
    }

    fn block_comment(&mut self) {
        let start = self.source.position();
        let start_line = self.line;
        self.source.get_char();
        self.source.get_char();

        loop {
            match self.source.get_char() {
                None => {
                    self.diagnostics.push(SysyError::lex_error(
                        start_line,
                        Span::new(start, start + 2),
                        "unterminated block comment".to_string(),
                    ));
                    return;
                }
                Some('\n') => self.line += 1,
                Some('*') if self.source.peek_char() == Some('/') => {
                    self.source.get_char();
                    return;
                }
                Some(_) => {}
            }
        }
    }

    fn skip_quoted(&mut self, quote: char) {
        let what = if quote == '"' { "string" } else { "character" };
        loop {
            match self.advance() {
                None => {
                    self.error(format!("unterminated {} literal", what));
                    return;
                }
                Some('\\') => {
                    self.advance();
                }
                Some(c) if c == quote => break,
                Some(_) => {}
            }
        }

        let span = Span::new(self.start, self.source.position());
        self.diagnostics.push(
            SysyError::lex_warning(
                self.start_line,
                span,
                format!("{} literals are not supported; skipped", what),
            )
            .with_help("Only integer literals are part of the language."),
        );
    }

    fn number(&mut self, first: char) -> Token {
        let radix = match (first, self.source.peek_char()) {
            ('0', Some('x' | 'X')) => {
                self.advance();
                16
            }
            ('0', Some(c)) if c.is_ascii_digit() => 8,
            _ => 10,
        };

        // Swallow trailing identifier characters so `12ab` is one bad literal
        // rather than a number followed by a name.
        while let Some(c) = self.source.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text = self.text.clone();
        let digits = match radix {
            16 => &text[2..],
            8 => &text[1..],
            _ => &text[..],
        };

        match u64::from_str_radix(digits, radix) {
            Ok(value) if value <= u32::MAX as u64 => {
                self.make_token(TokenType::IntConst, value.to_string())
            }
            Ok(_) => {
                self.error(format!("integer literal '{}' is out of range", text));
                self.make_token(TokenType::IntConst, "0".to_string())
            }
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
                self.error(format!("integer literal '{}' is out of range", text));
                self.make_token(TokenType::IntConst, "0".to_string())
            }
            Err(_) => {
                let base = match radix {
                    16 => "hexadecimal",
                    8 => "octal",
                    _ => "decimal",
                };
                self.error(format!("malformed {} literal '{}'", base, text));
                self.make_token(TokenType::IntConst, "0".to_string())
            }
        }
    }

    fn identifier(&mut self, first: char) -> Token {
        let mut state = self.keywords.step(self.keywords.start(), first);
        while let Some(c) = self.source.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
                state = self.keywords.step(state, c);
            } else {
                break;
            }
        }

        let token_type = self.keywords.accept(state);
        let lexeme = self.text.clone();
        self.make_token(token_type, lexeme)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.source.get_char()?;
        if c == '\n' {
            self.line += 1;
        }
        self.text.push(c);
        Some(c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.source.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&mut self, message: String) {
        let span = Span::new(self.start, self.source.position().max(self.start + 1));
        self.diagnostics
            .push(SysyError::lex_error(self.start_line, span, message));
    }

    fn make_token(&self, token_type: TokenType, lexeme: String) -> Token {
        Token::new(
            token_type,
            lexeme,
            self.start_line,
            Span::new(self.start, self.source.position()),
        )
    }
}
