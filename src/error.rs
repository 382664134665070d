use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use std::fmt;

/// Character offsets into the source text (the unit ariadne labels use).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos + 1,
        }
    }

    /// The span of the whole `line` (1-based) in `source`.
    pub fn of_line(source: &str, line: u32) -> Self {
        let mut start = 0;
        let mut current = 1;
        for (offset, c) in source.chars().enumerate() {
            if current == line {
                start = offset;
                break;
            }
            if c == '\n' {
                current += 1;
                start = offset + 1;
            }
        }
        let len = source
            .chars()
            .skip(start)
            .take_while(|c| *c != '\n')
            .count();
        Self::new(start, start + len.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LexError,
    ParseError,
    SemanticError,
    RuntimeError,
    /// A broken interpreter invariant rather than a problem in the program.
    InternalError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct SysyError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub line: u32,
    pub span: Option<Span>,
    pub message: String,
    pub help: Option<String>,
}

impl SysyError {
    pub fn new(kind: ErrorKind, line: u32, message: String) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            line,
            span: None,
            message,
            help: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn as_warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn lex_error(line: u32, span: Span, message: String) -> Self {
        Self::new(ErrorKind::LexError, line, message).with_span(span)
    }

    pub fn lex_warning(line: u32, span: Span, message: String) -> Self {
        Self::lex_error(line, span, message).as_warning()
    }

    pub fn parse_error(line: u32, span: Span, message: String) -> Self {
        Self::new(ErrorKind::ParseError, line, message).with_span(span)
    }

    pub fn parse_error_with_help(line: u32, span: Span, message: String, help: String) -> Self {
        Self::parse_error(line, span, message).with_help(help)
    }

    pub fn semantic_error(line: u32, message: String) -> Self {
        Self::new(ErrorKind::SemanticError, line, message)
    }

    pub fn runtime_error(line: u32, message: String) -> Self {
        Self::new(ErrorKind::RuntimeError, line, message)
    }

    pub fn runtime_error_with_help(line: u32, message: String, help: String) -> Self {
        Self::runtime_error(line, message).with_help(help)
    }

    pub fn internal_error(line: u32, message: String) -> Self {
        Self::new(ErrorKind::InternalError, line, message)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn report(&self, source: &str, filename: Option<&str>) {
        let filename = filename.unwrap_or("<input>");
        let span = self.span.unwrap_or_else(|| Span::of_line(source, self.line));

        let color = match self.kind {
            ErrorKind::LexError => Color::Red,
            ErrorKind::ParseError => Color::Yellow,
            ErrorKind::SemanticError => Color::Blue,
            ErrorKind::RuntimeError => Color::Magenta,
            ErrorKind::InternalError => Color::Red,
        };

        let kind_str = match self.kind {
            ErrorKind::LexError => "Lexical Error",
            ErrorKind::ParseError => "Parse Error",
            ErrorKind::SemanticError => "Semantic Error",
            ErrorKind::RuntimeError => "Runtime Error",
            ErrorKind::InternalError => "Internal Error",
        };

        let report_kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };

        let mut report_builder = Report::build(report_kind, filename, span.start)
            .with_message(format!(
                "{}: {} (line {})",
                kind_str.fg(color),
                self.message,
                self.line
            ))
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(ref help_text) = self.help {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        // A failed write to stderr leaves nothing sensible to report to.
        let _ = report_builder
            .finish()
            .eprint((filename, Source::from(source)));
    }
}

impl fmt::Display for SysyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for SysyError {}

/// Ordered collection of recoverable problems found while processing one
/// program. A run with `error_occurred()` should not be trusted.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<SysyError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SysyError) {
        self.entries.push(error);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops everything recorded after `mark` (a previous `len()`).
    pub fn truncate(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }

    pub fn error_occurred(&self) -> bool {
        self.entries.iter().any(SysyError::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &SysyError> {
        self.entries.iter().filter(|e| e.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &SysyError> {
        self.entries.iter().filter(|e| !e.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SysyError> {
        self.entries.iter()
    }

    pub fn contains_message(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }

    pub fn report_all(&self, source: &str, filename: Option<&str>) {
        for entry in &self.entries {
            entry.report(source, filename);
        }
    }
}
