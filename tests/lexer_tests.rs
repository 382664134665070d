use sysy::lexer::{KeywordDfa, Lexer, TokenType};
use sysy::source::{CharSource, StringSource};

fn token_types(input: &str) -> Vec<TokenType> {
    Lexer::new(input)
        .scan_tokens()
        .into_iter()
        .map(|token| token.token_type)
        .collect()
}

fn lexemes(input: &str) -> Vec<String> {
    Lexer::new(input)
        .scan_tokens()
        .into_iter()
        .filter(|token| !token.is_eof())
        .map(|token| token.lexeme)
        .collect()
}

#[test]
fn test_scan_declaration() {
    assert_eq!(
        token_types("const int N = 10;"),
        vec![
            TokenType::Const,
            TokenType::Int,
            TokenType::Identifier,
            TokenType::Equal,
            TokenType::IntConst,
            TokenType::Semicolon,
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_two_character_operators() {
    assert_eq!(
        token_types("<= >= == != && || < > = !"),
        vec![
            TokenType::LessEqual,
            TokenType::GreaterEqual,
            TokenType::EqualEqual,
            TokenType::BangEqual,
            TokenType::AndAnd,
            TokenType::OrOr,
            TokenType::Less,
            TokenType::Greater,
            TokenType::Equal,
            TokenType::Bang,
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_integer_literals_are_canonical_decimal() {
    assert_eq!(lexemes("0x10 0X1f 017 0 42"), vec!["16", "31", "15", "0", "42"]);
}

#[test]
fn test_largest_literal_is_accepted() {
    let mut lexer = Lexer::new("4294967295 2147483648");
    let tokens = lexer.scan_tokens();
    assert_eq!(tokens[0].lexeme, "4294967295");
    assert_eq!(tokens[1].lexeme, "2147483648");
    assert!(lexer.diagnostics().is_empty());
}

#[test]
fn test_out_of_range_literal_becomes_zero() {
    let mut lexer = Lexer::new("4294967296");
    let tokens = lexer.scan_tokens();
    assert_eq!(tokens[0].token_type, TokenType::IntConst);
    assert_eq!(tokens[0].lexeme, "0");
    assert!(lexer.diagnostics().contains_message("out of range"));
}

#[test]
fn test_malformed_literal_is_one_token() {
    let mut lexer = Lexer::new("12ab;");
    let tokens = lexer.scan_tokens();
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[0].lexeme, "0");
    assert_eq!(tokens[1].token_type, TokenType::Semicolon);
    assert!(lexer
        .diagnostics()
        .contains_message("malformed decimal literal '12ab'"));
}

#[test]
fn test_keyword_dfa() {
    let dfa = KeywordDfa::new();
    assert_eq!(dfa.classify("while"), TokenType::While);
    assert_eq!(dfa.classify("continue"), TokenType::Continue);
    assert_eq!(dfa.classify("const"), TokenType::Const);
    assert_eq!(dfa.classify("in"), TokenType::Identifier);
    assert_eq!(dfa.classify("integer"), TokenType::Identifier);
    assert_eq!(dfa.classify("Int"), TokenType::Identifier);
    assert_eq!(dfa.classify("int_"), TokenType::Identifier);
}

#[test]
fn test_identifiers_with_keyword_prefixes() {
    assert_eq!(
        token_types("if iff return_value _x x1"),
        vec![
            TokenType::If,
            TokenType::Identifier,
            TokenType::Identifier,
            TokenType::Identifier,
            TokenType::Identifier,
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_comments_are_skipped_and_lines_counted() {
    let tokens = Lexer::new("// first\n/* two\nlines */ x\ny").scan_tokens();
    assert_eq!(tokens[0].lexeme, "x");
    assert_eq!(tokens[0].line, 3);
    assert_eq!(tokens[1].lexeme, "y");
    assert_eq!(tokens[1].line, 4);
}

#[test]
fn test_unterminated_block_comment() {
    let mut lexer = Lexer::new("x /* open");
    let tokens = lexer.scan_tokens();
    assert_eq!(tokens.len(), 2);
    assert!(tokens[1].is_eof());
    assert!(lexer.diagnostics().error_occurred());
    assert!(lexer
        .diagnostics()
        .contains_message("unterminated block comment"));
}

#[test]
fn test_string_literal_is_a_warning() {
    let mut lexer = Lexer::new("\"hi\" ;");
    let tokens = lexer.scan_tokens();
    assert_eq!(tokens[0].token_type, TokenType::Semicolon);
    assert!(!lexer.diagnostics().error_occurred());
    assert_eq!(lexer.diagnostics().warnings().count(), 1);
}

#[test]
fn test_lone_ampersand_is_repaired() {
    let mut lexer = Lexer::new("a & b | c");
    let types: Vec<TokenType> = lexer.scan_tokens().iter().map(|t| t.token_type).collect();
    assert_eq!(
        types,
        vec![
            TokenType::Identifier,
            TokenType::AndAnd,
            TokenType::Identifier,
            TokenType::OrOr,
            TokenType::Identifier,
            TokenType::Eof,
        ]
    );
    assert_eq!(lexer.diagnostics().errors().count(), 2);
}

#[test]
fn test_unexpected_character_is_skipped() {
    let mut lexer = Lexer::new("a $ b");
    let tokens = lexer.scan_tokens();
    assert_eq!(tokens.len(), 3);
    assert!(lexer.diagnostics().contains_message("unexpected character '$'"));
}

#[test]
fn test_unget_token_is_idempotent() {
    let mut lexer = Lexer::new("a b");
    let first = lexer.next_token();
    lexer.unget_token();
    lexer.unget_token();
    assert_eq!(lexer.next_token(), first);
    assert_eq!(lexer.next_token().lexeme, "b");
    assert!(lexer.next_token().is_eof());
    assert!(lexer.next_token().is_eof());
}

#[test]
fn test_spans_are_char_offsets() {
    let tokens = Lexer::new("é = 1").scan_tokens();
    // 'é' is not an identifier character and is skipped with an error
    assert_eq!(tokens[0].token_type, TokenType::Equal);
    assert_eq!(tokens[0].span.start, 2);
    assert_eq!(tokens[1].span.start, 4);
    assert_eq!(tokens[1].span.end, 5);
}

#[test]
fn test_string_source() {
    let mut source = StringSource::new("ab\ncd");
    assert_eq!(source.peek_char(), Some('a'));
    assert_eq!(source.peek_next_char(), Some('b'));
    assert_eq!(source.get_char(), Some('a'));
    source.unget_char();
    assert_eq!(source.position(), 0);
    assert_eq!(source.get_line(), "ab");
    assert_eq!(source.get_char(), Some('\n'));
    assert_eq!(source.get_char(), Some('c'));
    assert_eq!(source.get_char(), Some('d'));
    assert_eq!(source.get_char(), None);
    assert_eq!(source.position(), 5);
}
