use crate::ast::{
    BType, BinaryOp, Block, BlockItem, CompUnit, ConstDecl, ConstDef, ConstExp, Decl, Expr,
    FuncDef, FuncFParam, FuncType, InitVal, LVal, Program, Stmt, UnaryOp, VarDecl, VarDef,
};
use crate::error::{Diagnostics, Span, SysyError};
use crate::lexer::{Token, TokenType};
use std::rc::Rc;

type ParseResult<T> = Result<T, SysyError>;

/// Position over a token vector that always ends in `Eof` and is never
/// advanced past it.
#[derive(Debug, Clone)]
pub struct TokenCursor {
    tokens: Vec<Token>,
    current: usize,
}

impl TokenCursor {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let (line, end) = tokens
                .last()
                .map_or((1, 0), |token| (token.line, token.span.end));
            tokens.push(Token::new(
                TokenType::Eof,
                String::new(),
                line,
                Span::new(end, end),
            ));
        }
        Self { tokens, current: 0 }
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub fn peek_nth(&self, n: usize) -> &Token {
        let index = (self.current + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    pub fn previous(&self) -> Option<&Token> {
        self.current.checked_sub(1).map(|index| &self.tokens[index])
    }

    pub fn next(&mut self) -> Token {
        let token = self.tokens[self.current].clone();
        if !token.is_eof() {
            self.current += 1;
        }
        token
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }

    pub fn position(&self) -> usize {
        self.current
    }

    pub fn restore(&mut self, position: usize) {
        self.current = position.min(self.tokens.len() - 1);
    }
}

/// Cursor position plus diagnostic count, so a failed speculative parse can
/// be undone without leaving its diagnostics behind.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    position: usize,
    diagnostics: usize,
}

/// The `E' -> op T E' | ε` helper chain produced while parsing a
/// left-recursive level; `None` is ε.
#[derive(Debug)]
struct ExprTail {
    op: BinaryOp,
    line: u32,
    operand: Expr,
    rest: Option<Box<ExprTail>>,
}

/// Folds `head op1 t1 op2 t2 ...` into `((head op1 t1) op2 t2) ...`.
fn rotate(head: Expr, tail: Option<Box<ExprTail>>) -> Expr {
    let mut expr = head;
    let mut tail = tail;
    while let Some(link) = tail {
        let ExprTail {
            op,
            line,
            operand,
            rest,
        } = *link;
        expr = Expr::Binary {
            left: Box::new(expr),
            op,
            right: Box::new(operand),
            line,
        };
        tail = rest;
    }
    expr
}

const MUL_OPS: [(TokenType, BinaryOp); 3] = [
    (TokenType::Star, BinaryOp::Mul),
    (TokenType::Slash, BinaryOp::Div),
    (TokenType::Percent, BinaryOp::Mod),
];
const ADD_OPS: [(TokenType, BinaryOp); 2] = [
    (TokenType::Plus, BinaryOp::Add),
    (TokenType::Minus, BinaryOp::Sub),
];
const REL_OPS: [(TokenType, BinaryOp); 4] = [
    (TokenType::Less, BinaryOp::Lt),
    (TokenType::Greater, BinaryOp::Gt),
    (TokenType::LessEqual, BinaryOp::Le),
    (TokenType::GreaterEqual, BinaryOp::Ge),
];
const EQ_OPS: [(TokenType, BinaryOp); 2] = [
    (TokenType::EqualEqual, BinaryOp::Eq),
    (TokenType::BangEqual, BinaryOp::Ne),
];
const LAND_OPS: [(TokenType, BinaryOp); 1] = [(TokenType::AndAnd, BinaryOp::And)];
const LOR_OPS: [(TokenType, BinaryOp); 1] = [(TokenType::OrOr, BinaryOp::Or)];

pub struct Parser {
    cursor: TokenCursor,
    diagnostics: Diagnostics,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Parses every top-level unit. Units that fail beyond repair are
    /// reported and skipped; parsing resumes with the next one.
    pub fn parse(&mut self) -> Program {
        let mut units = Vec::new();

        while !self.cursor.is_at_end() {
            let start = self.cursor.position();
            match self.comp_unit() {
                Ok(unit) => units.push(unit),
                Err(error) => {
                    self.diagnostics.push(error);
                    self.skip_unit(start);
                }
            }
        }

        Program { units }
    }

    /// Parses a single expression (the `Exp` production) and requires the
    /// input to end after it.
    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        let expr = self.cond()?;
        if !self.cursor.is_at_end() {
            return Err(self.error_at_current(format!(
                "unexpected {} after expression",
                self.cursor.peek().describe()
            )));
        }
        Ok(expr)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    fn comp_unit(&mut self) -> ParseResult<CompUnit> {
        match self.cursor.peek().token_type {
            TokenType::Const => Ok(CompUnit::Decl(self.decl()?)),
            TokenType::Void => Ok(CompUnit::FuncDef(Rc::new(self.func_def()?))),
            TokenType::Int
                if self.cursor.peek_nth(1).token_type == TokenType::Identifier
                    && self.cursor.peek_nth(2).token_type == TokenType::LeftParen =>
            {
                Ok(CompUnit::FuncDef(Rc::new(self.func_def()?)))
            }
            TokenType::Int => Ok(CompUnit::Decl(self.decl()?)),
            _ => Err(self
                .error_at_current(format!(
                    "expected declaration or function definition, found {}",
                    self.cursor.peek().describe()
                ))
                .with_help(
                    "Top-level items are `const`/`int` declarations or `int`/`void` function definitions.",
                )),
        }
    }

    fn skip_unit(&mut self, start: usize) {
        if self.cursor.position() == start {
            self.cursor.next();
        }

        let mut depth = 0usize;
        loop {
            match self.cursor.peek().token_type {
                TokenType::Eof => return,
                TokenType::Const | TokenType::Int | TokenType::Void if depth == 0 => return,
                TokenType::Semicolon if depth == 0 => {
                    self.cursor.next();
                    return;
                }
                TokenType::LeftBrace => depth += 1,
                TokenType::RightBrace => {
                    if depth <= 1 {
                        self.cursor.next();
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.cursor.next();
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn decl(&mut self) -> ParseResult<Decl> {
        if self.check(TokenType::Const) {
            Ok(Decl::Const(self.const_decl()?))
        } else {
            Ok(Decl::Var(self.var_decl()?))
        }
    }

    fn const_decl(&mut self) -> ParseResult<ConstDecl> {
        let line = self.cursor.next().line;
        let btype = self.btype()?;

        let mut defs = Vec::new();
        loop {
            match self.const_def() {
                Ok(def) => defs.push(def),
                Err(error) => {
                    self.diagnostics.push(error);
                    self.sync_to(&[TokenType::Comma]);
                }
            }
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        self.expect_delimiter(
            TokenType::Semicolon,
            "expected ';' after constant declaration",
            Some("Declarations end with ';': const int N = 10;"),
        );
        Ok(ConstDecl { btype, defs, line })
    }

    fn const_def(&mut self) -> ParseResult<ConstDef> {
        let name = self.consume(TokenType::Identifier, "expected constant name")?;
        let dims = self.array_dims();

        if !self.match_token(TokenType::Equal) {
            return Err(SysyError::parse_error_with_help(
                name.line,
                name.span,
                format!("constant '{}' must be initialized", name.lexeme),
                "Constants need an initializer: const int N = 10;".to_string(),
            ));
        }

        let init = self.init_val(true)?;
        Ok(ConstDef {
            name: name.lexeme,
            dims,
            init,
            line: name.line,
        })
    }

    fn var_decl(&mut self) -> ParseResult<VarDecl> {
        let line = self.cursor.peek().line;
        let btype = self.btype()?;

        let mut defs = Vec::new();
        loop {
            match self.var_def() {
                Ok(def) => defs.push(def),
                Err(error) => {
                    self.diagnostics.push(error);
                    self.sync_to(&[TokenType::Comma]);
                }
            }
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        self.expect_delimiter(
            TokenType::Semicolon,
            "expected ';' after declaration",
            Some("Declarations end with ';': int a = 1, b[2];"),
        );
        Ok(VarDecl { btype, defs, line })
    }

    fn var_def(&mut self) -> ParseResult<VarDef> {
        let name = self.consume(TokenType::Identifier, "expected variable name")?;
        let dims = self.array_dims();
        let init = if self.match_token(TokenType::Equal) {
            Some(self.init_val(false)?)
        } else {
            None
        };

        Ok(VarDef {
            name: name.lexeme,
            dims,
            init,
            line: name.line,
        })
    }

    fn btype(&mut self) -> ParseResult<BType> {
        if self.match_token(TokenType::Int) {
            return Ok(BType::Int);
        }
        if self.check(TokenType::Identifier) {
            let error = self.missing_token_error("expected type 'int'".to_string());
            self.diagnostics.push(error);
            return Ok(BType::Int);
        }
        Err(self.error_at_current(format!(
            "expected type 'int', found {}",
            self.cursor.peek().describe()
        )))
    }

    /// `{ '[' ConstExp ']' }`. A dimension that fails to parse becomes a
    /// placeholder so the declaration keeps its shape.
    fn array_dims(&mut self) -> Vec<ConstExp> {
        let mut dims = Vec::new();
        while self.match_token(TokenType::LeftBracket) {
            let expr = self.exp_or_placeholder(&[TokenType::RightBracket, TokenType::Comma]);
            dims.push(ConstExp::new(expr));
            self.expect_delimiter(
                TokenType::RightBracket,
                "expected ']' after array dimension",
                None,
            );
        }
        dims
    }

    fn init_val(&mut self, constant: bool) -> ParseResult<InitVal> {
        if !self.check(TokenType::LeftBrace) {
            return if constant {
                Ok(InitVal::Const(self.const_exp()?))
            } else {
                Ok(InitVal::Exp(self.exp()?))
            };
        }

        let line = self.cursor.next().line;
        let mut items = Vec::new();
        if !self.check(TokenType::RightBrace) {
            loop {
                let item = match self.init_val(constant) {
                    Ok(item) => item,
                    Err(error) => {
                        let line = error.line;
                        self.diagnostics.push(error);
                        self.sync_to(&[TokenType::Comma, TokenType::RightBrace]);
                        let placeholder = Expr::Placeholder { line };
                        if constant {
                            InitVal::Const(ConstExp::new(placeholder))
                        } else {
                            InitVal::Exp(placeholder)
                        }
                    }
                };
                items.push(item);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }

        self.expect_delimiter(
            TokenType::RightBrace,
            "expected '}' to close initializer list",
            Some("Initializer lists look like {1, 2, {3, 4}}."),
        );
        Ok(InitVal::List { items, line })
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn func_def(&mut self) -> ParseResult<FuncDef> {
        let type_token = self.cursor.next();
        let return_type = match type_token.token_type {
            TokenType::Int => FuncType::Int,
            TokenType::Void => FuncType::Void,
            _ => {
                return Err(SysyError::parse_error(
                    type_token.line,
                    token_span(&type_token),
                    format!("expected function return type, found {}", type_token.describe()),
                ))
            }
        };

        let name = self.consume(TokenType::Identifier, "expected function name")?;
        self.consume(TokenType::LeftParen, "expected '(' after function name")?;

        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) && !self.check(TokenType::LeftBrace) {
            loop {
                match self.func_fparam() {
                    Ok(param) => params.push(param),
                    Err(error) => {
                        self.diagnostics.push(error);
                        self.sync_to(&[
                            TokenType::Comma,
                            TokenType::RightParen,
                            TokenType::LeftBrace,
                        ]);
                    }
                }
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect_delimiter(
            TokenType::RightParen,
            "expected ')' after parameter list",
            None,
        );

        if !self.check(TokenType::LeftBrace) {
            return Err(self
                .error_at_current(format!(
                    "expected '{{' to begin the body of function '{}', found {}",
                    name.lexeme,
                    self.cursor.peek().describe()
                ))
                .with_help("A function definition needs a body: int main() { return 0; }"));
        }
        let body = self.block()?;

        Ok(FuncDef {
            return_type,
            name: name.lexeme,
            params,
            body,
            line: type_token.line,
        })
    }

    fn func_fparam(&mut self) -> ParseResult<FuncFParam> {
        let btype = self.btype()?;
        let name = self.consume(TokenType::Identifier, "expected parameter name")?;

        let array = if self.match_token(TokenType::LeftBracket) {
            self.expect_delimiter(
                TokenType::RightBracket,
                "expected ']' after '[' in array parameter",
                Some("The first dimension of an array parameter is left empty: int a[][3]"),
            );
            Some(self.array_dims())
        } else {
            None
        };

        Ok(FuncFParam {
            btype,
            name: name.lexeme,
            array,
            line: name.line,
        })
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn block(&mut self) -> ParseResult<Block> {
        let open = self.consume(TokenType::LeftBrace, "expected '{'")?;

        let mut items = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.cursor.is_at_end() {
            items.push(self.block_item());
        }

        self.expect_delimiter(
            TokenType::RightBrace,
            "expected '}' after block",
            Some("Blocks must be closed with '}' after the opening '{'."),
        );
        Ok(Block {
            items,
            line: open.line,
        })
    }

    fn block_item(&mut self) -> BlockItem {
        if !matches!(
            self.cursor.peek().token_type,
            TokenType::Const | TokenType::Int
        ) {
            return BlockItem::Stmt(self.statement());
        }

        let line = self.cursor.peek().line;
        match self.decl() {
            Ok(decl) => BlockItem::Decl(decl),
            Err(error) => {
                self.diagnostics.push(error);
                self.synchronize_statement();
                BlockItem::Stmt(Stmt::Expr { expr: None, line })
            }
        }
    }

    fn statement(&mut self) -> Stmt {
        let line = self.cursor.peek().line;
        match self.try_statement() {
            Ok(stmt) => stmt,
            Err(error) => {
                self.diagnostics.push(error);
                self.synchronize_statement();
                Stmt::Expr { expr: None, line }
            }
        }
    }

    fn try_statement(&mut self) -> ParseResult<Stmt> {
        let token = self.cursor.peek().clone();
        match token.token_type {
            TokenType::LeftBrace => Ok(Stmt::Block(self.block()?)),
            TokenType::If => Ok(self.if_statement()),
            TokenType::While => Ok(self.while_statement()),
            TokenType::Break => {
                self.cursor.next();
                self.expect_delimiter(TokenType::Semicolon, "expected ';' after 'break'", None);
                Ok(Stmt::Break { line: token.line })
            }
            TokenType::Continue => {
                self.cursor.next();
                self.expect_delimiter(
                    TokenType::Semicolon,
                    "expected ';' after 'continue'",
                    None,
                );
                Ok(Stmt::Continue { line: token.line })
            }
            TokenType::Return => {
                self.cursor.next();
                let value = if self.check(TokenType::Semicolon) || self.check(TokenType::RightBrace)
                {
                    None
                } else {
                    Some(self.exp()?)
                };
                self.expect_delimiter(
                    TokenType::Semicolon,
                    "expected ';' after return statement",
                    None,
                );
                Ok(Stmt::Return {
                    value,
                    line: token.line,
                })
            }
            TokenType::Semicolon => {
                self.cursor.next();
                Ok(Stmt::Expr {
                    expr: None,
                    line: token.line,
                })
            }
            TokenType::Identifier
                if self.cursor.peek_nth(1).token_type != TokenType::LeftParen =>
            {
                self.assign_or_expression()
            }
            _ => self.expression_statement(),
        }
    }

    /// `LVal '=' Exp ';'` and `Exp ';'` share a prefix; try the assignment
    /// first and fall back to an expression statement.
    fn assign_or_expression(&mut self) -> ParseResult<Stmt> {
        let checkpoint = self.checkpoint();

        if let Ok(target) = self.lval() {
            if self.match_token(TokenType::Equal) {
                let value = self.exp()?;
                self.expect_delimiter(
                    TokenType::Semicolon,
                    "expected ';' after assignment",
                    None,
                );
                let line = target.line;
                return Ok(Stmt::Assign {
                    target,
                    value,
                    line,
                });
            }
        }

        self.restore(checkpoint);
        self.expression_statement()
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.cursor.peek().line;
        let expr = self.exp()?;
        self.expect_delimiter(
            TokenType::Semicolon,
            "expected ';' after expression",
            None,
        );
        Ok(Stmt::Expr {
            expr: Some(expr),
            line,
        })
    }

    fn if_statement(&mut self) -> Stmt {
        let line = self.cursor.next().line;

        self.expect_delimiter(
            TokenType::LeftParen,
            "expected '(' after 'if'",
            Some("If statements require parentheses around the condition: if (cond) stmt"),
        );
        let cond = self.cond_or_placeholder();
        self.expect_delimiter(
            TokenType::RightParen,
            "expected ')' after if condition",
            None,
        );

        let then_branch = Box::new(self.statement());
        let else_branch = if self.match_token(TokenType::Else) {
            Some(Box::new(self.statement()))
        } else {
            None
        };

        Stmt::If {
            cond,
            then_branch,
            else_branch,
            line,
        }
    }

    fn while_statement(&mut self) -> Stmt {
        let line = self.cursor.next().line;

        self.expect_delimiter(
            TokenType::LeftParen,
            "expected '(' after 'while'",
            Some("While loops require parentheses around the condition: while (cond) stmt"),
        );
        let cond = self.cond_or_placeholder();
        self.expect_delimiter(
            TokenType::RightParen,
            "expected ')' after while condition",
            None,
        );

        let body = Box::new(self.statement());
        Stmt::While { cond, body, line }
    }

    fn synchronize_statement(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.cursor.peek().token_type {
                TokenType::Eof => return,
                TokenType::Semicolon if depth == 0 => {
                    self.cursor.next();
                    return;
                }
                TokenType::RightBrace if depth == 0 => return,
                TokenType::LeftBrace => depth += 1,
                TokenType::RightBrace => depth -= 1,
                _ => {}
            }
            self.cursor.next();
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn exp(&mut self) -> ParseResult<Expr> {
        self.add_exp()
    }

    fn cond(&mut self) -> ParseResult<Expr> {
        self.lor_exp()
    }

    fn const_exp(&mut self) -> ParseResult<ConstExp> {
        Ok(ConstExp::new(self.add_exp()?))
    }

    fn exp_or_placeholder(&mut self, stops: &[TokenType]) -> Expr {
        match self.exp() {
            Ok(expr) => expr,
            Err(error) => {
                let line = error.line;
                self.diagnostics.push(error);
                self.sync_to(stops);
                Expr::Placeholder { line }
            }
        }
    }

    fn cond_or_placeholder(&mut self) -> Expr {
        match self.cond() {
            Ok(expr) => expr,
            Err(error) => {
                let line = error.line;
                self.diagnostics.push(error);
                self.sync_to(&[TokenType::RightParen, TokenType::LeftBrace]);
                Expr::Placeholder { line }
            }
        }
    }

    fn lor_exp(&mut self) -> ParseResult<Expr> {
        let head = self.land_exp()?;
        let tail = self.binary_tail(&LOR_OPS, Self::land_exp);
        Ok(rotate(head, tail))
    }

    fn land_exp(&mut self) -> ParseResult<Expr> {
        let head = self.eq_exp()?;
        let tail = self.binary_tail(&LAND_OPS, Self::eq_exp);
        Ok(rotate(head, tail))
    }

    fn eq_exp(&mut self) -> ParseResult<Expr> {
        let head = self.rel_exp()?;
        let tail = self.binary_tail(&EQ_OPS, Self::rel_exp);
        Ok(rotate(head, tail))
    }

    fn rel_exp(&mut self) -> ParseResult<Expr> {
        let head = self.add_exp()?;
        let tail = self.binary_tail(&REL_OPS, Self::add_exp);
        Ok(rotate(head, tail))
    }

    fn add_exp(&mut self) -> ParseResult<Expr> {
        let head = self.mul_exp()?;
        let tail = self.binary_tail(&ADD_OPS, Self::mul_exp);
        Ok(rotate(head, tail))
    }

    fn mul_exp(&mut self) -> ParseResult<Expr> {
        let head = self.unary_exp()?;
        let tail = self.binary_tail(&MUL_OPS, Self::unary_exp);
        Ok(rotate(head, tail))
    }

    /// `E' -> op T E' | ε`. Never fails: a missing right operand is reported
    /// and replaced by a placeholder. The links are collected in a loop and
    /// chained back to front, so long operator runs do not deepen the stack.
    fn binary_tail(
        &mut self,
        ops: &[(TokenType, BinaryOp)],
        operand: fn(&mut Self) -> ParseResult<Expr>,
    ) -> Option<Box<ExprTail>> {
        let mut links = Vec::new();
        while let Some(&(_, op)) = ops.iter().find(|(token_type, _)| self.check(*token_type)) {
            let token = self.cursor.next();

            let right = match operand(self) {
                Ok(expr) => expr,
                Err(_) => {
                    self.diagnostics.push(SysyError::parse_error_with_help(
                        token.line,
                        token_span(&token),
                        format!("expected expression after '{}'", token.lexeme),
                        format!("'{}' requires an operand on both sides.", op.symbol()),
                    ));
                    Expr::Placeholder { line: token.line }
                }
            };
            links.push((op, token.line, right));
        }

        links
            .into_iter()
            .rev()
            .fold(None, |rest, (op, line, operand)| {
                Some(Box::new(ExprTail {
                    op,
                    line,
                    operand,
                    rest,
                }))
            })
    }

    fn unary_exp(&mut self) -> ParseResult<Expr> {
        let op = match self.cursor.peek().token_type {
            TokenType::Plus => UnaryOp::Plus,
            TokenType::Minus => UnaryOp::Minus,
            TokenType::Bang => UnaryOp::Not,
            TokenType::Identifier
                if self.cursor.peek_nth(1).token_type == TokenType::LeftParen =>
            {
                return self.call();
            }
            _ => return self.primary_exp(),
        };

        let token = self.cursor.next();
        let operand = self.unary_exp()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            line: token.line,
        })
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let name = self.cursor.next();
        self.cursor.next();

        let mut args = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                args.push(self.exp_or_placeholder(&[TokenType::Comma, TokenType::RightParen]));
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }

        self.expect_delimiter(
            TokenType::RightParen,
            &format!("expected ')' after arguments to '{}'", name.lexeme),
            None,
        );
        Ok(Expr::Call {
            name: name.lexeme,
            args,
            line: name.line,
        })
    }

    fn primary_exp(&mut self) -> ParseResult<Expr> {
        let token = self.cursor.peek().clone();
        match token.token_type {
            TokenType::LeftParen => {
                self.cursor.next();
                let expr = self.cond()?;
                self.expect_delimiter(
                    TokenType::RightParen,
                    "expected ')' after expression",
                    None,
                );
                Ok(expr)
            }
            TokenType::IntConst => {
                self.cursor.next();
                let value = token.lexeme.parse::<u32>().map_err(|_| {
                    SysyError::parse_error(
                        token.line,
                        token_span(&token),
                        format!("invalid integer literal '{}'", token.lexeme),
                    )
                })?;
                Ok(Expr::Number {
                    value: value as i32,
                    line: token.line,
                })
            }
            TokenType::Identifier => Ok(Expr::LVal(self.lval()?)),
            _ => Err(self.error_at_current(format!(
                "expected expression, found {}",
                token.describe()
            ))),
        }
    }

    fn lval(&mut self) -> ParseResult<LVal> {
        let name = self.consume(TokenType::Identifier, "expected identifier")?;

        let mut indices = Vec::new();
        while self.match_token(TokenType::LeftBracket) {
            indices.push(self.exp_or_placeholder(&[TokenType::RightBracket]));
            self.expect_delimiter(
                TokenType::RightBracket,
                "expected ']' after array index",
                None,
            );
        }

        Ok(LVal {
            name: name.lexeme,
            indices,
            line: name.line,
        })
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn check(&self, token_type: TokenType) -> bool {
        self.cursor.peek().token_type == token_type
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if self.check(token_type) {
            self.cursor.next();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(token_type) {
            Ok(self.cursor.next())
        } else {
            Err(self.error_at_current(format!(
                "{}, found {}",
                message,
                self.cursor.peek().describe()
            )))
        }
    }

    /// Consumes a required delimiter. When it is missing the problem is
    /// reported and parsing carries on as if it had been there.
    fn expect_delimiter(&mut self, token_type: TokenType, message: &str, help: Option<&str>) -> bool {
        if self.match_token(token_type) {
            return true;
        }

        let mut error = self.missing_token_error(message.to_string());
        if let Some(help) = help {
            error = error.with_help(help);
        }
        self.diagnostics.push(error);
        false
    }

    /// Skips to the nearest token in `stops` (or `;`, `}`, end of input) at
    /// the current nesting depth, without consuming it.
    fn sync_to(&mut self, stops: &[TokenType]) {
        let mut depth = 0usize;
        loop {
            let token_type = self.cursor.peek().token_type;
            if token_type == TokenType::Eof {
                return;
            }
            if depth == 0
                && (stops.contains(&token_type)
                    || matches!(token_type, TokenType::Semicolon | TokenType::RightBrace))
            {
                return;
            }
            match token_type {
                TokenType::LeftParen | TokenType::LeftBracket | TokenType::LeftBrace => depth += 1,
                TokenType::RightParen | TokenType::RightBracket | TokenType::RightBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.cursor.next();
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            position: self.cursor.position(),
            diagnostics: self.diagnostics.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.cursor.restore(checkpoint.position);
        self.diagnostics.truncate(checkpoint.diagnostics);
    }

    fn error_at_current(&self, message: String) -> SysyError {
        let token = self.cursor.peek();
        SysyError::parse_error(token.line, token_span(token), message)
    }

    /// Points just past the previous token, where the missing one belongs.
    fn missing_token_error(&self, message: String) -> SysyError {
        match self.cursor.previous() {
            Some(previous) => SysyError::parse_error(
                previous.line,
                Span::single(previous.span.end),
                message,
            ),
            None => self.error_at_current(message),
        }
    }
}

fn token_span(token: &Token) -> Span {
    if token.span.end > token.span.start {
        token.span
    } else {
        Span::single(token.span.start)
    }
}
