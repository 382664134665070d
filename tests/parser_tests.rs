use sysy::ast::{BinaryOp, BlockItem, CompUnit, Decl, Expr, InitVal, Program, Stmt, UnaryOp};
use sysy::error::Diagnostics;
use sysy::lexer::Lexer;
use sysy::parser::Parser;

fn parse(source: &str) -> (Program, Diagnostics) {
    let mut lexer = Lexer::new(source);
    let mut parser = Parser::new(lexer.scan_tokens());
    let program = parser.parse();
    let mut diagnostics = lexer.take_diagnostics();
    diagnostics.extend(parser.take_diagnostics());
    (program, diagnostics)
}

fn parse_expr(source: &str) -> Expr {
    let mut parser = Parser::new(Lexer::new(source).scan_tokens());
    match parser.parse_expression() {
        Ok(expr) => expr,
        Err(error) => panic!("failed to parse '{}': {}", source, error),
    }
}

/// Fully parenthesized rendering of an expression tree.
fn render(expr: &Expr) -> String {
    match expr {
        Expr::Number { value, .. } => value.to_string(),
        Expr::LVal(lval) => {
            let mut text = lval.name.clone();
            for index in &lval.indices {
                text.push_str(&format!("[{}]", render(index)));
            }
            text
        }
        Expr::Unary { op, operand, .. } => {
            let symbol = match op {
                UnaryOp::Plus => "+",
                UnaryOp::Minus => "-",
                UnaryOp::Not => "!",
            };
            format!("({}{})", symbol, render(operand))
        }
        Expr::Call { name, args, .. } => {
            let args: Vec<String> = args.iter().map(render).collect();
            format!("{}({})", name, args.join(", "))
        }
        Expr::Binary {
            left, op, right, ..
        } => format!("({} {} {})", render(left), op.symbol(), render(right)),
        Expr::Placeholder { .. } => "_".to_string(),
    }
}

fn main_body(program: &Program) -> &[BlockItem] {
    match program.function("main") {
        Some(func) => &func.body.items,
        None => panic!("no main function parsed"),
    }
}

#[test]
fn test_subtraction_is_left_associative() {
    assert_eq!(render(&parse_expr("1 - 2 - 3 - 4")), "(((1 - 2) - 3) - 4)");
}

#[test]
fn test_precedence_levels() {
    assert_eq!(render(&parse_expr("1 + 2 * 3")), "(1 + (2 * 3))");
    assert_eq!(render(&parse_expr("8 / 4 % 3 * 2")), "(((8 / 4) % 3) * 2)");
    assert_eq!(
        render(&parse_expr("a < b == c > d")),
        "((a < b) == (c > d))"
    );
    assert_eq!(
        render(&parse_expr("a || b && c || d")),
        "((a || (b && c)) || d)"
    );
}

#[test]
fn test_unary_and_parentheses() {
    assert_eq!(render(&parse_expr("-(1 + 2) * !x")), "((-(1 + 2)) * (!x))");
    assert_eq!(render(&parse_expr("--1")), "(-(-1))");
    assert_eq!(render(&parse_expr("(a && b)")), "(a && b)");
}

#[test]
fn test_calls_and_indexing() {
    assert_eq!(
        render(&parse_expr("f(a[1][i + 1], g()) + 1")),
        "(f(a[1][(i + 1)], g()) + 1)"
    );
}

#[test]
fn test_long_operator_chain() {
    let terms = 50_000;
    let source = vec!["1"; terms].join(" + ");
    let mut parser = Parser::new(Lexer::new(&source).scan_tokens());
    let expr = match parser.parse_expression() {
        Ok(expr) => expr,
        Err(error) => panic!("failed to parse chain: {}", error),
    };
    assert!(parser.diagnostics().is_empty());

    let mut additions = 0;
    let mut node = &expr;
    while let Expr::Binary { left, op, right, .. } = node {
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(right.as_ref(), Expr::Number { value: 1, .. }));
        additions += 1;
        node = left;
    }
    assert!(matches!(node, Expr::Number { value: 1, .. }));
    assert_eq!(additions, terms - 1);

    // Dropping a left spine this deep recurses once per node.
    std::mem::forget(expr);
}

#[test]
fn test_parse_expression_rejects_trailing_tokens() {
    let mut parser = Parser::new(Lexer::new("1 2").scan_tokens());
    let error = parser.parse_expression().err();
    assert!(error.is_some_and(|e| e.message.contains("after expression")));
}

#[test]
fn test_missing_operand_becomes_placeholder() {
    let mut parser = Parser::new(Lexer::new("1 + ").scan_tokens());
    let expr = parser.parse_expression();
    assert!(expr.is_ok_and(|e| render(&e) == "(1 + _)"));
    assert!(parser.diagnostics().contains_message("expected expression after '+'"));
}

#[test]
fn test_top_level_units() {
    let (program, diagnostics) = parse(
        "const int N = 4; int buf[N]; int sum(int a[], int n) { return 0; } void noop() { } int main() { return 0; }",
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(program.units.len(), 5);
    assert!(matches!(program.units[0], CompUnit::Decl(Decl::Const(_))));
    assert!(matches!(program.units[1], CompUnit::Decl(Decl::Var(_))));

    let names: Vec<&str> = program.functions().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["sum", "noop", "main"]);

    let sum = program.function("sum").map(|f| f.params.clone());
    let params = sum.unwrap_or_default();
    assert_eq!(params.len(), 2);
    assert!(params[0].array.as_ref().is_some_and(|dims| dims.is_empty()));
    assert!(params[1].array.is_none());
}

#[test]
fn test_assignment_versus_expression_statement() {
    let (program, diagnostics) = parse("int main() { a[1] = 2; a[1] + 2; f(); return 0; }");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let body = main_body(&program);
    assert!(matches!(body[0], BlockItem::Stmt(Stmt::Assign { .. })));
    assert!(matches!(body[1], BlockItem::Stmt(Stmt::Expr { expr: Some(_), .. })));
    assert!(matches!(body[2], BlockItem::Stmt(Stmt::Expr { expr: Some(Expr::Call { .. }), .. })));
    assert!(matches!(body[3], BlockItem::Stmt(Stmt::Return { value: Some(_), .. })));
}

#[test]
fn test_speculative_parse_leaves_no_diagnostics() {
    // `a[ ]` fails as an assignment target before the parser falls back to
    // an expression statement, which reports the problem exactly once.
    let (_, diagnostics) = parse("int main() { a[] + 1; return 0; }");
    assert_eq!(diagnostics.errors().count(), 1, "{:?}", diagnostics);
}

#[test]
fn test_dangling_else_binds_to_nearest_if() {
    let (program, diagnostics) =
        parse("int main() { if (a) if (b) return 1; else return 2; return 0; }");
    assert!(diagnostics.is_empty());

    let body = main_body(&program);
    let BlockItem::Stmt(Stmt::If {
        then_branch,
        else_branch,
        ..
    }) = &body[0]
    else {
        panic!("expected an if statement");
    };
    assert!(else_branch.is_none());
    assert!(matches!(
        then_branch.as_ref(),
        Stmt::If {
            else_branch: Some(_),
            ..
        }
    ));
}

#[test]
fn test_nested_initializer_lists() {
    let (program, diagnostics) = parse("int a[2][2] = {{1, 2}, 3};");
    assert!(diagnostics.is_empty());

    let CompUnit::Decl(Decl::Var(decl)) = &program.units[0] else {
        panic!("expected a variable declaration");
    };
    let def = &decl.defs[0];
    assert_eq!(def.dims.len(), 2);
    let Some(InitVal::List { items, .. }) = &def.init else {
        panic!("expected an initializer list");
    };
    assert_eq!(items.len(), 2);
    assert!(matches!(items[0], InitVal::List { .. }));
    assert!(matches!(items[1], InitVal::Exp(_)));
}

#[test]
fn test_recovery_keeps_later_functions() {
    let (program, diagnostics) = parse(
        "int broken() { int x = ; return x; }\nint main() { return 0; }",
    );
    assert!(diagnostics.error_occurred());
    assert!(program.function("broken").is_some());
    assert!(program.function("main").is_some());
}

#[test]
fn test_recovery_skips_bad_top_level_unit() {
    let (program, diagnostics) = parse("x = 1; { junk } int main() { return 0; }");
    assert!(diagnostics.contains_message("expected declaration or function definition"));
    assert_eq!(program.units.len(), 1);
    assert!(program.function("main").is_some());
}

#[test]
fn test_error_lines() {
    let (_, diagnostics) = parse("int main() {\n  int x;\n  x = ;\n  return 0;\n}");
    let lines: Vec<u32> = diagnostics.errors().map(|e| e.line).collect();
    assert_eq!(lines, vec![3]);
}

#[test]
fn test_missing_type_is_assumed_int() {
    let (program, diagnostics) = parse("const N = 3;");
    assert!(diagnostics.contains_message("expected type 'int'"));
    assert_eq!(program.units.len(), 1);
}
