use sysy::ast::ConstExp;
use sysy::config::EvaluatorConfig;
use sysy::error::ErrorKind;
use sysy::evaluator::Evaluator;
use sysy::functions::ParamType;
use sysy::lexer::Lexer;
use sysy::parser::Parser;
use sysy::runner::{compile, execute, RunOutcome};
use sysy::value::Value;

fn run(source: &str) -> RunOutcome {
    execute(source, EvaluatorConfig::default())
}

/// Runs `source` and returns the entry function's result, failing the test
/// on any error diagnostic.
fn run_ok(source: &str) -> i32 {
    let outcome = run(source);
    assert!(
        !outcome.diagnostics.error_occurred(),
        "unexpected errors: {:?}",
        outcome.diagnostics.errors().collect::<Vec<_>>()
    );
    match outcome.exit_value {
        Some(value) => value.as_int(),
        None => panic!("program did not return"),
    }
}

/// Loads the globals of `source` without calling any function.
fn load(source: &str) -> Evaluator {
    let (program, diagnostics) = compile(source, "main");
    assert!(!diagnostics.error_occurred(), "{:?}", diagnostics);
    let mut evaluator = Evaluator::new();
    if let Err(error) = evaluator.load_program(&program) {
        panic!("loading failed: {}", error);
    }
    evaluator
}

fn global_values(evaluator: &Evaluator, name: &str) -> Vec<i32> {
    match evaluator.symbols().search(name) {
        Some(memory) => memory.storage.to_vec().iter().map(Value::as_int).collect(),
        None => panic!("'{}' is not declared", name),
    }
}

fn parse_expr(source: &str) -> sysy::ast::Expr {
    let mut parser = Parser::new(Lexer::new(source).scan_tokens());
    match parser.parse_expression() {
        Ok(expr) => expr,
        Err(error) => panic!("failed to parse '{}': {}", source, error),
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_subtraction_chain() {
    let mut evaluator = Evaluator::new();
    let value = evaluator.evaluate_expression(&parse_expr("1 - 2 - 3 - 4"));
    assert_eq!(value.ok(), Some(Value::Int(-8)));
}

#[test]
fn test_arithmetic_and_comparison() {
    assert_eq!(run_ok("int main() { return 2 + 3 * 4 - 10 / 3 % 2; }"), 13);
    assert_eq!(run_ok("int main() { return (1 < 2) + (2 <= 2) + (3 > 4) + (5 != 5); }"), 2);
    assert_eq!(run_ok("int main() { return -7 / 2; }"), -3);
    assert_eq!(run_ok("int main() { return -7 % 2; }"), -1);
    assert_eq!(run_ok("int main() { return !0 + !5; }"), 1);
}

#[test]
fn test_logical_operators_yield_zero_or_one() {
    assert_eq!(run_ok("int main() { return (5 && 7) + (0 || 3); }"), 2);
    assert_eq!(run_ok("int main() { return 0 || 0; }"), 0);
}

#[test]
fn test_logical_operators_short_circuit() {
    let source = "
        int n;
        int bump() { n = n + 1; return 1; }
        int main() {
            if (0 && bump()) { }
            if (1 || bump()) { }
            if (1 && bump()) { }
            return n;
        }";
    assert_eq!(run_ok(source), 1);
}

#[test]
fn test_integer_arithmetic_wraps() {
    assert_eq!(
        run_ok("int main() { int m = -2147483648; return m / -1 == m; }"),
        1
    );
    assert_eq!(
        run_ok("int main() { int m = 2147483647; return m + 1 == -2147483648; }"),
        1
    );
}

#[test]
fn test_hex_and_octal_literals() {
    assert_eq!(run_ok("int main() { return 0x10 + 010; }"), 24);
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_if_else() {
    assert_eq!(run_ok("int main(){ if (1<2) return 3; else return 4; }"), 3);
    assert_eq!(run_ok("int main(){ if (1>2) return 3; else return 4; }"), 4);
}

#[test]
fn test_while_with_break_and_continue() {
    let source = "
        int main() {
            int i = 0;
            int sum = 0;
            while (1) {
                i = i + 1;
                if (i > 10) break;
                if (i % 2 == 0) continue;
                sum = sum + i;
            }
            return sum;
        }";
    assert_eq!(run_ok(source), 25);
}

#[test]
fn test_block_scoping() {
    let source = "
        int main() {
            int x = 1;
            {
                int x = 2;
                x = x + 1;
            }
            return x;
        }";
    assert_eq!(run_ok(source), 1);
}

#[test]
fn test_uninitialized_local_is_zero() {
    assert_eq!(run_ok("int main() { int x; return x; }"), 0);
}

#[test]
fn test_int_function_without_return_yields_zero() {
    assert_eq!(run_ok("int f() { } int main() { return f() + 1; }"), 1);
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_recursion() {
    let source = "
        int fib(int n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        int main() { return fib(10); }";
    assert_eq!(run_ok(source), 55);
}

#[test]
fn test_function_signatures_are_recorded() {
    let evaluator = load("const int W = 3; int sum(int m[][W], int n) { return 0; } int main() { return 0; }");
    let functions = evaluator.functions();
    assert!(functions.contains("print_int"));
    assert!(functions.get("print_int").is_some_and(|entry| entry.is_native()));

    let params = functions.get("sum").map(|entry| entry.params.clone());
    assert_eq!(
        params,
        Some(vec![
            (ParamType::Array(vec![3]), "m".to_string()),
            (ParamType::Int, "n".to_string()),
        ])
    );
}

#[test]
fn test_function_redefinition_replaces_earlier_body() {
    let outcome = run("int f() { return 1; } int f() { return 2; } int main() { return f(); }");
    assert!(outcome.diagnostics.contains_message("redefinition of function 'f'"));
    assert_eq!(outcome.exit_value, Some(Value::Int(2)));
}

#[test]
fn test_callee_sees_globals_not_caller_locals() {
    let source = "
        int x = 1;
        int f() { return x; }
        int main() { int x = 5; return f() * 10 + x; }";
    assert_eq!(run_ok(source), 15);
}

#[test]
fn test_scalar_parameters_are_copies() {
    let source = "
        int inc(int a) { a = a + 1; return a; }
        int main() { int v = 1; inc(v); return v; }";
    assert_eq!(run_ok(source), 1);
}

#[test]
fn test_array_parameter_aliases_caller_array() {
    let source = "
        void fill(int a[], int n) {
            int i = 0;
            while (i < n) {
                a[i] = i * i;
                i = i + 1;
            }
        }
        int main() {
            int b[5];
            fill(b, 5);
            return b[4] + b[2];
        }";
    assert_eq!(run_ok(source), 20);
}

#[test]
fn test_sub_array_arguments() {
    let source = "
        int sum(int row[], int n) {
            int i = 0;
            int s = 0;
            while (i < n) { s = s + row[i]; i = i + 1; }
            return s;
        }
        int corner(int a[][3]) { return a[1][2]; }
        int main() {
            int m[2][3] = {{1, 2, 3}, {4, 5, 6}};
            return sum(m[1], 3) * 10 + corner(m);
        }";
    assert_eq!(run_ok(source), 156);
}

#[test]
fn test_builtins_write_output() {
    let outcome = run(
        "int main() { print_int(42); print_newline(); print_hex(255); print_hex(-1); return 0; }",
    );
    assert!(!outcome.diagnostics.error_occurred());
    assert_eq!(outcome.output, "42\n0xff0xffffffff");
}

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn test_partial_initializer_is_zero_filled() {
    let evaluator = load(
        "int a[2][3] = {1, 2, 3, 4}; int b[2][3] = {{1}, 4, 5}; int c[4]; int d[4] = {1, 2};",
    );
    assert_eq!(global_values(&evaluator, "a"), vec![1, 2, 3, 4, 0, 0]);
    assert_eq!(global_values(&evaluator, "b"), vec![1, 0, 0, 4, 5, 0]);
    assert_eq!(global_values(&evaluator, "c"), vec![0, 0, 0, 0]);
    assert_eq!(global_values(&evaluator, "d"), vec![1, 2, 0, 0]);
}

#[test]
fn test_constant_dimensions() {
    let evaluator = load(
        "const int N = 2 + 1; const int t[3] = {1, 2, 4}; int a[N * 2]; int b[t[2]][N];",
    );
    let extents = |name: &str| {
        evaluator
            .symbols()
            .search(name)
            .map(|memory| memory.extents().to_vec())
            .unwrap_or_default()
    };
    assert_eq!(extents("a"), vec![6]);
    assert_eq!(extents("b"), vec![4, 3]);
    assert_eq!(global_values(&evaluator, "N"), vec![3]);
}

#[test]
fn test_const_exp_is_memoized() {
    let mut evaluator = Evaluator::new();
    let exp = ConstExp::new(parse_expr("2 * 3 + 1"));
    assert_eq!(exp.cached(), None);

    assert_eq!(evaluator.eval_const(&exp).ok(), Some(7));
    let after_first = evaluator.dispatch_count();
    assert!(after_first > 0);

    assert_eq!(evaluator.eval_const(&exp).ok(), Some(7));
    assert_eq!(evaluator.dispatch_count(), after_first);
    assert_eq!(exp.cached(), Some(7));
}

#[test]
fn test_array_size_overflow_is_reported() {
    let outcome = run("int a[65536][65536]; int main() { return 0; }");
    assert!(outcome
        .diagnostics
        .errors()
        .any(|e| e.kind == ErrorKind::SemanticError && e.message.contains("overflows")));
    // Evaluation carries on past the bad declaration.
    assert_eq!(outcome.exit_value, Some(Value::Int(0)));
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn test_negative_dimension_is_reported() {
    let outcome = run("int a[-1]; int main() { return 0; }");
    assert!(outcome.diagnostics.contains_message("negative"));
}

#[test]
fn test_variable_in_constant_expression() {
    let outcome = run("int n = 3; int a[n]; int main() { return 0; }");
    assert!(outcome.diagnostics.contains_message("'n' is not a constant"));
}

#[test]
fn test_redefinition_in_same_scope() {
    let outcome = run("int a; int a; int main() { return 0; }");
    assert!(outcome.diagnostics.contains_message("redefinition of 'a'"));
}

#[test]
fn test_excess_initializers_warn() {
    let outcome = run("int a[2] = {1, 2, 3}; int main() { return a[1]; }");
    assert!(!outcome.diagnostics.error_occurred());
    assert!(outcome.diagnostics.warnings().any(|w| w.message.contains("excess elements")));
    assert_eq!(outcome.exit_value, Some(Value::Int(2)));
}

// ============================================================================
// Runtime errors
// ============================================================================

fn runtime_error(source: &str) -> String {
    let outcome = run(source);
    assert_eq!(outcome.exit_value, None);
    assert_eq!(outcome.exit_code(), 1);
    let message = match outcome
        .diagnostics
        .errors()
        .find(|e| e.kind == ErrorKind::RuntimeError)
    {
        Some(error) => error.message.clone(),
        None => panic!("no runtime error reported"),
    };
    message
}

#[test]
fn test_division_by_zero() {
    assert!(runtime_error("int main() { int z = 0; return 1 / z; }").contains("division by zero"));
    assert!(runtime_error("int main() { int z = 0; return 1 % z; }").contains("division by zero"));
}

#[test]
fn test_index_out_of_bounds() {
    assert!(runtime_error("int a[3]; int main() { return a[3]; }").contains("out of bounds"));
    assert!(runtime_error("int a[3]; int main() { a[-1] = 1; return 0; }").contains("out of bounds"));
    assert!(runtime_error(
        "int f(int a[]) { return a[2]; } int main() { int b[2]; return f(b); }"
    )
    .contains("out of bounds"));
}

#[test]
fn test_assignment_to_constant() {
    assert!(runtime_error("const int c = 1; int main() { c = 2; return 0; }")
        .contains("cannot assign to constant 'c'"));
}

#[test]
fn test_undefined_names() {
    assert!(runtime_error("int main() { return nope; }").contains("undefined variable 'nope'"));
    assert!(runtime_error("int main() { return nope(); }").contains("undefined function 'nope'"));
}

#[test]
fn test_argument_count_mismatch() {
    assert!(runtime_error("int f(int a) { return a; } int main() { return f(1, 2); }")
        .contains("expects 1 argument, got 2"));
    assert!(runtime_error("int main() { print_int(); return 0; }")
        .contains("takes exactly 1 argument"));
}

#[test]
fn test_array_used_as_value() {
    assert!(runtime_error("int a[2]; int main() { return a; }").contains("used as a value"));
}

#[test]
fn test_call_depth_limit() {
    let outcome = execute(
        "int f(int n) { return f(n + 1); } int main() { return f(0); }",
        EvaluatorConfig::default().with_max_call_depth(16),
    );
    assert_eq!(outcome.exit_value, None);
    assert!(outcome.diagnostics.contains_message("call depth limit of 16"));
}

#[test]
fn test_default_depth_limit_is_reported() {
    let outcome = run("int f(int n) { return f(n + 1); } int main() { return f(0); }");
    assert_eq!(outcome.exit_value, None);
    assert!(outcome.diagnostics.contains_message("call depth limit of 512"));
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn test_deep_recursion_within_default_limit() {
    let outcome = run(
        "int f(int n) { if (n == 0) return 0; return f(n - 1) + 1; } int main() { return f(500); }",
    );
    assert!(!outcome.diagnostics.error_occurred(), "{:?}", outcome.diagnostics);
    assert_eq!(outcome.exit_value, Some(Value::Int(500)));
}

#[test]
fn test_missing_entry_function() {
    let outcome = run("int f() { return 1; }");
    assert_eq!(outcome.exit_value, None);
    assert!(outcome.diagnostics.contains_message("no entry function 'main'"));
    assert!(outcome.diagnostics.warnings().any(|w| w.message.contains("no 'main'")));
}

#[test]
fn test_custom_entry_function() {
    let outcome = execute(
        "int start() { return 7; }",
        EvaluatorConfig::default().with_entry("start"),
    );
    assert_eq!(outcome.exit_value, Some(Value::Int(7)));
    assert!(outcome.diagnostics.is_empty());
}

// ============================================================================
// Whole-program behavior
// ============================================================================

#[test]
fn test_exit_code_is_low_byte() {
    let outcome = run("int main() { return 258; }");
    assert_eq!(outcome.exit_code(), 2);
}

#[test]
fn test_placeholder_evaluates_to_zero() {
    let outcome = run("int main() { return 1 + ; }");
    assert!(outcome.diagnostics.error_occurred());
    assert_eq!(outcome.exit_value, Some(Value::Int(1)));
}

#[test]
fn test_control_flow_check() {
    let (_, diagnostics) = compile("int main() { break; return; }", "main");
    assert!(diagnostics
        .errors()
        .any(|e| e.message.contains("'break' statement not within a loop")));
    assert!(diagnostics
        .warnings()
        .any(|w| w.message.contains("'return' without a value")));

    let (_, diagnostics) = compile(
        "void f() { return 1; } int main() { while (1) { continue; } return 0; }",
        "main",
    );
    let messages: Vec<&str> = diagnostics.errors().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["void function 'f' returns a value"]);
}
