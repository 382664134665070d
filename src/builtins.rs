//! I/O primitives exposed to programs as ordinary function calls.

use crate::ast::{Expr, FuncType};
use crate::error::SysyError;
use crate::evaluator::Evaluator;
use crate::functions::FunctionTable;
use crate::value::Value;

pub fn register(functions: &mut FunctionTable) {
    functions.register_native("print_int", FuncType::Void, print_int);
    functions.register_native("print_hex", FuncType::Void, print_hex);
    functions.register_native("print_newline", FuncType::Void, print_newline);
}

fn expect_arity(name: &str, args: &[Expr], expected: usize, line: u32) -> Result<(), SysyError> {
    if args.len() == expected {
        return Ok(());
    }
    Err(SysyError::runtime_error_with_help(
        line,
        format!(
            "{}() takes exactly {} argument{}, got {}",
            name,
            expected,
            if expected == 1 { "" } else { "s" },
            args.len()
        ),
        format!(
            "Usage: {}({})",
            name,
            if expected == 1 { "value" } else { "" }
        ),
    ))
}

fn print_int(evaluator: &mut Evaluator, args: &[Expr], line: u32) -> Result<Value, SysyError> {
    expect_arity("print_int", args, 1, line)?;
    let value = evaluator.evaluate_expression(&args[0])?;
    evaluator.write_output(&value.as_int().to_string());
    Ok(Value::default())
}

fn print_hex(evaluator: &mut Evaluator, args: &[Expr], line: u32) -> Result<Value, SysyError> {
    expect_arity("print_hex", args, 1, line)?;
    let value = evaluator.evaluate_expression(&args[0])?;
    evaluator.write_output(&format!("{:#x}", value.bits()));
    Ok(Value::default())
}

fn print_newline(evaluator: &mut Evaluator, args: &[Expr], line: u32) -> Result<Value, SysyError> {
    expect_arity("print_newline", args, 0, line)?;
    evaluator.write_output("\n");
    Ok(Value::default())
}
