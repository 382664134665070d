//! Checks that need the whole function body but no evaluation: where
//! `break`/`continue` may appear, and whether `return` agrees with the
//! function's return type.

use crate::ast::{FuncDef, FuncType, Program, Stmt};
use crate::error::{Diagnostics, SysyError};
use crate::visit::{walk_func_def, walk_program, walk_stmt, Accept, Visitor};

pub struct ControlFlowCheck<'a> {
    entry: &'a str,
    saw_entry: bool,
    loop_depth: usize,
    return_type: Option<FuncType>,
    function: String,
    diagnostics: Diagnostics,
}

impl<'a> ControlFlowCheck<'a> {
    pub fn new(entry: &'a str) -> Self {
        Self {
            entry,
            saw_entry: false,
            loop_depth: 0,
            return_type: None,
            function: String::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Runs the check over `program` and returns what it found.
    pub fn check(program: &Program, entry: &'a str) -> Diagnostics {
        let mut checker = ControlFlowCheck::new(entry);
        program.accept(&mut checker);
        checker.diagnostics
    }
}

impl Visitor for ControlFlowCheck<'_> {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program);
        if !self.saw_entry {
            self.diagnostics.push(
                SysyError::semantic_error(0, format!("no '{}' function defined", self.entry))
                    .as_warning(),
            );
        }
    }

    fn visit_func_def(&mut self, func: &FuncDef) {
        if func.name == self.entry {
            self.saw_entry = true;
        }
        self.return_type = Some(func.return_type);
        self.function = func.name.clone();
        self.loop_depth = 0;
        walk_func_def(self, func);
        self.return_type = None;
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::While { cond, body, .. } => {
                cond.accept(self);
                self.loop_depth += 1;
                body.accept(self);
                self.loop_depth -= 1;
            }
            Stmt::Break { line } | Stmt::Continue { line } if self.loop_depth == 0 => {
                let keyword = if matches!(stmt, Stmt::Break { .. }) {
                    "break"
                } else {
                    "continue"
                };
                self.diagnostics.push(SysyError::semantic_error(
                    *line,
                    format!("'{}' statement not within a loop", keyword),
                ));
            }
            Stmt::Return { value, line } => {
                match (self.return_type, value) {
                    (Some(FuncType::Void), Some(_)) => {
                        self.diagnostics.push(
                            SysyError::semantic_error(
                                *line,
                                format!("void function '{}' returns a value", self.function),
                            )
                            .with_help("Remove the expression or declare the function `int`."),
                        );
                    }
                    (Some(FuncType::Int), None) => {
                        self.diagnostics.push(
                            SysyError::semantic_error(
                                *line,
                                format!(
                                    "'return' without a value in function '{}' returning int",
                                    self.function
                                ),
                            )
                            .as_warning(),
                        );
                    }
                    _ => {}
                }
                walk_stmt(self, stmt);
            }
            _ => walk_stmt(self, stmt),
        }
    }
}
