// SysY Interpreter Library
//
// Front end (lexer, recovering parser, control-flow check) and a
// tree-walking evaluator for the SysY teaching language.

// Public modules
pub mod analysis;
pub mod ast;
pub mod builtins;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod runner;
pub mod source;
pub mod symbol_table;
pub mod value;
pub mod visit;

// Re-export commonly used items
pub use analysis::ControlFlowCheck;
pub use ast::{Expr, Program, Stmt};
pub use config::EvaluatorConfig;
pub use error::{Diagnostics, ErrorKind, Severity, Span, SysyError};
pub use evaluator::Evaluator;
pub use lexer::{Lexer, Token, TokenType};
pub use parser::Parser;
pub use source::{CharSource, StringSource};
pub use symbol_table::SymbolTable;
pub use value::Value;
pub use visit::{Accept, Visitor};

// Re-export main functions
pub use runner::{compile, execute, run};
