use crate::analysis::ControlFlowCheck;
use crate::ast::Program;
use crate::config::EvaluatorConfig;
use crate::error::Diagnostics;
use crate::evaluator::Evaluator;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::Value;
use std::io::Write;
use std::thread;

/// Stack reserved for the front end and the evaluator's own setup.
const BASE_STACK: usize = 8 << 20;
/// Stack reserved per nested source-function call.
const STACK_PER_CALL: usize = 64 << 10;
const MAX_STACK: usize = 1 << 30;

/// Result of running one source text end to end.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Return value of the entry function, if the run got that far.
    pub exit_value: Option<Value>,
    /// Everything the program printed.
    pub output: String,
    /// Every diagnostic from every stage, in stage order.
    pub diagnostics: Diagnostics,
}

impl RunOutcome {
    /// Process exit status: 1 if anything went wrong, otherwise the low
    /// eight bits of the entry function's return value.
    pub fn exit_code(&self) -> i32 {
        match self.exit_value {
            Some(value) if !self.diagnostics.error_occurred() => value.as_int() & 0xff,
            _ => 1,
        }
    }
}

/// Front end only: lexing, parsing and the control-flow check.
pub fn compile(source: &str, entry: &str) -> (Program, Diagnostics) {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.scan_tokens();
    let mut diagnostics = lexer.take_diagnostics();

    let mut parser = Parser::new(tokens);
    let program = parser.parse();
    diagnostics.extend(parser.take_diagnostics());

    diagnostics.extend(ControlFlowCheck::check(&program, entry));
    (program, diagnostics)
}

/// Compiles and evaluates `source`. Evaluation runs on whatever the parser
/// recovered, even when the front end reported errors.
///
/// The work happens on a thread whose stack is sized for
/// `config.max_call_depth`, so the depth limit is reported as a runtime
/// error before the native stack runs out.
pub fn execute(source: &str, config: EvaluatorConfig) -> RunOutcome {
    let stack_size = config
        .max_call_depth
        .saturating_mul(STACK_PER_CALL)
        .saturating_add(BASE_STACK)
        .min(MAX_STACK);
    let fallback = config.clone();

    let spawned = thread::scope(|scope| {
        thread::Builder::new()
            .name("sysy-eval".to_string())
            .stack_size(stack_size)
            .spawn_scoped(scope, move || execute_inline(source, config))
            .map(|handle| match handle.join() {
                Ok(outcome) => outcome,
                Err(payload) => std::panic::resume_unwind(payload),
            })
    });

    // The thread could not be created; run on the current stack instead.
    spawned.unwrap_or_else(|_| execute_inline(source, fallback))
}

fn execute_inline(source: &str, config: EvaluatorConfig) -> RunOutcome {
    let (program, mut diagnostics) = compile(source, &config.entry);

    let mut evaluator = Evaluator::with_config(config);
    let result = evaluator.run(&program);
    diagnostics.extend(evaluator.take_diagnostics());

    let exit_value = match result {
        Ok(value) => Some(value),
        Err(error) => {
            diagnostics.push(error);
            None
        }
    };

    RunOutcome {
        exit_value,
        output: evaluator.take_output(),
        diagnostics,
    }
}

/// Runs `source` as the command-line driver does: program output goes to
/// stdout, diagnostics to stderr. Returns the process exit code.
pub fn run(source: &str, filename: Option<&str>, config: EvaluatorConfig, check_only: bool) -> i32 {
    if check_only {
        let (_, diagnostics) = compile(source, &config.entry);
        diagnostics.report_all(source, filename);
        return i32::from(diagnostics.error_occurred());
    }

    let outcome = execute(source, config);
    print!("{}", outcome.output);
    // Nothing useful can be done if stdout is gone.
    let _ = std::io::stdout().flush();
    outcome.diagnostics.report_all(source, filename);
    outcome.exit_code()
}
