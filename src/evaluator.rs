use crate::ast::{
    BType, BinaryOp, Block, BlockItem, CompUnit, ConstExp, Decl, Expr, FuncDef, FuncType, InitVal,
    LVal, Precedence, Program, Stmt, UnaryOp,
};
use crate::builtins;
use crate::config::EvaluatorConfig;
use crate::error::{Diagnostics, ErrorKind, SysyError};
use crate::functions::{FunctionBody, FunctionEntry, FunctionTable, ParamType};
use crate::symbol_table::{ArrayLayout, IdentMemory, Storage, SymbolTable};
use crate::value::Value;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    None,
    Break,
    Continue,
    Return,
}

/// What executing a statement produced: how control leaves it, and the
/// returned value when the signal is `Return`.
pub type Outcome = (ControlSignal, Value);

const NORMAL: Outcome = (ControlSignal::None, Value::Int(0));

/// A call argument after evaluation.
#[derive(Debug, Clone)]
pub enum Argument {
    Scalar(Value),
    Array(Storage),
}

pub struct Evaluator {
    symbols: SymbolTable,
    functions: FunctionTable,
    config: EvaluatorConfig,
    diagnostics: Diagnostics,
    output: String,
    call_depth: usize,
    dispatch_count: u64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_config(EvaluatorConfig::default())
    }

    pub fn with_config(config: EvaluatorConfig) -> Self {
        let mut functions = FunctionTable::new();
        builtins::register(&mut functions);

        Self {
            symbols: SymbolTable::new(),
            functions,
            config,
            diagnostics: Diagnostics::new(),
            output: String::new(),
            call_depth: 0,
            dispatch_count: 0,
        }
    }

    /// Sets up globals and functions, then calls the configured entry
    /// function and returns its value.
    pub fn run(&mut self, program: &Program) -> Result<Value, SysyError> {
        self.load_program(program)?;
        let entry = self.config.entry.clone();
        if !self.functions.contains(&entry) {
            return Err(SysyError::runtime_error_with_help(
                0,
                format!("no entry function '{}'", entry),
                format!("Define `int {}() {{ ... }}`.", entry),
            ));
        }
        self.call_function(&entry, Vec::new(), 0)
    }

    /// Processes the top-level units in order: global declarations are
    /// allocated and initialized, function definitions are registered.
    pub fn load_program(&mut self, program: &Program) -> Result<(), SysyError> {
        for unit in &program.units {
            match unit {
                CompUnit::Decl(decl) => self.declare(decl)?,
                CompUnit::FuncDef(func) => self.define_function(func),
            }
        }
        Ok(())
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn error_occurred(&self) -> bool {
        self.diagnostics.error_occurred()
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Number of expression-handler entries so far.
    pub fn dispatch_count(&self) -> u64 {
        self.dispatch_count
    }

    /// Records a problem that does not stop evaluation. The same problem at
    /// the same line is recorded once, however often its code runs.
    fn report(&mut self, error: SysyError) {
        let seen = self
            .diagnostics
            .iter()
            .any(|e| e.line == error.line && e.message == error.message);
        if !seen {
            self.diagnostics.push(error);
        }
    }

    /// Semantic errors are reported and swallowed; anything else stops the run.
    fn recover(&mut self, result: Result<(), SysyError>) -> Result<(), SysyError> {
        match result {
            Err(error) if error.kind == ErrorKind::SemanticError => {
                self.report(error);
                Ok(())
            }
            other => other,
        }
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn define_function(&mut self, func: &Rc<FuncDef>) {
        if let Some(existing) = self.functions.get(&func.name) {
            let message = if existing.is_native() {
                format!("'{}' redefines a builtin function", func.name)
            } else {
                format!("redefinition of function '{}'", func.name)
            };
            self.report(SysyError::semantic_error(func.line, message));
        }

        let mut params = Vec::with_capacity(func.params.len());
        for param in &func.params {
            let param_type = match &param.array {
                None => ParamType::Int,
                Some(dims) => {
                    let mut inner = Vec::with_capacity(dims.len());
                    for dim in dims {
                        match self.dimension(dim, &param.name, param.line) {
                            Ok(extent) => inner.push(extent),
                            Err(error) => {
                                self.report(error);
                                return;
                            }
                        }
                    }
                    ParamType::Array(inner)
                }
            };
            params.push((param_type, param.name.clone()));
        }

        self.functions.define(Rc::clone(func), params);
    }

    /// Calls a source-defined function with already evaluated arguments.
    pub fn call_function(
        &mut self,
        name: &str,
        args: Vec<Argument>,
        line: u32,
    ) -> Result<Value, SysyError> {
        let entry = self.lookup_function(name, line)?;
        match &entry.body {
            FunctionBody::Source(func) => {
                let func = Rc::clone(func);
                self.check_arity(&entry, args.len(), line)?;
                self.invoke(&entry, &func, args, line)
            }
            FunctionBody::Native(_) => Err(SysyError::runtime_error(
                line,
                format!("builtin '{}' can only be called from a program", name),
            )),
        }
    }

    fn lookup_function(&self, name: &str, line: u32) -> Result<FunctionEntry, SysyError> {
        self.functions.get(name).cloned().ok_or_else(|| {
            let mut error =
                SysyError::runtime_error(line, format!("undefined function '{}'", name));
            if self.symbols.search(name).is_some() {
                error = error.with_help(format!("'{}' is a variable, not a function.", name));
            }
            error
        })
    }

    fn check_arity(&self, entry: &FunctionEntry, got: usize, line: u32) -> Result<(), SysyError> {
        if entry.params.len() == got {
            return Ok(());
        }
        Err(SysyError::runtime_error(
            line,
            format!(
                "function '{}' expects {} argument{}, got {}",
                entry.name,
                entry.params.len(),
                if entry.params.len() == 1 { "" } else { "s" },
                got
            ),
        ))
    }

    fn eval_call(&mut self, name: &str, args: &[Expr], line: u32) -> Result<Value, SysyError> {
        let entry = self.lookup_function(name, line)?;
        let func = match &entry.body {
            FunctionBody::Native(callback) => return callback(self, args, line),
            FunctionBody::Source(func) => Rc::clone(func),
        };

        self.check_arity(&entry, args.len(), line)?;
        let mut bound = Vec::with_capacity(args.len());
        for ((param_type, _), arg) in entry.params.iter().zip(args) {
            bound.push(self.bind_argument(param_type, arg, line)?);
        }
        self.invoke(&entry, &func, bound, line)
    }

    fn bind_argument(
        &mut self,
        param_type: &ParamType,
        arg: &Expr,
        line: u32,
    ) -> Result<Argument, SysyError> {
        let inner = match param_type {
            ParamType::Int => return Ok(Argument::Scalar(self.evaluate_expression(arg)?)),
            ParamType::Array(inner) => inner,
        };

        let Expr::LVal(lval) = arg else {
            return Err(SysyError::runtime_error(
                line,
                "expected an array argument".to_string(),
            ));
        };

        let indices = self.eval_indices(&lval.indices)?;
        let memory = self.lookup(&lval.name, lval.line)?;
        let Some(layout) = &memory.layout else {
            return Err(SysyError::runtime_error(
                lval.line,
                format!("'{}' is not an array", lval.name),
            ));
        };
        if memory.is_const {
            return Err(SysyError::runtime_error(
                lval.line,
                format!("constant array '{}' cannot be passed as an array argument", lval.name),
            ));
        }
        if indices.len() >= layout.dimension() {
            return Err(SysyError::runtime_error(
                lval.line,
                format!("expected an array argument, found an element of '{}'", lval.name),
            ));
        }
        if layout.extents[indices.len() + 1..] != inner[..] {
            return Err(SysyError::runtime_error_with_help(
                lval.line,
                format!("array argument '{}' has the wrong shape", lval.name),
                "Every dimension after the first must match the parameter's declaration."
                    .to_string(),
            ));
        }

        if indices.is_empty() {
            return Ok(Argument::Array(memory.storage.clone()));
        }
        let offset = element_offset(&lval.name, memory, &indices, lval.line)?;
        let len: usize = layout.extents[indices.len()..]
            .iter()
            .map(|&extent| extent as usize)
            .product();
        memory
            .storage
            .slice(offset, len)
            .map(Argument::Array)
            .ok_or_else(|| out_of_bounds(&lval.name, lval.line))
    }

    fn invoke(
        &mut self,
        entry: &FunctionEntry,
        func: &FuncDef,
        args: Vec<Argument>,
        line: u32,
    ) -> Result<Value, SysyError> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(SysyError::runtime_error_with_help(
                line,
                format!(
                    "call depth limit of {} exceeded in '{}'",
                    self.config.max_call_depth, entry.name
                ),
                "Check for unbounded recursion.".to_string(),
            ));
        }

        self.call_depth += 1;
        self.symbols.push_frame();
        let result = self
            .bind_parameters(entry, args, line)
            .and_then(|()| self.execute_block(&func.body));
        self.symbols.pop_frame();
        self.call_depth -= 1;

        let (signal, value) = result?;
        match (func.return_type, signal) {
            (FuncType::Int, ControlSignal::Return) => Ok(value),
            // Falling off the end of an int function yields 0.
            _ => Ok(Value::default()),
        }
    }

    fn bind_parameters(
        &mut self,
        entry: &FunctionEntry,
        args: Vec<Argument>,
        line: u32,
    ) -> Result<(), SysyError> {
        for ((param_type, name), arg) in entry.params.iter().zip(args) {
            let memory = match (param_type, arg) {
                (ParamType::Int, Argument::Scalar(value)) => {
                    let memory = IdentMemory::scalar(BType::Int, false);
                    memory.storage.set(0, value);
                    memory
                }
                (ParamType::Array(inner), Argument::Array(storage)) => IdentMemory::array(
                    BType::Int,
                    false,
                    ArrayLayout::parameter(inner.clone()),
                    storage,
                ),
                _ => {
                    return Err(SysyError::internal_error(
                        line,
                        format!("argument kind does not match parameter '{}'", name),
                    ))
                }
            };
            self.symbols.add_symbol(name, memory);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Declares every definition in `decl` in the current scope (the global
    /// scope when no block is open). A definition with a semantic error is
    /// reported and skipped; its siblings are still declared.
    pub fn declare(&mut self, decl: &Decl) -> Result<(), SysyError> {
        match decl {
            Decl::Const(decl) => {
                for def in &decl.defs {
                    let result =
                        self.declare_one(&def.name, decl.btype, true, &def.dims, Some(&def.init), def.line);
                    self.recover(result)?;
                }
            }
            Decl::Var(decl) => {
                for def in &decl.defs {
                    let result =
                        self.declare_one(&def.name, decl.btype, false, &def.dims, def.init.as_ref(), def.line);
                    self.recover(result)?;
                }
            }
        }
        Ok(())
    }

    fn declare_one(
        &mut self,
        name: &str,
        btype: BType,
        is_const: bool,
        dims: &[ConstExp],
        init: Option<&InitVal>,
        line: u32,
    ) -> Result<(), SysyError> {
        let global = self.symbols.is_global_scope();

        let mut extents = Vec::with_capacity(dims.len());
        let mut count: u32 = 1;
        for dim in dims {
            let extent = self.dimension(dim, name, line)?;
            count = count.checked_mul(extent).ok_or_else(|| {
                SysyError::semantic_error(
                    line,
                    format!(
                        "size of array '{}' overflows: more than {} elements",
                        name,
                        u32::MAX
                    ),
                )
            })?;
            extents.push(extent);
        }
        if count as u64 > self.config.max_array_elements {
            return Err(SysyError::semantic_error(
                line,
                format!(
                    "array '{}' has {} elements, more than the limit of {}",
                    name, count, self.config.max_array_elements
                ),
            ));
        }

        // Globals start zeroed; locals are zeroed as well so that partially
        // initialized arrays read back 0 in the uncovered elements.
        let mut values = vec![Value::default(); count as usize];
        if let Some(init) = init {
            if extents.is_empty() {
                values[0] = self.scalar_init(init, name)?;
            } else {
                match init {
                    InitVal::List { items, .. } => self.fill(items, &extents, &mut values)?,
                    _ => {
                        return Err(SysyError::semantic_error(
                            init.line(),
                            format!("array '{}' needs a braced initializer list", name),
                        ))
                    }
                }
            }
        } else if is_const {
            return Err(SysyError::semantic_error(
                line,
                format!("constant '{}' must be initialized", name),
            ));
        }

        let mut memory = if extents.is_empty() {
            let memory = IdentMemory::scalar(btype, is_const);
            memory.storage.set(0, values[0]);
            memory
        } else {
            IdentMemory::array(
                btype,
                is_const,
                ArrayLayout::new(extents),
                Storage::from_values(values.clone()),
            )
        };
        if is_const {
            memory.const_init = Some(values);
        }

        if self.symbols.search_current_scope(name).is_some() {
            self.report(SysyError::semantic_error(
                line,
                format!("redefinition of '{}' in the same scope", name),
            ));
        }
        if global {
            self.symbols.add_global_symbol(name, memory);
        } else {
            self.symbols.add_symbol(name, memory);
        }
        Ok(())
    }

    fn dimension(&mut self, dim: &ConstExp, name: &str, line: u32) -> Result<u32, SysyError> {
        let extent = self.eval_const(dim)?;
        u32::try_from(extent).map_err(|_| {
            SysyError::semantic_error(
                line,
                format!("dimension of array '{}' is negative ({})", name, extent),
            )
        })
    }

    fn scalar_init(&mut self, init: &InitVal, name: &str) -> Result<Value, SysyError> {
        match init {
            InitVal::Exp(expr) => self.evaluate_expression(expr),
            InitVal::Const(exp) => Ok(Value::Int(self.eval_const(exp)?)),
            InitVal::List { items, line } => {
                if items.len() > 1 {
                    self.report(
                        SysyError::semantic_error(
                            *line,
                            format!("excess elements in scalar initializer for '{}'", name),
                        )
                        .as_warning(),
                    );
                }
                match items.first() {
                    Some(first) => self.scalar_init(first, name),
                    None => Ok(Value::default()),
                }
            }
        }
    }

    /// Writes an initializer list into `region`, whose shape is `extents`.
    /// Scalars fill consecutive elements; a nested list starts at the next
    /// sub-array boundary and covers exactly one sub-array. Elements the
    /// list does not reach keep their current (zero) value.
    fn fill(&mut self, items: &[InitVal], extents: &[u32], region: &mut [Value]) -> Result<(), SysyError> {
        let Some((&outer, inner)) = extents.split_first() else {
            return Ok(());
        };
        if outer == 0 || region.is_empty() {
            return Ok(());
        }
        let sub_len = region.len() / outer as usize;

        let mut cursor = 0;
        for item in items {
            if cursor >= region.len() {
                self.report(
                    SysyError::semantic_error(
                        item.line(),
                        "excess elements in array initializer".to_string(),
                    )
                    .as_warning(),
                );
                break;
            }

            match item {
                InitVal::List { items: nested, .. } if !inner.is_empty() => {
                    cursor = cursor.div_ceil(sub_len) * sub_len;
                    if cursor >= region.len() {
                        self.report(
                            SysyError::semantic_error(
                                item.line(),
                                "excess elements in array initializer".to_string(),
                            )
                            .as_warning(),
                        );
                        break;
                    }
                    self.fill(nested, inner, &mut region[cursor..cursor + sub_len])?;
                    cursor += sub_len;
                }
                other => {
                    region[cursor] = self.scalar_init(other, "array element")?;
                    cursor += 1;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub fn execute_block(&mut self, block: &Block) -> Result<Outcome, SysyError> {
        self.symbols.enter_scope();
        let result = self.execute_items(&block.items);
        self.symbols.exit_scope();
        result
    }

    fn execute_items(&mut self, items: &[BlockItem]) -> Result<Outcome, SysyError> {
        for item in items {
            match item {
                BlockItem::Decl(decl) => self.declare(decl)?,
                BlockItem::Stmt(stmt) => {
                    let outcome = self.execute_statement(stmt)?;
                    if outcome.0 != ControlSignal::None {
                        return Ok(outcome);
                    }
                }
            }
        }
        Ok(NORMAL)
    }

    pub fn execute_statement(&mut self, stmt: &Stmt) -> Result<Outcome, SysyError> {
        match stmt {
            Stmt::Assign { target, value, .. } => {
                let indices = self.eval_indices(&target.indices)?;
                let value = self.evaluate_expression(value)?;
                self.store(target, &indices, value)?;
                Ok(NORMAL)
            }
            Stmt::Expr { expr, .. } => {
                if let Some(expr) = expr {
                    self.evaluate_expression(expr)?;
                }
                Ok(NORMAL)
            }
            Stmt::Block(block) => self.execute_block(block),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                if self.eval_lor(cond)?.is_truthy() {
                    self.execute_statement(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute_statement(else_branch)
                } else {
                    Ok(NORMAL)
                }
            }
            Stmt::While { cond, body, .. } => {
                while self.eval_lor(cond)?.is_truthy() {
                    let (signal, value) = self.execute_statement(body)?;
                    match signal {
                        ControlSignal::Break => break,
                        ControlSignal::Continue | ControlSignal::None => {}
                        ControlSignal::Return => return Ok((ControlSignal::Return, value)),
                    }
                }
                Ok(NORMAL)
            }
            Stmt::Break { .. } => Ok((ControlSignal::Break, Value::default())),
            Stmt::Continue { .. } => Ok((ControlSignal::Continue, Value::default())),
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate_expression(expr)?,
                    None => Value::default(),
                };
                Ok((ControlSignal::Return, value))
            }
        }
    }

    fn store(&mut self, target: &LVal, indices: &[i32], value: Value) -> Result<(), SysyError> {
        let memory = self.lookup(&target.name, target.line)?;
        if memory.is_const {
            return Err(SysyError::runtime_error(
                target.line,
                format!("cannot assign to constant '{}'", target.name),
            ));
        }
        if indices.len() < memory.dimension() {
            return Err(SysyError::runtime_error(
                target.line,
                format!("cannot assign to array '{}' as a whole", target.name),
            ));
        }

        let offset = element_offset(&target.name, memory, indices, target.line)?;
        if memory.storage.set(offset, value) {
            Ok(())
        } else {
            Err(out_of_bounds(&target.name, target.line))
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Evaluates an expression at any grammar level.
    pub fn evaluate_expression(&mut self, expr: &Expr) -> Result<Value, SysyError> {
        self.eval_lor(expr)
    }

    fn eval_lor(&mut self, expr: &Expr) -> Result<Value, SysyError> {
        self.dispatch_count += 1;
        match expr {
            Expr::Binary {
                left,
                op: BinaryOp::Or,
                right,
                ..
            } => {
                if self.eval_lor(left)?.is_truthy() {
                    return Ok(Value::Int(1));
                }
                Ok(Value::from_bool(self.eval_lor(right)?.is_truthy()))
            }
            _ => self.eval_land(expr),
        }
    }

    fn eval_land(&mut self, expr: &Expr) -> Result<Value, SysyError> {
        self.dispatch_count += 1;
        match expr {
            Expr::Binary {
                left,
                op: BinaryOp::And,
                right,
                ..
            } => {
                if !self.eval_land(left)?.is_truthy() {
                    return Ok(Value::Int(0));
                }
                Ok(Value::from_bool(self.eval_land(right)?.is_truthy()))
            }
            _ => self.eval_eq(expr),
        }
    }

    fn eval_eq(&mut self, expr: &Expr) -> Result<Value, SysyError> {
        self.dispatch_count += 1;
        match expr {
            Expr::Binary {
                left,
                op,
                right,
                line,
            } if op.precedence() == Precedence::Eq => {
                let lhs = self.eval_eq(left)?;
                let rhs = self.eval_eq(right)?;
                apply_binary(*op, lhs, rhs, *line)
            }
            _ => self.eval_rel(expr),
        }
    }

    fn eval_rel(&mut self, expr: &Expr) -> Result<Value, SysyError> {
        self.dispatch_count += 1;
        match expr {
            Expr::Binary {
                left,
                op,
                right,
                line,
            } if op.precedence() == Precedence::Rel => {
                let lhs = self.eval_rel(left)?;
                let rhs = self.eval_rel(right)?;
                apply_binary(*op, lhs, rhs, *line)
            }
            _ => self.eval_add(expr),
        }
    }

    fn eval_add(&mut self, expr: &Expr) -> Result<Value, SysyError> {
        self.dispatch_count += 1;
        match expr {
            Expr::Binary {
                left,
                op,
                right,
                line,
            } if op.precedence() == Precedence::Add => {
                let lhs = self.eval_add(left)?;
                let rhs = self.eval_add(right)?;
                apply_binary(*op, lhs, rhs, *line)
            }
            _ => self.eval_mul(expr),
        }
    }

    fn eval_mul(&mut self, expr: &Expr) -> Result<Value, SysyError> {
        self.dispatch_count += 1;
        match expr {
            Expr::Binary {
                left,
                op,
                right,
                line,
            } if op.precedence() == Precedence::Mul => {
                let lhs = self.eval_mul(left)?;
                let rhs = self.eval_mul(right)?;
                apply_binary(*op, lhs, rhs, *line)
            }
            _ => self.eval_unary(expr),
        }
    }

    fn eval_unary(&mut self, expr: &Expr) -> Result<Value, SysyError> {
        self.dispatch_count += 1;
        match expr {
            Expr::Unary { op, operand, .. } => {
                let value = self.eval_unary(operand)?;
                Ok(apply_unary(*op, value))
            }
            Expr::Call { name, args, line } => self.eval_call(name, args, *line),
            _ => self.eval_primary(expr),
        }
    }

    fn eval_primary(&mut self, expr: &Expr) -> Result<Value, SysyError> {
        self.dispatch_count += 1;
        match expr {
            Expr::Number { value, .. } => Ok(Value::Int(*value)),
            Expr::LVal(lval) => self.read_lval(lval),
            Expr::Placeholder { .. } => Ok(Value::default()),
            // A parenthesized sub-expression starts over at the top level.
            Expr::Binary { .. } => self.eval_lor(expr),
            Expr::Unary { line, .. } | Expr::Call { line, .. } => Err(SysyError::internal_error(
                *line,
                "unary expression reached the primary-expression handler".to_string(),
            )),
        }
    }

    fn eval_indices(&mut self, indices: &[Expr]) -> Result<Vec<i32>, SysyError> {
        let mut values = Vec::with_capacity(indices.len());
        for index in indices {
            values.push(self.evaluate_expression(index)?.as_int());
        }
        Ok(values)
    }

    fn read_lval(&mut self, lval: &LVal) -> Result<Value, SysyError> {
        let indices = self.eval_indices(&lval.indices)?;
        let memory = self.lookup(&lval.name, lval.line)?;
        if indices.len() < memory.dimension() {
            return Err(SysyError::runtime_error_with_help(
                lval.line,
                format!("array '{}' used as a value", lval.name),
                format!(
                    "'{}' has {} dimension(s); index every one of them to read an element.",
                    lval.name,
                    memory.dimension()
                ),
            ));
        }
        let offset = element_offset(&lval.name, memory, &indices, lval.line)?;
        memory
            .storage
            .get(offset)
            .ok_or_else(|| out_of_bounds(&lval.name, lval.line))
    }

    fn lookup(&self, name: &str, line: u32) -> Result<&IdentMemory, SysyError> {
        self.symbols.search(name).ok_or_else(|| {
            SysyError::runtime_error(line, format!("undefined variable '{}'", name))
        })
    }

    // ------------------------------------------------------------------
    // Constant expressions
    // ------------------------------------------------------------------

    /// Folds a constant expression. The first evaluation stores the result
    /// in the node; later ones return it without walking the subtree.
    pub fn eval_const(&mut self, exp: &ConstExp) -> Result<i32, SysyError> {
        if let Some(value) = exp.cached() {
            return Ok(value);
        }
        let value = self.fold(&exp.expr)?;
        Ok(*exp.value.get_or_init(|| value))
    }

    fn fold(&mut self, expr: &Expr) -> Result<i32, SysyError> {
        self.dispatch_count += 1;
        match expr {
            Expr::Number { value, .. } => Ok(*value),
            Expr::Placeholder { .. } => Ok(0),
            Expr::LVal(lval) => {
                let mut indices = Vec::with_capacity(lval.indices.len());
                for index in &lval.indices {
                    indices.push(self.fold(index)?);
                }

                let memory = self.symbols.search(&lval.name).ok_or_else(|| {
                    SysyError::semantic_error(
                        lval.line,
                        format!("undefined name '{}' in constant expression", lval.name),
                    )
                })?;
                if !memory.is_const {
                    return Err(SysyError::semantic_error(
                        lval.line,
                        format!("'{}' is not a constant", lval.name),
                    )
                    .with_help("Array sizes and constant initializers may only use literals and constants."));
                }
                if indices.len() != memory.dimension() {
                    return Err(SysyError::semantic_error(
                        lval.line,
                        format!("constant array '{}' must be fully indexed", lval.name),
                    ));
                }
                let offset = element_offset(&lval.name, memory, &indices, lval.line)
                    .map_err(as_semantic)?;
                Ok(memory.const_value(&lval.name, offset, lval.line)?.as_int())
            }
            Expr::Unary { op, operand, .. } => {
                let value = self.fold(operand)?;
                Ok(apply_unary(*op, Value::Int(value)).as_int())
            }
            Expr::Binary {
                left,
                op,
                right,
                line,
            } => {
                let lhs = self.fold(left)?;
                match op {
                    BinaryOp::And if lhs == 0 => return Ok(0),
                    BinaryOp::Or if lhs != 0 => return Ok(1),
                    _ => {}
                }
                let rhs = self.fold(right)?;
                let value = match op {
                    BinaryOp::And | BinaryOp::Or => Value::from_bool(rhs != 0),
                    _ => apply_binary(*op, Value::Int(lhs), Value::Int(rhs), *line)
                        .map_err(as_semantic)?,
                };
                Ok(value.as_int())
            }
            Expr::Call { name, line, .. } => Err(SysyError::semantic_error(
                *line,
                format!("call to '{}' in constant expression", name),
            )),
        }
    }
}

/// Flat element offset of `indices` into `memory`. Fewer indices than
/// dimensions address the start of a sub-array.
fn element_offset(
    name: &str,
    memory: &IdentMemory,
    indices: &[i32],
    line: u32,
) -> Result<usize, SysyError> {
    let Some(layout) = &memory.layout else {
        if indices.is_empty() {
            return Ok(0);
        }
        return Err(SysyError::runtime_error(
            line,
            format!("'{}' is not an array and cannot be indexed", name),
        ));
    };

    if indices.len() > layout.dimension() {
        return Err(SysyError::runtime_error(
            line,
            format!(
                "too many indices for '{}': it has {} dimension(s)",
                name,
                layout.dimension()
            ),
        ));
    }

    let mut offset = 0usize;
    for (dim, &index) in indices.iter().enumerate() {
        let unknown_extent = dim == 0 && layout.unsized_first;
        if index < 0 || (!unknown_extent && index as u32 >= layout.extents[dim]) {
            return Err(SysyError::runtime_error(
                line,
                format!(
                    "index {} is out of bounds for dimension {} of '{}'",
                    index,
                    dim + 1,
                    name
                ),
            ));
        }
        offset += index as usize * layout.stride(dim);
    }
    Ok(offset)
}

fn out_of_bounds(name: &str, line: u32) -> SysyError {
    SysyError::runtime_error(line, format!("access out of bounds of array '{}'", name))
}

fn as_semantic(error: SysyError) -> SysyError {
    SysyError {
        kind: ErrorKind::SemanticError,
        ..error
    }
}

fn apply_unary(op: UnaryOp, value: Value) -> Value {
    match (op, value) {
        (UnaryOp::Plus, value) => value,
        (UnaryOp::Minus, Value::Int(n)) => Value::Int(n.wrapping_neg()),
        (UnaryOp::Minus, Value::Float(f)) => Value::Float(-f),
        (UnaryOp::Not, value) => Value::from_bool(!value.is_truthy()),
    }
}

/// The operator table for the non-logical binary operators.
fn apply_binary(op: BinaryOp, lhs: Value, rhs: Value, line: u32) -> Result<Value, SysyError> {
    if lhs.is_float() || rhs.is_float() {
        return apply_float(op, lhs.as_float(), rhs.as_float(), line);
    }

    let (a, b) = (lhs.as_int(), rhs.as_int());
    let value = match op {
        BinaryOp::Mul => Value::Int(a.wrapping_mul(b)),
        BinaryOp::Div => {
            if b == 0 {
                return Err(division_by_zero(line));
            }
            Value::Int(a.wrapping_div(b))
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(division_by_zero(line));
            }
            Value::Int(a.wrapping_rem(b))
        }
        BinaryOp::Add => Value::Int(a.wrapping_add(b)),
        BinaryOp::Sub => Value::Int(a.wrapping_sub(b)),
        BinaryOp::Lt => Value::from_bool(a < b),
        BinaryOp::Gt => Value::from_bool(a > b),
        BinaryOp::Le => Value::from_bool(a <= b),
        BinaryOp::Ge => Value::from_bool(a >= b),
        BinaryOp::Eq => Value::from_bool(a == b),
        BinaryOp::Ne => Value::from_bool(a != b),
        BinaryOp::And | BinaryOp::Or => {
            return Err(SysyError::internal_error(
                line,
                format!("logical operator '{}' reached the arithmetic table", op.symbol()),
            ))
        }
    };
    Ok(value)
}

fn apply_float(op: BinaryOp, a: f32, b: f32, line: u32) -> Result<Value, SysyError> {
    let value = match op {
        BinaryOp::Mul => Value::Float(a * b),
        BinaryOp::Div => Value::Float(a / b),
        BinaryOp::Add => Value::Float(a + b),
        BinaryOp::Sub => Value::Float(a - b),
        BinaryOp::Lt => Value::from_bool(a < b),
        BinaryOp::Gt => Value::from_bool(a > b),
        BinaryOp::Le => Value::from_bool(a <= b),
        BinaryOp::Ge => Value::from_bool(a >= b),
        BinaryOp::Eq => Value::from_bool(a == b),
        BinaryOp::Ne => Value::from_bool(a != b),
        BinaryOp::Mod | BinaryOp::And | BinaryOp::Or => {
            return Err(SysyError::runtime_error(
                line,
                format!("operator '{}' is not defined for float operands", op.symbol()),
            ))
        }
    };
    Ok(value)
}

fn division_by_zero(line: u32) -> SysyError {
    SysyError::runtime_error_with_help(
        line,
        "division by zero".to_string(),
        "The right operand of '/' and '%' must be non-zero.".to_string(),
    )
}
