use crate::ast::{Expr, FuncDef, FuncType};
use crate::error::SysyError;
use crate::evaluator::Evaluator;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Host implementation of a builtin. It receives the unevaluated argument
/// list and evaluates what it needs through the evaluator.
pub type NativeCallback = fn(&mut Evaluator, &[Expr], u32) -> Result<Value, SysyError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Int,
    /// Array parameter; holds the extents after the unsized first one.
    Array(Vec<u32>),
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Source(Rc<FuncDef>),
    Native(NativeCallback),
}

#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub name: String,
    pub return_type: FuncType,
    pub params: Vec<(ParamType, String)>,
    pub body: FunctionBody,
}

impl FunctionEntry {
    pub fn is_native(&self) -> bool {
        matches!(self.body, FunctionBody::Native(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    entries: FxHashMap<String, FunctionEntry>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a source-defined function.
    pub fn define(
        &mut self,
        func: Rc<FuncDef>,
        params: Vec<(ParamType, String)>,
    ) {
        let entry = FunctionEntry {
            name: func.name.clone(),
            return_type: func.return_type,
            params,
            body: FunctionBody::Source(func),
        };
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn register_native(&mut self, name: &str, return_type: FuncType, callback: NativeCallback) {
        self.entries.insert(
            name.to_string(),
            FunctionEntry {
                name: name.to_string(),
                return_type,
                params: Vec::new(),
                body: FunctionBody::Native(callback),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}
