//! Double-dispatch traversal over the AST.
//!
//! Every node kind implements [`Accept`], which forwards to the matching
//! `visit_*` method of a [`Visitor`]. The default `visit_*` methods descend
//! into children through the `walk_*` functions, so a visitor only overrides
//! the kinds it cares about and calls the `walk_*` function itself when it
//! still wants the children.

use crate::ast::{
    Block, BlockItem, CompUnit, ConstDecl, ConstDef, ConstExp, Decl, Expr, FuncDef, FuncFParam,
    InitVal, LVal, Program, Stmt, VarDecl, VarDef,
};

pub trait Visitor {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program);
    }

    fn visit_comp_unit(&mut self, unit: &CompUnit) {
        walk_comp_unit(self, unit);
    }

    fn visit_decl(&mut self, decl: &Decl) {
        walk_decl(self, decl);
    }

    fn visit_const_decl(&mut self, decl: &ConstDecl) {
        walk_const_decl(self, decl);
    }

    fn visit_var_decl(&mut self, decl: &VarDecl) {
        walk_var_decl(self, decl);
    }

    fn visit_const_def(&mut self, def: &ConstDef) {
        walk_const_def(self, def);
    }

    fn visit_var_def(&mut self, def: &VarDef) {
        walk_var_def(self, def);
    }

    fn visit_init_val(&mut self, init: &InitVal) {
        walk_init_val(self, init);
    }

    fn visit_func_def(&mut self, func: &FuncDef) {
        walk_func_def(self, func);
    }

    fn visit_func_fparam(&mut self, param: &FuncFParam) {
        walk_func_fparam(self, param);
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_block_item(&mut self, item: &BlockItem) {
        walk_block_item(self, item);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_lval(&mut self, lval: &LVal) {
        walk_lval(self, lval);
    }

    fn visit_const_exp(&mut self, exp: &ConstExp) {
        walk_const_exp(self, exp);
    }
}

pub trait Accept {
    fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V);
}

macro_rules! impl_accept {
    ($($node:ty => $method:ident),* $(,)?) => {
        $(
            impl Accept for $node {
                fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
                    visitor.$method(self);
                }
            }
        )*
    };
}

impl_accept! {
    Program => visit_program,
    CompUnit => visit_comp_unit,
    Decl => visit_decl,
    ConstDecl => visit_const_decl,
    VarDecl => visit_var_decl,
    ConstDef => visit_const_def,
    VarDef => visit_var_def,
    InitVal => visit_init_val,
    FuncDef => visit_func_def,
    FuncFParam => visit_func_fparam,
    Block => visit_block,
    BlockItem => visit_block_item,
    Stmt => visit_stmt,
    Expr => visit_expr,
    LVal => visit_lval,
    ConstExp => visit_const_exp,
}

pub fn walk_program<V: Visitor + ?Sized>(visitor: &mut V, program: &Program) {
    for unit in &program.units {
        unit.accept(visitor);
    }
}

pub fn walk_comp_unit<V: Visitor + ?Sized>(visitor: &mut V, unit: &CompUnit) {
    match unit {
        CompUnit::Decl(decl) => decl.accept(visitor),
        CompUnit::FuncDef(func) => func.as_ref().accept(visitor),
    }
}

pub fn walk_decl<V: Visitor + ?Sized>(visitor: &mut V, decl: &Decl) {
    match decl {
        Decl::Const(decl) => decl.accept(visitor),
        Decl::Var(decl) => decl.accept(visitor),
    }
}

pub fn walk_const_decl<V: Visitor + ?Sized>(visitor: &mut V, decl: &ConstDecl) {
    for def in &decl.defs {
        def.accept(visitor);
    }
}

pub fn walk_var_decl<V: Visitor + ?Sized>(visitor: &mut V, decl: &VarDecl) {
    for def in &decl.defs {
        def.accept(visitor);
    }
}

pub fn walk_const_def<V: Visitor + ?Sized>(visitor: &mut V, def: &ConstDef) {
    for dim in &def.dims {
        dim.accept(visitor);
    }
    def.init.accept(visitor);
}

pub fn walk_var_def<V: Visitor + ?Sized>(visitor: &mut V, def: &VarDef) {
    for dim in &def.dims {
        dim.accept(visitor);
    }
    if let Some(init) = &def.init {
        init.accept(visitor);
    }
}

pub fn walk_init_val<V: Visitor + ?Sized>(visitor: &mut V, init: &InitVal) {
    match init {
        InitVal::Exp(expr) => expr.accept(visitor),
        InitVal::Const(exp) => exp.accept(visitor),
        InitVal::List { items, .. } => {
            for item in items {
                item.accept(visitor);
            }
        }
    }
}

pub fn walk_func_def<V: Visitor + ?Sized>(visitor: &mut V, func: &FuncDef) {
    for param in &func.params {
        param.accept(visitor);
    }
    func.body.accept(visitor);
}

pub fn walk_func_fparam<V: Visitor + ?Sized>(visitor: &mut V, param: &FuncFParam) {
    if let Some(dims) = &param.array {
        for dim in dims {
            dim.accept(visitor);
        }
    }
}

pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, block: &Block) {
    for item in &block.items {
        item.accept(visitor);
    }
}

pub fn walk_block_item<V: Visitor + ?Sized>(visitor: &mut V, item: &BlockItem) {
    match item {
        BlockItem::Decl(decl) => decl.accept(visitor),
        BlockItem::Stmt(stmt) => stmt.accept(visitor),
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Assign { target, value, .. } => {
            target.accept(visitor);
            value.accept(visitor);
        }
        Stmt::Expr { expr, .. } => {
            if let Some(expr) = expr {
                expr.accept(visitor);
            }
        }
        Stmt::Block(block) => block.accept(visitor),
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            cond.accept(visitor);
            then_branch.accept(visitor);
            if let Some(else_branch) = else_branch {
                else_branch.accept(visitor);
            }
        }
        Stmt::While { cond, body, .. } => {
            cond.accept(visitor);
            body.accept(visitor);
        }
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                value.accept(visitor);
            }
        }
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Number { .. } | Expr::Placeholder { .. } => {}
        Expr::LVal(lval) => lval.accept(visitor),
        Expr::Unary { operand, .. } => operand.accept(visitor),
        Expr::Call { args, .. } => {
            for arg in args {
                arg.accept(visitor);
            }
        }
        Expr::Binary { left, right, .. } => {
            left.accept(visitor);
            right.accept(visitor);
        }
    }
}

pub fn walk_lval<V: Visitor + ?Sized>(visitor: &mut V, lval: &LVal) {
    for index in &lval.indices {
        index.accept(visitor);
    }
}

pub fn walk_const_exp<V: Visitor + ?Sized>(visitor: &mut V, exp: &ConstExp) {
    exp.expr.accept(visitor);
}
