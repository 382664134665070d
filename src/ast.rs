use std::cell::OnceCell;
use std::rc::Rc;

/// A parsed program: the sequence of top-level units that survived parsing.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub units: Vec<CompUnit>,
}

impl Program {
    pub fn functions(&self) -> impl Iterator<Item = &Rc<FuncDef>> {
        self.units.iter().filter_map(|unit| match unit {
            CompUnit::FuncDef(func) => Some(func),
            CompUnit::Decl(_) => None,
        })
    }

    pub fn function(&self, name: &str) -> Option<&Rc<FuncDef>> {
        self.functions().find(|func| func.name == name)
    }
}

#[derive(Debug, Clone)]
pub enum CompUnit {
    Decl(Decl),
    /// Shared so the function table and any compilation backend can hold the
    /// body without copying it.
    FuncDef(Rc<FuncDef>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BType {
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncType {
    Int,
    Void,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Const(ConstDecl),
    Var(VarDecl),
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub btype: BType,
    pub defs: Vec<ConstDef>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct ConstDef {
    pub name: String,
    pub dims: Vec<ConstExp>,
    pub init: InitVal,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub btype: BType,
    pub defs: Vec<VarDef>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct VarDef {
    pub name: String,
    pub dims: Vec<ConstExp>,
    pub init: Option<InitVal>,
    pub line: u32,
}

/// Initializers. Constant definitions use `Const` leaves, variables use
/// `Exp` leaves; both nest through `List`.
#[derive(Debug, Clone)]
pub enum InitVal {
    Exp(Expr),
    Const(ConstExp),
    List { items: Vec<InitVal>, line: u32 },
}

impl InitVal {
    pub fn line(&self) -> u32 {
        match self {
            InitVal::Exp(expr) => expr.line(),
            InitVal::Const(exp) => exp.expr.line(),
            InitVal::List { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub return_type: FuncType,
    pub name: String,
    pub params: Vec<FuncFParam>,
    pub body: Block,
    pub line: u32,
}

/// A formal parameter. `array` is `None` for scalars; for `int a[][N][M]`
/// it holds the extents after the first (always unsized) dimension.
#[derive(Debug, Clone)]
pub struct FuncFParam {
    pub btype: BType,
    pub name: String,
    pub array: Option<Vec<ConstExp>>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub items: Vec<BlockItem>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub enum BlockItem {
    Decl(Decl),
    Stmt(Stmt),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Assign {
        target: LVal,
        value: Expr,
        line: u32,
    },
    /// `exp;` or the empty statement `;`.
    Expr {
        expr: Option<Expr>,
        line: u32,
    },
    Block(Block),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        line: u32,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        line: u32,
    },
    Break {
        line: u32,
    },
    Continue {
        line: u32,
    },
    Return {
        value: Option<Expr>,
        line: u32,
    },
}

impl Stmt {
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Assign { line, .. } => *line,
            Stmt::Expr { line, .. } => *line,
            Stmt::Block(block) => block.line,
            Stmt::If { line, .. } => *line,
            Stmt::While { line, .. } => *line,
            Stmt::Break { line } => *line,
            Stmt::Continue { line } => *line,
            Stmt::Return { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LVal {
    pub name: String,
    pub indices: Vec<Expr>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number {
        value: i32,
        line: u32,
    },
    LVal(LVal),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        line: u32,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        line: u32,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        line: u32,
    },
    /// Stands in for an operand the parser could not read; evaluates to 0.
    Placeholder {
        line: u32,
    },
}

impl Expr {
    pub fn line(&self) -> u32 {
        match self {
            Expr::Number { line, .. } => *line,
            Expr::LVal(lval) => lval.line,
            Expr::Unary { line, .. } => *line,
            Expr::Call { line, .. } => *line,
            Expr::Binary { line, .. } => *line,
            Expr::Placeholder { line } => *line,
        }
    }
}

/// A constant expression plus its memoized value. The cell is written the
/// first time the expression is folded and never again.
#[derive(Debug, Clone)]
pub struct ConstExp {
    pub expr: Expr,
    pub value: OnceCell<i32>,
}

impl ConstExp {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            value: OnceCell::new(),
        }
    }

    pub fn cached(&self) -> Option<i32> {
        self.value.get().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

/// Grammar levels of the binary operators, lowest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    LOr,
    LAnd,
    Eq,
    Rel,
    Add,
    Mul,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn precedence(&self) -> Precedence {
        match self {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => Precedence::Mul,
            BinaryOp::Add | BinaryOp::Sub => Precedence::Add,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => Precedence::Rel,
            BinaryOp::Eq | BinaryOp::Ne => Precedence::Eq,
            BinaryOp::And => Precedence::LAnd,
            BinaryOp::Or => Precedence::LOr,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}
