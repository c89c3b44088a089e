use serde::{Deserialize, Serialize};

use crate::ident::IdentId;
use crate::types::{TypeId, TypePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    Minus,
    BitNot,
    LogNot,
    AddrOf,
    Indirection,
    Abs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Xor,
    Or,
    LogAnd,
    LogOr,
    Assign,
    MulAssign,
    DivAssign,
    RemAssign,
    AddAssign,
    SubAssign,
    ShlAssign,
    ShrAssign,
    AndAssign,
    XorAssign,
    OrAssign,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
                | BinaryOp::RemAssign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::ShlAssign
                | BinaryOp::ShrAssign
                | BinaryOp::AndAssign
                | BinaryOp::XorAssign
                | BinaryOp::OrAssign
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    /// The plain operation behind a compound assignment (`+=` -> `+`).
    pub fn base(self) -> BinaryOp {
        match self {
            BinaryOp::MulAssign => BinaryOp::Mul,
            BinaryOp::DivAssign => BinaryOp::Div,
            BinaryOp::RemAssign => BinaryOp::Rem,
            BinaryOp::AddAssign => BinaryOp::Add,
            BinaryOp::SubAssign => BinaryOp::Sub,
            BinaryOp::ShlAssign => BinaryOp::Shl,
            BinaryOp::ShrAssign => BinaryOp::Shr,
            BinaryOp::AndAssign => BinaryOp::And,
            BinaryOp::XorAssign => BinaryOp::Xor,
            BinaryOp::OrAssign => BinaryOp::Or,
            other => other,
        }
    }
}

/// Expression node. `ty` is the checked type assigned by the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    /// Implicit conversion inserted by the front end; `source` is the
    /// operand's type, the target is the node's own type.
    Cast { source: TypeId, operand: Box<Expr> },
    Identifier { id: IdentId },
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(usize),
    NullLiteral,
    Subscript { base: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Member { base: Box<Expr>, index: usize, is_arrow: bool },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Ternary { cond: Box<Expr>, then_expr: Box<Expr>, else_expr: Box<Expr> },
    Initializer(Vec<Expr>),
    /// Inline expression sequences are recognised but not lowered.
    Inline(Vec<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeId) -> Self {
        Self { kind, ty }
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::IntLiteral(value), TypePool::INT)
    }

    pub fn char_lit(value: i64) -> Self {
        Self::new(ExprKind::IntLiteral(value), TypePool::CHAR)
    }

    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::FloatLiteral(value), TypePool::FLOAT)
    }

    pub fn null() -> Self {
        Self::new(ExprKind::NullLiteral, TypePool::NULL_PTR)
    }

    pub fn ident(id: IdentId, ty: TypeId) -> Self {
        Self::new(ExprKind::Identifier { id }, ty)
    }

    pub fn unary(op: UnaryOp, operand: Expr, ty: TypeId) -> Self {
        Self::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: TypeId) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    pub fn ternary(cond: Expr, then_expr: Expr, else_expr: Expr, ty: TypeId) -> Self {
        Self::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            ty,
        )
    }

    pub fn subscript(base: Expr, index: Expr, ty: TypeId) -> Self {
        Self::new(
            ExprKind::Subscript {
                base: Box::new(base),
                index: Box::new(index),
            },
            ty,
        )
    }

    pub fn member(base: Expr, index: usize, is_arrow: bool, ty: TypeId) -> Self {
        Self::new(
            ExprKind::Member {
                base: Box::new(base),
                index,
                is_arrow,
            },
            ty,
        )
    }

    pub fn call(callee: Expr, args: Vec<Expr>, ty: TypeId) -> Self {
        Self::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            ty,
        )
    }

    pub fn cast(operand: Expr, source: TypeId, target: TypeId) -> Self {
        Self::new(
            ExprKind::Cast {
                source,
                operand: Box::new(operand),
            },
            target,
        )
    }

    pub fn initializer(items: Vec<Expr>, ty: TypeId) -> Self {
        Self::new(ExprKind::Initializer(items), ty)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Decl(Vec<Decl>),
    Labeled { label: usize, body: Box<Stmt> },
    Case { value: Expr },
    Default,
    Compound(Vec<Stmt>),
    Expr(Expr),
    Null,
    If { cond: Expr, then_body: Box<Stmt>, else_body: Option<Box<Stmt>> },
    Switch { cond: Expr, body: Box<Stmt> },
    While { cond: Expr, body: Box<Stmt> },
    Do { body: Box<Stmt>, cond: Expr },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Goto { label: usize },
    Continue,
    Break,
    Return { expr: Option<Expr> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    Var {
        id: IdentId,
        /// Dimension bound expressions for array declarations, outermost
        /// first; empty for scalars.
        dims: Vec<Expr>,
        init: Option<Expr>,
    },
    Func {
        id: IdentId,
        params: Vec<IdentId>,
        body: Stmt,
    },
    /// Type declarations carry no code.
    Type,
}
