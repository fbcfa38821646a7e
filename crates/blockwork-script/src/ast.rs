//! AST types for kernel script.

/// Source location of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

/// A parsed program: statements in source order.
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<(Statement, Span)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `name = expr` or `base[subs] = expr`
    Assign { target: Target, value: Expr },
    /// `record Name(field, ...)`
    Record { name: String, fields: Vec<String> },
    /// `del a, b`
    Del(Vec<String>),
    /// Bare expression, evaluated for effect.
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Index { base: Expr, subs: Vec<Subscript> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Name(String),
    List(Vec<Expr>),
    Neg(Box<Expr>),
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Attr {
        base: Box<Expr>,
        name: String,
    },
    Index {
        base: Box<Expr>,
        subs: Vec<Subscript>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Subscript {
    /// `...`
    Ellipsis,
    /// `i`, or any expression evaluating to an integer or crop slices
    Item(Expr),
    /// `start:stop`, either bound optional
    Range {
        start: Option<Expr>,
        stop: Option<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}
