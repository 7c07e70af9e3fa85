//! AST definition for Rinha programs.
//!
//! The tree arrives fully formed from the [`loader`](crate::loader); nothing
//! in the crate mutates it afterwards. Every node carries a [`Loc`] so that
//! compiled instructions, and through them runtime errors, can point back at
//! the source.

use serde::Deserialize;
use std::fmt;
use std::rc::Rc;

use crate::data::Symbol;

/// A source span. Carries no semantics; used only for error reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Loc {
    /// Byte offset of the start of the span.
    pub start: usize,
    /// Byte offset one past the end of the span.
    pub end: usize,
    /// Name of the source file the span indexes into.
    pub filename: String,
}

impl Loc {
    /// Build a `Loc` from offsets and anything stringish.
    pub fn new<S: Into<String>>(start: usize, end: usize, filename: S) -> Loc {
        Loc {
            start,
            end,
            filename: filename.into(),
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}-{}", self.filename, self.start, self.end)
    }
}

/// A binding name, as it appears in `let` and in function parameter lists.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Parameter {
    /// The identifier text.
    pub text: Symbol,
    /// Where the identifier was written.
    pub location: Loc,
}

/// The document root: a named program with a single top level expression.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub name: String,
    pub expression: Term,
    pub location: Loc,
}

/// The thirteen binary operators of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
}

impl BinaryOp {
    /// Look an operator up by its serialized name, case-insensitively.
    pub fn from_name(name: &str) -> Option<BinaryOp> {
        let op = match name.to_ascii_lowercase().as_str() {
            "add" => BinaryOp::Add,
            "sub" => BinaryOp::Sub,
            "mul" => BinaryOp::Mul,
            "div" => BinaryOp::Div,
            "rem" => BinaryOp::Rem,
            "eq" => BinaryOp::Eq,
            "neq" => BinaryOp::Neq,
            "lt" => BinaryOp::Lt,
            "gt" => BinaryOp::Gt,
            "lte" => BinaryOp::Lte,
            "gte" => BinaryOp::Gte,
            "and" => BinaryOp::And,
            "or" => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    /// The surface syntax token for the operator.
    pub fn token(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Lte => "<=",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Binding strength, used by the printer to decide on parentheses.
    ///
    /// Values are spaced out so new levels can be slotted in between.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 40,
            BinaryOp::Add | BinaryOp::Sub => 30,
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Lte
            | BinaryOp::Gte => 20,
            BinaryOp::And => 10,
            BinaryOp::Or => 5,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// A Rinha expression.
///
/// Child terms are held behind [`Rc`] so subtrees can be cheaply shared; the
/// tree itself is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Signed 64 bit integer literal.
    Int { value: i64, location: Loc },
    /// UTF-8 string literal.
    Str { value: String, location: Loc },
    /// Boolean literal.
    Bool { value: bool, location: Loc },
    /// A variable reference.
    Var { text: Symbol, location: Loc },
    /// Constructs a pair from two expressions.
    Tuple {
        first: Rc<Term>,
        second: Rc<Term>,
        location: Loc,
    },
    /// Projects the first element of a pair.
    First { value: Rc<Term>, location: Loc },
    /// Projects the second element of a pair.
    Second { value: Rc<Term>, location: Loc },
    /// Evaluates, emits the value on standard output, and returns it.
    Print { value: Rc<Term>, location: Loc },
    /// Two-armed conditional.
    If {
        condition: Rc<Term>,
        then: Rc<Term>,
        otherwise: Rc<Term>,
        location: Loc,
    },
    /// A binary operation.
    Binary {
        lhs: Rc<Term>,
        op: BinaryOp,
        rhs: Rc<Term>,
        location: Loc,
    },
    /// A lexical binding scoped over `next`.
    Let {
        name: Parameter,
        value: Rc<Term>,
        next: Rc<Term>,
        location: Loc,
    },
    /// An anonymous function literal.
    Function {
        parameters: Vec<Parameter>,
        value: Rc<Term>,
        location: Loc,
    },
    /// A function application.
    Call {
        callee: Rc<Term>,
        arguments: Vec<Term>,
        location: Loc,
    },
}

impl Term {
    /// The source span of this node.
    pub fn location(&self) -> &Loc {
        match self {
            Term::Int { location, .. }
            | Term::Str { location, .. }
            | Term::Bool { location, .. }
            | Term::Var { location, .. }
            | Term::Tuple { location, .. }
            | Term::First { location, .. }
            | Term::Second { location, .. }
            | Term::Print { location, .. }
            | Term::If { location, .. }
            | Term::Binary { location, .. }
            | Term::Let { location, .. }
            | Term::Function { location, .. }
            | Term::Call { location, .. } => location,
        }
    }
}
