//! Concrete syntax produced by the grammar, with byte spans into the source.
//!
//! Items that failed to parse are kept in place as [`Recovered`] so lowering
//! can report them in document order.

use std::ops::Range;

use crate::types::{Comparator, LogicalOp};

pub(crate) type Span = Range<usize>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned<T> {
    pub(crate) node: T,
    pub(crate) span: Span,
}

impl<T> Spanned<T> {
    pub(crate) fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// A syntax error the grammar skipped over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Recovered {
    pub(crate) message: String,
    pub(crate) span: Span,
}

pub(crate) type Item<T> = Result<T, Recovered>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DataAppSyntax {
    pub(crate) configuration: Vec<Item<Spanned<(String, String)>>>,
    pub(crate) inputs: Vec<Item<Spanned<InputSyntax>>>,
    pub(crate) code: Spanned<BlockSyntax>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InputSyntax {
    pub(crate) name: String,
    pub(crate) ty: TypeSyntax,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TypeSyntax {
    pub(crate) name: Spanned<QualifiedSyntax>,
    pub(crate) functions: Vec<Spanned<FunctionSyntax>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QualifiedSyntax {
    pub(crate) qualifier: Option<String>,
    pub(crate) name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FunctionSyntax {
    pub(crate) name: String,
    pub(crate) arguments: Vec<Spanned<ExprSyntax>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BlockSyntax {
    pub(crate) statements: Vec<Item<Spanned<StmtSyntax>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StmtSyntax {
    Call {
        outputs: Vec<Spanned<String>>,
        activity: Spanned<QualifiedSyntax>,
        inputs: Vec<Spanned<ExprSyntax>>,
    },
    Assign {
        name: String,
        value: Spanned<TypeSyntax>,
    },
    If {
        conditions: Vec<Spanned<ExprSyntax>>,
        branches: Vec<Spanned<BlockSyntax>>,
        otherwise: Option<Spanned<BlockSyntax>>,
    },
    Return {
        values: Vec<Spanned<ExprSyntax>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExprSyntax {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Var(String),
    Field {
        target: Spanned<String>,
        fields: Vec<String>,
    },
    Method {
        name: String,
        arguments: Vec<Spanned<ExprSyntax>>,
    },
    Compare {
        left: Box<Spanned<ExprSyntax>>,
        op: Comparator,
        right: Box<Spanned<ExprSyntax>>,
    },
    Logical {
        left: Box<Spanned<ExprSyntax>>,
        op: LogicalOp,
        right: Box<Spanned<ExprSyntax>>,
    },
    Not(Box<Spanned<ExprSyntax>>),
}
