//! The syntax tree that the parser produces. The tree is transformed into
//! a compilation unit by `lower`.
use stplc_dsl::core::{Id, SourceSpan};
use stplc_runtime::{
    expr::{BinaryOp, UnaryOp},
    library::PouKind,
    value::Value,
    variable::Section,
};

#[derive(Debug)]
pub enum Element {
    Types(Vec<TypeDecl>),
    Globals(VarBlock),
    Pou(PouDecl),
}

#[derive(Debug)]
pub struct TypeDecl {
    pub name: Id,
    pub kind: TypeDeclKind,
    pub span: SourceSpan,
}

#[derive(Debug)]
pub enum TypeDeclKind {
    Alias {
        parent: Id,
        initializer: Option<Value>,
    },
    Enumeration {
        values: Vec<Id>,
        initializer: Option<Id>,
    },
    Subrange {
        base: Id,
        min: i128,
        max: i128,
        initializer: Option<Value>,
    },
    Array {
        element: TypeExpr,
        dimensions: Vec<(i128, i128)>,
        initializer: Option<Value>,
    },
    Struct {
        members: Vec<MemberDecl>,
    },
}

/// A type as written in a variable or member declaration.
#[derive(Clone, Debug)]
pub enum TypeExpr {
    Named(Id),
    Subrange {
        base: Id,
        min: i128,
        max: i128,
    },
    Array {
        element: Box<TypeExpr>,
        dimensions: Vec<(i128, i128)>,
    },
}

#[derive(Debug)]
pub struct MemberDecl {
    pub name: Id,
    pub ty: TypeExpr,
    pub initializer: Option<Value>,
    pub span: SourceSpan,
}

/// Qualifiers that follow the section keyword, for example `VAR CONSTANT`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Qualifiers {
    pub constant: bool,
    pub retain: bool,
}

#[derive(Debug)]
pub struct VarBlock {
    pub section: Section,
    pub qualifiers: Qualifiers,
    pub vars: Vec<VarDeclGroup>,
}

/// One declaration line, which may declare several names: `a, b : INT`.
#[derive(Debug)]
pub struct VarDeclGroup {
    pub names: Vec<Id>,
    pub address: Option<(String, SourceSpan)>,
    pub ty: TypeExpr,
    pub initializer: Option<Value>,
    pub span: SourceSpan,
}

#[derive(Debug)]
pub struct PouDecl {
    pub kind: PouKind,
    pub name: Id,
    pub returns: Option<TypeExpr>,
    pub blocks: Vec<VarBlock>,
    pub body: Vec<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug)]
pub struct Segment {
    pub name: Id,
    pub indexes: Vec<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug)]
pub struct Qualified {
    pub segments: Vec<Segment>,
    pub span: SourceSpan,
}

#[derive(Debug)]
pub struct Arg {
    pub name: Option<Id>,
    pub value: Expr,
    pub output: bool,
}

#[derive(Debug)]
pub enum Expr {
    Constant(Value, SourceSpan),
    Typed(Id, Value, SourceSpan),
    Variable(Qualified),
    Unary(UnaryOp, Box<Expr>, SourceSpan),
    Binary(BinaryOp, Box<Expr>, Box<Expr>, SourceSpan),
    Call(Id, Vec<Arg>, SourceSpan),
}

impl Expr {
    pub fn span(&self) -> SourceSpan {
        match self {
            Expr::Constant(_, span)
            | Expr::Typed(_, _, span)
            | Expr::Unary(_, _, span)
            | Expr::Binary(_, _, _, span)
            | Expr::Call(_, _, span) => span.clone(),
            Expr::Variable(qualified) => qualified.span.clone(),
        }
    }

    pub fn unary(op: UnaryOp, start: &SourceSpan, operand: Expr) -> Self {
        let span = SourceSpan::join(start, &operand.span());
        Expr::Unary(op, Box::new(operand), span)
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        let span = SourceSpan::join(&left.span(), &right.span());
        Expr::Binary(op, Box::new(left), Box::new(right), span)
    }
}

#[derive(Debug)]
pub enum CaseLabel {
    Value(Expr),
    Range(Expr, Expr),
}

#[derive(Debug)]
pub struct CaseArm {
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub enum StmtKind {
    Assign {
        target: Qualified,
        value: Expr,
    },
    Call {
        name: Id,
        args: Vec<Arg>,
    },
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
    Case {
        selector: Expr,
        arms: Vec<CaseArm>,
        otherwise: Option<Vec<Stmt>>,
    },
    For {
        control: Qualified,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    Repeat {
        body: Vec<Stmt>,
        condition: Expr,
    },
    Exit,
    Return,
}

#[derive(Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: SourceSpan,
}

/// A query: an expression to show or an assignment to make.
#[derive(Debug)]
pub enum QueryStmt {
    Read(Expr),
    Assign(Qualified, Expr, SourceSpan),
}
