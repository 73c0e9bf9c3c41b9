// Abstract syntax tree for the Mica language
//
// Nodes own their children; types are non-owning handles into the
// TypeRegistry that travels with the tree. The validator fills in the
// resolution fields (symbol indices, operand types, member ordinals,
// upvalue lists) in place.

use serde::{Deserialize, Serialize};

pub mod display;
pub mod registry;
pub mod symbol;
pub mod types;

pub use registry::TypeRegistry;
pub use symbol::{Span, Symbol, SymbolTable, UpvalueKind, UpvalueSym};
pub use types::{FnType, StructMember, Type, TypeId};

/// A parsed source file: the top-level block plus the type registry all of
/// its nodes reference.
#[derive(Debug)]
pub struct Ast {
    pub root: Block,
    pub types: TypeRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
    And,
    Or,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Rem
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Less
                | BinOp::LessEq
                | BinOp::Greater
                | BinOp::GreaterEq
                | BinOp::Equal
                | BinOp::NotEqual
        )
    }

    pub fn is_logic(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Rem => "%",
            BinOp::Less => "<",
            BinOp::LessEq => "<=",
            BinOp::Greater => ">",
            BinOp::GreaterEq => ">=",
            BinOp::Equal => "=",
            BinOp::NotEqual => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: LiteralValue,
    pub span: Span,
}

/// A name reference. The validator resolves `symbol` against the scope
/// chain and rewrites its index and addressing kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primary {
    pub symbol: Symbol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binary {
    pub op: BinOp,
    pub op_span: Span,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    /// Result type; Bool for comparisons and logic.
    pub ty: TypeId,
    /// Promoted operand type; picks the typed opcode at emit time.
    pub operand_ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unary {
    pub op: UnOp,
    pub op_span: Span,
    pub right: Box<Expr>,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayLiteral {
    pub elements: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLiteral {
    pub entries: Vec<MapEntry>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub callable: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscript {
    pub object: Box<Expr>,
    pub index: Box<Expr>,
    pub span: Span,
}

/// Member access `object.element`, and (after validation) the overload-pick
/// rewrite of a call target. `element` is a Primary whose symbol index is
/// the member ordinal or the overload index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Access {
    pub object: Box<Expr>,
    pub element: Box<Expr>,
    pub span: Span,
}

/// Numeric coercion inserted by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    pub right: Box<Expr>,
    pub from: TypeId,
    pub to: TypeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Binary(Binary),
    Unary(Unary),
    Grouping(Box<Expr>),
    Literal(Literal),
    Primary(Primary),
    ArrayLiteral(ArrayLiteral),
    MapLiteral(MapLiteral),
    Call(Call),
    Subscript(Subscript),
    Access(Access),
    Cast(Cast),
}

impl Expr {
    /// The token span a diagnostic about this expression should point at.
    pub fn span(&self) -> Span {
        match self {
            Expr::Binary(b) => b.op_span.clone(),
            Expr::Unary(u) => u.op_span.clone(),
            Expr::Grouping(inner) => inner.span(),
            Expr::Literal(l) => l.span.clone(),
            Expr::Primary(p) => p.symbol.span.clone(),
            Expr::ArrayLiteral(a) => a.span.clone(),
            Expr::MapLiteral(m) => m.span.clone(),
            Expr::Call(c) => c.callable.span(),
            Expr::Subscript(s) => s.object.span(),
            Expr::Access(a) => a.object.span(),
            Expr::Cast(c) => c.right.span(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
    /// Locals declared directly in this block; the emitter pops them on exit.
    pub var_count: u16,
}

impl Block {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self {
            statements,
            var_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct If {
    pub condition: Expr,
    pub then: Box<Stmt>,
    pub otherwise: Option<Box<Stmt>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct While {
    pub condition: Expr,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub symbol: Symbol,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub symbol: Symbol,
    pub params: Vec<Variable>,
    /// `None` for native function declarations.
    pub body: Option<Block>,
    pub return_ty: TypeId,
}

/// An inner `fn` declaration: a function plus the variables it captures.
/// The upvalue list is filled by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureDecl {
    pub function: FunctionDecl,
    pub upvalues: Vec<UpvalueSym>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub symbol: Symbol,
    pub members: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionDecl {
    pub symbol: Symbol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Return {
    pub value: Option<Expr>,
    pub span: Span,
}

/// `target := value ;` — the validator decides between assignment, implicit
/// declaration, and redefinition error (see the compiler crate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub target: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Block(Block),
    If(If),
    While(While),
    Variable(Variable),
    Function(FunctionDecl),
    NativeFunction(FunctionDecl),
    Closure(ClosureDecl),
    Struct(StructDecl),
    Union(UnionDecl),
    Return(Return),
    Assignment(Assignment),
    /// An expression in statement position; only calls are permitted.
    Expression(Expr),
}
