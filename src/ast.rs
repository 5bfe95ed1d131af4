//! Abstract syntax tree produced by the parser and consumed by codegen.
//!
//! Expressions keep one node type per precedence level, from the comma
//! operator down to postfix expressions. Binary levels share the
//! left-associative [`Chain`] shape: one operand, then any number of
//! `(operator, operand)` pairs evaluated left to right. Trees are built once
//! by the parser and never mutated afterwards.

use crate::ty::TypeKind;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
  pub functions: Vec<Function>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
  pub ty: TypeKind,
  pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
  pub return_type: TypeKind,
  pub name: String,
  pub params: Vec<Param>,
  /// `None` for a prototype.
  pub body: Option<Vec<BlockItem>>,
}

impl Function {
  pub fn is_defined(&self) -> bool {
    self.body.is_some()
  }

  pub fn param_types(&self) -> Vec<TypeKind> {
    self.params.iter().map(|param| param.ty).collect()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
  Declaration(DeclarationList),
  Statement(Stmt),
}

/// One or more comma-separated declarators sharing a type.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationList {
  pub ty: TypeKind,
  pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
  pub name: String,
  pub init: Option<AssignExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
  Expr(CommaExpr),
  Return(CommaExpr),
  /// A missing `else` is stored as an empty expression statement.
  If {
    condition: CommaExpr,
    then: Box<Stmt>,
    otherwise: Box<Stmt>,
  },
  Compound(Vec<BlockItem>),
  /// An omitted condition has already been replaced by the literal `1`.
  For {
    init: ForInit,
    condition: CommaExpr,
    post: CommaExpr,
    body: Box<Stmt>,
  },
  While {
    condition: CommaExpr,
    body: Box<Stmt>,
  },
  DoWhile {
    body: Box<Stmt>,
    condition: CommaExpr,
  },
  Break,
  Continue,
}

impl Stmt {
  pub fn empty() -> Self {
    Self::Expr(CommaExpr::Null)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
  Declaration(DeclarationList),
  Expr(CommaExpr),
}

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  LogicOr,
  LogicAnd,
  BitOr,
  BitXor,
  BitAnd,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  Shl,
  Shr,
  Add,
  Sub,
  Mul,
  Div,
  Mod,
}

impl BinaryOp {
  pub fn symbol(&self) -> &'static str {
    match self {
      Self::LogicOr => "||",
      Self::LogicAnd => "&&",
      Self::BitOr => "|",
      Self::BitXor => "^",
      Self::BitAnd => "&",
      Self::Eq => "==",
      Self::Ne => "!=",
      Self::Lt => "<",
      Self::Le => "<=",
      Self::Gt => ">",
      Self::Ge => ">=",
      Self::Shl => "<<",
      Self::Shr => ">>",
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Mod => "%",
    }
  }
}

/// A left-associative run of operands at a single precedence level.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain<T> {
  pub first: T,
  pub rest: Vec<(BinaryOp, T)>,
}

impl<T> Chain<T> {
  pub fn single(first: T) -> Self {
    Self {
      first,
      rest: Vec::new(),
    }
  }
}

pub type LogicOrExpr = Chain<LogicAndExpr>;
pub type LogicAndExpr = Chain<BitOrExpr>;
pub type BitOrExpr = Chain<BitXorExpr>;
pub type BitXorExpr = Chain<BitAndExpr>;
pub type BitAndExpr = Chain<EqualityExpr>;
pub type EqualityExpr = Chain<RelationalExpr>;
pub type RelationalExpr = Chain<ShiftExpr>;
pub type ShiftExpr = Chain<AdditiveExpr>;
pub type AdditiveExpr = Chain<MultiplicativeExpr>;
pub type MultiplicativeExpr = Chain<UnaryExpr>;

#[derive(Debug, Clone, PartialEq)]
pub enum CommaExpr {
  /// The omitted expression, e.g. the clauses of `for (;;)`.
  Null,
  List(Vec<AssignExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
  Assign,
  Compound(BinaryOp),
}

impl AssignOp {
  pub const ALL: [(&'static str, AssignOp); 11] = [
    ("=", AssignOp::Assign),
    ("+=", AssignOp::Compound(BinaryOp::Add)),
    ("-=", AssignOp::Compound(BinaryOp::Sub)),
    ("*=", AssignOp::Compound(BinaryOp::Mul)),
    ("/=", AssignOp::Compound(BinaryOp::Div)),
    ("%=", AssignOp::Compound(BinaryOp::Mod)),
    ("&=", AssignOp::Compound(BinaryOp::BitAnd)),
    ("^=", AssignOp::Compound(BinaryOp::BitXor)),
    ("|=", AssignOp::Compound(BinaryOp::BitOr)),
    ("<<=", AssignOp::Compound(BinaryOp::Shl)),
    (">>=", AssignOp::Compound(BinaryOp::Shr)),
  ];

  pub fn from_symbol(symbol: &str) -> Option<Self> {
    Self::ALL
      .iter()
      .find(|(text, _)| *text == symbol)
      .map(|(_, op)| *op)
  }

  pub fn symbol(&self) -> &'static str {
    Self::ALL
      .iter()
      .find(|(_, op)| op == self)
      .map_or("=", |(text, _)| *text)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignExpr {
  Conditional(CondExpr),
  Assign {
    target: String,
    op: AssignOp,
    value: Box<AssignExpr>,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CondExpr {
  LogicOr(LogicOrExpr),
  /// `condition ? then : otherwise`; nesting in `otherwise` makes it
  /// right-associative.
  Ternary {
    condition: LogicOrExpr,
    then: Box<CommaExpr>,
    otherwise: Box<CondExpr>,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  BitNot,
  LogicNot,
}

impl UnaryOp {
  pub fn symbol(&self) -> &'static str {
    match self {
      Self::Neg => "-",
      Self::BitNot => "~",
      Self::LogicNot => "!",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOp {
  Increment,
  Decrement,
}

impl StepOp {
  pub fn symbol(&self) -> &'static str {
    match self {
      Self::Increment => "++",
      Self::Decrement => "--",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnaryExpr {
  Postfix(PostfixExpr),
  Op {
    op: UnaryOp,
    operand: Box<UnaryExpr>,
  },
  /// `++x` / `--x`; only a bare identifier can be stepped.
  PrefixStep { op: StepOp, target: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostfixExpr {
  Int(i64),
  /// Float literals are carried as written.
  Float(String),
  Var(String),
  PostfixStep { target: String, op: StepOp },
  Paren(Box<CommaExpr>),
  Call { name: String, args: Vec<AssignExpr> },
}

/// Wrap a single postfix expression in every level up to assignment.
///
/// Used where the grammar synthesises an expression, such as the literal
/// `1` substituted for an omitted `for` condition.
pub fn lift_postfix(expr: PostfixExpr) -> AssignExpr {
  let unary = UnaryExpr::Postfix(expr);
  let mul = Chain::single(unary);
  let add = Chain::single(mul);
  let shift = Chain::single(add);
  let rel = Chain::single(shift);
  let eq = Chain::single(rel);
  let band = Chain::single(eq);
  let bxor = Chain::single(band);
  let bor = Chain::single(bxor);
  let land = Chain::single(bor);
  let lor = Chain::single(land);
  AssignExpr::Conditional(CondExpr::LogicOr(lor))
}

impl CommaExpr {
  pub fn int(value: i64) -> Self {
    Self::List(vec![lift_postfix(PostfixExpr::Int(value))])
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Self::Null)
  }
}
