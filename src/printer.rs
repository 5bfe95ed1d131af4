//! Pretty-printing of the AST back into C source.
//!
//! The output is normalised (one statement per line, two-space indentation,
//! single spaces around binary operators) and parses back into an identical
//! tree. The parser folds away a few spellings, so the printer writes the
//! folded forms: a missing `else` comes out as `else ;` and an omitted `for`
//! condition as `1`.

use std::fmt::{self, Display, Formatter};

use crate::ast::{
  AssignExpr, BlockItem, Chain, CommaExpr, CondExpr, Declaration, DeclarationList, ForInit,
  Function, Param, PostfixExpr, Program, Stmt, UnaryExpr,
};

const INDENT: &str = "  ";

impl Display for Program {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    for (i, func) in self.functions.iter().enumerate() {
      if i > 0 {
        writeln!(f)?;
      }
      writeln!(f, "{func}")?;
    }
    Ok(())
  }
}

impl Display for Function {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}(", self.return_type, self.name)?;
    write_list(f, &self.params)?;
    write!(f, ")")?;
    match &self.body {
      None => write!(f, ";"),
      Some(items) => {
        write!(f, " ")?;
        write_block(f, items, 0)
      }
    }
  }
}

impl Display for Param {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "{} {name}", self.ty),
      None => write!(f, "{}", self.ty),
    }
  }
}

impl Display for DeclarationList {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{} ", self.ty)?;
    write_list(f, &self.declarations)?;
    write!(f, ";")
  }
}

impl Display for Declaration {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match &self.init {
      Some(init) => write!(f, "{} = {init}", self.name),
      None => write!(f, "{}", self.name),
    }
  }
}

impl Display for Stmt {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write_stmt(f, self, 0)
  }
}

fn write_indent(f: &mut Formatter<'_>, level: usize) -> fmt::Result {
  for _ in 0..level {
    f.write_str(INDENT)?;
  }
  Ok(())
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
  for (i, item) in items.iter().enumerate() {
    if i > 0 {
      write!(f, ", ")?;
    }
    write!(f, "{item}")?;
  }
  Ok(())
}

/// `{`, the items one per line at `level + 1`, then `}` at `level`. The
/// caller has already positioned the opening brace.
fn write_block(f: &mut Formatter<'_>, items: &[BlockItem], level: usize) -> fmt::Result {
  writeln!(f, "{{")?;
  for item in items {
    write_indent(f, level + 1)?;
    match item {
      BlockItem::Declaration(list) => write!(f, "{list}")?,
      BlockItem::Statement(stmt) => write_stmt(f, stmt, level + 1)?,
    }
    writeln!(f)?;
  }
  write_indent(f, level)?;
  write!(f, "}}")
}

/// A statement nested under a control header: blocks stay on the header
/// line, anything else goes on its own line one level deeper.
fn write_body(f: &mut Formatter<'_>, body: &Stmt, level: usize) -> fmt::Result {
  if let Stmt::Compound(items) = body {
    write!(f, " ")?;
    return write_block(f, items, level);
  }
  writeln!(f)?;
  write_indent(f, level + 1)?;
  write_stmt(f, body, level + 1)
}

fn write_stmt(f: &mut Formatter<'_>, stmt: &Stmt, level: usize) -> fmt::Result {
  match stmt {
    Stmt::Expr(CommaExpr::Null) => write!(f, ";"),
    Stmt::Expr(expr) => write!(f, "{expr};"),
    Stmt::Return(CommaExpr::Null) => write!(f, "return;"),
    Stmt::Return(expr) => write!(f, "return {expr};"),
    Stmt::If {
      condition,
      then,
      otherwise,
    } => {
      write!(f, "if ({condition})")?;
      write_body(f, then, level)?;
      // Always spelled out so a nested `if` can never capture it.
      writeln!(f)?;
      write_indent(f, level)?;
      write!(f, "else")?;
      write_body(f, otherwise, level)
    }
    Stmt::Compound(items) => write_block(f, items, level),
    Stmt::For {
      init,
      condition,
      post,
      body,
    } => {
      write!(f, "for (")?;
      match init {
        ForInit::Declaration(list) => write!(f, "{list}")?,
        ForInit::Expr(CommaExpr::Null) => write!(f, ";")?,
        ForInit::Expr(expr) => write!(f, "{expr};")?,
      }
      write!(f, " {condition};")?;
      if !post.is_null() {
        write!(f, " {post}")?;
      }
      write!(f, ")")?;
      write_body(f, body, level)
    }
    Stmt::While { condition, body } => {
      write!(f, "while ({condition})")?;
      write_body(f, body, level)
    }
    Stmt::DoWhile { body, condition } => {
      write!(f, "do")?;
      write_body(f, body, level)?;
      if matches!(**body, Stmt::Compound(_)) {
        write!(f, " ")?;
      } else {
        writeln!(f)?;
        write_indent(f, level)?;
      }
      write!(f, "while ({condition});")
    }
    Stmt::Break => write!(f, "break;"),
    Stmt::Continue => write!(f, "continue;"),
  }
}

impl Display for CommaExpr {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => Ok(()),
      Self::List(exprs) => write_list(f, exprs),
    }
  }
}

impl Display for AssignExpr {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::Conditional(cond) => write!(f, "{cond}"),
      Self::Assign { target, op, value } => write!(f, "{target} {} {value}", op.symbol()),
    }
  }
}

impl Display for CondExpr {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::LogicOr(chain) => write!(f, "{chain}"),
      Self::Ternary {
        condition,
        then,
        otherwise,
      } => write!(f, "{condition} ? {then} : {otherwise}"),
    }
  }
}

impl<T: Display> Display for Chain<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.first)?;
    for (op, operand) in &self.rest {
      write!(f, " {} {operand}", op.symbol())?;
    }
    Ok(())
  }
}

impl Display for UnaryExpr {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::Postfix(postfix) => write!(f, "{postfix}"),
      // `- -x` must not collapse into `--x`.
      Self::Op { op, operand } => match **operand {
        Self::Postfix(_) => write!(f, "{}{operand}", op.symbol()),
        _ => write!(f, "{} {operand}", op.symbol()),
      },
      Self::PrefixStep { op, target } => write!(f, "{}{target}", op.symbol()),
    }
  }
}

impl Display for PostfixExpr {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::Int(value) => write!(f, "{value}"),
      Self::Float(text) | Self::Var(text) => write!(f, "{text}"),
      Self::PostfixStep { target, op } => write!(f, "{target}{}", op.symbol()),
      Self::Paren(inner) => write!(f, "({inner})"),
      Self::Call { name, args } => {
        write!(f, "{name}(")?;
        write_list(f, args)?;
        write!(f, ")")
      }
    }
  }
}
