//! Recursive-descent parser producing the program AST.
//!
//! There is one helper per grammar production. Each consumes the tokens it
//! owns from the front of a shared [`TokenStream`] and returns its subtree.
//! The binary precedence levels are all driven by [`parse_chain`], parameterised
//! with the operators of the level and the parser for the next-tighter level.
//!
//! Besides the grammar, the parser enforces the function re-declaration rules
//! via a [`FunctionTable`]. Variable scoping is checked by the code generator,
//! which owns the scope bookkeeping.

use crate::ast::{
  AdditiveExpr, AssignExpr, AssignOp, BinaryOp, BitAndExpr, BitOrExpr, BitXorExpr, BlockItem,
  Chain, CommaExpr, CondExpr, Declaration, DeclarationList, EqualityExpr, ForInit, Function,
  LogicAndExpr, LogicOrExpr, MultiplicativeExpr, Param, PostfixExpr, Program, RelationalExpr,
  ShiftExpr, StepOp, Stmt, UnaryExpr, UnaryOp,
};
use crate::error::{CompileError, CompileResult};
use crate::signature::FunctionTable;
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};
use crate::ty::TypeKind;

/// Parse a whole translation unit.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens, source);

  if stream.is_eof() {
    return Err(CompileError::at(source, 0, "program is empty"));
  }

  let mut table = FunctionTable::new();
  let mut functions = Vec::new();
  while !stream.is_eof() {
    let func = parse_function(&mut stream)?;
    table.declare(&func)?;
    functions.push(func);
  }

  Ok(Program { functions })
}

fn parse_function(stream: &mut TokenStream) -> CompileResult<Function> {
  let return_type = stream.get_type()?;
  let (name, _) = stream.get_ident()?;
  stream.skip("(")?;
  let params = parse_params(stream)?;
  stream.skip(")")?;

  if stream.equal(";") {
    return Ok(Function {
      return_type,
      name,
      params,
      body: None,
    });
  }

  if let Some((index, _)) = params
    .iter()
    .enumerate()
    .find(|(_, param)| param.name.is_none())
  {
    return Err(stream.error(format!(
      "parameter {} of function '{name}' has no name",
      index + 1
    )));
  }

  stream.skip("{")?;
  let body = parse_block_items(stream)?;
  Ok(Function {
    return_type,
    name,
    params,
    body: Some(body),
  })
}

fn parse_params(stream: &mut TokenStream) -> CompileResult<Vec<Param>> {
  let mut params = Vec::new();
  if stream.peek_text() == Some(")") {
    return Ok(params);
  }

  loop {
    let ty = stream.get_type()?;
    let name = if stream.peek_kind() == Some(TokenKind::Ident) {
      Some(stream.get_ident()?.0)
    } else {
      None
    };
    params.push(Param { ty, name });
    if !stream.equal(",") {
      return Ok(params);
    }
  }
}

/// Parse block items up to and including the closing brace.
fn parse_block_items(stream: &mut TokenStream) -> CompileResult<Vec<BlockItem>> {
  let mut items = Vec::new();
  while !stream.equal("}") {
    if stream.is_eof() {
      return Err(stream.error("expected \"}\", but reached end of input"));
    }
    items.push(parse_block_item(stream)?);
  }
  Ok(items)
}

fn parse_block_item(stream: &mut TokenStream) -> CompileResult<BlockItem> {
  if stream.at_type() {
    return Ok(BlockItem::Declaration(parse_declaration_list(stream)?));
  }
  Ok(BlockItem::Statement(parse_stmt(stream)?))
}

fn parse_declaration_list(stream: &mut TokenStream) -> CompileResult<DeclarationList> {
  let ty = stream.get_type()?;
  let mut declarations = Vec::new();

  loop {
    let (name, _) = stream.get_ident()?;
    let init = if stream.equal("=") {
      Some(parse_assign(stream)?)
    } else {
      None
    };
    declarations.push(Declaration { name, init });
    if !stream.equal(",") {
      break;
    }
  }

  stream.skip(";")?;
  Ok(DeclarationList { ty, declarations })
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  if stream.equal("return") {
    let value = parse_optional_expr(stream, ";")?;
    stream.skip(";")?;
    return Ok(Stmt::Return(value));
  }

  if stream.equal("if") {
    stream.skip("(")?;
    let condition = parse_expr(stream)?;
    stream.skip(")")?;
    let then = parse_stmt(stream)?;
    let otherwise = if stream.equal("else") {
      parse_stmt(stream)?
    } else {
      Stmt::empty()
    };
    return Ok(Stmt::If {
      condition,
      then: Box::new(then),
      otherwise: Box::new(otherwise),
    });
  }

  if stream.equal("{") {
    return Ok(Stmt::Compound(parse_block_items(stream)?));
  }

  if stream.equal("for") {
    return parse_for(stream);
  }

  if stream.equal("while") {
    stream.skip("(")?;
    let condition = parse_expr(stream)?;
    stream.skip(")")?;
    let body = parse_stmt(stream)?;
    return Ok(Stmt::While {
      condition,
      body: Box::new(body),
    });
  }

  if stream.equal("do") {
    let body = parse_stmt(stream)?;
    stream.skip("while")?;
    stream.skip("(")?;
    let condition = parse_expr(stream)?;
    stream.skip(")")?;
    stream.skip(";")?;
    return Ok(Stmt::DoWhile {
      body: Box::new(body),
      condition,
    });
  }

  if stream.equal("break") {
    stream.skip(";")?;
    return Ok(Stmt::Break);
  }

  if stream.equal("continue") {
    stream.skip(";")?;
    return Ok(Stmt::Continue);
  }

  let expr = parse_optional_expr(stream, ";")?;
  stream.skip(";")?;
  Ok(Stmt::Expr(expr))
}

fn parse_for(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip("(")?;

  let init = if stream.at_type() {
    // The declaration list consumes its own ';'.
    ForInit::Declaration(parse_declaration_list(stream)?)
  } else {
    let expr = parse_optional_expr(stream, ";")?;
    stream.skip(";")?;
    ForInit::Expr(expr)
  };

  let condition = match parse_optional_expr(stream, ";")? {
    CommaExpr::Null => CommaExpr::int(1),
    condition => condition,
  };
  stream.skip(";")?;

  let post = parse_optional_expr(stream, ")")?;
  stream.skip(")")?;

  let body = parse_stmt(stream)?;
  Ok(Stmt::For {
    init,
    condition,
    post,
    body: Box::new(body),
  })
}

/// An expression that may be omitted when `terminator` follows immediately.
fn parse_optional_expr(stream: &mut TokenStream, terminator: &str) -> CompileResult<CommaExpr> {
  if stream.peek_text() == Some(terminator) {
    return Ok(CommaExpr::Null);
  }
  parse_expr(stream)
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<CommaExpr> {
  let mut exprs = vec![parse_assign(stream)?];
  while stream.equal(",") {
    exprs.push(parse_assign(stream)?);
  }
  Ok(CommaExpr::List(exprs))
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<AssignExpr> {
  // One token of lookahead past the identifier decides between an
  // assignment and a plain conditional expression.
  if stream.peek_kind() == Some(TokenKind::Ident)
    && let Some(op) = stream.peek_text_at(1).and_then(AssignOp::from_symbol)
  {
    let (target, _) = stream.get_ident()?;
    stream.skip(op.symbol())?;
    let value = parse_assign(stream)?;
    return Ok(AssignExpr::Assign {
      target,
      op,
      value: Box::new(value),
    });
  }

  Ok(AssignExpr::Conditional(parse_conditional(stream)?))
}

fn parse_conditional(stream: &mut TokenStream) -> CompileResult<CondExpr> {
  let condition = parse_logic_or(stream)?;

  if stream.equal("?") {
    let then = parse_expr(stream)?;
    stream.skip(":")?;
    let otherwise = parse_conditional(stream)?;
    return Ok(CondExpr::Ternary {
      condition,
      then: Box::new(then),
      otherwise: Box::new(otherwise),
    });
  }

  Ok(CondExpr::LogicOr(condition))
}

/// Parse one precedence level: an operand, then any number of
/// `(operator, operand)` pairs using the operators listed for this level.
fn parse_chain<T>(
  stream: &mut TokenStream,
  ops: &[(&str, BinaryOp)],
  operand: fn(&mut TokenStream) -> CompileResult<T>,
) -> CompileResult<Chain<T>> {
  let first = operand(stream)?;
  let mut rest = Vec::new();

  while let Some(op) = stream.consume_operator(ops) {
    rest.push((op, operand(stream)?));
  }

  Ok(Chain { first, rest })
}

fn parse_logic_or(stream: &mut TokenStream) -> CompileResult<LogicOrExpr> {
  parse_chain(stream, &[("||", BinaryOp::LogicOr)], parse_logic_and)
}

fn parse_logic_and(stream: &mut TokenStream) -> CompileResult<LogicAndExpr> {
  parse_chain(stream, &[("&&", BinaryOp::LogicAnd)], parse_bit_or)
}

fn parse_bit_or(stream: &mut TokenStream) -> CompileResult<BitOrExpr> {
  parse_chain(stream, &[("|", BinaryOp::BitOr)], parse_bit_xor)
}

fn parse_bit_xor(stream: &mut TokenStream) -> CompileResult<BitXorExpr> {
  parse_chain(stream, &[("^", BinaryOp::BitXor)], parse_bit_and)
}

fn parse_bit_and(stream: &mut TokenStream) -> CompileResult<BitAndExpr> {
  parse_chain(stream, &[("&", BinaryOp::BitAnd)], parse_equality)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<EqualityExpr> {
  parse_chain(
    stream,
    &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
    parse_relational,
  )
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<RelationalExpr> {
  parse_chain(
    stream,
    &[
      ("<", BinaryOp::Lt),
      ("<=", BinaryOp::Le),
      (">", BinaryOp::Gt),
      (">=", BinaryOp::Ge),
    ],
    parse_shift,
  )
}

fn parse_shift(stream: &mut TokenStream) -> CompileResult<ShiftExpr> {
  parse_chain(
    stream,
    &[("<<", BinaryOp::Shl), (">>", BinaryOp::Shr)],
    parse_add,
  )
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<AdditiveExpr> {
  parse_chain(
    stream,
    &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
    parse_mul,
  )
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<MultiplicativeExpr> {
  parse_chain(
    stream,
    &[
      ("*", BinaryOp::Mul),
      ("/", BinaryOp::Div),
      ("%", BinaryOp::Mod),
    ],
    parse_unary,
  )
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<UnaryExpr> {
  for op in [StepOp::Increment, StepOp::Decrement] {
    if stream.equal(op.symbol()) {
      if stream.peek_kind() != Some(TokenKind::Ident) {
        return Err(stream.error(format!(
          "operand of prefix '{}' must be an identifier, but got \"{}\"",
          op.symbol(),
          stream.describe_current()
        )));
      }
      let (target, _) = stream.get_ident()?;
      return Ok(UnaryExpr::PrefixStep { op, target });
    }
  }

  for op in [UnaryOp::Neg, UnaryOp::BitNot, UnaryOp::LogicNot] {
    if stream.equal(op.symbol()) {
      let operand = parse_unary(stream)?;
      return Ok(UnaryExpr::Op {
        op,
        operand: Box::new(operand),
      });
    }
  }

  Ok(UnaryExpr::Postfix(parse_postfix(stream)?))
}

fn parse_postfix(stream: &mut TokenStream) -> CompileResult<PostfixExpr> {
  if stream.equal("(") {
    let expr = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(PostfixExpr::Paren(Box::new(expr)));
  }

  match stream.peek_kind() {
    Some(TokenKind::Num) => {
      let (value, _) = stream.get_number()?;
      Ok(PostfixExpr::Int(value))
    }
    Some(TokenKind::Float) => Ok(PostfixExpr::Float(stream.get_float()?)),
    Some(TokenKind::Ident) => {
      let (name, _) = stream.get_ident()?;

      if stream.equal("(") {
        let args = parse_args(stream)?;
        return Ok(PostfixExpr::Call { name, args });
      }

      for op in [StepOp::Increment, StepOp::Decrement] {
        if stream.equal(op.symbol()) {
          return Ok(PostfixExpr::PostfixStep { target: name, op });
        }
      }

      Ok(PostfixExpr::Var(name))
    }
    _ => Err(stream.error(format!(
      "expected an expression, but got \"{}\"",
      stream.describe_current()
    ))),
  }
}

/// Call arguments after the opening parenthesis, through the closing one.
fn parse_args(stream: &mut TokenStream) -> CompileResult<Vec<AssignExpr>> {
  let mut args = Vec::new();
  if stream.equal(")") {
    return Ok(args);
  }

  loop {
    args.push(parse_assign(stream)?);
    if stream.equal(")") {
      return Ok(args);
    }
    stream.skip(",")?;
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn peek_kind(&self) -> Option<TokenKind> {
    self.peek().map(|token| token.kind)
  }

  /// Text of a keyword or punctuator `offset` tokens ahead.
  fn peek_text_at(&self, offset: usize) -> Option<&'a str> {
    self
      .tokens
      .get(self.pos + offset)
      .filter(|token| matches!(token.kind, TokenKind::Punctuator | TokenKind::Keyword))
      .map(|token| token_text(token, self.source))
  }

  fn peek_text(&self) -> Option<&'a str> {
    self.peek_text_at(0)
  }

  fn describe_current(&self) -> String {
    describe_token(self.peek(), self.source)
  }

  /// Syntax error anchored at the current token.
  fn error(&self, message: impl Into<String>) -> CompileError {
    let loc = self.peek().map_or(self.source.len(), |token| token.loc);
    CompileError::at(self.source, loc, message)
  }

  /// Consume the current token if it is the given punctuator or keyword.
  fn equal(&mut self, op: &str) -> bool {
    if self.peek_text() == Some(op) {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Consume the current token if it is one of `ops`, returning its operator.
  fn consume_operator(&mut self, ops: &[(&str, BinaryOp)]) -> Option<BinaryOp> {
    let text = self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, self.source))?;
    let (_, op) = ops.iter().find(|(symbol, _)| *symbol == text)?;
    self.pos += 1;
    Some(*op)
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      Err(self.error(format!(
        "expected \"{s}\", but got \"{}\"",
        self.describe_current()
      )))
    }
  }

  fn at_type(&self) -> bool {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Keyword)
      .and_then(|token| TypeKind::from_keyword(token_text(token, self.source)))
      .is_some()
  }

  fn get_type(&mut self) -> CompileResult<TypeKind> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Keyword
      && let Some(ty) = TypeKind::from_keyword(token_text(token, self.source))
    {
      self.pos += 1;
      return Ok(ty);
    }
    Err(self.error(format!(
      "expected a type, but got \"{}\"",
      self.describe_current()
    )))
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i64, usize)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let value = token
        .value
        .ok_or_else(|| self.error("internal error: numeric token missing value"))?;
      let loc = token.loc;
      self.pos += 1;
      return Ok((value, loc));
    }

    Err(self.error(format!(
      "expected a number, but got \"{}\"",
      self.describe_current()
    )))
  }

  fn get_float(&mut self) -> CompileResult<String> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Float
    {
      let text = token_text(token, self.source).to_string();
      self.pos += 1;
      return Ok(text);
    }

    Err(self.error(format!(
      "expected a float literal, but got \"{}\"",
      self.describe_current()
    )))
  }

  /// Parse the current token as an identifier.
  fn get_ident(&mut self) -> CompileResult<(String, usize)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Ident
    {
      let ident = token_text(token, self.source).to_string();
      let loc = token.loc;
      self.pos += 1;
      return Ok((ident, loc));
    }

    Err(self.error(format!(
      "expected an identifier, but got \"{}\"",
      self.describe_current()
    )))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
  }
}
