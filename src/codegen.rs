//! Code generation: lower the parsed AST into 32-bit x86 AT&T assembly.
//!
//! The emitter uses an accumulator discipline: every expression leaves its
//! value in `%eax`. A binary operator evaluates its left operand, pushes it,
//! evaluates the right operand, then pops the left operand back into `%ecx`
//! before combining the two. Locals live in `%ebp`-relative stack slots.
//!
//! Slots are handed out monotonically within a function and never reused, so
//! every declaration owns one address for its whole scope. `%esp` tracks the
//! deepest live slot: leaving a compound statement (or a `for` header scope)
//! pops its declarations, and `break`/`continue` unwind to the depth that was
//! live when the loop was entered.

use std::collections::HashMap;
use std::fmt;

use crate::ast::{
  AdditiveExpr, AssignExpr, AssignOp, BinaryOp, BitAndExpr, BitOrExpr, BitXorExpr, BlockItem,
  Chain, CommaExpr, CondExpr, Declaration, DeclarationList, EqualityExpr, ForInit, Function,
  LogicAndExpr, LogicOrExpr, MultiplicativeExpr, PostfixExpr, Program, RelationalExpr, ShiftExpr,
  StepOp, Stmt, UnaryExpr, UnaryOp,
};
use crate::error::{CompileError, CompileResult};
use crate::signature::FunctionTable;
use crate::ty::TypeKind;

/// Knobs for the emitted assembly and call checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
  /// Prepended to every function symbol (`_main` under the default).
  pub symbol_prefix: String,
  /// When false, calling a function with no prior declaration is an error
  /// instead of a warning.
  pub implicit_declarations: bool,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      symbol_prefix: "_".to_string(),
      implicit_declarations: true,
    }
  }
}

/// Non-fatal diagnostics collected while generating code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
  ImplicitDeclaration { name: String, function: String },
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::ImplicitDeclaration { name, function } => write!(
        f,
        "implicit declaration of function '{name}' (in function '{function}')"
      ),
    }
  }
}

/// Assembly text for a whole program plus any warnings raised on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
  pub text: String,
  pub warnings: Vec<Warning>,
}

/// Emit assembly for every defined function in program order.
pub fn generate(program: &Program, options: &Options) -> CompileResult<Assembly> {
  let mut generator = Generator::new(options.clone());
  for func in &program.functions {
    generator.emit_function(func)?;
  }
  Ok(Assembly {
    text: generator.asm,
    warnings: generator.warnings,
  })
}

/// Byte offset of parameter `index` from `%ebp`: above the saved frame
/// pointer and the return address.
fn param_offset(index: usize) -> i32 {
  8 + 4 * index as i32
}

/// Per-function symbol table and stack bookkeeping.
///
/// Parameters and the function body's top-level declarations share `root`;
/// every compound statement and `for` header pushes one map onto `blocks`.
struct Frame {
  function: String,
  root: HashMap<String, i32>,
  blocks: Vec<HashMap<String, i32>>,
  /// Next free slot; only ever decreases.
  next_offset: i32,
  /// Current `%esp` relative to `%ebp` between statements.
  sp: i32,
}

impl Frame {
  fn new(function: &str) -> Self {
    Self {
      function: function.to_string(),
      root: HashMap::new(),
      blocks: Vec::new(),
      next_offset: -4,
      sp: 0,
    }
  }

  fn innermost(&mut self) -> &mut HashMap<String, i32> {
    match self.blocks.last_mut() {
      Some(block) => block,
      None => &mut self.root,
    }
  }

  fn lookup(&self, name: &str) -> CompileResult<i32> {
    self
      .blocks
      .iter()
      .rev()
      .chain(std::iter::once(&self.root))
      .find_map(|scope| scope.get(name).copied())
      .ok_or_else(|| CompileError::UndeclaredIdentifier {
        name: name.to_string(),
        function: self.function.clone(),
      })
  }

  fn bind(&mut self, name: &str, offset: i32) -> CompileResult<()> {
    if self.innermost().contains_key(name) {
      return Err(CompileError::Redeclaration {
        name: name.to_string(),
        function: self.function.clone(),
      });
    }
    self.innermost().insert(name.to_string(), offset);
    Ok(())
  }

  /// Reserve the next monotonic slot for a local and bind it in the
  /// innermost scope.
  fn declare_local(&mut self, name: &str, size: i32) -> CompileResult<i32> {
    let slot = self.next_offset;
    self.bind(name, slot)?;
    self.next_offset -= size;
    Ok(slot)
  }
}

/// The innermost enclosing loop, as seen by `break` and `continue`.
#[derive(Debug, Clone, Copy)]
struct LoopContext {
  label: usize,
  sp: i32,
}

/// Where the left operand of a binary operation comes from.
#[derive(Debug, Clone, Copy)]
enum LeftOperand {
  /// Pushed on the machine stack before the right operand was evaluated.
  Stack,
  /// A variable slot, for compound assignment.
  Slot(i32),
}

impl LeftOperand {
  fn load(self, reg: &str) -> String {
    match self {
      Self::Stack => format!("    popl {reg}\n"),
      Self::Slot(offset) => format!("    movl {offset}(%ebp), {reg}\n"),
    }
  }
}

struct Generator {
  options: Options,
  functions: FunctionTable,
  label_counter: usize,
  warnings: Vec<Warning>,
  asm: String,
}

impl Generator {
  fn new(options: Options) -> Self {
    Self {
      options,
      functions: FunctionTable::new(),
      label_counter: 0,
      warnings: Vec::new(),
      asm: String::new(),
    }
  }

  fn next_label(&mut self) -> usize {
    let label = self.label_counter;
    self.label_counter += 1;
    label
  }

  fn symbol(&self, name: &str) -> String {
    format!("{}{name}", self.options.symbol_prefix)
  }

  fn emit_function(&mut self, func: &Function) -> CompileResult<()> {
    self.functions.declare(func)?;
    let Some(body) = &func.body else {
      return Ok(());
    };

    let mut frame = Frame::new(&func.name);
    for (index, param) in func.params.iter().enumerate() {
      if let Some(name) = &param.name {
        frame.bind(name, param_offset(index))?;
      }
    }

    let symbol = self.symbol(&func.name);
    self.asm.push_str(&format!("    .globl {symbol}\n"));
    self.asm.push_str(&format!("{symbol}:\n"));
    self.asm.push_str("    pushl %ebp\n");
    self.asm.push_str("    movl %esp, %ebp\n");

    for item in body {
      self.emit_block_item(item, &mut frame, None)?;
    }

    // Falling off the end returns 0.
    self.asm.push_str("    movl $0, %eax\n");
    self.emit_epilogue();
    Ok(())
  }

  fn emit_epilogue(&mut self) {
    self.asm.push_str("    movl %ebp, %esp\n");
    self.asm.push_str("    popl %ebp\n");
    self.asm.push_str("    ret\n");
  }

  fn emit_block_item(
    &mut self,
    item: &BlockItem,
    frame: &mut Frame,
    lp: Option<LoopContext>,
  ) -> CompileResult<()> {
    match item {
      BlockItem::Declaration(list) => self.emit_declaration_list(list, frame),
      BlockItem::Statement(stmt) => self.emit_stmt(stmt, frame, lp),
    }
  }

  fn emit_declaration_list(
    &mut self,
    list: &DeclarationList,
    frame: &mut Frame,
  ) -> CompileResult<()> {
    for decl in &list.declarations {
      self.emit_declaration(decl, list.ty, frame)?;
    }
    Ok(())
  }

  fn emit_declaration(
    &mut self,
    decl: &Declaration,
    ty: TypeKind,
    frame: &mut Frame,
  ) -> CompileResult<()> {
    let size = ty.size();
    // The name is in scope inside its own initializer, as in C.
    let slot = frame.declare_local(&decl.name, size)?;
    // A sibling scope may have released stack above this slot.
    let gap = frame.sp - slot - size;

    match &decl.init {
      Some(init) => {
        self.emit_assign(init, frame)?;
        if gap > 0 {
          self.asm.push_str(&format!("    subl ${gap}, %esp\n"));
        }
        self.asm.push_str("    pushl %eax\n");
      }
      None => {
        self.asm.push_str(&format!("    subl ${}, %esp\n", gap + size));
      }
    }

    frame.sp = slot;
    Ok(())
  }

  /// Run `body` inside a fresh block scope, then release whatever stack the
  /// scope's declarations took.
  fn emit_scoped(
    &mut self,
    frame: &mut Frame,
    body: impl FnOnce(&mut Self, &mut Frame) -> CompileResult<()>,
  ) -> CompileResult<()> {
    let depth = frame.blocks.len();
    let entry_sp = frame.sp;
    frame.blocks.push(HashMap::new());
    body(self, frame)?;
    frame.blocks.truncate(depth);
    self.emit_release(entry_sp - frame.sp);
    frame.sp = entry_sp;
    Ok(())
  }

  fn emit_release(&mut self, bytes: i32) {
    if bytes > 0 {
      self.asm.push_str(&format!("    addl ${bytes}, %esp\n"));
    }
  }

  fn emit_stmt(
    &mut self,
    stmt: &Stmt,
    frame: &mut Frame,
    lp: Option<LoopContext>,
  ) -> CompileResult<()> {
    match stmt {
      Stmt::Expr(expr) => self.emit_comma(expr, frame),
      Stmt::Return(expr) => {
        if expr.is_null() {
          self.asm.push_str("    movl $0, %eax\n");
        } else {
          self.emit_comma(expr, frame)?;
        }
        self.emit_epilogue();
        Ok(())
      }
      Stmt::If {
        condition,
        then,
        otherwise,
      } => {
        let label = self.next_label();
        self.emit_comma(condition, frame)?;
        self.asm.push_str("    cmpl $0, %eax\n");
        self.asm.push_str(&format!("    je .L.else.{label}\n"));
        self.emit_stmt(then, frame, lp)?;
        self.asm.push_str(&format!("    jmp .L.end.{label}\n"));
        self.asm.push_str(&format!(".L.else.{label}:\n"));
        self.emit_stmt(otherwise, frame, lp)?;
        self.asm.push_str(&format!(".L.end.{label}:\n"));
        Ok(())
      }
      Stmt::Compound(items) => self.emit_scoped(frame, |generator, frame| {
        for item in items {
          generator.emit_block_item(item, frame, lp)?;
        }
        Ok(())
      }),
      Stmt::For {
        init,
        condition,
        post,
        body,
      } => self.emit_scoped(frame, |generator, frame| {
        let label = generator.next_label();
        match init {
          ForInit::Declaration(list) => generator.emit_declaration_list(list, frame)?,
          ForInit::Expr(expr) => generator.emit_comma(expr, frame)?,
        }
        let inner = LoopContext {
          label,
          sp: frame.sp,
        };

        generator.asm.push_str(&format!(".L.cond.{label}:\n"));
        generator.emit_comma(condition, frame)?;
        generator.asm.push_str("    cmpl $0, %eax\n");
        generator.asm.push_str(&format!("    je .L.end.{label}\n"));
        generator.emit_stmt(body, frame, Some(inner))?;
        generator.asm.push_str(&format!(".L.continue.{label}:\n"));
        generator.emit_comma(post, frame)?;
        generator.asm.push_str(&format!("    jmp .L.cond.{label}\n"));
        generator.asm.push_str(&format!(".L.end.{label}:\n"));
        Ok(())
      }),
      Stmt::While { condition, body } => {
        let label = self.next_label();
        let inner = LoopContext {
          label,
          sp: frame.sp,
        };

        self.asm.push_str(&format!(".L.cond.{label}:\n"));
        self.emit_comma(condition, frame)?;
        self.asm.push_str("    cmpl $0, %eax\n");
        self.asm.push_str(&format!("    je .L.end.{label}\n"));
        self.emit_stmt(body, frame, Some(inner))?;
        self.asm.push_str(&format!(".L.continue.{label}:\n"));
        self.asm.push_str(&format!("    jmp .L.cond.{label}\n"));
        self.asm.push_str(&format!(".L.end.{label}:\n"));
        Ok(())
      }
      Stmt::DoWhile { body, condition } => {
        let label = self.next_label();
        let inner = LoopContext {
          label,
          sp: frame.sp,
        };

        self.asm.push_str(&format!(".L.begin.{label}:\n"));
        self.emit_stmt(body, frame, Some(inner))?;
        self.asm.push_str(&format!(".L.continue.{label}:\n"));
        self.emit_comma(condition, frame)?;
        self.asm.push_str("    cmpl $0, %eax\n");
        self.asm.push_str(&format!("    je .L.end.{label}\n"));
        self.asm.push_str(&format!("    jmp .L.begin.{label}\n"));
        self.asm.push_str(&format!(".L.end.{label}:\n"));
        Ok(())
      }
      Stmt::Break => self.emit_loop_jump("break", "end", frame, lp),
      Stmt::Continue => self.emit_loop_jump("continue", "continue", frame, lp),
    }
  }

  /// `break`/`continue`: release block locals declared since the loop was
  /// entered, then jump to the loop's `target` label.
  fn emit_loop_jump(
    &mut self,
    keyword: &str,
    target: &str,
    frame: &Frame,
    lp: Option<LoopContext>,
  ) -> CompileResult<()> {
    let Some(ctx) = lp else {
      return Err(CompileError::LoopControl {
        keyword: keyword.to_string(),
        function: frame.function.clone(),
      });
    };
    self.emit_release(ctx.sp - frame.sp);
    self.asm.push_str(&format!("    jmp .L.{target}.{}\n", ctx.label));
    Ok(())
  }

  fn emit_comma(&mut self, expr: &CommaExpr, frame: &mut Frame) -> CompileResult<()> {
    match expr {
      CommaExpr::Null => Ok(()),
      CommaExpr::List(exprs) => {
        for expr in exprs {
          self.emit_assign(expr, frame)?;
        }
        Ok(())
      }
    }
  }

  fn emit_assign(&mut self, expr: &AssignExpr, frame: &mut Frame) -> CompileResult<()> {
    match expr {
      AssignExpr::Conditional(cond) => self.emit_conditional(cond, frame),
      AssignExpr::Assign { target, op, value } => {
        let slot = frame.lookup(target)?;
        self.emit_assign(value, frame)?;
        if let AssignOp::Compound(op) = op {
          self.emit_combine(*op, LeftOperand::Slot(slot));
        }
        self.asm.push_str(&format!("    movl %eax, {slot}(%ebp)\n"));
        Ok(())
      }
    }
  }

  fn emit_conditional(&mut self, expr: &CondExpr, frame: &mut Frame) -> CompileResult<()> {
    match expr {
      CondExpr::LogicOr(chain) => self.emit_logic_or(chain, frame),
      CondExpr::Ternary {
        condition,
        then,
        otherwise,
      } => {
        let label = self.next_label();
        self.emit_logic_or(condition, frame)?;
        self.asm.push_str("    cmpl $0, %eax\n");
        self.asm.push_str(&format!("    je .L.else.{label}\n"));
        self.emit_comma(then, frame)?;
        self.asm.push_str(&format!("    jmp .L.end.{label}\n"));
        self.asm.push_str(&format!(".L.else.{label}:\n"));
        self.emit_conditional(otherwise, frame)?;
        self.asm.push_str(&format!(".L.end.{label}:\n"));
        Ok(())
      }
    }
  }

  /// Emit one precedence level: operands left to right, each later operand
  /// combined with the running result saved on the machine stack.
  fn emit_chain<T>(
    &mut self,
    chain: &Chain<T>,
    frame: &mut Frame,
    operand: fn(&mut Self, &T, &mut Frame) -> CompileResult<()>,
  ) -> CompileResult<()> {
    operand(self, &chain.first, frame)?;
    for (op, rhs) in &chain.rest {
      self.asm.push_str("    pushl %eax\n");
      operand(self, rhs, frame)?;
      self.emit_combine(*op, LeftOperand::Stack);
    }
    Ok(())
  }

  /// Combine the left operand with the right operand in `%eax`, leaving the
  /// result in `%eax`.
  ///
  /// `&&` and `||` look at both operands unconditionally; there is no
  /// short-circuit.
  fn emit_combine(&mut self, op: BinaryOp, left: LeftOperand) {
    let (left_reg, swapped) = match op {
      BinaryOp::Sub | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Shl | BinaryOp::Shr => {
        ("%eax", true)
      }
      _ => ("%ecx", false),
    };
    if swapped {
      self.asm.push_str("    movl %eax, %ecx\n");
    }
    self.asm.push_str(&left.load(left_reg));

    match op {
      BinaryOp::Add => self.asm.push_str("    addl %ecx, %eax\n"),
      BinaryOp::Sub => self.asm.push_str("    subl %ecx, %eax\n"),
      BinaryOp::Mul => self.asm.push_str("    imull %ecx, %eax\n"),
      BinaryOp::Div => {
        self.asm.push_str("    cdq\n");
        self.asm.push_str("    idivl %ecx\n");
      }
      BinaryOp::Mod => {
        self.asm.push_str("    cdq\n");
        self.asm.push_str("    idivl %ecx\n");
        self.asm.push_str("    movl %edx, %eax\n");
      }
      BinaryOp::Shl => self.asm.push_str("    shll %cl, %eax\n"),
      BinaryOp::Shr => self.asm.push_str("    sarl %cl, %eax\n"),
      BinaryOp::BitAnd => self.asm.push_str("    andl %ecx, %eax\n"),
      BinaryOp::BitOr => self.asm.push_str("    orl %ecx, %eax\n"),
      BinaryOp::BitXor => self.asm.push_str("    xorl %ecx, %eax\n"),
      BinaryOp::Eq
      | BinaryOp::Ne
      | BinaryOp::Lt
      | BinaryOp::Le
      | BinaryOp::Gt
      | BinaryOp::Ge => {
        let set = match op {
          BinaryOp::Eq => "sete",
          BinaryOp::Ne => "setne",
          BinaryOp::Lt => "setl",
          BinaryOp::Le => "setle",
          BinaryOp::Gt => "setg",
          _ => "setge",
        };
        self.asm.push_str("    cmpl %eax, %ecx\n");
        self.asm.push_str("    movl $0, %eax\n");
        self.asm.push_str(&format!("    {set} %al\n"));
      }
      BinaryOp::LogicOr => {
        self.asm.push_str("    orl %ecx, %eax\n");
        self.asm.push_str("    movl $0, %eax\n");
        self.asm.push_str("    setne %al\n");
      }
      BinaryOp::LogicAnd => {
        self.asm.push_str("    cmpl $0, %ecx\n");
        self.asm.push_str("    setne %cl\n");
        self.asm.push_str("    cmpl $0, %eax\n");
        self.asm.push_str("    movl $0, %eax\n");
        self.asm.push_str("    setne %al\n");
        self.asm.push_str("    andb %cl, %al\n");
      }
    }
  }

  fn emit_logic_or(&mut self, expr: &LogicOrExpr, frame: &mut Frame) -> CompileResult<()> {
    self.emit_chain(expr, frame, Self::emit_logic_and)
  }

  fn emit_logic_and(&mut self, expr: &LogicAndExpr, frame: &mut Frame) -> CompileResult<()> {
    self.emit_chain(expr, frame, Self::emit_bit_or)
  }

  fn emit_bit_or(&mut self, expr: &BitOrExpr, frame: &mut Frame) -> CompileResult<()> {
    self.emit_chain(expr, frame, Self::emit_bit_xor)
  }

  fn emit_bit_xor(&mut self, expr: &BitXorExpr, frame: &mut Frame) -> CompileResult<()> {
    self.emit_chain(expr, frame, Self::emit_bit_and)
  }

  fn emit_bit_and(&mut self, expr: &BitAndExpr, frame: &mut Frame) -> CompileResult<()> {
    self.emit_chain(expr, frame, Self::emit_equality)
  }

  fn emit_equality(&mut self, expr: &EqualityExpr, frame: &mut Frame) -> CompileResult<()> {
    self.emit_chain(expr, frame, Self::emit_relational)
  }

  fn emit_relational(&mut self, expr: &RelationalExpr, frame: &mut Frame) -> CompileResult<()> {
    self.emit_chain(expr, frame, Self::emit_shift)
  }

  fn emit_shift(&mut self, expr: &ShiftExpr, frame: &mut Frame) -> CompileResult<()> {
    self.emit_chain(expr, frame, Self::emit_add)
  }

  fn emit_add(&mut self, expr: &AdditiveExpr, frame: &mut Frame) -> CompileResult<()> {
    self.emit_chain(expr, frame, Self::emit_mul)
  }

  fn emit_mul(&mut self, expr: &MultiplicativeExpr, frame: &mut Frame) -> CompileResult<()> {
    self.emit_chain(expr, frame, Self::emit_unary)
  }

  fn emit_unary(&mut self, expr: &UnaryExpr, frame: &mut Frame) -> CompileResult<()> {
    match expr {
      UnaryExpr::Postfix(postfix) => self.emit_postfix(postfix, frame),
      UnaryExpr::Op { op, operand } => {
        self.emit_unary(operand, frame)?;
        match op {
          UnaryOp::Neg => self.asm.push_str("    negl %eax\n"),
          UnaryOp::BitNot => self.asm.push_str("    notl %eax\n"),
          UnaryOp::LogicNot => {
            self.asm.push_str("    cmpl $0, %eax\n");
            self.asm.push_str("    movl $0, %eax\n");
            self.asm.push_str("    sete %al\n");
          }
        }
        Ok(())
      }
      UnaryExpr::PrefixStep { op, target } => {
        let slot = frame.lookup(target)?;
        self.asm.push_str(&format!("    {} {slot}(%ebp)\n", step_instruction(*op)));
        self.asm.push_str(&format!("    movl {slot}(%ebp), %eax\n"));
        Ok(())
      }
    }
  }

  fn emit_postfix(&mut self, expr: &PostfixExpr, frame: &mut Frame) -> CompileResult<()> {
    match expr {
      PostfixExpr::Int(value) => {
        self.asm.push_str(&format!("    movl ${value}, %eax\n"));
        Ok(())
      }
      PostfixExpr::Float(text) => Err(CompileError::Unsupported {
        feature: format!("float literal '{text}'"),
      }),
      PostfixExpr::Var(name) => {
        let slot = frame.lookup(name)?;
        self.asm.push_str(&format!("    movl {slot}(%ebp), %eax\n"));
        Ok(())
      }
      PostfixExpr::PostfixStep { target, op } => {
        let slot = frame.lookup(target)?;
        self.asm.push_str(&format!("    movl {slot}(%ebp), %eax\n"));
        self.asm.push_str(&format!("    {} {slot}(%ebp)\n", step_instruction(*op)));
        Ok(())
      }
      PostfixExpr::Paren(inner) => self.emit_comma(inner, frame),
      PostfixExpr::Call { name, args } => self.emit_call(name, args, frame),
    }
  }

  /// Arguments are pushed rightmost first so the first one ends up at
  /// `8(%ebp)` in the callee; the caller pops them after the call.
  fn emit_call(&mut self, name: &str, args: &[AssignExpr], frame: &mut Frame) -> CompileResult<()> {
    match self.functions.get(name) {
      None if self.options.implicit_declarations => {
        self.warnings.push(Warning::ImplicitDeclaration {
          name: name.to_string(),
          function: frame.function.clone(),
        });
      }
      None => {
        return Err(CompileError::UndeclaredFunction {
          name: name.to_string(),
          function: frame.function.clone(),
        });
      }
      Some(sig) if sig.arity() != args.len() => {
        return Err(CompileError::ArgumentCount {
          name: name.to_string(),
          expected: sig.arity(),
          found: args.len(),
        });
      }
      Some(_) => {}
    }

    for arg in args.iter().rev() {
      self.emit_assign(arg, frame)?;
      self.asm.push_str("    pushl %eax\n");
    }
    let symbol = self.symbol(name);
    self.asm.push_str(&format!("    call {symbol}\n"));
    self.emit_release(4 * args.len() as i32);
    Ok(())
  }
}

fn step_instruction(op: StepOp) -> &'static str {
  match op {
    StepOp::Increment => "incl",
    StepOp::Decrement => "decl",
  }
}
